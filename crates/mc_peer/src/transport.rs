//! Transport boundary.
//!
//! The manager treats the transport as an opaque byte pipe per peer:
//! signaling, NAT traversal, and the data channels themselves live behind
//! these traits. The one hard requirement on an implementation is that
//! `peer_id` is assigned and verified by the transport; the remote side can
//! neither choose nor change it. Every security property of the layer above
//! leans on that.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Connection already closed")]
    Closed,
}

/// One bidirectional channel to a peer.
///
/// Delivery within a channel is assumed FIFO; ordering across channels is
/// not guaranteed.
pub trait Connection {
    /// Transport-verified peer identifier, immutable for the connection's
    /// lifetime.
    fn peer_id(&self) -> &str;

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    fn close(&mut self);
}

/// Connection factory half of the transport.
pub trait Transport {
    type Conn: Connection;

    /// Identifier other peers use to reach this process.
    fn local_id(&self) -> &str;

    /// Start an outbound connection. The returned handle is not open yet;
    /// the transport later reports openness via `ConnectionManager::on_open`
    /// (or never does, in which case the connect timeout fires).
    fn open(&mut self, remote_id: &str) -> Result<Self::Conn, TransportError>;
}
