//! Per-peer connection entry and its lifecycle state machine.

use std::time::{Duration, Instant};

use crate::transport::Connection;

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// We dialed out.
    Initiator,
    /// The transport delivered an inbound connection.
    Acceptor,
}

/// Lifecycle of one connection.
///
/// `Opening → KeyPending → Secure`, and any state can drop to `Closed`.
/// A closed entry is removed from the manager's active set at once; the
/// idle state of the whole manager is simply an empty set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Dialed or accepted, but the transport has not reported open yet.
    Opening,
    /// Open; waiting for the key exchange to produce a shared secret.
    KeyPending,
    /// Shared secret derived; user content may flow.
    Secure,
    /// Terminal.
    Closed,
}

/// One entry in the active connection set.
pub struct PeerConnection<C: Connection> {
    pub conn: C,
    pub role: Role,
    pub state: ConnectionState,
    /// When the entry was created; drives the connect timeout for dials.
    pub started_at: Instant,
}

impl<C: Connection> PeerConnection<C> {
    pub fn new(conn: C, role: Role, now: Instant) -> Self {
        Self {
            conn,
            role,
            state: ConnectionState::Opening,
            started_at: now,
        }
    }

    pub fn peer_id(&self) -> &str {
        self.conn.peer_id()
    }

    /// Transport reported the channel open.
    pub fn mark_open(&mut self) {
        if self.state == ConnectionState::Opening {
            self.state = ConnectionState::KeyPending;
        }
    }

    /// A shared secret now exists. No effect unless the channel is open.
    pub fn mark_secure(&mut self) {
        if self.state == ConnectionState::KeyPending {
            self.state = ConnectionState::Secure;
        }
    }

    /// Terminal transition; closes the transport handle.
    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
        self.conn.close();
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::KeyPending | ConnectionState::Secure
        )
    }

    pub fn is_secure(&self) -> bool {
        self.state == ConnectionState::Secure
    }

    /// True while an outbound dial has not been reported open.
    pub fn is_dialing(&self) -> bool {
        self.role == Role::Initiator && self.state == ConnectionState::Opening
    }

    /// True when an outbound dial has sat in `Opening` for `timeout` or
    /// longer. Accepted connections never time out here.
    pub fn dial_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        self.is_dialing() && now.duration_since(self.started_at) >= timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    struct StubConn(&'static str);

    impl Connection for StubConn {
        fn peer_id(&self) -> &str {
            self.0
        }
        fn send(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }
        fn close(&mut self) {}
    }

    #[test]
    fn lifecycle_transitions_in_order() {
        let mut pc = PeerConnection::new(StubConn("p1"), Role::Initiator, Instant::now());
        assert_eq!(pc.state, ConnectionState::Opening);
        assert!(!pc.is_open());
        assert!(pc.is_dialing());

        pc.mark_open();
        assert_eq!(pc.state, ConnectionState::KeyPending);
        assert!(pc.is_open());
        assert!(!pc.is_secure());
        assert!(!pc.is_dialing());

        pc.mark_secure();
        assert!(pc.is_secure());

        pc.mark_closed();
        assert_eq!(pc.state, ConnectionState::Closed);
        assert!(!pc.is_open());
    }

    #[test]
    fn cannot_secure_before_open() {
        let mut pc = PeerConnection::new(StubConn("p1"), Role::Acceptor, Instant::now());
        pc.mark_secure();
        assert_eq!(pc.state, ConnectionState::Opening);
    }

    #[test]
    fn dial_timeout_applies_to_initiators_only() {
        let t0 = Instant::now();
        let timeout = Duration::from_secs(10);

        let dialer = PeerConnection::new(StubConn("a"), Role::Initiator, t0);
        let accepted = PeerConnection::new(StubConn("b"), Role::Acceptor, t0);

        assert!(!dialer.dial_timed_out(t0 + Duration::from_secs(9), timeout));
        assert!(dialer.dial_timed_out(t0 + timeout, timeout));
        assert!(!accepted.dial_timed_out(t0 + Duration::from_secs(60), timeout));
    }

    #[test]
    fn open_connection_never_times_out() {
        let t0 = Instant::now();
        let mut pc = PeerConnection::new(StubConn("a"), Role::Initiator, t0);
        pc.mark_open();
        assert!(!pc.dial_timed_out(t0 + Duration::from_secs(60), Duration::from_secs(10)));
    }
}
