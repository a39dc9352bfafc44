//! Manager tunables.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// How long an outbound dial may sit in `Opening` before the peer is
    /// declared unreachable.
    pub connect_timeout: Duration,

    /// Ceiling for inline media. A file either fits in one envelope or the
    /// send fails; there is no chunking.
    pub max_media_bytes: u64,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_media_bytes: 8 * 1024 * 1024,
        }
    }
}
