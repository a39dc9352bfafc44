//! Derived session secret.

use zeroize::ZeroizeOnDrop;

/// 32-byte symmetric key shared by both ends of a completed key exchange.
/// Drop clears memory via ZeroizeOnDrop.
#[derive(ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    pub(crate) fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Human-readable digest of the secret for out-of-band comparison:
    /// keyed BLAKE3 over `secret || salt`, truncated to 8 bytes (64 bits),
    /// hex-encoded in groups of 4 for display.
    ///
    /// Example: "a1b2 c3d4 e5f6 7890"
    ///
    /// Both ends of an exchange see the same string when their secrets and
    /// salts match; the secret itself cannot be recovered from it.
    pub fn fingerprint(&self, salt: &[u8]) -> String {
        let mut hasher = blake3::Hasher::new_derive_key("mc-fingerprint-v1");
        hasher.update(&self.0);
        hasher.update(salt);
        let hash = hasher.finalize();
        let hex = hex::encode(&hash.as_bytes()[..8]);
        hex.chars()
            .collect::<Vec<_>>()
            .chunks(4)
            .map(|c| c.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
