//! Key derivation functions
//!
//! `session_key_from_dh` — HKDF-SHA256, binds a raw X25519 shared point to
//!   the 32-byte AES-256-GCM key used by `channel`. The raw DH output is
//!   never used as a cipher key directly.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::{error::CryptoError, session_key::SessionKey};

const SESSION_INFO: &[u8] = b"mc-session-key-v1";

/// Expand `ikm` + `info` into `output.len()` bytes of key material.
///
/// `salt` may be `None` (HKDF will use a zeroed salt).
pub fn hkdf_expand(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), CryptoError> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    hk.expand(info, output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Derive the symmetric session key from a DH shared point.
pub fn session_key_from_dh(dh_output: &[u8]) -> Result<SessionKey, CryptoError> {
    let mut key = [0u8; 32];
    hkdf_expand(dh_output, None, SESSION_INFO, &mut key)?;
    Ok(SessionKey::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_is_deterministic() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        hkdf_expand(b"ikm", Some(b"salt"), b"info", &mut a).unwrap();
        hkdf_expand(b"ikm", Some(b"salt"), b"info", &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn info_separates_outputs() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        hkdf_expand(b"ikm", None, b"info-a", &mut a).unwrap();
        hkdf_expand(b"ikm", None, b"info-b", &mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn same_dh_output_gives_same_session_key() {
        let k1 = session_key_from_dh(&[7u8; 32]).unwrap();
        let k2 = session_key_from_dh(&[7u8; 32]).unwrap();
        assert_eq!(k1.fingerprint(b"x"), k2.fingerprint(b"x"));

        let k3 = session_key_from_dh(&[8u8; 32]).unwrap();
        assert_ne!(k1.fingerprint(b"x"), k3.fingerprint(b"x"));
    }
}
