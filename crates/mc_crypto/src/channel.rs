//! Secure channel
//!
//! Holds the session key for the current chat, if any, and encrypts or
//! decrypts message payloads with it. Starts empty; `bind` installs the key
//! once a key exchange completes, `clear` wipes it when the last connection
//! goes away.

use zeroize::Zeroizing;

use crate::{aead, error::CryptoError, session_key::SessionKey};

#[derive(Default)]
pub struct SecureChannel {
    key: Option<SessionKey>,
}

impl SecureChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a derived session key, replacing any previous one.
    pub fn bind(&mut self, key: SessionKey) {
        self.key = Some(key);
    }

    /// Drop the bound key. The key material is zeroized on drop.
    pub fn clear(&mut self) {
        self.key = None;
    }

    pub fn is_ready(&self) -> bool {
        self.key.is_some()
    }

    /// Encrypt a payload with a fresh random nonce.
    /// Returns `NoSessionKey` until a key is bound.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
    ) -> Result<([u8; aead::NONCE_LEN], Vec<u8>), CryptoError> {
        let key = self.key.as_ref().ok_or(CryptoError::NoSessionKey)?;
        aead::seal(key.as_bytes(), plaintext)
    }

    /// Decrypt and authenticate a payload received with its nonce.
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let key = self.key.as_ref().ok_or(CryptoError::NoSessionKey)?;
        aead::open(key.as_bytes(), iv, ciphertext)
    }

    /// Fingerprint of the bound key, for out-of-band comparison.
    pub fn verification_fingerprint(&self, salt: &[u8]) -> Result<String, CryptoError> {
        let key = self.key.as_ref().ok_or(CryptoError::NoSessionKey)?;
        Ok(key.fingerprint(salt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::AgreementKeyPair;

    fn bound_pair() -> (SecureChannel, SecureChannel) {
        let a = AgreementKeyPair::generate();
        let b = AgreementKeyPair::generate();

        let mut ch_a = SecureChannel::new();
        let mut ch_b = SecureChannel::new();
        ch_a.bind(a.derive_session_key(b.public()).unwrap());
        ch_b.bind(b.derive_session_key(a.public()).unwrap());
        (ch_a, ch_b)
    }

    #[test]
    fn refuses_without_a_key() {
        let ch = SecureChannel::new();
        assert!(!ch.is_ready());
        assert!(matches!(ch.encrypt(b"x"), Err(CryptoError::NoSessionKey)));
        assert!(matches!(ch.decrypt(&[0u8; 12], b"x"), Err(CryptoError::NoSessionKey)));
        assert!(matches!(
            ch.verification_fingerprint(b"s"),
            Err(CryptoError::NoSessionKey)
        ));
    }

    #[test]
    fn peers_decrypt_each_other() {
        let (ch_a, ch_b) = bound_pair();

        let (iv, ct) = ch_a.encrypt(b"secret message").unwrap();
        let pt = ch_b.decrypt(&iv, &ct).unwrap();
        assert_eq!(&pt[..], b"secret message");

        let (iv, ct) = ch_b.encrypt(b"reply").unwrap();
        let pt = ch_a.decrypt(&iv, &ct).unwrap();
        assert_eq!(&pt[..], b"reply");
    }

    #[test]
    fn wrong_key_never_yields_plaintext() {
        let (ch_a, _) = bound_pair();
        let (other, _) = bound_pair();

        let (iv, ct) = ch_a.encrypt(b"secret").unwrap();
        assert!(matches!(
            other.decrypt(&iv, &ct),
            Err(CryptoError::AeadDecrypt)
        ));
    }

    #[test]
    fn matching_fingerprints_on_both_ends() {
        let (ch_a, ch_b) = bound_pair();
        assert_eq!(
            ch_a.verification_fingerprint(b"salt").unwrap(),
            ch_b.verification_fingerprint(b"salt").unwrap()
        );
    }

    #[test]
    fn clear_forgets_the_key() {
        let (mut ch_a, _) = bound_pair();
        assert!(ch_a.is_ready());
        ch_a.clear();
        assert!(!ch_a.is_ready());
        assert!(ch_a.encrypt(b"x").is_err());
    }
}
