//! Authenticated encryption
//!
//! Uses AES-256-GCM.
//! Key size: 32 bytes.  Nonce: 12 bytes (random per call).  Tag: 16 bytes.
//!
//! The nonce is NOT prepended to the ciphertext: the encrypted envelope
//! carries `iv` and `ciphertext` as separate fields, so `seal` returns the
//! two parts and `open` takes them back separately.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
    Aes256Gcm, Nonce,
};
use zeroize::Zeroizing;

use crate::error::CryptoError;

pub const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` with a 32-byte key and a fresh random nonce.
pub fn seal(
    key: &[u8; 32],
    plaintext: &[u8],
) -> Result<([u8; NONCE_LEN], Vec<u8>), CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::AeadEncrypt)?;

    let nonce = Aes256Gcm::generate_nonce(&mut AeadOsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::AeadEncrypt)?;

    Ok((nonce.into(), ciphertext))
}

/// Decrypt and authenticate. A bad tag, wrong key, or malformed input all
/// report the same `AeadDecrypt` error.
pub fn open(key: &[u8; 32], iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if iv.len() != NONCE_LEN {
        return Err(CryptoError::AeadDecrypt);
    }
    let nonce = Nonce::from_slice(iv);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::AeadDecrypt)?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::AeadDecrypt)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [42u8; 32];
        let (iv, ct) = seal(&key, b"hello world").unwrap();
        let pt = open(&key, &iv, &ct).unwrap();
        assert_eq!(&pt[..], b"hello world");
    }

    #[test]
    fn nonces_are_fresh_per_call() {
        let key = [42u8; 32];
        let (iv1, ct1) = seal(&key, b"same message").unwrap();
        let (iv2, ct2) = seal(&key, b"same message").unwrap();
        assert_ne!(iv1, iv2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [42u8; 32];
        let (iv, mut ct) = seal(&key, b"hello").unwrap();
        ct[0] ^= 0x01;
        assert!(matches!(open(&key, &iv, &ct), Err(CryptoError::AeadDecrypt)));
    }

    #[test]
    fn wrong_key_fails() {
        let (iv, ct) = seal(&[1u8; 32], b"hello").unwrap();
        assert!(matches!(open(&[2u8; 32], &iv, &ct), Err(CryptoError::AeadDecrypt)));
    }

    #[test]
    fn wrong_nonce_length_fails() {
        let key = [42u8; 32];
        let (_, ct) = seal(&key, b"hello").unwrap();
        assert!(open(&key, &[0u8; 11], &ct).is_err());
        assert!(open(&key, &[0u8; 13], &ct).is_err());
    }
}
