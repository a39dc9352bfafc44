use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key exchange failed: {0}")]
    KeyExchange(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("No session key established")]
    NoSessionKey,

    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed (authentication tag mismatch or malformed input)")]
    AeadDecrypt,

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
