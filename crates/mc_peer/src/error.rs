use thiserror::Error;

/// Error crossing the crypto/proto seam while wrapping or unwrapping an
/// encrypted envelope. Never fatal: the payload is dropped (with a decrypt
/// notice on the inbound side) and the session continues.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] mc_crypto::CryptoError),

    #[error("Protocol error: {0}")]
    Proto(#[from] mc_proto::ProtoError),
}
