//! mc_crypto — Meshchat cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - Public APIs return opaque newtypes to prevent accidental misuse.
//!
//! # Module layout
//! - `agreement`   — per-session X25519 keypair + shared-key derivation
//! - `session_key` — derived 32-byte session secret + verification fingerprint
//! - `channel`     — AES-256-GCM secure channel bound to a session key
//! - `aead`        — AES-256-GCM seal/open helpers
//! - `kdf`         — HKDF-SHA256 key derivation
//! - `error`       — unified error type

pub mod aead;
pub mod agreement;
pub mod channel;
pub mod error;
pub mod kdf;
pub mod session_key;

pub use agreement::{AgreementKeyPair, AgreementPublicKey};
pub use channel::SecureChannel;
pub use error::CryptoError;
pub use session_key::SessionKey;
