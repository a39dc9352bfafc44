//! Ephemeral key agreement
//!
//! Each chat session gets one fresh X25519 keypair. The public half travels
//! in a key-exchange envelope; the secret half never leaves this module.
//! The raw DH output is bound through HKDF-SHA256 (see `kdf`) before it is
//! used as a cipher key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::{error::CryptoError, kdf, session_key::SessionKey};

// ── Public key ────────────────────────────────────────────────────────────────

/// 32-byte X25519 public key, base64url-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreementPublicKey([u8; 32]);

impl AgreementPublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s)?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "Public key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    /// First 16 hex chars of the raw key, for chat notices.
    pub fn short_hex(&self) -> String {
        hex::encode(self.0).chars().take(16).collect()
    }
}

impl Serialize for AgreementPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_b64())
    }
}

impl<'de> Deserialize<'de> for AgreementPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_b64(&s).map_err(serde::de::Error::custom)
    }
}

// ── Keypair ───────────────────────────────────────────────────────────────────

/// Ephemeral agreement keypair for one chat session.
///
/// Backed by `StaticSecret` rather than `EphemeralSecret` because one local
/// keypair derives against every peer that joins the room. `StaticSecret`
/// zeroizes itself on drop.
pub struct AgreementKeyPair {
    public: AgreementPublicKey,
    secret: StaticSecret,
}

impl AgreementKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = AgreementPublicKey(*X25519Public::from(&secret).as_bytes());
        Self { public, secret }
    }

    pub fn public(&self) -> &AgreementPublicKey {
        &self.public
    }

    /// Compute the shared session key against a peer's public key.
    ///
    /// Both directions of a valid exchange derive the same key. A degenerate
    /// peer key producing an all-zero DH output is rejected.
    pub fn derive_session_key(
        &self,
        peer: &AgreementPublicKey,
    ) -> Result<SessionKey, CryptoError> {
        let shared = self.secret.diffie_hellman(&X25519Public::from(peer.0));
        if !shared.was_contributory() {
            return Err(CryptoError::KeyExchange(
                "degenerate peer public key".into(),
            ));
        }
        kdf::session_key_from_dh(shared.as_bytes())
    }
}
