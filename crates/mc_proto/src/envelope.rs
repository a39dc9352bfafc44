//! Message envelopes — the unit exchanged over a peer connection.
//!
//! Wire form is JSON with a `type` tag:
//!
//! ```json
//! { "type": "text", "timestamp": 1712000000000, "content": "hi" }
//! { "type": "keyExchange", "timestamp": 1712000000000,
//!   "data": { "publicKey": "b64url...", "timestamp": 1712000000000 } }
//! { "type": "encrypted", "timestamp": 1712000000000,
//!   "iv": [1, 2, ...], "ciphertext": [3, 4, ...] }
//! ```
//!
//! Only `keyExchange` may travel in the clear by design; every user-visible
//! kind is wrapped in an `encrypted` envelope before transmission and
//! unwrapped exactly once on receipt. Unknown fields in inbound JSON are
//! dropped during deserialisation, so a hostile payload cannot smuggle a
//! sender claim through this layer.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use mc_crypto::aead::NONCE_LEN;
use mc_crypto::AgreementPublicKey;

use crate::error::ProtoError;
use crate::media::{MediaAttachment, MediaKind};

/// Millisecond timestamp for outbound envelopes.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Payload of a `keyExchange` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangeData {
    pub public_key: AgreementPublicKey,
    /// When this side started its exchange; the earlier of the two ends'
    /// values salts the verification fingerprint.
    pub timestamp: i64,
}

/// On-wire envelope, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Envelope {
    /// Plain chat text. Always transmitted inside an `Encrypted` wrapper.
    Text { timestamp: i64, content: String },

    /// Protocol notice. Trusted only when generated locally; a remote
    /// system envelope is blocked with a security warning upstream.
    System { timestamp: i64, content: String },

    /// Public key material. The only kind that legitimately travels in
    /// the clear (it must: no shared secret exists yet).
    KeyExchange { timestamp: i64, data: KeyExchangeData },

    /// AES-256-GCM wrapper around the JSON bytes of any other kind.
    Encrypted {
        timestamp: i64,
        iv: Vec<u8>,
        ciphertext: Vec<u8>,
    },

    /// Inline image. Always transmitted inside an `Encrypted` wrapper.
    Image { timestamp: i64, data: MediaAttachment },

    /// Inline video. Always transmitted inside an `Encrypted` wrapper.
    Video { timestamp: i64, data: MediaAttachment },

    /// Inline generic file. Always transmitted inside an `Encrypted` wrapper.
    File { timestamp: i64, data: MediaAttachment },
}

impl Envelope {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            timestamp: now_millis(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            timestamp: now_millis(),
            content: content.into(),
        }
    }

    pub fn key_exchange(public_key: AgreementPublicKey, timestamp: i64) -> Self {
        Self::KeyExchange {
            timestamp,
            data: KeyExchangeData {
                public_key,
                timestamp,
            },
        }
    }

    pub fn encrypted(iv: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Self {
        Self::Encrypted {
            timestamp: now_millis(),
            iv: iv.to_vec(),
            ciphertext,
        }
    }

    /// Wrap a media attachment under the matching envelope kind.
    pub fn media(kind: MediaKind, data: MediaAttachment) -> Self {
        Self::media_at(kind, data, now_millis())
    }

    pub fn media_at(kind: MediaKind, data: MediaAttachment, timestamp: i64) -> Self {
        match kind {
            MediaKind::Image => Self::Image { timestamp, data },
            MediaKind::Video => Self::Video { timestamp, data },
            MediaKind::File => Self::File { timestamp, data },
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Text { timestamp, .. }
            | Self::System { timestamp, .. }
            | Self::KeyExchange { timestamp, .. }
            | Self::Encrypted { timestamp, .. }
            | Self::Image { timestamp, .. }
            | Self::Video { timestamp, .. }
            | Self::File { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_key_exchange(&self) -> bool {
        matches!(self, Self::KeyExchange { .. })
    }
}

/// Result of decoding raw inbound bytes.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A structured envelope.
    Envelope(Envelope),
    /// Bare unstructured text from a pre-envelope client. Callers display
    /// it as-is and relay it re-encoded in the structured form.
    LegacyText(String),
}

/// Serialise an envelope to wire bytes.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, ProtoError> {
    Ok(serde_json::to_vec(envelope)?)
}

/// First decode step, applied to raw transport bytes.
///
/// Valid JSON that matches no known envelope kind is an error (the caller
/// drops it); only non-JSON text falls back to `LegacyText`. Anything that
/// is not UTF-8 is rejected outright.
pub fn decode(bytes: &[u8]) -> Result<Inbound, ProtoError> {
    if let Ok(envelope) = serde_json::from_slice::<Envelope>(bytes) {
        return Ok(Inbound::Envelope(envelope));
    }
    let text = std::str::from_utf8(bytes).map_err(|_| ProtoError::InvalidUtf8)?;
    if serde_json::from_str::<serde_json::Value>(text).is_ok() {
        return Err(ProtoError::UnknownEnvelope);
    }
    Ok(Inbound::LegacyText(text.to_string()))
}

/// Second decode step, applied to a decrypted payload.
///
/// Unwrap depth is bounded at exactly one: an encrypted envelope inside an
/// encrypted envelope is an error, never decrypted again. Plain UTF-8 that
/// is not a structured envelope gets the same bare-text fallback as the
/// outer layer.
pub fn decode_plaintext(bytes: &[u8]) -> Result<Envelope, ProtoError> {
    match decode(bytes)? {
        Inbound::Envelope(Envelope::Encrypted { .. }) => Err(ProtoError::NestedEncryption),
        Inbound::Envelope(envelope) => Ok(envelope),
        Inbound::LegacyText(text) => Ok(Envelope::text(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_crypto::AgreementKeyPair;

    fn decode_envelope(bytes: &[u8]) -> Envelope {
        match decode(bytes).unwrap() {
            Inbound::Envelope(e) => e,
            Inbound::LegacyText(t) => panic!("expected envelope, got legacy text {t:?}"),
        }
    }

    #[test]
    fn wire_tags_are_camel_case() {
        let json = String::from_utf8(encode(&Envelope::text("hi")).unwrap()).unwrap();
        assert!(json.contains("\"type\":\"text\""), "{json}");

        let kp = AgreementKeyPair::generate();
        let json = String::from_utf8(
            encode(&Envelope::key_exchange(kp.public().clone(), 7)).unwrap(),
        )
        .unwrap();
        assert!(json.contains("\"type\":\"keyExchange\""), "{json}");
        assert!(json.contains("\"publicKey\""), "{json}");

        let json = String::from_utf8(encode(&Envelope::encrypted([0u8; 12], vec![1])).unwrap())
            .unwrap();
        assert!(json.contains("\"type\":\"encrypted\""), "{json}");
        assert!(json.contains("\"iv\""), "{json}");
        assert!(json.contains("\"ciphertext\""), "{json}");
    }

    #[test]
    fn text_envelope_roundtrip() {
        let bytes = encode(&Envelope::text("hello")).unwrap();
        match decode_envelope(&bytes) {
            Envelope::Text { content, .. } => assert_eq!(content, "hello"),
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn key_exchange_roundtrip_preserves_the_key() {
        let kp = AgreementKeyPair::generate();
        let bytes = encode(&Envelope::key_exchange(kp.public().clone(), 42)).unwrap();
        match decode_envelope(&bytes) {
            Envelope::KeyExchange { data, timestamp } => {
                assert_eq!(timestamp, 42);
                assert_eq!(data.timestamp, 42);
                assert_eq!(&data.public_key, kp.public());
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn encrypted_fields_survive_the_wire() {
        let bytes = encode(&Envelope::encrypted([9u8; 12], vec![1, 2, 3])).unwrap();
        match decode_envelope(&bytes) {
            Envelope::Encrypted { iv, ciphertext, .. } => {
                assert_eq!(iv, vec![9u8; 12]);
                assert_eq!(ciphertext, vec![1, 2, 3]);
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn foreign_sender_fields_are_dropped() {
        // A hostile payload may stamp any identity claim it likes; the
        // decoded envelope has no field to carry it.
        let bytes = br#"{"type":"text","timestamp":1,"content":"hi","senderId":"mallory","senderName":"Mallory"}"#;
        match decode_envelope(bytes) {
            Envelope::Text { content, .. } => assert_eq!(content, "hi"),
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_an_error_not_legacy_text() {
        let bytes = br#"{"type":"selfDestruct","timestamp":1}"#;
        assert!(matches!(decode(bytes), Err(ProtoError::UnknownEnvelope)));

        // Valid JSON without a tag at all gets the same treatment.
        assert!(matches!(decode(b"42"), Err(ProtoError::UnknownEnvelope)));
        assert!(matches!(decode(b"\"hi\""), Err(ProtoError::UnknownEnvelope)));
    }

    #[test]
    fn non_json_text_falls_back_to_legacy() {
        match decode(b"plain old chat line").unwrap() {
            Inbound::LegacyText(t) => assert_eq!(t, "plain old chat line"),
            other => panic!("expected legacy text, got {other:?}"),
        }
    }

    #[test]
    fn non_utf8_is_rejected() {
        assert!(matches!(decode(&[0xff, 0xfe, 0x01]), Err(ProtoError::InvalidUtf8)));
    }

    #[test]
    fn decrypted_payload_unwraps_exactly_once() {
        let inner = encode(&Envelope::text("deep")).unwrap();
        assert!(matches!(
            decode_plaintext(&inner),
            Ok(Envelope::Text { .. })
        ));

        let nested = encode(&Envelope::encrypted([0u8; 12], vec![1, 2])).unwrap();
        assert!(matches!(
            decode_plaintext(&nested),
            Err(ProtoError::NestedEncryption)
        ));
    }

    #[test]
    fn decrypted_bare_text_becomes_a_text_envelope() {
        match decode_plaintext(b"just words").unwrap() {
            Envelope::Text { content, .. } => assert_eq!(content, "just words"),
            other => panic!("wrong kind: {other:?}"),
        }
    }
}
