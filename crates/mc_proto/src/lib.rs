//! mc_proto — Wire envelopes and media framing for Meshchat
//!
//! All on-wire types are serialised to JSON. The envelope kind set is
//! CLOSED: adding a kind is a source change, and inbound JSON that matches
//! no known kind is rejected rather than partially interpreted. Envelopes
//! deliberately carry no sender identity; the receiving side attributes
//! every message to the transport-verified peer id of the connection it
//! arrived on.
//!
//! # Modules
//! - `envelope` — envelope sum type + two-step decode (raw wire, then decrypted payload)
//! - `media`    — inline media attachments and MIME classification
//! - `error`    — decode/encode error type

pub mod envelope;
pub mod error;
pub mod media;

pub use envelope::{decode, decode_plaintext, encode, now_millis, Envelope, Inbound, KeyExchangeData};
pub use error::ProtoError;
pub use media::{MediaAttachment, MediaError, MediaKind};
