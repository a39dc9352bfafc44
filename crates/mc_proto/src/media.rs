//! Inline media attachments.
//!
//! A shared file travels whole, inside a single envelope, as a base64 data
//! URL stamped with the original byte size and classified by MIME prefix.
//! There is no chunking: a file either fits under the configured ceiling or
//! the send fails before anything is transmitted.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("File too large for inline transfer: {size_bytes} bytes (limit {limit_bytes})")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("Malformed data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

/// Coarse content kind, decided by the declared MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Image,
    Video,
    File,
}

impl MediaKind {
    /// `image/*` and `video/*` are rendered inline; everything else is a
    /// downloadable file.
    pub fn classify(mime_type: &str) -> Self {
        let mime = mime_type.to_ascii_lowercase();
        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else {
            Self::File
        }
    }
}

/// Inline representation of one shared file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAttachment {
    pub filename: String,
    pub mime_type: String,
    /// Size of the original file, not of the base64 form.
    pub size_bytes: u64,
    /// `data:<mime>;base64,<payload>`, renderable directly by a browser view.
    pub inline_data: String,
}

impl MediaAttachment {
    /// Encode raw file bytes for transport.
    pub fn from_bytes(
        filename: &str,
        mime_type: &str,
        bytes: &[u8],
        limit_bytes: u64,
    ) -> Result<Self, MediaError> {
        let size_bytes = bytes.len() as u64;
        if size_bytes > limit_bytes {
            return Err(MediaError::TooLarge {
                size_bytes,
                limit_bytes,
            });
        }
        let inline_data = format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes));
        Ok(Self {
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes,
            inline_data,
        })
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::classify(&self.mime_type)
    }

    /// Recover the raw bytes from the data URL (save-to-disk path).
    pub fn decode_bytes(&self) -> Result<Vec<u8>, MediaError> {
        let rest = self
            .inline_data
            .strip_prefix("data:")
            .ok_or_else(|| MediaError::InvalidDataUrl("missing data: prefix".into()))?;
        let (_, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| MediaError::InvalidDataUrl("missing base64 marker".into()))?;
        Ok(STANDARD.decode(payload)?)
    }
}
