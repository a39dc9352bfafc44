use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("Serialisation error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON payload is not a known envelope kind")]
    UnknownEnvelope,

    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Encrypted envelope nested inside an encrypted envelope")]
    NestedEncryption,
}
