use thiserror::Error;

/// Errors produced by type construction, parsing, and payload validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid base token {token:?}: {reason}")]
    InvalidBase { token: String, reason: String },

    #[error("invalid display id {input:?}: {reason}")]
    InvalidDisplayId { input: String, reason: String },

    #[error("group {0} is outside 1..=99")]
    GroupOutOfRange(u32),

    #[error("sub-number {0} is outside 1..=999")]
    SubOutOfRange(u32),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("payload validation failed for {module}: {reason}")]
    Validation { module: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
