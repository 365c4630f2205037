use thiserror::Error;

/// Errors shared across crates that don't warrant their own error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("record too short: got {got} bytes, need at least {need}")]
    RecordTooShort { got: usize, need: usize },

    #[error("unknown event kind tag {0}")]
    UnknownEventKind(u8),
}
