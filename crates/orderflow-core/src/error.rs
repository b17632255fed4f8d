//! Error types for orderflow.

use crate::ids::IdError;

/// Result type for orderflow core operations.
pub type Result<T> = std::result::Result<T, OrderError>;

/// Errors raised while decoding or interpreting an order event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    /// The wire record does not have the expected shape.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// The timestamp field could not be parsed as RFC 3339.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The raw timestamp text.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// The menu type is neither `washoku` nor `yoshoku`.
    #[error("invalid menu_type: {0}")]
    InvalidMenuType(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
