//! Error types for protocol values.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised when a request carries a value outside the protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A field carried a value that cannot be interpreted.
    #[error("invalid {field}: {value:?}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// The command name is not part of the protocol.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl ProtocolError {
    /// Create an invalid value error.
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }
}
