//! Error types for the codec crate.

use crate::element::Tag;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while walking or writing a tag stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A specific start tag was required but something else was found.
    #[error("expected start tag {expected}, found {found}")]
    UnexpectedElement {
        /// The tag the grammar required.
        expected: Tag,
        /// Description of the element actually present.
        found: String,
    },

    /// An end tag was required but something else was found.
    #[error("expected end tag, found {found}")]
    ExpectedEndTag {
        /// Description of the element actually present.
        found: String,
    },

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The writer was asked to close a tag with none open.
    #[error("end tag written with no open element")]
    UnbalancedEnd,

    /// The written stream is not a single closed tree.
    #[error("malformed output tree: {message}")]
    MalformedTree {
        /// Description of the structural error.
        message: String,
    },

    /// Failed to frame an element stream.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to unframe an element stream.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// The framed stream exceeds the element limit.
    #[error("element stream too large: {count} elements")]
    TooManyElements {
        /// Number of elements found.
        count: usize,
    },
}

impl CodecError {
    /// Create an unexpected element error.
    pub fn unexpected(expected: Tag, found: impl Into<String>) -> Self {
        Self::UnexpectedElement {
            expected,
            found: found.into(),
        }
    }

    /// Create an expected end tag error.
    pub fn expected_end(found: impl Into<String>) -> Self {
        Self::ExpectedEndTag {
            found: found.into(),
        }
    }

    /// Create a malformed tree error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedTree {
            message: message.into(),
        }
    }

    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}
