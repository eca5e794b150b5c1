//! Error types for the engine.

use airsync_codec::CodecError;
use airsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while processing a request.
///
/// Parse errors and the request-level conditions abort the whole request
/// and surface as an HTTP status. Key, hierarchy and status conditions
/// are caught by the handlers and written into the reply instead.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The presented sync key is unknown or stale.
    #[error("invalid sync key: {key}")]
    KeyInvalid {
        /// The presented key.
        key: String,
    },

    /// No importer or exporter is available for a collection.
    #[error("folder hierarchy changed: {0}")]
    HierarchyChanged(String),

    /// A backend operation failed with a command-specific status code.
    #[error("status {code}: {message}")]
    Status {
        /// Status code, in the namespace of the running command.
        code: u16,
        /// Description of the failure.
        message: String,
    },

    /// The request is not authenticated.
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// The device must complete the policy handshake first.
    #[error("provisioning required")]
    ProvisioningRequired,

    /// The command is not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Unrecoverable failure.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Malformed request tree.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A request value outside the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl EngineError {
    /// Creates a status condition.
    pub fn status(code: impl Into<u16>, message: impl Into<String>) -> Self {
        Self::Status {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a key-invalid condition.
    pub fn key_invalid(key: impl Into<String>) -> Self {
        Self::KeyInvalid { key: key.into() }
    }

    /// Returns the status code carried by a status condition.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            EngineError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true for conditions a handler turns into a reply status.
    pub fn is_reply_status(&self) -> bool {
        matches!(
            self,
            EngineError::KeyInvalid { .. }
                | EngineError::HierarchyChanged(_)
                | EngineError::Status { .. }
        )
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::AuthenticationRequired(_)
                | EngineError::ProvisioningRequired
                | EngineError::Codec(_)
                | EngineError::Protocol(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// HTTP status the transport should answer with when this error
    /// aborts a request.
    pub fn http_status(&self) -> u16 {
        match self {
            EngineError::Codec(_) | EngineError::Protocol(_) => 400,
            EngineError::AuthenticationRequired(_) => 401,
            EngineError::ProvisioningRequired => 449,
            EngineError::NotImplemented(_) => 501,
            EngineError::KeyInvalid { .. }
            | EngineError::HierarchyChanged(_)
            | EngineError::Status { .. }
            | EngineError::Fatal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(EngineError::ProvisioningRequired.is_client_error());
        assert!(EngineError::Fatal("oops".into()).is_server_error());
        assert!(!EngineError::AuthenticationRequired("bad".into()).is_server_error());
        assert!(EngineError::key_invalid("{x}1").is_reply_status());
        assert!(!EngineError::NotImplemented("ValidateCert".into()).is_reply_status());
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(EngineError::Codec(CodecError::UnexpectedEof).http_status(), 400);
        assert_eq!(EngineError::AuthenticationRequired("x".into()).http_status(), 401);
        assert_eq!(EngineError::ProvisioningRequired.http_status(), 449);
        assert_eq!(EngineError::NotImplemented("x".into()).http_status(), 501);
        assert_eq!(EngineError::status(5u16, "x").http_status(), 500);
    }

    #[test]
    fn status_code_is_carried() {
        let err = EngineError::status(8u16, "missing");
        assert_eq!(err.status_code(), Some(8));
        assert!(err.to_string().contains("missing"));
        assert_eq!(EngineError::ProvisioningRequired.status_code(), None);
    }
}
