//! Transport-facing request and response types.

use airsync_codec::Element;
use airsync_protocol::Command;
use serde::{Deserialize, Serialize};

/// Credentials extracted by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Authenticating user.
    pub user: String,
    /// Authentication domain.
    #[serde(default)]
    pub domain: String,
    /// Password.
    #[serde(default)]
    pub password: String,
    /// Mailbox to open instead of the user's own.
    #[serde(default)]
    pub impersonate: Option<String>,
}

impl Credentials {
    /// Creates credentials for a user without a domain.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Mailbox the request acts on.
    pub fn mailbox(&self) -> &str {
        self.impersonate.as_deref().unwrap_or(&self.user)
    }
}

/// Query parameters relevant to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// `ItemId`: the parent message of SmartReply and SmartForward.
    pub item_id: Option<String>,
    /// `CollectionId`: the folder of the parent message.
    pub collection_id: Option<String>,
    /// `AttachmentName`: the attachment GetAttachment streams.
    pub attachment_name: Option<String>,
    /// `SaveInSent=T`.
    pub save_in_sent: bool,
    /// `AcceptMultiPart=T`.
    pub accept_multipart: bool,
}

/// Request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A tag-element stream.
    Elements(Vec<Element>),
    /// Plain bytes, e.g. an RFC 822 message for SendMail.
    Plain(Vec<u8>),
}

/// One inbound request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Command to run.
    pub command: Command,
    /// Device identity; all persisted state is keyed by it.
    pub device_id: String,
    /// Device type reported by the client.
    pub device_type: String,
    /// Credentials.
    pub credentials: Credentials,
    /// Protocol version, e.g. `"12.1"`.
    pub protocol_version: String,
    /// Policy key presented in the request headers.
    pub policy_key: Option<String>,
    /// Query parameters.
    pub query: QueryParams,
    /// Body.
    pub body: RequestBody,
}

impl Request {
    /// Creates a request with no body.
    pub fn new(command: Command, device_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            command,
            device_id: device_id.into(),
            device_type: String::new(),
            credentials,
            protocol_version: "12.1".to_string(),
            policy_key: None,
            query: QueryParams::default(),
            body: RequestBody::Empty,
        }
    }

    /// Sets a tag-element body.
    pub fn with_elements(mut self, elements: Vec<Element>) -> Self {
        self.body = RequestBody::Elements(elements);
        self
    }

    /// Sets a plain body.
    pub fn with_plain(mut self, data: Vec<u8>) -> Self {
        self.body = RequestBody::Plain(data);
        self
    }

    /// Sets the policy key header.
    pub fn with_policy_key(mut self, key: impl Into<String>) -> Self {
        self.policy_key = Some(key.into());
        self
    }

    /// Sets the protocol version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Sets the device type.
    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }

    /// Sets the query parameters.
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Returns the protocol version as a number, `2.5` if unparsable.
    pub fn version(&self) -> f32 {
        self.protocol_version.trim().parse().unwrap_or(2.5)
    }

    /// Returns true if the protocol version is at least `min`.
    pub fn version_at_least(&self, min: f32) -> bool {
        self.version() >= min
    }
}

/// Reply of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// No body; the transport answers 200 OK.
    Empty,
    /// A tag-element stream holding exactly one reply tree.
    Elements(Vec<Element>),
    /// Raw bytes, e.g. an attachment.
    Raw {
        /// MIME type of the data.
        content_type: String,
        /// The data.
        data: Vec<u8>,
    },
}

impl Response {
    /// Returns the reply elements, or an empty slice for other replies.
    pub fn elements(&self) -> &[Element] {
        match self {
            Response::Elements(elements) => elements,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parsing() {
        let request = Request::new(Command::Sync, "dev", Credentials::new("u", "p"));
        assert!(request.version_at_least(12.0));
        assert!(!request.version_at_least(14.0));
        let request = request.with_version("garbage");
        assert_eq!(request.version(), 2.5);
    }

    #[test]
    fn mailbox_honors_impersonation() {
        let mut credentials = Credentials::new("admin", "secret");
        assert_eq!(credentials.mailbox(), "admin");
        credentials.impersonate = Some("alice".into());
        assert_eq!(credentials.mailbox(), "alice");
    }
}
