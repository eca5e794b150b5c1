//! The data-store contract.
//!
//! The engine never touches mailbox data directly. Everything it needs
//! from the store goes through [`Backend`]: logon, the folder hierarchy,
//! per-folder importers and exporters, single-item fetches, mail
//! submission, meeting responses, settings, attachments and directory
//! search.

mod memory;
pub mod mime;

pub use memory::MemoryBackend;

use crate::error::EngineResult;
use crate::exchange::{Exporter, HierarchyImporter, Importer};
use crate::request::Credentials;
use airsync_protocol::{ContentParameters, FolderEntry, SettingsStatus, SyncItem};

/// How a submitted message relates to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeKind {
    /// A new message.
    New,
    /// A forward of the parent item.
    Forward,
    /// A reply to the parent item.
    Reply,
}

/// The item a forward or reply refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentItem {
    /// Folder holding the item.
    pub folder_id: Option<String>,
    /// Server id of the item.
    pub item_id: String,
}

/// A message submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// The RFC 822 message.
    pub rfc822: Vec<u8>,
    /// New, forward or reply.
    pub kind: ComposeKind,
    /// Referenced item for forwards and replies.
    pub parent: Option<ParentItem>,
    /// Store a copy in the sent folder.
    pub save_in_sent: bool,
    /// The client sent the complete message, including the parent content.
    pub replace_mime: bool,
    /// Client correlation id.
    pub client_id: Option<String>,
}

/// A user's answer to a meeting request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingReply {
    /// Accepted.
    Accepted = 1,
    /// Tentatively accepted.
    Tentative = 2,
    /// Declined.
    Declined = 3,
}

impl MeetingReply {
    /// Converts from the wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Accepted),
            2 => Some(Self::Tentative),
            3 => Some(Self::Declined),
            _ => None,
        }
    }
}

/// Audience of an out-of-office message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OofAudience {
    /// Senders inside the organization.
    Internal,
    /// Known external senders.
    ExternalKnown,
    /// Unknown external senders.
    ExternalUnknown,
}

/// One out-of-office message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OofMessage {
    /// Who gets it.
    pub audience: OofAudience,
    /// Whether it is sent.
    pub enabled: bool,
    /// The text.
    pub reply_message: String,
    /// Body type, `"TEXT"` or `"HTML"`.
    pub body_type: String,
}

/// Out-of-office settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OofSettings {
    /// 0 disabled, 1 global, 2 time based.
    pub state: u8,
    /// Start of a time-based window.
    pub start_time: Option<String>,
    /// End of a time-based window.
    pub end_time: Option<String>,
    /// Messages per audience.
    pub messages: Vec<OofMessage>,
}

/// Device information reported by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInformation {
    /// Model.
    pub model: Option<String>,
    /// IMEI.
    pub imei: Option<String>,
    /// Friendly name.
    pub friendly_name: Option<String>,
    /// Operating system.
    pub os: Option<String>,
    /// Operating system language.
    pub os_language: Option<String>,
    /// Phone number.
    pub phone_number: Option<String>,
}

/// One Settings property operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsRequest {
    /// Read the out-of-office settings.
    OofGet {
        /// Requested body type.
        body_type: Option<String>,
    },
    /// Replace the out-of-office settings.
    OofSet(OofSettings),
    /// Set the device password.
    DevicePassword(String),
    /// Record device information.
    DeviceInformation(DeviceInformation),
    /// Read the user's addresses.
    UserInformation,
}

/// Reply of a Settings property operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsReply {
    /// Status of the operation.
    pub status: SettingsStatus,
    /// Out-of-office settings, for [`SettingsRequest::OofGet`].
    pub oof: Option<OofSettings>,
    /// Addresses, for [`SettingsRequest::UserInformation`].
    pub email_addresses: Vec<String>,
}

impl SettingsReply {
    /// A reply carrying only a status.
    pub fn status(status: SettingsStatus) -> Self {
        Self {
            status,
            oof: None,
            email_addresses: Vec::new(),
        }
    }
}

/// Attachment contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// MIME type.
    pub content_type: String,
    /// Bytes.
    pub data: Vec<u8>,
}

/// One directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalEntry {
    /// Display name.
    pub display_name: Option<String>,
    /// Work phone.
    pub phone: Option<String>,
    /// Office.
    pub office: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Company.
    pub company: Option<String>,
    /// Alias.
    pub alias: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Home phone.
    pub home_phone: Option<String>,
    /// Mobile phone.
    pub mobile_phone: Option<String>,
    /// Mail address.
    pub email_address: Option<String>,
}

/// A page of directory search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalResults {
    /// Entries in the requested range.
    pub entries: Vec<GalEntry>,
    /// The range actually returned, inclusive.
    pub range: (usize, usize),
    /// Number of matches overall.
    pub total: usize,
}

/// The data store behind the engine.
///
/// Methods returning `Option` use `None` for "not available" (no such
/// folder, item or store); failures carrying a status surface as
/// [`EngineError::Status`](crate::EngineError::Status).
pub trait Backend: Send + Sync {
    /// Verifies the credentials of the authenticating user.
    fn logon(&self, credentials: &Credentials) -> EngineResult<bool>;

    /// Opens the mailbox for the request, checking the authenticated
    /// user may act on it.
    fn setup(&self, mailbox: &str, device_id: &str, version: &str) -> EngineResult<bool>;

    /// Full folder hierarchy.
    fn hierarchy(&self) -> EngineResult<Vec<FolderEntry>>;

    /// Importer for the items of a folder.
    fn importer(&self, folder_id: &str) -> EngineResult<Option<Box<dyn Importer + '_>>>;

    /// Importer for the hierarchy.
    fn hierarchy_importer(&self) -> EngineResult<Box<dyn HierarchyImporter + '_>>;

    /// Exporter for the items of a folder.
    fn exporter(&self, folder_id: &str) -> EngineResult<Option<Box<dyn Exporter<SyncItem> + '_>>>;

    /// Exporter for the hierarchy.
    fn hierarchy_exporter(&self) -> EngineResult<Box<dyn Exporter<FolderEntry> + '_>>;

    /// Loads one item.
    fn fetch(
        &self,
        folder_id: &str,
        server_id: &str,
        params: &ContentParameters,
    ) -> EngineResult<Option<SyncItem>>;

    /// Submits a message.
    fn send_mail(&self, mail: &OutgoingMail) -> EngineResult<()>;

    /// Folder deleted items are moved to.
    fn waste_basket(&self) -> EngineResult<Option<String>>;

    /// Answers a meeting request; returns the id of the calendar item.
    fn meeting_response(
        &self,
        request_id: &str,
        folder_id: &str,
        reply: MeetingReply,
    ) -> EngineResult<Option<String>>;

    /// Runs one Settings property operation.
    fn settings(&self, request: &SettingsRequest) -> EngineResult<SettingsReply>;

    /// Loads an attachment by name.
    fn attachment_data(&self, name: &str) -> EngineResult<Option<Attachment>>;

    /// Returns true if a search store is supported.
    fn supports_search(&self, store: &str) -> bool {
        store.eq_ignore_ascii_case("GAL")
    }

    /// Searches the directory, returning the entries in `range`.
    fn search_gal(&self, query: &str, range: (usize, usize)) -> EngineResult<GalResults>;

    /// Returns true if an item may be sent to the client.
    fn is_streamable(&self, _server_id: &str, _item: &SyncItem) -> bool {
        true
    }
}
