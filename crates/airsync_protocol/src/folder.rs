//! Folder hierarchy entries.

use crate::content::ContentClass;
use crate::error::{ProtocolError, ProtocolResult};
use crate::tags::folder;
use airsync_codec::{CodecError, CodecResult, TagDecoder, TagEncoder};
use serde::{Deserialize, Serialize};

/// Folder type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum FolderType {
    Generic = 1,
    Inbox = 2,
    Drafts = 3,
    WasteBasket = 4,
    SentMail = 5,
    Outbox = 6,
    Tasks = 7,
    Calendar = 8,
    Contacts = 9,
    Notes = 10,
    Journal = 11,
    UserMail = 12,
    UserCalendar = 13,
    UserContacts = 14,
    UserTasks = 15,
    UserJournal = 16,
    UserNotes = 17,
    Unknown = 18,
    RecipientCache = 19,
}

impl FolderType {
    /// Numeric wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Converts from a numeric wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        use FolderType::*;
        Some(match code {
            1 => Generic,
            2 => Inbox,
            3 => Drafts,
            4 => WasteBasket,
            5 => SentMail,
            6 => Outbox,
            7 => Tasks,
            8 => Calendar,
            9 => Contacts,
            10 => Notes,
            11 => Journal,
            12 => UserMail,
            13 => UserCalendar,
            14 => UserContacts,
            15 => UserTasks,
            16 => UserJournal,
            17 => UserNotes,
            18 => Unknown,
            19 => RecipientCache,
            _ => return None,
        })
    }

    /// Content class of folders of this type, `None` for types no
    /// collection can be synchronized for.
    pub fn class(self) -> Option<ContentClass> {
        use FolderType::*;
        match self {
            Generic | Inbox | Drafts | WasteBasket | SentMail | Outbox | UserMail => {
                Some(ContentClass::Email)
            }
            Tasks | UserTasks => Some(ContentClass::Tasks),
            Calendar | UserCalendar => Some(ContentClass::Calendar),
            Contacts | UserContacts | RecipientCache => Some(ContentClass::Contacts),
            Notes | UserNotes => Some(ContentClass::Notes),
            Journal | UserJournal | Unknown => None,
        }
    }

    /// Returns true for the folders every mailbox has.
    pub fn is_system(self) -> bool {
        !matches!(
            self,
            FolderType::Generic
                | FolderType::UserMail
                | FolderType::UserCalendar
                | FolderType::UserContacts
                | FolderType::UserTasks
                | FolderType::UserJournal
                | FolderType::UserNotes
        )
    }
}

/// One folder of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Server id of the folder.
    pub server_id: String,
    /// Server id of the parent, `"0"` for top-level folders.
    pub parent_id: String,
    /// Name shown to the user.
    pub display_name: String,
    /// Folder type.
    pub folder_type: FolderType,
}

impl FolderEntry {
    /// Creates a folder entry.
    pub fn new(
        server_id: impl Into<String>,
        parent_id: impl Into<String>,
        display_name: impl Into<String>,
        folder_type: FolderType,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            parent_id: parent_id.into(),
            display_name: display_name.into(),
            folder_type,
        }
    }

    /// Content class of the folder.
    pub fn class(&self) -> Option<ContentClass> {
        self.folder_type.class()
    }

    /// Reads the fields of an Add or Update child, leaving its end tag.
    pub fn decode(dec: &mut TagDecoder) -> CodecResult<Self> {
        let mut server_id = None;
        let mut parent_id = None;
        let mut display_name = None;
        let mut folder_type = None;
        while !dec.at_end_tag() {
            if let Some(v) = dec.leaf(folder::SERVER_ID)? {
                server_id = Some(v);
            } else if let Some(v) = dec.leaf(folder::PARENT_ID)? {
                parent_id = Some(v);
            } else if let Some(v) = dec.leaf(folder::DISPLAY_NAME)? {
                display_name = Some(v);
            } else if let Some(v) = dec.leaf(folder::TYPE)? {
                folder_type = Some(parse_folder_type(&v).map_err(|e| CodecError::malformed(e.to_string()))?);
            } else {
                dec.skip_element()?;
            }
        }
        Ok(Self {
            server_id: server_id.ok_or_else(|| CodecError::malformed("folder without server id"))?,
            parent_id: parent_id.unwrap_or_else(|| "0".to_string()),
            display_name: display_name.unwrap_or_default(),
            folder_type: folder_type.unwrap_or(FolderType::Generic),
        })
    }

    /// Writes the folder fields.
    pub fn encode(&self, enc: &mut TagEncoder) -> CodecResult<()> {
        enc.leaf(folder::SERVER_ID, &self.server_id)?;
        enc.leaf(folder::PARENT_ID, &self.parent_id)?;
        enc.leaf(folder::DISPLAY_NAME, &self.display_name)?;
        enc.leaf(folder::TYPE, self.folder_type.code())
    }
}

/// Parses a folder type code.
pub fn parse_folder_type(value: &str) -> ProtocolResult<FolderType> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(FolderType::from_code)
        .ok_or_else(|| ProtocolError::invalid("folder type", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_mapping() {
        assert_eq!(FolderType::Inbox.class(), Some(ContentClass::Email));
        assert_eq!(FolderType::UserCalendar.class(), Some(ContentClass::Calendar));
        assert_eq!(FolderType::Journal.class(), None);
        assert!(FolderType::Inbox.is_system());
        assert!(!FolderType::UserMail.is_system());
    }

    #[test]
    fn decode_defaults_and_skips_unknown() {
        let mut enc = TagEncoder::new();
        enc.start_tag(folder::ADD);
        enc.leaf(folder::DISPLAY_NAME, "Work").unwrap();
        enc.leaf(folder::COUNT, 3).unwrap();
        enc.leaf(folder::SERVER_ID, "f9").unwrap();
        enc.end_tag().unwrap();

        let mut dec = TagDecoder::new(enc.into_elements().unwrap());
        dec.expect_start(folder::ADD).unwrap();
        let entry = FolderEntry::decode(&mut dec).unwrap();
        dec.end_tag().unwrap();

        assert_eq!(entry, FolderEntry::new("f9", "0", "Work", FolderType::Generic));
    }

    #[test]
    fn missing_server_id_is_malformed() {
        let mut enc = TagEncoder::new();
        enc.start_tag(folder::ADD);
        enc.leaf(folder::TYPE, 12).unwrap();
        enc.end_tag().unwrap();

        let mut dec = TagDecoder::new(enc.into_elements().unwrap());
        dec.expect_start(folder::ADD).unwrap();
        assert!(FolderEntry::decode(&mut dec).is_err());
    }

    #[test]
    fn folder_type_parse() {
        assert_eq!(parse_folder_type("2").unwrap(), FolderType::Inbox);
        assert!(parse_folder_type("20").is_err());
    }
}
