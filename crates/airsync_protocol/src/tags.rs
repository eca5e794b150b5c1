//! Tag constants, one module per code page.

use airsync_codec::Tag;

/// Code page numbers.
pub mod page {
    /// AirSync (Sync command).
    pub const AIRSYNC: u8 = 0;
    /// Contacts.
    pub const CONTACTS: u8 = 1;
    /// Email.
    pub const EMAIL: u8 = 2;
    /// AirNotify.
    pub const AIRNOTIFY: u8 = 3;
    /// Calendar.
    pub const CALENDAR: u8 = 4;
    /// MoveItems.
    pub const MOVE: u8 = 5;
    /// GetItemEstimate.
    pub const ITEM_ESTIMATE: u8 = 6;
    /// FolderHierarchy.
    pub const FOLDER_HIERARCHY: u8 = 7;
    /// MeetingResponse.
    pub const MEETING_RESPONSE: u8 = 8;
    /// Tasks.
    pub const TASKS: u8 = 9;
    /// Ping.
    pub const PING: u8 = 13;
    /// Provision.
    pub const PROVISION: u8 = 14;
    /// Search.
    pub const SEARCH: u8 = 15;
    /// Global address list.
    pub const GAL: u8 = 16;
    /// AirSyncBase.
    pub const AIRSYNC_BASE: u8 = 17;
    /// Settings.
    pub const SETTINGS: u8 = 18;
    /// ItemOperations.
    pub const ITEM_OPERATIONS: u8 = 20;
    /// ComposeMail.
    pub const COMPOSE_MAIL: u8 = 21;
    /// Notes.
    pub const NOTES: u8 = 23;
}

macro_rules! tags {
    ($page:expr; $($(#[$doc:meta])* $name:ident = $token:expr),* $(,)?) => {
        $(
            $(#[$doc])*
            pub const $name: Tag = Tag::new($page, $token);
        )*
    };
}

/// AirSync code page.
#[allow(missing_docs)]
pub mod airsync {
    use super::*;
    tags! { page::AIRSYNC;
        SYNC = 0x05, REPLIES = 0x06, ADD = 0x07, CHANGE = 0x08, DELETE = 0x09,
        FETCH = 0x0a, SYNC_KEY = 0x0b, CLIENT_ID = 0x0c, SERVER_ID = 0x0d,
        STATUS = 0x0e, COLLECTION = 0x0f, CLASS = 0x10, VERSION = 0x11,
        COLLECTION_ID = 0x12, GET_CHANGES = 0x13, MORE_AVAILABLE = 0x14,
        WINDOW_SIZE = 0x15, COMMANDS = 0x16, OPTIONS = 0x17, FILTER_TYPE = 0x18,
        TRUNCATION = 0x19, RTF_TRUNCATION = 0x1a, CONFLICT = 0x1b,
        COLLECTIONS = 0x1c, APPLICATION_DATA = 0x1d, DELETES_AS_MOVES = 0x1e,
        SUPPORTED = 0x20, MIME_SUPPORT = 0x22, MIME_TRUNCATION = 0x23,
        WAIT = 0x24, LIMIT = 0x25, PARTIAL = 0x26, CONVERSATION_MODE = 0x27,
        MAX_ITEMS = 0x28, HEARTBEAT_INTERVAL = 0x29,
    }
}

/// Email code page.
#[allow(missing_docs)]
pub mod email {
    use super::*;
    tags! { page::EMAIL;
        BODY = 0x0c, DATE_RECEIVED = 0x0f, DISPLAY_TO = 0x11, IMPORTANCE = 0x12,
        MESSAGE_CLASS = 0x13, SUBJECT = 0x14, READ = 0x15, TO = 0x16, CC = 0x17,
        FROM = 0x18, REPLY_TO = 0x19,
    }
}

/// Calendar code page.
#[allow(missing_docs)]
pub mod calendar {
    use super::*;
    tags! { page::CALENDAR;
        END_TIME = 0x12, LOCATION = 0x17, START_TIME = 0x27, SUBJECT = 0x26, UID = 0x28,
    }
}

/// Contacts code page.
#[allow(missing_docs)]
pub mod contacts {
    use super::*;
    tags! { page::CONTACTS;
        EMAIL1_ADDRESS = 0x1b, FILE_AS = 0x1e, FIRST_NAME = 0x1f, LAST_NAME = 0x29,
    }
}

/// Tasks code page.
#[allow(missing_docs)]
pub mod tasks {
    use super::*;
    tags! { page::TASKS;
        COMPLETE = 0x0b, DUE_DATE = 0x0d, SUBJECT = 0x1b,
    }
}

/// AirNotify code page.
#[allow(missing_docs)]
pub mod airnotify {
    use super::*;
    tags! { page::AIRNOTIFY;
        NOTIFY = 0x05, DEVICE_INFO = 0x09, VALID_CARRIER_PROFILES = 0x0e, STATUS = 0x10,
    }
}

/// MoveItems code page.
#[allow(missing_docs)]
pub mod moves {
    use super::*;
    tags! { page::MOVE;
        MOVES = 0x05, MOVE = 0x06, SRC_MSG_ID = 0x07, SRC_FLD_ID = 0x08,
        DST_FLD_ID = 0x09, RESPONSE = 0x0a, STATUS = 0x0b, DST_MSG_ID = 0x0c,
    }
}

/// GetItemEstimate code page.
#[allow(missing_docs)]
pub mod estimate {
    use super::*;
    tags! { page::ITEM_ESTIMATE;
        GET_ITEM_ESTIMATE = 0x05, VERSION = 0x06, COLLECTIONS = 0x07,
        COLLECTION = 0x08, CLASS = 0x09, COLLECTION_ID = 0x0a, ESTIMATE = 0x0c,
        RESPONSE = 0x0d, STATUS = 0x0e,
    }
}

/// FolderHierarchy code page.
#[allow(missing_docs)]
pub mod folder {
    use super::*;
    tags! { page::FOLDER_HIERARCHY;
        FOLDERS = 0x05, FOLDER = 0x06, DISPLAY_NAME = 0x07, SERVER_ID = 0x08,
        PARENT_ID = 0x09, TYPE = 0x0a, STATUS = 0x0c, CHANGES = 0x0e, ADD = 0x0f,
        DELETE = 0x10, UPDATE = 0x11, SYNC_KEY = 0x12, FOLDER_CREATE = 0x13,
        FOLDER_DELETE = 0x14, FOLDER_UPDATE = 0x15, FOLDER_SYNC = 0x16, COUNT = 0x17,
    }
}

/// MeetingResponse code page.
#[allow(missing_docs)]
pub mod meeting {
    use super::*;
    tags! { page::MEETING_RESPONSE;
        CALENDAR_ID = 0x05, COLLECTION_ID = 0x06, MEETING_RESPONSE = 0x07,
        REQUEST_ID = 0x08, REQUEST = 0x09, RESULT = 0x0a, STATUS = 0x0b,
        USER_RESPONSE = 0x0c,
    }
}

/// Ping code page.
#[allow(missing_docs)]
pub mod ping {
    use super::*;
    tags! { page::PING;
        PING = 0x05, STATUS = 0x07,
        /// Requested lifetime of the long poll, in seconds.
        HEARTBEAT_INTERVAL = 0x08,
        FOLDERS = 0x09, FOLDER = 0x0a, ID = 0x0b, CLASS = 0x0c, MAX_FOLDERS = 0x0d,
    }
}

/// Provision code page.
#[allow(missing_docs)]
pub mod provision {
    use super::*;
    tags! { page::PROVISION;
        PROVISION = 0x05, POLICIES = 0x06, POLICY = 0x07, POLICY_TYPE = 0x08,
        POLICY_KEY = 0x09, DATA = 0x0a, STATUS = 0x0b, REMOTE_WIPE = 0x0c,
        EAS_PROVISION_DOC = 0x0d, DEVICE_PASSWORD_ENABLED = 0x0e,
        ATTACHMENTS_ENABLED = 0x13, MAX_INACTIVITY_TIME = 0x15,
    }
}

/// Search code page.
#[allow(missing_docs)]
pub mod search {
    use super::*;
    tags! { page::SEARCH;
        SEARCH = 0x05, STORE = 0x07, NAME = 0x08, QUERY = 0x09, OPTIONS = 0x0a,
        RANGE = 0x0b, STATUS = 0x0c, RESPONSE = 0x0d, RESULT = 0x0e,
        PROPERTIES = 0x0f, TOTAL = 0x10,
    }
}

/// Global address list code page.
#[allow(missing_docs)]
pub mod gal {
    use super::*;
    tags! { page::GAL;
        DISPLAY_NAME = 0x05, PHONE = 0x06, OFFICE = 0x07, TITLE = 0x08,
        COMPANY = 0x09, ALIAS = 0x0a, FIRST_NAME = 0x0b, LAST_NAME = 0x0c,
        HOME_PHONE = 0x0d, MOBILE_PHONE = 0x0e, EMAIL_ADDRESS = 0x0f,
    }
}

/// AirSyncBase code page.
#[allow(missing_docs)]
pub mod base {
    use super::*;
    tags! { page::AIRSYNC_BASE;
        BODY_PREFERENCE = 0x05, TYPE = 0x06, TRUNCATION_SIZE = 0x07,
        ALL_OR_NONE = 0x08, BODY = 0x0a, DATA = 0x0b, ESTIMATED_DATA_SIZE = 0x0c,
        TRUNCATED = 0x0d, FILE_REFERENCE = 0x11, PREVIEW = 0x18,
    }
}

/// Settings code page.
#[allow(missing_docs)]
pub mod settings {
    use super::*;
    tags! { page::SETTINGS;
        SETTINGS = 0x05, STATUS = 0x06, GET = 0x07, SET = 0x08, OOF = 0x09,
        OOF_STATE = 0x0a, START_TIME = 0x0b, END_TIME = 0x0c, OOF_MESSAGE = 0x0d,
        APPLIES_TO_INTERNAL = 0x0e, APPLIES_TO_EXTERNAL_KNOWN = 0x0f,
        APPLIES_TO_EXTERNAL_UNKNOWN = 0x10, ENABLED = 0x11, REPLY_MESSAGE = 0x12,
        BODY_TYPE = 0x13, DEVICE_PASSWORD = 0x14, PASSWORD = 0x15,
        DEVICE_INFORMATION = 0x16, MODEL = 0x17, IMEI = 0x18, FRIENDLY_NAME = 0x19,
        OS = 0x1a, OS_LANGUAGE = 0x1b, PHONE_NUMBER = 0x1c,
        USER_INFORMATION = 0x1d, EMAIL_ADDRESSES = 0x1e, SMTP_ADDRESS = 0x1f,
    }
}

/// ItemOperations code page.
#[allow(missing_docs)]
pub mod item_operations {
    use super::*;
    tags! { page::ITEM_OPERATIONS;
        ITEM_OPERATIONS = 0x05, FETCH = 0x06, STORE = 0x07, OPTIONS = 0x08,
        RANGE = 0x09, TOTAL = 0x0a, PROPERTIES = 0x0b, DATA = 0x0c, STATUS = 0x0d,
        RESPONSE = 0x0e, EMPTY_FOLDER_CONTENTS = 0x12, MOVE = 0x16,
    }
}

/// ComposeMail code page.
#[allow(missing_docs)]
pub mod compose {
    use super::*;
    tags! { page::COMPOSE_MAIL;
        SEND_MAIL = 0x05, SMART_FORWARD = 0x06, SMART_REPLY = 0x07,
        SAVE_IN_SENT_ITEMS = 0x08, REPLACE_MIME = 0x09, SOURCE = 0x0b,
        FOLDER_ID = 0x0c, ITEM_ID = 0x0d, MIME = 0x10, CLIENT_ID = 0x11, STATUS = 0x12,
    }
}

/// Notes code page.
#[allow(missing_docs)]
pub mod notes {
    use super::*;
    tags! { page::NOTES;
        SUBJECT = 0x05, MESSAGE_CLASS = 0x06, LAST_MODIFIED_DATE = 0x07,
    }
}
