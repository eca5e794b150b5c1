//! # AirSync Protocol
//!
//! Protocol vocabulary shared by the AirSync engine and its tooling.
//!
//! This crate provides:
//! - Tag constants, one module per code page ([`tags`])
//! - Per-command status namespaces ([`SyncStatus`], [`PingStatus`], ...)
//! - [`SyncKey`] version tokens
//! - [`ChangeOperation`] for the change channel
//! - Content classes, filter types, body preferences and conflict policy
//! - Folder entries and generic item payloads
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod conflict;
mod content;
mod error;
mod folder;
mod item;
mod key;
mod operation;
mod status;
pub mod tags;

pub use command::Command;
pub use conflict::ConflictPolicy;
pub use content::{
    parse_flag, parse_number, BodyPreference, ContentClass, ContentParameters, FilterType,
};
pub use error::{ProtocolError, ProtocolResult};
pub use folder::{parse_folder_type, FolderEntry, FolderType};
pub use item::{Field, FieldValue, SyncItem};
pub use key::SyncKey;
pub use operation::{ChangeOperation, OperationType};
pub use status::{
    CommonStatus, EstimateStatus, FolderStatus, ItemOperationsStatus, MeetingResponseStatus,
    MoveItemsStatus, PingStatus, ProvisionStatus, SearchStatus, SearchStoreStatus,
    SettingsStatus, SyncStatus,
};
