//! Persisted sync state.
//!
//! The engine persists four kinds of records per device:
//! - opaque [`SyncState`] blobs keyed by [`SyncKey`]
//! - a [`FailState`] snapshot of the previous round of a collection
//! - the [`PingSession`] of the last long poll
//! - a [`DeviceRecord`] with policy, wipe and hierarchy cache data
//!
//! [`StateStore`] is the storage contract, [`MemoryStateStore`] an
//! in-process implementation and [`DeviceStates`] the device-scoped
//! accessor handlers use.

mod device;
mod memory;

pub use device::DeviceStates;
pub use memory::MemoryStateStore;

use crate::error::EngineResult;
use airsync_protocol::{ContentClass, FolderEntry, SyncKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An opaque state blob owned by a backend exporter or importer.
///
/// The engine stores and returns these bytes but never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState(Vec<u8>);

impl SyncState {
    /// Wraps backend-produced bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The empty state of an initial round.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns true for the empty state.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Outcome of the previous round of a collection, kept only when that
/// round reported per-item statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailState {
    /// Client id of every client add, with the server id it got.
    pub client_ids: BTreeMap<String, Option<String>>,
    /// Server ids the client removed.
    pub remove_ids: Vec<String>,
    /// Status per client or server id.
    pub statuses: BTreeMap<String, u16>,
    /// Importer state after the imports of that round.
    pub failed_sync_state: Option<SyncState>,
}

impl FailState {
    /// Server id recorded for a client add.
    pub fn server_id_for(&self, client_id: &str) -> Option<&str> {
        self.client_ids.get(client_id).and_then(Option::as_deref)
    }

    /// Returns true if the server id was removed in that round.
    pub fn was_removed(&self, server_id: &str) -> bool {
        self.remove_ids.iter().any(|id| id == server_id)
    }

    /// Recorded status for an id.
    pub fn status_of(&self, id: &str) -> Option<u16> {
        self.statuses.get(id).copied()
    }
}

/// One collection watched by a long poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingCollection {
    /// Folder server id.
    pub server_id: String,
    /// Content class, when the client sent it.
    pub class: Option<ContentClass>,
    /// Export cursor.
    pub state: SyncState,
}

impl PingCollection {
    /// A watched collection starting from an empty cursor.
    pub fn new(server_id: impl Into<String>, class: Option<ContentClass>) -> Self {
        Self {
            server_id: server_id.into(),
            class,
            state: SyncState::empty(),
        }
    }
}

/// Persisted long-poll session of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingSession {
    /// Watched collections with their cursors.
    pub collections: Vec<PingCollection>,
    /// Requested lifetime in seconds.
    pub lifetime: u64,
    /// Policy key observed when the session was recorded.
    pub policy_key: Option<String>,
}

/// Policy handshake state of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyState {
    /// No policy handshake yet.
    #[default]
    Unprovisioned,
    /// A policy was offered under a temporary key.
    PolicyOffered {
        /// The temporary key.
        temp_key: String,
    },
    /// The client acknowledged the policy.
    PolicyAccepted {
        /// The final key.
        key: String,
    },
}

/// Remote wipe status of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WipeStatus {
    /// Not applicable.
    #[default]
    NotApplicable = 0,
    /// No wipe.
    Normal = 1,
    /// A wipe is pending administrator confirmation.
    Pending = 2,
    /// A wipe was requested and must be sent to the device.
    Requested = 4,
    /// The device acknowledged the wipe.
    Wiped = 8,
}

impl WipeStatus {
    /// Numeric code.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Per-device record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Policy handshake state.
    pub policy: PolicyState,
    /// Remote wipe status.
    pub wipe: WipeStatus,
    /// Hierarchy cache: the folders the device knows, by server id.
    pub folders: BTreeMap<String, FolderEntry>,
}

impl DeviceRecord {
    /// The accepted policy key, if the handshake completed.
    pub fn policy_key(&self) -> Option<&str> {
        match &self.policy {
            PolicyState::PolicyAccepted { key } => Some(key),
            _ => None,
        }
    }
}

/// Storage contract for persisted state.
///
/// Implementations must keep the state of the current key and the one
/// before it in each key chain resolvable, so a round can be retried.
pub trait StateStore: Send + Sync {
    /// Loads the state stored under a key.
    fn load_state(&self, device: &str, key: &SyncKey) -> EngineResult<Option<SyncState>>;

    /// Stores a state under a key.
    fn save_state(
        &self,
        device: &str,
        key: &SyncKey,
        state: &SyncState,
        collection_id: Option<&str>,
    ) -> EngineResult<()>;

    /// Loads the fail state recorded for a presented key.
    fn load_fail_state(&self, device: &str, key: &SyncKey) -> EngineResult<Option<FailState>>;

    /// Stores or, with `None`, clears the fail state for a presented key.
    fn save_fail_state(
        &self,
        device: &str,
        key: &SyncKey,
        fail: Option<&FailState>,
    ) -> EngineResult<()>;

    /// Loads the long-poll session.
    fn load_ping_session(&self, device: &str) -> EngineResult<Option<PingSession>>;

    /// Stores the long-poll session.
    fn save_ping_session(&self, device: &str, session: &PingSession) -> EngineResult<()>;

    /// Loads the device record, or a default record for unknown devices.
    fn load_device(&self, device: &str) -> EngineResult<DeviceRecord>;

    /// Stores the device record.
    fn save_device(&self, device: &str, record: &DeviceRecord) -> EngineResult<()>;
}
