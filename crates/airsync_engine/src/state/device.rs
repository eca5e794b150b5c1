//! Device-scoped state accessor.

use super::{DeviceRecord, FailState, PingSession, StateStore, SyncState, WipeStatus};
use crate::error::{EngineError, EngineResult};
use airsync_protocol::{ContentClass, FolderEntry, SyncKey};
use tracing::debug;

/// State access for the device of one request.
pub struct DeviceStates<'a> {
    store: &'a dyn StateStore,
    device: String,
}

impl<'a> DeviceStates<'a> {
    /// Creates an accessor for a device.
    pub fn new(store: &'a dyn StateStore, device: impl Into<String>) -> Self {
        Self {
            store,
            device: device.into(),
        }
    }

    /// Device id.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Resolves a presented key to its state.
    ///
    /// The initial key always resolves, to the empty state.
    pub fn resolve(&self, key: &SyncKey) -> EngineResult<SyncState> {
        if key.is_initial() {
            return Ok(SyncState::empty());
        }
        match self.store.load_state(&self.device, key)? {
            Some(state) => Ok(state),
            None => {
                debug!(device = %self.device, key = %key, "sync key not found");
                Err(EngineError::key_invalid(key.as_str()))
            }
        }
    }

    /// Issues the key that follows a presented key.
    pub fn issue(&self, key: &SyncKey) -> SyncKey {
        key.next()
    }

    /// Records a state under a newly issued key.
    pub fn persist(
        &self,
        key: &SyncKey,
        state: &SyncState,
        collection_id: Option<&str>,
    ) -> EngineResult<()> {
        self.store
            .save_state(&self.device, key, state, collection_id)
    }

    /// Fail state recorded for a presented key.
    pub fn fail_state(&self, key: &SyncKey) -> EngineResult<Option<FailState>> {
        self.store.load_fail_state(&self.device, key)
    }

    /// Records or clears the fail state for a presented key.
    pub fn set_fail_state(&self, key: &SyncKey, fail: Option<&FailState>) -> EngineResult<()> {
        self.store.save_fail_state(&self.device, key, fail)
    }

    /// Long-poll session of the device.
    pub fn ping_session(&self) -> EngineResult<Option<PingSession>> {
        self.store.load_ping_session(&self.device)
    }

    /// Records the long-poll session.
    pub fn set_ping_session(&self, session: &PingSession) -> EngineResult<()> {
        self.store.save_ping_session(&self.device, session)
    }

    /// Device record.
    pub fn record(&self) -> EngineResult<DeviceRecord> {
        self.store.load_device(&self.device)
    }

    /// Stores the device record.
    pub fn save_record(&self, record: &DeviceRecord) -> EngineResult<()> {
        self.store.save_device(&self.device, record)
    }

    /// Content class of a cached folder.
    pub fn folder_class(&self, folder_id: &str) -> EngineResult<Option<ContentClass>> {
        Ok(self
            .record()?
            .folders
            .get(folder_id)
            .and_then(FolderEntry::class))
    }

    /// Id of the first cached folder holding a class.
    pub fn folder_id_for_class(&self, class: ContentClass) -> EngineResult<Option<String>> {
        Ok(self
            .record()?
            .folders
            .values()
            .find(|f| f.class() == Some(class))
            .map(|f| f.server_id.clone()))
    }

    /// Returns true if the hierarchy cache holds any folder.
    pub fn has_hierarchy(&self) -> EngineResult<bool> {
        Ok(!self.record()?.folders.is_empty())
    }

    /// Cached folders.
    pub fn folders(&self) -> EngineResult<Vec<FolderEntry>> {
        Ok(self.record()?.folders.into_values().collect())
    }

    /// Replaces the hierarchy cache.
    pub fn set_folders(&self, folders: impl IntoIterator<Item = FolderEntry>) -> EngineResult<()> {
        let mut record = self.record()?;
        record.folders = folders
            .into_iter()
            .map(|f| (f.server_id.clone(), f))
            .collect();
        self.save_record(&record)
    }

    /// Accepted policy key of the device.
    pub fn policy_key(&self) -> EngineResult<Option<String>> {
        Ok(self.record()?.policy_key().map(str::to_string))
    }

    /// Remote wipe status of the device.
    pub fn wipe_status(&self) -> EngineResult<WipeStatus> {
        Ok(self.record()?.wipe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use airsync_protocol::FolderType;

    #[test]
    fn initial_key_resolves_empty() {
        let store = MemoryStateStore::new();
        let states = DeviceStates::new(&store, "dev");
        assert!(states.resolve(&SyncKey::initial()).unwrap().is_empty());
    }

    #[test]
    fn unknown_key_is_invalid() {
        let store = MemoryStateStore::new();
        let states = DeviceStates::new(&store, "dev");
        let err = states.resolve(&SyncKey::new("{bogus}4")).unwrap_err();
        assert!(matches!(err, EngineError::KeyInvalid { .. }));
    }

    #[test]
    fn persisted_key_resolves() {
        let store = MemoryStateStore::new();
        let states = DeviceStates::new(&store, "dev");
        let key = states.issue(&SyncKey::initial());
        states
            .persist(&key, &SyncState::new(vec![9]), Some("f1"))
            .unwrap();
        assert_eq!(states.resolve(&key).unwrap().as_bytes(), &[9]);
    }

    #[test]
    fn folder_cache_lookups() {
        let store = MemoryStateStore::new();
        let states = DeviceStates::new(&store, "dev");
        states
            .set_folders(vec![
                FolderEntry::new("f1", "0", "Inbox", FolderType::Inbox),
                FolderEntry::new("f2", "0", "Calendar", FolderType::Calendar),
            ])
            .unwrap();

        assert!(states.has_hierarchy().unwrap());
        assert_eq!(states.folder_class("f2").unwrap(), Some(ContentClass::Calendar));
        assert_eq!(states.folder_class("nope").unwrap(), None);
        assert_eq!(
            states.folder_id_for_class(ContentClass::Email).unwrap(),
            Some("f1".to_string())
        );
    }
}
