//! In-memory state store.

use super::{DeviceRecord, FailState, PingSession, StateStore, SyncState};
use crate::error::EngineResult;
use airsync_protocol::SyncKey;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
struct DeviceSlot {
    states: HashMap<SyncKey, SyncState>,
    fail_states: HashMap<SyncKey, FailState>,
    ping: Option<PingSession>,
    record: DeviceRecord,
}

/// A [`StateStore`] that keeps everything in process memory.
///
/// Saving counter `n` of a key chain drops every state of that chain
/// older than `n - 1`.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    devices: RwLock<HashMap<String, DeviceSlot>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of states held for a device.
    pub fn state_count(&self, device: &str) -> usize {
        self.devices
            .read()
            .get(device)
            .map(|slot| slot.states.len())
            .unwrap_or(0)
    }

    /// Returns true if a fail state is recorded for the presented key.
    pub fn has_fail_state(&self, device: &str, key: &SyncKey) -> bool {
        self.devices
            .read()
            .get(device)
            .is_some_and(|slot| slot.fail_states.contains_key(key))
    }
}

fn is_superseded(candidate: &SyncKey, saved: &SyncKey) -> bool {
    match (candidate.components(), saved.components()) {
        (Some((chain, old)), Some((current, new))) => {
            chain == current && old.saturating_add(1) < new
        }
        _ => false,
    }
}

impl StateStore for MemoryStateStore {
    fn load_state(&self, device: &str, key: &SyncKey) -> EngineResult<Option<SyncState>> {
        Ok(self
            .devices
            .read()
            .get(device)
            .and_then(|slot| slot.states.get(key).cloned()))
    }

    fn save_state(
        &self,
        device: &str,
        key: &SyncKey,
        state: &SyncState,
        collection_id: Option<&str>,
    ) -> EngineResult<()> {
        let mut devices = self.devices.write();
        let slot = devices.entry(device.to_string()).or_default();
        slot.states.retain(|k, _| !is_superseded(k, key));
        slot.fail_states.retain(|k, _| !is_superseded(k, key));
        slot.states.insert(key.clone(), state.clone());
        debug!(device, key = %key, collection = ?collection_id, bytes = state.as_bytes().len(), "saved sync state");
        Ok(())
    }

    fn load_fail_state(&self, device: &str, key: &SyncKey) -> EngineResult<Option<FailState>> {
        Ok(self
            .devices
            .read()
            .get(device)
            .and_then(|slot| slot.fail_states.get(key).cloned()))
    }

    fn save_fail_state(
        &self,
        device: &str,
        key: &SyncKey,
        fail: Option<&FailState>,
    ) -> EngineResult<()> {
        let mut devices = self.devices.write();
        let slot = devices.entry(device.to_string()).or_default();
        match fail {
            Some(fail) => {
                slot.fail_states.insert(key.clone(), fail.clone());
            }
            None => {
                slot.fail_states.remove(key);
            }
        }
        Ok(())
    }

    fn load_ping_session(&self, device: &str) -> EngineResult<Option<PingSession>> {
        Ok(self
            .devices
            .read()
            .get(device)
            .and_then(|slot| slot.ping.clone()))
    }

    fn save_ping_session(&self, device: &str, session: &PingSession) -> EngineResult<()> {
        self.devices
            .write()
            .entry(device.to_string())
            .or_default()
            .ping = Some(session.clone());
        Ok(())
    }

    fn load_device(&self, device: &str) -> EngineResult<DeviceRecord> {
        Ok(self
            .devices
            .read()
            .get(device)
            .map(|slot| slot.record.clone())
            .unwrap_or_default())
    }

    fn save_device(&self, device: &str, record: &DeviceRecord) -> EngineResult<()> {
        self.devices
            .write()
            .entry(device.to_string())
            .or_default()
            .record = record.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(byte: u8) -> SyncState {
        SyncState::new(vec![byte])
    }

    #[test]
    fn save_and_load() {
        let store = MemoryStateStore::new();
        let key = SyncKey::initial().next();
        store.save_state("dev", &key, &state(1), Some("f1")).unwrap();
        assert_eq!(store.load_state("dev", &key).unwrap(), Some(state(1)));
        assert_eq!(store.load_state("other", &key).unwrap(), None);
    }

    #[test]
    fn keeps_previous_key_of_chain() {
        let store = MemoryStateStore::new();
        let k1 = SyncKey::initial().next();
        let k2 = k1.next();
        let k3 = k2.next();
        store.save_state("dev", &k1, &state(1), None).unwrap();
        store.save_state("dev", &k2, &state(2), None).unwrap();
        assert!(store.load_state("dev", &k1).unwrap().is_some());

        store.save_state("dev", &k3, &state(3), None).unwrap();
        assert!(store.load_state("dev", &k1).unwrap().is_none());
        assert!(store.load_state("dev", &k2).unwrap().is_some());
        assert_eq!(store.state_count("dev"), 2);
    }

    #[test]
    fn chains_are_independent() {
        let store = MemoryStateStore::new();
        let a1 = SyncKey::initial().next();
        let b1 = SyncKey::initial().next();
        let b3 = b1.next().next();
        store.save_state("dev", &a1, &state(1), None).unwrap();
        store.save_state("dev", &b3, &state(3), None).unwrap();
        assert!(store.load_state("dev", &a1).unwrap().is_some());
    }

    #[test]
    fn fail_state_set_and_clear() {
        let store = MemoryStateStore::new();
        let key = SyncKey::initial().next();
        let mut fail = FailState::default();
        fail.statuses.insert("c1".into(), 1);

        store.save_fail_state("dev", &key, Some(&fail)).unwrap();
        assert!(store.has_fail_state("dev", &key));
        assert_eq!(store.load_fail_state("dev", &key).unwrap(), Some(fail));

        store.save_fail_state("dev", &key, None).unwrap();
        assert!(!store.has_fail_state("dev", &key));
    }

    #[test]
    fn unknown_device_has_default_record() {
        let store = MemoryStateStore::new();
        assert_eq!(store.load_device("dev").unwrap(), DeviceRecord::default());
        assert!(store.load_ping_session("dev").unwrap().is_none());
    }
}
