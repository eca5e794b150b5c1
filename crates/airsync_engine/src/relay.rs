//! Hierarchy memory relay.

use crate::error::{EngineError, EngineResult};
use crate::exchange::{Exporter, FolderChange, HierarchyImporter};
use crate::state::SyncState;
use airsync_protocol::{ChangeOperation, ContentParameters, FolderEntry};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Sits between the client and the backend hierarchy importer and keeps
/// the device's folder cache current.
///
/// Client imports are forwarded to the destination importer and applied
/// to the cache. Backend changes are absorbed from an exporter, filtered
/// against the cache, and replayed to the client as an exporter.
pub struct MemoryRelay<'a> {
    destination: Box<dyn HierarchyImporter + 'a>,
    cache: BTreeMap<String, FolderEntry>,
    imported: usize,
    outgoing: VecDeque<ChangeOperation<FolderEntry>>,
    export_state: Option<SyncState>,
    initial: bool,
}

impl<'a> MemoryRelay<'a> {
    /// Creates a relay in front of `destination`, starting from a cache.
    ///
    /// `initial` marks a round that started from the initial key.
    pub fn new(
        destination: Box<dyn HierarchyImporter + 'a>,
        cache: impl IntoIterator<Item = FolderEntry>,
        initial: bool,
    ) -> Self {
        Self {
            destination,
            cache: cache
                .into_iter()
                .map(|f| (f.server_id.clone(), f))
                .collect(),
            imported: 0,
            outgoing: VecDeque::new(),
            export_state: None,
            initial,
        }
    }

    /// Number of client changes forwarded.
    pub fn imported_count(&self) -> usize {
        self.imported
    }

    /// Returns true if a folder is cached.
    pub fn contains(&self, server_id: &str) -> bool {
        self.cache.contains_key(server_id)
    }

    /// Drains a backend hierarchy exporter, keeping only the changes the
    /// device does not know yet.
    pub fn absorb(&mut self, exporter: &mut dyn Exporter<FolderEntry>) -> EngineResult<()> {
        while let Some(change) = exporter.next_change()? {
            match change {
                ChangeOperation::Add { payload, .. } | ChangeOperation::Modify { payload, .. } => {
                    let known = self.cache.get(&payload.server_id);
                    if known == Some(&payload) {
                        continue;
                    }
                    let change = if known.is_some() {
                        ChangeOperation::Modify {
                            server_id: payload.server_id.clone(),
                            payload: payload.clone(),
                        }
                    } else {
                        ChangeOperation::Add {
                            client_id: None,
                            server_id: Some(payload.server_id.clone()),
                            payload: payload.clone(),
                        }
                    };
                    self.cache.insert(payload.server_id.clone(), payload);
                    self.outgoing.push_back(change);
                }
                ChangeOperation::Remove { server_id } => {
                    if self.cache.remove(&server_id).is_some() {
                        self.outgoing.push_back(ChangeOperation::Remove { server_id });
                    }
                }
                ChangeOperation::Fetch { .. } => {}
            }
        }
        self.export_state = Some(exporter.state()?);
        debug!(outgoing = self.outgoing.len(), "absorbed hierarchy changes");
        Ok(())
    }

    /// Returns true if this round changed the hierarchy in either direction.
    pub fn is_state_changed(&self) -> bool {
        self.initial || self.imported > 0 || !self.outgoing.is_empty()
    }

    /// Returns true if backend changes are waiting for the client.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Returns the folder cache.
    pub fn into_cache(self) -> Vec<FolderEntry> {
        self.cache.into_values().collect()
    }
}

impl HierarchyImporter for MemoryRelay<'_> {
    fn configure(&mut self, state: &SyncState) -> EngineResult<()> {
        self.destination.configure(state)
    }

    fn import_folder_change(&mut self, change: &FolderChange) -> EngineResult<FolderEntry> {
        if let Some(id) = &change.server_id {
            if !self.cache.contains_key(id) {
                return Err(EngineError::HierarchyChanged(format!("folder {id} is not cached")));
            }
        }
        let entry = self.destination.import_folder_change(change)?;
        self.cache.insert(entry.server_id.clone(), entry.clone());
        self.imported += 1;
        Ok(entry)
    }

    fn import_folder_deletion(&mut self, server_id: &str) -> EngineResult<()> {
        self.destination.import_folder_deletion(server_id)?;
        self.cache.remove(server_id);
        self.imported += 1;
        Ok(())
    }

    fn state(&self) -> EngineResult<SyncState> {
        self.destination.state()
    }
}

impl Exporter<FolderEntry> for MemoryRelay<'_> {
    fn configure(&mut self, _state: &SyncState, _params: &ContentParameters) -> EngineResult<()> {
        Ok(())
    }

    fn change_count(&self) -> usize {
        self.outgoing.len()
    }

    fn next_change(&mut self) -> EngineResult<Option<ChangeOperation<FolderEntry>>> {
        Ok(self.outgoing.pop_front())
    }

    fn state(&self) -> EngineResult<SyncState> {
        match &self.export_state {
            Some(state) => Ok(state.clone()),
            None => self.destination.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airsync_protocol::FolderType;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Recorder {
        next_id: usize,
        deleted: Vec<String>,
    }

    impl HierarchyImporter for Recorder {
        fn configure(&mut self, _: &SyncState) -> EngineResult<()> {
            Ok(())
        }
        fn import_folder_change(&mut self, change: &FolderChange) -> EngineResult<FolderEntry> {
            self.next_id += 1;
            let id = change
                .server_id
                .clone()
                .unwrap_or_else(|| format!("n{}", self.next_id));
            Ok(FolderEntry::new(
                id,
                change.parent_id.clone(),
                change.display_name.clone(),
                change.folder_type,
            ))
        }
        fn import_folder_deletion(&mut self, server_id: &str) -> EngineResult<()> {
            self.deleted.push(server_id.to_string());
            Ok(())
        }
        fn state(&self) -> EngineResult<SyncState> {
            Ok(SyncState::new(vec![self.next_id as u8]))
        }
    }

    struct Feed(VecDeque<ChangeOperation<FolderEntry>>);

    impl Exporter<FolderEntry> for Feed {
        fn configure(&mut self, _: &SyncState, _: &ContentParameters) -> EngineResult<()> {
            Ok(())
        }
        fn change_count(&self) -> usize {
            self.0.len()
        }
        fn next_change(&mut self) -> EngineResult<Option<ChangeOperation<FolderEntry>>> {
            Ok(self.0.pop_front())
        }
        fn state(&self) -> EngineResult<SyncState> {
            Ok(SyncState::new(vec![42]))
        }
    }

    fn inbox() -> FolderEntry {
        FolderEntry::new("f1", "0", "Inbox", FolderType::Inbox)
    }

    fn add(entry: FolderEntry) -> ChangeOperation<FolderEntry> {
        ChangeOperation::Add {
            client_id: None,
            server_id: Some(entry.server_id.clone()),
            payload: entry,
        }
    }

    #[test]
    fn absorb_skips_known_folders() {
        let mut relay = MemoryRelay::new(Box::new(Recorder::default()), vec![inbox()], false);
        let renamed = FolderEntry::new("f1", "0", "Mail", FolderType::Inbox);
        let mut feed = Feed(VecDeque::from(vec![
            add(inbox()),
            add(renamed.clone()),
            ChangeOperation::Remove {
                server_id: "ghost".into(),
            },
        ]));

        relay.absorb(&mut feed).unwrap();
        assert_eq!(relay.change_count(), 1);
        assert_eq!(
            relay.next_change().unwrap(),
            Some(ChangeOperation::Modify {
                server_id: "f1".into(),
                payload: renamed,
            })
        );
        assert_eq!(Exporter::state(&relay).unwrap(), SyncState::new(vec![42]));
    }

    #[test]
    fn imports_update_cache_and_forward() {
        let mut relay = MemoryRelay::new(Box::new(Recorder::default()), vec![inbox()], false);
        assert!(!relay.is_state_changed());

        let created = relay
            .import_folder_change(&FolderChange {
                server_id: None,
                parent_id: "0".into(),
                display_name: "Work".into(),
                folder_type: FolderType::UserMail,
            })
            .unwrap();
        assert!(relay.contains(&created.server_id));

        relay.import_folder_deletion("f1").unwrap();
        assert!(!relay.contains("f1"));
        assert_eq!(relay.imported_count(), 2);
        assert!(relay.is_state_changed());
        assert_eq!(relay.into_cache(), vec![created]);
    }

    #[test]
    fn update_of_uncached_folder_is_hierarchy_change() {
        let mut relay = MemoryRelay::new(Box::new(Recorder::default()), Vec::new(), true);
        let result = relay.import_folder_change(&FolderChange {
            server_id: Some("zz".into()),
            parent_id: "0".into(),
            display_name: "x".into(),
            folder_type: FolderType::UserMail,
        });
        assert!(matches!(result, Err(EngineError::HierarchyChanged(_))));
        assert!(relay.is_state_changed());
    }
}
