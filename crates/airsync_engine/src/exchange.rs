//! The change channel.
//!
//! Backends produce changes through an [`Exporter`] and accept them
//! through an [`Importer`] (items) or a [`HierarchyImporter`] (folders).
//! Exported changes are pulled one at a time into a [`ChangeSink`], which
//! either writes them to the reply ([`ItemStreamSink`],
//! [`FolderStreamSink`]) or only counts them ([`DiscardSink`]).

use crate::error::EngineResult;
use crate::state::SyncState;
use airsync_codec::TagEncoder;
use airsync_protocol::tags::{airsync, folder};
use airsync_protocol::{
    ChangeOperation, ConflictPolicy, ContentParameters, FolderEntry, FolderType, SyncItem,
};

/// Produces the backend changes since a state.
pub trait Exporter<T> {
    /// Sets the starting state and the content options.
    ///
    /// After this call [`change_count`](Self::change_count) is known.
    fn configure(&mut self, state: &SyncState, params: &ContentParameters) -> EngineResult<()>;

    /// Number of changes still to be produced.
    fn change_count(&self) -> usize;

    /// Produces the next change, or `None` once all are produced.
    fn next_change(&mut self) -> EngineResult<Option<ChangeOperation<T>>>;

    /// State that includes every change produced so far.
    fn state(&self) -> EngineResult<SyncState>;
}

/// Applies client item changes to a backend folder.
pub trait Importer {
    /// Sets the starting state and the conflict policy.
    fn configure(&mut self, state: &SyncState, conflict: ConflictPolicy) -> EngineResult<()>;

    /// Loads the backend changes pending for `state`, so conflicting
    /// imports can be resolved by the conflict policy.
    fn load_conflicts(&mut self, params: &ContentParameters, state: &SyncState)
        -> EngineResult<()>;

    /// Creates (no server id) or replaces an item; returns its server id.
    fn import_message_change(&mut self, server_id: Option<&str>, item: &SyncItem)
        -> EngineResult<String>;

    /// Deletes an item.
    fn import_message_deletion(&mut self, server_id: &str) -> EngineResult<()>;

    /// Sets the read flag of an item.
    fn import_message_read_flag(&mut self, server_id: &str, read: bool) -> EngineResult<()>;

    /// Moves an item to another folder; returns its new server id.
    fn import_message_move(&mut self, server_id: &str, destination: &str)
        -> EngineResult<String>;

    /// State that includes every import so far.
    fn state(&self) -> EngineResult<SyncState>;
}

/// A folder created or changed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderChange {
    /// Server id of an existing folder, `None` to create one.
    pub server_id: Option<String>,
    /// Parent server id, `"0"` for top level.
    pub parent_id: String,
    /// Display name.
    pub display_name: String,
    /// Folder type.
    pub folder_type: FolderType,
}

/// Applies client folder changes.
pub trait HierarchyImporter {
    /// Sets the starting state.
    fn configure(&mut self, state: &SyncState) -> EngineResult<()>;

    /// Creates or updates a folder; returns the resulting entry.
    fn import_folder_change(&mut self, change: &FolderChange) -> EngineResult<FolderEntry>;

    /// Deletes a folder.
    fn import_folder_deletion(&mut self, server_id: &str) -> EngineResult<()>;

    /// State that includes every import so far.
    fn state(&self) -> EngineResult<SyncState>;
}

/// Receives exported changes.
pub trait ChangeSink<T> {
    /// Accepts one change.
    fn accept(&mut self, change: ChangeOperation<T>) -> EngineResult<()>;
}

/// Pulls changes from an exporter into a sink, at most `limit` of them.
///
/// Returns the number of changes moved.
pub fn pump<T>(
    exporter: &mut dyn Exporter<T>,
    sink: &mut dyn ChangeSink<T>,
    limit: Option<usize>,
) -> EngineResult<usize> {
    let mut moved = 0;
    while limit.map_or(true, |max| moved < max) {
        match exporter.next_change()? {
            Some(change) => {
                sink.accept(change)?;
                moved += 1;
            }
            None => break,
        }
    }
    Ok(moved)
}

/// Counts changes and drops them.
#[derive(Debug, Default)]
pub struct DiscardSink {
    count: usize,
}

impl DiscardSink {
    /// Creates a sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of changes accepted.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl<T> ChangeSink<T> for DiscardSink {
    fn accept(&mut self, _change: ChangeOperation<T>) -> EngineResult<()> {
        self.count += 1;
        Ok(())
    }
}

/// Writes item changes as Sync `Commands` children.
pub struct ItemStreamSink<'e> {
    encoder: &'e mut TagEncoder,
}

impl<'e> ItemStreamSink<'e> {
    /// Creates a sink over the reply encoder.
    pub fn new(encoder: &'e mut TagEncoder) -> Self {
        Self { encoder }
    }
}

impl ChangeSink<SyncItem> for ItemStreamSink<'_> {
    fn accept(&mut self, change: ChangeOperation<SyncItem>) -> EngineResult<()> {
        let enc = &mut *self.encoder;
        match change {
            ChangeOperation::Add {
                server_id, payload, ..
            } => {
                enc.start_tag(airsync::ADD);
                if let Some(id) = server_id {
                    enc.leaf(airsync::SERVER_ID, id)?;
                }
                write_data(enc, &payload)?;
            }
            ChangeOperation::Modify { server_id, payload } => {
                enc.start_tag(airsync::CHANGE);
                enc.leaf(airsync::SERVER_ID, server_id)?;
                write_data(enc, &payload)?;
            }
            ChangeOperation::Remove { server_id } => {
                enc.start_tag(airsync::DELETE);
                enc.leaf(airsync::SERVER_ID, server_id)?;
            }
            ChangeOperation::Fetch { server_id } => {
                enc.start_tag(airsync::FETCH);
                enc.leaf(airsync::SERVER_ID, server_id)?;
            }
        }
        enc.end_tag()?;
        Ok(())
    }
}

fn write_data(enc: &mut TagEncoder, item: &SyncItem) -> EngineResult<()> {
    enc.start_tag(airsync::APPLICATION_DATA);
    item.encode(enc)?;
    enc.end_tag()?;
    Ok(())
}

/// Writes folder changes as FolderSync `Changes` children.
pub struct FolderStreamSink<'e> {
    encoder: &'e mut TagEncoder,
}

impl<'e> FolderStreamSink<'e> {
    /// Creates a sink over the reply encoder.
    pub fn new(encoder: &'e mut TagEncoder) -> Self {
        Self { encoder }
    }
}

impl ChangeSink<FolderEntry> for FolderStreamSink<'_> {
    fn accept(&mut self, change: ChangeOperation<FolderEntry>) -> EngineResult<()> {
        let enc = &mut *self.encoder;
        match change {
            ChangeOperation::Add { payload, .. } => {
                enc.start_tag(folder::ADD);
                payload.encode(enc)?;
            }
            ChangeOperation::Modify { payload, .. } => {
                enc.start_tag(folder::UPDATE);
                payload.encode(enc)?;
            }
            ChangeOperation::Remove { server_id } | ChangeOperation::Fetch { server_id } => {
                enc.start_tag(folder::DELETE);
                enc.leaf(folder::SERVER_ID, server_id)?;
            }
        }
        enc.end_tag()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use airsync_codec::Element;
    use airsync_protocol::tags::email;
    use std::collections::VecDeque;

    /// Exporter over a fixed list of changes.
    pub(crate) struct ListExporter {
        pub(crate) changes: VecDeque<ChangeOperation<SyncItem>>,
    }

    impl ListExporter {
        pub(crate) fn with_adds(n: usize) -> Self {
            Self {
                changes: (0..n)
                    .map(|i| ChangeOperation::Add {
                        client_id: None,
                        server_id: Some(format!("s{i}")),
                        payload: SyncItem::new().with_text(email::SUBJECT, format!("m{i}")),
                    })
                    .collect(),
            }
        }
    }

    impl Exporter<SyncItem> for ListExporter {
        fn configure(&mut self, _: &SyncState, _: &ContentParameters) -> EngineResult<()> {
            Ok(())
        }
        fn change_count(&self) -> usize {
            self.changes.len()
        }
        fn next_change(&mut self) -> EngineResult<Option<ChangeOperation<SyncItem>>> {
            Ok(self.changes.pop_front())
        }
        fn state(&self) -> EngineResult<SyncState> {
            Ok(SyncState::new(vec![self.changes.len() as u8]))
        }
    }

    #[test]
    fn pump_honors_limit() {
        let mut exporter = ListExporter::with_adds(5);
        let mut sink = DiscardSink::new();
        assert_eq!(pump(&mut exporter, &mut sink, Some(3)).unwrap(), 3);
        assert_eq!(sink.count(), 3);
        assert_eq!(exporter.change_count(), 2);
        assert_eq!(pump(&mut exporter, &mut sink, None).unwrap(), 2);
        assert_eq!(sink.count(), 5);
    }

    #[test]
    fn pump_zero_limit_moves_nothing() {
        let mut exporter = ListExporter::with_adds(2);
        let mut sink = DiscardSink::new();
        assert_eq!(pump(&mut exporter, &mut sink, Some(0)).unwrap(), 0);
        assert_eq!(exporter.change_count(), 2);
    }

    #[test]
    fn item_stream_writes_commands() {
        let mut enc = TagEncoder::new();
        enc.start_tag(airsync::COMMANDS);
        {
            let mut sink = ItemStreamSink::new(&mut enc);
            sink.accept(ChangeOperation::Remove {
                server_id: "s1".into(),
            })
            .unwrap();
        }
        enc.end_tag().unwrap();
        let elements = enc.into_elements().unwrap();
        assert_eq!(
            elements,
            vec![
                Element::Start(airsync::COMMANDS),
                Element::Start(airsync::DELETE),
                Element::Start(airsync::SERVER_ID),
                Element::Content("s1".into()),
                Element::End,
                Element::End,
                Element::End,
            ]
        );
    }
}
