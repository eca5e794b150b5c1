//! Sync: the per-collection state machine.
//!
//! The whole request is parsed before anything is applied, so a malformed
//! tree aborts the request without touching the backend. Each collection
//! then runs on its own: a condition in one collection becomes that
//! collection's status and never suppresses its siblings.

use super::reply_status;
use crate::backend::Backend;
use crate::collection::{effective_window, more_available, streamed_count, Collection};
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use crate::exchange::{pump, Exporter, Importer, ItemStreamSink};
use crate::state::{FailState, SyncState};
use airsync_codec::TagEncoder;
use airsync_protocol::tags::airsync;
use airsync_protocol::{
    ChangeOperation, ConflictPolicy, ContentParameters, SyncItem, SyncStatus,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let collections = decode_request(ctx)?;

    ctx.encoder.start_tag(airsync::SYNC);
    ctx.encoder.start_tag(airsync::COLLECTIONS);
    for collection in collections {
        sync_collection(ctx, collection)?;
    }
    ctx.encoder.end_tag()?;
    ctx.encoder.end_tag()?;
    Ok(())
}

fn decode_request(ctx: &mut RequestContext<'_>) -> EngineResult<Vec<Collection>> {
    let dec = &mut ctx.decoder;
    dec.expect_start(airsync::SYNC)?;

    let mut collections = Vec::new();
    if dec.start_tag(airsync::COLLECTIONS) {
        while dec.start_tag(airsync::COLLECTION) {
            collections.push(Collection::decode(dec)?);
        }
        dec.end_tag()?;
    }

    // Accepted for compatibility, without effect.
    let heartbeat = dec.leaf(airsync::HEARTBEAT_INTERVAL)?;
    let window = dec.leaf(airsync::WINDOW_SIZE)?;
    let partial = dec.leaf(airsync::PARTIAL)?.is_some();
    if heartbeat.is_some() || window.is_some() || partial {
        debug!(?heartbeat, ?window, partial, "request-level sync options ignored");
    }

    dec.end_tag()?;
    Ok(collections)
}

/// Client changes of one collection and their outcome.
#[derive(Debug, Default)]
struct Incoming {
    adds: Vec<(String, Option<String>)>,
    modify_ids: Vec<String>,
    remove_ids: Vec<String>,
    fetch_ids: Vec<String>,
    statuses: BTreeMap<String, u16>,
    loop_detected: bool,
}

impl Incoming {
    fn add(&mut self, client_id: String, server_id: Option<String>, status: u16) {
        self.statuses.insert(client_id.clone(), status);
        self.adds.push((client_id, server_id));
    }

    fn modify(&mut self, server_id: &str, status: u16) {
        self.statuses.insert(server_id.to_string(), status);
        self.modify_ids.push(server_id.to_string());
    }

    fn remove(&mut self, server_id: &str, status: u16) {
        self.statuses.insert(server_id.to_string(), status);
        self.remove_ids.push(server_id.to_string());
    }

    fn change_count(&self) -> usize {
        self.adds.len() + self.modify_ids.len() + self.remove_ids.len()
    }

    fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Status of an id, if it is not success.
    fn failure(&self, id: &str) -> Option<u16> {
        self.statuses
            .get(id)
            .copied()
            .filter(|code| *code != SyncStatus::Success.code())
    }

    fn fail_state(&self, state: &SyncState) -> FailState {
        FailState {
            client_ids: self.adds.iter().cloned().collect(),
            remove_ids: self.remove_ids.clone(),
            statuses: self.statuses.clone(),
            failed_sync_state: Some(state.clone()),
        }
    }
}

fn sync_collection(ctx: &mut RequestContext<'_>, collection: Collection) -> EngineResult<()> {
    let backend = ctx.backend;
    let config = ctx.config;
    let success = SyncStatus::Success.code();
    let key = collection.sync_key.clone();
    let mut status = success;

    let class = match (collection.class, &collection.collection_id) {
        (Some(class), _) => Some(class),
        (None, Some(id)) => ctx.states.folder_class(id)?,
        (None, None) => None,
    };
    let collection_id = match (&collection.collection_id, class) {
        (Some(id), _) => id.clone(),
        (None, Some(class)) => ctx.states.folder_id_for_class(class)?.unwrap_or_default(),
        (None, None) => String::new(),
    };
    if collection_id.is_empty() {
        warn!(?class, "collection without folder id");
        status = SyncStatus::FolderHierarchyChanged.code();
    }

    let mut params = collection.params.clone();
    params.class = class.or(params.class);
    if let Some(max) = config.max_filter {
        params.clamp_filter(max);
    }
    let conflict = collection.conflict_or(config.default_conflict);

    let mut state = SyncState::empty();
    let mut fail = None;
    if status == success {
        match ctx.states.resolve(&key) {
            Ok(resolved) => {
                state = resolved;
                fail = ctx.states.fail_state(&key)?;
            }
            Err(err) => {
                status = reply_status(
                    err,
                    SyncStatus::InvalidSyncKey,
                    SyncStatus::FolderHierarchyChanged,
                )?
            }
        }
        if status != success {
            ctx.announce(&format!("sync state not found, status {status}"), true);
        }
    }

    let mut incoming = Incoming::default();
    let mut imported_state = None;
    if status == success && !collection.commands.is_empty() {
        let round = IncomingRound {
            backend,
            collection: &collection,
            collection_id: &collection_id,
            params: &params,
            conflict,
            state: &state,
            fail: fail.as_ref(),
        };
        match round.apply(&mut incoming) {
            Ok(advanced) => imported_state = Some(advanced),
            Err(err) => {
                status = reply_status(
                    err,
                    SyncStatus::InvalidSyncKey,
                    SyncStatus::FolderHierarchyChanged,
                )?
            }
        }
        let count = incoming.change_count();
        info!(folder = %collection_id, changes = count, "processed incoming changes");
        ctx.announce(&format!("Incoming {count}"), count > 0);
    }

    if status == success {
        if !incoming.statuses.is_empty() {
            let advanced = imported_state.as_ref().unwrap_or(&state);
            ctx.states
                .set_fail_state(&key, Some(&incoming.fail_state(advanced)))?;
        } else if fail.is_some() {
            ctx.states.set_fail_state(&key, None)?;
        }
    }

    let mut exporter: Option<Box<dyn Exporter<SyncItem> + '_>> = None;
    let mut change_count = 0;
    if status == success && (collection.get_changes || key.is_initial()) {
        let from = imported_state.as_ref().unwrap_or(&state);
        match open_exporter(backend, &collection_id, from, &params) {
            Ok(opened) => {
                change_count = opened.change_count();
                exporter = Some(opened);
            }
            Err(err) => {
                status = reply_status(
                    err,
                    SyncStatus::InvalidSyncKey,
                    SyncStatus::FolderHierarchyChanged,
                )?
            }
        }
        if key.is_initial() {
            ctx.announce(
                &format!("Exporter registered. {change_count} objects queued."),
                true,
            );
        }
    }

    let new_key = (status == success
        && (incoming.has_changes() || change_count > 0 || key.is_initial()))
    .then(|| ctx.states.issue(&key));

    let window = if incoming.loop_detected {
        0
    } else {
        effective_window(
            collection.window_size,
            config.default_window_size,
            config.max_window_size,
        )
    };

    let enc = &mut ctx.encoder;
    enc.start_tag(airsync::COLLECTION);
    if let Some(class) = collection.class {
        enc.leaf(airsync::CLASS, class)?;
    }
    enc.leaf(airsync::SYNC_KEY, new_key.as_ref().unwrap_or(&key))?;
    enc.leaf(airsync::COLLECTION_ID, &collection_id)?;
    enc.leaf(airsync::STATUS, status)?;

    let mut streamed = 0;
    if status == success {
        write_replies(enc, backend, &collection_id, &params, &incoming)?;

        if collection.get_changes && more_available(window, change_count) {
            enc.empty_tag(airsync::MORE_AVAILABLE)?;
        }

        if let Some(exporter) = exporter.as_mut() {
            if collection.get_changes && streamed_count(window, change_count) > 0 {
                enc.start_tag(airsync::COMMANDS);
                streamed = pump(
                    exporter.as_mut(),
                    &mut ItemStreamSink::new(enc),
                    Some(window),
                )?;
                enc.end_tag()?;
            }
        }
    }
    enc.end_tag()?;

    if streamed > 0 {
        let suffix = if streamed < change_count {
            format!(" of {change_count}")
        } else {
            String::new()
        };
        ctx.announce(&format!("Outgoing {streamed} objects{suffix}"), true);
    }

    if let Some(new_key) = new_key {
        let saved = match (&exporter, imported_state) {
            (Some(exporter), _) => Some(exporter.state()?),
            (None, Some(advanced)) => Some(advanced),
            (None, None) if key.is_initial() => Some(SyncState::empty()),
            (None, None) => None,
        };
        if let Some(saved) = saved {
            ctx.states.persist(&new_key, &saved, Some(&collection_id))?;
            debug!(folder = %collection_id, key = %new_key, "sync state saved");
        }
    }
    Ok(())
}

pub(crate) fn open_exporter<'b>(
    backend: &'b dyn Backend,
    collection_id: &str,
    state: &SyncState,
    params: &ContentParameters,
) -> EngineResult<Box<dyn Exporter<SyncItem> + 'b>> {
    let mut exporter = backend.exporter(collection_id)?.ok_or_else(|| {
        EngineError::HierarchyChanged(format!("no exporter for folder {collection_id}"))
    })?;
    exporter.configure(state, params)?;
    Ok(exporter)
}

/// Inputs of the import phase of one collection.
struct IncomingRound<'r> {
    backend: &'r dyn Backend,
    collection: &'r Collection,
    collection_id: &'r str,
    params: &'r ContentParameters,
    conflict: ConflictPolicy,
    state: &'r SyncState,
    fail: Option<&'r FailState>,
}

impl IncomingRound<'_> {
    /// Applies the client changes, returning the advanced state.
    fn apply(&self, incoming: &mut Incoming) -> EngineResult<SyncState> {
        let mut importer = self.backend.importer(self.collection_id)?.ok_or_else(|| {
            EngineError::HierarchyChanged(format!("no importer for folder {}", self.collection_id))
        })?;

        // A retry continues from the state reached by the imports it repeats.
        let base = self
            .fail
            .and_then(|f| f.failed_sync_state.as_ref())
            .unwrap_or(self.state);
        importer.configure(base, self.conflict)?;
        if self.collection.has_mutations() {
            importer.load_conflicts(self.params, self.state)?;
        }

        let success = SyncStatus::Success.code();
        for command in &self.collection.commands {
            match command {
                ChangeOperation::Add {
                    client_id, payload, ..
                } => {
                    let client_id = client_id.clone().unwrap_or_default();
                    if let Some(known) = self.fail.and_then(|f| f.server_id_for(&client_id)) {
                        warn!(
                            client_id = %client_id,
                            server_id = known,
                            "loop detected, add was applied in the previous round"
                        );
                        let code = self
                            .fail
                            .and_then(|f| f.status_of(&client_id))
                            .unwrap_or(success);
                        incoming.loop_detected = true;
                        incoming.add(client_id, Some(known.to_string()), code);
                        continue;
                    }
                    if !payload.check() {
                        incoming.add(
                            client_id,
                            None,
                            SyncStatus::ClientServerConversionError.code(),
                        );
                        continue;
                    }
                    match importer.import_message_change(None, payload) {
                        Ok(server_id) => incoming.add(client_id, Some(server_id), success),
                        Err(err) => incoming.add(client_id, None, item_status(err)?),
                    }
                }
                ChangeOperation::Modify { server_id, payload } => {
                    let code = if !payload.check() {
                        SyncStatus::ClientServerConversionError.code()
                    } else {
                        let result = match payload.read_flag() {
                            Some(read) if payload.is_read_flag_only() => {
                                importer.import_message_read_flag(server_id, read)
                            }
                            _ => importer
                                .import_message_change(Some(server_id), payload)
                                .map(|_| ()),
                        };
                        match result {
                            Ok(()) => success,
                            Err(err) => item_status(err)?,
                        }
                    };
                    incoming.modify(server_id, code);
                }
                ChangeOperation::Remove { server_id } => {
                    if self.fail.is_some_and(|f| f.was_removed(server_id)) {
                        warn!(server_id = %server_id, "loop detected, item was removed in the previous round");
                        let code = self
                            .fail
                            .and_then(|f| f.status_of(server_id))
                            .unwrap_or(success);
                        incoming.loop_detected = true;
                        incoming.remove(server_id, code);
                        continue;
                    }
                    let code = match self.remove(importer.as_mut(), server_id) {
                        Ok(()) => success,
                        Err(err) => item_status(err)?,
                    };
                    incoming.remove(server_id, code);
                }
                ChangeOperation::Fetch { server_id } => incoming.fetch_ids.push(server_id.clone()),
            }
        }

        importer.state()
    }

    fn remove(&self, importer: &mut dyn Importer, server_id: &str) -> EngineResult<()> {
        if self.collection.deletes_as_moves {
            match self.backend.waste_basket()? {
                Some(trash) if trash != self.collection_id => {
                    return importer
                        .import_message_move(server_id, &trash)
                        .map(|_| ())
                        .map_err(|err| match err {
                            EngineError::Status { message, .. } => {
                                EngineError::status(SyncStatus::ObjectNotFound, message)
                            }
                            other => other,
                        });
                }
                Some(_) => {}
                None => warn!(server_id, "no waste basket, deleting instead of moving"),
            }
        }
        importer.import_message_deletion(server_id)
    }
}

fn item_status(err: EngineError) -> EngineResult<u16> {
    reply_status(
        err,
        SyncStatus::InvalidSyncKey,
        SyncStatus::FolderHierarchyChanged,
    )
}

fn write_replies(
    enc: &mut TagEncoder,
    backend: &dyn Backend,
    collection_id: &str,
    params: &ContentParameters,
    incoming: &Incoming,
) -> EngineResult<()> {
    if !incoming.has_changes() && incoming.fetch_ids.is_empty() {
        return Ok(());
    }

    enc.start_tag(airsync::REPLIES);
    for (client_id, server_id) in &incoming.adds {
        enc.start_tag(airsync::ADD);
        enc.leaf(airsync::CLIENT_ID, client_id)?;
        if let Some(server_id) = server_id {
            enc.leaf(airsync::SERVER_ID, server_id)?;
        }
        let code = incoming
            .statuses
            .get(client_id)
            .copied()
            .unwrap_or(SyncStatus::ClientServerConversionError.code());
        enc.leaf(airsync::STATUS, code)?;
        enc.end_tag()?;
    }

    for (tag, ids) in [
        (airsync::CHANGE, &incoming.modify_ids),
        (airsync::DELETE, &incoming.remove_ids),
    ] {
        for server_id in ids {
            if let Some(code) = incoming.failure(server_id) {
                enc.start_tag(tag);
                enc.leaf(airsync::SERVER_ID, server_id)?;
                enc.leaf(airsync::STATUS, code)?;
                enc.end_tag()?;
            }
        }
    }

    for server_id in &incoming.fetch_ids {
        let (code, item) = match backend.fetch(collection_id, server_id, params) {
            Ok(Some(item)) if backend.is_streamable(server_id, &item) => {
                (SyncStatus::Success.code(), Some(item))
            }
            Ok(Some(_)) => {
                debug!(server_id = %server_id, "item not streamed as requested by the backend");
                (SyncStatus::ClientServerConversionError.code(), None)
            }
            Ok(None) => (SyncStatus::ObjectNotFound.code(), None),
            Err(err) => (item_status(err)?, None),
        };
        enc.start_tag(airsync::FETCH);
        enc.leaf(airsync::SERVER_ID, server_id)?;
        enc.leaf(airsync::STATUS, code)?;
        match item {
            Some(item) => {
                enc.start_tag(airsync::APPLICATION_DATA);
                item.encode(enc)?;
                enc.end_tag()?;
            }
            None => warn!(server_id = %server_id, code, "unable to fetch"),
        }
        enc.end_tag()?;
    }
    enc.end_tag()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_failures_skip_success() {
        let mut incoming = Incoming::default();
        incoming.modify("s1", 1);
        incoming.modify("s2", 8);
        assert_eq!(incoming.failure("s1"), None);
        assert_eq!(incoming.failure("s2"), Some(8));
        assert_eq!(incoming.change_count(), 2);
    }

    #[test]
    fn fail_state_records_adds_and_removes() {
        let mut incoming = Incoming::default();
        incoming.add("c1".into(), Some("m1".into()), 1);
        incoming.add("c2".into(), None, 6);
        incoming.remove("m9", 1);

        let fail = incoming.fail_state(&SyncState::new(vec![1, 2]));
        assert_eq!(fail.server_id_for("c1"), Some("m1"));
        assert_eq!(fail.server_id_for("c2"), None);
        assert!(fail.was_removed("m9"));
        assert_eq!(fail.status_of("c2"), Some(6));
        assert_eq!(fail.failed_sync_state, Some(SyncState::new(vec![1, 2])));
    }
}
