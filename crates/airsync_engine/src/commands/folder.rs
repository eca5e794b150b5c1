//! Folder hierarchy commands: FolderSync, FolderCreate, FolderUpdate,
//! FolderDelete and the legacy GetHierarchy.
//!
//! Hierarchy changes travel through a [`MemoryRelay`] so the device's
//! folder cache sees every folder on its way to or from the backend.

use super::reply_status;
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use crate::exchange::{pump, Exporter, FolderChange, FolderStreamSink, HierarchyImporter};
use crate::relay::MemoryRelay;
use crate::state::SyncState;
use airsync_protocol::tags::folder;
use airsync_protocol::{
    parse_folder_type, Command, ContentParameters, FolderEntry, FolderStatus, FolderType, SyncKey,
};
use tracing::{debug, info, warn};

/// A client-side hierarchy change carried by FolderSync.
enum ClientFolderChange {
    Upsert { is_add: bool, entry: FolderEntry },
    Delete(String),
}

pub(crate) fn handle_folder_sync(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let dec = &mut ctx.decoder;
    dec.expect_start(folder::FOLDER_SYNC)?;
    let key = SyncKey::new(dec.expect_leaf(folder::SYNC_KEY)?);

    let mut changes = Vec::new();
    if dec.start_tag(folder::CHANGES) {
        dec.leaf(folder::COUNT)?;
        loop {
            let tag = [folder::ADD, folder::UPDATE, folder::DELETE]
                .into_iter()
                .find(|tag| dec.start_tag(*tag));
            let Some(tag) = tag else { break };
            let entry = FolderEntry::decode(dec)?;
            dec.end_tag()?;
            changes.push(if tag == folder::DELETE {
                ClientFolderChange::Delete(entry.server_id)
            } else {
                ClientFolderChange::Upsert {
                    is_add: tag == folder::ADD,
                    entry,
                }
            });
        }
        dec.end_tag()?;
    }
    dec.end_tag()?;

    let backend = ctx.backend;
    let mut status = FolderStatus::Success.code();
    let state = match ctx.states.resolve(&key) {
        Ok(state) => state,
        Err(err) => {
            status = reply_status(err, FolderStatus::SyncKeyError, FolderStatus::ServerError)?;
            SyncState::empty()
        }
    };

    // An initial sync rebuilds the cache from scratch.
    let cache = if key.is_initial() {
        Vec::new()
    } else {
        ctx.states.folders()?
    };
    let mut relay = MemoryRelay::new(backend.hierarchy_importer()?, cache, key.is_initial());

    if status == FolderStatus::Success.code() && !changes.is_empty() {
        HierarchyImporter::configure(&mut relay, &state)?;
        for change in &changes {
            if let Err(err) = import_client_change(&mut relay, change) {
                status = reply_status(err, FolderStatus::SyncKeyError, FolderStatus::ServerError)?;
                break;
            }
        }
    } else if !changes.is_empty() {
        warn!(status, "incoming folder changes ignored");
        ctx.announce("Incoming change ignored", true);
    }

    if status == FolderStatus::Success.code() && !is_valid_device_id(ctx.states.device()) {
        warn!(device = ctx.states.device(), "invalid device id");
        status = FolderStatus::ServerError.code();
    }

    if status == FolderStatus::Success.code() {
        let mut exporter = backend.hierarchy_exporter()?;
        let absorbed = exporter
            .configure(&state, &ContentParameters::default())
            .and_then(|()| relay.absorb(exporter.as_mut()));
        if let Err(err) = absorbed {
            status = reply_status(err, FolderStatus::SyncKeyError, FolderStatus::ServerError)?;
        }
    }

    let changed = relay.is_state_changed();
    let new_key = if changed { ctx.states.issue(&key) } else { key.clone() };

    let enc = &mut ctx.encoder;
    enc.start_tag(folder::FOLDER_SYNC);
    enc.leaf(folder::STATUS, status)?;
    let mut count = 0;
    if status == FolderStatus::Success.code() {
        enc.leaf(folder::SYNC_KEY, &new_key)?;
        count = relay.change_count();
        enc.start_tag(folder::CHANGES);
        enc.leaf(folder::COUNT, count)?;
        pump(&mut relay, &mut FolderStreamSink::new(enc), None)?;
        enc.end_tag()?;
    }
    enc.end_tag()?;

    if status == FolderStatus::Success.code() {
        ctx.announce(&format!("Outgoing {count} folders"), true);
        if changed {
            let saved = Exporter::state(&relay)?;
            ctx.states.persist(&new_key, &saved, None)?;
        }
        ctx.states.set_folders(relay.into_cache())?;
        info!(folders = count, key = %new_key, "hierarchy synchronized");
    }
    Ok(())
}

fn import_client_change(relay: &mut MemoryRelay<'_>, change: &ClientFolderChange) -> EngineResult<()> {
    match change {
        ClientFolderChange::Upsert { is_add, entry } => {
            relay.import_folder_change(&FolderChange {
                server_id: (!is_add).then(|| entry.server_id.clone()),
                parent_id: entry.parent_id.clone(),
                display_name: entry.display_name.clone(),
                folder_type: entry.folder_type,
            })?;
        }
        ClientFolderChange::Delete(server_id) => relay.import_folder_deletion(server_id)?,
    }
    Ok(())
}

/// Device ids are non-empty and alphanumeric. Android's internal client
/// sends the id `validate` before it is configured.
fn is_valid_device_id(device: &str) -> bool {
    !device.is_empty()
        && !device.eq_ignore_ascii_case("validate")
        && device.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parsed FolderCreate, FolderUpdate or FolderDelete request.
struct FolderRequest {
    key: SyncKey,
    server_id: Option<String>,
    parent_id: Option<String>,
    display_name: Option<String>,
    folder_type: Option<FolderType>,
}

pub(crate) fn handle_folder_change(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let command = ctx.request.command;
    let root = match command {
        Command::FolderCreate => folder::FOLDER_CREATE,
        Command::FolderUpdate => folder::FOLDER_UPDATE,
        Command::FolderDelete => folder::FOLDER_DELETE,
        other => return Err(EngineError::NotImplemented(other.to_string())),
    };
    let delete = command == Command::FolderDelete;

    let dec = &mut ctx.decoder;
    dec.expect_start(root)?;
    let mut request = FolderRequest {
        key: SyncKey::new(dec.expect_leaf(folder::SYNC_KEY)?),
        server_id: dec.leaf(folder::SERVER_ID)?,
        parent_id: None,
        display_name: None,
        folder_type: None,
    };
    if !delete {
        request.parent_id = dec.leaf(folder::PARENT_ID)?;
        request.display_name = Some(dec.expect_leaf(folder::DISPLAY_NAME)?);
        request.folder_type = dec
            .leaf(folder::TYPE)?
            .map(|v| parse_folder_type(&v))
            .transpose()?;
    }
    dec.end_tag()?;

    let backend = ctx.backend;
    let mut status = FolderStatus::Success.code();
    let mut server_id = request.server_id.clone();
    let new_key = ctx.states.issue(&request.key);
    let mut saved = None;

    match ctx.states.resolve(&request.key) {
        Err(err) => {
            status = reply_status(err, FolderStatus::SyncKeyError, FolderStatus::ServerError)?
        }
        Ok(state) => {
            let mut relay =
                MemoryRelay::new(backend.hierarchy_importer()?, ctx.states.folders()?, false);
            let outcome = apply_folder_change(backend, &mut relay, &state, &request, delete);
            match outcome {
                Ok(id) => {
                    if id.is_some() {
                        server_id = id;
                    }
                    saved = Some(HierarchyImporter::state(&relay)?);
                    ctx.states.set_folders(relay.into_cache())?;
                }
                Err(err) => {
                    status =
                        reply_status(err, FolderStatus::SyncKeyError, FolderStatus::ServerError)?
                }
            }
        }
    }

    let enc = &mut ctx.encoder;
    enc.start_tag(root);
    enc.leaf(folder::STATUS, status)?;
    enc.leaf(folder::SYNC_KEY, &new_key)?;
    if command == Command::FolderCreate {
        enc.leaf(folder::SERVER_ID, server_id.as_deref().unwrap_or_default())?;
    }
    enc.end_tag()?;

    ctx.announce(&format!("Operation status {status}"), true);
    if let Some(saved) = saved {
        ctx.states.persist(&new_key, &saved, None)?;
        debug!(%command, key = %new_key, "hierarchy state saved");
    }
    Ok(())
}

fn apply_folder_change(
    backend: &dyn crate::backend::Backend,
    relay: &mut MemoryRelay<'_>,
    state: &SyncState,
    request: &FolderRequest,
    delete: bool,
) -> EngineResult<Option<String>> {
    let mut exporter = backend.hierarchy_exporter()?;
    exporter.configure(state, &ContentParameters::default())?;
    relay.absorb(exporter.as_mut())?;
    if relay.has_outgoing() {
        return Err(EngineError::status(
            FolderStatus::ServerError,
            "unprocessed hierarchy changes, resynchronize first",
        ));
    }

    HierarchyImporter::configure(relay, state)?;
    if delete {
        let server_id = request.server_id.as_deref().ok_or_else(|| {
            EngineError::status(FolderStatus::FolderDoesNotExist, "folder delete without server id")
        })?;
        relay.import_folder_deletion(server_id)?;
        return Ok(None);
    }

    let entry = relay.import_folder_change(&FolderChange {
        server_id: request.server_id.clone(),
        parent_id: request.parent_id.clone().unwrap_or_else(|| "0".to_string()),
        display_name: request.display_name.clone().unwrap_or_default(),
        folder_type: request.folder_type.unwrap_or(FolderType::UserMail),
    })?;
    Ok(Some(entry.server_id))
}

pub(crate) fn handle_get_hierarchy(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let folders = ctx.backend.hierarchy()?;
    if folders.is_empty() {
        return Err(EngineError::Fatal("backend returned no folders".into()));
    }

    let enc = &mut ctx.encoder;
    enc.start_tag(folder::FOLDERS);
    for entry in &folders {
        enc.start_tag(folder::FOLDER);
        entry.encode(enc)?;
        enc.end_tag()?;
    }
    enc.end_tag()?;

    ctx.states.set_folders(folders)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_validation() {
        assert!(is_valid_device_id("Appl9C8D2F1"));
        assert!(!is_valid_device_id(""));
        assert!(!is_valid_device_id("validate"));
        assert!(!is_valid_device_id("Validate"));
        assert!(is_valid_device_id("validate2"));
        assert!(!is_valid_device_id("dev-1"));
    }
}
