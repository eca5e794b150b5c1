//! Ping: the long-poll change notification loop.
//!
//! The watched collections and their export cursors live in the device's
//! [`PingSession`], so every call resumes where the last one stopped.
//! Each cycle drains the exporters into a [`DiscardSink`]; only the fact
//! that something changed is reported, never the changes themselves.

use super::reply_status;
use crate::context::RequestContext;
use crate::error::EngineResult;
use crate::exchange::{pump, DiscardSink};
use crate::provisioning;
use crate::state::{PingCollection, PingSession, SyncState};
use airsync_protocol::tags::ping;
use airsync_protocol::{parse_number, ContentClass, ContentParameters, PingStatus};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Watch list and lifetime sent by the client.
struct PingRequest {
    lifetime: Option<u64>,
    folders: Option<Vec<(String, Option<ContentClass>)>>,
}

fn decode_request(ctx: &mut RequestContext<'_>) -> EngineResult<PingRequest> {
    let mut request = PingRequest {
        lifetime: None,
        folders: None,
    };
    if !ctx.has_elements() {
        return Ok(request);
    }

    let dec = &mut ctx.decoder;
    dec.expect_start(ping::PING)?;
    if let Some(value) = dec.leaf(ping::HEARTBEAT_INTERVAL)? {
        request.lifetime = Some(parse_number("heartbeat interval", &value)?);
    }
    if dec.start_tag(ping::FOLDERS) {
        let mut folders = Vec::new();
        while dec.start_tag(ping::FOLDER) {
            let mut id = None;
            let mut class = None;
            while !dec.at_end_tag() {
                if let Some(value) = dec.leaf(ping::ID)? {
                    id = Some(value);
                } else if let Some(value) = dec.leaf(ping::CLASS)? {
                    class = Some(value.parse::<ContentClass>()?);
                } else {
                    dec.skip_element()?;
                }
            }
            dec.end_tag()?;
            if let Some(id) = id {
                folders.push((id, class));
            }
        }
        dec.end_tag()?;
        request.folders = Some(folders);
    }
    dec.end_tag()?;
    Ok(request)
}

/// Outcome of one export pass over a watched collection.
enum Pass {
    Changed,
    Quiet,
    NoExporter,
}

/// Drains the collection's exporter from its cursor and moves the cursor
/// to the exporter's new state.
fn export_pass(ctx: &RequestContext<'_>, collection: &mut PingCollection) -> EngineResult<Pass> {
    let Some(mut exporter) = ctx.backend.exporter(&collection.server_id)? else {
        return Ok(Pass::NoExporter);
    };
    let params = match collection.class {
        Some(class) => ContentParameters::for_class(class),
        None => ContentParameters::default(),
    };
    exporter.configure(&collection.state, &params)?;
    let count = exporter.change_count();
    pump(exporter.as_mut(), &mut DiscardSink::new(), None)?;
    collection.state = exporter.state()?;
    Ok(if count > 0 { Pass::Changed } else { Pass::Quiet })
}

/// Resolves the watch list: cursors of the previous session are kept for
/// every folder that is still watched.
fn watch_list(
    ctx: &RequestContext<'_>,
    previous: &PingSession,
    folders: Vec<(String, Option<ContentClass>)>,
) -> EngineResult<Vec<PingCollection>> {
    let mut collections = Vec::with_capacity(folders.len());
    for (server_id, class) in folders {
        let class = match class {
            Some(class) => Some(class),
            None => ctx.states.folder_class(&server_id)?,
        };
        let state = previous
            .collections
            .iter()
            .find(|c| c.server_id == server_id)
            .map(|c| c.state.clone())
            .unwrap_or_else(SyncState::empty);
        collections.push(PingCollection {
            server_id,
            class,
            state,
        });
    }
    Ok(collections)
}

/// Runs an export pass, turning a caught condition into a hierarchy
/// resync request.
fn checked_pass(ctx: &RequestContext<'_>, collection: &mut PingCollection) -> EngineResult<Pass> {
    match export_pass(ctx, collection) {
        Ok(pass) => Ok(pass),
        Err(err) => {
            reply_status(
                err,
                PingStatus::FolderHierarchySyncRequired,
                PingStatus::FolderHierarchySyncRequired,
            )?;
            warn!(folder = %collection.server_id, "exporter failed for watched folder");
            Ok(Pass::NoExporter)
        }
    }
}

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let request = decode_request(ctx)?;
    let previous = ctx.states.ping_session()?.unwrap_or_default();
    let policy_key = ctx
        .request
        .policy_key
        .clone()
        .or_else(|| previous.policy_key.clone());

    let max_lifetime = ctx.config.max_ping_lifetime.as_secs();
    let lifetime = request
        .lifetime
        .filter(|secs| *secs > 0)
        .unwrap_or(previous.lifetime)
        .min(max_lifetime);
    let lifetime = if lifetime == 0 { max_lifetime } else { lifetime };

    let mut collections = match request.folders {
        Some(folders) => watch_list(ctx, &previous, folders)?,
        None => previous.collections.clone(),
    };

    let mut status = None;
    for collection in &mut collections {
        if let Err(err) = export_pass(ctx, collection) {
            reply_status(
                err,
                PingStatus::FolderHierarchySyncRequired,
                PingStatus::FolderHierarchySyncRequired,
            )?;
            warn!(folder = %collection.server_id, "cannot set up watched folder");
            status = Some(PingStatus::FolderHierarchySyncRequired);
        }
    }
    if status.is_some() {
        collections.clear();
    }

    let ticket = ctx.pings.begin(ctx.states.device());
    let interval = ctx.config.ping_interval.max(Duration::from_millis(1));
    let budget = Duration::from_secs(lifetime);
    let mut waited = Duration::ZERO;
    let mut changed = Vec::new();
    let mut cycles = 0u64;
    if status.is_none() {
        ctx.announce(&format!("Waiting for changes, lifetime {lifetime}s"), false);
    }

    while status.is_none() && waited < budget {
        cycles += 1;
        let record = ctx.states.record()?;
        if provisioning::is_required(ctx.config.provisioning, &record, policy_key.as_deref()) {
            info!(device = ctx.states.device(), "provisioning required during ping");
            status = Some(PingStatus::FolderHierarchySyncRequired);
            break;
        }
        if ticket.is_superseded() {
            debug!(device = ctx.states.device(), cycles, "ping superseded by a newer request");
            status = Some(PingStatus::HeartbeatExpired);
            break;
        }
        if collections.is_empty() {
            status = Some(PingStatus::FailingParams);
            break;
        }

        for collection in &mut collections {
            match checked_pass(ctx, collection)? {
                Pass::Changed => changed.push(collection.server_id.clone()),
                Pass::Quiet => {}
                Pass::NoExporter => {
                    warn!(folder = %collection.server_id, "watched folder is no longer available");
                    status = Some(PingStatus::FolderHierarchySyncRequired);
                    break;
                }
            }
        }
        if status.is_some() {
            changed.clear();
            collections.clear();
            break;
        }
        if !changed.is_empty() {
            break;
        }

        ctx.sleeper.sleep(interval);
        waited += interval;
    }

    let status = if !changed.is_empty() {
        PingStatus::Changes
    } else {
        status.unwrap_or(PingStatus::HeartbeatExpired)
    };
    debug!(
        cycles,
        generation = ticket.generation(),
        ?status,
        changed = changed.len(),
        "ping finished"
    );

    let enc = &mut ctx.encoder;
    enc.start_tag(ping::PING);
    enc.leaf(ping::STATUS, status.code())?;
    if status == PingStatus::Changes {
        enc.start_tag(ping::FOLDERS);
        for id in &changed {
            enc.leaf(ping::FOLDER, id)?;
        }
        enc.end_tag()?;
    }
    enc.end_tag()?;

    ctx.states.set_ping_session(&PingSession {
        collections,
        lifetime,
        policy_key,
    })?;
    Ok(())
}
