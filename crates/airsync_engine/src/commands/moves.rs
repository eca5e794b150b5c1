//! MoveItems.

use super::reply_status;
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use crate::state::SyncState;
use airsync_protocol::tags::moves;
use airsync_protocol::MoveItemsStatus;
use tracing::debug;

struct Move {
    source_id: String,
    source_folder: String,
    destination_folder: String,
}

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let dec = &mut ctx.decoder;
    dec.expect_start(moves::MOVES)?;
    let mut requested = Vec::new();
    while dec.start_tag(moves::MOVE) {
        requested.push(Move {
            source_id: dec.expect_leaf(moves::SRC_MSG_ID)?,
            source_folder: dec.expect_leaf(moves::SRC_FLD_ID)?,
            destination_folder: dec.expect_leaf(moves::DST_FLD_ID)?,
        });
        dec.end_tag()?;
    }
    dec.end_tag()?;

    let enc = &mut ctx.encoder;
    enc.start_tag(moves::MOVES);
    for mv in &requested {
        let (status, new_id) = match move_item(ctx.backend, ctx.config, mv) {
            Ok(new_id) => (MoveItemsStatus::Success.code(), Some(new_id)),
            Err(err) => (
                reply_status(
                    err,
                    MoveItemsStatus::InvalidSourceId,
                    MoveItemsStatus::InvalidSourceId,
                )?,
                None,
            ),
        };
        debug!(item = %mv.source_id, status, "move processed");

        enc.start_tag(moves::RESPONSE);
        enc.leaf(moves::SRC_MSG_ID, &mv.source_id)?;
        enc.leaf(moves::STATUS, status)?;
        if let Some(new_id) = new_id {
            enc.leaf(moves::DST_MSG_ID, new_id)?;
        }
        enc.end_tag()?;
    }
    enc.end_tag()?;
    Ok(())
}

fn move_item(
    backend: &dyn crate::backend::Backend,
    config: &crate::config::EngineConfig,
    mv: &Move,
) -> EngineResult<String> {
    if mv.source_folder == mv.destination_folder {
        return Err(EngineError::status(
            MoveItemsStatus::SameSourceAndDestination,
            "source and destination are the same folder",
        ));
    }
    let mut importer = backend.importer(&mv.source_folder)?.ok_or_else(|| {
        EngineError::HierarchyChanged(format!("no importer for folder {}", mv.source_folder))
    })?;
    importer.configure(&SyncState::empty(), config.default_conflict)?;
    importer.import_message_move(&mv.source_id, &mv.destination_folder)
}
