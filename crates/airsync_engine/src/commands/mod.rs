//! Command handlers.
//!
//! Every handler has the [`CommandHandler`](crate::dispatcher::CommandHandler)
//! shape and is registered by [`Dispatcher::standard`](crate::Dispatcher::standard).

pub(crate) mod attachment;
pub(crate) mod estimate;
pub(crate) mod folder;
pub(crate) mod item_operations;
pub(crate) mod mail;
pub(crate) mod meeting;
pub(crate) mod moves;
pub(crate) mod notify;
pub(crate) mod ping;
pub(crate) mod provision;
pub(crate) mod search;
pub(crate) mod settings;
pub(crate) mod sync;

use crate::error::{EngineError, EngineResult};
use tracing::debug;

/// Converts a caught condition into a reply status code.
///
/// Conditions that abort the request are passed back up.
pub(crate) fn reply_status(
    err: EngineError,
    key_invalid: impl Into<u16>,
    hierarchy_changed: impl Into<u16>,
) -> EngineResult<u16> {
    let code = match &err {
        EngineError::KeyInvalid { .. } => key_invalid.into(),
        EngineError::HierarchyChanged(_) => hierarchy_changed.into(),
        EngineError::Status { code, .. } => *code,
        _ => return Err(err),
    };
    debug!(code, error = %err, "condition written as status");
    Ok(code)
}
