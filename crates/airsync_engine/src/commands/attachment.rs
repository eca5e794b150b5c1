//! GetAttachment: raw attachment bytes.

use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use airsync_protocol::{CommonStatus, ItemOperationsStatus};
use tracing::debug;

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let name = ctx
        .request
        .query
        .attachment_name
        .clone()
        .ok_or_else(|| EngineError::status(ItemOperationsStatus::InvalidAttachment, "no attachment name"))?;
    let attachment = ctx.backend.attachment_data(&name)?.ok_or_else(|| {
        EngineError::status(CommonStatus::ItemNotFound, format!("attachment {name} not found"))
    })?;
    debug!(%name, bytes = attachment.data.len(), "attachment streamed");
    ctx.respond_raw(attachment.content_type, attachment.data);
    Ok(())
}
