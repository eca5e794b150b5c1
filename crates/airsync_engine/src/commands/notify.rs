//! Notify: acknowledged without further action.

use crate::context::RequestContext;
use crate::error::EngineResult;
use airsync_protocol::tags::airnotify;
use tracing::debug;

/// Success, the only status Notify replies with.
const NOTIFY_SUCCESS: u8 = 1;

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    if ctx.has_elements() {
        ctx.decoder.expect_start(airnotify::NOTIFY)?;
        while !ctx.decoder.at_end_tag() {
            ctx.decoder.skip_element()?;
        }
        ctx.decoder.end_tag()?;
    }
    debug!(device = ctx.states.device(), "notify acknowledged");

    let enc = &mut ctx.encoder;
    enc.start_tag(airnotify::NOTIFY);
    enc.leaf(airnotify::STATUS, NOTIFY_SUCCESS)?;
    enc.empty_tag(airnotify::VALID_CARRIER_PROFILES)?;
    enc.end_tag()?;
    Ok(())
}
