//! MeetingResponse.

use crate::backend::MeetingReply;
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use airsync_protocol::tags::meeting;
use airsync_protocol::{parse_number, MeetingResponseStatus};
use tracing::{debug, warn};

struct MeetingRequest {
    reply: Option<MeetingReply>,
    folder_id: String,
    request_id: String,
}

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let dec = &mut ctx.decoder;
    dec.expect_start(meeting::MEETING_RESPONSE)?;
    let mut requests = Vec::new();
    while dec.start_tag(meeting::REQUEST) {
        let code: u8 = parse_number("user response", &dec.expect_leaf(meeting::USER_RESPONSE)?)?;
        requests.push(MeetingRequest {
            reply: MeetingReply::from_code(code),
            folder_id: dec.expect_leaf(meeting::COLLECTION_ID)?,
            request_id: dec.expect_leaf(meeting::REQUEST_ID)?,
        });
        dec.end_tag()?;
    }
    dec.end_tag()?;

    let enc = &mut ctx.encoder;
    enc.start_tag(meeting::MEETING_RESPONSE);
    for request in &requests {
        let outcome = match request.reply {
            None => Err(EngineError::status(
                MeetingResponseStatus::InvalidRequest,
                "unknown user response",
            )),
            Some(reply) => ctx
                .backend
                .meeting_response(&request.request_id, &request.folder_id, reply),
        };
        let (status, calendar_id) = match outcome {
            Ok(Some(id)) => (MeetingResponseStatus::Success.code(), Some(id)),
            Ok(None) => (MeetingResponseStatus::ServerError.code(), None),
            Err(EngineError::Status { code, message }) => {
                warn!(request = %request.request_id, code, %message, "meeting response failed");
                (code, None)
            }
            Err(err) => return Err(err),
        };
        debug!(request = %request.request_id, status, "meeting response");

        enc.start_tag(meeting::RESULT);
        enc.leaf(meeting::REQUEST_ID, &request.request_id)?;
        enc.leaf(meeting::STATUS, status)?;
        if let Some(id) = calendar_id {
            enc.leaf(meeting::CALENDAR_ID, id)?;
        }
        enc.end_tag()?;
    }
    enc.end_tag()?;
    Ok(())
}
