//! SendMail, SmartForward and SmartReply.
//!
//! Clients either post the raw RFC 822 message with the parent item in the
//! query string, or wrap it with its options in a ComposeMail tree. Only
//! the tree form gets a status reply; a failed plain submission fails the
//! request.

use crate::backend::{ComposeKind, OutgoingMail, ParentItem};
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use airsync_codec::Tag;
use airsync_protocol::tags::compose;
use airsync_protocol::{Command, CommonStatus};
use tracing::{info, warn};

fn compose_kind(command: Command) -> EngineResult<(ComposeKind, Tag)> {
    match command {
        Command::SendMail => Ok((ComposeKind::New, compose::SEND_MAIL)),
        Command::SmartForward => Ok((ComposeKind::Forward, compose::SMART_FORWARD)),
        Command::SmartReply => Ok((ComposeKind::Reply, compose::SMART_REPLY)),
        other => Err(EngineError::NotImplemented(other.to_string())),
    }
}

fn decode_tree(ctx: &mut RequestContext<'_>, kind: ComposeKind, root: Tag) -> EngineResult<OutgoingMail> {
    let dec = &mut ctx.decoder;
    dec.expect_start(root)?;
    let mut mail = OutgoingMail {
        rfc822: Vec::new(),
        kind,
        parent: None,
        save_in_sent: false,
        replace_mime: false,
        client_id: None,
    };
    while !dec.at_end_tag() {
        if let Some(value) = dec.leaf(compose::CLIENT_ID)? {
            mail.client_id = Some(value);
        } else if dec.leaf(compose::SAVE_IN_SENT_ITEMS)?.is_some() {
            mail.save_in_sent = true;
        } else if dec.leaf(compose::REPLACE_MIME)?.is_some() {
            mail.replace_mime = true;
        } else if dec.start_tag(compose::SOURCE) {
            let mut folder_id = None;
            let mut item_id = None;
            while !dec.at_end_tag() {
                if let Some(value) = dec.leaf(compose::FOLDER_ID)? {
                    folder_id = Some(value);
                } else if let Some(value) = dec.leaf(compose::ITEM_ID)? {
                    item_id = Some(value);
                } else {
                    dec.skip_element()?;
                }
            }
            dec.end_tag()?;
            mail.parent = item_id.map(|item_id| ParentItem { folder_id, item_id });
        } else if let Some(value) = dec.leaf(compose::MIME)? {
            mail.rfc822 = value.into_bytes();
        } else {
            dec.skip_element()?;
        }
    }
    dec.end_tag()?;
    Ok(mail)
}

fn from_plain(ctx: &RequestContext<'_>, kind: ComposeKind) -> EngineResult<OutgoingMail> {
    let query = &ctx.request.query;
    Ok(OutgoingMail {
        rfc822: ctx.plain_body().map(<[u8]>::to_vec).unwrap_or_default(),
        kind,
        parent: query.item_id.clone().map(|item_id| ParentItem {
            folder_id: query.collection_id.clone(),
            item_id,
        }),
        save_in_sent: query.save_in_sent,
        replace_mime: false,
        client_id: None,
    })
}

fn validate(mail: &OutgoingMail) -> EngineResult<()> {
    if mail.rfc822.is_empty() {
        return Err(EngineError::status(CommonStatus::InvalidMime, "empty message"));
    }
    if mail.kind != ComposeKind::New && mail.parent.is_none() {
        return Err(EngineError::status(CommonStatus::ItemNotFound, "no parent item"));
    }
    Ok(())
}

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let (kind, root) = compose_kind(ctx.request.command)?;

    if !ctx.has_elements() {
        let mail = from_plain(ctx, kind)?;
        validate(&mail)?;
        ctx.backend.send_mail(&mail)?;
        info!(?kind, bytes = mail.rfc822.len(), "message submitted");
        return Ok(());
    }

    let mail = decode_tree(ctx, kind, root)?;
    let outcome = validate(&mail).and_then(|()| ctx.backend.send_mail(&mail));
    match outcome {
        Ok(()) => {
            info!(?kind, client_id = ?mail.client_id, "message submitted");
            Ok(())
        }
        Err(EngineError::Status { code, message }) => {
            warn!(?kind, code, %message, "message submission failed");
            let enc = &mut ctx.encoder;
            enc.start_tag(root);
            enc.leaf(compose::STATUS, code)?;
            enc.end_tag()?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_needs_parent() {
        let mail = OutgoingMail {
            rfc822: b"Subject: x\r\n\r\nbody".to_vec(),
            kind: ComposeKind::Forward,
            parent: None,
            save_in_sent: false,
            replace_mime: false,
            client_id: None,
        };
        let err = validate(&mail).unwrap_err();
        assert_eq!(err.status_code(), Some(CommonStatus::ItemNotFound.code()));
    }

    #[test]
    fn empty_message_is_invalid_mime() {
        let mail = OutgoingMail {
            rfc822: Vec::new(),
            kind: ComposeKind::New,
            parent: None,
            save_in_sent: true,
            replace_mime: false,
            client_id: None,
        };
        assert_eq!(validate(&mail).unwrap_err().status_code(), Some(107));
    }
}
