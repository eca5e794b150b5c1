//! Settings: out-of-office, device password, device information and user
//! information, each routed through [`Backend::settings`](crate::Backend::settings).

use crate::backend::{
    DeviceInformation, OofAudience, OofMessage, OofSettings, SettingsReply, SettingsRequest,
};
use crate::context::RequestContext;
use crate::error::EngineResult;
use airsync_codec::{Tag, TagDecoder, TagEncoder};
use airsync_protocol::tags::settings;
use airsync_protocol::{parse_flag, parse_number, SettingsStatus};
use tracing::debug;

fn audience_tag(audience: OofAudience) -> Tag {
    match audience {
        OofAudience::Internal => settings::APPLIES_TO_INTERNAL,
        OofAudience::ExternalKnown => settings::APPLIES_TO_EXTERNAL_KNOWN,
        OofAudience::ExternalUnknown => settings::APPLIES_TO_EXTERNAL_UNKNOWN,
    }
}

fn decode_oof_message(dec: &mut TagDecoder) -> EngineResult<OofMessage> {
    let mut message = OofMessage {
        audience: OofAudience::Internal,
        enabled: false,
        reply_message: String::new(),
        body_type: "TEXT".to_string(),
    };
    while !dec.at_end_tag() {
        if dec.leaf(settings::APPLIES_TO_INTERNAL)?.is_some() {
            message.audience = OofAudience::Internal;
        } else if dec.leaf(settings::APPLIES_TO_EXTERNAL_KNOWN)?.is_some() {
            message.audience = OofAudience::ExternalKnown;
        } else if dec.leaf(settings::APPLIES_TO_EXTERNAL_UNKNOWN)?.is_some() {
            message.audience = OofAudience::ExternalUnknown;
        } else if let Some(value) = dec.leaf(settings::ENABLED)? {
            message.enabled = parse_flag("enabled", &value)?;
        } else if let Some(value) = dec.leaf(settings::REPLY_MESSAGE)? {
            message.reply_message = value;
        } else if let Some(value) = dec.leaf(settings::BODY_TYPE)? {
            message.body_type = value;
        } else {
            dec.skip_element()?;
        }
    }
    dec.end_tag()?;
    Ok(message)
}

fn decode_oof(dec: &mut TagDecoder) -> EngineResult<SettingsRequest> {
    let request = if dec.start_tag(settings::GET) {
        let body_type = dec.leaf(settings::BODY_TYPE)?;
        dec.end_tag()?;
        SettingsRequest::OofGet { body_type }
    } else {
        dec.expect_start(settings::SET)?;
        let mut oof = OofSettings::default();
        while !dec.at_end_tag() {
            if let Some(value) = dec.leaf(settings::OOF_STATE)? {
                oof.state = parse_number("oof state", &value)?;
            } else if let Some(value) = dec.leaf(settings::START_TIME)? {
                oof.start_time = Some(value);
            } else if let Some(value) = dec.leaf(settings::END_TIME)? {
                oof.end_time = Some(value);
            } else if dec.start_tag(settings::OOF_MESSAGE) {
                oof.messages.push(decode_oof_message(dec)?);
            } else {
                dec.skip_element()?;
            }
        }
        dec.end_tag()?;
        SettingsRequest::OofSet(oof)
    };
    dec.end_tag()?;
    Ok(request)
}

fn decode_device_information(dec: &mut TagDecoder) -> EngineResult<SettingsRequest> {
    dec.expect_start(settings::SET)?;
    let mut info = DeviceInformation::default();
    while !dec.at_end_tag() {
        let slot = [
            (settings::MODEL, &mut info.model),
            (settings::IMEI, &mut info.imei),
            (settings::FRIENDLY_NAME, &mut info.friendly_name),
            (settings::OS, &mut info.os),
            (settings::OS_LANGUAGE, &mut info.os_language),
            (settings::PHONE_NUMBER, &mut info.phone_number),
        ]
        .into_iter()
        .find(|(tag, _)| dec.peek_start() == Some(*tag));
        match slot {
            Some((tag, field)) => *field = dec.leaf(tag)?,
            None => dec.skip_element()?,
        }
    }
    dec.end_tag()?;
    dec.end_tag()?;
    Ok(SettingsRequest::DeviceInformation(info))
}

fn decode_request(dec: &mut TagDecoder) -> EngineResult<Vec<(Tag, SettingsRequest)>> {
    dec.expect_start(settings::SETTINGS)?;
    let mut requests = Vec::new();
    while !dec.at_end_tag() {
        if dec.start_tag(settings::OOF) {
            requests.push((settings::OOF, decode_oof(dec)?));
        } else if dec.start_tag(settings::DEVICE_PASSWORD) {
            dec.expect_start(settings::SET)?;
            let password = dec.leaf(settings::PASSWORD)?.unwrap_or_default();
            dec.end_tag()?;
            dec.end_tag()?;
            requests.push((settings::DEVICE_PASSWORD, SettingsRequest::DevicePassword(password)));
        } else if dec.start_tag(settings::DEVICE_INFORMATION) {
            requests.push((settings::DEVICE_INFORMATION, decode_device_information(dec)?));
        } else if dec.start_tag(settings::USER_INFORMATION) {
            if dec.start_tag(settings::GET) {
                dec.end_tag()?;
            }
            dec.end_tag()?;
            requests.push((settings::USER_INFORMATION, SettingsRequest::UserInformation));
        } else {
            dec.skip_element()?;
        }
    }
    dec.end_tag()?;
    Ok(requests)
}

fn write_oof(enc: &mut TagEncoder, oof: &OofSettings) -> EngineResult<()> {
    enc.start_tag(settings::GET);
    enc.leaf(settings::OOF_STATE, oof.state)?;
    if let Some(start) = &oof.start_time {
        enc.leaf(settings::START_TIME, start)?;
    }
    if let Some(end) = &oof.end_time {
        enc.leaf(settings::END_TIME, end)?;
    }
    for message in &oof.messages {
        enc.start_tag(settings::OOF_MESSAGE);
        enc.empty_tag(audience_tag(message.audience))?;
        enc.leaf(settings::ENABLED, u8::from(message.enabled))?;
        enc.leaf(settings::REPLY_MESSAGE, &message.reply_message)?;
        enc.leaf(settings::BODY_TYPE, &message.body_type)?;
        enc.end_tag()?;
    }
    enc.end_tag()?;
    Ok(())
}

fn write_reply(enc: &mut TagEncoder, tag: Tag, reply: &SettingsReply) -> EngineResult<()> {
    enc.start_tag(tag);
    enc.leaf(settings::STATUS, reply.status.code())?;
    if let Some(oof) = &reply.oof {
        write_oof(enc, oof)?;
    }
    if tag == settings::USER_INFORMATION && reply.status == SettingsStatus::Success {
        enc.start_tag(settings::GET);
        enc.start_tag(settings::EMAIL_ADDRESSES);
        for address in &reply.email_addresses {
            enc.leaf(settings::SMTP_ADDRESS, address)?;
        }
        enc.end_tag()?;
        enc.end_tag()?;
    }
    enc.end_tag()?;
    Ok(())
}

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let requests = decode_request(&mut ctx.decoder)?;

    let mut replies = Vec::with_capacity(requests.len());
    for (tag, request) in &requests {
        let reply = ctx.backend.settings(request)?;
        debug!(property = %tag, status = reply.status.code(), "settings property");
        replies.push((*tag, reply));
    }

    let enc = &mut ctx.encoder;
    enc.start_tag(settings::SETTINGS);
    enc.leaf(settings::STATUS, SettingsStatus::Success.code())?;
    for (tag, reply) in &replies {
        write_reply(enc, *tag, reply)?;
    }
    enc.end_tag()?;
    Ok(())
}
