//! ItemOperations: mailbox fetches.

use crate::collection::decode_body_preference;
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use airsync_protocol::tags::{airsync, base, item_operations as ops};
use airsync_protocol::{ContentParameters, ItemOperationsStatus, SyncItem};
use tracing::{debug, warn};

const MAILBOX_STORE: &str = "Mailbox";

#[derive(Debug, Default)]
struct FetchRequest {
    store: String,
    collection_id: Option<String>,
    server_id: Option<String>,
    params: ContentParameters,
}

fn decode_fetch(ctx: &mut RequestContext<'_>) -> EngineResult<FetchRequest> {
    let dec = &mut ctx.decoder;
    let mut fetch = FetchRequest::default();
    while !dec.at_end_tag() {
        if let Some(value) = dec.leaf(ops::STORE)? {
            fetch.store = value;
        } else if let Some(value) = dec.leaf(airsync::COLLECTION_ID)? {
            fetch.collection_id = Some(value);
        } else if let Some(value) = dec.leaf(airsync::SERVER_ID)? {
            fetch.server_id = Some(value);
        } else if dec.start_tag(ops::OPTIONS) {
            while !dec.at_end_tag() {
                if dec.start_tag(base::BODY_PREFERENCE) {
                    let (body_type, preference) = decode_body_preference(dec)?;
                    fetch.params.body_preferences.insert(body_type, preference);
                } else {
                    dec.skip_element()?;
                }
            }
            dec.end_tag()?;
        } else {
            dec.skip_element()?;
        }
    }
    dec.end_tag()?;
    Ok(fetch)
}

fn fetch_item(ctx: &RequestContext<'_>, fetch: &FetchRequest) -> EngineResult<SyncItem> {
    if !fetch.store.eq_ignore_ascii_case(MAILBOX_STORE) {
        return Err(EngineError::status(
            ItemOperationsStatus::UnknownStore,
            format!("unsupported store {}", fetch.store),
        ));
    }
    let (Some(folder), Some(item)) = (&fetch.collection_id, &fetch.server_id) else {
        return Err(EngineError::status(
            ItemOperationsStatus::ProtocolError,
            "fetch without collection or server id",
        ));
    };
    let mut params = fetch.params.clone();
    params.class = ctx.states.folder_class(folder)?;
    ctx.backend.fetch(folder, item, &params)?.ok_or_else(|| {
        EngineError::status(ItemOperationsStatus::ObjectNotFound, format!("item {item} not found"))
    })
}

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    ctx.decoder.expect_start(ops::ITEM_OPERATIONS)?;
    let mut fetches = Vec::new();
    while !ctx.decoder.at_end_tag() {
        if ctx.decoder.start_tag(ops::FETCH) {
            fetches.push(decode_fetch(ctx)?);
        } else {
            warn!("unsupported item operation skipped");
            ctx.decoder.skip_element()?;
        }
    }
    ctx.decoder.end_tag()?;

    let mut results = Vec::with_capacity(fetches.len());
    for fetch in &fetches {
        let result = match fetch_item(ctx, fetch) {
            Ok(item) => Ok(item),
            Err(EngineError::Status { code, message }) => {
                debug!(code, %message, "fetch failed");
                Err(code)
            }
            Err(err) => return Err(err),
        };
        results.push(result);
    }

    let enc = &mut ctx.encoder;
    enc.start_tag(ops::ITEM_OPERATIONS);
    enc.leaf(ops::STATUS, ItemOperationsStatus::Success.code())?;
    enc.start_tag(ops::RESPONSE);
    for (fetch, result) in fetches.iter().zip(results) {
        enc.start_tag(ops::FETCH);
        let status = match &result {
            Ok(_) => ItemOperationsStatus::Success.code(),
            Err(code) => *code,
        };
        enc.leaf(ops::STATUS, status)?;
        if let Some(id) = &fetch.collection_id {
            enc.leaf(airsync::COLLECTION_ID, id)?;
        }
        if let Some(id) = &fetch.server_id {
            enc.leaf(airsync::SERVER_ID, id)?;
        }
        if let Ok(item) = result {
            enc.start_tag(ops::PROPERTIES);
            item.encode(enc)?;
            enc.end_tag()?;
        }
        enc.end_tag()?;
    }
    enc.end_tag()?;
    enc.end_tag()?;
    Ok(())
}
