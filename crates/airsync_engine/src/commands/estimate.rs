//! GetItemEstimate: how many changes a sync would send.

use super::reply_status;
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use airsync_protocol::tags::{airsync, estimate};
use airsync_protocol::{ContentClass, ContentParameters, EstimateStatus, FilterType, SyncKey};
use tracing::debug;

#[derive(Debug, Default)]
struct EstimateRequest {
    class: Option<ContentClass>,
    collection_id: Option<String>,
    sync_key: Option<SyncKey>,
    filter_type: Option<FilterType>,
}

fn decode_collection(ctx: &mut RequestContext<'_>) -> EngineResult<EstimateRequest> {
    let dec = &mut ctx.decoder;
    let mut request = EstimateRequest::default();
    while !dec.at_end_tag() {
        if let Some(value) = dec.leaf(estimate::CLASS)? {
            request.class = Some(value.parse()?);
        } else if let Some(value) = dec.leaf(estimate::COLLECTION_ID)? {
            request.collection_id = Some(value);
        } else if let Some(value) = dec.leaf(airsync::SYNC_KEY)? {
            request.sync_key = Some(SyncKey::new(value));
        } else if let Some(value) = dec.leaf(airsync::FILTER_TYPE)? {
            request.filter_type = Some(value.parse()?);
        } else if dec.start_tag(airsync::OPTIONS) {
            while !dec.at_end_tag() {
                if let Some(value) = dec.leaf(airsync::CLASS)? {
                    request.class = Some(value.parse()?);
                } else if let Some(value) = dec.leaf(airsync::FILTER_TYPE)? {
                    request.filter_type = Some(value.parse()?);
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
    Ok(request)
}

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    ctx.decoder.expect_start(estimate::GET_ITEM_ESTIMATE)?;
    ctx.decoder.expect_start(estimate::COLLECTIONS)?;
    let mut requests = Vec::new();
    while ctx.decoder.start_tag(estimate::COLLECTION) {
        requests.push(decode_collection(ctx)?);
    }
    ctx.decoder.end_tag()?;
    ctx.decoder.end_tag()?;

    ctx.encoder.start_tag(estimate::GET_ITEM_ESTIMATE);
    for request in requests {
        let (status, collection_id, count) = match estimate_collection(ctx, &request) {
            Ok((id, count)) => (EstimateStatus::Success.code(), id, count),
            Err(err) => {
                let status = reply_status(
                    err,
                    EstimateStatus::SyncKeyInvalid,
                    EstimateStatus::SyncStateNotPrimed,
                )?;
                (status, request.collection_id.clone().unwrap_or_default(), 0)
            }
        };
        debug!(collection = %collection_id, status, count, "estimated");

        let enc = &mut ctx.encoder;
        enc.start_tag(estimate::RESPONSE);
        enc.leaf(estimate::STATUS, status)?;
        enc.start_tag(estimate::COLLECTION);
        if let Some(class) = request.class {
            enc.leaf(estimate::CLASS, class)?;
        }
        enc.leaf(estimate::COLLECTION_ID, &collection_id)?;
        if status == EstimateStatus::Success.code() {
            enc.leaf(estimate::ESTIMATE, count)?;
        }
        enc.end_tag()?;
        enc.end_tag()?;
    }
    ctx.encoder.end_tag()?;
    Ok(())
}

fn estimate_collection(
    ctx: &RequestContext<'_>,
    request: &EstimateRequest,
) -> EngineResult<(String, usize)> {
    let invalid = |what: &str| EngineError::status(EstimateStatus::CollectionInvalid, what);

    let collection_id = match (&request.collection_id, request.class) {
        (Some(id), _) => id.clone(),
        (None, Some(class)) => ctx
            .states
            .folder_id_for_class(class)?
            .ok_or_else(|| invalid("no folder for class"))?,
        (None, None) => return Err(invalid("collection without id or class")),
    };
    let class = match request.class {
        Some(class) => Some(class),
        None => ctx.states.folder_class(&collection_id)?,
    };
    let key = request
        .sync_key
        .clone()
        .ok_or_else(|| invalid("collection without sync key"))?;
    let state = ctx.states.resolve(&key)?;

    let mut params = ContentParameters {
        class,
        filter_type: request.filter_type,
        ..ContentParameters::default()
    };
    if let Some(max) = ctx.config.max_filter {
        params.clamp_filter(max);
    }

    let mut exporter = ctx
        .backend
        .exporter(&collection_id)?
        .ok_or_else(|| invalid("no exporter for folder"))?;
    exporter.configure(&state, &params)?;
    Ok((collection_id, exporter.change_count()))
}
