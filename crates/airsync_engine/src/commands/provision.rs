//! Provision: the policy handshake and remote wipe.

use crate::context::RequestContext;
use crate::error::EngineResult;
use crate::provisioning::{self, Acknowledgement, PolicyType};
use crate::server::authenticate;
use crate::state::WipeStatus;
use airsync_protocol::tags::provision;
use airsync_protocol::ProvisionStatus;
use tracing::{info, warn};

/// Policy status for a policy type the server does not know.
const POLICY_TYPE_UNKNOWN: u16 = 3;

#[derive(Debug, Default)]
struct ProvisionRequest {
    policy_type: Option<String>,
    policy_key: Option<String>,
    policy_status: Option<String>,
    wipe_status: Option<String>,
}

fn decode_request(ctx: &mut RequestContext<'_>) -> EngineResult<ProvisionRequest> {
    let mut request = ProvisionRequest::default();
    let dec = &mut ctx.decoder;
    dec.expect_start(provision::PROVISION)?;
    while !dec.at_end_tag() {
        if dec.start_tag(provision::POLICIES) {
            dec.expect_start(provision::POLICY)?;
            request.policy_type = Some(dec.expect_leaf(provision::POLICY_TYPE)?);
            request.policy_key = dec.leaf(provision::POLICY_KEY)?;
            request.policy_status = dec.leaf(provision::STATUS)?;
            dec.end_tag()?;
            dec.end_tag()?;
        } else if dec.start_tag(provision::REMOTE_WIPE) {
            request.wipe_status = dec.leaf(provision::STATUS)?;
            dec.end_tag()?;
        } else {
            dec.skip_element()?;
        }
    }
    dec.end_tag()?;
    Ok(request)
}

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let mut record = ctx.states.record()?;

    // A device with a pending wipe must get the wipe even if its
    // credentials no longer work.
    if provisioning::needs_authentication(record.wipe) {
        authenticate(ctx.backend, ctx.request)?;
    }

    let request = decode_request(ctx)?;
    let wipe_acknowledged = request.wipe_status.as_deref() == Some("1");

    let enc = &mut ctx.encoder;
    enc.start_tag(provision::PROVISION);
    enc.leaf(provision::STATUS, ProvisionStatus::Success.code())?;

    if record.wipe > WipeStatus::Normal {
        enc.empty_tag(provision::REMOTE_WIPE)?;
        record.wipe = if wipe_acknowledged {
            info!(device = ctx.states.device(), "remote wipe acknowledged");
            WipeStatus::Wiped
        } else {
            WipeStatus::Requested
        };
    }

    if let Some(name) = &request.policy_type {
        enc.start_tag(provision::POLICIES);
        enc.start_tag(provision::POLICY);
        enc.leaf(provision::POLICY_TYPE, name)?;
        match name.parse::<PolicyType>() {
            Err(_) => {
                warn!(policy_type = %name, "unsupported policy type");
                enc.leaf(provision::STATUS, POLICY_TYPE_UNKNOWN)?;
            }
            Ok(policy_type) => match &request.policy_key {
                None => {
                    let temp_key = provisioning::offer(&mut record);
                    enc.leaf(provision::STATUS, ProvisionStatus::Success.code())?;
                    enc.leaf(provision::POLICY_KEY, &temp_key)?;
                    enc.start_tag(provision::DATA);
                    policy_type.write_document(enc)?;
                    enc.end_tag()?;
                    info!(device = ctx.states.device(), "policy offered");
                }
                Some(presented) => match provisioning::acknowledge(&mut record, presented) {
                    Acknowledgement::Accepted(key) => {
                        enc.leaf(provision::STATUS, ProvisionStatus::Success.code())?;
                        enc.leaf(provision::POLICY_KEY, &key)?;
                        info!(
                            device = ctx.states.device(),
                            status = ?request.policy_status,
                            "policy accepted"
                        );
                    }
                    Acknowledgement::Mismatch => {
                        warn!(device = ctx.states.device(), "policy key mismatch");
                        enc.leaf(provision::STATUS, ProvisionStatus::PolicyKeyMismatch.code())?;
                    }
                },
            },
        }
        enc.end_tag()?;
        enc.end_tag()?;
    }
    enc.end_tag()?;

    ctx.states.save_record(&record)?;
    Ok(())
}
