//! Device policy handshake.
//!
//! A device walks `Unprovisioned -> PolicyOffered -> PolicyAccepted`. The
//! first Provision request is answered with the policy document and a
//! temporary key; the acknowledgement of that key is answered with the
//! final key, which every later request must present while the gate is
//! enforced.

use crate::error::{EngineError, EngineResult};
use crate::state::{DeviceRecord, PolicyState, WipeStatus};
use airsync_codec::TagEncoder;
use airsync_protocol::tags::provision;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Smallest policy key ever issued; keys always have ten digits.
const MIN_POLICY_KEY: u32 = 1_000_000_000;

const WAP_PROVISIONING_DOC: &str = "<wap-provisioningdoc><characteristic type=\"SecurityPolicy\">\
<parm name=\"4131\" value=\"1\"/><parm name=\"4133\" value=\"1\"/></characteristic></wap-provisioningdoc>";

/// Format of the policy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    /// `MS-WAP-Provisioning-XML`, carried as text.
    WapXml,
    /// `MS-EAS-Provisioning-WBXML`, carried as elements.
    EasWbxml,
}

impl PolicyType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::WapXml => "MS-WAP-Provisioning-XML",
            PolicyType::EasWbxml => "MS-EAS-Provisioning-WBXML",
        }
    }

    /// Writes the document into an open `Data` element.
    pub fn write_document(&self, enc: &mut TagEncoder) -> EngineResult<()> {
        match self {
            PolicyType::WapXml => enc.content(WAP_PROVISIONING_DOC),
            PolicyType::EasWbxml => {
                enc.start_tag(provision::EAS_PROVISION_DOC);
                enc.leaf(provision::DEVICE_PASSWORD_ENABLED, 0)?;
                enc.leaf(provision::ATTACHMENTS_ENABLED, 1)?;
                enc.leaf(provision::MAX_INACTIVITY_TIME, 900)?;
                enc.end_tag()?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MS-WAP-Provisioning-XML" => Ok(PolicyType::WapXml),
            "MS-EAS-Provisioning-WBXML" => Ok(PolicyType::EasWbxml),
            other => Err(EngineError::Fatal(format!("unsupported policy type {other}"))),
        }
    }
}

/// Issues a fresh random policy key.
pub fn issue_policy_key() -> String {
    rand::thread_rng()
        .gen_range(MIN_POLICY_KEY..=u32::MAX)
        .to_string()
}

/// Result of acknowledging an offered policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    /// The key matched the offer; the final key was stored.
    Accepted(String),
    /// The key is not the one offered.
    Mismatch,
}

/// Records a policy offer under a new temporary key, returning the key.
pub fn offer(record: &mut DeviceRecord) -> String {
    let temp_key = issue_policy_key();
    record.policy = PolicyState::PolicyOffered {
        temp_key: temp_key.clone(),
    };
    temp_key
}

/// Completes the handshake if `presented` is the offered temporary key.
///
/// A device that already accepted and acknowledges its final key again
/// gets a new final key.
pub fn acknowledge(record: &mut DeviceRecord, presented: &str) -> Acknowledgement {
    let matches = match &record.policy {
        PolicyState::PolicyOffered { temp_key } => temp_key == presented,
        PolicyState::PolicyAccepted { key } => key == presented,
        PolicyState::Unprovisioned => false,
    };
    if !matches {
        return Acknowledgement::Mismatch;
    }
    let key = issue_policy_key();
    record.policy = PolicyState::PolicyAccepted { key: key.clone() };
    Acknowledgement::Accepted(key)
}

/// Returns true if the device must go through Provision before other
/// commands are served.
pub fn is_required(enforced: bool, record: &DeviceRecord, presented: Option<&str>) -> bool {
    if !enforced {
        return false;
    }
    if record.wipe == WipeStatus::Requested {
        return true;
    }
    match (record.policy_key(), presented) {
        (Some(key), Some(presented)) => key != presented,
        _ => true,
    }
}

/// Returns true if authentication must run before a Provision request.
pub fn needs_authentication(wipe: WipeStatus) -> bool {
    wipe < WipeStatus::Pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use airsync_codec::Element;

    #[test]
    fn keys_have_ten_digits() {
        for _ in 0..100 {
            let key = issue_policy_key();
            assert_eq!(key.len(), 10);
            assert!(key.parse::<u32>().unwrap() >= MIN_POLICY_KEY);
        }
    }

    #[test]
    fn handshake_moves_through_states() {
        let mut record = DeviceRecord::default();
        assert!(is_required(true, &record, None));

        let temp = offer(&mut record);
        assert!(is_required(true, &record, Some(&temp)));
        assert_eq!(acknowledge(&mut record, "1234567890"), Acknowledgement::Mismatch);

        let Acknowledgement::Accepted(key) = acknowledge(&mut record, &temp) else {
            panic!("offer should be accepted");
        };
        assert_eq!(record.policy_key(), Some(key.as_str()));
        assert!(!is_required(true, &record, Some(&key)));
        assert!(is_required(true, &record, Some(&temp)));
    }

    #[test]
    fn gate_off_requires_nothing() {
        assert!(!is_required(false, &DeviceRecord::default(), None));
    }

    #[test]
    fn requested_wipe_forces_provisioning() {
        let mut record = DeviceRecord::default();
        let temp = offer(&mut record);
        let Acknowledgement::Accepted(key) = acknowledge(&mut record, &temp) else {
            panic!("offer should be accepted");
        };
        record.wipe = WipeStatus::Requested;
        assert!(is_required(true, &record, Some(&key)));
    }

    #[test]
    fn authentication_skipped_for_pending_wipes() {
        assert!(needs_authentication(WipeStatus::Normal));
        assert!(!needs_authentication(WipeStatus::Pending));
        assert!(!needs_authentication(WipeStatus::Requested));
    }

    #[test]
    fn policy_type_names() {
        assert_eq!("MS-EAS-Provisioning-WBXML".parse::<PolicyType>().unwrap(), PolicyType::EasWbxml);
        assert!("MS-Other".parse::<PolicyType>().is_err());
        assert_eq!(PolicyType::WapXml.to_string(), "MS-WAP-Provisioning-XML");
    }

    #[test]
    fn wap_document_is_text() {
        let mut enc = TagEncoder::new();
        enc.start_tag(provision::DATA);
        PolicyType::WapXml.write_document(&mut enc).unwrap();
        enc.end_tag().unwrap();
        let elements = enc.into_elements().unwrap();
        assert!(matches!(&elements[1], Element::Content(text) if text.starts_with("<wap-provisioningdoc>")));
    }
}
