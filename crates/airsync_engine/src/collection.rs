//! Sync collections.
//!
//! A [`Collection`] holds everything one `Collection` element of a Sync
//! request says, with optional options kept as `Option` so handlers can
//! tell "absent" from "default".

use crate::error::EngineResult;
use airsync_codec::{CodecError, Element, Tag, TagDecoder};
use airsync_protocol::tags::{airsync, base};
use airsync_protocol::{
    parse_flag, parse_number, BodyPreference, ChangeOperation, ConflictPolicy, ContentClass,
    ContentParameters, FilterType, ProtocolError, SyncItem, SyncKey,
};

/// One collection of a Sync request.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    /// Content class as sent by the client.
    pub class: Option<ContentClass>,
    /// Presented key.
    pub sync_key: SyncKey,
    /// Folder server id.
    pub collection_id: Option<String>,
    /// Fields the client supports, when sent.
    pub supported: Option<Vec<Tag>>,
    /// Deleted items go to the waste basket.
    pub deletes_as_moves: bool,
    /// The client wants server changes this round.
    pub get_changes: bool,
    /// Requested window size.
    pub window_size: Option<usize>,
    /// Requested conflict policy.
    pub conflict: Option<ConflictPolicy>,
    /// Content options.
    pub params: ContentParameters,
    /// Client changes, in request order.
    pub commands: Vec<ChangeOperation<SyncItem>>,
}

impl Collection {
    /// A collection presenting `sync_key`, with nothing else set.
    pub fn new(sync_key: SyncKey) -> Self {
        Self {
            class: None,
            sync_key,
            collection_id: None,
            supported: None,
            deletes_as_moves: false,
            get_changes: false,
            window_size: None,
            conflict: None,
            params: ContentParameters::default(),
            commands: Vec::new(),
        }
    }

    /// Reads the children of a `Collection` element, including its end tag.
    pub fn decode(dec: &mut TagDecoder) -> EngineResult<Self> {
        let class = dec
            .leaf(airsync::CLASS)?
            .map(|v| v.parse::<ContentClass>())
            .transpose()?;
        let mut collection = Collection::new(SyncKey::new(dec.expect_leaf(airsync::SYNC_KEY)?));
        collection.class = class;
        collection.collection_id = dec.leaf(airsync::COLLECTION_ID)?;

        if dec.start_tag(airsync::CONVERSATION_MODE) {
            collection.params.conversation_mode = Some(match dec.content() {
                Some(v) => parse_flag("conversation mode", &v)?,
                None => true,
            });
            dec.end_tag()?;
        }

        if dec.start_tag(airsync::SUPPORTED) {
            collection.supported = Some(decode_supported(dec)?);
        }

        if dec.start_tag(airsync::DELETES_AS_MOVES) {
            if let Some(v) = dec.content() {
                collection.deletes_as_moves = parse_flag("deletes as moves", &v)?;
            } else {
                collection.deletes_as_moves = true;
            }
            dec.end_tag()?;
        }

        if dec.start_tag(airsync::GET_CHANGES) {
            collection.get_changes = match dec.content() {
                Some(v) => parse_flag("get changes", &v)?,
                None => true,
            };
            dec.end_tag()?;
        }

        if let Some(v) = dec.leaf(airsync::WINDOW_SIZE)? {
            collection.window_size = Some(parse_number("window size", &v)?);
        }

        if dec.start_tag(airsync::OPTIONS) {
            decode_options(dec, &mut collection)?;
        }

        if dec.start_tag(airsync::COMMANDS) {
            collection.commands = decode_commands(dec)?;
        }

        while !dec.at_end_tag() {
            dec.skip_element()?;
        }
        dec.end_tag()?;
        Ok(collection)
    }

    /// Conflict policy, falling back to `default`.
    pub fn conflict_or(&self, default: ConflictPolicy) -> ConflictPolicy {
        self.conflict.unwrap_or(default)
    }

    /// Returns true if the collection carries client changes other than fetches.
    pub fn has_mutations(&self) -> bool {
        self.commands.iter().any(ChangeOperation::is_mutation)
    }
}

fn decode_supported(dec: &mut TagDecoder) -> EngineResult<Vec<Tag>> {
    let mut tags = Vec::new();
    loop {
        match dec.next_element() {
            Some(Element::End) => return Ok(tags),
            Some(Element::Start(tag)) => {
                tags.push(tag);
                dec.content();
                dec.end_tag()?;
            }
            Some(Element::Content(_)) => {}
            None => return Err(CodecError::UnexpectedEof.into()),
        }
    }
}

fn decode_options(dec: &mut TagDecoder, collection: &mut Collection) -> EngineResult<()> {
    let params = &mut collection.params;
    while !dec.at_end_tag() {
        if let Some(v) = dec.leaf(airsync::FILTER_TYPE)? {
            params.filter_type = Some(v.parse::<FilterType>()?);
        } else if let Some(v) = dec.leaf(airsync::TRUNCATION)? {
            params.truncation = Some(parse_number("truncation", &v)?);
        } else if let Some(v) = dec.leaf(airsync::RTF_TRUNCATION)? {
            params.rtf_truncation = Some(parse_number("rtf truncation", &v)?);
        } else if let Some(v) = dec.leaf(airsync::MIME_SUPPORT)? {
            params.mime_support = Some(parse_number("mime support", &v)?);
        } else if let Some(v) = dec.leaf(airsync::MIME_TRUNCATION)? {
            params.mime_truncation = Some(parse_number("mime truncation", &v)?);
        } else if let Some(v) = dec.leaf(airsync::CONFLICT)? {
            let code: u8 = parse_number("conflict", &v)?;
            collection.conflict = Some(
                ConflictPolicy::from_code(code).ok_or_else(|| ProtocolError::invalid("conflict", v))?,
            );
        } else if dec.start_tag(base::BODY_PREFERENCE) {
            let (body_type, preference) = decode_body_preference(dec)?;
            params.body_preferences.insert(body_type, preference);
        } else {
            dec.skip_element()?;
        }
    }
    dec.end_tag()?;
    Ok(())
}

/// Reads the children of a `BodyPreference` element, including its end tag.
pub(crate) fn decode_body_preference(dec: &mut TagDecoder) -> EngineResult<(u8, BodyPreference)> {
    let mut body_type = 1;
    let mut preference = BodyPreference::default();
    while !dec.at_end_tag() {
        if let Some(v) = dec.leaf(base::TYPE)? {
            body_type = parse_number("body type", &v)?;
        } else if let Some(v) = dec.leaf(base::TRUNCATION_SIZE)? {
            preference.truncation_size = Some(parse_number("truncation size", &v)?);
        } else if let Some(v) = dec.leaf(base::ALL_OR_NONE)? {
            preference.all_or_none = Some(parse_flag("all or none", &v)?);
        } else if let Some(v) = dec.leaf(base::PREVIEW)? {
            preference.preview = Some(parse_number("preview", &v)?);
        } else {
            dec.skip_element()?;
        }
    }
    dec.end_tag()?;
    Ok((body_type, preference))
}

fn decode_commands(dec: &mut TagDecoder) -> EngineResult<Vec<ChangeOperation<SyncItem>>> {
    let mut commands = Vec::new();
    while !dec.at_end_tag() {
        let tag = match dec.next_element() {
            Some(Element::Start(tag)) => tag,
            Some(other) => {
                return Err(CodecError::malformed(format!(
                    "expected sync command, found {}",
                    other.describe()
                ))
                .into())
            }
            None => return Err(CodecError::UnexpectedEof.into()),
        };

        let mut client_id = None;
        let mut server_id = None;
        let mut payload = None;
        while !dec.at_end_tag() {
            if let Some(v) = dec.leaf(airsync::CLIENT_ID)? {
                client_id = Some(v);
            } else if let Some(v) = dec.leaf(airsync::SERVER_ID)? {
                server_id = Some(v);
            } else if dec.start_tag(airsync::APPLICATION_DATA) {
                payload = Some(SyncItem::decode(dec)?);
                dec.end_tag()?;
            } else {
                dec.skip_element()?;
            }
        }
        dec.end_tag()?;

        let required = |id: Option<String>| {
            id.ok_or_else(|| CodecError::malformed(format!("{} without server id", tag.code())))
        };
        commands.push(match tag {
            airsync::ADD => ChangeOperation::Add {
                client_id,
                server_id,
                payload: payload.unwrap_or_default(),
            },
            airsync::CHANGE => ChangeOperation::Modify {
                server_id: required(server_id)?,
                payload: payload.unwrap_or_default(),
            },
            airsync::DELETE => ChangeOperation::Remove {
                server_id: required(server_id)?,
            },
            airsync::FETCH => ChangeOperation::Fetch {
                server_id: required(server_id)?,
            },
            other => {
                return Err(CodecError::malformed(format!(
                    "unknown sync command {}",
                    other.code()
                ))
                .into())
            }
        });
    }
    dec.end_tag()?;
    Ok(commands)
}

/// Outgoing window of a round: the requested size, or `default`, capped.
pub fn effective_window(requested: Option<usize>, default: usize, cap: usize) -> usize {
    requested.unwrap_or(default).min(cap)
}

/// Number of changes streamed for `count` pending changes.
pub(crate) fn streamed_count(window: usize, count: usize) -> usize {
    window.min(count)
}

/// Returns true if changes remain after the window.
pub fn more_available(window: usize, count: usize) -> bool {
    count > window
}

#[cfg(test)]
mod tests {
    use super::*;
    use airsync_codec::TagEncoder;
    use airsync_protocol::tags::email;
    use proptest::prelude::*;

    fn decode(build: impl FnOnce(&mut TagEncoder)) -> EngineResult<Collection> {
        let mut enc = TagEncoder::new();
        enc.start_tag(airsync::COLLECTION);
        build(&mut enc);
        enc.end_tag().unwrap();
        let mut dec = TagDecoder::new(enc.into_elements().unwrap());
        dec.expect_start(airsync::COLLECTION).unwrap();
        Collection::decode(&mut dec)
    }

    #[test]
    fn minimal_collection() {
        let collection = decode(|enc| {
            enc.leaf(airsync::SYNC_KEY, "0").unwrap();
            enc.leaf(airsync::COLLECTION_ID, "inbox").unwrap();
        })
        .unwrap();
        assert!(collection.sync_key.is_initial());
        assert_eq!(collection.collection_id.as_deref(), Some("inbox"));
        assert!(!collection.get_changes);
        assert_eq!(collection.window_size, None);
        assert_eq!(collection.conflict, None);
        assert!(collection.commands.is_empty());
    }

    #[test]
    fn options_and_flags() {
        let collection = decode(|enc| {
            enc.leaf(airsync::CLASS, "Email").unwrap();
            enc.leaf(airsync::SYNC_KEY, "k").unwrap();
            enc.leaf(airsync::COLLECTION_ID, "inbox").unwrap();
            enc.empty_tag(airsync::DELETES_AS_MOVES).unwrap();
            enc.empty_tag(airsync::GET_CHANGES).unwrap();
            enc.leaf(airsync::WINDOW_SIZE, 25).unwrap();
            enc.start_tag(airsync::OPTIONS);
            enc.leaf(airsync::FILTER_TYPE, 3).unwrap();
            enc.leaf(airsync::CONFLICT, 0).unwrap();
            enc.start_tag(base::BODY_PREFERENCE);
            enc.leaf(base::TYPE, 2).unwrap();
            enc.leaf(base::TRUNCATION_SIZE, 5120).unwrap();
            enc.end_tag().unwrap();
            enc.end_tag().unwrap();
        })
        .unwrap();

        assert_eq!(collection.class, Some(ContentClass::Email));
        assert!(collection.deletes_as_moves);
        assert!(collection.get_changes);
        assert_eq!(collection.window_size, Some(25));
        assert_eq!(collection.params.filter_type, Some(FilterType::OneWeek));
        assert_eq!(collection.conflict, Some(ConflictPolicy::ClientWins));
        assert_eq!(
            collection.params.body_preferences[&2].truncation_size,
            Some(5120)
        );
    }

    #[test]
    fn get_changes_zero_disables() {
        let collection = decode(|enc| {
            enc.leaf(airsync::SYNC_KEY, "k").unwrap();
            enc.leaf(airsync::GET_CHANGES, "0").unwrap();
        })
        .unwrap();
        assert!(!collection.get_changes);
    }

    #[test]
    fn commands_in_order() {
        let collection = decode(|enc| {
            enc.leaf(airsync::SYNC_KEY, "k").unwrap();
            enc.start_tag(airsync::COMMANDS);
            enc.start_tag(airsync::ADD);
            enc.leaf(airsync::CLIENT_ID, "c1").unwrap();
            enc.start_tag(airsync::APPLICATION_DATA);
            enc.leaf(email::SUBJECT, "hi").unwrap();
            enc.end_tag().unwrap();
            enc.end_tag().unwrap();
            enc.start_tag(airsync::DELETE);
            enc.leaf(airsync::SERVER_ID, "s1").unwrap();
            enc.end_tag().unwrap();
            enc.start_tag(airsync::FETCH);
            enc.leaf(airsync::SERVER_ID, "s2").unwrap();
            enc.end_tag().unwrap();
            enc.end_tag().unwrap();
        })
        .unwrap();

        assert_eq!(collection.commands.len(), 3);
        assert_eq!(
            collection.commands[0],
            ChangeOperation::Add {
                client_id: Some("c1".into()),
                server_id: None,
                payload: SyncItem::new().with_text(email::SUBJECT, "hi"),
            }
        );
        assert_eq!(collection.commands[2].server_id(), Some("s2"));
        assert!(collection.has_mutations());
    }

    #[test]
    fn change_without_server_id_is_malformed() {
        let result = decode(|enc| {
            enc.leaf(airsync::SYNC_KEY, "k").unwrap();
            enc.start_tag(airsync::COMMANDS);
            enc.start_tag(airsync::CHANGE);
            enc.start_tag(airsync::APPLICATION_DATA);
            enc.end_tag().unwrap();
            enc.end_tag().unwrap();
            enc.end_tag().unwrap();
        });
        assert!(result.is_err());
    }

    #[test]
    fn missing_sync_key_is_malformed() {
        let result = decode(|enc| {
            enc.leaf(airsync::COLLECTION_ID, "inbox").unwrap();
        });
        assert!(result.is_err());
    }

    #[test]
    fn unknown_class_is_rejected() {
        let result = decode(|enc| {
            enc.leaf(airsync::CLASS, "Sms").unwrap();
            enc.leaf(airsync::SYNC_KEY, "k").unwrap();
        });
        assert!(result.is_err());
    }

    #[test]
    fn window_falls_back_to_default_and_cap() {
        assert_eq!(effective_window(None, 100, 512), 100);
        assert_eq!(effective_window(Some(1000), 100, 512), 512);
        assert_eq!(effective_window(Some(0), 100, 512), 0);
    }

    proptest! {
        #[test]
        fn window_streams_min_and_flags_remainder(
            count in 0usize..2000,
            requested in 0usize..1000,
            cap in 1usize..600,
        ) {
            let window = effective_window(Some(requested), 100, cap);
            let streamed = streamed_count(window, count);
            prop_assert_eq!(streamed, count.min(requested).min(cap));
            prop_assert_eq!(more_available(window, count), streamed < count);
        }
    }
}
