//! Search against the global address list.

use crate::backend::GalEntry;
use crate::context::RequestContext;
use crate::error::EngineResult;
use airsync_codec::TagEncoder;
use airsync_protocol::tags::{gal, search};
use airsync_protocol::{parse_number, SearchStatus, SearchStoreStatus};
use tracing::{debug, warn};

/// Parses a `first-last` range; a bare number starts an open range.
fn parse_range(value: &str, max_results: usize) -> EngineResult<(usize, usize)> {
    let (first, last) = match value.split_once('-') {
        Some((first, last)) => (
            parse_number::<usize>("range", first)?,
            parse_number::<usize>("range", last)?,
        ),
        None => {
            let first = parse_number::<usize>("range", value)?;
            (first, first.saturating_add(max_results.saturating_sub(1)))
        }
    };
    let last = last
        .max(first)
        .min(first.saturating_add(max_results.saturating_sub(1)));
    Ok((first, last))
}

fn write_entry(enc: &mut TagEncoder, entry: &GalEntry) -> EngineResult<()> {
    enc.start_tag(search::RESULT);
    enc.start_tag(search::PROPERTIES);
    enc.leaf(gal::DISPLAY_NAME, entry.display_name.as_deref().unwrap_or("No name"))?;
    let optional = [
        (gal::PHONE, &entry.phone),
        (gal::OFFICE, &entry.office),
        (gal::TITLE, &entry.title),
        (gal::COMPANY, &entry.company),
        (gal::ALIAS, &entry.alias),
        (gal::FIRST_NAME, &entry.first_name),
        (gal::LAST_NAME, &entry.last_name),
        (gal::HOME_PHONE, &entry.home_phone),
        (gal::MOBILE_PHONE, &entry.mobile_phone),
    ];
    for (tag, value) in optional {
        if let Some(value) = value {
            enc.leaf(tag, value)?;
        }
    }
    enc.leaf(gal::EMAIL_ADDRESS, entry.email_address.as_deref().unwrap_or_default())?;
    enc.end_tag()?;
    enc.end_tag()?;
    Ok(())
}

pub(crate) fn handle(ctx: &mut RequestContext<'_>) -> EngineResult<()> {
    let dec = &mut ctx.decoder;
    dec.expect_start(search::SEARCH)?;
    dec.expect_start(search::STORE)?;
    let store = dec.expect_leaf(search::NAME)?.to_uppercase();
    let query = dec.expect_leaf(search::QUERY)?;
    let mut range = "0".to_string();
    if dec.start_tag(search::OPTIONS) {
        while !dec.at_end_tag() {
            if let Some(value) = dec.leaf(search::RANGE)? {
                range = value;
            } else {
                dec.skip_element()?;
            }
        }
        dec.end_tag()?;
    }
    dec.end_tag()?;
    dec.end_tag()?;

    let enc = &mut ctx.encoder;
    enc.start_tag(search::SEARCH);
    if !ctx.backend.supports_search(&store) {
        warn!(%store, "unsupported search store");
        enc.leaf(search::STATUS, SearchStatus::ServerError.code())?;
        enc.end_tag()?;
        return Ok(());
    }

    let range = parse_range(&range, ctx.config.search_max_results)?;
    let results = ctx.backend.search_gal(&query, range)?;
    debug!(%store, found = results.entries.len(), total = results.total, "search done");

    enc.leaf(search::STATUS, SearchStatus::Success.code())?;
    enc.start_tag(search::RESPONSE);
    enc.start_tag(search::STORE);
    enc.leaf(search::STATUS, SearchStoreStatus::Success.code())?;
    for entry in &results.entries {
        write_entry(enc, entry)?;
    }
    if !results.entries.is_empty() {
        enc.leaf(search::RANGE, format!("{}-{}", results.range.0, results.range.1))?;
    }
    enc.leaf(search::TOTAL, results.total)?;
    enc.end_tag()?;
    enc.end_tag()?;
    enc.end_tag()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_forms() {
        assert_eq!(parse_range("0-9", 100).unwrap(), (0, 9));
        assert_eq!(parse_range("0", 100).unwrap(), (0, 99));
        assert_eq!(parse_range("5-2", 100).unwrap(), (5, 5));
        assert_eq!(parse_range("0-500", 50).unwrap(), (0, 49));
        assert!(parse_range("a-b", 10).is_err());
    }

    #[test]
    fn range_near_usize_max_saturates() {
        let top = usize::MAX.to_string();
        assert_eq!(parse_range(&top, 100).unwrap(), (usize::MAX, usize::MAX));
        let range = format!("{}-{top}", usize::MAX - 1);
        assert_eq!(parse_range(&range, 100).unwrap(), (usize::MAX - 1, usize::MAX));
    }
}
