//! Content classes and content parameters.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of content a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentClass {
    /// Mail messages.
    Email,
    /// Appointments.
    Calendar,
    /// Contacts.
    Contacts,
    /// Tasks.
    Tasks,
    /// Notes.
    Notes,
}

impl ContentClass {
    /// Wire name of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentClass::Email => "Email",
            ContentClass::Calendar => "Calendar",
            ContentClass::Contacts => "Contacts",
            ContentClass::Tasks => "Tasks",
            ContentClass::Notes => "Notes",
        }
    }
}

impl fmt::Display for ContentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentClass {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        match s {
            "Email" => Ok(ContentClass::Email),
            "Calendar" => Ok(ContentClass::Calendar),
            "Contacts" => Ok(ContentClass::Contacts),
            "Tasks" => Ok(ContentClass::Tasks),
            "Notes" => Ok(ContentClass::Notes),
            other => Err(ProtocolError::invalid("class", other)),
        }
    }
}

/// Time window of items to synchronize. The dated windows are ordered
/// from narrowest to widest; `All` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterType {
    /// No filter.
    All = 0,
    /// One day back.
    OneDay = 1,
    /// Three days back.
    ThreeDays = 2,
    /// One week back.
    OneWeek = 3,
    /// Two weeks back.
    TwoWeeks = 4,
    /// One month back.
    OneMonth = 5,
    /// Three months back.
    ThreeMonths = 6,
    /// Six months back.
    SixMonths = 7,
    /// Incomplete tasks only.
    IncompleteTasks = 8,
}

impl FilterType {
    /// Numeric wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Converts from a numeric wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => FilterType::All,
            1 => FilterType::OneDay,
            2 => FilterType::ThreeDays,
            3 => FilterType::OneWeek,
            4 => FilterType::TwoWeeks,
            5 => FilterType::OneMonth,
            6 => FilterType::ThreeMonths,
            7 => FilterType::SixMonths,
            8 => FilterType::IncompleteTasks,
            _ => return None,
        })
    }

    /// Window length in days, `None` for unbounded filters.
    pub fn days(self) -> Option<u32> {
        match self {
            FilterType::All | FilterType::IncompleteTasks => None,
            FilterType::OneDay => Some(1),
            FilterType::ThreeDays => Some(3),
            FilterType::OneWeek => Some(7),
            FilterType::TwoWeeks => Some(14),
            FilterType::OneMonth => Some(31),
            FilterType::ThreeMonths => Some(93),
            FilterType::SixMonths => Some(186),
        }
    }
}

impl FromStr for FilterType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(FilterType::from_code)
            .ok_or_else(|| ProtocolError::invalid("filter type", s))
    }
}

/// Body format the client would like for one body type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyPreference {
    /// Maximum body size in bytes.
    pub truncation_size: Option<u32>,
    /// Send the whole body or nothing.
    pub all_or_none: Option<bool>,
    /// Length of the preview text.
    pub preview: Option<u32>,
}

/// Per-collection options that shape exported content.
///
/// Every option is optional; `None` means the client did not send it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentParameters {
    /// Content class of the collection.
    pub class: Option<ContentClass>,
    /// Time window of items.
    pub filter_type: Option<FilterType>,
    /// Legacy plain-text truncation code.
    pub truncation: Option<u32>,
    /// Legacy RTF truncation code.
    pub rtf_truncation: Option<u32>,
    /// MIME support level (0 never, 1 S/MIME only, 2 always).
    pub mime_support: Option<u8>,
    /// MIME truncation code.
    pub mime_truncation: Option<u32>,
    /// Body preferences keyed by body type (1 plain, 2 HTML, 3 RTF, 4 MIME).
    pub body_preferences: BTreeMap<u8, BodyPreference>,
    /// Conversation mode flag.
    pub conversation_mode: Option<bool>,
}

impl ContentParameters {
    /// Parameters for a class with no further options.
    pub fn for_class(class: ContentClass) -> Self {
        Self {
            class: Some(class),
            ..Self::default()
        }
    }

    /// Returns the preference for a body type, creating it if absent.
    pub fn body_preference_mut(&mut self, body_type: u8) -> &mut BodyPreference {
        self.body_preferences.entry(body_type).or_default()
    }

    /// Narrows the filter to at most `max` when the client asked for a
    /// wider or no window. `IncompleteTasks` is not a date window and is
    /// left as sent.
    pub fn clamp_filter(&mut self, max: FilterType) {
        if max == FilterType::All {
            return;
        }
        match self.filter_type {
            Some(FilterType::IncompleteTasks) => {}
            Some(current) if current != FilterType::All && current <= max => {}
            _ => self.filter_type = Some(max),
        }
    }
}

/// Parses a protocol boolean (`0`/`1`).
pub fn parse_flag(field: &'static str, value: &str) -> ProtocolResult<bool> {
    match value.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ProtocolError::invalid(field, other)),
    }
}

/// Parses a protocol unsigned number.
pub fn parse_number<T: FromStr>(field: &'static str, value: &str) -> ProtocolResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ProtocolError::invalid(field, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names() {
        assert_eq!("Calendar".parse::<ContentClass>().unwrap(), ContentClass::Calendar);
        assert!("Mail".parse::<ContentClass>().is_err());
        assert_eq!(ContentClass::Tasks.to_string(), "Tasks");
    }

    #[test]
    fn filter_parse() {
        assert_eq!("3".parse::<FilterType>().unwrap(), FilterType::OneWeek);
        assert!("9".parse::<FilterType>().is_err());
    }

    #[test]
    fn clamp_filter_narrows_wide_windows() {
        let mut params = ContentParameters::default();
        params.clamp_filter(FilterType::TwoWeeks);
        assert_eq!(params.filter_type, Some(FilterType::TwoWeeks));

        params.filter_type = Some(FilterType::All);
        params.clamp_filter(FilterType::TwoWeeks);
        assert_eq!(params.filter_type, Some(FilterType::TwoWeeks));

        params.filter_type = Some(FilterType::SixMonths);
        params.clamp_filter(FilterType::TwoWeeks);
        assert_eq!(params.filter_type, Some(FilterType::TwoWeeks));

        params.filter_type = Some(FilterType::OneDay);
        params.clamp_filter(FilterType::TwoWeeks);
        assert_eq!(params.filter_type, Some(FilterType::OneDay));

        params.filter_type = Some(FilterType::TwoWeeks);
        params.clamp_filter(FilterType::TwoWeeks);
        assert_eq!(params.filter_type, Some(FilterType::TwoWeeks));
    }

    #[test]
    fn clamp_filter_leaves_task_filter_alone() {
        let mut params = ContentParameters::default();
        params.filter_type = Some(FilterType::IncompleteTasks);
        params.clamp_filter(FilterType::OneWeek);
        assert_eq!(params.filter_type, Some(FilterType::IncompleteTasks));

        params.filter_type = Some(FilterType::ThreeMonths);
        params.clamp_filter(FilterType::All);
        assert_eq!(params.filter_type, Some(FilterType::ThreeMonths));
    }

    #[test]
    fn body_preference_created_on_demand() {
        let mut params = ContentParameters::default();
        params.body_preference_mut(2).truncation_size = Some(5120);
        assert_eq!(params.body_preferences[&2].truncation_size, Some(5120));
    }

    #[test]
    fn flags() {
        assert!(parse_flag("flag", "1").unwrap());
        assert!(!parse_flag("flag", " 0").unwrap());
        assert!(parse_flag("flag", "yes").is_err());
    }
}
