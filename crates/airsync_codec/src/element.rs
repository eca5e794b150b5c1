//! Tag-stream elements.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tag identifier: a code page plus a token within that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    /// Code page (namespace) of the tag.
    pub page: u8,
    /// Token within the code page.
    pub token: u8,
}

impl Tag {
    /// Creates a tag from its code page and token.
    pub const fn new(page: u8, token: u8) -> Self {
        Self { page, token }
    }

    /// Returns the tag packed as `page << 8 | token`.
    pub fn code(&self) -> u16 {
        (u16::from(self.page) << 8) | u16::from(self.token)
    }

    /// Unpacks a tag from `page << 8 | token`.
    pub fn from_code(code: u16) -> Self {
        Self {
            page: (code >> 8) as u8,
            token: (code & 0xff) as u8,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}", self.page, self.token)
    }
}

/// One element of a tag stream.
///
/// Every `Start` is matched by exactly one `End`; an element without
/// content is a `Start` immediately followed by its `End`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element {
    /// Opens an element.
    Start(Tag),
    /// Closes the innermost open element.
    End,
    /// Text content of the innermost open element.
    Content(String),
}

impl Element {
    /// Returns the tag if this is a start element.
    pub fn start_tag(&self) -> Option<Tag> {
        match self {
            Element::Start(tag) => Some(*tag),
            _ => None,
        }
    }

    /// Returns true if this is an end element.
    pub fn is_end(&self) -> bool {
        matches!(self, Element::End)
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Element::Start(tag) => format!("start tag {tag}"),
            Element::End => "end tag".to_string(),
            Element::Content(text) => format!("content {:?}", truncate(text, 32)),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
