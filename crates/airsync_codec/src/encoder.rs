//! Tag-stream writer.

use crate::element::{Element, Tag};
use crate::error::{CodecError, CodecResult};
use crate::frame::to_cbor;
use std::fmt::Display;

/// Writes one reply tree as a stream of elements.
///
/// The writer records whether output has started so the caller can
/// tell a handler that failed before writing anything from one that
/// failed halfway.
#[derive(Debug, Clone, Default)]
pub struct TagEncoder {
    elements: Vec<Element>,
    open: Vec<Tag>,
    roots: usize,
}

impl TagEncoder {
    /// Create a new, empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once any element has been written.
    pub fn is_started(&self) -> bool {
        !self.elements.is_empty()
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Returns true if every opened element has been closed.
    pub fn is_balanced(&self) -> bool {
        self.open.is_empty()
    }

    /// Opens an element.
    pub fn start_tag(&mut self, tag: Tag) {
        if self.open.is_empty() {
            self.roots += 1;
        }
        self.open.push(tag);
        self.elements.push(Element::Start(tag));
    }

    /// Closes the innermost open element.
    pub fn end_tag(&mut self) -> CodecResult<()> {
        if self.open.pop().is_none() {
            return Err(CodecError::UnbalancedEnd);
        }
        self.elements.push(Element::End);
        Ok(())
    }

    /// Writes text content into the innermost open element.
    pub fn content(&mut self, value: impl Display) {
        self.elements.push(Element::Content(value.to_string()));
    }

    /// Writes an element with no content.
    pub fn empty_tag(&mut self, tag: Tag) -> CodecResult<()> {
        self.start_tag(tag);
        self.end_tag()
    }

    /// Writes `<tag>value</tag>`.
    pub fn leaf(&mut self, tag: Tag, value: impl Display) -> CodecResult<()> {
        self.start_tag(tag);
        self.content(value);
        self.end_tag()
    }

    /// Returns the elements written so far.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Finishes the stream, checking that it forms exactly one closed tree.
    pub fn into_elements(self) -> CodecResult<Vec<Element>> {
        if !self.open.is_empty() {
            return Err(CodecError::malformed(format!(
                "{} element(s) left open",
                self.open.len()
            )));
        }
        if self.roots > 1 {
            return Err(CodecError::malformed(format!(
                "{} root elements written",
                self.roots
            )));
        }
        Ok(self.elements)
    }

    /// Finishes the stream and frames it as CBOR.
    pub fn into_bytes(self) -> CodecResult<Vec<u8>> {
        let elements = self.into_elements()?;
        to_cbor(&elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: Tag = Tag::new(7, 0x16);
    const STATUS: Tag = Tag::new(7, 0x0c);

    #[test]
    fn writes_single_tree() {
        let mut enc = TagEncoder::new();
        assert!(!enc.is_started());
        enc.start_tag(ROOT);
        enc.leaf(STATUS, 1).unwrap();
        enc.end_tag().unwrap();

        let elements = enc.into_elements().unwrap();
        assert_eq!(
            elements,
            vec![
                Element::Start(ROOT),
                Element::Start(STATUS),
                Element::Content("1".into()),
                Element::End,
                Element::End,
            ]
        );
    }

    #[test]
    fn unbalanced_end_is_error() {
        let mut enc = TagEncoder::new();
        assert_eq!(enc.end_tag(), Err(CodecError::UnbalancedEnd));
    }

    #[test]
    fn open_element_rejected_on_finish() {
        let mut enc = TagEncoder::new();
        enc.start_tag(ROOT);
        assert!(enc.into_elements().is_err());
    }

    #[test]
    fn two_roots_rejected() {
        let mut enc = TagEncoder::new();
        enc.empty_tag(ROOT).unwrap();
        enc.empty_tag(ROOT).unwrap();
        assert!(matches!(
            enc.into_elements(),
            Err(CodecError::MalformedTree { .. })
        ));
    }
}
