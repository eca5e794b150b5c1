//! Tag-stream cursor.

use crate::element::{Element, Tag};
use crate::error::{CodecError, CodecResult};
use crate::frame::from_cbor;

/// A cursor over a request tag stream.
///
/// Handlers walk the stream as a strict nested grammar: optional
/// elements are probed with [`start_tag`](Self::start_tag), mandatory
/// ones with [`expect_start`](Self::expect_start), and every opened
/// element is closed with [`end_tag`](Self::end_tag).
#[derive(Debug, Clone, Default)]
pub struct TagDecoder {
    elements: Vec<Element>,
    pos: usize,
    pushed: Vec<Element>,
}

impl TagDecoder {
    /// Creates a decoder over the given elements.
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            pos: 0,
            pushed: Vec::new(),
        }
    }

    /// Creates a decoder over a CBOR-framed element stream.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        Ok(Self::new(from_cbor(bytes)?))
    }

    /// Returns the next element, consuming it.
    pub fn next_element(&mut self) -> Option<Element> {
        if let Some(element) = self.pushed.pop() {
            return Some(element);
        }
        let element = self.elements.get(self.pos).cloned();
        if element.is_some() {
            self.pos += 1;
        }
        element
    }

    /// Returns the next element without consuming it.
    pub fn peek(&self) -> Option<&Element> {
        self.pushed.last().or_else(|| self.elements.get(self.pos))
    }

    /// Pushes an element back so the next read returns it.
    pub fn unget(&mut self, element: Element) {
        self.pushed.push(element);
    }

    /// Returns the tag of the next element if it is a start tag.
    pub fn peek_start(&self) -> Option<Tag> {
        self.peek().and_then(Element::start_tag)
    }

    /// Returns true if the next element closes the current element.
    pub fn at_end_tag(&self) -> bool {
        self.peek().is_some_and(Element::is_end)
    }

    /// Returns true if every element has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.peek().is_none()
    }

    /// Consumes the next element if it is a start tag for `tag`.
    pub fn start_tag(&mut self, tag: Tag) -> bool {
        if self.peek_start() == Some(tag) {
            self.next_element();
            true
        } else {
            false
        }
    }

    /// Consumes a mandatory start tag.
    pub fn expect_start(&mut self, tag: Tag) -> CodecResult<()> {
        if self.start_tag(tag) {
            return Ok(());
        }
        Err(CodecError::unexpected(tag, self.describe_next()))
    }

    /// Consumes the next element if it is text content.
    pub fn content(&mut self) -> Option<String> {
        match self.peek() {
            Some(Element::Content(_)) => match self.next_element() {
                Some(Element::Content(text)) => Some(text),
                _ => None,
            },
            _ => None,
        }
    }

    /// Consumes a mandatory end tag.
    pub fn end_tag(&mut self) -> CodecResult<()> {
        match self.next_element() {
            Some(Element::End) => Ok(()),
            Some(other) => {
                let found = other.describe();
                self.unget(other);
                Err(CodecError::expected_end(found))
            }
            None => Err(CodecError::UnexpectedEof),
        }
    }

    /// Reads an optional leaf element `<tag>text</tag>`.
    ///
    /// Returns `None` if the next element is not `tag`, and an empty
    /// string for an element without content.
    pub fn leaf(&mut self, tag: Tag) -> CodecResult<Option<String>> {
        if !self.start_tag(tag) {
            return Ok(None);
        }
        let text = self.content().unwrap_or_default();
        self.end_tag()?;
        Ok(Some(text))
    }

    /// Reads a mandatory leaf element.
    pub fn expect_leaf(&mut self, tag: Tag) -> CodecResult<String> {
        self.expect_start(tag)?;
        let text = self.content().unwrap_or_default();
        self.end_tag()?;
        Ok(text)
    }

    /// Skips the whole subtree that starts at the next element.
    pub fn skip_element(&mut self) -> CodecResult<()> {
        match self.next_element() {
            Some(Element::Start(_)) => {}
            Some(Element::Content(_)) => return Ok(()),
            Some(Element::End) => {
                self.unget(Element::End);
                return Err(CodecError::malformed("cannot skip an end tag"));
            }
            None => return Err(CodecError::UnexpectedEof),
        }
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_element() {
                Some(Element::Start(_)) => depth += 1,
                Some(Element::End) => depth -= 1,
                Some(Element::Content(_)) => {}
                None => return Err(CodecError::UnexpectedEof),
            }
        }
        Ok(())
    }

    fn describe_next(&self) -> String {
        self.peek()
            .map(Element::describe)
            .unwrap_or_else(|| "end of input".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: Tag = Tag::new(0, 5);
    const KEY: Tag = Tag::new(0, 11);
    const FLAG: Tag = Tag::new(0, 30);

    fn sample() -> TagDecoder {
        TagDecoder::new(vec![
            Element::Start(ROOT),
            Element::Start(KEY),
            Element::Content("0".into()),
            Element::End,
            Element::Start(FLAG),
            Element::End,
            Element::End,
        ])
    }

    #[test]
    fn walks_nested_grammar() {
        let mut dec = sample();
        dec.expect_start(ROOT).unwrap();
        assert_eq!(dec.leaf(KEY).unwrap(), Some("0".to_string()));
        assert_eq!(dec.leaf(FLAG).unwrap(), Some(String::new()));
        dec.end_tag().unwrap();
        assert!(dec.is_exhausted());
    }

    #[test]
    fn optional_tag_absent() {
        let mut dec = sample();
        assert!(!dec.start_tag(KEY));
        assert!(dec.start_tag(ROOT));
        assert_eq!(dec.leaf(FLAG).unwrap(), None);
    }

    #[test]
    fn expect_start_reports_found() {
        let mut dec = sample();
        let err = dec.expect_start(KEY).unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedElement { expected, .. } if expected == KEY));
    }

    #[test]
    fn end_tag_mismatch_keeps_element() {
        let mut dec = sample();
        dec.expect_start(ROOT).unwrap();
        assert!(dec.end_tag().is_err());
        assert_eq!(dec.peek_start(), Some(KEY));
    }

    #[test]
    fn unget_restores_order() {
        let mut dec = sample();
        let first = dec.next_element().unwrap();
        dec.unget(first.clone());
        assert_eq!(dec.next_element(), Some(first));
    }

    #[test]
    fn skip_element_consumes_subtree() {
        let mut dec = sample();
        dec.skip_element().unwrap();
        assert!(dec.is_exhausted());
    }

    #[test]
    fn eof_is_reported() {
        let mut dec = TagDecoder::new(vec![Element::Start(ROOT)]);
        dec.expect_start(ROOT).unwrap();
        assert_eq!(dec.end_tag(), Err(CodecError::UnexpectedEof));
    }
}
