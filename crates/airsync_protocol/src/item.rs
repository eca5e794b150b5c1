//! Generic item payloads.
//!
//! Item content (the `ApplicationData` of a Sync change) is kept as an
//! ordered list of tagged fields. The engine moves items between the wire
//! and the backend without knowing the schema of each content class.

use crate::tags::{base, email};
use airsync_codec::{CodecError, CodecResult, Element, Tag, TagDecoder, TagEncoder};
use serde::{Deserialize, Serialize};

/// Value of one item field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text content. Empty elements decode to an empty string.
    Text(String),
    /// Nested fields, e.g. an AirSyncBase body.
    Nested(Vec<Field>),
}

/// One tagged field of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field tag.
    pub tag: Tag,
    /// Field value.
    pub value: FieldValue,
}

impl Field {
    /// Creates a text field.
    pub fn text(tag: Tag, value: impl Into<String>) -> Self {
        Self {
            tag,
            value: FieldValue::Text(value.into()),
        }
    }

    /// Creates a nested field.
    pub fn nested(tag: Tag, fields: Vec<Field>) -> Self {
        Self {
            tag,
            value: FieldValue::Nested(fields),
        }
    }
}

/// Content of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItem {
    fields: Vec<Field>,
}

impl SyncItem {
    /// Creates an empty item.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set_text`](Self::set_text).
    pub fn with_text(mut self, tag: Tag, value: impl Into<String>) -> Self {
        self.set_text(tag, value);
        self
    }

    /// Builder form of [`set`](Self::set) for nested fields.
    pub fn with_nested(mut self, tag: Tag, fields: Vec<Field>) -> Self {
        self.set(Field::nested(tag, fields));
        self
    }

    /// Sets a text field, replacing any previous value for the tag.
    pub fn set_text(&mut self, tag: Tag, value: impl Into<String>) {
        self.set(Field::text(tag, value));
    }

    /// Sets a field, replacing any previous value for its tag.
    pub fn set(&mut self, field: Field) {
        match self.fields.iter_mut().find(|f| f.tag == field.tag) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Removes a field.
    pub fn remove(&mut self, tag: Tag) -> Option<Field> {
        let pos = self.fields.iter().position(|f| f.tag == tag)?;
        Some(self.fields.remove(pos))
    }

    /// Returns the value of a field.
    pub fn get(&self, tag: Tag) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.tag == tag).map(|f| &f.value)
    }

    /// Returns the text of a text field.
    pub fn text(&self, tag: Tag) -> Option<&str> {
        match self.get(tag) {
            Some(FieldValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Returns all fields in order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns true if the item has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the mail read flag, if present.
    pub fn read_flag(&self) -> Option<bool> {
        self.text(email::READ).map(|v| v.trim() == "1")
    }

    /// Returns true if the only field is the mail read flag.
    pub fn is_read_flag_only(&self) -> bool {
        self.fields.len() == 1 && self.fields[0].tag == email::READ
    }

    /// Returns true if the item carries content a backend can store.
    pub fn check(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Returns the text of the body, from either the AirSyncBase body or
    /// the legacy mail body.
    pub fn body_text(&self) -> Option<&str> {
        if let Some(FieldValue::Nested(fields)) = self.get(base::BODY) {
            return fields.iter().find_map(|f| match (&f.value, f.tag == base::DATA) {
                (FieldValue::Text(text), true) => Some(text.as_str()),
                _ => None,
            });
        }
        self.text(email::BODY)
    }

    /// Reads fields up to the end tag of the enclosing element, leaving
    /// that end tag in the stream.
    pub fn decode(dec: &mut TagDecoder) -> CodecResult<Self> {
        Ok(Self {
            fields: decode_fields(dec)?,
        })
    }

    /// Writes every field.
    pub fn encode(&self, enc: &mut TagEncoder) -> CodecResult<()> {
        encode_fields(&self.fields, enc)
    }
}

fn decode_fields(dec: &mut TagDecoder) -> CodecResult<Vec<Field>> {
    let mut fields = Vec::new();
    while !dec.at_end_tag() {
        let tag = match dec.next_element() {
            Some(Element::Start(tag)) => tag,
            Some(other) => return Err(CodecError::malformed(format!(
                "expected item field, found {}",
                other.describe()
            ))),
            None => return Err(CodecError::UnexpectedEof),
        };
        let value = if let Some(text) = dec.content() {
            FieldValue::Text(text)
        } else if dec.peek_start().is_some() {
            FieldValue::Nested(decode_fields(dec)?)
        } else {
            FieldValue::Text(String::new())
        };
        dec.end_tag()?;
        fields.push(Field { tag, value });
    }
    Ok(fields)
}

fn encode_fields(fields: &[Field], enc: &mut TagEncoder) -> CodecResult<()> {
    for field in fields {
        match &field.value {
            FieldValue::Text(text) if text.is_empty() => enc.empty_tag(field.tag)?,
            FieldValue::Text(text) => enc.leaf(field.tag, text)?,
            FieldValue::Nested(children) => {
                enc.start_tag(field.tag);
                encode_fields(children, enc)?;
                enc.end_tag()?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::airsync;

    fn wrapped(item: &SyncItem) -> Vec<Element> {
        let mut enc = TagEncoder::new();
        enc.start_tag(airsync::APPLICATION_DATA);
        item.encode(&mut enc).unwrap();
        enc.end_tag().unwrap();
        enc.into_elements().unwrap()
    }

    #[test]
    fn decodes_text_and_nested_fields() {
        let item = SyncItem::new()
            .with_text(email::SUBJECT, "hello")
            .with_text(email::READ, "")
            .with_nested(
                base::BODY,
                vec![Field::text(base::TYPE, "1"), Field::text(base::DATA, "hi there")],
            );

        let mut dec = TagDecoder::new(wrapped(&item));
        dec.expect_start(airsync::APPLICATION_DATA).unwrap();
        let decoded = SyncItem::decode(&mut dec).unwrap();
        dec.end_tag().unwrap();

        assert_eq!(decoded, item);
        assert_eq!(decoded.text(email::READ), Some(""));
        assert_eq!(decoded.body_text(), Some("hi there"));
    }

    #[test]
    fn read_flag_only() {
        let item = SyncItem::new().with_text(email::READ, "1");
        assert!(item.is_read_flag_only());
        assert_eq!(item.read_flag(), Some(true));

        let item = item.with_text(email::SUBJECT, "x");
        assert!(!item.is_read_flag_only());
    }

    #[test]
    fn set_replaces_existing_field() {
        let mut item = SyncItem::new().with_text(email::SUBJECT, "a");
        item.set_text(email::SUBJECT, "b");
        assert_eq!(item.fields().len(), 1);
        assert_eq!(item.text(email::SUBJECT), Some("b"));
        assert!(item.remove(email::SUBJECT).is_some());
        assert!(!item.check());
    }

    #[test]
    fn stray_content_is_malformed() {
        let mut dec = TagDecoder::new(vec![
            Element::Start(airsync::APPLICATION_DATA),
            Element::Content("loose".into()),
            Element::End,
        ]);
        dec.expect_start(airsync::APPLICATION_DATA).unwrap();
        assert!(SyncItem::decode(&mut dec).is_err());
    }
}
