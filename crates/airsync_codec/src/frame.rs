//! CBOR framing of element streams.

use crate::element::Element;
use crate::error::{CodecError, CodecResult};

/// Maximum number of elements accepted from a framed stream.
/// Bounds allocation for untrusted input.
const MAX_ELEMENTS: usize = 4 * 1024 * 1024;

/// Frame an element stream as CBOR bytes.
pub fn to_cbor(elements: &[Element]) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(elements, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Read an element stream from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a framed element stream, the
/// stream is larger than the element limit, or start and end tags do not
/// pair up.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Vec<Element>> {
    let elements: Vec<Element> =
        ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if elements.len() > MAX_ELEMENTS {
        return Err(CodecError::TooManyElements {
            count: elements.len(),
        });
    }
    check_nesting(&elements)?;
    Ok(elements)
}

fn check_nesting(elements: &[Element]) -> CodecResult<()> {
    let mut depth = 0usize;
    for element in elements {
        match element {
            Element::Start(_) => depth += 1,
            Element::End => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| CodecError::malformed("end tag without start tag"))?;
            }
            Element::Content(_) if depth == 0 => {
                return Err(CodecError::malformed("content outside any element"));
            }
            Element::Content(_) => {}
        }
    }
    if depth != 0 {
        return Err(CodecError::malformed("stream ends inside an element"));
    }
    Ok(())
}
