//! # AirSync Codec
//!
//! Tag-stream element model for AirSync requests and replies.
//!
//! The engine never looks at wire bytes. It walks a request as a
//! sequence of [`Element`]s and writes its reply the same way:
//! - [`TagDecoder`] reads start tags, end tags and content, with peek
//!   and unget for one-element lookahead
//! - [`TagEncoder`] writes exactly one reply tree and refuses to finish
//!   an unbalanced one
//! - [`to_cbor`] / [`from_cbor`] frame element streams for storage and
//!   replay tooling
//!
//! ## Usage
//!
//! ```
//! use airsync_codec::{Tag, TagDecoder, TagEncoder};
//!
//! const PING: Tag = Tag::new(13, 0x05);
//! const STATUS: Tag = Tag::new(13, 0x07);
//!
//! let mut enc = TagEncoder::new();
//! enc.start_tag(PING);
//! enc.leaf(STATUS, 1).unwrap();
//! enc.end_tag().unwrap();
//!
//! let mut dec = TagDecoder::new(enc.into_elements().unwrap());
//! dec.expect_start(PING).unwrap();
//! assert_eq!(dec.leaf(STATUS).unwrap().as_deref(), Some("1"));
//! dec.end_tag().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod element;
mod encoder;
mod error;
mod frame;

pub use decoder::TagDecoder;
pub use element::{Element, Tag};
pub use encoder::TagEncoder;
pub use error::{CodecError, CodecResult};
pub use frame::{from_cbor, to_cbor};
