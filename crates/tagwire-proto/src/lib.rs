//! # Tagwire: Wire Codec
//!
//! This crate implements the tag-length-value wire format used by protocol
//! buffers: the byte-level encoding every message body is made of.
//!
//! ## Wire Format
//!
//! A message body is a sequence of fields. Each field is a varint tag
//! `(field_number << 3) | wire_type` followed by a value framed by the wire
//! type:
//!
//! - **Varint**: base-128, least significant group first, 1 to 10 bytes
//! - **Fixed32 / Fixed64**: 4 or 8 little-endian bytes
//! - **Length-delimited**: varint byte count, then that many bytes (strings,
//!   bytes, embedded messages, packed repeated scalars)
//! - **Groups**: START_GROUP tag, fields, END_GROUP tag of the same field
//!   number (legacy, still accepted and produced)
//!
//! ## Layers
//!
//! - [`varint`], [`fixed`]: stateless encode/decode of single values
//! - [`tag`]: [`Tag`] and [`WireType`]
//! - [`sink`], [`source`]: where bytes go to and come from
//! - [`WireWriter`]: buffered encoder with tagged and untagged writes
//! - [`WireReader`]: decoder with a limit stack, a recursion limit and a
//!   total-size limit
//! - [`Encode`] / [`Merge`]: the traits message types implement
//! - [`UnknownFieldSet`]: lossless storage for unrecognized fields
//!
//! ## Security Properties
//!
//! - **Bounded Reads**: every read checks the innermost limit and the
//!   total-size limit before touching the source. A corrupt length can make a
//!   parse fail, never make it read past its window.
//! - **Bounded Nesting**: embedded messages and groups count against a
//!   recursion limit (64 by default), so adversarial nesting fails with
//!   [`WireError::RecursionLimitExceeded`] instead of exhausting the stack.
//! - **No Silent Recovery**: the codec never retries, never skips bad bytes
//!   on its own and never logs. Every failure is a [`WireError`] returned to
//!   the caller.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod fixed;
pub mod message;
pub mod reader;
pub mod scalar;
pub mod sink;
pub mod source;
pub mod tag;
pub mod unknown;
pub mod varint;
pub mod writer;

pub use errors::{Result, WireError};
pub use message::{Encode, Merge};
pub use reader::{LimitHandle, ReaderConfig, WireReader};
pub use scalar::ScalarCodec;
pub use sink::{BufMutSink, Sink, SliceSink, StreamSink};
pub use source::{BufSource, Source, StreamSource};
pub use tag::{Tag, WireType, MAX_FIELD_NUMBER, MIN_FIELD_NUMBER};
pub use unknown::{UnknownField, UnknownFieldSet};
pub use writer::{WireWriter, WriterConfig};
