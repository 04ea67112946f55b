//! Bounded decoder.
//!
//! [`WireReader`] pulls tags and values from a [`Source`] and enforces three
//! limits:
//!
//! - **Limit stack**: [`WireReader::push_limit`] narrows the readable window
//!   to the next `n` bytes (an embedded message, a packed block).
//!   [`WireReader::pop_limit`] restores the previous window exactly. A pushed
//!   limit may only shrink the window; one that would reach past the current
//!   limit is [`WireError::TruncatedInput`].
//! - **Recursion limit**: nested messages and groups deeper than
//!   [`ReaderConfig::recursion_limit`] fail with
//!   [`WireError::RecursionLimitExceeded`].
//! - **Size limit**: more than [`ReaderConfig::size_limit`] bytes in one
//!   parse fail with [`WireError::SizeLimitExceeded`].
//!   [`WireReader::reset_size_counter`] starts a new parse on the same
//!   stream.
//!
//! Every read checks the active limit first, then the size limit, then
//! asks the source. The source may hand out bytes in arbitrarily small
//! chunks; no read assumes the bytes it needs are already buffered.

use std::io::Read;

use bytes::{Buf, Bytes};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{Result, WireError},
    fixed::{decode_fixed32, decode_fixed64, fixed32_to_float, fixed64_to_double},
    message::Merge,
    scalar::ScalarCodec,
    source::{BufSource, Source, StreamSource},
    tag::{Tag, WireType},
    varint::{decode_varint_slice, zigzag_decode32, zigzag_decode64, MAX_VARINT_LEN},
};

/// Default maximum nesting of messages and groups
pub const DEFAULT_RECURSION_LIMIT: u32 = 64;

/// Default maximum bytes read in one parse (64 MiB)
pub const DEFAULT_SIZE_LIMIT: usize = 64 << 20;

/// Default read buffer for stream sources
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 4096;

/// Reader configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Maximum nesting depth of messages and groups
    pub recursion_limit: u32,
    /// Maximum bytes read between two size-counter resets
    pub size_limit: usize,
    /// Buffer size used by [`WireReader::from_stream`]
    pub stream_buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            size_limit: DEFAULT_SIZE_LIMIT,
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
        }
    }
}

/// Token returned by [`WireReader::push_limit`]; hand it back to
/// [`WireReader::pop_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a pushed limit must be popped"]
pub struct LimitHandle {
    depth: usize,
}

/// Decoder over a [`Source`].
#[derive(Debug)]
pub struct WireReader<S> {
    source: S,
    /// Bytes consumed since construction
    position: usize,
    /// `position` at the last size-counter reset
    size_base: usize,
    /// Absolute end offsets, innermost last
    limits: Vec<usize>,
    last_tag: Option<Tag>,
    recursion_depth: u32,
    config: ReaderConfig,
}

impl<'a> WireReader<BufSource<&'a [u8]>> {
    /// Reader over a byte slice with the default configuration
    #[must_use]
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self::new(BufSource::new(bytes), ReaderConfig::default())
    }
}

impl<B: Buf> WireReader<BufSource<B>> {
    /// Reader over any `Buf` (`Bytes` reads length-delimited values
    /// without copying)
    #[must_use]
    pub fn from_buf(buf: B, config: ReaderConfig) -> Self {
        Self::new(BufSource::new(buf), config)
    }
}

impl<R: Read> WireReader<StreamSource<R>> {
    /// Reader over a blocking stream, buffered by
    /// `config.stream_buffer_size`
    #[must_use]
    pub fn from_stream(stream: R, config: ReaderConfig) -> Self {
        Self::new(StreamSource::new(stream, config.stream_buffer_size), config)
    }
}

impl<S: Source> WireReader<S> {
    /// Reader over an arbitrary source
    #[must_use]
    pub fn new(source: S, config: ReaderConfig) -> Self {
        Self {
            source,
            position: 0,
            size_base: 0,
            limits: Vec::new(),
            last_tag: None,
            recursion_depth: 0,
            config,
        }
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Change the recursion limit, returning the previous one
    pub fn set_recursion_limit(&mut self, limit: u32) -> u32 {
        std::mem::replace(&mut self.config.recursion_limit, limit)
    }

    /// Change the size limit, returning the previous one
    pub fn set_size_limit(&mut self, limit: usize) -> usize {
        std::mem::replace(&mut self.config.size_limit, limit)
    }

    /// Start counting toward the size limit from the current position.
    ///
    /// Lets one reader parse a long stream of delimited messages, each
    /// held to the size limit on its own.
    pub fn reset_size_counter(&mut self) {
        self.size_base = self.position;
    }

    /// Bytes consumed since construction
    #[must_use]
    pub fn total_bytes_read(&self) -> usize {
        self.position
    }

    /// Bytes left before the innermost limit; `None` when no limit is
    /// pushed.
    #[must_use]
    pub fn bytes_until_limit(&self) -> Option<usize> {
        self.limits.last().map(|&limit| limit - self.position)
    }

    /// Current nesting depth of messages and groups
    #[must_use]
    pub fn recursion_depth(&self) -> u32 {
        self.recursion_depth
    }

    /// Unwrap the source
    #[must_use]
    pub fn into_inner(self) -> S {
        self.source
    }

    // Limits

    /// Restrict reads to the next `len` bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::TruncatedInput`] if the new limit would extend past
    /// the current one.
    pub fn push_limit(&mut self, len: usize) -> Result<LimitHandle> {
        let limit = self.position.checked_add(len).ok_or(WireError::TruncatedInput)?;
        if let Some(&current) = self.limits.last() {
            if limit > current {
                return Err(WireError::TruncatedInput);
            }
        }
        let handle = LimitHandle { depth: self.limits.len() };
        self.limits.push(limit);
        Ok(handle)
    }

    /// Restore the limit in effect before the matching
    /// [`WireReader::push_limit`], along with any limits pushed after it.
    pub fn pop_limit(&mut self, handle: LimitHandle) {
        self.limits.truncate(handle.depth);
    }

    /// True when the innermost limit is reached or, without a limit, when
    /// the source is exhausted.
    ///
    /// # Errors
    ///
    /// Stream sources may fail while checking for more bytes.
    pub fn is_at_end(&mut self) -> Result<bool> {
        if self.bytes_until_limit() == Some(0) {
            return Ok(true);
        }
        Ok(self.source.fill()?.is_empty())
    }

    fn size_left(&self) -> usize {
        self.config.size_limit.saturating_sub(self.position - self.size_base)
    }

    /// Bytes a single read may consume without crossing a limit
    fn window(&self) -> usize {
        let size_left = self.size_left();
        self.bytes_until_limit().map_or(size_left, |until| until.min(size_left))
    }

    fn check_available(&self, len: usize) -> Result<()> {
        if let Some(until) = self.bytes_until_limit() {
            if len > until {
                return Err(WireError::TruncatedInput);
            }
        }
        if len > self.size_left() {
            return Err(WireError::SizeLimitExceeded { limit: self.config.size_limit });
        }
        Ok(())
    }

    // Raw reads

    /// Read one byte.
    ///
    /// # Errors
    ///
    /// [`WireError::TruncatedInput`] at a limit or the end of the source,
    /// [`WireError::SizeLimitExceeded`] past the size limit.
    pub fn read_raw_byte(&mut self) -> Result<u8> {
        self.check_available(1)?;
        let chunk = self.source.fill()?;
        let Some(&byte) = chunk.first() else {
            return Err(WireError::TruncatedInput);
        };
        self.source.consume(1);
        self.position += 1;
        Ok(byte)
    }

    /// Read exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    pub fn read_raw_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.check_available(len)?;
        let bytes = self.source.read_bytes(len)?;
        self.position += len;
        Ok(bytes)
    }

    fn read_raw_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.check_available(N)?;
        let mut out = [0u8; N];
        let mut filled = 0;
        while filled < N {
            let chunk = self.source.fill()?;
            if chunk.is_empty() {
                return Err(WireError::TruncatedInput);
            }
            let take = chunk.len().min(N - filled);
            out[filled..filled + take].copy_from_slice(&chunk[..take]);
            self.source.consume(take);
            self.position += take;
            filled += take;
        }
        Ok(out)
    }

    /// Skip `len` bytes.
    ///
    /// A skip past the innermost limit moves to the limit and then fails,
    /// leaving the reader at the limit.
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    pub fn skip_raw_bytes(&mut self, len: usize) -> Result<()> {
        if let Some(until) = self.bytes_until_limit() {
            if len > until {
                self.advance(until)?;
                return Err(WireError::TruncatedInput);
            }
        }
        self.check_available(len)?;
        self.advance(len)
    }

    fn advance(&mut self, mut len: usize) -> Result<()> {
        while len > 0 {
            let buffered = self.source.fill()?.len();
            if buffered == 0 {
                return Err(WireError::TruncatedInput);
            }
            let step = buffered.min(len);
            self.source.consume(step);
            self.position += step;
            len -= step;
        }
        Ok(())
    }

    /// Read an untagged varint.
    ///
    /// Decodes straight out of the buffered chunk when the whole varint is
    /// there, byte by byte otherwise.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedVarint`] after ten continuation bytes, otherwise
    /// as [`WireReader::read_raw_byte`].
    pub fn read_raw_varint64(&mut self) -> Result<u64> {
        let window = self.window();
        let fast = {
            let chunk = self.source.fill()?;
            let visible = &chunk[..chunk.len().min(window)];
            match decode_varint_slice(visible) {
                Ok(decoded) => Some(Ok(decoded)),
                Err(WireError::MalformedVarint) => Some(Err(WireError::MalformedVarint)),
                Err(_) => None,
            }
        };
        if let Some(decoded) = fast {
            let (value, len) = decoded?;
            self.source.consume(len);
            self.position += len;
            return Ok(value);
        }

        let mut result: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_raw_byte()?;
            result |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(WireError::MalformedVarint)
    }

    /// Read an untagged varint and keep its low 32 bits.
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_varint64`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_raw_varint32(&mut self) -> Result<u32> {
        self.read_raw_varint64().map(|value| value as u32)
    }

    /// Read 4 little-endian bytes.
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    pub fn read_raw_fixed32(&mut self) -> Result<u32> {
        let bytes = self.read_raw_array::<4>()?;
        decode_fixed32(&mut &bytes[..])
    }

    /// Read 8 little-endian bytes.
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    pub fn read_raw_fixed64(&mut self) -> Result<u64> {
        let bytes = self.read_raw_array::<8>()?;
        decode_fixed64(&mut &bytes[..])
    }

    /// Read the varint length prefix of a length-delimited value.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedMessage`] for a length that does not fit in a
    /// non-negative 32-bit integer, otherwise as
    /// [`WireReader::read_raw_varint64`].
    pub fn read_length(&mut self) -> Result<usize> {
        let raw = self.read_raw_varint32()?;
        if i32::try_from(raw).is_err() {
            return Err(WireError::MalformedMessage("negative length-delimited size"));
        }
        usize::try_from(raw).map_err(|_| WireError::MalformedMessage("length does not fit"))
    }

    // Tags

    /// Read the next tag, or `None` at the innermost limit or the end of
    /// the source.
    ///
    /// # Errors
    ///
    /// [`WireError::InvalidTag`] for field number zero,
    /// [`WireError::InvalidWireType`] for wire types 6 and 7, otherwise as
    /// [`WireReader::read_raw_varint64`].
    pub fn read_tag(&mut self) -> Result<Option<Tag>> {
        if self.is_at_end()? {
            self.last_tag = None;
            return Ok(None);
        }
        let tag = Tag::from_raw(self.read_raw_varint64()?)?;
        self.last_tag = Some(tag);
        Ok(Some(tag))
    }

    /// Tag returned by the last [`WireReader::read_tag`]
    #[must_use]
    pub fn last_tag(&self) -> Option<Tag> {
        self.last_tag
    }

    /// Check how the last message or group body ended: `None` for the end
    /// of input or limit, or the END_GROUP tag that closed a group.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedMessage`] on any other ending.
    pub fn check_last_tag_was(&self, expected: Option<Tag>) -> Result<()> {
        if self.last_tag == expected {
            Ok(())
        } else {
            Err(WireError::MalformedMessage("end-group tag did not match expected tag"))
        }
    }

    /// Skip the value of a field whose tag was just read.
    ///
    /// Returns `false` for an END_GROUP tag, which ends the enclosing group
    /// instead of carrying a value.
    ///
    /// # Errors
    ///
    /// Any read error; groups additionally fail with
    /// [`WireError::MalformedMessage`] when closed by the wrong END_GROUP and
    /// with [`WireError::RecursionLimitExceeded`] when nested too deeply.
    pub fn skip_field(&mut self, tag: Tag) -> Result<bool> {
        match tag.wire_type() {
            WireType::Varint => {
                self.read_raw_varint64()?;
            },
            WireType::Fixed64 => self.skip_raw_bytes(8)?,
            WireType::LengthDelimited => {
                let len = self.read_length()?;
                self.skip_raw_bytes(len)?;
            },
            WireType::StartGroup => {
                self.enter_nested()?;
                let skipped = self.skip_message();
                self.recursion_depth -= 1;
                skipped?;
                self.check_last_tag_was(Some(tag.end_group()))?;
            },
            WireType::EndGroup => return Ok(false),
            WireType::Fixed32 => self.skip_raw_bytes(4)?,
        }
        Ok(true)
    }

    /// Skip fields until the end of input, the innermost limit, or an
    /// END_GROUP tag.
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::skip_field`].
    pub fn skip_message(&mut self) -> Result<()> {
        while let Some(tag) = self.read_tag()? {
            if !self.skip_field(tag)? {
                break;
            }
        }
        Ok(())
    }

    // Nesting

    fn enter_nested(&mut self) -> Result<()> {
        if self.recursion_depth >= self.config.recursion_limit {
            return Err(WireError::RecursionLimitExceeded { limit: self.config.recursion_limit });
        }
        self.recursion_depth += 1;
        Ok(())
    }

    /// Merge a length-delimited embedded message into `message`.
    ///
    /// The depth counter and the limit stack are restored whether or not
    /// the merge succeeds.
    ///
    /// # Errors
    ///
    /// [`WireError::RecursionLimitExceeded`] when nested too deeply,
    /// [`WireError::MalformedMessage`] if the body ends with an END_GROUP,
    /// plus any error from `message`.
    pub fn read_message<M: Merge + ?Sized>(&mut self, message: &mut M) -> Result<()> {
        let len = self.read_length()?;
        self.enter_nested()?;
        let merged = self.push_limit(len).and_then(|handle| {
            let merged = message.merge_from(self).and_then(|()| self.check_last_tag_was(None));
            self.pop_limit(handle);
            merged
        });
        self.recursion_depth -= 1;
        merged
    }

    /// Merge a group body into `message`; the START_GROUP tag for
    /// `field_number` has just been read.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedMessage`] unless the body ends with the
    /// END_GROUP tag for `field_number`, otherwise as
    /// [`WireReader::read_message`].
    pub fn read_group<M: Merge + ?Sized>(
        &mut self,
        field_number: u32,
        message: &mut M,
    ) -> Result<()> {
        let end = Tag::new(field_number, WireType::EndGroup)?;
        self.enter_nested()?;
        let merged = message.merge_from(self).and_then(|()| self.check_last_tag_was(Some(end)));
        self.recursion_depth -= 1;
        merged
    }

    /// Decode a packed block (length prefix included) and append its
    /// values to `out`.
    ///
    /// # Errors
    ///
    /// [`WireError::TruncatedInput`] if the last value straddles the end of
    /// the block, otherwise as [`WireReader::read_raw_varint64`].
    pub fn read_packed<C: ScalarCodec>(&mut self, out: &mut Vec<C::Value>) -> Result<()> {
        let len = self.read_length()?;
        let handle = self.push_limit(len)?;
        let read = self.read_until_limit::<C>(out);
        self.pop_limit(handle);
        read
    }

    fn read_until_limit<C: ScalarCodec>(&mut self, out: &mut Vec<C::Value>) -> Result<()> {
        while !self.is_at_end()? {
            out.push(C::read_raw(self)?);
        }
        Ok(())
    }

    // Typed reads

    /// Untagged value of any scalar kind
    ///
    /// # Errors
    ///
    /// Same as [`ScalarCodec::read_raw`].
    pub fn read_scalar<C: ScalarCodec>(&mut self) -> Result<C::Value> {
        C::read_raw(self)
    }

    /// `int32` (low 32 bits of the varint)
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_varint64`].
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_int32(&mut self) -> Result<i32> {
        self.read_raw_varint32().map(|value| value as i32)
    }

    /// `int64`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_varint64`].
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_int64(&mut self) -> Result<i64> {
        self.read_raw_varint64().map(|value| value as i64)
    }

    /// `uint32`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_varint64`].
    pub fn read_uint32(&mut self) -> Result<u32> {
        self.read_raw_varint32()
    }

    /// `uint64`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_varint64`].
    pub fn read_uint64(&mut self) -> Result<u64> {
        self.read_raw_varint64()
    }

    /// `sint32`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_varint64`].
    pub fn read_sint32(&mut self) -> Result<i32> {
        self.read_raw_varint32().map(zigzag_decode32)
    }

    /// `sint64`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_varint64`].
    pub fn read_sint64(&mut self) -> Result<i64> {
        self.read_raw_varint64().map(zigzag_decode64)
    }

    /// `fixed32`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    pub fn read_fixed32(&mut self) -> Result<u32> {
        self.read_raw_fixed32()
    }

    /// `fixed64`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    pub fn read_fixed64(&mut self) -> Result<u64> {
        self.read_raw_fixed64()
    }

    /// `sfixed32`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_sfixed32(&mut self) -> Result<i32> {
        self.read_raw_fixed32().map(|value| value as i32)
    }

    /// `sfixed64`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_sfixed64(&mut self) -> Result<i64> {
        self.read_raw_fixed64().map(|value| value as i64)
    }

    /// `float`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    pub fn read_float(&mut self) -> Result<f32> {
        self.read_raw_fixed32().map(fixed32_to_float)
    }

    /// `double`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_byte`].
    pub fn read_double(&mut self) -> Result<f64> {
        self.read_raw_fixed64().map(fixed64_to_double)
    }

    /// `bool`: any non-zero varint is true
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_varint64`].
    pub fn read_bool(&mut self) -> Result<bool> {
        self.read_raw_varint64().map(|value| value != 0)
    }

    /// `enum`
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_raw_varint64`].
    pub fn read_enum(&mut self) -> Result<i32> {
        self.read_int32()
    }

    /// Length-delimited `bytes` value
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_length`] and
    /// [`WireReader::read_raw_bytes`].
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_length()?;
        self.read_raw_bytes(len)
    }

    /// Length-delimited `string` value.
    ///
    /// # Errors
    ///
    /// [`WireError::InvalidUtf8`] for ill-formed UTF-8, otherwise as
    /// [`WireReader::read_bytes`].
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{Fixed32, UInt32};

    #[test]
    fn tags_and_values() {
        let bytes = [0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i', 0x1d, 0x01, 0x00, 0x00, 0x00];
        let mut reader = WireReader::from_slice(&bytes);

        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!((tag.field_number(), tag.wire_type()), (1, WireType::Varint));
        assert_eq!(reader.read_uint32().unwrap(), 150);

        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!(tag.wire_type(), WireType::LengthDelimited);
        assert_eq!(reader.read_string().unwrap(), "hi");

        assert_eq!(reader.read_tag().unwrap().map(Tag::field_number), Some(3));
        assert_eq!(reader.read_fixed32().unwrap(), 1);

        assert_eq!(reader.read_tag().unwrap(), None);
        assert_eq!(reader.last_tag(), None);
        assert_eq!(reader.total_bytes_read(), bytes.len());
    }

    #[test]
    fn zero_tag_is_invalid() {
        let mut reader = WireReader::from_slice(&[0x00]);
        assert_eq!(reader.read_tag(), Err(WireError::InvalidTag(0)));
    }

    #[test]
    fn invalid_wire_type_in_tag() {
        let mut reader = WireReader::from_slice(&[0x0f]);
        assert_eq!(reader.read_tag(), Err(WireError::InvalidWireType(7)));
    }

    #[test]
    fn limits_nest_and_restore() {
        let mut reader = WireReader::from_slice(&[1, 2, 3, 4, 5, 6]);
        let outer = reader.push_limit(4).unwrap();
        assert_eq!(reader.bytes_until_limit(), Some(4));
        let inner = reader.push_limit(2).unwrap();
        assert_eq!(reader.read_raw_bytes(2).unwrap().as_ref(), &[1, 2]);
        assert!(reader.is_at_end().unwrap());
        assert_eq!(reader.read_raw_byte(), Err(WireError::TruncatedInput));

        reader.pop_limit(inner);
        assert_eq!(reader.bytes_until_limit(), Some(2));
        assert!(!reader.is_at_end().unwrap());
        reader.pop_limit(outer);
        assert_eq!(reader.bytes_until_limit(), None);
    }

    #[test]
    fn limit_cannot_grow_window() {
        let mut reader = WireReader::from_slice(&[0; 8]);
        let _outer = reader.push_limit(3).unwrap();
        assert_eq!(reader.push_limit(4), Err(WireError::TruncatedInput));
        assert_eq!(reader.bytes_until_limit(), Some(3));
    }

    #[test]
    fn varint_stops_at_limit() {
        // 300 = [0xac, 0x02], but the limit cuts it after one byte
        let mut reader = WireReader::from_slice(&[0xac, 0x02]);
        let _limit = reader.push_limit(1).unwrap();
        assert_eq!(reader.read_raw_varint64(), Err(WireError::TruncatedInput));
    }

    #[test]
    fn malformed_varint() {
        let mut reader = WireReader::from_slice(&[0xff; 11]);
        assert_eq!(reader.read_raw_varint64(), Err(WireError::MalformedVarint));
    }

    #[test]
    fn truncated_varint_and_fixed() {
        let mut reader = WireReader::from_slice(&[0x80]);
        assert_eq!(reader.read_raw_varint64(), Err(WireError::TruncatedInput));
        let mut reader = WireReader::from_slice(&[1, 2, 3]);
        assert_eq!(reader.read_fixed32(), Err(WireError::TruncatedInput));
    }

    #[test]
    fn skip_past_limit_lands_on_limit() {
        let mut reader = WireReader::from_slice(&[1, 2, 3, 4]);
        let limit = reader.push_limit(2).unwrap();
        assert_eq!(reader.skip_raw_bytes(3), Err(WireError::TruncatedInput));
        assert!(reader.is_at_end().unwrap());
        reader.pop_limit(limit);
        assert_eq!(reader.read_raw_byte().unwrap(), 3);
    }

    #[test]
    fn skip_fields_of_every_wire_type() {
        let bytes = [
            0x08, 0x96, 0x01, // 1: varint
            0x11, 1, 2, 3, 4, 5, 6, 7, 8, // 2: fixed64
            0x1a, 0x02, 0xaa, 0xbb, // 3: length-delimited
            0x23, 0x08, 0x01, 0x24, // 4: group { 1: 1 }
            0x2d, 1, 2, 3, 4, // 5: fixed32
            0x30, 0x07, // 6: varint
        ];
        let mut reader = WireReader::from_slice(&bytes);
        for _ in 0..5 {
            let tag = reader.read_tag().unwrap().unwrap();
            assert!(reader.skip_field(tag).unwrap());
        }
        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!(tag.field_number(), 6);
        assert_eq!(reader.read_uint32().unwrap(), 7);
    }

    #[test]
    fn group_closed_by_wrong_field() {
        // START_GROUP 4, END_GROUP 5
        let mut reader = WireReader::from_slice(&[0x23, 0x2c]);
        let tag = reader.read_tag().unwrap().unwrap();
        assert!(matches!(reader.skip_field(tag), Err(WireError::MalformedMessage(_))));
    }

    #[test]
    fn end_group_reports_false() {
        let mut reader = WireReader::from_slice(&[0x24]);
        let tag = reader.read_tag().unwrap().unwrap();
        assert!(!reader.skip_field(tag).unwrap());
    }

    #[test]
    fn deeply_nested_groups_hit_recursion_limit() {
        let mut bytes = vec![0x0b; 10];
        bytes.extend(vec![0x0c; 10]);
        let mut reader = WireReader::from_slice(&bytes);
        reader.set_recursion_limit(5);
        let tag = reader.read_tag().unwrap().unwrap();
        assert_eq!(reader.skip_field(tag), Err(WireError::RecursionLimitExceeded { limit: 5 }));

        let mut reader = WireReader::from_slice(&bytes);
        assert_eq!(reader.set_recursion_limit(10), DEFAULT_RECURSION_LIMIT);
        let tag = reader.read_tag().unwrap().unwrap();
        assert!(reader.skip_field(tag).unwrap());
        assert_eq!(reader.recursion_depth(), 0);
        assert!(reader.is_at_end().unwrap());
    }

    #[test]
    fn size_limit() {
        let bytes = [0x0a, 0x05, 1, 2, 3, 4, 5, 0x08, 0x01];
        let mut reader = WireReader::from_slice(&bytes);
        assert_eq!(reader.set_size_limit(4), DEFAULT_SIZE_LIMIT);
        reader.read_tag().unwrap();
        assert_eq!(reader.read_bytes(), Err(WireError::SizeLimitExceeded { limit: 4 }));

        let mut reader = WireReader::from_slice(&bytes);
        reader.set_size_limit(7);
        reader.read_tag().unwrap();
        reader.read_bytes().unwrap();
        assert_eq!(reader.read_tag(), Err(WireError::SizeLimitExceeded { limit: 7 }));
        reader.reset_size_counter();
        assert_eq!(reader.read_tag().unwrap().map(Tag::field_number), Some(1));
    }

    #[test]
    fn invalid_utf8_string() {
        let mut reader = WireReader::from_slice(&[0x02, 0xc3, 0x28]);
        assert_eq!(reader.read_string(), Err(WireError::InvalidUtf8));
    }

    #[test]
    fn negative_length_rejected() {
        // varint 0xffff_ffff
        let mut reader = WireReader::from_slice(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert!(matches!(reader.read_bytes(), Err(WireError::MalformedMessage(_))));
    }

    #[test]
    fn packed_block() {
        let mut reader = WireReader::from_slice(&[0x04, 0x01, 0x96, 0x01, 0x03, 0x09]);
        let mut values = Vec::new();
        reader.read_packed::<UInt32>(&mut values).unwrap();
        assert_eq!(values, [1, 150, 3]);
        assert_eq!(reader.read_raw_byte().unwrap(), 0x09);
    }

    #[test]
    fn packed_block_with_partial_value() {
        let mut reader = WireReader::from_slice(&[0x06, 1, 0, 0, 0, 2, 0]);
        let mut values = Vec::new();
        assert_eq!(reader.read_packed::<Fixed32>(&mut values), Err(WireError::TruncatedInput));
        assert_eq!(values, [1]);
        assert_eq!(reader.bytes_until_limit(), None);
    }

    #[test]
    fn stream_reader_with_tiny_buffer() {
        let bytes = [0x08, 0xac, 0x02, 0x12, 0x03, b'a', b'b', b'c'];
        let config = ReaderConfig { stream_buffer_size: 1, ..ReaderConfig::default() };
        let mut reader = WireReader::from_stream(&bytes[..], config);
        reader.read_tag().unwrap();
        assert_eq!(reader.read_uint64().unwrap(), 300);
        reader.read_tag().unwrap();
        assert_eq!(reader.read_bytes().unwrap().as_ref(), b"abc");
        assert!(reader.is_at_end().unwrap());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let mut cbor = Vec::new();
        let partial = ciborium::Value::Map(vec![(
            ciborium::Value::Text("recursion_limit".into()),
            ciborium::Value::Integer(8.into()),
        )]);
        ciborium::into_writer(&partial, &mut cbor).unwrap();
        let config: ReaderConfig = ciborium::from_reader(&cbor[..]).unwrap();
        assert_eq!(config.recursion_limit, 8);
        assert_eq!(config.size_limit, DEFAULT_SIZE_LIMIT);
        assert_eq!(config.stream_buffer_size, DEFAULT_STREAM_BUFFER_SIZE);
    }
}
