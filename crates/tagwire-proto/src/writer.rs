//! Buffered encoder.
//!
//! [`WireWriter`] stages bytes in a block of [`WriterConfig::block_size`]
//! bytes and hands full blocks to its [`Sink`]. The block size only changes
//! how many times the sink is called ([`WireWriter::flush_count`]), never the
//! bytes that reach it.
//!
//! # Flushing
//!
//! Staged bytes reach the sink on [`WireWriter::flush`] or
//! [`WireWriter::finish`]. There is no flush on drop: a failed flush could
//! not be reported from `Drop`. [`WireWriter::scoped`] runs a closure and
//! flushes on every exit path:
//!
//! ```
//! use tagwire_proto::{WireWriter, WriterConfig};
//!
//! let mut out = Vec::new();
//! WireWriter::scoped(&mut out, WriterConfig::default(), |w| {
//!     w.write_uint32(1, 150)?;
//!     w.write_string(2, "hi")
//! })
//! .unwrap();
//! assert_eq!(out, [0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i']);
//! ```
//!
//! # Out of space
//!
//! Against a bounded sink every raw write first checks the space left. A raw
//! write that does not fit fails with [`WireError::OutOfSpace`] before
//! staging any of its bytes. A tagged write is a tag plus a raw write, so
//! its tag may already be staged when the value fails; the output is then
//! incomplete and should be discarded.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{Result, WireError},
    fixed::{double_to_fixed64, encode_fixed32, encode_fixed64, float_to_fixed32},
    message::Encode,
    scalar::{
        packed_payload_len, Bool, Double, Enum, Fixed32, Fixed64, Float, Int32, Int64,
        SFixed32, SFixed64, SInt32, SInt64, ScalarCodec, UInt32, UInt64,
    },
    sink::Sink,
    tag::{Tag, WireType},
    varint::{encode_varint_array, zigzag_encode32, zigzag_encode64},
};

/// Default staging block size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Writer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Size of the staging block. Zero is treated as 1.
    pub block_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { block_size: DEFAULT_BLOCK_SIZE }
    }
}

/// Encoder over a [`Sink`].
///
/// Single-threaded: share the produced bytes, not the writer.
#[derive(Debug)]
pub struct WireWriter<S: Sink> {
    sink: S,
    staged: Vec<u8>,
    block_size: usize,
    total_written: usize,
    flushes: usize,
}

impl<S: Sink> WireWriter<S> {
    /// Writer with the default block size
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, WriterConfig::default())
    }

    /// Writer with an explicit configuration
    pub fn with_config(sink: S, config: WriterConfig) -> Self {
        let block_size = config.block_size.max(1);
        Self {
            sink,
            staged: Vec::with_capacity(block_size),
            block_size,
            total_written: 0,
            flushes: 0,
        }
    }

    /// Run `f` against a fresh writer over `sink`, then flush, whether `f`
    /// succeeded or not.
    ///
    /// # Errors
    ///
    /// The error from `f` if it failed, otherwise the flush error if any.
    pub fn scoped<T>(
        sink: S,
        config: WriterConfig,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let mut writer = Self::with_config(sink, config);
        let result = f(&mut writer);
        let flushed = writer.flush();
        let value = result?;
        flushed?;
        Ok(value)
    }

    /// Staging block size in effect
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Logical bytes written since construction, staged or not
    #[must_use]
    pub fn total_bytes_written(&self) -> usize {
        self.total_written
    }

    /// Times staged bytes were handed to the sink
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Space left in a bounded sink after the staged bytes; `None` when
    /// the sink is unbounded.
    #[must_use]
    pub fn space_left(&self) -> Option<usize> {
        self.sink.remaining().map(|left| left.saturating_sub(self.staged.len()))
    }

    /// Verify that a bounded sink was filled exactly.
    ///
    /// Used after encoding into a buffer sized with
    /// [`Encode::encoded_len`]. Unbounded sinks always pass.
    ///
    /// # Errors
    ///
    /// [`WireError::LengthMismatch`] if space is left over.
    pub fn check_no_space_left(&self) -> Result<()> {
        match self.space_left() {
            Some(0) | None => Ok(()),
            Some(left) => Err(WireError::LengthMismatch {
                declared: self.total_written + left,
                written: self.total_written,
            }),
        }
    }

    /// Borrow the sink. Staged bytes are not in it yet.
    #[must_use]
    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    /// Hand staged bytes to the sink and flush the sink itself.
    ///
    /// # Errors
    ///
    /// Propagates sink errors. Staged bytes stay staged on failure.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_block()?;
        self.sink.flush()
    }

    /// Flush and return the sink.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::flush`].
    pub fn finish(mut self) -> Result<S> {
        self.flush()?;
        Ok(self.sink)
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        self.sink.write_all(&self.staged)?;
        self.staged.clear();
        self.flushes += 1;
        Ok(())
    }

    fn ensure_space(&self, needed: usize) -> Result<()> {
        match self.space_left() {
            Some(remaining) if needed > remaining => {
                Err(WireError::OutOfSpace { needed, remaining })
            },
            _ => Ok(()),
        }
    }

    // Raw (untagged) writes

    /// Write raw bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::OutOfSpace`] if a bounded sink cannot take all of them.
    pub fn write_raw_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_space(bytes.len())?;

        let room = self.block_size - self.staged.len();
        if bytes.len() <= room {
            self.staged.extend_from_slice(bytes);
        } else {
            let (head, tail) = bytes.split_at(room);
            self.staged.extend_from_slice(head);
            self.flush_block()?;
            if tail.len() <= self.block_size {
                self.staged.extend_from_slice(tail);
            } else {
                // Larger than a block: skip staging
                self.sink.write_all(tail)?;
                self.flushes += 1;
            }
        }
        self.total_written += bytes.len();
        Ok(())
    }

    /// Write one raw byte.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_byte(&mut self, byte: u8) -> Result<()> {
        self.write_raw_bytes(&[byte])
    }

    /// Write an untagged varint.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_varint64(&mut self, value: u64) -> Result<()> {
        let (bytes, len) = encode_varint_array(value);
        self.write_raw_bytes(&bytes[..len])
    }

    /// Write an untagged varint of a 32-bit value.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_varint32(&mut self, value: u32) -> Result<()> {
        self.write_raw_varint64(u64::from(value))
    }

    /// Write 4 little-endian bytes.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_fixed32(&mut self, value: u32) -> Result<()> {
        let mut bytes = [0u8; 4];
        encode_fixed32(value, &mut &mut bytes[..]);
        self.write_raw_bytes(&bytes)
    }

    /// Write 8 little-endian bytes.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_fixed64(&mut self, value: u64) -> Result<()> {
        let mut bytes = [0u8; 8];
        encode_fixed64(value, &mut &mut bytes[..]);
        self.write_raw_bytes(&bytes)
    }

    /// Untagged `int32`: negative values are sign-extended to 10 bytes so
    /// that readers treating the field as `int64` see the same number.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    #[allow(clippy::cast_sign_loss)]
    pub fn write_raw_int32(&mut self, value: i32) -> Result<()> {
        self.write_raw_varint64(i64::from(value) as u64)
    }

    /// Untagged `int64`
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    #[allow(clippy::cast_sign_loss)]
    pub fn write_raw_int64(&mut self, value: i64) -> Result<()> {
        self.write_raw_varint64(value as u64)
    }

    /// Untagged `sint32`
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_sint32(&mut self, value: i32) -> Result<()> {
        self.write_raw_varint32(zigzag_encode32(value))
    }

    /// Untagged `sint64`
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_sint64(&mut self, value: i64) -> Result<()> {
        self.write_raw_varint64(zigzag_encode64(value))
    }

    /// Untagged `sfixed32`
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    #[allow(clippy::cast_sign_loss)]
    pub fn write_raw_sfixed32(&mut self, value: i32) -> Result<()> {
        self.write_raw_fixed32(value as u32)
    }

    /// Untagged `sfixed64`
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    #[allow(clippy::cast_sign_loss)]
    pub fn write_raw_sfixed64(&mut self, value: i64) -> Result<()> {
        self.write_raw_fixed64(value as u64)
    }

    /// Untagged `float`
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_float(&mut self, value: f32) -> Result<()> {
        self.write_raw_fixed32(float_to_fixed32(value))
    }

    /// Untagged `double`
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_double(&mut self, value: f64) -> Result<()> {
        self.write_raw_fixed64(double_to_fixed64(value))
    }

    /// Untagged `bool`
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_raw_bool(&mut self, value: bool) -> Result<()> {
        self.write_raw_byte(u8::from(value))
    }

    /// Varint length prefix followed by `bytes`.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_raw_bytes`].
    pub fn write_length_delimited(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_raw_varint64(bytes.len() as u64)?;
        self.write_raw_bytes(bytes)
    }

    // Tagged writes

    /// Write a field tag.
    ///
    /// # Errors
    ///
    /// [`WireError::InvalidFieldNumber`] outside `1..=2^29-1`, otherwise as
    /// [`WireWriter::write_raw_bytes`].
    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) -> Result<()> {
        let tag = Tag::new(field_number, wire_type)?;
        self.write_raw_varint32(tag.to_raw())
    }

    /// Tag plus untagged value for any scalar kind.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_scalar<C: ScalarCodec>(
        &mut self,
        field_number: u32,
        value: C::Value,
    ) -> Result<()> {
        self.write_tag(field_number, C::WIRE_TYPE)?;
        C::write_raw(self, value)
    }

    /// `int32` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_int32(&mut self, field_number: u32, value: i32) -> Result<()> {
        self.write_scalar::<Int32>(field_number, value)
    }

    /// `int64` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_int64(&mut self, field_number: u32, value: i64) -> Result<()> {
        self.write_scalar::<Int64>(field_number, value)
    }

    /// `uint32` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_uint32(&mut self, field_number: u32, value: u32) -> Result<()> {
        self.write_scalar::<UInt32>(field_number, value)
    }

    /// `uint64` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_uint64(&mut self, field_number: u32, value: u64) -> Result<()> {
        self.write_scalar::<UInt64>(field_number, value)
    }

    /// `sint32` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_sint32(&mut self, field_number: u32, value: i32) -> Result<()> {
        self.write_scalar::<SInt32>(field_number, value)
    }

    /// `sint64` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_sint64(&mut self, field_number: u32, value: i64) -> Result<()> {
        self.write_scalar::<SInt64>(field_number, value)
    }

    /// `fixed32` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_fixed32(&mut self, field_number: u32, value: u32) -> Result<()> {
        self.write_scalar::<Fixed32>(field_number, value)
    }

    /// `fixed64` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_fixed64(&mut self, field_number: u32, value: u64) -> Result<()> {
        self.write_scalar::<Fixed64>(field_number, value)
    }

    /// `sfixed32` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_sfixed32(&mut self, field_number: u32, value: i32) -> Result<()> {
        self.write_scalar::<SFixed32>(field_number, value)
    }

    /// `sfixed64` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_sfixed64(&mut self, field_number: u32, value: i64) -> Result<()> {
        self.write_scalar::<SFixed64>(field_number, value)
    }

    /// `float` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_float(&mut self, field_number: u32, value: f32) -> Result<()> {
        self.write_scalar::<Float>(field_number, value)
    }

    /// `double` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_double(&mut self, field_number: u32, value: f64) -> Result<()> {
        self.write_scalar::<Double>(field_number, value)
    }

    /// `bool` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_bool(&mut self, field_number: u32, value: bool) -> Result<()> {
        self.write_scalar::<Bool>(field_number, value)
    }

    /// `enum` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_enum(&mut self, field_number: u32, value: i32) -> Result<()> {
        self.write_scalar::<Enum>(field_number, value)
    }

    /// `bytes` field
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_bytes(&mut self, field_number: u32, value: &[u8]) -> Result<()> {
        self.write_tag(field_number, WireType::LengthDelimited)?;
        self.write_length_delimited(value)
    }

    /// `string` field. A `&str` is well-formed UTF-8 by construction, so
    /// nothing is validated here.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_string(&mut self, field_number: u32, value: &str) -> Result<()> {
        self.write_bytes(field_number, value.as_bytes())
    }

    /// Embedded message field: tag, `message.encoded_len()` as the length
    /// prefix, then the message body.
    ///
    /// # Errors
    ///
    /// [`WireError::LengthMismatch`] if the body does not match the length
    /// its `encoded_len` reported, otherwise as [`WireWriter::write_tag`].
    pub fn write_message<M: Encode + ?Sized>(
        &mut self,
        field_number: u32,
        message: &M,
    ) -> Result<()> {
        self.write_tag(field_number, WireType::LengthDelimited)?;
        let declared = message.encoded_len();
        self.write_raw_varint64(declared as u64)?;
        let start = self.total_written;
        message.write_to(self)?;
        let written = self.total_written - start;
        if written != declared {
            return Err(WireError::LengthMismatch { declared, written });
        }
        Ok(())
    }

    /// Group field: START_GROUP tag, body, END_GROUP tag.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_group<M: Encode + ?Sized>(
        &mut self,
        field_number: u32,
        message: &M,
    ) -> Result<()> {
        self.write_tag(field_number, WireType::StartGroup)?;
        message.write_to(self)?;
        self.write_tag(field_number, WireType::EndGroup)
    }

    /// Packed repeated field: one length-delimited block of untagged
    /// values. Nothing is written for an empty slice.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_packed<C: ScalarCodec>(
        &mut self,
        field_number: u32,
        values: &[C::Value],
    ) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.write_tag(field_number, WireType::LengthDelimited)?;
        let declared = packed_payload_len::<C>(values);
        self.write_raw_varint64(declared as u64)?;
        let start = self.total_written;
        for &value in values {
            C::write_raw(self, value)?;
        }
        let written = self.total_written - start;
        if written != declared {
            return Err(WireError::LengthMismatch { declared, written });
        }
        Ok(())
    }

    /// Unpacked repeated field: one tag per value.
    ///
    /// # Errors
    ///
    /// Same as [`WireWriter::write_tag`].
    pub fn write_repeated<C: ScalarCodec>(
        &mut self,
        field_number: u32,
        values: &[C::Value],
    ) -> Result<()> {
        for &value in values {
            self.write_scalar::<C>(field_number, value)?;
        }
        Ok(())
    }
}
