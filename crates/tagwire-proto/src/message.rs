//! The seam between the codec and message types.
//!
//! Anything that serializes as a message body implements [`Encode`];
//! anything that can absorb one implements [`Merge`]. The codec only knows
//! wire mechanics: field semantics live in the implementations.

use crate::{
    errors::{Result, WireError},
    reader::WireReader,
    sink::{Sink, SliceSink},
    source::Source,
    tag::WireType,
    varint::encoded_len_varint,
    writer::{WireWriter, WriterConfig},
};

/// A message body that can be written to a [`WireWriter`].
pub trait Encode {
    /// Exact number of bytes [`Encode::write_to`] emits.
    ///
    /// Used as the length prefix when this message is embedded, so it must
    /// agree with `write_to` byte for byte.
    fn encoded_len(&self) -> usize;

    /// Write the message body (no length prefix, no tag).
    ///
    /// # Errors
    ///
    /// Propagates writer errors.
    fn write_to<S: Sink>(&self, writer: &mut WireWriter<S>) -> Result<()>;

    /// Encode into a new vector sized by [`Encode::encoded_len`].
    ///
    /// # Errors
    ///
    /// [`WireError::LengthMismatch`] if an embedded message misreports its
    /// length.
    fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        WireWriter::scoped(&mut out, WriterConfig::default(), |writer| self.write_to(writer))?;
        Ok(out)
    }

    /// Encode into `buf`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// [`WireError::OutOfSpace`] if `buf` is shorter than
    /// [`Encode::encoded_len`]; nothing is written in that case.
    fn encode_to_slice(&self, buf: &mut [u8]) -> Result<usize> {
        let needed = self.encoded_len();
        if needed > buf.len() {
            return Err(WireError::OutOfSpace { needed, remaining: buf.len() });
        }
        let mut sink = SliceSink::new(buf);
        WireWriter::scoped(&mut sink, WriterConfig::default(), |writer| self.write_to(writer))?;
        Ok(sink.position())
    }

    /// Write a varint length prefix, then the body. Several messages
    /// written this way can share one stream.
    ///
    /// # Errors
    ///
    /// Propagates writer errors.
    fn encode_length_delimited<S: Sink>(&self, writer: &mut WireWriter<S>) -> Result<()> {
        writer.write_raw_varint64(self.encoded_len() as u64)?;
        self.write_to(writer)
    }

    /// Size of [`Encode::encode_length_delimited`] output
    fn length_delimited_len(&self) -> usize {
        let len = self.encoded_len();
        encoded_len_varint(len as u64) + len
    }
}

/// A message that absorbs fields from a [`WireReader`].
pub trait Merge {
    /// Read fields until [`WireReader::read_tag`] returns `None` or an
    /// END_GROUP tag is seen, merging each into `self`.
    ///
    /// Implementations leave an END_GROUP tag as the reader's
    /// [`WireReader::last_tag`] and return; the caller decides whether it
    /// was expected.
    ///
    /// # Errors
    ///
    /// Propagates reader errors and whatever the implementation rejects.
    fn merge_from<S: Source>(&mut self, reader: &mut WireReader<S>) -> Result<()>;

    /// Merge a complete message held in `bytes`.
    ///
    /// # Errors
    ///
    /// [`WireError::MalformedMessage`] for a top-level END_GROUP, plus
    /// anything [`Merge::merge_from`] reports.
    fn merge_from_slice(&mut self, bytes: &[u8]) -> Result<()> {
        let mut reader = WireReader::from_slice(bytes);
        self.merge_from(&mut reader)?;
        reader.check_last_tag_was(None)
    }

    /// Merge the next length-prefixed message of a delimited stream.
    ///
    /// Returns `false`, consuming nothing, when the reader is already at the
    /// end.
    ///
    /// # Errors
    ///
    /// Same as [`WireReader::read_message`].
    fn merge_length_delimited<S: Source>(&mut self, reader: &mut WireReader<S>) -> Result<bool> {
        if reader.is_at_end()? {
            return Ok(false);
        }
        reader.read_message(self)?;
        Ok(true)
    }
}

/// Skip every field, for callers that only need to validate framing.
impl Merge for () {
    fn merge_from<S: Source>(&mut self, reader: &mut WireReader<S>) -> Result<()> {
        while let Some(tag) = reader.read_tag()? {
            if tag.wire_type() == WireType::EndGroup {
                break;
            }
            reader.skip_field(tag)?;
        }
        Ok(())
    }
}
