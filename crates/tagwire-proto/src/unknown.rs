//! Storage for fields the active schema does not recognize.
//!
//! Values are kept per field number and, within a field, per wire type, so
//! that re-serializing a message written by a newer schema loses nothing.
//! Output order is ascending field number, then varints, fixed32s, fixed64s,
//! length-delimited values and groups. Input written by a conforming encoder
//! (fields in ascending order) therefore comes back byte for byte.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::{
    errors::Result,
    fixed::{FIXED32_LEN, FIXED64_LEN},
    message::{Encode, Merge},
    reader::WireReader,
    sink::Sink,
    source::Source,
    tag::{tag_len, Tag, WireType},
    varint::encoded_len_varint,
    writer::WireWriter,
};

/// All values seen for one unknown field number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownField {
    /// Varint values, undecoded
    pub varint: Vec<u64>,
    /// Fixed32 values
    pub fixed32: Vec<u32>,
    /// Fixed64 values
    pub fixed64: Vec<u64>,
    /// Length-delimited payloads (strings, bytes, messages, packed blocks)
    pub length_delimited: Vec<Bytes>,
    /// Group bodies
    pub group: Vec<UnknownFieldSet>,
}

impl UnknownField {
    /// Number of values across all wire types
    #[must_use]
    pub fn len(&self) -> usize {
        self.varint.len()
            + self.fixed32.len()
            + self.fixed64.len()
            + self.length_delimited.len()
            + self.group.len()
    }

    /// True if no value was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append all of `other`'s values
    pub fn merge(&mut self, other: &UnknownField) {
        self.varint.extend_from_slice(&other.varint);
        self.fixed32.extend_from_slice(&other.fixed32);
        self.fixed64.extend_from_slice(&other.fixed64);
        self.length_delimited.extend_from_slice(&other.length_delimited);
        self.group.extend_from_slice(&other.group);
    }

    fn encoded_len(&self, field_number: u32) -> usize {
        let tag = tag_len(field_number);
        let varints: usize = self.varint.iter().map(|&v| tag + encoded_len_varint(v)).sum();
        let delimited: usize = self
            .length_delimited
            .iter()
            .map(|b| tag + encoded_len_varint(b.len() as u64) + b.len())
            .sum();
        let groups: usize = self.group.iter().map(|g| 2 * tag + g.encoded_len()).sum();
        varints
            + self.fixed32.len() * (tag + FIXED32_LEN)
            + self.fixed64.len() * (tag + FIXED64_LEN)
            + delimited
            + groups
    }

    fn write_to<S: Sink>(&self, field_number: u32, writer: &mut WireWriter<S>) -> Result<()> {
        for &value in &self.varint {
            writer.write_uint64(field_number, value)?;
        }
        for &value in &self.fixed32 {
            writer.write_fixed32(field_number, value)?;
        }
        for &value in &self.fixed64 {
            writer.write_fixed64(field_number, value)?;
        }
        for value in &self.length_delimited {
            writer.write_bytes(field_number, value)?;
        }
        for group in &self.group {
            writer.write_group(field_number, group)?;
        }
        Ok(())
    }
}

/// Unknown fields of one message, ordered by field number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownFieldSet {
    fields: BTreeMap<u32, UnknownField>,
}

impl UnknownFieldSet {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct field numbers
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no field is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Values stored for `field_number`
    #[must_use]
    pub fn field(&self, field_number: u32) -> Option<&UnknownField> {
        self.fields.get(&field_number)
    }

    /// Fields in ascending field-number order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &UnknownField)> {
        self.fields.iter().map(|(&number, field)| (number, field))
    }

    /// Drop every field
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Remove and return the values stored for `field_number`
    pub fn remove(&mut self, field_number: u32) -> Option<UnknownField> {
        self.fields.remove(&field_number)
    }

    fn entry(&mut self, field_number: u32) -> &mut UnknownField {
        self.fields.entry(field_number).or_default()
    }

    /// Record a varint value
    pub fn add_varint(&mut self, field_number: u32, value: u64) {
        self.entry(field_number).varint.push(value);
    }

    /// Record a fixed32 value
    pub fn add_fixed32(&mut self, field_number: u32, value: u32) {
        self.entry(field_number).fixed32.push(value);
    }

    /// Record a fixed64 value
    pub fn add_fixed64(&mut self, field_number: u32, value: u64) {
        self.entry(field_number).fixed64.push(value);
    }

    /// Record a length-delimited payload
    pub fn add_length_delimited(&mut self, field_number: u32, value: Bytes) {
        self.entry(field_number).length_delimited.push(value);
    }

    /// Record a group body
    pub fn add_group(&mut self, field_number: u32, value: UnknownFieldSet) {
        self.entry(field_number).group.push(value);
    }

    /// Append every value in `other`
    pub fn merge(&mut self, other: &UnknownFieldSet) {
        for (&number, field) in &other.fields {
            self.entry(number).merge(field);
        }
    }

    /// Store the value of a field whose tag was just read.
    ///
    /// Returns `false` for an END_GROUP tag, which belongs to the enclosing
    /// group and carries no value.
    ///
    /// # Errors
    ///
    /// Propagates reader errors.
    pub fn merge_field_from<S: Source>(
        &mut self,
        tag: Tag,
        reader: &mut WireReader<S>,
    ) -> Result<bool> {
        let number = tag.field_number();
        match tag.wire_type() {
            WireType::Varint => {
                let value = reader.read_uint64()?;
                self.add_varint(number, value);
            },
            WireType::Fixed64 => {
                let value = reader.read_fixed64()?;
                self.add_fixed64(number, value);
            },
            WireType::LengthDelimited => {
                let value = reader.read_bytes()?;
                self.add_length_delimited(number, value);
            },
            WireType::StartGroup => {
                let mut group = UnknownFieldSet::new();
                reader.read_group(number, &mut group)?;
                self.add_group(number, group);
            },
            WireType::EndGroup => return Ok(false),
            WireType::Fixed32 => {
                let value = reader.read_fixed32()?;
                self.add_fixed32(number, value);
            },
        }
        Ok(true)
    }
}

impl Encode for UnknownFieldSet {
    fn encoded_len(&self) -> usize {
        self.fields.iter().map(|(&number, field)| field.encoded_len(number)).sum()
    }

    fn write_to<S: Sink>(&self, writer: &mut WireWriter<S>) -> Result<()> {
        for (&number, field) in &self.fields {
            field.write_to(number, writer)?;
        }
        Ok(())
    }
}

impl Merge for UnknownFieldSet {
    fn merge_from<S: Source>(&mut self, reader: &mut WireReader<S>) -> Result<()> {
        while let Some(tag) = reader.read_tag()? {
            if !self.merge_field_from(tag, reader)? {
                break;
            }
        }
        Ok(())
    }
}
