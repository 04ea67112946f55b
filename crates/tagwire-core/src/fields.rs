//! Field storage and decode dispatch.
//!
//! A [`FieldMap`] holds the known fields of one message, ordered by field
//! number. It is the only place where wire bytes meet the schema:
//!
//! - a field whose wire type matches its declared kind is decoded into a
//!   [`Value`]
//! - a packed block is accepted for any repeated packable field, and
//!   one-tag-per-value input is accepted for packed fields
//! - anything else (undeclared numbers, unexpected wire types) goes to the
//!   message's [`UnknownFieldSet`] untouched
//!
//! Decoding merges: a singular message field seen twice merges the second
//! body into the first, repeated fields append, and other singular fields
//! keep the last value. Parsing the concatenation of two encodings is
//! therefore the same as merging the two parsed messages.

use std::{collections::BTreeMap, sync::Arc};

use tagwire_proto::{
    tag::tag_len, Encode, Merge, Result as WireResult, Sink, Source, Tag, UnknownFieldSet,
    WireReader, WireType, WireWriter,
};

use crate::{
    error::{FieldError, Result},
    message::Message,
    schema::{Cardinality, FieldKind, FieldSpec, MessageType},
    value::Value,
};

/// Stored value(s) of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Value of a singular field
    Single(Value),
    /// Values of a repeated field, never empty
    Repeated(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    spec: &'static FieldSpec,
    value: FieldValue,
}

/// Known fields of one message, ordered by field number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: BTreeMap<u32, Entry>,
}

impl FieldMap {
    /// Empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields present
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no field is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if field `number` is present
    #[must_use]
    pub fn contains(&self, number: u32) -> bool {
        self.entries.contains_key(&number)
    }

    /// Stored value(s) of field `number`
    #[must_use]
    pub fn get(&self, number: u32) -> Option<&FieldValue> {
        self.entries.get(&number).map(|entry| &entry.value)
    }

    /// Value of singular field `number`
    #[must_use]
    pub fn single(&self, number: u32) -> Option<&Value> {
        match self.get(number) {
            Some(FieldValue::Single(value)) => Some(value),
            _ => None,
        }
    }

    /// Values of repeated field `number`; empty if absent
    #[must_use]
    pub fn repeated(&self, number: u32) -> &[Value] {
        match self.get(number) {
            Some(FieldValue::Repeated(values)) => values,
            _ => &[],
        }
    }

    /// Present fields in ascending field-number order
    pub fn iter(&self) -> impl Iterator<Item = (&'static FieldSpec, &FieldValue)> {
        self.entries.values().map(|entry| (entry.spec, &entry.value))
    }

    /// Set a singular field.
    ///
    /// # Errors
    ///
    /// [`FieldError::NotSingular`] for repeated fields and
    /// [`FieldError::KindMismatch`] if `value` does not fit the field.
    pub fn set(&mut self, spec: &'static FieldSpec, value: Value) -> Result<()> {
        spec.expect_singular()?;
        check_fits(spec, &value)?;
        self.entries.insert(spec.number, Entry { spec, value: FieldValue::Single(value) });
        Ok(())
    }

    /// Append to a repeated field.
    ///
    /// # Errors
    ///
    /// [`FieldError::NotRepeated`] for singular fields and
    /// [`FieldError::KindMismatch`] if `value` does not fit the field.
    pub fn push(&mut self, spec: &'static FieldSpec, value: Value) -> Result<()> {
        spec.expect_repeated()?;
        check_fits(spec, &value)?;
        self.push_unchecked(spec, value);
        Ok(())
    }

    /// Replace element `index` of a repeated field.
    ///
    /// # Errors
    ///
    /// As [`FieldMap::push`], plus [`FieldError::IndexOutOfRange`].
    pub fn set_repeated(
        &mut self,
        spec: &'static FieldSpec,
        index: usize,
        value: Value,
    ) -> Result<()> {
        spec.expect_repeated()?;
        check_fits(spec, &value)?;
        let slot = match self.entries.get_mut(&spec.number) {
            Some(Entry { value: FieldValue::Repeated(values), .. }) => {
                let len = values.len();
                values.get_mut(index).ok_or(FieldError::IndexOutOfRange {
                    number: spec.number,
                    index,
                    len,
                })?
            },
            _ => {
                return Err(FieldError::IndexOutOfRange { number: spec.number, index, len: 0 })
            },
        };
        *slot = value;
        Ok(())
    }

    /// Remove field `number`, returning what it held
    pub fn remove(&mut self, number: u32) -> Option<FieldValue> {
        self.entries.remove(&number).map(|entry| entry.value)
    }

    /// Remove every field
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn push_unchecked(&mut self, spec: &'static FieldSpec, value: Value) {
        let entry = self
            .entries
            .entry(spec.number)
            .or_insert_with(|| Entry { spec, value: FieldValue::Repeated(Vec::new()) });
        match &mut entry.value {
            FieldValue::Repeated(values) => values.push(value),
            single @ FieldValue::Single(_) => *single = FieldValue::Repeated(vec![value]),
        }
    }

    /// Merge `other` into `self` field by field, skipping numbers for which
    /// `skip` returns true. Singular messages merge recursively, repeated
    /// fields append, other singular fields are overwritten.
    pub(crate) fn merge_filtered(&mut self, other: &FieldMap, skip: impl Fn(u32) -> bool) {
        for (&number, incoming) in &other.entries {
            if skip(number) {
                continue;
            }
            let current = self.entries.get_mut(&number).map(|entry| &mut entry.value);
            let merged = match (&incoming.value, current) {
                (FieldValue::Repeated(values), Some(FieldValue::Repeated(own))) => {
                    own.extend(values.iter().cloned());
                    true
                },
                (
                    FieldValue::Single(Value::Message(theirs)),
                    Some(FieldValue::Single(Value::Message(ours))),
                ) => {
                    *ours = Arc::new(ours.merged_with(theirs));
                    true
                },
                _ => false,
            };
            if !merged {
                self.entries.insert(number, incoming.clone());
            }
        }
    }

    /// Decode one field whose tag was just read.
    ///
    /// Returns `false` for an END_GROUP tag, which ends the enclosing group.
    pub(crate) fn merge_field<S: Source>(
        &mut self,
        ty: &'static MessageType,
        tag: Tag,
        reader: &mut WireReader<S>,
        unknown: &mut UnknownFieldSet,
    ) -> WireResult<bool> {
        let wire_type = tag.wire_type();
        if wire_type == WireType::EndGroup {
            return Ok(false);
        }
        let Some(spec) = ty.field(tag.field_number()) else {
            tracing::trace!(message = ty.name(), field = tag.field_number(), "unknown field");
            return unknown.merge_field_from(tag, reader);
        };

        if wire_type == spec.kind.wire_type() {
            let value = self.read_value(spec, reader)?;
            if spec.is_repeated() {
                self.push_unchecked(spec, value);
            } else {
                self.entries.insert(spec.number, Entry { spec, value: FieldValue::Single(value) });
            }
        } else if wire_type == WireType::LengthDelimited
            && spec.is_repeated()
            && spec.kind.is_packable()
        {
            let len = reader.read_length()?;
            let handle = reader.push_limit(len)?;
            let read = self.read_packed_values(spec, reader);
            reader.pop_limit(handle);
            read?;
        } else {
            tracing::debug!(
                message = ty.name(),
                field = spec.number,
                wire_type = ?wire_type,
                "wire type does not match schema, keeping field as unknown"
            );
            return unknown.merge_field_from(tag, reader);
        }
        Ok(true)
    }

    fn read_packed_values<S: Source>(
        &mut self,
        spec: &'static FieldSpec,
        reader: &mut WireReader<S>,
    ) -> WireResult<()> {
        while !reader.is_at_end()? {
            let value = self.read_value(spec, reader)?;
            self.push_unchecked(spec, value);
        }
        Ok(())
    }

    fn read_value<S: Source>(
        &self,
        spec: &'static FieldSpec,
        reader: &mut WireReader<S>,
    ) -> WireResult<Value> {
        let value = match spec.kind {
            FieldKind::Int32 => Value::Int32(reader.read_int32()?),
            FieldKind::Int64 => Value::Int64(reader.read_int64()?),
            FieldKind::UInt32 => Value::UInt32(reader.read_uint32()?),
            FieldKind::UInt64 => Value::UInt64(reader.read_uint64()?),
            FieldKind::SInt32 => Value::SInt32(reader.read_sint32()?),
            FieldKind::SInt64 => Value::SInt64(reader.read_sint64()?),
            FieldKind::Fixed32 => Value::Fixed32(reader.read_fixed32()?),
            FieldKind::Fixed64 => Value::Fixed64(reader.read_fixed64()?),
            FieldKind::SFixed32 => Value::SFixed32(reader.read_sfixed32()?),
            FieldKind::SFixed64 => Value::SFixed64(reader.read_sfixed64()?),
            FieldKind::Float => Value::Float(reader.read_float()?),
            FieldKind::Double => Value::Double(reader.read_double()?),
            FieldKind::Bool => Value::Bool(reader.read_bool()?),
            FieldKind::Enum => Value::Enum(reader.read_enum()?),
            FieldKind::String => Value::String(Arc::from(reader.read_string()?)),
            FieldKind::Bytes => Value::Bytes(reader.read_bytes()?),
            FieldKind::Message(ty) => {
                let mut body = self.merge_base(spec, ty);
                reader.read_message(&mut body)?;
                Value::Message(Arc::new(body.into_message()))
            },
            FieldKind::Group(ty) => {
                let mut body = self.merge_base(spec, ty);
                reader.read_group(spec.number, &mut body)?;
                Value::Message(Arc::new(body.into_message()))
            },
        };
        Ok(value)
    }

    /// Starting point for decoding an embedded message: the current value
    /// for singular fields (so a second occurrence merges), empty otherwise
    fn merge_base(&self, spec: &FieldSpec, ty: &'static MessageType) -> MessageBody {
        match self.single(spec.number) {
            Some(Value::Message(existing)) if !spec.is_repeated() => MessageBody {
                ty,
                fields: FieldMap::clone(existing.field_map()),
                unknown: UnknownFieldSet::clone(existing.unknown_fields()),
            },
            _ => MessageBody::new(ty),
        }
    }
}

fn check_fits(spec: &FieldSpec, value: &Value) -> Result<()> {
    if value.fits(spec.kind) {
        Ok(())
    } else {
        Err(FieldError::KindMismatch {
            number: spec.number,
            expected: spec.kind,
            found: value.kind_name(),
        })
    }
}

/// Body of a packed field
struct Packed<'a>(&'a [Value]);

impl Encode for Packed<'_> {
    fn encoded_len(&self) -> usize {
        self.0.iter().map(Value::raw_len).sum()
    }

    fn write_to<S: Sink>(&self, writer: &mut WireWriter<S>) -> WireResult<()> {
        self.0.iter().try_for_each(|value| value.write_raw(writer))
    }
}

impl Encode for FieldMap {
    fn encoded_len(&self) -> usize {
        self.iter()
            .map(|(spec, value)| match (value, spec.cardinality) {
                (FieldValue::Single(value), _) => value.tagged_len(spec.number, spec.kind),
                (FieldValue::Repeated(values), Cardinality::Packed) => {
                    tag_len(spec.number) + Packed(values).length_delimited_len()
                },
                (FieldValue::Repeated(values), _) => {
                    values.iter().map(|value| value.tagged_len(spec.number, spec.kind)).sum()
                },
            })
            .sum()
    }

    fn write_to<S: Sink>(&self, writer: &mut WireWriter<S>) -> WireResult<()> {
        for (spec, value) in self.iter() {
            match (value, spec.cardinality) {
                (FieldValue::Single(value), _) => {
                    value.write_tagged(writer, spec.number, spec.kind)?;
                },
                (FieldValue::Repeated(values), Cardinality::Packed) => {
                    writer.write_message(spec.number, &Packed(values))?;
                },
                (FieldValue::Repeated(values), _) => {
                    for value in values {
                        value.write_tagged(writer, spec.number, spec.kind)?;
                    }
                },
            }
        }
        Ok(())
    }
}

/// Owned fields and unknown fields of a message being decoded.
#[derive(Debug)]
pub(crate) struct MessageBody {
    pub(crate) ty: &'static MessageType,
    pub(crate) fields: FieldMap,
    pub(crate) unknown: UnknownFieldSet,
}

impl MessageBody {
    pub(crate) fn new(ty: &'static MessageType) -> Self {
        Self { ty, fields: FieldMap::new(), unknown: UnknownFieldSet::new() }
    }

    pub(crate) fn into_message(self) -> Message {
        Message::from_parts(self.ty, Arc::new(self.fields), Arc::new(self.unknown))
    }
}

impl Merge for MessageBody {
    fn merge_from<S: Source>(&mut self, reader: &mut WireReader<S>) -> WireResult<()> {
        while let Some(tag) = reader.read_tag()? {
            if !self.fields.merge_field(self.ty, tag, reader, &mut self.unknown)? {
                break;
            }
        }
        Ok(())
    }
}

/// Field-by-field merge of two messages of the same type: fields set in
/// `other` overwrite scalars in `base`, append to repeated fields and merge
/// into embedded messages. Unknown fields are appended.
///
/// # Errors
///
/// [`FieldError::TypeMismatch`] if the messages have different types.
pub fn merge_messages(base: &Message, other: &Message) -> Result<Message> {
    if base.message_type() != other.message_type() {
        return Err(FieldError::TypeMismatch {
            expected: base.message_type().name(),
            found: other.message_type().name(),
        });
    }
    Ok(base.merged_with(other))
}
