//! Immutable message snapshots.
//!
//! A [`Message`] is never modified after construction. Its field storage
//! sits behind an `Arc`, so a snapshot handed out by a builder shares that
//! storage with the builder until the builder is next mutated. Snapshots
//! are `Send + Sync` and may be read from any number of threads.

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use tagwire_proto::{
    Encode, Merge, Result as WireResult, Sink, Source, UnknownFieldSet, WireReader, WireWriter,
};

use crate::{
    fields::{FieldMap, MessageBody},
    schema::MessageType,
    value::Value,
};

/// An immutable, fully built message.
pub struct Message {
    ty: &'static MessageType,
    fields: Arc<FieldMap>,
    unknown: Arc<UnknownFieldSet>,
    size: OnceLock<usize>,
}

impl Message {
    pub(crate) fn empty(ty: &'static MessageType) -> Self {
        Self::from_parts(ty, Arc::default(), Arc::default())
    }

    pub(crate) fn from_parts(
        ty: &'static MessageType,
        fields: Arc<FieldMap>,
        unknown: Arc<UnknownFieldSet>,
    ) -> Self {
        Self { ty, fields, unknown, size: OnceLock::new() }
    }

    /// The shared empty message of type `ty`
    #[must_use]
    pub fn default_instance(ty: &'static MessageType) -> Arc<Self> {
        ty.default_instance()
    }

    /// Parse a complete message of type `ty` from `bytes`.
    ///
    /// A field that appears more than once is merged as described in
    /// [`crate::fields`].
    ///
    /// # Errors
    ///
    /// Any decode error from the reader, including
    /// [`tagwire_proto::WireError::MalformedMessage`] for a stray END_GROUP.
    pub fn parse_from(ty: &'static MessageType, bytes: &[u8]) -> WireResult<Self> {
        let mut body = MessageBody::new(ty);
        body.merge_from_slice(bytes)?;
        Ok(body.into_message())
    }

    /// Parse a message of type `ty` from `reader`, up to its current limit
    /// or the end of input.
    ///
    /// # Errors
    ///
    /// As [`Message::parse_from`].
    pub fn parse_from_with<S: Source>(
        ty: &'static MessageType,
        reader: &mut WireReader<S>,
    ) -> WireResult<Self> {
        let mut body = MessageBody::new(ty);
        body.merge_from(reader)?;
        reader.check_last_tag_was(None)?;
        Ok(body.into_message())
    }

    /// Parse the next length-prefixed message of a delimited stream, or
    /// return `None` at the end of the stream.
    ///
    /// # Errors
    ///
    /// As [`Message::parse_from`].
    pub fn parse_length_delimited<S: Source>(
        ty: &'static MessageType,
        reader: &mut WireReader<S>,
    ) -> WireResult<Option<Self>> {
        let mut body = MessageBody::new(ty);
        if !body.merge_length_delimited(reader)? {
            return Ok(None);
        }
        Ok(Some(body.into_message()))
    }

    /// Schema of this message
    #[must_use]
    pub fn message_type(&self) -> &'static MessageType {
        self.ty
    }

    /// Value of singular field `number`, if set
    #[must_use]
    pub fn get(&self, number: u32) -> Option<&Value> {
        self.fields.single(number)
    }

    /// True if field `number` is set (or, for repeated fields, non-empty)
    #[must_use]
    pub fn has(&self, number: u32) -> bool {
        self.fields.contains(number)
    }

    /// Values of repeated field `number`
    #[must_use]
    pub fn repeated(&self, number: u32) -> &[Value] {
        self.fields.repeated(number)
    }

    /// Number of fields present
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Known fields
    #[must_use]
    pub fn field_map(&self) -> &FieldMap {
        &self.fields
    }

    /// Fields the schema does not declare, kept for re-serialization
    #[must_use]
    pub fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }

    pub(crate) fn shared_fields(&self) -> &Arc<FieldMap> {
        &self.fields
    }

    pub(crate) fn shared_unknown(&self) -> &Arc<UnknownFieldSet> {
        &self.unknown
    }

    /// `self` with `other` merged in. Both must be of the same type.
    pub(crate) fn merged_with(&self, other: &Message) -> Message {
        let mut fields = FieldMap::clone(&self.fields);
        fields.merge_filtered(&other.fields, |_| false);
        let unknown = if other.unknown.is_empty() {
            Arc::clone(&self.unknown)
        } else {
            let mut unknown = UnknownFieldSet::clone(&self.unknown);
            unknown.merge(&other.unknown);
            Arc::new(unknown)
        };
        Message::from_parts(self.ty, Arc::new(fields), unknown)
    }
}

impl Encode for Message {
    fn encoded_len(&self) -> usize {
        *self.size.get_or_init(|| self.fields.encoded_len() + self.unknown.encoded_len())
    }

    fn write_to<S: Sink>(&self, writer: &mut WireWriter<S>) -> WireResult<()> {
        self.fields.write_to(writer)?;
        self.unknown.write_to(writer)
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.fields == other.fields && self.unknown == other.unknown
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.ty.name())
            .field("fields", &self.fields)
            .field("unknown", &self.unknown)
            .finish()
    }
}
