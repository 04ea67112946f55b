//! Static message schemas.
//!
//! A [`MessageType`] is the compile-time description of one message: its
//! name and the fields it declares. Schemas are `'static` values, usually
//! plain `static` items, and may refer to each other (or to themselves) for
//! embedded messages:
//!
//! ```
//! use tagwire_core::schema::{FieldKind, FieldSpec, MessageType};
//!
//! static NODE_FIELDS: [FieldSpec; 2] = [
//!     FieldSpec::singular(1, "value", FieldKind::Int32),
//!     FieldSpec::repeated(2, "children", FieldKind::Message(&NODE)),
//! ];
//! static NODE: MessageType = MessageType::new("Node", &NODE_FIELDS);
//!
//! assert_eq!(NODE.field(2).map(|f| f.name), Some("children"));
//! assert_eq!(NODE.default_instance().field_count(), 0);
//! ```

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use tagwire_proto::WireType;

use crate::{
    error::{FieldError, Result},
    message::Message,
};

/// Kind of value a field holds. Mirrors the wire format's scalar kinds plus
/// strings, bytes, embedded messages and groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    UInt32,
    /// `uint64`
    UInt64,
    /// `sint32` (zigzag)
    SInt32,
    /// `sint64` (zigzag)
    SInt64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    SFixed32,
    /// `sfixed64`
    SFixed64,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `bool`
    Bool,
    /// Enum, stored as its `int32` number
    Enum,
    /// UTF-8 text
    String,
    /// Opaque bytes
    Bytes,
    /// Length-delimited embedded message
    Message(&'static MessageType),
    /// Embedded message framed by START_GROUP/END_GROUP
    Group(&'static MessageType),
}

impl FieldKind {
    /// Wire type of one tagged value of this kind
    #[must_use]
    pub const fn wire_type(self) -> WireType {
        match self {
            Self::Int32
            | Self::Int64
            | Self::UInt32
            | Self::UInt64
            | Self::SInt32
            | Self::SInt64
            | Self::Bool
            | Self::Enum => WireType::Varint,
            Self::Fixed32 | Self::SFixed32 | Self::Float => WireType::Fixed32,
            Self::Fixed64 | Self::SFixed64 | Self::Double => WireType::Fixed64,
            Self::String | Self::Bytes | Self::Message(_) => WireType::LengthDelimited,
            Self::Group(_) => WireType::StartGroup,
        }
    }

    /// True for scalar kinds that may be packed
    #[must_use]
    pub const fn is_packable(self) -> bool {
        self.wire_type().is_packable()
    }

    /// Schema of the embedded message, for message and group kinds
    #[must_use]
    pub const fn message_type(self) -> Option<&'static MessageType> {
        match self {
            Self::Message(ty) | Self::Group(ty) => Some(ty),
            _ => None,
        }
    }
}

/// How many values a field holds and how repeated values are framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one value; a value seen twice on the wire replaces the first
    /// (or merges into it, for messages)
    Singular,
    /// Any number of values, one tag each
    Repeated,
    /// Any number of scalar values, written as one packed block
    Packed,
}

/// One declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field number, unique within the message
    pub number: u32,
    /// Field name
    pub name: &'static str,
    /// Value kind
    pub kind: FieldKind,
    /// Singular, repeated or packed
    pub cardinality: Cardinality,
}

impl FieldSpec {
    /// Singular field
    #[must_use]
    pub const fn singular(number: u32, name: &'static str, kind: FieldKind) -> Self {
        Self { number, name, kind, cardinality: Cardinality::Singular }
    }

    /// Repeated field, one tag per value
    #[must_use]
    pub const fn repeated(number: u32, name: &'static str, kind: FieldKind) -> Self {
        Self { number, name, kind, cardinality: Cardinality::Repeated }
    }

    /// Packed repeated scalar field.
    ///
    /// # Panics
    ///
    /// If `kind` is not a varint or fixed-width scalar. In a `static`
    /// schema this is a compile error:
    ///
    /// ```compile_fail
    /// use tagwire_core::{FieldKind, FieldSpec};
    ///
    /// static TAGS: FieldSpec = FieldSpec::packed(1, "tags", FieldKind::String);
    /// ```
    #[must_use]
    pub const fn packed(number: u32, name: &'static str, kind: FieldKind) -> Self {
        assert!(kind.is_packable(), "only varint and fixed-width kinds can be packed");
        Self { number, name, kind, cardinality: Cardinality::Packed }
    }

    /// True for repeated and packed fields
    #[must_use]
    pub const fn is_repeated(&self) -> bool {
        !matches!(self.cardinality, Cardinality::Singular)
    }

    /// Fails with [`FieldError::NotSingular`] for repeated fields
    pub(crate) fn expect_singular(&self) -> Result<()> {
        if self.is_repeated() {
            return Err(FieldError::NotSingular(self.number));
        }
        Ok(())
    }

    /// Fails with [`FieldError::NotRepeated`] for singular fields
    pub(crate) fn expect_repeated(&self) -> Result<()> {
        if !self.is_repeated() {
            return Err(FieldError::NotRepeated(self.number));
        }
        Ok(())
    }

    /// Schema of the embedded message, or [`FieldError::NotMessage`]
    pub(crate) fn expect_message(&self) -> Result<&'static MessageType> {
        self.kind.message_type().ok_or(FieldError::NotMessage(self.number))
    }
}

/// Schema of one message type.
///
/// Compared by identity: two `MessageType`s are equal only if they are the
/// same static item.
pub struct MessageType {
    name: &'static str,
    fields: &'static [FieldSpec],
    default: OnceLock<Arc<Message>>,
}

impl MessageType {
    /// Describe a message type. `fields` may be in any order.
    #[must_use]
    pub const fn new(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self { name, fields, default: OnceLock::new() }
    }

    /// Message name
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared fields, in declaration order
    #[must_use]
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Field declared with `number`
    #[must_use]
    pub fn field(&self, number: u32) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.number == number)
    }

    /// Field declared with `name`
    #[must_use]
    pub fn field_by_name(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Field declared with `number`.
    ///
    /// # Errors
    ///
    /// [`FieldError::UnknownField`] if there is none.
    pub fn spec(&self, number: u32) -> Result<&'static FieldSpec> {
        self.field(number).ok_or(FieldError::UnknownField { message: self.name, number })
    }

    /// The shared empty message of this type.
    ///
    /// Created on first use and never mutated; every call returns the same
    /// allocation.
    #[must_use]
    pub fn default_instance(&'static self) -> Arc<Message> {
        Arc::clone(self.default.get_or_init(|| Arc::new(Message::empty(self))))
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for MessageType {}

// Schemas can be recursive, so only the name is printed.
impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageType").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static LEAF_FIELDS: [FieldSpec; 3] = [
        FieldSpec::singular(1, "id", FieldKind::UInt64),
        FieldSpec::packed(2, "samples", FieldKind::SInt32),
        FieldSpec::singular(3, "next", FieldKind::Message(&LEAF)),
    ];
    static LEAF: MessageType = MessageType::new("Leaf", &LEAF_FIELDS);
    static OTHER: MessageType = MessageType::new("Other", &[]);

    #[test]
    fn lookup_by_number_and_name() {
        assert_eq!(LEAF.field(2).map(|f| f.name), Some("samples"));
        assert_eq!(LEAF.field_by_name("next").map(|f| f.number), Some(3));
        assert!(LEAF.field(4).is_none());
        assert_eq!(LEAF.spec(9), Err(FieldError::UnknownField { message: "Leaf", number: 9 }));
    }

    #[test]
    fn kinds_map_to_wire_types() {
        assert_eq!(FieldKind::SInt32.wire_type(), WireType::Varint);
        assert_eq!(FieldKind::Float.wire_type(), WireType::Fixed32);
        assert_eq!(FieldKind::SFixed64.wire_type(), WireType::Fixed64);
        assert_eq!(FieldKind::Message(&LEAF).wire_type(), WireType::LengthDelimited);
        assert_eq!(FieldKind::Group(&LEAF).wire_type(), WireType::StartGroup);
        assert!(FieldKind::Bool.is_packable());
        assert!(!FieldKind::String.is_packable());
    }

    #[test]
    #[should_panic(expected = "only varint and fixed-width kinds can be packed")]
    fn packed_strings_are_rejected() {
        let _ = FieldSpec::packed(1, "tags", FieldKind::String);
    }

    #[test]
    #[should_panic(expected = "only varint and fixed-width kinds can be packed")]
    fn packed_messages_are_rejected() {
        let _ = FieldSpec::packed(1, "children", FieldKind::Message(&LEAF));
    }

    #[test]
    fn types_compare_by_identity() {
        assert_eq!(FieldKind::Message(&LEAF), FieldKind::Message(&LEAF));
        assert_ne!(FieldKind::Message(&LEAF), FieldKind::Message(&OTHER));
        assert_eq!(format!("{LEAF:?}"), "MessageType(\"Leaf\")");
    }

    #[test]
    fn default_instance_is_shared() {
        let a = LEAF.default_instance();
        let b = LEAF.default_instance();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.field_count(), 0);
    }

    #[test]
    fn cardinality_checks() {
        let samples = LEAF.spec(2).unwrap();
        assert!(samples.is_repeated());
        assert_eq!(samples.expect_singular(), Err(FieldError::NotSingular(2)));
        assert_eq!(LEAF.spec(1).unwrap().expect_repeated(), Err(FieldError::NotRepeated(1)));
        assert_eq!(LEAF.spec(1).unwrap().expect_message(), Err(FieldError::NotMessage(1)));
        assert_eq!(LEAF.spec(3).unwrap().expect_message(), Ok(&LEAF));
    }
}
