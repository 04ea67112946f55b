//! Field tags and wire types.
//!
//! Every field on the wire starts with a varint tag:
//! `(field_number << 3) | wire_type`. The wire type is a closed set of six
//! values that tells a reader how to find the end of the value without
//! knowing the schema.

use std::fmt;

use crate::{
    errors::{Result, WireError},
    varint::encoded_len_varint,
};

/// Smallest legal field number.
pub const MIN_FIELD_NUMBER: u32 = 1;

/// Largest legal field number (`2^29 - 1`).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Framing of the bytes that follow a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum WireType {
    /// Varint: `int32`, `int64`, `uint32`, `uint64`, `sint32`, `sint64`,
    /// `bool`, `enum`
    Varint = 0,
    /// 8 little-endian bytes: `fixed64`, `sfixed64`, `double`
    Fixed64 = 1,
    /// Varint length then raw bytes: `string`, `bytes`, messages, packed
    /// repeated scalars
    LengthDelimited = 2,
    /// Opens a group (legacy framing, no length prefix)
    StartGroup = 3,
    /// Closes the group opened by the matching `StartGroup`
    EndGroup = 4,
    /// 4 little-endian bytes: `fixed32`, `sfixed32`, `float`
    Fixed32 = 5,
}

impl WireType {
    /// Decode the low three bits of a tag.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidWireType`] for the unassigned values 6
    /// and 7.
    pub const fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            3 => Ok(Self::StartGroup),
            4 => Ok(Self::EndGroup),
            5 => Ok(Self::Fixed32),
            other => Err(WireError::InvalidWireType(other)),
        }
    }

    /// Raw 3-bit value
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Whether a repeated field of this wire type may be packed
    #[must_use]
    pub const fn is_packable(self) -> bool {
        matches!(self, Self::Varint | Self::Fixed32 | Self::Fixed64)
    }
}

/// A decoded field tag.
///
/// # Invariants
///
/// `field_number` is in `MIN_FIELD_NUMBER..=MAX_FIELD_NUMBER`; the only way
/// to build a `Tag` is through [`Tag::new`] or [`Tag::from_raw`], which both
/// check it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    field_number: u32,
    wire_type: WireType,
}

impl Tag {
    /// Build a tag from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidFieldNumber`] if `field_number` is zero or
    /// above [`MAX_FIELD_NUMBER`].
    pub const fn new(field_number: u32, wire_type: WireType) -> Result<Self> {
        if field_number < MIN_FIELD_NUMBER || field_number > MAX_FIELD_NUMBER {
            return Err(WireError::InvalidFieldNumber(field_number));
        }
        Ok(Self { field_number, wire_type })
    }

    /// Split a raw tag varint.
    ///
    /// # Errors
    ///
    /// - [`WireError::InvalidTag`] if the field number is zero or the value
    ///   does not fit in 32 bits
    /// - [`WireError::InvalidWireType`] for wire types 6 and 7
    pub fn from_raw(raw: u64) -> Result<Self> {
        let raw32 = u32::try_from(raw).map_err(|_| WireError::InvalidTag(raw))?;
        let field_number = raw32 >> 3;
        if field_number == 0 {
            return Err(WireError::InvalidTag(raw));
        }
        #[allow(clippy::cast_possible_truncation)]
        let wire_type = WireType::from_u8((raw32 & 0b111) as u8)?;
        Ok(Self { field_number, wire_type })
    }

    /// The varint value written on the wire
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        (self.field_number << 3) | self.wire_type as u32
    }

    /// Field number (1..=2^29-1)
    #[must_use]
    pub const fn field_number(self) -> u32 {
        self.field_number
    }

    /// Wire type
    #[must_use]
    pub const fn wire_type(self) -> WireType {
        self.wire_type
    }

    /// The END_GROUP tag that closes a group opened with this field number
    #[must_use]
    pub const fn end_group(self) -> Self {
        Self { field_number: self.field_number, wire_type: WireType::EndGroup }
    }

    /// Encoded size of this tag in bytes
    #[must_use]
    pub const fn encoded_len(self) -> usize {
        encoded_len_varint(self.to_raw() as u64)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({}:{:?})", self.field_number, self.wire_type)
    }
}

/// Encoded size of any tag for `field_number` (the wire type never changes
/// the length).
#[must_use]
pub const fn tag_len(field_number: u32) -> usize {
    encoded_len_varint((field_number as u64) << 3)
}
