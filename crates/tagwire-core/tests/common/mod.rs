//! Schemas shared by the integration tests.

#![allow(dead_code)]

use tagwire_core::{FieldKind, FieldSpec, MessageType};

pub const NESTED_BB: u32 = 1;
pub const NESTED_NOTES: u32 = 2;

static NESTED_FIELDS: [FieldSpec; 2] = [
    FieldSpec::singular(NESTED_BB, "bb", FieldKind::Int32),
    FieldSpec::repeated(NESTED_NOTES, "notes", FieldKind::String),
];

/// `{ bb: int32, notes: repeated string }`
pub static NESTED: MessageType = MessageType::new("NestedMessage", &NESTED_FIELDS);

pub const OPTIONAL_INT32: u32 = 1;
pub const OPTIONAL_STRING: u32 = 2;
pub const OPTIONAL_BYTES: u32 = 3;
pub const OPTIONAL_NESTED: u32 = 4;
pub const REPEATED_INT32: u32 = 5;
pub const REPEATED_NESTED: u32 = 6;
pub const PACKED_SINT64: u32 = 7;
pub const CHILD: u32 = 8;
pub const OPTIONAL_ENUM: u32 = 9;

static ALL_TYPES_FIELDS: [FieldSpec; 9] = [
    FieldSpec::singular(OPTIONAL_INT32, "optional_int32", FieldKind::Int32),
    FieldSpec::singular(OPTIONAL_STRING, "optional_string", FieldKind::String),
    FieldSpec::singular(OPTIONAL_BYTES, "optional_bytes", FieldKind::Bytes),
    FieldSpec::singular(OPTIONAL_NESTED, "optional_nested", FieldKind::Message(&NESTED)),
    FieldSpec::repeated(REPEATED_INT32, "repeated_int32", FieldKind::Int32),
    FieldSpec::repeated(REPEATED_NESTED, "repeated_nested", FieldKind::Message(&NESTED)),
    FieldSpec::packed(PACKED_SINT64, "packed_sint64", FieldKind::SInt64),
    FieldSpec::singular(CHILD, "child", FieldKind::Message(&ALL_TYPES)),
    FieldSpec::singular(OPTIONAL_ENUM, "optional_enum", FieldKind::Enum),
];

/// One field of most shapes, plus a recursive `child`
pub static ALL_TYPES: MessageType = MessageType::new("AllTypes", &ALL_TYPES_FIELDS);
