//! Field values.

use std::sync::Arc;

use bytes::Bytes;
use tagwire_proto::{
    scalar::{
        Bool, Double, Fixed32, Fixed64, Float, Int32, Int64, SFixed32, SFixed64, SInt32, SInt64,
        ScalarCodec, UInt32, UInt64,
    },
    tag::tag_len,
    varint::encoded_len_varint,
    Encode, Result as WireResult, Sink, WireWriter,
};

use crate::{message::Message, schema::FieldKind};

/// One value of a field. Cloning never copies string, bytes or message
/// contents.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `int32`
    Int32(i32),
    /// `int64`
    Int64(i64),
    /// `uint32`
    UInt32(u32),
    /// `uint64`
    UInt64(u64),
    /// `sint32`
    SInt32(i32),
    /// `sint64`
    SInt64(i64),
    /// `fixed32`
    Fixed32(u32),
    /// `fixed64`
    Fixed64(u64),
    /// `sfixed32`
    SFixed32(i32),
    /// `sfixed64`
    SFixed64(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `bool`
    Bool(bool),
    /// Enum number
    Enum(i32),
    /// UTF-8 text
    String(Arc<str>),
    /// Opaque bytes
    Bytes(Bytes),
    /// Embedded message or group
    Message(Arc<Message>),
}

impl Value {
    /// Short name of the variant, for error messages
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::UInt32(_) => "uint32",
            Self::UInt64(_) => "uint64",
            Self::SInt32(_) => "sint32",
            Self::SInt64(_) => "sint64",
            Self::Fixed32(_) => "fixed32",
            Self::Fixed64(_) => "fixed64",
            Self::SFixed32(_) => "sfixed32",
            Self::SFixed64(_) => "sfixed64",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
            Self::Enum(_) => "enum",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Message(_) => "message",
        }
    }

    /// True if this value may be stored in a field of `kind`. Messages must
    /// also be of the field's message type.
    #[must_use]
    pub fn fits(&self, kind: FieldKind) -> bool {
        match (self, kind) {
            (Self::Int32(_), FieldKind::Int32)
            | (Self::Int64(_), FieldKind::Int64)
            | (Self::UInt32(_), FieldKind::UInt32)
            | (Self::UInt64(_), FieldKind::UInt64)
            | (Self::SInt32(_), FieldKind::SInt32)
            | (Self::SInt64(_), FieldKind::SInt64)
            | (Self::Fixed32(_), FieldKind::Fixed32)
            | (Self::Fixed64(_), FieldKind::Fixed64)
            | (Self::SFixed32(_), FieldKind::SFixed32)
            | (Self::SFixed64(_), FieldKind::SFixed64)
            | (Self::Float(_), FieldKind::Float)
            | (Self::Double(_), FieldKind::Double)
            | (Self::Bool(_), FieldKind::Bool)
            | (Self::Enum(_), FieldKind::Enum)
            | (Self::String(_), FieldKind::String)
            | (Self::Bytes(_), FieldKind::Bytes) => true,
            (Self::Message(message), FieldKind::Message(ty) | FieldKind::Group(ty)) => {
                message.message_type() == ty
            },
            _ => false,
        }
    }

    /// Signed 32-bit value of an `int32`, `sint32`, `sfixed32` or enum
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Self::Int32(v) | Self::SInt32(v) | Self::SFixed32(v) | Self::Enum(v) => Some(v),
            _ => None,
        }
    }

    /// Signed 64-bit value of an `int64`, `sint64` or `sfixed64`
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int64(v) | Self::SInt64(v) | Self::SFixed64(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a `uint32` or `fixed32`
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::UInt32(v) | Self::Fixed32(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a `uint64` or `fixed64`
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::UInt64(v) | Self::Fixed64(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a `float`
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a `double`
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a `bool`
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Text of a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Contents of a bytes value
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Embedded message
    #[must_use]
    pub fn as_message(&self) -> Option<&Arc<Message>> {
        match self {
            Self::Message(v) => Some(v),
            _ => None,
        }
    }

    /// Length of the untagged encoding. Length-delimited values include
    /// their length prefix; groups cover the body only.
    pub(crate) fn raw_len(&self) -> usize {
        match self {
            Self::Int32(v) => Int32::encoded_len(*v),
            Self::Int64(v) => Int64::encoded_len(*v),
            Self::UInt32(v) => UInt32::encoded_len(*v),
            Self::UInt64(v) => UInt64::encoded_len(*v),
            Self::SInt32(v) => SInt32::encoded_len(*v),
            Self::SInt64(v) => SInt64::encoded_len(*v),
            Self::Fixed32(v) => Fixed32::encoded_len(*v),
            Self::Fixed64(v) => Fixed64::encoded_len(*v),
            Self::SFixed32(v) => SFixed32::encoded_len(*v),
            Self::SFixed64(v) => SFixed64::encoded_len(*v),
            Self::Float(v) => Float::encoded_len(*v),
            Self::Double(v) => Double::encoded_len(*v),
            Self::Bool(v) => Bool::encoded_len(*v),
            Self::Enum(v) => Int32::encoded_len(*v),
            Self::String(v) => delimited_len(v.len()),
            Self::Bytes(v) => delimited_len(v.len()),
            Self::Message(v) => delimited_len(v.encoded_len()),
        }
    }

    /// Write the untagged encoding. Messages come out length-delimited;
    /// group framing needs [`Value::write_tagged`].
    pub(crate) fn write_raw<S: Sink>(&self, writer: &mut WireWriter<S>) -> WireResult<()> {
        match self {
            Self::Int32(v) | Self::Enum(v) => writer.write_raw_int32(*v),
            Self::Int64(v) => writer.write_raw_int64(*v),
            Self::UInt32(v) => writer.write_raw_varint32(*v),
            Self::UInt64(v) => writer.write_raw_varint64(*v),
            Self::SInt32(v) => writer.write_raw_sint32(*v),
            Self::SInt64(v) => writer.write_raw_sint64(*v),
            Self::Fixed32(v) => writer.write_raw_fixed32(*v),
            Self::Fixed64(v) => writer.write_raw_fixed64(*v),
            Self::SFixed32(v) => writer.write_raw_sfixed32(*v),
            Self::SFixed64(v) => writer.write_raw_sfixed64(*v),
            Self::Float(v) => writer.write_raw_float(*v),
            Self::Double(v) => writer.write_raw_double(*v),
            Self::Bool(v) => writer.write_raw_bool(*v),
            Self::String(v) => writer.write_length_delimited(v.as_bytes()),
            Self::Bytes(v) => writer.write_length_delimited(v),
            Self::Message(v) => {
                writer.write_raw_varint64(v.encoded_len() as u64)?;
                v.write_to(writer)
            },
        }
    }

    /// Length of this value written with its own tag for a field of `kind`
    pub(crate) fn tagged_len(&self, number: u32, kind: FieldKind) -> usize {
        match (self, kind) {
            (Self::Message(v), FieldKind::Group(_)) => 2 * tag_len(number) + v.encoded_len(),
            _ => tag_len(number) + self.raw_len(),
        }
    }

    /// Write this value with its own tag for a field of `kind`
    pub(crate) fn write_tagged<S: Sink>(
        &self,
        writer: &mut WireWriter<S>,
        number: u32,
        kind: FieldKind,
    ) -> WireResult<()> {
        match (self, kind) {
            (Self::Message(v), FieldKind::Group(_)) => writer.write_group(number, &**v),
            (Self::Message(v), _) => writer.write_message(number, &**v),
            _ => {
                writer.write_tag(number, kind.wire_type())?;
                self.write_raw(writer)
            },
        }
    }
}

fn delimited_len(len: usize) -> usize {
    encoded_len_varint(len as u64) + len
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Arc<Message>> for Value {
    fn from(value: Arc<Message>) -> Self {
        Self::Message(value)
    }
}
