//! One codec per scalar field kind.
//!
//! The wire format has fourteen scalar kinds sharing four encodings (varint,
//! zigzag varint, fixed32, fixed64). Each kind is a zero-sized marker type
//! implementing [`ScalarCodec`], which lets packed fields and generic
//! message code be written once:
//!
//! ```
//! use tagwire_proto::{scalar::SInt32, WireReader, WireWriter};
//!
//! let mut out = Vec::new();
//! let mut writer = WireWriter::new(&mut out);
//! writer.write_packed::<SInt32>(4, &[-1, 0, 1]).unwrap();
//! writer.flush().unwrap();
//! assert_eq!(out, [0x22, 0x03, 0x01, 0x00, 0x02]);
//!
//! let mut reader = WireReader::from_slice(&out);
//! reader.read_tag().unwrap();
//! let mut values = Vec::new();
//! reader.read_packed::<SInt32>(&mut values).unwrap();
//! assert_eq!(values, [-1, 0, 1]);
//! ```

use crate::{
    errors::Result,
    fixed::{FIXED32_LEN, FIXED64_LEN},
    reader::WireReader,
    sink::Sink,
    source::Source,
    tag::WireType,
    varint::{encoded_len_varint, zigzag_encode32, zigzag_encode64},
    writer::WireWriter,
};

/// Untagged encoding of one scalar kind.
pub trait ScalarCodec {
    /// Rust representation of a value of this kind
    type Value: Copy;

    /// Wire type used when the value is written with its own tag
    const WIRE_TYPE: WireType;

    /// Bytes [`ScalarCodec::write_raw`] emits for `value`
    fn encoded_len(value: Self::Value) -> usize;

    /// Write `value` without a tag.
    ///
    /// # Errors
    ///
    /// Propagates sink errors from the writer.
    fn write_raw<S: Sink>(writer: &mut WireWriter<S>, value: Self::Value) -> Result<()>;

    /// Read one untagged value.
    ///
    /// # Errors
    ///
    /// Propagates malformed, truncated and limit errors from the reader.
    fn read_raw<S: Source>(reader: &mut WireReader<S>) -> Result<Self::Value>;
}

macro_rules! scalar_codec {
    (
        $(#[$doc:meta])*
        $name:ident: $value:ty, $wire:ident,
        len = |$v:ident| $len:expr,
        write = $write:ident,
        read = $read:ident $(,)?
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl ScalarCodec for $name {
            type Value = $value;

            const WIRE_TYPE: WireType = WireType::$wire;

            #[inline]
            fn encoded_len($v: $value) -> usize {
                $len
            }

            #[inline]
            fn write_raw<S: Sink>(writer: &mut WireWriter<S>, value: $value) -> Result<()> {
                writer.$write(value)
            }

            #[inline]
            fn read_raw<S: Source>(reader: &mut WireReader<S>) -> Result<$value> {
                reader.$read()
            }
        }
    };
}

const fn sign_extended_len(value: i32) -> usize {
    encoded_len_varint(value as i64 as u64)
}

scalar_codec! {
    /// `int32`: varint, negative values sign-extended to 10 bytes
    Int32: i32, Varint,
    len = |v| sign_extended_len(v),
    write = write_raw_int32,
    read = read_int32,
}

scalar_codec! {
    /// `int64`: varint of the two's-complement bits
    Int64: i64, Varint,
    len = |v| encoded_len_varint(v as u64),
    write = write_raw_int64,
    read = read_int64,
}

scalar_codec! {
    /// `uint32`: varint
    UInt32: u32, Varint,
    len = |v| encoded_len_varint(v as u64),
    write = write_raw_varint32,
    read = read_uint32,
}

scalar_codec! {
    /// `uint64`: varint
    UInt64: u64, Varint,
    len = |v| encoded_len_varint(v),
    write = write_raw_varint64,
    read = read_uint64,
}

scalar_codec! {
    /// `sint32`: zigzag varint
    SInt32: i32, Varint,
    len = |v| encoded_len_varint(zigzag_encode32(v) as u64),
    write = write_raw_sint32,
    read = read_sint32,
}

scalar_codec! {
    /// `sint64`: zigzag varint
    SInt64: i64, Varint,
    len = |v| encoded_len_varint(zigzag_encode64(v)),
    write = write_raw_sint64,
    read = read_sint64,
}

scalar_codec! {
    /// `fixed32`: 4 little-endian bytes
    Fixed32: u32, Fixed32,
    len = |_v| FIXED32_LEN,
    write = write_raw_fixed32,
    read = read_fixed32,
}

scalar_codec! {
    /// `fixed64`: 8 little-endian bytes
    Fixed64: u64, Fixed64,
    len = |_v| FIXED64_LEN,
    write = write_raw_fixed64,
    read = read_fixed64,
}

scalar_codec! {
    /// `sfixed32`: 4 little-endian bytes, two's complement
    SFixed32: i32, Fixed32,
    len = |_v| FIXED32_LEN,
    write = write_raw_sfixed32,
    read = read_sfixed32,
}

scalar_codec! {
    /// `sfixed64`: 8 little-endian bytes, two's complement
    SFixed64: i64, Fixed64,
    len = |_v| FIXED64_LEN,
    write = write_raw_sfixed64,
    read = read_sfixed64,
}

scalar_codec! {
    /// `float`: IEEE-754 bits as fixed32
    Float: f32, Fixed32,
    len = |_v| FIXED32_LEN,
    write = write_raw_float,
    read = read_float,
}

scalar_codec! {
    /// `double`: IEEE-754 bits as fixed64
    Double: f64, Fixed64,
    len = |_v| FIXED64_LEN,
    write = write_raw_double,
    read = read_double,
}

scalar_codec! {
    /// `bool`: one-byte varint (any non-zero varint decodes as true)
    Bool: bool, Varint,
    len = |_v| 1,
    write = write_raw_bool,
    read = read_bool,
}

scalar_codec! {
    /// `enum`: encoded exactly like `int32`
    Enum: i32, Varint,
    len = |v| sign_extended_len(v),
    write = write_raw_int32,
    read = read_enum,
}

/// Total untagged size of `values`, the payload of a packed field.
#[must_use]
pub fn packed_payload_len<C: ScalarCodec>(values: &[C::Value]) -> usize {
    values.iter().map(|&value| C::encoded_len(value)).sum()
}
