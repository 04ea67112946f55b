//! Snapshot tests for wire format stability.
//!
//! Every encoding rule gets one inline hex snapshot. If an encoder change
//! alters a single byte, these tests fail, ensuring we never drift from the
//! format other implementations read.

use insta::assert_snapshot;
use tagwire_proto::{
    scalar::{SInt64, UInt32},
    Encode, UnknownFieldSet, WireWriter, WriterConfig, MAX_FIELD_NUMBER,
};

/// Helper to run writes against a fresh writer and hex the output
fn encode_hex(
    f: impl FnOnce(&mut WireWriter<&mut Vec<u8>>) -> tagwire_proto::Result<()>,
) -> String {
    let mut buf = Vec::new();
    WireWriter::scoped(&mut buf, WriterConfig::default(), f).expect("encoding should succeed");
    hex::encode(&buf)
}

// =============================================================================
// Scalars
// =============================================================================

#[test]
fn snapshot_scalar_fields() {
    let hex = encode_hex(|w| {
        w.write_int32(1, 150)?;
        w.write_sint32(2, -3)?;
        w.write_fixed32(3, 0x1234_5678)?;
        w.write_double(4, 1.0)?;
        w.write_bool(5, true)?;
        w.write_string(6, "hi")
    });

    assert_snapshot!(hex, @"08960110051d7856341221000000000000f03f280132026869");
}

#[test]
fn snapshot_negative_int32_is_sign_extended() {
    let hex = encode_hex(|w| w.write_int32(1, -1));

    assert_snapshot!(hex, @"08ffffffffffffffffff01");
}

#[test]
fn snapshot_negative_sint64_stays_short() {
    let hex = encode_hex(|w| w.write_scalar::<SInt64>(1, -1));

    assert_snapshot!(hex, @"0801");
}

#[test]
fn snapshot_float() {
    let hex = encode_hex(|w| w.write_float(1, -2.5));

    assert_snapshot!(hex, @"0d000020c0");
}

#[test]
fn snapshot_largest_field_number() {
    let hex = encode_hex(|w| w.write_uint32(MAX_FIELD_NUMBER, 1));

    assert_snapshot!(hex, @"f8ffffff0f01");
}

// =============================================================================
// Repeated fields
// =============================================================================

#[test]
fn snapshot_packed_field() {
    let hex = encode_hex(|w| w.write_packed::<UInt32>(4, &[3, 270, 86942]));

    assert_snapshot!(hex, @"2206038e029ea705");
}

#[test]
fn snapshot_unpacked_field() {
    let hex = encode_hex(|w| w.write_repeated::<UInt32>(4, &[3, 270, 86942]));

    assert_snapshot!(hex, @"2003208e02209ea705");
}

// =============================================================================
// Nested framing
// =============================================================================

#[test]
fn snapshot_embedded_message() {
    let mut inner = UnknownFieldSet::new();
    inner.add_varint(1, 150);

    let hex = encode_hex(|w| w.write_message(3, &inner));

    assert_snapshot!(hex, @"1a03089601");
}

#[test]
fn snapshot_group() {
    let mut inner = UnknownFieldSet::new();
    inner.add_varint(2, 1);

    let hex = encode_hex(|w| w.write_group(1, &inner));

    assert_snapshot!(hex, @"0b10010c");
}

#[test]
fn snapshot_delimited_stream() {
    let mut first = UnknownFieldSet::new();
    first.add_varint(1, 1);
    let mut second = UnknownFieldSet::new();
    second.add_length_delimited(2, bytes::Bytes::from_static(b"ok"));

    let hex = encode_hex(|w| {
        first.encode_length_delimited(w)?;
        second.encode_length_delimited(w)
    });

    assert_snapshot!(hex, @"0208010412026f6b");
}
