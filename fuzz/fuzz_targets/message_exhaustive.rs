//! Exhaustive positive space fuzzer for message encoding/decoding
//!
//! Unlike random fuzzing (message_decode.rs), this fuzzer EXHAUSTIVELY tests
//! edge-case values (0, 1, MIN, MAX, sign and varint length boundaries) for
//! every scalar kind, in a packed field and inside a nested message.
//!
//! The input bytes only pick which combination to test, so libFuzzer guides
//! exploration while every combination stays reachable.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tagwire_core::{BuilderTree, FieldKind, FieldSpec, Message, MessageType, NodeId, Value};
use tagwire_proto::Encode;

static EDGE_FIELDS: [FieldSpec; 15] = [
    FieldSpec::singular(1, "int32", FieldKind::Int32),
    FieldSpec::singular(2, "int64", FieldKind::Int64),
    FieldSpec::singular(3, "uint32", FieldKind::UInt32),
    FieldSpec::singular(4, "uint64", FieldKind::UInt64),
    FieldSpec::singular(5, "sint32", FieldKind::SInt32),
    FieldSpec::singular(6, "sint64", FieldKind::SInt64),
    FieldSpec::singular(7, "fixed32", FieldKind::Fixed32),
    FieldSpec::singular(8, "fixed64", FieldKind::Fixed64),
    FieldSpec::singular(9, "sfixed32", FieldKind::SFixed32),
    FieldSpec::singular(10, "sfixed64", FieldKind::SFixed64),
    FieldSpec::singular(11, "flag", FieldKind::Bool),
    FieldSpec::singular(12, "level", FieldKind::Enum),
    FieldSpec::singular(13, "blob", FieldKind::Bytes),
    FieldSpec::packed(14, "samples", FieldKind::SInt64),
    FieldSpec::singular(2047, "inner", FieldKind::Message(&EDGE)),
];
static EDGE: MessageType = MessageType::new("Edge", &EDGE_FIELDS);

// Edge-case values for 32-bit fields
const I32_EDGES: &[i32] = &[
    0,
    1,
    -1,
    63,  // Largest one-byte zigzag
    64,  // Smallest two-byte zigzag
    127, // Largest one-byte varint
    128, // Smallest two-byte varint
    i32::MIN,
    i32::MAX,
];

// Edge-case values for 64-bit fields
const I64_EDGES: &[i64] = &[
    0,
    1,
    -1,
    127,
    128,
    i32::MIN as i64, // 32-bit boundary
    i32::MAX as i64,
    u32::MAX as i64,
    i64::MIN,
    i64::MAX,
];

// Blob sizes to test
const BLOB_SIZES: &[usize] = &[
    0,   // Empty
    1,   // Single byte
    127, // One-byte length prefix
    128, // Two-byte length prefix
];

fn fill(tree: &mut BuilderTree, node: NodeId, a: i32, b: i64, blob: &[u8]) {
    let mut node = tree.node(node).expect("node should be live");
    node.set_int32(1, a)
        .and_then(|n| n.set_int64(2, b))
        .and_then(|n| n.set_uint32(3, a as u32))
        .and_then(|n| n.set_uint64(4, b as u64))
        .and_then(|n| n.set_sint32(5, a))
        .and_then(|n| n.set_sint64(6, b))
        .and_then(|n| n.set_fixed32(7, a as u32))
        .and_then(|n| n.set_fixed64(8, b as u64))
        .and_then(|n| n.set_sfixed32(9, a))
        .and_then(|n| n.set_sfixed64(10, b))
        .and_then(|n| n.set_bool(11, a & 1 == 1))
        .and_then(|n| n.set_enum(12, a))
        .and_then(|n| n.set_bytes(13, blob.to_vec()))
        .expect("values fit their fields");
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let a = I32_EDGES[data[0] as usize % I32_EDGES.len()];
    let b = I64_EDGES[data[1] as usize % I64_EDGES.len()];
    let blob_size = BLOB_SIZES[data[2] as usize % BLOB_SIZES.len()];
    let blob = if blob_size <= data.len() - 3 {
        data[3..3 + blob_size].to_vec()
    } else {
        vec![0u8; blob_size]
    };

    let mut tree = BuilderTree::new();
    let root = tree.new_builder(&EDGE);
    fill(&mut tree, root, a, b, &blob);
    for &sample in I64_EDGES {
        tree.push(root, 14, Value::SInt64(sample)).expect("packed field accepts sint64");
    }
    let inner = tree.nested_builder(root, 2047).expect("inner is a message field");
    fill(&mut tree, inner, a, b, &blob);

    // INVARIANT 1: Building and encoding must succeed
    let built = tree.build(root).expect("build should succeed");
    let bytes = built.encode_to_vec().expect("encode should never fail for a built message");

    // INVARIANT 2: Encoded size must match the computed size
    assert_eq!(bytes.len(), built.encoded_len(), "size mismatch for a={a}, b={b}");

    // INVARIANT 3: Decoding must reproduce the snapshot
    let decoded = Message::parse_from(&EDGE, &bytes).expect("decode should succeed");
    assert_eq!(decoded, *built, "round trip mismatch for a={a}, b={b}");
    assert_eq!(decoded.repeated(14).len(), I64_EDGES.len());

    // INVARIANT 4: Re-encoding is byte-identical
    let reencoded = decoded.encode_to_vec().expect("encode should succeed");
    assert_eq!(reencoded, bytes, "re-encoding changed bytes for a={a}, b={b}");
});
