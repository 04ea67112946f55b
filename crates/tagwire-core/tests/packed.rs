//! Packed and one-tag-per-value encodings of repeated scalars are
//! interchangeable on input.

use proptest::prelude::*;
use tagwire_core::{BuilderTree, FieldKind, FieldSpec, Message, MessageType, Value};
use tagwire_proto::Encode;

static PACKED_FIELDS: [FieldSpec; 4] = [
    FieldSpec::packed(1, "deltas", FieldKind::SInt32),
    FieldSpec::packed(2, "offsets", FieldKind::Fixed64),
    FieldSpec::packed(3, "flags", FieldKind::Bool),
    FieldSpec::packed(4, "levels", FieldKind::Enum),
];
static SAMPLES: MessageType = MessageType::new("Samples", &PACKED_FIELDS);

static UNPACKED_FIELDS: [FieldSpec; 4] = [
    FieldSpec::repeated(1, "deltas", FieldKind::SInt32),
    FieldSpec::repeated(2, "offsets", FieldKind::Fixed64),
    FieldSpec::repeated(3, "flags", FieldKind::Bool),
    FieldSpec::repeated(4, "levels", FieldKind::Enum),
];
static SAMPLES_UNPACKED: MessageType = MessageType::new("SamplesUnpacked", &UNPACKED_FIELDS);

fn encode(ty: &'static MessageType, deltas: &[i32], offsets: &[u64]) -> Vec<u8> {
    let mut tree = BuilderTree::new();
    let root = tree.new_builder(ty);
    {
        let mut node = tree.node(root).expect("live node");
        for &delta in deltas {
            node.push_sint32(1, delta).expect("push should succeed");
        }
        for &offset in offsets {
            node.push_fixed64(2, offset).expect("push should succeed");
        }
    }
    tree.to_bytes(root).expect("encode should succeed")
}

// Strategy for generating short lists of deltas
fn deltas_strategy() -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(any::<i32>(), 0..20)
}

#[test]
fn packed_fixed_values_are_contiguous() {
    let bytes = encode(&SAMPLES, &[], &[1, 2]);

    assert_eq!(hex::encode(bytes), "121001000000000000000200000000000000");
}

#[test]
fn packed_varints_share_one_tag() {
    let bytes = encode(&SAMPLES, &[1, -1, 64], &[]);

    // zigzag: 1 -> 2, -1 -> 1, 64 -> 128 (two bytes)
    assert_eq!(hex::encode(bytes), "0a0402018001");
}

#[test]
fn unpacked_input_is_accepted_for_packed_field() {
    let message = Message::parse_from(&SAMPLES, &[0x08, 0x02, 0x08, 0x04, 0x18, 0x01])
        .expect("parse should succeed");

    assert_eq!(message.repeated(1), [Value::SInt32(1), Value::SInt32(2)]);
    assert_eq!(message.repeated(3), [Value::Bool(true)]);
    // Written back packed
    let written = message.encode_to_vec().expect("encode should succeed");
    assert_eq!(hex::encode(written), "0a0202041a0101");
}

#[test]
fn packed_input_is_accepted_for_unpacked_field() {
    let message = Message::parse_from(&SAMPLES_UNPACKED, &[0x22, 0x03, 0x00, 0x01, 0x02])
        .expect("parse should succeed");

    assert_eq!(message.repeated(4), [Value::Enum(0), Value::Enum(1), Value::Enum(2)]);
    assert_eq!(
        message.encode_to_vec().expect("encode should succeed"),
        [0x20, 0x00, 0x20, 0x01, 0x20, 0x02]
    );
}

#[test]
fn mixed_occurrences_accumulate_in_order() {
    // packed [1], single 2, packed [3, 4]
    let bytes = [0x0a, 0x01, 0x02, 0x08, 0x04, 0x0a, 0x02, 0x06, 0x08];
    let message = Message::parse_from(&SAMPLES, &bytes).expect("parse should succeed");

    let deltas: Vec<i32> = message.repeated(1).iter().filter_map(Value::as_i32).collect();
    assert_eq!(deltas, [1, 2, 3, 4]);
}

#[test]
fn empty_packed_block_sets_nothing() {
    let message = Message::parse_from(&SAMPLES, &[0x0a, 0x00]).expect("parse should succeed");

    assert!(!message.has(1));
    assert!(message.repeated(1).is_empty());
    assert_eq!(message.encoded_len(), 0);
}

#[test]
fn truncated_packed_block_is_an_error() {
    // Block claims 4 bytes of fixed64 data
    assert!(Message::parse_from(&SAMPLES, &[0x12, 0x04, 0, 0, 0, 0]).is_err());
}

#[test]
fn prop_packed_and_unpacked_decode_alike() {
    proptest!(|(deltas in deltas_strategy())| {
        let packed = encode(&SAMPLES, &deltas, &[]);
        let unpacked = encode(&SAMPLES_UNPACKED, &deltas, &[]);

        for bytes in [&packed, &unpacked] {
            let as_packed = Message::parse_from(&SAMPLES, bytes).expect("parse should succeed");
            let as_unpacked =
                Message::parse_from(&SAMPLES_UNPACKED, bytes).expect("parse should succeed");
            let decoded: Vec<i32> =
                as_packed.repeated(1).iter().filter_map(Value::as_i32).collect();
            prop_assert_eq!(&decoded, &deltas);
            prop_assert_eq!(as_packed.repeated(1), as_unpacked.repeated(1));
        }

        if deltas.len() >= 2 {
            prop_assert!(packed.len() <= unpacked.len());
        }
    });
}
