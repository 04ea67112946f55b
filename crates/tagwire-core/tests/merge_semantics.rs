//! Merge semantics: parsing concatenated encodings, merging snapshots and
//! merging into builders must all agree.

mod common;

use std::sync::Arc;

use common::*;
use proptest::prelude::*;
use tagwire_core::{merge_messages, BuilderTree, FieldError, Message, NodeState, Value};
use tagwire_proto::{Encode, WireWriter, WriterConfig};

/// Field number no schema here declares
const UNKNOWN_FIELD: u32 = 20;

/// One independently serialized piece of an `AllTypes` message
#[derive(Debug, Clone)]
struct Fragment {
    int32: Option<i32>,
    string: Option<String>,
    repeated: Vec<i32>,
    packed: Vec<i64>,
    nested_bb: Option<Option<i32>>,
    notes: Vec<String>,
    unknown: Option<u64>,
}

impl Fragment {
    fn encode(&self) -> Vec<u8> {
        let mut tree = BuilderTree::new();
        let root = tree.new_builder(&ALL_TYPES);
        if let Some(value) = self.int32 {
            tree.set(root, OPTIONAL_INT32, Value::Int32(value)).expect("set should succeed");
        }
        if let Some(value) = &self.string {
            tree.set(root, OPTIONAL_STRING, value.as_str()).expect("set should succeed");
        }
        for &value in &self.repeated {
            tree.push(root, REPEATED_INT32, Value::Int32(value)).expect("push should succeed");
        }
        for &value in &self.packed {
            tree.push(root, PACKED_SINT64, Value::SInt64(value)).expect("push should succeed");
        }
        if let Some(bb) = self.nested_bb {
            let nested = tree.nested_builder(root, OPTIONAL_NESTED).expect("message field");
            if let Some(bb) = bb {
                tree.set(nested, NESTED_BB, Value::Int32(bb)).expect("set should succeed");
            }
            for note in &self.notes {
                tree.push(nested, NESTED_NOTES, note.as_str()).expect("push should succeed");
            }
        }

        let mut bytes = tree.to_bytes(root).expect("encode should succeed");
        if let Some(value) = self.unknown {
            WireWriter::scoped(&mut bytes, WriterConfig::default(), |w| {
                w.write_uint64(UNKNOWN_FIELD, value)
            })
            .expect("encode should succeed");
        }
        bytes
    }
}

// Strategy for generating message fragments
fn fragment_strategy() -> impl Strategy<Value = Fragment> {
    (
        proptest::option::of(any::<i32>()),
        proptest::option::of("[a-z]{0,8}"),
        proptest::collection::vec(any::<i32>(), 0..4),
        proptest::collection::vec(any::<i64>(), 0..4),
        proptest::option::of(proptest::option::of(any::<i32>())),
        proptest::collection::vec("[a-z]{0,4}", 0..3),
        proptest::option::of(any::<u64>()),
    )
        .prop_map(|(int32, string, repeated, packed, nested_bb, notes, unknown)| Fragment {
            int32,
            string,
            repeated,
            packed,
            nested_bb,
            notes,
            unknown,
        })
}

fn parse(bytes: &[u8]) -> Message {
    Message::parse_from(&ALL_TYPES, bytes).expect("parse should succeed")
}

#[test]
fn concatenated_fragments_accumulate() {
    let first = [0x28, 0xea, 0x01]; // repeated_int32: [234]
    let second = [0x08, 0x07]; // optional_int32: 7
    let third = [0x28, 0x7b, 0x28, 0xc8, 0x03]; // repeated_int32: [123, 456]

    let joined = [&first[..], &second[..], &third[..]].concat();
    let message = parse(&joined);

    assert_eq!(message.get(OPTIONAL_INT32), Some(&Value::Int32(7)));
    assert_eq!(
        message.repeated(REPEATED_INT32),
        [Value::Int32(234), Value::Int32(123), Value::Int32(456)]
    );
}

#[test]
fn later_scalar_wins() {
    let message = parse(&[0x08, 0x01, 0x12, 0x01, b'a', 0x08, 0x02, 0x12, 0x01, b'b']);

    assert_eq!(message.get(OPTIONAL_INT32), Some(&Value::Int32(2)));
    assert_eq!(message.get(OPTIONAL_STRING).and_then(Value::as_str), Some("b"));
}

#[test]
fn repeated_submessage_occurrences_merge() {
    // optional_nested { bb: 1 } then optional_nested { notes: "x" }
    let message = parse(&[0x22, 0x02, 0x08, 0x01, 0x22, 0x03, 0x12, 0x01, b'x']);

    let nested = message.get(OPTIONAL_NESTED).and_then(Value::as_message).expect("nested is set");
    assert_eq!(nested.get(NESTED_BB), Some(&Value::Int32(1)));
    assert_eq!(nested.repeated(NESTED_NOTES).len(), 1);
}

#[test]
fn merge_messages_rejects_other_types() {
    let all = parse(&[0x08, 0x01]);
    let nested = Message::parse_from(&NESTED, &[0x08, 0x01]).expect("parse should succeed");

    assert_eq!(
        merge_messages(&all, &nested),
        Err(FieldError::TypeMismatch { expected: "AllTypes", found: "NestedMessage" })
    );
}

#[test]
fn builder_merge_rejects_other_types() {
    let nested = Message::parse_from(&NESTED, &[0x08, 0x01]).expect("parse should succeed");
    let mut tree = BuilderTree::new();
    let root = tree.new_builder(&ALL_TYPES);

    assert!(matches!(tree.merge_from(root, &nested), Err(FieldError::TypeMismatch { .. })));
    assert_eq!(tree.state(root), Ok(NodeState::Clean));
}

#[test]
fn malformed_bytes_leave_builder_untouched() {
    let mut tree = BuilderTree::new();
    let root = tree.new_builder(&ALL_TYPES);
    tree.set(root, OPTIONAL_INT32, Value::Int32(3)).expect("set should succeed");
    let built = tree.build(root).expect("build should succeed");

    // Length prefix runs past the end of input
    assert!(matches!(tree.merge_from_bytes(root, &[0x12, 0x05, b'a']), Err(FieldError::Wire(_))));
    assert_eq!(tree.state(root), Ok(NodeState::Clean));
    assert!(Arc::ptr_eq(&tree.build(root).expect("build should succeed"), &built));
}

#[test]
fn merge_routes_through_live_child_builder() {
    let mut tree = BuilderTree::new();
    let root = tree.new_builder(&ALL_TYPES);
    let nested = tree.nested_builder(root, OPTIONAL_NESTED).expect("message field");
    tree.set(nested, NESTED_BB, Value::Int32(1)).expect("set should succeed");
    tree.push(nested, NESTED_NOTES, "a").expect("push should succeed");

    // optional_int32: 5, optional_nested { notes: "b" }
    tree.merge_from_bytes(root, &[0x08, 0x05, 0x22, 0x03, 0x12, 0x01, b'b'])
        .expect("merge should succeed");

    // The child builder saw the merge and still owns the field
    assert_eq!(tree.parent(nested), Ok(Some(root)));
    let built = tree.build(root).expect("build should succeed");
    assert_eq!(built.get(OPTIONAL_INT32), Some(&Value::Int32(5)));
    let merged = built.get(OPTIONAL_NESTED).and_then(Value::as_message).expect("nested is set");
    assert_eq!(merged.get(NESTED_BB), Some(&Value::Int32(1)));
    let notes: Vec<_> = merged.repeated(NESTED_NOTES).iter().filter_map(Value::as_str).collect();
    assert_eq!(notes, ["a", "b"]);
}

#[test]
fn unknown_fields_survive_builder_round_trip() {
    // optional_int32: 1, field 20 varint 150, field 21 fixed32
    let bytes = [0x08, 0x01, 0xa0, 0x01, 0x96, 0x01, 0xad, 0x01, 1, 2, 3, 4];
    let source = Arc::new(parse(&bytes));
    assert_eq!(source.unknown_fields().len(), 2);

    let mut tree = BuilderTree::new();
    let root = tree.builder_from(&source);
    tree.set(root, OPTIONAL_INT32, Value::Int32(2)).expect("set should succeed");
    tree.merge_from_bytes(root, &[0xa0, 0x01, 0x07]).expect("merge should succeed");

    let out = tree.to_bytes(root).expect("encode should succeed");
    assert_eq!(out, [0x08, 0x02, 0xa0, 0x01, 0x96, 0x01, 0xa0, 0x01, 0x07, 0xad, 0x01, 1, 2, 3, 4]);
}

#[test]
fn prop_concatenation_is_merge() {
    proptest!(|(first in fragment_strategy(), second in fragment_strategy())| {
        let a = first.encode();
        let b = second.encode();
        let joined = [a.as_slice(), b.as_slice()].concat();

        let parsed = parse(&joined);
        let merged = merge_messages(&parse(&a), &parse(&b)).expect("same type");
        prop_assert_eq!(&parsed, &merged);

        let mut tree = BuilderTree::new();
        let root = tree.builder_from(&Arc::new(parse(&a)));
        tree.merge_from_bytes(root, &b).expect("merge should succeed");
        let built = tree.build(root).expect("build should succeed");
        prop_assert_eq!(&*built, &parsed);

        // Re-encoding the merged message parses back to itself
        let reencoded = parsed.encode_to_vec().expect("encode should succeed");
        prop_assert_eq!(reencoded.len(), parsed.encoded_len());
        prop_assert_eq!(parse(&reencoded), parsed);
    });
}
