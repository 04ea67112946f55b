//! Random-input fuzzer for message decoding
//!
//! Arbitrary bytes must never panic the decoder. Whatever parses must encode
//! to a canonical form that parses back to the same message, and merging
//! that form into a builder must agree with parsing it twice over.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tagwire_core::{BuilderTree, FieldKind, FieldSpec, Message, MessageType};
use tagwire_proto::Encode;

static NODE_FIELDS: [FieldSpec; 6] = [
    FieldSpec::singular(1, "id", FieldKind::UInt64),
    FieldSpec::singular(2, "name", FieldKind::String),
    FieldSpec::repeated(3, "children", FieldKind::Message(&NODE)),
    FieldSpec::packed(4, "weights", FieldKind::SInt32),
    FieldSpec::singular(5, "legacy", FieldKind::Group(&NODE)),
    FieldSpec::repeated(6, "checksums", FieldKind::Fixed32),
];
static NODE: MessageType = MessageType::new("Node", &NODE_FIELDS);

fuzz_target!(|data: &[u8]| {
    // INVARIANT 1: Decoding never panics
    let Ok(message) = Message::parse_from(&NODE, data) else {
        return;
    };

    // INVARIANT 2: The canonical encoding round-trips
    let bytes = message.encode_to_vec().expect("encode should never fail for a parsed message");
    assert_eq!(bytes.len(), message.encoded_len());
    let reparsed = Message::parse_from(&NODE, &bytes).expect("canonical encoding must parse");
    assert_eq!(reparsed, message);

    // INVARIANT 3: Builder merge agrees with parsing the concatenation
    let doubled = [bytes.as_slice(), bytes.as_slice()].concat();
    let concatenated = Message::parse_from(&NODE, &doubled).expect("concatenation must parse");
    let mut tree = BuilderTree::new();
    let root = tree.new_builder(&NODE);
    tree.merge_from_bytes(root, &bytes).expect("merge should succeed");
    tree.merge_from_bytes(root, &bytes).expect("merge should succeed");
    assert_eq!(*tree.build(root).expect("build should succeed"), concatenated);
});
