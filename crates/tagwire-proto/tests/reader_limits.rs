//! Limit-stack and skip regressions, run against every kind of source.
//!
//! A source may hand out its bytes in chunks of any size, so each scenario
//! runs over a contiguous slice, a chain of single-byte chunks, `Bytes`, and
//! streams with 1-, 2- and 4096-byte buffers.

use bytes::{Buf, Bytes};
use proptest::prelude::*;
use tagwire_proto::{
    scalar::UInt64, BufSource, ReaderConfig, Source, StreamSource, WireError, WireReader,
    WireWriter,
};

/// Run `check` once per source layout over `data`
fn for_each_source(data: &[u8], check: impl Fn(&mut WireReader<&mut dyn Source>)) {
    let config = ReaderConfig::default();

    let mut slice = BufSource::new(data);
    check(&mut WireReader::new(&mut slice as &mut dyn Source, config));

    let mut bytes = BufSource::new(Bytes::copy_from_slice(data));
    check(&mut WireReader::new(&mut bytes as &mut dyn Source, config));

    // One chunk per byte
    let chunks: Vec<&[u8]> = data.chunks(1).collect();
    let mut chained: Box<dyn Buf + '_> = Box::new(Bytes::new());
    for chunk in chunks {
        chained = Box::new(chained.chain(chunk));
    }
    let mut chained = BufSource::new(chained);
    check(&mut WireReader::new(&mut chained as &mut dyn Source, config));

    for buffer_size in [1, 2, 4096] {
        let mut stream = StreamSource::new(data, buffer_size);
        check(&mut WireReader::new(&mut stream as &mut dyn Source, config));
    }
}

#[test]
fn skip_to_limit_after_one_byte() {
    for_each_source(&[1, 2], |reader| {
        let limit = reader.push_limit(1).expect("limit fits");
        reader.skip_raw_bytes(1).expect("skip within limit");
        assert!(reader.is_at_end().unwrap());
        reader.pop_limit(limit);
        assert_eq!(reader.read_raw_byte().unwrap(), 2);
    });
}

#[test]
fn read_then_skip_to_limit() {
    for_each_source(&[1, 2, 3, 4, 5], |reader| {
        let limit = reader.push_limit(4).expect("limit fits");
        assert_eq!(reader.read_raw_byte().unwrap(), 1);
        reader.skip_raw_bytes(3).expect("skip within limit");
        assert!(reader.is_at_end().unwrap());
        reader.pop_limit(limit);
        assert_eq!(reader.read_raw_byte().unwrap(), 5);
        assert!(reader.is_at_end().unwrap());
    });
}

#[test]
fn at_end_under_inner_limit_with_bytes_beyond() {
    for_each_source(&[0x08, 0x01, 0x08, 0x02], |reader| {
        let limit = reader.push_limit(2).expect("limit fits");
        assert!(reader.read_tag().unwrap().is_some());
        assert_eq!(reader.read_uint32().unwrap(), 1);
        assert_eq!(reader.read_tag().unwrap(), None);
        reader.pop_limit(limit);
        assert!(reader.read_tag().unwrap().is_some());
        assert_eq!(reader.read_uint32().unwrap(), 2);
    });
}

#[test]
fn varint_split_across_chunks() {
    for_each_source(&[0xe7, 0xcb, 0x92, 0xde, 0x03], |reader| {
        assert_eq!(reader.read_raw_varint64().unwrap(), 0x3bc4_a5e7);
        assert_eq!(reader.total_bytes_read(), 5);
    });
}

#[test]
fn fixed64_split_across_chunks() {
    for_each_source(&[0xf0, 0xde, 0xbc, 0x9a, 0x78, 0x56, 0x34, 0x12], |reader| {
        assert_eq!(reader.read_fixed64().unwrap(), 0x1234_5678_9abc_def0);
    });
}

#[test]
fn truncated_length_delimited() {
    for_each_source(&[0x0a, 0x05, 1, 2], |reader| {
        reader.read_tag().unwrap();
        assert_eq!(reader.read_bytes(), Err(WireError::TruncatedInput));
    });
}

#[test]
fn eleven_byte_varint() {
    for_each_source(&[0x80; 11], |reader| {
        assert_eq!(reader.read_raw_varint64(), Err(WireError::MalformedVarint));
    });
}

#[test]
fn size_limit_across_sources() {
    for_each_source(&[0x08, 0x01, 0x08, 0x02, 0x08, 0x03], |reader| {
        reader.set_size_limit(4);
        for expected in [1, 2] {
            reader.read_tag().unwrap();
            assert_eq!(reader.read_uint32().unwrap(), expected);
        }
        assert_eq!(reader.read_tag(), Err(WireError::SizeLimitExceeded { limit: 4 }));
    });
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut reader = WireReader::from_slice(&data);
        // Either ends cleanly or reports an error; both are fine.
        let _ = reader.skip_message();
        let mut reader = WireReader::from_slice(&data);
        let mut values = Vec::new();
        let _ = reader.read_packed::<UInt64>(&mut values);
    }

    #[test]
    fn chunking_never_changes_values(values in proptest::collection::vec(any::<u64>(), 1..32)) {
        let mut encoded = Vec::new();
        let mut writer = WireWriter::new(&mut encoded);
        writer.write_repeated::<UInt64>(1, &values).unwrap();
        writer.flush().unwrap();

        for buffer_size in [1, 3, 7] {
            let config =
                ReaderConfig { stream_buffer_size: buffer_size, ..ReaderConfig::default() };
            let mut reader = WireReader::from_stream(&encoded[..], config);
            let mut decoded = Vec::new();
            while let Some(tag) = reader.read_tag().unwrap() {
                prop_assert_eq!(tag.field_number(), 1);
                decoded.push(reader.read_uint64().unwrap());
            }
            prop_assert_eq!(&decoded, &values);
        }
    }
}
