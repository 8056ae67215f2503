//! Record → cells → bytes → cells → record.

use alloy_primitives::{I256, U256};
use cellbridge_core::{DecodeLimits, EventRecord, RecordValue};
use cellbridge_ton::{BocDecoder, BocWriter, EventExtractor, EventWriter};

fn record(state: U256, dest_bits: Option<(u64, Vec<u8>)>) -> EventRecord {
    let (len, address) = dest_bits.unwrap_or((0, Vec::new()));
    EventRecord::new()
        .with(
            "src",
            RecordValue::Record(
                EventRecord::new()
                    .with("workchain", RecordValue::int(8, I256::MINUS_ONE))
                    .with("address", RecordValue::Bytes((0..32).collect())),
            ),
        )
        .with(
            "dest",
            RecordValue::Record(
                EventRecord::new()
                    .with("len", RecordValue::uint(9, len))
                    .with("address", RecordValue::Bytes(address)),
            ),
        )
        .with("created_lt", RecordValue::uint(64, u64::MAX))
        .with("created_at", RecordValue::uint(32, 1_700_000_000u64))
        .with("event_id", RecordValue::uint(32, 0xfeed_beefu64))
        .with("state", RecordValue::Uint { bits: 256, value: state })
}

fn round_trip(writer: EventWriter, input: &EventRecord) -> EventRecord {
    let bytes = writer
        .write_boc(input, &BocWriter::new().with_crc(true))
        .unwrap();
    let tree = BocDecoder::new().decode(&bytes).unwrap();
    EventExtractor::new().extract(&tree).unwrap()
}

#[test]
fn inline_body() {
    let input = record(U256::MAX, None);
    assert_eq!(round_trip(EventWriter::new(), &input), input);
}

#[test]
fn body_in_reference() {
    let input = record(U256::from(12345u64), None);
    assert_eq!(round_trip(EventWriter::new().body_in_ref(true), &input), input);
}

#[test]
fn body_split_across_continuation() {
    let input = record(U256::from_be_bytes([0xa5; 32]), None);
    for split in [1, 100, 300, 400, 600] {
        assert_eq!(
            round_trip(EventWriter::new().split_after_bits(split), &input),
            input,
            "split after {split} bits"
        );
    }
}

#[test]
fn body_in_reference_and_split() {
    let input = record(U256::from(7u64), None);
    let writer = EventWriter::new().body_in_ref(true).split_after_bits(40);
    assert_eq!(round_trip(writer, &input), input);
}

#[test]
fn external_destination_address() {
    // 12 bits: 0xabc
    let input = record(U256::from(1u64), Some((12, vec![0xab, 0xc0])));
    assert_eq!(round_trip(EventWriter::new(), &input), input);
}

#[test]
fn continuation_counts_toward_depth_limit() {
    let input = record(U256::from(1u64), None);
    let bytes = EventWriter::new()
        .split_after_bits(8)
        .write_boc(&input, &BocWriter::new())
        .unwrap();
    let tree = BocDecoder::new().decode(&bytes).unwrap();
    let limits = DecodeLimits {
        max_depth: 0,
        ..DecodeLimits::default()
    };
    let err = EventExtractor::with_limits(limits).extract(&tree).unwrap_err();
    assert_eq!(err.kind(), "depth_or_size_limit_exceeded");
}

#[test]
fn decode_is_deterministic() {
    let input = record(U256::from(99u64), None);
    let bytes = EventWriter::new()
        .body_in_ref(true)
        .write_boc(&input, &BocWriter::new())
        .unwrap();
    let a = BocDecoder::new().decode(&bytes).unwrap();
    let b = BocDecoder::new().decode(&bytes).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        EventExtractor::new().extract(&a).unwrap(),
        EventExtractor::new().extract(&b).unwrap()
    );
}
