use std::collections::BTreeMap;

use bitspec::catalog::Primitive;
use bitspec::node::{Endian, TypeRef};
use bitspec::options::Options;
use bitspec::schema::Schema;
use bitspec::value::Value;
use proptest::prelude::*;

fn record(pairs: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[test]
fn string_length_zero_terminated_truncates_at_terminator() {
    let schema = Schema::start().string("s", Options::new().length(5).zero_terminated(true));
    let record = schema.parse(b"ab\0cd").unwrap();
    assert_eq!(record.get("s"), Some(&Value::Text("ab".to_string())));
}

#[test]
fn buffer_read_until_stops_before_terminator_byte() {
    let schema = Schema::start().buffer("b", Options::new().read_until(|item, _| item.as_i64() == Some(0)));
    let record = schema.parse(&[1, 2, 0, 3]).unwrap();
    assert_eq!(record.get("b"), Some(&Value::Bytes(vec![1, 2])));
}

#[test]
fn array_length_in_bytes_stops_on_byte_budget() {
    let schema = Schema::start().array(
        "items",
        Options::new().length_in_bytes(6usize).ty(TypeRef::Primitive(Primitive::Uint16, Endian::Big)),
    );
    let record = schema.parse(&[0, 1, 0, 2, 0, 3]).unwrap();
    assert_eq!(record.get("items"), Some(&Value::Seq(vec![Value::U64(1), Value::U64(2), Value::U64(3)])));
}

#[test]
fn bit_fields_pack_big_endian_within_a_byte() {
    let schema = Schema::start().bit1("a").bit3("b").bit4("c");
    let record = schema.parse(&[0b1_011_0110]).unwrap();
    assert_eq!(record.get("a"), Some(&Value::U64(1)));
    assert_eq!(record.get("b"), Some(&Value::U64(3)));
    assert_eq!(record.get("c"), Some(&Value::U64(6)));
}

#[test]
fn bit_fields_pack_little_endian_within_a_byte() {
    let schema = Schema::start().endianness(Endian::Little).bit1("a").bit3("b").bit4("c");
    let record = schema.parse(&[0b1_011_0110]).unwrap();
    assert_eq!(record.get("a"), Some(&Value::U64(0)));
    assert_eq!(record.get("b"), Some(&Value::U64(3)));
    assert_eq!(record.get("c"), Some(&Value::U64(11)));
}

#[test]
fn length_prefixed_array_decodes_and_re_encodes() {
    let schema = Schema::start()
        .uint8("n")
        .array("items", Options::new().length_field("n").ty(TypeRef::Primitive(Primitive::Uint16, Endian::Little)));
    let bytes = vec![0x02, 0x01, 0x00, 0x02, 0x00];
    let record = schema.parse(&bytes).unwrap();
    assert_eq!(schema.encode(&record).unwrap(), bytes);
}

#[test]
fn choice_falls_back_to_default_when_tag_is_unmatched() {
    let schema = Schema::start().uint8("t").choice(
        "v",
        Options::new()
            .tag_field("t")
            .choices([(1i64, TypeRef::Primitive(Primitive::Uint8, Endian::Big))].into_iter().collect())
            .default_choice(TypeRef::Primitive(Primitive::Uint16, Endian::Big)),
    );
    let record = schema.parse(&[0x09, 0x00, 0x05]).unwrap();
    assert_eq!(record.get("v"), Some(&Value::U64(5)));
}

#[test]
fn recursive_alias_chain_decodes_a_linked_list() {
    // Each node is { value: u8, has_next: u8, next: record }, where `next`
    // is an empty record when has_next == 0 and a nested node (decoded
    // through the "roundtrip-linked-node" alias) when has_next == 1.
    let node = Schema::start().uint8("value").uint8("has_next").choice(
        "next",
        Options::new().tag_field("has_next").choices(
            [
                (0i64, TypeRef::Inline(Box::new(Schema::start()))),
                (1i64, TypeRef::Alias("roundtrip-linked-node".to_string())),
            ]
            .into_iter()
            .collect(),
        ),
    );
    node.namely("roundtrip-linked-node");

    let chain = Schema::start().nest_alias("head", "roundtrip-linked-node");
    let bytes = [1u8, 1, 2, 1, 3, 0];
    let record = chain.parse(&bytes).unwrap();

    let head = match record.get("head") {
        Some(Value::Record(r)) => r,
        other => panic!("expected a record, got {other:?}"),
    };
    assert_eq!(head.get("value"), Some(&Value::U64(1)));
    let next = match head.get("next") {
        Some(Value::Record(r)) => r,
        other => panic!("expected a nested record, got {other:?}"),
    };
    assert_eq!(next.get("value"), Some(&Value::U64(2)));
}

#[test]
fn unregistered_alias_reference_fails_to_parse() {
    let schema = Schema::start().nest_alias("v", "roundtrip-does-not-exist");
    assert!(schema.parse(&[1, 2, 3]).is_err());
}

#[test]
fn pointer_reads_from_an_absolute_offset_without_disturbing_the_cursor() {
    let schema = Schema::start()
        .uint8("offset")
        .pointer("target", Options::new().offset(crate::field_offset()).ty(TypeRef::Primitive(Primitive::Uint8, Endian::Big)))
        .uint8("after");
    let record = schema.parse(&[2, 0xAA, 0xBB]).unwrap();
    assert_eq!(record.get("target"), Some(&Value::U64(0xBB)));
    assert_eq!(record.get("after"), Some(&Value::U64(0xAA)));
}

fn field_offset() -> bitspec::options::LateBound<usize> {
    bitspec::options::LateBound::Field("offset".to_string())
}

proptest! {
    /// `encode(decode(bytes)) == bytes` for a schema with no lossy transforms
    /// (no trim/padding/encode_until), as long as decode succeeds.
    #[test]
    fn decode_then_encode_preserves_bytes(a in any::<u16>(), b in any::<u8>(), c in any::<u16>()) {
        let schema = Schema::start().uint16be("a").uint8("b").uint16le("c");
        let mut bytes = Vec::new();
        bytes.extend(a.to_be_bytes());
        bytes.push(b);
        bytes.extend(c.to_le_bytes());

        let record = schema.parse(&bytes).unwrap();
        let re_encoded = schema.encode(&record).unwrap();
        prop_assert_eq!(re_encoded, bytes);
    }

    /// `decode(encode(record))` reproduces the same record for a schema with
    /// no pointers or dictionary-keyed arrays.
    #[test]
    fn encode_then_decode_preserves_record(value in any::<u32>(), flag in any::<u8>()) {
        let schema = Schema::start().uint32be("value").uint8("flag");
        let record = record(vec![("value", Value::U64(value as u64)), ("flag", Value::U64(flag as u64))]);

        let bytes = schema.encode(&record).unwrap();
        let decoded = schema.parse(&bytes).unwrap();
        prop_assert_eq!(decoded, record);
    }
}
