//! Encode planner (spec.md §4.E): walks a compiled [`crate::schema::Schema`]
//! and produces a byte buffer from a [`Record`].

use crate::bits;
use crate::catalog::Primitive;
use crate::error::EncodeError;
use crate::node::{Endian, Node, NodeKind, TypeRef};
use crate::options::{PaddingSide, ReadUntil};
use crate::schema::Schema;
use crate::value::{Record, Value};

pub fn encode_root(schema: &Schema, record: &Record) -> Result<Vec<u8>, EncodeError> {
    // The capacity hint lives on whichever node set it first; schemas that
    // care about it put it on their first field. Default to 256 otherwise.
    let capacity = schema
        .nodes
        .iter()
        .find_map(|n| n.options.smart_buffer_size)
        .unwrap_or(256);
    let mut out = Vec::with_capacity(capacity);
    encode_nodes(&schema.nodes, record, &mut out)?;
    Ok(out)
}

fn encode_nodes(nodes: &[Node], record: &Record, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let mut i = 0;
    while i < nodes.len() {
        if matches!(nodes[i].kind, NodeKind::Bit(_)) {
            let end = scan_bit_run(nodes, i);
            encode_bit_run(&nodes[i..end], record, out)?;
            i = end;
        } else {
            encode_node(&nodes[i], record, out)?;
            i += 1;
        }
    }
    Ok(())
}

/// Mirrors [`crate::decode::scan_bit_run`]'s run-boundary rule.
fn scan_bit_run(nodes: &[Node], start: usize) -> usize {
    let mut i = start;
    let mut last_bit_end = start + 1;
    while i < nodes.len() {
        match nodes[i].kind {
            NodeKind::Bit(_) => {
                i += 1;
                last_bit_end = i;
            }
            NodeKind::Nest => i += 1,
            _ => break,
        }
    }
    last_bit_end
}

fn field_value<'a>(node: &Node, record: &'a Record) -> Result<&'a Value, EncodeError> {
    record
        .get(&node.name)
        .ok_or_else(|| EncodeError::ArgumentError)
}

/// Applies an `encoder` substitution if present, producing the value that
/// actually gets written (spec.md §4.E "pre-transform").
fn transformed<'a>(node: &Node, record: &Record, value: &'a Value) -> Value {
    match &node.options.encoder {
        Some(f) => f(value, record),
        None => value.clone(),
    }
}

fn encode_bit_run(nodes: &[Node], record: &Record, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let total_bits: usize = nodes
        .iter()
        .filter_map(|n| match n.kind {
            NodeKind::Bit(w) => Some(w as usize),
            _ => None,
        })
        .sum();
    let n_bytes = bits::round_up_run_bytes(total_bits).ok_or(EncodeError::BitSequenceTooLong)?;

    let endian = nodes
        .iter()
        .find_map(|n| matches!(n.kind, NodeKind::Bit(_)).then_some(n.endian))
        .unwrap_or(Endian::Big);

    let mut packed: u32 = 0;
    let mut cumulative = 0usize;
    let mut nested: Vec<&Node> = Vec::new();

    for node in nodes {
        match node.kind {
            NodeKind::Bit(width) => {
                let width = width as usize;
                let value = field_value(node, record)?;
                let raw = value.as_i64().ok_or(EncodeError::ArgumentError)? as u32;
                let mask: u32 = if width >= 32 { u32::MAX } else { (1u32 << width) - 1 };
                let raw = raw & mask;

                let shift = match endian {
                    Endian::Big => total_bits - cumulative - width,
                    Endian::Little => cumulative,
                };
                packed |= raw << shift;
                cumulative += width;
            }
            NodeKind::Nest => nested.push(node),
            _ => unreachable!("scan_bit_run only admits Bit and Nest nodes"),
        }
    }

    bits::write_packed_be(out, packed, n_bytes);

    for node in nested {
        encode_nest(node, record, out)?;
    }
    Ok(())
}

fn encode_node(node: &Node, record: &Record, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    match &node.kind {
        NodeKind::Primitive(p) => {
            let value = field_value(node, record)?;
            let value = transformed(node, record, value);
            encode_primitive_value(*p, node.endian, &value, out)?;
        }
        NodeKind::String => encode_string(node, record, out)?,
        NodeKind::Buffer => encode_buffer(node, record, out)?,
        NodeKind::Array => encode_array(node, record, out)?,
        NodeKind::Choice => encode_choice(node, record, out)?,
        NodeKind::Nest => encode_nest(node, record, out)?,
        NodeKind::Seek => {
            if node.seek_delta_bits < 0 {
                return Err(EncodeError::UnsupportedEncoding("negative seek on encode".to_string()));
            }
            let n_bytes = (node.seek_delta_bits as usize + 7) / 8;
            out.extend(std::iter::repeat(0u8).take(n_bytes));
        }
        // Pointer/saveOffset redirect or read the decode cursor; neither has
        // a meaningful write-time effect, so both are no-ops on encode
        // (spec.md §9).
        NodeKind::Pointer | NodeKind::SaveOffset => {}
        NodeKind::Bit(_) => unreachable!("bit nodes are handled by encode_bit_run"),
        NodeKind::Empty => {}
    }
    Ok(())
}

fn encode_primitive_value(primitive: Primitive, endian: Endian, value: &Value, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let width = primitive.width_bytes();
    let raw: u64 = if primitive.is_float() {
        match (width, value) {
            (4, Value::F32(v)) => v.to_bits() as u64,
            (4, Value::F64(v)) => (*v as f32).to_bits() as u64,
            (8, Value::F64(v)) => v.to_bits(),
            (8, Value::F32(v)) => (*v as f64).to_bits(),
            _ => return Err(EncodeError::ArgumentError),
        }
    } else {
        value.as_i64().ok_or(EncodeError::ArgumentError)? as u64
    };
    bits::write_uint(out, raw, width, endian)
}

/// Encodes a single value of `ty`: a primitive, an alias (invoking that
/// alias's own encoder and appending its bytes), or an inline schema.
fn encode_type(ty: &TypeRef, value: &Value, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    match ty {
        TypeRef::Primitive(p, endian) => encode_primitive_value(*p, *endian, value, out),
        TypeRef::Alias(name) => {
            let aliased = crate::alias::get(name).ok_or_else(|| EncodeError::UnknownAlias(name.clone()))?;
            let sub = as_record(value)?;
            encode_nodes(&aliased.nodes, sub, out)
        }
        TypeRef::Inline(schema) => {
            let sub = as_record(value)?;
            encode_nodes(&schema.nodes, sub, out)
        }
    }
}

fn as_record(value: &Value) -> Result<&Record, EncodeError> {
    match value {
        Value::Record(r) => Ok(r),
        _ => Err(EncodeError::ArgumentError),
    }
}

fn encode_string(node: &Node, record: &Record, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let o = &node.options;
    let value = field_value(node, record)?;
    let value = transformed(node, record, value);
    let text = match &value {
        Value::Text(t) => t.clone(),
        _ => return Err(EncodeError::ArgumentError),
    };
    let mut raw = o.encoding.clone().unwrap_or_default().encode(&text)?;

    if let Some(length) = &o.length {
        let len = length.resolve(record).ok_or(EncodeError::ArgumentError)?;
        if raw.len() > len {
            raw.truncate(len);
        } else if raw.len() < len {
            let pad = vec![o.padd_char(); len - raw.len()];
            match o.padding_side() {
                PaddingSide::Right => raw.extend(pad),
                PaddingSide::Left => {
                    let mut padded = pad;
                    padded.extend(raw);
                    raw = padded;
                }
            }
        }
        // `zeroTerminated` appends one more byte after the padded/truncated
        // `length`-wide content, so the field on the wire is `length + 1`
        // bytes (spec.md §4.E).
        if o.zero_terminated == Some(true) {
            raw.push(0);
        }
    } else if o.zero_terminated == Some(true) {
        raw.push(0);
    }
    // greedy strings are written as-is with no length prefix or terminator.

    out.extend(raw);
    Ok(())
}

fn encode_buffer(node: &Node, record: &Record, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let value = field_value(node, record)?;
    let value = transformed(node, record, value);
    let bytes = match &value {
        Value::Bytes(b) => b.clone(),
        _ => return Err(EncodeError::ArgumentError),
    };
    out.extend(bytes);
    Ok(())
}

fn encode_array(node: &Node, record: &Record, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let o = &node.options;
    let ty = o.ty.as_ref().ok_or(EncodeError::ArgumentError)?;
    let value = field_value(node, record)?;
    let value = transformed(node, record, value);

    let items: &[Value] = match &value {
        Value::Seq(items) => items,
        Value::Dict(_) => {
            return Err(EncodeError::UnsupportedEncoding(
                "dictionary-keyed array has no stable encode order".to_string(),
            ))
        }
        _ => return Err(EncodeError::ArgumentError),
    };

    // When `length` is specified, the intended count is capped at it; the
    // write loop still also honors `encodeUntil`/`readUntil` if present
    // (spec.md §4.E).
    let target_count = match &o.length {
        Some(length) => items.len().min(length.resolve(record).ok_or(EncodeError::ArgumentError)?),
        None => items.len(),
    };

    let mut sink = Vec::new();
    let mut written = 0usize;
    for item in items {
        encode_type(ty, item, &mut sink)?;
        written += 1;

        let stop = if let Some(encode_until) = &o.encode_until {
            encode_until(item, record)
        } else if let Some(ReadUntil::Predicate(pred)) = &o.read_until {
            pred(item, &sink)
        } else {
            written >= target_count
        };
        if stop {
            break;
        }
    }

    if let Some(length_in_bytes) = &o.length_in_bytes {
        let target = length_in_bytes.resolve(record).ok_or(EncodeError::ArgumentError)?;
        if sink.len() > target {
            sink.truncate(target);
        }
    }

    out.extend(sink);
    Ok(())
}

fn encode_choice(node: &Node, record: &Record, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let o = &node.options;
    let tag_value = o.tag.as_ref().ok_or(EncodeError::UndefinedTag)?.resolve(record).ok_or(EncodeError::UndefinedTag)?;
    let choices = o.choices.as_ref().ok_or(EncodeError::UndefinedTag)?;
    let ty = choices.get(&tag_value).or(o.default_choice.as_ref()).ok_or(EncodeError::UndefinedTag)?;

    let merged;
    let value: &Value = if node.name.is_empty() {
        merged = Value::Record(record.clone());
        &merged
    } else {
        field_value(node, record)?
    };
    let value = transformed(node, record, value);
    encode_type(ty, &value, out)
}

fn encode_nest(node: &Node, record: &Record, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let ty = node.options.ty.as_ref().ok_or(EncodeError::ArgumentError)?;

    let sub: &Record = if node.name.is_empty() {
        record
    } else {
        match record.get(&node.name) {
            Some(Value::Record(r)) => r,
            _ => return Err(EncodeError::ArgumentError),
        }
    };
    let sub_value = transformed(node, record, &Value::Record(sub.clone()));
    let sub = match &sub_value {
        Value::Record(r) => r,
        _ => return Err(EncodeError::ArgumentError),
    };

    match ty {
        TypeRef::Alias(name) => {
            let aliased = crate::alias::get(name).ok_or_else(|| EncodeError::UnknownAlias(name.clone()))?;
            encode_nodes(&aliased.nodes, sub, out)
        }
        TypeRef::Inline(schema) => encode_nodes(&schema.nodes, sub, out),
        TypeRef::Primitive(_, _) => Err(EncodeError::ArgumentError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::schema::Schema;
    use std::collections::BTreeMap;

    fn record(pairs: Vec<(&str, Value)>) -> Record {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<BTreeMap<_, _>>()
    }

    #[test]
    fn primitive_round_trip_scenario() {
        let schema = Schema::start().uint16be("n");
        let record = record(vec![("n", Value::U64(0x1234))]);
        assert_eq!(schema.encode(&record).unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn bit_packing_big_endian_scenario() {
        let schema = Schema::start().bit1("a").bit3("b").bit4("c");
        let record = record(vec![("a", Value::U64(1)), ("b", Value::U64(3)), ("c", Value::U64(6))]);
        assert_eq!(schema.encode(&record).unwrap(), vec![0b1_011_0110]);
    }

    #[test]
    fn string_fixed_length_padding_scenario() {
        let schema = Schema::start().string("s", Options::new().length(5).padd(b'x'));
        let record = record(vec![("s", Value::Text("ab".to_string()))]);
        assert_eq!(schema.encode(&record).unwrap(), b"abxxx".to_vec());
    }

    #[test]
    fn buffer_encodes_bytes_verbatim() {
        let schema = Schema::start().buffer("b", Options::new().length(3));
        let record = record(vec![("b", Value::Bytes(vec![1, 2, 3]))]);
        assert_eq!(schema.encode(&record).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn length_prefixed_array_round_trips_through_encode() {
        let schema = Schema::start().uint8("n").array(
            "items",
            Options::new().length_field("n").ty(crate::node::TypeRef::Primitive(Primitive::Uint16, Endian::Little)),
        );
        let record = record(vec![
            ("n", Value::U64(2)),
            ("items", Value::Seq(vec![Value::U64(1), Value::U64(2)])),
        ]);
        assert_eq!(schema.encode(&record).unwrap(), vec![0x02, 0x01, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn pointer_and_save_offset_are_no_ops_on_encode() {
        let schema = Schema::start().uint8("n").save_offset("at").pointer(
            "p",
            Options::new().offset(0usize).ty(crate::node::TypeRef::Primitive(Primitive::Uint8, Endian::Big)),
        );
        let record = record(vec![("n", Value::U64(7)), ("at", Value::U64(1)), ("p", Value::U64(9))]);
        assert_eq!(schema.encode(&record).unwrap(), vec![7]);
    }
}
