//! Decode planner (spec.md §4.D): walks a compiled [`crate::schema::Schema`]
//! and produces a decoded [`Record`] from a byte buffer.

use std::collections::BTreeMap;

use crate::bits;
use crate::catalog::Primitive;
use crate::error::DecodeError;
use crate::node::{Endian, Node, NodeKind, TypeRef};
use crate::options::ReadUntil;
use crate::schema::Schema;
use crate::value::{Record, Value};

pub fn decode_root(schema: &Schema, bytes: &[u8]) -> Result<Record, DecodeError> {
    let mut record = Record::new();
    let mut bit_offset = 0usize;
    decode_nodes(&schema.nodes, bytes, &mut bit_offset, &mut record)?;
    Ok(record)
}

/// Decodes a sequence of sibling nodes into `record`, grouping consecutive
/// `Bit` nodes (tolerating interleaved `Nest` nodes, spec.md §4.D / §9) into
/// single packed-integer runs.
fn decode_nodes(
    nodes: &[Node],
    data: &[u8],
    bit_offset: &mut usize,
    record: &mut Record,
) -> Result<(), DecodeError> {
    let mut i = 0;
    while i < nodes.len() {
        if matches!(nodes[i].kind, NodeKind::Bit(_)) {
            let end = scan_bit_run(nodes, i);
            decode_bit_run(&nodes[i..end], data, bit_offset, record)?;
            i = end;
        } else {
            decode_node(&nodes[i], data, bit_offset, record)?;
            i += 1;
        }
    }
    Ok(())
}

/// Finds the exclusive end of the maximal bit run starting at `start`
/// (`nodes[start]` must be a `Bit` node). Trailing `Nest` nodes not
/// followed by a further `Bit` node are excluded — the tolerance only
/// applies to a `Nest` sandwiched between `Bit` nodes.
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

fn decode_bit_run(
    nodes: &[Node],
    data: &[u8],
    bit_offset: &mut usize,
    record: &mut Record,
) -> Result<(), DecodeError> {
    let total_bits: usize = nodes
        .iter()
        .filter_map(|n| match n.kind {
            NodeKind::Bit(w) => Some(w as usize),
            _ => None,
        })
        .sum();
    let n_bytes = bits::round_up_run_bytes(total_bits).ok_or(DecodeError::BitSequenceTooLong)?;

    let byte_offset = *bit_offset / 8;
    let packed = bits::read_packed_be(data, byte_offset, n_bytes)?;
    *bit_offset += n_bytes * 8;

    let endian = nodes
        .iter()
        .find_map(|n| matches!(n.kind, NodeKind::Bit(_)).then_some(n.endian))
        .unwrap_or(Endian::Big);

    let mut cumulative = 0usize;
    for node in nodes {
        match node.kind {
            NodeKind::Bit(width) => {
                let width = width as usize;
                let shift = match endian {
                    Endian::Big => total_bits - cumulative - width,
                    Endian::Little => cumulative,
                };
                let mask: u32 = if width >= 32 { u32::MAX } else { (1u32 << width) - 1 };
                let raw = (packed >> shift) & mask;
                cumulative += width;

                let value = apply_formatter_and_assert(node, data, *bit_offset, record, Value::U64(raw as u64))?;
                if !node.name.is_empty() {
                    record.insert(node.name.clone(), value);
                }
            }
            NodeKind::Nest => decode_nest(node, data, bit_offset, record)?,
            _ => unreachable!("scan_bit_run only admits Bit and Nest nodes"),
        }
    }
    Ok(())
}

fn decode_node(node: &Node, data: &[u8], bit_offset: &mut usize, record: &mut Record) -> Result<(), DecodeError> {
    match &node.kind {
        NodeKind::Primitive(p) => {
            let value = decode_primitive_value(*p, node.endian, data, bit_offset)?;
            let value = apply_formatter_and_assert(node, data, *bit_offset, record, value)?;
            if !node.name.is_empty() {
                record.insert(node.name.clone(), value);
            }
        }
        NodeKind::String => decode_string(node, data, bit_offset, record)?,
        NodeKind::Buffer => decode_buffer(node, data, bit_offset, record)?,
        NodeKind::Array => decode_array(node, data, bit_offset, record)?,
        NodeKind::Choice => decode_choice(node, data, bit_offset, record)?,
        NodeKind::Nest => decode_nest(node, data, bit_offset, record)?,
        NodeKind::Seek => {
            *bit_offset = (*bit_offset as i64 + node.seek_delta_bits).max(0) as usize;
        }
        NodeKind::Pointer => decode_pointer(node, data, bit_offset, record)?,
        NodeKind::SaveOffset => {
            record.insert(node.name.clone(), Value::U64((*bit_offset / 8) as u64));
        }
        NodeKind::Bit(_) => unreachable!("bit nodes are handled by decode_bit_run"),
        NodeKind::Empty => {}
    }
    Ok(())
}

fn apply_formatter_and_assert(
    node: &Node,
    data: &[u8],
    bit_offset: usize,
    record: &Record,
    mut value: Value,
) -> Result<Value, DecodeError> {
    if let Some(formatter) = &node.options.formatter {
        value = formatter(&value, data, bit_offset / 8);
    }
    if let Some(assert) = &node.options.assert {
        if !assert.check(record, &value) {
            return Err(DecodeError::AssertFailed {
                field: node.name.clone(),
                value: value.describe(),
            });
        }
    }
    Ok(value)
}

fn decode_primitive_value(
    primitive: Primitive,
    endian: Endian,
    data: &[u8],
    bit_offset: &mut usize,
) -> Result<Value, DecodeError> {
    if *bit_offset % 8 != 0 {
        return Err(DecodeError::OutOfBounds);
    }
    let byte_offset = *bit_offset / 8;
    let width = primitive.width_bytes();
    let raw = bits::read_uint(data, byte_offset, width, endian)?;
    *bit_offset += width * 8;

    Ok(if primitive.is_float() {
        if width == 4 {
            Value::F32(f32::from_bits(raw as u32))
        } else {
            Value::F64(f64::from_bits(raw))
        }
    } else if primitive.is_signed() {
        Value::I64(bits::sign_extend(raw, width * 8))
    } else {
        Value::U64(raw)
    })
}

/// Decodes a single value of `ty` at the current offset: a primitive, an
/// alias (invoking that alias's decoder, which reports its own new offset
/// via the shared `bit_offset` cursor), or an inline schema decoded into a
/// fresh subrecord (spec.md §4.D `array`/`choice`/`pointer`).
fn decode_type(ty: &TypeRef, data: &[u8], bit_offset: &mut usize) -> Result<Value, DecodeError> {
    match ty {
        TypeRef::Primitive(p, endian) => decode_primitive_value(*p, *endian, data, bit_offset),
        TypeRef::Alias(name) => {
            let aliased = crate::alias::get(name).ok_or_else(|| DecodeError::UnknownAlias(name.clone()))?;
            let mut sub = Record::new();
            decode_nodes(&aliased.nodes, data, bit_offset, &mut sub)?;
            Ok(Value::Record(sub))
        }
        TypeRef::Inline(schema) => {
            let mut sub = Record::new();
            decode_nodes(&schema.nodes, data, bit_offset, &mut sub)?;
            Ok(Value::Record(sub))
        }
    }
}

fn decode_string(node: &Node, data: &[u8], bit_offset: &mut usize, record: &mut Record) -> Result<(), DecodeError> {
    let o = &node.options;
    if *bit_offset % 8 != 0 {
        return Err(DecodeError::OutOfBounds);
    }
    let byte_offset = *bit_offset / 8;

    let (mut raw, consumed): (Vec<u8>, usize) = if let (Some(length), true) = (&o.length, o.zero_terminated == Some(true)) {
        let max_len = length.resolve(record).ok_or(DecodeError::ArgumentError)?;
        if byte_offset + max_len > data.len() {
            return Err(DecodeError::OutOfBounds);
        }
        let window = &data[byte_offset..byte_offset + max_len];
        match window.iter().position(|b| *b == 0) {
            Some(pos) => (window[..pos].to_vec(), pos + 1),
            None => (window.to_vec(), max_len),
        }
    } else if let Some(length) = &o.length {
        let len = length.resolve(record).ok_or(DecodeError::ArgumentError)?;
        if byte_offset + len > data.len() {
            return Err(DecodeError::OutOfBounds);
        }
        (data[byte_offset..byte_offset + len].to_vec(), len)
    } else if o.zero_terminated == Some(true) {
        let remaining = &data[byte_offset..];
        let pos = remaining.iter().position(|b| *b == 0).ok_or(DecodeError::OutOfBounds)?;
        (remaining[..pos].to_vec(), pos + 1)
    } else {
        let remaining = &data[byte_offset..];
        (remaining.to_vec(), remaining.len())
    };

    *bit_offset += consumed * 8;

    if o.strip_null == Some(true) {
        while raw.last() == Some(&0) {
            raw.pop();
        }
    }

    let mut text = o.encoding.clone().unwrap_or_default().decode(&raw)?;
    if o.trim == Some(true) {
        text = text.trim().to_string();
    }

    let value = apply_formatter_and_assert(node, data, *bit_offset, record, Value::Text(text))?;
    if !node.name.is_empty() {
        record.insert(node.name.clone(), value);
    }
    Ok(())
}

fn decode_buffer(node: &Node, data: &[u8], bit_offset: &mut usize, record: &mut Record) -> Result<(), DecodeError> {
    let o = &node.options;
    if *bit_offset % 8 != 0 {
        return Err(DecodeError::OutOfBounds);
    }
    let byte_offset = *bit_offset / 8;

    let (raw, end_byte): (Vec<u8>, usize) = match &o.read_until {
        Some(ReadUntil::Predicate(pred)) => {
            let mut idx = byte_offset;
            loop {
                if idx >= data.len() {
                    return Err(DecodeError::OutOfBounds);
                }
                let b = data[idx];
                let remaining = &data[idx..];
                if pred(&Value::U64(b as u64), remaining) {
                    break;
                }
                idx += 1;
            }
            (data[byte_offset..idx].to_vec(), idx)
        }
        Some(ReadUntil::Eof) => (data[byte_offset..].to_vec(), data.len()),
        None => {
            let len = o.length.as_ref().ok_or(DecodeError::ArgumentError)?.resolve(record).ok_or(DecodeError::ArgumentError)?;
            if byte_offset + len > data.len() {
                return Err(DecodeError::OutOfBounds);
            }
            (data[byte_offset..byte_offset + len].to_vec(), byte_offset + len)
        }
    };

    *bit_offset = end_byte * 8;

    let value = apply_formatter_and_assert(node, data, *bit_offset, record, Value::Bytes(raw))?;
    if !node.name.is_empty() {
        record.insert(node.name.clone(), value);
    }
    Ok(())
}

fn decode_array(node: &Node, data: &[u8], bit_offset: &mut usize, record: &mut Record) -> Result<(), DecodeError> {
    let o = &node.options;
    let ty = o.ty.as_ref().ok_or(DecodeError::ArgumentError)?;
    let start_bit = *bit_offset;

    let mut items: Vec<Value> = Vec::new();

    match (&o.read_until, &o.length_in_bytes, &o.length) {
        (Some(ReadUntil::Eof), _, _) => {
            let total_bits = data.len() * 8;
            while *bit_offset < total_bits {
                items.push(decode_type(ty, data, bit_offset)?);
            }
        }
        (Some(ReadUntil::Predicate(pred)), _, _) => {
            // do-while: always decode at least one item (spec.md §9 open question).
            loop {
                let item = decode_type(ty, data, bit_offset)?;
                let remaining = &data[(*bit_offset / 8).min(data.len())..];
                let stop = pred(&item, remaining);
                items.push(item);
                if stop {
                    break;
                }
            }
        }
        (None, Some(length_in_bytes), _) => {
            let n_bytes = length_in_bytes.resolve(record).ok_or(DecodeError::ArgumentError)?;
            let start_byte = start_bit / 8;
            while (*bit_offset / 8).saturating_sub(start_byte) < n_bytes {
                items.push(decode_type(ty, data, bit_offset)?);
            }
        }
        (None, None, Some(length)) => {
            let count = length.resolve(record).ok_or(DecodeError::ArgumentError)?;
            for _ in 0..count {
                items.push(decode_type(ty, data, bit_offset)?);
            }
        }
        _ => return Err(DecodeError::ArgumentError),
    }

    let value = if let Some(key_field) = &o.key {
        let mut dict: BTreeMap<String, Value> = BTreeMap::new();
        for item in items {
            if let Value::Record(r) = &item {
                if let Some(key_value) = r.get(key_field) {
                    dict.insert(key_value.describe(), item);
                }
            }
        }
        Value::Dict(dict)
    } else {
        Value::Seq(items)
    };

    let value = apply_formatter_and_assert(node, data, *bit_offset, record, value)?;
    if !node.name.is_empty() {
        record.insert(node.name.clone(), value);
    }
    Ok(())
}

fn decode_choice(node: &Node, data: &[u8], bit_offset: &mut usize, record: &mut Record) -> Result<(), DecodeError> {
    let o = &node.options;
    let tag = o.tag.as_ref().ok_or(DecodeError::UndefinedTag)?;
    let tag_value = tag.resolve(record).ok_or(DecodeError::UndefinedTag)?;
    let choices = o.choices.as_ref().ok_or(DecodeError::UndefinedTag)?;

    let ty = choices
        .get(&tag_value)
        .or(o.default_choice.as_ref())
        .ok_or(DecodeError::UndefinedTag)?;

    let value = decode_type(ty, data, bit_offset)?;
    let value = apply_formatter_and_assert(node, data, *bit_offset, record, value)?;

    if !node.name.is_empty() {
        record.insert(node.name.clone(), value);
    } else if let Value::Record(sub) = value {
        record.extend(sub);
    }
    Ok(())
}

fn decode_nest(node: &Node, data: &[u8], bit_offset: &mut usize, record: &mut Record) -> Result<(), DecodeError> {
    let ty = node.options.ty.as_ref().ok_or(DecodeError::ArgumentError)?;

    let sub = match ty {
        TypeRef::Alias(name) => {
            let aliased = crate::alias::get(name).ok_or_else(|| DecodeError::UnknownAlias(name.clone()))?;
            let mut sub = Record::new();
            decode_nodes(&aliased.nodes, data, bit_offset, &mut sub)?;
            sub
        }
        TypeRef::Inline(schema) => {
            let mut sub = Record::new();
            decode_nodes(&schema.nodes, data, bit_offset, &mut sub)?;
            sub
        }
        TypeRef::Primitive(_, _) => return Err(DecodeError::ArgumentError),
    };

    let value = apply_formatter_and_assert(node, data, *bit_offset, record, Value::Record(sub))?;
    if node.name.is_empty() {
        if let Value::Record(sub) = value {
            record.extend(sub);
        }
    } else {
        record.insert(node.name.clone(), value);
    }
    Ok(())
}

fn decode_pointer(node: &Node, data: &[u8], bit_offset: &mut usize, record: &mut Record) -> Result<(), DecodeError> {
    let o = &node.options;
    let target_byte = o.offset.as_ref().ok_or(DecodeError::ArgumentError)?.resolve(record).ok_or(DecodeError::ArgumentError)?;
    let ty = o.ty.as_ref().ok_or(DecodeError::ArgumentError)?;

    let saved = *bit_offset;
    let mut target_bit = target_byte * 8;
    let value = decode_type(ty, data, &mut target_bit)?;
    *bit_offset = saved;

    if !node.name.is_empty() {
        record.insert(node.name.clone(), value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    #[test]
    fn primitive_round_trip_scenario() {
        let schema = Schema::start().uint16be("n");
        let record = schema.parse(&[0x12, 0x34]).unwrap();
        assert_eq!(record.get("n"), Some(&Value::U64(0x1234)));
    }

    #[test]
    fn bit_packing_big_endian_scenario() {
        let schema = Schema::start().bit1("a").bit3("b").bit4("c");
        let record = schema.parse(&[0b1_011_0110]).unwrap();
        assert_eq!(record.get("a"), Some(&Value::U64(1)));
        assert_eq!(record.get("b"), Some(&Value::U64(3)));
        assert_eq!(record.get("c"), Some(&Value::U64(6)));
    }

    #[test]
    fn bit_packing_little_endian_scenario() {
        let schema = Schema::start().endianness(Endian::Little).bit1("a").bit3("b").bit4("c");
        let record = schema.parse(&[0b1_011_0110]).unwrap();
        assert_eq!(record.get("a"), Some(&Value::U64(0)));
        assert_eq!(record.get("b"), Some(&Value::U64(3)));
        assert_eq!(record.get("c"), Some(&Value::U64(11)));
    }

    #[test]
    fn length_prefixed_array_scenario() {
        let schema = Schema::start().uint8("n").array(
            "items",
            Options::new().length_field("n").ty(crate::node::TypeRef::Primitive(Primitive::Uint16, Endian::Little)),
        );
        let record = schema.parse(&[0x02, 0x01, 0x00, 0x02, 0x00]).unwrap();
        assert_eq!(record.get("n"), Some(&Value::U64(2)));
        assert_eq!(
            record.get("items"),
            Some(&Value::Seq(vec![Value::U64(1), Value::U64(2)]))
        );
    }

    #[test]
    fn choice_with_default_scenario() {
        let schema = Schema::start().uint8("t").choice(
            "v",
            Options::new().tag_field("t").choices(
                [
                    (1i64, crate::node::TypeRef::Primitive(Primitive::Uint8, Endian::Big)),
                    (2i64, crate::node::TypeRef::Primitive(Primitive::Uint16, Endian::Big)),
                ]
                .into_iter()
                .collect(),
            ),
        );
        let record = schema.parse(&[0x09, 0x05]).unwrap();
        assert_eq!(record.get("t"), Some(&Value::U64(9)));
        assert_eq!(record.get("v"), Some(&Value::U64(5)));
    }

    #[test]
    fn string_length_zero_terminated_boundary() {
        let schema = Schema::start().string("s", Options::new().length(5).zero_terminated(true));
        let record = schema.parse(b"ab\0cd").unwrap();
        assert_eq!(record.get("s"), Some(&Value::Text("ab".to_string())));
    }

    #[test]
    fn buffer_read_until_predicate_boundary() {
        let schema = Schema::start().buffer(
            "b",
            Options::new().read_until(|item, _remaining| item.as_i64() == Some(0)),
        );
        let record = schema.parse(&[1, 2, 0, 3]).unwrap();
        assert_eq!(record.get("b"), Some(&Value::Bytes(vec![1, 2])));
    }

    #[test]
    fn array_length_in_bytes_boundary() {
        let schema = Schema::start().array(
            "items",
            Options::new()
                .length_in_bytes(6usize)
                .ty(crate::node::TypeRef::Primitive(Primitive::Uint16, Endian::Big)),
        );
        let record = schema.parse(&[0, 1, 0, 2, 0, 3]).unwrap();
        assert_eq!(
            record.get("items"),
            Some(&Value::Seq(vec![Value::U64(1), Value::U64(2), Value::U64(3)]))
        );
    }
}
