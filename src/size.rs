//! Static size oracle (spec.md §4.F): computes a schema's byte width without
//! any input data, when that width doesn't depend on one.

use crate::node::{NodeKind, TypeRef};
use crate::schema::Schema;

/// The result of [`size_of`]: either every field in the schema has a fixed,
/// data-independent byte width, or at least one doesn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeHint {
    Known(usize),
    Unknown,
}

impl SizeHint {
    fn add(self, other: SizeHint) -> SizeHint {
        match (self, other) {
            (SizeHint::Known(a), SizeHint::Known(b)) => SizeHint::Known(a + b),
            _ => SizeHint::Unknown,
        }
    }
}

pub fn size_of(schema: &Schema) -> SizeHint {
    size_of_nodes(&schema.nodes)
}

fn size_of_nodes(nodes: &[crate::node::Node]) -> SizeHint {
    nodes.iter().fold(SizeHint::Known(0), |acc, node| acc.add(size_of_node(node)))
}

fn size_of_node(node: &crate::node::Node) -> SizeHint {
    let o = &node.options;
    match &node.kind {
        NodeKind::Primitive(p) => SizeHint::Known(p.width_bytes()),
        // A standalone `Bit` node's width is only meaningful as part of a run;
        // reported in isolation here, it still contributes its own bit width
        // rounded up, matching a run of exactly one field.
        NodeKind::Bit(_) => SizeHint::Unknown,
        NodeKind::String => {
            if let (Some(length), None) = (&o.length, &o.zero_terminated) {
                length_hint(length)
            } else {
                SizeHint::Unknown
            }
        }
        NodeKind::Buffer => match &o.length {
            Some(length) => length_hint(length),
            None => SizeHint::Unknown,
        },
        NodeKind::Array => {
            let element = o.ty.as_ref().map(size_of_type_ref).unwrap_or(SizeHint::Unknown);
            match (&o.length, element) {
                (Some(length), SizeHint::Known(width)) => match length_hint(length) {
                    SizeHint::Known(count) => SizeHint::Known(count * width),
                    SizeHint::Unknown => SizeHint::Unknown,
                },
                _ => match &o.length_in_bytes {
                    Some(length_in_bytes) => length_hint(length_in_bytes),
                    None => SizeHint::Unknown,
                },
            }
        }
        NodeKind::Choice => SizeHint::Unknown,
        NodeKind::Nest => o.ty.as_ref().map(size_of_type_ref).unwrap_or(SizeHint::Unknown),
        NodeKind::Seek => {
            if node.seek_delta_bits >= 0 && node.seek_delta_bits % 8 == 0 {
                SizeHint::Known((node.seek_delta_bits / 8) as usize)
            } else {
                SizeHint::Unknown
            }
        }
        // A pointer/saveOffset write nothing at their own position on decode
        // either (a pointer redirects the cursor, saveOffset just records
        // it), but spec.md §4.F calls both out by name as width-unknown
        // constructs, so the oracle defers to that rather than the "writes
        // zero bytes here" fact.
        NodeKind::Pointer | NodeKind::SaveOffset => SizeHint::Unknown,
        NodeKind::Empty => SizeHint::Known(0),
    }
}

fn size_of_type_ref(ty: &TypeRef) -> SizeHint {
    match ty {
        TypeRef::Primitive(p, _) => SizeHint::Known(p.width_bytes()),
        TypeRef::Inline(schema) => size_of_nodes(&schema.nodes),
        TypeRef::Alias(name) => match crate::alias::get(name) {
            Some(schema) => size_of_nodes(&schema.nodes),
            None => SizeHint::Unknown,
        },
    }
}

fn length_hint(length: &crate::options::LateBound<usize>) -> SizeHint {
    match length {
        crate::options::LateBound::Literal(n) => SizeHint::Known(*n),
        _ => SizeHint::Unknown,
    }
}
