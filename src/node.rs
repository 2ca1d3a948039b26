//! Schema nodes: the catalog-kind tag plus name/endian/options that make up
//! a [`crate::schema::Schema`] chain (spec.md §3 "Schema chain").

use crate::catalog::Primitive;
use crate::options::Options;

/// Byte order. Endian-neutral builder methods inherit the schema's current
/// default; bit-field packed integers are always read/written big-endian
/// regardless of this default (spec.md §3 "Endianness").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Default for Endian {
    fn default() -> Self {
        Endian::Big
    }
}

/// What a field references as its element/branch/inline type: a catalog
/// primitive, a name registered in the alias registry, or an inline schema
/// nested directly in the builder chain (spec.md §3 `type` option).
#[derive(Debug, Clone)]
pub enum TypeRef {
    Primitive(Primitive, Endian),
    Alias(String),
    Inline(Box<crate::schema::Schema>),
}

/// The kind tag of a [`Node`]. One per catalog entry (`Primitive`) plus the
/// container/control kinds spec.md §3 lists.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Primitive(Primitive),
    /// A bit field of the given width (1..=32). Consecutive `Bit` nodes
    /// (with `Nest` tolerated as non-breaking, spec.md §4.D/§9) form a run
    /// packed into one big-endian integer at decode/encode time.
    Bit(u8),
    String,
    Buffer,
    Array,
    Choice,
    Nest,
    /// Relative seek; `length` in the node's [`Options`] may be negative,
    /// represented as an `i64` stashed separately from the `usize`-typed
    /// `length` option used elsewhere (see [`Node::seek_delta`]).
    Seek,
    Pointer,
    SaveOffset,
    /// The zero-width root sentinel created by [`crate::schema::Schema::start`]
    /// before any field has been appended.
    Empty,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub endian: Endian,
    pub options: Options,
    /// Signed delta in bits for a `Seek` node; `Options::length` cannot
    /// represent negative seeks since every other use of `length` is a
    /// non-negative count.
    pub seek_delta_bits: i64,
}

impl Node {
    pub fn empty() -> Self {
        Node {
            name: String::new(),
            kind: NodeKind::Empty,
            endian: Endian::default(),
            options: Options::default(),
            seek_delta_bits: 0,
        }
    }
}
