//! Schema chain and builder (spec.md §4.B). A [`Schema`] is built by chaining
//! one call per field; [`Schema::validate`] runs the build-time checks
//! spec.md enumerates, the same two-phase shape as the teacher's
//! `Field` (raw, unchecked) → `Schema::compile` (validated) split, collapsed
//! here into a single type validated lazily before first use so that
//! `start().uint8("n").array(..)` chains the way spec.md's examples show it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::Primitive;
use crate::decode;
use crate::encode;
use crate::error::{BuildError, DecodeError, EncodeError};
use crate::node::{Endian, Node, NodeKind, TypeRef};
use crate::options::{Assert, Options};
use crate::size::{self, SizeHint};
use crate::value::Record;

/// A chainable schema: head-to-tail sequence of [`Node`]s plus the builder's
/// current endianness default. Clone is cheap-ish (an `Arc`-backed closure
/// per predicate option, a `Vec<Node>` otherwise) and required because a
/// `Schema` may be both registered as an alias and nested inline elsewhere.
#[derive(Clone)]
pub struct Schema {
    pub(crate) nodes: Vec<Node>,
    pub(crate) alias: Option<String>,
    pub(crate) default_endian: Endian,
    pub(crate) constructor: Option<Arc<dyn Fn(Record) -> Record + Send + Sync>>,
}

impl Schema {
    /// Starts a new root schema. Only a schema returned by `start` is valid
    /// as a root for `parse`/`encode`/`size_of`; schemas produced by
    /// chaining off it are intermediate chain states, not separate roots.
    pub fn start() -> Self {
        Schema {
            nodes: Vec::new(),
            alias: None,
            default_endian: Endian::Big,
            constructor: None,
        }
    }

    /// Switches the default endianness used by endian-neutral primitive
    /// methods (and by bit-run extraction order) from this point forward in
    /// the chain (spec.md §3 "Endianness").
    pub fn endianness(mut self, endian: Endian) -> Self {
        self.default_endian = endian;
        self
    }

    /// Registers this schema under `name` in the process-wide alias
    /// registry (write-last-wins) and stamps its own alias name, enabling
    /// forward and recursive references by name (spec.md §4.B, §4.C).
    pub fn namely(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.alias = Some(name.clone());
        crate::alias::register(name, self.clone());
        self
    }

    /// Installs a constructor applied to the fully decoded root record
    /// before it is returned from `parse` (spec.md §3 "optionally an
    /// instance of a user-supplied record constructor for the root").
    pub fn create(mut self, ctor: impl Fn(Record) -> Record + Send + Sync + 'static) -> Self {
        self.constructor = Some(Arc::new(ctor));
        self
    }

    fn push(mut self, name: impl Into<String>, kind: NodeKind, endian: Endian, options: Options) -> Self {
        self.nodes.push(Node {
            name: name.into(),
            kind,
            endian,
            options,
            seek_delta_bits: 0,
        });
        self
    }

    fn push_primitive(self, name: impl Into<String>, primitive: Primitive, endian: Endian, options: Options) -> Self {
        self.push(name, NodeKind::Primitive(primitive), endian, options)
    }

    /// Runs every build-time check spec.md §4.B enumerates, recursing into
    /// inline nested/choice/array-element schemas. Called lazily by
    /// `parse`/`encode`/`size_of`, and exposed directly for callers who want
    /// to fail before holding any input bytes.
    pub fn validate(&self) -> Result<(), BuildError> {
        for node in &self.nodes {
            validate_node(node)?;
        }
        Ok(())
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<Record, DecodeError> {
        self.validate().map_err(|_| DecodeError::ArgumentError)?;
        crate::alias::validate_references(self)?;
        let mut record = decode::decode_root(self, bytes)?;
        if let Some(ctor) = &self.constructor {
            record = ctor(record);
        }
        Ok(record)
    }

    pub fn encode(&self, record: &Record) -> Result<Vec<u8>, EncodeError> {
        self.validate()
            .map_err(|_| EncodeError::ArgumentError)?;
        encode::encode_root(self, record)
    }

    pub fn size_of(&self) -> SizeHint {
        size::size_of(self)
    }

    // ---- string / buffer / array / choice / nest / seek / pointer / saveOffset ----

    pub fn string(self, name: impl Into<String>, options: Options) -> Self {
        self.push(name, NodeKind::String, self.default_endian, options)
    }

    pub fn buffer(self, name: impl Into<String>, options: Options) -> Self {
        self.push(name, NodeKind::Buffer, self.default_endian, options)
    }

    pub fn array(self, name: impl Into<String>, options: Options) -> Self {
        self.push(name, NodeKind::Array, self.default_endian, options)
    }

    pub fn choice(self, name: impl Into<String>, options: Options) -> Self {
        self.push(name, NodeKind::Choice, self.default_endian, options)
    }

    pub fn nest(self, name: impl Into<String>, options: Options) -> Self {
        self.push(name, NodeKind::Nest, self.default_endian, options)
    }

    /// Convenience for `.nest(name, Options::new().ty(TypeRef::Alias(alias)))`.
    pub fn nest_alias(self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        let options = Options::new().ty(TypeRef::Alias(alias.into()));
        self.nest(name, options)
    }

    /// Nests an inline schema directly into the parent record (no `varName`,
    /// spec.md §4.B "if `type` is an inline Schema, `varName` may be
    /// omitted (merges into parent)").
    pub fn merge(self, inline: Schema) -> Self {
        let options = Options::new().ty(TypeRef::Inline(Box::new(inline)));
        self.push("", NodeKind::Nest, self.default_endian, options)
    }

    /// Advances (or, with a negative delta, rewinds) the cursor by
    /// `delta_bits` without consuming a named field (spec.md §4.D `seek`).
    pub fn seek(mut self, delta_bits: i64) -> Self {
        self.nodes.push(Node {
            name: String::new(),
            kind: NodeKind::Seek,
            endian: self.default_endian,
            options: Options::default(),
            seek_delta_bits: delta_bits,
        });
        self
    }

    /// Alias for [`Schema::seek`] with a byte-granularity delta, matching
    /// spec.md §4.B's `seek`/`skip` naming.
    pub fn skip(self, delta_bytes: i64) -> Self {
        self.seek(delta_bytes * 8)
    }

    pub fn pointer(self, name: impl Into<String>, options: Options) -> Self {
        self.push(name, NodeKind::Pointer, self.default_endian, options)
    }

    pub fn save_offset(self, name: impl Into<String>) -> Self {
        self.push(name, NodeKind::SaveOffset, self.default_endian, Options::default())
    }
}

fn validate_node(node: &Node) -> Result<(), BuildError> {
    match &node.kind {
        NodeKind::String => validate_string(node),
        NodeKind::Buffer => validate_buffer(node),
        NodeKind::Array => validate_array(node),
        NodeKind::Choice => validate_choice(node),
        NodeKind::Nest => validate_nest(node),
        NodeKind::Pointer => validate_pointer(node),
        NodeKind::Seek => validate_seek(node),
        // Native `u64`/`i64` already satisfy spec.md's "64-bit integer kinds
        // require large-integer support from the host" — nothing to check.
        NodeKind::Primitive(_) | NodeKind::Bit(_) | NodeKind::SaveOffset | NodeKind::Empty => Ok(()),
    }?;

    if let Some(TypeRef::Inline(inline)) = &node.options.ty {
        inline.validate()?;
    }
    if let Some(choices) = &node.options.choices {
        for ty in choices.values() {
            if let TypeRef::Inline(inline) = ty {
                inline.validate()?;
            }
        }
    }
    if let Some(TypeRef::Inline(inline)) = &node.options.default_choice {
        inline.validate()?;
    }
    Ok(())
}

fn validate_string(node: &Node) -> Result<(), BuildError> {
    let o = &node.options;
    let valid_shape = matches!(
        (o.length.is_some(), o.zero_terminated.is_some(), o.greedy.is_some()),
        (true, true, false) | (true, false, false) | (false, true, false) | (false, false, true)
    );
    if !valid_shape {
        return Err(BuildError::InvalidStringOptions);
    }

    if o.strip_null == Some(true) && o.length.is_none() && o.greedy != Some(true) {
        return Err(BuildError::InvalidStringOptions);
    }

    Ok(())
}

fn validate_buffer(node: &Node) -> Result<(), BuildError> {
    let o = &node.options;
    match (o.length.is_some(), o.read_until.is_some()) {
        (true, false) | (false, true) => Ok(()),
        _ => Err(BuildError::InvalidBufferOptions),
    }
}

fn validate_array(node: &Node) -> Result<(), BuildError> {
    let o = &node.options;
    let mode_count = [o.length.is_some(), o.length_in_bytes.is_some(), o.read_until.is_some()]
        .iter()
        .filter(|v| **v)
        .count();

    if mode_count != 1 || o.ty.is_none() {
        return Err(BuildError::InvalidArrayOptions);
    }
    Ok(())
}

fn validate_choice(node: &Node) -> Result<(), BuildError> {
    let o = &node.options;
    if o.tag.is_none() || o.choices.is_none() {
        return Err(BuildError::InvalidChoiceOptions);
    }
    Ok(())
}

fn validate_nest(node: &Node) -> Result<(), BuildError> {
    if node.options.ty.is_none() {
        return Err(BuildError::InvalidNestOptions);
    }
    Ok(())
}

fn validate_pointer(node: &Node) -> Result<(), BuildError> {
    let o = &node.options;
    if o.offset.is_none() || o.ty.is_none() {
        return Err(BuildError::InvalidPointerOptions);
    }
    Ok(())
}

fn validate_seek(node: &Node) -> Result<(), BuildError> {
    if matches!(node.options.assert, Some(Assert::Int(_) | Assert::Text(_) | Assert::Predicate(_))) {
        return Err(BuildError::SeekForbidsAssert);
    }
    Ok(())
}

/// Looks up a string `type` name against the catalog, falling back to
/// treating it as an alias reference — forward/not-yet-registered alias
/// names are legal (spec.md §4.C), so this never itself fails; an
/// `UnknownAlias` only surfaces at plan/decode/encode time.
pub fn resolve_type_name(name: &str, default_endian: Endian) -> TypeRef {
    match Primitive::from_name(name) {
        Some((primitive, Some(endian))) => TypeRef::Primitive(primitive, endian),
        Some((primitive, None)) => TypeRef::Primitive(primitive, default_endian),
        None => TypeRef::Alias(name.to_string()),
    }
}

macro_rules! primitive_method {
    ($neutral:ident, $primitive:expr) => {
        pub fn $neutral(self, name: impl Into<String>) -> Self {
            let endian = self.default_endian;
            self.push_primitive(name, $primitive, endian, Options::default())
        }
    };
}

macro_rules! primitive_method_endian {
    ($neutral:ident, $be:ident, $le:ident, $primitive:expr) => {
        primitive_method!($neutral, $primitive);

        pub fn $be(self, name: impl Into<String>) -> Self {
            self.push_primitive(name, $primitive, Endian::Big, Options::default())
        }

        pub fn $le(self, name: impl Into<String>) -> Self {
            self.push_primitive(name, $primitive, Endian::Little, Options::default())
        }
    };
}

macro_rules! bit_method {
    ($name:ident, $width:expr) => {
        pub fn $name(self, name: impl Into<String>) -> Self {
            let endian = self.default_endian;
            self.push(name, NodeKind::Bit($width), endian, Options::default())
        }
    };
}

impl Schema {
    primitive_method!(uint8, Primitive::Uint8);
    primitive_method!(int8, Primitive::Int8);
    primitive_method_endian!(uint16, uint16be, uint16le, Primitive::Uint16);
    primitive_method_endian!(int16, int16be, int16le, Primitive::Int16);
    primitive_method_endian!(uint24, uint24be, uint24le, Primitive::Uint24);
    primitive_method_endian!(int24, int24be, int24le, Primitive::Int24);
    primitive_method_endian!(uint32, uint32be, uint32le, Primitive::Uint32);
    primitive_method_endian!(int32, int32be, int32le, Primitive::Int32);
    primitive_method_endian!(uint64, uint64be, uint64le, Primitive::Uint64);
    primitive_method_endian!(int64, int64be, int64le, Primitive::Int64);
    primitive_method_endian!(float, floatbe, floatle, Primitive::Float);
    primitive_method_endian!(double, doublebe, doublele, Primitive::Double);

    bit_method!(bit1, 1);
    bit_method!(bit2, 2);
    bit_method!(bit3, 3);
    bit_method!(bit4, 4);
    bit_method!(bit5, 5);
    bit_method!(bit6, 6);
    bit_method!(bit7, 7);
    bit_method!(bit8, 8);
    bit_method!(bit9, 9);
    bit_method!(bit10, 10);
    bit_method!(bit11, 11);
    bit_method!(bit12, 12);
    bit_method!(bit13, 13);
    bit_method!(bit14, 14);
    bit_method!(bit15, 15);
    bit_method!(bit16, 16);
    bit_method!(bit17, 17);
    bit_method!(bit18, 18);
    bit_method!(bit19, 19);
    bit_method!(bit20, 20);
    bit_method!(bit21, 21);
    bit_method!(bit22, 22);
    bit_method!(bit23, 23);
    bit_method!(bit24, 24);
    bit_method!(bit25, 25);
    bit_method!(bit26, 26);
    bit_method!(bit27, 27);
    bit_method!(bit28, 28);
    bit_method!(bit29, 29);
    bit_method!(bit30, 30);
    bit_method!(bit31, 31);
    bit_method!(bit32, 32);
}

/// Builds a `BTreeMap<i64, TypeRef>` for `choice`'s `choices` option from
/// `(discriminator, type-name-or-alias)` pairs, resolving catalog names the
/// same way [`resolve_type_name`] does.
pub fn choices_by_name<const N: usize>(
    default_endian: Endian,
    entries: [(i64, &str); N],
) -> BTreeMap<i64, TypeRef> {
    entries
        .into_iter()
        .map(|(tag, name)| (tag, resolve_type_name(name, default_endian)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_uint16be_is_valid() {
        let schema = Schema::start().uint16be("n");
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn string_requires_one_valid_shape() {
        let bad = Schema::start().string("s", Options::new());
        assert_eq!(bad.validate(), Err(BuildError::InvalidStringOptions));

        let ok = Schema::start().string("s", Options::new().length(5));
        assert!(ok.validate().is_ok());

        let ok2 = Schema::start().string("s", Options::new().length(5).zero_terminated(true));
        assert!(ok2.validate().is_ok());
    }

    #[test]
    fn buffer_requires_length_xor_read_until() {
        let bad = Schema::start().buffer("b", Options::new());
        assert_eq!(bad.validate(), Err(BuildError::InvalidBufferOptions));

        let ok = Schema::start().buffer("b", Options::new().length(4));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn array_requires_exactly_one_length_mode_and_a_type() {
        let bad = Schema::start().array(
            "a",
            Options::new().length(2).length_in_bytes(4).ty(TypeRef::Primitive(Primitive::Uint8, Endian::Big)),
        );
        assert_eq!(bad.validate(), Err(BuildError::InvalidArrayOptions));

        let ok = Schema::start().array(
            "a",
            Options::new().length(2).ty(TypeRef::Primitive(Primitive::Uint8, Endian::Big)),
        );
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn seek_rejects_assert_option() {
        let mut schema = Schema::start();
        schema = schema.seek(8);
        schema.nodes.last_mut().unwrap().options = Options::new().assert_eq_int(1);
        assert_eq!(schema.validate(), Err(BuildError::SeekForbidsAssert));
    }

    #[test]
    fn resolve_type_name_falls_back_to_alias() {
        assert!(matches!(
            resolve_type_name("uint16le", Endian::Big),
            TypeRef::Primitive(Primitive::Uint16, Endian::Little)
        ));
        assert!(matches!(resolve_type_name("my-custom-type", Endian::Big), TypeRef::Alias(_)));
    }
}
