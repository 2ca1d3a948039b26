//! The per-node options record (spec.md §3 "Options record") and the
//! late-bound value/predicate types it is built from.

use std::fmt;
use std::sync::Arc;

use crate::error::{DecodeError, EncodeError};
use crate::node::TypeRef;
use crate::value::{Encoding, Record, Value};

/// An option whose value is either known at build time, named as a sibling
/// field to look up in the current record, or computed by a predicate over
/// the current record. See spec.md "Late-bound option" in the glossary.
#[derive(Clone)]
pub enum LateBound<T> {
    Literal(T),
    Field(String),
    Predicate(Arc<dyn Fn(&Record) -> T + Send + Sync>),
}

impl<T: fmt::Debug> fmt::Debug for LateBound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LateBound::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            LateBound::Field(name) => f.debug_tuple("Field").field(name).finish(),
            LateBound::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl<T> From<T> for LateBound<T> {
    fn from(value: T) -> Self {
        LateBound::Literal(value)
    }
}

/// Looks up a dotted field path in `record`, descending into nested
/// `Value::Record`s one path segment at a time.
pub fn lookup_field<'a>(record: &'a Record, dotted_name: &str) -> Option<&'a Value> {
    let mut segments = dotted_name.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;

    for segment in segments {
        match current {
            Value::Record(r) => current = r.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

impl LateBound<usize> {
    pub fn resolve(&self, record: &Record) -> Option<usize> {
        match self {
            LateBound::Literal(v) => Some(*v),
            LateBound::Field(name) => lookup_field(record, name).and_then(Value::as_usize),
            LateBound::Predicate(f) => {
                // Predicates computing usize take the partial record by
                // reference and return the value directly (no Option: a
                // late-bound usize predicate cannot fail short of a panic).
                Some(f(record))
            }
        }
    }
}

impl LateBound<i64> {
    pub fn resolve(&self, record: &Record) -> Option<i64> {
        match self {
            LateBound::Literal(v) => Some(*v),
            LateBound::Field(name) => lookup_field(record, name).and_then(Value::as_i64),
            LateBound::Predicate(f) => Some(f(record)),
        }
    }
}

/// Side that padding characters are inserted on when a fixed-length string
/// is shorter than its declared `length` (spec.md §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingSide {
    Left,
    Right,
}

impl Default for PaddingSide {
    fn default() -> Self {
        PaddingSide::Right
    }
}

/// `readUntil`'s two decode-time forms (spec.md §3, §4.D).
#[derive(Clone)]
pub enum ReadUntil {
    Eof,
    /// `(item, remaining_or_sink_bytes) -> bool`. Called with the
    /// just-decoded item and the remaining input slice during decode, or
    /// with the just-encoded item and a snapshot of the sink-so-far during
    /// encode (spec.md §4.E array termination; §6 predicate contract).
    Predicate(Arc<dyn Fn(&Value, &[u8]) -> bool + Send + Sync>),
}

impl fmt::Debug for ReadUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadUntil::Eof => f.write_str("Eof"),
            ReadUntil::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

pub type EncodeUntil = Arc<dyn Fn(&Value, &Record) -> bool + Send + Sync>;
pub type Formatter = Arc<dyn Fn(&Value, &[u8], usize) -> Value + Send + Sync>;
pub type EncoderFn = Arc<dyn Fn(&Value, &Record) -> Value + Send + Sync>;
pub type AssertPredicate = Arc<dyn Fn(&Record, &Value) -> bool + Send + Sync>;

/// A literal or predicate assertion (spec.md §3 `assert`).
#[derive(Clone)]
pub enum Assert {
    Int(i64),
    Text(String),
    Predicate(AssertPredicate),
}

impl fmt::Debug for Assert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assert::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Assert::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Assert::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl Assert {
    /// Evaluates the assertion against a just-decoded/about-to-be-encoded
    /// value. `record` is the enclosing partial record, passed as `this` to
    /// a predicate assertion per spec.md §4.D.
    pub fn check(&self, record: &Record, value: &Value) -> bool {
        match self {
            Assert::Int(expected) => value.as_i64() == Some(*expected),
            Assert::Text(expected) => matches!(value, Value::Text(t) if t == expected),
            Assert::Predicate(f) => f(record, value),
        }
    }
}

/// Every option spec.md §3 enumerates. Any subset is valid depending on the
/// node kind; [`crate::schema::Schema`]'s builder methods validate the
/// combination at build time.
#[derive(Clone, Default)]
pub struct Options {
    pub length: Option<LateBound<usize>>,
    pub length_in_bytes: Option<LateBound<usize>>,
    pub zero_terminated: Option<bool>,
    pub greedy: Option<bool>,
    pub strip_null: Option<bool>,
    pub trim: Option<bool>,
    pub encoding: Option<Encoding>,
    pub read_until: Option<ReadUntil>,
    pub encode_until: Option<EncodeUntil>,
    pub ty: Option<TypeRef>,
    pub key: Option<String>,
    pub tag: Option<LateBound<i64>>,
    pub choices: Option<std::collections::BTreeMap<i64, TypeRef>>,
    pub default_choice: Option<TypeRef>,
    pub offset: Option<LateBound<usize>>,
    pub formatter: Option<Formatter>,
    pub encoder: Option<EncoderFn>,
    pub assert: Option<Assert>,
    pub padd: Option<u8>,
    pub padding: Option<PaddingSide>,
    pub clone_buffer: Option<bool>,
    pub smart_buffer_size: Option<usize>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("length", &self.length)
            .field("length_in_bytes", &self.length_in_bytes)
            .field("zero_terminated", &self.zero_terminated)
            .field("greedy", &self.greedy)
            .field("strip_null", &self.strip_null)
            .field("trim", &self.trim)
            .field("encoding", &self.encoding)
            .field("read_until", &self.read_until)
            .field("has_encode_until", &self.encode_until.is_some())
            .field("ty", &self.ty)
            .field("key", &self.key)
            .field("tag", &self.tag)
            .field("choices", &self.choices)
            .field("default_choice", &self.default_choice)
            .field("offset", &self.offset)
            .field("has_formatter", &self.formatter.is_some())
            .field("has_encoder", &self.encoder.is_some())
            .field("assert", &self.assert)
            .field("padd", &self.padd)
            .field("padding", &self.padding)
            .field("clone_buffer", &self.clone_buffer)
            .field("smart_buffer_size", &self.smart_buffer_size)
            .finish()
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn padd_char(&self) -> u8 {
        self.padd.unwrap_or(b' ')
    }

    pub fn padding_side(&self) -> PaddingSide {
        self.padding.unwrap_or_default()
    }

    pub fn length(mut self, length: impl Into<LateBound<usize>>) -> Self {
        self.length = Some(length.into());
        self
    }

    pub fn length_field(mut self, name: impl Into<String>) -> Self {
        self.length = Some(LateBound::Field(name.into()));
        self
    }

    pub fn length_in_bytes(mut self, length: impl Into<LateBound<usize>>) -> Self {
        self.length_in_bytes = Some(length.into());
        self
    }

    pub fn zero_terminated(mut self, value: bool) -> Self {
        self.zero_terminated = Some(value);
        self
    }

    pub fn greedy(mut self, value: bool) -> Self {
        self.greedy = Some(value);
        self
    }

    pub fn strip_null(mut self, value: bool) -> Self {
        self.strip_null = Some(value);
        self
    }

    pub fn trim(mut self, value: bool) -> Self {
        self.trim = Some(value);
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn read_until_eof(mut self) -> Self {
        self.read_until = Some(ReadUntil::Eof);
        self
    }

    pub fn read_until(mut self, pred: impl Fn(&Value, &[u8]) -> bool + Send + Sync + 'static) -> Self {
        self.read_until = Some(ReadUntil::Predicate(Arc::new(pred)));
        self
    }

    pub fn encode_until(mut self, pred: impl Fn(&Value, &Record) -> bool + Send + Sync + 'static) -> Self {
        self.encode_until = Some(Arc::new(pred));
        self
    }

    pub fn ty(mut self, ty: TypeRef) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn key(mut self, name: impl Into<String>) -> Self {
        self.key = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<LateBound<i64>>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn tag_field(mut self, name: impl Into<String>) -> Self {
        self.tag = Some(LateBound::Field(name.into()));
        self
    }

    pub fn choices(mut self, choices: std::collections::BTreeMap<i64, TypeRef>) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn default_choice(mut self, ty: TypeRef) -> Self {
        self.default_choice = Some(ty);
        self
    }

    pub fn offset(mut self, offset: impl Into<LateBound<usize>>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    pub fn formatter(mut self, f: impl Fn(&Value, &[u8], usize) -> Value + Send + Sync + 'static) -> Self {
        self.formatter = Some(Arc::new(f));
        self
    }

    pub fn encoder(mut self, f: impl Fn(&Value, &Record) -> Value + Send + Sync + 'static) -> Self {
        self.encoder = Some(Arc::new(f));
        self
    }

    pub fn assert_eq_int(mut self, value: i64) -> Self {
        self.assert = Some(Assert::Int(value));
        self
    }

    pub fn assert_eq_text(mut self, value: impl Into<String>) -> Self {
        self.assert = Some(Assert::Text(value.into()));
        self
    }

    pub fn assert_with(mut self, f: impl Fn(&Record, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.assert = Some(Assert::Predicate(Arc::new(f)));
        self
    }

    pub fn padd(mut self, ch: u8) -> Self {
        self.padd = Some(ch);
        self
    }

    pub fn padding(mut self, side: PaddingSide) -> Self {
        self.padding = Some(side);
        self
    }

    pub fn clone_buffer(mut self, value: bool) -> Self {
        self.clone_buffer = Some(value);
        self
    }

    pub fn smart_buffer_size(mut self, size: usize) -> Self {
        self.smart_buffer_size = Some(size);
        self
    }
}
