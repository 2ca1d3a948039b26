//! The decoded value tree: what `parse` produces and `encode` consumes.
//!
//! Generalizes the teacher's `assembly::Value` (`I64`/`U64`/`Array`) into the
//! full tree spec.md §3 describes: numbers, text, byte buffers, nested
//! records, ordered sequences, and key-dictionaries.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A decoded field value, or a value about to be encoded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Record(Record),
    Seq(Vec<Value>),
    /// Decode-only: an `array` field with a `key` option produces this
    /// instead of a `Seq`. Keyed by the stringified subfield value so the
    /// map stays `Ord`-able without requiring `Value` itself to be hashable
    /// in a float-safe way.
    Dict(BTreeMap<String, Value>),
}

/// A nested mapping from field name to value; the output of a decode and
/// the input to an encode. `BTreeMap` for deterministic iteration, matching
/// the teacher's `Schema::parse` return type.
pub type Record = BTreeMap<String, Value>;

impl Value {
    /// Best-effort conversion to `i64`, used when late-bound options read a
    /// sibling field as an integer (`length: "n"`, `tag: "kind"`, ...).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::U64(v) => i64::try_from(*v).ok(),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|v| usize::try_from(v).ok())
    }

    /// Renders a value for error messages (`AssertFailed`'s payload).
    pub fn describe(&self) -> String {
        match self {
            Value::U64(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::F32(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::Text(v) => format!("{v:?}"),
            Value::Bytes(v) => format!("{v:?}"),
            Value::Record(_) => "<record>".to_string(),
            Value::Seq(v) => format!("<seq len={}>", v.len()),
            Value::Dict(v) => format!("<dict len={}>", v.len()),
        }
    }
}

/// Character encoding for decoding byte buffers to/from text. Mirrors the
/// teacher's `transform::Encoding`, extended with a by-name passthrough for
/// encodings beyond UTF-8/ASCII (spec.md §3 `encoding` option, §6 Encoding
/// contract: "additional encodings passed through by name").
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Encoding {
    Utf8,
    Ascii,
    Named(String),
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Utf8
    }
}

impl Encoding {
    pub fn decode(&self, bytes: &[u8]) -> Result<String, crate::error::DecodeError> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|_| crate::error::DecodeError::UnsupportedEncoding("utf8".to_string())),
            Encoding::Ascii => {
                for b in bytes {
                    if *b > 0x7F {
                        return Err(crate::error::DecodeError::UnsupportedEncoding("ascii".to_string()));
                    }
                }
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| crate::error::DecodeError::UnsupportedEncoding("ascii".to_string()))
            }
            Encoding::Named(name) => Err(crate::error::DecodeError::UnsupportedEncoding(name.clone())),
        }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>, crate::error::EncodeError> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Ascii => {
                if text.bytes().any(|b| b > 0x7F) {
                    return Err(crate::error::EncodeError::UnsupportedEncoding("ascii".to_string()));
                }
                Ok(text.as_bytes().to_vec())
            }
            Encoding::Named(name) => Err(crate::error::EncodeError::UnsupportedEncoding(name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_i64_widens_u64() {
        assert_eq!(Value::U64(9).as_i64(), Some(9));
        assert_eq!(Value::I64(-3).as_i64(), Some(-3));
        assert_eq!(Value::Text("x".into()).as_i64(), None);
    }

    #[test]
    fn ascii_rejects_high_bytes() {
        assert!(Encoding::Ascii.decode(&[0xFF]).is_err());
        assert_eq!(Encoding::Ascii.decode(&[b'h', b'i']).unwrap(), "hi");
    }

    #[test]
    fn utf8_round_trips() {
        let bytes = Encoding::Utf8.encode("héllo").unwrap();
        assert_eq!(Encoding::Utf8.decode(&bytes).unwrap(), "héllo");
    }
}
