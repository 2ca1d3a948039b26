//! Field catalog: the fixed set of primitive kinds a [`crate::schema::Schema`]
//! can be built from, plus their widths and endianness.

use crate::node::Endian;

/// A primitive numeric kind: width in bytes, signedness, and float-ness.
///
/// Endian-neutral kinds (`Uint16` rather than `Uint16Be`/`Uint16Le`) resolve
/// their direction from the schema's current default at build time; see
/// [`crate::schema::Schema::endianness`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint24,
    Int24,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float,
    Double,
}

impl Primitive {
    /// Width of the primitive in bytes.
    pub const fn width_bytes(self) -> usize {
        match self {
            Primitive::Uint8 | Primitive::Int8 => 1,
            Primitive::Uint16 | Primitive::Int16 => 2,
            Primitive::Uint24 | Primitive::Int24 => 3,
            Primitive::Uint32 | Primitive::Int32 => 4,
            Primitive::Uint64 | Primitive::Int64 => 8,
            Primitive::Float => 4,
            Primitive::Double => 8,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::Int8 | Primitive::Int16 | Primitive::Int24 | Primitive::Int32 | Primitive::Int64
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Primitive::Float | Primitive::Double)
    }

    /// Parses a catalog kind name such as `"uint16le"` or `"doublebe"`, as
    /// used wherever the spec allows a string `type` option to name a
    /// primitive kind. Returns `None` for names that aren't catalog kinds
    /// (the caller then tries the alias registry).
    pub fn from_name(name: &str) -> Option<(Primitive, Option<Endian>)> {
        let (base, endian) = if let Some(stripped) = name.strip_suffix("be") {
            (stripped, Some(Endian::Big))
        } else if let Some(stripped) = name.strip_suffix("le") {
            (stripped, Some(Endian::Little))
        } else {
            (name, None)
        };

        let primitive = match base {
            "uint8" => Primitive::Uint8,
            "int8" => Primitive::Int8,
            "uint16" => Primitive::Uint16,
            "int16" => Primitive::Int16,
            "uint24" => Primitive::Uint24,
            "int24" => Primitive::Int24,
            "uint32" => Primitive::Uint32,
            "int32" => Primitive::Int32,
            "uint64" => Primitive::Uint64,
            "int64" => Primitive::Int64,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            _ => return None,
        };

        // 8-bit kinds have no endian suffix variants; reject "uint8be".
        if primitive.width_bytes() == 1 && endian.is_some() {
            return None;
        }

        Some((primitive, endian))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_endian_suffixes() {
        assert_eq!(
            Primitive::from_name("uint16le"),
            Some((Primitive::Uint16, Some(Endian::Little)))
        );
        assert_eq!(
            Primitive::from_name("doublebe"),
            Some((Primitive::Double, Some(Endian::Big)))
        );
    }

    #[test]
    fn rejects_uint8_with_endian_suffix() {
        assert_eq!(Primitive::from_name("uint8be"), None);
    }

    #[test]
    fn rejects_unknown_name() {
        assert_eq!(Primitive::from_name("nonsense"), None);
    }

    #[test]
    fn widths_are_correct() {
        assert_eq!(Primitive::Uint24.width_bytes(), 3);
        assert_eq!(Primitive::Double.width_bytes(), 8);
        assert!(Primitive::Float.is_float());
        assert!(Primitive::Int32.is_signed());
    }
}
