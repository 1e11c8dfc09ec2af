//! IR types and their storage sizes.

use core::fmt;
use std::sync::Arc;

/// Floating point precision of a [`Type::Float`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "lowercase")]
pub enum FloatKind {
    /// 16-bit IEEE-754 binary16.
    Half,
    /// 32-bit IEEE-754 binary32.
    Single,
    /// 64-bit IEEE-754 binary64.
    Double,
}

impl FloatKind {
    /// Storage size of a value of this precision.
    pub const fn size_in_bytes(self) -> u64 {
        match self {
            FloatKind::Half => 2,
            FloatKind::Single => 4,
            FloatKind::Double => 8,
        }
    }
}

/// A first-class IR type.
///
/// Types are cheap to clone; aggregate payloads are shared behind [`Arc`].
/// Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    /// The type of instructions that produce no value.
    Void,
    /// Integer of the given bit width. Widths are limited to `1..=64`; the
    /// builder rejects anything wider.
    Int(u32),
    /// IEEE-754 floating point value.
    Float(FloatKind),
    /// Pointer to a value of the pointee type.
    Ptr(Arc<Type>),
    /// Fixed-length array.
    Array {
        /// Element type.
        elem: Arc<Type>,
        /// Number of elements.
        len: u64,
    },
    /// Fixed-length SIMD vector. Identical layout to [`Type::Array`]; kept
    /// separate so vector instructions can insist on it.
    Vector {
        /// Element type.
        elem: Arc<Type>,
        /// Number of lanes.
        len: u64,
    },
    /// Structure with the given field types. Layout is packed: a field's
    /// offset is the sum of the sizes of the fields before it.
    Struct(Arc<Vec<Type>>),
}

/// Byte width of a pointer on the analyzed target.
pub(crate) const POINTER_SIZE: u64 = 8;

impl Type {
    /// 1-bit integer (booleans, comparison results).
    pub fn i1() -> Self {
        Type::Int(1)
    }

    /// 8-bit integer.
    pub fn i8() -> Self {
        Type::Int(8)
    }

    /// 16-bit integer.
    pub fn i16() -> Self {
        Type::Int(16)
    }

    /// 32-bit integer.
    pub fn i32() -> Self {
        Type::Int(32)
    }

    /// 64-bit integer.
    pub fn i64() -> Self {
        Type::Int(64)
    }

    /// 32-bit float.
    pub fn f32() -> Self {
        Type::Float(FloatKind::Single)
    }

    /// 64-bit float.
    pub fn f64() -> Self {
        Type::Float(FloatKind::Double)
    }

    /// Pointer to `pointee`.
    pub fn ptr(pointee: Type) -> Self {
        Type::Ptr(Arc::new(pointee))
    }

    /// Array of `len` elements of type `elem`.
    pub fn array(elem: Type, len: u64) -> Self {
        Type::Array {
            elem: Arc::new(elem),
            len,
        }
    }

    /// Vector of `len` lanes of type `elem`.
    pub fn vector(elem: Type, len: u64) -> Self {
        Type::Vector {
            elem: Arc::new(elem),
            len,
        }
    }

    /// Structure with the given fields.
    pub fn structure(fields: Vec<Type>) -> Self {
        Type::Struct(Arc::new(fields))
    }

    /// Whether this is the void type.
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Integer bit width, if this is an integer type.
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    /// Float precision, if this is a float type.
    pub fn float_kind(&self) -> Option<FloatKind> {
        match self {
            Type::Float(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Pointee type, if this is a pointer.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Ptr(pointee) => Some(pointee),
            _ => None,
        }
    }

    /// Element type of an array or vector.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array { elem, .. } | Type::Vector { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// Length of an array or vector.
    pub fn sequence_len(&self) -> Option<u64> {
        match self {
            Type::Array { len, .. } | Type::Vector { len, .. } => Some(*len),
            _ => None,
        }
    }

    /// Field types of a structure.
    pub fn fields(&self) -> Option<&[Type]> {
        match self {
            Type::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Whether this is an array or vector type.
    pub fn is_sequential(&self) -> bool {
        matches!(self, Type::Array { .. } | Type::Vector { .. })
    }

    /// Whether values of this type occupy more than one scalar slot.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Type::Array { .. } | Type::Vector { .. } | Type::Struct(_)
        )
    }

    /// Storage size of a value of this type, in bytes.
    ///
    /// Integers round up to whole bytes and structures are packed. The
    /// interpreter only requires sizing to be internally consistent with its
    /// own `getelementptr` lowering, so no alignment padding is modeled.
    pub fn size_in_bytes(&self) -> u64 {
        match self {
            Type::Void => 0,
            Type::Int(bits) => u64::from((bits + 7) / 8),
            Type::Float(kind) => kind.size_in_bytes(),
            Type::Ptr(_) => POINTER_SIZE,
            Type::Array { elem, len } | Type::Vector { elem, len } => {
                elem.size_in_bytes().saturating_mul(*len)
            }
            Type::Struct(fields) => fields.iter().map(Type::size_in_bytes).sum(),
        }
    }

    /// Byte offset of struct field `index` under the packed layout.
    ///
    /// Returns `None` if this is not a struct or the index is out of range.
    pub fn field_offset(&self, index: usize) -> Option<u64> {
        let fields = self.fields()?;
        if index >= fields.len() {
            return None;
        }

        Some(fields[..index].iter().map(Type::size_in_bytes).sum())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Float(FloatKind::Half) => write!(f, "f16"),
            Type::Float(FloatKind::Single) => write!(f, "f32"),
            Type::Float(FloatKind::Double) => write!(f, "f64"),
            Type::Ptr(pointee) => write!(f, "{pointee}*"),
            Type::Array { elem, len } => write!(f, "[{len} x {elem}]"),
            Type::Vector { elem, len } => write!(f, "<{len} x {elem}>"),
            Type::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Type::i1(), 1)]
    #[test_case(Type::Int(9), 2)]
    #[test_case(Type::i64(), 8)]
    #[test_case(Type::f32(), 4)]
    #[test_case(Type::ptr(Type::i8()), 8)]
    #[test_case(Type::array(Type::i32(), 5), 20)]
    #[test_case(Type::structure(vec![Type::i8(), Type::i32()]), 5)]
    fn sizes(ty: Type, expected: u64) {
        assert_eq!(ty.size_in_bytes(), expected);
    }

    #[test]
    fn field_offsets_are_packed() {
        let ty = Type::structure(vec![Type::i8(), Type::i32(), Type::i64()]);
        assert_eq!(ty.field_offset(0), Some(0));
        assert_eq!(ty.field_offset(1), Some(1));
        assert_eq!(ty.field_offset(2), Some(5));
        assert_eq!(ty.field_offset(3), None);
    }

    #[test]
    fn display_is_compact() {
        let ty = Type::structure(vec![Type::i8(), Type::array(Type::f64(), 3)]);
        assert_eq!(ty.to_string(), "{i8, [3 x f64]}");
        assert_eq!(Type::ptr(Type::i32()).to_string(), "i32*");
    }
}
