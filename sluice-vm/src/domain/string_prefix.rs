//! Known-prefix domain for byte arrays.

use core::fmt;

use sluice_ir::Type;

use crate::{
    apint::ApInt,
    domain::Domain,
};

/// Tracks a byte string known to prefix the array's concrete content, in the
/// C-string sense: the prefix stops at the first byte that is not a known
/// non-NUL constant.
///
/// Only applies to arrays of `i8`; any other element type pins the value at
/// top for its whole lifetime. Top is the empty prefix, so precision can
/// only come from learning leading bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct StringPrefix {
    /// Whether the element type is a byte; permanently top otherwise.
    byte: bool,
    /// Declared array length, used to clamp store offsets.
    len: u64,
    bottom: bool,
    bytes: Vec<u8>,
}

impl StringPrefix {
    /// Bottom value for an array of `len` elements of type `elem`.
    pub fn bottom(elem: &Type, len: u64) -> Self {
        let byte = *elem == Type::i8();
        Self {
            byte,
            len,
            // Non-byte arrays have nothing to track and sit at top.
            bottom: byte,
            bytes: Vec::new(),
        }
    }

    /// Prefix learned from constant element values.
    pub fn from_constant_elements(elem: &Type, len: u64, values: &[Domain]) -> Self {
        let mut prefix = Self::bottom(elem, len);
        if !prefix.byte {
            return prefix;
        }

        prefix.bottom = false;
        for value in values {
            match value.as_singleton() {
                Some(v) if (1..=255).contains(&v.as_u64()) => prefix.bytes.push(v.as_u64() as u8),
                _ => break,
            }
        }
        prefix
    }

    /// The known prefix bytes.
    pub fn prefix(&self) -> &[u8] {
        &self.bytes
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether no value is represented.
    pub const fn is_bottom(&self) -> bool {
        self.bottom
    }

    /// Forget everything.
    pub fn set_bottom(&mut self) {
        if self.byte {
            self.bottom = true;
            self.bytes.clear();
        }
    }

    /// Whether nothing is known (the empty prefix).
    pub fn is_top(&self) -> bool {
        !self.bottom && self.bytes.is_empty()
    }

    /// Forget the prefix.
    pub fn set_top(&mut self) {
        self.bottom = false;
        self.bytes.clear();
    }

    /// Least upper bound: the longest common prefix.
    pub fn join(&mut self, other: &Self) {
        if other.bottom {
            return;
        }
        if self.bottom {
            self.bottom = false;
            self.bytes = other.bytes.clone();
            return;
        }
        let common = self
            .bytes
            .iter()
            .zip(&other.bytes)
            .take_while(|(a, b)| a == b)
            .count();
        self.bytes.truncate(common);
    }

    /// Greatest lower bound: the longer prefix when one extends the other,
    /// bottom when they diverge.
    pub fn meet(&mut self, other: &Self) {
        if self.bottom || other.is_top() {
            return;
        }
        if other.bottom {
            self.set_bottom();
            return;
        }
        if other.bytes.starts_with(&self.bytes) {
            self.bytes = other.bytes.clone();
        } else if !self.bytes.starts_with(&other.bytes) {
            self.set_bottom();
        }
    }

    /// A longer known prefix is the more precise value.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        if self.bottom {
            return true;
        }
        if other.bottom {
            return false;
        }
        self.bytes.starts_with(&other.bytes)
    }

    /// Known fraction of the array.
    pub fn accuracy(&self) -> f32 {
        if self.bottom {
            return 1.0;
        }
        if self.len == 0 {
            return 0.0;
        }
        (self.bytes.len() as f64 / self.len as f64).min(1.0) as f32
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>() + self.bytes.len()
    }

    /// A zeroed array starts with NUL, which the prefix cannot express.
    pub fn set_zero(&mut self) {
        self.set_top();
    }

    // --- Transfer functions ---------------------------------------------

    /// Read one byte out of the known prefix.
    pub fn extract_element(&self, index: &Domain) -> Domain {
        self.read_byte(&Type::i8(), index)
    }

    /// Block-level read.
    pub fn load(&self, ty: &Type, offset: &Domain) -> Domain {
        self.read_byte(ty, offset)
    }

    fn read_byte(&self, ty: &Type, offset: &Domain) -> Domain {
        if self.bottom {
            return Domain::bottom_of(ty);
        }
        if *ty == Type::i8() {
            if let Some(k) = offset.as_singleton() {
                if let Some(&byte) = self.bytes.get(k.as_u64() as usize) {
                    return Domain::int_constant(ApInt::new(8, u64::from(byte)));
                }
            }
        }
        Domain::top_of(ty)
    }

    /// Block-level write: bytes from the written position onward are no
    /// longer known.
    pub fn store(&mut self, _value: &Domain, offset: &Domain) {
        if !self.byte {
            return;
        }
        if self.bottom {
            // Writing into untracked content leaves nothing known.
            self.set_top();
            return;
        }
        self.invalidate_from(offset);
    }

    /// Drop the prefix from the smallest position the index may address.
    pub fn invalidate_from(&mut self, index: &Domain) {
        if !self.byte || self.bottom {
            return;
        }
        let first = index
            .unsigned_min()
            .map(|v| v.as_u64())
            .unwrap_or(0);
        if first < self.bytes.len() as u64 {
            self.bytes.truncate(first as usize);
        }
    }
}

impl fmt::Display for StringPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stringPrefix ")?;
        if self.bottom {
            return write!(f, "bottom");
        }
        if self.bytes.is_empty() {
            return write!(f, "top");
        }
        write!(f, "\"{}\"", String::from_utf8_lossy(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(text: &str) -> StringPrefix {
        let values: Vec<Domain> = text
            .bytes()
            .map(|b| Domain::int_constant(ApInt::new(8, u64::from(b))))
            .collect();
        StringPrefix::from_constant_elements(&Type::i8(), 16, &values)
    }

    fn offset(value: u64) -> Domain {
        Domain::int_constant(ApInt::new(64, value))
    }

    #[test]
    fn join_takes_the_common_prefix() {
        let mut a = prefix("hello world");
        a.join(&prefix("hello there"));
        assert_eq!(a.prefix(), b"hello ");

        let mut b = prefix("abc");
        b.join(&prefix("xyz"));
        assert!(b.is_top());
    }

    #[test]
    fn meet_keeps_the_longer_compatible_prefix() {
        let mut a = prefix("hello");
        a.meet(&prefix("hello world"));
        assert_eq!(a.prefix(), b"hello world");

        let mut b = prefix("hello");
        b.meet(&prefix("help"));
        assert!(b.is_bottom());
    }

    #[test]
    fn order_prefers_longer_prefixes() {
        assert!(prefix("hello world").less_or_equal(&prefix("hello")));
        assert!(!prefix("hello").less_or_equal(&prefix("hello world")));
    }

    #[test]
    fn stores_past_the_prefix_preserve_it() {
        let mut p = prefix("hello");
        p.store(&Domain::top_of(&Type::i8()), &offset(5));
        assert_eq!(p.prefix(), b"hello");
        p.store(&Domain::top_of(&Type::i8()), &offset(6));
        assert_eq!(p.prefix(), b"hello");
    }

    #[test]
    fn stores_inside_the_prefix_truncate_it() {
        let mut p = prefix("hello");
        p.store(&Domain::top_of(&Type::i8()), &offset(2));
        assert_eq!(p.prefix(), b"he");
    }

    #[test]
    fn loads_inside_the_prefix_are_exact() {
        let p = prefix("hi");
        let v = p.load(&Type::i8(), &offset(1));
        assert_eq!(v.as_singleton().unwrap().as_u64(), u64::from(b'i'));
        assert!(p.load(&Type::i8(), &offset(9)).is_top());
    }

    #[test]
    fn non_byte_arrays_stay_top() {
        let p = StringPrefix::bottom(&Type::i32(), 4);
        assert!(p.is_top());
        let mut q = p.clone();
        q.set_bottom();
        assert!(q.is_top());
    }

    #[test]
    fn constants_stop_at_nul() {
        let mut values: Vec<Domain> = b"ab"
            .iter()
            .map(|&b| Domain::int_constant(ApInt::new(8, u64::from(b))))
            .collect();
        values.push(Domain::int_constant(ApInt::new(8, 0)));
        values.push(Domain::int_constant(ApInt::new(8, u64::from(b'c'))));
        let p = StringPrefix::from_constant_elements(&Type::i8(), 4, &values);
        assert_eq!(p.prefix(), b"ab");
    }
}
