//! Known-suffix domain for byte arrays.

use core::fmt;

use sluice_ir::Type;

use crate::{apint::ApInt, domain::Domain};

/// Symmetric counterpart of the prefix domain: tracks a byte string known to
/// end the array's concrete content.
///
/// The order is derived from the suffix lattice itself: a longer known
/// suffix means fewer concrete arrays, so `a ⊑ b` iff `a`'s suffix ends
/// with `b`'s.
#[derive(Debug, Clone, PartialEq)]
pub struct StringSuffix {
    byte: bool,
    len: u64,
    bottom: bool,
    bytes: Vec<u8>,
}

impl StringSuffix {
    /// Bottom value for an array of `len` elements of type `elem`.
    pub fn bottom(elem: &Type, len: u64) -> Self {
        let byte = *elem == Type::i8();
        Self {
            byte,
            len,
            bottom: byte,
            bytes: Vec::new(),
        }
    }

    /// Suffix learned from constant element values.
    pub fn from_constant_elements(elem: &Type, len: u64, values: &[Domain]) -> Self {
        let mut suffix = Self::bottom(elem, len);
        if !suffix.byte {
            return suffix;
        }

        suffix.bottom = false;
        for value in values.iter().rev() {
            match value.as_singleton() {
                Some(v) if (1..=255).contains(&v.as_u64()) => {
                    suffix.bytes.insert(0, v.as_u64() as u8)
                }
                _ => break,
            }
        }
        suffix
    }

    /// The known suffix bytes.
    pub fn suffix(&self) -> &[u8] {
        &self.bytes
    }

    /// First array position covered by the known suffix.
    fn start(&self) -> u64 {
        self.len.saturating_sub(self.bytes.len() as u64)
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

    /// Whether nothing is known (the empty suffix).
    pub fn is_top(&self) -> bool {
        !self.bottom && self.bytes.is_empty()
    }

    /// Forget the suffix.
    pub fn set_top(&mut self) {
        self.bottom = false;
        self.bytes.clear();
    }

    /// Least upper bound: the longest common suffix.
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
            .rev()
            .zip(other.bytes.iter().rev())
            .take_while(|(a, b)| a == b)
            .count();
        self.bytes.drain(..self.bytes.len() - common);
    }

    /// Greatest lower bound: the longer suffix when one ends with the
    /// other, bottom when they diverge.
    pub fn meet(&mut self, other: &Self) {
        if self.bottom || other.is_top() {
            return;
        }
        if other.bottom {
            self.set_bottom();
            return;
        }
        if other.bytes.ends_with(&self.bytes) {
            self.bytes = other.bytes.clone();
        } else if !self.bytes.ends_with(&other.bytes) {
            self.set_bottom();
        }
    }

    /// A longer known suffix is the more precise value.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        if self.bottom {
            return true;
        }
        if other.bottom {
            return false;
        }
        self.bytes.ends_with(&other.bytes)
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

    /// A zeroed array ends with NUL, which the suffix cannot express.
    pub fn set_zero(&mut self) {
        self.set_top();
    }

    // --- Transfer functions ---------------------------------------------

    /// Read one byte out of the known suffix.
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
                let k = k.as_u64();
                if k >= self.start() && k < self.len {
                    let idx = (k - self.start()) as usize;
                    return Domain::int_constant(ApInt::new(8, u64::from(self.bytes[idx])));
                }
            }
        }
        Domain::top_of(ty)
    }

    /// Block-level write: bytes up to the largest position the store may
    /// reach are no longer known.
    pub fn store(&mut self, _value: &Domain, offset: &Domain) {
        if !self.byte {
            return;
        }
        if self.bottom {
            self.set_top();
            return;
        }

        let Some(last) = offset.unsigned_max().map(|v| v.as_u64()) else {
            self.set_top();
            return;
        };
        if let Some(first) = offset.unsigned_min().map(|v| v.as_u64()) {
            if first >= self.len {
                // Every admissible offset is out of bounds; dropped.
                return;
            }
        }

        let last = last.min(self.len.saturating_sub(1));
        if last >= self.start() {
            let cut = (last + 1 - self.start()) as usize;
            if cut >= self.bytes.len() {
                self.set_top();
            } else {
                self.bytes.drain(..cut);
            }
        }
    }
}

impl fmt::Display for StringSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stringSuffix ")?;
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

    fn suffix(text: &str, len: u64) -> StringSuffix {
        let mut pad = vec![Domain::top_of(&Type::i8()); (len as usize).saturating_sub(text.len())];
        pad.extend(
            text.bytes()
                .map(|b| Domain::int_constant(ApInt::new(8, u64::from(b)))),
        );
        StringSuffix::from_constant_elements(&Type::i8(), len, &pad)
    }

    fn offset(value: u64) -> Domain {
        Domain::int_constant(ApInt::new(64, value))
    }

    #[test]
    fn join_takes_the_common_suffix() {
        let mut a = suffix("world", 16);
        a.join(&suffix("hold", 16));
        assert_eq!(a.suffix(), b"ld");

        let mut b = suffix("abc", 16);
        b.join(&suffix("xyz", 16));
        assert!(b.is_top());
    }

    #[test]
    fn meet_keeps_the_longer_compatible_suffix() {
        let mut a = suffix("ld", 16);
        a.meet(&suffix("world", 16));
        assert_eq!(a.suffix(), b"world");

        let mut b = suffix("old", 16);
        b.meet(&suffix("eld", 16));
        assert!(b.is_bottom());
    }

    #[test]
    fn order_prefers_longer_suffixes() {
        assert!(suffix("world", 16).less_or_equal(&suffix("ld", 16)));
        assert!(!suffix("ld", 16).less_or_equal(&suffix("world", 16)));
    }

    #[test]
    fn stores_before_the_suffix_preserve_it() {
        let mut s = suffix("end", 8);
        s.store(&Domain::top_of(&Type::i8()), &offset(2));
        assert_eq!(s.suffix(), b"end");
    }

    #[test]
    fn stores_into_the_suffix_trim_it() {
        let mut s = suffix("end", 8);
        // Offsets 5..8 hold "end"; writing position 5 leaves "nd".
        s.store(&Domain::top_of(&Type::i8()), &offset(5));
        assert_eq!(s.suffix(), b"nd");
    }

    #[test]
    fn loads_inside_the_suffix_are_exact() {
        let s = suffix("end", 8);
        let v = s.load(&Type::i8(), &offset(7));
        assert_eq!(v.as_singleton().unwrap().as_u64(), u64::from(b'd'));
        assert!(s.load(&Type::i8(), &offset(0)).is_top());
    }
}
