//! Single-item array summary domain.

use core::fmt;

use sluice_ir::{BinaryOp, Type};

use crate::{
    apint::ApInt,
    domain::{offset_is_zero, same_shape, Domain},
};

/// Summarizes a whole array with one element domain plus an abstract size.
///
/// Every write joins into the element, every read returns a copy of it; the
/// representation never grows with the array, which is what makes it usable
/// where the exact-size domain is not.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleItemArray {
    elem: Type,
    value: Box<Domain>,
    size: Box<Domain>,
}

impl SingleItemArray {
    /// Bottom value for an array with a statically known length.
    pub fn with_len(elem: Type, len: u64) -> Self {
        Self::with_size(elem, Domain::int_constant(ApInt::new(64, len)))
    }

    /// Bottom value for an array with an abstract element count, as
    /// produced by array `alloca`s.
    pub fn with_size(elem: Type, size: Domain) -> Self {
        Self {
            value: Box::new(Domain::bottom_of(&elem)),
            size: Box::new(size),
            elem,
        }
    }

    /// Element type.
    pub fn element_type(&self) -> &Type {
        &self.elem
    }

    /// The abstract element count.
    pub fn size(&self) -> &Domain {
        &self.size
    }

    /// The summary element.
    pub fn value(&self) -> &Domain {
        &self.value
    }

    /// Mutable summary access for the widening pass.
    pub(crate) fn value_mut(&mut self) -> &mut Domain {
        &mut self.value
    }

    /// Mutable size access for the widening pass.
    pub(crate) fn size_mut(&mut self) -> &mut Domain {
        &mut self.size
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether no value is represented.
    pub fn is_bottom(&self) -> bool {
        self.value.is_bottom()
    }

    /// Forget the summarized content.
    pub fn set_bottom(&mut self) {
        self.value.set_bottom();
    }

    /// Whether the summarized content is saturated.
    pub fn is_top(&self) -> bool {
        self.value.is_top()
    }

    /// Saturate the summarized content.
    pub fn set_top(&mut self) {
        self.value.set_top();
    }

    /// Least upper bound on content and size.
    pub fn join(&mut self, other: &Self) {
        self.value.join(&other.value);
        self.size.join(&other.size);
    }

    /// Greatest lower bound on content and size.
    pub fn meet(&mut self, other: &Self) {
        self.value.meet(&other.value);
        self.size.meet(&other.size);
    }

    /// Order on content and size.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        self.value.less_or_equal(&other.value) && self.size.less_or_equal(&other.size)
    }

    /// Content precision.
    pub fn accuracy(&self) -> f32 {
        self.value.accuracy()
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>() + self.value.memory_usage() + self.size.memory_usage()
    }

    /// Zero the summarized content.
    pub fn set_zero(&mut self) {
        self.value.set_zero();
    }

    // --- Transfer functions ---------------------------------------------

    /// Lane-wise binary operation collapses onto the summary element.
    pub fn binary(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        self.value.binary(op, &a.value, &b.value);
        self.size = a.size.clone();
        self.size.join(&b.size);
    }

    /// Any read returns the summary element.
    pub fn extract_element(&self) -> Domain {
        (*self.value).clone()
    }

    /// Any insert joins into the summary element.
    pub fn insert_element(&mut self, array: &Self, element: &Domain) {
        self.value = array.value.clone();
        self.size = array.size.clone();
        if same_shape(&self.value, element) {
            self.value.join(element);
        } else {
            self.value.set_top();
        }
    }

    /// Shuffles join both sources.
    pub fn shuffle_vector(&mut self, a: &Self, b: &Self) {
        self.value = a.value.clone();
        self.value.join(&b.value);
        self.size = a.size.clone();
        self.size.join(&b.size);
    }

    /// Block-level read: the summary element, regardless of offset.
    pub fn load(&self, ty: &Type, _offset: &Domain) -> Domain {
        if *ty == self.elem {
            (*self.value).clone()
        } else {
            Domain::top_of(ty)
        }
    }

    /// Block-level write: weak by construction. The summary stands for many
    /// cells, so even a single-target store may leave other cells at their
    /// old value; only a one-element array at offset zero updates strongly.
    pub fn store(&mut self, value: &Domain, offset: &Domain, single_target: bool) {
        if !same_shape(&self.value, value) {
            self.value.set_top();
            return;
        }

        let single_cell =
            matches!(self.size.as_singleton(), Some(s) if s.as_u64() == 1) && offset_is_zero(offset);
        if single_target && single_cell {
            self.value = Box::new(value.clone());
        } else {
            self.value.join(value);
        }
    }
}

impl fmt::Display for SingleItemArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "singleItemArray size {} value {}", self.size, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte(value: u64) -> Domain {
        Domain::int_constant(ApInt::new(8, value))
    }

    fn offset(value: u64) -> Domain {
        Domain::int_constant(ApInt::new(64, value))
    }

    #[test]
    fn reads_return_the_summary() {
        let mut a = SingleItemArray::with_len(Type::i8(), 10);
        a.store(&byte(5), &offset(3), true);
        assert_eq!(a.extract_element().as_singleton().unwrap().as_u64(), 5);
        assert_eq!(a.load(&Type::i8(), &offset(7)).as_singleton().unwrap().as_u64(), 5);
    }

    #[test]
    fn stores_accumulate() {
        let mut a = SingleItemArray::with_len(Type::i8(), 10);
        a.store(&byte(5), &offset(0), true);
        a.store(&byte(9), &offset(1), true);
        assert_eq!(a.extract_element().known_values().unwrap(), vec![5, 9]);
    }

    #[test]
    fn one_element_arrays_update_strongly() {
        let mut a = SingleItemArray::with_len(Type::i8(), 1);
        a.store(&byte(5), &offset(0), true);
        a.store(&byte(9), &offset(0), true);
        assert_eq!(a.extract_element().as_singleton().unwrap().as_u64(), 9);
    }

    #[test]
    fn mismatched_value_shapes_saturate() {
        let mut a = SingleItemArray::with_len(Type::i8(), 4);
        a.store(&Domain::bottom_of(&Type::i32()), &offset(0), false);
        assert!(a.is_top());
    }
}
