//! Exact-size array domain: one element domain per slot.

use core::fmt;

use sluice_ir::{BinaryOp, IntPredicate, Type};

use crate::{
    apint::ApInt,
    domain::{offset_hint, Domain, OffsetHint},
    error::{bug, Bug},
};

/// Largest element count the domain tracks slot by slot. Bigger arrays are
/// left to the single-item summary running alongside in the product.
const MAX_TRACKED_LEN: u64 = 4096;

/// Keeps a separate abstract value for every array slot.
///
/// Out-of-range indices are silently dropped: they are either bugs in the
/// analyzed program or imprecision in the index domain, and never crash the
/// analyzer. Arrays beyond [`MAX_TRACKED_LEN`] degrade to a permanent top.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactSizeArray {
    elem: Type,
    len: u64,
    /// Empty iff the array is untracked (over the length cap).
    elements: Vec<Domain>,
}

impl ExactSizeArray {
    /// Bottom value with `len` slots of type `elem`.
    pub fn bottom(elem: Type, len: u64) -> Self {
        let elements = if len <= MAX_TRACKED_LEN {
            (0..len).map(|_| Domain::bottom_of(&elem)).collect()
        } else {
            Vec::new()
        };
        Self { elem, len, elements }
    }

    /// Array holding the given element values.
    pub fn from_elements(elem: Type, elements: Vec<Domain>) -> Self {
        let len = elements.len() as u64;
        if len > MAX_TRACKED_LEN {
            return Self::bottom(elem, len);
        }
        Self { elem, len, elements }
    }

    /// Element type.
    pub fn element_type(&self) -> &Type {
        &self.elem
    }

    /// Declared element count.
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the array tracks individual slots.
    fn tracked(&self) -> bool {
        self.len <= MAX_TRACKED_LEN
    }

    /// Slot values, empty when the array is untracked.
    pub(crate) fn tracked_elements(&self) -> &[Domain] {
        &self.elements
    }

    /// Mutable slot access for the widening pass.
    pub(crate) fn tracked_elements_mut(&mut self) -> &mut [Domain] {
        &mut self.elements
    }

    fn check_len(&self, other: &Self, operation: &'static str) {
        if self.len != other.len {
            bug(Bug::ArityMismatch {
                operation,
                lhs: self.len as usize,
                rhs: other.len as usize,
            });
        }
    }

    /// Slot indices an abstract index may select, with `exact == true` when
    /// the selection covers precisely the indices listed.
    fn select(&self, index: &Domain) -> (Vec<usize>, bool) {
        let len = self.elements.len();
        match offset_hint(index) {
            OffsetHint::None => (Vec::new(), true),
            OffsetHint::Values(values) => (
                values
                    .into_iter()
                    .filter(|&v| v < len as u64)
                    .map(|v| v as usize)
                    .collect(),
                true,
            ),
            OffsetHint::Range(lo, hi) => {
                if len == 0 {
                    return (Vec::new(), true);
                }
                let exact = lo == hi;
                let lo = lo.min(len as u64) as usize;
                let hi = hi.min(len as u64 - 1) as usize;
                ((lo..=hi).collect(), exact)
            }
            OffsetHint::Any => ((0..len).collect(), false),
        }
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether no value is represented.
    pub fn is_bottom(&self) -> bool {
        self.tracked() && self.elements.iter().all(Domain::is_bottom)
    }

    /// Forget everything.
    pub fn set_bottom(&mut self) {
        for element in &mut self.elements {
            element.set_bottom();
        }
    }

    /// Whether every element is saturated.
    pub fn is_top(&self) -> bool {
        !self.tracked() || self.elements.iter().all(Domain::is_top)
    }

    /// Saturate every element.
    pub fn set_top(&mut self) {
        for element in &mut self.elements {
            element.set_top();
        }
    }

    /// Pointwise least upper bound.
    pub fn join(&mut self, other: &Self) {
        self.check_len(other, "join");
        for (element, theirs) in self.elements.iter_mut().zip(&other.elements) {
            element.join(theirs);
        }
    }

    /// Pointwise greatest lower bound.
    pub fn meet(&mut self, other: &Self) {
        self.check_len(other, "meet");
        for (element, theirs) in self.elements.iter_mut().zip(&other.elements) {
            element.meet(theirs);
        }
    }

    /// Pointwise order.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        self.check_len(other, "less_or_equal");
        self.elements
            .iter()
            .zip(&other.elements)
            .all(|(mine, theirs)| mine.less_or_equal(theirs))
    }

    /// Mean element precision.
    pub fn accuracy(&self) -> f32 {
        if self.elements.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.elements.iter().map(Domain::accuracy).sum();
        sum / self.elements.len() as f32
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.elements.iter().map(Domain::memory_usage).sum::<usize>()
    }

    /// Zero every element.
    pub fn set_zero(&mut self) {
        for element in &mut self.elements {
            element.set_zero();
        }
    }

    // --- Transfer functions ---------------------------------------------

    /// Lane-wise binary operation (vector arithmetic).
    pub fn binary(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        a.check_len(b, "binary");
        if !self.tracked() {
            return;
        }
        for ((element, x), y) in self.elements.iter_mut().zip(&a.elements).zip(&b.elements) {
            element.binary(op, x, y);
        }
    }

    /// Lane-wise comparison (vector `icmp`).
    pub fn icmp(&mut self, a: &Self, b: &Self, pred: IntPredicate) {
        a.check_len(b, "icmp");
        if !self.tracked() {
            return;
        }
        for ((element, x), y) in self.elements.iter_mut().zip(&a.elements).zip(&b.elements) {
            element.icmp(x, y, pred);
        }
    }

    /// Join of the elements the index may select.
    pub fn extract_element(&self, index: &Domain) -> Domain {
        if !self.tracked() {
            return Domain::top_of(&self.elem);
        }
        let (selected, _) = self.select(index);
        let mut result = Domain::bottom_of(&self.elem);
        for idx in selected {
            result.join(&self.elements[idx]);
        }
        result
    }

    /// Array with one lane replaced; a strong update only when the index is
    /// pinned to a single slot.
    pub fn insert_element(&mut self, array: &Self, element: &Domain, index: &Domain) {
        self.check_len(array, "insertelement");
        if !self.tracked() {
            return;
        }
        self.elements = array.elements.clone();
        let (selected, exact) = self.select(index);
        if exact && selected.len() == 1 {
            self.elements[selected[0]] = element.clone();
            return;
        }
        for idx in selected {
            self.elements[idx].join(element);
        }
    }

    /// Two-array lane permutation; `u32::MAX` lanes stay undefined.
    pub fn shuffle_vector(&mut self, a: &Self, b: &Self, mask: &[u32]) {
        if !self.tracked() {
            return;
        }
        for (slot, &lane) in self.elements.iter_mut().zip(mask) {
            let lane = lane as u64;
            if lane < a.len {
                *slot = a.elements[lane as usize].clone();
            } else if lane - a.len < b.len {
                *slot = b.elements[(lane - a.len) as usize].clone();
            } else {
                slot.set_bottom();
            }
        }
    }

    /// Constant-path aggregate read.
    pub fn extract_value(&self, indices: &[u32]) -> Domain {
        let idx = indices[0] as usize;
        match self.elements.get(idx) {
            Some(element) => element.extract_value(&indices[1..]),
            None => Domain::top_of(&self.elem),
        }
    }

    /// Constant-path aggregate write.
    pub fn insert_value(&mut self, aggregate: &Self, element: &Domain, indices: &[u32]) {
        self.check_len(aggregate, "insertvalue");
        if !self.tracked() {
            return;
        }
        self.elements = aggregate.elements.clone();
        let idx = indices[0] as usize;
        let Some(slot) = self.elements.get_mut(idx) else {
            return;
        };
        if indices.len() == 1 {
            *slot = element.clone();
        } else {
            let nested = slot.clone();
            slot.insert_value(&nested, element, &indices[1..]);
        }
    }

    /// Block-level read at an abstract byte offset.
    pub fn load(&self, ty: &Type, offset: &Domain) -> Domain {
        if !self.tracked() {
            return Domain::top_of(ty);
        }
        let stride = self.elem.size_in_bytes().max(1);

        match offset_hint(offset) {
            OffsetHint::None => Domain::bottom_of(ty),
            OffsetHint::Values(values) => {
                let mut result = Domain::bottom_of(ty);
                for v in values {
                    let idx = (v / stride) as usize;
                    let inner = v % stride;
                    match self.elements.get(idx) {
                        Some(element) if inner == 0 && *ty == self.elem => result.join(element),
                        Some(element) => {
                            result.join(&element.load(ty, &byte_offset(inner)));
                        }
                        None => {}
                    }
                }
                result
            }
            OffsetHint::Range(lo, hi) if stride == 1 && *ty == self.elem => {
                let mut result = Domain::bottom_of(ty);
                let hi = hi.min(self.len.saturating_sub(1));
                for idx in lo..=hi {
                    if let Some(element) = self.elements.get(idx as usize) {
                        result.join(element);
                    }
                }
                result
            }
            _ => Domain::top_of(ty),
        }
    }

    /// Block-level write at an abstract byte offset.
    pub fn store(&mut self, value: &Domain, offset: &Domain, single_target: bool) {
        if !self.tracked() {
            return;
        }
        let stride = self.elem.size_in_bytes().max(1);

        match offset_hint(offset) {
            OffsetHint::None => {}
            OffsetHint::Values(values) => {
                let valid: Vec<u64> = values
                    .into_iter()
                    .filter(|&v| (v / stride) < self.len)
                    .collect();
                let strong = single_target && valid.len() == 1;
                for v in valid {
                    let idx = (v / stride) as usize;
                    let inner = v % stride;
                    self.elements[idx].store(value, &byte_offset(inner), strong);
                }
            }
            OffsetHint::Range(lo, hi) => {
                let idx_lo = lo / stride;
                let idx_hi = (hi / stride).min(self.len.saturating_sub(1));
                for idx in idx_lo..=idx_hi {
                    if let Some(element) = self.elements.get_mut(idx as usize) {
                        if stride == 1 {
                            element.store(value, &byte_offset(0), false);
                        } else {
                            element.set_top();
                        }
                    }
                }
            }
            OffsetHint::Any => self.set_top(),
        }
    }
}

/// Constant byte-offset domain used when descending into elements.
fn byte_offset(value: u64) -> Domain {
    Domain::int_constant(ApInt::new(64, value))
}

impl fmt::Display for ExactSizeArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tracked() {
            return write!(f, "exactArray untracked[{}]", self.len);
        }
        writeln!(f, "exactArray[{}]", self.len)?;
        for (idx, element) in self.elements.iter().enumerate() {
            writeln!(f, "    [{idx}] {element}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte(value: u64) -> Domain {
        Domain::int_constant(ApInt::new(8, value))
    }

    fn index(value: u64) -> Domain {
        Domain::int_constant(ApInt::new(32, value))
    }

    fn array(values: &[u64]) -> ExactSizeArray {
        ExactSizeArray::from_elements(Type::i8(), values.iter().map(|&v| byte(v)).collect())
    }

    #[test]
    fn exact_index_reads_one_slot() {
        let a = array(&[10, 20, 30]);
        let v = a.extract_element(&index(1));
        assert_eq!(v.as_singleton().unwrap().as_u64(), 20);
    }

    #[test]
    fn imprecise_index_joins_slots() {
        let a = array(&[10, 20, 30]);
        let mut idx = index(0);
        idx.join(&index(2));
        let v = a.extract_element(&idx);
        assert_eq!(v.known_values().unwrap(), vec![10, 30]);
    }

    #[test]
    fn out_of_bounds_indices_are_dropped() {
        let a = array(&[10, 20]);
        let v = a.extract_element(&index(9));
        assert!(v.is_bottom());
    }

    #[test]
    fn pinned_insert_is_strong() {
        let mut out = ExactSizeArray::bottom(Type::i8(), 2);
        out.insert_element(&array(&[1, 2]), &byte(9), &index(0));
        assert_eq!(out.extract_element(&index(0)).as_singleton().unwrap().as_u64(), 9);
        assert_eq!(out.extract_element(&index(1)).as_singleton().unwrap().as_u64(), 2);
    }

    #[test]
    fn wobbly_insert_is_weak() {
        let mut idx = index(0);
        idx.join(&index(1));
        let mut out = ExactSizeArray::bottom(Type::i8(), 2);
        out.insert_element(&array(&[1, 2]), &byte(9), &idx);
        assert_eq!(out.extract_element(&index(0)).known_values().unwrap(), vec![1, 9]);
        assert_eq!(out.extract_element(&index(1)).known_values().unwrap(), vec![2, 9]);
    }

    #[test]
    fn store_at_singleton_offset_is_strong() {
        let mut a = array(&[1, 2, 3]);
        a.store(&byte(7), &Domain::int_constant(ApInt::new(64, 1)), true);
        assert_eq!(a.extract_element(&index(1)).as_singleton().unwrap().as_u64(), 7);
    }

    #[test]
    fn untracked_arrays_saturate() {
        let a = ExactSizeArray::bottom(Type::i8(), MAX_TRACKED_LEN + 1);
        assert!(a.is_top());
        assert!(a.extract_element(&index(0)).is_top());
    }
}
