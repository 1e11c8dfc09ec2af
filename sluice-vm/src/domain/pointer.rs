//! Points-to domain.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};

use sluice_ir::{FunctionId, IntPredicate, Place, Type};

use crate::{
    apint::ApInt,
    domain::{CmpOutcome, Domain},
    memory::State,
};

/// An abstract pointer.
///
/// Three independent pieces are tracked at once: a map from memory blocks to
/// byte-offset domains ("may point into this block at these offsets"), an
/// optional numeric value for pointers that are really integers (null,
/// sentinel addresses), and a set of function targets for function pointers.
/// A raised `top` flag means the pointer may alias anything: loads through
/// it return top and stores through it are ignored.
///
/// Bottom is the absence of all three.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pointee: Type,
    top: bool,
    /// Offsets are 64-bit integer products and never absent; pointing at a
    /// block's start is an explicit zero.
    block_targets: BTreeMap<Place, Domain>,
    numeric_offset: Option<Box<Domain>>,
    function_targets: BTreeSet<FunctionId>,
}

impl Pointer {
    /// Bottom pointer of the given pointee type.
    pub fn bottom(pointee: Type) -> Self {
        Self {
            pointee,
            top: false,
            block_targets: BTreeMap::new(),
            numeric_offset: None,
            function_targets: BTreeSet::new(),
        }
    }

    /// The statically declared pointee type.
    pub fn pointee(&self) -> &Type {
        &self.pointee
    }

    /// The block-target map.
    pub fn block_targets(&self) -> &BTreeMap<Place, Domain> {
        &self.block_targets
    }

    /// The numeric (pointer-as-integer) value, if any.
    pub fn numeric_offset(&self) -> Option<&Domain> {
        self.numeric_offset.as_deref()
    }

    /// The function-target set.
    pub fn function_targets(&self) -> &BTreeSet<FunctionId> {
        &self.function_targets
    }

    /// Add a block target; `offset == None` points at the block start.
    pub fn add_block_target(&mut self, target: Place, offset: Option<Domain>) {
        if self.top {
            return;
        }
        let offset = offset.unwrap_or_else(zero_offset);
        match self.block_targets.get_mut(&target) {
            Some(existing) => existing.join(&offset),
            None => {
                self.block_targets.insert(target, offset);
            }
        }
    }

    /// Join a numeric value into the pointer.
    pub fn add_numeric_target(&mut self, offset: Domain) {
        if self.top {
            return;
        }
        match &mut self.numeric_offset {
            Some(existing) => existing.join(&offset),
            None => self.numeric_offset = Some(Box::new(offset)),
        }
    }

    /// Add a function target.
    pub fn add_function_target(&mut self, function: FunctionId) {
        if self.top {
            return;
        }
        self.function_targets.insert(function);
    }

    /// Whether the pointer has exactly one concrete value.
    pub fn is_constant(&self) -> bool {
        if self.top || self.is_bottom() {
            return false;
        }
        if !self.block_targets.is_empty() && self.numeric_offset.is_some() {
            return false;
        }
        if self.numeric_offset.is_none()
            && self.function_targets.is_empty()
            && self.block_targets.len() != 1
        {
            return false;
        }
        if let Some(numeric) = &self.numeric_offset {
            if numeric.as_singleton().is_none() {
                return false;
            }
        }
        if self.function_targets.len() > 1 {
            return false;
        }
        if let Some((_, offset)) = self.block_targets.iter().next() {
            if offset.as_singleton().is_none() {
                return false;
            }
        }
        true
    }

    /// A copy of this pointer shifted by `offset` bytes and re-typed.
    pub fn with_offset(&self, offset: &Domain, pointee: Type) -> Self {
        let mut result = self.clone();
        result.pointee = pointee;

        if let Some(numeric) = &mut result.numeric_offset {
            let mut shifted = Domain::bottom_of(&Type::i64());
            shifted.binary(sluice_ir::BinaryOp::Add, numeric, offset);
            *numeric = Box::new(shifted);
        }

        for target_offset in result.block_targets.values_mut() {
            let mut shifted = Domain::bottom_of(&Type::i64());
            shifted.binary(sluice_ir::BinaryOp::Add, target_offset, offset);
            *target_offset = shifted;
        }

        result
    }

    /// A copy of this pointer with a new static type, for `bitcast`,
    /// `ptrtoint`, and `inttoptr` between pointers.
    pub fn retyped(&self, pointee: Type) -> Self {
        let mut result = self.clone();
        result.pointee = pointee;
        result
    }

    /// Dereference every target and join what they hold. `None` when the
    /// pointer has no targets at all (bottom).
    pub fn load_through(&self, ty: &Type, state: &State) -> Option<Domain> {
        if self.top {
            return Some(Domain::top_of(ty));
        }
        if self.block_targets.is_empty() {
            return None;
        }

        let mut result = Domain::bottom_of(ty);
        for (place, offset) in &self.block_targets {
            match state.find_block(*place) {
                Some(block) => result.join(&block.value().load(ty, offset)),
                // A vanished block means the target is unknown memory.
                None => result.set_top(),
            }
        }
        Some(result)
    }

    /// Store `value` through every target. A store through a topped pointer
    /// is dropped; a store with exactly one block target and a pinned
    /// offset updates strongly.
    pub fn store_through(&self, value: &Domain, state: &mut State) {
        if self.top {
            return;
        }

        let single_target = self.block_targets.len() == 1
            && self
                .block_targets
                .values()
                .next()
                .is_some_and(|offset| offset.as_singleton().is_some());

        for (place, offset) in &self.block_targets {
            if let Some(block) = state.block_mut(*place) {
                block.value_mut().store(value, offset, single_target);
            }
        }
    }

    /// Comparison outcome of two pointers.
    ///
    /// Only pointers pinned to a single concrete value compare definitely;
    /// in particular a pointer with several targets against any constant is
    /// unknown.
    pub fn compare(a: &Self, b: &Self, pred: IntPredicate) -> CmpOutcome {
        if a.is_bottom() || b.is_bottom() {
            return CmpOutcome::empty();
        }

        let single = a.is_constant() && b.is_constant();
        let equal = a == b;

        use IntPredicate::*;
        match pred {
            Eq | Uge | Ule | Sge | Sle => {
                if single && equal {
                    CmpOutcome::TRUE
                } else if pred == Eq && single {
                    CmpOutcome::FALSE
                } else {
                    CmpOutcome::both()
                }
            }
            Ne => {
                if single {
                    CmpOutcome::definite(!equal)
                } else {
                    CmpOutcome::both()
                }
            }
            _ => CmpOutcome::both(),
        }
    }

    /// Widening: saturate every offset domain that could still grow.
    pub fn widen(&mut self) {
        for offset in self.block_targets.values_mut() {
            offset.set_top();
        }
        if let Some(numeric) = &mut self.numeric_offset {
            numeric.set_top();
        }
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether the pointer has no targets of any kind.
    pub fn is_bottom(&self) -> bool {
        !self.top
            && self.block_targets.is_empty()
            && self.numeric_offset.is_none()
            && self.function_targets.is_empty()
    }

    /// Forget everything.
    pub fn set_bottom(&mut self) {
        self.top = false;
        self.block_targets.clear();
        self.numeric_offset = None;
        self.function_targets.clear();
    }

    /// Whether the pointer may alias anything.
    pub const fn is_top(&self) -> bool {
        self.top
    }

    /// May alias anything.
    pub fn set_top(&mut self) {
        self.set_bottom();
        self.top = true;
    }

    /// Least upper bound: component-wise union.
    pub fn join(&mut self, other: &Self) {
        if self.top || other.is_bottom() {
            return;
        }
        if other.top {
            self.set_top();
            return;
        }

        for (place, offset) in &other.block_targets {
            match self.block_targets.get_mut(place) {
                Some(existing) => existing.join(offset),
                None => {
                    self.block_targets.insert(*place, offset.clone());
                }
            }
        }

        if let Some(theirs) = &other.numeric_offset {
            match &mut self.numeric_offset {
                Some(numeric) => numeric.join(theirs),
                None => self.numeric_offset = Some(theirs.clone()),
            }
        }

        self.function_targets
            .extend(other.function_targets.iter().copied());
    }

    /// Greatest lower bound: keys present on both sides only, offsets met.
    pub fn meet(&mut self, other: &Self) {
        if self.is_bottom() || other.top {
            return;
        }
        if other.is_bottom() {
            self.set_bottom();
            return;
        }
        if self.top {
            *self = other.clone();
            return;
        }

        self.block_targets.retain(|place, offset| {
            let Some(theirs) = other.block_targets.get(place) else {
                return false;
            };
            offset.meet(theirs);
            true
        });

        self.numeric_offset = match (self.numeric_offset.take(), &other.numeric_offset) {
            (Some(mut numeric), Some(theirs)) => {
                numeric.meet(theirs);
                Some(numeric)
            }
            _ => None,
        };

        self.function_targets = self
            .function_targets
            .intersection(&other.function_targets)
            .copied()
            .collect();
    }

    /// Component-wise order.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        if self.is_bottom() || other.top {
            return true;
        }
        if self.top {
            return false;
        }

        let blocks_ok = self.block_targets.iter().all(|(place, offset)| {
            other
                .block_targets
                .get(place)
                .is_some_and(|theirs| offset.less_or_equal(theirs))
        });

        let numeric_ok = match (&self.numeric_offset, &other.numeric_offset) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => mine.less_or_equal(theirs),
        };

        blocks_ok && numeric_ok && self.function_targets.is_subset(&other.function_targets)
    }

    /// Precision estimate.
    pub fn accuracy(&self) -> f32 {
        if self.is_bottom() {
            1.0
        } else if self.top {
            0.0
        } else if self.is_constant() {
            1.0
        } else {
            0.5
        }
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>()
            + self
                .block_targets
                .values()
                .map(Domain::memory_usage)
                .sum::<usize>()
            + self
                .numeric_offset
                .as_ref()
                .map_or(0, |numeric| numeric.memory_usage())
            + self.function_targets.len() * core::mem::size_of::<FunctionId>()
    }

    /// The concrete zero of a pointer type is null: numeric offset zero.
    pub fn set_zero(&mut self) {
        self.set_bottom();
        self.numeric_offset = Some(Box::new(zero_offset()));
    }
}

fn zero_offset() -> Domain {
    Domain::int_constant(ApInt::new(64, 0))
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pointer")?;
        if self.top {
            return write!(f, " top");
        }
        if self.is_bottom() {
            return write!(f, " bottom");
        }
        if !self.block_targets.is_empty() {
            write!(f, " blocks {{")?;
            for (i, (place, offset)) in self.block_targets.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match offset.as_singleton() {
                    Some(v) => write!(f, "{place:?}+{}", v.as_u64())?,
                    None => write!(f, "{place:?}+?")?,
                }
            }
            write!(f, "}}")?;
        }
        if let Some(numeric) = &self.numeric_offset {
            match numeric.as_singleton() {
                Some(v) => write!(f, " numeric {}", v.as_u64())?,
                None => write!(f, " numeric ?")?,
            }
        }
        if !self.function_targets.is_empty() {
            write!(f, " functions {:?}", self.function_targets)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(index: u32) -> Place {
        Place::Local {
            function: FunctionId(0),
            index,
        }
    }

    fn singleton(value: u64) -> Domain {
        Domain::int_constant(ApInt::new(64, value))
    }

    #[test]
    fn bottom_has_no_targets() {
        let p = Pointer::bottom(Type::i32());
        assert!(p.is_bottom());
        assert!(!p.is_top());
        assert!(!p.is_constant());
    }

    #[test]
    fn single_pinned_target_is_constant() {
        let mut p = Pointer::bottom(Type::i32());
        p.add_block_target(place(0), None);
        assert!(p.is_constant());

        p.add_block_target(place(1), Some(singleton(4)));
        assert!(!p.is_constant());
    }

    #[test]
    fn join_unions_targets() {
        let mut a = Pointer::bottom(Type::i32());
        a.add_block_target(place(0), Some(singleton(0)));
        let mut b = Pointer::bottom(Type::i32());
        b.add_block_target(place(0), Some(singleton(4)));
        b.add_block_target(place(1), None);

        a.join(&b);
        assert_eq!(a.block_targets().len(), 2);
        let offset = &a.block_targets()[&place(0)];
        assert_eq!(offset.known_values().unwrap(), vec![0, 4]);
    }

    #[test]
    fn meet_drops_one_sided_targets() {
        let mut a = Pointer::bottom(Type::i32());
        a.add_block_target(place(0), None);
        a.add_block_target(place(1), None);
        let mut b = Pointer::bottom(Type::i32());
        b.add_block_target(place(1), None);

        a.meet(&b);
        assert_eq!(a.block_targets().len(), 1);
        assert!(a.block_targets().contains_key(&place(1)));
    }

    #[test]
    fn null_is_numeric_zero() {
        let mut p = Pointer::bottom(Type::i32());
        p.set_zero();
        assert!(p.is_constant());
        assert_eq!(p.numeric_offset().unwrap().as_singleton().unwrap().as_u64(), 0);
    }

    #[test]
    fn equal_constants_compare_definitely() {
        let mut a = Pointer::bottom(Type::i32());
        a.add_block_target(place(0), None);
        let b = a.clone();
        assert_eq!(Pointer::compare(&a, &b, IntPredicate::Eq), CmpOutcome::TRUE);
        assert_eq!(Pointer::compare(&a, &b, IntPredicate::Ne), CmpOutcome::FALSE);

        let mut null = Pointer::bottom(Type::i32());
        null.set_zero();
        assert_eq!(
            Pointer::compare(&a, &null, IntPredicate::Eq),
            CmpOutcome::FALSE
        );
    }

    #[test]
    fn multi_target_comparison_is_unknown() {
        let mut a = Pointer::bottom(Type::i32());
        a.add_block_target(place(0), None);
        a.add_block_target(place(1), None);
        let mut null = Pointer::bottom(Type::i32());
        null.set_zero();
        assert_eq!(
            Pointer::compare(&a, &null, IntPredicate::Eq),
            CmpOutcome::both()
        );
    }

    #[test]
    fn with_offset_shifts_every_target() {
        let mut p = Pointer::bottom(Type::array(Type::i32(), 4));
        p.add_block_target(place(0), Some(singleton(4)));
        let shifted = p.with_offset(&singleton(8), Type::i32());
        let offset = &shifted.block_targets()[&place(0)];
        assert_eq!(offset.as_singleton().unwrap().as_u64(), 12);
        assert_eq!(*shifted.pointee(), Type::i32());
    }
}
