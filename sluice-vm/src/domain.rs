//! Abstract domains.
//!
//! [`Domain`] is a closed sum over every concrete domain the engine ships.
//! Keeping the set closed makes cross-member dispatch in the reduced product
//! a plain `match` and lets the compiler police exhaustiveness whenever a
//! domain is added.
//!
//! All transfer operations follow the same shape: the receiver is a freshly
//! constructed bottom value of the result type (built by
//! [`crate::constructors::Constructors`]) and the operation folds the
//! abstract operands into it. Operations a domain cannot express saturate to
//! top; they never panic. Combining domains of incompatible shapes is a bug
//! in the caller and aborts with a diagnostic.

use core::fmt;

use sluice_ir::{BinaryOp, CastOp, FloatPredicate, IntPredicate, Type};

use crate::{
    apint::ApInt,
    error::{bug, Bug},
};

mod array_exact;
mod array_single;
mod bitfield;
mod float;
mod interval;
mod message;
mod pointer;
mod product;
mod set;
mod string_prefix;
mod string_suffix;
mod string_trie;
mod structure;

pub use array_exact::ExactSizeArray;
pub use array_single::SingleItemArray;
pub use bitfield::Bitfield;
pub use float::FloatInterval;
pub use interval::Interval;
pub use message::Message;
pub use pointer::Pointer;
pub use product::Product;
pub use set::{IntSet, SET_THRESHOLD};
pub use string_prefix::StringPrefix;
pub use string_suffix::StringSuffix;
pub use string_trie::{StringTrie, TRIE_NODE_THRESHOLD};
pub use structure::Structure;

bitflags::bitflags! {
    /// Outcome of an abstract comparison.
    ///
    /// Encodes the four-valued result: empty is bottom (at least one operand
    /// had no concrete value), `TRUE`/`FALSE` alone are definite answers,
    /// and both together mean the comparison can go either way.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CmpOutcome: u8 {
        /// The comparison may evaluate to true.
        const TRUE = 1;
        /// The comparison may evaluate to false.
        const FALSE = 2;
    }
}

impl CmpOutcome {
    /// Both outcomes are possible.
    pub const fn both() -> Self {
        Self::TRUE.union(Self::FALSE)
    }

    /// Definite outcome from a concrete boolean.
    pub fn definite(value: bool) -> Self {
        if value {
            Self::TRUE
        } else {
            Self::FALSE
        }
    }
}

/// An abstract value: one variant per concrete domain.
///
/// Scalar integers and arrays never appear bare in a memory state; the
/// constructors always wrap them in the reduced [`Product`]. The bare
/// variants still implement the whole interface because they are the
/// product's members.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Known-bits integer domain.
    Bitfield(Bitfield),
    /// Finite-set-of-constants integer domain.
    Set(IntSet),
    /// Signed/unsigned interval integer domain.
    Interval(Interval),
    /// Float range domain.
    Float(FloatInterval),
    /// One element domain per array slot.
    ArrayExact(ExactSizeArray),
    /// Whole-array summary domain.
    ArraySingle(SingleItemArray),
    /// Known-prefix domain for byte arrays.
    StringPrefix(StringPrefix),
    /// Known-suffix domain for byte arrays.
    StringSuffix(StringSuffix),
    /// Finite-set-of-strings domain for byte arrays.
    StringTrie(StringTrie),
    /// Points-to domain.
    Pointer(Pointer),
    /// One member domain per struct field.
    Struct(Structure),
    /// Reduced product of several domains over the same concrete values.
    Product(Product),
}

/// Forward a read-only operation to every variant.
macro_rules! each {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Domain::Bitfield($inner) => $body,
            Domain::Set($inner) => $body,
            Domain::Interval($inner) => $body,
            Domain::Float($inner) => $body,
            Domain::ArrayExact($inner) => $body,
            Domain::ArraySingle($inner) => $body,
            Domain::StringPrefix($inner) => $body,
            Domain::StringSuffix($inner) => $body,
            Domain::StringTrie($inner) => $body,
            Domain::Pointer($inner) => $body,
            Domain::Struct($inner) => $body,
            Domain::Product($inner) => $body,
        }
    };
}

/// Pair two values of the same variant, aborting on mismatched shapes.
macro_rules! pairwise {
    ($op:expr, $self:expr, $other:expr, ($a:ident, $b:ident) => $body:expr) => {
        match ($self, $other) {
            (Domain::Bitfield($a), Domain::Bitfield($b)) => $body,
            (Domain::Set($a), Domain::Set($b)) => $body,
            (Domain::Interval($a), Domain::Interval($b)) => $body,
            (Domain::Float($a), Domain::Float($b)) => $body,
            (Domain::ArrayExact($a), Domain::ArrayExact($b)) => $body,
            (Domain::ArraySingle($a), Domain::ArraySingle($b)) => $body,
            (Domain::StringPrefix($a), Domain::StringPrefix($b)) => $body,
            (Domain::StringSuffix($a), Domain::StringSuffix($b)) => $body,
            (Domain::StringTrie($a), Domain::StringTrie($b)) => $body,
            (Domain::Pointer($a), Domain::Pointer($b)) => $body,
            (Domain::Struct($a), Domain::Struct($b)) => $body,
            (Domain::Product($a), Domain::Product($b)) => $body,
            (lhs, rhs) => bug(Bug::DomainMismatch {
                operation: $op,
                lhs: crate::error::shape_of(lhs),
                rhs: crate::error::shape_of(rhs),
            }),
        }
    };
}

impl Domain {
    /// Canonical bottom value for an IR type.
    ///
    /// Integers become the (bitfield, set, interval) product; arrays and
    /// vectors become the (exact-size, single-item, string-prefix) product;
    /// the rest map to their single domain.
    pub fn bottom_of(ty: &Type) -> Self {
        match ty {
            Type::Void => unreachable!("no abstract value exists for void"),
            Type::Int(bits) => Domain::Product(Product::new(vec![
                Domain::Bitfield(Bitfield::bottom(*bits)),
                Domain::Set(IntSet::bottom(*bits)),
                Domain::Interval(Interval::bottom(*bits)),
            ])),
            Type::Float(kind) => Domain::Float(FloatInterval::bottom(*kind)),
            Type::Ptr(pointee) => Domain::Pointer(Pointer::bottom((**pointee).clone())),
            Type::Array { elem, len } | Type::Vector { elem, len } => {
                Domain::Product(Product::new(vec![
                    Domain::ArrayExact(ExactSizeArray::bottom((**elem).clone(), *len)),
                    Domain::ArraySingle(SingleItemArray::with_len((**elem).clone(), *len)),
                    Domain::StringPrefix(StringPrefix::bottom(elem.as_ref(), *len)),
                ]))
            }
            Type::Struct(fields) => Domain::Struct(Structure::bottom(fields)),
        }
    }

    /// Canonical top value for an IR type.
    pub fn top_of(ty: &Type) -> Self {
        let mut value = Self::bottom_of(ty);
        value.set_top();
        value
    }

    /// Integer product holding exactly `value`.
    pub fn int_constant(value: ApInt) -> Self {
        Domain::Product(Product::new(vec![
            Domain::Bitfield(Bitfield::constant(value)),
            Domain::Set(IntSet::constant(value)),
            Domain::Interval(Interval::constant(value)),
        ]))
    }

    /// Integer product constrained only by interval bounds; the bitfield
    /// and set members sit at top. Used for comparison-driven refinements,
    /// which meet this into an existing value.
    pub fn int_range(
        width: u32,
        unsigned: Option<(ApInt, ApInt)>,
        signed: Option<(ApInt, ApInt)>,
    ) -> Self {
        let mut bitfield = Bitfield::bottom(width);
        bitfield.set_top();
        let mut set = IntSet::bottom(width);
        set.set_top();
        Domain::Product(Product::new(vec![
            Domain::Bitfield(bitfield),
            Domain::Set(set),
            Domain::Interval(Interval::from_bounds(width, unsigned, signed)),
        ]))
    }

    /// 1-bit product holding the given comparison outcome.
    pub fn bool_outcome(outcome: CmpOutcome) -> Self {
        let mut value = Self::bottom_of(&Type::i1());
        value.set_cmp_outcome(outcome);
        value
    }

    // --- Lattice and identity -------------------------------------------

    /// Whether no concrete value is represented.
    pub fn is_bottom(&self) -> bool {
        each!(self, inner => inner.is_bottom())
    }

    /// Forget everything: represent no concrete value.
    pub fn set_bottom(&mut self) {
        each!(self, inner => inner.set_bottom())
    }

    /// Whether every concrete value of the type is represented.
    pub fn is_top(&self) -> bool {
        each!(self, inner => inner.is_top())
    }

    /// Saturate: represent every concrete value of the type.
    pub fn set_top(&mut self) {
        each!(self, inner => inner.set_top())
    }

    /// Least upper bound, in place.
    pub fn join(&mut self, other: &Domain) {
        pairwise!("join", self, other, (a, b) => a.join(b))
    }

    /// Greatest lower bound, in place.
    pub fn meet(&mut self, other: &Domain) {
        pairwise!("meet", self, other, (a, b) => a.meet(b))
    }

    /// Lattice order: does `other` over-approximate `self`?
    pub fn less_or_equal(&self, other: &Domain) -> bool {
        pairwise!("less_or_equal", self, other, (a, b) => a.less_or_equal(b))
    }

    /// Precision estimate in `[0, 1]`: 0 at top, 1 at a single value.
    pub fn accuracy(&self) -> f32 {
        each!(self, inner => inner.accuracy())
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>() + each!(self, inner => inner.memory_usage())
    }

    /// Become the abstraction of the concrete zero value of the type.
    pub fn set_zero(&mut self) {
        each!(self, inner => inner.set_zero())
    }

    // --- Transfer functions ---------------------------------------------

    /// Binary arithmetic/logic: fold `op(a, b)` into this result value.
    pub fn binary(&mut self, op: BinaryOp, a: &Domain, b: &Domain) {
        match (self, a, b) {
            (Domain::Product(r), Domain::Product(x), Domain::Product(y)) => r.binary(op, x, y),
            (Domain::Bitfield(r), Domain::Bitfield(x), Domain::Bitfield(y)) => r.binary(op, x, y),
            (Domain::Set(r), Domain::Set(x), Domain::Set(y)) => r.binary(op, x, y),
            (Domain::Interval(r), Domain::Interval(x), Domain::Interval(y)) => r.binary(op, x, y),
            (Domain::Float(r), Domain::Float(x), Domain::Float(y)) => r.binary(op, x, y),
            (Domain::ArrayExact(r), Domain::ArrayExact(x), Domain::ArrayExact(y)) => {
                r.binary(op, x, y)
            }
            (Domain::ArraySingle(r), Domain::ArraySingle(x), Domain::ArraySingle(y)) => {
                r.binary(op, x, y)
            }
            (r @ (Domain::StringPrefix(_) | Domain::StringSuffix(_) | Domain::StringTrie(_)), ..) => {
                r.set_top()
            }
            (r, _, _) => r.set_top(),
        }
    }

    /// Integer comparison: fold the 1-bit outcome into this result value.
    pub fn icmp(&mut self, a: &Domain, b: &Domain, pred: IntPredicate) {
        match (self, a, b) {
            (Domain::Product(r), Domain::Pointer(x), Domain::Pointer(y)) => {
                r.set_cmp_outcome(Pointer::compare(x, y, pred))
            }
            (Domain::Product(r), Domain::Product(x), Domain::Product(y)) => r.icmp(x, y, pred),
            (Domain::Bitfield(r), Domain::Bitfield(x), Domain::Bitfield(y)) => r.icmp(x, y, pred),
            (Domain::Set(r), Domain::Set(x), Domain::Set(y)) => r.icmp(x, y, pred),
            (Domain::Interval(r), Domain::Interval(x), Domain::Interval(y)) => r.icmp(x, y, pred),
            (Domain::ArrayExact(r), Domain::ArrayExact(x), Domain::ArrayExact(y)) => {
                r.icmp(x, y, pred)
            }
            (r, _, _) => r.set_top(),
        }
    }

    /// Float comparison: fold the 1-bit outcome into this result value.
    pub fn fcmp(&mut self, a: &Domain, b: &Domain, pred: FloatPredicate) {
        let outcome = match (a, b) {
            (Domain::Float(x), Domain::Float(y)) => x.compare(y, pred),
            _ => CmpOutcome::both(),
        };
        self.set_cmp_outcome(outcome);
    }

    /// Write a comparison outcome into a 1-bit integer value.
    pub fn set_cmp_outcome(&mut self, outcome: CmpOutcome) {
        match self {
            Domain::Product(p) => p.set_cmp_outcome(outcome),
            Domain::Bitfield(b) => b.set_cmp_outcome(outcome),
            Domain::Set(s) => s.set_cmp_outcome(outcome),
            Domain::Interval(i) => i.set_cmp_outcome(outcome),
            other => {
                if outcome.is_empty() {
                    other.set_bottom()
                } else {
                    other.set_top()
                }
            }
        }
    }

    /// Conversion: fold `op(value)` into this result value.
    ///
    /// Pointer re-wrapping casts (`bitcast`, `ptrtoint`, `inttoptr`) are
    /// handled by the interpreter, which owns the type information; applying
    /// them here saturates.
    pub fn cast(&mut self, op: CastOp, value: &Domain) {
        match op {
            CastOp::Trunc | CastOp::Zext | CastOp::Sext => match (self, value) {
                (Domain::Product(r), Domain::Product(v)) => r.cast_members(op, v),
                (Domain::Bitfield(r), Domain::Bitfield(v)) => r.int_cast(op, v),
                (Domain::Set(r), Domain::Set(v)) => r.int_cast(op, v),
                (Domain::Interval(r), Domain::Interval(v)) => r.int_cast(op, v),
                (r, _) => r.set_top(),
            },
            CastOp::FpTrunc | CastOp::FpExt => match (self, value) {
                (Domain::Float(r), Domain::Float(v)) => r.convert(v),
                (r, _) => r.set_top(),
            },
            CastOp::FpToUi => self.float_to_int(value, false),
            CastOp::FpToSi => self.float_to_int(value, true),
            CastOp::UiToFp => match (self, value) {
                (Domain::Float(r), v) => r.from_int(v, false),
                (r, _) => r.set_top(),
            },
            CastOp::SiToFp => match (self, value) {
                (Domain::Float(r), v) => r.from_int(v, true),
                (r, _) => r.set_top(),
            },
            CastOp::BitCast | CastOp::PtrToInt | CastOp::IntToPtr => self.set_top(),
        }
    }

    fn float_to_int(&mut self, value: &Domain, signed: bool) {
        let Domain::Float(float) = value else {
            self.set_top();
            return;
        };
        match self {
            Domain::Product(p) => p.from_float(float, signed),
            other => other.float_to_int_member(float, signed),
        }
    }

    /// Float-to-integer conversion on a single product member.
    pub(crate) fn float_to_int_member(&mut self, value: &FloatInterval, signed: bool) {
        match self {
            Domain::Set(s) => s.from_float(value, signed),
            Domain::Interval(i) => i.from_float(value, signed),
            other => other.set_top(),
        }
    }

    /// Tighten this member from the collaboration message.
    pub(crate) fn refine(&mut self, msg: &Message) {
        match self {
            Domain::Bitfield(b) => b.refine(msg),
            Domain::Set(s) => s.refine(msg),
            Domain::Interval(i) => i.refine(msg),
            _ => {}
        }
    }

    /// Publish this member's knowledge into the collaboration message.
    pub(crate) fn extract(&self, msg: &mut Message) {
        match self {
            Domain::Bitfield(b) => b.extract(msg),
            Domain::Set(s) => s.extract(msg),
            Domain::Interval(i) => i.extract(msg),
            _ => {}
        }
    }

    /// Read one element of an array value.
    pub fn extract_element(&self, index: &Domain) -> Domain {
        match self {
            Domain::Product(_) if self.int_width().is_some() => {
                let mut result = self.clone();
                result.set_top();
                result
            }
            Domain::Product(p) => p.extract_element(index),
            Domain::ArrayExact(a) => a.extract_element(index),
            Domain::ArraySingle(a) => a.extract_element(),
            Domain::StringPrefix(s) => s.extract_element(index),
            Domain::StringSuffix(s) => s.extract_element(index),
            Domain::StringTrie(t) => t.extract_element(index),
            other => {
                let mut result = other.clone();
                result.set_top();
                result
            }
        }
    }

    /// Fold "array with one element replaced" into this result value.
    pub fn insert_element(&mut self, array: &Domain, element: &Domain, index: &Domain) {
        match (self, array) {
            (Domain::Product(r), Domain::Product(a)) => r.insert_element(a, element, index),
            (Domain::ArrayExact(r), Domain::ArrayExact(a)) => r.insert_element(a, element, index),
            (Domain::ArraySingle(r), Domain::ArraySingle(a)) => r.insert_element(a, element),
            (r @ Domain::StringPrefix(_), Domain::StringPrefix(a)) => {
                *r = Domain::StringPrefix(a.clone());
                let Domain::StringPrefix(inner) = r else {
                    unreachable!()
                };
                inner.invalidate_from(index);
            }
            (r, _) => r.set_top(),
        }
    }

    /// Fold a two-vector lane permutation into this result value.
    pub fn shuffle_vector(&mut self, a: &Domain, b: &Domain, mask: &[u32]) {
        match (self, a, b) {
            (Domain::Product(r), Domain::Product(x), Domain::Product(y)) => {
                r.shuffle_vector(x, y, mask)
            }
            (Domain::ArrayExact(r), Domain::ArrayExact(x), Domain::ArrayExact(y)) => {
                r.shuffle_vector(x, y, mask)
            }
            (Domain::ArraySingle(r), Domain::ArraySingle(x), Domain::ArraySingle(y)) => {
                r.shuffle_vector(x, y)
            }
            (r, _, _) => r.set_top(),
        }
    }

    /// Read a nested aggregate member.
    pub fn extract_value(&self, indices: &[u32]) -> Domain {
        if indices.is_empty() {
            return self.clone();
        }
        match self {
            Domain::Product(_) if self.int_width().is_some() => {
                let mut result = self.clone();
                result.set_top();
                result
            }
            Domain::Product(p) => p.extract_value(indices),
            Domain::Struct(s) => s.extract_value(indices),
            Domain::ArrayExact(a) => a.extract_value(indices),
            Domain::ArraySingle(a) => a.extract_element().extract_value(&indices[1..]),
            other => {
                let mut result = other.clone();
                result.set_top();
                result
            }
        }
    }

    /// Fold "aggregate with one member replaced" into this result value.
    pub fn insert_value(&mut self, aggregate: &Domain, element: &Domain, indices: &[u32]) {
        if indices.is_empty() {
            *self = element.clone();
            return;
        }
        match (self, aggregate) {
            (Domain::Product(r), Domain::Product(a)) => r.insert_value(a, element, indices),
            (Domain::Struct(r), Domain::Struct(a)) => r.insert_value(a, element, indices),
            (Domain::ArrayExact(r), Domain::ArrayExact(a)) => r.insert_value(a, element, indices),
            (Domain::ArraySingle(r), Domain::ArraySingle(a)) => r.insert_element(a, element),
            (r, _) => r.set_top(),
        }
    }

    /// Read a value of type `ty` at an abstract byte offset inside this
    /// value, as a memory block would serve a `load`.
    pub fn load(&self, ty: &Type, offset: &Domain) -> Domain {
        match self {
            // An integer product is itself the scalar being read.
            Domain::Product(_) if self.int_width().is_some() => scalar_load(self, ty, offset),
            Domain::Product(p) => p.load(ty, offset),
            Domain::ArrayExact(a) => a.load(ty, offset),
            Domain::ArraySingle(a) => a.load(ty, offset),
            Domain::StringPrefix(s) => s.load(ty, offset),
            Domain::StringSuffix(s) => s.load(ty, offset),
            Domain::StringTrie(t) => t.load(ty, offset),
            Domain::Struct(s) => s.load(ty, offset),
            scalar => scalar_load(scalar, ty, offset),
        }
    }

    /// Write `value` at an abstract byte offset inside this value, as a
    /// memory block would serve a `store`.
    ///
    /// `single_target` is true only when the caller proved that exactly one
    /// block is written; otherwise the write is weak and joins.
    pub fn store(&mut self, value: &Domain, offset: &Domain, single_target: bool) {
        match self {
            Domain::Product(_) if self.int_width().is_some() => {
                scalar_store(self, value, offset, single_target)
            }
            Domain::Product(p) => p.store(value, offset, single_target),
            Domain::ArrayExact(a) => a.store(value, offset, single_target),
            Domain::ArraySingle(a) => a.store(value, offset, single_target),
            Domain::StringPrefix(s) => s.store(value, offset),
            Domain::StringSuffix(s) => s.store(value, offset),
            Domain::StringTrie(t) => t.store(value, offset),
            Domain::Struct(s) => s.store(value, offset, single_target),
            scalar => scalar_store(scalar, value, offset, single_target),
        }
    }

    // --- Integer queries -------------------------------------------------

    /// Tightest known unsigned lower bound across the value's domains.
    pub fn unsigned_min(&self) -> Option<ApInt> {
        match self {
            Domain::Bitfield(b) => b.unsigned_min(),
            Domain::Set(s) => s.unsigned_min(),
            Domain::Interval(i) => i.unsigned_min(),
            Domain::Product(p) => p.fold_members(Self::unsigned_min, ApInt::umax),
            _ => None,
        }
    }

    /// Tightest known unsigned upper bound across the value's domains.
    pub fn unsigned_max(&self) -> Option<ApInt> {
        match self {
            Domain::Bitfield(b) => b.unsigned_max(),
            Domain::Set(s) => s.unsigned_max(),
            Domain::Interval(i) => i.unsigned_max(),
            Domain::Product(p) => p.fold_members(Self::unsigned_max, ApInt::umin),
            _ => None,
        }
    }

    /// Tightest known signed lower bound across the value's domains.
    pub fn signed_min(&self) -> Option<ApInt> {
        match self {
            Domain::Bitfield(b) => b.signed_min(),
            Domain::Set(s) => s.signed_min(),
            Domain::Interval(i) => i.signed_min(),
            Domain::Product(p) => p.fold_members(Self::signed_min, ApInt::smax),
            _ => None,
        }
    }

    /// Tightest known signed upper bound across the value's domains.
    pub fn signed_max(&self) -> Option<ApInt> {
        match self {
            Domain::Bitfield(b) => b.signed_max(),
            Domain::Set(s) => s.signed_max(),
            Domain::Interval(i) => i.signed_max(),
            Domain::Product(p) => p.fold_members(Self::signed_max, ApInt::smin),
            _ => None,
        }
    }

    /// The single concrete value this integer represents, if exactly one.
    pub fn as_singleton(&self) -> Option<ApInt> {
        let min = self.unsigned_min()?;
        let max = self.unsigned_max()?;
        (min == max).then_some(min)
    }

    /// Bit width, when this is an integer value.
    pub fn int_width(&self) -> Option<u32> {
        match self {
            Domain::Bitfield(b) => Some(b.width()),
            Domain::Set(s) => Some(s.width()),
            Domain::Interval(i) => Some(i.width()),
            Domain::Product(p) => p.members().iter().find_map(Self::int_width),
            _ => None,
        }
    }

    /// The bitfield member of an integer value, if any.
    pub fn bitfield(&self) -> Option<&Bitfield> {
        match self {
            Domain::Bitfield(b) => Some(b),
            Domain::Product(p) => p.members().iter().find_map(Self::bitfield),
            _ => None,
        }
    }

    /// The set-of-constants view of the value, when it is exact.
    pub fn known_values(&self) -> Option<Vec<u64>> {
        match self {
            Domain::Set(s) => s.values(),
            Domain::Product(p) => p.members().iter().find_map(Self::known_values),
            _ => None,
        }
    }
}

/// Byte offsets a memory access may touch, concretized from an integer
/// domain for block-level loads and stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OffsetHint {
    /// No offset at all (bottom index).
    None,
    /// Exactly these offsets.
    Values(Vec<u64>),
    /// Anywhere in the inclusive range.
    Range(u64, u64),
    /// Anywhere.
    Any,
}

pub(crate) fn offset_hint(offset: &Domain) -> OffsetHint {
    if offset.is_bottom() {
        return OffsetHint::None;
    }
    if let Some(values) = offset.known_values() {
        return OffsetHint::Values(values);
    }
    match (offset.unsigned_min(), offset.unsigned_max()) {
        (Some(min), Some(max)) => OffsetHint::Range(min.as_u64(), max.as_u64()),
        _ => OffsetHint::Any,
    }
}

/// Whether `offset` is known to be exactly zero.
pub(crate) fn offset_is_zero(offset: &Domain) -> bool {
    matches!(offset.as_singleton(), Some(v) if v.is_zero())
}

/// Whether two domains abstract the same kind of concrete value and may be
/// combined without aborting. Used before weak-update joins, where a
/// mismatch means "the memory is being reinterpreted" and saturates instead.
pub(crate) fn same_shape(a: &Domain, b: &Domain) -> bool {
    match (a, b) {
        (Domain::Bitfield(x), Domain::Bitfield(y)) => x.width() == y.width(),
        (Domain::Set(x), Domain::Set(y)) => x.width() == y.width(),
        (Domain::Interval(x), Domain::Interval(y)) => x.width() == y.width(),
        (Domain::Float(x), Domain::Float(y)) => x.kind() == y.kind(),
        (Domain::Pointer(_), Domain::Pointer(_)) => true,
        (Domain::ArrayExact(x), Domain::ArrayExact(y)) => {
            x.len() == y.len() && x.element_type() == y.element_type()
        }
        (Domain::ArraySingle(x), Domain::ArraySingle(y)) => x.element_type() == y.element_type(),
        (Domain::StringPrefix(_), Domain::StringPrefix(_))
        | (Domain::StringSuffix(_), Domain::StringSuffix(_))
        | (Domain::StringTrie(_), Domain::StringTrie(_)) => true,
        (Domain::Struct(x), Domain::Struct(y)) => x.members().len() == y.members().len(),
        (Domain::Product(x), Domain::Product(y)) => {
            x.members().len() == y.members().len()
                && x.members()
                    .iter()
                    .zip(y.members())
                    .all(|(m, n)| same_shape(m, n))
        }
        _ => false,
    }
}

fn scalar_matches(scalar: &Domain, ty: &Type) -> bool {
    match scalar {
        Domain::Float(f) => ty.float_kind() == Some(f.kind()),
        Domain::Pointer(_) => matches!(ty, Type::Ptr(_)),
        int => match (int.int_width(), ty.int_bits()) {
            (Some(width), Some(bits)) => width == bits,
            _ => false,
        },
    }
}

fn scalar_load(scalar: &Domain, ty: &Type, offset: &Domain) -> Domain {
    if offset_is_zero(offset) && scalar_matches(scalar, ty) {
        scalar.clone()
    } else {
        Domain::top_of(ty)
    }
}

fn scalar_store(scalar: &mut Domain, value: &Domain, offset: &Domain, single_target: bool) {
    let compatible = match (&*scalar, value) {
        (Domain::Float(a), Domain::Float(b)) => a.kind() == b.kind(),
        (Domain::Pointer(_), Domain::Pointer(_)) => true,
        (a, b) => {
            matches!((a.int_width(), b.int_width()), (Some(x), Some(y)) if x == y)
        }
    };

    if offset_is_zero(offset) && compatible {
        if single_target {
            *scalar = value.clone();
        } else {
            scalar.join(value);
        }
    } else {
        scalar.set_top();
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        each!(self, inner => fmt::Display::fmt(inner, f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_bottom_is_a_three_way_product() {
        let value = Domain::bottom_of(&Type::i32());
        let Domain::Product(product) = &value else {
            panic!("integers must be products");
        };
        assert_eq!(product.members().len(), 3);
        assert!(matches!(product.members()[0], Domain::Bitfield(_)));
        assert!(matches!(product.members()[1], Domain::Set(_)));
        assert!(matches!(product.members()[2], Domain::Interval(_)));
        assert!(value.is_bottom());
        assert!(!value.is_top());
    }

    #[test]
    fn constants_are_singletons() {
        let value = Domain::int_constant(ApInt::new(32, 8));
        assert_eq!(value.as_singleton(), Some(ApInt::new(32, 8)));
        assert_eq!(value.known_values(), Some(vec![8]));
    }

    #[test]
    fn top_of_saturates_every_member() {
        let value = Domain::top_of(&Type::array(Type::i8(), 4));
        assert!(value.is_top());
        assert!(!value.is_bottom());
    }

    #[test]
    #[should_panic(expected = "domain mismatch")]
    fn joining_mismatched_shapes_is_a_bug() {
        let mut a = Domain::bottom_of(&Type::f64());
        let b = Domain::bottom_of(&Type::ptr(Type::i8()));
        a.join(&b);
    }
}
