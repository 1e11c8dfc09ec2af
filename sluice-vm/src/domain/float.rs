//! Float range domain.

use core::fmt;

use sluice_ir::{BinaryOp, FloatKind, FloatPredicate};

use crate::{
    domain::{CmpOutcome, Domain},
    error::{bug, Bug},
};

/// Tracks a closed range `[lo, hi]` of float values plus whether NaN is
/// possible.
///
/// The endpoints are kept in `f64`, which represents every value of the
/// narrower kinds exactly; range arithmetic rounds outward so the interval
/// stays an over-approximation. `range == false` with `nan == true` is the
/// "NaN only" value; neither flag set is bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatInterval {
    kind: FloatKind,
    top: bool,
    /// Whether `[lo, hi]` is meaningful.
    range: bool,
    lo: f64,
    hi: f64,
    nan: bool,
}

impl FloatInterval {
    /// Bottom value of the given precision.
    pub fn bottom(kind: FloatKind) -> Self {
        Self {
            kind,
            top: false,
            range: false,
            lo: 0.0,
            hi: 0.0,
            nan: false,
        }
    }

    /// Exact value (NaN constants become the NaN-only value).
    pub fn constant(kind: FloatKind, value: f64) -> Self {
        let mut result = Self::bottom(kind);
        if value.is_nan() {
            result.nan = true;
        } else {
            result.range = true;
            result.lo = value;
            result.hi = value;
        }
        result
    }

    /// Precision of the abstracted values.
    pub const fn kind(&self) -> FloatKind {
        self.kind
    }

    /// The `[lo, hi]` range, when one is known. Endpoints may be infinite.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        (!self.top && self.range).then_some((self.lo, self.hi))
    }

    /// The finite `[lo, hi]` range, when one is known.
    pub fn finite_bounds(&self) -> Option<(f64, f64)> {
        match self.bounds() {
            Some((lo, hi)) if lo.is_finite() && hi.is_finite() => Some((lo, hi)),
            _ => None,
        }
    }

    /// Whether NaN is a possible value.
    pub fn may_be_nan(&self) -> bool {
        self.top || self.nan
    }

    /// The single integral value represented, if exactly one and not NaN.
    pub fn as_integral_singleton(&self) -> Option<i64> {
        if self.top || self.nan || !self.range || self.lo != self.hi {
            return None;
        }
        let value = self.lo;
        (value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64)
            .then_some(value as i64)
    }

    fn check_kind(&self, other: &Self, operation: &'static str) {
        if self.kind != other.kind {
            bug(Bug::DomainMismatch {
                operation,
                lhs: format!("float {}", self.kind),
                rhs: format!("float {}", other.kind),
            });
        }
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether no value is represented.
    pub fn is_bottom(&self) -> bool {
        !self.top && !self.range && !self.nan
    }

    /// Forget everything.
    pub fn set_bottom(&mut self) {
        *self = Self::bottom(self.kind);
    }

    /// Whether every value, NaN included, is represented.
    pub const fn is_top(&self) -> bool {
        self.top
    }

    /// Admit every value.
    pub fn set_top(&mut self) {
        *self = Self::bottom(self.kind);
        self.top = true;
    }

    /// Least upper bound: range hull, NaN union.
    pub fn join(&mut self, other: &Self) {
        self.check_kind(other, "join");
        if other.top {
            self.set_top();
        }
        if self.top {
            return;
        }
        self.nan |= other.nan;
        if other.range {
            if self.range {
                self.lo = self.lo.min(other.lo);
                self.hi = self.hi.max(other.hi);
            } else {
                self.range = true;
                self.lo = other.lo;
                self.hi = other.hi;
            }
        }
    }

    /// Greatest lower bound: range intersection, NaN intersection.
    pub fn meet(&mut self, other: &Self) {
        self.check_kind(other, "meet");
        if other.top {
            return;
        }
        if self.top {
            *self = other.clone();
            return;
        }
        self.nan &= other.nan;
        if self.range {
            if other.range {
                self.lo = self.lo.max(other.lo);
                self.hi = self.hi.min(other.hi);
                if self.lo > self.hi {
                    self.range = false;
                    self.lo = 0.0;
                    self.hi = 0.0;
                }
            } else {
                self.range = false;
                self.lo = 0.0;
                self.hi = 0.0;
            }
        }
    }

    /// Containment order.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        self.check_kind(other, "less_or_equal");
        if other.top || self.is_bottom() {
            return true;
        }
        if self.top {
            return false;
        }
        if self.nan && !other.nan {
            return false;
        }
        if self.range {
            other.range && other.lo <= self.lo && self.hi <= other.hi
        } else {
            true
        }
    }

    /// Precision estimate.
    pub fn accuracy(&self) -> f32 {
        if self.is_bottom() {
            1.0
        } else if self.top {
            0.0
        } else if self.range && self.lo == self.hi && !self.nan {
            1.0
        } else {
            0.5
        }
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>()
    }

    /// Become exactly zero.
    pub fn set_zero(&mut self) {
        *self = Self::constant(self.kind, 0.0);
    }

    // --- Transfer functions ---------------------------------------------

    /// Fold a float binary operation into this value with outward-rounded
    /// endpoint arithmetic.
    pub fn binary(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        a.check_kind(b, "binary");
        if a.is_bottom() || b.is_bottom() {
            self.set_bottom();
            return;
        }
        if a.top || b.top {
            self.set_top();
            return;
        }

        *self = Self::bottom(self.kind);
        // Any NaN operand flows through every float operation.
        self.nan = a.nan || b.nan;

        let (Some((alo, ahi)), Some((blo, bhi))) = (a.bounds(), b.bounds()) else {
            // At least one operand is NaN-only; so is the result.
            self.nan = true;
            return;
        };

        match op {
            BinaryOp::FAdd => self.from_candidates(&[alo + blo, ahi + bhi]),
            BinaryOp::FSub => self.from_candidates(&[alo - bhi, ahi - blo]),
            BinaryOp::FMul => {
                self.from_candidates(&[alo * blo, alo * bhi, ahi * blo, ahi * bhi])
            }
            BinaryOp::FDiv => {
                if blo <= 0.0 && 0.0 <= bhi {
                    // Division by a range containing zero: infinities and,
                    // for a zero dividend, NaN.
                    self.range = true;
                    self.lo = f64::NEG_INFINITY;
                    self.hi = f64::INFINITY;
                    self.nan = true;
                } else {
                    self.from_candidates(&[alo / blo, alo / bhi, ahi / blo, ahi / bhi])
                }
            }
            BinaryOp::FRem => {
                if alo == ahi && blo == bhi && bhi != 0.0 && alo.is_finite() {
                    self.from_candidates(&[alo % blo]);
                } else {
                    self.set_top();
                }
            }
            _ => self.set_top(),
        }
    }

    /// Build the range from candidate endpoint results, widening one ULP
    /// outward and folding NaN candidates into the NaN flag.
    fn from_candidates(&mut self, candidates: &[f64]) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        let mut any = false;
        for &c in candidates {
            if c.is_nan() {
                self.nan = true;
                continue;
            }
            any = true;
            lo = lo.min(c);
            hi = hi.max(c);
        }
        if any {
            self.range = true;
            self.lo = round_down(self.kind, lo);
            self.hi = round_up(self.kind, hi);
        }
    }

    /// Fold a comparison outcome out of this value and `other`.
    pub fn compare(&self, other: &Self, pred: FloatPredicate) -> CmpOutcome {
        self.check_kind(other, "fcmp");
        if self.is_bottom() || other.is_bottom() {
            return CmpOutcome::empty();
        }

        use FloatPredicate::*;
        match pred {
            False => return CmpOutcome::FALSE,
            True => return CmpOutcome::TRUE,
            _ => {}
        }

        let a_nan = self.may_be_nan();
        let b_nan = other.may_be_nan();
        let either_nan = a_nan || b_nan;
        let both_comparable = (self.top || self.range) && (other.top || other.range);

        if matches!(pred, Ord | Uno) {
            let mut outcome = CmpOutcome::empty();
            let ordered_possible = both_comparable;
            match pred {
                Ord => {
                    if ordered_possible {
                        outcome |= CmpOutcome::TRUE;
                    }
                    if either_nan {
                        outcome |= CmpOutcome::FALSE;
                    }
                }
                _ => {
                    if either_nan {
                        outcome |= CmpOutcome::TRUE;
                    }
                    if ordered_possible {
                        outcome |= CmpOutcome::FALSE;
                    }
                }
            }
            return outcome;
        }

        // Outcome of the ordered relation over the ranges alone.
        let relation = match (self.relation_bounds(), other.relation_bounds()) {
            (Some((alo, ahi)), Some((blo, bhi))) => {
                let (may_true, may_false) = match pred {
                    Oeq | Ueq => (alo <= bhi && blo <= ahi, !(alo == ahi && blo == bhi && alo == blo)),
                    One | Une => {
                        let eq_possible = alo <= bhi && blo <= ahi;
                        let always_eq = alo == ahi && blo == bhi && alo == blo;
                        (!always_eq, eq_possible)
                    }
                    Ogt | Ugt => (ahi > blo, alo <= bhi),
                    Oge | Uge => (ahi >= blo, alo < bhi),
                    Olt | Ult => (alo < bhi, ahi >= blo),
                    Ole | Ule => (alo <= bhi, ahi > blo),
                    _ => (true, true),
                };
                let mut rel = CmpOutcome::empty();
                if may_true {
                    rel |= CmpOutcome::TRUE;
                }
                if may_false {
                    rel |= CmpOutcome::FALSE;
                }
                rel
            }
            _ => CmpOutcome::empty(),
        };

        let unordered_pred = matches!(pred, Ueq | Ugt | Uge | Ult | Ule | Une);
        let mut outcome = relation;
        if either_nan {
            // NaN makes ordered predicates false and unordered ones true.
            outcome |= if unordered_pred {
                CmpOutcome::TRUE
            } else {
                CmpOutcome::FALSE
            };
        }
        outcome
    }

    /// Bounds used for ordered-relation reasoning; top spans everything.
    fn relation_bounds(&self) -> Option<(f64, f64)> {
        if self.top {
            return Some((f64::NEG_INFINITY, f64::INFINITY));
        }
        self.bounds()
    }

    /// Fold a precision conversion (`fptrunc`/`fpext`) into this value.
    pub fn convert(&mut self, value: &Self) {
        *self = Self {
            kind: self.kind,
            ..value.clone()
        };
        if self.range {
            self.lo = round_down(self.kind, self.lo);
            self.hi = round_up(self.kind, self.hi);
        }
    }

    /// Fold an integer-to-float conversion into this value.
    pub fn from_int(&mut self, value: &Domain, signed: bool) {
        if value.is_bottom() {
            self.set_bottom();
            return;
        }
        *self = Self::bottom(self.kind);

        let bounds = if signed {
            value
                .signed_min()
                .zip(value.signed_max())
                .map(|(lo, hi)| (lo.as_i64() as f64, hi.as_i64() as f64))
        } else {
            value
                .unsigned_min()
                .zip(value.unsigned_max())
                .map(|(lo, hi)| (lo.as_u64() as f64, hi.as_u64() as f64))
        };

        match bounds {
            Some((lo, hi)) => {
                self.range = true;
                self.lo = round_down(self.kind, lo.next_down());
                self.hi = round_up(self.kind, hi.next_up());
            }
            None => self.set_top(),
        }
    }

    // --- Widening --------------------------------------------------------

    /// Endpoints that grew since the previous round jump to infinity.
    pub fn widen_from(&mut self, next: &Self) {
        if self.top || next.is_bottom() {
            return;
        }
        if next.top {
            self.set_top();
            return;
        }
        self.nan |= next.nan;
        if next.range {
            if !self.range {
                self.range = true;
                self.lo = next.lo;
                self.hi = next.hi;
                return;
            }
            if next.lo < self.lo {
                self.lo = f64::NEG_INFINITY;
            }
            if next.hi > self.hi {
                self.hi = f64::INFINITY;
            }
        }
    }
}

/// Nudge an endpoint down so it is representable at `kind` without
/// excluding any value the exact result admits.
fn round_down(kind: FloatKind, value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    match kind {
        FloatKind::Double => value,
        FloatKind::Single => {
            let narrowed = (value as f32) as f64;
            if narrowed > value {
                ((value as f32).next_down()) as f64
            } else {
                narrowed
            }
        }
        FloatKind::Half => value - half_ulp(value),
    }
}

/// Nudge an endpoint up; counterpart of [`round_down`].
fn round_up(kind: FloatKind, value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    match kind {
        FloatKind::Double => value,
        FloatKind::Single => {
            let narrowed = (value as f32) as f64;
            if narrowed < value {
                ((value as f32).next_up()) as f64
            } else {
                narrowed
            }
        }
        FloatKind::Half => value + half_ulp(value),
    }
}

/// Upper bound of the rounding error of an IEEE binary16 with a 10-bit
/// mantissa at this magnitude.
fn half_ulp(value: f64) -> f64 {
    let magnitude = value.abs();
    if magnitude < 6.104e-5 {
        // Subnormal grid.
        6.0e-8
    } else {
        magnitude * 2.0f64.powi(-10)
    }
}

impl fmt::Display for FloatInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "float ")?;
        if self.top {
            return write!(f, "top");
        }
        if self.is_bottom() {
            return write!(f, "bottom");
        }
        if self.range {
            write!(f, "[{}, {}]", self.lo, self.hi)?;
        }
        if self.nan {
            if self.range {
                write!(f, " ")?;
            }
            write!(f, "nan")?;
        }
        Ok(())
    }
}
