//! Signed/unsigned interval integer domain.

use core::fmt;
use std::collections::BTreeSet;

use sluice_ir::{BinaryOp, CastOp, IntPredicate};

use crate::{
    apint::ApInt,
    domain::{CmpOutcome, FloatInterval, Message},
    error::{bug, Bug},
};

/// One bound pair of an [`Interval`].
///
/// `top` marks the view as unconstrained; the bounds are then kept at their
/// zero defaults so derived equality stays semantic.
#[derive(Debug, Clone, Copy, PartialEq)]
struct View {
    top: bool,
    lo: ApInt,
    hi: ApInt,
}

impl View {
    fn reset(width: u32) -> Self {
        Self {
            top: false,
            lo: ApInt::zero(width),
            hi: ApInt::zero(width),
        }
    }

    fn saturated(width: u32) -> Self {
        Self {
            top: true,
            lo: ApInt::zero(width),
            hi: ApInt::zero(width),
        }
    }

    fn singleton(value: ApInt) -> Self {
        Self {
            top: false,
            lo: value,
            hi: value,
        }
    }

    fn bounded(lo: ApInt, hi: ApInt) -> Self {
        Self { top: false, lo, hi }
    }
}

/// Tracks a signed range and an unsigned range independently.
///
/// Each view has its own saturation flag: arithmetic that overflows one view
/// saturates that view only, the other may stay tight. A represented value
/// must satisfy both views, so the meet of the views' concretizations is the
/// domain's concretization.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    width: u32,
    bottom: bool,
    signed: View,
    unsigned: View,
}

impl Interval {
    /// Bottom value of the given width.
    pub fn bottom(width: u32) -> Self {
        debug_assert!((1..=64).contains(&width));
        Self {
            width,
            bottom: true,
            signed: View::reset(width),
            unsigned: View::reset(width),
        }
    }

    /// Exact value.
    pub fn constant(value: ApInt) -> Self {
        Self {
            width: value.width(),
            bottom: false,
            signed: View::singleton(value),
            unsigned: View::singleton(value),
        }
    }

    /// Interval from optional per-view bounds; views without bounds
    /// saturate. Used for comparison-driven refinements.
    pub fn from_bounds(
        width: u32,
        unsigned: Option<(ApInt, ApInt)>,
        signed: Option<(ApInt, ApInt)>,
    ) -> Self {
        let mut interval = Self::bottom(width);
        interval.bottom = false;
        interval.unsigned = match unsigned {
            Some((lo, hi)) => View::bounded(lo, hi),
            None => View::saturated(width),
        };
        interval.signed = match signed {
            Some((lo, hi)) => View::bounded(lo, hi),
            None => View::saturated(width),
        };
        interval.normalize();
        interval
    }

    /// Bit width.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Smallest unsigned value admitted.
    pub fn unsigned_min(&self) -> Option<ApInt> {
        (!self.bottom && !self.unsigned.top).then_some(self.unsigned.lo)
    }

    /// Largest unsigned value admitted.
    pub fn unsigned_max(&self) -> Option<ApInt> {
        (!self.bottom && !self.unsigned.top).then_some(self.unsigned.hi)
    }

    /// Smallest signed value admitted.
    pub fn signed_min(&self) -> Option<ApInt> {
        (!self.bottom && !self.signed.top).then_some(self.signed.lo)
    }

    /// Largest signed value admitted.
    pub fn signed_max(&self) -> Option<ApInt> {
        (!self.bottom && !self.signed.top).then_some(self.signed.hi)
    }

    /// The single value, if both views pin one down.
    pub fn as_singleton(&self) -> Option<ApInt> {
        if self.bottom {
            return None;
        }
        if !self.unsigned.top && self.unsigned.lo == self.unsigned.hi {
            return Some(self.unsigned.lo);
        }
        if !self.signed.top && self.signed.lo == self.signed.hi {
            return Some(self.signed.lo);
        }
        None
    }

    fn check_width(&self, other: &Self, operation: &'static str) {
        if self.width != other.width {
            bug(Bug::WidthMismatch {
                operation,
                lhs: self.width,
                rhs: other.width,
            });
        }
    }

    /// Re-establish representation invariants: an empty view empties the
    /// whole value, and bottom resets both views.
    fn normalize(&mut self) {
        if self.bottom {
            self.signed = View::reset(self.width);
            self.unsigned = View::reset(self.width);
            return;
        }
        let unsigned_empty = !self.unsigned.top && self.unsigned.hi.ult(&self.unsigned.lo);
        let signed_empty = !self.signed.top && self.signed.hi.slt(&self.signed.lo);
        if unsigned_empty || signed_empty {
            self.bottom = true;
            self.signed = View::reset(self.width);
            self.unsigned = View::reset(self.width);
        }
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether no value is represented.
    pub const fn is_bottom(&self) -> bool {
        self.bottom
    }

    /// Forget everything.
    pub fn set_bottom(&mut self) {
        self.bottom = true;
        self.normalize();
    }

    /// Whether both views are saturated.
    pub fn is_top(&self) -> bool {
        !self.bottom && self.signed.top && self.unsigned.top
    }

    /// Saturate both views.
    pub fn set_top(&mut self) {
        self.bottom = false;
        self.signed = View::saturated(self.width);
        self.unsigned = View::saturated(self.width);
    }

    /// Least upper bound: per-view hull.
    pub fn join(&mut self, other: &Self) {
        self.check_width(other, "join");
        if other.bottom {
            return;
        }
        if self.bottom {
            *self = other.clone();
            return;
        }

        if other.unsigned.top {
            self.unsigned = View::saturated(self.width);
        } else if !self.unsigned.top {
            self.unsigned.lo = self.unsigned.lo.umin(other.unsigned.lo);
            self.unsigned.hi = self.unsigned.hi.umax(other.unsigned.hi);
        }

        if other.signed.top {
            self.signed = View::saturated(self.width);
        } else if !self.signed.top {
            self.signed.lo = self.signed.lo.smin(other.signed.lo);
            self.signed.hi = self.signed.hi.smax(other.signed.hi);
        }
    }

    /// Greatest lower bound: per-view intersection. An intersection that
    /// empties either view empties the value.
    pub fn meet(&mut self, other: &Self) {
        self.check_width(other, "meet");
        if self.bottom {
            return;
        }
        if other.bottom {
            self.set_bottom();
            return;
        }

        if !other.unsigned.top {
            if self.unsigned.top {
                self.unsigned = other.unsigned;
            } else {
                self.unsigned.lo = self.unsigned.lo.umax(other.unsigned.lo);
                self.unsigned.hi = self.unsigned.hi.umin(other.unsigned.hi);
            }
        }

        if !other.signed.top {
            if self.signed.top {
                self.signed = other.signed;
            } else {
                self.signed.lo = self.signed.lo.smax(other.signed.lo);
                self.signed.hi = self.signed.hi.smin(other.signed.hi);
            }
        }

        self.normalize();
    }

    /// Per-view containment.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        self.check_width(other, "less_or_equal");
        if self.bottom {
            return true;
        }
        if other.bottom {
            return false;
        }

        let unsigned_ok = other.unsigned.top
            || (!self.unsigned.top
                && other.unsigned.lo.ule(&self.unsigned.lo)
                && self.unsigned.hi.ule(&other.unsigned.hi));

        let signed_ok = other.signed.top
            || (!self.signed.top
                && other.signed.lo.sle(&self.signed.lo)
                && self.signed.hi.sle(&other.signed.hi));

        unsigned_ok && signed_ok
    }

    /// Precision: the tighter of the two views.
    pub fn accuracy(&self) -> f32 {
        if self.bottom {
            return 1.0;
        }

        let full = ApInt::umax_value(self.width).as_u64() as f64;
        let unsigned = if self.unsigned.top {
            0.0
        } else {
            let range = self.unsigned.hi.as_u64() - self.unsigned.lo.as_u64();
            1.0 - (range as f64 / full.max(1.0))
        };
        let signed = if self.signed.top {
            0.0
        } else {
            let range = self.signed.hi.as_i64().wrapping_sub(self.signed.lo.as_i64()) as u64;
            1.0 - (range as f64 / full.max(1.0))
        };
        unsigned.max(signed) as f32
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>()
    }

    /// Become exactly zero.
    pub fn set_zero(&mut self) {
        *self = Self::constant(ApInt::zero(self.width));
    }

    // --- Transfer functions ---------------------------------------------

    /// Fold a binary operation into this value, computing each view from
    /// checked endpoint arithmetic. Overflow saturates the affected view
    /// only.
    pub fn binary(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        a.check_width(b, "binary");
        if a.bottom || b.bottom {
            self.set_bottom();
            return;
        }

        self.bottom = false;
        match op {
            BinaryOp::Add => {
                self.unsigned = unsigned_pairwise(self.width, a, b, ApInt::checked_uadd);
                self.signed = signed_pairwise(self.width, a, b, ApInt::checked_sadd);
            }
            BinaryOp::Sub => {
                self.unsigned = match (a.unsigned.top, b.unsigned.top) {
                    (false, false) => {
                        match (
                            a.unsigned.lo.checked_usub(b.unsigned.hi),
                            a.unsigned.hi.checked_usub(b.unsigned.lo),
                        ) {
                            (Some(lo), Some(hi)) => View::bounded(lo, hi),
                            _ => View::saturated(self.width),
                        }
                    }
                    _ => View::saturated(self.width),
                };
                self.signed = match (a.signed.top, b.signed.top) {
                    (false, false) => {
                        match (
                            a.signed.lo.checked_ssub(b.signed.hi),
                            a.signed.hi.checked_ssub(b.signed.lo),
                        ) {
                            (Some(lo), Some(hi)) => View::bounded(lo, hi),
                            _ => View::saturated(self.width),
                        }
                    }
                    _ => View::saturated(self.width),
                };
            }
            BinaryOp::Mul => {
                self.unsigned = unsigned_pairwise(self.width, a, b, ApInt::checked_umul);
                self.signed = signed_pairwise(self.width, a, b, ApInt::checked_smul);
            }
            BinaryOp::Udiv => self.udiv(a, b),
            BinaryOp::Sdiv => self.sdiv(a, b),
            BinaryOp::Urem => self.urem(a, b),
            BinaryOp::Srem => self.srem(a, b),
            BinaryOp::Shl | BinaryOp::Lshr | BinaryOp::Ashr => self.shift(op, a, b),
            BinaryOp::And => {
                // x & y never exceeds either operand.
                self.signed = View::saturated(self.width);
                self.unsigned = match (a.unsigned.top, b.unsigned.top) {
                    (false, false) => View::bounded(
                        ApInt::zero(self.width),
                        a.unsigned.hi.umin(b.unsigned.hi),
                    ),
                    (false, true) => View::bounded(ApInt::zero(self.width), a.unsigned.hi),
                    (true, false) => View::bounded(ApInt::zero(self.width), b.unsigned.hi),
                    (true, true) => View::saturated(self.width),
                };
                self.exact_on_singletons(op, a, b);
            }
            BinaryOp::Or => {
                // x | y is at least either operand.
                self.signed = View::saturated(self.width);
                self.unsigned = match (a.unsigned.top, b.unsigned.top) {
                    (false, false) => View::bounded(
                        a.unsigned.lo.umax(b.unsigned.lo),
                        ApInt::umax_value(self.width),
                    ),
                    _ => View::saturated(self.width),
                };
                self.exact_on_singletons(op, a, b);
            }
            BinaryOp::Xor => {
                self.signed = View::saturated(self.width);
                self.unsigned = View::saturated(self.width);
                self.exact_on_singletons(op, a, b);
            }
            _ => self.set_top(),
        }
        self.normalize();
    }

    fn exact_on_singletons(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        if let (Some(x), Some(y)) = (a.as_singleton(), b.as_singleton()) {
            let value = match op {
                BinaryOp::And => x.and(y),
                BinaryOp::Or => x.or(y),
                BinaryOp::Xor => x.xor(y),
                _ => return,
            };
            *self = Self::constant(value);
        }
    }

    fn udiv(&mut self, a: &Self, b: &Self) {
        self.signed = View::saturated(self.width);

        // A divisor that may be zero makes the whole result unknown.
        let divisor_nonzero =
            !b.unsigned.top && !b.unsigned.lo.is_zero();
        if !divisor_nonzero || a.unsigned.top {
            self.unsigned = View::saturated(self.width);
            return;
        }

        let lo = a
            .unsigned
            .lo
            .checked_udiv(b.unsigned.hi)
            .unwrap_or_else(|| ApInt::zero(self.width));
        let hi = a
            .unsigned
            .hi
            .checked_udiv(b.unsigned.lo)
            .unwrap_or_else(|| ApInt::umax_value(self.width));
        self.unsigned = View::bounded(lo, hi);
    }

    fn sdiv(&mut self, a: &Self, b: &Self) {
        self.unsigned = View::saturated(self.width);

        let divisor_excludes_zero = !b.signed.top
            && (b.signed.lo.as_i64() > 0 || b.signed.hi.as_i64() < 0);
        if !divisor_excludes_zero || a.signed.top {
            self.signed = View::saturated(self.width);
            return;
        }

        let mut lo: Option<ApInt> = None;
        let mut hi: Option<ApInt> = None;
        for x in [a.signed.lo, a.signed.hi] {
            for y in [b.signed.lo, b.signed.hi] {
                let Some(q) = x.checked_sdiv(y) else {
                    self.signed = View::saturated(self.width);
                    return;
                };
                lo = Some(lo.map_or(q, |l| l.smin(q)));
                hi = Some(hi.map_or(q, |h| h.smax(q)));
            }
        }
        self.signed = View::bounded(lo.expect("endpoints visited"), hi.expect("endpoints visited"));
    }

    fn urem(&mut self, a: &Self, b: &Self) {
        self.signed = View::saturated(self.width);

        let divisor_nonzero = !b.unsigned.top && !b.unsigned.lo.is_zero();
        if !divisor_nonzero {
            self.unsigned = View::saturated(self.width);
            return;
        }

        // The dividend passes through untouched when it cannot reach the
        // divisor.
        if !a.unsigned.top && a.unsigned.hi.ult(&b.unsigned.lo) {
            self.unsigned = a.unsigned;
            return;
        }

        let hi = b.unsigned.hi.wrapping_sub(ApInt::one(self.width));
        self.unsigned = View::bounded(ApInt::zero(self.width), hi);
    }

    fn srem(&mut self, a: &Self, b: &Self) {
        self.unsigned = View::saturated(self.width);

        if let (Some(x), Some(y)) = (a.as_singleton(), b.as_singleton()) {
            match x.checked_srem(y) {
                Some(r) => {
                    self.signed = View::singleton(r);
                    self.unsigned = View::singleton(r);
                }
                None => self.set_top(),
            }
            return;
        }

        let divisor_excludes_zero = !b.signed.top
            && (b.signed.lo.as_i64() > 0 || b.signed.hi.as_i64() < 0);
        if !divisor_excludes_zero {
            self.signed = View::saturated(self.width);
            return;
        }

        // |result| is below |divisor|.
        let magnitude = b
            .signed
            .lo
            .as_i64()
            .unsigned_abs()
            .max(b.signed.hi.as_i64().unsigned_abs())
            .saturating_sub(1);
        let bound = magnitude.min(ApInt::smax_value(self.width).as_i64() as u64) as i64;
        self.signed = View::bounded(
            ApInt::from_i64(self.width, -bound),
            ApInt::from_i64(self.width, bound),
        );
    }

    fn shift(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        let Some(amount) = b.as_singleton() else {
            self.set_top();
            return;
        };
        let k = amount.as_u64().min(u64::from(u32::MAX)) as u32;

        match op {
            BinaryOp::Shl => {
                if k >= self.width {
                    *self = Self::constant(ApInt::zero(self.width));
                    return;
                }
                let factor = ApInt::one(self.width).shl(k);
                let factor_interval = Self::constant(factor);
                self.binary(BinaryOp::Mul, a, &factor_interval);
            }
            BinaryOp::Lshr => {
                self.signed = View::saturated(self.width);
                self.unsigned = if a.unsigned.top {
                    // The shift bounds the result even when the input view
                    // is saturated.
                    View::bounded(
                        ApInt::zero(self.width),
                        ApInt::umax_value(self.width).lshr(k),
                    )
                } else {
                    View::bounded(a.unsigned.lo.lshr(k), a.unsigned.hi.lshr(k))
                };
                if k > 0 {
                    // The high bit is clear, so the unsigned bounds are
                    // valid signed bounds too.
                    self.signed = self.unsigned;
                }
            }
            BinaryOp::Ashr => {
                self.unsigned = View::saturated(self.width);
                self.signed = if a.signed.top {
                    View::bounded(
                        ApInt::smin_value(self.width).ashr(k),
                        ApInt::smax_value(self.width).ashr(k),
                    )
                } else {
                    View::bounded(a.signed.lo.ashr(k), a.signed.hi.ashr(k))
                };
                if !self.signed.top && !self.signed.lo.is_negative() {
                    self.unsigned = self.signed;
                }
            }
            _ => unreachable!(),
        }
    }

    /// Fold an integer comparison outcome into this 1-bit value, by range
    /// reasoning on whichever views are tight.
    pub fn icmp(&mut self, a: &Self, b: &Self, pred: IntPredicate) {
        a.check_width(b, "icmp");
        if a.bottom || b.bottom {
            self.set_cmp_outcome(CmpOutcome::empty());
            return;
        }
        self.set_cmp_outcome(compare(a, b, pred));
    }

    /// Write a comparison outcome into this 1-bit value.
    pub fn set_cmp_outcome(&mut self, outcome: CmpOutcome) {
        debug_assert_eq!(self.width, 1);
        match (outcome.contains(CmpOutcome::FALSE), outcome.contains(CmpOutcome::TRUE)) {
            (false, false) => self.set_bottom(),
            (true, false) => *self = Self::constant(ApInt::zero(1)),
            (false, true) => *self = Self::constant(ApInt::one(1)),
            (true, true) => {
                // [0, 1] on both views.
                self.bottom = false;
                self.unsigned = View::bounded(ApInt::zero(1), ApInt::one(1));
                self.signed = View::bounded(ApInt::from_i64(1, -1), ApInt::zero(1));
            }
        }
    }

    /// Fold an integer cast into this value.
    pub fn int_cast(&mut self, op: CastOp, value: &Self) {
        if value.bottom {
            self.set_bottom();
            return;
        }
        self.bottom = false;

        match op {
            CastOp::Trunc => {
                self.unsigned = match value.unsigned_max() {
                    Some(hi) if hi.ule(&ApInt::umax_value(self.width).zext(value.width)) => {
                        View::bounded(value.unsigned.lo.trunc(self.width), hi.trunc(self.width))
                    }
                    _ => View::saturated(self.width),
                };
                let smin = ApInt::smin_value(self.width).sext(value.width);
                let smax = ApInt::smax_value(self.width).sext(value.width);
                self.signed = match (value.signed_min(), value.signed_max()) {
                    (Some(lo), Some(hi)) if smin.sle(&lo) && hi.sle(&smax) => View::bounded(
                        ApInt::from_i64(self.width, lo.as_i64()),
                        ApInt::from_i64(self.width, hi.as_i64()),
                    ),
                    _ => View::saturated(self.width),
                };
            }
            CastOp::Zext => {
                // The source width bounds the result even for a saturated
                // input view.
                let (lo, hi) = match (value.unsigned_min(), value.unsigned_max()) {
                    (Some(lo), Some(hi)) => (lo.zext(self.width), hi.zext(self.width)),
                    _ => (
                        ApInt::zero(self.width),
                        ApInt::umax_value(value.width).zext(self.width),
                    ),
                };
                self.unsigned = View::bounded(lo, hi);
                // Zero-extended values are non-negative at the wider width.
                self.signed = View::bounded(lo, hi);
            }
            CastOp::Sext => {
                let (lo, hi) = match (value.signed_min(), value.signed_max()) {
                    (Some(lo), Some(hi)) => (lo.sext(self.width), hi.sext(self.width)),
                    _ => (
                        ApInt::smin_value(value.width).sext(self.width),
                        ApInt::smax_value(value.width).sext(self.width),
                    ),
                };
                self.signed = View::bounded(lo, hi);
                self.unsigned = if lo.is_negative() {
                    View::saturated(self.width)
                } else {
                    View::bounded(lo, hi)
                };
            }
            _ => self.set_top(),
        }
        self.normalize();
    }

    /// Fold a float-to-integer conversion into this value.
    pub fn from_float(&mut self, value: &FloatInterval, signed: bool) {
        if value.is_bottom() {
            self.set_bottom();
            return;
        }
        let Some((lo, hi)) = value.finite_bounds() else {
            self.set_top();
            return;
        };
        if value.may_be_nan() {
            self.set_top();
            return;
        }

        // Conversion truncates toward zero.
        let lo = lo.max(i64::MIN as f64).trunc() as i64;
        let hi = hi.min(i64::MAX as f64).trunc() as i64;

        self.bottom = false;
        if signed {
            let smin = ApInt::smin_value(self.width).as_i64();
            let smax = ApInt::smax_value(self.width).as_i64();
            if lo < smin || hi > smax {
                self.set_top();
                return;
            }
            self.signed = View::bounded(
                ApInt::from_i64(self.width, lo),
                ApInt::from_i64(self.width, hi),
            );
            self.unsigned = if lo >= 0 {
                self.signed
            } else {
                View::saturated(self.width)
            };
        } else {
            let umax = ApInt::umax_value(self.width).as_u64();
            if lo < 0 || hi < 0 || (hi as u64) > umax {
                self.set_top();
                return;
            }
            self.unsigned = View::bounded(
                ApInt::new(self.width, lo as u64),
                ApInt::new(self.width, hi as u64),
            );
            self.signed = if (hi as u64) <= ApInt::smax_value(self.width).as_u64() {
                self.unsigned
            } else {
                View::saturated(self.width)
            };
        }
        self.normalize();
    }

    // --- Widening --------------------------------------------------------

    /// Numerical widening against the value from the previous round: any
    /// endpoint that grew jumps to the nearest admissible threshold, or
    /// saturates its view when no threshold remains.
    pub fn widen_from(
        &mut self,
        next: &Self,
        unsigned_thresholds: &BTreeSet<u64>,
        signed_thresholds: &BTreeSet<i64>,
    ) {
        if next.bottom || self.bottom {
            return;
        }

        if !self.unsigned.top {
            if next.unsigned.top {
                self.unsigned = View::saturated(self.width);
            } else {
                let umax = ApInt::umax_value(self.width).as_u64();
                if self.unsigned.hi.ult(&next.unsigned.hi) {
                    match unsigned_thresholds
                        .range(next.unsigned.hi.as_u64()..=umax)
                        .next()
                    {
                        Some(&t) => self.unsigned.hi = ApInt::new(self.width, t),
                        None => self.unsigned = View::saturated(self.width),
                    }
                }
                if !self.unsigned.top && next.unsigned.lo.ult(&self.unsigned.lo) {
                    match unsigned_thresholds
                        .range(..=next.unsigned.lo.as_u64())
                        .next_back()
                    {
                        Some(&t) => self.unsigned.lo = ApInt::new(self.width, t),
                        None => self.unsigned = View::saturated(self.width),
                    }
                }
            }
        }

        if !self.signed.top {
            if next.signed.top {
                self.signed = View::saturated(self.width);
            } else {
                let smax = ApInt::smax_value(self.width).as_i64();
                let smin = ApInt::smin_value(self.width).as_i64();
                if self.signed.hi.slt(&next.signed.hi) {
                    match signed_thresholds.range(next.signed.hi.as_i64()..=smax).next() {
                        Some(&t) => self.signed.hi = ApInt::from_i64(self.width, t),
                        None => self.signed = View::saturated(self.width),
                    }
                }
                if !self.signed.top && next.signed.lo.slt(&self.signed.lo) {
                    match signed_thresholds
                        .range(smin..=next.signed.lo.as_i64())
                        .next_back()
                    {
                        Some(&t) => self.signed.lo = ApInt::from_i64(self.width, t),
                        None => self.signed = View::saturated(self.width),
                    }
                }
            }
        }
    }

    // --- Reduced-product collaboration ----------------------------------

    /// Tighten this value from the shared message.
    pub fn refine(&mut self, msg: &Message) {
        if msg.empty {
            self.set_bottom();
            return;
        }
        if self.bottom {
            return;
        }

        if let Some((lo, hi)) = msg.unsigned {
            if self.unsigned.top {
                self.unsigned = View::bounded(lo, hi);
            } else {
                self.unsigned.lo = self.unsigned.lo.umax(lo);
                self.unsigned.hi = self.unsigned.hi.umin(hi);
            }
        }
        if let Some((lo, hi)) = msg.signed {
            if self.signed.top {
                self.signed = View::bounded(lo, hi);
            } else {
                self.signed.lo = self.signed.lo.smax(lo);
                self.signed.hi = self.signed.hi.smin(hi);
            }
        }
        self.reconcile_views();
        self.normalize();
    }

    /// Let one view tighten the other where their encodings agree: an
    /// unsigned range below the sign bit is also a signed range, and a
    /// non-negative signed range is also an unsigned range.
    fn reconcile_views(&mut self) {
        if self.bottom {
            return;
        }

        if !self.unsigned.top && self.unsigned.hi.ule(&ApInt::smax_value(self.width)) {
            if self.signed.top {
                self.signed = self.unsigned;
            } else {
                self.signed.lo = self.signed.lo.smax(self.unsigned.lo);
                self.signed.hi = self.signed.hi.smin(self.unsigned.hi);
            }
        }

        if !self.signed.top && !self.signed.lo.is_negative() {
            if self.unsigned.top {
                self.unsigned = self.signed;
            } else {
                self.unsigned.lo = self.unsigned.lo.umax(self.signed.lo);
                self.unsigned.hi = self.unsigned.hi.umin(self.signed.hi);
            }
        }
    }

    /// Publish the facts this value knows into the shared message.
    pub fn extract(&self, msg: &mut Message) {
        if self.bottom {
            msg.empty = true;
            return;
        }
        if !self.unsigned.top {
            msg.meet_unsigned(self.unsigned.lo, self.unsigned.hi);
        }
        if !self.signed.top {
            msg.meet_signed(self.signed.lo, self.signed.hi);
        }
    }
}

fn unsigned_pairwise(
    width: u32,
    a: &Interval,
    b: &Interval,
    op: impl Fn(ApInt, ApInt) -> Option<ApInt>,
) -> View {
    if a.unsigned.top || b.unsigned.top {
        return View::saturated(width);
    }
    match (op(a.unsigned.lo, b.unsigned.lo), op(a.unsigned.hi, b.unsigned.hi)) {
        (Some(lo), Some(hi)) => View::bounded(lo, hi),
        _ => View::saturated(width),
    }
}

fn signed_pairwise(
    width: u32,
    a: &Interval,
    b: &Interval,
    op: impl Fn(ApInt, ApInt) -> Option<ApInt>,
) -> View {
    if a.signed.top || b.signed.top {
        return View::saturated(width);
    }
    let mut lo: Option<ApInt> = None;
    let mut hi: Option<ApInt> = None;
    for x in [a.signed.lo, a.signed.hi] {
        for y in [b.signed.lo, b.signed.hi] {
            let Some(v) = op(x, y) else {
                return View::saturated(width);
            };
            lo = Some(lo.map_or(v, |l| l.smin(v)));
            hi = Some(hi.map_or(v, |h| h.smax(v)));
        }
    }
    View::bounded(lo.expect("endpoints visited"), hi.expect("endpoints visited"))
}

fn compare(a: &Interval, b: &Interval, pred: IntPredicate) -> CmpOutcome {
    use IntPredicate::*;
    match pred {
        Eq => {
            let mut outcome = CmpOutcome::empty();
            if may_intersect(a, b) {
                outcome |= CmpOutcome::TRUE;
            }
            match (a.as_singleton(), b.as_singleton()) {
                (Some(x), Some(y)) if x == y => {}
                _ => outcome |= CmpOutcome::FALSE,
            }
            // Disjoint ranges leave only inequality.
            if outcome.is_empty() {
                outcome = CmpOutcome::FALSE;
            }
            outcome
        }
        Ne => {
            let eq = compare(a, b, Eq);
            let mut outcome = CmpOutcome::empty();
            if eq.contains(CmpOutcome::TRUE) {
                outcome |= CmpOutcome::FALSE;
            }
            if eq.contains(CmpOutcome::FALSE) {
                outcome |= CmpOutcome::TRUE;
            }
            outcome
        }
        Ult => unsigned_order(a, b, false),
        Ule => unsigned_order(a, b, true),
        Ugt => unsigned_order(b, a, false),
        Uge => unsigned_order(b, a, true),
        Slt => signed_order(a, b, false),
        Sle => signed_order(a, b, true),
        Sgt => signed_order(b, a, false),
        Sge => signed_order(b, a, true),
    }
}

fn may_intersect(a: &Interval, b: &Interval) -> bool {
    let unsigned = match (
        a.unsigned_min(),
        a.unsigned_max(),
        b.unsigned_min(),
        b.unsigned_max(),
    ) {
        (Some(alo), Some(ahi), Some(blo), Some(bhi)) => alo.ule(&bhi) && blo.ule(&ahi),
        _ => true,
    };
    let signed = match (a.signed_min(), a.signed_max(), b.signed_min(), b.signed_max()) {
        (Some(alo), Some(ahi), Some(blo), Some(bhi)) => alo.sle(&bhi) && blo.sle(&ahi),
        _ => true,
    };
    unsigned && signed
}

/// Outcome of `a < b` (or `a <= b` with `or_equal`) on the unsigned view.
fn unsigned_order(a: &Interval, b: &Interval, or_equal: bool) -> CmpOutcome {
    let (Some(alo), Some(ahi), Some(blo), Some(bhi)) = (
        a.unsigned_min(),
        a.unsigned_max(),
        b.unsigned_min(),
        b.unsigned_max(),
    ) else {
        return CmpOutcome::both();
    };

    let mut outcome = CmpOutcome::empty();
    let may_true = if or_equal {
        alo.ule(&bhi)
    } else {
        alo.ult(&bhi)
    };
    let may_false = if or_equal {
        blo.ult(&ahi)
    } else {
        blo.ule(&ahi)
    };
    if may_true {
        outcome |= CmpOutcome::TRUE;
    }
    if may_false {
        outcome |= CmpOutcome::FALSE;
    }
    outcome
}

fn signed_order(a: &Interval, b: &Interval, or_equal: bool) -> CmpOutcome {
    let (Some(alo), Some(ahi), Some(blo), Some(bhi)) = (
        a.signed_min(),
        a.signed_max(),
        b.signed_min(),
        b.signed_max(),
    ) else {
        return CmpOutcome::both();
    };

    let mut outcome = CmpOutcome::empty();
    let may_true = if or_equal {
        alo.sle(&bhi)
    } else {
        alo.slt(&bhi)
    };
    let may_false = if or_equal {
        blo.slt(&ahi)
    } else {
        blo.sle(&ahi)
    };
    if may_true {
        outcome |= CmpOutcome::TRUE;
    }
    if may_false {
        outcome |= CmpOutcome::FALSE;
    }
    outcome
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interval ")?;
        if self.bottom {
            return write!(f, "bottom");
        }
        if self.unsigned.top {
            write!(f, "u:top")?;
        } else {
            write!(
                f,
                "u:[{}, {}]",
                self.unsigned.lo.as_u64(),
                self.unsigned.hi.as_u64()
            )?;
        }
        if self.signed.top {
            write!(f, " s:top")
        } else {
            write!(
                f,
                " s:[{}, {}]",
                self.signed.lo.as_i64(),
                self.signed.hi.as_i64()
            )
        }
    }
}
