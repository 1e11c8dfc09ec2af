//! Finite-set-of-constants integer domain.

use core::fmt;
use std::collections::BTreeSet;

use itertools::Itertools;
use sluice_ir::{BinaryOp, CastOp, IntPredicate};

use crate::{
    apint::ApInt,
    domain::{CmpOutcome, FloatInterval, Message},
    error::{bug, Bug},
};

/// Maximum number of members a set may hold before it saturates to top.
pub const SET_THRESHOLD: usize = 20;

/// Tracks the exact set of values an integer may hold, as long as it stays
/// small.
///
/// Values are stored as unsigned bit patterns; the signed view reinterprets
/// them. Operations produce the pointwise image when it fits under
/// [`SET_THRESHOLD`], and saturate otherwise. Top is represented by the flag
/// with an empty set, so derived equality is semantic.
#[derive(Debug, Clone, PartialEq)]
pub struct IntSet {
    width: u32,
    top: bool,
    values: BTreeSet<u64>,
}

impl IntSet {
    /// Bottom value of the given width.
    pub fn bottom(width: u32) -> Self {
        debug_assert!((1..=64).contains(&width));
        Self {
            width,
            top: false,
            values: BTreeSet::new(),
        }
    }

    /// Exact value.
    pub fn constant(value: ApInt) -> Self {
        let mut set = Self::bottom(value.width());
        set.values.insert(value.as_u64());
        set
    }

    /// Bit width.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// The exact members, when the set is not saturated. Bottom yields an
    /// empty list.
    pub fn values(&self) -> Option<Vec<u64>> {
        (!self.top).then(|| self.values.iter().copied().collect())
    }

    fn members(&self) -> impl Iterator<Item = ApInt> + '_ {
        let width = self.width;
        self.values.iter().map(move |&v| ApInt::new(width, v))
    }

    /// Smallest unsigned member.
    pub fn unsigned_min(&self) -> Option<ApInt> {
        if self.top {
            return None;
        }
        self.values
            .iter()
            .next()
            .map(|&v| ApInt::new(self.width, v))
    }

    /// Largest unsigned member.
    pub fn unsigned_max(&self) -> Option<ApInt> {
        if self.top {
            return None;
        }
        self.values
            .iter()
            .next_back()
            .map(|&v| ApInt::new(self.width, v))
    }

    /// Smallest signed member.
    pub fn signed_min(&self) -> Option<ApInt> {
        if self.top {
            return None;
        }
        self.members().reduce(ApInt::smin)
    }

    /// Largest signed member.
    pub fn signed_max(&self) -> Option<ApInt> {
        if self.top {
            return None;
        }
        self.members().reduce(ApInt::smax)
    }

    /// The single member, if exactly one.
    pub fn as_singleton(&self) -> Option<ApInt> {
        if self.top || self.values.len() != 1 {
            return None;
        }
        self.unsigned_min()
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

    fn insert_capped(&mut self, value: u64) {
        if self.top {
            return;
        }
        self.values.insert(value);
        if self.values.len() > SET_THRESHOLD {
            self.set_top();
        }
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether no value is represented.
    pub fn is_bottom(&self) -> bool {
        !self.top && self.values.is_empty()
    }

    /// Forget everything.
    pub fn set_bottom(&mut self) {
        self.top = false;
        self.values.clear();
    }

    /// Whether the set is saturated.
    pub const fn is_top(&self) -> bool {
        self.top
    }

    /// Saturate.
    pub fn set_top(&mut self) {
        self.top = true;
        self.values.clear();
    }

    /// Least upper bound: union, saturating past the threshold.
    pub fn join(&mut self, other: &Self) {
        self.check_width(other, "join");
        if other.top {
            self.set_top();
        }
        if self.top {
            return;
        }
        for &value in &other.values {
            self.insert_capped(value);
        }
    }

    /// Greatest lower bound: intersection.
    pub fn meet(&mut self, other: &Self) {
        self.check_width(other, "meet");
        if other.top {
            return;
        }
        if self.top {
            self.top = false;
            self.values = other.values.clone();
            return;
        }
        self.values = self.values.intersection(&other.values).copied().collect();
    }

    /// Subset order.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        self.check_width(other, "less_or_equal");
        if other.top {
            return true;
        }
        if self.top {
            return false;
        }
        self.values.is_subset(&other.values)
    }

    /// Precision: 1 for a singleton, degrading as members accumulate.
    pub fn accuracy(&self) -> f32 {
        if self.top {
            return 0.0;
        }
        if self.values.len() <= 1 {
            return 1.0;
        }
        1.0 - (self.values.len() - 1) as f32 / SET_THRESHOLD as f32
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>() + self.values.len() * core::mem::size_of::<u64>()
    }

    /// Become exactly zero.
    pub fn set_zero(&mut self) {
        *self = Self::constant(ApInt::zero(self.width));
    }

    // --- Transfer functions ---------------------------------------------

    /// Fold a binary operation into this value: the pointwise image when it
    /// fits, top otherwise. Division by a set containing zero saturates.
    pub fn binary(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        a.check_width(b, "binary");
        if a.is_bottom() || b.is_bottom() {
            self.set_bottom();
            return;
        }
        if a.top || b.top {
            self.set_top();
            return;
        }

        self.values.clear();
        self.top = false;
        for x in a.members() {
            for y in b.members() {
                match apply(op, x, y) {
                    Some(value) => self.insert_capped(value.as_u64()),
                    None => {
                        self.set_top();
                        return;
                    }
                }
                if self.top {
                    return;
                }
            }
        }
    }

    /// Fold an integer comparison outcome into this 1-bit value. Exact: the
    /// predicate is evaluated over every admitted pair.
    pub fn icmp(&mut self, a: &Self, b: &Self, pred: IntPredicate) {
        a.check_width(b, "icmp");
        if a.is_bottom() || b.is_bottom() {
            self.set_cmp_outcome(CmpOutcome::empty());
            return;
        }
        if a.top || b.top {
            self.set_cmp_outcome(CmpOutcome::both());
            return;
        }

        let mut outcome = CmpOutcome::empty();
        'outer: for x in a.members() {
            for y in b.members() {
                outcome |= CmpOutcome::definite(evaluate(pred, x, y));
                if outcome == CmpOutcome::both() {
                    break 'outer;
                }
            }
        }
        self.set_cmp_outcome(outcome);
    }

    /// Write a comparison outcome into this 1-bit value.
    pub fn set_cmp_outcome(&mut self, outcome: CmpOutcome) {
        debug_assert_eq!(self.width, 1);
        self.set_bottom();
        if outcome == CmpOutcome::both() {
            self.set_top();
            return;
        }
        if outcome.contains(CmpOutcome::TRUE) {
            self.values.insert(1);
        }
        if outcome.contains(CmpOutcome::FALSE) {
            self.values.insert(0);
        }
    }

    /// Fold an integer cast into this value.
    pub fn int_cast(&mut self, op: CastOp, value: &Self) {
        if value.top {
            self.set_top();
            return;
        }
        self.set_bottom();
        for member in value.members() {
            let converted = match op {
                CastOp::Trunc => member.trunc(self.width),
                CastOp::Zext => member.zext(self.width),
                CastOp::Sext => member.sext(self.width),
                _ => {
                    self.set_top();
                    return;
                }
            };
            self.insert_capped(converted.as_u64());
            if self.top {
                return;
            }
        }
    }

    /// Fold a float-to-integer conversion into this value. Only an exact,
    /// integral float range converts precisely.
    pub fn from_float(&mut self, value: &FloatInterval, signed: bool) {
        if value.is_bottom() {
            self.set_bottom();
            return;
        }
        match value.as_integral_singleton() {
            Some(v) if fits(v, self.width, signed) => {
                self.set_bottom();
                self.values.insert(ApInt::from_i64(self.width, v).as_u64());
            }
            _ => self.set_top(),
        }
    }

    // --- Reduced-product collaboration ----------------------------------

    /// Tighten this value from the shared message.
    pub fn refine(&mut self, msg: &Message) {
        if msg.empty {
            self.set_bottom();
            return;
        }

        if let Some(values) = &msg.values {
            if self.top && values.len() <= SET_THRESHOLD {
                self.top = false;
                self.values = values.clone();
            } else if !self.top {
                self.values = self.values.intersection(values).copied().collect();
            }
        }

        if self.top {
            return;
        }
        let width = self.width;
        if let Some((umin, umax)) = msg.unsigned {
            self.values
                .retain(|&v| umin.ule(&ApInt::new(width, v)) && ApInt::new(width, v).ule(&umax));
        }
        if let Some((smin, smax)) = msg.signed {
            self.values
                .retain(|&v| smin.sle(&ApInt::new(width, v)) && ApInt::new(width, v).sle(&smax));
        }
        if let Some((zeroes, ones)) = msg.bits {
            // A value conflicting with a definite bit is impossible.
            let mask = ApInt::umax_value(width).as_u64();
            self.values
                .retain(|&v| v & !ones == 0 && (!v & mask) & !zeroes == 0);
        }
    }

    /// Publish the facts this value knows into the shared message.
    pub fn extract(&self, msg: &mut Message) {
        if self.is_bottom() {
            msg.empty = true;
            return;
        }
        if self.top {
            return;
        }

        msg.meet_values(&self.values);
        if let (Some(umin), Some(umax)) = (self.unsigned_min(), self.unsigned_max()) {
            msg.meet_unsigned(umin, umax);
        }
        if let (Some(smin), Some(smax)) = (self.signed_min(), self.signed_max()) {
            msg.meet_signed(smin, smax);
        }

        let mask = ApInt::umax_value(self.width).as_u64();
        let may_ones = self.values.iter().fold(0u64, |acc, &v| acc | v);
        let may_zeroes = self.values.iter().fold(0u64, |acc, &v| acc | (!v & mask));
        msg.meet_bits(may_zeroes, may_ones);
    }
}

fn fits(value: i64, width: u32, signed: bool) -> bool {
    if signed {
        value >= ApInt::smin_value(width).as_i64() && value <= ApInt::smax_value(width).as_i64()
    } else {
        value >= 0 && (value as u64) <= ApInt::umax_value(width).as_u64()
    }
}

fn apply(op: BinaryOp, x: ApInt, y: ApInt) -> Option<ApInt> {
    Some(match op {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Sub => x.wrapping_sub(y),
        BinaryOp::Mul => x.wrapping_mul(y),
        BinaryOp::Udiv => x.checked_udiv(y)?,
        BinaryOp::Sdiv => x.checked_sdiv(y)?,
        BinaryOp::Urem => x.checked_urem(y)?,
        BinaryOp::Srem => x.checked_srem(y)?,
        BinaryOp::Shl => x.shl(shift_amount(y)),
        BinaryOp::Lshr => x.lshr(shift_amount(y)),
        BinaryOp::Ashr => x.ashr(shift_amount(y)),
        BinaryOp::And => x.and(y),
        BinaryOp::Or => x.or(y),
        BinaryOp::Xor => x.xor(y),
        _ => return None,
    })
}

fn shift_amount(amount: ApInt) -> u32 {
    amount.as_u64().min(u64::from(u32::MAX)) as u32
}

fn evaluate(pred: IntPredicate, x: ApInt, y: ApInt) -> bool {
    match pred {
        IntPredicate::Eq => x == y,
        IntPredicate::Ne => x != y,
        IntPredicate::Ugt => y.ult(&x),
        IntPredicate::Uge => y.ule(&x),
        IntPredicate::Ult => x.ult(&y),
        IntPredicate::Ule => x.ule(&y),
        IntPredicate::Sgt => y.slt(&x),
        IntPredicate::Sge => y.sle(&x),
        IntPredicate::Slt => x.slt(&y),
        IntPredicate::Sle => x.sle(&y),
    }
}

impl fmt::Display for IntSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set ")?;
        if self.top {
            return write!(f, "top");
        }
        if self.values.is_empty() {
            return write!(f, "bottom");
        }
        write!(f, "{{{}}}", self.values.iter().format(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(value: u64) -> IntSet {
        IntSet::constant(ApInt::new(8, value))
    }

    fn of(values: &[u64]) -> IntSet {
        let mut set = IntSet::bottom(8);
        for &v in values {
            set.values.insert(v);
        }
        set
    }

    #[test]
    fn pointwise_image() {
        let mut sum = IntSet::bottom(8);
        sum.binary(BinaryOp::Add, &of(&[1, 2]), &of(&[10, 20]));
        assert_eq!(sum.values().unwrap(), vec![11, 12, 21, 22]);
    }

    #[test]
    fn image_wraps_at_width() {
        let mut sum = IntSet::bottom(8);
        sum.binary(BinaryOp::Add, &c(250), &c(10));
        assert_eq!(sum.values().unwrap(), vec![4]);
    }

    #[test]
    fn saturates_past_threshold() {
        let a = of(&(0..10).collect::<Vec<_>>());
        let b = of(&(0..10).map(|v| v * 16).collect::<Vec<_>>());
        let mut product = IntSet::bottom(8);
        product.binary(BinaryOp::Add, &a, &b);
        assert!(product.is_top());
    }

    #[test]
    fn division_by_zero_saturates() {
        let mut quotient = IntSet::bottom(8);
        quotient.binary(BinaryOp::Udiv, &c(8), &of(&[0, 2]));
        assert!(quotient.is_top());
    }

    #[test]
    fn icmp_is_exact_over_pairs() {
        let mut lt = IntSet::bottom(1);
        lt.icmp(&of(&[1, 2]), &of(&[5, 9]), IntPredicate::Ult);
        assert_eq!(lt.values().unwrap(), vec![1]);

        let mut mixed = IntSet::bottom(1);
        mixed.icmp(&of(&[1, 6]), &of(&[5]), IntPredicate::Ult);
        assert!(mixed.is_top());
    }

    #[test]
    fn signed_bounds() {
        let set = of(&[1, 0xff]);
        assert_eq!(set.signed_min().unwrap().as_i64(), -1);
        assert_eq!(set.signed_max().unwrap().as_i64(), 1);
        assert_eq!(set.unsigned_max().unwrap().as_u64(), 0xff);
    }

    #[test]
    fn meet_intersects() {
        let mut a = of(&[1, 2, 3]);
        a.meet(&of(&[2, 3, 4]));
        assert_eq!(a.values().unwrap(), vec![2, 3]);
    }

    #[test]
    fn casts() {
        let mut wide = IntSet::bottom(16);
        wide.int_cast(CastOp::Sext, &of(&[0x80, 1]));
        assert_eq!(wide.values().unwrap(), vec![1, 0xff80]);

        let mut narrow = IntSet::bottom(8);
        narrow.int_cast(CastOp::Trunc, &wide);
        assert_eq!(narrow.values().unwrap(), vec![0x01, 0x80]);
    }
}
