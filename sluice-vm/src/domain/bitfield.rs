//! Known-bits integer domain.

use core::fmt;

use sluice_ir::{BinaryOp, CastOp, IntPredicate};

use crate::{
    apint::ApInt,
    domain::{CmpOutcome, Message},
    error::{bug, Bug},
};

/// Tracks, per bit position, whether the bit may be 0 and whether it may
/// be 1.
///
/// The pair `(zero, one)` encodes: `(0,0)` bottom, `(1,0)` definitely 0,
/// `(0,1)` definitely 1, `(1,1)` either. Both masks only ever hold bits
/// inside the width. A value with any bottom bit represents no concrete
/// value at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bitfield {
    width: u32,
    /// Bits that may be 0.
    zeroes: u64,
    /// Bits that may be 1.
    ones: u64,
}

impl Bitfield {
    /// Bottom value of the given width.
    pub fn bottom(width: u32) -> Self {
        debug_assert!((1..=64).contains(&width));
        Self {
            width,
            zeroes: 0,
            ones: 0,
        }
    }

    /// Exact value.
    pub fn constant(value: ApInt) -> Self {
        let mask = Self::mask_of(value.width());
        Self {
            width: value.width(),
            zeroes: !value.as_u64() & mask,
            ones: value.as_u64(),
        }
    }

    fn mask_of(width: u32) -> u64 {
        if width >= 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        }
    }

    fn mask(&self) -> u64 {
        Self::mask_of(self.width)
    }

    /// Bit width.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// State of bit `pos`: `-1` bottom, `0`, `1`, or `2` for either.
    pub fn get_bit(&self, pos: u32) -> i8 {
        let zero = (self.zeroes >> pos) & 1;
        let one = (self.ones >> pos) & 1;
        match (zero, one) {
            (0, 0) => -1,
            (1, 0) => 0,
            (0, 1) => 1,
            _ => 2,
        }
    }

    /// Set bit `pos` to one of the [`Bitfield::get_bit`] states.
    pub fn set_bit(&mut self, pos: u32, state: i8) {
        let bit = 1u64 << pos;
        let (zero, one) = match state {
            -1 => (false, false),
            0 => (true, false),
            1 => (false, true),
            _ => (true, true),
        };
        if zero {
            self.zeroes |= bit;
        } else {
            self.zeroes &= !bit;
        }
        if one {
            self.ones |= bit;
        } else {
            self.ones &= !bit;
        }
    }

    /// Whether every bit is exactly known.
    pub fn is_constant(&self) -> bool {
        self.zeroes & self.ones == 0 && self.zeroes | self.ones == self.mask()
    }

    /// Bits that are definitely 1.
    fn must_ones(&self) -> u64 {
        self.ones & !self.zeroes
    }

    /// Smallest unsigned value admitted, unless some bit is bottom.
    pub fn unsigned_min(&self) -> Option<ApInt> {
        (!self.is_bottom()).then(|| ApInt::new(self.width, self.must_ones()))
    }

    /// Largest unsigned value admitted, unless some bit is bottom.
    pub fn unsigned_max(&self) -> Option<ApInt> {
        (!self.is_bottom()).then(|| ApInt::new(self.width, self.ones))
    }

    /// Smallest signed value admitted, unless some bit is bottom.
    pub fn signed_min(&self) -> Option<ApInt> {
        if self.is_bottom() {
            return None;
        }
        let sign = 1u64 << (self.width - 1);
        let rest = self.mask() >> 1;
        let bits = if self.ones & sign != 0 {
            // A negative value is possible: take it and minimize the rest.
            sign | (self.must_ones() & rest)
        } else {
            self.must_ones() & rest
        };
        Some(ApInt::new(self.width, bits))
    }

    /// Largest signed value admitted, unless some bit is bottom.
    pub fn signed_max(&self) -> Option<ApInt> {
        if self.is_bottom() {
            return None;
        }
        let sign = 1u64 << (self.width - 1);
        let rest = self.mask() >> 1;
        let bits = if self.zeroes & sign != 0 {
            // A non-negative value is possible: take it and maximize the rest.
            self.ones & rest
        } else {
            sign | (self.ones & rest)
        };
        Some(ApInt::new(self.width, bits))
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

    // --- Lattice ---------------------------------------------------------

    /// Whether some bit admits neither 0 nor 1.
    pub fn is_bottom(&self) -> bool {
        self.zeroes | self.ones != self.mask()
    }

    /// Forget everything.
    pub fn set_bottom(&mut self) {
        self.zeroes = 0;
        self.ones = 0;
    }

    /// Whether every bit admits both 0 and 1.
    pub fn is_top(&self) -> bool {
        self.zeroes & self.ones == self.mask()
    }

    /// Admit every value.
    pub fn set_top(&mut self) {
        self.zeroes = self.mask();
        self.ones = self.mask();
    }

    /// Least upper bound: per-bit union.
    pub fn join(&mut self, other: &Self) {
        self.check_width(other, "join");
        self.zeroes |= other.zeroes;
        self.ones |= other.ones;
    }

    /// Greatest lower bound: per-bit intersection.
    pub fn meet(&mut self, other: &Self) {
        self.check_width(other, "meet");
        self.zeroes &= other.zeroes;
        self.ones &= other.ones;
    }

    /// Per-bit set inclusion.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        self.check_width(other, "less_or_equal");
        self.zeroes & !other.zeroes == 0 && self.ones & !other.ones == 0
    }

    /// Fraction of exactly-known bits.
    pub fn accuracy(&self) -> f32 {
        if self.is_bottom() {
            return 1.0;
        }
        let undecided = (self.zeroes & self.ones).count_ones();
        1.0 - undecided as f32 / self.width as f32
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

    /// Fold a binary operation into this value.
    ///
    /// Bitwise operations are exact; shifts are exact for constant shift
    /// amounts; the arithmetic family saturates.
    pub fn binary(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        a.check_width(b, "binary");
        if a.is_bottom() || b.is_bottom() {
            self.set_bottom();
            return;
        }

        match op {
            BinaryOp::And => {
                self.zeroes = a.zeroes | b.zeroes;
                self.ones = a.ones & b.ones;
            }
            BinaryOp::Or => {
                self.zeroes = a.zeroes & b.zeroes;
                self.ones = a.ones | b.ones;
            }
            BinaryOp::Xor => {
                self.zeroes = (a.zeroes & b.zeroes) | (a.ones & b.ones);
                self.ones = (a.zeroes & b.ones) | (a.ones & b.zeroes);
            }
            BinaryOp::Shl => self.shift(op, a, b),
            BinaryOp::Lshr => self.shift(op, a, b),
            BinaryOp::Ashr => self.shift(op, a, b),
            _ => self.set_top(),
        }
    }

    fn shift(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        let Some(amount) = b.constant_value() else {
            self.set_top();
            return;
        };
        let amount = amount.as_u64();

        if amount >= u64::from(self.width) {
            match op {
                // Over-shifting drains the value to zero, or to the spread
                // sign bit for arithmetic shifts.
                BinaryOp::Ashr => self.spread_sign(a, self.width),
                _ => self.set_zero(),
            }
            return;
        }

        let k = amount as u32;
        let mask = self.mask();
        match op {
            BinaryOp::Shl => {
                let fill = Self::mask_of(self.width).wrapping_shr(self.width - k) & mask;
                let fill = if k == 0 { 0 } else { fill };
                self.zeroes = ((a.zeroes << k) | fill) & mask;
                self.ones = (a.ones << k) & mask;
            }
            BinaryOp::Lshr => {
                let fill = if k == 0 {
                    0
                } else {
                    (mask >> (self.width - k)) << (self.width - k)
                };
                self.zeroes = ((a.zeroes >> k) | fill) & mask;
                self.ones = (a.ones >> k) & mask;
            }
            BinaryOp::Ashr => {
                self.zeroes = (a.zeroes >> k) & mask;
                self.ones = (a.ones >> k) & mask;
                let sign = a.get_bit(self.width - 1);
                for pos in (self.width - k)..self.width {
                    self.set_bit(pos, sign);
                }
                // Shifting by zero keeps the sign bit itself intact.
                if k == 0 {
                    self.set_bit(self.width - 1, sign);
                }
            }
            _ => unreachable!(),
        }
    }

    fn spread_sign(&mut self, a: &Self, width: u32) {
        let sign = a.get_bit(width - 1);
        for pos in 0..width {
            self.set_bit(pos, sign);
        }
    }

    fn constant_value(&self) -> Option<ApInt> {
        self.is_constant()
            .then(|| ApInt::new(self.width, self.ones))
    }

    /// Fold an integer comparison outcome into this 1-bit value.
    ///
    /// Scans from the most significant bit; the first disagreement decides.
    /// A signed predicate flips the interpretation of the sign bit.
    pub fn icmp(&mut self, a: &Self, b: &Self, pred: IntPredicate) {
        a.check_width(b, "icmp");

        if a.is_bottom() || b.is_bottom() {
            self.set_cmp_outcome(CmpOutcome::empty());
            return;
        }

        if a.width > 1 && (a.is_top() || b.is_top()) {
            self.set_cmp_outcome(CmpOutcome::both());
            return;
        }

        let outcome = match pred {
            IntPredicate::Eq => match compare_equal(a, b) {
                Some(true) => CmpOutcome::TRUE,
                Some(false) => CmpOutcome::FALSE,
                None => CmpOutcome::both(),
            },
            IntPredicate::Ne => match compare_equal(a, b) {
                Some(true) => CmpOutcome::FALSE,
                Some(false) => CmpOutcome::TRUE,
                None => CmpOutcome::both(),
            },
            IntPredicate::Ugt => order_outcome(compare(a, b, false), Relation::Greater),
            IntPredicate::Uge => order_outcome(compare(a, b, false), Relation::GreaterEqual),
            IntPredicate::Ult => order_outcome(compare(a, b, false), Relation::Less),
            IntPredicate::Ule => order_outcome(compare(a, b, false), Relation::LessEqual),
            IntPredicate::Sgt => order_outcome(compare(a, b, true), Relation::Greater),
            IntPredicate::Sge => order_outcome(compare(a, b, true), Relation::GreaterEqual),
            IntPredicate::Slt => order_outcome(compare(a, b, true), Relation::Less),
            IntPredicate::Sle => order_outcome(compare(a, b, true), Relation::LessEqual),
        };
        self.set_cmp_outcome(outcome);
    }

    /// Write a comparison outcome into this 1-bit value.
    pub fn set_cmp_outcome(&mut self, outcome: CmpOutcome) {
        debug_assert_eq!(self.width, 1);
        match (outcome.contains(CmpOutcome::FALSE), outcome.contains(CmpOutcome::TRUE)) {
            (false, false) => self.set_bottom(),
            (true, false) => self.set_zero(),
            (false, true) => *self = Self::constant(ApInt::one(1)),
            (true, true) => self.set_top(),
        }
    }

    /// Fold an integer cast into this value.
    pub fn int_cast(&mut self, op: CastOp, value: &Self) {
        if value.is_bottom() {
            self.set_bottom();
            return;
        }
        let mask = self.mask();
        match op {
            CastOp::Trunc => {
                self.zeroes = value.zeroes & mask;
                self.ones = value.ones & mask;
            }
            CastOp::Zext => {
                let low = Self::mask_of(value.width);
                self.zeroes = (value.zeroes & low) | (mask & !low);
                self.ones = value.ones & low;
            }
            CastOp::Sext => {
                let low = Self::mask_of(value.width);
                self.zeroes = value.zeroes & low;
                self.ones = value.ones & low;
                let sign = value.get_bit(value.width - 1);
                for pos in value.width..self.width {
                    self.set_bit(pos, sign);
                }
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
        if let Some((zeroes, ones)) = msg.bits {
            self.zeroes &= zeroes;
            self.ones &= ones;
        }
    }

    /// Publish the facts this value knows into the shared message.
    pub fn extract(&self, msg: &mut Message) {
        if self.is_bottom() {
            msg.empty = true;
            return;
        }
        msg.meet_bits(self.zeroes, self.ones);
        if let (Some(umin), Some(umax)) = (self.unsigned_min(), self.unsigned_max()) {
            msg.meet_unsigned(umin, umax);
        }
        if let (Some(smin), Some(smax)) = (self.signed_min(), self.signed_max()) {
            msg.meet_signed(smin, smax);
        }
    }
}

/// Three-way relation requested from [`compare`].
#[derive(Clone, Copy)]
enum Relation {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// Bit-level comparison verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    /// `a < b` for every admitted pair.
    Below,
    /// `a == b` for every admitted pair.
    Equal,
    /// `a > b` for every admitted pair.
    Above,
    /// Nothing is known.
    Unknown,
}

/// Compare bit by bit from the most significant end. While both sides are
/// exact and equal the scan continues; the first exact disagreement decides.
/// Any inexact bit leaves the lower positions free to swing the result
/// either way, so nothing is known. The sign bit inverts the order under a
/// signed interpretation.
fn compare(a: &Bitfield, b: &Bitfield, signed: bool) -> Verdict {
    let mut first = true;
    for pos in (0..a.width()).rev() {
        let i = a.get_bit(pos);
        let j = b.get_bit(pos);
        let i_known = i == 0 || i == 1;
        let j_known = j == 0 || j == 1;

        if !i_known || !j_known {
            return Verdict::Unknown;
        }

        if i != j {
            let below = i < j;
            return if below ^ (first && signed) {
                Verdict::Below
            } else {
                Verdict::Above
            };
        }
        first = false;
    }

    Verdict::Equal
}

/// `Some(true)` when provably equal, `Some(false)` when provably unequal.
fn compare_equal(a: &Bitfield, b: &Bitfield) -> Option<bool> {
    let mut all_known = true;
    for pos in 0..a.width() {
        let i = a.get_bit(pos);
        let j = b.get_bit(pos);
        if i == 2 || j == 2 || i == -1 || j == -1 {
            all_known = false;
            continue;
        }
        if i != j {
            return Some(false);
        }
    }
    all_known.then_some(true)
}

fn order_outcome(verdict: Verdict, relation: Relation) -> CmpOutcome {
    use Verdict::*;
    match relation {
        Relation::Greater => match verdict {
            Above => CmpOutcome::TRUE,
            Below | Equal => CmpOutcome::FALSE,
            Unknown => CmpOutcome::both(),
        },
        Relation::GreaterEqual => match verdict {
            Above | Equal => CmpOutcome::TRUE,
            Below => CmpOutcome::FALSE,
            Unknown => CmpOutcome::both(),
        },
        Relation::Less => match verdict {
            Below => CmpOutcome::TRUE,
            Above | Equal => CmpOutcome::FALSE,
            Unknown => CmpOutcome::both(),
        },
        Relation::LessEqual => match verdict {
            Below | Equal => CmpOutcome::TRUE,
            Above => CmpOutcome::FALSE,
            Unknown => CmpOutcome::both(),
        },
    }
}

impl fmt::Display for Bitfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bitfield ")?;
        if self.is_bottom() {
            return write!(f, "bottom");
        }
        for pos in (0..self.width).rev() {
            let c = match self.get_bit(pos) {
                0 => '0',
                1 => '1',
                2 => 'T',
                _ => '_',
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(width: u32, value: u64) -> Bitfield {
        Bitfield::constant(ApInt::new(width, value))
    }

    #[test]
    fn constants_know_every_bit() {
        let v = c(8, 0b10110);
        assert!(v.is_constant());
        assert_eq!(v.unsigned_min().unwrap().as_u64(), 0b10110);
        assert_eq!(v.unsigned_max().unwrap().as_u64(), 0b10110);
    }

    #[test]
    fn join_loses_disagreeing_bits() {
        let mut v = c(8, 0b1010);
        v.join(&c(8, 0b1000));
        assert_eq!(v.get_bit(1), 2);
        assert_eq!(v.get_bit(3), 1);
        assert_eq!(v.unsigned_min().unwrap().as_u64(), 0b1000);
        assert_eq!(v.unsigned_max().unwrap().as_u64(), 0b1010);
    }

    #[test]
    fn signed_bounds_use_the_sign_bit() {
        let mut v = c(8, 0);
        v.set_top();
        assert_eq!(v.signed_min().unwrap().as_i64(), -128);
        assert_eq!(v.signed_max().unwrap().as_i64(), 127);

        let nonneg = {
            let mut x = v;
            x.set_bit(7, 0);
            x
        };
        assert_eq!(nonneg.signed_min().unwrap().as_i64(), 0);
        assert_eq!(nonneg.signed_max().unwrap().as_i64(), 127);
    }

    #[test]
    fn bitwise_ops_are_exact_on_constants() {
        let mut and = Bitfield::bottom(8);
        and.binary(BinaryOp::And, &c(8, 0b1100), &c(8, 0b1010));
        assert_eq!(and, c(8, 0b1000));

        let mut xor = Bitfield::bottom(8);
        xor.binary(BinaryOp::Xor, &c(8, 0b1100), &c(8, 0b1010));
        assert_eq!(xor, c(8, 0b0110));
    }

    #[test]
    fn arithmetic_saturates() {
        let mut sum = Bitfield::bottom(8);
        sum.binary(BinaryOp::Add, &c(8, 1), &c(8, 2));
        assert!(sum.is_top());
    }

    #[test]
    fn constant_shift_is_precise() {
        let mut v = Bitfield::bottom(8);
        v.binary(BinaryOp::Shl, &c(8, 0b101), &c(8, 1));
        assert_eq!(v, c(8, 0b1010));

        let mut over = Bitfield::bottom(8);
        over.binary(BinaryOp::Lshr, &c(8, 0xff), &c(8, 9));
        assert_eq!(over, c(8, 0));
    }

    #[test]
    fn icmp_decides_on_disjoint_prefixes() {
        let mut result = Bitfield::bottom(1);
        result.icmp(&c(8, 3), &c(8, 200), IntPredicate::Ult);
        assert_eq!(result, c(1, 1));

        // Signed: 200 is negative at 8 bits.
        let mut result = Bitfield::bottom(1);
        result.icmp(&c(8, 3), &c(8, 200), IntPredicate::Slt);
        assert_eq!(result, c(1, 0));
    }

    #[test]
    fn icmp_mixed_tops_stay_unknown() {
        let mut top = Bitfield::bottom(8);
        top.set_top();
        let mut result = Bitfield::bottom(1);
        result.icmp(&top, &c(8, 5), IntPredicate::Eq);
        assert!(result.is_top());
    }

    #[test]
    fn casts_track_bits() {
        let mut wide = Bitfield::bottom(16);
        wide.int_cast(CastOp::Zext, &c(8, 0x80));
        assert_eq!(wide, c(16, 0x80));

        let mut signed = Bitfield::bottom(16);
        signed.int_cast(CastOp::Sext, &c(8, 0x80));
        assert_eq!(signed, c(16, 0xff80));

        let mut narrow = Bitfield::bottom(8);
        narrow.int_cast(CastOp::Trunc, &c(16, 0x1234));
        assert_eq!(narrow, c(8, 0x34));
    }

    #[test]
    fn lattice_order_is_bitwise_inclusion() {
        let mut top = Bitfield::bottom(8);
        top.set_top();
        let v = c(8, 9);
        assert!(Bitfield::bottom(8).less_or_equal(&v));
        assert!(v.less_or_equal(&top));
        assert!(!top.less_or_equal(&v));
    }
}
