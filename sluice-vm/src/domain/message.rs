//! Collaboration messages exchanged inside a reduced product.

use std::collections::BTreeSet;

use crate::apint::ApInt;

/// The facts product members exchange during a collaboration step.
///
/// Every field is a may-constraint: meeting a fact can only tighten the
/// message. `empty` records that some member proved the value impossible,
/// which floods the whole product to bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Some member has no concrete value at all.
    pub empty: bool,
    /// Tightest known unsigned bounds.
    pub unsigned: Option<(ApInt, ApInt)>,
    /// Tightest known signed bounds.
    pub signed: Option<(ApInt, ApInt)>,
    /// Exact value list, when some member tracks one.
    pub values: Option<BTreeSet<u64>>,
    /// Per-bit may-be-zero / may-be-one masks.
    pub bits: Option<(u64, u64)>,
}

impl Message {
    /// Meet unsigned bounds into the message.
    pub fn meet_unsigned(&mut self, lo: ApInt, hi: ApInt) {
        let (lo, hi) = match self.unsigned {
            Some((old_lo, old_hi)) => (old_lo.umax(lo), old_hi.umin(hi)),
            None => (lo, hi),
        };
        if hi.ult(&lo) {
            self.empty = true;
        }
        self.unsigned = Some((lo, hi));
    }

    /// Meet signed bounds into the message.
    pub fn meet_signed(&mut self, lo: ApInt, hi: ApInt) {
        let (lo, hi) = match self.signed {
            Some((old_lo, old_hi)) => (old_lo.smax(lo), old_hi.smin(hi)),
            None => (lo, hi),
        };
        if hi.slt(&lo) {
            self.empty = true;
        }
        self.signed = Some((lo, hi));
    }

    /// Meet an exact value list into the message.
    pub fn meet_values(&mut self, values: &BTreeSet<u64>) {
        let met = match &self.values {
            Some(existing) => existing.intersection(values).copied().collect(),
            None => values.clone(),
        };
        if met.is_empty() {
            self.empty = true;
        }
        self.values = Some(met);
    }

    /// Meet per-bit may-masks into the message.
    pub fn meet_bits(&mut self, zeroes: u64, ones: u64) {
        let (zeroes, ones) = match self.bits {
            Some((old_zeroes, old_ones)) => (old_zeroes & zeroes, old_ones & ones),
            None => (zeroes, ones),
        };
        self.bits = Some((zeroes, ones));
    }
}
