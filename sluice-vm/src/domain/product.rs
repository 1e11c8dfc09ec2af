//! Reduced-product combiner.

use core::fmt;

use sluice_ir::{BinaryOp, CastOp, IntPredicate, Type};

use crate::{
    apint::ApInt,
    domain::{CmpOutcome, Domain, FloatInterval, Message},
    error::{bug, Bug},
};

/// Rounds of message exchange per collaboration step. The message lattice is
/// shallow, so the fixed point arrives fast; the cap bounds pathological
/// ping-pong.
const COLLABORATE_ROUNDS: usize = 3;

/// A fixed ordered tuple of domains abstracting the same concrete values.
///
/// Every operation is forwarded member-wise, after which the members run a
/// collaboration step: each reads the shared [`Message`], tightens itself,
/// and publishes what it knows; the published facts are met into the running
/// message. Collaboration is monotone, so a round can only shrink members.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    members: Vec<Domain>,
}

impl Product {
    /// Combine the given members, tightest-first order not required.
    pub fn new(members: Vec<Domain>) -> Self {
        Self { members }
    }

    /// The member domains, in order.
    pub fn members(&self) -> &[Domain] {
        &self.members
    }

    /// Mutable member access for the widening pass, which adjusts members
    /// pairwise and keeps the product consistent by construction.
    pub(crate) fn members_mut(&mut self) -> &mut [Domain] {
        &mut self.members
    }

    /// Tightest fact produced by any member, combined with `pick`.
    pub(crate) fn fold_members(
        &self,
        fact: impl Fn(&Domain) -> Option<ApInt>,
        pick: impl Fn(ApInt, ApInt) -> ApInt,
    ) -> Option<ApInt> {
        self.members
            .iter()
            .filter_map(|member| fact(member))
            .reduce(pick)
    }

    fn check_arity(&self, other: &Self, operation: &'static str) {
        if self.members.len() != other.members.len() {
            bug(Bug::ArityMismatch {
                operation,
                lhs: self.members.len(),
                rhs: other.members.len(),
            });
        }
    }

    /// Run the collaboration step: refine members from the message, extract
    /// their knowledge, and iterate to a message fixed point.
    pub fn collaborate(&mut self) {
        let mut msg = Message::default();
        for _ in 0..COLLABORATE_ROUNDS {
            let before = msg.clone();
            for member in &mut self.members {
                member.refine(&msg);
                member.extract(&mut msg);
            }
            if msg == before {
                break;
            }
        }
        if msg.empty {
            for member in &mut self.members {
                member.set_bottom();
            }
        }
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether every member is bottom. Collaboration floods a single bottom
    /// member to all of them.
    pub fn is_bottom(&self) -> bool {
        self.members.iter().all(Domain::is_bottom)
    }

    /// Forget everything.
    pub fn set_bottom(&mut self) {
        for member in &mut self.members {
            member.set_bottom();
        }
    }

    /// Whether every member is saturated.
    pub fn is_top(&self) -> bool {
        self.members.iter().all(Domain::is_top)
    }

    /// Saturate every member.
    pub fn set_top(&mut self) {
        for member in &mut self.members {
            member.set_top();
        }
    }

    /// Member-wise least upper bound.
    pub fn join(&mut self, other: &Self) {
        self.check_arity(other, "join");
        for (member, theirs) in self.members.iter_mut().zip(&other.members) {
            member.join(theirs);
        }
        self.collaborate();
    }

    /// Member-wise greatest lower bound.
    pub fn meet(&mut self, other: &Self) {
        self.check_arity(other, "meet");
        for (member, theirs) in self.members.iter_mut().zip(&other.members) {
            member.meet(theirs);
        }
        self.collaborate();
    }

    /// Member-wise order.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        self.check_arity(other, "less_or_equal");
        self.members
            .iter()
            .zip(&other.members)
            .all(|(mine, theirs)| mine.less_or_equal(theirs))
    }

    /// The best member's precision.
    pub fn accuracy(&self) -> f32 {
        self.members
            .iter()
            .map(Domain::accuracy)
            .fold(0.0, f32::max)
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        self.members.iter().map(Domain::memory_usage).sum()
    }

    /// Member-wise zero.
    pub fn set_zero(&mut self) {
        for member in &mut self.members {
            member.set_zero();
        }
    }

    // --- Transfer functions ---------------------------------------------

    /// Member-wise binary operation.
    pub fn binary(&mut self, op: BinaryOp, a: &Self, b: &Self) {
        self.check_arity(a, "binary");
        self.check_arity(b, "binary");
        for ((member, x), y) in self.members.iter_mut().zip(&a.members).zip(&b.members) {
            member.binary(op, x, y);
        }
        self.collaborate();
    }

    /// Member-wise comparison.
    pub fn icmp(&mut self, a: &Self, b: &Self, pred: IntPredicate) {
        a.check_arity(b, "icmp");
        for ((member, x), y) in self.members.iter_mut().zip(&a.members).zip(&b.members) {
            member.icmp(x, y, pred);
        }
        self.collaborate();
    }

    /// Write a comparison outcome into this 1-bit product.
    pub fn set_cmp_outcome(&mut self, outcome: CmpOutcome) {
        for member in &mut self.members {
            member.set_cmp_outcome(outcome);
        }
    }

    /// Member-wise integer cast.
    pub fn cast_members(&mut self, op: CastOp, value: &Self) {
        self.check_arity(value, "cast");
        for (member, from) in self.members.iter_mut().zip(&value.members) {
            member.cast(op, from);
        }
        self.collaborate();
    }

    /// Member-wise float-to-integer conversion.
    pub fn from_float(&mut self, value: &FloatInterval, signed: bool) {
        for member in &mut self.members {
            member.float_to_int_member(value, signed);
        }
        self.collaborate();
    }

    /// Meet of the members' element reads.
    pub fn extract_element(&self, index: &Domain) -> Domain {
        let mut result: Option<Domain> = None;
        for member in &self.members {
            let element = member.extract_element(index);
            match &mut result {
                Some(merged) => merged.meet(&element),
                None => result = Some(element),
            }
        }
        result.expect("products have at least one member")
    }

    /// Member-wise element insertion.
    pub fn insert_element(&mut self, array: &Self, element: &Domain, index: &Domain) {
        self.check_arity(array, "insertelement");
        for (member, from) in self.members.iter_mut().zip(&array.members) {
            member.insert_element(from, element, index);
        }
        self.collaborate();
    }

    /// Member-wise shuffle.
    pub fn shuffle_vector(&mut self, a: &Self, b: &Self, mask: &[u32]) {
        self.check_arity(a, "shufflevector");
        self.check_arity(b, "shufflevector");
        for ((member, x), y) in self.members.iter_mut().zip(&a.members).zip(&b.members) {
            member.shuffle_vector(x, y, mask);
        }
        self.collaborate();
    }

    /// Meet of the members' aggregate reads.
    pub fn extract_value(&self, indices: &[u32]) -> Domain {
        let mut result: Option<Domain> = None;
        for member in &self.members {
            let element = member.extract_value(indices);
            match &mut result {
                Some(merged) => merged.meet(&element),
                None => result = Some(element),
            }
        }
        result.expect("products have at least one member")
    }

    /// Member-wise aggregate insertion.
    pub fn insert_value(&mut self, aggregate: &Self, element: &Domain, indices: &[u32]) {
        self.check_arity(aggregate, "insertvalue");
        for (member, from) in self.members.iter_mut().zip(&aggregate.members) {
            member.insert_value(from, element, indices);
        }
        self.collaborate();
    }

    /// Meet of the members' block-level reads.
    pub fn load(&self, ty: &Type, offset: &Domain) -> Domain {
        let mut result: Option<Domain> = None;
        for member in &self.members {
            let loaded = member.load(ty, offset);
            match &mut result {
                Some(merged) => merged.meet(&loaded),
                None => result = Some(loaded),
            }
        }
        result.expect("products have at least one member")
    }

    /// Member-wise block-level write.
    pub fn store(&mut self, value: &Domain, offset: &Domain, single_target: bool) {
        for member in &mut self.members {
            member.store(value, offset, single_target);
        }
        self.collaborate();
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "product")?;
        for member in &self.members {
            writeln!(f, "    {member}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SET_THRESHOLD;

    fn int(value: u64) -> Domain {
        Domain::int_constant(ApInt::new(8, value))
    }

    fn bottom() -> Domain {
        Domain::bottom_of(&Type::i8())
    }

    #[test]
    fn members_agree_after_an_operation() {
        let mut result = bottom();
        result.binary(BinaryOp::Add, &int(3), &int(5));

        // Every member pins the same constant afterwards.
        assert_eq!(result.as_singleton().unwrap().as_u64(), 8);
        let Domain::Product(product) = &result else {
            panic!("integer values are products");
        };
        for member in product.members() {
            assert_eq!(member.unsigned_min().unwrap().as_u64(), 8);
            assert_eq!(member.unsigned_max().unwrap().as_u64(), 8);
        }
    }

    #[test]
    fn collaboration_floods_bottom() {
        let mut value = int(7);
        let Domain::Product(product) = &mut value else {
            panic!();
        };
        // Make one member internally inconsistent with the rest.
        product.members[2].meet(&match &int(9) {
            Domain::Product(p) => p.members[2].clone(),
            _ => unreachable!(),
        });
        product.collaborate();
        assert!(value.is_bottom());
    }

    #[test]
    fn interval_refines_from_set_bounds() {
        // Join of two constants: set knows {10, 20}, interval [10, 20].
        let mut value = int(10);
        value.join(&int(20));
        assert_eq!(value.unsigned_min().unwrap().as_u64(), 10);
        assert_eq!(value.unsigned_max().unwrap().as_u64(), 20);
        assert_eq!(value.known_values().unwrap(), vec![10, 20]);
    }

    #[test]
    fn set_adopts_small_message_values() {
        // A masked top: the bitfield knows the low bit is clear, the
        // interval bounds the value; the set can stay exact only through
        // the message.
        let mut value = bottom();
        for v in [0u64, 2, 4] {
            value.join(&int(v));
        }
        assert!(value.known_values().unwrap().len() <= SET_THRESHOLD);
        assert_eq!(value.unsigned_max().unwrap().as_u64(), 4);
    }
}
