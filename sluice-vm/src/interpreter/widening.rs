//! Widening at basic-block back-edges.

use core::fmt;
use std::collections::BTreeSet;

use sluice_ir::{Constant, InstOp, Module, Operand};

use crate::{domain::Domain, memory::State};

/// One widening operator. Operators receive the recorded value from the
/// previous round and the freshly proposed value, and may only enlarge the
/// recorded one; the manager joins the proposal in afterwards.
pub trait WideningOperator: fmt::Debug {
    /// Widen `previous` against the growth observed in `next`.
    fn widen(&self, previous: &mut Domain, next: &Domain);
}

/// Applies an ordered list of widening operators over the pairs of values
/// two states have in common.
#[derive(Debug)]
pub struct WideningManager {
    operators: Vec<Box<dyn WideningOperator>>,
}

impl WideningManager {
    /// Manager with an explicit operator list.
    pub fn new(operators: Vec<Box<dyn WideningOperator>>) -> Self {
        Self { operators }
    }

    /// The default configuration: numerical widening with thresholds
    /// harvested from the module's comparisons.
    pub fn with_default(module: &Module) -> Self {
        Self::new(vec![Box::new(NumericalInfinity::from_module(module))])
    }

    /// Widen every value recorded in `previous` that `next` grew.
    pub fn widen_state(&self, previous: &mut State, next: &State) {
        for (place, proposed) in next.variables() {
            if let Some(recorded) = previous.variable_mut(place) {
                if recorded != proposed {
                    for operator in &self.operators {
                        operator.widen(recorded, proposed);
                    }
                }
            }
        }

        for (place, proposed) in next.blocks() {
            if let Some(recorded) = previous.block_mut(place) {
                if recorded.value() != proposed.value() {
                    for operator in &self.operators {
                        operator.widen(recorded.value_mut(), proposed.value());
                    }
                }
            }
        }
    }
}

/// Numerical-infinity widening with comparison thresholds.
///
/// An interval endpoint that grew since the previous round jumps to the
/// nearest threshold beyond it; past the last threshold the affected view
/// saturates. Thresholds are the integer constants the module compares or
/// switches on (plus their immediate neighbors, so both strict and
/// non-strict comparisons land on the loop bound). Float endpoints and
/// pointer offsets saturate directly. This bounds the number of rounds any
/// loop can keep a value growing.
#[derive(Debug)]
pub struct NumericalInfinity {
    unsigned_thresholds: BTreeSet<u64>,
    signed_thresholds: BTreeSet<i64>,
}

impl NumericalInfinity {
    /// Harvest thresholds from every comparison and switch in the module.
    pub fn from_module(module: &Module) -> Self {
        let mut unsigned = BTreeSet::from([0u64]);
        let mut signed = BTreeSet::from([0i64]);

        let mut admit = |bits: u32, value: u64| {
            for candidate in [value.wrapping_sub(1), value, value.wrapping_add(1)] {
                unsigned.insert(candidate);
                let shift = 64 - bits;
                signed.insert(((candidate << shift) as i64) >> shift);
            }
        };

        for function in &module.functions {
            for block in &function.blocks {
                for instruction in &block.instructions {
                    match &instruction.op {
                        InstOp::Icmp { lhs, rhs, .. } => {
                            for operand in [lhs, rhs] {
                                if let Operand::Constant(Constant::Int { bits, value }) = operand {
                                    admit(*bits, *value);
                                }
                            }
                        }
                        InstOp::Switch { cases, .. } => {
                            for (value, _) in cases {
                                admit(64, *value);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        Self {
            unsigned_thresholds: unsigned,
            signed_thresholds: signed,
        }
    }
}

impl WideningOperator for NumericalInfinity {
    fn widen(&self, previous: &mut Domain, next: &Domain) {
        match (previous, next) {
            (Domain::Product(prev), Domain::Product(new)) => {
                if prev.members().len() == new.members().len() {
                    for index in 0..prev.members().len() {
                        self.widen(&mut prev.members_mut()[index], &new.members()[index]);
                    }
                }
            }
            (Domain::Interval(prev), Domain::Interval(new)) => {
                if prev.width() == new.width() {
                    prev.widen_from(new, &self.unsigned_thresholds, &self.signed_thresholds);
                }
            }
            (Domain::Float(prev), Domain::Float(new)) => prev.widen_from(new),
            (Domain::Pointer(prev), Domain::Pointer(new)) => {
                if prev != new {
                    prev.widen();
                }
            }
            (Domain::Struct(prev), Domain::Struct(new)) => {
                if prev.members().len() == new.members().len() {
                    for index in 0..prev.members().len() {
                        self.widen(&mut prev.members_mut()[index], &new.members()[index]);
                    }
                }
            }
            (Domain::ArrayExact(prev), Domain::ArrayExact(new)) => {
                if prev.len() == new.len() {
                    for index in 0..prev.tracked_elements().len() {
                        let next_elements = new.tracked_elements();
                        let Some(next_element) = next_elements.get(index) else {
                            break;
                        };
                        self.widen(&mut prev.tracked_elements_mut()[index], next_element);
                    }
                }
            }
            (Domain::ArraySingle(prev), Domain::ArraySingle(new)) => {
                self.widen(prev.value_mut(), new.value());
                self.widen(prev.size_mut(), new.size());
            }
            // The remaining domains have finite height and converge on
            // their own.
            _ => {}
        }
    }
}
