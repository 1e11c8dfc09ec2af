//! Branch-condition refinement of block input states.
//!
//! When an edge is taken only under a comparison outcome, the comparison
//! constrains the compared values on that edge. The refinement stays
//! flow-sensitive: it meets facts into the joined input state of the
//! successor and keeps no per-path history. Together with threshold
//! widening this is what lets loop counters converge to their real bounds.

use sluice_ir::{Block, BlockId, Constant, InstOp, IntPredicate, Operand, Place};

use crate::{
    apint::ApInt,
    constructors::Constructors,
    domain::Domain,
    memory::State,
};

/// Refine `state` for the control-flow edge `pred_block -> target`.
pub(crate) fn refine_along_edge(
    state: &mut State,
    pred_block: &Block,
    target: BlockId,
    ctors: &Constructors,
) {
    match &pred_block.terminator().op {
        InstOp::CondBr {
            condition: Operand::Place(condition),
            if_true,
            if_false,
        } => {
            if if_true == if_false {
                return;
            }
            let polarity = if target == *if_true {
                true
            } else if target == *if_false {
                false
            } else {
                return;
            };

            // The refinement needs the comparison the condition came from.
            let Some(InstOp::Icmp { pred, lhs, rhs }) = defining_op(pred_block, *condition)
            else {
                return;
            };
            let pred = if polarity { *pred } else { negate(*pred) };
            apply_comparison(state, pred, lhs, rhs, ctors);
            apply_comparison(state, swap(pred), rhs, lhs, ctors);
        }
        InstOp::Switch {
            value: Operand::Place(value),
            default,
            cases,
        } => {
            if target == *default {
                return;
            }
            let selected: Vec<u64> = cases
                .iter()
                .filter(|(_, case_target)| *case_target == target)
                .map(|(case_value, _)| *case_value)
                .collect();
            if selected.is_empty() {
                return;
            }

            let Some(current) = state.find_variable(*value) else {
                return;
            };
            let Some(width) = current.int_width() else {
                return;
            };
            let mut constraint = Domain::bottom_of(&sluice_ir::Type::Int(width));
            for case_value in selected {
                constraint.join(&Domain::int_constant(ApInt::new(width, case_value)));
            }
            if let Some(variable) = state.variable_mut(*value) {
                variable.meet(&constraint);
            }
        }
        _ => {}
    }
}

/// The operation defining `place` inside `block`, if any.
fn defining_op(block: &Block, place: Place) -> Option<&InstOp> {
    block
        .instructions
        .iter()
        .find(|inst| inst.result == place)
        .map(|inst| &inst.op)
}

/// Meet the constraint `lhs PRED rhs` into `lhs`, when `lhs` is a place.
fn apply_comparison(
    state: &mut State,
    pred: IntPredicate,
    lhs: &Operand,
    rhs: &Operand,
    ctors: &Constructors,
) {
    let Operand::Place(place) = lhs else {
        return;
    };

    // Bounds of the right-hand side, from the state or a constant.
    let rhs_value = match rhs {
        Operand::Place(rhs_place) => state.find_variable(*rhs_place).cloned(),
        Operand::Constant(constant @ Constant::Int { .. }) => {
            Some(ctors.create_constant(constant))
        }
        Operand::Constant(_) => None,
    };
    let Some(rhs_value) = rhs_value else {
        return;
    };

    let Some(width) = state.find_variable(*place).and_then(Domain::int_width) else {
        return;
    };
    if rhs_value.int_width() != Some(width) {
        return;
    }

    if pred == IntPredicate::Eq {
        // Equality transfers the whole right-hand value.
        if let Some(variable) = state.variable_mut(*place) {
            variable.meet(&rhs_value);
        }
        return;
    }

    let Some(constraint) = implied_range(pred, &rhs_value, width) else {
        return;
    };
    if let Some(variable) = state.variable_mut(*place) {
        variable.meet(&constraint);
    }
}

/// The interval admitted for `x` by `x PRED rhs`, when expressible.
fn implied_range(pred: IntPredicate, rhs: &Domain, width: u32) -> Option<Domain> {
    let umin = rhs.unsigned_min();
    let umax = rhs.unsigned_max();
    let smin = rhs.signed_min();
    let smax = rhs.signed_max();

    let one = ApInt::one(width);
    let domain = match pred {
        IntPredicate::Ult => {
            let hi = umax?.checked_usub(one)?;
            Domain::int_range(width, Some((ApInt::zero(width), hi)), None)
        }
        IntPredicate::Ule => Domain::int_range(width, Some((ApInt::zero(width), umax?)), None),
        IntPredicate::Ugt => {
            let lo = umin?.checked_uadd(one)?;
            Domain::int_range(width, Some((lo, ApInt::umax_value(width))), None)
        }
        IntPredicate::Uge => {
            Domain::int_range(width, Some((umin?, ApInt::umax_value(width))), None)
        }
        IntPredicate::Slt => {
            let hi = smax?.checked_ssub(one)?;
            Domain::int_range(width, None, Some((ApInt::smin_value(width), hi)))
        }
        IntPredicate::Sle => {
            Domain::int_range(width, None, Some((ApInt::smin_value(width), smax?)))
        }
        IntPredicate::Sgt => {
            let lo = smin?.checked_sadd(one)?;
            Domain::int_range(width, None, Some((lo, ApInt::smax_value(width))))
        }
        IntPredicate::Sge => {
            Domain::int_range(width, None, Some((smin?, ApInt::smax_value(width))))
        }
        // Equality is handled by the caller; disequality excludes a single
        // point, which an interval cannot express.
        IntPredicate::Eq | IntPredicate::Ne => return None,
    };
    Some(domain)
}

/// The predicate with operands swapped.
fn swap(pred: IntPredicate) -> IntPredicate {
    use IntPredicate::*;
    match pred {
        Eq => Eq,
        Ne => Ne,
        Ult => Ugt,
        Ule => Uge,
        Ugt => Ult,
        Uge => Ule,
        Slt => Sgt,
        Sle => Sge,
        Sgt => Slt,
        Sge => Sle,
    }
}

/// The predicate on the false edge.
fn negate(pred: IntPredicate) -> IntPredicate {
    use IntPredicate::*;
    match pred {
        Eq => Ne,
        Ne => Eq,
        Ult => Uge,
        Ule => Ugt,
        Ugt => Ule,
        Uge => Ult,
        Slt => Sge,
        Sle => Sgt,
        Sgt => Sle,
        Sge => Slt,
    }
}
