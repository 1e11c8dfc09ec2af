//! Instruction dispatch and the shared transfer-function shapes.
//!
//! Every transfer function follows the same discipline: look the operands
//! up, and if any is missing return without emitting a fact; the fixpoint
//! comes back once the operand's definition has been interpreted. A missing
//! operand must never be confused with top.

use sluice_ir::{BinaryOp, CastOp, FloatPredicate, InstOp, Instruction, IntPredicate, Operand};
use tracing::warn;

use super::Interpreter;
use crate::domain::Domain;

impl Interpreter {
    /// Interpret one instruction against the live state.
    pub(super) fn transfer(&mut self, instruction: &Instruction) {
        match &instruction.op {
            InstOp::Binary { op, lhs, rhs } => self.binary_operation(instruction, *op, lhs, rhs),
            InstOp::Icmp { pred, lhs, rhs } => self.icmp_operation(instruction, *pred, lhs, rhs),
            InstOp::Fcmp { pred, lhs, rhs } => self.fcmp_operation(instruction, *pred, lhs, rhs),
            InstOp::Cast { op, value } => self.cast_operation(instruction, *op, value),
            InstOp::Alloca { allocated, count } => {
                self.alloca(instruction, allocated, count.as_ref())
            }
            InstOp::Load { ptr } => self.load(instruction, ptr),
            InstOp::Store { value, ptr } => self.store(value, ptr),
            InstOp::GetElementPtr { base, indices } => self.gep(instruction, base, indices),
            InstOp::ExtractElement { vector, index } => {
                self.extract_element(instruction, vector, index)
            }
            InstOp::InsertElement {
                vector,
                element,
                index,
            } => self.insert_element(instruction, vector, element, index),
            InstOp::ShuffleVector { lhs, rhs, mask } => {
                self.shuffle_vector(instruction, lhs, rhs, mask)
            }
            InstOp::ExtractValue { aggregate, indices } => {
                self.extract_value(instruction, aggregate, indices)
            }
            InstOp::InsertValue {
                aggregate,
                element,
                indices,
            } => self.insert_value(instruction, aggregate, element, indices),
            InstOp::Phi { incoming } => self.phi(instruction, incoming),
            InstOp::Select {
                condition,
                if_true,
                if_false,
            } => self.select(instruction, condition, if_true, if_false),
            InstOp::Call { callee, args } => self.call(instruction, *callee, args),
            InstOp::VaArg { .. } => self.va_arg(instruction),
            InstOp::Ret { value } => self.ret(value.as_ref()),
            // Control transfer carries no state; successors read this
            // block's output.
            InstOp::Br { .. }
            | InstOp::CondBr { .. }
            | InstOp::Switch { .. }
            | InstOp::IndirectBr { .. }
            | InstOp::Unreachable => {}
        }
    }

    /// Value of an operand: a recorded variable or a materialized constant.
    /// `None` means the fixpoint has not reached the definition yet.
    pub(super) fn operand_value(&self, operand: &Operand) -> Option<Domain> {
        match operand {
            Operand::Place(place) => self.state.find_variable(*place).cloned(),
            Operand::Constant(constant) => Some(self.ctors.create_constant(constant)),
        }
    }

    /// Report an unsupported construct once per site and move on with top.
    pub(super) fn saturate_unsupported(&mut self, instruction: &Instruction, what: &str) {
        if self.warned.insert(instruction.result) {
            warn!(opcode = instruction.opcode(), "{what}; result saturates");
        }
        if !instruction.ty.is_void() {
            self.state
                .add_variable(instruction.result, Domain::top_of(&instruction.ty));
        }
    }

    fn binary_operation(
        &mut self,
        instruction: &Instruction,
        op: BinaryOp,
        lhs: &Operand,
        rhs: &Operand,
    ) {
        let (Some(a), Some(b)) = (self.operand_value(lhs), self.operand_value(rhs)) else {
            return;
        };

        let mut result = self.ctors.create(&instruction.ty);
        result.binary(op, &a, &b);
        self.state.add_variable(instruction.result, result);
    }

    fn icmp_operation(
        &mut self,
        instruction: &Instruction,
        pred: IntPredicate,
        lhs: &Operand,
        rhs: &Operand,
    ) {
        let (Some(a), Some(b)) = (self.operand_value(lhs), self.operand_value(rhs)) else {
            return;
        };

        let mut result = self.ctors.create(&instruction.ty);
        result.icmp(&a, &b, pred);
        self.state.add_variable(instruction.result, result);
    }

    fn fcmp_operation(
        &mut self,
        instruction: &Instruction,
        pred: FloatPredicate,
        lhs: &Operand,
        rhs: &Operand,
    ) {
        let (Some(a), Some(b)) = (self.operand_value(lhs), self.operand_value(rhs)) else {
            return;
        };

        let mut result = self.ctors.create(&instruction.ty);
        result.fcmp(&a, &b, pred);
        self.state.add_variable(instruction.result, result);
    }

    fn cast_operation(&mut self, instruction: &Instruction, op: CastOp, value: &Operand) {
        let Some(source) = self.operand_value(value) else {
            return;
        };

        // The pointer re-wrapping casts carry the value through unchanged
        // up to its static type; everything else folds through the domain.
        let result = match op {
            CastOp::BitCast | CastOp::IntToPtr => match source {
                Domain::Pointer(pointer) => {
                    let pointee = instruction
                        .ty
                        .pointee()
                        .cloned()
                        .unwrap_or(sluice_ir::Type::Void);
                    Domain::Pointer(pointer.retyped(pointee))
                }
                // A genuine integer turned into a pointer is an absolute
                // address: a numeric target.
                other if op == CastOp::IntToPtr => {
                    let pointee = instruction
                        .ty
                        .pointee()
                        .cloned()
                        .unwrap_or(sluice_ir::Type::Void);
                    let mut pointer = crate::domain::Pointer::bottom(pointee);
                    pointer.add_numeric_target(crate::constructors::widen_index(other));
                    Domain::Pointer(pointer)
                }
                _ => Domain::top_of(&instruction.ty),
            },
            // The pointer keeps its identity under an integer name, so a
            // later `inttoptr` can recover the targets.
            CastOp::PtrToInt => source,
            _ => {
                let mut result = self.ctors.create(&instruction.ty);
                result.cast(op, &source);
                result
            }
        };
        self.state.add_variable(instruction.result, result);
    }

    fn extract_element(&mut self, instruction: &Instruction, vector: &Operand, index: &Operand) {
        let (Some(array), Some(index)) = (self.operand_value(vector), self.operand_value(index))
        else {
            return;
        };
        self.state
            .add_variable(instruction.result, array.extract_element(&index));
    }

    fn insert_element(
        &mut self,
        instruction: &Instruction,
        vector: &Operand,
        element: &Operand,
        index: &Operand,
    ) {
        let (Some(array), Some(element), Some(index)) = (
            self.operand_value(vector),
            self.operand_value(element),
            self.operand_value(index),
        ) else {
            return;
        };

        let mut result = self.ctors.create(&instruction.ty);
        result.insert_element(&array, &element, &index);
        self.state.add_variable(instruction.result, result);
    }

    fn shuffle_vector(
        &mut self,
        instruction: &Instruction,
        lhs: &Operand,
        rhs: &Operand,
        mask: &[u32],
    ) {
        let (Some(a), Some(b)) = (self.operand_value(lhs), self.operand_value(rhs)) else {
            return;
        };

        let mut result = self.ctors.create(&instruction.ty);
        result.shuffle_vector(&a, &b, mask);
        self.state.add_variable(instruction.result, result);
    }

    fn extract_value(&mut self, instruction: &Instruction, aggregate: &Operand, indices: &[u32]) {
        let Some(aggregate) = self.operand_value(aggregate) else {
            return;
        };
        self.state
            .add_variable(instruction.result, aggregate.extract_value(indices));
    }

    fn insert_value(
        &mut self,
        instruction: &Instruction,
        aggregate: &Operand,
        element: &Operand,
        indices: &[u32],
    ) {
        let (Some(aggregate), Some(element)) =
            (self.operand_value(aggregate), self.operand_value(element))
        else {
            return;
        };

        let mut result = self.ctors.create(&instruction.ty);
        result.insert_value(&aggregate, &element, indices);
        self.state.add_variable(instruction.result, result);
    }
}
