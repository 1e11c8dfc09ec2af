//! Value-flow transfer functions: `phi`, `select`, `call`, `va_arg`, and
//! `ret`.

use sluice_ir::{BlockId, FunctionId, Instruction, Operand};
use tracing::trace;

use super::Interpreter;
use crate::memory::State;

impl Interpreter {
    /// Join the incoming values whose source edge is realized.
    pub(super) fn phi(&mut self, instruction: &Instruction, incoming: &[(BlockId, Operand)]) {
        let mut merged: Option<crate::domain::Domain> = None;
        for (pred, operand) in incoming {
            let realized =
                self.functions[self.cursor.function].blocks[pred.0 as usize].reached;
            if !realized {
                continue;
            }
            let Some(value) = self.operand_value(operand) else {
                continue;
            };
            match &mut merged {
                Some(merged) => merged.join(&value),
                None => merged = Some(value),
            }
        }

        if let Some(merged) = merged {
            self.state.add_variable(instruction.result, merged);
        }
    }

    /// Pick by the condition's known bit, joining both arms when it is
    /// unknown.
    pub(super) fn select(
        &mut self,
        instruction: &Instruction,
        condition: &Operand,
        if_true: &Operand,
        if_false: &Operand,
    ) {
        let Some(condition) = self.operand_value(condition) else {
            return;
        };
        let Some(bit) = condition.bitfield().map(|bitfield| bitfield.get_bit(0)) else {
            return;
        };

        let result = match bit {
            // The condition is still undefined; wait for another round.
            -1 => return,
            0 => self.operand_value(if_false),
            1 => self.operand_value(if_true),
            _ => {
                let (Some(mut on_true), Some(on_false)) = (
                    self.operand_value(if_true),
                    self.operand_value(if_false),
                ) else {
                    return;
                };
                on_true.join(&on_false);
                Some(on_true)
            }
        };

        if let Some(result) = result {
            self.state.add_variable(instruction.result, result);
        }
    }

    /// Interprocedural transfer.
    ///
    /// The callee's recorded input absorbs the caller's globals, stack
    /// blocks, and argument values; the caller absorbs the callee's current
    /// output summary. The iterator re-runs callees to fixpoint, so the
    /// result is context-insensitive but call-graph-sound.
    pub(super) fn call(&mut self, instruction: &Instruction, callee: FunctionId, args: &[Operand]) {
        let env = self.env.clone();
        let function = env.module().function(callee);

        if function.is_declaration {
            // External functions may do anything to the value they return.
            self.saturate_unsupported(
                instruction,
                "call to a function without a body",
            );
            return;
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let Some(value) = self.operand_value(arg) else {
                return;
            };
            values.push(value);
        }

        let mut calling = State::new();
        calling.join_global(&self.state);
        calling.join_stack_blocks(&self.state);

        let positional = function.params.len();
        for ((place, _), value) in function.params.iter().zip(&values) {
            calling.add_variable(*place, value.clone());
        }
        if values.len() > positional {
            calling.add_variadic_args(instruction.result, values[positional..].to_vec());
        }

        trace!(callee = function.name.as_str(), "call");
        let record = &mut self.functions[callee.0 as usize];
        record.input.join(&calling);

        // Use the callee's interpretation as of this round.
        let output = record.output.clone();
        self.state.join_global(&output);
        self.state.join_stack_blocks(&output);
        if let Some(returned) = output.returned_value() {
            if !instruction.ty.is_void() {
                self.state.add_variable(instruction.result, returned.clone());
            }
        }
    }

    /// Variadic reads saturate; the argument lists themselves are recorded
    /// at call sites.
    pub(super) fn va_arg(&mut self, instruction: &Instruction) {
        self.saturate_unsupported(instruction, "va_arg read");
    }

    /// Join the returned operand into the state's returned-value slot.
    pub(super) fn ret(&mut self, value: Option<&Operand>) {
        let Some(value) = value else {
            return;
        };
        let Some(value) = self.operand_value(value) else {
            return;
        };
        self.state.join_returned(&value);
    }
}
