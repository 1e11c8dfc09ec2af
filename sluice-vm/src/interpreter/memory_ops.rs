//! Memory-shaped transfer functions: `alloca`, `load`, `store`, and
//! `getelementptr`.

use sluice_ir::{Instruction, Operand, Type};

use super::Interpreter;
use crate::{
    constructors::widen_index,
    domain::{Domain, Pointer},
    memory::{byte_offset, Block, BlockKind},
};

impl Interpreter {
    /// Allocate a stack block and bind a pointer to it.
    pub(super) fn alloca(
        &mut self,
        instruction: &Instruction,
        allocated: &Type,
        count: Option<&Operand>,
    ) {
        let content = match count {
            None => self.ctors.create(allocated),
            Some(count) => {
                let Some(count) = self.operand_value(count) else {
                    return;
                };
                self.ctors
                    .create_array_with_size(allocated, widen_index(count))
            }
        };

        self.state
            .add_block(instruction.result, Block::new(BlockKind::Stack, content));

        let mut pointer = Pointer::bottom(allocated.clone());
        pointer.add_block_target(instruction.result, None);
        self.state
            .add_variable(instruction.result, Domain::Pointer(pointer));
    }

    /// Dereference the pointer, joining every target block's content.
    pub(super) fn load(&mut self, instruction: &Instruction, ptr: &Operand) {
        let Some(pointer) = self.operand_value(ptr) else {
            return;
        };
        let Domain::Pointer(pointer) = pointer else {
            self.saturate_unsupported(instruction, "load through a non-pointer value");
            return;
        };

        // No targets yet means the pointer has not been computed; revisit.
        let Some(value) = pointer.load_through(&instruction.ty, &self.state) else {
            return;
        };
        self.state.add_variable(instruction.result, value);
    }

    /// Write through the pointer into every target block.
    pub(super) fn store(&mut self, value: &Operand, ptr: &Operand) {
        let (Some(value), Some(pointer)) = (self.operand_value(value), self.operand_value(ptr))
        else {
            return;
        };
        let Domain::Pointer(pointer) = pointer else {
            return;
        };
        pointer.store_through(&value, &mut self.state);
    }

    /// Shift the source pointer by the byte offset the indices select.
    pub(super) fn gep(&mut self, instruction: &Instruction, base: &Operand, indices: &[Operand]) {
        let Some(source) = self.operand_value(base) else {
            return;
        };
        let Domain::Pointer(source) = source else {
            self.saturate_unsupported(instruction, "pointer arithmetic on a non-pointer value");
            return;
        };

        // Not all offsets are necessarily known before the fixpoint
        // reaches their definitions.
        let mut index_domains = Vec::with_capacity(indices.len());
        for index in indices {
            let Some(value) = self.operand_value(index) else {
                return;
            };
            index_domains.push(widen_index(value));
        }

        let offset = byte_offset(source.pointee(), &index_domains);
        let pointee = instruction
            .ty
            .pointee()
            .cloned()
            .unwrap_or(Type::Void);
        let result = source.with_offset(&offset, pointee);
        self.state
            .add_variable(instruction.result, Domain::Pointer(result));
    }
}
