//! Observer callbacks emitted by the fixpoint iterator.

use sluice_ir::{BlockId, FunctionId};

/// Hooks the iterator fires as it moves. All methods default to no-ops;
/// implementations observe only and must not assume any ability to steer
/// the iteration.
#[allow(unused_variables)]
pub trait IteratorCallback {
    /// One whole pass over the module changed nothing.
    fn on_fixpoint_reached(&mut self) {}

    /// The cursor entered the module (start of a pass).
    fn on_module_enter(&mut self) {}

    /// The cursor finished the module (end of a pass).
    fn on_module_exit(&mut self) {}

    /// The cursor entered a function.
    fn on_function_enter(&mut self, function: FunctionId) {}

    /// The cursor finished a function.
    fn on_function_exit(&mut self, function: FunctionId) {}

    /// The cursor entered a basic block.
    fn on_basic_block_enter(&mut self, function: FunctionId, block: BlockId) {}

    /// The cursor finished a basic block.
    fn on_basic_block_exit(&mut self, function: FunctionId, block: BlockId) {}

    /// The cursor stands on an instruction about to be interpreted.
    fn on_instruction_enter(&mut self, function: FunctionId, block: BlockId, index: usize) {}

    /// The instruction at the cursor was interpreted.
    fn on_instruction_exit(&mut self, function: FunctionId, block: BlockId, index: usize) {}
}

/// The default do-nothing callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl IteratorCallback for NoopCallback {}
