//! Per-block, per-function, and module-level analysis records.

use sluice_ir::{BlockId, Function, FunctionId, Module, Place};

use crate::{
    constructors::Constructors,
    domain::{Domain, Pointer},
    memory::{Block, BlockKind, State},
};

/// Analysis record of one basic block: the input state rebuilt from the
/// predecessors on every visit and the accumulated output state.
#[derive(Debug, Clone)]
pub struct BlockRecord {
    /// State at block entry, as of the latest visit.
    pub input: State,
    /// Join of the states observed after the last instruction.
    pub output: State,
    /// Whether the block has been interpreted at least once; phi nodes only
    /// join incoming edges whose source is realized.
    pub reached: bool,
}

impl BlockRecord {
    fn new() -> Self {
        Self {
            input: State::new(),
            output: State::new(),
            reached: false,
        }
    }

    /// State at block entry.
    pub fn input(&self) -> &State {
        &self.input
    }

    /// State after the last instruction.
    pub fn output(&self) -> &State {
        &self.output
    }
}

/// Analysis record of one function: argument/global input state, the
/// summarized output (returned value, globals, heap), and the block records
/// in layout order.
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    /// Function this record belongs to.
    pub id: FunctionId,
    /// Arguments (bottom until a caller provides values) plus globals.
    pub input: State,
    /// Returned value, globals, heap, and foreign stack blocks.
    pub output: State,
    /// One record per basic block.
    pub blocks: Vec<BlockRecord>,
}

impl FunctionRecord {
    /// Fresh record with bottom arguments and the module's global state.
    pub fn new(function: &Function, ctors: &Constructors, global_state: &State) -> Self {
        let mut input = State::new();
        for (place, ty) in &function.params {
            input.add_variable(*place, ctors.create(ty));
        }
        input.join(global_state);

        let mut output = State::new();
        if !function.ret.is_void() {
            output.set_returned(ctors.create(&function.ret));
        }

        Self {
            id: function.id,
            input,
            output,
            blocks: function.blocks.iter().map(|_| BlockRecord::new()).collect(),
        }
    }

    /// Record of one block.
    pub fn block(&self, id: BlockId) -> &BlockRecord {
        &self.blocks[id.0 as usize]
    }

    /// Function-level input state.
    pub fn input(&self) -> &State {
        &self.input
    }

    /// Function-level output state.
    pub fn output(&self) -> &State {
        &self.output
    }

    /// Refresh the output state from the returning blocks: globals, heap,
    /// the returned value, and stack blocks belonging to other frames.
    pub fn update_output_state(&mut self, returning_blocks: &[usize]) {
        for &index in returning_blocks {
            let block_output = self.blocks[index].output.clone();
            self.output.join_global(&block_output);
            self.output.join_returned_from(&block_output);
            self.output
                .join_stack_blocks_except(&block_output, self.id);
        }
    }
}

/// Build the module's initial global state: one heap block per global,
/// seeded from its initializer, plus a pointer variable addressing it.
///
/// Initializers reference other globals symbolically (the pointer to a
/// block exists before the block's content is known), so no initialization
/// order is imposed.
pub fn initial_global_state(module: &Module, ctors: &Constructors) -> State {
    let mut state = State::new();

    for global in &module.globals {
        let content = match &global.initializer {
            Some(constant) => ctors.create_constant(constant),
            // Externally defined: anything may already be in there.
            None => Domain::top_of(&global.ty),
        };
        state.add_block(global.place, Block::new(BlockKind::Heap, content));

        let mut pointer = Pointer::bottom(global.ty.clone());
        pointer.add_block_target(global.place, None);
        state.add_variable(global.place, Domain::Pointer(pointer));
    }

    state
}

/// Extension used by [`FunctionRecord::update_output_state`].
impl State {
    /// Join stack blocks whose allocation site lies outside `own`: the
    /// caller's frame as seen by a callee.
    pub(crate) fn join_stack_blocks_except(&mut self, other: &State, own: FunctionId) {
        for (place, block) in other.blocks() {
            if block.kind() != BlockKind::Stack {
                continue;
            }
            let foreign = !matches!(place, Place::Local { function, .. } if function == own);
            if !foreign {
                continue;
            }
            match self.block_mut(place) {
                Some(mine) => mine.join(block),
                None => self.add_block(place, block.clone()),
            }
        }
    }
}
