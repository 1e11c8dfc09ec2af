//! Fixpoint interpreter.
//!
//! Drives the per-opcode transfer functions across basic blocks, functions,
//! and call sites until one whole pass over the module changes nothing. The
//! iterator is single-threaded and owns the live state between instructions;
//! callbacks observe progress but never steer it.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use sluice_ir::{BlockId, FunctionId, Module, Place};
use tracing::{debug, trace};

use crate::{
    constructors::Constructors,
    environment::Environment,
    memory::State,
};

mod callback;
mod flow;
mod memory_ops;
mod record;
mod refine;
mod transfer;
mod widening;

pub use callback::{IteratorCallback, NoopCallback};
pub use record::{BlockRecord, FunctionRecord};
pub use widening::{NumericalInfinity, WideningManager, WideningOperator};

/// Result of driving the iterator with a step budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixpointSummary {
    /// Whether a full quiet pass was observed.
    pub reached: bool,
    /// Instructions interpreted.
    pub steps: u64,
    /// Whole-module passes completed.
    pub rounds: u64,
}

/// Three nested cursors: function, basic block, instruction.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    function: usize,
    block: usize,
    instruction: usize,
}

/// The abstract interpreter for one module.
///
/// Construct with [`Interpreter::new`], pull the cursor to the first
/// instruction with [`Interpreter::initialize`], then either single-step
/// with [`Interpreter::interpret_instruction`] or run to a fixpoint with
/// [`Interpreter::run_to_fixpoint`].
pub struct Interpreter {
    env: Arc<Environment>,
    ctors: Constructors,
    functions: Vec<FunctionRecord>,
    global_state: State,
    widening: WideningManager,
    callback: Box<dyn IteratorCallback>,
    cursor: Cursor,
    state: State,
    changed: bool,
    initialized: bool,
    fixpoint: bool,
    rounds: u64,
    /// Sites already reported for unsupported-feature saturation.
    warned: BTreeSet<Place>,
}

impl Interpreter {
    /// Build the interpreter and its per-function records for a module.
    pub fn new(module: Module) -> Self {
        let widening = WideningManager::with_default(&module);
        let env = Arc::new(Environment::new(module));
        let ctors = Constructors::new(env.clone());

        let global_state = record::initial_global_state(env.module(), &ctors);
        let functions = env
            .module()
            .functions
            .iter()
            .map(|function| FunctionRecord::new(function, &ctors, &global_state))
            .collect();

        Self {
            env,
            ctors,
            functions,
            global_state,
            widening,
            callback: Box::new(NoopCallback),
            cursor: Cursor::default(),
            state: State::new(),
            changed: false,
            initialized: false,
            fixpoint: false,
            rounds: 0,
            warned: BTreeSet::new(),
        }
    }

    /// Install the observer callback.
    pub fn set_callback(&mut self, callback: Box<dyn IteratorCallback>) {
        self.callback = callback;
    }

    /// The shared environment.
    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// The record of one function.
    pub fn function_record(&self, id: FunctionId) -> &FunctionRecord {
        &self.functions[id.0 as usize]
    }

    /// The module-wide global state.
    pub fn global_state(&self) -> &State {
        &self.global_state
    }

    /// The live state between instructions.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Whether a whole quiet pass has been observed.
    pub fn fixpoint_reached(&self) -> bool {
        self.fixpoint
    }

    /// Pull the cursor to the first instruction of the module.
    pub fn initialize(&mut self) {
        self.initialized = true;
        self.fixpoint = false;
        self.changed = false;
        self.cursor = Cursor::default();

        // Land on the first function that has a body.
        while self.cursor.function < self.functions.len()
            && self.current_function().blocks.is_empty()
        {
            self.cursor.function += 1;
        }

        self.callback.on_module_enter();
        if self.cursor.function < self.functions.len() {
            let id = FunctionId(self.cursor.function as u32);
            self.callback.on_function_enter(id);
            self.enter_block(0);
        } else {
            // A module of declarations has nothing to iterate.
            self.fixpoint = true;
            self.callback.on_fixpoint_reached();
        }
    }

    fn current_function(&self) -> &sluice_ir::Function {
        &self.env.module().functions[self.cursor.function]
    }

    /// Interpret the instruction under the cursor and advance.
    pub fn interpret_instruction(&mut self) {
        assert!(self.initialized, "initialize() must run first");
        if self.cursor.function >= self.functions.len() {
            return;
        }

        let env = self.env.clone();
        let function = &env.module().functions[self.cursor.function];
        let instruction =
            &function.blocks[self.cursor.block].instructions[self.cursor.instruction];

        trace!(
            function = function.name.as_str(),
            block = self.cursor.block,
            opcode = instruction.opcode(),
            "interpret"
        );
        self.transfer(instruction);

        let function_id = FunctionId(self.cursor.function as u32);
        let block_id = BlockId(self.cursor.block as u32);
        self.callback
            .on_instruction_exit(function_id, block_id, self.cursor.instruction);

        self.advance();
    }

    /// Single-step until a fixpoint or until `max_steps` instructions have
    /// been interpreted.
    pub fn run_to_fixpoint(&mut self, max_steps: u64) -> FixpointSummary {
        if !self.initialized {
            self.initialize();
        }

        let mut steps = 0;
        while !self.fixpoint && steps < max_steps {
            self.interpret_instruction();
            steps += 1;
        }

        FixpointSummary {
            reached: self.fixpoint,
            steps,
            rounds: self.rounds,
        }
    }

    fn advance(&mut self) {
        self.cursor.instruction += 1;
        let block_len = self.current_function().blocks[self.cursor.block]
            .instructions
            .len();
        if self.cursor.instruction < block_len {
            let function_id = FunctionId(self.cursor.function as u32);
            let block_id = BlockId(self.cursor.block as u32);
            self.callback
                .on_instruction_enter(function_id, block_id, self.cursor.instruction);
            return;
        }

        // Block finished: fold the live state into the recorded output,
        // widening where it grew.
        let function_id = FunctionId(self.cursor.function as u32);
        let block_id = BlockId(self.cursor.block as u32);
        self.callback.on_basic_block_exit(function_id, block_id);

        let record = &mut self.functions[self.cursor.function].blocks[self.cursor.block];
        if self.state != record.output {
            self.widening.widen_state(&mut record.output, &self.state);
            record.output.join(&self.state);
            self.changed = true;
        }
        record.reached = true;

        let last_block = self.cursor.block + 1 == self.current_function().blocks.len();
        if last_block {
            let function = self.current_function();
            let returning: Vec<usize> = function
                .block_ids()
                .filter(|&b| function.returns(b))
                .map(|b| b.0 as usize)
                .collect();
            self.functions[self.cursor.function].update_output_state(&returning);
            self.callback.on_function_exit(function_id);
        }

        // Advance the block cursor, then the function cursor, then wrap the
        // module.
        self.cursor.block += 1;
        if last_block {
            loop {
                self.cursor.function += 1;
                if self.cursor.function >= self.functions.len() {
                    self.wrap_module();
                }
                if !self.current_function().blocks.is_empty() {
                    break;
                }
            }
            self.cursor.block = 0;
            self.callback
                .on_function_enter(FunctionId(self.cursor.function as u32));
        }

        self.enter_block(self.cursor.block);
    }

    fn wrap_module(&mut self) {
        for index in 0..self.functions.len() {
            let output = self.functions[index].output.clone();
            self.global_state.join_global(&output);
        }
        self.callback.on_module_exit();
        self.rounds += 1;

        if !self.changed {
            debug!(rounds = self.rounds, "fixpoint reached");
            self.fixpoint = true;
            self.callback.on_fixpoint_reached();
        }
        self.changed = false;
        self.cursor.function = 0;
        self.callback.on_module_enter();

        // Skip declarations at the front.
        while self.current_function().blocks.is_empty() {
            self.cursor.function += 1;
        }
    }

    /// Rebuild the input state of a block from its predecessors' outputs
    /// and make it the live state.
    fn enter_block(&mut self, block: usize) {
        self.cursor.block = block;
        self.cursor.instruction = 0;

        let env = self.env.clone();
        let function = &env.module().functions[self.cursor.function];
        let block_id = BlockId(block as u32);

        let mut input = State::new();
        for pred in function.predecessors(block_id) {
            let pred_record = &self.functions[self.cursor.function].blocks[pred.0 as usize];
            if !pred_record.reached {
                continue;
            }
            let mut refined = pred_record.output.clone();
            refine::refine_along_edge(
                &mut refined,
                &function.blocks[pred.0 as usize],
                block_id,
                &self.ctors,
            );
            input.join(&refined);
        }
        if block_id == function.entry() {
            input.join(&self.functions[self.cursor.function].input);
        }

        self.functions[self.cursor.function].blocks[block].input = input.clone();
        self.state = input;

        let function_id = FunctionId(self.cursor.function as u32);
        self.callback.on_basic_block_enter(function_id, block_id);
        self.callback
            .on_instruction_enter(function_id, block_id, 0);
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("module", &self.env.module().name)
            .field("functions", &self.functions.len())
            .field("fixpoint", &self.fixpoint)
            .field("rounds", &self.rounds)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = self.env.module();
        let slots = self.env.slots();

        writeln!(f, "***************************************")?;
        writeln!(f, "* module {}", module.name)?;
        writeln!(f, "***************************************")?;

        for global in &module.globals {
            match self.global_state.find_block(global.place) {
                Some(block) => {
                    writeln!(f, "{} = {}", slots.name(global.place), block.value())?
                }
                None => writeln!(f, "{} = undefined", slots.name(global.place))?,
            }
        }

        for function in &module.functions {
            if function.is_declaration {
                continue;
            }
            let record = &self.functions[function.id.0 as usize];

            writeln!(f)?;
            writeln!(f, "** function {}", function.name)?;
            for (place, _) in &function.params {
                match record.input.find_variable(*place) {
                    Some(value) => writeln!(f, "{} = {}", slots.name(*place), value)?,
                    None => writeln!(f, "{} = undefined", slots.name(*place))?,
                }
            }

            if let Some(returned) = record.output.returned_value() {
                writeln!(f, "returnedValue = {returned}")?;
            }

            for (index, block) in function.blocks.iter().enumerate() {
                let label = block.label.as_deref().unwrap_or("block");
                writeln!(f, "*** {label}")?;
                let output = &record.blocks[index].output;
                for instruction in &block.instructions {
                    if instruction.ty.is_void() {
                        continue;
                    }
                    match output.find_variable(instruction.result) {
                        Some(value) => {
                            writeln!(f, "{} = {}", slots.name(instruction.result), value)?
                        }
                        None => {
                            writeln!(f, "{} = undefined", slots.name(instruction.result))?
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
