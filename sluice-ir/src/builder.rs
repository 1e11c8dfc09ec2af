//! Programmatic construction of well-formed modules.

use crate::{
    instruction::{BinaryOp, CastOp, FloatPredicate, InstOp, Instruction, IntPredicate, Operand},
    module::{Block, BlockId, Function, FunctionId, Global, Module, Place},
    Constant, Type,
};

/// Errors reported while building a module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// An integer type wider than 64 bits was used.
    #[error("integer width {0} exceeds the supported maximum of 64 bits")]
    WidthTooLarge(u32),
    /// An integer type of width zero was used.
    #[error("integer width must be at least 1")]
    ZeroWidth,
    /// A block was left without a terminator.
    #[error("block {0} of function `{1}` has no terminator")]
    MissingTerminator(u32, String),
    /// An instruction follows the block terminator.
    #[error("block {0} of function `{1}` continues past its terminator")]
    InstructionAfterTerminator(u32, String),
    /// A branch names a block that does not exist.
    #[error("function `{0}` branches to unknown block {1}")]
    UnknownBlock(String, u32),
    /// A call does not match the callee signature.
    #[error("call to `{callee}` passes {passed} arguments, signature has {expected}")]
    ArityMismatch {
        /// Callee name.
        callee: String,
        /// Arguments at the call site.
        passed: usize,
        /// Arguments in the signature.
        expected: usize,
    },
    /// A function body was installed twice.
    #[error("function `{0}` already has a body")]
    DuplicateBody(String),
    /// A function id does not belong to this module.
    #[error("unknown function id {0}")]
    UnknownFunction(u32),
}

fn check_type(ty: &Type) -> Result<(), BuildError> {
    match ty {
        Type::Int(0) => Err(BuildError::ZeroWidth),
        Type::Int(bits) if *bits > 64 => Err(BuildError::WidthTooLarge(*bits)),
        Type::Ptr(pointee) => check_type(pointee),
        Type::Array { elem, .. } | Type::Vector { elem, .. } => check_type(elem),
        Type::Struct(fields) => fields.iter().try_for_each(check_type),
        _ => Ok(()),
    }
}

/// Incrementally builds a [`Module`].
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    name: String,
    globals: Vec<Global>,
    functions: Vec<Function>,
}

impl ModuleBuilder {
    /// Start an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Add a global variable and return its place.
    pub fn global(
        &mut self,
        name: impl Into<String>,
        ty: Type,
        initializer: Option<Constant>,
        is_constant: bool,
    ) -> Result<Place, BuildError> {
        check_type(&ty)?;
        let place = Place::Global(self.globals.len() as u32);
        self.globals.push(Global {
            place,
            name: name.into(),
            ty,
            initializer,
            is_constant,
        });
        Ok(place)
    }

    /// Register a function signature. The function stays a declaration until
    /// a body built with [`ModuleBuilder::body`] is installed.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        params: &[Type],
        ret: Type,
    ) -> Result<FunctionId, BuildError> {
        for ty in params {
            check_type(ty)?;
        }
        check_type(&ret)?;

        let id = FunctionId(self.functions.len() as u32);
        let params = params
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                (
                    Place::Local {
                        function: id,
                        index: index as u32,
                    },
                    ty.clone(),
                )
            })
            .collect();

        self.functions.push(Function {
            id,
            name: name.into(),
            params,
            ret,
            blocks: Vec::new(),
            is_declaration: true,
        });
        Ok(id)
    }

    /// Start building the body of a previously declared function.
    pub fn body(&self, id: FunctionId) -> Result<FunctionBuilder, BuildError> {
        let function = self
            .functions
            .get(id.0 as usize)
            .ok_or(BuildError::UnknownFunction(id.0))?;

        if !function.is_declaration {
            return Err(BuildError::DuplicateBody(function.name.clone()));
        }

        Ok(FunctionBuilder {
            id,
            params: function.params.clone(),
            blocks: Vec::new(),
            current: None,
            next_local: function.params.len() as u32,
        })
    }

    /// Install a finished body into its declaration.
    pub fn install(&mut self, body: FunctionBuilder) -> Result<(), BuildError> {
        let name = self.functions[body.id.0 as usize].name.clone();

        for (index, block) in body.blocks.iter().enumerate() {
            let mut terminated = false;
            for inst in &block.instructions {
                if terminated {
                    return Err(BuildError::InstructionAfterTerminator(
                        index as u32,
                        name.clone(),
                    ));
                }
                terminated = inst.op.is_terminator();

                if let InstOp::Call { callee, args } = &inst.op {
                    let signature = self
                        .functions
                        .get(callee.0 as usize)
                        .ok_or(BuildError::UnknownFunction(callee.0))?;

                    if args.len() < signature.params.len() {
                        return Err(BuildError::ArityMismatch {
                            callee: signature.name.clone(),
                            passed: args.len(),
                            expected: signature.params.len(),
                        });
                    }
                }
                check_type(&inst.ty)?;
            }

            if !terminated {
                return Err(BuildError::MissingTerminator(index as u32, name.clone()));
            }

            let block_count = body.blocks.len() as u32;
            for succ in block.successors() {
                if succ.0 >= block_count {
                    return Err(BuildError::UnknownBlock(name.clone(), succ.0));
                }
            }
        }

        let function = &mut self.functions[body.id.0 as usize];
        function.blocks = body.blocks;
        function.is_declaration = false;
        Ok(())
    }

    /// Finish the module.
    pub fn build(self) -> Module {
        Module {
            name: self.name,
            globals: self.globals,
            functions: self.functions,
        }
    }
}

/// Builds the body of one function, block by block.
///
/// Instructions append to the block selected with
/// [`FunctionBuilder::switch_to`]; value-producing helpers return the operand
/// naming their result.
#[derive(Debug)]
pub struct FunctionBuilder {
    id: FunctionId,
    params: Vec<(Place, Type)>,
    blocks: Vec<Block>,
    current: Option<usize>,
    next_local: u32,
}

impl FunctionBuilder {
    /// The id of the function being built.
    pub const fn id(&self) -> FunctionId {
        self.id
    }

    /// Operand naming argument `index`.
    pub fn arg(&self, index: usize) -> Operand {
        Operand::Place(self.params[index].0)
    }

    /// Create a new empty block. The first created block is the entry.
    pub fn block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            label: Some(label.into()),
            instructions: Vec::new(),
        });
        if self.current.is_none() {
            self.current = Some(id.0 as usize);
        }
        id
    }

    /// Direct subsequent instructions into `block`.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = Some(block.0 as usize);
    }

    fn fresh_place(&mut self) -> Place {
        let place = Place::Local {
            function: self.id,
            index: self.next_local,
        };
        self.next_local += 1;
        place
    }

    /// Append an instruction with the given result type and return the
    /// operand naming its result.
    pub fn push(&mut self, ty: Type, op: InstOp) -> Operand {
        let result = self.fresh_place();
        let block = self.current.expect("no block selected");
        self.blocks[block]
            .instructions
            .push(Instruction { result, ty, op });
        Operand::Place(result)
    }

    /// Binary arithmetic or logic.
    pub fn binary(
        &mut self,
        op: BinaryOp,
        ty: Type,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Operand {
        self.push(
            ty,
            InstOp::Binary {
                op,
                lhs: lhs.into(),
                rhs: rhs.into(),
            },
        )
    }

    /// Integer comparison; the result is an `i1`.
    pub fn icmp(
        &mut self,
        pred: IntPredicate,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Operand {
        self.push(
            Type::i1(),
            InstOp::Icmp {
                pred,
                lhs: lhs.into(),
                rhs: rhs.into(),
            },
        )
    }

    /// Float comparison; the result is an `i1`.
    pub fn fcmp(
        &mut self,
        pred: FloatPredicate,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Operand {
        self.push(
            Type::i1(),
            InstOp::Fcmp {
                pred,
                lhs: lhs.into(),
                rhs: rhs.into(),
            },
        )
    }

    /// Type conversion to `ty`.
    pub fn cast(&mut self, op: CastOp, ty: Type, value: impl Into<Operand>) -> Operand {
        self.push(
            ty,
            InstOp::Cast {
                op,
                value: value.into(),
            },
        )
    }

    /// Stack allocation; returns the pointer operand.
    pub fn alloca(&mut self, allocated: Type) -> Operand {
        self.push(
            Type::ptr(allocated.clone()),
            InstOp::Alloca {
                allocated,
                count: None,
            },
        )
    }

    /// Stack array allocation with a runtime element count.
    pub fn alloca_array(&mut self, allocated: Type, count: impl Into<Operand>) -> Operand {
        self.push(
            Type::ptr(allocated.clone()),
            InstOp::Alloca {
                allocated,
                count: Some(count.into()),
            },
        )
    }

    /// Load a value of type `ty` through `ptr`.
    pub fn load(&mut self, ty: Type, ptr: impl Into<Operand>) -> Operand {
        self.push(ty, InstOp::Load { ptr: ptr.into() })
    }

    /// Store `value` through `ptr`.
    pub fn store(&mut self, value: impl Into<Operand>, ptr: impl Into<Operand>) {
        self.push(
            Type::Void,
            InstOp::Store {
                value: value.into(),
                ptr: ptr.into(),
            },
        );
    }

    /// Pointer arithmetic; `ty` is the resulting pointer type.
    pub fn gep(
        &mut self,
        ty: Type,
        base: impl Into<Operand>,
        indices: Vec<Operand>,
    ) -> Operand {
        self.push(
            ty,
            InstOp::GetElementPtr {
                base: base.into(),
                indices,
            },
        )
    }

    /// SSA phi node of type `ty`.
    pub fn phi(&mut self, ty: Type, incoming: Vec<(BlockId, Operand)>) -> Operand {
        self.push(ty, InstOp::Phi { incoming })
    }

    /// Add incoming edges to a phi created earlier. This is how loops are
    /// closed: the back-edge value does not exist yet when the phi is
    /// created.
    pub fn add_incoming(&mut self, phi: &Operand, edges: Vec<(BlockId, Operand)>) {
        let Operand::Place(place) = phi else {
            panic!("add_incoming needs a phi result operand");
        };
        for block in &mut self.blocks {
            for inst in &mut block.instructions {
                if inst.result != *place {
                    continue;
                }
                let InstOp::Phi { incoming } = &mut inst.op else {
                    panic!("add_incoming target is not a phi");
                };
                incoming.extend(edges);
                return;
            }
        }
        panic!("add_incoming found no instruction at the given place");
    }

    /// Two-way select.
    pub fn select(
        &mut self,
        ty: Type,
        condition: impl Into<Operand>,
        if_true: impl Into<Operand>,
        if_false: impl Into<Operand>,
    ) -> Operand {
        self.push(
            ty,
            InstOp::Select {
                condition: condition.into(),
                if_true: if_true.into(),
                if_false: if_false.into(),
            },
        )
    }

    /// Direct call; `ty` is the callee return type.
    pub fn call(&mut self, ty: Type, callee: FunctionId, args: Vec<Operand>) -> Operand {
        self.push(ty, InstOp::Call { callee, args })
    }

    /// Read one vector lane.
    pub fn extract_element(
        &mut self,
        ty: Type,
        vector: impl Into<Operand>,
        index: impl Into<Operand>,
    ) -> Operand {
        self.push(
            ty,
            InstOp::ExtractElement {
                vector: vector.into(),
                index: index.into(),
            },
        )
    }

    /// Replace one vector lane; `ty` is the vector type.
    pub fn insert_element(
        &mut self,
        ty: Type,
        vector: impl Into<Operand>,
        element: impl Into<Operand>,
        index: impl Into<Operand>,
    ) -> Operand {
        self.push(
            ty,
            InstOp::InsertElement {
                vector: vector.into(),
                element: element.into(),
                index: index.into(),
            },
        )
    }

    /// Read a nested aggregate member.
    pub fn extract_value(
        &mut self,
        ty: Type,
        aggregate: impl Into<Operand>,
        indices: Vec<u32>,
    ) -> Operand {
        self.push(
            ty,
            InstOp::ExtractValue {
                aggregate: aggregate.into(),
                indices,
            },
        )
    }

    /// Replace a nested aggregate member; `ty` is the aggregate type.
    pub fn insert_value(
        &mut self,
        ty: Type,
        aggregate: impl Into<Operand>,
        element: impl Into<Operand>,
        indices: Vec<u32>,
    ) -> Operand {
        self.push(
            ty,
            InstOp::InsertValue {
                aggregate: aggregate.into(),
                element: element.into(),
                indices,
            },
        )
    }

    /// Return from the function.
    pub fn ret(&mut self, value: Option<Operand>) {
        self.push(Type::Void, InstOp::Ret { value });
    }

    /// Unconditional branch.
    pub fn br(&mut self, target: BlockId) {
        self.push(Type::Void, InstOp::Br { target });
    }

    /// Conditional branch.
    pub fn cond_br(&mut self, condition: impl Into<Operand>, if_true: BlockId, if_false: BlockId) {
        self.push(
            Type::Void,
            InstOp::CondBr {
                condition: condition.into(),
                if_true,
                if_false,
            },
        );
    }

    /// Multi-way branch.
    pub fn switch(
        &mut self,
        value: impl Into<Operand>,
        default: BlockId,
        cases: Vec<(u64, BlockId)>,
    ) {
        self.push(
            Type::Void,
            InstOp::Switch {
                value: value.into(),
                default,
                cases,
            },
        );
    }

    /// Unreachable marker.
    pub fn unreachable(&mut self) {
        self.push(Type::Void, InstOp::Unreachable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_void_fn(mb: &mut ModuleBuilder, name: &str) -> FunctionId {
        mb.declare(name, &[], Type::Void).unwrap()
    }

    #[test]
    fn builds_a_minimal_module() {
        let mut mb = ModuleBuilder::new("m");
        let id = mb.declare("answer", &[], Type::i32()).unwrap();
        let mut fb = mb.body(id).unwrap();
        fb.block("entry");
        let v = fb.binary(
            BinaryOp::Add,
            Type::i32(),
            Constant::i32(40),
            Constant::i32(2),
        );
        fb.ret(Some(v));
        mb.install(fb).unwrap();

        let module = mb.build();
        let function = module.function_by_name("answer").unwrap();
        assert!(!function.is_declaration);
        assert_eq!(function.blocks.len(), 1);
        assert_eq!(function.block(BlockId(0)).instructions.len(), 2);
    }

    #[test]
    fn rejects_missing_terminator() {
        let mut mb = ModuleBuilder::new("m");
        let id = empty_void_fn(&mut mb, "f");
        let mut fb = mb.body(id).unwrap();
        fb.block("entry");
        let err = mb.install(fb).unwrap_err();
        assert!(matches!(err, BuildError::MissingTerminator(0, _)));
    }

    #[test]
    fn rejects_branch_to_unknown_block() {
        let mut mb = ModuleBuilder::new("m");
        let id = empty_void_fn(&mut mb, "f");
        let mut fb = mb.body(id).unwrap();
        fb.block("entry");
        fb.br(BlockId(7));
        let err = mb.install(fb).unwrap_err();
        assert!(matches!(err, BuildError::UnknownBlock(_, 7)));
    }

    #[test]
    fn rejects_wide_integers() {
        let mut mb = ModuleBuilder::new("m");
        let err = mb.declare("f", &[Type::Int(128)], Type::Void).unwrap_err();
        assert_eq!(err, BuildError::WidthTooLarge(128));
    }

    #[test]
    fn rejects_call_arity_mismatch() {
        let mut mb = ModuleBuilder::new("m");
        let callee = mb.declare("callee", &[Type::i32()], Type::Void).unwrap();
        let caller = empty_void_fn(&mut mb, "caller");
        let mut fb = mb.body(caller).unwrap();
        fb.block("entry");
        fb.call(Type::Void, callee, vec![]);
        fb.ret(None);
        let err = mb.install(fb).unwrap_err();
        assert!(matches!(err, BuildError::ArityMismatch { .. }));
    }

    #[test]
    fn predecessors_follow_terminators() {
        let mut mb = ModuleBuilder::new("m");
        let id = empty_void_fn(&mut mb, "f");
        let mut fb = mb.body(id).unwrap();
        let entry = fb.block("entry");
        let left = fb.block("left");
        let right = fb.block("right");
        let join = fb.block("join");

        fb.switch_to(entry);
        fb.cond_br(Constant::bool(true), left, right);
        fb.switch_to(left);
        fb.br(join);
        fb.switch_to(right);
        fb.br(join);
        fb.switch_to(join);
        fb.ret(None);
        mb.install(fb).unwrap();

        let module = mb.build();
        let function = module.function(id);
        assert_eq!(function.predecessors(join), vec![left, right]);
        assert_eq!(function.predecessors(entry), vec![]);
    }
}
