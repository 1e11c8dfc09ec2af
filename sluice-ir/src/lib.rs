//! Typed SSA intermediate representation for the Sluice abstract interpreter.
//!
//! The crate provides an in-memory IR only: types with byte sizes, constants,
//! instructions, the module/function/basic-block containers, a builder that
//! produces well-formed modules, and the slot tracker that assigns printable
//! names to anonymous values. Parsing a textual or binary format is out of
//! scope.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod builder;
mod constant;
mod instruction;
mod module;
mod slot;
mod types;

pub use builder::{BuildError, FunctionBuilder, ModuleBuilder};
pub use constant::Constant;
pub use instruction::{
    BinaryOp, CastOp, FloatPredicate, InstOp, Instruction, IntPredicate, Operand,
};
pub use module::{Block, BlockId, Function, FunctionId, Global, Module, Place};
pub use slot::SlotTracker;
pub use types::{FloatKind, Type};

/// Commonly used items.
pub mod prelude {
    #[doc(no_inline)]
    pub use crate::{
        BinaryOp, Block, BlockId, BuildError, CastOp, Constant, FloatKind, FloatPredicate,
        Function, FunctionBuilder, FunctionId, Global, InstOp, Instruction, IntPredicate, Module,
        ModuleBuilder, Operand, Place, SlotTracker, Type,
    };
}
