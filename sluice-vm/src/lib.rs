//! Sluice abstract-interpretation engine.
//!
//! The engine over-approximates, for every program point and SSA name of a
//! [`sluice_ir::Module`], the set of concrete values that could occur there
//! at runtime, and iterates the whole module to a fixpoint. Values live in a
//! lattice of abstract domains (intervals, constant sets, known bits, float
//! ranges, arrays, strings, pointers, structures) combined through a reduced
//! product that lets the domains sharpen each other.
//!
//! The analysis is flow-sensitive but merges at join points; it answers
//! "may" questions only.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod apint;
pub mod constructors;
pub mod domain;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod memory;

#[doc(no_inline)]
pub use sluice_ir;

/// Commonly used items.
pub mod prelude {
    #[doc(no_inline)]
    pub use sluice_ir::prelude::*;

    pub use crate::{
        apint::ApInt,
        constructors::Constructors,
        domain::{CmpOutcome, Domain},
        environment::Environment,
        interpreter::{
            FixpointSummary, Interpreter, IteratorCallback, NumericalInfinity, WideningManager,
        },
        memory::{Block, BlockKind, State},
    };
}
