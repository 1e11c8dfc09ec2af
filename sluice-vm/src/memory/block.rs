//! Memory blocks.

use core::fmt;

use crate::domain::Domain;

/// Lifetime class of a memory block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BlockKind {
    /// Created by an `alloca`; local to a function activation.
    Stack,
    /// Heap storage and globals; survives the creating function.
    Heap,
}

/// A named region of storage: a stack slot, a heap allocation, or a global.
///
/// The whole content is represented by one aggregate domain. Blocks are held
/// by [`crate::memory::State`] in reference-counted cells; cloning a state
/// shares them and the first mutation through
/// [`crate::memory::State::block_mut`] unshares the touched cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    kind: BlockKind,
    value: Domain,
}

impl Block {
    /// Wrap a content domain.
    pub fn new(kind: BlockKind, value: Domain) -> Self {
        Self { kind, value }
    }

    /// Lifetime class.
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// The abstract content.
    pub fn value(&self) -> &Domain {
        &self.value
    }

    /// Mutable access to the abstract content.
    pub fn value_mut(&mut self) -> &mut Domain {
        &mut self.value
    }

    /// Join another block's content into this one.
    pub fn join(&mut self, other: &Self) {
        self.value.join(&other.value);
    }

    /// Approximate heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>() + self.value.memory_usage()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} block {}", self.kind, self.value)
    }
}
