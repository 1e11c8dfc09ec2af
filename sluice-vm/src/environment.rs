//! Shared analysis environment.

use std::sync::Arc;

use sluice_ir::{Module, SlotTracker};

/// Everything the engine needs to know about the analyzed module besides the
/// abstract values themselves: the IR, and the slot tracker used when
/// rendering places for humans.
///
/// The environment is immutable and shared behind an [`Arc`] by the
/// interpreter and the constructors. Abstract values do not hold a reference
/// to it; they carry their own IR type, which is all their operations need.
#[derive(Debug)]
pub struct Environment {
    module: Arc<Module>,
    slots: SlotTracker,
}

impl Environment {
    /// Wrap a module.
    pub fn new(module: Module) -> Self {
        let slots = SlotTracker::new(&module);
        Self {
            module: Arc::new(module),
            slots,
        }
    }

    /// The analyzed module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Printable names for places.
    pub fn slots(&self) -> &SlotTracker {
        &self.slots
    }
}
