//! Stable printable names for anonymous values.

use std::collections::HashMap;

use crate::module::{Module, Place};

/// Assigns display names to places: `@name` for globals and `%N` for
/// function-local values, numbered the way a textual IR printer would number
/// them (arguments first, then value-producing instructions, per function).
///
/// Purely a presentation aid; the engine keys everything by [`Place`].
#[derive(Debug, Clone, Default)]
pub struct SlotTracker {
    names: HashMap<Place, String>,
}

impl SlotTracker {
    /// Number every value in `module`.
    pub fn new(module: &Module) -> Self {
        let mut names = HashMap::new();

        for global in &module.globals {
            names.insert(global.place, format!("@{}", global.name));
        }

        for function in &module.functions {
            let mut next = 0u32;
            for (place, _) in &function.params {
                names.insert(*place, format!("%{next}"));
                next += 1;
            }

            for block in &function.blocks {
                for inst in &block.instructions {
                    if inst.ty.is_void() {
                        continue;
                    }
                    names.insert(inst.result, format!("%{next}"));
                    next += 1;
                }
            }
        }

        Self { names }
    }

    /// Printable name of `place`. Unregistered places (e.g. the results of
    /// void instructions) fall back to a raw rendering.
    pub fn name(&self, place: Place) -> String {
        match self.names.get(&place) {
            Some(name) => name.clone(),
            None => match place {
                Place::Global(index) => format!("@g{index}"),
                Place::Local { index, .. } => format!("%v{index}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::ModuleBuilder, BinaryOp, Constant, Type};

    #[test]
    fn numbers_arguments_then_results() {
        let mut mb = ModuleBuilder::new("m");
        let g = mb.global("counter", Type::i32(), None, false).unwrap();
        let id = mb
            .declare("f", &[Type::i32(), Type::i32()], Type::i32())
            .unwrap();
        let mut fb = mb.body(id).unwrap();
        fb.block("entry");
        let a0 = fb.arg(0);
        let sum = fb.binary(BinaryOp::Add, Type::i32(), a0, Constant::i32(1));
        fb.ret(Some(sum.clone()));
        mb.install(fb).unwrap();
        let module = mb.build();

        let slots = SlotTracker::new(&module);
        assert_eq!(slots.name(g), "@counter");
        assert_eq!(slots.name(module.function(id).params[0].0), "%0");
        assert_eq!(slots.name(module.function(id).params[1].0), "%1");

        let crate::Operand::Place(sum_place) = sum else {
            unreachable!()
        };
        assert_eq!(slots.name(sum_place), "%2");
    }
}
