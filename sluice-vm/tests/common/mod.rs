//! Shared helpers for the end-to-end scenarios.
#![allow(dead_code)]

use sluice_vm::prelude::*;

/// Run a module to its fixpoint with a generous step budget.
pub fn analyze(module: Module) -> Interpreter {
    let mut interpreter = Interpreter::new(module);
    interpreter.initialize();
    let summary = interpreter.run_to_fixpoint(1_000_000);
    assert!(summary.reached, "analysis did not reach a fixpoint");
    interpreter
}

/// The place behind a value-producing operand.
pub fn place(operand: &Operand) -> Place {
    match operand {
        Operand::Place(place) => *place,
        Operand::Constant(_) => panic!("expected a place operand"),
    }
}

/// The abstract value of `operand` in `state`.
pub fn value_of<'a>(state: &'a State, operand: &Operand) -> &'a Domain {
    state
        .find_variable(place(operand))
        .expect("value not recorded in the state")
}

/// Assert the value is the integer singleton `expected`.
#[track_caller]
pub fn assert_singleton(value: &Domain, expected: u64) {
    assert_eq!(
        value
            .as_singleton()
            .unwrap_or_else(|| panic!("not a singleton: {value}"))
            .as_u64(),
        expected
    );
}

/// Unsigned bounds of an integer value.
#[track_caller]
pub fn unsigned_bounds(value: &Domain) -> (u64, u64) {
    (
        value.unsigned_min().expect("unsigned view saturated").as_u64(),
        value.unsigned_max().expect("unsigned view saturated").as_u64(),
    )
}

/// Signed bounds of an integer value.
#[track_caller]
pub fn signed_bounds(value: &Domain) -> (i64, i64) {
    (
        value.signed_min().expect("signed view saturated").as_i64(),
        value.signed_max().expect("signed view saturated").as_i64(),
    )
}
