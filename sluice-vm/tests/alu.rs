//! Scalar arithmetic scenarios: constant folding, wraparound, saturation.

mod common;

use common::*;
use sluice_vm::prelude::*;

fn fold_module() -> (Module, FunctionId, Operand, Operand) {
    let mut mb = ModuleBuilder::new("fold");
    let id = mb.declare("fold", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");
    let x = fb.binary(BinaryOp::Add, Type::i32(), Constant::i32(3), Constant::i32(5));
    let y = fb.binary(BinaryOp::Mul, Type::i32(), x.clone(), Constant::i32(2));
    fb.ret(Some(y.clone()));
    mb.install(fb).unwrap();
    (mb.build(), id, x, y)
}

#[test]
fn constants_fold_through_every_domain() {
    let (module, id, x, y) = fold_module();
    let interpreter = analyze(module);
    let output = interpreter.function_record(id).block(BlockId(0)).output();

    let x = value_of(output, &x);
    assert_singleton(x, 8);

    let y = value_of(output, &y);
    assert_singleton(y, 16);
    assert_eq!(signed_bounds(y), (16, 16));
    assert_eq!(unsigned_bounds(y), (16, 16));

    // The known-bits view agrees: ...010000.
    let bits = y.bitfield().expect("integer values carry a bitfield");
    assert!(bits.is_constant());
    assert_eq!(bits.unsigned_max().unwrap().as_u64(), 0b10000);
}

#[test]
fn returned_value_is_the_fold() {
    let (module, id, _, _) = fold_module();
    let interpreter = analyze(module);
    let returned = interpreter
        .function_record(id)
        .output()
        .returned_value()
        .expect("non-void function records a return");
    assert_singleton(returned, 16);
}

#[test]
fn wraparound_is_modeled_exactly_in_the_set() {
    let mut mb = ModuleBuilder::new("wrap");
    let id = mb.declare("wrap", &[], Type::i8()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");
    let v = fb.binary(
        BinaryOp::Add,
        Type::i8(),
        Constant::int(8, 250),
        Constant::int(8, 10),
    );
    fb.ret(Some(v.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_singleton(value_of(output, &v), 4);
}

#[test]
fn division_by_zero_saturates_instead_of_crashing() {
    let mut mb = ModuleBuilder::new("div0");
    let id = mb.declare("div0", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");
    let v = fb.binary(
        BinaryOp::Udiv,
        Type::i32(),
        Constant::i32(7),
        Constant::i32(0),
    );
    fb.ret(Some(v.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert!(value_of(output, &v).is_top());
}

#[test]
fn casts_preserve_signedness() {
    let mut mb = ModuleBuilder::new("casts");
    let id = mb.declare("casts", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");
    // -1 at 8 bits, sign- and zero-extended to 32 bits.
    let sext = fb.cast(CastOp::Sext, Type::i32(), Constant::int(8, 0xff));
    let zext = fb.cast(CastOp::Zext, Type::i32(), Constant::int(8, 0xff));
    let trunc = fb.cast(CastOp::Trunc, Type::i8(), sext.clone());
    fb.ret(Some(zext.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_eq!(signed_bounds(value_of(output, &sext)), (-1, -1));
    assert_singleton(value_of(output, &zext), 0xff);
    assert_eq!(signed_bounds(value_of(output, &trunc)), (-1, -1));
}

#[test]
fn comparisons_are_definite_on_disjoint_constants() {
    let mut mb = ModuleBuilder::new("cmp");
    let id = mb.declare("cmp", &[], Type::i1()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");
    let lt = fb.icmp(IntPredicate::Ult, Constant::i32(3), Constant::i32(9));
    let sgt = fb.icmp(IntPredicate::Sgt, Constant::i32(-5), Constant::i32(1));
    fb.ret(Some(lt.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_singleton(value_of(output, &lt), 1);
    assert_singleton(value_of(output, &sgt), 0);
}

#[test]
fn float_arithmetic_flows_through_ranges() {
    let mut mb = ModuleBuilder::new("float");
    let id = mb.declare("float", &[], Type::f64()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");
    let sum = fb.binary(
        BinaryOp::FAdd,
        Type::f64(),
        Constant::f64(1.5),
        Constant::f64(2.5),
    );
    let cmp = fb.fcmp(FloatPredicate::Olt, sum.clone(), Constant::f64(10.0));
    fb.ret(Some(sum.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_singleton(value_of(output, &cmp), 1);
}
