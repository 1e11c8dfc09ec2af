//! Control-flow scenarios: branch merges, loop widening, calls.

mod common;

use common::*;
use sluice_vm::prelude::*;

/// `urem` by 11 of an unknown input: the canonical `[0, 10]` seed.
fn seeded_range(fb: &mut FunctionBuilder, input: Operand) -> Operand {
    fb.binary(BinaryOp::Urem, Type::i32(), input, Constant::i32(11))
}

#[test]
fn branch_merge_joins_both_arms() {
    let mut mb = ModuleBuilder::new("merge");
    let input = mb.global("input", Type::i32(), None, false).unwrap();
    let flag = mb.global("flag", Type::i1(), None, false).unwrap();
    let id = mb.declare("merge", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();

    let entry = fb.block("entry");
    let on_true = fb.block("ontrue");
    let on_false = fb.block("onfalse");
    let join = fb.block("join");

    fb.switch_to(entry);
    let a_raw = fb.load(Type::i32(), input);
    let a = seeded_range(&mut fb, a_raw);
    let cond = fb.load(Type::i1(), flag);
    fb.cond_br(cond, on_true, on_false);

    fb.switch_to(on_true);
    let r1 = fb.binary(BinaryOp::Add, Type::i32(), a.clone(), Constant::i32(1));
    fb.br(join);

    fb.switch_to(on_false);
    let r2 = fb.binary(BinaryOp::Sub, Type::i32(), a.clone(), Constant::i32(1));
    fb.br(join);

    fb.switch_to(join);
    let r = fb.phi(
        Type::i32(),
        vec![(on_true, r1.clone()), (on_false, r2.clone())],
    );
    fb.ret(Some(r.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let record = interpreter.function_record(id);
    let seed = value_of(record.block(entry).output(), &a);
    assert_eq!(signed_bounds(seed), (0, 10));

    let merged = value_of(record.block(join).output(), &r);
    assert_eq!(signed_bounds(merged), (-1, 11));
}

/// `i = 0; while (i < 100) i++;`: the counter stays `[0, 99]` inside the
/// loop and leaves as exactly 100, within a round budget independent of the
/// trip count.
#[test]
fn loop_widening_converges_to_the_bound() {
    let mut mb = ModuleBuilder::new("count");
    let id = mb.declare("count", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();

    let entry = fb.block("entry");
    let header = fb.block("header");
    let body = fb.block("body");
    let exit = fb.block("exit");

    fb.switch_to(entry);
    fb.br(header);

    fb.switch_to(header);
    let i = fb.phi(Type::i32(), vec![(entry, Constant::i32(0).into())]);
    let cond = fb.icmp(IntPredicate::Ult, i.clone(), Constant::i32(100));
    fb.cond_br(cond, body, exit);

    fb.switch_to(body);
    let i_next = fb.binary(BinaryOp::Add, Type::i32(), i.clone(), Constant::i32(1));
    fb.br(header);
    fb.add_incoming(&i, vec![(body, i_next.clone())]);

    fb.switch_to(exit);
    fb.ret(Some(i.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let record = interpreter.function_record(id);

    let inside = value_of(record.block(body).output(), &i);
    assert_eq!(unsigned_bounds(inside), (0, 99));

    let after = value_of(record.block(exit).output(), &i);
    assert_eq!(unsigned_bounds(after), (100, 100));
    assert_eq!(signed_bounds(after), (100, 100));

    let returned = record.output().returned_value().unwrap();
    assert_eq!(unsigned_bounds(returned), (100, 100));
}

#[test]
fn widening_rounds_do_not_scale_with_the_trip_count() {
    let mut mb = ModuleBuilder::new("bigcount");
    let id = mb.declare("bigcount", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();

    let entry = fb.block("entry");
    let header = fb.block("header");
    let body = fb.block("body");
    let exit = fb.block("exit");

    fb.switch_to(entry);
    fb.br(header);
    fb.switch_to(header);
    let i = fb.phi(Type::i32(), vec![(entry, Constant::i32(0).into())]);
    let cond = fb.icmp(IntPredicate::Ult, i.clone(), Constant::i32(50_000_000));
    fb.cond_br(cond, body, exit);
    fb.switch_to(body);
    let i_next = fb.binary(BinaryOp::Add, Type::i32(), i.clone(), Constant::i32(1));
    fb.br(header);
    fb.add_incoming(&i, vec![(body, i_next)]);
    fb.switch_to(exit);
    fb.ret(Some(i.clone()));
    mb.install(fb).unwrap();

    let mut interpreter = Interpreter::new(mb.build());
    interpreter.initialize();
    // Far fewer steps than fifty million loop iterations. The bound is set
    // by the widening thresholds and the constant-set cut-off, not by the
    // trip count.
    let summary = interpreter.run_to_fixpoint(10_000);
    assert!(summary.reached, "widening must bound the round count");
    assert!(summary.rounds < 64, "rounds: {}", summary.rounds);
}

#[test]
fn select_joins_only_reachable_arms() {
    let mut mb = ModuleBuilder::new("select");
    let flag = mb.global("flag", Type::i1(), None, false).unwrap();
    let id = mb.declare("select", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");

    let unknown = fb.load(Type::i1(), flag);
    let both = fb.select(
        Type::i32(),
        unknown,
        Constant::i32(1),
        Constant::i32(2),
    );
    let pinned = fb.select(
        Type::i32(),
        Constant::bool(true),
        Constant::i32(7),
        Constant::i32(8),
    );
    fb.ret(Some(both.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_eq!(
        value_of(output, &both).known_values().unwrap(),
        vec![1, 2]
    );
    assert_singleton(value_of(output, &pinned), 7);
}

#[test]
fn calls_flow_arguments_in_and_results_out() {
    let mut mb = ModuleBuilder::new("calls");
    let callee = mb.declare("inc", &[Type::i32()], Type::i32()).unwrap();
    let mut fb = mb.body(callee).unwrap();
    fb.block("entry");
    let arg = fb.arg(0);
    let sum = fb.binary(BinaryOp::Add, Type::i32(), arg, Constant::i32(1));
    fb.ret(Some(sum));
    mb.install(fb).unwrap();

    let main = mb.declare("main", &[], Type::i32()).unwrap();
    let mut fb = mb.body(main).unwrap();
    fb.block("entry");
    let r = fb.call(Type::i32(), callee, vec![Constant::i32(41).into()]);
    fb.ret(Some(r.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());

    // The callee saw the argument...
    let callee_record = interpreter.function_record(callee);
    let returned = callee_record.output().returned_value().unwrap();
    assert_singleton(returned, 42);

    // ...and the caller sees the result.
    let output = interpreter.function_record(main).block(BlockId(0)).output();
    assert_singleton(value_of(output, &r), 42);
}

#[test]
fn external_calls_saturate_their_result() {
    let mut mb = ModuleBuilder::new("external");
    let external = mb.declare("mystery", &[Type::i32()], Type::i32()).unwrap();
    let main = mb.declare("main", &[], Type::i32()).unwrap();
    let mut fb = mb.body(main).unwrap();
    fb.block("entry");
    let r = fb.call(Type::i32(), external, vec![Constant::i32(1).into()]);
    fb.ret(Some(r.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(main).block(BlockId(0)).output();
    assert!(value_of(output, &r).is_top());
}

#[test]
fn switch_edges_pin_the_scrutinee() {
    let mut mb = ModuleBuilder::new("switch");
    let input = mb.global("input", Type::i32(), None, false).unwrap();
    let id = mb.declare("switch", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();

    let entry = fb.block("entry");
    let one = fb.block("one");
    let other = fb.block("other");

    fb.switch_to(entry);
    let v = fb.load(Type::i32(), input);
    fb.switch(v.clone(), other, vec![(1, one), (2, one)]);

    fb.switch_to(one);
    fb.ret(Some(v.clone()));

    fb.switch_to(other);
    fb.ret(Some(Constant::i32(0).into()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let record = interpreter.function_record(id);
    let pinned = value_of(record.block(one).output(), &v);
    assert_eq!(pinned.known_values().unwrap(), vec![1, 2]);
}
