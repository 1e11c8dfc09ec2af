//! Memory scenarios: strong and weak updates, pointer offsets, globals.

mod common;

use common::*;
use sluice_vm::prelude::*;

/// Two stores through two names of the same slot: the second one wins.
#[test]
fn single_target_stores_update_strongly() {
    let mut mb = ModuleBuilder::new("strong");
    let id = mb.declare("strong", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");

    let p = fb.alloca(Type::i32());
    fb.store(Constant::i32(7), p.clone());
    let q = fb.gep(Type::ptr(Type::i32()), p.clone(), vec![Constant::i64(0).into()]);
    fb.store(Constant::i32(8), q);
    let r = fb.load(Type::i32(), p);
    fb.ret(Some(r.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_eq!(value_of(output, &r).known_values().unwrap(), vec![8]);
}

/// A store through a two-target pointer must keep the old content around.
#[test]
fn multi_target_stores_update_weakly() {
    let mut mb = ModuleBuilder::new("weak");
    let flag = mb.global("flag", Type::i1(), None, false).unwrap();
    let id = mb.declare("weak", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();

    let entry = fb.block("entry");
    let left = fb.block("left");
    let right = fb.block("right");
    let join = fb.block("join");

    fb.switch_to(entry);
    let p = fb.alloca(Type::i32());
    let q = fb.alloca(Type::i32());
    fb.store(Constant::i32(7), p.clone());
    fb.store(Constant::i32(5), q.clone());
    let cond = fb.load(Type::i1(), flag);
    fb.cond_br(cond, left, right);

    fb.switch_to(left);
    fb.br(join);
    fb.switch_to(right);
    fb.br(join);

    fb.switch_to(join);
    let c = fb.phi(
        Type::ptr(Type::i32()),
        vec![(left, p.clone()), (right, q.clone())],
    );
    fb.store(Constant::i32(9), c);
    let r = fb.load(Type::i32(), p);
    fb.ret(Some(r.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(join).output();
    let r = value_of(output, &r);
    // The store may or may not have hit %p: both the old and the new value
    // survive.
    assert_eq!(r.known_values().unwrap(), vec![7, 9]);
}

#[test]
fn struct_fields_are_addressed_through_gep() {
    let pair = Type::structure(vec![Type::i8(), Type::i32()]);

    let mut mb = ModuleBuilder::new("fields");
    let id = mb.declare("fields", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");

    let slot = fb.alloca(pair.clone());
    let field = fb.gep(
        Type::ptr(Type::i32()),
        slot.clone(),
        vec![Constant::i64(0).into(), Constant::i32(1).into()],
    );
    fb.store(Constant::i32(1000), field.clone());
    let loaded = fb.load(Type::i32(), field);
    fb.ret(Some(loaded.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_singleton(value_of(output, &loaded), 1000);
}

#[test]
fn array_elements_are_addressed_through_gep() {
    let ty = Type::array(Type::i32(), 4);

    let mut mb = ModuleBuilder::new("elements");
    let id = mb.declare("elements", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");

    let slot = fb.alloca(ty.clone());
    let second = fb.gep(
        Type::ptr(Type::i32()),
        slot.clone(),
        vec![Constant::i64(0).into(), Constant::i64(1).into()],
    );
    let third = fb.gep(
        Type::ptr(Type::i32()),
        slot.clone(),
        vec![Constant::i64(0).into(), Constant::i64(2).into()],
    );
    fb.store(Constant::i32(20), second.clone());
    fb.store(Constant::i32(30), third);
    let loaded = fb.load(Type::i32(), second);
    fb.ret(Some(loaded.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_singleton(value_of(output, &loaded), 20);
}

#[test]
fn global_initializers_seed_their_blocks() {
    let pair = Type::structure(vec![Type::i32(), Type::i32()]);

    let mut mb = ModuleBuilder::new("globals");
    let g = mb
        .global(
            "config",
            pair.clone(),
            Some(Constant::Struct {
                ty: pair.clone(),
                fields: vec![Constant::i32(3), Constant::i32(4)],
            }),
            true,
        )
        .unwrap();
    let id = mb.declare("read", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");
    let field = fb.gep(
        Type::ptr(Type::i32()),
        g,
        vec![Constant::i64(0).into(), Constant::i32(1).into()],
    );
    let loaded = fb.load(Type::i32(), field);
    fb.ret(Some(loaded.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_singleton(value_of(output, &loaded), 4);
}

#[test]
fn external_globals_hold_anything() {
    let mut mb = ModuleBuilder::new("extglobal");
    let g = mb.global("outside", Type::i32(), None, false).unwrap();
    let id = mb.declare("read", &[], Type::i32()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");
    let loaded = fb.load(Type::i32(), g);
    fb.ret(Some(loaded.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert!(value_of(output, &loaded).is_top());
}

/// A callee storing through a pointer argument mutates the caller's slot.
#[test]
fn callees_write_through_pointer_arguments() {
    let mut mb = ModuleBuilder::new("outparam");
    let callee = mb
        .declare("set", &[Type::ptr(Type::i32())], Type::Void)
        .unwrap();
    let mut fb = mb.body(callee).unwrap();
    fb.block("entry");
    let out = fb.arg(0);
    fb.store(Constant::i32(11), out);
    fb.ret(None);
    mb.install(fb).unwrap();

    let main = mb.declare("main", &[], Type::i32()).unwrap();
    let mut fb = mb.body(main).unwrap();
    fb.block("entry");
    let slot = fb.alloca(Type::i32());
    fb.call(Type::Void, callee, vec![slot.clone()]);
    let r = fb.load(Type::i32(), slot);
    fb.ret(Some(r.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(main).block(BlockId(0)).output();
    let r = value_of(output, &r);
    assert!(
        r.known_values()
            .is_some_and(|values| values.contains(&11)),
        "caller must observe the callee's store, got {r}"
    );
}
