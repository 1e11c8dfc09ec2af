//! String-domain scenarios over byte-array globals.

mod common;

use common::*;
use sluice_vm::prelude::*;
use sluice_vm::domain::StringPrefix;

fn prefix_of(value: &Domain) -> &StringPrefix {
    let Domain::Product(product) = value else {
        panic!("array blocks are products");
    };
    product
        .members()
        .iter()
        .find_map(|member| match member {
            Domain::StringPrefix(prefix) => Some(prefix),
            _ => None,
        })
        .expect("byte arrays carry a prefix member")
}

/// Writing at and past the terminator leaves the known prefix intact.
#[test]
fn stores_past_the_text_keep_the_prefix() {
    let string_ty = Type::array(Type::i8(), 6);

    let mut mb = ModuleBuilder::new("greeting");
    let s = mb
        .global("s", string_ty.clone(), Some(Constant::c_string("hello")), false)
        .unwrap();
    let junk = mb.global("junk", Type::i8(), None, false).unwrap();
    let id = mb.declare("poke", &[], Type::Void).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");

    let any = fb.load(Type::i8(), junk);
    for index in [5i64, 6] {
        let slot = fb.gep(
            Type::ptr(Type::i8()),
            s,
            vec![Constant::i64(0).into(), Constant::i64(index).into()],
        );
        fb.store(any.clone(), slot);
    }
    fb.ret(None);
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let block = interpreter
        .global_state()
        .find_block(s)
        .expect("global blocks persist");
    assert_eq!(prefix_of(block.value()).prefix(), b"hello");
}

/// Writing into the text truncates the known prefix to the written point.
#[test]
fn stores_inside_the_text_truncate_the_prefix() {
    let string_ty = Type::array(Type::i8(), 6);

    let mut mb = ModuleBuilder::new("truncate");
    let s = mb
        .global("s", string_ty.clone(), Some(Constant::c_string("hello")), false)
        .unwrap();
    let junk = mb.global("junk", Type::i8(), None, false).unwrap();
    let id = mb.declare("poke", &[], Type::Void).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");

    let any = fb.load(Type::i8(), junk);
    let slot = fb.gep(
        Type::ptr(Type::i8()),
        s,
        vec![Constant::i64(0).into(), Constant::i64(2).into()],
    );
    fb.store(any, slot);
    fb.ret(None);
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let block = interpreter.global_state().find_block(s).unwrap();
    assert_eq!(prefix_of(block.value()).prefix(), b"he");
}

/// Byte loads out of constant strings are exact through the product.
#[test]
fn byte_loads_from_constant_strings_fold() {
    let string_ty = Type::array(Type::i8(), 3);

    let mut mb = ModuleBuilder::new("readback");
    let s = mb
        .global("s", string_ty.clone(), Some(Constant::c_string("hi")), true)
        .unwrap();
    let id = mb.declare("read", &[], Type::i8()).unwrap();
    let mut fb = mb.body(id).unwrap();
    fb.block("entry");
    let slot = fb.gep(
        Type::ptr(Type::i8()),
        s,
        vec![Constant::i64(0).into(), Constant::i64(1).into()],
    );
    let byte = fb.load(Type::i8(), slot);
    fb.ret(Some(byte.clone()));
    mb.install(fb).unwrap();

    let interpreter = analyze(mb.build());
    let output = interpreter.function_record(id).block(BlockId(0)).output();
    assert_singleton(value_of(output, &byte), u64::from(b'i'));
}
