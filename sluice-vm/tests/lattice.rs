//! Property suites: lattice laws, clone independence, monotonicity, and
//! soundness of the transfer functions, sampled at 8 bits.

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use sluice_vm::prelude::*;

const WIDTH: u32 = 8;

/// An 8-bit integer product together with concrete seed values known to be
/// inside its concretization.
#[derive(Debug, Clone)]
struct Int8 {
    domain: Domain,
    seeds: Vec<u64>,
}

impl Arbitrary for Int8 {
    fn arbitrary(g: &mut Gen) -> Self {
        match u8::arbitrary(g) % 8 {
            0 => Int8 {
                domain: Domain::bottom_of(&Type::Int(WIDTH)),
                seeds: Vec::new(),
            },
            1 => {
                let mut domain = Domain::bottom_of(&Type::Int(WIDTH));
                domain.set_top();
                Int8 {
                    domain,
                    seeds: vec![u64::from(u8::arbitrary(g))],
                }
            }
            _ => {
                let count = 1 + usize::arbitrary(g) % 4;
                let seeds: Vec<u64> =
                    (0..count).map(|_| u64::from(u8::arbitrary(g))).collect();
                let mut domain = Domain::int_constant(ApInt::new(WIDTH, seeds[0]));
                for &seed in &seeds[1..] {
                    domain.join(&Domain::int_constant(ApInt::new(WIDTH, seed)));
                }
                Int8 { domain, seeds }
            }
        }
    }
}

/// Whether the abstract value admits the concrete value in every domain it
/// carries.
fn admits(domain: &Domain, value: u64) -> bool {
    let width = domain.int_width().unwrap_or(WIDTH);
    let v = ApInt::new(width, value);
    if let Some(values) = domain.known_values() {
        return values.contains(&value);
    }
    let unsigned_ok = domain.unsigned_min().is_none_or(|lo| lo.ule(&v))
        && domain.unsigned_max().is_none_or(|hi| v.ule(&hi));
    let signed_ok = domain.signed_min().is_none_or(|lo| lo.sle(&v))
        && domain.signed_max().is_none_or(|hi| v.sle(&hi));
    let bits_ok = domain.bitfield().is_none_or(|bits| {
        (0..width).all(|pos| match bits.get_bit(pos) {
            0 => value & (1 << pos) == 0,
            1 => value & (1 << pos) != 0,
            2 => true,
            _ => false,
        })
    });
    unsigned_ok && signed_ok && bits_ok
}

fn joined(a: &Domain, b: &Domain) -> Domain {
    let mut out = a.clone();
    out.join(b);
    out
}

fn met(a: &Domain, b: &Domain) -> Domain {
    let mut out = a.clone();
    out.meet(b);
    out
}

// --- Lattice laws --------------------------------------------------------

#[quickcheck]
fn join_is_commutative(a: Int8, b: Int8) -> bool {
    joined(&a.domain, &b.domain) == joined(&b.domain, &a.domain)
}

#[quickcheck]
fn join_is_associative(a: Int8, b: Int8, c: Int8) -> bool {
    joined(&joined(&a.domain, &b.domain), &c.domain)
        == joined(&a.domain, &joined(&b.domain, &c.domain))
}

#[quickcheck]
fn join_is_idempotent(a: Int8) -> bool {
    joined(&a.domain, &a.domain) == a.domain
}

#[quickcheck]
fn meet_is_commutative(a: Int8, b: Int8) -> bool {
    met(&a.domain, &b.domain) == met(&b.domain, &a.domain)
}

#[quickcheck]
fn bottom_is_the_join_identity(a: Int8) -> bool {
    joined(&a.domain, &Domain::bottom_of(&Type::Int(WIDTH))) == a.domain
}

#[quickcheck]
fn top_is_the_meet_identity(a: Int8) -> bool {
    let mut top = Domain::bottom_of(&Type::Int(WIDTH));
    top.set_top();
    met(&a.domain, &top) == a.domain
}

#[quickcheck]
fn join_is_an_upper_bound(a: Int8, b: Int8) -> bool {
    let join = joined(&a.domain, &b.domain);
    a.domain.less_or_equal(&join) && b.domain.less_or_equal(&join)
}

#[quickcheck]
fn meet_is_a_lower_bound(a: Int8, b: Int8) -> bool {
    let meet = met(&a.domain, &b.domain);
    meet.less_or_equal(&a.domain) && meet.less_or_equal(&b.domain)
}

// --- Clone independence --------------------------------------------------

#[quickcheck]
fn clones_are_independent(a: Int8) -> bool {
    let original = a.domain.clone();
    let mut copy = a.domain.clone();
    if copy != original {
        return false;
    }
    copy.set_top();
    a.domain == original
}

// --- Transfer functions --------------------------------------------------

const OPS: &[BinaryOp] = &[
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Udiv,
    BinaryOp::Sdiv,
    BinaryOp::Urem,
    BinaryOp::Srem,
    BinaryOp::Shl,
    BinaryOp::Lshr,
    BinaryOp::Ashr,
    BinaryOp::And,
    BinaryOp::Or,
    BinaryOp::Xor,
];

/// The concrete two's-complement semantics of one opcode; `None` for
/// division by zero, which the analyzer answers with top.
fn concrete(op: BinaryOp, x: u64, y: u64) -> Option<u64> {
    let a = ApInt::new(WIDTH, x);
    let b = ApInt::new(WIDTH, y);
    let shift = (y.min(255)) as u32;
    Some(match op {
        BinaryOp::Add => a.wrapping_add(b).as_u64(),
        BinaryOp::Sub => a.wrapping_sub(b).as_u64(),
        BinaryOp::Mul => a.wrapping_mul(b).as_u64(),
        BinaryOp::Udiv => a.checked_udiv(b)?.as_u64(),
        BinaryOp::Sdiv => a.checked_sdiv(b)?.as_u64(),
        BinaryOp::Urem => a.checked_urem(b)?.as_u64(),
        BinaryOp::Srem => a.checked_srem(b)?.as_u64(),
        BinaryOp::Shl => a.shl(shift).as_u64(),
        BinaryOp::Lshr => a.lshr(shift).as_u64(),
        BinaryOp::Ashr => a.ashr(shift).as_u64(),
        BinaryOp::And => a.and(b).as_u64(),
        BinaryOp::Or => a.or(b).as_u64(),
        BinaryOp::Xor => a.xor(b).as_u64(),
        _ => return None,
    })
}

/// Soundness: every concrete result of every seeded pair lies inside the
/// abstract result.
#[quickcheck]
fn transfer_functions_are_sound(a: Int8, b: Int8, op_index: usize) -> bool {
    let op = OPS[op_index % OPS.len()];
    let mut result = Domain::bottom_of(&Type::Int(WIDTH));
    result.binary(op, &a.domain, &b.domain);

    a.seeds.iter().all(|&x| {
        b.seeds.iter().all(|&y| match concrete(op, x, y) {
            Some(out) => admits(&result, out),
            // Division by zero: the abstract result must be able to stand
            // for anything.
            None => result.is_top(),
        })
    })
}

/// Monotonicity: shrinking an operand never grows the result.
#[quickcheck]
fn transfer_functions_are_monotone(a: Int8, b: Int8, op_index: usize) -> bool {
    let op = OPS[op_index % OPS.len()];
    if a.seeds.is_empty() {
        return true;
    }

    // A singleton below `a`.
    let small = Domain::int_constant(ApInt::new(WIDTH, a.seeds[0]));
    if !small.less_or_equal(&a.domain) {
        return true;
    }

    let mut precise = Domain::bottom_of(&Type::Int(WIDTH));
    precise.binary(op, &small, &b.domain);
    let mut coarse = Domain::bottom_of(&Type::Int(WIDTH));
    coarse.binary(op, &a.domain, &b.domain);

    precise.less_or_equal(&coarse)
}

/// Comparison soundness against concrete evaluation.
#[quickcheck]
fn comparisons_are_sound(a: Int8, b: Int8, pred_index: usize) -> bool {
    const PREDS: &[IntPredicate] = &[
        IntPredicate::Eq,
        IntPredicate::Ne,
        IntPredicate::Ult,
        IntPredicate::Ule,
        IntPredicate::Ugt,
        IntPredicate::Uge,
        IntPredicate::Slt,
        IntPredicate::Sle,
        IntPredicate::Sgt,
        IntPredicate::Sge,
    ];
    let pred = PREDS[pred_index % PREDS.len()];

    let mut result = Domain::bottom_of(&Type::i1());
    result.icmp(&a.domain, &b.domain, pred);

    a.seeds.iter().all(|&x| {
        b.seeds.iter().all(|&y| {
            let xa = ApInt::new(WIDTH, x);
            let ya = ApInt::new(WIDTH, y);
            let truth = match pred {
                IntPredicate::Eq => x == y,
                IntPredicate::Ne => x != y,
                IntPredicate::Ult => xa.ult(&ya),
                IntPredicate::Ule => xa.ule(&ya),
                IntPredicate::Ugt => ya.ult(&xa),
                IntPredicate::Uge => ya.ule(&xa),
                IntPredicate::Slt => xa.slt(&ya),
                IntPredicate::Sle => xa.sle(&ya),
                IntPredicate::Sgt => ya.slt(&xa),
                IntPredicate::Sge => ya.sle(&xa),
            };
            admits(&result, u64::from(truth))
        })
    })
}

/// The set saturates rather than growing without bound.
#[test]
fn set_threshold_is_enforced() {
    let mut value = Domain::bottom_of(&Type::Int(WIDTH));
    for v in 0..64u64 {
        value.join(&Domain::int_constant(ApInt::new(WIDTH, v)));
    }
    assert!(value.known_values().is_none(), "set must have saturated");
    // The interval keeps the hull regardless.
    assert_eq!(value.unsigned_min().unwrap().as_u64(), 0);
    assert_eq!(value.unsigned_max().unwrap().as_u64(), 63);
}
