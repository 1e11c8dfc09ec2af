//! `getelementptr` lowering: abstract index lists to abstract byte offsets.

use sluice_ir::Type;

use crate::{apint::ApInt, domain::Domain};

/// Compute the total byte offset selected by a `getelementptr` index list.
///
/// `pointee` is the type the base pointer points at; the first index strides
/// over whole pointees, the remaining indices step into arrays and structs.
/// Every index must already be a 64-bit integer value. The result is a
/// 64-bit integer domain.
pub fn byte_offset(pointee: &Type, indices: &[Domain]) -> Domain {
    let Some((first, rest)) = indices.split_first() else {
        return zero();
    };

    let stride = scaled(first, pointee.size_in_bytes());
    if rest.is_empty() {
        return stride;
    }

    let mut total = Domain::bottom_of(&Type::i64());
    total.binary(sluice_ir::BinaryOp::Add, &stride, &component_offset(pointee, rest));
    total
}

/// Offset of the component selected by `indices` inside a value of type
/// `ty`.
fn component_offset(ty: &Type, indices: &[Domain]) -> Domain {
    let Some((index, rest)) = indices.split_first() else {
        return zero();
    };

    match ty {
        Type::Array { elem, .. } | Type::Vector { elem, .. } => {
            let base = scaled(index, elem.size_in_bytes());
            if rest.is_empty() {
                return base;
            }
            let mut total = Domain::bottom_of(&Type::i64());
            total.binary(
                sluice_ir::BinaryOp::Add,
                &base,
                &component_offset(elem, rest),
            );
            total
        }
        Type::Struct(fields) => struct_offset(fields, index, rest),
        // Indexing into a scalar is malformed IR; nothing useful is known.
        _ => Domain::top_of(&Type::i64()),
    }
}

/// Walk the fields a struct index may select, joining each admitted field's
/// starting offset (and, recursively, its subcomponent offsets).
fn struct_offset(fields: &[Type], index: &Domain, rest: &[Domain]) -> Domain {
    if index.is_bottom() {
        return Domain::bottom_of(&Type::i64());
    }
    let (Some(min), Some(max)) = (index.unsigned_min(), index.unsigned_max()) else {
        return Domain::top_of(&Type::i64());
    };
    let (min, max) = (min.as_u64(), max.as_u64());

    let mut base = Domain::bottom_of(&Type::i64());
    let mut sub = Domain::bottom_of(&Type::i64());
    let mut running = 0u64;

    for (i, field) in fields.iter().enumerate() {
        let i = i as u64;
        if i > max {
            break;
        }
        if i >= min {
            base.join(&constant(running));
            if !rest.is_empty() {
                sub.join(&component_offset(field, rest));
            }
        }
        running += field.size_in_bytes();
    }

    if rest.is_empty() {
        return base;
    }
    let mut total = Domain::bottom_of(&Type::i64());
    total.binary(sluice_ir::BinaryOp::Add, &base, &sub);
    total
}

/// `index * size`, in the 64-bit offset domain.
fn scaled(index: &Domain, size: u64) -> Domain {
    if index.is_bottom() {
        return Domain::bottom_of(&Type::i64());
    }
    let mut result = Domain::bottom_of(&Type::i64());
    result.binary(sluice_ir::BinaryOp::Mul, index, &constant(size));
    result
}

fn constant(value: u64) -> Domain {
    Domain::int_constant(ApInt::new(64, value))
}

fn zero() -> Domain {
    constant(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(value: u64) -> Domain {
        constant(value)
    }

    #[test]
    fn first_index_strides_over_the_pointee() {
        let offset = byte_offset(&Type::i32(), &[index(3)]);
        assert_eq!(offset.as_singleton().unwrap().as_u64(), 12);
    }

    #[test]
    fn array_indices_multiply_by_element_size() {
        let ty = Type::array(Type::i64(), 10);
        let offset = byte_offset(&ty, &[index(0), index(4)]);
        assert_eq!(offset.as_singleton().unwrap().as_u64(), 32);
    }

    #[test]
    fn struct_indices_use_packed_field_offsets() {
        // {i8, i32, i64}: field offsets 0, 1, 5.
        let ty = Type::structure(vec![Type::i8(), Type::i32(), Type::i64()]);
        let offset = byte_offset(&ty, &[index(0), index(2)]);
        assert_eq!(offset.as_singleton().unwrap().as_u64(), 5);
    }

    #[test]
    fn imprecise_struct_index_joins_field_offsets() {
        let ty = Type::structure(vec![Type::i8(), Type::i32(), Type::i64()]);
        let mut idx = index(1);
        idx.join(&index(2));
        let offset = byte_offset(&ty, &[index(0), idx]);
        assert_eq!(offset.known_values().unwrap(), vec![1, 5]);
    }

    #[test]
    fn nested_aggregates_accumulate() {
        // [4 x {i8, i32}]: element size 5; [0][1].field1 = 5 + 1.
        let pair = Type::structure(vec![Type::i8(), Type::i32()]);
        let ty = Type::array(pair, 4);
        let offset = byte_offset(&ty, &[index(0), index(1), index(1)]);
        assert_eq!(offset.as_singleton().unwrap().as_u64(), 6);
    }

    #[test]
    fn saturated_index_saturates_the_offset() {
        let offset = byte_offset(&Type::i32(), &[Domain::top_of(&Type::i64())]);
        assert!(offset.unsigned_max().is_none() || offset.is_top());
    }
}
