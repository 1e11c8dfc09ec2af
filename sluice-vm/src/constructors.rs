//! Domain factory: canonical bottom values for IR types and abstract values
//! for IR constants.

use std::sync::Arc;

use sluice_ir::{CastOp, Constant, Type};

use crate::{
    apint::ApInt,
    domain::{
        Domain, ExactSizeArray, Pointer, Product, SingleItemArray, StringPrefix, Structure,
    },
    environment::Environment,
    memory::byte_offset,
};

/// Builds abstract values.
///
/// Types map to their canonical product: integers to (bitfield, set,
/// interval), arrays and vectors to (exact-size, single-item,
/// string-prefix), and the remaining types to their single domain.
/// Constants materialize as the tightest value the domains can express.
#[derive(Debug, Clone)]
pub struct Constructors {
    env: Arc<Environment>,
}

impl Constructors {
    /// Factory over the shared environment.
    pub fn new(env: Arc<Environment>) -> Self {
        Self { env }
    }

    /// The shared environment.
    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Canonical bottom value for a type.
    pub fn create(&self, ty: &Type) -> Domain {
        Domain::bottom_of(ty)
    }

    /// Integer bottom of the given width.
    pub fn create_integer(&self, bits: u32) -> Domain {
        Domain::bottom_of(&Type::Int(bits))
    }

    /// Integer singleton.
    pub fn create_integer_constant(&self, value: ApInt) -> Domain {
        Domain::int_constant(value)
    }

    /// Array value for an `alloca` with an abstract element count. With a
    /// pinned count the array is exact; otherwise only the summarizing
    /// members can say anything.
    pub fn create_array_with_size(&self, elem: &Type, size: Domain) -> Domain {
        if let Some(len) = size.as_singleton() {
            return Domain::bottom_of(&Type::array(elem.clone(), len.as_u64()));
        }

        let worst_len = size
            .unsigned_max()
            .map_or(u64::MAX, |max| max.as_u64());
        Domain::Product(Product::new(vec![
            Domain::ArrayExact(ExactSizeArray::bottom(elem.clone(), u64::MAX)),
            Domain::ArraySingle(SingleItemArray::with_size(elem.clone(), size)),
            Domain::StringPrefix(StringPrefix::bottom(elem, worst_len)),
        ]))
    }

    /// Abstract value of an IR constant.
    pub fn create_constant(&self, constant: &Constant) -> Domain {
        match constant {
            Constant::Int { bits, value } => {
                Domain::int_constant(ApInt::new(*bits, *value))
            }
            Constant::Float { kind, value } => {
                Domain::Float(crate::domain::FloatInterval::constant(*kind, *value))
            }
            Constant::Null(ty) => {
                let mut null = Domain::bottom_of(ty);
                null.set_zero();
                null
            }
            // Undefined values have no concrete behavior to account for.
            Constant::Undef(ty) => Domain::bottom_of(ty),
            Constant::Zero(ty) => {
                let mut zero = Domain::bottom_of(ty);
                zero.set_zero();
                zero
            }
            Constant::Array { ty, elems } => self.create_constant_array(ty, elems),
            Constant::Struct { ty, fields } => {
                let field_types = ty.fields().unwrap_or_default();
                let members = fields.iter().map(|f| self.create_constant(f)).collect();
                Domain::Struct(Structure::from_members(field_types, members))
            }
            Constant::Global { place, ty } => {
                let pointee = ty.pointee().cloned().unwrap_or(Type::Void);
                let mut pointer = Pointer::bottom(pointee);
                pointer.add_block_target(*place, None);
                Domain::Pointer(pointer)
            }
            Constant::Function { id, ty } => {
                let pointee = ty.pointee().cloned().unwrap_or(Type::Void);
                let mut pointer = Pointer::bottom(pointee);
                pointer.add_function_target(*id);
                Domain::Pointer(pointer)
            }
            Constant::GetElementPtr { ty, base, indices } => {
                self.create_constant_gep(ty, base, indices)
            }
            Constant::BitCast { ty, value } => {
                let source = self.create_constant(value);
                let pointee = ty.pointee().cloned().unwrap_or(Type::Void);
                match source {
                    Domain::Pointer(pointer) => Domain::Pointer(pointer.retyped(pointee)),
                    _ => Domain::top_of(ty),
                }
            }
        }
    }

    fn create_constant_array(&self, ty: &Type, elems: &[Constant]) -> Domain {
        let elem_ty = ty.element().cloned().unwrap_or(Type::Void);
        let len = ty.sequence_len().unwrap_or(elems.len() as u64);
        let values: Vec<Domain> = elems.iter().map(|e| self.create_constant(e)).collect();

        let mut single = SingleItemArray::with_len(elem_ty.clone(), len);
        for value in &values {
            single.store(value, &Domain::top_of(&Type::i64()), false);
        }

        Domain::Product(Product::new(vec![
            Domain::ArrayExact(ExactSizeArray::from_elements(elem_ty.clone(), values.clone())),
            Domain::ArraySingle(single),
            Domain::StringPrefix(StringPrefix::from_constant_elements(&elem_ty, len, &values)),
        ]))
    }

    fn create_constant_gep(&self, ty: &Type, base: &Constant, indices: &[Constant]) -> Domain {
        let base_value = self.create_constant(base);
        let Domain::Pointer(pointer) = base_value else {
            return Domain::top_of(ty);
        };

        let index_domains: Vec<Domain> = indices
            .iter()
            .map(|index| {
                let value = self.create_constant(index);
                widen_index(value)
            })
            .collect();

        let stride_ty = base
            .ty()
            .pointee()
            .cloned()
            .unwrap_or(Type::Void);
        let offset = byte_offset(&stride_ty, &index_domains);
        let pointee = ty.pointee().cloned().unwrap_or(Type::Void);
        Domain::Pointer(pointer.with_offset(&offset, pointee))
    }
}

/// Sign-extend an index value to the 64-bit offset width.
pub(crate) fn widen_index(value: Domain) -> Domain {
    match value.int_width() {
        Some(64) | None => value,
        Some(_) => {
            let mut wide = Domain::bottom_of(&Type::i64());
            wide.cast(CastOp::Sext, &value);
            wide
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_ir::{ModuleBuilder, Place};

    fn constructors() -> Constructors {
        let module = ModuleBuilder::new("m").build();
        Constructors::new(Arc::new(Environment::new(module)))
    }

    #[test]
    fn fresh_values_are_bottom() {
        let c = constructors();
        assert!(c.create(&Type::i32()).is_bottom());
        assert!(c.create(&Type::ptr(Type::i8())).is_bottom());
        assert!(c.create(&Type::array(Type::i8(), 3)).is_bottom());
        assert!(c
            .create(&Type::structure(vec![Type::i1(), Type::f64()]))
            .is_bottom());
    }

    #[test]
    fn integer_constants_are_singletons() {
        let c = constructors();
        let v = c.create_constant(&Constant::i32(-7));
        assert_eq!(v.as_singleton().unwrap().as_i64(), -7);
    }

    #[test]
    fn undef_is_bottom_and_zero_is_zero() {
        let c = constructors();
        assert!(c.create_constant(&Constant::Undef(Type::i32())).is_bottom());

        let zero = c.create_constant(&Constant::Zero(Type::structure(vec![
            Type::i32(),
            Type::i8(),
        ])));
        assert_eq!(zero.extract_value(&[0]).as_singleton().unwrap().as_u64(), 0);
        assert_eq!(zero.extract_value(&[1]).as_singleton().unwrap().as_u64(), 0);
    }

    #[test]
    fn null_pointers_carry_numeric_zero() {
        let c = constructors();
        let null = c.create_constant(&Constant::Null(Type::ptr(Type::i8())));
        let Domain::Pointer(pointer) = null else {
            panic!("null must be a pointer");
        };
        assert!(pointer.is_constant());
        assert_eq!(
            pointer
                .numeric_offset()
                .unwrap()
                .as_singleton()
                .unwrap()
                .as_u64(),
            0
        );
    }

    #[test]
    fn string_constants_seed_the_prefix() {
        let c = constructors();
        let s = c.create_constant(&Constant::c_string("hi"));
        let Domain::Product(product) = &s else {
            panic!("arrays are products");
        };
        let Some(Domain::StringPrefix(prefix)) = product
            .members()
            .iter()
            .find(|m| matches!(m, Domain::StringPrefix(_)))
        else {
            panic!("expected a prefix member");
        };
        assert_eq!(prefix.prefix(), b"hi");
    }

    #[test]
    fn constant_gep_shifts_a_global_pointer() {
        let c = constructors();
        let global = Constant::Global {
            place: Place::Global(0),
            ty: Type::ptr(Type::array(Type::i8(), 6)),
        };
        let gep = Constant::GetElementPtr {
            ty: Type::ptr(Type::i8()),
            base: Box::new(global),
            indices: vec![Constant::i32(0), Constant::i32(5)],
        };
        let Domain::Pointer(pointer) = c.create_constant(&gep) else {
            panic!("gep of a pointer is a pointer");
        };
        let offset = &pointer.block_targets()[&Place::Global(0)];
        assert_eq!(offset.as_singleton().unwrap().as_u64(), 5);
    }
}
