//! Structure domain: one member domain per field.

use core::fmt;

use sluice_ir::Type;

use crate::{
    apint::ApInt,
    domain::{offset_hint, Domain, OffsetHint},
    error::{bug, Bug},
};

/// Abstract value of a struct, as a vector of field values under the packed
/// layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    fields: Vec<Type>,
    members: Vec<Domain>,
}

impl Structure {
    /// Bottom value with the given field types.
    pub fn bottom(fields: &[Type]) -> Self {
        Self {
            members: fields.iter().map(Domain::bottom_of).collect(),
            fields: fields.to_vec(),
        }
    }

    /// Structure holding the given field values.
    pub fn from_members(fields: &[Type], members: Vec<Domain>) -> Self {
        debug_assert_eq!(fields.len(), members.len());
        Self {
            fields: fields.to_vec(),
            members,
        }
    }

    /// The field values, in order.
    pub fn members(&self) -> &[Domain] {
        &self.members
    }

    /// Mutable field access for the widening pass.
    pub(crate) fn members_mut(&mut self) -> &mut [Domain] {
        &mut self.members
    }

    fn check_arity(&self, other: &Self, operation: &'static str) {
        if self.members.len() != other.members.len() {
            bug(Bug::ArityMismatch {
                operation,
                lhs: self.members.len(),
                rhs: other.members.len(),
            });
        }
    }

    /// Byte offset of each field under the packed layout.
    fn field_offsets(&self) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(self.fields.len());
        let mut running = 0u64;
        for field in &self.fields {
            offsets.push(running);
            running += field.size_in_bytes();
        }
        offsets
    }

    // --- Lattice ---------------------------------------------------------

    /// Whether no value is represented.
    pub fn is_bottom(&self) -> bool {
        self.members.iter().all(Domain::is_bottom)
    }

    /// Forget everything.
    pub fn set_bottom(&mut self) {
        for member in &mut self.members {
            member.set_bottom();
        }
    }

    /// Whether every field is saturated.
    pub fn is_top(&self) -> bool {
        self.members.iter().all(Domain::is_top)
    }

    /// Saturate every field.
    pub fn set_top(&mut self) {
        for member in &mut self.members {
            member.set_top();
        }
    }

    /// Pointwise least upper bound.
    pub fn join(&mut self, other: &Self) {
        self.check_arity(other, "join");
        for (member, theirs) in self.members.iter_mut().zip(&other.members) {
            member.join(theirs);
        }
    }

    /// Pointwise greatest lower bound.
    pub fn meet(&mut self, other: &Self) {
        self.check_arity(other, "meet");
        for (member, theirs) in self.members.iter_mut().zip(&other.members) {
            member.meet(theirs);
        }
    }

    /// Pointwise order.
    pub fn less_or_equal(&self, other: &Self) -> bool {
        self.check_arity(other, "less_or_equal");
        self.members
            .iter()
            .zip(&other.members)
            .all(|(mine, theirs)| mine.less_or_equal(theirs))
    }

    /// Mean field precision.
    pub fn accuracy(&self) -> f32 {
        if self.members.is_empty() {
            return 1.0;
        }
        let sum: f32 = self.members.iter().map(Domain::accuracy).sum();
        sum / self.members.len() as f32
    }

    /// Heap footprint.
    pub fn memory_usage(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.members.iter().map(Domain::memory_usage).sum::<usize>()
    }

    /// Zero every field, recursively.
    pub fn set_zero(&mut self) {
        for member in &mut self.members {
            member.set_zero();
        }
    }

    // --- Transfer functions ---------------------------------------------

    /// Constant-path aggregate read.
    pub fn extract_value(&self, indices: &[u32]) -> Domain {
        let idx = indices[0] as usize;
        match self.members.get(idx) {
            Some(member) => member.extract_value(&indices[1..]),
            None => {
                let mut result = self.clone();
                result.set_top();
                Domain::Struct(result)
            }
        }
    }

    /// Constant-path aggregate write.
    pub fn insert_value(&mut self, aggregate: &Self, element: &Domain, indices: &[u32]) {
        self.check_arity(aggregate, "insertvalue");
        self.members = aggregate.members.clone();
        let idx = indices[0] as usize;
        let Some(slot) = self.members.get_mut(idx) else {
            return;
        };
        if indices.len() == 1 {
            *slot = element.clone();
        } else {
            let nested = slot.clone();
            slot.insert_value(&nested, element, &indices[1..]);
        }
    }

    /// Block-level read at an abstract byte offset.
    pub fn load(&self, ty: &Type, offset: &Domain) -> Domain {
        match offset_hint(offset) {
            OffsetHint::None => Domain::bottom_of(ty),
            OffsetHint::Values(values) => {
                let offsets = self.field_offsets();
                let mut result = Domain::bottom_of(ty);
                for v in values {
                    match self.locate(&offsets, v) {
                        Some((idx, inner)) if inner == 0 && self.fields[idx] == *ty => {
                            result.join(&self.members[idx]);
                        }
                        Some((idx, inner)) => {
                            result.join(&self.members[idx].load(ty, &byte_offset(inner)));
                        }
                        None => {}
                    }
                }
                result
            }
            _ => Domain::top_of(ty),
        }
    }

    /// Block-level write at an abstract byte offset.
    pub fn store(&mut self, value: &Domain, offset: &Domain, single_target: bool) {
        match offset_hint(offset) {
            OffsetHint::None => {}
            OffsetHint::Values(values) => {
                let offsets = self.field_offsets();
                let located: Vec<(usize, u64)> = values
                    .into_iter()
                    .filter_map(|v| self.locate(&offsets, v))
                    .collect();
                let strong = single_target && located.len() == 1;
                for (idx, inner) in located {
                    self.members[idx].store(value, &byte_offset(inner), strong);
                }
            }
            OffsetHint::Range(lo, hi) => {
                let offsets = self.field_offsets();
                for (idx, field) in self.fields.iter().enumerate() {
                    let start = offsets[idx];
                    let end = start + field.size_in_bytes();
                    if start <= hi && lo < end {
                        self.members[idx].set_top();
                    }
                }
            }
            OffsetHint::Any => self.set_top(),
        }
    }

    /// Field index and inner offset containing byte `offset`, if any.
    fn locate(&self, offsets: &[u64], offset: u64) -> Option<(usize, u64)> {
        for (idx, field) in self.fields.iter().enumerate() {
            let start = offsets[idx];
            let size = field.size_in_bytes();
            if offset >= start && offset < start + size {
                return Some((idx, offset - start));
            }
        }
        None
    }
}

fn byte_offset(value: u64) -> Domain {
    Domain::int_constant(ApInt::new(64, value))
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "struct")?;
        for (idx, member) in self.members.iter().enumerate() {
            writeln!(f, "    .{idx} {member}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Structure {
        // {i8, i32} packed: field 1 starts at byte 1.
        Structure::from_members(
            &[Type::i8(), Type::i32()],
            vec![
                Domain::int_constant(ApInt::new(8, 7)),
                Domain::int_constant(ApInt::new(32, 1000)),
            ],
        )
    }

    #[test]
    fn extract_and_insert_by_path() {
        let s = pair();
        assert_eq!(s.extract_value(&[1]).as_singleton().unwrap().as_u64(), 1000);

        let mut out = Structure::bottom(&[Type::i8(), Type::i32()]);
        out.insert_value(&s, &Domain::int_constant(ApInt::new(32, 5)), &[1]);
        assert_eq!(out.extract_value(&[1]).as_singleton().unwrap().as_u64(), 5);
        assert_eq!(out.extract_value(&[0]).as_singleton().unwrap().as_u64(), 7);
    }

    #[test]
    fn loads_resolve_packed_offsets() {
        let s = pair();
        let v = s.load(&Type::i32(), &byte_offset(1));
        assert_eq!(v.as_singleton().unwrap().as_u64(), 1000);
        let b = s.load(&Type::i8(), &byte_offset(0));
        assert_eq!(b.as_singleton().unwrap().as_u64(), 7);
    }

    #[test]
    fn misaligned_loads_saturate() {
        let s = pair();
        assert!(s.load(&Type::i32(), &byte_offset(2)).is_top());
    }

    #[test]
    fn pinned_store_is_strong() {
        let mut s = pair();
        s.store(&Domain::int_constant(ApInt::new(32, 9)), &byte_offset(1), true);
        assert_eq!(s.extract_value(&[1]).as_singleton().unwrap().as_u64(), 9);
    }

    #[test]
    fn set_zero_recurses_into_members() {
        let mut s = pair();
        s.set_zero();
        assert_eq!(s.extract_value(&[0]).as_singleton().unwrap().as_u64(), 0);
        assert_eq!(s.extract_value(&[1]).as_singleton().unwrap().as_u64(), 0);
    }
}
