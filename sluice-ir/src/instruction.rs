//! Instructions, operands, and predicates.

use crate::{module::BlockId, Constant, FunctionId, Place, Type};

/// An instruction operand: either an SSA place or an inline constant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Reference to a value computed elsewhere.
    Place(Place),
    /// Inline constant.
    Constant(Constant),
}

impl From<Place> for Operand {
    fn from(place: Place) -> Self {
        Operand::Place(place)
    }
}

impl From<Constant> for Operand {
    fn from(constant: Constant) -> Self {
        Operand::Constant(constant)
    }
}

/// Binary arithmetic and logic opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumCount)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    /// Integer addition, two's-complement wraparound.
    Add,
    /// Integer subtraction.
    Sub,
    /// Integer multiplication.
    Mul,
    /// Unsigned division.
    Udiv,
    /// Signed division.
    Sdiv,
    /// Unsigned remainder.
    Urem,
    /// Signed remainder.
    Srem,
    /// Left shift.
    Shl,
    /// Logical right shift.
    Lshr,
    /// Arithmetic right shift.
    Ashr,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Float addition.
    FAdd,
    /// Float subtraction.
    FSub,
    /// Float multiplication.
    FMul,
    /// Float division.
    FDiv,
    /// Float remainder.
    FRem,
}

impl BinaryOp {
    /// Whether the opcode operates on floats.
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FRem
        )
    }
}

/// Conversion opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumCount)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "lowercase")]
pub enum CastOp {
    /// Truncate an integer to a narrower width.
    Trunc,
    /// Zero-extend an integer.
    Zext,
    /// Sign-extend an integer.
    Sext,
    /// Truncate a float to a narrower precision.
    FpTrunc,
    /// Extend a float to a wider precision.
    FpExt,
    /// Float to unsigned integer.
    FpToUi,
    /// Float to signed integer.
    FpToSi,
    /// Unsigned integer to float.
    UiToFp,
    /// Signed integer to float.
    SiToFp,
    /// Reinterpret a pointer as a pointer of another type.
    BitCast,
    /// Pointer to integer.
    PtrToInt,
    /// Integer to pointer.
    IntToPtr,
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumCount)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "lowercase")]
pub enum IntPredicate {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Unsigned greater than.
    Ugt,
    /// Unsigned greater or equal.
    Uge,
    /// Unsigned less than.
    Ult,
    /// Unsigned less or equal.
    Ule,
    /// Signed greater than.
    Sgt,
    /// Signed greater or equal.
    Sge,
    /// Signed less than.
    Slt,
    /// Signed less or equal.
    Sle,
}

/// Float comparison predicates. `O*` variants are ordered (false on NaN),
/// `U*` variants are unordered (true on NaN).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumCount)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

/// The operation performed by an [`Instruction`].
#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "lowercase")]
pub enum InstOp {
    /// Binary arithmetic or logic.
    Binary {
        /// Opcode.
        op: BinaryOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// Integer (or pointer) comparison producing an `i1`.
    Icmp {
        /// Predicate.
        pred: IntPredicate,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// Float comparison producing an `i1`.
    Fcmp {
        /// Predicate.
        pred: FloatPredicate,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// Type conversion.
    Cast {
        /// Opcode.
        op: CastOp,
        /// Source value.
        value: Operand,
    },
    /// Stack allocation. Produces a pointer to a fresh stack block.
    Alloca {
        /// Type of the allocated slot.
        allocated: Type,
        /// Element count for array allocations; `None` allocates one.
        count: Option<Operand>,
    },
    /// Load through a pointer.
    Load {
        /// Pointer operand.
        ptr: Operand,
    },
    /// Store through a pointer.
    Store {
        /// Value to store.
        value: Operand,
        /// Pointer operand.
        ptr: Operand,
    },
    /// Pointer arithmetic over an aggregate shape.
    GetElementPtr {
        /// Base pointer.
        base: Operand,
        /// Indices, outermost first. The first index steps through the
        /// pointee as a whole.
        indices: Vec<Operand>,
    },
    /// Read one vector lane.
    ExtractElement {
        /// Vector operand.
        vector: Operand,
        /// Lane index.
        index: Operand,
    },
    /// Replace one vector lane.
    InsertElement {
        /// Vector operand.
        vector: Operand,
        /// Replacement element.
        element: Operand,
        /// Lane index.
        index: Operand,
    },
    /// Permute two vectors.
    ShuffleVector {
        /// First vector.
        lhs: Operand,
        /// Second vector.
        rhs: Operand,
        /// Lane selectors; `u32::MAX` selects an undefined lane.
        mask: Vec<u32>,
    },
    /// Read a nested aggregate member.
    ExtractValue {
        /// Aggregate operand.
        aggregate: Operand,
        /// Constant member path.
        indices: Vec<u32>,
    },
    /// Replace a nested aggregate member.
    InsertValue {
        /// Aggregate operand.
        aggregate: Operand,
        /// Replacement member.
        element: Operand,
        /// Constant member path.
        indices: Vec<u32>,
    },
    /// SSA phi node.
    Phi {
        /// Incoming `(predecessor, value)` pairs.
        incoming: Vec<(BlockId, Operand)>,
    },
    /// Two-way value select on an `i1` condition.
    Select {
        /// Condition operand.
        condition: Operand,
        /// Value when true.
        if_true: Operand,
        /// Value when false.
        if_false: Operand,
    },
    /// Direct function call.
    Call {
        /// Callee.
        callee: FunctionId,
        /// Positional arguments, including variadic tail.
        args: Vec<Operand>,
    },
    /// Read the next variadic argument.
    VaArg {
        /// Argument list handle.
        list: Operand,
    },
    /// Return, optionally with a value. Terminator.
    Ret {
        /// Returned value.
        value: Option<Operand>,
    },
    /// Unconditional branch. Terminator.
    Br {
        /// Target block.
        target: BlockId,
    },
    /// Conditional branch. Terminator.
    CondBr {
        /// `i1` condition.
        condition: Operand,
        /// Target when true.
        if_true: BlockId,
        /// Target when false.
        if_false: BlockId,
    },
    /// Multi-way branch. Terminator.
    Switch {
        /// Scrutinee.
        value: Operand,
        /// Default target.
        default: BlockId,
        /// `(case value, target)` pairs.
        cases: Vec<(u64, BlockId)>,
    },
    /// Computed branch into a known destination set. Terminator.
    IndirectBr {
        /// Destination address.
        address: Operand,
        /// All possible targets.
        destinations: Vec<BlockId>,
    },
    /// Unreachable marker. Terminator.
    Unreachable,
}

impl InstOp {
    /// Whether this operation ends a basic block.
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstOp::Ret { .. }
                | InstOp::Br { .. }
                | InstOp::CondBr { .. }
                | InstOp::Switch { .. }
                | InstOp::IndirectBr { .. }
                | InstOp::Unreachable
        )
    }

    /// Control-flow successors of a terminator; empty for non-terminators,
    /// `ret`, and `unreachable`.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstOp::Br { target } => vec![*target],
            InstOp::CondBr {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            InstOp::Switch { default, cases, .. } => {
                let mut out = vec![*default];
                out.extend(cases.iter().map(|(_, target)| *target));
                out
            }
            InstOp::IndirectBr { destinations, .. } => destinations.clone(),
            _ => Vec::new(),
        }
    }
}

/// One basic-block entry: the result place and type plus the operation.
///
/// Void-producing instructions still carry a place; it doubles as the key of
/// the stack block for `alloca` and of the variadic-argument list for calls.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Place under which the result is recorded.
    pub result: Place,
    /// Result type; `Type::Void` when no value is produced.
    pub ty: Type,
    /// The operation.
    pub op: InstOp,
}

impl Instruction {
    /// Lowercase opcode name, for logging and display.
    pub fn opcode(&self) -> &'static str {
        match &self.op {
            InstOp::Binary { op, .. } => match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::Udiv => "udiv",
                BinaryOp::Sdiv => "sdiv",
                BinaryOp::Urem => "urem",
                BinaryOp::Srem => "srem",
                BinaryOp::Shl => "shl",
                BinaryOp::Lshr => "lshr",
                BinaryOp::Ashr => "ashr",
                BinaryOp::And => "and",
                BinaryOp::Or => "or",
                BinaryOp::Xor => "xor",
                BinaryOp::FAdd => "fadd",
                BinaryOp::FSub => "fsub",
                BinaryOp::FMul => "fmul",
                BinaryOp::FDiv => "fdiv",
                BinaryOp::FRem => "frem",
            },
            op => <&'static str>::from(op),
        }
    }
}
