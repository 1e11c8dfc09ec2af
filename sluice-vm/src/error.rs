//! Engine bug diagnostics.
//!
//! The analysis itself never fails: unsupported IR saturates to top and
//! division by zero is a top result, not an error. The only fatal condition
//! is a caller-side type mismatch between combined domains, which indicates
//! a bug in the code driving the domains and aborts with a diagnostic.

use core::fmt;

/// A violated internal invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Bug {
    /// Two domains of incompatible shapes were combined.
    #[error("domain mismatch in `{operation}`: {lhs} vs {rhs}")]
    DomainMismatch {
        /// Operation that received the operands.
        operation: &'static str,
        /// Shape of the left operand.
        lhs: String,
        /// Shape of the right operand.
        rhs: String,
    },
    /// Two integer domains of different widths were combined.
    #[error("width mismatch in `{operation}`: {lhs} vs {rhs} bits")]
    WidthMismatch {
        /// Operation that received the operands.
        operation: &'static str,
        /// Width of the left operand.
        lhs: u32,
        /// Width of the right operand.
        rhs: u32,
    },
    /// Two aggregate domains of different arity were combined.
    #[error("arity mismatch in `{operation}`: {lhs} vs {rhs} members")]
    ArityMismatch {
        /// Operation that received the operands.
        operation: &'static str,
        /// Arity of the left operand.
        lhs: usize,
        /// Arity of the right operand.
        rhs: usize,
    },
}

/// Abort on a violated invariant, with the diagnostic as the panic payload.
#[track_caller]
pub(crate) fn bug(bug: Bug) -> ! {
    panic!("sluice-vm bug: {bug}")
}

/// Shape description used in [`Bug::DomainMismatch`] diagnostics.
pub(crate) fn shape_of(value: &impl fmt::Debug) -> String {
    let debug = format!("{value:?}");
    match debug.split(&['(', '{', ' '][..]).next() {
        Some(head) if !head.is_empty() => head.to_string(),
        _ => debug,
    }
}
