//! Instruction implementations
//!
//! Operations are grouped by family. Each works directly on the operand stack
//! (plus memory, locals or globals where it needs them) and is implemented
//! once per type class, with macros stamping out the i32/i64 and f32/f64
//! variants.
//!
//! Every operation returns an [`OpResult`]: fatal conditions are errors,
//! recoverable ones come back as a [`Diagnostic`] for the executor to report.

pub mod bitwise;
pub mod comparison;
pub mod control;
pub mod conversion;
pub mod memory;
pub mod numeric;
pub mod parametric;
pub mod variable;

// Re-export commonly used types for operation implementations
pub(crate) use crate::parser::instruction::MemArg;
pub(crate) use crate::runtime::memory::Memory;
pub(crate) use crate::runtime::stack::Stack;
pub(crate) use crate::runtime::{Diagnostic, RuntimeError, Value};

/// Result of executing one operation
pub type OpResult = Result<Option<Diagnostic>, RuntimeError>;
