//! Execution engine
//!
//! This module provides the operand-stack interpreter for loaded modules:
//! value representation, the operand stack, linear memory, the global store,
//! structured control flow and the instruction executor.
//!
//! Fatal conditions are [`RuntimeError`]s that terminate the running
//! activation. Recoverable conditions (divide by zero, unresolved symbols,
//! unknown opcodes and the like) are [`Diagnostic`]s recorded on the
//! [`ExecutionContext`] while execution continues.

pub mod context;
pub mod control;
pub mod diagnostic;
pub mod executor;
pub mod frame;
pub mod globals;
pub mod instance;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod test_utils;
pub mod value;

pub use context::{EngineConfig, ExecutionContext};
pub use diagnostic::Diagnostic;
pub use executor::Executor;
pub use globals::GlobalStore;
pub use instance::Instance;
pub use memory::Memory;
pub use stack::Stack;
pub use value::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("Out of bounds memory access: {width} bytes at address {addr} with memory size {size}")]
    MemoryOutOfBounds { addr: u64, width: usize, size: usize },
    #[error("Memory error: {0}")]
    MemoryError(String),
    #[error("Call stack overflow")]
    CallStackOverflow,
    #[error("Instruction budget exhausted")]
    InstructionBudgetExhausted,
    #[error("Failed to start invocation thread: {0}")]
    ThreadSpawn(String),
    #[error("Unknown export: {0}")]
    UnknownExport(String),
    #[error("Export {0} is not a function")]
    NotAFunction(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Argument count mismatch: expected {expected}, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("Unknown global: {0}")]
    UnknownGlobal(String),
    #[error("Global {0} is immutable")]
    ImmutableGlobal(String),
}
