//! Recoverable runtime conditions
//!
//! A [`Diagnostic`] is recorded when the executor hits a condition it can
//! recover from locally: the offending instruction takes a fixed fallback and
//! execution continues. Fatal conditions are [`RuntimeError`](super::RuntimeError)s instead.

use crate::parser::module::ValueType;
use log::Level;
use std::fmt;

/// What kind of symbol failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Local,
    Global,
    Function,
    Label,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Local => write!(f, "local"),
            SymbolKind::Global => write!(f, "global"),
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Label => write!(f, "label"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Integer division or remainder by zero; the result was 0
    DivideByZero { opcode: String },
    /// A local, global, callee or label that does not exist
    UnresolvedSymbol { kind: SymbolKind, name: String },
    /// A branch deeper than the open control frames; depth 0 was used
    InvalidBranchDepth { depth: u32, open: usize },
    /// A conversion applied to a wrongly typed operand; the conversion was skipped
    TypeMismatch {
        opcode: String,
        expected: ValueType,
        actual: ValueType,
    },
    UnknownOpcode { mnemonic: String },
    /// `drop` on an empty operand stack
    DropUnderflow,
    /// A callee declaring a result returned with an empty operand stack
    MissingResult { callee: String },
}

impl Diagnostic {
    /// Log level this diagnostic is reported at
    pub fn level(&self) -> Level {
        match self {
            Diagnostic::DivideByZero { .. } => Level::Debug,
            _ => Level::Warn,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DivideByZero { opcode } => write!(f, "{opcode}: division by zero, result is 0"),
            Diagnostic::UnresolvedSymbol { kind, name } => write!(f, "unresolved {kind} {name}"),
            Diagnostic::InvalidBranchDepth { depth, open } => write!(
                f,
                "branch depth {depth} exceeds {open} open control frames, using depth 0"
            ),
            Diagnostic::TypeMismatch {
                opcode,
                expected,
                actual,
            } => write!(f, "{opcode}: expected {expected} operand, got {actual}; skipped"),
            Diagnostic::UnknownOpcode { mnemonic } => write!(f, "unknown instruction {mnemonic}"),
            Diagnostic::DropUnderflow => write!(f, "drop on empty operand stack"),
            Diagnostic::MissingResult { callee } => {
                write!(f, "call to {callee} returned no value")
            }
        }
    }
}
