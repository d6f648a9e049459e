//! Error type for module loading.

use super::instruction::DecodeError;
use super::sexpr::ReadError;

/// An error encountered while loading a module from text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {message}")]
#[must_use]
pub struct ParseError {
    /// 1-based source line of the offending declaration or instruction.
    pub line: usize,
    /// Human-readable description of the error.
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn decode(line: usize, err: DecodeError) -> Self {
        Self::new(line, err.to_string())
    }

    pub(crate) fn read(line: usize, err: ReadError) -> Self {
        Self::new(line, err.to_string())
    }
}
