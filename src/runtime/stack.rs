//! Operand stack implementation

use super::{RuntimeError, Value};
use crate::parser::module::ValueType;

/// The operand stack of one activation
#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Peek at the top value without popping
    pub fn peek(&self) -> Result<&Value, RuntimeError> {
        self.values.last().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop a value and check its type
    pub fn pop_typed(&mut self, expected_type: ValueType) -> Result<Value, RuntimeError> {
        let value = self.pop()?;
        if value.typ() != expected_type {
            return Err(mismatch(expected_type, &value));
        }
        Ok(value)
    }

    /// Pop an i32 value
    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        let value = self.pop()?;
        value.as_i32().ok_or_else(|| mismatch(ValueType::I32, &value))
    }

    /// Pop an i64 value
    pub fn pop_i64(&mut self) -> Result<i64, RuntimeError> {
        let value = self.pop()?;
        value.as_i64().ok_or_else(|| mismatch(ValueType::I64, &value))
    }

    /// Pop an f32 value
    pub fn pop_f32(&mut self) -> Result<f32, RuntimeError> {
        let value = self.pop()?;
        value.as_f32().ok_or_else(|| mismatch(ValueType::F32, &value))
    }

    /// Pop an f64 value
    pub fn pop_f64(&mut self) -> Result<f64, RuntimeError> {
        let value = self.pop()?;
        value.as_f64().ok_or_else(|| mismatch(ValueType::F64, &value))
    }

    /// Get the current stack depth
    pub fn depth(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Clear the stack
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Get all values, bottom first
    pub fn drain(&mut self) -> Vec<Value> {
        self.values.drain(..).collect()
    }
}

fn mismatch(expected: ValueType, actual: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.typ().to_string(),
    }
}
