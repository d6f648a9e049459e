//! Parametric operations: `drop` and `select`

use super::*;

/// drop: discard the top value. An empty stack is reported, not fatal.
pub fn drop(stack: &mut Stack) -> OpResult {
    match stack.pop() {
        Ok(_) => Ok(None),
        Err(RuntimeError::StackUnderflow) => Ok(Some(Diagnostic::DropUnderflow)),
        Err(e) => Err(e),
    }
}

/// select: pop the condition, then `b`, then `a`; push `a` if the condition
/// is nonzero, otherwise `b`
pub fn select(stack: &mut Stack) -> OpResult {
    let condition = stack.pop_i32()?;
    let b = stack.pop()?;
    let a = stack.pop()?;
    stack.push(if condition != 0 { a } else { b });
    Ok(None)
}
