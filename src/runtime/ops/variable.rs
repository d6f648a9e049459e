//! Variable operations
//!
//! Locals belong to the running activation; globals to the instance. A
//! reference to a symbol that does not exist is reported and replaced by a
//! fixed fallback: reads push i32 0, `local.set`/`local.tee` of an unknown
//! `$name` declare it, and writes to unknown globals are discarded.

use super::*;
use crate::parser::instruction::Index;
use crate::parser::module::ValueType;
use crate::runtime::diagnostic::SymbolKind;
use crate::runtime::frame::Locals;
use crate::runtime::GlobalStore;

fn unresolved(kind: SymbolKind, index: &Index) -> Option<Diagnostic> {
    Some(Diagnostic::UnresolvedSymbol {
        kind,
        name: index.to_string(),
    })
}

/// `(local $name? type)`: declare a zero-initialised local
pub fn local(locals: &mut Locals, name: Option<&str>, ty: ValueType) -> OpResult {
    locals.declare(name.map(String::from), ty.zero());
    Ok(None)
}

pub fn local_get(stack: &mut Stack, locals: &Locals, index: &Index) -> OpResult {
    match locals.get(index) {
        Some(value) => {
            stack.push(value);
            Ok(None)
        }
        None => {
            stack.push(0i32);
            Ok(unresolved(SymbolKind::Local, index))
        }
    }
}

fn store_local(locals: &mut Locals, index: &Index, value: Value) -> Option<Diagnostic> {
    if locals.set(index, value) {
        return None;
    }
    if let Index::Id(name) = index {
        locals.declare(Some(name.clone()), value);
    }
    unresolved(SymbolKind::Local, index)
}

pub fn local_set(stack: &mut Stack, locals: &mut Locals, index: &Index) -> OpResult {
    let value = stack.pop()?;
    Ok(store_local(locals, index, value))
}

/// local.tee: store the top of the stack without popping it
pub fn local_tee(stack: &mut Stack, locals: &mut Locals, index: &Index) -> OpResult {
    let value = *stack.peek()?;
    Ok(store_local(locals, index, value))
}

pub fn global_get(stack: &mut Stack, globals: &GlobalStore, index: &Index) -> OpResult {
    match globals.get(index) {
        Some(value) => {
            stack.push(value);
            Ok(None)
        }
        None => {
            stack.push(0i32);
            Ok(unresolved(SymbolKind::Global, index))
        }
    }
}

/// global.set: overwrite the global; mutability is not checked here
pub fn global_set(stack: &mut Stack, globals: &mut GlobalStore, index: &Index) -> OpResult {
    let value = stack.pop()?;
    if globals.overwrite(index, value) {
        Ok(None)
    } else {
        Ok(unresolved(SymbolKind::Global, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::instruction::{Instruction, IntBinOp};
    use crate::runtime::test_utils::test::ExecutorTest;

    fn id(name: &str) -> Index {
        Index::Id(name.into())
    }

    #[test]
    fn args_are_locals() {
        ExecutorTest::new()
            .param("$a", ValueType::I32)
            .param("$b", ValueType::I32)
            .args(vec![Value::I32(7), Value::I32(5)])
            .inst(Instruction::LocalGet { local: id("$a") })
            .inst(Instruction::LocalGet { local: Index::Num(1) })
            .inst(Instruction::I32Binary(IntBinOp::Sub))
            .expect_stack(vec![Value::I32(2)]);
    }

    #[test]
    fn declared_locals_start_at_zero() {
        ExecutorTest::new()
            .inst(Instruction::Local {
                name: Some("$x".into()),
                ty: ValueType::F64,
            })
            .inst(Instruction::Local {
                name: None,
                ty: ValueType::I64,
            })
            .inst(Instruction::LocalGet { local: id("$x") })
            .inst(Instruction::LocalGet { local: Index::Num(1) })
            .expect_stack(vec![Value::F64(0.0), Value::I64(0)]);
    }

    #[test]
    fn set_and_tee() {
        ExecutorTest::new()
            .inst(Instruction::Local {
                name: Some("$x".into()),
                ty: ValueType::I32,
            })
            .inst(Instruction::I32Const { value: 9 })
            .inst(Instruction::LocalTee { local: id("$x") })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::I32Binary(IntBinOp::Add))
            .inst(Instruction::LocalSet { local: id("$x") })
            .inst(Instruction::LocalGet { local: id("$x") })
            .expect_stack(vec![Value::I32(10)]);
    }

    #[test]
    fn unknown_local_reads_zero() {
        ExecutorTest::new()
            .inst(Instruction::LocalGet { local: id("$nope") })
            .expect_diagnostic(Diagnostic::UnresolvedSymbol {
                kind: SymbolKind::Local,
                name: "$nope".into(),
            })
            .expect_stack(vec![Value::I32(0)]);
    }

    #[test]
    fn unknown_local_set_declares_it() {
        ExecutorTest::new()
            .inst(Instruction::I64Const { value: 4 })
            .inst(Instruction::LocalSet { local: id("$fresh") })
            .inst(Instruction::LocalGet { local: id("$fresh") })
            .expect_diagnostic(Diagnostic::UnresolvedSymbol {
                kind: SymbolKind::Local,
                name: "$fresh".into(),
            })
            .expect_stack(vec![Value::I64(4)]);
    }

    #[test]
    fn globals_read_and_write() {
        ExecutorTest::new()
            .global("$g", Value::I32(40), true)
            .inst(Instruction::GlobalGet { global: id("$g") })
            .inst(Instruction::I32Const { value: 2 })
            .inst(Instruction::I32Binary(IntBinOp::Add))
            .inst(Instruction::GlobalSet { global: Index::Num(0) })
            .inst(Instruction::GlobalGet { global: id("$g") })
            .expect_stack(vec![Value::I32(42)]);
    }

    #[test]
    fn global_set_ignores_mutability() {
        ExecutorTest::new()
            .global("$k", Value::I64(1), false)
            .inst(Instruction::I64Const { value: 2 })
            .inst(Instruction::GlobalSet { global: id("$k") })
            .inst(Instruction::GlobalGet { global: id("$k") })
            .expect_stack(vec![Value::I64(2)]);
    }

    #[test]
    fn unknown_global() {
        ExecutorTest::new()
            .inst(Instruction::I32Const { value: 3 })
            .inst(Instruction::GlobalSet { global: id("$missing") })
            .inst(Instruction::GlobalGet { global: id("$missing") })
            .expect_diagnostic(Diagnostic::UnresolvedSymbol {
                kind: SymbolKind::Global,
                name: "$missing".into(),
            })
            .expect_stack(vec![Value::I32(0)]);
    }

    #[test]
    fn local_set_on_empty_stack_is_fatal() {
        ExecutorTest::new()
            .inst(Instruction::LocalSet { local: Index::Num(0) })
            .expect_error("Stack underflow");
    }
}
