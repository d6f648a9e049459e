//! Instruction executor
//!
//! Runs one function activation at a time with a program counter over the
//! function's decoded body. Calls recurse: the callee gets a fresh
//! activation and its top-of-stack value, if any, is pushed back onto the
//! caller's stack.

use super::{
    control::ControlKind,
    diagnostic::SymbolKind,
    frame::Activation,
    ops::{self, control::Flow, OpResult},
    Diagnostic, ExecutionContext, RuntimeError, Value,
};
use crate::parser::instruction::{Index, Instruction};
use crate::parser::module::{Function, Module};
use log::{debug, trace};

/// Executes functions of a module against an execution context
pub struct Executor<'m> {
    module: &'m Module,
}

impl<'m> Executor<'m> {
    pub fn new(module: &'m Module) -> Self {
        Executor { module }
    }

    /// Run `function` to completion with `args` bound to its parameters.
    ///
    /// Returns the activation's final operand stack, bottom first. By
    /// convention only the top value is the function's result.
    pub fn execute(
        &self,
        function: &Function,
        args: Vec<Value>,
        ctx: &mut ExecutionContext,
    ) -> Result<Vec<Value>, RuntimeError> {
        ctx.enter_call()?;
        let name = function.display_name();
        debug!("enter {name} (depth {})", ctx.call_depth());

        let result = self.run(&name, Activation::new(function, args), ctx);

        ctx.exit_call();
        match &result {
            Ok(stack) => debug!("exit {name} with {} value(s)", stack.len()),
            Err(e) => debug!("exit {name}: {e}"),
        }
        result
    }

    fn run(&self, name: &str, mut activation: Activation, ctx: &mut ExecutionContext) -> Result<Vec<Value>, RuntimeError> {
        let function = activation.function;
        while let Some(instruction) = function.body.get(activation.pc) {
            ctx.tick()?;
            let pc = activation.pc;
            trace!("{name}@{pc}: {instruction}");

            let (flow, diagnostic) = self.step(&mut activation, instruction, ctx)?;
            if let Some(diagnostic) = diagnostic {
                ctx.report(name, pc, diagnostic);
            }
            if flow == Flow::Return {
                break;
            }
        }
        Ok(activation.stack.drain())
    }

    /// Execute one instruction and position the program counter for the next
    fn step(
        &self,
        activation: &mut Activation,
        instruction: &Instruction,
        ctx: &mut ExecutionContext,
    ) -> ops::control::ControlResult {
        use Instruction::*;

        match instruction {
            Block { label } => ops::control::enter(activation, ControlKind::Block, label.as_deref()),
            Loop { label } => ops::control::enter(activation, ControlKind::Loop, label.as_deref()),
            If { label } => ops::control::if_(activation, label.as_deref()),
            Else => ops::control::else_(activation),
            End => ops::control::end(activation),
            Br { target } => ops::control::br(activation, target),
            BrIf { target } => ops::control::br_if(activation, target),
            BrTable { targets } => ops::control::br_table(activation, targets),
            Return => ops::control::return_(),
            Call { target } => {
                let diagnostic = self.call(activation, target, ctx)?;
                activation.pc += 1;
                Ok((Flow::Continue, diagnostic))
            }
            other => {
                let diagnostic = Self::execute_plain(activation, other, ctx)?;
                activation.pc += 1;
                Ok((Flow::Continue, diagnostic))
            }
        }
    }

    /// Execute an instruction that does not touch control flow
    fn execute_plain(activation: &mut Activation, instruction: &Instruction, ctx: &mut ExecutionContext) -> OpResult {
        use Instruction::*;

        let stack = &mut activation.stack;
        match instruction {
            Nop => Ok(None),

            // Parametric
            Drop => ops::parametric::drop(stack),
            Select => ops::parametric::select(stack),

            // Variables
            Local { name, ty } => ops::variable::local(&mut activation.locals, name.as_deref(), *ty),
            LocalGet { local } => ops::variable::local_get(stack, &activation.locals, local),
            LocalSet { local } => ops::variable::local_set(stack, &mut activation.locals, local),
            LocalTee { local } => ops::variable::local_tee(stack, &mut activation.locals, local),
            GlobalGet { global } => ops::variable::global_get(stack, &ctx.globals, global),
            GlobalSet { global } => ops::variable::global_set(stack, &mut ctx.globals, global),

            // Memory
            Load { op, memarg } => ops::memory::load(stack, &ctx.memory, *op, memarg),
            Store { op, memarg } => ops::memory::store(stack, &mut ctx.memory, *op, memarg),
            MemorySize => ops::memory::size(stack, &ctx.memory),
            MemoryGrow => ops::memory::grow(stack, &mut ctx.memory),

            // Constants
            I32Const { value } => {
                stack.push(*value);
                Ok(None)
            }
            I64Const { value } => {
                stack.push(*value);
                Ok(None)
            }
            F32Const { value } => {
                stack.push(*value);
                Ok(None)
            }
            F64Const { value } => {
                stack.push(*value);
                Ok(None)
            }

            // Numeric
            I32Eqz => ops::comparison::i32_eqz(stack),
            I64Eqz => ops::comparison::i64_eqz(stack),
            I32Unary(op) => ops::bitwise::i32_unary(stack, *op),
            I64Unary(op) => ops::bitwise::i64_unary(stack, *op),
            F32Unary(op) => ops::numeric::f32_unary(stack, *op),
            F64Unary(op) => ops::numeric::f64_unary(stack, *op),
            I32Binary(op) => ops::numeric::i32_binary(stack, *op),
            I64Binary(op) => ops::numeric::i64_binary(stack, *op),
            F32Binary(op) => ops::numeric::f32_binary(stack, *op),
            F64Binary(op) => ops::numeric::f64_binary(stack, *op),
            I32Compare(op) => ops::comparison::i32_compare(stack, *op),
            I64Compare(op) => ops::comparison::i64_compare(stack, *op),
            F32Compare(op) => ops::comparison::f32_compare(stack, *op),
            F64Compare(op) => ops::comparison::f64_compare(stack, *op),
            Convert(op) => ops::conversion::convert(stack, *op),

            Unknown { mnemonic } => Ok(Some(Diagnostic::UnknownOpcode {
                mnemonic: mnemonic.clone(),
            })),

            // dispatched by `step`
            Block { .. } | Loop { .. } | If { .. } | Else | End | Br { .. } | BrIf { .. } | BrTable { .. }
            | Return | Call { .. } => Ok(None),
        }
    }

    /// Call a function: pop its arguments, run it in a fresh activation and
    /// push its result
    fn call(&self, activation: &mut Activation, target: &Index, ctx: &mut ExecutionContext) -> OpResult {
        let Some(callee) = self.module.function(target) else {
            return Ok(Some(Diagnostic::UnresolvedSymbol {
                kind: SymbolKind::Function,
                name: target.to_string(),
            }));
        };

        let mut args = Vec::with_capacity(callee.params.len());
        for _ in 0..callee.params.len() {
            args.push(activation.stack.pop()?);
        }
        args.reverse();

        let results = self.execute(callee, args, ctx)?;
        match results.last() {
            Some(value) => {
                activation.stack.push(*value);
                Ok(None)
            }
            None if callee.result.is_some() => Ok(Some(Diagnostic::MissingResult {
                callee: callee.display_name(),
            })),
            None => Ok(None),
        }
    }
}
