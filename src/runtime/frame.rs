//! Function activation
//!
//! Each call gets its own activation: program counter, operand stack, locals
//! and control-nesting stack. Nothing in it is visible to other activations.

use super::{control::ControlStack, stack::Stack, Value};
use crate::parser::instruction::Index;
use crate::parser::module::Function;

/// A local slot; parameters come first, in declared order
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub name: Option<String>,
    pub value: Value,
}

/// Locals of one activation, addressed by position or `$name`
#[derive(Debug, Default)]
pub struct Locals {
    slots: Vec<Local>,
}

impl Locals {
    pub fn new() -> Self {
        Locals::default()
    }

    /// Declare a local. Redeclaring an existing name resets it.
    pub fn declare(&mut self, name: Option<String>, value: Value) {
        if let Some(name) = &name {
            if let Some(slot) = self.slots.iter_mut().find(|slot| slot.name.as_ref() == Some(name)) {
                slot.value = value;
                return;
            }
        }
        self.slots.push(Local { name, value });
    }

    fn position(&self, index: &Index) -> Option<usize> {
        match index {
            Index::Num(idx) => Some(*idx as usize).filter(|idx| *idx < self.slots.len()),
            Index::Id(name) => self.slots.iter().position(|slot| slot.name.as_ref() == Some(name)),
        }
    }

    pub fn get(&self, index: &Index) -> Option<Value> {
        self.position(index).map(|idx| self.slots[idx].value)
    }

    /// Store into an existing local; false if it does not exist
    pub fn set(&mut self, index: &Index, value: Value) -> bool {
        match self.position(index) {
            Some(idx) => {
                self.slots[idx].value = value;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// State of one in-progress function execution
#[derive(Debug)]
pub struct Activation<'f> {
    pub function: &'f Function,
    pub pc: usize,
    pub stack: Stack,
    pub locals: Locals,
    pub control: ControlStack,
}

impl<'f> Activation<'f> {
    /// Start an activation with `args` bound to the function's parameters
    pub fn new(function: &'f Function, args: Vec<Value>) -> Self {
        let mut locals = Locals::new();
        for (param, value) in function.params.iter().zip(args) {
            locals.declare(param.name.clone(), value);
        }
        Activation {
            function,
            pc: 0,
            stack: Stack::new(),
            locals,
            control: ControlStack::new(),
        }
    }
}
