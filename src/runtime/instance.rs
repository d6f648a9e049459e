//! Module instance
//!
//! An [`Instance`] pairs a loaded module with the live state it runs against:
//! linear memory, globals and the diagnostic trail. Memory and globals persist
//! across invocations.
//!
//! Interpreted calls recurse on the host stack, so each invocation runs on a
//! thread whose stack is sized for the configured maximum call depth.

use super::{executor::Executor, Diagnostic, EngineConfig, ExecutionContext, GlobalStore, Memory, RuntimeError, Value};
use crate::parser::instruction::Index;
use crate::parser::module::{ExportKind, Function, Module};
use std::thread;

pub struct Instance<'a> {
    module: &'a Module,
    context: ExecutionContext,
}

impl<'a> Instance<'a> {
    /// Create a new instance from a loaded module
    ///
    /// # Errors
    /// - If the module's memory limits cannot be allocated
    pub fn new(module: &'a Module, config: EngineConfig) -> Result<Self, RuntimeError> {
        let memory = match module.memory {
            Some(def) => Memory::new(def.min, def.max)?,
            None => Memory::new(config.default_memory_pages, None)?,
        };
        let globals = GlobalStore::from_defs(&module.globals);

        Ok(Instance {
            module,
            context: ExecutionContext::new(memory, globals, config),
        })
    }

    /// Invoke an exported function by name, returning the top of its final stack
    pub fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<Option<Value>, RuntimeError> {
        let module = self.module;
        let export = module
            .export(name)
            .ok_or_else(|| RuntimeError::UnknownExport(name.to_string()))?;
        if export.kind != ExportKind::Func {
            return Err(RuntimeError::NotAFunction(name.to_string()));
        }
        let function = module
            .function(&export.target)
            .ok_or_else(|| RuntimeError::UnknownFunction(export.target.to_string()))?;
        self.run(function, args)
    }

    /// Call a function by index or `$name`, bypassing the export table
    pub fn call(&mut self, target: &Index, args: Vec<Value>) -> Result<Option<Value>, RuntimeError> {
        let module = self.module;
        let function = module
            .function(target)
            .ok_or_else(|| RuntimeError::UnknownFunction(target.to_string()))?;
        self.run(function, args)
    }

    fn run(&mut self, function: &Function, args: Vec<Value>) -> Result<Option<Value>, RuntimeError> {
        if args.len() != function.params.len() {
            return Err(RuntimeError::ArgumentCount {
                expected: function.params.len(),
                actual: args.len(),
            });
        }
        for (arg, param) in args.iter().zip(&function.params) {
            if arg.typ() != param.ty {
                return Err(RuntimeError::TypeMismatch {
                    expected: param.ty.to_string(),
                    actual: arg.typ().to_string(),
                });
            }
        }

        self.context.begin_invocation();
        let module = self.module;
        let context = &mut self.context;
        let stack_size = context.config().invocation_stack_size();
        let execute = move || Executor::new(module).execute(function, args, context);
        let stack = match stack_size {
            Some(bytes) => run_with_stack(bytes, execute)?,
            None => execute()?,
        };
        Ok(stack.last().copied())
    }

    /// Names of the function exports, in declaration order
    pub fn exported_functions(&self) -> Vec<&str> {
        self.module
            .exports
            .iter()
            .filter(|export| export.kind == ExportKind::Func)
            .map(|export| export.name.as_str())
            .collect()
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    pub fn memory(&self) -> &Memory {
        &self.context.memory
    }

    pub fn globals(&self) -> &GlobalStore {
        &self.context.globals
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.context.diagnostics()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.context.take_diagnostics()
    }

    /// Diagnostics reported after the trail filled up, since the last take
    pub fn dropped_diagnostics(&self) -> u64 {
        self.context.dropped_diagnostics()
    }
}

/// Run `f` on a scoped thread with a `bytes`-sized stack
fn run_with_stack<T, F>(bytes: usize, f: F) -> Result<T, RuntimeError>
where
    T: Send,
    F: FnOnce() -> Result<T, RuntimeError> + Send,
{
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("was-invoke".into())
            .stack_size(bytes)
            .spawn_scoped(scope, f)
            .map_err(|e| RuntimeError::ThreadSpawn(e.to_string()))?;
        match handle.join() {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    })
}
