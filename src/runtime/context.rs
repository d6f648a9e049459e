//! Execution context and engine configuration
//!
//! The [`ExecutionContext`] owns everything that outlives a single activation:
//! linear memory, the global store, the diagnostic trail and the call-depth and
//! instruction-budget accounting. It is passed explicitly into every call.

use super::{Diagnostic, GlobalStore, Memory, RuntimeError};
use log::{log, warn};

/// Host stack reserved for each interpreted call when sizing an invocation thread
const STACK_PER_CALL: usize = 32 * 1024;
const STACK_BASE: usize = 1024 * 1024;
const STACK_MAX: usize = 1 << 30;

/// Limits applied while executing
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum nesting of interpreted calls; `None` is unbounded
    pub max_call_depth: Option<usize>,
    /// Maximum instructions per top-level invocation; `None` is unbounded
    pub instruction_budget: Option<u64>,
    /// Pages allocated when the module declares no memory
    pub default_memory_pages: u32,
    /// Diagnostics kept in the trail before further ones are only counted; `None` keeps all
    pub max_diagnostics: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_call_depth: Some(1024),
            instruction_budget: None,
            default_memory_pages: 1,
            max_diagnostics: Some(1024),
        }
    }
}

impl EngineConfig {
    pub fn with_max_call_depth(mut self, depth: Option<usize>) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_instruction_budget(mut self, budget: Option<u64>) -> Self {
        self.instruction_budget = budget;
        self
    }

    pub fn with_default_memory_pages(mut self, pages: u32) -> Self {
        self.default_memory_pages = pages;
        self
    }

    pub fn with_max_diagnostics(mut self, max: Option<usize>) -> Self {
        self.max_diagnostics = max;
        self
    }

    /// Stack size of the thread an invocation runs on, enough for `max_call_depth`
    /// nested calls. `None` runs on the caller's thread.
    pub fn invocation_stack_size(&self) -> Option<usize> {
        self.max_call_depth.map(|depth| {
            depth
                .saturating_mul(STACK_PER_CALL)
                .saturating_add(STACK_BASE)
                .min(STACK_MAX)
        })
    }
}

#[derive(Debug)]
pub struct ExecutionContext {
    pub memory: Memory,
    pub globals: GlobalStore,
    config: EngineConfig,
    diagnostics: Vec<Diagnostic>,
    /// Diagnostics counted but not kept once the trail is full
    dropped: u64,
    /// Last logged diagnostic and how often it has recurred since
    last_logged: Option<Diagnostic>,
    repeats: u64,
    call_depth: usize,
    executed: u64,
}

impl ExecutionContext {
    pub fn new(memory: Memory, globals: GlobalStore, config: EngineConfig) -> Self {
        ExecutionContext {
            memory,
            globals,
            config,
            diagnostics: Vec::new(),
            dropped: 0,
            last_logged: None,
            repeats: 0,
            call_depth: 0,
            executed: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Log a diagnostic raised at `pc` in `function` and add it to the trail.
    ///
    /// Consecutive identical diagnostics are logged once, with a repeat count
    /// when a different one arrives. Past `max_diagnostics` entries the trail
    /// stops growing and further diagnostics are only counted.
    pub fn report(&mut self, function: &str, pc: usize, diagnostic: Diagnostic) {
        if self.last_logged.as_ref() == Some(&diagnostic) {
            self.repeats += 1;
        } else {
            self.flush_repeats();
            log!(diagnostic.level(), "{function}@{pc}: {diagnostic}");
            self.last_logged = Some(diagnostic.clone());
        }

        match self.config.max_diagnostics {
            Some(max) if self.diagnostics.len() >= max => {
                if self.dropped == 0 {
                    warn!("diagnostic trail holds {max} entries, counting further diagnostics without keeping them");
                }
                self.dropped += 1;
            }
            _ => self.diagnostics.push(diagnostic),
        }
    }

    fn flush_repeats(&mut self) {
        if self.repeats > 0 {
            if let Some(last) = &self.last_logged {
                log!(last.level(), "last diagnostic repeated {} more times", self.repeats);
            }
            self.repeats = 0;
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics reported since the last [`take_diagnostics`](Self::take_diagnostics) but not kept
    pub fn dropped_diagnostics(&self) -> u64 {
        self.dropped
    }

    /// Drain the trail and reset the dropped count
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.dropped = 0;
        std::mem::take(&mut self.diagnostics)
    }

    /// Start a fresh top-level invocation: the instruction budget is per invocation
    pub fn begin_invocation(&mut self) {
        self.flush_repeats();
        self.last_logged = None;
        self.executed = 0;
        self.call_depth = 0;
    }

    /// Account for entering an activation
    pub(crate) fn enter_call(&mut self) -> Result<(), RuntimeError> {
        if let Some(max) = self.config.max_call_depth {
            if self.call_depth >= max {
                return Err(RuntimeError::CallStackOverflow);
            }
        }
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Charge one instruction against the budget
    pub(crate) fn tick(&mut self) -> Result<(), RuntimeError> {
        if let Some(budget) = self.config.instruction_budget {
            if self.executed >= budget {
                return Err(RuntimeError::InstructionBudgetExhausted);
            }
        }
        self.executed += 1;
        Ok(())
    }

    /// Instructions executed since the last [`begin_invocation`](Self::begin_invocation)
    pub fn instructions_executed(&self) -> u64 {
        self.executed
    }
}
