//! An interpreter for a simplified textual WebAssembly subset, written in Rust.
//!
//! was loads line-oriented WebAssembly text into a [`parser::module::Module`]
//! and executes its functions on an operand-stack interpreter with structured
//! control flow, a single little-endian linear memory and a global store.
//!
//! # Modules
//!
//! - [`parser`] -- Text loader. Decodes each instruction once into a closed enum.
//! - [`runtime`] -- Executor, linear memory, globals, diagnostics and the host-facing [`runtime::Instance`].
//!
//! # Example
//!
//! Load a module, instantiate it, and call an exported function:
//!
//! ```
//! use was::parser;
//! use was::runtime::{EngineConfig, Instance, Value};
//!
//! let module = parser::parse(r#"
//! (module
//!   (func $add (export "add") (param $a i32) (param $b i32) (result i32)
//!     local.get $a
//!     local.get $b
//!     i32.add
//!   )
//! )
//! "#).unwrap();
//!
//! let mut instance = Instance::new(&module, EngineConfig::default()).unwrap();
//! let result = instance.invoke("add", vec![Value::I32(2), Value::I32(3)]).unwrap();
//! assert_eq!(result, Some(Value::I32(5)));
//! ```
//!
//! # Semantics
//!
//! Integer arithmetic wraps and shift counts are masked. Integer division by
//! zero yields 0 rather than trapping. Conditions such as unknown
//! instructions or unresolved symbols are recorded as
//! [`runtime::Diagnostic`]s while execution continues; stack underflow,
//! out-of-bounds memory access and type errors in arithmetic terminate the
//! running invocation with a [`runtime::RuntimeError`].

pub mod parser;
pub mod runtime;
