//! Module records produced by the text loader
//!
//! A [`Module`] is the fully-formed program handed to the runtime: functions
//! indexed by id and by name, global definitions, the single memory
//! definition and the export table. The runtime only ever reads these; the
//! live memory and global values it mutates are allocated from them.

use super::instruction::{Index, Instruction};
use crate::runtime::Value;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    /// The zero value of this type, used for freshly declared locals
    pub fn zero(&self) -> Value {
        match self {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
        }
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i32" => Ok(ValueType::I32),
            "i64" => Ok(ValueType::I64),
            "f32" => Ok(ValueType::F32),
            "f64" => Ok(ValueType::F64),
            other => Err(format!("invalid value type: {other}")),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ValueType::I32 => "i32",
                ValueType::I64 => "i64",
                ValueType::F32 => "f32",
                ValueType::F64 => "f64",
            }
        )
    }
}

/// A function type declared with `(type ...)`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionType {
    pub parameters: Vec<ValueType>,
    pub result: Option<ValueType>,
}

/// A parameter binding: position is its declared order
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: ValueType,
}

/// A function definition with its decoded instruction sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub index: u32,
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub result: Option<ValueType>,
    pub body: Vec<Instruction>,
}

impl Function {
    pub fn new(index: u32) -> Self {
        Function {
            index,
            name: None,
            params: Vec::new(),
            result: None,
            body: Vec::new(),
        }
    }

    /// Name used in diagnostics and logs
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("[anon {}]", self.index),
        }
    }
}

/// A global definition with its initial value
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDef {
    pub name: Option<String>,
    pub ty: ValueType,
    pub mutable: bool,
    pub init: Value,
}

/// Memory limits in pages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryDef {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Func,
    Memory,
    Global,
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "func" => Ok(ExportKind::Func),
            "memory" => Ok(ExportKind::Memory),
            "global" => Ok(ExportKind::Global),
            other => Err(format!("unsupported export kind: {other}")),
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExportKind::Func => write!(f, "func"),
            ExportKind::Memory => write!(f, "memory"),
            ExportKind::Global => write!(f, "global"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub target: Index,
}

/// A loaded module
#[derive(Debug, Default)]
pub struct Module {
    pub types: BTreeMap<u32, FunctionType>,
    pub functions: BTreeMap<u32, Function>,
    pub function_names: HashMap<String, u32>,
    pub globals: Vec<GlobalDef>,
    pub memory: Option<MemoryDef>,
    pub exports: Vec<Export>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    /// Register a function under its id and, if it has one, its name
    pub fn add_function(&mut self, function: Function) {
        if let Some(name) = &function.name {
            self.function_names.insert(name.clone(), function.index);
        }
        self.functions.insert(function.index, function);
    }

    pub fn function_by_id(&self, index: u32) -> Option<&Function> {
        self.functions.get(&index)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.function_names
            .get(name)
            .and_then(|index| self.functions.get(index))
    }

    /// Resolve a numeric or symbolic function reference
    pub fn function(&self, index: &Index) -> Option<&Function> {
        match index {
            Index::Num(idx) => self.function_by_id(*idx),
            Index::Id(name) => self.function_by_name(name),
        }
    }

    /// The next unused function id, for functions without an explicit one
    pub fn next_function_index(&self) -> u32 {
        self.functions.keys().next_back().map_or(0, |last| last + 1)
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|export| export.name == name)
    }

    /// Resolve a function export to its function definition
    pub fn exported_function(&self, name: &str) -> Option<&Function> {
        self.export(name)
            .filter(|export| export.kind == ExportKind::Func)
            .and_then(|export| self.function(&export.target))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "module")?;
        for (index, ty) in &self.types {
            let params: Vec<String> = ty.parameters.iter().map(ToString::to_string).collect();
            write!(f, "  type {index}: ({})", params.join(" "))?;
            match ty.result {
                Some(result) => writeln!(f, " -> {result}")?,
                None => writeln!(f)?,
            }
        }
        for global in &self.globals {
            writeln!(
                f,
                "  global {} {}{} = {}",
                global.name.as_deref().unwrap_or("_"),
                if global.mutable { "mut " } else { "" },
                global.ty,
                global.init
            )?;
        }
        if let Some(memory) = &self.memory {
            match memory.max {
                Some(max) => writeln!(f, "  memory min={} max={max}", memory.min)?,
                None => writeln!(f, "  memory min={}", memory.min)?,
            }
        }
        for function in self.functions.values() {
            let params: Vec<String> = function
                .params
                .iter()
                .map(|p| format!("{}:{}", p.name.as_deref().unwrap_or("_"), p.ty))
                .collect();
            write!(
                f,
                "  func {} {} ({})",
                function.index,
                function.display_name(),
                params.join(" ")
            )?;
            match function.result {
                Some(result) => writeln!(f, " -> {result}")?,
                None => writeln!(f)?,
            }
            for instruction in &function.body {
                writeln!(f, "    {instruction}")?;
            }
        }
        for export in &self.exports {
            writeln!(f, "  export \"{}\" ({} {})", export.name, export.kind, export.target)?;
        }
        Ok(())
    }
}
