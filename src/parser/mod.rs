//! Loader for the line-oriented textual module format
//!
//! The format is a simplified WebAssembly text format where every
//! declaration sits on its own line and function bodies list one instruction
//! per line:
//!
//! ```text
//! (module
//!   (type (;0;) (func (param i32) (result i32)))
//!   (global $counter (mut i32) (i32.const 0))
//!   (memory (;0;) 1)
//!   (func $fac (;0;) (type 0) (param $n i32)
//!     local.get $n
//!     i32.eqz
//!     if
//!       i32.const 1
//!       return
//!     end
//!     local.get $n
//!     local.get $n
//!     i32.const 1
//!     i32.sub
//!     call $fac
//!     i32.mul)
//!   (export "fac" (func 0)))
//! ```
//!
//! A function body ends on the line where its parentheses balance; the `)`
//! that closes the function is not part of the last instruction.

pub mod error;
pub mod instruction;
pub mod module;
pub mod sexpr;

pub use error::ParseError;

use crate::runtime::Value;
use instruction::{decode, Index};
use log::{debug, warn};
use module::{Export, ExportKind, Function, GlobalDef, MemoryDef, Module, Param, ValueType};
use once_cell::sync::Lazy;
use regex::Regex;
use sexpr::SExpr;

/// Explicit index marker such as `(;3;)`
static INDEX_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(;\s*(\d+)\s*;\)").expect("index marker pattern"));

/// Leading keyword of a declaration line
static DECLARATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(\s*([a-z]+)\b").expect("declaration pattern"));

/// Load a module from source text
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let mut loader = Loader::default();
    for (index, line) in source.lines().enumerate() {
        loader.line(index + 1, line)?;
    }
    loader.finish()
}

#[derive(Default)]
struct Loader {
    module: Module,
    open: Option<OpenFunction>,
}

/// A function whose body is still being read
struct OpenFunction {
    function: Function,
    line: usize,
    /// Unmatched `(` including the one opening the function
    depth: usize,
    /// Signature groups seen so far; `None` once the first instruction arrives
    header: Option<Header>,
}

#[derive(Default)]
struct Header {
    type_ref: Option<u32>,
    params: Vec<Param>,
    result: Option<ValueType>,
}

impl Loader {
    fn line(&mut self, n: usize, raw: &str) -> Result<(), ParseError> {
        let marker = INDEX_MARKER
            .captures(raw)
            .and_then(|caps| caps[1].parse::<u32>().ok());
        let code = decode::strip_comments(raw);
        let code = code.trim();

        if self.open.is_some() {
            return self.function_text(n, code);
        }

        if code.is_empty() || code.starts_with(')') {
            return Ok(());
        }

        let Some(caps) = DECLARATION.captures(code) else {
            warn!("line {n}: skipping unrecognised text `{code}`");
            return Ok(());
        };
        let rest = &code[caps.get(0).map_or(0, |m| m.end())..];

        match &caps[1] {
            "module" => Ok(()),
            "type" => self.type_decl(n, code, marker),
            "func" => self.func_decl(n, rest, marker),
            "global" => self.global_decl(n, code),
            "memory" => self.memory_decl(n, code),
            "export" => self.export_decl(n, code),
            other => {
                warn!("line {n}: skipping unsupported declaration `{other}`");
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<Module, ParseError> {
        if let Some(open) = self.open {
            return Err(ParseError::new(
                open.line,
                format!("function {} is never closed", open.function.display_name()),
            ));
        }
        Ok(self.module)
    }

    fn type_decl(&mut self, n: usize, code: &str, marker: Option<u32>) -> Result<(), ParseError> {
        let decl = declaration(n, code)?;
        let func = decl
            .tail()
            .iter()
            .find(|item| item.head() == Some("func"))
            .ok_or_else(|| ParseError::new(n, "type declaration without a func signature"))?;

        let mut header = Header::default();
        for item in func.tail() {
            if !header.apply(n, item)? {
                return Err(ParseError::new(n, "unexpected item in type signature"));
            }
        }

        let index = marker.unwrap_or_else(|| self.module.types.keys().next_back().map_or(0, |last| last + 1));
        let ty = module::FunctionType {
            parameters: header.params.iter().map(|p| p.ty).collect(),
            result: header.result,
        };
        debug!("type {index}: {ty:?}");
        self.module.types.insert(index, ty);
        Ok(())
    }

    fn func_decl(&mut self, n: usize, rest: &str, marker: Option<u32>) -> Result<(), ParseError> {
        let index = marker.unwrap_or_else(|| self.module.next_function_index());
        if self.module.functions.contains_key(&index) {
            return Err(ParseError::new(n, format!("duplicate function index {index}")));
        }

        let mut function = Function::new(index);
        let mut rest = rest.trim_start();
        if rest.starts_with('$') {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                .unwrap_or(rest.len());
            function.name = Some(rest[..end].to_string());
            rest = rest[end..].trim_start();
        }

        self.open = Some(OpenFunction {
            function,
            line: n,
            depth: 1,
            header: Some(Header::default()),
        });
        self.function_text(n, rest)
    }

    /// Handle text inside an open function: signature groups, then instructions
    fn function_text(&mut self, n: usize, text: &str) -> Result<(), ParseError> {
        let in_header = self.open.as_ref().map_or(false, |open| open.header.is_some());
        if in_header && text.starts_with('(') && !text.starts_with("(local") {
            let fragment = sexpr::read(text).map_err(|e| ParseError::read(n, e))?;
            let mut body_from = None;
            for item in &fragment.items {
                if !self.header_item(n, item)? {
                    body_from = Some(item.offset());
                    break;
                }
            }
            return match (body_from, fragment.close) {
                (Some(offset), _) => {
                    self.seal_header(n)?;
                    self.body_text(n, &text[offset..])
                }
                (None, Some(_)) => self.close_function(n),
                (None, None) => Ok(()),
            };
        }

        if text.is_empty() {
            return Ok(());
        }
        self.seal_header(n)?;
        self.body_text(n, text)
    }

    /// Apply a signature group to the open function; false if `item` is not one
    fn header_item(&mut self, n: usize, item: &SExpr) -> Result<bool, ParseError> {
        if item.head() == Some("export") {
            let name = export_name(n, item)?;
            if let Some(open) = &self.open {
                self.module.exports.push(Export {
                    name,
                    kind: ExportKind::Func,
                    target: Index::Num(open.function.index),
                });
            }
            return Ok(true);
        }
        match self.open.as_mut().and_then(|open| open.header.as_mut()) {
            Some(header) => header.apply(n, item),
            None => Ok(false),
        }
    }

    /// Resolve the collected signature into the function's params and result
    fn seal_header(&mut self, n: usize) -> Result<(), ParseError> {
        let Some(open) = self.open.as_mut() else {
            return Ok(());
        };
        let Some(header) = open.header.take() else {
            return Ok(());
        };
        let function = &mut open.function;

        match header.type_ref {
            Some(type_index) => {
                let ty = self
                    .module
                    .types
                    .get(&type_index)
                    .ok_or_else(|| ParseError::new(n, format!("unknown type {type_index}")))?;
                if header.params.is_empty() {
                    function.params = ty.parameters.iter().map(|&ty| Param { name: None, ty }).collect();
                } else if header.params.iter().map(|p| p.ty).ne(ty.parameters.iter().copied()) {
                    return Err(ParseError::new(
                        n,
                        format!("parameters of {} do not match type {type_index}", function.display_name()),
                    ));
                } else {
                    function.params = header.params;
                }
                if header.result.is_some() && header.result != ty.result {
                    return Err(ParseError::new(
                        n,
                        format!("result of {} does not match type {type_index}", function.display_name()),
                    ));
                }
                function.result = ty.result;
            }
            None => {
                function.params = header.params;
                function.result = header.result;
            }
        }
        Ok(())
    }

    /// Decode instruction text, closing the function if its parentheses balance
    fn body_text(&mut self, n: usize, text: &str) -> Result<(), ParseError> {
        let Some(open) = self.open.as_mut() else {
            return Ok(());
        };

        let mut end = text.len();
        let mut closed = false;
        for (i, c) in text.char_indices() {
            match c {
                '(' => open.depth += 1,
                ')' => {
                    open.depth -= 1;
                    if open.depth == 0 {
                        end = i;
                        closed = true;
                        break;
                    }
                }
                _ => {}
            }
        }

        let instructions = decode::decode_line(&text[..end]).map_err(|e| ParseError::decode(n, e))?;
        open.function.body.extend(instructions);

        if closed {
            self.close_function(n)?;
        }
        Ok(())
    }

    fn close_function(&mut self, n: usize) -> Result<(), ParseError> {
        self.seal_header(n)?;
        if let Some(open) = self.open.take() {
            debug!(
                "function {} ({}): {} params, {} instructions",
                open.function.display_name(),
                open.function.index,
                open.function.params.len(),
                open.function.body.len()
            );
            self.module.add_function(open.function);
        }
        Ok(())
    }

    fn global_decl(&mut self, n: usize, code: &str) -> Result<(), ParseError> {
        let decl = declaration(n, code)?;
        let index = self.module.globals.len() as u32;
        let mut name = None;
        let mut ty = None;
        let mut mutable = false;
        let mut init = None;

        for item in decl.tail() {
            match (item, item.head()) {
                (SExpr::Atom { text, .. }, _) if text.starts_with('$') => name = Some(text.clone()),
                (SExpr::Atom { text, .. }, _) => ty = Some(value_type(n, text)?),
                (_, Some("mut")) => {
                    let inner = single_atom(n, item)?;
                    ty = Some(value_type(n, inner)?);
                    mutable = true;
                }
                (_, Some("export")) => self.module.exports.push(Export {
                    name: export_name(n, item)?,
                    kind: ExportKind::Global,
                    target: Index::Num(index),
                }),
                (_, Some(op)) if op.ends_with(".const") => init = Some(constant(n, op, single_atom(n, item)?)?),
                (_, Some(op)) => {
                    return Err(ParseError::new(n, format!("unsupported global initialiser `{op}`")));
                }
                _ => return Err(ParseError::new(n, "malformed global declaration")),
            }
        }

        let ty = ty.ok_or_else(|| ParseError::new(n, "global declaration without a type"))?;
        let init = init.ok_or_else(|| ParseError::new(n, "global declaration without an initialiser"))?;
        if init.typ() != ty {
            return Err(ParseError::new(
                n,
                format!("global initialiser of type {} for a {ty} global", init.typ()),
            ));
        }

        debug!("global {index} {name:?}: {ty} = {init}");
        self.module.globals.push(GlobalDef {
            name,
            ty,
            mutable,
            init,
        });
        Ok(())
    }

    fn memory_decl(&mut self, n: usize, code: &str) -> Result<(), ParseError> {
        if self.module.memory.is_some() {
            return Err(ParseError::new(n, "only one memory is supported"));
        }
        let decl = declaration(n, code)?;
        let mut limits = Vec::new();
        for item in decl.tail() {
            match (item, item.head()) {
                (SExpr::Atom { text, .. }, _) if text.starts_with('$') => {}
                (SExpr::Atom { text, .. }, _) => limits.push(page_count(n, text)?),
                (_, Some("export")) => self.module.exports.push(Export {
                    name: export_name(n, item)?,
                    kind: ExportKind::Memory,
                    target: Index::Num(0),
                }),
                _ => return Err(ParseError::new(n, "malformed memory declaration")),
            }
        }

        let memory = match limits[..] {
            [min] => MemoryDef { min, max: None },
            [min, max] => MemoryDef { min, max: Some(max) },
            _ => return Err(ParseError::new(n, "memory declaration needs a minimum and optional maximum")),
        };
        debug!("memory {memory:?}");
        self.module.memory = Some(memory);
        Ok(())
    }

    fn export_decl(&mut self, n: usize, code: &str) -> Result<(), ParseError> {
        let decl = declaration(n, code)?;
        let (name, desc) = match decl.tail() {
            [name, desc] => (name, desc),
            _ => return Err(ParseError::new(n, "malformed export declaration")),
        };
        let name = name
            .as_str()
            .ok_or_else(|| ParseError::new(n, "export name must be a string"))?;
        let kind = desc
            .head()
            .ok_or_else(|| ParseError::new(n, "malformed export descriptor"))?
            .parse::<ExportKind>()
            .map_err(|e: String| ParseError::new(n, e))?;
        let target = decode::index(single_atom(n, desc)?).map_err(|e| ParseError::decode(n, e))?;

        debug!("export \"{name}\" ({kind} {target})");
        self.module.exports.push(Export {
            name: name.to_string(),
            kind,
            target,
        });
        Ok(())
    }
}

impl Header {
    /// Record a `(type N)`, `(param ...)` or `(result ...)` group
    fn apply(&mut self, n: usize, item: &SExpr) -> Result<bool, ParseError> {
        match item.head() {
            Some("type") => {
                let index = single_atom(n, item)?;
                let index = index
                    .parse()
                    .map_err(|_| ParseError::new(n, format!("invalid type index `{index}`")))?;
                self.type_ref = Some(index);
            }
            Some("param") => match item.tail() {
                [SExpr::Atom { text: name, .. }, SExpr::Atom { text: ty, .. }] if name.starts_with('$') => {
                    self.params.push(Param {
                        name: Some(name.clone()),
                        ty: value_type(n, ty)?,
                    });
                }
                types => {
                    for ty in types {
                        let ty = ty
                            .as_atom()
                            .ok_or_else(|| ParseError::new(n, "malformed param group"))?;
                        self.params.push(Param {
                            name: None,
                            ty: value_type(n, ty)?,
                        });
                    }
                }
            },
            Some("result") => match item.tail() {
                [] => {}
                [ty] if self.result.is_none() => {
                    let ty = ty
                        .as_atom()
                        .ok_or_else(|| ParseError::new(n, "malformed result group"))?;
                    self.result = Some(value_type(n, ty)?);
                }
                _ => return Err(ParseError::new(n, "multiple results are not supported")),
            },
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Read a single-line declaration and return its list
fn declaration(n: usize, code: &str) -> Result<SExpr, ParseError> {
    let fragment = sexpr::read(code).map_err(|e| ParseError::read(n, e))?;
    fragment
        .items
        .into_iter()
        .next()
        .filter(|item| item.as_list().is_some())
        .ok_or_else(|| ParseError::new(n, "expected a declaration"))
}

fn single_atom(n: usize, item: &SExpr) -> Result<&str, ParseError> {
    match item.tail() {
        [SExpr::Atom { text, .. }] => Ok(text),
        _ => Err(ParseError::new(
            n,
            format!("`{}` expects a single operand", item.head().unwrap_or("?")),
        )),
    }
}

fn export_name(n: usize, item: &SExpr) -> Result<String, ParseError> {
    match item.tail() {
        [name] => name
            .as_str()
            .map(String::from)
            .ok_or_else(|| ParseError::new(n, "export name must be a string")),
        _ => Err(ParseError::new(n, "malformed inline export")),
    }
}

fn value_type(n: usize, text: &str) -> Result<ValueType, ParseError> {
    text.parse().map_err(|e: String| ParseError::new(n, e))
}

fn page_count(n: usize, text: &str) -> Result<u32, ParseError> {
    text.parse()
        .map_err(|_| ParseError::new(n, format!("invalid page count `{text}`")))
}

/// Evaluate a `t.const v` initialiser
fn constant(n: usize, op: &str, literal: &str) -> Result<Value, ParseError> {
    let value = match op {
        "i32.const" => decode::parse_i32(literal).map(Value::I32),
        "i64.const" => decode::parse_i64(literal).map(Value::I64),
        "f32.const" => decode::parse_f32(literal).map(Value::F32),
        "f64.const" => decode::parse_f64(literal).map(Value::F64),
        other => return Err(ParseError::new(n, format!("unknown constant `{other}`"))),
    };
    value.map_err(|e| ParseError::decode(n, e))
}

#[cfg(test)]
mod tests {
    use super::instruction::{Instruction, IntBinOp};
    use super::*;

    const FACTORIAL: &str = r#"
(module
  (type (;0;) (func (param i32) (result i32)))
  (global $counter (mut i32) (i32.const 0))
  (global $limit i64 (i64.const -5))
  (memory (;0;) 1 4)
  (func $fac (;0;) (type 0) (param $n i32)
    local.get $n
    i32.eqz
    if ;; base case
      i32.const 1
      return
    end
    local.get $n
    local.get $n
    i32.const 1
    i32.sub
    call $fac
    i32.mul)
  (export "fac" (func 0))
  (export "mem" (memory 0)))
"#;

    #[test]
    fn load_complete_module() {
        let module = parse(FACTORIAL).unwrap();

        assert_eq!(module.types[&0].parameters, vec![ValueType::I32]);
        assert_eq!(module.types[&0].result, Some(ValueType::I32));

        let fac = module.function_by_name("$fac").unwrap();
        assert_eq!(fac.index, 0);
        assert_eq!(fac.params.len(), 1);
        assert_eq!(fac.params[0].name.as_deref(), Some("$n"));
        assert_eq!(fac.result, Some(ValueType::I32));
        assert_eq!(fac.body.len(), 12);
        assert_eq!(fac.body.last(), Some(&Instruction::I32Binary(IntBinOp::Mul)));

        assert_eq!(module.globals.len(), 2);
        assert!(module.globals[0].mutable);
        assert_eq!(module.globals[1].init, Value::I64(-5));
        assert!(!module.globals[1].mutable);

        assert_eq!(module.memory, Some(MemoryDef { min: 1, max: Some(4) }));
        assert_eq!(module.exports.len(), 2);
        assert_eq!(module.exported_function("fac").unwrap().index, 0);
    }

    #[test]
    fn inline_signature_and_export() {
        let module = parse(
            r#"(module
  (func $add (export "add") (param $a i32) (param $b i32) (result i32)
    local.get $a
    local.get $b
    i32.add)
  (func (param i64 i64)
    (result i64)
    (local $tmp i64)
    local.get 0
    local.set $tmp
    local.get $tmp))"#,
        )
        .unwrap();

        let add = module.exported_function("add").unwrap();
        assert_eq!(add.params.len(), 2);
        assert_eq!(add.params[1].name.as_deref(), Some("$b"));
        assert_eq!(add.body.len(), 3);

        let anon = module.function_by_id(1).unwrap();
        assert_eq!(anon.name, None);
        assert_eq!(anon.params.len(), 2);
        assert_eq!(anon.result, Some(ValueType::I64));
        assert_eq!(
            anon.body[0],
            Instruction::Local {
                name: Some("$tmp".into()),
                ty: ValueType::I64
            }
        );
    }

    #[test]
    fn single_line_function() {
        let module = parse("(func $one (result i32) i32.const 1)\n(func $empty)").unwrap();
        assert_eq!(
            module.function_by_name("$one").unwrap().body,
            vec![Instruction::I32Const { value: 1 }]
        );
        assert!(module.function_by_name("$empty").unwrap().body.is_empty());
        assert_eq!(module.function_by_name("$empty").unwrap().index, 1);
    }

    #[test]
    fn unknown_instructions_decode() {
        let module = parse("(func $f\n  v128.any_true\n  nop)").unwrap();
        assert_eq!(
            module.function_by_name("$f").unwrap().body[0],
            Instruction::Unknown {
                mnemonic: "v128.any_true".into()
            }
        );
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = parse("(module\n  (func $f\n    i32.const zz)").unwrap_err();
        assert_eq!(err.line, 3);

        let err = parse("(module\n  (memory 1)\n  (memory 2))").unwrap_err();
        assert_eq!(err, ParseError::new(3, "only one memory is supported"));

        let err = parse("(global $g (mut v128) (i32.const 0))").unwrap_err();
        assert_eq!(err.line, 1);

        let err = parse("(global $g i32 (i64.const 0))").unwrap_err();
        assert!(err.message.contains("initialiser"));

        let err = parse("(func $f (type 9)\n  nop)").unwrap_err();
        assert_eq!(err.message, "unknown type 9");

        let err = parse("(module\n  (func $open\n    nop\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn duplicate_function_index() {
        let err = parse("(func (;0;))\n(func (;0;))").unwrap_err();
        assert_eq!(err, ParseError::new(2, "duplicate function index 0"));
    }

    #[test]
    fn signature_must_match_type() {
        let source = "(type (;0;) (func (param i32)))\n(func (type 0) (param f64)\n  nop)";
        let err = parse(source).unwrap_err();
        assert!(err.message.contains("do not match type 0"));
    }
}
