//! # was
//!
//! Command-line runner for textual WebAssembly modules.
//!
//! ```bash
//! was <file> [--invoke <name>]... [--dump <start:count>] [--max-call-depth <n>] [--fuel <n>] [--json]
//! ```
//!
//! Loads the module and invokes the named exports in order. Without
//! `--invoke`, every exported function taking no parameters is invoked in
//! export order. Diagnostics are logged; set `RUST_LOG` to see more than
//! warnings.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::Serialize;
use was::parser;
use was::runtime::{EngineConfig, Instance, Value};

/// Run functions of a textual WebAssembly module
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the module source
    file: PathBuf,

    /// Export to invoke; may be repeated
    #[arg(short, long = "invoke", value_name = "NAME")]
    invoke: Vec<String>,

    /// Print a hex dump of memory after running, e.g. `0:128`
    #[arg(short, long, value_name = "START:COUNT", value_parser = parse_range)]
    dump: Option<(usize, usize)>,

    /// Maximum call depth; 0 disables the limit
    #[arg(long, value_name = "N", default_value_t = 1024)]
    max_call_depth: usize,

    /// Maximum instructions per invocation
    #[arg(short, long, value_name = "N", env = "WAS_FUEL")]
    fuel: Option<u64>,

    /// Print one JSON object per invocation
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Outcome<'a> {
    export: &'a str,
    result: Option<Value>,
    diagnostics: Vec<String>,
    dropped_diagnostics: u64,
}

fn parse_range(text: &str) -> std::result::Result<(usize, usize), String> {
    let (start, count) = text
        .split_once(':')
        .ok_or_else(|| format!("expected START:COUNT, got `{text}`"))?;
    let number = |s: &str| {
        let s = s.trim();
        match s.strip_prefix("0x") {
            Some(hex) => usize::from_str_radix(hex, 16),
            None => s.parse::<usize>(),
        }
        .map_err(|e| format!("invalid number `{s}`: {e}"))
    };
    Ok((number(start)?, number(count)?))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let source = fs::read_to_string(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let module = parser::parse(&source).with_context(|| format!("loading {}", args.file.display()))?;
    info!(
        "loaded {}: {} functions, {} exports",
        args.file.display(),
        module.functions.len(),
        module.exports.len()
    );

    let config = EngineConfig::default()
        .with_max_call_depth(Some(args.max_call_depth).filter(|&depth| depth > 0))
        .with_instruction_budget(args.fuel);
    let mut instance = Instance::new(&module, config).context("instantiating module")?;

    let exports: Vec<String> = if args.invoke.is_empty() {
        instance
            .exported_functions()
            .into_iter()
            .filter(|name| module.exported_function(name).is_some_and(|f| f.params.is_empty()))
            .map(String::from)
            .collect()
    } else {
        args.invoke.clone()
    };
    if exports.is_empty() {
        warn!("nothing to invoke");
    }

    for export in &exports {
        let result = instance
            .invoke(export, Vec::new())
            .with_context(|| format!("invoking {export}"))?;
        let dropped = instance.dropped_diagnostics();
        if dropped > 0 {
            warn!("{export}: {dropped} further diagnostics were not kept");
        }
        let diagnostics: Vec<String> = instance.take_diagnostics().iter().map(ToString::to_string).collect();

        if args.json {
            let outcome = Outcome {
                export,
                result,
                diagnostics,
                dropped_diagnostics: dropped,
            };
            println!("{}", serde_json::to_string(&outcome)?);
        } else {
            match result {
                Some(value) => println!("{export} => {value}"),
                None => println!("{export} => (no result)"),
            }
        }
    }

    if let Some((start, count)) = args.dump {
        let dump = instance.memory().dump(start, count);
        if dump.is_empty() {
            bail!("dump start {start} is beyond the end of memory");
        }
        print!("{dump}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("0:128"), Ok((0, 128)));
        assert_eq!(parse_range("0x10:0x20"), Ok((16, 32)));
        assert!(parse_range("16").is_err());
        assert!(parse_range("a:1").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from(["was", "prog.wat", "-i", "_start", "--invoke", "_test_add", "--json"]);
        assert_eq!(args.invoke, vec!["_start", "_test_add"]);
        assert!(args.json);
        assert_eq!(args.max_call_depth, 1024);
        assert_eq!(args.dump, None);
    }
}
