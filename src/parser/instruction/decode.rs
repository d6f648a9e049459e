//! Decoding of instruction lines
//!
//! A function body is written one instruction per line: a mnemonic followed
//! by its inline operands, e.g. `i32.const -7`, `br_if $loop`,
//! `i64.load16_s offset=8 align=2`. Local declarations are the only
//! parenthesised form and may declare several locals at once:
//! `(local $a i32)` or `(local i32 i64 f64)`.

use super::{
    Conversion, FloatBinOp, FloatRelOp, FloatUnOp, Index, Instruction, IntBinOp, IntRelOp, IntUnOp, LoadOp,
    MemArg, StoreOp,
};
use crate::parser::module::ValueType;
use fhex::FromHex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("{mnemonic}: missing operand")]
    MissingOperand { mnemonic: String },
    #[error("{mnemonic}: unexpected operand `{token}`")]
    UnexpectedOperand { mnemonic: String, token: String },
    #[error("invalid integer literal `{0}`")]
    InvalidInteger(String),
    #[error("integer literal `{0}` out of range")]
    IntegerOutOfRange(String),
    #[error("invalid float literal `{0}`")]
    InvalidFloat(String),
    #[error("invalid index `{0}`")]
    InvalidIndex(String),
    #[error("invalid value type `{0}`")]
    InvalidType(String),
    #[error("invalid memory argument `{0}`")]
    InvalidMemArg(String),
    #[error("unbalanced declaration `{0}`")]
    Unbalanced(String),
}

/// Remove `;;` line comments and `(; ... ;)` inline comments
pub fn strip_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    loop {
        let block = rest.find("(;");
        let eol = rest.find(";;");
        match (block, eol) {
            (Some(b), e) if e.map_or(true, |e| b < e) => {
                out.push_str(&rest[..b]);
                match rest[b + 2..].find(";)") {
                    Some(close) => rest = &rest[b + 2 + close + 2..],
                    None => return out,
                }
            }
            (_, Some(e)) => {
                out.push_str(&rest[..e]);
                return out;
            }
            _ => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Decode one body line into zero or more instructions
///
/// Blank and comment-only lines decode to nothing. A `(local ...)`
/// declaration decodes to one [`Instruction::Local`] per declared type.
pub fn decode_line(line: &str) -> Result<Vec<Instruction>, DecodeError> {
    let code = strip_comments(line);
    let code = code.trim();
    if code.is_empty() {
        return Ok(Vec::new());
    }

    if let Some(decl) = code.strip_prefix("(local") {
        return decode_locals(decl);
    }

    let mut tokens = code.split_whitespace();
    let Some(mnemonic) = tokens.next() else {
        return Ok(Vec::new());
    };
    let operands: Vec<&str> = tokens.collect();
    decode_instruction(mnemonic, &operands).map(|inst| vec![inst])
}

fn decode_locals(decl: &str) -> Result<Vec<Instruction>, DecodeError> {
    let inner = decl
        .trim()
        .strip_suffix(')')
        .ok_or_else(|| DecodeError::Unbalanced(format!("(local{decl}")))?;
    let mut tokens = inner.split_whitespace().peekable();

    if let Some(name) = tokens.next_if(|t| t.starts_with('$')) {
        let ty = tokens
            .next()
            .ok_or_else(|| DecodeError::MissingOperand {
                mnemonic: "local".into(),
            })?;
        if let Some(extra) = tokens.next() {
            return Err(DecodeError::UnexpectedOperand {
                mnemonic: "local".into(),
                token: extra.into(),
            });
        }
        return Ok(vec![Instruction::Local {
            name: Some(name.to_string()),
            ty: value_type(ty)?,
        }]);
    }

    tokens
        .map(|ty| {
            Ok(Instruction::Local {
                name: None,
                ty: value_type(ty)?,
            })
        })
        .collect()
}

/// Decode a mnemonic and its operand tokens
pub fn decode_instruction(mnemonic: &str, operands: &[&str]) -> Result<Instruction, DecodeError> {
    use Instruction::*;

    let args = Operands { mnemonic, tokens: operands };

    let inst = match mnemonic {
        "nop" => args.none(Nop)?,
        "block" => Block { label: args.label() },
        "loop" => Loop { label: args.label() },
        "if" => If { label: args.label() },
        "else" => args.none(Else)?,
        "end" => args.none(End)?,
        "br" => Br { target: args.index()? },
        "br_if" => BrIf { target: args.index()? },
        "br_table" => {
            if operands.is_empty() {
                return Err(args.missing());
            }
            BrTable {
                targets: operands.iter().map(|t| index(t)).collect::<Result<_, _>>()?,
            }
        }
        "return" => args.none(Return)?,
        "call" => Call { target: args.index()? },
        "drop" => args.none(Drop)?,
        "select" => args.none(Select)?,
        "local.get" => LocalGet { local: args.index()? },
        "local.set" => LocalSet { local: args.index()? },
        "local.tee" => LocalTee { local: args.index()? },
        "global.get" => GlobalGet { global: args.index()? },
        "global.set" => GlobalSet { global: args.index()? },
        "memory.size" => args.none(MemorySize)?,
        "memory.grow" => args.none(MemoryGrow)?,
        "i32.const" => I32Const {
            value: parse_i32(args.single()?)?,
        },
        "i64.const" => I64Const {
            value: parse_i64(args.single()?)?,
        },
        "f32.const" => F32Const {
            value: parse_f32(args.single()?)?,
        },
        "f64.const" => F64Const {
            value: parse_f64(args.single()?)?,
        },
        "i32.eqz" => args.none(I32Eqz)?,
        "i64.eqz" => args.none(I64Eqz)?,
        _ => {
            if let Some(op) = LoadOp::from_name(mnemonic) {
                Load {
                    op,
                    memarg: memarg(mnemonic, operands)?,
                }
            } else if let Some(op) = StoreOp::from_name(mnemonic) {
                Store {
                    op,
                    memarg: memarg(mnemonic, operands)?,
                }
            } else if let Some(op) = Conversion::from_name(mnemonic) {
                args.none(Convert(op))?
            } else if let Some(inst) = decode_numeric(mnemonic) {
                args.none(inst)?
            } else {
                Unknown {
                    mnemonic: mnemonic.to_string(),
                }
            }
        }
    };
    Ok(inst)
}

/// Typed numeric opcodes of the form `<type>.<op>`
fn decode_numeric(mnemonic: &str) -> Option<Instruction> {
    use Instruction::*;

    let (class, op) = mnemonic.split_once('.')?;
    match class {
        "i32" => IntBinOp::from_name(op)
            .map(I32Binary)
            .or_else(|| IntRelOp::from_name(op).map(I32Compare))
            .or_else(|| IntUnOp::from_name(op).map(I32Unary)),
        "i64" => IntBinOp::from_name(op)
            .map(I64Binary)
            .or_else(|| IntRelOp::from_name(op).map(I64Compare))
            .or_else(|| IntUnOp::from_name(op).map(I64Unary)),
        "f32" => FloatBinOp::from_name(op)
            .map(F32Binary)
            .or_else(|| FloatRelOp::from_name(op).map(F32Compare))
            .or_else(|| FloatUnOp::from_name(op).map(F32Unary)),
        "f64" => FloatBinOp::from_name(op)
            .map(F64Binary)
            .or_else(|| FloatRelOp::from_name(op).map(F64Compare))
            .or_else(|| FloatUnOp::from_name(op).map(F64Unary)),
        _ => None,
    }
}

struct Operands<'a> {
    mnemonic: &'a str,
    tokens: &'a [&'a str],
}

impl<'a> Operands<'a> {
    fn missing(&self) -> DecodeError {
        DecodeError::MissingOperand {
            mnemonic: self.mnemonic.to_string(),
        }
    }

    fn unexpected(&self, token: &str) -> DecodeError {
        DecodeError::UnexpectedOperand {
            mnemonic: self.mnemonic.to_string(),
            token: token.to_string(),
        }
    }

    fn none(&self, inst: Instruction) -> Result<Instruction, DecodeError> {
        match self.tokens.first() {
            Some(token) => Err(self.unexpected(token)),
            None => Ok(inst),
        }
    }

    fn single(&self) -> Result<&'a str, DecodeError> {
        match self.tokens {
            [] => Err(self.missing()),
            [token] => Ok(token),
            [_, extra, ..] => Err(self.unexpected(extra)),
        }
    }

    fn index(&self) -> Result<Index, DecodeError> {
        index(self.single()?)
    }

    // Block types such as `(result i32)` that follow the label are accepted and ignored
    fn label(&self) -> Option<String> {
        self.tokens
            .first()
            .filter(|t| t.starts_with('$'))
            .map(|t| t.to_string())
    }
}

fn value_type(token: &str) -> Result<ValueType, DecodeError> {
    token
        .parse()
        .map_err(|_| DecodeError::InvalidType(token.to_string()))
}

/// Parse a `$name` or a non-negative decimal index
pub fn index(token: &str) -> Result<Index, DecodeError> {
    if token.starts_with('$') && token.len() > 1 {
        return Ok(Index::Id(token.to_string()));
    }
    token
        .replace('_', "")
        .parse::<u32>()
        .map(Index::Num)
        .map_err(|_| DecodeError::InvalidIndex(token.to_string()))
}

fn memarg(mnemonic: &str, operands: &[&str]) -> Result<MemArg, DecodeError> {
    let mut arg = MemArg::default();
    for token in operands {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| DecodeError::UnexpectedOperand {
                mnemonic: mnemonic.to_string(),
                token: token.to_string(),
            })?;
        let value = parse_unsigned(value).ok_or_else(|| DecodeError::InvalidMemArg(token.to_string()))?;
        let value = u32::try_from(value).map_err(|_| DecodeError::InvalidMemArg(token.to_string()))?;
        match key {
            "offset" => arg.offset = value,
            "align" => arg.align = Some(value),
            _ => return Err(DecodeError::InvalidMemArg(token.to_string())),
        }
    }
    Ok(arg)
}

/// Parse an unsigned decimal or `0x` hex magnitude, allowing `_` separators
fn parse_unsigned(text: &str) -> Option<u128> {
    let digits = text.replace('_', "");
    if digits.is_empty() {
        return None;
    }
    match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u128::from_str_radix(hex, 16).ok(),
        None => digits.parse().ok(),
    }
}

/// Parse a signed integer literal into its magnitude and sign
fn parse_signed(text: &str) -> Result<i128, DecodeError> {
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = parse_unsigned(body).ok_or_else(|| DecodeError::InvalidInteger(text.to_string()))?;
    let magnitude = i128::try_from(magnitude).map_err(|_| DecodeError::IntegerOutOfRange(text.to_string()))?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Parse an i32 literal; values up to `u32::MAX` wrap into the signed range
pub fn parse_i32(text: &str) -> Result<i32, DecodeError> {
    let value = parse_signed(text)?;
    if value < i32::MIN as i128 || value > u32::MAX as i128 {
        return Err(DecodeError::IntegerOutOfRange(text.to_string()));
    }
    Ok(value as u32 as i32)
}

/// Parse an i64 literal; values up to `u64::MAX` wrap into the signed range
pub fn parse_i64(text: &str) -> Result<i64, DecodeError> {
    let value = parse_signed(text)?;
    if value < i64::MIN as i128 || value > u64::MAX as i128 {
        return Err(DecodeError::IntegerOutOfRange(text.to_string()));
    }
    Ok(value as u64 as i64)
}

macro_rules! parse_float {
    ($name:ident, $float:ty, $bits:ty, $exp_mask:expr, $payload_mask:expr, $sign:expr) => {
        pub fn $name(text: &str) -> Result<$float, DecodeError> {
            let invalid = || DecodeError::InvalidFloat(text.to_string());
            let (negative, body) = match text.as_bytes().first() {
                Some(b'-') => (true, &text[1..]),
                Some(b'+') => (false, &text[1..]),
                _ => (false, text),
            };
            let body = body.replace('_', "");
            let sign: $bits = if negative { $sign } else { 0 };

            let value = if body == "inf" {
                <$float>::INFINITY
            } else if body == "nan" {
                // canonical quiet NaN: only the top payload bit set
                return Ok(<$float>::from_bits(sign | $exp_mask | (($payload_mask >> 1) + 1)));
            } else if let Some(payload) = body.strip_prefix("nan:0x") {
                let payload = <$bits>::from_str_radix(payload, 16).map_err(|_| invalid())?;
                if payload == 0 || payload & !$payload_mask != 0 {
                    return Err(invalid());
                }
                return Ok(<$float>::from_bits(sign | $exp_mask | payload));
            } else if body.starts_with("0x") || body.starts_with("0X") {
                <$float>::from_hex(&body).ok_or_else(invalid)?
            } else {
                body.parse::<$float>().map_err(|_| invalid())?
            };

            Ok(if negative { -value } else { value })
        }
    };
}

parse_float!(parse_f32, f32, u32, 0x7f80_0000, 0x007f_ffff, 0x8000_0000);
parse_float!(
    parse_f64,
    f64,
    u64,
    0x7ff0_0000_0000_0000,
    0x000f_ffff_ffff_ffff,
    0x8000_0000_0000_0000
);

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(line: &str) -> Instruction {
        let mut insts = decode_line(line).unwrap();
        assert_eq!(insts.len(), 1, "expected one instruction from {line:?}");
        insts.remove(0)
    }

    #[test]
    fn comments_are_stripped() {
        assert_eq!(strip_comments("i32.add ;; sum"), "i32.add ");
        assert_eq!(strip_comments("(; n ;) i32.const 1"), " i32.const 1");
        assert_eq!(strip_comments("(; unterminated"), "");
        assert!(decode_line("   ;; nothing here").unwrap().is_empty());
    }

    #[test]
    fn integer_constants() {
        assert_eq!(decode("i32.const 42"), Instruction::I32Const { value: 42 });
        assert_eq!(decode("i32.const -1"), Instruction::I32Const { value: -1 });
        assert_eq!(decode("i32.const 0xffffffff"), Instruction::I32Const { value: -1 });
        assert_eq!(decode("i32.const 4294967295"), Instruction::I32Const { value: -1 });
        assert_eq!(decode("i32.const 1_000"), Instruction::I32Const { value: 1000 });
        assert_eq!(
            decode("i64.const 0x8000000000000000"),
            Instruction::I64Const { value: i64::MIN }
        );
        assert_eq!(
            decode_line("i32.const 4294967296"),
            Err(DecodeError::IntegerOutOfRange("4294967296".into()))
        );
        assert_eq!(
            decode_line("i32.const abc"),
            Err(DecodeError::InvalidInteger("abc".into()))
        );
    }

    #[test]
    fn float_constants() {
        assert_eq!(decode("f32.const 1.5"), Instruction::F32Const { value: 1.5 });
        assert_eq!(decode("f64.const -0.25"), Instruction::F64Const { value: -0.25 });
        assert_eq!(decode("f64.const 0x1.8p+1"), Instruction::F64Const { value: 3.0 });
        assert_eq!(
            decode("f32.const -inf"),
            Instruction::F32Const {
                value: f32::NEG_INFINITY
            }
        );
        match decode("f64.const nan") {
            Instruction::F64Const { value } => assert!(value.is_nan()),
            other => panic!("unexpected {other:?}"),
        }
        match decode("f32.const nan:0x200000") {
            Instruction::F32Const { value } => assert_eq!(value.to_bits(), 0x7fa0_0000),
            other => panic!("unexpected {other:?}"),
        }
        assert!(decode_line("f32.const one").is_err());
    }

    #[test]
    fn typed_numeric_families() {
        assert_eq!(decode("i32.add"), Instruction::I32Binary(IntBinOp::Add));
        assert_eq!(decode("i64.rotr"), Instruction::I64Binary(IntBinOp::Rotr));
        assert_eq!(decode("f32.copysign"), Instruction::F32Binary(FloatBinOp::Copysign));
        assert_eq!(decode("i64.ge_u"), Instruction::I64Compare(IntRelOp::GeU));
        assert_eq!(decode("f64.ne"), Instruction::F64Compare(FloatRelOp::Ne));
        assert_eq!(decode("i32.popcnt"), Instruction::I32Unary(IntUnOp::Popcnt));
        assert_eq!(decode("f64.nearest"), Instruction::F64Unary(FloatUnOp::Nearest));
        assert_eq!(decode("i64.eqz"), Instruction::I64Eqz);
        assert_eq!(
            decode("i64.extend_i32_u"),
            Instruction::Convert(Conversion::I64ExtendI32U)
        );
        // float-only ops do not exist on integer classes
        assert_eq!(
            decode("i32.sqrt"),
            Instruction::Unknown {
                mnemonic: "i32.sqrt".into()
            }
        );
    }

    #[test]
    fn control_operands() {
        assert_eq!(
            decode("block $outer"),
            Instruction::Block {
                label: Some("$outer".into())
            }
        );
        assert_eq!(decode("loop (result i32)"), Instruction::Loop { label: None });
        assert_eq!(
            decode("br_if 1"),
            Instruction::BrIf {
                target: Index::Num(1)
            }
        );
        assert_eq!(
            decode("br_table 0 1 $done"),
            Instruction::BrTable {
                targets: vec![Index::Num(0), Index::Num(1), Index::Id("$done".into())]
            }
        );
        assert_eq!(
            decode("call $fac"),
            Instruction::Call {
                target: Index::Id("$fac".into())
            }
        );
        assert_eq!(
            decode_line("br"),
            Err(DecodeError::MissingOperand { mnemonic: "br".into() })
        );
        assert_eq!(
            decode_line("drop 1"),
            Err(DecodeError::UnexpectedOperand {
                mnemonic: "drop".into(),
                token: "1".into()
            })
        );
    }

    #[test]
    fn local_declarations() {
        assert_eq!(
            decode_line("(local $sum i64)").unwrap(),
            vec![Instruction::Local {
                name: Some("$sum".into()),
                ty: ValueType::I64
            }]
        );
        assert_eq!(
            decode_line("(local i32 f64)").unwrap(),
            vec![
                Instruction::Local {
                    name: None,
                    ty: ValueType::I32
                },
                Instruction::Local {
                    name: None,
                    ty: ValueType::F64
                },
            ]
        );
        assert_eq!(
            decode_line("(local $x v128)"),
            Err(DecodeError::InvalidType("v128".into()))
        );
        assert!(decode_line("(local $x i32").is_err());
    }

    #[test]
    fn memory_arguments() {
        assert_eq!(
            decode("i32.store16 offset=0x10 align=2"),
            Instruction::Store {
                op: StoreOp::I32Store16,
                memarg: MemArg {
                    offset: 16,
                    align: Some(2)
                }
            }
        );
        assert_eq!(
            decode("f64.load"),
            Instruction::Load {
                op: LoadOp::F64Load,
                memarg: MemArg::default()
            }
        );
        assert!(decode_line("i32.load bogus=1").is_err());
        assert!(decode_line("i32.load offset=4294967296").is_err());
    }

    #[test]
    fn unknown_mnemonics_are_not_errors() {
        assert_eq!(
            decode("v128.const"),
            Instruction::Unknown {
                mnemonic: "v128.const".into()
            }
        );
    }
}
