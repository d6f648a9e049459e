//! Instruction representation
//!
//! Instructions are decoded once by the loader from their textual mnemonic and
//! operand tokens into a closed enum. The runtime dispatches with a `match`
//! over [`Instruction`] and never looks at text again.
//!
//! Numeric opcodes are grouped per type class: an `i32.add` is
//! `Instruction::I32Binary(IntBinOp::Add)`, an `f64.lt` is
//! `Instruction::F64Compare(FloatRelOp::Lt)`, and so on, so each family is
//! implemented once for integers and once for floats.

pub mod decode;

pub use decode::{decode_line, DecodeError};

use super::module::ValueType;
use fhex::ToHex;
use std::fmt;

/// Defines a fieldless opcode enum with its textual name and a reverse lookup
macro_rules! opcode_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn from_name(text: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|op| op.name() == text)
            }
        }
    };
}

opcode_enum!(
    /// Integer binary operators shared by i32 and i64
    IntBinOp {
        Add => "add",
        Sub => "sub",
        Mul => "mul",
        DivS => "div_s",
        DivU => "div_u",
        RemS => "rem_s",
        RemU => "rem_u",
        And => "and",
        Or => "or",
        Xor => "xor",
        Shl => "shl",
        ShrS => "shr_s",
        ShrU => "shr_u",
        Rotl => "rotl",
        Rotr => "rotr",
    }
);

opcode_enum!(
    /// Float binary operators shared by f32 and f64
    FloatBinOp {
        Add => "add",
        Sub => "sub",
        Mul => "mul",
        Div => "div",
        Min => "min",
        Max => "max",
        Copysign => "copysign",
    }
);

opcode_enum!(
    /// Integer comparisons, all producing an i32 0/1
    IntRelOp {
        Eq => "eq",
        Ne => "ne",
        LtS => "lt_s",
        LtU => "lt_u",
        GtS => "gt_s",
        GtU => "gt_u",
        LeS => "le_s",
        LeU => "le_u",
        GeS => "ge_s",
        GeU => "ge_u",
    }
);

opcode_enum!(
    FloatRelOp {
        Eq => "eq",
        Ne => "ne",
        Lt => "lt",
        Gt => "gt",
        Le => "le",
        Ge => "ge",
    }
);

opcode_enum!(
    IntUnOp {
        Clz => "clz",
        Ctz => "ctz",
        Popcnt => "popcnt",
    }
);

opcode_enum!(
    FloatUnOp {
        Abs => "abs",
        Neg => "neg",
        Sqrt => "sqrt",
        Ceil => "ceil",
        Floor => "floor",
        Trunc => "trunc",
        Nearest => "nearest",
    }
);

opcode_enum!(
    /// Conversion opcodes, named by their full mnemonic
    Conversion {
        I32WrapI64 => "i32.wrap_i64",
        I64ExtendI32S => "i64.extend_i32_s",
        I64ExtendI32U => "i64.extend_i32_u",
        I32Extend8S => "i32.extend8_s",
        I32Extend16S => "i32.extend16_s",
        I64Extend8S => "i64.extend8_s",
        I64Extend16S => "i64.extend16_s",
        I64Extend32S => "i64.extend32_s",
        F32DemoteF64 => "f32.demote_f64",
        F64PromoteF32 => "f64.promote_f32",
        I32TruncF32S => "i32.trunc_f32_s",
        I32TruncF32U => "i32.trunc_f32_u",
        I32TruncF64S => "i32.trunc_f64_s",
        I32TruncF64U => "i32.trunc_f64_u",
        I64TruncF32S => "i64.trunc_f32_s",
        I64TruncF32U => "i64.trunc_f32_u",
        I64TruncF64S => "i64.trunc_f64_s",
        I64TruncF64U => "i64.trunc_f64_u",
        F32ConvertI32S => "f32.convert_i32_s",
        F32ConvertI32U => "f32.convert_i32_u",
        F32ConvertI64S => "f32.convert_i64_s",
        F32ConvertI64U => "f32.convert_i64_u",
        F64ConvertI32S => "f64.convert_i32_s",
        F64ConvertI32U => "f64.convert_i32_u",
        F64ConvertI64S => "f64.convert_i64_s",
        F64ConvertI64U => "f64.convert_i64_u",
        I32ReinterpretF32 => "i32.reinterpret_f32",
        I64ReinterpretF64 => "i64.reinterpret_f64",
        F32ReinterpretI32 => "f32.reinterpret_i32",
        F64ReinterpretI64 => "f64.reinterpret_i64",
    }
);

opcode_enum!(
    LoadOp {
        I32Load => "i32.load",
        I64Load => "i64.load",
        F32Load => "f32.load",
        F64Load => "f64.load",
        I32Load8S => "i32.load8_s",
        I32Load8U => "i32.load8_u",
        I32Load16S => "i32.load16_s",
        I32Load16U => "i32.load16_u",
        I64Load8S => "i64.load8_s",
        I64Load8U => "i64.load8_u",
        I64Load16S => "i64.load16_s",
        I64Load16U => "i64.load16_u",
        I64Load32S => "i64.load32_s",
        I64Load32U => "i64.load32_u",
    }
);

opcode_enum!(
    StoreOp {
        I32Store => "i32.store",
        I64Store => "i64.store",
        F32Store => "f32.store",
        F64Store => "f64.store",
        I32Store8 => "i32.store8",
        I32Store16 => "i32.store16",
        I64Store8 => "i64.store8",
        I64Store16 => "i64.store16",
        I64Store32 => "i64.store32",
    }
);

impl Conversion {
    /// The operand type this conversion consumes
    pub fn source_type(&self) -> ValueType {
        use Conversion::*;
        match self {
            I32Extend8S | I32Extend16S | I64ExtendI32S | I64ExtendI32U | F32ConvertI32S
            | F32ConvertI32U | F64ConvertI32S | F64ConvertI32U | F32ReinterpretI32 => ValueType::I32,
            I32WrapI64 | I64Extend8S | I64Extend16S | I64Extend32S | F32ConvertI64S | F32ConvertI64U
            | F64ConvertI64S | F64ConvertI64U | F64ReinterpretI64 => ValueType::I64,
            F64PromoteF32 | I32TruncF32S | I32TruncF32U | I64TruncF32S | I64TruncF32U
            | I32ReinterpretF32 => ValueType::F32,
            F32DemoteF64 | I32TruncF64S | I32TruncF64U | I64TruncF64S | I64TruncF64U
            | I64ReinterpretF64 => ValueType::F64,
        }
    }
}

impl LoadOp {
    /// Number of bytes read from memory
    pub fn width(&self) -> usize {
        use LoadOp::*;
        match self {
            I32Load8S | I32Load8U | I64Load8S | I64Load8U => 1,
            I32Load16S | I32Load16U | I64Load16S | I64Load16U => 2,
            I32Load | F32Load | I64Load32S | I64Load32U => 4,
            I64Load | F64Load => 8,
        }
    }
}

impl StoreOp {
    /// Number of bytes written to memory
    pub fn width(&self) -> usize {
        use StoreOp::*;
        match self {
            I32Store8 | I64Store8 => 1,
            I32Store16 | I64Store16 => 2,
            I32Store | F32Store | I64Store32 => 4,
            I64Store | F64Store => 8,
        }
    }

    /// The type of the value operand
    pub fn value_type(&self) -> ValueType {
        use StoreOp::*;
        match self {
            I32Store | I32Store8 | I32Store16 => ValueType::I32,
            I64Store | I64Store8 | I64Store16 | I64Store32 => ValueType::I64,
            F32Store => ValueType::F32,
            F64Store => ValueType::F64,
        }
    }
}

/// A numeric index or a `$name`, used for locals, globals, functions and labels
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Index {
    Num(u32),
    Id(String),
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::Num(idx) => write!(f, "{idx}"),
            Index::Id(name) => write!(f, "{name}"),
        }
    }
}

/// Static offset and alignment hint of a memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemArg {
    pub offset: u32,
    pub align: Option<u32>,
}

/// A decoded instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // Control instructions
    Nop,
    Block { label: Option<String> },
    Loop { label: Option<String> },
    If { label: Option<String> },
    Else,
    End,
    Br { target: Index },
    BrIf { target: Index },
    BrTable { targets: Vec<Index> },
    Return,
    Call { target: Index },

    // Parametric instructions
    Drop,
    Select,

    // Variable instructions
    Local { name: Option<String>, ty: ValueType },
    LocalGet { local: Index },
    LocalSet { local: Index },
    LocalTee { local: Index },
    GlobalGet { global: Index },
    GlobalSet { global: Index },

    // Memory instructions
    Load { op: LoadOp, memarg: MemArg },
    Store { op: StoreOp, memarg: MemArg },
    MemorySize,
    MemoryGrow,

    // Numeric instructions
    I32Const { value: i32 },
    I64Const { value: i64 },
    F32Const { value: f32 },
    F64Const { value: f64 },
    I32Eqz,
    I64Eqz,
    I32Unary(IntUnOp),
    I64Unary(IntUnOp),
    F32Unary(FloatUnOp),
    F64Unary(FloatUnOp),
    I32Binary(IntBinOp),
    I64Binary(IntBinOp),
    F32Binary(FloatBinOp),
    F64Binary(FloatBinOp),
    I32Compare(IntRelOp),
    I64Compare(IntRelOp),
    F32Compare(FloatRelOp),
    F64Compare(FloatRelOp),
    Convert(Conversion),

    /// A mnemonic the decoder does not know; reported and skipped at runtime
    Unknown { mnemonic: String },
}

impl Instruction {
    /// The textual mnemonic of this instruction
    pub fn mnemonic(&self) -> String {
        use Instruction::*;
        match self {
            Nop => "nop".into(),
            Block { .. } => "block".into(),
            Loop { .. } => "loop".into(),
            If { .. } => "if".into(),
            Else => "else".into(),
            End => "end".into(),
            Br { .. } => "br".into(),
            BrIf { .. } => "br_if".into(),
            BrTable { .. } => "br_table".into(),
            Return => "return".into(),
            Call { .. } => "call".into(),
            Drop => "drop".into(),
            Select => "select".into(),
            Local { .. } => "local".into(),
            LocalGet { .. } => "local.get".into(),
            LocalSet { .. } => "local.set".into(),
            LocalTee { .. } => "local.tee".into(),
            GlobalGet { .. } => "global.get".into(),
            GlobalSet { .. } => "global.set".into(),
            Load { op, .. } => op.name().into(),
            Store { op, .. } => op.name().into(),
            MemorySize => "memory.size".into(),
            MemoryGrow => "memory.grow".into(),
            I32Const { .. } => "i32.const".into(),
            I64Const { .. } => "i64.const".into(),
            F32Const { .. } => "f32.const".into(),
            F64Const { .. } => "f64.const".into(),
            I32Eqz => "i32.eqz".into(),
            I64Eqz => "i64.eqz".into(),
            I32Unary(op) => format!("i32.{}", op.name()),
            I64Unary(op) => format!("i64.{}", op.name()),
            F32Unary(op) => format!("f32.{}", op.name()),
            F64Unary(op) => format!("f64.{}", op.name()),
            I32Binary(op) => format!("i32.{}", op.name()),
            I64Binary(op) => format!("i64.{}", op.name()),
            F32Binary(op) => format!("f32.{}", op.name()),
            F64Binary(op) => format!("f64.{}", op.name()),
            I32Compare(op) => format!("i32.{}", op.name()),
            I64Compare(op) => format!("i64.{}", op.name()),
            F32Compare(op) => format!("f32.{}", op.name()),
            F64Compare(op) => format!("f64.{}", op.name()),
            Convert(op) => op.name().into(),
            Unknown { mnemonic } => mnemonic.clone(),
        }
    }

    /// Whether this instruction opens a construct closed by a matching `end`
    pub fn opens_block(&self) -> bool {
        matches!(
            self,
            Instruction::Block { .. } | Instruction::Loop { .. } | Instruction::If { .. }
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        if let Local { name, ty } = self {
            return match name {
                Some(name) => write!(f, "(local {name} {ty})"),
                None => write!(f, "(local {ty})"),
            };
        }

        write!(f, "{}", self.mnemonic())?;

        match self {
            Block { label: Some(label) } | Loop { label: Some(label) } | If { label: Some(label) } => {
                write!(f, " {label}")
            }
            Br { target } | BrIf { target } => write!(f, " {target}"),
            BrTable { targets } => {
                for target in targets {
                    write!(f, " {target}")?;
                }
                Ok(())
            }
            Call { target } => write!(f, " {target}"),
            LocalGet { local } | LocalSet { local } | LocalTee { local } => write!(f, " {local}"),
            GlobalGet { global } | GlobalSet { global } => write!(f, " {global}"),
            Load { memarg, .. } | Store { memarg, .. } => {
                if memarg.offset != 0 {
                    write!(f, " offset={}", memarg.offset)?;
                }
                if let Some(align) = memarg.align {
                    write!(f, " align={align}")?;
                }
                Ok(())
            }
            I32Const { value } => write!(f, " {value}"),
            I64Const { value } => write!(f, " {value}"),
            F32Const { value } => write!(f, " {}", value.to_hex()),
            F64Const { value } => write!(f, " {}", value.to_hex()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_names_round_trip() {
        for op in IntBinOp::ALL {
            assert_eq!(IntBinOp::from_name(op.name()), Some(*op));
        }
        assert_eq!(Conversion::from_name("f64.promote_f32"), Some(Conversion::F64PromoteF32));
        assert_eq!(LoadOp::from_name("i64.load32_u"), Some(LoadOp::I64Load32U));
        assert_eq!(FloatUnOp::from_name("bogus"), None);
    }

    #[test]
    fn mnemonics_include_type_class() {
        assert_eq!(Instruction::I32Binary(IntBinOp::ShrU).mnemonic(), "i32.shr_u");
        assert_eq!(Instruction::F64Compare(FloatRelOp::Ge).mnemonic(), "f64.ge");
        assert_eq!(Instruction::Convert(Conversion::I32WrapI64).mnemonic(), "i32.wrap_i64");
        assert_eq!(
            Instruction::Unknown {
                mnemonic: "v128.const".into()
            }
            .mnemonic(),
            "v128.const"
        );
    }

    #[test]
    fn display_operands() {
        let br = Instruction::BrTable {
            targets: vec![Index::Num(0), Index::Id("$exit".into())],
        };
        assert_eq!(br.to_string(), "br_table 0 $exit");

        let load = Instruction::Load {
            op: LoadOp::I32Load8U,
            memarg: MemArg { offset: 4, align: None },
        };
        assert_eq!(load.to_string(), "i32.load8_u offset=4");

        let local = Instruction::Local {
            name: Some("$tmp".into()),
            ty: ValueType::I64,
        };
        assert_eq!(local.to_string(), "(local $tmp i64)");
    }

    #[test]
    fn conversion_source_types() {
        assert_eq!(Conversion::I32WrapI64.source_type(), ValueType::I64);
        assert_eq!(Conversion::F32ReinterpretI32.source_type(), ValueType::I32);
        assert_eq!(Conversion::I64TruncF32U.source_type(), ValueType::F32);
        assert_eq!(Conversion::F32DemoteF64.source_type(), ValueType::F64);
    }

    #[test]
    fn access_widths() {
        assert_eq!(LoadOp::I64Load16S.width(), 2);
        assert_eq!(LoadOp::F64Load.width(), 8);
        assert_eq!(StoreOp::I64Store32.width(), 4);
        assert_eq!(StoreOp::I64Store32.value_type(), ValueType::I64);
    }
}
