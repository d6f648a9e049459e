//! Numeric operations
//!
//! Integer arithmetic wraps on overflow. Integer division and remainder by
//! zero produce 0 and a [`Diagnostic::DivideByZero`] instead of trapping.
//! Float arithmetic follows IEEE 754, with `min`/`max` propagating NaN and
//! ordering -0 below +0.

use super::*;
use crate::parser::instruction::{FloatBinOp, FloatUnOp, IntBinOp};

macro_rules! int_binary {
    ($name:ident, $t:ty, $ut:ty, $pop:ident, $bitwise:path, $class:literal) => {
        pub fn $name(stack: &mut Stack, op: IntBinOp) -> OpResult {
            let c2 = stack.$pop()?;
            let c1 = stack.$pop()?;
            let result = match op {
                IntBinOp::Add => c1.wrapping_add(c2),
                IntBinOp::Sub => c1.wrapping_sub(c2),
                IntBinOp::Mul => c1.wrapping_mul(c2),
                IntBinOp::DivS | IntBinOp::DivU | IntBinOp::RemS | IntBinOp::RemU if c2 == 0 => {
                    stack.push(0 as $t);
                    return Ok(Some(Diagnostic::DivideByZero {
                        opcode: format!("{}.{}", $class, op.name()),
                    }));
                }
                IntBinOp::DivS => c1.wrapping_div(c2),
                IntBinOp::DivU => ((c1 as $ut) / (c2 as $ut)) as $t,
                IntBinOp::RemS => c1.wrapping_rem(c2),
                IntBinOp::RemU => ((c1 as $ut) % (c2 as $ut)) as $t,
                _ => match $bitwise(c1, c2, op) {
                    Some(result) => result,
                    None => unreachable!("{} is arithmetic", op.name()),
                },
            };
            stack.push(result);
            Ok(None)
        }
    };
}

int_binary!(i32_binary, i32, u32, pop_i32, super::bitwise::i32_binary, "i32");
int_binary!(i64_binary, i64, u64, pop_i64, super::bitwise::i64_binary, "i64");

macro_rules! float_ops {
    ($binary:ident, $unary:ident, $t:ty, $pop:ident) => {
        pub fn $binary(stack: &mut Stack, op: FloatBinOp) -> OpResult {
            let c2 = stack.$pop()?;
            let c1 = stack.$pop()?;
            let result = match op {
                FloatBinOp::Add => c1 + c2,
                FloatBinOp::Sub => c1 - c2,
                FloatBinOp::Mul => c1 * c2,
                FloatBinOp::Div => c1 / c2,
                FloatBinOp::Min => {
                    if c1.is_nan() || c2.is_nan() {
                        <$t>::NAN
                    } else if c1 == c2 {
                        // distinguishes -0 from +0
                        if c1.is_sign_negative() { c1 } else { c2 }
                    } else {
                        c1.min(c2)
                    }
                }
                FloatBinOp::Max => {
                    if c1.is_nan() || c2.is_nan() {
                        <$t>::NAN
                    } else if c1 == c2 {
                        if c1.is_sign_positive() { c1 } else { c2 }
                    } else {
                        c1.max(c2)
                    }
                }
                FloatBinOp::Copysign => c1.copysign(c2),
            };
            stack.push(result);
            Ok(None)
        }

        pub fn $unary(stack: &mut Stack, op: FloatUnOp) -> OpResult {
            let value = stack.$pop()?;
            let result = match op {
                FloatUnOp::Abs => value.abs(),
                FloatUnOp::Neg => -value,
                FloatUnOp::Sqrt => value.sqrt(),
                FloatUnOp::Ceil => value.ceil(),
                FloatUnOp::Floor => value.floor(),
                FloatUnOp::Trunc => value.trunc(),
                FloatUnOp::Nearest => value.round_ties_even(),
            };
            stack.push(result);
            Ok(None)
        }
    };
}

float_ops!(f32_binary, f32_unary, f32, pop_f32);
float_ops!(f64_binary, f64_unary, f64, pop_f64);
