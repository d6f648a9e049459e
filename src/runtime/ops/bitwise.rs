//! Bitwise operations
//!
//! and/or/xor, shifts and rotates, and the bit-counting unary operators.
//! Shift and rotate counts are masked to the operand's bit width.

use super::*;
use crate::parser::instruction::{IntBinOp, IntUnOp};

macro_rules! int_bitwise {
    ($binary:ident, $unary:ident, $t:ty, $ut:ty, $pop:ident) => {
        /// Apply a bitwise binary operator; `None` for the arithmetic ones
        pub fn $binary(c1: $t, c2: $t, op: IntBinOp) -> Option<$t> {
            let bits = <$t>::BITS;
            let shift = (c2 as u32) & (bits - 1);
            let result = match op {
                IntBinOp::And => c1 & c2,
                IntBinOp::Or => c1 | c2,
                IntBinOp::Xor => c1 ^ c2,
                IntBinOp::Shl => c1.wrapping_shl(shift),
                IntBinOp::ShrS => c1.wrapping_shr(shift),
                IntBinOp::ShrU => ((c1 as $ut) >> shift) as $t,
                IntBinOp::Rotl => c1.rotate_left(shift),
                IntBinOp::Rotr => c1.rotate_right(shift),
                _ => return None,
            };
            Some(result)
        }

        /// clz, ctz and popcnt; counts of zero report the full bit width
        pub fn $unary(stack: &mut Stack, op: IntUnOp) -> OpResult {
            let value = stack.$pop()?;
            let count = match op {
                IntUnOp::Clz => value.leading_zeros(),
                IntUnOp::Ctz => value.trailing_zeros(),
                IntUnOp::Popcnt => value.count_ones(),
            };
            stack.push(count as $t);
            Ok(None)
        }
    };
}

int_bitwise!(i32_binary, i32_unary, i32, u32, pop_i32);
int_bitwise!(i64_binary, i64_unary, i64, u64, pop_i64);
