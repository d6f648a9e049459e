//! Comparison operations
//!
//! All comparisons push an i32 0 or 1. Float comparisons with a NaN operand
//! are false except `ne`.

use super::*;
use crate::parser::instruction::{FloatRelOp, IntRelOp};

macro_rules! int_compare {
    ($eqz:ident, $compare:ident, $ut:ty, $pop:ident) => {
        pub fn $eqz(stack: &mut Stack) -> OpResult {
            let value = stack.$pop()?;
            stack.push(value == 0);
            Ok(None)
        }

        pub fn $compare(stack: &mut Stack, op: IntRelOp) -> OpResult {
            let c2 = stack.$pop()?;
            let c1 = stack.$pop()?;
            let (u1, u2) = (c1 as $ut, c2 as $ut);
            let result = match op {
                IntRelOp::Eq => c1 == c2,
                IntRelOp::Ne => c1 != c2,
                IntRelOp::LtS => c1 < c2,
                IntRelOp::LtU => u1 < u2,
                IntRelOp::GtS => c1 > c2,
                IntRelOp::GtU => u1 > u2,
                IntRelOp::LeS => c1 <= c2,
                IntRelOp::LeU => u1 <= u2,
                IntRelOp::GeS => c1 >= c2,
                IntRelOp::GeU => u1 >= u2,
            };
            stack.push(result);
            Ok(None)
        }
    };
}

int_compare!(i32_eqz, i32_compare, u32, pop_i32);
int_compare!(i64_eqz, i64_compare, u64, pop_i64);

macro_rules! float_compare {
    ($name:ident, $pop:ident) => {
        pub fn $name(stack: &mut Stack, op: FloatRelOp) -> OpResult {
            let c2 = stack.$pop()?;
            let c1 = stack.$pop()?;
            let result = match op {
                FloatRelOp::Eq => c1 == c2,
                FloatRelOp::Ne => c1 != c2,
                FloatRelOp::Lt => c1 < c2,
                FloatRelOp::Gt => c1 > c2,
                FloatRelOp::Le => c1 <= c2,
                FloatRelOp::Ge => c1 >= c2,
            };
            stack.push(result);
            Ok(None)
        }
    };
}

float_compare!(f32_compare, pop_f32);
float_compare!(f64_compare, pop_f64);
