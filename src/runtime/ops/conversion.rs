//! Conversion operations
//!
//! Wrap, extend, promote/demote, truncate, convert and reinterpret. A
//! conversion applied to an operand of the wrong type is not fatal: it is
//! reported and skipped, leaving the operand stack untouched.
//!
//! Float to integer truncation saturates: NaN becomes 0 and out-of-range
//! values clamp to the target type's bounds.

use super::*;
use crate::parser::instruction::Conversion;

pub fn convert(stack: &mut Stack, op: Conversion) -> OpResult {
    let expected = op.source_type();
    let actual = stack.peek()?.typ();
    if actual != expected {
        return Ok(Some(Diagnostic::TypeMismatch {
            opcode: op.name().to_string(),
            expected,
            actual,
        }));
    }

    let value = stack.pop()?;
    stack.push(apply(op, value));
    Ok(None)
}

/// Convert an operand already known to have the source type
fn apply(op: Conversion, value: Value) -> Value {
    use Conversion::*;

    match (op, value) {
        (I32WrapI64, Value::I64(v)) => Value::I32(v as i32),
        (I64ExtendI32S, Value::I32(v)) => Value::I64(v as i64),
        (I64ExtendI32U, Value::I32(v)) => Value::I64(v as u32 as i64),
        (I32Extend8S, Value::I32(v)) => Value::I32(v as i8 as i32),
        (I32Extend16S, Value::I32(v)) => Value::I32(v as i16 as i32),
        (I64Extend8S, Value::I64(v)) => Value::I64(v as i8 as i64),
        (I64Extend16S, Value::I64(v)) => Value::I64(v as i16 as i64),
        (I64Extend32S, Value::I64(v)) => Value::I64(v as i32 as i64),

        (F32DemoteF64, Value::F64(v)) => Value::F32(v as f32),
        (F64PromoteF32, Value::F32(v)) => Value::F64(v as f64),

        // `as` from float to int saturates and maps NaN to 0
        (I32TruncF32S, Value::F32(v)) => Value::I32(v as i32),
        (I32TruncF32U, Value::F32(v)) => Value::I32(v as u32 as i32),
        (I32TruncF64S, Value::F64(v)) => Value::I32(v as i32),
        (I32TruncF64U, Value::F64(v)) => Value::I32(v as u32 as i32),
        (I64TruncF32S, Value::F32(v)) => Value::I64(v as i64),
        (I64TruncF32U, Value::F32(v)) => Value::I64(v as u64 as i64),
        (I64TruncF64S, Value::F64(v)) => Value::I64(v as i64),
        (I64TruncF64U, Value::F64(v)) => Value::I64(v as u64 as i64),

        (F32ConvertI32S, Value::I32(v)) => Value::F32(v as f32),
        (F32ConvertI32U, Value::I32(v)) => Value::F32(v as u32 as f32),
        (F32ConvertI64S, Value::I64(v)) => Value::F32(v as f32),
        (F32ConvertI64U, Value::I64(v)) => Value::F32(v as u64 as f32),
        (F64ConvertI32S, Value::I32(v)) => Value::F64(v as f64),
        (F64ConvertI32U, Value::I32(v)) => Value::F64(v as u32 as f64),
        (F64ConvertI64S, Value::I64(v)) => Value::F64(v as f64),
        (F64ConvertI64U, Value::I64(v)) => Value::F64(v as u64 as f64),

        (I32ReinterpretF32, Value::F32(v)) => Value::I32(v.to_bits() as i32),
        (I64ReinterpretF64, Value::F64(v)) => Value::I64(v.to_bits() as i64),
        (F32ReinterpretI32, Value::I32(v)) => Value::F32(f32::from_bits(v as u32)),
        (F64ReinterpretI64, Value::I64(v)) => Value::F64(f64::from_bits(v as u64)),

        // source type is checked by the caller
        (_, other) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::instruction::Instruction;
    use crate::parser::module::ValueType;
    use crate::runtime::test_utils::test::ExecutorTest;

    #[test]
    fn wrap_and_extend() {
        ExecutorTest::new()
            .inst(Instruction::I64Const { value: 0x1_0000_0005 })
            .inst(Instruction::Convert(Conversion::I32WrapI64))
            .inst(Instruction::I32Const { value: -1 })
            .inst(Instruction::Convert(Conversion::I64ExtendI32U))
            .inst(Instruction::I32Const { value: -1 })
            .inst(Instruction::Convert(Conversion::I64ExtendI32S))
            .expect_stack(vec![Value::I32(5), Value::I64(0xFFFF_FFFF), Value::I64(-1)]);
    }

    #[test]
    fn in_place_sign_extension() {
        ExecutorTest::new()
            .inst(Instruction::I32Const { value: 0x80 })
            .inst(Instruction::Convert(Conversion::I32Extend8S))
            .inst(Instruction::I32Const { value: 0x7FFF })
            .inst(Instruction::Convert(Conversion::I32Extend16S))
            .inst(Instruction::I64Const { value: 0x8000_0000 })
            .inst(Instruction::Convert(Conversion::I64Extend32S))
            .expect_stack(vec![Value::I32(-128), Value::I32(0x7FFF), Value::I64(-0x8000_0000)]);
    }

    #[test]
    fn truncation_saturates() {
        ExecutorTest::new()
            .inst(Instruction::F32Const { value: f32::NAN })
            .inst(Instruction::Convert(Conversion::I32TruncF32S))
            .inst(Instruction::F64Const { value: 1e20 })
            .inst(Instruction::Convert(Conversion::I32TruncF64S))
            .inst(Instruction::F64Const { value: -3.9 })
            .inst(Instruction::Convert(Conversion::I32TruncF64U))
            .inst(Instruction::F64Const { value: -3.9 })
            .inst(Instruction::Convert(Conversion::I64TruncF64S))
            .expect_stack(vec![Value::I32(0), Value::I32(i32::MAX), Value::I32(0), Value::I64(-3)]);
    }

    #[test]
    fn int_to_float() {
        ExecutorTest::new()
            .inst(Instruction::I32Const { value: -1 })
            .inst(Instruction::Convert(Conversion::F64ConvertI32U))
            .inst(Instruction::I64Const { value: -2 })
            .inst(Instruction::Convert(Conversion::F32ConvertI64S))
            .expect_stack(vec![Value::F64(4294967295.0), Value::F32(-2.0)]);
    }

    #[test]
    fn promote_and_demote() {
        ExecutorTest::new()
            .inst(Instruction::F32Const { value: 1.5 })
            .inst(Instruction::Convert(Conversion::F64PromoteF32))
            .inst(Instruction::F64Const { value: 0.25 })
            .inst(Instruction::Convert(Conversion::F32DemoteF64))
            .expect_stack(vec![Value::F64(1.5), Value::F32(0.25)]);
    }

    #[test]
    fn reinterpret_preserves_bits() {
        ExecutorTest::new()
            .inst(Instruction::F32Const { value: 1.0 })
            .inst(Instruction::Convert(Conversion::I32ReinterpretF32))
            .inst(Instruction::I64Const { value: 0x4000_0000_0000_0000 })
            .inst(Instruction::Convert(Conversion::F64ReinterpretI64))
            .expect_stack(vec![Value::I32(0x3F80_0000), Value::F64(2.0)]);
    }

    #[test]
    fn mismatch_is_skipped() {
        ExecutorTest::new()
            .inst(Instruction::F32Const { value: 2.0 })
            .inst(Instruction::Convert(Conversion::I32WrapI64))
            .expect_diagnostic(Diagnostic::TypeMismatch {
                opcode: "i32.wrap_i64".into(),
                expected: ValueType::I64,
                actual: ValueType::F32,
            })
            .expect_stack(vec![Value::F32(2.0)]);
    }

    #[test]
    fn conversion_on_empty_stack_is_fatal() {
        ExecutorTest::new()
            .inst(Instruction::Convert(Conversion::F64PromoteF32))
            .expect_error("Stack underflow");
    }
}
