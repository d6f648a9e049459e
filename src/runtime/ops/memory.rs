//! Memory operations
//!
//! Loads pop an i32 address; stores pop the value and then the address. The
//! address is treated as unsigned and the static offset is added without
//! wrapping, so every access is bounds-checked against the full effective
//! address.

use super::*;
use crate::parser::instruction::{LoadOp, StoreOp};

fn effective_address(addr: i32, memarg: &MemArg) -> u64 {
    addr as u32 as u64 + memarg.offset as u64
}

pub fn load(stack: &mut Stack, memory: &Memory, op: LoadOp, memarg: &MemArg) -> OpResult {
    let ea = effective_address(stack.pop_i32()?, memarg);
    let value = match op {
        LoadOp::I32Load => Value::I32(memory.read_i32(ea)?),
        LoadOp::I64Load => Value::I64(memory.read_i64(ea)?),
        LoadOp::F32Load => Value::F32(memory.read_f32(ea)?),
        LoadOp::F64Load => Value::F64(memory.read_f64(ea)?),
        LoadOp::I32Load8S => Value::I32(memory.read_i8(ea)? as i32),
        LoadOp::I32Load8U => Value::I32(memory.read_u8(ea)? as i32),
        LoadOp::I32Load16S => Value::I32(memory.read_i16(ea)? as i32),
        LoadOp::I32Load16U => Value::I32(memory.read_u16(ea)? as i32),
        LoadOp::I64Load8S => Value::I64(memory.read_i8(ea)? as i64),
        LoadOp::I64Load8U => Value::I64(memory.read_u8(ea)? as i64),
        LoadOp::I64Load16S => Value::I64(memory.read_i16(ea)? as i64),
        LoadOp::I64Load16U => Value::I64(memory.read_u16(ea)? as i64),
        LoadOp::I64Load32S => Value::I64(memory.read_i32(ea)? as i64),
        LoadOp::I64Load32U => Value::I64(memory.read_u32(ea)? as i64),
    };
    stack.push(value);
    Ok(None)
}

pub fn store(stack: &mut Stack, memory: &mut Memory, op: StoreOp, memarg: &MemArg) -> OpResult {
    let value = stack.pop_typed(op.value_type())?;
    let ea = effective_address(stack.pop_i32()?, memarg);
    match (op, value) {
        (StoreOp::I32Store, Value::I32(v)) => memory.write_u32(ea, v as u32)?,
        (StoreOp::I32Store8, Value::I32(v)) => memory.write_u8(ea, v as u8)?,
        (StoreOp::I32Store16, Value::I32(v)) => memory.write_u16(ea, v as u16)?,
        (StoreOp::I64Store, Value::I64(v)) => memory.write_u64(ea, v as u64)?,
        (StoreOp::I64Store8, Value::I64(v)) => memory.write_u8(ea, v as u8)?,
        (StoreOp::I64Store16, Value::I64(v)) => memory.write_u16(ea, v as u16)?,
        (StoreOp::I64Store32, Value::I64(v)) => memory.write_u32(ea, v as u32)?,
        (StoreOp::F32Store, Value::F32(v)) => memory.write_f32(ea, v)?,
        (StoreOp::F64Store, Value::F64(v)) => memory.write_f64(ea, v)?,
        // pop_typed has already checked the value type
        _ => {}
    }
    Ok(None)
}

/// memory.size: push the current size in pages
pub fn size(stack: &mut Stack, memory: &Memory) -> OpResult {
    stack.push(memory.size_in_pages() as i32);
    Ok(None)
}

/// memory.grow: push the previous size in pages, or -1 on failure
pub fn grow(stack: &mut Stack, memory: &mut Memory) -> OpResult {
    let delta = stack.pop_i32()?;
    stack.push(memory.grow(delta));
    Ok(None)
}
