//! Arithmetic, logic and shift instructions.
//!
//! All of them compute at the destination width and update the status
//! flags. `cmp` is `sub` without the write-back.
//!
//! Flag conventions:
//! - `add`/`sub`/`cmp` set all of `zf sf cf of`.
//! - `and`/`or`/`xor` set `zf sf` and clear `cf of`.
//! - `shl`/`shr` set `zf sf`, put the last bit shifted out in `cf` and clear
//!   `of`. A zero shift count leaves the flags untouched.

use x86e_common::{Flags, Instruction, State, Width};

use super::{binary, operand_width, read_operand, write_operand, InstructionExecutionError};
use crate::memory::Memory;
use crate::vm::state::VmState;

type BinaryOp = fn(u64, u64, Width) -> (u64, Flags);

/// Adds two values of the given width.
pub(crate) fn add_with_flags(a: u64, b: u64, width: Width) -> (u64, Flags) {
    let mask = width.mask();
    let sign = width.sign_bit();
    let (a, b) = (a & mask, b & mask);
    let full = u128::from(a) + u128::from(b);
    let result = full as u64 & mask;

    let mut flags = Flags::from_result(result, width);
    flags.cf = full > u128::from(mask);
    flags.of = (a & sign) == (b & sign) && (result & sign) != (a & sign);
    (result, flags)
}

/// Subtracts `b` from `a` at the given width.
pub(crate) fn sub_with_flags(a: u64, b: u64, width: Width) -> (u64, Flags) {
    let mask = width.mask();
    let sign = width.sign_bit();
    let (a, b) = (a & mask, b & mask);
    let result = a.wrapping_sub(b) & mask;

    let mut flags = Flags::from_result(result, width);
    flags.cf = a < b;
    flags.of = (a & sign) != (b & sign) && (result & sign) != (a & sign);
    (result, flags)
}

fn and_with_flags(a: u64, b: u64, width: Width) -> (u64, Flags) {
    let result = a & b & width.mask();
    (result, Flags::from_result(result, width))
}

fn or_with_flags(a: u64, b: u64, width: Width) -> (u64, Flags) {
    let result = (a | b) & width.mask();
    (result, Flags::from_result(result, width))
}

fn xor_with_flags(a: u64, b: u64, width: Width) -> (u64, Flags) {
    let result = (a ^ b) & width.mask();
    (result, Flags::from_result(result, width))
}

/// Runs `op` on the destination and source, optionally storing the result.
fn binary_op(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
    op: BinaryOp,
    store: bool,
) -> Result<State, InstructionExecutionError> {
    let (dst, src) = binary(instruction)?;
    let width = operand_width(instruction, dst, src)?;
    let a = read_operand(memory, &state, dst, width)?;
    let b = read_operand(memory, &state, src, width)?;
    let (result, flags) = op(a, b, width);

    let mut next = state;
    if store {
        write_operand(memory, &mut next, dst, width, result)?;
    }
    Ok(next.with_flags(flags).advance())
}

/// `add dst, src`
pub fn add(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    binary_op(memory, state, instruction, add_with_flags, true)
}

/// `sub dst, src`
pub fn sub(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    binary_op(memory, state, instruction, sub_with_flags, true)
}

/// `cmp a, b`: sets the flags of `a - b`.
pub fn cmp(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    binary_op(memory, state, instruction, sub_with_flags, false)
}

pub fn and(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    binary_op(memory, state, instruction, and_with_flags, true)
}

pub fn or(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    binary_op(memory, state, instruction, or_with_flags, true)
}

pub fn xor(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    binary_op(memory, state, instruction, xor_with_flags, true)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ShiftDirection {
    Left,
    Right,
}

/// Shifts the destination by an immediate or `cl` count.
///
/// The count is masked to 6 bits for qword operands and 5 bits otherwise.
fn shift(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
    direction: ShiftDirection,
) -> Result<State, InstructionExecutionError> {
    let (dst, src) = binary(instruction)?;
    let width = dst
        .width()
        .ok_or_else(|| InstructionExecutionError::AmbiguousWidth(instruction.to_string()))?;
    let count_mask = if width == Width::Qword { 0x3f } else { 0x1f };
    let count = read_operand(memory, &state, src, Width::Byte)? & count_mask;
    if count == 0 {
        return Ok(state.advance());
    }

    let value = read_operand(memory, &state, dst, width)?;
    let bits = u64::from(width.bits());
    let (result, carry) = match direction {
        ShiftDirection::Left => {
            let carry = count <= bits && (value >> (bits - count)) & 1 == 1;
            ((value << count) & width.mask(), carry)
        }
        ShiftDirection::Right => {
            let carry = count <= bits && (value >> (count - 1)) & 1 == 1;
            let result = if count >= bits { 0 } else { value >> count };
            (result, carry)
        }
    };

    let mut flags = Flags::from_result(result, width);
    flags.cf = carry;

    let mut next = state;
    write_operand(memory, &mut next, dst, width, result)?;
    Ok(next.with_flags(flags).advance())
}

/// `shl dst, count`
pub fn shl(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    shift(memory, state, instruction, ShiftDirection::Left)
}

/// `shr dst, count`: logical right shift.
pub fn shr(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    shift(memory, state, instruction, ShiftDirection::Right)
}

#[cfg(test)]
#[path = "./arith_tests.rs"]
mod arith_tests;
