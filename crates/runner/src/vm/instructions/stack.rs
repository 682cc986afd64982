//! Stack instructions.
//!
//! The stack grows down from the top of memory and every slot is 8 bytes,
//! whatever the operand width.

use x86e_common::{Instruction, Operand, Register, State, Width};

use super::{read_operand, unary, write_operand, InstructionExecutionError};
use crate::memory::Memory;
use crate::vm::state::VmState;

const SLOT: u64 = 8;

/// Decrements `rsp` by one slot and stores `value` at the new top.
pub(crate) fn push_value(
    memory: &mut Memory,
    state: &mut State,
    value: u64,
) -> Result<(), InstructionExecutionError> {
    let rsp = state.rsp().wrapping_sub(SLOT);
    memory.write(rsp, value, Width::Qword)?;
    state.set(Register::Rsp, rsp);
    Ok(())
}

/// Loads the slot at the top of the stack and increments `rsp`.
pub(crate) fn pop_value(
    memory: &Memory,
    state: &mut State,
) -> Result<u64, InstructionExecutionError> {
    let rsp = state.rsp();
    let value = memory.read(rsp, Width::Qword)?;
    state.set(Register::Rsp, rsp.wrapping_add(SLOT));
    Ok(value)
}

/// `push src`
pub fn push(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    let src = unary(instruction)?;
    let width = src.width().unwrap_or(Width::Qword);
    let value = match src {
        // `push imm` sign-extends to 64 bits.
        Operand::Immediate(imm) => *imm as u64,
        _ => read_operand(memory, &state, src, width)?,
    };

    let mut next = state;
    push_value(memory, &mut next, value)?;
    Ok(next.advance())
}

/// `pop dst`
pub fn pop(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    let dst = unary(instruction)?;
    let width = dst.width().unwrap_or(Width::Qword);

    let mut next = state;
    let value = pop_value(memory, &mut next)?;
    write_operand(memory, &mut next, dst, width, value)?;
    Ok(next.advance())
}

#[cfg(test)]
#[path = "./stack_tests.rs"]
mod stack_tests;
