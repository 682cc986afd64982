//! Data movement.

use x86e_common::{Instruction, Operand, State};

use super::{binary, operand_width, read_operand, write_operand, InstructionExecutionError};
use crate::memory::Memory;
use crate::vm::state::VmState;

/// `mov dst, src`
///
/// Copies `src` into `dst` at their shared width. Flags are not affected.
/// A 32-bit register destination clears the upper half of the register.
pub fn mov(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    let (dst, src) = binary(instruction)?;
    if matches!((dst, src), (Operand::Memory(_), Operand::Memory(_))) {
        return Err(InstructionExecutionError::MemoryToMemory(
            instruction.to_string(),
        ));
    }
    let width = operand_width(instruction, dst, src)?;
    let value = read_operand(memory, &state, src, width)?;

    let mut next = state;
    write_operand(memory, &mut next, dst, width, value)?;
    Ok(next.advance())
}

/// `nop`
pub fn nop(
    _memory: &mut Memory,
    state: State,
    _instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    Ok(state.advance())
}

#[cfg(test)]
#[path = "./mov_tests.rs"]
mod mov_tests;
