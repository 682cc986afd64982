//! Procedure calls.

use x86e_common::{Instruction, Operand, Register, State};

use super::stack::{pop_value, push_value};
use super::{unary, InstructionExecutionError};
use crate::memory::Memory;
use crate::vm::state::VmState;

/// `call label`
///
/// Pushes the index of the next instruction and jumps to `label`.
pub fn call(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    let Operand::Label { target, .. } = unary(instruction)? else {
        return Err(InstructionExecutionError::InvalidOperand(
            instruction.to_string(),
        ));
    };

    let return_address = state.rip() as u64 + 1;
    let mut next = state;
    push_value(memory, &mut next, return_address)?;
    Ok(next.jump(*target))
}

/// `ret`
///
/// Pops the return address into `rip`.
pub fn ret(
    memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    if !instruction.operands.is_empty() {
        return Err(InstructionExecutionError::OperandCount(
            instruction.to_string(),
        ));
    }

    let mut next = state;
    let return_address = pop_value(memory, &mut next)?;
    next.set(Register::Rip, return_address);
    Ok(next)
}

#[cfg(test)]
#[path = "./call_tests.rs"]
mod call_tests;
