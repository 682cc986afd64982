//! Unconditional and conditional jumps.
//!
//! Conditional jumps read the flags left by the last `cmp` (or arithmetic
//! instruction) and use the signed conditions.

use x86e_common::{Flags, Instruction, Mnemonic, Operand, State};

use super::{unary, InstructionExecutionError};
use crate::memory::Memory;
use crate::vm::state::VmState;

fn label_target(instruction: &Instruction) -> Result<usize, InstructionExecutionError> {
    match unary(instruction)? {
        Operand::Label { target, .. } => Ok(*target),
        _ => Err(InstructionExecutionError::InvalidOperand(
            instruction.to_string(),
        )),
    }
}

/// Whether the branch of a conditional jump is taken.
///
/// Returns `None` for mnemonics that are not conditional jumps.
pub const fn condition(mnemonic: Mnemonic, flags: Flags) -> Option<bool> {
    let taken = match mnemonic {
        Mnemonic::Je => flags.zf,
        Mnemonic::Jne => !flags.zf,
        Mnemonic::Jge => flags.sf == flags.of,
        Mnemonic::Jl => flags.sf != flags.of,
        Mnemonic::Jg => !flags.zf && flags.sf == flags.of,
        Mnemonic::Jle => flags.zf || flags.sf != flags.of,
        _ => return None,
    };
    Some(taken)
}

/// `jmp label`
pub fn jmp(
    _memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    Ok(state.jump(label_target(instruction)?))
}

/// `je`, `jne`, `jge`, `jl`, `jg` and `jle`.
pub fn jcc(
    _memory: &mut Memory,
    state: State,
    instruction: &Instruction,
) -> Result<State, InstructionExecutionError> {
    let target = label_target(instruction)?;
    match condition(instruction.mnemonic, state.flags) {
        Some(true) => Ok(state.jump(target)),
        Some(false) => Ok(state.advance()),
        None => Err(InstructionExecutionError::Unsupported(instruction.mnemonic)),
    }
}

#[cfg(test)]
#[path = "./jump_tests.rs"]
mod jump_tests;
