//! Instruction handlers for the x86e VM.
//!
//! Every handler has the [`InstructionFn`] signature: it receives the
//! memory, the current register state and the instruction, and returns the
//! next state. Handlers never touch the program or the syscall machinery;
//! `syscall` is dispatched by the VM itself.
//!
//! Two-operand instructions work at a single width, taken from whichever
//! operand carries one (`eax`, `dword ptr [...]`). Immediates are truncated
//! to that width.

use x86e_common::{Instruction, Mnemonic, Operand, State, Width};

use crate::memory::{Memory, MemoryError};

pub mod arith;
pub mod call;
pub mod jump;
pub mod mov;
pub mod stack;

/// Error type for instruction execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstructionExecutionError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
    #[error("Invalid operand in '{0}'")]
    InvalidOperand(String),
    #[error("Operand size of '{0}' cannot be determined")]
    AmbiguousWidth(String),
    #[error("Operand sizes of '{0}' do not match")]
    WidthMismatch(String),
    #[error("Both operands of '{0}' are memory references")]
    MemoryToMemory(String),
    #[error("Wrong number of operands in '{0}'")]
    OperandCount(String),
    #[error("No handler for '{0}'")]
    Unsupported(Mnemonic),
}

pub type InstructionFn =
    fn(&mut Memory, State, &Instruction) -> Result<State, InstructionExecutionError>;

/// Maps a mnemonic to its corresponding instruction handler function.
///
/// ## Errors
///
/// Returns [`InstructionExecutionError::Unsupported`] for `syscall`, which
/// needs the kernel and output streams and is executed by the VM.
pub fn mnemonic_to_instruction_fn(
    mnemonic: Mnemonic,
) -> Result<InstructionFn, InstructionExecutionError> {
    let f: InstructionFn = match mnemonic {
        Mnemonic::Mov => mov::mov,
        Mnemonic::Nop => mov::nop,
        Mnemonic::Add => arith::add,
        Mnemonic::Sub => arith::sub,
        Mnemonic::Cmp => arith::cmp,
        Mnemonic::And => arith::and,
        Mnemonic::Or => arith::or,
        Mnemonic::Xor => arith::xor,
        Mnemonic::Shl => arith::shl,
        Mnemonic::Shr => arith::shr,
        Mnemonic::Push => stack::push,
        Mnemonic::Pop => stack::pop,
        Mnemonic::Call => call::call,
        Mnemonic::Ret => call::ret,
        Mnemonic::Jmp => jump::jmp,
        Mnemonic::Je
        | Mnemonic::Jne
        | Mnemonic::Jge
        | Mnemonic::Jl
        | Mnemonic::Jg
        | Mnemonic::Jle => jump::jcc,
        Mnemonic::Syscall => return Err(InstructionExecutionError::Unsupported(mnemonic)),
    };
    Ok(f)
}

/// The single operand of `instruction`.
pub(crate) fn unary(instruction: &Instruction) -> Result<&Operand, InstructionExecutionError> {
    match instruction.operands.as_slice() {
        [operand] => Ok(operand),
        _ => Err(InstructionExecutionError::OperandCount(
            instruction.to_string(),
        )),
    }
}

/// The destination and source operands of `instruction`.
pub(crate) fn binary(
    instruction: &Instruction,
) -> Result<(&Operand, &Operand), InstructionExecutionError> {
    match instruction.operands.as_slice() {
        [dst, src] => Ok((dst, src)),
        _ => Err(InstructionExecutionError::OperandCount(
            instruction.to_string(),
        )),
    }
}

/// The width shared by the two operands of `instruction`.
pub(crate) fn operand_width(
    instruction: &Instruction,
    dst: &Operand,
    src: &Operand,
) -> Result<Width, InstructionExecutionError> {
    match (dst.width(), src.width()) {
        (Some(a), Some(b)) if a != b => Err(InstructionExecutionError::WidthMismatch(
            instruction.to_string(),
        )),
        (Some(width), _) | (None, Some(width)) => Ok(width),
        (None, None) => Err(InstructionExecutionError::AmbiguousWidth(
            instruction.to_string(),
        )),
    }
}

/// Reads an operand at `width`, zero-extended to 64 bits.
pub(crate) fn read_operand(
    memory: &Memory,
    state: &State,
    operand: &Operand,
    width: Width,
) -> Result<u64, InstructionExecutionError> {
    match operand {
        Operand::Register(view) => Ok(state.read(*view) & width.mask()),
        Operand::Immediate(value) => Ok(*value as u64 & width.mask()),
        Operand::Memory(reference) => Ok(memory.read(reference.address(state), width)?),
        Operand::Label { .. } => Err(InstructionExecutionError::InvalidOperand(
            operand.to_string(),
        )),
    }
}

/// Writes `value` to a register or memory operand at `width`.
pub(crate) fn write_operand(
    memory: &mut Memory,
    state: &mut State,
    operand: &Operand,
    width: Width,
    value: u64,
) -> Result<(), InstructionExecutionError> {
    match operand {
        Operand::Register(view) => {
            state.write(*view, value);
            Ok(())
        }
        Operand::Memory(reference) => {
            let address = reference.address(state);
            Ok(memory.write(address, value, width)?)
        }
        Operand::Immediate(_) | Operand::Label { .. } => Err(
            InstructionExecutionError::InvalidOperand(operand.to_string()),
        ),
    }
}
