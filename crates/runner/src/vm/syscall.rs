//! System call emulation.
//!
//! The syscall number is read from `rax` and decoded with the program's
//! [`Kernel`] table. Arguments follow the System V convention: `rdi`, `rsi`,
//! `rdx`.

use thiserror::Error;
use x86e_common::{Kernel, Register, State, Syscall};

use crate::memory::{Memory, MemoryError};
use crate::vm::state::VmState;

const STDOUT_FD: u64 = 1;
const STDERR_FD: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyscallError {
    #[error("Unknown {kernel} syscall number {id:#x}")]
    Unknown { kernel: Kernel, id: u64 },
    #[error("Bad file descriptor {0}")]
    BadFileDescriptor(u64),
    #[error("Syscall memory error: {0}")]
    Memory(#[from] MemoryError),
}

/// Bytes written by the program to its standard streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// What the VM does after a syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    /// Continue at the next instruction with the updated state.
    Continue(State),
    /// Halt with the given exit status.
    Exit(u64),
}

/// Executes the syscall selected by `rax`.
pub fn dispatch(
    kernel: Kernel,
    memory: &Memory,
    state: State,
    output: &mut Output,
) -> Result<SyscallOutcome, SyscallError> {
    let id = state.get(Register::Rax);
    let syscall = kernel
        .syscall(id)
        .ok_or(SyscallError::Unknown { kernel, id })?;

    match syscall {
        Syscall::Exit => Ok(SyscallOutcome::Exit(state.get(Register::Rdi))),
        Syscall::Write => {
            let fd = state.get(Register::Rdi);
            let stream = match fd {
                STDOUT_FD => &mut output.stdout,
                STDERR_FD => &mut output.stderr,
                _ => return Err(SyscallError::BadFileDescriptor(fd)),
            };
            let len = state.get(Register::Rdx);
            let bytes = memory.read_bytes(state.get(Register::Rsi), len)?;
            stream.extend_from_slice(bytes);

            let mut next = state;
            next.set(Register::Rax, len);
            Ok(SyscallOutcome::Continue(next.advance()))
        }
    }
}
