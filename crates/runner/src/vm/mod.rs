pub mod instructions;
pub mod state;
pub mod syscall;
#[cfg(test)]
pub mod test_utils;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use instructions::{mnemonic_to_instruction_fn, InstructionExecutionError};
use serde::{Deserialize, Serialize};
use syscall::{Output, SyscallError, SyscallOutcome};
use thiserror::Error;
use x86e_common::{Kernel, Mnemonic, Program, Register, State};

use crate::memory::{Memory, DEFAULT_MEMORY_SIZE};

/// Custom error type for VM operations.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("VM instruction error at line {line} ('{instruction}'): {source}")]
    Instruction {
        line: usize,
        instruction: String,
        #[source]
        source: InstructionExecutionError,
    },
    #[error("VM syscall error: {0}")]
    Syscall(#[from] SyscallError),
    #[error("Step limit of {0} instructions exceeded")]
    StepLimitExceeded(usize),
    #[error("VM I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("VM trace serialization error: {0}")]
    Trace(#[from] serde_json::Error),
}

/// A single entry in the trace: the registers before the instruction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub rip: u64,
    pub rsp: u64,
}

/// The x86e virtual machine.
///
/// ## Fields
///
/// - `program`: Parsed instructions; `rip` indexes into them
/// - `memory`: Flat byte memory holding the stack
/// - `state`: Registers and flags
/// - `output`: Bytes written through the `write` syscall
/// - `exit_status`: Set once the program calls `exit`
/// - `trace`: Execution trace
#[derive(Debug)]
pub struct VM {
    pub program: Program,
    pub memory: Memory,
    pub state: State,
    pub kernel: Kernel,
    pub output: Output,
    pub exit_status: Option<u64>,
    pub trace: Vec<TraceEntry>,
    /// Log every executed instruction at INFO level.
    pub debug_instructions: bool,
}

impl From<Program> for VM {
    fn from(program: Program) -> Self {
        Self::new(program, Kernel::default(), DEFAULT_MEMORY_SIZE)
    }
}

impl VM {
    /// Creates a VM for `program` with `memory_size` bytes of zeroed memory.
    ///
    /// `rip` starts at instruction 0 and `rsp` at the top of memory, so the
    /// first push lands in the last 8 bytes.
    pub fn new(program: Program, kernel: Kernel, memory_size: usize) -> Self {
        let memory = Memory::new(memory_size);
        let mut state = State::default();
        state.set(Register::Rsp, memory.size() as u64);

        Self {
            program,
            memory,
            state,
            kernel,
            output: Output::default(),
            exit_status: None,
            trace: vec![],
            debug_instructions: false,
        }
    }

    /// Whether the program called `exit` or `rip` left the program.
    pub fn is_halted(&self) -> bool {
        self.exit_status.is_some() || self.state.rip() >= self.program.len()
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> usize {
        self.trace.len()
    }

    /// The exit status of a halted program: the `exit` argument, or `rax`
    /// when execution ran past the last instruction.
    pub fn final_status(&self) -> u64 {
        self.exit_status
            .unwrap_or_else(|| self.state.get(Register::Rax))
    }

    /// Executes the instruction at `rip`. Does nothing once halted.
    ///
    /// ## Errors
    ///
    /// Returns a [`VmError`] if:
    /// - The instruction cannot be executed ([`VmError::Instruction`])
    /// - The syscall is unknown or fails ([`VmError::Syscall`])
    pub fn step(&mut self) -> Result<(), VmError> {
        if self.is_halted() {
            return Ok(());
        }
        let rip = self.state.rip();
        let instruction = &self.program.instructions[rip];

        self.trace.push(TraceEntry {
            rip: rip as u64,
            rsp: self.state.rsp(),
        });
        if self.debug_instructions {
            tracing::info!(rip, line = instruction.line, "{instruction}");
        }

        if instruction.mnemonic == Mnemonic::Syscall {
            match syscall::dispatch(self.kernel, &self.memory, self.state, &mut self.output)? {
                SyscallOutcome::Continue(state) => self.state = state,
                SyscallOutcome::Exit(status) => {
                    tracing::debug!(status, "program exited");
                    self.exit_status = Some(status);
                }
            }
            return Ok(());
        }

        let to_vm_error = |source| VmError::Instruction {
            line: instruction.line,
            instruction: instruction.to_string(),
            source,
        };
        let instruction_fn = mnemonic_to_instruction_fn(instruction.mnemonic).map_err(to_vm_error)?;
        self.state =
            instruction_fn(&mut self.memory, self.state, instruction).map_err(to_vm_error)?;
        Ok(())
    }

    /// Runs until the program halts.
    ///
    /// ## Errors
    ///
    /// Returns [`VmError::StepLimitExceeded`] if the program is still running
    /// after `max_steps` instructions, or the error of the failing step.
    pub fn execute(&mut self, max_steps: usize) -> Result<(), VmError> {
        while !self.is_halted() {
            if self.steps() >= max_steps {
                return Err(VmError::StepLimitExceeded(max_steps));
            }
            self.step()?;
        }
        Ok(())
    }

    /// Executes the program from the instruction at `entrypoint` and returns
    /// its exit status.
    ///
    /// ## Errors
    ///
    /// See [`execute`](Self::execute).
    pub fn run_from_entrypoint(
        &mut self,
        entrypoint: usize,
        max_steps: usize,
    ) -> Result<u64, VmError> {
        self.state.set(Register::Rip, entrypoint as u64);
        self.execute(max_steps)?;
        Ok(self.final_status())
    }

    /// Writes the trace to `path` as a JSON array of `{ "rip", "rsp" }`
    /// objects.
    ///
    /// ## Errors
    ///
    /// Returns a [`VmError::Io`] if the file cannot be created or written, or
    /// a [`VmError::Trace`] if serialization fails.
    pub fn write_json_trace<P: AsRef<Path>>(&self, path: P) -> Result<(), VmError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &self.trace)?;
        writer.flush()?;
        Ok(())
    }
}
