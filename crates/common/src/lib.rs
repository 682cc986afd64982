#![allow(clippy::option_if_let_else)]
pub mod instruction;
pub mod kernel;
pub mod parser;
pub mod program;
pub mod register;
pub mod state;

pub use instruction::{Instruction, MemoryRef, Mnemonic, Operand};
pub use kernel::{start_stub, Kernel, Syscall, START_LABEL};
pub use parser::ParseError;
pub use program::{Directive, Program, ProgramMetadata};
pub use register::{Register, RegisterRef, Width};
pub use state::{Flags, State};
