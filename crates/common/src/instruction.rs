use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Register, RegisterRef, State, Width};

/// Maximum number of operands taken by a supported instruction.
pub const INSTRUCTION_MAX_OPERANDS: usize = 2;

/// The instructions understood by the emulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mnemonic {
    Push,
    Pop,
    Mov,
    Add,
    Sub,
    Cmp,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Jmp,
    Je,
    Jne,
    Jge,
    Jl,
    Jg,
    Jle,
    Call,
    Ret,
    Nop,
    Syscall,
}

impl Mnemonic {
    /// Number of operands the instruction takes.
    pub const fn arity(self) -> usize {
        match self {
            Self::Ret | Self::Nop | Self::Syscall => 0,
            Self::Push
            | Self::Pop
            | Self::Jmp
            | Self::Je
            | Self::Jne
            | Self::Jge
            | Self::Jl
            | Self::Jg
            | Self::Jle
            | Self::Call => 1,
            Self::Mov
            | Self::Add
            | Self::Sub
            | Self::Cmp
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Shl
            | Self::Shr => 2,
        }
    }

    /// Whether the single operand of this instruction is a label.
    pub const fn takes_label(self) -> bool {
        matches!(
            self,
            Self::Jmp | Self::Je | Self::Jne | Self::Jge | Self::Jl | Self::Jg | Self::Jle | Self::Call
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Mov => "mov",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Cmp => "cmp",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::Jmp => "jmp",
            Self::Je => "je",
            Self::Jne => "jne",
            Self::Jge => "jge",
            Self::Jl => "jl",
            Self::Jg => "jg",
            Self::Jle => "jle",
            Self::Call => "call",
            Self::Ret => "ret",
            Self::Nop => "nop",
            Self::Syscall => "syscall",
        }
    }
}

impl FromStr for Mnemonic {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mnemonic = match s.to_ascii_lowercase().as_str() {
            "push" => Self::Push,
            "pop" => Self::Pop,
            "mov" => Self::Mov,
            "add" => Self::Add,
            "sub" => Self::Sub,
            "cmp" => Self::Cmp,
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "shl" | "sal" => Self::Shl,
            "shr" => Self::Shr,
            "jmp" => Self::Jmp,
            "je" | "jz" => Self::Je,
            "jne" | "jnz" => Self::Jne,
            "jge" => Self::Jge,
            "jl" => Self::Jl,
            "jg" => Self::Jg,
            "jle" => Self::Jle,
            "call" => Self::Call,
            "ret" => Self::Ret,
            "nop" => Self::Nop,
            "syscall" => Self::Syscall,
            _ => return Err(()),
        };
        Ok(mnemonic)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `[base ± displacement]` memory operand.
///
/// `width` is `None` when the operand carries no `<size> ptr` prefix; the
/// access size is then taken from the other operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRef {
    pub width: Option<Width>,
    pub base: Option<Register>,
    pub displacement: i64,
}

impl MemoryRef {
    /// Effective address of the operand in the given state.
    pub const fn address(&self, state: &State) -> u64 {
        let base = match self.base {
            Some(register) => state.get(register),
            None => 0,
        };
        base.wrapping_add(self.displacement as u64)
    }
}

impl fmt::Display for MemoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(width) = self.width {
            write!(f, "{} ptr ", width.ptr_keyword())?;
        }
        match (self.base, self.displacement) {
            (Some(base), 0) => write!(f, "[{base}]"),
            (Some(base), d) if d < 0 => write!(f, "[{base} - {}]", d.unsigned_abs()),
            (Some(base), d) => write!(f, "[{base} + {d}]"),
            (None, d) => write!(f, "[{d}]"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Register(RegisterRef),
    Immediate(i64),
    Memory(MemoryRef),
    /// A branch target, resolved to an instruction index when the program is parsed.
    Label { name: String, target: usize },
}

impl Operand {
    /// The size implied by the operand itself, if any.
    pub const fn width(&self) -> Option<Width> {
        match self {
            Self::Register(view) => Some(view.width),
            Self::Memory(memory) => memory.width,
            Self::Immediate(_) | Self::Label { .. } => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(view) => write!(f, "{view}"),
            Self::Immediate(value) => write!(f, "{value}"),
            Self::Memory(memory) => write!(f, "{memory}"),
            Self::Label { name, .. } => f.write_str(name),
        }
    }
}

/// An instruction of the program, with the 1-based source line it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operands: SmallVec<[Operand; INSTRUCTION_MAX_OPERANDS]>,
    pub line: usize,
}

impl Instruction {
    pub fn new(mnemonic: Mnemonic, operands: impl IntoIterator<Item = Operand>) -> Self {
        Self {
            mnemonic,
            operands: operands.into_iter().collect(),
            line: 0,
        }
    }

    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.operands.get(index)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, operand) in self.operands.iter().enumerate() {
            let separator = if i == 0 { " " } else { ", " };
            write!(f, "{separator}{operand}")?;
        }
        Ok(())
    }
}
