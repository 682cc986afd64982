use std::fmt;

use serde::{Deserialize, Serialize};

/// Operand size of a register view or memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Width {
    Byte = 1,
    Word = 2,
    Dword = 4,
    Qword = 8,
}

impl Width {
    pub const fn bytes(self) -> u64 {
        self as u64
    }

    pub const fn bits(self) -> u32 {
        (self as u32) * 8
    }

    /// All-ones value of this width.
    pub const fn mask(self) -> u64 {
        match self {
            Self::Qword => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }

    pub const fn sign_bit(self) -> u64 {
        1u64 << (self.bits() - 1)
    }

    /// Sign-extends the low `self` bytes of `value` to 64 bits.
    pub const fn sign_extend(self, value: u64) -> i64 {
        let shift = 64 - self.bits();
        ((value << shift) as i64) >> shift
    }

    /// Parses the size keyword of a `<size> ptr [...]` memory operand.
    pub fn from_ptr_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "byte" => Some(Self::Byte),
            "word" => Some(Self::Word),
            "dword" => Some(Self::Dword),
            "qword" => Some(Self::Qword),
            _ => None,
        }
    }

    pub const fn ptr_keyword(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Word => "word",
            Self::Dword => "dword",
            Self::Qword => "qword",
        }
    }
}

/// The architectural registers tracked by the emulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rsp,
    Rbp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Rip,
}

/// Names of each register at qword, dword, word and byte width.
/// An empty name means the view does not exist.
const REGISTER_NAMES: [(Register, [&str; 4]); Register::COUNT] = [
    (Register::Rax, ["rax", "eax", "ax", "al"]),
    (Register::Rbx, ["rbx", "ebx", "bx", "bl"]),
    (Register::Rcx, ["rcx", "ecx", "cx", "cl"]),
    (Register::Rdx, ["rdx", "edx", "dx", "dl"]),
    (Register::Rsi, ["rsi", "esi", "si", "sil"]),
    (Register::Rdi, ["rdi", "edi", "di", "dil"]),
    (Register::Rsp, ["rsp", "esp", "sp", "spl"]),
    (Register::Rbp, ["rbp", "ebp", "bp", "bpl"]),
    (Register::R8, ["r8", "r8d", "r8w", "r8b"]),
    (Register::R9, ["r9", "r9d", "r9w", "r9b"]),
    (Register::R10, ["r10", "r10d", "r10w", "r10b"]),
    (Register::R11, ["r11", "r11d", "r11w", "r11b"]),
    (Register::R12, ["r12", "r12d", "r12w", "r12b"]),
    (Register::R13, ["r13", "r13d", "r13w", "r13b"]),
    (Register::R14, ["r14", "r14d", "r14w", "r14b"]),
    (Register::R15, ["r15", "r15d", "r15w", "r15b"]),
    (Register::Rip, ["rip", "eip", "ip", ""]),
];

const WIDTHS: [Width; 4] = [Width::Qword, Width::Dword, Width::Word, Width::Byte];

impl Register {
    pub const COUNT: usize = 17;

    pub const fn index(self) -> usize {
        self as usize
    }

    /// The name of this register viewed at `width`, if such a view exists.
    pub fn name_at(self, width: Width) -> Option<&'static str> {
        let names = REGISTER_NAMES[self.index()].1;
        let name = match width {
            Width::Qword => names[0],
            Width::Dword => names[1],
            Width::Word => names[2],
            Width::Byte => names[3],
        };
        (!name.is_empty()).then_some(name)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REGISTER_NAMES[self.index()].1[0])
    }
}

/// A register viewed at a given width, e.g. `eax` is `rax` at [`Width::Dword`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterRef {
    pub register: Register,
    pub width: Width,
}

impl RegisterRef {
    pub const fn new(register: Register, width: Width) -> Self {
        Self { register, width }
    }

    pub const fn qword(register: Register) -> Self {
        Self::new(register, Width::Qword)
    }

    pub const fn dword(register: Register) -> Self {
        Self::new(register, Width::Dword)
    }

    /// Looks up a register view by its assembly name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        REGISTER_NAMES.iter().find_map(|(register, names)| {
            names
                .iter()
                .zip(WIDTHS)
                .find(|(candidate, _)| !candidate.is_empty() && **candidate == name)
                .map(|(_, width)| Self::new(*register, width))
        })
    }
}

impl fmt::Display for RegisterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.register.name_at(self.width) {
            Some(name) => f.write_str(name),
            None => write!(f, "{}:{}", self.register, self.width.ptr_keyword()),
        }
    }
}
