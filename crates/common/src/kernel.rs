use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Label at which execution starts.
pub const START_LABEL: &str = "_start";

/// Class prefix Darwin puts in front of BSD syscall numbers.
const DARWIN_SYSCALL_CLASS_UNIX: u64 = 0x200_0000;

/// The system calls the emulator can service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syscall {
    Exit,
    Write,
}

/// Which kernel's syscall numbering the program was compiled against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    #[default]
    Linux,
    Darwin,
}

impl Kernel {
    pub const fn syscall_id(self, syscall: Syscall) -> u64 {
        match (self, syscall) {
            (Self::Linux, Syscall::Write) => 1,
            (Self::Linux, Syscall::Exit) => 60,
            (Self::Darwin, Syscall::Exit) => 1,
            (Self::Darwin, Syscall::Write) => 4,
        }
    }

    /// Decodes the syscall number found in `rax`.
    ///
    /// Darwin numbers are accepted with or without the Unix class prefix.
    pub const fn syscall(self, id: u64) -> Option<Syscall> {
        match self {
            Self::Linux => match id {
                1 => Some(Syscall::Write),
                60 => Some(Syscall::Exit),
                _ => None,
            },
            Self::Darwin => match id & !DARWIN_SYSCALL_CLASS_UNIX {
                1 => Some(Syscall::Exit),
                4 => Some(Syscall::Write),
                _ => None,
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
        }
    }
}

impl FromStr for Kernel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "darwin" => Ok(Self::Darwin),
            _ => Err(format!("Invalid kernel: {s}")),
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assembly for a `_start` routine that calls `main_label` and exits with
/// its return value.
pub fn start_stub(kernel: Kernel, main_label: &str) -> String {
    format!(
        "{START_LABEL}:\n\tcall {main_label}\n\tmov rdi, rax\n\tmov rax, {}\n\tsyscall\n",
        kernel.syscall_id(Syscall::Exit)
    )
}
