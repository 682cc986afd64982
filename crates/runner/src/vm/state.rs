use x86e_common::{Flags, Register, State};

pub trait VmState {
    fn advance(self) -> Self;
    fn jump(self, target: usize) -> Self;
    fn with_flags(self, flags: Flags) -> Self;
}

impl VmState for State {
    /// Regular register update.
    /// Move to the next instruction.
    fn advance(mut self) -> Self {
        self.set(Register::Rip, self.get(Register::Rip) + 1);
        self
    }

    /// Jump register update.
    /// Set the instruction pointer to the target instruction index.
    fn jump(mut self, target: usize) -> Self {
        self.set(Register::Rip, target as u64);
        self
    }

    /// Replace the status flags.
    fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }
}
