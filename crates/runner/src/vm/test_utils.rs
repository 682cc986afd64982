//! Helpers shared by the VM and instruction tests.

use x86e_common::{Instruction, Program, Register, State};

/// Parses the first instruction of `source`.
///
/// Branch targets must be defined in `source` too, e.g. `"jmp done\ndone:"`.
pub fn parse_instruction(source: &str) -> Instruction {
    Program::parse(source)
        .expect("test instruction should parse")
        .instructions
        .remove(0)
}

/// A default state with the given registers set.
pub fn state_with(registers: &[(Register, u64)]) -> State {
    let mut state = State::default();
    for (register, value) in registers {
        state.set(*register, *value);
    }
    state
}

/// Asserts the 64-bit value of a register.
macro_rules! assert_register {
    ($state:expr, $register:ident, $value:expr) => {
        assert_eq!(
            $state.get(x86e_common::Register::$register),
            $value as u64,
            "register {}",
            stringify!($register)
        )
    };
}

pub(crate) use assert_register;
