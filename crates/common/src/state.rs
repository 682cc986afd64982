use serde::{Deserialize, Serialize};

use crate::{Register, RegisterRef, Width};

/// The status flags read by conditional jumps.
///
/// * `zf` - the last result was zero.
/// * `sf` - the last result had its sign bit set.
/// * `cf` - the last operation carried out of (or borrowed into) the top bit.
/// * `of` - the last operation overflowed as a signed operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    pub zf: bool,
    pub sf: bool,
    pub cf: bool,
    pub of: bool,
}

impl Flags {
    /// Flags for a result of the given width, with carry and overflow cleared.
    pub const fn from_result(result: u64, width: Width) -> Self {
        let result = result & width.mask();
        Self {
            zf: result == 0,
            sf: result & width.sign_bit() != 0,
            cf: false,
            of: false,
        }
    }
}

/// The register file of the emulated processor, updated at each step.
///
/// `rip` holds the index of the next instruction in the program rather than
/// a byte address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub registers: [u64; Register::COUNT],
    pub flags: Flags,
}

impl State {
    pub const fn get(&self, register: Register) -> u64 {
        self.registers[register.index()]
    }

    pub fn set(&mut self, register: Register, value: u64) {
        self.registers[register.index()] = value;
    }

    /// Reads a register view, zero-extended to 64 bits.
    pub const fn read(&self, view: RegisterRef) -> u64 {
        self.get(view.register) & view.width.mask()
    }

    /// Writes a register view.
    ///
    /// A 32-bit write clears the upper half of the register. Byte and word
    /// writes leave the other bits untouched.
    pub fn write(&mut self, view: RegisterRef, value: u64) {
        let new_value = match view.width {
            Width::Qword => value,
            Width::Dword => value & Width::Dword.mask(),
            Width::Word | Width::Byte => {
                let mask = view.width.mask();
                (self.get(view.register) & !mask) | (value & mask)
            }
        };
        self.set(view.register, new_value);
    }

    pub const fn rip(&self) -> usize {
        self.get(Register::Rip) as usize
    }

    pub const fn rsp(&self) -> u64 {
        self.get(Register::Rsp)
    }
}
