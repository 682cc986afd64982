use x86e_common::{Register, Width};

use super::*;
use crate::vm::instructions::arith::{cmp, sub_with_flags};
use crate::vm::test_utils::{assert_register, parse_instruction, state_with};

/// `<mnemonic> target` where `target` is instruction 2.
fn branch(mnemonic: &str) -> Instruction {
    parse_instruction(&format!("{mnemonic} target\nnop\ntarget:\nnop"))
}

fn flags_of_cmp(a: i32, b: i32) -> Flags {
    sub_with_flags(a as u32 as u64, b as u32 as u64, Width::Dword).1
}

#[test]
fn test_jmp() -> Result<(), InstructionExecutionError> {
    let mut memory = Memory::new(0);
    let next = jmp(&mut memory, State::default(), &branch("jmp"))?;
    assert_register!(next, Rip, 2);
    Ok(())
}

#[test]
fn test_signed_conditions() {
    let cases = [
        (1, 1, [true, false, true, false, false, true]),
        (1, 7, [false, true, false, true, false, true]),
        (7, 1, [false, true, true, false, true, false]),
        (-3, 2, [false, true, false, true, false, true]),
        (i32::MIN, 1, [false, true, false, true, false, true]),
        (i32::MAX, -1, [false, true, true, false, true, false]),
    ];
    let mnemonics = [
        Mnemonic::Je,
        Mnemonic::Jne,
        Mnemonic::Jge,
        Mnemonic::Jl,
        Mnemonic::Jg,
        Mnemonic::Jle,
    ];
    for (a, b, expected) in cases {
        let flags = flags_of_cmp(a, b);
        for (mnemonic, taken) in mnemonics.into_iter().zip(expected) {
            assert_eq!(
                condition(mnemonic, flags),
                Some(taken),
                "{mnemonic} after cmp {a}, {b}"
            );
        }
    }
}

#[test]
fn test_condition_of_non_branch() {
    assert_eq!(condition(Mnemonic::Jmp, Flags::default()), None);
    assert_eq!(condition(Mnemonic::Add, Flags::default()), None);
}

#[test]
fn test_jcc_taken_and_not_taken() -> Result<(), InstructionExecutionError> {
    let mut memory = Memory::new(0);
    let state = state_with(&[(Register::Rax, 3)]);
    let state = cmp(&mut memory, state, &parse_instruction("cmp eax, 3"))?;
    let state = state.jump(0);

    let taken = jcc(&mut memory, state, &branch("je"))?;
    assert_register!(taken, Rip, 2);

    let not_taken = jcc(&mut memory, state, &branch("jne"))?;
    assert_register!(not_taken, Rip, 1);
    Ok(())
}

#[test]
fn test_jcc_rejects_unconditional_mnemonic() {
    let mut memory = Memory::new(0);
    let result = jcc(&mut memory, State::default(), &branch("jmp"));
    assert_eq!(
        result,
        Err(InstructionExecutionError::Unsupported(Mnemonic::Jmp))
    );
}
