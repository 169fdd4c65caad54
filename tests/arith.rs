mod common;

use common::{boot, run};
use dcpu16_rs::decoder::Register::{self, A, B, C, I, J};
use dcpu16_rs::HaltReason;

fn regs_after(src: &str) -> (u16, u16) {
    let mut cpu = boot(src);
    run(&mut cpu, 100);
    (cpu.reg(A), cpu.ex())
}

#[test]
fn add_carries_into_ex() {
    assert_eq!(regs_after("SET A, 0xffff\nADD A, 2\nHCF 0"), (1, 1));
    assert_eq!(regs_after("SET A, 3\nADD A, 4\nHCF 0"), (7, 0));
}

#[test]
fn sub_sets_ex_on_borrow() {
    assert_eq!(regs_after("SET A, 1\nSUB A, 2\nHCF 0"), (0xffff, 1));
    assert_eq!(regs_after("SET A, 5\nSUB A, 2\nHCF 0"), (3, 0));
}

#[test]
fn multiply_high_word_lands_in_ex() {
    assert_eq!(regs_after("SET A, 0x1000\nMUL A, 0x20\nHCF 0"), (0, 2));
    assert_eq!(regs_after("SET A, -2\nMLI A, 3\nHCF 0"), (0xfffa, 0xffff));
}

#[test]
fn division() {
    assert_eq!(regs_after("SET A, 1\nDIV A, 2\nHCF 0"), (0, 0x8000));
    assert_eq!(regs_after("SET A, 7\nSET EX, 5\nDIV A, 0\nHCF 0"), (0, 0));
    assert_eq!(regs_after("SET A, -7\nDVI A, 2\nHCF 0").0, 0xfffd);
    assert_eq!(regs_after("SET A, 7\nMOD A, 0\nHCF 0").0, 0);
    assert_eq!(regs_after("SET A, -7\nMDI A, 16\nHCF 0").0, 0xfff9);
}

#[test]
fn shifts() {
    assert_eq!(regs_after("SET A, 0x8001\nSHL A, 1\nHCF 0"), (0x0002, 0x0001));
    assert_eq!(regs_after("SET A, 3\nSHR A, 1\nHCF 0"), (0x0001, 0x8000));
    assert_eq!(regs_after("SET A, 0x8001\nASR A, 1\nHCF 0"), (0xc000, 0x8000));
}

#[test]
fn carry_chains() {
    assert_eq!(regs_after("SET EX, 1\nSET A, 0xffff\nADX A, 0\nHCF 0"), (0, 1));
    assert_eq!(regs_after("SET EX, 0\nSET A, 0\nSBX A, 1\nHCF 0"), (0xffff, 0xffff));
}

#[test]
fn bitwise() {
    assert_eq!(regs_after("SET A, 0xf0f0\nAND A, 0xff00\nHCF 0").0, 0xf000);
    assert_eq!(regs_after("SET A, 0x00f0\nBOR A, 0x0f00\nHCF 0").0, 0x0ff0);
    assert_eq!(regs_after("SET A, 0xffff\nXOR A, 0x0f0f\nHCF 0").0, 0xf0f0);
}

#[test]
fn string_copy_steps_i_and_j() {
    let mut cpu = boot(
        "SET [0x300], 9\nSET I, 0x200\nSET J, 0x300\nSTI [I], [J]\nSTD C, 4\nHCF 0",
    );
    run(&mut cpu, 100);
    assert_eq!(cpu.peek(0x200), 9);
    assert_eq!(cpu.reg(C), 4);
    assert_eq!((cpu.reg(I), cpu.reg(J)), (0x200, 0x300));
}

#[test]
fn subroutine_call_and_return() {
    let mut cpu = boot("JSR sub\nHCF 0\n:sub SET A, 7\nSET PC, POP");
    let summary = run(&mut cpu, 100);
    assert_eq!(summary.halt, Some(HaltReason::Hcf { pc: 2 }));
    assert_eq!(cpu.reg(A), 7);
    assert_eq!(cpu.sp(), 0);
}

#[test]
fn cycle_costs_include_trailing_words() {
    let mut cpu = boot("SET A, 1\nADD [0x1000], 0x40\nHCF 0");
    run(&mut cpu, 2);
    // SET 1, ADD 2 plus two trailing words
    assert_eq!(cpu.cycles(), 1 + 2 + 2);
}

#[test]
fn every_register_is_addressable() {
    let src: String = Register::ALL
        .iter()
        .enumerate()
        .map(|(i, r)| format!("SET {}, {}\n", r.name(), i + 10))
        .collect();
    let mut cpu = boot(&src);
    run(&mut cpu, 8);
    for (i, r) in Register::ALL.iter().enumerate() {
        assert_eq!(cpu.reg(*r), i as u16 + 10);
    }
    assert_eq!(cpu.reg(B), 11);
}
