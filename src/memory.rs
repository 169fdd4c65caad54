use serde::{Deserialize, Serialize};

use crate::decoder::Register;
use crate::isa::dcpu17::{short_value, SHORT_BASE};

/// Index into the flat machine image.
pub type Loc = u32;

pub const RAM_WORDS: usize = 0x1_0000;

pub const REG_BASE: Loc = 0x1_0000; // A..J
pub const PC: Loc = REG_BASE + 8;
pub const SP: Loc = REG_BASE + 9;
pub const EX: Loc = REG_BASE + 10;
pub const IA: Loc = REG_BASE + 11;
pub const PC_SHADOW: Loc = REG_BASE + 12;
pub const SP_SHADOW: Loc = REG_BASE + 13;

/// Start of the read-only block: packed constants followed by the literal scratch cells.
pub const CONST_BASE: Loc = REG_BASE + 16;
pub const CONST_COUNT: Loc = 32;
pub const LITERAL_B: Loc = CONST_BASE + CONST_COUNT;
pub const LITERAL_A: Loc = LITERAL_B + 1;

pub const IMAGE_WORDS: usize = (LITERAL_A + 1) as usize;

pub fn reg_loc(r: Register) -> Loc {
    REG_BASE + r as Loc
}

pub fn is_ram(loc: Loc) -> bool {
    (loc as usize) < RAM_WORDS
}

pub fn is_read_only(loc: Loc) -> bool {
    loc >= CONST_BASE
}

/// Location of the constant cell for a packed literal operand code.
pub fn const_loc(code: u8) -> Loc {
    CONST_BASE + (code - SHORT_BASE) as Loc
}

/// RAM, register file and read-only constant block in one word array.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    words: Vec<u16>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        let mut m = Self {
            words: vec![0; IMAGE_WORDS],
        };
        m.init_constants();
        m
    }

    fn init_constants(&mut self) {
        for i in 0..CONST_COUNT {
            let code = SHORT_BASE + i as u8;
            self.words[(CONST_BASE + i) as usize] = short_value(code);
        }
    }

    /// Zeroes RAM and registers and rebuilds the constant block.
    pub fn reset(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.init_constants();
    }

    pub fn get(&self, loc: Loc) -> u16 {
        self.words[loc as usize]
    }

    /// Program-visible store; the read-only block silently keeps its value.
    pub fn set(&mut self, loc: Loc, val: u16) {
        if is_read_only(loc) {
            return;
        }
        self.words[loc as usize] = val;
    }

    /// Loads a trailing literal into its scratch cell, bypassing the read-only guard.
    pub(crate) fn latch_literal(&mut self, loc: Loc, val: u16) {
        debug_assert!(loc == LITERAL_A || loc == LITERAL_B);
        self.words[loc as usize] = val;
    }

    pub fn ram(&self) -> &[u16] {
        &self.words[..RAM_WORDS]
    }

    pub fn ram_mut(&mut self) -> &mut [u16] {
        &mut self.words[..RAM_WORDS]
    }

    pub fn reg(&self, r: Register) -> u16 {
        self.get(reg_loc(r))
    }

    pub fn set_reg(&mut self, r: Register, val: u16) {
        self.set(reg_loc(r), val);
    }

    /// Copies `image` into RAM starting at `origin`, wrapping at the top of memory.
    pub fn load(&mut self, origin: u16, image: &[u16]) {
        for (i, w) in image.iter().enumerate() {
            let addr = origin.wrapping_add(i as u16);
            self.words[addr as usize] = *w;
        }
    }

    pub fn snapshot(&self) -> &[u16] {
        &self.words
    }
}

impl PartialEq for Memory {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("pc", &self.get(PC))
            .field("sp", &self.get(SP))
            .field("ex", &self.get(EX))
            .field("ia", &self.get(IA))
            .field("regs", &&self.words[REG_BASE as usize..REG_BASE as usize + 8])
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_block_is_read_only() {
        let mut m = Memory::new();
        let loc = const_loc(0x25);
        assert_eq!(m.get(loc), 4);
        m.set(loc, 99);
        assert_eq!(m.get(loc), 4);
        m.set(LITERAL_A, 7);
        assert_eq!(m.get(LITERAL_A), 0);
    }

    #[test]
    fn load_wraps_at_top_of_ram() {
        let mut m = Memory::new();
        m.load(0xffff, &[1, 2]);
        assert_eq!(m.get(0xffff), 1);
        assert_eq!(m.get(0), 2);
    }
}
