use crate::decoder::{Decoded, Decoder, Op, Slot};
use crate::instructions::{Format, TABLE};

// Operand codes
pub const REG: u8 = 0x00;
pub const AT_REG: u8 = 0x08;
pub const AT_REG_NEXT: u8 = 0x10;
pub const PUSH_POP: u8 = 0x18;
pub const PEEK: u8 = 0x19;
pub const PICK: u8 = 0x1a;
pub const SP: u8 = 0x1b;
pub const PC: u8 = 0x1c;
pub const EX: u8 = 0x1d;
pub const AT_NEXT: u8 = 0x1e;
pub const NEXT: u8 = 0x1f;
pub const SHORT_BASE: u8 = 0x20;

/// Inclusive window of values that pack into the `a` field.
pub const SHORT_MIN: i32 = -1;
pub const SHORT_MAX: i32 = 30;

pub const MASK_OP: u16 = 0x1f;
pub const SHIFT_B: u16 = 5;
pub const MASK_B: u16 = 0x1f;
pub const SHIFT_A: u16 = 10;
pub const MASK_A: u16 = 0x3f;

/// Splits an instruction word into (opcode, b, a) fields.
pub fn fields(raw: u16) -> (u16, u8, u8) {
    (
        raw & MASK_OP,
        ((raw >> SHIFT_B) & MASK_B) as u8,
        ((raw >> SHIFT_A) & MASK_A) as u8,
    )
}

pub fn pack_basic(opcode: u16, b: u8, a: u8) -> u16 {
    (opcode & MASK_OP) | ((b as u16 & MASK_B) << SHIFT_B) | ((a as u16 & MASK_A) << SHIFT_A)
}

pub fn pack_special(opcode: u16, a: u8) -> u16 {
    pack_basic(0, opcode as u8, a)
}

/// Trailing words consumed by an operand code.
pub fn operand_words(code: u8) -> u16 {
    match code {
        0x10..=0x17 | PICK | AT_NEXT | NEXT => 1,
        _ => 0,
    }
}

/// Packed operand code for `value`, if it fits the short-literal window.
pub fn short_literal(value: u16) -> Option<u8> {
    let signed = if value == 0xffff { -1 } else { value as i32 };
    if (SHORT_MIN..=SHORT_MAX).contains(&signed) {
        Some((SHORT_BASE as i32 + signed - SHORT_MIN) as u8)
    } else {
        None
    }
}

/// Value carried by a packed literal code (0x20..=0x3f).
pub fn short_value(code: u8) -> u16 {
    (code as i32 - SHORT_BASE as i32 + SHORT_MIN) as u16
}

/// Total width in words of a raw instruction word, whether or not its opcode is defined.
pub fn raw_width(raw: u16) -> u16 {
    let (o, b, a) = fields(raw);
    if o == 0 {
        1 + operand_words(a)
    } else {
        1 + operand_words(b) + operand_words(a)
    }
}

pub fn slot_allows_short(slot: Slot) -> bool {
    slot == Slot::A
}

/// DCPU-16 1.7 decoder.
pub struct Dcpu17Decoder;

impl Dcpu17Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Dcpu17Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Dcpu17Decoder {
    fn decode(&self, raw: u16) -> Option<Decoded> {
        let (o, b, a) = fields(raw);
        let (format, code) = if o == 0 {
            (Format::Special, b as u16)
        } else {
            (Format::Basic, o)
        };
        let desc = TABLE
            .iter()
            .find(|d| d.format == format && d.code == code)?;
        let b = if format == Format::Special { 0 } else { b };
        Some(Decoded { op: desc.op, raw, b, a })
    }
}

pub fn encode_op(op: Op, b: u8, a: u8) -> u16 {
    let desc = crate::instructions::describe(op);
    match desc.format {
        Format::Basic => pack_basic(desc.code, b, a),
        Format::Special => pack_special(desc.code, a),
    }
}
