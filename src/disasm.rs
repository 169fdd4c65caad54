use crate::decoder::{Decoded, Decoder, Register, Slot};
use crate::instructions::describe;
use crate::isa::dcpu17::{self as isa, short_value};

fn hex(v: u16) -> String {
    format!("{v:#06x}")
}

/// Renders one operand; `next` supplies its trailing word when the code needs one.
pub fn fmt_operand(code: u8, slot: Slot, next: &mut impl Iterator<Item = u16>) -> String {
    let reg = || Register::from_index(code & 0x7).name();
    let mut word = || next.next().unwrap_or(0);
    match code {
        0x00..=0x07 => reg().to_string(),
        0x08..=0x0f => format!("[{}]", reg()),
        0x10..=0x17 => format!("[{}+{}]", reg(), hex(word())),
        isa::PUSH_POP => match slot {
            Slot::B => "PUSH".to_string(),
            Slot::A => "POP".to_string(),
        },
        isa::PEEK => "PEEK".to_string(),
        isa::PICK => format!("PICK {}", hex(word())),
        isa::SP => "SP".to_string(),
        isa::PC => "PC".to_string(),
        isa::EX => "EX".to_string(),
        isa::AT_NEXT => format!("[{}]", hex(word())),
        isa::NEXT => hex(word()),
        _ => (short_value(code) as i16).to_string(),
    }
}

/// `trailing` are the words following the opcode word, in b-then-a order.
pub fn fmt_decoded(d: &Decoded, trailing: &[u16]) -> String {
    let mn = describe(d.op).mnemonic;
    let mut next = trailing.iter().copied();
    if d.op.is_special() {
        format!("{} {}", mn, fmt_operand(d.a, Slot::A, &mut next))
    } else {
        let b = fmt_operand(d.b, Slot::B, &mut next);
        let a = fmt_operand(d.a, Slot::A, &mut next);
        format!("{mn} {b}, {a}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listed {
    pub addr: u16,
    pub width: u16,
    pub text: String,
}

/// Linear sweep over `words`; undecodable words become `DAT` lines.
pub fn disassemble<D: Decoder>(dec: &D, words: &[u16]) -> Vec<Listed> {
    let mut out = Vec::new();
    let mut pc = 0usize;
    while pc < words.len() {
        let raw = words[pc];
        let (width, text) = match dec.decode(raw) {
            Some(d) => {
                let w = d.width() as usize;
                let end = (pc + w).min(words.len());
                (w, fmt_decoded(&d, &words[pc + 1..end]))
            }
            None => (1, format!("DAT {}", hex(raw))),
        };
        out.push(Listed {
            addr: pc as u16,
            width: width as u16,
            text,
        });
        pc += width;
    }
    out
}
