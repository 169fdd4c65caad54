use crate::decoder::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `op b, a`
    Basic,
    /// `op a`
    Special,
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub op: Op,
    pub mnemonic: &'static str,
    pub format: Format,
    pub code: u16,
    pub cycles: u64,
}

const fn basic(op: Op, mnemonic: &'static str, code: u16, cycles: u64) -> InstrDesc {
    InstrDesc { op, mnemonic, format: Format::Basic, code, cycles }
}

const fn special(op: Op, mnemonic: &'static str, code: u16, cycles: u64) -> InstrDesc {
    InstrDesc { op, mnemonic, format: Format::Special, code, cycles }
}

pub const TABLE: &[InstrDesc] = &[
    basic(Op::Set, "SET", 0x01, 1),
    basic(Op::Add, "ADD", 0x02, 2),
    basic(Op::Sub, "SUB", 0x03, 2),
    basic(Op::Mul, "MUL", 0x04, 2),
    basic(Op::Mli, "MLI", 0x05, 2),
    basic(Op::Div, "DIV", 0x06, 3),
    basic(Op::Dvi, "DVI", 0x07, 3),
    basic(Op::Mod, "MOD", 0x08, 3),
    basic(Op::Mdi, "MDI", 0x09, 3),
    basic(Op::And, "AND", 0x0a, 1),
    basic(Op::Bor, "BOR", 0x0b, 1),
    basic(Op::Xor, "XOR", 0x0c, 1),
    basic(Op::Shr, "SHR", 0x0d, 1),
    basic(Op::Asr, "ASR", 0x0e, 1),
    basic(Op::Shl, "SHL", 0x0f, 1),
    basic(Op::Ifb, "IFB", 0x10, 2),
    basic(Op::Ifc, "IFC", 0x11, 2),
    basic(Op::Ife, "IFE", 0x12, 2),
    basic(Op::Ifn, "IFN", 0x13, 2),
    basic(Op::Ifg, "IFG", 0x14, 2),
    basic(Op::Ifa, "IFA", 0x15, 2),
    basic(Op::Ifl, "IFL", 0x16, 2),
    basic(Op::Ifu, "IFU", 0x17, 2),
    basic(Op::Adx, "ADX", 0x1a, 3),
    basic(Op::Sbx, "SBX", 0x1b, 3),
    basic(Op::Sti, "STI", 0x1e, 2),
    basic(Op::Std, "STD", 0x1f, 2),
    special(Op::Jsr, "JSR", 0x01, 3),
    special(Op::Hcf, "HCF", 0x07, 9),
    special(Op::Int, "INT", 0x08, 4),
    special(Op::Iag, "IAG", 0x09, 1),
    special(Op::Ias, "IAS", 0x0a, 1),
    special(Op::Rfi, "RFI", 0x0b, 3),
    special(Op::Iaq, "IAQ", 0x0c, 2),
];

pub fn describe(op: Op) -> &'static InstrDesc {
    // every Op variant has exactly one row
    TABLE
        .iter()
        .find(|d| d.op == op)
        .unwrap_or(&TABLE[0])
}

pub fn lookup(mnemonic: &str) -> Option<&'static InstrDesc> {
    TABLE
        .iter()
        .find(|d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_row_round_trips_through_describe() {
        for d in TABLE {
            assert_eq!(describe(d.op).mnemonic, d.mnemonic);
            assert_eq!(lookup(&d.mnemonic.to_lowercase()).unwrap().op, d.op);
        }
    }
}
