use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    A = 0x0,
    B = 0x1,
    C = 0x2,
    X = 0x3,
    Y = 0x4,
    Z = 0x5,
    I = 0x6,
    J = 0x7,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Register::A,
        Register::B,
        Register::C,
        Register::X,
        Register::Y,
        Register::Z,
        Register::I,
        Register::J,
    ];

    pub fn from_index(idx: u8) -> Register {
        Self::from_u8(idx & 0x7).unwrap_or(Register::A)
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::X => "X",
            Register::Y => "Y",
            Register::Z => "Z",
            Register::I => "I",
            Register::J => "J",
        }
    }

    pub fn parse(s: &str) -> Option<Register> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(s))
    }
}

impl FromPrimitive for Register {
    fn from_i64(n: i64) -> Option<Self> {
        u64::try_from(n).ok().and_then(Self::from_u64)
    }

    fn from_u64(n: u64) -> Option<Self> {
        usize::try_from(n).ok().and_then(|i| Self::ALL.get(i).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    // basic (two operands)
    Set,
    Add,
    Sub,
    Mul,
    Mli,
    Div,
    Dvi,
    Mod,
    Mdi,
    And,
    Bor,
    Xor,
    Shr,
    Asr,
    Shl,
    Ifb,
    Ifc,
    Ife,
    Ifn,
    Ifg,
    Ifa,
    Ifl,
    Ifu,
    Adx,
    Sbx,
    Sti,
    Std,
    // special (one operand)
    Jsr,
    Hcf,
    Int,
    Iag,
    Ias,
    Rfi,
    Iaq,
}

impl Op {
    pub fn is_special(self) -> bool {
        matches!(
            self,
            Op::Jsr | Op::Hcf | Op::Int | Op::Iag | Op::Ias | Op::Rfi | Op::Iaq
        )
    }

    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            Op::Ifb | Op::Ifc | Op::Ife | Op::Ifn | Op::Ifg | Op::Ifa | Op::Ifl | Op::Ifu
        )
    }
}

/// Which operand field of the instruction word an operand occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Bits 9..5, the destination of a basic instruction.
    B,
    /// Bits 15..10, the source (or the only operand of a special instruction).
    A,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub op: Op,
    pub raw: u16,
    pub b: u8, // unused for special ops
    pub a: u8,
}

impl Decoded {
    /// Number of words the instruction occupies, opcode word included.
    pub fn width(&self) -> u16 {
        let b = if self.op.is_special() {
            0
        } else {
            crate::isa::dcpu17::operand_words(self.b)
        };
        1 + b + crate::isa::dcpu17::operand_words(self.a)
    }
}

pub trait Decoder {
    fn decode(&self, raw: u16) -> Option<Decoded>;
}
