//! Assembly front end and encoder.
//!
//! Source text is tokenized and parsed line by line into [`Item`]s, then
//! [`encoder::encode`] walks the items once, emitting words and recording every
//! symbolic operand so it can be patched after the last label is known.

pub mod encoder;
pub mod lexer;
pub mod parser;
pub mod srcmap;
pub mod symbols;

use crate::decoder::{Op, Register};

pub use encoder::{encode, Form};
pub use srcmap::SourceMap;
pub use symbols::SymbolTable;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: unexpected character `{ch}`")]
    BadChar { line: usize, ch: char },
    #[error("line {line}: unterminated string or character literal")]
    Unterminated { line: usize },
    #[error("line {line}: number `{text}` does not fit in a word")]
    BadNumber { line: usize, text: String },
    #[error("line {line}: unknown mnemonic `{name}`")]
    UnknownMnemonic { line: usize, name: String },
    #[error("line {line}: bad operand: {reason}")]
    BadOperand { line: usize, reason: String },
    #[error("line {line}: malformed directive: {reason}")]
    BadDirective { line: usize, reason: String },
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    #[error("duplicate label `{name}` at line {line}")]
    DuplicateLabel { name: String, line: usize },
    #[error("unresolved reference to `{name}` at line {line}")]
    Unresolved { name: String, line: usize },
    #[error("line {line}: program does not fit in 65536 words")]
    TooLarge { line: usize },
}

impl AsmError {
    pub fn line(&self) -> usize {
        match self {
            AsmError::BadChar { line, .. }
            | AsmError::Unterminated { line }
            | AsmError::BadNumber { line, .. }
            | AsmError::UnknownMnemonic { line, .. }
            | AsmError::BadOperand { line, .. }
            | AsmError::BadDirective { line, .. }
            | AsmError::Syntax { line, .. }
            | AsmError::DuplicateLabel { line, .. }
            | AsmError::Unresolved { line, .. }
            | AsmError::TooLarge { line } => *line,
        }
    }
}

/// A numeric constant or a label whose address is filled in by the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Num(u16),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Register),
    AtReg(Register),
    AtRegPlus(Register, Expr),
    Push,
    Pop,
    Peek,
    Pick(Expr),
    Sp,
    Pc,
    Ex,
    /// `[next word]`
    AtAddr(Expr),
    /// Immediate; packed into the `a` field when small enough.
    Literal(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    Word(u16),
    Str(String),
    Label(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrKind {
    Basic { op: Op, b: Operand, a: Operand },
    Special { op: Op, a: Operand },
    Data(Vec<DataItem>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstrKind,
    pub line: usize,
    /// Filled in by the encoder.
    pub addr: Option<u16>,
    pub len: u16,
}

impl Instruction {
    pub fn new(kind: InstrKind, line: usize) -> Self {
        Self { kind, line, addr: None, len: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Label { name: String, line: usize },
    Instr(Instruction),
}

#[derive(Debug, Clone)]
pub struct Assembled {
    pub words: Vec<u16>,
    pub symbols: SymbolTable,
    pub map: SourceMap,
}

pub fn assemble(src: &str) -> Result<Assembled, AsmError> {
    let mut items = parser::parse(src)?;
    let mut symbols = SymbolTable::new();
    encode(&mut items, &mut symbols)
}
