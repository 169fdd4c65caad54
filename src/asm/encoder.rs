use tracing::{debug, trace};

use super::{
    AsmError, Assembled, DataItem, Expr, InstrKind, Item, Operand, SourceMap, SymbolTable,
};
use crate::decoder::Slot;
use crate::isa::dcpu17::{self as isa, encode_op, short_literal, slot_allows_short};
use crate::memory::RAM_WORDS;

/// Whether an operand packs into its field or needs a trailing word.
///
/// A literal naming a label that is not yet defined is `Pending`; the encoder
/// always reserves the trailing word for it, so addresses never shift after the
/// first walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Short(u8),
    Long,
    Pending,
}

impl Operand {
    pub fn form(&self, slot: Slot, symbols: &SymbolTable) -> Form {
        match self {
            Operand::Reg(r) => Form::Short(isa::REG + *r as u8),
            Operand::AtReg(r) => Form::Short(isa::AT_REG + *r as u8),
            Operand::Push | Operand::Pop => Form::Short(isa::PUSH_POP),
            Operand::Peek => Form::Short(isa::PEEK),
            Operand::Sp => Form::Short(isa::SP),
            Operand::Pc => Form::Short(isa::PC),
            Operand::Ex => Form::Short(isa::EX),
            Operand::AtRegPlus(..) | Operand::Pick(_) | Operand::AtAddr(_) => Form::Long,
            Operand::Literal(e) => {
                let value = match e {
                    Expr::Num(n) => *n,
                    Expr::Label(name) => match symbols.get(name) {
                        Some(v) => v,
                        None => return Form::Pending,
                    },
                };
                match short_literal(value) {
                    Some(code) if slot_allows_short(slot) => Form::Short(code),
                    _ => Form::Long,
                }
            }
        }
    }

    fn long_code(&self) -> u8 {
        match self {
            Operand::AtRegPlus(r, _) => isa::AT_REG_NEXT + *r as u8,
            Operand::Pick(_) => isa::PICK,
            Operand::AtAddr(_) => isa::AT_NEXT,
            _ => isa::NEXT,
        }
    }

    fn trailing(&self) -> Option<&Expr> {
        match self {
            Operand::AtRegPlus(_, e) | Operand::Pick(e) | Operand::AtAddr(e) | Operand::Literal(e) => {
                Some(e)
            }
            _ => None,
        }
    }
}

/// Where in its instruction a patched word sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
    Operand(Slot),
    Data(usize),
}

/// A trailing word that still needs the address of `label`.
#[derive(Debug, Clone)]
struct Reference {
    instr: usize,
    site: Site,
    label: String,
    pos: usize,
    line: usize,
}

#[derive(Default)]
struct Emitter {
    words: Vec<u16>,
    refs: Vec<Reference>,
    instr: usize,
}

impl Emitter {
    fn expr(&mut self, e: &Expr, site: Site, symbols: &SymbolTable, line: usize) {
        let value = match e {
            Expr::Num(n) => *n,
            Expr::Label(name) => symbols.get(name).unwrap_or_else(|| {
                self.refs.push(Reference {
                    instr: self.instr,
                    site,
                    label: name.clone(),
                    pos: self.words.len(),
                    line,
                });
                0
            }),
        };
        self.words.push(value);
    }

    /// Field code for `op`, and whether a trailing word follows the instruction.
    fn code(op: &Operand, slot: Slot, symbols: &SymbolTable) -> (u8, bool) {
        match op.form(slot, symbols) {
            Form::Short(code) => (code, false),
            Form::Long | Form::Pending => (op.long_code(), true),
        }
    }

    fn operand_word(
        &mut self,
        op: &Operand,
        slot: Slot,
        long: bool,
        symbols: &SymbolTable,
        line: usize,
    ) {
        if let (true, Some(e)) = (long, op.trailing()) {
            self.expr(e, Site::Operand(slot), symbols, line);
        }
    }

    /// Returns whether the words are code.
    fn instr(&mut self, kind: &InstrKind, symbols: &SymbolTable, line: usize) -> bool {
        match kind {
            InstrKind::Basic { op, b, a } => {
                let (bc, b_long) = Self::code(b, Slot::B, symbols);
                let (ac, a_long) = Self::code(a, Slot::A, symbols);
                self.words.push(encode_op(*op, bc, ac));
                self.operand_word(b, Slot::B, b_long, symbols, line);
                self.operand_word(a, Slot::A, a_long, symbols, line);
                true
            }
            InstrKind::Special { op, a } => {
                let (ac, a_long) = Self::code(a, Slot::A, symbols);
                self.words.push(encode_op(*op, 0, ac));
                self.operand_word(a, Slot::A, a_long, symbols, line);
                true
            }
            InstrKind::Data(data) => {
                for (i, d) in data.iter().enumerate() {
                    match d {
                        DataItem::Word(w) => self.words.push(*w),
                        DataItem::Str(s) => self.words.extend(s.encode_utf16()),
                        DataItem::Label(name) => {
                            self.expr(&Expr::Label(name.clone()), Site::Data(i), symbols, line)
                        }
                    }
                }
                false
            }
        }
    }
}

/// Emits every item in order, defining labels as they are reached, then patches
/// the trailing words that referred forward.
pub fn encode(items: &mut [Item], symbols: &mut SymbolTable) -> Result<Assembled, AsmError> {
    let mut map = SourceMap::default();
    let mut em = Emitter::default();

    for (index, item) in items.iter_mut().enumerate() {
        em.instr = index;
        match item {
            Item::Label { name, line } => {
                if em.words.len() >= RAM_WORDS {
                    return Err(AsmError::TooLarge { line: *line });
                }
                symbols.define(name, em.words.len() as u16, *line)?;
            }
            Item::Instr(ins) => {
                let start = em.words.len();
                let is_code = em.instr(&ins.kind, symbols, ins.line);
                let end = em.words.len();
                if end > RAM_WORDS {
                    return Err(AsmError::TooLarge { line: ins.line });
                }
                ins.addr = Some(start as u16);
                ins.len = (end - start) as u16;
                map.record(ins.line, end - start, is_code);
            }
        }
    }

    let Emitter { mut words, refs, .. } = em;
    for r in &refs {
        let addr = symbols.get(&r.label).ok_or_else(|| AsmError::Unresolved {
            name: r.label.clone(),
            line: r.line,
        })?;
        words[r.pos] = addr;
        trace!(label = %r.label, instr = r.instr, site = ?r.site, pos = r.pos, addr, "patched");
    }
    debug!(words = words.len(), labels = symbols.len(), patched = refs.len(), "assembled");

    map.set_labels(symbols.iter().map(|(n, a)| (n.to_string(), a)));
    Ok(Assembled {
        words,
        symbols: symbols.clone(),
        map,
    })
}
