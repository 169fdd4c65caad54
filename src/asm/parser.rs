use super::lexer::{tokenize_line, Token};
use super::{AsmError, DataItem, Expr, InstrKind, Instruction, Item, Operand};
use crate::decoder::{Op, Register, Slot};
use crate::instructions::{lookup, Format};

const OPERAND_WORDS: &[&str] = &["PUSH", "POP", "PEEK", "PICK", "SP", "PC", "EX", "O"];

fn is_reserved(name: &str) -> bool {
    Register::parse(name).is_some()
        || OPERAND_WORDS.iter().any(|w| w.eq_ignore_ascii_case(name))
}

fn bad(line: usize, reason: impl Into<String>) -> AsmError {
    AsmError::BadOperand { line, reason: reason.into() }
}

/// Accepts anything representable as a signed or unsigned word.
fn to_word(n: i64, line: usize) -> Result<u16, AsmError> {
    if (-0x8000..=0xffff).contains(&n) {
        Ok(n as u16)
    } else {
        Err(AsmError::BadNumber { line, text: n.to_string() })
    }
}

pub fn parse(src: &str) -> Result<Vec<Item>, AsmError> {
    let mut items = Vec::new();
    for (idx, text) in src.lines().enumerate() {
        let line = idx + 1;
        let toks = tokenize_line(text, line)?;
        parse_line(&toks, line, &mut items)?;
    }
    Ok(items)
}

fn parse_line(toks: &[Token], line: usize, items: &mut Vec<Item>) -> Result<(), AsmError> {
    let mut rest = toks;
    // Any number of `:name` / `name:` labels may precede the statement.
    loop {
        match rest {
            [Token::Colon, Token::Ident(name), tail @ ..]
            | [Token::Ident(name), Token::Colon, tail @ ..] => {
                if is_reserved(name) {
                    return Err(AsmError::Syntax {
                        line,
                        reason: format!("`{name}` is reserved and cannot name a label"),
                    });
                }
                items.push(Item::Label { name: name.clone(), line });
                rest = tail;
            }
            _ => break,
        }
    }
    match rest {
        [] => Ok(()),
        [Token::Ident(mn), tail @ ..] => {
            items.push(Item::Instr(statement(mn, tail, line)?));
            Ok(())
        }
        [Token::Colon, ..] => Err(AsmError::Syntax {
            line,
            reason: "expected a label name after `:`".into(),
        }),
        _ => Err(AsmError::Syntax {
            line,
            reason: "expected a mnemonic or label".into(),
        }),
    }
}

fn statement(mn: &str, tail: &[Token], line: usize) -> Result<Instruction, AsmError> {
    let upper = mn.to_ascii_uppercase();
    if matches!(upper.as_str(), "DAT" | ".DAT" | "DW" | ".DW") {
        return Ok(Instruction::new(InstrKind::Data(data(tail, line)?), line));
    }
    let desc = lookup(mn).ok_or_else(|| AsmError::UnknownMnemonic {
        line,
        name: mn.to_string(),
    })?;
    let groups: Vec<&[Token]> = tail.split(|t| *t == Token::Comma).collect();
    let kind = match desc.format {
        Format::Basic => {
            let [b, a] = groups.as_slice() else {
                return Err(bad(line, format!("{} takes two operands", desc.mnemonic)));
            };
            InstrKind::Basic {
                op: desc.op,
                b: operand(b, Slot::B, line)?,
                a: operand(a, Slot::A, line)?,
            }
        }
        // HCF and RFI ignore their operand, so it may be left off.
        Format::Special if tail.is_empty() && matches!(desc.op, Op::Hcf | Op::Rfi) => {
            InstrKind::Special { op: desc.op, a: Operand::Literal(Expr::Num(0)) }
        }
        Format::Special => {
            let [a] = groups.as_slice() else {
                return Err(bad(line, format!("{} takes one operand", desc.mnemonic)));
            };
            InstrKind::Special { op: desc.op, a: operand(a, Slot::A, line)? }
        }
    };
    Ok(Instruction::new(kind, line))
}

fn data(tail: &[Token], line: usize) -> Result<Vec<DataItem>, AsmError> {
    let malformed = |reason: &str| AsmError::BadDirective { line, reason: reason.into() };
    if tail.is_empty() {
        return Err(malformed("DAT needs at least one value"));
    }
    tail.split(|t| *t == Token::Comma)
        .map(|group| match group {
            [Token::Number(n)] => Ok(DataItem::Word(to_word(*n, line)?)),
            [Token::Minus, Token::Number(n)] => Ok(DataItem::Word(to_word(-*n, line)?)),
            [Token::Str(s)] => Ok(DataItem::Str(s.clone())),
            [Token::Ident(name)] if !is_reserved(name) => Ok(DataItem::Label(name.clone())),
            [] => Err(malformed("empty value")),
            _ => Err(malformed("expected a number, string or label")),
        })
        .collect()
}

fn expr(toks: &[Token], line: usize) -> Result<Expr, AsmError> {
    match toks {
        [Token::Number(n)] | [Token::Plus, Token::Number(n)] => Ok(Expr::Num(to_word(*n, line)?)),
        [Token::Minus, Token::Number(n)] => Ok(Expr::Num(to_word(-*n, line)?)),
        [Token::Ident(name)] if !is_reserved(name) => Ok(Expr::Label(name.clone())),
        [] => Err(bad(line, "missing value")),
        _ => Err(bad(line, "expected a number or label")),
    }
}

fn operand(toks: &[Token], slot: Slot, line: usize) -> Result<Operand, AsmError> {
    match toks {
        [] => Err(bad(line, "missing operand")),
        [Token::LBracket, inner @ .., Token::RBracket] => indirect(inner, slot, line),
        [Token::Ident(w), rest @ ..] if w.eq_ignore_ascii_case("PICK") => {
            Ok(Operand::Pick(expr(rest, line)?))
        }
        [Token::Ident(w)] => {
            let upper = w.to_ascii_uppercase();
            match upper.as_str() {
                "PUSH" => stack(Operand::Push, slot, line),
                "POP" => stack(Operand::Pop, slot, line),
                "PEEK" => Ok(Operand::Peek),
                "SP" => Ok(Operand::Sp),
                "PC" => Ok(Operand::Pc),
                "EX" | "O" => Ok(Operand::Ex),
                _ => match Register::parse(w) {
                    Some(r) => Ok(Operand::Reg(r)),
                    None => Ok(Operand::Literal(Expr::Label(w.clone()))),
                },
            }
        }
        _ => Ok(Operand::Literal(expr(toks, line)?)),
    }
}

/// PUSH only makes sense as a destination and POP only as a source.
fn stack(op: Operand, slot: Slot, line: usize) -> Result<Operand, AsmError> {
    match (&op, slot) {
        (Operand::Push, Slot::A) => Err(bad(line, "PUSH is only valid as the first operand")),
        (Operand::Pop, Slot::B) => Err(bad(line, "POP is only valid as the second operand")),
        _ => Ok(op),
    }
}

enum Term {
    Reg(Register),
    Sp,
    Num(i64),
    Label(String),
}

fn is_sp(w: &str) -> bool {
    w.eq_ignore_ascii_case("SP")
}

fn indirect(inner: &[Token], slot: Slot, line: usize) -> Result<Operand, AsmError> {
    match inner {
        [Token::Minus, Token::Minus, Token::Ident(w)] if is_sp(w) => {
            return stack(Operand::Push, slot, line)
        }
        [Token::Ident(w), Token::Plus, Token::Plus] if is_sp(w) => {
            return stack(Operand::Pop, slot, line)
        }
        _ => {}
    }

    let mut terms = Vec::new();
    let mut rest = inner;
    while !rest.is_empty() {
        let neg = match rest {
            [Token::Plus, tail @ ..] if !terms.is_empty() => {
                rest = tail;
                false
            }
            [Token::Minus, tail @ ..] => {
                rest = tail;
                true
            }
            _ if terms.is_empty() => false,
            _ => return Err(bad(line, "expected `+` or `-` between terms")),
        };
        let term = match rest.first() {
            Some(Token::Number(n)) => Term::Num(if neg { -*n } else { *n }),
            Some(Token::Ident(w)) if !neg => {
                if is_sp(w) {
                    Term::Sp
                } else if let Some(r) = Register::parse(w) {
                    Term::Reg(r)
                } else if is_reserved(w) {
                    return Err(bad(line, format!("`{w}` cannot appear inside brackets")));
                } else {
                    Term::Label(w.clone())
                }
            }
            _ => return Err(bad(line, "malformed address")),
        };
        terms.push(term);
        rest = &rest[1..];
    }

    let mut base = None;
    let mut offset = None;
    for term in terms {
        let value = match term {
            Term::Reg(_) | Term::Sp => {
                if base.replace(term).is_some() {
                    return Err(bad(line, "an address takes at most one register"));
                }
                continue;
            }
            Term::Num(n) => Expr::Num(to_word(n, line)?),
            Term::Label(s) => Expr::Label(s),
        };
        if offset.replace(value).is_some() {
            return Err(bad(line, "an address takes at most one offset"));
        }
    }

    match (base, offset) {
        (Some(Term::Reg(r)), None) => Ok(Operand::AtReg(r)),
        (Some(Term::Reg(r)), Some(e)) => Ok(Operand::AtRegPlus(r, e)),
        (Some(_), None) => Ok(Operand::Peek),
        (Some(_), Some(e)) => Ok(Operand::Pick(e)),
        (None, Some(e)) => Ok(Operand::AtAddr(e)),
        (None, None) => Err(bad(line, "empty brackets")),
    }
}
