use std::iter::Peekable;
use std::str::Chars;

use super::AsmError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Number(i64),
    Str(String),
    Comma,
    Colon,
    LBracket,
    RBracket,
    Plus,
    Minus,
}

struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str, line: usize) -> Self {
        Self { chars: src.chars().peekable(), line }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            s.push(c);
            self.bump();
        }
        s
    }

    fn escape(&mut self) -> Result<char, AsmError> {
        let line = self.line;
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some(c @ ('\\' | '"' | '\'')) => Ok(c),
            Some(c) => Err(AsmError::BadChar { line, ch: c }),
            None => Err(AsmError::Unterminated { line }),
        }
    }

    fn string(&mut self) -> Result<String, AsmError> {
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(s),
                Some('\\') => s.push(self.escape()?),
                Some(c) => s.push(c),
                None => return Err(AsmError::Unterminated { line: self.line }),
            }
        }
    }

    fn char_literal(&mut self) -> Result<i64, AsmError> {
        let c = match self.bump() {
            Some('\\') => self.escape()?,
            Some(c) => c,
            None => return Err(AsmError::Unterminated { line: self.line }),
        };
        match self.bump() {
            Some('\'') => Ok(c as i64),
            _ => Err(AsmError::Unterminated { line: self.line }),
        }
    }

    fn number(&mut self) -> Result<i64, AsmError> {
        let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let clean = text.replace('_', "");
        let lower = clean.to_ascii_lowercase();
        let parsed = if let Some(h) = lower.strip_prefix("0x") {
            i64::from_str_radix(h, 16)
        } else if let Some(b) = lower.strip_prefix("0b") {
            i64::from_str_radix(b, 2)
        } else {
            lower.parse::<i64>()
        };
        parsed.map_err(|_| AsmError::BadNumber { line: self.line, text })
    }
}

/// Tokenizes one source line. Everything after an unquoted `;` is a comment.
pub fn tokenize_line(src: &str, line: usize) -> Result<Vec<Token>, AsmError> {
    let mut cur = Cursor::new(src, line);
    let mut out = Vec::new();
    while let Some(c) = cur.peek() {
        match c {
            ';' => break,
            c if c.is_whitespace() => {
                cur.bump();
            }
            ',' | ':' | '[' | ']' | '+' | '-' => {
                cur.bump();
                out.push(match c {
                    ',' => Token::Comma,
                    ':' => Token::Colon,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '+' => Token::Plus,
                    _ => Token::Minus,
                });
            }
            '"' => {
                cur.bump();
                out.push(Token::Str(cur.string()?));
            }
            '\'' => {
                cur.bump();
                out.push(Token::Number(cur.char_literal()?));
            }
            c if c.is_ascii_digit() => out.push(Token::Number(cur.number()?)),
            c if c.is_alphabetic() || c == '_' || c == '.' => {
                let ident = cur.take_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
                out.push(Token::Ident(ident));
            }
            other => return Err(AsmError::BadChar { line, ch: other }),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tokens_of_an_indexed_set() {
        let toks = tokenize_line(":loop SET [A+0x10], 'x' ; trailing", 1).unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Colon,
                Token::Ident("loop".into()),
                Token::Ident("SET".into()),
                Token::LBracket,
                Token::Ident("A".into()),
                Token::Plus,
                Token::Number(0x10),
                Token::RBracket,
                Token::Comma,
                Token::Number('x' as i64),
            ]
        );
    }

    #[test]
    fn strings_keep_semicolons_and_escapes() {
        let toks = tokenize_line(r#"DAT "a;b\n", 0b101"#, 3).unwrap();
        assert_eq!(toks[1], Token::Str("a;b\n".into()));
        assert_eq!(toks[3], Token::Number(5));
    }

    #[test]
    fn errors_carry_the_line() {
        assert_eq!(
            tokenize_line("SET A, #1", 7).unwrap_err(),
            AsmError::BadChar { line: 7, ch: '#' }
        );
        assert_eq!(
            tokenize_line("DAT \"open", 9).unwrap_err(),
            AsmError::Unterminated { line: 9 }
        );
        assert!(matches!(
            tokenize_line("SET A, 0xZZ", 2).unwrap_err(),
            AsmError::BadNumber { line: 2, .. }
        ));
    }
}
