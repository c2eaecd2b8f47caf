//! PostScript tokenizer.

use convector_core::{ConvectorError, ConvectorResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    /// Executable name, including `[`, `]`, `<<` and `>>`.
    Name(String),
    /// `/name`
    LiteralName(String),
    /// `//name`, looked up when scanned.
    ImmediateName(String),
    String(Vec<u8>),
    ProcBegin,
    ProcEnd,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

pub(crate) struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_blanks(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.bump() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Next token, `None` at end of input.
    pub fn next_token(&mut self) -> ConvectorResult<Option<Token>> {
        self.skip_blanks();
        let Some(b) = self.bump() else {
            return Ok(None);
        };
        let token = match b {
            b'(' => Token::String(self.string()?),
            b'<' => match self.peek() {
                Some(b'<') => {
                    self.pos += 1;
                    Token::Name("<<".into())
                }
                Some(b'~') => {
                    return Err(ConvectorError::UnsupportedOperator(
                        "ASCII85 string".into(),
                    ))
                }
                _ => Token::String(self.hex_string()?),
            },
            b'>' => {
                if self.bump() == Some(b'>') {
                    Token::Name(">>".into())
                } else {
                    return Err(ConvectorError::malformed("unexpected >"));
                }
            }
            b'[' => Token::Name("[".into()),
            b']' => Token::Name("]".into()),
            b'{' => Token::ProcBegin,
            b'}' => Token::ProcEnd,
            b')' => return Err(ConvectorError::malformed("unbalanced )")),
            b'/' => {
                if self.peek() == Some(b'/') {
                    self.pos += 1;
                    Token::ImmediateName(self.regular())
                } else {
                    Token::LiteralName(self.regular())
                }
            }
            _ => {
                self.pos -= 1;
                let word = self.regular();
                match parse_number(&word) {
                    Some(n) => Token::Number(n),
                    None => Token::Name(word),
                }
            }
        };
        Ok(Some(token))
    }

    /// A run of regular characters.
    fn regular(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Literal string body after the opening parenthesis.
    fn string(&mut self) -> ConvectorResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut depth = 0;
        loop {
            let Some(b) = self.bump() else {
                return Err(ConvectorError::malformed("unterminated string"));
            };
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' if depth == 0 => return Ok(out),
                b')' => {
                    depth -= 1;
                    out.push(b);
                }
                b'\\' => self.escape(&mut out)?,
                _ => out.push(b),
            }
        }
    }

    fn escape(&mut self, out: &mut Vec<u8>) -> ConvectorResult<()> {
        let Some(b) = self.bump() else {
            return Err(ConvectorError::malformed("unterminated string"));
        };
        match b {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(b'\x08'),
            b'f' => out.push(b'\x0c'),
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut code = (b - b'0') as u32;
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            code = code * 8 + (d - b'0') as u32;
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                out.push((code & 0xff) as u8);
            }
            // `\\`, `\(`, `\)` and unknown escapes stand for the character
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_string(&mut self) -> ConvectorResult<Vec<u8>> {
        let mut digits = Vec::new();
        loop {
            let Some(b) = self.bump() else {
                return Err(ConvectorError::malformed("unterminated hex string"));
            };
            match b {
                b'>' => break,
                b if is_whitespace(b) => {}
                b if b.is_ascii_hexdigit() => digits.push(hex_value(b)),
                other => {
                    return Err(ConvectorError::malformed(format!(
                        "invalid hex digit {:?}",
                        other as char
                    )))
                }
            }
        }
        if digits.len() % 2 == 1 {
            digits.push(0);
        }
        Ok(digits.chunks(2).map(|d| d[0] << 4 | d[1]).collect())
    }
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

/// Integers, reals and `radix#digits` numbers.
fn parse_number(word: &str) -> Option<f64> {
    if let Some((radix, digits)) = word.split_once('#') {
        let radix: u32 = radix.parse().ok()?;
        if !(2..=36).contains(&radix) {
            return None;
        }
        return i64::from_str_radix(digits, radix).ok().map(|v| v as f64);
    }
    let first = word.bytes().next()?;
    if !(first.is_ascii_digit() || matches!(first, b'+' | b'-' | b'.')) {
        return None;
    }
    if !word.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    // Rust accepts forms such as "inf" and "1_0" that PostScript does not
    if word
        .bytes()
        .any(|b| !(b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E')))
    {
        return None;
    }
    word.parse::<f64>().ok()
}
