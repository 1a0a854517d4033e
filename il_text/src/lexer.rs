//! A small hand-rolled lexer for the textual IL. There is no keyword
//! table to load: the grammar (§4.3.1) has a fixed, small token set.

use il_support::SourceLoc;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),   // bareword mnemonics, labels, type names
    At(String),      // @NAME
    Percent(String),   // %NAME or %tN
    Int(i64),
    Float(f64),
    /// A dotted numeric literal with 2+ dots, e.g. the module version
    /// `0.1.2` — kept as raw text since it is never arithmetic.
    Version(String),
    Str(String),
    Colon,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Arrow, // ->
    Eq,
    Dot,   // leading dot of `.loc`
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLoc,
}

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    file_id: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, file_id: u32) -> Self {
        Self { src, bytes: src.as_bytes(), pos: 0, line: 1, col: 1, file_id }
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::new(self.file_id, self.line, self.col)
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.bump();
                }
                Some(b';') => {
                    while !matches!(self.peek_byte(), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, (String, SourceLoc)> {
        self.skip_trivia();
        let loc = self.loc();
        let Some(b) = self.peek_byte() else {
            return Ok(Token { kind: TokenKind::Eof, loc });
        };
        let kind = match b {
            b':' => {
                self.bump();
                TokenKind::Colon
            }
            b',' => {
                self.bump();
                TokenKind::Comma
            }
            b'(' => {
                self.bump();
                TokenKind::LParen
            }
            b')' => {
                self.bump();
                TokenKind::RParen
            }
            b'{' => {
                self.bump();
                TokenKind::LBrace
            }
            b'}' => {
                self.bump();
                TokenKind::RBrace
            }
            b'=' => {
                self.bump();
                TokenKind::Eq
            }
            b'.' => {
                self.bump();
                TokenKind::Dot
            }
            b'-' if self.bytes.get(self.pos + 1) == Some(&b'>') => {
                self.bump();
                self.bump();
                TokenKind::Arrow
            }
            b'@' => {
                self.bump();
                TokenKind::At(self.lex_name())
            }
            b'%' => {
                self.bump();
                TokenKind::Percent(self.lex_name())
            }
            b'"' => TokenKind::Str(self.lex_string()?),
            b'-' | b'0'..=b'9' => self.lex_number(),
            b if is_ident_start(b) => TokenKind::Ident(self.lex_name()),
            other => {
                return Err((format!("unexpected character `{}`", other as char), loc));
            }
        };
        Ok(Token { kind, loc })
    }

    fn lex_name(&mut self) -> String {
        let start = self.pos;
        while self.peek_byte().is_some_and(is_ident_continue) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn lex_string(&mut self) -> Result<String, (String, SourceLoc)> {
        let loc = self.loc();
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(b'"') => return Ok(out),
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(other) => out.push(other as char),
                    None => return Err(("unterminated string literal".to_string(), loc)),
                },
                Some(b) => out.push(b as char),
                None => return Err(("unterminated string literal".to_string(), loc)),
            }
        }
    }

    fn lex_number(&mut self) -> TokenKind {
        let start = self.pos;
        if self.peek_byte() == Some(b'-') {
            self.bump();
        }
        while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
        }
        let mut dot_groups = 0;
        while self.peek_byte() == Some(b'.') && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit) {
            dot_groups += 1;
            self.bump();
            while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                self.bump();
            }
        }
        let mut has_exponent = false;
        if dot_groups <= 1 && matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            has_exponent = true;
            self.bump();
            if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                self.bump();
            }
            while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.src[start..self.pos];
        if dot_groups >= 2 {
            TokenKind::Version(text.to_string())
        } else if dot_groups == 1 || has_exponent {
            TokenKind::Float(text.parse().expect("lexer only emits well-formed float text"))
        } else {
            TokenKind::Int(text.parse().expect("lexer only emits well-formed int text"))
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}
