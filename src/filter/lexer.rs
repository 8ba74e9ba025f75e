//! Hand-rolled lexer (spec.md §4.B.1).
//!
//! No regex, no grammar file: a single forward scan over the source bytes,
//! dispatching on the current character. The only context the lexer keeps
//! is the *previously emitted* token, used solely to disambiguate a
//! leading `-` as a negative-number literal versus the binary `Diff`
//! operator.

use super::error::{CompileError, SyntaxErrorKind};
use super::token::{Opcode, Token, TokenKind, KEYWORD_TABLE, OPERATOR_TABLE};

/// Numbers longer than this many bytes are rejected as malformed rather
/// than silently truncated.
const MAX_NUMBER_LEN: usize = 63;

/// Scans a source expression into a flat `Vec<Token>`.
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    last: Option<TokenKind>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `src`.
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self { src, bytes: src.as_bytes(), pos: 0, last: None }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            self.last = Some(tok.kind.clone());
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn err(&self, offset: usize, kind: SyntaxErrorKind) -> CompileError {
        CompileError { offset, kind }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// A leading `-` is part of a number literal (not the `Diff` operator)
    /// when there is no preceding operand for it to subtract from: at the
    /// start of input, right after `(`, or right after another operator.
    fn minus_starts_number(&self) -> bool {
        match &self.last {
            None => true,
            Some(TokenKind::Op(Opcode::CParen)) => false,
            Some(TokenKind::Op(_)) => true,
            Some(TokenKind::Num(_) | TokenKind::Str(_) | TokenKind::Selector(_) | TokenKind::Tuple(_)) => {
                false
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, CompileError> {
        self.skip_whitespace();
        let Some(&b) = self.bytes.get(self.pos) else {
            return Ok(None);
        };
        let start = self.pos;

        if b == b'"' {
            return self.lex_string(start).map(Some);
        }
        if b == b'.' {
            return self.lex_selector(start).map(Some);
        }
        if b.is_ascii_digit() || (b == b'-' && self.minus_starts_number() && self.starts_digit_after_minus()) {
            return self.lex_number(start).map(Some);
        }
        if b.is_ascii_alphabetic() || b == b'_' {
            return self.lex_keyword(start).map(Some);
        }
        if let Some(entry) = self.longest_operator_match() {
            self.pos += entry.glyph.len();
            return Ok(Some(Token { kind: TokenKind::Op(entry.opcode), offset: start }));
        }

        Err(self.err(start, SyntaxErrorKind::UnexpectedChar))
    }

    fn starts_digit_after_minus(&self) -> bool {
        self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit)
    }

    fn longest_operator_match(&self) -> Option<&'static super::token::OpEntry> {
        let remaining = &self.src[self.pos..];
        OPERATOR_TABLE
            .iter()
            .filter(|entry| remaining.starts_with(entry.glyph))
            .max_by_key(|entry| entry.glyph.len())
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, CompileError> {
        let mut end = self.pos;
        if self.bytes[end] == b'-' {
            end += 1;
        }
        let mut seen_dot = false;
        while let Some(&c) = self.bytes.get(end) {
            if c.is_ascii_digit() {
                end += 1;
            } else if c == b'.' && !seen_dot && self.bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
                seen_dot = true;
                end += 1;
            } else {
                break;
            }
        }
        if end - start > MAX_NUMBER_LEN {
            return Err(self.err(start, SyntaxErrorKind::NumberTooLong));
        }
        let text = &self.src[start..end];
        let value: f64 =
            text.parse().map_err(|_| self.err(start, SyntaxErrorKind::InvalidNumber))?;
        self.pos = end;
        Ok(Token { kind: TokenKind::Num(value), offset: start })
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, CompileError> {
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            match self.bytes.get(self.pos) {
                None => return Err(self.err(start, SyntaxErrorKind::UnterminatedString)),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.bytes.get(self.pos) {
                        Some(&c) => {
                            out.push(c as char);
                            self.pos += 1;
                        }
                        None => return Err(self.err(start, SyntaxErrorKind::UnterminatedString)),
                    }
                }
                Some(&c) => {
                    out.push(c as char);
                    self.pos += 1;
                }
            }
        }
        Ok(Token { kind: TokenKind::Str(out), offset: start })
    }

    fn lex_selector(&mut self, start: usize) -> Result<Token, CompileError> {
        self.pos += 1; // leading dot
        let field_start = self.pos;
        while self.bytes.get(self.pos).is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_' || *c == b'.') {
            self.pos += 1;
        }
        if self.pos == field_start {
            return Err(self.err(start, SyntaxErrorKind::UnexpectedChar));
        }
        Ok(Token {
            kind: TokenKind::Selector(self.src[field_start..self.pos].to_string()),
            offset: start,
        })
    }

    fn lex_keyword(&mut self, start: usize) -> Result<Token, CompileError> {
        let mut end = self.pos;
        while self.bytes.get(end).is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_') {
            end += 1;
        }
        let word = &self.src[start..end];
        self.pos = end;
        match word {
            "true" => Ok(Token { kind: TokenKind::Num(1.0), offset: start }),
            "false" => Ok(Token { kind: TokenKind::Num(0.0), offset: start }),
            _ => {
                let lower = word.to_ascii_lowercase();
                KEYWORD_TABLE
                    .iter()
                    .find(|(kw, _)| *kw == lower)
                    .map(|(_, op)| Token { kind: TokenKind::Op(*op), offset: start })
                    .ok_or_else(|| self.err(start, SyntaxErrorKind::UnknownOperator))
            }
        }
    }
}
