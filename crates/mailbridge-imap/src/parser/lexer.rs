//! Tokenizer for server responses.
//!
//! Operates on one complete response (as assembled by the framed reader,
//! literals included) and never performs I/O.

#![allow(clippy::missing_errors_doc)]

use crate::{Error, Result};

/// Lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom, including backslash-prefixed flags such as `\Seen`.
    Atom(&'a str),
    /// Quoted string with escapes resolved.
    Quoted(String),
    /// Literal payload (`{n}\r\n` followed by `n` bytes).
    Literal(Vec<u8>),
    /// Unsigned number.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `NIL`
    Nil,
    /// Line terminator.
    Crlf,
    /// End of input.
    Eof,
}

/// Cursor over a response buffer.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer positioned at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.pos..).unwrap_or_default()
    }

    /// Returns the next byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips `n` bytes, clamped to the end of input.
    pub fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.input.len());
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b' ' => Some(Token::Space),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' if self.input.get(self.pos + 1) == Some(&b'\n') => {
                self.pos += 2;
                Ok(Token::Crlf)
            }
            b'"' => self.read_quoted(),
            b'{' => self.read_literal(),
            _ if is_atom_char(byte) => Ok(self.read_atom()),
            _ => Err(self.error(format!("unexpected byte {byte:#04x}"))),
        }
    }

    fn read_quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut buf = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(escaped) => buf.push(escaped),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("unterminated quoted string"));
                }
                Some(b) => buf.push(b),
            }
        }
        Ok(Token::Quoted(String::from_utf8_lossy(&buf).into_owned()))
    }

    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &self.input[start..self.pos];
        if self.peek() == Some(b'+') {
            self.pos += 1;
        }
        if self.advance() != Some(b'}') {
            return Err(self.error("malformed literal prefix"));
        }
        if self.advance() != Some(b'\r') || self.advance() != Some(b'\n') {
            return Err(self.error("expected CRLF after literal prefix"));
        }

        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("invalid literal size"))?;
        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("truncated literal"))?;

        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(Token::Literal(data))
    }

    fn read_atom(&mut self) -> Token<'a> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        // Atom bytes are ASCII by construction.
        let text = std::str::from_utf8(raw).unwrap_or_default();

        if raw.iter().all(u8::is_ascii_digit)
            && let Ok(n) = text.parse::<u32>()
        {
            return Token::Number(n);
        }
        if text.eq_ignore_ascii_case("NIL") {
            Token::Nil
        } else {
            Token::Atom(text)
        }
    }

    /// Builds a parse error at the current position.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes a single space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(format!("expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_str(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(format!("expected atom, got {token:?}"))),
        }
    }

    /// Reads an astring. Unquoted astrings may contain brackets, which are
    /// tokenized separately elsewhere, so they are scanned byte-wise here.
    pub fn read_astring(&mut self) -> Result<String> {
        match self.peek() {
            Some(b'"' | b'{') => match self.next_token()? {
                Token::Quoted(s) => Ok(s),
                Token::Literal(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
                token => Err(self.error(format!("expected string, got {token:?}"))),
            },
            Some(b) if is_astring_char(b) => {
                let start = self.pos;
                while self.peek().is_some_and(is_astring_char) {
                    self.pos += 1;
                }
                Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
            }
            other => Err(self.error(format!("expected astring, got {other:?}"))),
        }
    }

    /// Reads an nstring (`NIL`, quoted or literal).
    pub fn read_nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::Quoted(s) => Ok(Some(s.into_bytes())),
            Token::Literal(data) => Ok(Some(data)),
            token => Err(self.error(format!("expected nstring, got {token:?}"))),
        }
    }

    /// Consumes everything up to and including the next CRLF and returns it
    /// as text.
    pub fn read_text_line(&mut self) -> String {
        let rest = self.remaining();
        let end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(rest.len());
        self.skip(end + 2);
        String::from_utf8_lossy(&rest[..end]).into_owned()
    }
}

/// Atom characters. Backslash is admitted so flags lex as one token; `[` and
/// `]` are not, so response codes and body sections tokenize.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b, 0x21 | 0x23..=0x24 | 0x26..=0x27 | 0x2B..=0x5A | 0x5C | 0x5E..=0x7A | 0x7C | 0x7E)
}

const fn is_astring_char(b: u8) -> bool {
    is_atom_char(b) || b == b'[' || b == b']' || b == b'%' || b == b'*'
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                break;
            }
            out.push(token);
        }
        out
    }

    #[test]
    fn tagged_line() {
        assert_eq!(
            tokens(b"A0001 OK done\r\n"),
            vec![
                Token::Atom("A0001"),
                Token::Space,
                Token::Atom("OK"),
                Token::Space,
                Token::Atom("done"),
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn flags_and_numbers() {
        assert_eq!(
            tokens(b"(\\Seen 42)"),
            vec![
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Number(42),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn body_section_is_split() {
        assert_eq!(
            tokens(b"BODY[]"),
            vec![Token::Atom("BODY"), Token::LBracket, Token::RBracket]
        );
    }

    #[test]
    fn literal_payload() {
        let mut lexer = Lexer::new(b"{5}\r\nhello)");
        assert_eq!(lexer.next_token().unwrap(), Token::Literal(b"hello".to_vec()));
        assert_eq!(lexer.next_token().unwrap(), Token::RParen);
    }

    #[test]
    fn truncated_literal_is_error() {
        let mut lexer = Lexer::new(b"{10}\r\nshort");
        assert!(matches!(lexer.next_token(), Err(Error::Parse { .. })));
    }

    #[test]
    fn quoted_with_escapes() {
        let mut lexer = Lexer::new(br#""a \"b\" \\c""#);
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Quoted(r#"a "b" \c"#.to_string())
        );
    }

    #[test]
    fn nil_is_case_insensitive() {
        assert_eq!(tokens(b"nil"), vec![Token::Nil]);
    }

    #[test]
    fn astring_with_brackets() {
        let mut lexer = Lexer::new(b"[Gmail]/Trash\r\n");
        assert_eq!(lexer.read_astring().unwrap(), "[Gmail]/Trash");
    }

    #[test]
    fn text_line_consumes_crlf() {
        let mut lexer = Lexer::new(b"LOGIN completed\r\n");
        assert_eq!(lexer.read_text_line(), "LOGIN completed");
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }
}
