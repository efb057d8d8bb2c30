//! Streaming lexer for Wilson source text.
//!
//! [`Scanner`] is an iterator of `Result<Token<'a>>`.  It skips whitespace and
//! `//` comments, yields one item per token or lexical error, then exactly one
//! `EOF` token, then `None` forever.  A lexical error does not stop the
//! iterator: the offending text is stepped over and scanning resumes, so
//! `wilson tokenize` can report every bad character in one run.  Callers that
//! want the first error only use [`Scanner::scan_all`].
//!
//! Lexemes are slices of the source text.  Only string literal payloads are
//! copied out.  Keywords are looked up in a compile-time perfect-hash map, and
//! comment bodies are skipped with a single `memchr` call.

use std::iter::FusedIterator;

use log::{debug, info};
use memchr::memchr;
use phf::phf_map;

use crate::error::{Result, WilsonError};
use crate::token::{Literal, Token, TokenType};

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// What one step of the lexer found.
enum Lexeme {
    /// Whitespace, a newline, or a comment.
    Skip,
    Token(TokenType, Option<Literal>),
}

pub struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    start: usize, // first byte of the lexeme being scanned
    pos: usize,   // next byte to examine
    line: usize,
    done: bool, // EOF already emitted
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        info!("Scanner created over {} bytes", text.len());

        Self {
            text,
            bytes: text.as_bytes(),
            start: 0,
            pos: 0,
            line: 1,
            done: false,
        }
    }

    /// Scan the whole input, stopping at the first lexical error.
    pub fn scan_all(self) -> Result<Vec<Token<'a>>> {
        self.collect()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Byte `ahead` positions past the cursor, or `0` past the end.
    #[inline(always)]
    fn peek_at(&self, ahead: usize) -> u8 {
        self.bytes.get(self.pos + ahead).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos += 1;
        b
    }

    /// `double` if the next byte is `=` (consuming it), otherwise `single`.
    #[inline(always)]
    fn with_equal(&mut self, double: TokenType, single: TokenType) -> TokenType {
        if self.peek_at(0) == b'=' {
            self.pos += 1;
            double
        } else {
            single
        }
    }

    fn lex(&mut self) -> Result<Lexeme> {
        let kind = match self.bump() {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,

            b'!' => self.with_equal(TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.with_equal(TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.with_equal(TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.with_equal(TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'/' if self.peek_at(0) == b'/' => {
                // Stop on the newline so the main loop still counts it.
                self.pos = match memchr(b'\n', &self.bytes[self.pos..]) {
                    Some(offset) => self.pos + offset,
                    None => self.bytes.len(),
                };
                return Ok(Lexeme::Skip);
            }
            b'/' => TokenType::SLASH,

            b' ' | b'\r' | b'\t' => return Ok(Lexeme::Skip),
            b'\n' => {
                self.line += 1;
                return Ok(Lexeme::Skip);
            }

            b'"' => return self.string(),
            b'0'..=b'9' => return Ok(self.number()),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            other => {
                // Step over the whole code point so a multi-byte character
                // is reported once.
                let ch = self.text[self.start..]
                    .chars()
                    .next()
                    .unwrap_or(other as char);
                self.pos = self.start + ch.len_utf8();

                return Err(WilsonError::lex(
                    self.line,
                    format!("Unexpected character: {}", ch),
                ));
            }
        };

        Ok(Lexeme::Token(kind, None))
    }

    /// Body of a string literal; the opening quote is already consumed.
    /// Strings may span lines.
    fn string(&mut self) -> Result<Lexeme> {
        let close = match memchr(b'"', &self.bytes[self.pos..]) {
            Some(offset) => self.pos + offset,
            None => {
                self.line += self.bytes[self.pos..].iter().filter(|&&b| b == b'\n').count();
                self.pos = self.bytes.len();
                return Err(WilsonError::lex(self.line, "Unterminated string."));
            }
        };

        let body: &str = &self.text[self.pos..close];
        self.line += body.bytes().filter(|&b| b == b'\n').count();
        self.pos = close + 1;

        Ok(Lexeme::Token(
            TokenType::STRING,
            Some(Literal::Str(body.to_owned())),
        ))
    }

    /// `123` or `3.14`; a trailing `.` without digits is not part of the number.
    fn number(&mut self) -> Lexeme {
        while self.peek_at(0).is_ascii_digit() {
            self.pos += 1;
        }

        if self.peek_at(0) == b'.' && self.peek_at(1).is_ascii_digit() {
            self.pos += 1;
            while self.peek_at(0).is_ascii_digit() {
                self.pos += 1;
            }
        }

        // Only ASCII digits and at most one interior '.', which always parses.
        let value: f64 = self.text[self.start..self.pos].parse().unwrap_or_default();

        Lexeme::Token(TokenType::NUMBER, Some(Literal::Number(value)))
    }

    fn identifier(&mut self) -> TokenType {
        while matches!(self.peek_at(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.pos += 1;
        }

        KEYWORDS
            .get(&self.bytes[self.start..self.pos])
            .copied()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.is_at_end() {
                if self.done {
                    return None;
                }
                self.done = true;
                return Some(Ok(Token::new(TokenType::EOF, "", None, self.line)));
            }

            self.start = self.pos;

            match self.lex() {
                Ok(Lexeme::Skip) => continue,

                Ok(Lexeme::Token(kind, literal)) => {
                    let text: &'a str = self.text;
                    let lexeme: &'a str = &text[self.start..self.pos];
                    debug!("Scanned {} on line {}", kind, self.line);

                    return Some(Ok(Token::new(kind, lexeme, literal, self.line)));
                }

                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
