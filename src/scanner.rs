//! One-pass, streaming lexer over a raw source buffer.
//!
//! [`Scanner`] turns a byte slice into a sequence of [`Token`]s, skipping
//! whitespace and `//` comments and emitting exactly one `EOF` token at the
//! end.  It is a [`FusedIterator`] yielding `Result<Token, LoxError>`: a
//! lexical error (unexpected character, unterminated string) is reported as
//! an `Err` item and scanning continues with the next byte, so the token
//! stream always terminates with `EOF` no matter how broken the input is.
//!
//! Tokens borrow their lexemes straight out of the source buffer, so the
//! whole phase allocates only for decoded string literals.

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

/// Reserved words, resolved through a compile-time perfect-hash map after an
/// identifier run completes.  `class`, `super` and `this` stay reserved even
/// though the grammar gives them no productions.
static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// Single-pass scanner.  The lifetime `'a` ties every emitted token's
/// `lexeme` slice back to the original source buffer.
pub struct Scanner<'a> {
    src: &'a [u8],
    start: usize, // first byte of the lexeme being scanned
    curr: usize,  // one past the last byte examined
    line: usize,  // 1-based, incremented on '\n'
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        info!("scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
        }
    }

    // ───────────────────────── primitive helpers ─────────────────────────

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.src.len()
    }

    /// Consume and return the current byte.  Callers guard with
    /// [`is_at_end`] first.
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.curr];
        self.curr += 1;
        b
    }

    /// Current byte without consuming it; `0` past EOF so call sites do not
    /// need a branch.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.src[self.curr]
        }
    }

    /// One byte beyond [`peek`].  Needed only to decide whether a `.` starts
    /// a fraction or is a lone dot token.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.src.len() {
            0
        } else {
            self.src[self.curr + 1]
        }
    }

    /// Consume the current byte iff it equals `expected`; `true` on success.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.curr += 1;
            true
        } else {
            false
        }
    }

    /// The lexeme scanned so far, as `&str`.  The source is required to be
    /// valid UTF-8 and every lexeme boundary falls on an ASCII byte, so the
    /// unchecked conversion is sound.
    #[inline(always)]
    fn lexeme(&self) -> &'a str {
        let slice: &[u8] = &self.src[self.start..self.curr];
        unsafe { std::str::from_utf8_unchecked(slice) }
    }

    // ───────────────────────────── core lexing ───────────────────────────

    /// Scan one lexeme starting at `self.start`.  Returns `Ok(Some(kind))`
    /// for a real token, `Ok(None)` for skipped whitespace or a comment, and
    /// `Err` for a lexical error.
    fn scan_token(&mut self) -> Result<Option<TokenType>> {
        let b = self.advance();

        let tt = match b {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,

            b'!' => {
                if self.match_byte(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                }
            }

            b'=' => {
                if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                }
            }

            b'<' => {
                if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                }
            }

            b'>' => {
                if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                }
            }

            b' ' | b'\r' | b'\t' => return Ok(None),

            b'\n' => {
                self.line += 1;
                return Ok(None);
            }

            b'/' => {
                if self.match_byte(b'/') {
                    // Bulk-skip the comment body to the next newline; the
                    // '\n' itself is left for the main loop to count.
                    match memchr(b'\n', &self.src[self.curr..]) {
                        Some(pos) => self.curr += pos,
                        None => self.curr = self.src.len(),
                    }

                    return Ok(None);
                }

                TokenType::SLASH
            }

            b'"' => return self.string().map(Some),

            b'0'..=b'9' => self.number(),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", b as char),
                ));
            }
        };

        Ok(Some(tt))
    }

    /// Double-quoted string literal.  No escape sequences: the literal runs
    /// to the next `"` and may span lines.
    fn string(&mut self) -> Result<TokenType> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // closing quote

        let slice: &[u8] = &self.src[self.start + 1..self.curr - 1];
        let s: &str = unsafe { std::str::from_utf8_unchecked(slice) };

        Ok(TokenType::STRING(s.to_owned()))
    }

    /// Numeric literal: digits with an optional `.digits` fraction.  A
    /// trailing `.` with no digit after it is *not* consumed, so `123.`
    /// scans as the number `123` followed by a dot token.
    fn number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        // Lexeme is all ASCII digits and at most one dot; parse cannot fail.
        let n: f64 = self.lexeme().parse::<f64>().unwrap_or(0.0);

        TokenType::NUMBER(n)
    }

    /// Identifier run, then a keyword-table lookup to decide between a
    /// reserved word and `IDENTIFIER`.
    fn identifier(&mut self) -> TokenType {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }

        KEYWORDS
            .get(&self.src[self.start..self.curr])
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.curr <= self.src.len() {
            // Emit exactly one EOF, then fuse.
            if self.curr == self.src.len() {
                self.curr += 1;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
            }

            self.start = self.curr;

            match self.scan_token() {
                Err(e) => return Some(Err(e)),

                Ok(Some(tt)) => {
                    debug!("scanned {:?} on line {}", tt, self.line);
                    return Some(Ok(Token::new(tt, self.lexeme(), self.line)));
                }

                // whitespace / comment, keep going
                Ok(None) => {}
            }
        }

        None
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
