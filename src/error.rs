//! Centralised error hierarchy for the interpreter.
//!
//! Every pipeline stage (scanner, parser, resolver, runtime) converts its
//! failure modes into a [`LoxError`] variant, which carries enough context to
//! render the canonical diagnostic line:
//!
//! * static errors:  `[line L] Error at 'lexeme': message`
//! * scanner errors: `[line L] Error: message` (no offending token yet)
//! * runtime errors: `message` followed by `[line L]` on its own line
//!
//! The module does not print anything itself; the CLI (or a test harness)
//! decides where diagnostics go and which exit code they map to.

use std::io;
use thiserror::Error;

use log::debug;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex { message: String, line: usize },

    /// Syntactic (parser) error, anchored at the offending token.
    #[error("[line {line}] Error {location}: {message}")]
    Parse {
        message: String,
        /// `at 'lexeme'`, or `at end` when the token is EOF.
        location: String,
        line: usize,
    },

    /// Static-analysis failure (self-referential initializer, bad `return`, …).
    #[error("[line {line}] Error {location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error: the message first, the line tag on the
    /// next line.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error`.  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        debug!("parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: Self::locate(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        debug!("resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            location: Self::locate(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("runtime error: line={}, msg={}", line, message);

        LoxError::Runtime { message, line }
    }

    /// True for errors produced before execution starts (scan/parse/resolve).
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. }
        )
    }

    fn locate(token: &Token<'_>) -> String {
        if token.token_type == TokenType::EOF {
            "at end".to_string()
        } else {
            format!("at '{}'", token.lexeme)
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
