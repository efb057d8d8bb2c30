//! Centralised error hierarchy for the **Wilson interpreter**.
//!
//! Static failures (scanner, parser, resolver) and runtime failures are kept
//! apart: static errors abort a unit before anything executes, runtime errors
//! abort it part-way through.  Both convert into [`WilsonError`] so the driver
//! has a single `Result<T>` alias to report from.
//!
//! The module **does not** print diagnostics itself.

use std::io;
use thiserror::Error;

use log::info;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WilsonError {
    /// Lexical (scanner) error with source line information.
    #[error("[Line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.  `location` is ` at end` or ` at 'lexeme'`.
    #[error("[Line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static scope failure found by the resolver.
    #[error("[Line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error.
    #[error("{}\n[Line {}]", .0, .0.line())]
    Runtime(#[from] RuntimeError),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl WilsonError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        WilsonError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<L: Into<String>, S: Into<String>>(line: usize, location: L, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", line, message);

        WilsonError::Parse {
            message,
            location: location.into(),
            line,
        }
    }

    /// Helper constructor for the **resolver**; always points at a name.
    pub fn resolve<S: Into<String>>(line: usize, name: &str, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", line, message);

        WilsonError::Resolve {
            message,
            location: format!(" at '{}'", name),
            line,
        }
    }

    /// `true` for failures detected before any statement executes.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            WilsonError::Lex { .. } | WilsonError::Parse { .. } | WilsonError::Resolve { .. }
        )
    }

    /// Process exit code the driver should use for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            WilsonError::Lex { .. } | WilsonError::Parse { .. } | WilsonError::Resolve { .. } => 65,
            WilsonError::Runtime(_) => 70,
            WilsonError::Io(_) | WilsonError::Utf8(_) => 74,
        }
    }
}

/// Failures raised while executing a resolved program.
///
/// Every variant carries the line of the token that caused it, which the
/// driver prints on the line after the message.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Wrong operand type(s) for an operator.
    #[error("{message}")]
    Type { message: String, line: usize },

    /// Read of, or assignment to, a name no scope in the chain owns.
    #[error("Undefined variable '{name}'.")]
    UndefinedVariable { name: String, line: usize },

    /// Call on a value that is not callable.
    #[error("Can only call functions.")]
    NotCallable { line: usize },

    /// Argument count differs from the callee's arity.
    #[error("Expected {expected} arguments but got {actual}.")]
    Arity {
        expected: usize,
        actual: usize,
        line: usize,
    },

    /// User-level calls nested deeper than the interpreter allows.
    #[error("Stack overflow.")]
    StackOverflow { line: usize },

    /// A native builtin failed.
    #[error("{message}")]
    Native { message: String, line: usize },

    /// Writing a `print` line to the output sink failed.
    #[error("Failed to write output: {source}")]
    Output {
        #[source]
        source: io::Error,
        line: usize,
    },
}

impl RuntimeError {
    pub fn type_error<S: Into<String>>(line: usize, msg: S) -> Self {
        RuntimeError::Type {
            message: msg.into(),
            line,
        }
    }

    pub fn undefined(name: &str, line: usize) -> Self {
        RuntimeError::UndefinedVariable {
            name: name.to_string(),
            line,
        }
    }

    /// Source line the error is reported against.
    pub fn line(&self) -> usize {
        match self {
            RuntimeError::Type { line, .. }
            | RuntimeError::UndefinedVariable { line, .. }
            | RuntimeError::NotCallable { line }
            | RuntimeError::Arity { line, .. }
            | RuntimeError::StackOverflow { line }
            | RuntimeError::Native { line, .. }
            | RuntimeError::Output { line, .. } => *line,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, WilsonError>;
