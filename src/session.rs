//! One interpreter session: runs units of source text (a file, or one REPL
//! submission each) against a single persistent global scope.

use std::io::Write;

use log::{debug, info};

use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

pub struct Session {
    interpreter: Interpreter,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A session printing to stdout.
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
        }
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self {
            interpreter: Interpreter::with_output(output),
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Scan, parse, resolve, then execute one unit.
    ///
    /// Static errors return before anything runs.  A runtime error stops the
    /// unit where it happened; global definitions made before it are kept.
    pub fn run(&mut self, source: &str) -> Result<()> {
        info!("Running unit of {} bytes", source.len());

        let tokens = Scanner::new(source).scan_all()?;
        let statements = Parser::new(&tokens).parse()?;

        debug!("Parsed statements: {:?}", statements);

        let locals = Resolver::new().resolve(&statements)?;
        self.interpreter.note_locals(locals);
        self.interpreter.interpret(&statements)?;

        Ok(())
    }
}
