//! A small Lua-like language: a lexer, a backtracking parser, a compiler that writes
//! straight into a stack machine's program segment, and the machine itself.
//!
//! [compile] runs the whole front end:
//! 1. turn the source into tokens with [`lexer::tokenize`]
//! 1. parse the tokens into an AST with [`parser::parse`]
//! 1. create a [`vm::Vm`], which comes with the built-in functions preinstalled
//! 1. compile the AST into it using [`compiler::compile_chunk`], which drives the
//!    [`compiler::Compilable`] implementations of the ast-nodes
//!
//! The resulting [Script] can then be run as often as needed:
//!
//! ```
//! let mut script = minilua_lib::compile("x = 6 * 7 print(x)").unwrap();
//! let mut out = vec![];
//! script.run_with_output(&mut out).unwrap();
//! assert_eq!(out, b"42\n");
//! ```
//!
//! For single stepping, use [`vm::Vm::step`] on `script.vm` after a [`vm::Vm::reset`].

use log::{debug, trace};
use std::io::{self, Write};
use thiserror::Error;

pub mod compiler;
pub mod core;
pub mod lexer;
pub mod parser;
pub mod type_inference;
pub mod utils;
pub mod vm;

use crate::compiler::CompileError;
use crate::core::Block;
use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::vm::{RuntimeError, Vm};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Lexing failed: {0}")]
    Lex(#[from] LexError),

    #[error("Parsing failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// A compiled program together with the AST it was compiled from
#[derive(Debug, Clone)]
pub struct Script {
    pub ast: Block,
    pub vm: Vm,
}

/// Lexes, parses and compiles `source`. Nothing is returned unless every stage succeeded.
pub fn compile(source: &str) -> Result<Script, Error> {
    let tokens = lexer::tokenize(source)?;
    trace!("{} tokens: {:?}", tokens.len(), tokens);
    let ast = parser::parse(&tokens)?;
    trace!("ast:\n{ast}");
    let mut vm = Vm::new();
    compiler::compile_chunk(&ast, &mut vm)?;
    trace!("program:\n{}", vm.show_program());
    debug!(
        "compiled {} bytes of source into {} cells",
        source.len(),
        vm.program().len()
    );
    Ok(Script { ast, vm })
}

impl Script {
    /// runs the script, printing to stdout
    pub fn run(&mut self) -> Result<(), Error> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.run_with_output(&mut lock)
    }

    /// Runs the script from the start, writing whatever it prints to `out`
    pub fn run_with_output(&mut self, out: &mut dyn Write) -> Result<(), Error> {
        self.vm.reset();
        self.vm.run(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_their_stage() {
        let err = compile("x = 'open").unwrap_err();
        assert!(matches!(err, Error::Lex(_)));
        assert!(err.to_string().starts_with("Lexing failed: 1:5"));
        assert_eq!(compile("").unwrap_err(), Error::Parse(ParseError::EmptyChunk));
        assert!(matches!(compile("x = 1 + 'a'"), Err(Error::Compile(_))));
        let mut script = compile("x = 1 / 0").unwrap();
        assert!(matches!(
            script.run_with_output(&mut io::sink()),
            Err(Error::Runtime(_))
        ));
    }

    #[test]
    fn scripts_can_run_twice() {
        let mut script = compile("s = 'a' .. 1 print(s)").unwrap();
        for _ in 0..2 {
            let mut out = vec![];
            script.run_with_output(&mut out).unwrap();
            assert_eq!(out, b"a1\n");
        }
    }
}
