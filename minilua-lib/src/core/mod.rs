//! contains all important data structures

pub mod token;
pub use token::*;

pub mod ast;
pub use ast::*;

pub mod types;
pub use types::*;

pub mod symbols;
pub use symbols::*;

pub mod opcode;
pub use opcode::*;

pub mod program;
pub use program::*;
