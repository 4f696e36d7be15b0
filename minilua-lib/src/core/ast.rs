//! The syntax tree produced by the [parser](crate::parser).
//!
//! Every node renders back to source text via `Display`. The rendering spaces out every
//! token, so re-parsing it yields the same tree and rendering that again yields the same
//! text.

use std::fmt;

use super::{Position, TokenKind};
use crate::utils;

/// A sequence of statements. `level` is the nesting depth, 0 for the chunk itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub level: usize,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Do(Block),
    While {
        cond: Expr,
        body: Block,
    },
    For {
        init: Assignment,
        end: Expr,
        step: Option<Expr>,
        body: Block,
    },
    Repeat {
        body: Block,
        cond: Expr,
    },
    /// `conds` and `branches` have the same length, the first is the `if`, the rest are
    /// `elseif`s
    If {
        conds: Vec<Expr>,
        branches: Vec<Block>,
        else_branch: Option<Block>,
    },
    Assignment(Assignment),
    Expression(Expr),
    /// Marks the spot where a block stopped because no statement could be formed.
    /// Compiles to nothing and renders as nothing.
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum UnaryOp {
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "#")]
    Length,
    #[strum(serialize = "-")]
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum BinaryOp {
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "~=")]
    Neq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "..")]
    Concat,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "^")]
    Pow,
}

impl UnaryOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Not => Self::Not,
            TokenKind::Length => Self::Length,
            TokenKind::Sub => Self::Neg,
            _ => return None,
        })
    }
}

impl BinaryOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        use BinaryOp::*;
        Some(match kind {
            TokenKind::Or => Or,
            TokenKind::And => And,
            TokenKind::Eq => Eq,
            TokenKind::Neq => Neq,
            TokenKind::Lt => Lt,
            TokenKind::Le => Le,
            TokenKind::Gt => Gt,
            TokenKind::Ge => Ge,
            TokenKind::DotDot => Concat,
            TokenKind::Add => Add,
            TokenKind::Sub => Sub,
            TokenKind::Mul => Mul,
            TokenKind::Div => Div,
            TokenKind::Mod => Mod,
            TokenKind::Pow => Pow,
            _ => return None,
        })
    }
}

/// Binary nodes carry the position of their operator, all others that of their first token
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident {
        name: String,
        pos: Position,
    },
    Number {
        value: i64,
        pos: Position,
    },
    Str {
        value: String,
        pos: Position,
    },
    True(Position),
    False(Position),
    Nil(Position),
    Paren {
        inner: Box<Expr>,
        pos: Position,
    },
    Call {
        callee: Box<Expr>,
        arg: Box<Expr>,
        pos: Position,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        pos: Position,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Position,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Position,
    },
}

impl Expr {
    pub fn pos(&self) -> Position {
        use Expr::*;
        match self {
            Ident { pos, .. }
            | Number { pos, .. }
            | Str { pos, .. }
            | Paren { pos, .. }
            | Call { pos, .. }
            | Index { pos, .. }
            | Unary { pos, .. }
            | Binary { pos, .. } => *pos,
            True(pos) | False(pos) | Nil(pos) => *pos,
        }
    }

    /// The variable this expression names, looking through parentheses
    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            Expr::Ident { name, .. } => Some(name),
            Expr::Paren { inner, .. } => inner.symbol_name(),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Expr::*;
        match self {
            Ident { name, .. } => write!(f, "{name}"),
            Number { value, .. } => write!(f, "{value}"),
            Str { value, .. } => write!(f, "{}", utils::quote(value)),
            True(_) => write!(f, "true"),
            False(_) => write!(f, "false"),
            Nil(_) => write!(f, "nil"),
            Paren { inner, .. } => write!(f, "( {inner} )"),
            Call { callee, arg, .. } => write!(f, "{callee} ( {arg} )"),
            Index { target, index, .. } => write!(f, "{target} [ {index} ]"),
            Unary { op, operand, .. } => write!(f, "{op} {operand}"),
            Binary { op, lhs, rhs, .. } => write!(f, "{lhs} {op} {rhs}"),
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.target, self.value)
    }
}

impl Statement {
    /// renders the statement indented for a block at `level`
    fn render(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        let pad = utils::padding(level);
        match self {
            Statement::Do(body) => write!(f, "{pad}do\n{body}{pad}end\n"),
            Statement::While { cond, body } => {
                write!(f, "{pad}while {cond} do\n{body}{pad}end\n")
            }
            Statement::For {
                init,
                end,
                step,
                body,
            } => {
                write!(f, "{pad}for {init}, {end}")?;
                if let Some(step) = step {
                    write!(f, ", {step}")?;
                }
                write!(f, " do\n{body}{pad}end\n")
            }
            Statement::Repeat { body, cond } => {
                write!(f, "{pad}repeat\n{body}{pad}until {cond}\n")
            }
            Statement::If {
                conds,
                branches,
                else_branch,
            } => {
                for (i, (cond, branch)) in conds.iter().zip(branches).enumerate() {
                    let keyword = if i == 0 { "if" } else { "elseif" };
                    write!(f, "{pad}{keyword} {cond} then\n{branch}")?;
                }
                if let Some(branch) = else_branch {
                    write!(f, "{pad}else\n{branch}")?;
                }
                writeln!(f, "{pad}end")
            }
            Statement::Assignment(a) => writeln!(f, "{pad}{a}"),
            Statement::Expression(e) => writeln!(f, "{pad}{e}"),
            Statement::Null => Ok(()),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            stmt.render(f, self.level)?;
        }
        Ok(())
    }
}
