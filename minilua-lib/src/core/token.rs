use derive_more::Display;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use crate::utils;

/// A 1-based row/column pair pointing into the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
#[display(fmt = "{}:{}", row, col)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum TokenKind {
    Number,
    #[strum(serialize = "STRING")]
    Str,
    Ident,
    True,
    False,
    Nil,
    If,
    ElseIf,
    Else,
    Goto,
    Break,
    For,
    While,
    Repeat,
    Until,
    Then,
    Do,
    End,
    And,
    Or,
    Not,
    In,
    Local,
    Function,
    Return,
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Length,
    DotDot,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    OpenPa,
    ClosePa,
    OpenBr,
    CloseBr,
    Comma,
}

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    use TokenKind::*;
    [
        True, False, Nil, If, ElseIf, Else, Goto, Break, For, While, Repeat, Until, Then, Do, End,
        And, Or, Not, In, Local, Function, Return,
    ]
    .into_iter()
    .filter_map(|kind| Some((kind.text()?, kind)))
    .collect()
});

impl TokenKind {
    /// looks up the keyword spelled `word`, identifiers are not keywords
    pub fn keyword(word: &str) -> Option<Self> {
        KEYWORDS.get(word).copied()
    }

    /// two character operators
    pub fn from_pair(first: char, second: char) -> Option<Self> {
        use TokenKind::*;
        Some(match (first, second) {
            ('.', '.') => DotDot,
            ('=', '=') => Eq,
            ('~', '=') => Neq,
            ('<', '=') => Le,
            ('>', '=') => Ge,
            _ => return None,
        })
    }

    pub fn from_char(c: char) -> Option<Self> {
        use TokenKind::*;
        Some(match c {
            '=' => Assign,
            '+' => Add,
            '-' => Sub,
            '*' => Mul,
            '/' => Div,
            '%' => Mod,
            '^' => Pow,
            '#' => Length,
            '<' => Lt,
            '>' => Gt,
            '(' => OpenPa,
            ')' => ClosePa,
            '[' => OpenBr,
            ']' => CloseBr,
            ',' => Comma,
            _ => return None,
        })
    }

    /// The fixed spelling of a token kind. Literal and identifier kinds have none.
    pub fn text(self) -> Option<&'static str> {
        use TokenKind::*;
        Some(match self {
            Number | Str | Ident => return None,
            True => "true",
            False => "false",
            Nil => "nil",
            If => "if",
            ElseIf => "elseif",
            Else => "else",
            Goto => "goto",
            Break => "break",
            For => "for",
            While => "while",
            Repeat => "repeat",
            Until => "until",
            Then => "then",
            Do => "do",
            End => "end",
            And => "and",
            Or => "or",
            Not => "not",
            In => "in",
            Local => "local",
            Function => "function",
            Return => "return",
            Assign => "=",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Pow => "^",
            Length => "#",
            DotDot => "..",
            Eq => "==",
            Neq => "~=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            OpenPa => "(",
            ClosePa => ")",
            OpenBr => "[",
            CloseBr => "]",
            Comma => ",",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
    pub value: Option<TokenValue>,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Position) -> Self {
        Self {
            kind,
            pos,
            value: None,
        }
    }

    pub fn number(value: i64, pos: Position) -> Self {
        Self {
            kind: TokenKind::Number,
            pos,
            value: Some(TokenValue::Int(value)),
        }
    }

    pub fn string(value: String, pos: Position) -> Self {
        Self {
            kind: TokenKind::Str,
            pos,
            value: Some(TokenValue::Str(value)),
        }
    }

    /// Creates either a keyword token or an identifier carrying its name
    pub fn word(word: String, pos: Position) -> Self {
        match TokenKind::keyword(&word) {
            Some(kind) => Self::new(kind, pos),
            None => Self {
                kind: TokenKind::Ident,
                pos,
                value: Some(TokenValue::Str(word)),
            },
        }
    }

    pub fn int(&self) -> Option<i64> {
        match self.value {
            Some(TokenValue::Int(i)) => Some(i),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            Some(TokenValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// source text that lexes back to this token
    pub fn lexeme(&self) -> String {
        match (&self.value, self.kind.text()) {
            (Some(TokenValue::Int(i)), _) => i.to_string(),
            (Some(TokenValue::Str(s)), _) if self.kind == TokenKind::Str => utils::quote(s),
            (Some(TokenValue::Str(s)), _) => s.clone(),
            (None, Some(text)) => text.to_string(),
            (None, None) => String::new(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(TokenValue::Int(i)) => write!(f, "<{}, {}> at {}", self.kind, i, self.pos),
            Some(TokenValue::Str(s)) => write!(f, "<{}, {:?}> at {}", self.kind, s, self.pos),
            None => write!(f, "<{}> at {}", self.kind, self.pos),
        }
    }
}
