//! Deals with types

use derive_more::Display;

/// Represents type information at compile time. Types are inferred per expression and
/// recorded per symbol on every assignment; there are no annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum VarType {
    #[default]
    Nil,
    Int,
    String,
    /// reserved for tables, nothing produces it yet
    Dict,
    Function,
}

impl VarType {
    /// types arithmetic accepts, nil counts as 0
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Nil | Self::Int)
    }
}
