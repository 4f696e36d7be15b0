//! The symbol table used during compilation.
//!
//! Symbols are never removed. Every symbol owns the heap slot equal to its index, so a
//! symbol's address never changes once handed out.

use std::ops::{Index, IndexMut};

use super::VarType;

/// the level of the outermost block, all variables live here
pub const GLOBAL_LEVEL: usize = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: VarType,
    /// heap slot holding the symbol's value
    pub addr: usize,
    /// block depth the symbol was declared at
    pub level: usize,
}

/// Index of a [Symbol] inside a [SymbolTable]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(usize);

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// returns the most recently declared symbol called `name` that is visible from
    /// `level`, which means it was declared at `level` or further out
    pub fn find(&self, name: &str, level: usize) -> Option<SymbolId> {
        self.symbols
            .iter()
            .rposition(|s| s.name == name && s.level <= level)
            .map(SymbolId)
    }

    /// Adds a new symbol without checking for an existing one
    pub fn declare(&mut self, name: &str, ty: VarType, level: usize) -> SymbolId {
        let addr = self.symbols.len();
        self.symbols.push(Symbol {
            name: name.to_string(),
            ty,
            addr,
            level,
        });
        SymbolId(addr)
    }

    /// Looks `name` up at the global level, declaring it as a nil-typed global
    /// if it doesn't exist yet
    pub fn resolve(&mut self, name: &str) -> SymbolId {
        self.find(name, GLOBAL_LEVEL)
            .unwrap_or_else(|| self.declare(name, VarType::Nil, GLOBAL_LEVEL))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}

impl Index<SymbolId> for SymbolTable {
    type Output = Symbol;

    fn index(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }
}

impl IndexMut<SymbolId> for SymbolTable {
    fn index_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }
}
