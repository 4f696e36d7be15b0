//! Local, forward-only type inference.
//!
//! There are no annotations. A variable's type is whatever the last assignment compiled
//! so far stored into it, which is what the compiler consults when it picks opcodes.

use crate::core::*;

pub trait TypeInferable {
    /// Infers the type of `self`. Identifiers that were never seen are declared as
    /// nil-typed globals on the way.
    fn infer_type(&self, symbols: &mut SymbolTable) -> VarType;
}

impl TypeInferable for Expr {
    fn infer_type(&self, symbols: &mut SymbolTable) -> VarType {
        use Expr::*;
        match self {
            Ident { name, .. } => {
                let id = symbols.resolve(name);
                symbols[id].ty
            }
            Number { .. } | True(_) | False(_) => VarType::Int,
            Str { .. } => VarType::String,
            Nil(_) => VarType::Nil,
            Paren { inner, .. } => inner.infer_type(symbols),
            // a call's value is always the literal 0
            Call { .. } | Index { .. } | Unary { .. } => VarType::Int,
            Binary { op, lhs, .. } => match op {
                BinaryOp::Concat => VarType::String,
                BinaryOp::Add if lhs.infer_type(symbols) == VarType::String => VarType::String,
                _ => VarType::Int,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn infer(src: &str, symbols: &mut SymbolTable) -> VarType {
        let tokens = tokenize(src).unwrap();
        Parser::new(&tokens).expression().unwrap().infer_type(symbols)
    }

    #[test]
    fn literals_and_operators() {
        let mut symbols = SymbolTable::new();
        assert_eq!(infer("1", &mut symbols), VarType::Int);
        assert_eq!(infer("true", &mut symbols), VarType::Int);
        assert_eq!(infer("'s'", &mut symbols), VarType::String);
        assert_eq!(infer("nil", &mut symbols), VarType::Nil);
        assert_eq!(infer("(('s'))", &mut symbols), VarType::String);
        assert_eq!(infer("1 .. 2", &mut symbols), VarType::String);
        assert_eq!(infer("'a' + 1", &mut symbols), VarType::String);
        assert_eq!(infer("1 + 'a'", &mut symbols), VarType::Int);
        assert_eq!(infer("#'abc'", &mut symbols), VarType::Int);
        assert_eq!(infer("'a' == 'b'", &mut symbols), VarType::Int);
    }

    #[test]
    fn identifiers_use_the_recorded_type() {
        let mut symbols = SymbolTable::new();
        assert_eq!(infer("x", &mut symbols), VarType::Nil);
        assert_eq!(symbols.len(), 1);
        let x = symbols.resolve("x");
        symbols[x].ty = VarType::String;
        assert_eq!(infer("x + 1", &mut symbols), VarType::String);
        assert_eq!(infer("x(1)", &mut symbols), VarType::Int);
    }
}
