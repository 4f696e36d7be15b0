//! A backtracking recursive-descent parser.
//!
//! Every rule either succeeds and leaves the cursor behind what it consumed, or fails and
//! leaves the cursor where it started. Nothing is reported for a failing rule. A block simply
//! ends at the first token that doesn't start a statement, and only the chunk complains
//! about tokens nobody consumed.
//!
//! Expression precedence, loosest first:
//! `or`, `and`, comparisons, `..`, `+ -`, `* / %`, unary `not # -`, `^`, call and index.
//! All binary levels associate to the left.

use thiserror::Error;

use crate::core::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("there is nothing to parse")]
    EmptyChunk,

    #[error("{pos}: unexpected {found}")]
    UnexpectedToken { pos: Position, found: String },

    #[error("{pos}: nesting is deeper than {} levels", MAX_NESTING)]
    TooDeep { pos: Position },
}

/// how many blocks and bracketed expressions may be open at once
pub const MAX_NESTING: usize = 64;

/// Parses a whole chunk. Fails if the tokens don't form a chunk or if any are left over.
pub fn parse(tokens: &[Token]) -> Result<Block, ParseError> {
    let mut parser = Parser::new(tokens);
    let chunk = parser.block(GLOBAL_LEVEL);
    if let Some(pos) = parser.too_deep {
        return Err(ParseError::TooDeep { pos });
    }
    let chunk = chunk.ok_or(ParseError::EmptyChunk)?;
    if let Some(tok) = tokens.get(parser.pos) {
        return Err(ParseError::UnexpectedToken {
            pos: tok.pos,
            found: tok.kind.text().map_or_else(|| tok.lexeme(), str::to_string),
        });
    }
    Ok(chunk)
}

/// The cursor over the token slice. Only the rules in this module move it.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    /// where the nesting limit was first hit
    too_deep: Option<Position>,
}

const OR: &[BinaryOp] = &[BinaryOp::Or];
const AND: &[BinaryOp] = &[BinaryOp::And];
const COMPARISON: &[BinaryOp] = &[
    BinaryOp::Eq,
    BinaryOp::Neq,
    BinaryOp::Lt,
    BinaryOp::Le,
    BinaryOp::Gt,
    BinaryOp::Ge,
];
const CONCAT: &[BinaryOp] = &[BinaryOp::Concat];
const ADDITIVE: &[BinaryOp] = &[BinaryOp::Add, BinaryOp::Sub];
const MULTIPLICATIVE: &[BinaryOp] = &[BinaryOp::Mul, BinaryOp::Div, BinaryOp::Mod];
const POWER: &[BinaryOp] = &[BinaryOp::Pow];

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            too_deep: None,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn eat(&mut self, kind: TokenKind) -> Option<&'a Token> {
        let tok = self.peek().filter(|t| t.kind == kind)?;
        self.pos += 1;
        Some(tok)
    }

    /// runs `rule`, rewinding the cursor if it fails
    fn attempt<T>(&mut self, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let start = self.pos;
        let res = rule(self);
        if res.is_none() {
            self.pos = start;
        }
        res
    }

    /// runs `rule` one nesting level deeper, failing once [MAX_NESTING] is reached
    fn nested<T>(
        &mut self,
        at: Position,
        rule: impl FnOnce(&mut Self) -> Option<T>,
    ) -> Option<T> {
        if self.depth >= MAX_NESTING {
            self.too_deep.get_or_insert(at);
            return None;
        }
        self.depth += 1;
        let res = rule(self);
        self.depth -= 1;
        res
    }

    /// Collects statements until none can be formed. If tokens remain at that point a
    /// [Statement::Null] marks the stop. A block with no statements at all fails.
    pub fn block(&mut self, level: usize) -> Option<Block> {
        let at = self.peek()?.pos;
        self.nested(at, |p| {
            let mut statements = vec![];
            while let Some(stmt) = p.statement(level) {
                statements.push(stmt);
            }
            if p.pos < p.tokens.len() {
                statements.push(Statement::Null);
            }
            (!statements.is_empty()).then_some(Block { level, statements })
        })
    }

    fn statement(&mut self, level: usize) -> Option<Statement> {
        let kind = self.peek()?.kind;
        self.attempt(|p| match kind {
            TokenKind::Do => p.do_block(level),
            TokenKind::While => p.while_loop(level),
            TokenKind::For => p.for_loop(level),
            TokenKind::Repeat => p.repeat_loop(level),
            TokenKind::If => p.if_statement(level),
            TokenKind::Ident if p.peek_kind_at(1) == Some(TokenKind::Assign) => {
                p.assignment().map(Statement::Assignment)
            }
            _ => p.expression().map(Statement::Expression),
        })
    }

    fn do_block(&mut self, level: usize) -> Option<Statement> {
        self.eat(TokenKind::Do)?;
        let body = self.block(level + 1)?;
        self.eat(TokenKind::End)?;
        Some(Statement::Do(body))
    }

    fn while_loop(&mut self, level: usize) -> Option<Statement> {
        self.eat(TokenKind::While)?;
        let cond = self.expression()?;
        self.eat(TokenKind::Do)?;
        let body = self.block(level + 1)?;
        self.eat(TokenKind::End)?;
        Some(Statement::While { cond, body })
    }

    fn for_loop(&mut self, level: usize) -> Option<Statement> {
        self.eat(TokenKind::For)?;
        let init = self.assignment()?;
        self.eat(TokenKind::Comma)?;
        let end = self.expression()?;
        let step = match self.eat(TokenKind::Comma) {
            Some(_) => Some(self.expression()?),
            None => None,
        };
        self.eat(TokenKind::Do)?;
        let body = self.block(level + 1)?;
        self.eat(TokenKind::End)?;
        Some(Statement::For {
            init,
            end,
            step,
            body,
        })
    }

    fn repeat_loop(&mut self, level: usize) -> Option<Statement> {
        self.eat(TokenKind::Repeat)?;
        let body = self.block(level + 1)?;
        self.eat(TokenKind::Until)?;
        let cond = self.expression()?;
        Some(Statement::Repeat { body, cond })
    }

    fn if_statement(&mut self, level: usize) -> Option<Statement> {
        self.eat(TokenKind::If)?;
        let mut conds = vec![self.expression()?];
        self.eat(TokenKind::Then)?;
        let mut branches = vec![self.block(level + 1)?];
        while self.eat(TokenKind::ElseIf).is_some() {
            conds.push(self.expression()?);
            self.eat(TokenKind::Then)?;
            branches.push(self.block(level + 1)?);
        }
        let else_branch = match self.eat(TokenKind::Else) {
            Some(_) => Some(self.block(level + 1)?),
            None => None,
        };
        self.eat(TokenKind::End)?;
        Some(Statement::If {
            conds,
            branches,
            else_branch,
        })
    }

    fn assignment(&mut self) -> Option<Assignment> {
        self.attempt(|p| {
            let target = p.expression()?;
            p.eat(TokenKind::Assign)?;
            let value = p.expression()?;
            Some(Assignment { target, value })
        })
    }

    pub fn expression(&mut self) -> Option<Expr> {
        self.binary_level(OR, Self::and_level)
    }

    fn and_level(&mut self) -> Option<Expr> {
        self.binary_level(AND, Self::comparison)
    }

    fn comparison(&mut self) -> Option<Expr> {
        self.binary_level(COMPARISON, Self::concat)
    }

    fn concat(&mut self) -> Option<Expr> {
        self.binary_level(CONCAT, Self::additive)
    }

    fn additive(&mut self) -> Option<Expr> {
        self.binary_level(ADDITIVE, Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Option<Expr> {
        self.binary_level(MULTIPLICATIVE, Self::unary)
    }

    /// `operand (op operand)*` for any `op` in `ops`, folded to the left
    fn binary_level(
        &mut self,
        ops: &[BinaryOp],
        operand: fn(&mut Self) -> Option<Expr>,
    ) -> Option<Expr> {
        self.attempt(|p| {
            let mut lhs = operand(p)?;
            while let Some(tok) = p.peek() {
                let Some(op) = BinaryOp::from_token(tok.kind).filter(|op| ops.contains(op)) else {
                    break;
                };
                p.pos += 1;
                let rhs = operand(p)?;
                lhs = Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    pos: tok.pos,
                };
            }
            Some(lhs)
        })
    }

    /// at most one prefix operator, `not not x` doesn't parse
    fn unary(&mut self) -> Option<Expr> {
        let tok = self.peek()?;
        match UnaryOp::from_token(tok.kind) {
            Some(op) => self.attempt(|p| {
                p.pos += 1;
                let operand = p.power()?;
                Some(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                    pos: tok.pos,
                })
            }),
            None => self.power(),
        }
    }

    fn power(&mut self) -> Option<Expr> {
        self.binary_level(POWER, Self::postfix)
    }

    /// a primary followed by at most one call or index
    fn postfix(&mut self) -> Option<Expr> {
        self.attempt(|p| {
            let base = p.primary()?;
            let pos = base.pos();
            Some(match p.peek().map(|t| t.kind) {
                Some(TokenKind::OpenPa) => {
                    p.pos += 1;
                    let arg = p.nested(pos, Self::expression)?;
                    p.eat(TokenKind::ClosePa)?;
                    Expr::Call {
                        callee: Box::new(base),
                        arg: Box::new(arg),
                        pos,
                    }
                }
                Some(TokenKind::OpenBr) => {
                    p.pos += 1;
                    let index = p.nested(pos, Self::expression)?;
                    p.eat(TokenKind::CloseBr)?;
                    Expr::Index {
                        target: Box::new(base),
                        index: Box::new(index),
                        pos,
                    }
                }
                _ => base,
            })
        })
    }

    fn primary(&mut self) -> Option<Expr> {
        let tok = self.peek()?;
        let pos = tok.pos;
        let expr = match tok.kind {
            TokenKind::Ident => Expr::Ident {
                name: tok.text()?.to_string(),
                pos,
            },
            TokenKind::Number => Expr::Number {
                value: tok.int()?,
                pos,
            },
            TokenKind::Str => Expr::Str {
                value: tok.text()?.to_string(),
                pos,
            },
            TokenKind::True => Expr::True(pos),
            TokenKind::False => Expr::False(pos),
            TokenKind::Nil => Expr::Nil(pos),
            TokenKind::OpenPa => {
                return self.attempt(|p| {
                    p.pos += 1;
                    let inner = p.nested(pos, Self::expression)?;
                    p.eat(TokenKind::ClosePa)?;
                    Some(Expr::Paren {
                        inner: Box::new(inner),
                        pos,
                    })
                })
            }
            _ => return None,
        };
        self.pos += 1;
        Some(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use indoc::indoc;

    fn parse_src(src: &str) -> Result<Block, ParseError> {
        parse(&tokenize(src).unwrap())
    }

    fn render(src: &str) -> String {
        parse_src(src).unwrap().to_string()
    }

    fn expr(src: &str) -> Expr {
        let tokens = tokenize(src).unwrap();
        let mut p = Parser::new(&tokens);
        let e = p.expression().unwrap();
        assert_eq!(p.pos, tokens.len(), "not all of {src:?} was consumed");
        e
    }

    #[test]
    fn binary_levels_fold_left() {
        assert_eq!(expr("1 - 2 - 3").to_string(), "1 - 2 - 3");
        let Expr::Binary { op, lhs, .. } = expr("1 - 2 - 3") else {
            panic!("expected a binary node");
        };
        assert_eq!(op, BinaryOp::Sub);
        assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn precedence() {
        let Expr::Binary { op, rhs, .. } = expr("a or b and c == d .. e + f * - g ^ h") else {
            panic!("expected a binary node");
        };
        assert_eq!(op, BinaryOp::Or);
        let Expr::Binary { op, .. } = *rhs else {
            panic!("expected a binary node");
        };
        assert_eq!(op, BinaryOp::And);

        let Expr::Unary { op, operand, .. } = expr("- x ^ 2") else {
            panic!("expected a unary node");
        };
        assert_eq!(op, UnaryOp::Neg);
        assert!(matches!(*operand, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn binary_nodes_carry_the_operator_position() {
        assert_eq!(expr("a  +  b").pos(), Position::new(1, 4));
        assert_eq!(expr("not a").pos(), Position::new(1, 1));
    }

    #[test]
    fn postfix_takes_exactly_one_argument() {
        assert!(matches!(expr("print(x)"), Expr::Call { .. }));
        assert!(matches!(expr("t[1 + 2]"), Expr::Index { .. }));
        let tokens = tokenize("f(a, b)").unwrap();
        let mut p = Parser::new(&tokens);
        assert_eq!(p.expression(), None);
        assert_eq!(p.pos, 0);
    }

    #[test]
    fn double_prefix_is_rejected() {
        assert!(parse_src("x = not not y").is_err());
        assert!(parse_src("x = not (not y)").is_ok());
    }

    #[test]
    fn failing_rule_rewinds() {
        let tokens = tokenize("(1 + )").unwrap();
        let mut p = Parser::new(&tokens);
        assert_eq!(p.expression(), None);
        assert_eq!(p.pos, 0);
    }

    #[test]
    fn statements_render_back() {
        let src = indoc! {r#"
            x = 1
            while x < 10 do
              x = x + 1
            end
            for i = 1, 10, 2 do
              print ( i )
            end
            for i = 1, 3 do
              repeat
                i = i - 1
              until i == 0
            end
            if x == 1 then
              y = "one"
            elseif x == 2 then
              y = "two"
            else
              y = "many"
            end
            do
              print ( "a\"b" .. y )
            end
        "#};
        assert_eq!(render(src), src);
    }

    #[test]
    fn nested_blocks_end_with_a_null_statement() {
        let chunk = parse_src("do x = 1 end").unwrap();
        assert_eq!(chunk.level, 0);
        let Statement::Do(body) = &chunk.statements[0] else {
            panic!("expected a do block");
        };
        assert_eq!(body.level, 1);
        assert_eq!(body.statements.len(), 2);
        assert_eq!(body.statements[1], Statement::Null);
        assert_eq!(chunk.statements.len(), 1);
    }

    #[test]
    fn empty_blocks_parse() {
        assert_eq!(render("while x do end"), "while x do\nend\n");
        assert_eq!(render("if a then else end"), "if a then\nelse\nend\n");
    }

    #[test]
    fn rendering_is_idempotent() {
        let src = "x=(1+2)*3 y = #'abc' .. - x z = not (a ~= b) f(g)(h)";
        let once = render(src);
        let ast = parse_src(&once).unwrap();
        assert_eq!(ast.to_string(), once);
        assert_eq!(ast, parse_src(&ast.to_string()).unwrap());
    }

    #[test]
    fn every_statement_form_parses_completely() {
        let sources = [
            "x = 1",
            "print(x)",
            "x = a or b and c",
            "do x = 1 y = 2 end",
            "while x < 3 do x = x + 1 end",
            "while 1 do end",
            "for i = 1, 10 do print(i) end",
            "for i = 10, 1, - 1 do end",
            "repeat x = x - 1 until x == 0",
            "if a then b = 1 end",
            "if a then b = 1 elseif c then b = 2 elseif d then b = 3 else b = 4 end",
            "s = \"a\" .. 1 .. (b + 2) n = #s m = - n ^ 2 z = not (m >= n)",
            "t[1] f(\"x\") x = (((1)))",
            "do while a do repeat if b then c = 1 end until c end end",
        ];
        for src in sources {
            let tokens = tokenize(src).unwrap();
            let mut p = Parser::new(&tokens);
            let chunk = p.block(GLOBAL_LEVEL);
            assert!(chunk.is_some(), "{src:?} didn't parse");
            assert_eq!(p.pos, tokens.len(), "{src:?} wasn't consumed completely");
            assert!(parse(&tokens).is_ok());
        }
    }

    #[test]
    fn failing_statements_leave_the_cursor_alone() {
        let sources = [
            "x = ",
            "(1 + )",
            "f(a, b)",
            "t[1",
            "not not y",
            "while x do y = 1",
            "for i = 1 do end",
            "for i, 2 do end",
            "if x then",
            "if x then y = 1 elseif then end",
            "repeat x = 1",
            "do x = 1",
            "end",
        ];
        for src in sources {
            let tokens = tokenize(src).unwrap();
            let mut p = Parser::new(&tokens);
            assert_eq!(p.statement(GLOBAL_LEVEL), None, "{src:?} parsed");
            assert_eq!(p.pos, 0, "{src:?} moved the cursor");
            if p.expression().is_none() {
                assert_eq!(p.pos, 0, "{src:?} moved the cursor");
            }
        }
    }

    #[test]
    fn nesting_is_bounded() {
        let nest = |n: usize| format!("x = {}1{}", "(".repeat(n), ")".repeat(n));
        assert!(parse_src(&nest(60)).is_ok());
        assert_eq!(
            parse_src(&nest(400)),
            Err(ParseError::TooDeep {
                pos: Position::new(1, 68)
            })
        );
        let calls = format!("x = {}1{}", "f(".repeat(100), ")".repeat(100));
        assert!(matches!(parse_src(&calls), Err(ParseError::TooDeep { .. })));
        let blocks = format!("{}x = 1{}", "do ".repeat(100), " end".repeat(100));
        assert!(matches!(parse_src(&blocks), Err(ParseError::TooDeep { .. })));
    }

    #[test]
    fn errors() {
        assert_eq!(parse(&[]), Err(ParseError::EmptyChunk));
        assert_eq!(
            parse_src("x = 1 end"),
            Err(ParseError::UnexpectedToken {
                pos: Position::new(1, 7),
                found: "end".into()
            })
        );
        assert!(matches!(
            parse_src("while x do y = 1"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(parse_src("x = ").is_err());
        // only identifiers start an assignment statement
        assert!(parse_src("1 = x").is_err());
    }
}
