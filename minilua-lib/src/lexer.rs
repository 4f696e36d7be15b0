//! Turns source text into [Token]s.
//!
//! The lexer works line by line. Whitespace and characters it doesn't know are skipped,
//! `--` starts a comment that runs to the end of the line, and `--[[` starts one that runs
//! until the next `--]]`, which may be several lines further down.

use thiserror::Error;

use crate::core::{Position, Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("{pos}: backslash at the end of a line inside a string")]
    MalformedEscape { pos: Position },

    #[error("{pos}: string is never closed")]
    UnterminatedString { pos: Position },

    #[error("{pos}: integer literal doesn't fit into 64 bits")]
    IntegerOverflow { pos: Position },
}

pub type Result<T> = std::result::Result<T, LexError>;

/// Yields tokens until the source is exhausted or the first error, which ends the stream
pub struct Lexer {
    lines: Vec<Vec<char>>,
    row: usize,
    col: usize,
    done: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            lines: source.lines().map(|l| l.chars().collect()).collect(),
            row: 0,
            col: 0,
            done: false,
        }
    }

    fn cursor_pos(&self) -> Position {
        Position::new(self.row + 1, self.col + 1)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.lines
            .get(self.row)
            .and_then(|line| line.get(self.col + offset))
            .copied()
    }

    fn next_line(&mut self) {
        self.row += 1;
        self.col = 0;
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        while self.row < self.lines.len() {
            let Some(ch) = self.peek(0) else {
                self.next_line();
                continue;
            };
            let start = self.cursor_pos();
            self.col += 1;

            if ch.is_ascii_alphabetic() || ch == '_' {
                return Ok(Some(self.word(start)));
            }
            if ch.is_ascii_digit() {
                return self.number(ch, start).map(Some);
            }
            if ch == '"' || ch == '\'' {
                return self.string(ch, start).map(Some);
            }
            if ch == '-' && self.peek(0) == Some('-') {
                self.col += 1;
                self.comment();
                continue;
            }
            if let Some(kind) = self.peek(0).and_then(|next| TokenKind::from_pair(ch, next)) {
                self.col += 1;
                return Ok(Some(Token::new(kind, start)));
            }
            if let Some(kind) = TokenKind::from_char(ch) {
                return Ok(Some(Token::new(kind, start)));
            }
        }
        Ok(None)
    }

    fn word(&mut self, start: Position) -> Token {
        let begin = self.col - 1;
        while self
            .peek(0)
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.col += 1;
        }
        let word = self.lines[self.row][begin..self.col].iter().collect();
        Token::word(word, start)
    }

    fn number(&mut self, first: char, start: Position) -> Result<Token> {
        let mut value = i64::from(first as u8 - b'0');
        while let Some(digit) = self.peek(0).and_then(|c| c.to_digit(10)) {
            self.col += 1;
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i64::from(digit)))
                .ok_or(LexError::IntegerOverflow { pos: start })?;
        }
        Ok(Token::number(value, start))
    }

    fn string(&mut self, quote: char, start: Position) -> Result<Token> {
        let mut text = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(LexError::UnterminatedString { pos: start });
            };
            self.col += 1;
            match c {
                c if c == quote => return Ok(Token::string(text, start)),
                '\\' => {
                    let pos = self.cursor_pos();
                    let escaped = self.peek(0).ok_or(LexError::MalformedEscape {
                        pos: Position::new(pos.row, pos.col - 1),
                    })?;
                    self.col += 1;
                    text.push(if escaped == 'n' { '\n' } else { escaped });
                }
                c => text.push(c),
            }
        }
    }

    /// called with the cursor right behind `--`
    fn comment(&mut self) {
        if !(self.peek(0) == Some('[') && self.peek(1) == Some('[')) {
            self.next_line();
            return;
        }
        self.col += 2;
        while let Some(line) = self.lines.get(self.row) {
            let rest = &line[self.col.min(line.len())..];
            if let Some(idx) = rest.windows(4).position(|w| w == ['-', '-', ']', ']']) {
                self.col += idx + 4;
                return;
            }
            self.next_line();
        }
    }
}

impl Iterator for Lexer {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_token() {
            Ok(Some(tok)) => Some(Ok(tok)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Lexes the whole source, failing on the first error
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use TokenKind::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn operators_prefer_two_characters() {
        assert_eq!(
            kinds("a .. b == c ~= d <= e >= f < g > h = i"),
            vec![
                Ident, DotDot, Ident, Eq, Ident, Neq, Ident, Le, Ident, Ge, Ident, Lt, Ident, Gt,
                Ident, Assign, Ident
            ]
        );
        assert_eq!(kinds("+-*/%^#()[],"), vec![
            Add, Sub, Mul, Div, Mod, Pow, Length, OpenPa, ClosePa, OpenBr, CloseBr, Comma
        ]);
    }

    #[test]
    fn positions_are_one_based() {
        let toks = tokenize("x = 1\n  while").unwrap();
        let positions: Vec<_> = toks.iter().map(|t| (t.pos.row, t.pos.col)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 3), (1, 5), (2, 3)]);
    }

    #[test]
    fn numbers_and_identifiers_carry_values() {
        let toks = tokenize("_foo1 1234").unwrap();
        assert_eq!(toks[0].text(), Some("_foo1"));
        assert_eq!(toks[1].int(), Some(1234));
        assert_eq!(kinds("12ab"), vec![Number, Ident]);
    }

    #[test]
    fn strings_with_escapes() {
        let toks = tokenize(r#""a\"b\nc\\" 'it''s'"#).unwrap();
        assert_eq!(toks[0].text(), Some("a\"b\nc\\"));
        assert_eq!(toks[1].text(), Some("it"));
        assert_eq!(toks[2].text(), Some("s"));
        let toks = tokenize(r#""say \'hi\'""#).unwrap();
        assert_eq!(toks[0].text(), Some("say 'hi'"));
    }

    #[test]
    fn comments_are_skipped() {
        let src = indoc! {r#"
            x = 1 -- the rest is ignored = 5
            --[[ a block comment
            spanning lines --]] y
            --[[ inline --]] z
        "#};
        assert_eq!(kinds(src), vec![Ident, Assign, Number, Ident, Ident]);
    }

    #[test]
    fn unterminated_block_comment_swallows_the_rest() {
        assert_eq!(kinds("a --[[ never closed\nb c"), vec![Ident]);
    }

    #[test]
    fn unknown_characters_are_skipped() {
        assert_eq!(kinds("a @ $ ! b ~ ."), vec![Ident, Ident]);
    }

    #[test]
    fn errors() {
        assert_eq!(
            tokenize("x = \"open"),
            Err(LexError::UnterminatedString {
                pos: Position::new(1, 5)
            })
        );
        assert_eq!(
            tokenize("'ab\\"),
            Err(LexError::MalformedEscape {
                pos: Position::new(1, 4)
            })
        );
        assert_eq!(
            tokenize("\n 99999999999999999999"),
            Err(LexError::IntegerOverflow {
                pos: Position::new(2, 2)
            })
        );
        assert!(tokenize(&i64::MAX.to_string()).is_ok());
    }

    #[test]
    fn lexer_stops_after_first_error() {
        let mut lexer = Lexer::new("a \"b\n c");
        assert!(matches!(lexer.next(), Some(Ok(_))));
        assert!(matches!(lexer.next(), Some(Err(_))));
        assert!(lexer.next().is_none());
    }

    #[test]
    fn lexemes_lex_back_to_the_same_tokens() {
        let sources = [
            "while x ~= 'a\\'b' do y = y .. \"q\\\\\" + 12 end",
            "local function f return goto break in end",
            "if a <= b and c >= d or not e then elseif f < g then else end",
            "for i = 1, #s, 2 do t[i] = i % 3 ^ 2 * 4 / 5 - 6 end",
            "repeat print(\"line\\nbreak\") until x == nil or true == false",
            "x = 9223372036854775807 -- trailing comment",
            "--[[ block\ncomment --]] y = (z)",
        ];
        let strip = |ts: Vec<Token>| -> Vec<_> { ts.into_iter().map(|t| (t.kind, t.value)).collect() };
        for src in sources {
            let toks = tokenize(src).unwrap();
            let rebuilt = toks.iter().map(Token::lexeme).collect::<Vec<_>>().join(" ");
            let again = tokenize(&rebuilt).unwrap();
            assert_eq!(strip(toks), strip(again), "{src:?} relexed as {rebuilt:?}");
        }
    }
}
