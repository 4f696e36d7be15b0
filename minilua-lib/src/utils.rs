//! contains small utility functions that have nowhere else to go

/// indentation for a block at `level`, two spaces per level
pub fn padding(level: usize) -> String {
    "  ".repeat(level)
}

/// Wraps `s` in double quotes, escaping what the lexer would otherwise misread
pub fn quote(s: &str) -> String {
    let mut res = String::with_capacity(s.len() + 2);
    res.push('"');
    for c in s.chars() {
        match c {
            '\\' => res.push_str("\\\\"),
            '"' => res.push_str("\\\""),
            '\n' => res.push_str("\\n"),
            c => res.push(c),
        }
    }
    res.push('"');
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(quote("plain"), r#""plain""#);
        assert_eq!(quote("a\"b"), r#""a\"b""#);
        assert_eq!(quote("back\\slash\n"), r#""back\\slash\n""#);
    }

    #[test]
    fn padding_is_two_spaces_per_level() {
        assert_eq!(padding(0), "");
        assert_eq!(padding(2), "    ");
    }
}
