//! Tokenizer for the learner-facing JavaScript subset.

use crate::error::SyntaxError;

/// Piece of a template literal: literal text or the raw source of `${...}`.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr { source: String, line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Num(f64),
    Str(String),
    Template(Vec<TemplatePart>),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    /// A line terminator appeared between the previous token and this one.
    pub newline_before: bool,
}

// Longest first so that `===` wins over `==` and `=`.
const PUNCTUATORS: &[&str] = &[
    "**=", "===", "!==", "...", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "++", "--", "+=",
    "-=", "*=", "/=", "%=", "**", "{", "}", "(", ")", "[", "]", ";", ",", ".", ":", "?", "+", "-",
    "*", "/", "%", "<", ">", "=", "!",
];

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    #[must_use]
    pub fn new(source: &str) -> Self {
        Self::starting_at(source, 1)
    }

    /// Lexer for a fragment that begins on `line` of the enclosing program.
    #[must_use]
    pub fn starting_at(source: &str, line: usize) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line,
        }
    }

    /// Tokenize the whole input, ending with `Tok::Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            let newline_before = self.skip_trivia()?;
            let line = self.line;
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    tok: Tok::Eof,
                    line,
                    newline_before,
                });
                return Ok(tokens);
            };

            let tok = if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())) {
                self.number()?
            } else if c == '"' || c == '\'' {
                self.string(c)?
            } else if c == '`' {
                self.template()?
            } else if is_ident_start(c) {
                self.ident()
            } else {
                self.punct()?
            };

            tokens.push(Token {
                tok,
                line,
                newline_before,
            });
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn invalid(&self) -> SyntaxError {
        SyntaxError::new("Invalid or unexpected token", self.line)
    }

    /// Skip whitespace and comments. Returns whether a line break was crossed.
    fn skip_trivia(&mut self) -> Result<bool, SyntaxError> {
        let mut newline = false;
        while let Some(c) = self.peek() {
            if c == '\n' || c == '\r' || c == '\u{2028}' || c == '\u{2029}' {
                newline = true;
                self.bump();
            } else if c.is_whitespace() || c == '\u{feff}' {
                self.bump();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                    self.bump();
                }
            } else if c == '/' && self.peek_at(1) == Some('*') {
                self.bump();
                self.bump();
                loop {
                    match self.bump() {
                        Some('*') if self.peek() == Some('/') => {
                            self.bump();
                            break;
                        }
                        Some('\n') => newline = true,
                        Some(_) => {}
                        None => return Err(self.invalid()),
                    }
                }
            } else {
                break;
            }
        }
        Ok(newline)
    }

    fn number(&mut self) -> Result<Tok, SyntaxError> {
        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.bump();
                self.bump();
                let mut digits = String::new();
                while let Some(c) = self.peek() {
                    if c.is_digit(radix) {
                        digits.push(c);
                        self.bump();
                    } else if c == '_' {
                        self.bump();
                    } else {
                        break;
                    }
                }
                let value = u64::from_str_radix(&digits, radix).map_err(|_| self.invalid())?;
                #[allow(clippy::cast_precision_loss)]
                return Ok(Tok::Num(value as f64));
            }
        }

        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '_' {
                // numeric separator
            } else if c == '.' && !seen_dot && !seen_exp {
                seen_dot = true;
                text.push(c);
            } else if (c == 'e' || c == 'E') && !seen_exp {
                seen_exp = true;
                text.push('e');
                if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                    self.bump();
                    text.push(sign);
                }
            } else {
                break;
            }
            self.bump();
        }

        if self.peek().is_some_and(is_ident_start) {
            return Err(self.invalid());
        }
        text.parse::<f64>().map(Tok::Num).map_err(|_| self.invalid())
    }

    fn escape(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        let Some(c) = self.bump() else {
            return Err(self.invalid());
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.peek().is_some_and(|n| n.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(char::from_u32(code).ok_or_else(|| self.invalid())?);
            }
            'u' => {
                let code = if self.peek() == Some('{') {
                    self.bump();
                    let mut code = 0_u32;
                    loop {
                        match self.bump() {
                            Some('}') => break,
                            Some(d) if d.is_ascii_hexdigit() => {
                                code = code
                                    .checked_mul(16)
                                    .and_then(|v| v.checked_add(d.to_digit(16).unwrap_or(0)))
                                    .ok_or_else(|| self.invalid())?;
                            }
                            _ => return Err(self.invalid()),
                        }
                    }
                    code
                } else {
                    self.hex_digits(4)?
                };
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            '\r' => {
                if self.peek() == Some('\n') {
                    self.bump();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, SyntaxError> {
        let mut code = 0_u32;
        for _ in 0..count {
            let digit = self
                .bump()
                .and_then(|d| d.to_digit(16))
                .ok_or_else(|| self.invalid())?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn string(&mut self, quote: char) -> Result<Tok, SyntaxError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some('\n' | '\r') => return Err(self.invalid()),
                Some('\\') => {
                    self.bump();
                    self.escape(&mut out)?;
                }
                Some(c) if c == quote => {
                    self.bump();
                    return Ok(Tok::Str(out));
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
    }

    fn template(&mut self) -> Result<Tok, SyntaxError> {
        let unterminated = |line| SyntaxError::new("Unterminated template literal", line);
        self.bump();
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return Err(unterminated(self.line)),
                Some('`') => {
                    self.bump();
                    parts.push(TemplatePart::Text(text));
                    return Ok(Tok::Template(parts));
                }
                Some('\\') => {
                    self.bump();
                    self.escape(&mut text)?;
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    self.bump();
                    self.bump();
                    parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    let line = self.line;
                    let source = self.template_expr().ok_or_else(|| unterminated(line))?;
                    parts.push(TemplatePart::Expr { source, line });
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Raw source of a `${...}` body, honoring nested braces and strings.
    fn template_expr(&mut self) -> Option<String> {
        let mut depth = 0_usize;
        let mut out = String::new();
        loop {
            let c = self.bump()?;
            match c {
                '{' => depth += 1,
                '}' if depth == 0 => return Some(out),
                '}' => depth -= 1,
                '"' | '\'' | '`' => {
                    out.push(c);
                    loop {
                        let inner = self.bump()?;
                        out.push(inner);
                        if inner == '\\' {
                            out.push(self.bump()?);
                        } else if inner == c {
                            break;
                        }
                    }
                    continue;
                }
                _ => {}
            }
            out.push(c);
        }
    }

    fn ident(&mut self) -> Tok {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_ident_part(c) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Tok::Ident(name)
    }

    fn punct(&mut self) -> Result<Tok, SyntaxError> {
        let rest = self.rest();
        for punct in PUNCTUATORS {
            if rest.starts_with(punct) {
                for _ in 0..punct.chars().count() {
                    self.bump();
                }
                return Ok(Tok::Punct(punct));
            }
        }
        Err(self.invalid())
    }

    fn rest(&self) -> String {
        self.chars[self.pos..].iter().take(3).collect()
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c.is_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.tok)
            .collect()
    }

    #[test]
    fn lexes_statement() {
        assert_eq!(
            kinds("let x = 1.5;"),
            vec![
                Tok::Ident("let".into()),
                Tok::Ident("x".into()),
                Tok::Punct("="),
                Tok::Num(1.5),
                Tok::Punct(";"),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn prefers_longest_punctuator() {
        assert_eq!(
            kinds("a === b ** 2"),
            vec![
                Tok::Ident("a".into()),
                Tok::Punct("==="),
                Tok::Ident("b".into()),
                Tok::Punct("**"),
                Tok::Num(2.0),
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn handles_escapes_and_comments() {
        assert_eq!(
            kinds("// note\n'it\\'s' /* x */ \"\\u0041\\n\""),
            vec![
                Tok::Str("it's".into()),
                Tok::Str("A\n".into()),
                Tok::Eof
            ]
        );
    }

    #[test]
    fn splits_template_literals() {
        let toks = kinds("`Hello, ${name + '}'}!`");
        assert_eq!(
            toks[0],
            Tok::Template(vec![
                TemplatePart::Text("Hello, ".into()),
                TemplatePart::Expr {
                    source: "name + '}'".into(),
                    line: 1
                },
                TemplatePart::Text("!".into()),
            ])
        );
    }

    #[test]
    fn tracks_line_breaks() {
        let tokens = Lexer::new("a\nb").tokenize().unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = Lexer::new("'abc").tokenize().unwrap_err();
        assert_eq!(err.message(), "Invalid or unexpected token");
    }

    #[test]
    fn reads_hex_and_exponent_numbers() {
        assert_eq!(kinds("0xff 1e3 .5")[..3], [Tok::Num(255.0), Tok::Num(1000.0), Tok::Num(0.5)]);
    }
}
