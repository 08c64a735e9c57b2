use crate::error::Error;
use crate::token::{Token, TokenKind, KEYWORDS};

/// Single-pass tokenizer over a `Vec<char>` -- an efficiency refinement over
/// the teacher's `source.chars().nth(self.current)` lookahead (O(n) per call),
/// behavior otherwise unchanged. Collects diagnostics into `errors` instead of
/// printing them directly, so the driver decides when/how to report them.
pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    errors: Vec<Error>,
    start: usize,
    current: usize,
    row: u32,
    col: u32,
    start_row: u32,
    start_col: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            row: 1,
            col: 1,
            start_row: 1,
            start_col: 1,
        }
    }

    pub fn scan_tokens(mut self) -> (Vec<Token>, Vec<Error>) {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_row = self.row;
            self.start_col = self.col;
            self.scan_token();
        }
        self.tokens.push(Token::new(TokenKind::Eof, "", self.row, self.col));
        (self.tokens, self.errors)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        if c == '\n' {
            self.row += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn peek(&self) -> char {
        *self.source.get(self.current).unwrap_or(&'\0')
    }

    fn peek_next(&self) -> char {
        *self.source.get(self.current + 1).unwrap_or(&'\0')
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.advance();
        true
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(kind, lexeme, self.start_row, self.start_col));
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(Error::syntax(self.start_row, self.start_col, message));
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            ',' => self.add_token(TokenKind::Comma),
            '.' => self.add_token(TokenKind::Dot),
            ';' => self.add_token(TokenKind::Semicolon),
            '^' => self.add_token(TokenKind::Caret),
            '?' => self.add_token(TokenKind::Question),
            ':' => self.add_token(TokenKind::Colon),
            '+' => {
                if self.matches('+') {
                    self.add_token(TokenKind::PlusPlus);
                } else if self.matches('=') {
                    self.add_token(TokenKind::PlusEqual);
                } else {
                    self.add_token(TokenKind::Plus);
                }
            }
            '-' => {
                if self.matches('-') {
                    self.add_token(TokenKind::MinusMinus);
                } else if self.matches('=') {
                    self.add_token(TokenKind::MinusEqual);
                } else {
                    self.add_token(TokenKind::Minus);
                }
            }
            '*' => {
                if self.matches('=') {
                    self.add_token(TokenKind::StarEqual);
                } else {
                    self.add_token(TokenKind::Star);
                }
            }
            '!' => {
                let kind = if self.matches('=') { TokenKind::BangEqual } else { TokenKind::Bang };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.matches('=') { TokenKind::EqualEqual } else { TokenKind::Equal };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.matches('=') { TokenKind::LessEqual } else { TokenKind::Less };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.matches('=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
                self.add_token(kind);
            }
            '#' => self.line_comment(),
            '/' => {
                if self.matches('/') {
                    self.line_comment();
                } else if self.matches('*') {
                    self.block_comment();
                } else if self.matches('=') {
                    self.add_token(TokenKind::SlashEqual);
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }
            ' ' | '\r' | '\t' | '\n' => {}
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            other => self.error(format!("unexpected character '{other}'")),
        }
    }

    fn line_comment(&mut self) {
        while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }
    }

    /// Non-nested. An unterminated block comment silently reads to EOF rather
    /// than raising a diagnostic -- an explicit open-question resolution, see
    /// DESIGN.md.
    fn block_comment(&mut self) {
        while !self.is_at_end() {
            if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            self.advance();
        }
        if self.is_at_end() {
            self.error("unterminated string");
            return;
        }
        self.advance();
        let literal: String = self.source[self.start + 1..self.current - 1].iter().collect();
        self.add_token(TokenKind::String { literal });
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        let literal: f64 = text.parse().expect("lexer only admits digit/dot characters");
        self.add_token(TokenKind::Number { literal });
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = KEYWORDS.get(text.as_str()).cloned().unwrap_or(TokenKind::Identifier);
        self.add_token(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::new(source).scan_tokens();
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_compound_and_postfix_operators() {
        assert_eq!(
            kinds("x += 1; y--;"),
            vec![
                TokenKind::Identifier,
                TokenKind::PlusEqual,
                TokenKind::Number { literal: 1.0 },
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::MinusMinus,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn block_comments_are_skipped() {
        assert_eq!(kinds("/* hi\nthere */ 1"), vec![TokenKind::Number { literal: 1.0 }, TokenKind::Eof]);
    }

    #[test]
    fn unterminated_block_comment_reads_to_eof_without_error() {
        let (tokens, errors) = Lexer::new("/* never closed").scan_tokens();
        assert!(errors.is_empty());
        assert_eq!(tokens, vec![Token::new(TokenKind::Eof, "", 1, 16)]);
    }

    #[test]
    fn keyword_this_and_identifier_constructor_are_distinct() {
        assert_eq!(kinds("this"), vec![TokenKind::This, TokenKind::Eof]);
        assert_eq!(kinds("constructor"), vec![TokenKind::Identifier, TokenKind::Eof]);
    }

    #[test]
    fn unterminated_string_reports_syntax_error() {
        let (_, errors) = Lexer::new("\"abc").scan_tokens();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::Syntax { .. }));
    }

    #[test]
    fn row_col_tracks_newlines() {
        let (tokens, _) = Lexer::new("let x\n= 1;").scan_tokens();
        let eq = tokens.iter().find(|t| t.kind == TokenKind::Equal).unwrap();
        assert_eq!((eq.row, eq.col), (2, 1));
    }
}
