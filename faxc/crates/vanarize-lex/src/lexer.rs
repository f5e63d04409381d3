//! Single-pass scanner over a source buffer.
//!
//! A `(start, current, line)` triple advances over the buffer one token at
//! a time. There is no lookahead beyond the single character `peek`/
//! `peek_next` need; the parser is the one that keeps a token of lookahead
//! (`vanarize-par`).

use crate::cursor::LexerCheckpoint;
use crate::token::{Token, TokenKind};
use vanarize_util::symbol::Symbol;

/// The lexer. Holds the source buffer currently being scanned plus a stack
/// of checkpoints for nested `import` files.
pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    start: usize,
    current: usize,
    line: u32,
    import_stack: Vec<LexerCheckpoint<'src>>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer { source, bytes: source.as_bytes(), start: 0, current: 0, line: 1, import_stack: Vec::new() }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Capture `(source, start, current, line)` so a nested parse can later
    /// be undone with [`Lexer::restore`].
    pub fn checkpoint(&self) -> LexerCheckpoint<'src> {
        LexerCheckpoint { source: self.source, start: self.start, current: self.current, line: self.line }
    }

    pub fn restore(&mut self, cp: LexerCheckpoint<'src>) {
        self.source = cp.source;
        self.bytes = cp.source.as_bytes();
        self.start = cp.start;
        self.current = cp.current;
        self.line = cp.line;
    }

    /// Begin scanning `new_source` from its start, remembering the current
    /// position so [`Lexer::pop_source`] can resume the importing file.
    /// Unbalanced push/pop is a caller bug (mirrors `vgc`'s root-balance
    /// discipline) and is asserted against rather than silently ignored.
    pub fn push_source(&mut self, new_source: &'src str) {
        self.import_stack.push(self.checkpoint());
        self.source = new_source;
        self.bytes = new_source.as_bytes();
        self.start = 0;
        self.current = 0;
        self.line = 1;
    }

    pub fn pop_source(&mut self) {
        let cp = self.import_stack.pop().expect("pop_source without a matching push_source");
        self.restore(cp);
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.bytes[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() { 0 } else { self.bytes[self.current] }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.bytes.len() { 0 } else { self.bytes[self.current + 1] }
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.bytes[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn lexeme(&self) -> &'src str {
        &self.source[self.start..self.current]
    }

    fn make(&self, kind: TokenKind) -> Token<'src> {
        Token::new(kind, self.lexeme(), self.line)
    }

    fn error(&self, message: &'static str) -> Token<'src> {
        Token::new(TokenKind::Error, message, self.line)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.current += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.current += 1;
                }
                b'/' if self.peek_next() == b'/' => {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.current += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn identifier(&mut self) -> Token<'src> {
        while is_ident_continue(self.peek()) {
            self.current += 1;
        }
        let text = self.lexeme();
        match Symbol::keyword(text) {
            Some(sym) => self.make(TokenKind::Keyword(sym)),
            None => self.make(TokenKind::Ident(Symbol::intern(text))),
        }
    }

    /// Integer or decimal literal; no exponent notation.
    fn number(&mut self) -> Token<'src> {
        while self.peek().is_ascii_digit() {
            self.current += 1;
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.current += 1;
            while self.peek().is_ascii_digit() {
                self.current += 1;
            }
        }
        self.make(TokenKind::Number)
    }

    /// Double-quoted string, no escape processing; an embedded newline is
    /// counted but not rejected.
    fn string(&mut self) -> Token<'src> {
        while self.peek() != b'"' && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.current += 1;
        }
        if self.is_at_end() {
            return self.error("Unterminated string.");
        }
        self.current += 1; // closing quote
        self.make(TokenKind::Str)
    }

    /// Scan and return the next token, or [`TokenKind::Eof`] at end of input.
    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_whitespace_and_comments();
        self.start = self.current;
        if self.is_at_end() {
            return self.make(TokenKind::Eof);
        }
        let c = self.advance();
        if is_ident_start(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }
        match c {
            b'(' => self.make(TokenKind::LParen),
            b')' => self.make(TokenKind::RParen),
            b'[' => self.make(TokenKind::LBracket),
            b']' => self.make(TokenKind::RBracket),
            b'{' => self.make(TokenKind::LBrace),
            b'}' => self.make(TokenKind::RBrace),
            b'.' => self.make(TokenKind::Dot),
            b',' => self.make(TokenKind::Comma),
            b';' => self.make(TokenKind::Semicolon),
            b':' => {
                if self.matches(b':') {
                    self.make(TokenKind::ColonColon)
                } else {
                    self.make(TokenKind::Colon)
                }
            }
            b'+' => self.make(TokenKind::Plus),
            b'-' => self.make(TokenKind::Minus),
            b'*' => self.make(TokenKind::Star),
            b'/' => self.make(TokenKind::Slash),
            b'!' => {
                if self.matches(b'=') {
                    self.make(TokenKind::BangEq)
                } else {
                    self.make(TokenKind::Bang)
                }
            }
            b'=' => {
                if self.matches(b'=') {
                    self.make(TokenKind::EqEq)
                } else {
                    self.make(TokenKind::Eq)
                }
            }
            b'<' => {
                if self.matches(b'=') {
                    self.make(TokenKind::LessEq)
                } else {
                    self.make(TokenKind::Less)
                }
            }
            b'>' => {
                if self.matches(b'=') {
                    self.make(TokenKind::GreaterEq)
                } else {
                    self.make(TokenKind::Greater)
                }
            }
            b'"' => self.string(),
            _ => self.error("Unexpected character."),
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token();
            let done = tok.is_eof();
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_punctuation() {
        let ks = kinds("(){}[],.;:::");
        assert_eq!(
            ks,
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Semicolon,
                TokenKind::ColonColon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_compound_operators() {
        let ks = kinds("== != <= >= = < >");
        assert_eq!(
            ks,
            vec![
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::LessEq,
                TokenKind::GreaterEq,
                TokenKind::Eq,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        let mut lexer = Lexer::new("function foo");
        let first = lexer.next_token();
        assert!(matches!(first.kind, TokenKind::Keyword(s) if s == vanarize_util::symbol::KW_FUNCTION));
        let second = lexer.next_token();
        assert!(matches!(second.kind, TokenKind::Ident(_)));
    }

    #[test]
    fn while_is_not_a_keyword() {
        let mut lexer = Lexer::new("while");
        let tok = lexer.next_token();
        assert!(matches!(tok.kind, TokenKind::Ident(_)), "while must lex as a plain identifier");
    }

    #[test]
    fn scans_integer_and_decimal_numbers() {
        let mut lexer = Lexer::new("10 3.25");
        let a = lexer.next_token();
        assert_eq!(a.kind, TokenKind::Number);
        assert_eq!(a.lexeme, "10");
        let b = lexer.next_token();
        assert_eq!(b.kind, TokenKind::Number);
        assert_eq!(b.lexeme, "3.25");
    }

    #[test]
    fn scans_strings_without_escape_processing() {
        let mut lexer = Lexer::new("\"hello\\nworld\"");
        let tok = lexer.next_token();
        assert_eq!(tok.kind, TokenKind::Str);
        assert_eq!(tok.lexeme, "\"hello\\nworld\"");
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let mut lexer = Lexer::new("\"abc");
        let tok = lexer.next_token();
        assert_eq!(tok.kind, TokenKind::Error);
        assert_eq!(tok.lexeme, "Unterminated string.");
    }

    #[test]
    fn newline_inside_string_increments_line() {
        let mut lexer = Lexer::new("\"a\nb\"\nx");
        let _ = lexer.next_token(); // the string, spanning two lines
        let after = lexer.next_token();
        assert_eq!(after.line, 3);
    }

    #[test]
    fn skips_line_comments() {
        let ks = kinds("1 // a comment\n2");
        assert_eq!(ks, vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]);
    }

    #[test]
    fn checkpoint_round_trips_through_restore() {
        let mut lexer = Lexer::new("10 + 20");
        let _ = lexer.next_token();
        let cp = lexer.checkpoint();
        let _ = lexer.next_token();
        let _ = lexer.next_token();
        lexer.restore(cp);
        let tok = lexer.next_token();
        assert_eq!(tok.kind, TokenKind::Plus);
    }

    #[test]
    fn push_pop_source_resumes_importing_file() {
        let mut lexer = Lexer::new("import_tail");
        let _ = lexer.next_token();
        lexer.push_source("nested");
        let nested_tok = lexer.next_token();
        assert_eq!(nested_tok.lexeme, "nested");
        assert!(lexer.next_token().is_eof());
        lexer.pop_source();
        assert!(lexer.next_token().is_eof(), "importing file had only one token, already consumed");
    }

    #[test]
    #[should_panic(expected = "pop_source without a matching push_source")]
    fn pop_source_without_push_panics() {
        let mut lexer = Lexer::new("x");
        lexer.pop_source();
    }
}
