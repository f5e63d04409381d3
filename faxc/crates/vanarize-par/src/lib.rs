//! Recursive-descent parser for the vanarize source language.
//!
//! One token of lookahead (`current`, `next`) plus a shadow `previous` for
//! lexeme capture after consumption. There is
//! no error recovery: the first syntactic violation emits a diagnostic and
//! the whole parse fails; callers see this as `Err(())` and check
//! `handler.has_errors()` for the message.
//!
//! `import` is the one place the parser re-enters itself: `items::parse_import`
//! snapshots the lexer, recursively parses the imported file to EOF, restores
//! the lexer, and splices the (namespace-prefixed) result into the caller's
//! item list.

pub mod ast;
pub mod expr;
pub mod items;
pub mod stmt;
pub mod types;

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use vanarize_lex::{Lexer, Token, TokenKind};
use vanarize_util::diagnostic::Handler;
use vanarize_util::{Span, Symbol};

pub use ast::*;

/// The parser. Borrows the source text for its whole lifetime `'src` (the
/// caller leaks each file's contents to `'static` before parsing, since AST
/// nodes and the tokens feeding them may outlive normal stack scoping, so
/// the source buffer is leaked rather than borrowed from a shorter-lived
/// owner) and a [`Handler`] for the duration of one call to [`parse`].
pub struct Parser<'src, 'h> {
    lexer: Lexer<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    next: Token<'src>,
    handler: &'h Handler,
    /// Directory imported paths resolve relative to.
    base_dir: PathBuf,
    /// Namespace prefix applied to every function declared while parsing an
    /// imported file (`None` at the top level): all top-level function names
    /// in the imported file are exported as `<basename>_<name>`.
    prefix: Option<Symbol>,
    /// Canonicalized paths already imported during this compilation, shared
    /// across the whole recursive-import tree so re-importing the same file
    /// is a no-op rather than an infinite loop.
    imported: Rc<RefCell<HashSet<PathBuf>>>,
}

/// Parse one top-level source file (and everything it transitively
/// `import`s) into a [`Program`].
///
/// `source` must be leaked (or otherwise `'static`) because tokens, and
/// therefore string/number literal text, are read from it while building
/// the AST; `base_dir` is the directory `import` paths resolve against.
pub fn parse<'src>(
    source: &'src str,
    base_dir: &Path,
    handler: &Handler,
) -> Result<Program, ()> {
    let mut parser = Parser::new(source, base_dir.to_path_buf(), handler);
    parser.parse_program()
}

impl<'src, 'h> Parser<'src, 'h> {
    fn new(source: &'src str, base_dir: PathBuf, handler: &'h Handler) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        let next = lexer.next_token();
        Parser {
            lexer,
            previous: current,
            current,
            next,
            handler,
            base_dir,
            prefix: None,
            imported: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// A nested parser for an imported file, sharing the import-cycle guard
    /// with its parent but starting a fresh lexer over `source` and a fresh
    /// namespace `prefix`.
    fn new_nested(&self, source: &'src str, base_dir: PathBuf, prefix: Symbol) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        let next = lexer.next_token();
        Parser {
            lexer,
            previous: current,
            current,
            next,
            handler: self.handler,
            base_dir,
            prefix: Some(prefix),
            imported: Rc::clone(&self.imported),
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, ()> {
        let mut items = Vec::new();
        while !self.is_at_end() {
            self.declaration(&mut items)?;
        }
        Ok(items)
    }

    // -- token stream plumbing -------------------------------------------

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    /// Shift the lookahead window forward by one token, returning the token
    /// that was `current` (now `previous`).
    fn advance(&mut self) -> Token<'src> {
        self.previous = self.current;
        self.current = self.next;
        self.next = self.lexer.next_token();
        self.previous
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn check_keyword(&self, sym: Symbol) -> bool {
        matches!(self.current.kind, TokenKind::Keyword(k) if k == sym)
    }

    fn is_ident(&self) -> bool {
        matches!(self.current.kind, TokenKind::Ident(_))
    }

    fn is_next_ident(&self) -> bool {
        matches!(self.next.kind, TokenKind::Ident(_))
    }

    fn is_next(&self, kind: TokenKind) -> bool {
        self.next.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, sym: Symbol) -> bool {
        if self.check_keyword(sym) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'src>, ()> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            self.error_here(&format!("Expect {what}."))
        }
    }

    fn expect_keyword(&mut self, sym: Symbol, what: &str) -> Result<Token<'src>, ()> {
        if self.check_keyword(sym) {
            Ok(self.advance())
        } else {
            self.error_here(&format!("Expect {what}."))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<Symbol, ()> {
        match self.current.kind {
            TokenKind::Ident(sym) => {
                self.advance();
                Ok(sym)
            }
            _ => self.error_here(&format!("Expect {what}.")),
        }
    }

    fn current_span(&self) -> Span {
        Span::point(self.current.line, 0)
    }

    /// Emit a fatal diagnostic at the current token's line and return
    /// `Err(())` - the parser's only error path.
    fn error_here<T>(&self, message: &str) -> Result<T, ()> {
        self.handler.build_error(self.current_span(), message.to_string()).emit(self.handler);
        Err(())
    }

    fn error_at<T>(&self, line: u32, message: &str) -> Result<T, ()> {
        self.handler.build_error(Span::point(line, 0), message.to_string()).emit(self.handler);
        Err(())
    }

    /// Apply the active import namespace prefix to a function name.
    fn namespaced(&self, name: Symbol) -> Symbol {
        match self.prefix {
            Some(prefix) => Symbol::intern(&format!("{}_{}", prefix.as_str(), name.as_str())),
            None => name,
        }
    }
}
