//! Statement parsing: `return`, `if`/`else` (dangling-else
//! binds to the nearest `if`), C-style `for`, blocks, variable
//! declarations, and expression statements. `while` is deliberately absent
//! from the language, so it lexes as a plain identifier and, used as a
//! statement, falls through to an ordinary (and useless) expression
//! statement rather than a parse error; nothing in the grammar treats it
//! specially.

use crate::ast::*;
use crate::Parser;
use vanarize_lex::TokenKind;
use vanarize_util::symbol::{KW_ELSE, KW_FOR, KW_IF, KW_RETURN};
use vanarize_util::Span;

impl<'src, 'h> Parser<'src, 'h> {
    pub(crate) fn parse_block(&mut self) -> Result<Block, ()> {
        self.expect(TokenKind::LBrace, "'{' to start a block")?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace, "'}' to close a block")?;
        Ok(stmts)
    }

    /// A `{ .. }` block, or (C-style) a single bare statement treated as a
    /// one-statement block. `if`/`for` bodies go through this rather than
    /// [`Parser::parse_block`] directly so that a braceless `if` body
    /// produces the classic dangling-else ambiguity, resolved by attaching
    /// to the nearest `if` - which only has teeth when braces are optional.
    fn parse_block_or_stmt(&mut self) -> Result<Block, ()> {
        if self.check(TokenKind::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    pub(crate) fn parse_stmt(&mut self) -> Result<Stmt, ()> {
        if self.check_keyword(KW_RETURN) {
            return self.return_stmt();
        }
        if self.check_keyword(KW_IF) {
            return self.if_stmt();
        }
        if self.check_keyword(KW_FOR) {
            return self.for_stmt();
        }
        if self.check(TokenKind::LBrace) {
            let line = self.current.line;
            let block = self.parse_block()?;
            return Ok(Stmt::Block(block, Span::point(line, 0)));
        }
        if self.at_type_start() {
            return Ok(Stmt::VarDecl(self.var_decl()?));
        }
        self.expr_stmt()
    }

    fn return_stmt(&mut self) -> Result<Stmt, ()> {
        let tok = self.expect_keyword(KW_RETURN, "'return'")?;
        let span = Span::point(tok.line, 0);
        let value = if self.check(TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon, "';' after return statement")?;
        Ok(Stmt::Return(value, span))
    }

    /// `if (cond) { .. } [else (if (..) {..} ... | { .. })]`. Dangling
    /// `else` always attaches to the nearest enclosing `if`, which falls
    /// out naturally from parsing the `else` clause right after the
    /// `then`-branch of whichever `if` call is innermost on the Rust call
    /// stack.
    fn if_stmt(&mut self) -> Result<Stmt, ()> {
        let tok = self.expect_keyword(KW_IF, "'if'")?;
        let span = Span::point(tok.line, 0);
        self.expect(TokenKind::LParen, "'(' after 'if'")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')' after if condition")?;
        let then_branch = self.parse_block_or_stmt()?;
        let else_branch = if self.matches_keyword(KW_ELSE) {
            if self.check_keyword(KW_IF) {
                Some(vec![self.if_stmt()?])
            } else {
                Some(self.parse_block_or_stmt()?)
            }
        } else {
            None
        };
        Ok(Stmt::If(IfStmt { cond, then_branch, else_branch, span }))
    }

    /// `for (init; cond; incr) { .. }`, each clause optional.
    fn for_stmt(&mut self) -> Result<Stmt, ()> {
        let tok = self.expect_keyword(KW_FOR, "'for'")?;
        let span = Span::point(tok.line, 0);
        self.expect(TokenKind::LParen, "'(' after 'for'")?;

        let init = if self.matches(TokenKind::Semicolon) {
            None
        } else if self.at_type_start() {
            let decl = self.var_decl()?; // var_decl consumes its own trailing ';'
            Some(Box::new(Stmt::VarDecl(decl)))
        } else {
            let expr = self.parse_expr()?;
            self.expect(TokenKind::Semicolon, "';' after for-loop initializer")?;
            Some(Box::new(Stmt::Expr(expr)))
        };

        let cond = if self.check(TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon, "';' after for-loop condition")?;

        let incr = if self.check(TokenKind::RParen) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::RParen, "')' after for-loop clauses")?;

        let body = self.parse_block_or_stmt()?;
        Ok(Stmt::For(ForStmt { init, cond, incr, body, span }))
    }

    fn expr_stmt(&mut self) -> Result<Stmt, ()> {
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semicolon, "';' after expression statement")?;
        Ok(Stmt::Expr(expr))
    }

    /// `<type> <name> = <expr>;`. The initializer of a
    /// struct-typed declaration may be a bare `{ field: expr, ... }`
    /// literal with no repeated type name,
    /// so that case is special-cased here rather than going through the
    /// generic expression grammar.
    pub(crate) fn var_decl(&mut self) -> Result<VarDecl, ()> {
        let start_line = self.current.line;
        let ty = self.parse_type()?;
        let name = self.expect_ident("a variable name")?;
        let init = if self.matches(TokenKind::Eq) {
            if self.check(TokenKind::LBrace) {
                let struct_name = match &ty {
                    Type::Named(sym) => Some(*sym),
                    _ => None,
                };
                let brace_line = self.current.line;
                self.advance(); // consume '{'
                Some(self.struct_init_body(struct_name, Span::point(brace_line, 0))?)
            } else {
                Some(self.parse_expr()?)
            }
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "';' after variable declaration")?;
        Ok(VarDecl { ty, name, init, span: Span::point(start_line, 0) })
    }
}
