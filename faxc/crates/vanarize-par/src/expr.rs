//! Expression parsing: plain recursive descent down the
//! precedence chain
//!
//! ```text
//! assignment -> equality -> comparison -> term -> factor -> unary -> call -> primary
//! ```
//!
//! `assignment` is right-associative and only legal when its left side is
//! an identifier, a property-get, or an index-get; every other shape is
//! "invalid assignment target".

use crate::ast::*;
use crate::Parser;
use vanarize_lex::TokenKind;
use vanarize_util::symbol::{KW_AWAIT, KW_FALSE, KW_NIL, KW_PRINT, KW_TRUE};
use vanarize_util::{Span, Symbol};

impl<'src, 'h> Parser<'src, 'h> {
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ()> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ()> {
        let target = self.equality()?;
        if self.matches(TokenKind::Eq) {
            let eq_line = self.previous.line;
            let value = self.assignment()?; // right-associative
            let span = Span::point(eq_line, 0);
            return match target {
                Expr::Identifier(name, _) => Ok(Expr::Assign { name, value: Box::new(value), span }),
                Expr::PropertyGet { object, name, .. } => {
                    Ok(Expr::PropertySet { object, name, value: Box::new(value), span })
                }
                Expr::IndexGet { object, index, .. } => {
                    Ok(Expr::IndexSet { object, index, value: Box::new(value), span })
                }
                _ => self.error_at(eq_line, "Invalid assignment target."),
            };
        }
        Ok(target)
    }

    fn equality(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.comparison()?;
        loop {
            let op = if self.matches(TokenKind::EqEq) {
                BinOp::Eq
            } else if self.matches(TokenKind::BangEq) {
                BinOp::NotEq
            } else {
                break;
            };
            let rhs = self.comparison()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.matches(TokenKind::Less) {
                BinOp::Lt
            } else if self.matches(TokenKind::LessEq) {
                BinOp::LtEq
            } else if self.matches(TokenKind::Greater) {
                BinOp::Gt
            } else if self.matches(TokenKind::GreaterEq) {
                BinOp::GtEq
            } else {
                break;
            };
            let rhs = self.term()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.factor()?;
        loop {
            let op = if self.matches(TokenKind::Plus) {
                BinOp::Add
            } else if self.matches(TokenKind::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.factor()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, ()> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.matches(TokenKind::Star) {
                BinOp::Mul
            } else if self.matches(TokenKind::Slash) {
                BinOp::Div
            } else {
                break;
            };
            let rhs = self.unary()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ()> {
        if self.matches(TokenKind::Bang) {
            let line = self.previous.line;
            let expr = self.unary()?;
            return Ok(Expr::Unary { op: UnOp::Not, expr: Box::new(expr), span: Span::point(line, 0) });
        }
        if self.matches(TokenKind::Minus) {
            let line = self.previous.line;
            let expr = self.unary()?;
            return Ok(Expr::Unary { op: UnOp::Neg, expr: Box::new(expr), span: Span::point(line, 0) });
        }
        if self.matches_keyword(KW_AWAIT) {
            let line = self.previous.line;
            let expr = self.unary()?;
            return Ok(Expr::Await { expr: Box::new(expr), span: Span::point(line, 0) });
        }
        self.call()
    }

    /// Postfix chain: `primary` followed by any number of `()`, `.name`,
    /// `[index]`.
    fn call(&mut self) -> Result<Expr, ()> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let start_line = self.previous.line;
                let args = self.arg_list()?;
                self.expect(TokenKind::RParen, "')' after arguments")?;
                let span = Span::point(start_line, 0).merge(expr.span());
                expr = Expr::Call { callee: Box::new(expr), args, span };
            } else if self.matches(TokenKind::Dot) {
                let name = self.expect_ident("a property name after '.'")?;
                let span = expr.span();
                expr = Expr::PropertyGet { object: Box::new(expr), name, span };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket, "']' after index expression")?;
                let span = expr.span();
                expr = Expr::IndexGet { object: Box::new(expr), index: Box::new(index), span };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn arg_list(&mut self) -> Result<Vec<Expr>, ()> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            args.push(self.parse_expr()?);
            while self.matches(TokenKind::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ()> {
        let line = self.current.line;
        let span = Span::point(line, 0);

        if self.matches(TokenKind::Number) {
            let lexeme = self.previous.lexeme;
            let n: f64 = lexeme
                .parse()
                .map_err(|_| ())
                .or_else(|_| self.error_at(line, "malformed numeric literal"))?;
            return Ok(Expr::Literal(Literal::Number(n), span));
        }
        if self.matches(TokenKind::Str) {
            let lexeme = self.previous.lexeme;
            let content = &lexeme[1..lexeme.len() - 1]; // strip surrounding quotes, no escapes
            return Ok(Expr::Literal(Literal::Str(content.to_string()), span));
        }
        if self.matches_keyword(KW_TRUE) {
            return Ok(Expr::Literal(Literal::Bool(true), span));
        }
        if self.matches_keyword(KW_FALSE) {
            return Ok(Expr::Literal(Literal::Bool(false), span));
        }
        if self.matches_keyword(KW_NIL) {
            return Ok(Expr::Literal(Literal::Nil, span));
        }
        if self.matches_keyword(KW_PRINT) {
            self.expect(TokenKind::LParen, "'(' after 'print'")?;
            let arg = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')' after print argument")?;
            return Ok(Expr::Print { arg: Box::new(arg), span });
        }
        if self.matches(TokenKind::LBracket) {
            let mut elems = Vec::new();
            if !self.check(TokenKind::RBracket) {
                elems.push(self.parse_expr()?);
                while self.matches(TokenKind::Comma) {
                    elems.push(self.parse_expr()?);
                }
            }
            self.expect(TokenKind::RBracket, "']' after array literal")?;
            return Ok(Expr::ArrayLiteral(elems, span));
        }
        if self.matches(TokenKind::LBrace) {
            return self.struct_init_body(None, span);
        }
        if self.matches(TokenKind::LParen) {
            let inner = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')' after expression")?;
            return Ok(inner);
        }
        if self.is_ident() {
            let name = self.expect_ident("an expression")?;
            return Ok(Expr::Identifier(name, span));
        }
        self.error_here("Expect expression.")
    }

    /// `{ field: expr, ... }` - the field list shared by struct-typed
    /// variable initializers and any other
    /// place a bare brace-delimited field list appears. `name` is supplied
    /// by the declared variable's type when parsing a `VarDecl` initializer.
    pub(crate) fn struct_init_body(&mut self, name: Option<Symbol>, span: Span) -> Result<Expr, ()> {
        let mut fields = Vec::new();
        if !self.check(TokenKind::RBrace) {
            loop {
                let field_name = self.expect_ident("a field name")?;
                self.expect(TokenKind::Colon, "':' after field name")?;
                let value = self.parse_expr()?;
                fields.push((field_name, value));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "'}' after struct literal fields")?;
        let name = name.ok_or(())?;
        Ok(Expr::StructInit { name, fields, span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanarize_util::diagnostic::Handler;

    fn parse_expr(src: &str) -> Expr {
        let handler = Handler::new();
        let mut parser = Parser::new(src, std::path::PathBuf::from("."), &handler);
        parser.parse_expr().expect("expression should parse")
    }

    #[test]
    fn arithmetic_precedence() {
        let expr = parse_expr("10 + 20 * 3");
        match expr {
            Expr::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected Add at the top, got {other:?}"),
        }
    }

    #[test]
    fn left_associative_addition() {
        let expr = parse_expr("10 + 20 + 30");
        match expr {
            Expr::Binary { op: BinOp::Add, lhs, .. } => {
                assert!(matches!(*lhs, Expr::Binary { op: BinOp::Add, .. }));
            }
            other => panic!("expected left-nested Add, got {other:?}"),
        }
    }

    #[test]
    fn call_postfix_chain() {
        let expr = parse_expr("add(1, 2)");
        assert!(matches!(expr, Expr::Call { .. }));
    }

    #[test]
    fn property_then_index_chain() {
        let expr = parse_expr("p.field[0]");
        assert!(matches!(expr, Expr::IndexGet { .. }));
    }

    #[test]
    fn assignment_to_identifier() {
        let expr = parse_expr("x = 5");
        assert!(matches!(expr, Expr::Assign { .. }));
    }

    #[test]
    fn assignment_to_property_becomes_property_set() {
        let expr = parse_expr("p.x = 5");
        assert!(matches!(expr, Expr::PropertySet { .. }));
    }

    #[test]
    fn assignment_to_index_becomes_index_set() {
        let expr = parse_expr("arr[0] = 5");
        assert!(matches!(expr, Expr::IndexSet { .. }));
    }

    #[test]
    fn invalid_assignment_target_is_an_error() {
        let handler = Handler::new();
        let mut parser = Parser::new("(a + b) = 1", std::path::PathBuf::from("."), &handler);
        assert!(parser.parse_expr().is_err());
        assert!(handler.has_errors());
    }

    #[test]
    fn unary_and_await() {
        assert!(matches!(parse_expr("-x"), Expr::Unary { op: UnOp::Neg, .. }));
        assert!(matches!(parse_expr("!x"), Expr::Unary { op: UnOp::Not, .. }));
        assert!(matches!(parse_expr("await x"), Expr::Await { .. }));
    }

    #[test]
    fn print_parses_as_dedicated_node() {
        assert!(matches!(parse_expr("print(1)"), Expr::Print { .. }));
    }

    #[test]
    fn array_literal() {
        match parse_expr("[1, 2, 3]") {
            Expr::ArrayLiteral(elems, _) => assert_eq!(elems.len(), 3),
            other => panic!("expected ArrayLiteral, got {other:?}"),
        }
    }
}
