//! Type-token parsing: the nine primitive type keywords, a
//! struct name, and the `[]` array suffix.

use crate::ast::{PrimitiveType, Type};
use crate::Parser;
use vanarize_lex::TokenKind;

impl<'src, 'h> Parser<'src, 'h> {
    /// True if `current` can begin a typed declaration: one of the nine
    /// primitive keywords, or (per `IDENT IDENT` tie-break)
    /// an identifier immediately followed by another identifier.
    pub(crate) fn at_type_start(&self) -> bool {
        self.current_primitive_keyword().is_some() || (self.is_ident() && self.is_next_ident())
    }

    fn current_primitive_keyword(&self) -> Option<PrimitiveType> {
        match self.current.kind {
            TokenKind::Keyword(sym) => PrimitiveType::from_keyword(sym),
            _ => None,
        }
    }

    /// Parse a declared type: a primitive keyword or a struct name,
    /// optionally suffixed with `[]`. Struct-array types are only reachable
    /// through this path (function parameters, return types, `struct`
    /// fields), never through a bare statement, where they are disallowed.
    pub(crate) fn parse_type(&mut self) -> Result<Type, ()> {
        let base = if let Some(prim) = self.current_primitive_keyword() {
            self.advance();
            Type::Primitive(prim)
        } else if self.is_ident() {
            let name = self.expect_ident("a type name")?;
            Type::Named(name)
        } else {
            return self.error_here("a type");
        };
        if self.matches(TokenKind::LBracket) {
            self.expect(TokenKind::RBracket, "']' after '[' in array type")?;
            Ok(Type::Array(Box::new(base)))
        } else {
            Ok(base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanarize_util::diagnostic::Handler;

    fn parse_type(src: &str) -> Type {
        let handler = Handler::new();
        let mut parser = Parser::new(src, std::path::PathBuf::from("."), &handler);
        parser.parse_type().expect("type should parse")
    }

    #[test]
    fn primitive_type() {
        assert_eq!(parse_type("int"), Type::Primitive(PrimitiveType::Int));
    }

    #[test]
    fn struct_type() {
        assert_eq!(parse_type("Point"), Type::Named(vanarize_util::Symbol::intern("Point")));
    }

    #[test]
    fn primitive_array_type() {
        assert_eq!(parse_type("int[]"), Type::Array(Box::new(Type::Primitive(PrimitiveType::Int))));
    }
}
