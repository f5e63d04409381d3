//! Top-level declaration parsing: `struct`, `[async]
//! function`, `import`, and - since the language has no separate "script"
//! top level - any ordinary statement interleaved among them.

use crate::ast::*;
use crate::Parser;
use vanarize_lex::TokenKind;
use vanarize_util::symbol::{KW_ASYNC, KW_FUNCTION, KW_IMPORT, KW_STRUCT};
use vanarize_util::Span;

impl<'src, 'h> Parser<'src, 'h> {
    /// Parse one top-level declaration (or statement) and append whatever
    /// it expands to onto `items` - `import` may expand to many items at
    /// once.
    pub(crate) fn declaration(&mut self, items: &mut Vec<Item>) -> Result<(), ()> {
        if self.check_keyword(KW_IMPORT) {
            let mut imported = self.import_decl()?;
            items.append(&mut imported);
            return Ok(());
        }
        if self.check_keyword(KW_STRUCT) {
            items.push(Item::Struct(self.struct_decl()?));
            return Ok(());
        }
        if self.check_keyword(KW_ASYNC) || self.check_keyword(KW_FUNCTION) {
            items.push(Item::Function(self.function_decl()?));
            return Ok(());
        }
        items.push(Item::TopStmt(self.parse_stmt()?));
        Ok(())
    }

    /// `[async] function <name>(<type> <name>, ...) [:: <type>] { .. }`
    ///. The active import `prefix`, if any, is applied to
    /// `name` here so every call site sees the rewritten name from the
    /// moment the function is declared.
    fn function_decl(&mut self) -> Result<FunctionDecl, ()> {
        let is_async = self.matches_keyword(KW_ASYNC);
        let tok = self.expect_keyword(KW_FUNCTION, "'function'")?;
        let span = Span::point(tok.line, 0);
        let raw_name = self.expect_ident("a function name")?;
        let name = self.namespaced(raw_name);

        self.expect(TokenKind::LParen, "'(' after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            params.push(self.param()?);
            while self.matches(TokenKind::Comma) {
                params.push(self.param()?);
            }
        }
        self.expect(TokenKind::RParen, "')' after function parameters")?;

        let ret_type = if self.matches(TokenKind::ColonColon) { Some(self.parse_type()?) } else { None };

        let body = self.parse_block()?;
        Ok(FunctionDecl { name, is_async, params, ret_type, body, span })
    }

    fn param(&mut self) -> Result<Param, ()> {
        let line = self.current.line;
        let ty = self.parse_type()?;
        let name = self.expect_ident("a parameter name")?;
        Ok(Param { ty, name, span: Span::point(line, 0) })
    }

    /// `struct <Name> { <type> <field> ... }` - fields have no separating
    /// comma.
    fn struct_decl(&mut self) -> Result<StructDecl, ()> {
        let tok = self.expect_keyword(KW_STRUCT, "'struct'")?;
        let span = Span::point(tok.line, 0);
        let name = self.expect_ident("a struct name")?;
        self.expect(TokenKind::LBrace, "'{' after struct name")?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let field_line = self.current.line;
            let ty = self.parse_type()?;
            let field_name = self.expect_ident("a field name")?;
            fields.push(Field { ty, name: field_name, span: Span::point(field_line, 0) });
        }
        self.expect(TokenKind::RBrace, "'}' after struct fields")?;
        Ok(StructDecl { name, fields, span })
    }

    /// `import "<path>";` - synchronously reads and recursively parses the
    /// referenced file, with every function name inside it rewritten to
    /// `<basename>_<name>`. Returns the imported
    /// file's top-level items so the caller can splice them directly into
    /// its own item list; an already-imported file (by canonical path)
    /// contributes nothing the second time, guarding against import
    /// cycles.
    fn import_decl(&mut self) -> Result<Vec<Item>, ()> {
        let tok = self.expect_keyword(KW_IMPORT, "'import'")?;
        let line = tok.line;
        let path_tok = self.expect(TokenKind::Str, "a string literal path after 'import'")?;
        self.expect(TokenKind::Semicolon, "';' after import")?;

        let raw_path = &path_tok.lexeme[1..path_tok.lexeme.len() - 1];
        let resolved = self.base_dir.join(raw_path);
        let canonical = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());

        if !self.imported.borrow_mut().insert(canonical.clone()) {
            return Ok(Vec::new());
        }

        let source = std::fs::read_to_string(&resolved)
            .map_err(|_| ())
            .or_else(|_| self.error_at(line, &format!("Cannot read imported file '{}'.", resolved.display())))?;
        let leaked: &'static str = Box::leak(source.into_boxed_str());

        let prefix_name = resolved
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("import");
        let prefix = vanarize_util::Symbol::intern(prefix_name);

        let import_base_dir = resolved.parent().map(|p| p.to_path_buf()).unwrap_or_default();
        let mut nested = self.new_nested(leaked, import_base_dir, prefix);
        nested.parse_program()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanarize_util::diagnostic::Handler;

    fn parse_items(src: &str) -> Vec<Item> {
        let handler = Handler::new();
        crate::parse(src, std::path::Path::new("."), &handler).expect("program should parse")
    }

    #[test]
    fn function_declaration() {
        let items = parse_items("function add(int a, int b) :: int { return a + b; }");
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Item::Function(f) if f.params.len() == 2));
    }

    #[test]
    fn struct_declaration() {
        let items = parse_items("struct Point { int x int y }");
        match &items[0] {
            Item::Struct(s) => assert_eq!(s.fields.len(), 2),
            other => panic!("expected Struct, got {other:?}"),
        }
    }

    #[test]
    fn async_function_parses() {
        let items = parse_items("async function f() { return nil; }");
        match &items[0] {
            Item::Function(f) => assert!(f.is_async),
            other => panic!("expected Function, got {other:?}"),
        }
    }

    #[test]
    fn top_level_statements_interleave_with_declarations() {
        let items = parse_items("int x = 10; function f() { return x; } print(x);");
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Item::TopStmt(Stmt::VarDecl(_))));
        assert!(matches!(items[1], Item::Function(_)));
        assert!(matches!(items[2], Item::TopStmt(Stmt::Expr(_))));
    }

    #[test]
    fn import_splices_namespaced_functions() {
        let dir = tempfile_dir();
        std::fs::write(dir.join("util.vana"), "function helper() { return 1; }").unwrap();
        std::fs::write(dir.join("main.vana"), "import \"util.vana\"; print(util_helper());").unwrap();
        let source = std::fs::read_to_string(dir.join("main.vana")).unwrap();
        let handler = Handler::new();
        let items = crate::parse(&source, &dir, &handler).expect("program should parse");
        assert!(items.iter().any(|it| matches!(
            it,
            Item::Function(f) if f.name == vanarize_util::Symbol::intern("util_helper")
        )));
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("vanarize-par-test-{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        dir
    }
}
