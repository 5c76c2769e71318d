//! Recovering recursive-descent parser for the Java subset Nova analyses.
//!
//! The parser never fails: malformed input is recorded as a [`ParseError`] and
//! skipped, and the affected expression becomes [`ast::Expr::Missing`].

use nova_types::Span;

use crate::ast;
use crate::lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub range: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parse {
    compilation_unit: ast::CompilationUnit,
    errors: Vec<ParseError>,
}

impl Parse {
    #[must_use]
    pub fn compilation_unit(&self) -> &ast::CompilationUnit {
        &self.compilation_unit
    }

    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }
}

#[must_use]
pub fn parse(text: &str) -> Parse {
    let mut parser = Parser::new(text, 0);
    let compilation_unit = parser.parse_compilation_unit();
    Parse {
        compilation_unit,
        errors: parser.errors,
    }
}

/// Parse a Java block statement (`{ ... }`).
///
/// `offset` specifies the byte offset of `text` within the original file so
/// returned spans are file-relative.
#[must_use]
pub fn parse_block(text: &str, offset: usize) -> ast::Block {
    let mut parser = Parser::new(text, offset);
    parser.parse_block()
}

/// Parse a single expression snippet. Returns `None` if tokens remain after it.
#[must_use]
pub fn parse_expression(text: &str, offset: usize) -> Option<ast::Expr> {
    let mut parser = Parser::new(text, offset);
    let expr = parser.parse_expr();
    (parser.is_eof() && parser.errors.is_empty()).then_some(expr)
}

const RESERVED: &[&str] = &[
    "abstract",
    "assert",
    "break",
    "case",
    "catch",
    "class",
    "continue",
    "default",
    "do",
    "else",
    "enum",
    "extends",
    "false",
    "final",
    "finally",
    "for",
    "if",
    "implements",
    "import",
    "instanceof",
    "interface",
    "native",
    "new",
    "null",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "static",
    "super",
    "switch",
    "synchronized",
    "this",
    "throw",
    "throws",
    "transient",
    "true",
    "try",
    "volatile",
    "while",
];

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "short", "char", "int", "long", "float", "double", "void",
];

struct Parser<'a> {
    text: &'a str,
    offset: usize,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, offset: usize) -> Self {
        Parser {
            text,
            offset,
            tokens: Lexer::new(text, offset).collect(),
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn nth_kind(&self, n: usize) -> Option<TokenKind> {
        self.peek_n(n).map(|t| t.kind)
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek()
            .is_some_and(|token| token.kind == TokenKind::Ident && token.text == keyword)
    }

    fn nth_is_keyword(&self, n: usize, keyword: &str) -> bool {
        self.peek_n(n)
            .is_some_and(|token| token.kind == TokenKind::Ident && token.text == keyword)
    }

    fn at_name(&self) -> bool {
        self.peek().is_some_and(|token| {
            token.kind == TokenKind::Ident && !RESERVED.contains(&token.text.as_str())
        })
    }

    /// `true` when token `n` ends exactly where token `n + 1` starts.
    fn adjacent(&self, n: usize) -> bool {
        match (self.peek_n(n), self.peek_n(n + 1)) {
            (Some(a), Some(b)) => a.range.end == b.range.start,
            _ => false,
        }
    }

    fn bump(&mut self) -> Option<Token> {
        if self.is_eof() {
            return None;
        }
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        Some(tok)
    }

    fn bump_n(&mut self, n: usize) -> Option<Token> {
        let mut last = None;
        for _ in 0..n {
            last = self.bump();
        }
        last
    }

    fn current_range(&self) -> Span {
        match self.peek() {
            Some(tok) => tok.range,
            None => {
                let end = self.offset + self.text.len();
                Span::new(end, end)
            }
        }
    }

    fn current_start(&self) -> usize {
        self.current_range().start
    }

    /// End offset of the most recently consumed token.
    fn last_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .map(|t| t.range.end)
            .unwrap_or(self.offset)
    }

    fn slice(&self, range: Span) -> &'a str {
        let start = range.start.saturating_sub(self.offset);
        let end = range.end.saturating_sub(self.offset);
        self.text.get(start..end).unwrap_or("")
    }

    fn error(&mut self, message: impl Into<String>, range: Span) {
        self.errors.push(ParseError {
            message: message.into(),
            range,
        });
    }

    /// Consumes `kind` or records an error without consuming anything.
    fn expect_kind(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at_kind(kind) {
            return self.bump();
        }
        let range = self.current_range();
        self.error(format!("expected {kind:?}"), range);
        None
    }

    fn expect_ident(&mut self) -> Option<Token> {
        if self.at_kind(TokenKind::Ident) {
            return self.bump();
        }
        let range = self.current_range();
        self.error("expected identifier", range);
        None
    }

    // ---------------------------------------------------------------------
    // Declarations
    // ---------------------------------------------------------------------

    fn parse_compilation_unit(&mut self) -> ast::CompilationUnit {
        let start = self.offset;
        let end = self.offset + self.text.len();

        let package = if self.at_keyword("package") {
            Some(self.parse_package_decl())
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.at_keyword("import") {
            imports.push(self.parse_import_decl());
        }

        let mut types = Vec::new();
        while !self.is_eof() {
            if self.at_kind(TokenKind::Semi) {
                self.bump();
                continue;
            }
            if let Some(decl) = self.parse_type_decl() {
                types.push(decl);
            } else {
                let range = self.current_range();
                self.error("expected a type declaration", range);
                self.bump();
            }
        }

        ast::CompilationUnit {
            package,
            imports,
            types,
            range: Span::new(start, end),
        }
    }

    fn parse_package_decl(&mut self) -> ast::PackageDecl {
        let start = self.current_start();
        self.bump();
        let (name, _) = self.parse_qualified_name();
        self.expect_kind(TokenKind::Semi);
        ast::PackageDecl {
            name,
            range: Span::new(start, self.last_end()),
        }
    }

    fn parse_import_decl(&mut self) -> ast::ImportDecl {
        let start = self.current_start();
        self.bump();
        let mut is_static = false;
        if self.at_keyword("static") {
            is_static = true;
            self.bump();
        }

        let mut parts = Vec::new();
        if let Some(first) = self.expect_ident() {
            parts.push(first.text);
        }

        let mut is_star = false;
        while self.at_kind(TokenKind::Dot) {
            self.bump();
            if self.at_kind(TokenKind::Star) {
                self.bump();
                is_star = true;
                break;
            }
            match self.expect_ident() {
                Some(part) => parts.push(part.text),
                None => break,
            }
        }
        self.expect_kind(TokenKind::Semi);

        ast::ImportDecl {
            is_static,
            is_star,
            path: parts.join("."),
            range: Span::new(start, self.last_end()),
        }
    }

    fn parse_qualified_name(&mut self) -> (String, Span) {
        let start = self.current_start();
        let mut parts = Vec::new();
        if let Some(first) = self.expect_ident() {
            parts.push(first.text);
        }
        while self.at_kind(TokenKind::Dot) && self.nth_kind(1) == Some(TokenKind::Ident) {
            self.bump();
            if let Some(part) = self.bump() {
                parts.push(part.text);
            }
        }
        (parts.join("."), Span::new(start, self.last_end()))
    }

    fn parse_type_decl(&mut self) -> Option<ast::TypeDecl> {
        let start_pos = self.pos;
        let start = self.peek()?.range.start;

        self.skip_modifiers_and_annotations();

        let kind = if self.at_kind(TokenKind::At) && self.nth_is_keyword(1, "interface") {
            self.bump();
            ast::TypeDeclKind::Annotation
        } else {
            let keyword = self.peek().map(|t| t.text.clone());
            match keyword.as_deref() {
                Some("class") => ast::TypeDeclKind::Class,
                Some("interface") => ast::TypeDeclKind::Interface,
                Some("enum") => ast::TypeDeclKind::Enum,
                Some("record") if self.nth_kind(1) == Some(TokenKind::Ident) => {
                    ast::TypeDeclKind::Record
                }
                _ => {
                    self.pos = start_pos;
                    return None;
                }
            }
        };
        self.bump();

        let name = self.expect_ident()?;
        let body = self.parse_type_body(&name.text, kind == ast::TypeDeclKind::Enum);
        Some(ast::TypeDecl {
            kind,
            name: name.text,
            name_range: name.range,
            range: Span::new(start, body.range.end),
            body,
        })
    }

    fn skip_annotation(&mut self) {
        self.bump();
        if self.at_kind(TokenKind::Ident) {
            self.parse_qualified_name();
        }
        if self.at_kind(TokenKind::LParen) {
            self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
        }
    }

    fn skip_modifiers_and_annotations(&mut self) -> ast::Modifiers {
        let mut modifiers = ast::Modifiers::default();
        loop {
            if self.at_kind(TokenKind::At) {
                if self.nth_is_keyword(1, "interface") {
                    break;
                }
                self.skip_annotation();
                continue;
            }

            let Some(tok) = self.peek() else { break };
            if tok.kind != TokenKind::Ident {
                break;
            }
            let text = tok.text.clone();
            match text.as_str() {
                "non"
                    if self.nth_kind(1) == Some(TokenKind::Minus)
                        && self.nth_is_keyword(2, "sealed") =>
                {
                    self.bump_n(3);
                }
                "static" if self.nth_kind(1) == Some(TokenKind::LBrace) => break,
                "final" => {
                    modifiers.is_final = true;
                    self.bump();
                }
                "static" => {
                    modifiers.is_static = true;
                    self.bump();
                }
                "public" | "protected" | "private" | "abstract" | "synchronized" | "native"
                | "transient" | "volatile" | "strictfp" => {
                    self.bump();
                }
                "default" | "sealed"
                    if self.nth_kind(1).is_some_and(|k| k == TokenKind::Ident)
                        || self.nth_kind(1) == Some(TokenKind::Lt) =>
                {
                    self.bump();
                }
                _ => break,
            }
        }
        modifiers
    }

    fn parse_type_body(&mut self, type_name: &str, is_enum: bool) -> ast::ClassBody {
        // Type parameters, `extends`, `implements`, `permits` and record headers.
        while !self.at_kind(TokenKind::LBrace) && !self.is_eof() {
            if self.at_kind(TokenKind::LParen) {
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                continue;
            }
            self.bump();
        }
        self.parse_class_body(type_name, is_enum)
    }

    fn parse_class_body(&mut self, type_name: &str, is_enum: bool) -> ast::ClassBody {
        let start = self.current_start();
        self.expect_kind(TokenKind::LBrace);

        if is_enum {
            self.skip_enum_constants();
        }

        let mut members = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            let before = self.pos;
            if self.at_kind(TokenKind::Semi) {
                self.bump();
                continue;
            }
            if let Some(member) = self.parse_member_decl(type_name) {
                members.push(member);
            }
            if self.pos == before {
                let range = self.current_range();
                self.error("unexpected token in class body", range);
                self.bump();
            }
        }

        self.expect_kind(TokenKind::RBrace);
        ast::ClassBody {
            members,
            range: Span::new(start, self.last_end()),
        }
    }

    fn skip_enum_constants(&mut self) {
        if self.at_kind(TokenKind::Semi) {
            self.bump();
            return;
        }

        loop {
            if self.at_kind(TokenKind::Semi) {
                self.bump();
                break;
            }
            if self.at_kind(TokenKind::RBrace) || self.is_eof() {
                break;
            }

            self.skip_modifiers_and_annotations();
            if !self.at_kind(TokenKind::Ident) {
                break;
            }
            self.bump();

            if self.at_kind(TokenKind::LParen) {
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
            }
            if self.at_kind(TokenKind::LBrace) {
                self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
            }
            if self.at_kind(TokenKind::Comma) {
                self.bump();
                continue;
            }
            if self.at_kind(TokenKind::Semi) {
                self.bump();
                break;
            }
            if self.at_kind(TokenKind::RBrace) {
                break;
            }
            self.bump();
        }
    }

    fn parse_member_decl(&mut self, enclosing_type: &str) -> Option<ast::MemberDecl> {
        let start = self.peek()?.range.start;
        let modifiers = self.skip_modifiers_and_annotations();

        if self.at_keyword("static") && self.nth_kind(1) == Some(TokenKind::LBrace) {
            self.bump();
            let body = self.parse_block();
            let range = Span::new(start, body.range.end);
            return Some(ast::MemberDecl::Initializer(ast::InitializerDecl {
                is_static: true,
                body,
                range,
            }));
        }

        if self.at_kind(TokenKind::LBrace) {
            let body = self.parse_block();
            let range = Span::new(start, body.range.end);
            return Some(ast::MemberDecl::Initializer(ast::InitializerDecl {
                is_static: false,
                body,
                range,
            }));
        }

        let is_nested_type = (self.at_kind(TokenKind::At) && self.nth_is_keyword(1, "interface"))
            || self.peek().is_some_and(|t| {
                t.kind == TokenKind::Ident
                    && (matches!(t.text.as_str(), "class" | "interface" | "enum")
                        || (t.text == "record" && self.nth_kind(1) == Some(TokenKind::Ident)))
            });
        if is_nested_type {
            return self.parse_type_decl().map(ast::MemberDecl::Type);
        }

        // Generic method/constructor type parameters: `<T extends ...>`
        if self.at_kind(TokenKind::Lt) {
            self.skip_balanced(TokenKind::Lt, TokenKind::Gt);
        }

        if self.at_kind(TokenKind::Ident)
            && self.nth_kind(1) == Some(TokenKind::LParen)
            && self.peek().is_some_and(|t| t.text == enclosing_type)
        {
            let name = self.bump()?;
            let params = self.parse_param_list();
            self.skip_throws_clause();
            let body = self.parse_block();
            let range = Span::new(start, body.range.end);
            return Some(ast::MemberDecl::Constructor(ast::MethodDecl {
                modifiers,
                return_ty: None,
                name: name.text,
                name_range: name.range,
                params,
                body: Some(body),
                range,
            }));
        }

        // Compact record constructor: `Point { ... }`.
        if self.at_kind(TokenKind::Ident)
            && self.nth_kind(1) == Some(TokenKind::LBrace)
            && self.peek().is_some_and(|t| t.text == enclosing_type)
        {
            let name = self.bump()?;
            let body = self.parse_block();
            let range = Span::new(start, body.range.end);
            return Some(ast::MemberDecl::Constructor(ast::MethodDecl {
                modifiers,
                return_ty: None,
                name: name.text,
                name_range: name.range,
                params: Vec::new(),
                body: Some(body),
                range,
            }));
        }

        let ty = self.parse_type_ref()?;
        let name = self.expect_ident()?;

        if self.at_kind(TokenKind::LParen) {
            let params = self.parse_param_list();
            while self.at_kind(TokenKind::LBracket) && self.nth_kind(1) == Some(TokenKind::RBracket)
            {
                self.bump_n(2);
            }
            self.skip_throws_clause();
            if self.at_keyword("default") {
                // Annotation element default value: `int value() default 1;`
                while !self.is_eof() && !self.at_kind(TokenKind::Semi) {
                    if self.at_kind(TokenKind::LBrace) {
                        self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                        continue;
                    }
                    self.bump();
                }
            }
            let body = if self.at_kind(TokenKind::LBrace) {
                Some(self.parse_block())
            } else {
                self.expect_kind(TokenKind::Semi);
                None
            };
            return Some(ast::MemberDecl::Method(ast::MethodDecl {
                modifiers,
                return_ty: Some(ty),
                name: name.text,
                name_range: name.range,
                params,
                body,
                range: Span::new(start, self.last_end()),
            }));
        }

        let declarators = self.parse_declarators_after_name(name);
        self.expect_kind(TokenKind::Semi);
        Some(ast::MemberDecl::Field(ast::FieldDecl {
            modifiers,
            ty,
            declarators,
            range: Span::new(start, self.last_end()),
        }))
    }

    fn skip_throws_clause(&mut self) {
        if !self.at_keyword("throws") {
            return;
        }
        self.bump();
        while !self.is_eof() && !self.at_kind(TokenKind::LBrace) && !self.at_kind(TokenKind::Semi) {
            self.bump();
        }
    }

    fn parse_param_list(&mut self) -> Vec<ast::ParamDecl> {
        let mut params = Vec::new();
        if self.expect_kind(TokenKind::LParen).is_none() {
            return params;
        }
        while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
            let before = self.pos;
            if let Some(param) = self.parse_param() {
                params.push(param);
            }
            if self.at_kind(TokenKind::Comma) {
                self.bump();
            } else if self.pos == before {
                self.bump();
            } else if !self.at_kind(TokenKind::RParen) {
                break;
            }
        }
        self.expect_kind(TokenKind::RParen);
        params
    }

    fn parse_param(&mut self) -> Option<ast::ParamDecl> {
        let start = self.current_start();
        let is_final = self.skip_variable_modifiers_and_annotations();
        let mut ty = self.parse_type_ref()?;
        // Union types in catch clauses: `IOException | RuntimeException e`.
        while self.at_kind(TokenKind::Pipe) {
            self.bump();
            if let Some(alt) = self.parse_type_ref() {
                ty.range = Span::new(ty.range.start, alt.range.end);
            }
        }
        if self.at_kind(TokenKind::Ellipsis) {
            let dots = self.bump()?;
            ty.range = Span::new(ty.range.start, dots.range.end);
        }
        ty.text = self.slice(ty.range).to_string();
        let name = self.expect_ident()?;
        while self.at_kind(TokenKind::LBracket) && self.nth_kind(1) == Some(TokenKind::RBracket) {
            self.bump_n(2);
            ty.text.push_str("[]");
        }
        Some(ast::ParamDecl {
            is_final,
            ty,
            name: name.text,
            name_range: name.range,
            range: Span::new(start, self.last_end()),
        })
    }

    fn skip_variable_modifiers_and_annotations(&mut self) -> bool {
        let mut is_final = false;
        loop {
            if self.at_kind(TokenKind::At) {
                self.skip_annotation();
                continue;
            }
            if self.at_keyword("final") {
                is_final = true;
                self.bump();
                continue;
            }
            break;
        }
        is_final
    }

    /// Parses a type reference. On failure nothing is consumed.
    fn parse_type_ref(&mut self) -> Option<ast::TypeRef> {
        let start_pos = self.pos;
        while self.at_kind(TokenKind::At) && !self.nth_is_keyword(1, "interface") {
            self.skip_annotation();
        }
        let first = self.peek()?;
        if first.kind != TokenKind::Ident || RESERVED.contains(&first.text.as_str()) {
            self.pos = start_pos;
            return None;
        }
        let start = first.range.start;
        let is_primitive = PRIMITIVES.contains(&first.text.as_str());
        self.bump();

        if !is_primitive {
            loop {
                if self.at_kind(TokenKind::Lt) && !self.skip_type_args() {
                    self.pos = start_pos;
                    return None;
                }
                if self.at_kind(TokenKind::Dot) && self.nth_kind(1) == Some(TokenKind::Ident) {
                    self.bump_n(2);
                    continue;
                }
                break;
            }
        }

        while self.at_kind(TokenKind::LBracket) && self.nth_kind(1) == Some(TokenKind::RBracket) {
            self.bump_n(2);
        }

        let range = Span::new(start, self.last_end());
        Some(ast::TypeRef {
            text: self.slice(range).to_string(),
            range,
        })
    }

    /// Skips a `<...>` type argument list. Returns `false` (without restoring
    /// the position) when a token that cannot occur in a type shows up.
    fn skip_type_args(&mut self) -> bool {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => depth -= 1,
                TokenKind::Shl => depth += 2,
                TokenKind::Ident
                | TokenKind::Dot
                | TokenKind::Comma
                | TokenKind::Question
                | TokenKind::LBracket
                | TokenKind::RBracket
                | TokenKind::At
                | TokenKind::Amp => {}
                _ => return false,
            }
            self.bump();
            if depth == 0 {
                return true;
            }
        }
        false
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn parse_block(&mut self) -> ast::Block {
        let start = self.current_start();
        self.expect_kind(TokenKind::LBrace);
        let mut statements = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            let before = self.pos;
            if let Some(stmt) = self.parse_stmt() {
                statements.push(stmt);
            }
            if self.pos == before {
                let range = self.current_range();
                self.error("unexpected token in block", range);
                self.bump();
            }
        }
        self.expect_kind(TokenKind::RBrace);
        ast::Block {
            statements,
            range: Span::new(start, self.last_end()),
        }
    }

    /// A statement in a position that requires one (loop or `if` body).
    fn parse_body_stmt(&mut self) -> ast::Stmt {
        let range = self.current_range();
        match self.parse_stmt() {
            Some(stmt) => stmt,
            None => {
                self.error("expected a statement", range);
                ast::Stmt::Empty(Span::new(range.start, range.start))
            }
        }
    }

    fn parse_stmt(&mut self) -> Option<ast::Stmt> {
        let tok = self.peek()?.clone();
        let start = tok.range.start;
        match tok.kind {
            TokenKind::Semi => {
                let semi = self.bump()?;
                return Some(ast::Stmt::Empty(semi.range));
            }
            TokenKind::LBrace => return Some(ast::Stmt::Block(self.parse_block())),
            TokenKind::RBrace => return None,
            _ => {}
        }

        if tok.kind == TokenKind::Ident {
            match tok.text.as_str() {
                "if" => return Some(self.parse_if_stmt()),
                "for" => return Some(self.parse_for_stmt()),
                "while" => return Some(self.parse_while_stmt()),
                "do" => return Some(self.parse_do_stmt()),
                "return" => {
                    self.bump();
                    let expr = if self.at_kind(TokenKind::Semi) {
                        None
                    } else {
                        Some(self.parse_expr())
                    };
                    self.expect_kind(TokenKind::Semi);
                    return Some(ast::Stmt::Return(ast::ReturnStmt {
                        expr,
                        range: Span::new(start, self.last_end()),
                    }));
                }
                "break" | "continue" => {
                    let is_break = tok.text == "break";
                    self.bump();
                    let label = if self.at_name() {
                        self.bump().map(|t| t.text)
                    } else {
                        None
                    };
                    self.expect_kind(TokenKind::Semi);
                    let jump = ast::JumpStmt {
                        label,
                        range: Span::new(start, self.last_end()),
                    };
                    return Some(if is_break {
                        ast::Stmt::Break(jump)
                    } else {
                        ast::Stmt::Continue(jump)
                    });
                }
                "throw" => {
                    self.bump();
                    let expr = self.parse_expr();
                    self.expect_kind(TokenKind::Semi);
                    return Some(ast::Stmt::Throw(ast::ThrowStmt {
                        expr,
                        range: Span::new(start, self.last_end()),
                    }));
                }
                "try" => return Some(self.parse_try_stmt()),
                "switch" => return Some(self.parse_switch_stmt()),
                "synchronized" if self.nth_kind(1) == Some(TokenKind::LParen) => {
                    self.bump();
                    self.expect_kind(TokenKind::LParen);
                    let lock = self.parse_expr();
                    self.expect_kind(TokenKind::RParen);
                    let body = self.parse_block();
                    return Some(ast::Stmt::Synchronized(ast::SynchronizedStmt {
                        lock,
                        range: Span::new(start, body.range.end),
                        body,
                    }));
                }
                "assert" => {
                    self.skip_to_semi();
                    return Some(ast::Stmt::Other(Span::new(start, self.last_end())));
                }
                "yield"
                    if !matches!(
                        self.nth_kind(1),
                        Some(TokenKind::Eq | TokenKind::LParen | TokenKind::Dot)
                    ) =>
                {
                    self.skip_to_semi();
                    return Some(ast::Stmt::Other(Span::new(start, self.last_end())));
                }
                "class" | "interface" | "enum" | "abstract" | "static" | "final" | "record" => {
                    let save = self.pos;
                    if let Some(decl) = self.parse_type_decl() {
                        return Some(ast::Stmt::LocalClass(decl));
                    }
                    self.pos = save;
                }
                _ => {}
            }

            if self.at_name() && self.nth_kind(1) == Some(TokenKind::Colon) {
                let label = self.bump()?;
                self.bump();
                let body = self.parse_body_stmt();
                return Some(ast::Stmt::Labeled(ast::LabeledStmt {
                    label: label.text,
                    label_range: label.range,
                    range: Span::new(start, body.range().end),
                    body: Box::new(body),
                }));
            }
        }

        if let Some(local) = self.try_parse_local_var_stmt() {
            return Some(ast::Stmt::LocalVar(local));
        }

        let expr = self.parse_expr();
        self.expect_kind(TokenKind::Semi);
        Some(ast::Stmt::Expr(ast::ExprStmt {
            expr,
            range: Span::new(start, self.last_end()),
        }))
    }

    fn skip_to_semi(&mut self) {
        while !self.is_eof() && !self.at_kind(TokenKind::Semi) {
            match self.nth_kind(0) {
                Some(TokenKind::LBrace) => self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace),
                Some(TokenKind::LParen) => self.skip_balanced(TokenKind::LParen, TokenKind::RParen),
                Some(TokenKind::RBrace) => return,
                _ => {
                    self.bump();
                }
            }
        }
        self.bump();
    }

    fn try_parse_local_var_stmt(&mut self) -> Option<ast::LocalVarStmt> {
        let start_pos = self.pos;
        let start = self.peek()?.range.start;

        let is_final = self.skip_variable_modifiers_and_annotations();
        let Some(ty) = self.parse_type_ref() else {
            self.pos = start_pos;
            return None;
        };

        let is_decl = self.at_name()
            && matches!(
                self.nth_kind(1),
                Some(TokenKind::Eq | TokenKind::Semi | TokenKind::Comma | TokenKind::LBracket)
            );
        if !is_decl {
            self.pos = start_pos;
            return None;
        }

        let name = self.bump()?;
        let declarators = self.parse_declarators_after_name(name);
        self.expect_kind(TokenKind::Semi);
        Some(ast::LocalVarStmt {
            is_final,
            ty,
            declarators,
            range: Span::new(start, self.last_end()),
        })
    }

    fn parse_declarators_after_name(&mut self, first: Token) -> Vec<ast::VarDeclarator> {
        let mut declarators = vec![self.parse_declarator_rest(first)];
        while self.at_kind(TokenKind::Comma) {
            self.bump();
            let Some(name) = self.expect_ident() else { break };
            declarators.push(self.parse_declarator_rest(name));
        }
        declarators
    }

    fn parse_declarator_rest(&mut self, name: Token) -> ast::VarDeclarator {
        let mut dims = 0;
        while self.at_kind(TokenKind::LBracket) && self.nth_kind(1) == Some(TokenKind::RBracket) {
            self.bump_n(2);
            dims += 1;
        }
        let initializer = if self.at_kind(TokenKind::Eq) {
            self.bump();
            Some(self.parse_var_initializer())
        } else {
            None
        };
        ast::VarDeclarator {
            range: Span::new(name.range.start, self.last_end()),
            name: name.text,
            name_range: name.range,
            dims,
            initializer,
        }
    }

    fn parse_var_initializer(&mut self) -> ast::Expr {
        if self.at_kind(TokenKind::LBrace) {
            ast::Expr::ArrayInit(self.parse_array_init())
        } else {
            self.parse_expr()
        }
    }

    fn parse_array_init(&mut self) -> ast::ArrayInitExpr {
        let start = self.current_start();
        self.expect_kind(TokenKind::LBrace);
        let mut elements = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            let before = self.pos;
            elements.push(self.parse_var_initializer());
            if self.at_kind(TokenKind::Comma) {
                self.bump();
            } else if self.pos == before || !self.at_kind(TokenKind::RBrace) {
                break;
            }
        }
        self.expect_kind(TokenKind::RBrace);
        ast::ArrayInitExpr {
            elements,
            range: Span::new(start, self.last_end()),
        }
    }

    fn parse_paren_condition(&mut self) -> ast::Expr {
        self.expect_kind(TokenKind::LParen);
        let expr = self.parse_expr();
        self.expect_kind(TokenKind::RParen);
        expr
    }

    fn parse_if_stmt(&mut self) -> ast::Stmt {
        let start = self.current_start();
        self.bump();
        let condition = self.parse_paren_condition();
        let then_branch = self.parse_body_stmt();
        let else_branch = if self.at_keyword("else") {
            self.bump();
            Some(Box::new(self.parse_body_stmt()))
        } else {
            None
        };
        ast::Stmt::If(ast::IfStmt {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
            range: Span::new(start, self.last_end()),
        })
    }

    fn parse_for_stmt(&mut self) -> ast::Stmt {
        let Some(kw) = self.bump() else {
            return ast::Stmt::Empty(self.current_range());
        };
        let start = kw.range.start;
        self.expect_kind(TokenKind::LParen);

        // Enhanced for: `for (final T x : expr)`.
        let save = self.pos;
        let is_final = self.skip_variable_modifiers_and_annotations();
        if let Some(ty) = self.parse_type_ref() {
            if self.at_name() && self.nth_kind(1) == Some(TokenKind::Colon) {
                if let Some(name) = self.bump() {
                    self.bump();
                    let iterable = self.parse_expr();
                    self.expect_kind(TokenKind::RParen);
                    let body = self.parse_body_stmt();
                    return ast::Stmt::ForEach(ast::ForEachStmt {
                        is_final,
                        ty,
                        name: name.text,
                        name_range: name.range,
                        iterable,
                        body: Box::new(body),
                        keyword_range: kw.range,
                        range: Span::new(start, self.last_end()),
                    });
                }
            }
        }
        self.pos = save;

        let mut init = Vec::new();
        if self.at_kind(TokenKind::Semi) {
            self.bump();
        } else if let Some(local) = self.try_parse_local_var_stmt() {
            init.push(ast::Stmt::LocalVar(local));
        } else {
            for expr in self.parse_expr_list(TokenKind::Semi) {
                let range = expr.range();
                init.push(ast::Stmt::Expr(ast::ExprStmt { expr, range }));
            }
            self.expect_kind(TokenKind::Semi);
        }

        let condition = if self.at_kind(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr())
        };
        self.expect_kind(TokenKind::Semi);

        let update = if self.at_kind(TokenKind::RParen) {
            Vec::new()
        } else {
            self.parse_expr_list(TokenKind::RParen)
        };
        self.expect_kind(TokenKind::RParen);

        let body = self.parse_body_stmt();
        ast::Stmt::For(ast::ForStmt {
            init,
            condition,
            update,
            body: Box::new(body),
            keyword_range: kw.range,
            range: Span::new(start, self.last_end()),
        })
    }

    fn parse_expr_list(&mut self, terminator: TokenKind) -> Vec<ast::Expr> {
        let mut exprs = Vec::new();
        while !self.is_eof() && !self.at_kind(terminator) {
            let before = self.pos;
            exprs.push(self.parse_expr());
            if self.at_kind(TokenKind::Comma) {
                self.bump();
            } else if self.pos == before || !self.at_kind(terminator) {
                break;
            }
        }
        exprs
    }

    fn parse_while_stmt(&mut self) -> ast::Stmt {
        let Some(kw) = self.bump() else {
            return ast::Stmt::Empty(self.current_range());
        };
        let condition = self.parse_paren_condition();
        let body = self.parse_body_stmt();
        ast::Stmt::While(ast::WhileStmt {
            condition,
            body: Box::new(body),
            keyword_range: kw.range,
            range: Span::new(kw.range.start, self.last_end()),
        })
    }

    fn parse_do_stmt(&mut self) -> ast::Stmt {
        let start = self.current_start();
        self.bump();
        let body = self.parse_body_stmt();
        if self.at_keyword("while") {
            self.bump();
        } else {
            let range = self.current_range();
            self.error("expected `while`", range);
        }
        let condition = self.parse_paren_condition();
        self.expect_kind(TokenKind::Semi);
        ast::Stmt::Do(ast::DoStmt {
            body: Box::new(body),
            condition,
            range: Span::new(start, self.last_end()),
        })
    }

    fn parse_try_stmt(&mut self) -> ast::Stmt {
        let start = self.current_start();
        self.bump();

        let mut resources = Vec::new();
        if self.at_kind(TokenKind::LParen) {
            self.bump();
            while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
                let before = self.pos;
                if let Some(resource) = self.parse_resource() {
                    resources.push(resource);
                } else {
                    self.parse_expr();
                }
                if self.at_kind(TokenKind::Semi) {
                    self.bump();
                } else if self.pos == before {
                    self.bump();
                } else if !self.at_kind(TokenKind::RParen) {
                    break;
                }
            }
            self.expect_kind(TokenKind::RParen);
        }

        let body = self.parse_block();
        let mut catches = Vec::new();
        while self.at_keyword("catch") {
            let catch_start = self.current_start();
            self.bump();
            self.expect_kind(TokenKind::LParen);
            let param = self.parse_param();
            self.expect_kind(TokenKind::RParen);
            let body = self.parse_block();
            if let Some(param) = param {
                catches.push(ast::CatchClause {
                    param,
                    range: Span::new(catch_start, body.range.end),
                    body,
                });
            }
        }
        let finally = if self.at_keyword("finally") {
            self.bump();
            Some(self.parse_block())
        } else {
            None
        };

        ast::Stmt::Try(ast::TryStmt {
            resources,
            body,
            catches,
            finally,
            range: Span::new(start, self.last_end()),
        })
    }

    fn parse_resource(&mut self) -> Option<ast::LocalVarStmt> {
        let start_pos = self.pos;
        let start = self.current_start();
        let is_final = self.skip_variable_modifiers_and_annotations();
        let ty = self.parse_type_ref();
        let (Some(ty), true) = (
            ty,
            self.at_name() && self.nth_kind(1) == Some(TokenKind::Eq),
        ) else {
            self.pos = start_pos;
            return None;
        };
        let name = self.bump()?;
        let declarator = self.parse_declarator_rest(name);
        Some(ast::LocalVarStmt {
            is_final,
            ty,
            declarators: vec![declarator],
            range: Span::new(start, self.last_end()),
        })
    }

    fn parse_switch_stmt(&mut self) -> ast::Stmt {
        let start = self.current_start();
        self.bump();
        let selector = self.parse_paren_condition();
        self.expect_kind(TokenKind::LBrace);

        let mut groups = Vec::new();
        while !self.is_eof() && !self.at_kind(TokenKind::RBrace) {
            let group_start = self.current_start();
            let mut labels = Vec::new();
            if self.at_keyword("case") {
                self.bump();
                loop {
                    labels.push(self.parse_conditional());
                    if self.at_kind(TokenKind::Comma) {
                        self.bump();
                        continue;
                    }
                    break;
                }
            } else if self.at_keyword("default") {
                self.bump();
            } else {
                let range = self.current_range();
                self.error("expected `case` or `default`", range);
                self.bump();
                continue;
            }

            let mut statements = Vec::new();
            let is_arrow = self.at_kind(TokenKind::Arrow);
            if is_arrow {
                self.bump();
                statements.push(self.parse_body_stmt());
            } else {
                self.expect_kind(TokenKind::Colon);
                while !self.is_eof()
                    && !self.at_kind(TokenKind::RBrace)
                    && !self.at_keyword("case")
                    && !self.at_keyword("default")
                {
                    let before = self.pos;
                    if let Some(stmt) = self.parse_stmt() {
                        statements.push(stmt);
                    }
                    if self.pos == before {
                        self.bump();
                    }
                }
            }
            groups.push(ast::SwitchGroup {
                labels,
                is_arrow,
                statements,
                range: Span::new(group_start, self.last_end()),
            });
        }
        self.expect_kind(TokenKind::RBrace);

        ast::Stmt::Switch(ast::SwitchStmt {
            selector,
            groups,
            range: Span::new(start, self.last_end()),
        })
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn parse_expr(&mut self) -> ast::Expr {
        if self.is_lambda_start() {
            return self.parse_lambda();
        }

        let lhs = self.parse_conditional();
        let Some((op, len)) = self.peek_assign_op() else {
            return lhs;
        };
        self.bump_n(len);
        let rhs = self.parse_expr();
        ast::Expr::Assign(ast::AssignExpr {
            op,
            range: Span::new(lhs.range().start, rhs.range().end),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_conditional(&mut self) -> ast::Expr {
        let condition = self.parse_binary(1);
        if !self.at_kind(TokenKind::Question) {
            return condition;
        }
        self.bump();
        let then_expr = self.parse_expr();
        self.expect_kind(TokenKind::Colon);
        let else_expr = if self.is_lambda_start() {
            self.parse_lambda()
        } else {
            self.parse_conditional()
        };
        ast::Expr::Conditional(ast::ConditionalExpr {
            range: Span::new(condition.range().start, else_expr.range().end),
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    fn peek_assign_op(&self) -> Option<(ast::AssignOp, usize)> {
        use ast::AssignOp::*;
        let op = match self.nth_kind(0)? {
            TokenKind::Eq => (Assign, 1),
            TokenKind::PlusEq => (Add, 1),
            TokenKind::MinusEq => (Sub, 1),
            TokenKind::StarEq => (Mul, 1),
            TokenKind::SlashEq => (Div, 1),
            TokenKind::PercentEq => (Rem, 1),
            TokenKind::AmpEq => (BitAnd, 1),
            TokenKind::PipeEq => (BitOr, 1),
            TokenKind::CaretEq => (BitXor, 1),
            TokenKind::ShlEq => (Shl, 1),
            TokenKind::Gt if self.glued(&[TokenKind::Gt, TokenKind::Gt, TokenKind::Gt, TokenKind::Eq]) => {
                (UShr, 4)
            }
            TokenKind::Gt if self.glued(&[TokenKind::Gt, TokenKind::Gt, TokenKind::Eq]) => (Shr, 3),
            _ => return None,
        };
        Some(op)
    }

    /// `true` when the next tokens are exactly `kinds`, with no whitespace between them.
    fn glued(&self, kinds: &[TokenKind]) -> bool {
        kinds
            .iter()
            .enumerate()
            .all(|(idx, kind)| self.nth_kind(idx) == Some(*kind))
            && (0..kinds.len() - 1).all(|idx| self.adjacent(idx))
    }

    fn peek_binary_op(&self) -> Option<(ast::BinaryOp, usize)> {
        use ast::BinaryOp::*;
        let op = match self.nth_kind(0)? {
            TokenKind::Star => (Mul, 1),
            TokenKind::Slash => (Div, 1),
            TokenKind::Percent => (Rem, 1),
            TokenKind::Plus => (Add, 1),
            TokenKind::Minus => (Sub, 1),
            TokenKind::Shl => (Shl, 1),
            TokenKind::Lt => (Lt, 1),
            TokenKind::LtEq => (Le, 1),
            TokenKind::EqEq => (Eq, 1),
            TokenKind::BangEq => (Ne, 1),
            TokenKind::Amp => (BitAnd, 1),
            TokenKind::Caret => (BitXor, 1),
            TokenKind::Pipe => (BitOr, 1),
            TokenKind::AmpAmp => (And, 1),
            TokenKind::PipePipe => (Or, 1),
            TokenKind::Gt => {
                if self.glued(&[TokenKind::Gt, TokenKind::Gt, TokenKind::Gt, TokenKind::Eq])
                    || self.glued(&[TokenKind::Gt, TokenKind::Gt, TokenKind::Eq])
                {
                    return None;
                }
                if self.glued(&[TokenKind::Gt, TokenKind::Gt, TokenKind::Gt]) {
                    (UShr, 3)
                } else if self.glued(&[TokenKind::Gt, TokenKind::Gt]) {
                    (Shr, 2)
                } else if self.glued(&[TokenKind::Gt, TokenKind::Eq]) {
                    (Ge, 2)
                } else {
                    (Gt, 1)
                }
            }
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> ast::Expr {
        const RELATIONAL: u8 = 7;
        let mut lhs = self.parse_unary();
        loop {
            if self.at_keyword("instanceof") {
                if RELATIONAL < min_prec {
                    break;
                }
                self.bump();
                self.skip_variable_modifiers_and_annotations();
                let ty = match self.parse_type_ref() {
                    Some(ty) => ty,
                    None => {
                        let range = self.current_range();
                        self.error("expected a type after `instanceof`", range);
                        ast::TypeRef {
                            text: String::new(),
                            range: Span::new(range.start, range.start),
                        }
                    }
                };
                let binding = if self.at_name() {
                    self.bump().map(|t| (t.text, t.range))
                } else {
                    None
                };
                lhs = ast::Expr::InstanceOf(ast::InstanceOfExpr {
                    range: Span::new(lhs.range().start, self.last_end()),
                    expr: Box::new(lhs),
                    ty,
                    binding,
                });
                continue;
            }

            let Some((op, len)) = self.peek_binary_op() else {
                break;
            };
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.bump_n(len);
            let rhs = self.parse_binary(prec + 1);
            lhs = ast::Expr::Binary(ast::BinaryExpr {
                op,
                range: Span::new(lhs.range().start, rhs.range().end),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        lhs
    }

    fn parse_unary(&mut self) -> ast::Expr {
        let start = self.current_start();
        let op = match self.nth_kind(0) {
            Some(TokenKind::Plus) => Some(ast::UnaryOp::Plus),
            Some(TokenKind::Minus) => Some(ast::UnaryOp::Minus),
            Some(TokenKind::Bang) => Some(ast::UnaryOp::Not),
            Some(TokenKind::Tilde) => Some(ast::UnaryOp::BitNot),
            Some(TokenKind::PlusPlus) => Some(ast::UnaryOp::PreInc),
            Some(TokenKind::MinusMinus) => Some(ast::UnaryOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_unary();
            return ast::Expr::Unary(ast::UnaryExpr {
                op,
                range: Span::new(start, operand.range().end),
                operand: Box::new(operand),
            });
        }

        if self.at_kind(TokenKind::LParen) {
            if let Some(cast) = self.try_parse_cast() {
                return cast;
            }
        }

        let primary = self.parse_primary();
        self.parse_postfix(primary)
    }

    fn try_parse_cast(&mut self) -> Option<ast::Expr> {
        let start_pos = self.pos;
        let start = self.current_start();
        self.bump();
        let Some(mut ty) = self.parse_type_ref() else {
            self.pos = start_pos;
            return None;
        };
        // Intersection casts: `(Runnable & Serializable)`.
        while self.at_kind(TokenKind::Amp) {
            self.bump();
            match self.parse_type_ref() {
                Some(other) => ty.range = Span::new(ty.range.start, other.range.end),
                None => {
                    self.pos = start_pos;
                    return None;
                }
            }
        }
        if !self.at_kind(TokenKind::RParen) {
            self.pos = start_pos;
            return None;
        }
        self.bump();
        ty.text = self.slice(ty.range).to_string();

        let is_primitive = PRIMITIVES.contains(&ty.text.trim_end_matches("[]"));
        let operand_follows = match self.peek() {
            None => false,
            Some(tok) => match tok.kind {
                TokenKind::Ident => tok.text != "instanceof",
                TokenKind::IntLiteral
                | TokenKind::LongLiteral
                | TokenKind::FloatLiteral
                | TokenKind::DoubleLiteral
                | TokenKind::CharLiteral
                | TokenKind::StringLiteral
                | TokenKind::LParen
                | TokenKind::Bang
                | TokenKind::Tilde => true,
                TokenKind::Plus | TokenKind::Minus | TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    is_primitive
                }
                _ => false,
            },
        };
        if !operand_follows {
            self.pos = start_pos;
            return None;
        }

        let expr = if self.is_lambda_start() {
            self.parse_lambda()
        } else {
            self.parse_unary()
        };
        Some(ast::Expr::Cast(ast::CastExpr {
            ty,
            range: Span::new(start, expr.range().end),
            expr: Box::new(expr),
        }))
    }

    fn is_lambda_start(&self) -> bool {
        match self.nth_kind(0) {
            Some(TokenKind::Ident) => self.at_name() && self.nth_kind(1) == Some(TokenKind::Arrow),
            Some(TokenKind::LParen) => {
                let mut depth = 0usize;
                let mut idx = 0;
                while let Some(kind) = self.nth_kind(idx) {
                    match kind {
                        TokenKind::LParen => depth += 1,
                        TokenKind::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.nth_kind(idx + 1) == Some(TokenKind::Arrow);
                            }
                        }
                        TokenKind::Semi | TokenKind::LBrace | TokenKind::RBrace => return false,
                        _ => {}
                    }
                    idx += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn parse_lambda(&mut self) -> ast::Expr {
        let start = self.current_start();
        let mut params = Vec::new();
        if self.at_kind(TokenKind::Ident) {
            if let Some(name) = self.bump() {
                params.push(ast::LambdaParam {
                    ty: None,
                    name: name.text,
                    name_range: name.range,
                });
            }
        } else {
            self.bump();
            while !self.is_eof() && !self.at_kind(TokenKind::RParen) {
                let before = self.pos;
                if self.at_name()
                    && matches!(self.nth_kind(1), Some(TokenKind::Comma | TokenKind::RParen))
                {
                    if let Some(name) = self.bump() {
                        params.push(ast::LambdaParam {
                            ty: None,
                            name: name.text,
                            name_range: name.range,
                        });
                    }
                } else if let Some(param) = self.parse_param() {
                    let ty = (!param.ty.is_var()).then_some(param.ty);
                    params.push(ast::LambdaParam {
                        ty,
                        name: param.name,
                        name_range: param.name_range,
                    });
                }
                if self.at_kind(TokenKind::Comma) {
                    self.bump();
                } else if self.pos == before {
                    self.bump();
                }
            }
            self.expect_kind(TokenKind::RParen);
        }
        self.expect_kind(TokenKind::Arrow);

        let body = if self.at_kind(TokenKind::LBrace) {
            ast::LambdaBody::Block(self.parse_block())
        } else {
            ast::LambdaBody::Expr(Box::new(self.parse_expr()))
        };
        ast::Expr::Lambda(ast::LambdaExpr {
            params,
            body,
            range: Span::new(start, self.last_end()),
        })
    }

    fn parse_primary(&mut self) -> ast::Expr {
        let Some(tok) = self.peek().cloned() else {
            let range = self.current_range();
            self.error("expected an expression", range);
            return ast::Expr::Missing(range);
        };

        let literal = |kind| {
            ast::Expr::Literal(ast::LiteralExpr {
                kind,
                value: tok.text.clone(),
                range: tok.range,
            })
        };

        match tok.kind {
            TokenKind::IntLiteral => {
                self.bump();
                literal(ast::LiteralKind::Int)
            }
            TokenKind::LongLiteral => {
                self.bump();
                literal(ast::LiteralKind::Long)
            }
            TokenKind::FloatLiteral => {
                self.bump();
                literal(ast::LiteralKind::Float)
            }
            TokenKind::DoubleLiteral => {
                self.bump();
                literal(ast::LiteralKind::Double)
            }
            TokenKind::CharLiteral => {
                self.bump();
                literal(ast::LiteralKind::Char)
            }
            TokenKind::StringLiteral => {
                self.bump();
                literal(ast::LiteralKind::String)
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.parse_expr();
                self.expect_kind(TokenKind::RParen);
                ast::Expr::Paren(ast::ParenExpr {
                    expr: Box::new(expr),
                    range: Span::new(tok.range.start, self.last_end()),
                })
            }
            TokenKind::LBrace => ast::Expr::ArrayInit(self.parse_array_init()),
            TokenKind::Ident => match tok.text.as_str() {
                "true" | "false" => {
                    self.bump();
                    literal(ast::LiteralKind::Bool)
                }
                "null" => {
                    self.bump();
                    literal(ast::LiteralKind::Null)
                }
                "this" | "super" => {
                    self.bump();
                    if self.at_kind(TokenKind::LParen) {
                        // Explicit constructor invocation.
                        let (args, args_range) = self.parse_arg_list();
                        return ast::Expr::MethodCall(ast::MethodCallExpr {
                            receiver: None,
                            name: tok.text.clone(),
                            name_range: tok.range,
                            args,
                            args_range,
                            range: Span::new(tok.range.start, self.last_end()),
                        });
                    }
                    if tok.text == "this" {
                        ast::Expr::This(tok.range)
                    } else {
                        ast::Expr::Super(tok.range)
                    }
                }
                "new" => self.parse_new(),
                "switch" => {
                    // Switch expressions are opaque to loop analysis.
                    self.bump();
                    self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                    self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                    ast::Expr::Missing(Span::new(tok.range.start, self.last_end()))
                }
                text if PRIMITIVES.contains(&text) => match self.parse_type_ref() {
                    Some(ty) => ast::Expr::Type(ty),
                    None => {
                        self.bump();
                        ast::Expr::Missing(tok.range)
                    }
                },
                text if RESERVED.contains(&text) => {
                    self.error(format!("unexpected keyword `{text}`"), tok.range);
                    ast::Expr::Missing(Span::new(tok.range.start, tok.range.start))
                }
                _ => {
                    self.bump();
                    if self.at_kind(TokenKind::LParen) {
                        let (args, args_range) = self.parse_arg_list();
                        return ast::Expr::MethodCall(ast::MethodCallExpr {
                            receiver: None,
                            name: tok.text.clone(),
                            name_range: tok.range,
                            args,
                            args_range,
                            range: Span::new(tok.range.start, self.last_end()),
                        });
                    }
                    ast::Expr::Name(ast::NameExpr {
                        name: tok.text.clone(),
                        range: tok.range,
                    })
                }
            },
            TokenKind::RParen
            | TokenKind::RBrace
            | TokenKind::RBracket
            | TokenKind::Semi
            | TokenKind::Comma => {
                self.error("expected an expression", tok.range);
                ast::Expr::Missing(Span::new(tok.range.start, tok.range.start))
            }
            _ => {
                self.error("expected an expression", tok.range);
                self.bump();
                ast::Expr::Missing(tok.range)
            }
        }
    }

    fn parse_new(&mut self) -> ast::Expr {
        let start = self.current_start();
        self.bump();
        if self.at_kind(TokenKind::Lt) {
            self.skip_type_args();
        }
        while self.at_kind(TokenKind::At) {
            self.skip_annotation();
        }

        // The element/class type, without array dimensions.
        let ty_start = self.current_start();
        let Some(first) = self.expect_ident() else {
            return ast::Expr::Missing(Span::new(start, self.last_end()));
        };
        if !PRIMITIVES.contains(&first.text.as_str()) {
            loop {
                if self.at_kind(TokenKind::Lt) && !self.skip_type_args() {
                    break;
                }
                if self.at_kind(TokenKind::Dot) && self.nth_kind(1) == Some(TokenKind::Ident) {
                    self.bump_n(2);
                    continue;
                }
                break;
            }
        }
        let ty_range = Span::new(ty_start, self.last_end());
        let ty = ast::TypeRef {
            text: self.slice(ty_range).to_string(),
            range: ty_range,
        };

        if self.at_kind(TokenKind::LBracket) {
            let mut dims = Vec::new();
            let mut rank = 0;
            while self.at_kind(TokenKind::LBracket) {
                self.bump();
                if !self.at_kind(TokenKind::RBracket) {
                    dims.push(self.parse_expr());
                }
                self.expect_kind(TokenKind::RBracket);
                rank += 1;
            }
            let initializer = if self.at_kind(TokenKind::LBrace) {
                Some(self.parse_array_init())
            } else {
                None
            };
            return ast::Expr::NewArray(ast::NewArrayExpr {
                elem_ty: ty,
                dims,
                rank,
                initializer,
                range: Span::new(start, self.last_end()),
            });
        }

        let args = if self.at_kind(TokenKind::LParen) {
            self.parse_arg_list().0
        } else {
            let range = self.current_range();
            self.error("expected constructor arguments", range);
            Vec::new()
        };
        let body = if self.at_kind(TokenKind::LBrace) {
            let name = ty.text.clone();
            Some(self.parse_class_body(&name, false))
        } else {
            None
        };
        ast::Expr::New(ast::NewExpr {
            ty,
            args,
            body,
            range: Span::new(start, self.last_end()),
        })
    }

    fn parse_arg_list(&mut self) -> (Vec<ast::Expr>, Span) {
        let start = self.current_start();
        self.expect_kind(TokenKind::LParen);
        let args = if self.at_kind(TokenKind::RParen) {
            Vec::new()
        } else {
            self.parse_expr_list(TokenKind::RParen)
        };
        self.expect_kind(TokenKind::RParen);
        (args, Span::new(start, self.last_end()))
    }

    fn parse_postfix(&mut self, mut expr: ast::Expr) -> ast::Expr {
        loop {
            let start = expr.range().start;
            match self.nth_kind(0) {
                Some(TokenKind::Dot) => {
                    if self.nth_kind(1) == Some(TokenKind::Lt) {
                        // Explicit type arguments: `Collections.<String>emptyList()`.
                        self.bump();
                        self.skip_type_args();
                    } else {
                        self.bump();
                    }
                    if self.at_keyword("class") {
                        self.bump();
                        let ty_range = expr.range();
                        expr = ast::Expr::ClassLiteral(ast::ClassLiteralExpr {
                            ty: ast::TypeRef {
                                text: self.slice(ty_range).to_string(),
                                range: ty_range,
                            },
                            range: Span::new(start, self.last_end()),
                        });
                        continue;
                    }
                    if self.at_keyword("new") {
                        // Qualified inner class creation; the outer instance is dropped.
                        expr = self.parse_new();
                        continue;
                    }
                    let Some(name) = self.expect_ident() else {
                        return expr;
                    };
                    if self.at_kind(TokenKind::LParen) {
                        let (args, args_range) = self.parse_arg_list();
                        expr = ast::Expr::MethodCall(ast::MethodCallExpr {
                            receiver: Some(Box::new(expr)),
                            name: name.text,
                            name_range: name.range,
                            args,
                            args_range,
                            range: Span::new(start, self.last_end()),
                        });
                    } else {
                        expr = ast::Expr::FieldAccess(ast::FieldAccessExpr {
                            receiver: Box::new(expr),
                            name: name.text,
                            name_range: name.range,
                            range: Span::new(start, self.last_end()),
                        });
                    }
                }
                Some(TokenKind::LBracket) if self.nth_kind(1) == Some(TokenKind::RBracket) => {
                    // `String[]::new`, `int[].class`
                    while self.at_kind(TokenKind::LBracket)
                        && self.nth_kind(1) == Some(TokenKind::RBracket)
                    {
                        self.bump_n(2);
                    }
                    let range = Span::new(start, self.last_end());
                    expr = ast::Expr::Type(ast::TypeRef {
                        text: self.slice(range).to_string(),
                        range,
                    });
                }
                Some(TokenKind::LBracket) => {
                    self.bump();
                    let index = self.parse_expr();
                    self.expect_kind(TokenKind::RBracket);
                    expr = ast::Expr::ArrayAccess(ast::ArrayAccessExpr {
                        array: Box::new(expr),
                        index: Box::new(index),
                        range: Span::new(start, self.last_end()),
                    });
                }
                Some(kind @ (TokenKind::PlusPlus | TokenKind::MinusMinus)) => {
                    self.bump();
                    let op = if kind == TokenKind::PlusPlus {
                        ast::UnaryOp::PostInc
                    } else {
                        ast::UnaryOp::PostDec
                    };
                    expr = ast::Expr::Unary(ast::UnaryExpr {
                        op,
                        operand: Box::new(expr),
                        range: Span::new(start, self.last_end()),
                    });
                }
                Some(TokenKind::ColonColon) => {
                    self.bump();
                    if self.at_kind(TokenKind::Lt) {
                        self.skip_type_args();
                    }
                    let Some(name) = self.expect_ident() else {
                        return expr;
                    };
                    expr = ast::Expr::MethodRef(ast::MethodRefExpr {
                        receiver: Box::new(expr),
                        name: name.text,
                        range: Span::new(start, self.last_end()),
                    });
                }
                _ => return expr,
            }
        }
    }

    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) {
        if !self.at_kind(open) {
            return;
        }
        self.bump();
        let mut depth = 1usize;
        while !self.is_eof() && depth > 0 {
            match self.peek().map(|t| t.kind) {
                Some(k) if k == open => depth += 1,
                Some(k) if k == close => depth -= 1,
                _ => {}
            }
            self.bump();
        }
    }
}
