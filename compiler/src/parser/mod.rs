//! Recursive-descent parser: token stream to [`Program`].
//!
//! One token of lookahead, plus a non-consuming type lookahead that
//! separates function declarations from variable declarations. Parse
//! errors are fatal and carry a window of neighbouring tokens.

use crate::ast::*;
use crate::lexer::{Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Parse error at line {line} col {column}: {message}\n{context}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub context: String,
}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    idx: usize,
    current_class: String,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        // Comments are significant to nothing downstream.
        let tokens = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .collect();
        Self {
            tokens,
            idx: 0,
            current_class: String::new(),
        }
    }

    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut program = Program::default();
        while !self.at_end() {
            if let Some(item) = self.parse_declaration_or_statement()? {
                program.items.push(item);
            }
        }
        Ok(program)
    }

    // ----- token plumbing -----

    fn peek(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.idx + offset)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.at_end() {
            self.idx += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.at_end() && self.peek().kind == kind
    }

    fn check_value(&self, kind: TokenKind, value: &str) -> bool {
        self.check(kind) && self.peek().value == value
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    /// Build a fatal error at the current token, with a ten-token
    /// context window for diagnosis.
    fn error(&self, message: &str) -> ParseError {
        let token = self.peek();
        let start = self.idx.saturating_sub(5);
        let end = (self.idx + 5).min(self.tokens.len().saturating_sub(1));
        let mut context = String::new();
        for i in start..=end {
            let t = &self.tokens[i];
            context.push_str(&format!(
                "  {}: {:?} '{}' (line {}, col {})\n",
                i, t.kind, t.value, t.line, t.column
            ));
        }
        ParseError {
            line: token.line,
            column: token.column,
            message: message.to_string(),
            context,
        }
    }

    // ----- type parsing -----

    fn is_type_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::TypeSpecifier | TokenKind::TypeQualifier | TokenKind::StorageClass
        )
    }

    /// Consume a (possibly qualified/templated) type and return its
    /// token list: storage classes, qualifiers, base, `*`/`&` markers.
    fn parse_type(&mut self) -> Vec<String> {
        let mut type_tokens = Vec::new();

        while self.check(TokenKind::StorageClass) {
            type_tokens.push(self.advance().value);
        }
        while self.check(TokenKind::TypeQualifier) {
            type_tokens.push(self.advance().value);
        }

        if self.check(TokenKind::TypeSpecifier) {
            type_tokens.push(self.advance().value);
        } else if self.check(TokenKind::Identifier)
            || self.check_value(TokenKind::Keyword, "typename")
            || self.check_value(TokenKind::Keyword, "class")
        {
            let mut fullname = self.advance().value;

            // A leading typename/class prefixes the actual type name.
            if fullname == "typename" || fullname == "class" {
                if self.check(TokenKind::Identifier) {
                    fullname.push(' ');
                    fullname.push_str(&self.advance().value);
                }
            }

            loop {
                if self.check(TokenKind::ScopeResolution) {
                    self.advance();
                    if self.check(TokenKind::Identifier) {
                        fullname.push_str("::");
                        fullname.push_str(&self.advance().value);
                        continue;
                    }
                    break;
                }
                if self.check(TokenKind::Less) {
                    // Template argument group: concatenate raw token
                    // text up to the matching '>' (nesting tracked by
                    // a depth counter).
                    fullname.push('<');
                    self.advance();
                    let mut depth = 1;
                    while !self.at_end() && depth > 0 {
                        if self.check(TokenKind::Less) {
                            fullname.push('<');
                            self.advance();
                            depth += 1;
                        } else if self.check(TokenKind::Greater) {
                            fullname.push('>');
                            self.advance();
                            depth -= 1;
                        } else {
                            fullname.push_str(&self.advance().value);
                        }
                    }
                    continue;
                }
                break;
            }

            type_tokens.push(fullname);
        }

        // Pointer/reference markers with post-pointer qualifiers.
        while self.check_value(TokenKind::Operator, "*")
            || self.check_value(TokenKind::Operator, "&")
        {
            type_tokens.push(self.advance().value);
            while self.check(TokenKind::TypeQualifier) {
                type_tokens.push(self.advance().value);
            }
        }

        type_tokens
    }

    /// Pure lookahead version of [`parse_type`]: scans from `pos`
    /// without consuming and returns the type tokens plus the position
    /// just past them.
    fn type_lookahead(&self, mut pos: usize) -> (Vec<String>, usize) {
        let mut type_tokens = Vec::new();
        let tokens = &self.tokens;

        while pos < tokens.len() && tokens[pos].kind == TokenKind::StorageClass {
            type_tokens.push(tokens[pos].value.clone());
            pos += 1;
        }
        while pos < tokens.len() && tokens[pos].kind == TokenKind::TypeQualifier {
            type_tokens.push(tokens[pos].value.clone());
            pos += 1;
        }

        while pos < tokens.len()
            && (tokens[pos].kind == TokenKind::TypeSpecifier
                || tokens[pos].kind == TokenKind::Identifier
                || (tokens[pos].kind == TokenKind::Keyword
                    && (tokens[pos].value == "typename" || tokens[pos].value == "class")))
        {
            let mut fullname = tokens[pos].value.clone();
            pos += 1;

            while pos < tokens.len() && tokens[pos].kind == TokenKind::ScopeResolution {
                pos += 1;
                if pos < tokens.len() && tokens[pos].kind == TokenKind::Identifier {
                    fullname.push_str("::");
                    fullname.push_str(&tokens[pos].value);
                    pos += 1;
                } else {
                    break;
                }
            }

            if pos < tokens.len() && tokens[pos].kind == TokenKind::Less {
                fullname.push('<');
                pos += 1;
                let mut depth = 1;
                while pos < tokens.len() && depth > 0 {
                    match tokens[pos].kind {
                        TokenKind::Less => {
                            fullname.push('<');
                            depth += 1;
                        }
                        TokenKind::Greater => {
                            fullname.push('>');
                            depth -= 1;
                        }
                        _ => fullname.push_str(&tokens[pos].value),
                    }
                    pos += 1;
                }
            }

            type_tokens.push(fullname);

            // Multi-word builtin types (unsigned long, long long, ...).
            if pos < tokens.len()
                && tokens[pos].kind == TokenKind::TypeSpecifier
                && matches!(
                    tokens[pos].value.as_str(),
                    "long" | "short" | "signed" | "unsigned"
                )
            {
                continue;
            }
            break;
        }

        while pos < tokens.len()
            && tokens[pos].kind == TokenKind::Operator
            && (tokens[pos].value == "*" || tokens[pos].value == "&")
        {
            type_tokens.push(tokens[pos].value.clone());
            pos += 1;
        }

        (type_tokens, pos)
    }

    // ----- declarations -----

    fn parse_declaration_or_statement(&mut self) -> ParseResult<Option<Stmt>> {
        let token = self.peek().clone();

        if token.kind == TokenKind::Preprocessor {
            return Ok(Some(self.parse_include_directive()));
        }
        if token.kind == TokenKind::AccessSpecifier {
            return self.parse_access_specifier().map(Some);
        }

        // Statement keywords win over declaration keywords.
        if token.kind == TokenKind::Keyword
            && matches!(
                token.value.as_str(),
                "return" | "if" | "while" | "for" | "break" | "continue" | "throw" | "delete"
                    | "new"
            )
        {
            return self.parse_statement().map(Some);
        }

        if matches!(
            token.kind,
            TokenKind::Keyword
                | TokenKind::TypeSpecifier
                | TokenKind::StorageClass
                | TokenKind::TypeQualifier
        ) {
            match token.value.as_str() {
                "class" => return self.parse_class().map(Some),
                "struct" => return self.parse_struct().map(Some),
                "namespace" => return self.parse_namespace().map(Some),
                "template" => return self.parse_template().map(Some),
                "using" => return self.parse_using_directive(),
                _ => {}
            }

            // After a type: IDENTIFIER then '(' means a function.
            let (_, la) = self.type_lookahead(self.idx);
            if self
                .tokens
                .get(la)
                .map(|t| t.kind == TokenKind::Identifier)
                .unwrap_or(false)
                && self
                    .tokens
                    .get(la + 1)
                    .map(|t| t.kind == TokenKind::LeftParen)
                    .unwrap_or(false)
            {
                return self.parse_function_declaration().map(Some);
            }

            return self.parse_var_declaration().map(Some);
        }

        // A user-defined type followed by an identifier starts a
        // variable declaration; anything else is an expression.
        if token.kind == TokenKind::Identifier {
            let (tt, la) = self.type_lookahead(self.idx);
            if !tt.is_empty()
                && self
                    .tokens
                    .get(la)
                    .map(|t| t.kind == TokenKind::Identifier)
                    .unwrap_or(false)
            {
                return self.parse_var_declaration().map(Some);
            }
        }

        self.parse_statement().map(Some)
    }

    fn parse_class(&mut self) -> ParseResult<Stmt> {
        let class_tok = self.advance(); // 'class'

        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected class name"));
        }
        let name_tok = self.advance();

        let old_class = std::mem::replace(&mut self.current_class, name_tok.value.clone());

        // Base list: access specifiers are discarded, names kept.
        let mut bases = Vec::new();
        if self.match_kind(TokenKind::Colon) {
            while !self.check(TokenKind::LeftBrace) && !self.at_end() {
                if self.check(TokenKind::AccessSpecifier) || self.check(TokenKind::Keyword) {
                    self.advance();
                }
                if self.check(TokenKind::Identifier) {
                    bases.push(self.advance().value);
                }
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.consume(TokenKind::LeftBrace, "Expected '{' after class name")?;

        let mut members = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.at_end() {
            if let Some(member) = self.parse_class_member()? {
                members.push(member);
            }
        }

        self.consume(TokenKind::RightBrace, "Expected '}' after class body")?;
        self.consume(TokenKind::Semicolon, "Expected ';' after class declaration")?;

        self.current_class = old_class;

        Ok(Stmt::new(
            StmtKind::Decl(Decl::new(
                DeclKind::Class {
                    name: name_tok.value,
                    bases,
                    members,
                },
                class_tok.line,
                class_tok.column,
            )),
            class_tok.line,
            class_tok.column,
        ))
    }

    fn parse_struct(&mut self) -> ParseResult<Stmt> {
        let struct_tok = self.advance(); // 'struct'

        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected struct name"));
        }
        let name_tok = self.advance();

        let old_class = std::mem::replace(&mut self.current_class, name_tok.value.clone());

        self.consume(TokenKind::LeftBrace, "Expected '{' after struct name")?;

        let mut members = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.at_end() {
            if let Some(member) = self.parse_class_member()? {
                members.push(member);
            }
        }

        self.consume(TokenKind::RightBrace, "Expected '}' after struct body")?;
        self.consume(TokenKind::Semicolon, "Expected ';' after struct declaration")?;

        self.current_class = old_class;

        Ok(Stmt::new(
            StmtKind::Decl(Decl::new(
                DeclKind::Struct {
                    name: name_tok.value,
                    members,
                },
                struct_tok.line,
                struct_tok.column,
            )),
            struct_tok.line,
            struct_tok.column,
        ))
    }

    fn parse_class_member(&mut self) -> ParseResult<Option<Stmt>> {
        if self.check(TokenKind::AccessSpecifier) {
            return self.parse_access_specifier().map(Some);
        }

        // Constructor: ClassName (
        if self.check(TokenKind::Identifier)
            && self.peek().value == self.current_class
            && self
                .peek_at(1)
                .map(|t| t.kind == TokenKind::LeftParen)
                .unwrap_or(false)
        {
            return self.parse_function_declaration().map(Some);
        }

        // Destructor: ~ClassName
        if self.check_value(TokenKind::Operator, "~")
            && self
                .peek_at(1)
                .map(|t| t.kind == TokenKind::Identifier && t.value == self.current_class)
                .unwrap_or(false)
        {
            return self.parse_function_declaration().map(Some);
        }

        self.parse_declaration_or_statement()
    }

    fn parse_namespace(&mut self) -> ParseResult<Stmt> {
        let ns_tok = self.advance(); // 'namespace'

        let mut name = String::new();
        if self.check(TokenKind::Identifier) {
            name = self.advance().value;
            while self.check(TokenKind::ScopeResolution) {
                self.advance();
                if self.check(TokenKind::Identifier) {
                    name.push_str("::");
                    name.push_str(&self.advance().value);
                } else {
                    break;
                }
            }
        }

        self.consume(TokenKind::LeftBrace, "Expected '{' after namespace")?;

        let mut body = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.at_end() {
            if let Some(decl) = self.parse_declaration_or_statement()? {
                body.push(decl);
            }
        }

        self.consume(TokenKind::RightBrace, "Expected '}' after namespace body")?;

        Ok(Stmt::new(
            StmtKind::Decl(Decl::new(
                DeclKind::Namespace { name, body },
                ns_tok.line,
                ns_tok.column,
            )),
            ns_tok.line,
            ns_tok.column,
        ))
    }

    fn parse_template(&mut self) -> ParseResult<Stmt> {
        let template_tok = self.advance(); // 'template'
        self.consume(TokenKind::Less, "Expected '<' after template")?;
        let params = self.parse_template_params();
        self.consume(TokenKind::Greater, "Expected '>' after template parameters")?;

        // Prefer the type lookahead; fall back to scanning for
        // IDENTIFIER '(' before the next '{' or ';'.
        let (_, la) = self.type_lookahead(self.idx);
        let lookahead_hit = self
            .tokens
            .get(la)
            .map(|t| t.kind == TokenKind::Identifier)
            .unwrap_or(false)
            && self
                .tokens
                .get(la + 1)
                .map(|t| t.kind == TokenKind::LeftParen)
                .unwrap_or(false);

        let scan_hit = if lookahead_hit {
            true
        } else {
            let mut k = self.idx;
            let mut found = false;
            while k + 1 < self.tokens.len() {
                if self.tokens[k].kind == TokenKind::Identifier
                    && self.tokens[k + 1].kind == TokenKind::LeftParen
                {
                    found = true;
                    break;
                }
                if matches!(
                    self.tokens[k].kind,
                    TokenKind::LeftBrace | TokenKind::Semicolon
                ) {
                    break;
                }
                k += 1;
            }
            found
        };

        let decl = if scan_hit {
            Some(Box::new(self.parse_function_declaration()?))
        } else {
            self.parse_declaration_or_statement()?.map(Box::new)
        };

        Ok(Stmt::new(
            StmtKind::Decl(Decl::new(
                DeclKind::Template { params, decl },
                template_tok.line,
                template_tok.column,
            )),
            template_tok.line,
            template_tok.column,
        ))
    }

    fn parse_template_params(&mut self) -> Vec<String> {
        let mut params = Vec::new();
        while !self.check(TokenKind::Greater) && !self.at_end() {
            if self.check_value(TokenKind::Keyword, "typename")
                || self.check_value(TokenKind::Keyword, "class")
            {
                self.advance();
                if self.check(TokenKind::Identifier) {
                    params.push(self.advance().value);
                    // Default argument: = T
                    if self.check_value(TokenKind::Operator, "=") {
                        self.advance();
                        if self.check(TokenKind::Identifier) || self.check(TokenKind::TypeSpecifier)
                        {
                            self.advance();
                        }
                    }
                }
            }
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        params
    }

    fn parse_function_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.peek().clone();

        let mut return_type = Vec::new();
        let func_name;

        if self.check(TokenKind::Identifier) && self.peek().value == self.current_class {
            // Constructor
            func_name = self.advance().value;
        } else if self.check_value(TokenKind::Operator, "~") {
            // Destructor
            self.advance();
            if !self.check(TokenKind::Identifier) || self.peek().value != self.current_class {
                return Err(self.error("Expected class name after '~'"));
            }
            func_name = format!("~{}", self.advance().value);
        } else {
            return_type = self.parse_type();
            if self.check(TokenKind::LeftParen) && !return_type.is_empty() {
                // The type parser swallowed the function name.
                func_name = return_type.pop().unwrap_or_default();
            } else {
                if !self.check(TokenKind::Identifier) {
                    return Err(self.error("Expected function name"));
                }
                func_name = self.advance().value;
            }
        }

        let params = self.parse_function_params()?;

        let is_const = if self.check_value(TokenKind::TypeQualifier, "const") {
            self.advance();
            true
        } else {
            false
        };

        let body = if self.check(TokenKind::LeftBrace) {
            Some(Box::new(self.parse_block()?))
        } else {
            self.consume(TokenKind::Semicolon, "Expected ';' or function body")?;
            None
        };

        Ok(Stmt::new(
            StmtKind::Decl(Decl::new(
                DeclKind::Function(FunctionDecl {
                    return_type,
                    name: func_name,
                    params,
                    body,
                    is_const,
                }),
                start.line,
                start.column,
            )),
            start.line,
            start.column,
        ))
    }

    fn parse_function_params(&mut self) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        self.consume(TokenKind::LeftParen, "Expected '(' after function name")?;

        while !self.check(TokenKind::RightParen) && !self.at_end() {
            let type_tokens = self.parse_type();
            if type_tokens.is_empty() {
                return Err(self.error("Expected type in parameter list"));
            }

            let name = if self.check(TokenKind::Identifier) {
                self.advance().value
            } else {
                String::new()
            };

            params.push(Param { type_tokens, name });

            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }

        self.consume(TokenKind::RightParen, "Expected ')' after parameters")?;
        Ok(params)
    }

    fn parse_access_specifier(&mut self) -> ParseResult<Stmt> {
        let access_tok = self.advance();
        self.consume(TokenKind::Colon, "Expected ':' after access specifier")?;
        Ok(Stmt::new(
            StmtKind::AccessSpec(access_tok.value.clone()),
            access_tok.line,
            access_tok.column,
        ))
    }

    /// `#include <f>` / `#include "f"`; the filename is pulled out of
    /// the directive's raw text.
    fn parse_include_directive(&mut self) -> Stmt {
        let include_tok = self.advance();
        let directive = include_tok.value.clone();

        let mut file = String::new();
        let mut system = false;

        if let Some(pos) = directive.find("include") {
            let rest = directive[pos + 7..].trim_start();
            if let Some(stripped) = rest.strip_prefix('<') {
                system = true;
                if let Some(end) = stripped.find('>') {
                    file = stripped[..end].to_string();
                }
            } else if let Some(stripped) = rest.strip_prefix('"') {
                if let Some(end) = stripped.find('"') {
                    file = stripped[..end].to_string();
                }
            }
        }

        Stmt::new(
            StmtKind::Decl(Decl::new(
                DeclKind::Include { file, system },
                include_tok.line,
                include_tok.column,
            )),
            include_tok.line,
            include_tok.column,
        )
    }

    fn parse_using_directive(&mut self) -> ParseResult<Option<Stmt>> {
        let using_tok = self.advance(); // 'using'

        if self.check_value(TokenKind::Keyword, "namespace") {
            self.advance();
            if !self.check(TokenKind::Identifier) {
                return Err(self.error("Expected namespace name"));
            }
            let ns = self.advance();
            self.consume(TokenKind::Semicolon, "Expected ';' after using directive")?;
            return Ok(Some(Stmt::new(
                StmtKind::Decl(Decl::new(
                    DeclKind::Using {
                        namespace: ns.value,
                    },
                    using_tok.line,
                    using_tok.column,
                )),
                using_tok.line,
                using_tok.column,
            )));
        }

        // Using declarations (using std::cout;) are consumed and dropped.
        while !self.check(TokenKind::Semicolon) && !self.at_end() {
            self.advance();
        }
        self.consume(TokenKind::Semicolon, "Expected ';' after using declaration")?;
        Ok(None)
    }

    fn parse_var_declaration(&mut self) -> ParseResult<Stmt> {
        let start = self.peek().clone();
        let type_tokens = self.parse_type();

        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected identifier after type"));
        }

        let is_pointer = type_tokens.iter().any(|t| t == "*");
        let is_reference = type_tokens.iter().any(|t| t == "&");

        let mut decls = Vec::new();
        loop {
            let name_tok = self.advance();
            let mut init = None;
            let mut is_array = false;

            if self.check(TokenKind::LeftBracket) {
                // Array declarator; the size expression is parsed and
                // discarded at this stage.
                is_array = true;
                self.advance();
                let _size = self.parse_expression()?;
                self.consume(TokenKind::RightBracket, "Expected ']' in array declarator")?;
                if self.check_value(TokenKind::Operator, "=") {
                    self.advance();
                    init = Some(self.parse_initializer()?);
                }
            } else if self.check_value(TokenKind::Operator, "=") {
                self.advance();
                init = Some(self.parse_initializer()?);
            } else if self.check(TokenKind::LeftParen) {
                // Constructor-call initializer: T x(args) becomes a
                // call of an identifier named after the type.
                let open = self.advance();
                let mut args = Vec::new();
                while !self.check(TokenKind::RightParen) && !self.at_end() {
                    args.push(self.parse_expression()?);
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
                self.consume(
                    TokenKind::RightParen,
                    "Expected ')' after constructor arguments",
                )?;
                let type_name = type_tokens.first().cloned().unwrap_or_default();
                init = Some(Expr::new(
                    ExprKind::Call {
                        callee: Box::new(Expr::new(
                            ExprKind::Identifier { name: type_name },
                            start.line,
                            start.column,
                        )),
                        args,
                    },
                    open.line,
                    open.column,
                ));
            }

            decls.push(Stmt::new(
                StmtKind::VarDecl(VarDecl {
                    type_tokens: type_tokens.clone(),
                    name: name_tok.value,
                    init,
                    is_pointer,
                    is_reference,
                    is_array,
                }),
                start.line,
                start.column,
            ));

            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }

        // The semicolon is absent when this declaration is the init
        // clause of a range-based for (a ':' follows instead).
        if self.check(TokenKind::Semicolon) {
            self.advance();
        }

        if decls.len() == 1 {
            Ok(decls.remove(0))
        } else {
            Ok(Stmt::new(
                StmtKind::Block(decls),
                start.line,
                start.column,
            ))
        }
    }

    /// `= expr` or `= { ... }`; a brace initializer is captured as a
    /// single brace-init literal with balanced nesting.
    fn parse_initializer(&mut self) -> ParseResult<Expr> {
        if self.check(TokenKind::LeftBrace) {
            let open = self.advance();
            let mut contents = String::new();
            let mut depth = 1;
            while !self.at_end() && depth > 0 {
                if self.check(TokenKind::LeftBrace) {
                    depth += 1;
                    contents.push('{');
                    self.advance();
                } else if self.check(TokenKind::RightBrace) {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    contents.push('}');
                    self.advance();
                } else {
                    contents.push_str(&self.advance().value);
                }
            }
            self.consume(TokenKind::RightBrace, "Expected '}' after initializer list")?;
            Ok(Expr::new(
                ExprKind::Literal {
                    value: contents,
                    kind: LiteralKind::BraceInit,
                },
                open.line,
                open.column,
            ))
        } else {
            self.parse_expression()
        }
    }

    // ----- statements -----

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let token = self.peek().clone();

        if token.kind == TokenKind::Preprocessor {
            self.advance();
            return Ok(Stmt::new(StmtKind::Expr(None), token.line, token.column));
        }

        if self.check_value(TokenKind::Keyword, "using") {
            return match self.parse_declaration_or_statement()? {
                Some(stmt) => Ok(stmt),
                None => Ok(Stmt::new(StmtKind::Expr(None), token.line, token.column)),
            };
        }

        if self.check(TokenKind::LeftBrace) {
            return self.parse_block();
        }
        if self.check_value(TokenKind::Keyword, "if") {
            return self.parse_if();
        }
        if self.check_value(TokenKind::Keyword, "while") {
            return self.parse_while();
        }
        if self.check_value(TokenKind::Keyword, "for") {
            return self.parse_for();
        }
        if self.check_value(TokenKind::Keyword, "return") {
            return self.parse_return();
        }
        if self.check_value(TokenKind::Keyword, "throw") {
            return self.parse_throw();
        }

        self.parse_expression_statement()
    }

    fn parse_block(&mut self) -> ParseResult<Stmt> {
        let open = self.consume(TokenKind::LeftBrace, "Expected '{' to start block")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.at_end() {
            if let Some(stmt) = self.parse_declaration_or_statement()? {
                statements.push(stmt);
            }
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after block")?;
        Ok(Stmt::new(
            StmtKind::Block(statements),
            open.line,
            open.column,
        ))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.parse_expression()?;
        let (line, column) = (expr.line, expr.column);
        self.consume(TokenKind::Semicolon, "Expected ';' after expression")?;
        Ok(Stmt::new(StmtKind::Expr(Some(expr)), line, column))
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let tok = self.advance(); // 'if'
        self.consume(TokenKind::LeftParen, "Expected '(' after if")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after if condition")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.check_value(TokenKind::Keyword, "else") {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            tok.line,
            tok.column,
        ))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let tok = self.advance(); // 'while'
        self.consume(TokenKind::LeftParen, "Expected '(' after while")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after while condition")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::new(
            StmtKind::While { cond, body },
            tok.line,
            tok.column,
        ))
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let tok = self.advance(); // 'for'
        self.consume(TokenKind::LeftParen, "Expected '(' after for")?;

        let init = if self.check(TokenKind::Semicolon) {
            self.advance();
            None
        } else if self.is_type_start() {
            Some(Box::new(self.parse_var_declaration()?))
        } else {
            let expr = self.parse_expression()?;
            let (line, column) = (expr.line, expr.column);
            self.consume(TokenKind::Semicolon, "Expected ';' after for init")?;
            Some(Box::new(Stmt::new(
                StmtKind::Expr(Some(expr)),
                line,
                column,
            )))
        };

        // Range-based: for (decl : expr)
        if self.check(TokenKind::Colon) {
            self.advance();
            let range = self.parse_expression()?;
            self.consume(TokenKind::RightParen, "Expected ')' after for range")?;
            let body = Box::new(self.parse_statement()?);
            return Ok(Stmt::new(
                StmtKind::For {
                    init,
                    cond: None,
                    post: None,
                    range: Some(range),
                    body,
                },
                tok.line,
                tok.column,
            ));
        }

        let cond = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after for condition")?;

        let post = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::RightParen, "Expected ')' after for clauses")?;

        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::new(
            StmtKind::For {
                init,
                cond,
                post,
                range: None,
                body,
            },
            tok.line,
            tok.column,
        ))
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let tok = self.advance(); // 'return'
        let expr = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after return")?;
        Ok(Stmt::new(StmtKind::Return(expr), tok.line, tok.column))
    }

    /// `throw expr? ;` lowers to an expression statement.
    fn parse_throw(&mut self) -> ParseResult<Stmt> {
        let tok = self.advance(); // 'throw'
        let expr = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after throw")?;
        Ok(Stmt::new(StmtKind::Expr(expr), tok.line, tok.column))
    }

    // ----- expressions -----

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let left = self.parse_conditional()?;
        if self.check_value(TokenKind::Operator, "=") {
            let op = self.advance();
            let right = self.parse_assignment()?;
            return Ok(Expr::new(
                ExprKind::Binary {
                    op: op.value,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                op.line,
                op.column,
            ));
        }
        Ok(left)
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let cond = self.parse_logical_or()?;
        if self.check_value(TokenKind::Operator, "?") {
            let q = self.advance();
            let then_expr = self.parse_expression()?;
            self.consume(TokenKind::Colon, "Expected ':' in conditional expression")?;
            let else_expr = self.parse_expression()?;
            return Ok(Expr::new(
                ExprKind::Conditional {
                    cond: Box::new(cond),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                q.line,
                q.column,
            ));
        }
        Ok(cond)
    }

    fn parse_logical_or(&mut self) -> ParseResult<Expr> {
        let mut node = self.parse_logical_and()?;
        while self.check_value(TokenKind::Operator, "||") {
            let op = self.advance();
            let right = self.parse_logical_and()?;
            node = Expr::new(
                ExprKind::Binary {
                    op: op.value,
                    left: Box::new(node),
                    right: Box::new(right),
                },
                op.line,
                op.column,
            );
        }
        Ok(node)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Expr> {
        let mut node = self.parse_equality()?;
        while self.check_value(TokenKind::Operator, "&&") {
            let op = self.advance();
            let right = self.parse_equality()?;
            node = Expr::new(
                ExprKind::Binary {
                    op: op.value,
                    left: Box::new(node),
                    right: Box::new(right),
                },
                op.line,
                op.column,
            );
        }
        Ok(node)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut node = self.parse_comparison()?;
        while self.check_value(TokenKind::Operator, "==")
            || self.check_value(TokenKind::Operator, "!=")
        {
            let op = self.advance();
            let right = self.parse_comparison()?;
            node = Expr::new(
                ExprKind::Binary {
                    op: op.value,
                    left: Box::new(node),
                    right: Box::new(right),
                },
                op.line,
                op.column,
            );
        }
        Ok(node)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut node = self.parse_shift()?;
        while matches!(
            self.peek().kind,
            TokenKind::Less | TokenKind::Greater | TokenKind::LessEqual | TokenKind::GreaterEqual
        ) {
            let op = self.advance();
            let right = self.parse_shift()?;
            node = Expr::new(
                ExprKind::Binary {
                    op: op.value,
                    left: Box::new(node),
                    right: Box::new(right),
                },
                op.line,
                op.column,
            );
        }
        Ok(node)
    }

    fn parse_shift(&mut self) -> ParseResult<Expr> {
        let mut node = self.parse_additive()?;
        while matches!(
            self.peek().kind,
            TokenKind::LeftShift | TokenKind::RightShift
        ) {
            let op = self.advance();
            let right = self.parse_additive()?;
            node = Expr::new(
                ExprKind::Binary {
                    op: op.value,
                    left: Box::new(node),
                    right: Box::new(right),
                },
                op.line,
                op.column,
            );
        }
        Ok(node)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut node = self.parse_multiplicative()?;
        while self.check_value(TokenKind::Operator, "+")
            || self.check_value(TokenKind::Operator, "-")
        {
            let op = self.advance();
            let right = self.parse_multiplicative()?;
            node = Expr::new(
                ExprKind::Binary {
                    op: op.value,
                    left: Box::new(node),
                    right: Box::new(right),
                },
                op.line,
                op.column,
            );
        }
        Ok(node)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut node = self.parse_unary()?;
        while self.check_value(TokenKind::Operator, "*")
            || self.check_value(TokenKind::Operator, "/")
            || self.check_value(TokenKind::Operator, "%")
        {
            let op = self.advance();
            let right = self.parse_unary()?;
            node = Expr::new(
                ExprKind::Binary {
                    op: op.value,
                    left: Box::new(node),
                    right: Box::new(right),
                },
                op.line,
                op.column,
            );
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.check_value(TokenKind::Keyword, "new") {
            let op = self.advance();

            if self.check(TokenKind::TypeSpecifier) {
                let type_name = self.advance().value;

                if self.check(TokenKind::LeftBracket) {
                    // new T[size]
                    self.advance();
                    let size = self.parse_expression()?;
                    self.consume(TokenKind::RightBracket, "Expected ']' after array size")?;
                    let array = Expr::new(
                        ExprKind::Identifier { name: type_name },
                        op.line,
                        op.column,
                    );
                    return Ok(Expr::new(
                        ExprKind::Unary {
                            op: "new".into(),
                            operand: Box::new(Expr::new(
                                ExprKind::Subscript {
                                    array: Box::new(array),
                                    index: Box::new(size),
                                },
                                op.line,
                                op.column,
                            )),
                        },
                        op.line,
                        op.column,
                    ));
                }

                // new T
                return Ok(Expr::new(
                    ExprKind::Unary {
                        op: "new".into(),
                        operand: Box::new(Expr::new(
                            ExprKind::Identifier { name: type_name },
                            op.line,
                            op.column,
                        )),
                    },
                    op.line,
                    op.column,
                ));
            }

            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: "new".into(),
                    operand: Box::new(operand),
                },
                op.line,
                op.column,
            ));
        }

        if self.check_value(TokenKind::Keyword, "delete") {
            let op = self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: "delete".into(),
                    operand: Box::new(operand),
                },
                op.line,
                op.column,
            ));
        }

        if self.check(TokenKind::Operator)
            && matches!(self.peek().value.as_str(), "!" | "-" | "+" | "*" | "&" | "~")
        {
            let op = self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: op.value,
                    operand: Box::new(operand),
                },
                op.line,
                op.column,
            ));
        }

        self.parse_call_and_primary()
    }

    fn parse_call_and_primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();

        // Lambda literal: captured wholesale as a placeholder.
        if token.kind == TokenKind::LeftBracket {
            self.advance();
            while !self.check(TokenKind::LeftBrace) && !self.at_end() {
                self.advance();
            }
            if self.check(TokenKind::LeftBrace) {
                self.advance();
                let mut depth = 1;
                while !self.at_end() && depth > 0 {
                    if self.check(TokenKind::LeftBrace) {
                        depth += 1;
                    } else if self.check(TokenKind::RightBrace) {
                        depth -= 1;
                    }
                    self.advance();
                }
            }
            return Ok(Expr::new(
                ExprKind::Literal {
                    value: "<lambda>".into(),
                    kind: LiteralKind::BraceInit,
                },
                token.line,
                token.column,
            ));
        }

        if matches!(
            token.kind,
            TokenKind::Number | TokenKind::Str | TokenKind::Character
        ) {
            self.advance();
            let kind = match token.kind {
                TokenKind::Number => LiteralKind::Number,
                TokenKind::Str => LiteralKind::Str,
                _ => LiteralKind::Character,
            };
            return Ok(Expr::new(
                ExprKind::Literal {
                    value: token.value,
                    kind,
                },
                token.line,
                token.column,
            ));
        }

        if token.kind == TokenKind::Identifier {
            self.advance();
            let mut left = Expr::new(
                ExprKind::Identifier { name: token.value },
                token.line,
                token.column,
            );

            loop {
                if self.check(TokenKind::Arrow) || self.check(TokenKind::Dot) {
                    let arrow = self.peek().kind == TokenKind::Arrow;
                    let op = self.advance();
                    if !self.check(TokenKind::Identifier) {
                        return Err(self.error(if arrow {
                            "Expected member name after '->'"
                        } else {
                            "Expected member name after '.'"
                        }));
                    }
                    let member = self.advance().value;
                    left = Expr::new(
                        ExprKind::Member {
                            object: Box::new(left),
                            member,
                            arrow,
                        },
                        op.line,
                        op.column,
                    );
                } else if self.check(TokenKind::LeftBracket) {
                    let bracket = self.advance();
                    let index = self.parse_expression()?;
                    self.consume(TokenKind::RightBracket, "Expected ']' after array index")?;
                    left = Expr::new(
                        ExprKind::Subscript {
                            array: Box::new(left),
                            index: Box::new(index),
                        },
                        bracket.line,
                        bracket.column,
                    );
                } else if self.check(TokenKind::LeftParen) {
                    let open = self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RightParen) {
                        loop {
                            args.push(self.parse_expression()?);
                            if !self.match_kind(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.consume(
                        TokenKind::RightParen,
                        "Expected ')' after function call arguments",
                    )?;
                    left = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(left),
                            args,
                        },
                        open.line,
                        open.column,
                    );
                } else if self.check_value(TokenKind::Operator, "++")
                    || self.check_value(TokenKind::Operator, "--")
                {
                    let op = self.advance();
                    left = Expr::new(
                        ExprKind::Unary {
                            op: format!("{}_post", op.value),
                            operand: Box::new(left),
                        },
                        op.line,
                        op.column,
                    );
                } else if self.check(TokenKind::ScopeResolution) {
                    // Fold `a::b` into a single qualified identifier.
                    if let ExprKind::Identifier { name } = &left.node {
                        let base = name.clone();
                        self.advance();
                        if self.check(TokenKind::Identifier) {
                            let next = self.advance();
                            left = Expr::new(
                                ExprKind::Identifier {
                                    name: format!("{}::{}", base, next.value),
                                },
                                next.line,
                                next.column,
                            );
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            }

            return Ok(left);
        }

        if token.kind == TokenKind::LeftParen {
            self.advance();
            let expr = self.parse_expression()?;
            self.consume(TokenKind::RightParen, "Expected ')' after expression")?;
            return Ok(expr);
        }

        Err(self.error("Expected expression"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> Program {
        let tokens = Lexer::new(source, "").tokenize();
        Parser::new(tokens).parse_program().expect("parse failed")
    }

    fn parse_err(source: &str) -> ParseError {
        let tokens = Lexer::new(source, "").tokenize();
        Parser::new(tokens)
            .parse_program()
            .expect_err("expected parse error")
    }

    fn first_expr(program: &Program) -> &Expr {
        match &program.items[0].node {
            StmtKind::Expr(Some(e)) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_function_declaration() {
        let program = parse("int add(int a, int b) { return a + b; }");
        match &program.items[0].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Function(f),
                ..
            }) => {
                assert_eq!(f.name, "add");
                assert_eq!(f.return_type, vec!["int"]);
                assert_eq!(f.params.len(), 2);
                assert_eq!(f.params[0].name, "a");
                assert_eq!(f.params[1].type_tokens, vec!["int"]);
                assert!(f.body.is_some());
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_variable_declaration_flags() {
        let program = parse("int* p = 0;");
        match &program.items[0].node {
            StmtKind::VarDecl(v) => {
                assert_eq!(v.name, "p");
                assert!(v.is_pointer);
                assert!(!v.is_array);
                assert!(v.init.is_some());
                assert_eq!(v.type_tokens, vec!["int", "*"]);
            }
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_array_declarator_discards_size() {
        let program = parse("int arr[10];");
        match &program.items[0].node {
            StmtKind::VarDecl(v) => {
                assert!(v.is_array);
                assert!(v.init.is_none());
            }
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_declarators_become_block() {
        let program = parse("int a = 1, b = 2;");
        match &program.items[0].node {
            StmtKind::Block(stmts) => {
                assert_eq!(stmts.len(), 2);
                assert!(matches!(&stmts[0].node, StmtKind::VarDecl(v) if v.name == "a"));
                assert!(matches!(&stmts[1].node, StmtKind::VarDecl(v) if v.name == "b"));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_brace_initializer_is_literal() {
        let program = parse("int arr[3] = {1, 2, 3};");
        match &program.items[0].node {
            StmtKind::VarDecl(v) => match &v.init {
                Some(Expr {
                    node: ExprKind::Literal { value, kind },
                    ..
                }) => {
                    assert_eq!(*kind, LiteralKind::BraceInit);
                    assert_eq!(value, "1,2,3");
                }
                other => panic!("expected brace-init literal, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_constructor_initializer() {
        let program = parse("MyType x(1, 2);");
        match &program.items[0].node {
            StmtKind::VarDecl(v) => match &v.init {
                Some(Expr {
                    node: ExprKind::Call { callee, args },
                    ..
                }) => {
                    assert!(
                        matches!(&callee.node, ExprKind::Identifier { name } if name == "MyType")
                    );
                    assert_eq!(args.len(), 2);
                }
                other => panic!("expected call initializer, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let program = parse("1 + 2 * 3;");
        match &first_expr(&program).node {
            ExprKind::Binary { op, right, .. } => {
                assert_eq!(op, "+");
                assert!(matches!(&right.node, ExprKind::Binary { op, .. } if op == "*"));
            }
            other => panic!("expected binary op, got {:?}", other),
        }
    }

    #[test]
    fn test_shift_binds_tighter_than_comparison() {
        let program = parse("a << b < c;");
        match &first_expr(&program).node {
            ExprKind::Binary { op, left, .. } => {
                assert_eq!(op, "<");
                assert!(matches!(&left.node, ExprKind::Binary { op, .. } if op == "<<"));
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_conditional_keeps_three_children() {
        let program = parse("a ? b : c;");
        match &first_expr(&program).node {
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                assert!(matches!(&cond.node, ExprKind::Identifier { name } if name == "a"));
                assert!(matches!(&then_expr.node, ExprKind::Identifier { name } if name == "b"));
                assert!(matches!(&else_expr.node, ExprKind::Identifier { name } if name == "c"));
            }
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_qualified_identifier_folding() {
        let program = parse("std::cout << x;");
        match &first_expr(&program).node {
            ExprKind::Binary { op, left, .. } => {
                assert_eq!(op, "<<");
                assert!(
                    matches!(&left.node, ExprKind::Identifier { name } if name == "std::cout")
                );
            }
            other => panic!("expected << chain, got {:?}", other),
        }
    }

    #[test]
    fn test_new_array_form() {
        let program = parse("int* p = new int[3];");
        match &program.items[0].node {
            StmtKind::VarDecl(v) => match &v.init {
                Some(Expr {
                    node: ExprKind::Unary { op, operand },
                    ..
                }) => {
                    assert_eq!(op, "new");
                    match &operand.node {
                        ExprKind::Subscript { array, index } => {
                            assert!(matches!(&array.node, ExprKind::Identifier { name } if name == "int"));
                            assert!(matches!(&index.node, ExprKind::Literal { value, .. } if value == "3"));
                        }
                        other => panic!("expected subscript, got {:?}", other),
                    }
                }
                other => panic!("expected new expression, got {:?}", other),
            },
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_postfix_increment_encoding() {
        let program = parse("i++;");
        match &first_expr(&program).node {
            ExprKind::Unary { op, .. } => assert_eq!(op, "++_post"),
            other => panic!("expected unary, got {:?}", other),
        }
    }

    #[test]
    fn test_member_access_arrow_and_dot() {
        let program = parse("p->x.y;");
        match &first_expr(&program).node {
            ExprKind::Member {
                object,
                member,
                arrow,
            } => {
                assert_eq!(member, "y");
                assert!(!*arrow);
                assert!(matches!(
                    &object.node,
                    ExprKind::Member { member, arrow, .. } if member == "x" && *arrow
                ));
            }
            other => panic!("expected member access, got {:?}", other),
        }
    }

    #[test]
    fn test_class_declaration() {
        let program = parse(
            "class Point : public Base {\npublic:\n  int x;\n  Point(int a);\n  ~Point();\n  int get() const;\n};",
        );
        match &program.items[0].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Class {
                    name,
                    bases,
                    members,
                },
                ..
            }) => {
                assert_eq!(name, "Point");
                assert_eq!(bases, &vec!["Base".to_string()]);
                // access spec, field, ctor, dtor, const method
                assert_eq!(members.len(), 5);
                assert!(matches!(&members[0].node, StmtKind::AccessSpec(a) if a == "public"));
                match &members[2].node {
                    StmtKind::Decl(Decl {
                        node: DeclKind::Function(f),
                        ..
                    }) => {
                        assert_eq!(f.name, "Point");
                        assert!(f.return_type.is_empty());
                    }
                    other => panic!("expected constructor, got {:?}", other),
                }
                match &members[3].node {
                    StmtKind::Decl(Decl {
                        node: DeclKind::Function(f),
                        ..
                    }) => assert_eq!(f.name, "~Point"),
                    other => panic!("expected destructor, got {:?}", other),
                }
                match &members[4].node {
                    StmtKind::Decl(Decl {
                        node: DeclKind::Function(f),
                        ..
                    }) => assert!(f.is_const),
                    other => panic!("expected const method, got {:?}", other),
                }
            }
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_namespace_and_using() {
        let program = parse("namespace outer::inner { int x; }\nusing namespace std;");
        match &program.items[0].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Namespace { name, body },
                ..
            }) => {
                assert_eq!(name, "outer::inner");
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected namespace, got {:?}", other),
        }
        match &program.items[1].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Using { namespace },
                ..
            }) => assert_eq!(namespace, "std"),
            other => panic!("expected using, got {:?}", other),
        }
    }

    #[test]
    fn test_using_declaration_is_dropped() {
        let program = parse("using std::cout;\nint x;");
        assert_eq!(program.items.len(), 1);
        assert!(matches!(&program.items[0].node, StmtKind::VarDecl(_)));
    }

    #[test]
    fn test_include_directives() {
        let program = parse("#include <iostream>\n#include \"local.h\"\n");
        match &program.items[0].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Include { file, system },
                ..
            }) => {
                assert_eq!(file, "iostream");
                assert!(system);
            }
            other => panic!("expected include, got {:?}", other),
        }
        match &program.items[1].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Include { file, system },
                ..
            }) => {
                assert_eq!(file, "local.h");
                assert!(!system);
            }
            other => panic!("expected include, got {:?}", other),
        }
    }

    #[test]
    fn test_template_function() {
        let program = parse("template <typename T> T identity(T value) { return value; }");
        match &program.items[0].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Template { params, decl },
                ..
            }) => {
                assert_eq!(params, &vec!["T".to_string()]);
                let inner = decl.as_ref().expect("template declaration");
                assert!(matches!(
                    &inner.node,
                    StmtKind::Decl(Decl {
                        node: DeclKind::Function(f),
                        ..
                    }) if f.name == "identity"
                ));
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_traditional_for() {
        let program = parse("int main() { for (int i = 0; i < 10; i = i + 1) { } return 0; }");
        let body = match &program.items[0].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Function(f),
                ..
            }) => f.body.as_ref().unwrap(),
            other => panic!("expected function, got {:?}", other),
        };
        let stmts = match &body.node {
            StmtKind::Block(stmts) => stmts,
            other => panic!("expected block, got {:?}", other),
        };
        match &stmts[0].node {
            StmtKind::For {
                init,
                cond,
                post,
                range,
                ..
            } => {
                assert!(init.is_some());
                assert!(cond.is_some());
                assert!(post.is_some());
                assert!(range.is_none());
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_range_based_for() {
        let program = parse("int main() { for (int x : values) { } return 0; }");
        let body = match &program.items[0].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Function(f),
                ..
            }) => f.body.as_ref().unwrap(),
            other => panic!("expected function, got {:?}", other),
        };
        let stmts = match &body.node {
            StmtKind::Block(stmts) => stmts,
            other => panic!("expected block, got {:?}", other),
        };
        match &stmts[0].node {
            StmtKind::For {
                init,
                cond,
                post,
                range,
                ..
            } => {
                assert!(init.is_some());
                assert!(cond.is_none());
                assert!(post.is_none());
                assert!(range.is_some());
            }
            other => panic!("expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_if_else_and_while() {
        let program = parse("int main() { if (x) { } else { } while (y) { } return 0; }");
        let body = match &program.items[0].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Function(f),
                ..
            }) => f.body.as_ref().unwrap(),
            other => panic!("expected function, got {:?}", other),
        };
        let stmts = match &body.node {
            StmtKind::Block(stmts) => stmts,
            other => panic!("expected block, got {:?}", other),
        };
        assert!(matches!(
            &stmts[0].node,
            StmtKind::If {
                else_branch: Some(_),
                ..
            }
        ));
        assert!(matches!(&stmts[1].node, StmtKind::While { .. }));
    }

    #[test]
    fn test_throw_lowers_to_expression_statement() {
        let program = parse("int main() { throw 1; return 0; }");
        let body = match &program.items[0].node {
            StmtKind::Decl(Decl {
                node: DeclKind::Function(f),
                ..
            }) => f.body.as_ref().unwrap(),
            other => panic!("expected function, got {:?}", other),
        };
        let stmts = match &body.node {
            StmtKind::Block(stmts) => stmts,
            other => panic!("expected block, got {:?}", other),
        };
        assert!(matches!(&stmts[0].node, StmtKind::Expr(Some(_))));
    }

    #[test]
    fn test_templated_type_in_declaration() {
        let program = parse("std::vector<int> v;");
        match &program.items[0].node {
            StmtKind::VarDecl(v) => {
                assert_eq!(v.name, "v");
                assert_eq!(v.type_tokens, vec!["std::vector<int>"]);
            }
            other => panic!("expected var decl, got {:?}", other),
        }
    }

    #[test]
    fn test_error_reports_position_and_context() {
        let err = parse_err("int main() { int x = ; }");
        assert_eq!(err.line, 1);
        assert!(err.message.contains("Expected expression"));
        assert!(!err.context.is_empty());
    }

    #[test]
    fn test_missing_semicolon_is_fatal() {
        let err = parse_err("int main() { return 0 }");
        assert!(err.message.contains("Expected ';' after return"));
    }
}
