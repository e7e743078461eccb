//! Recursive-descent parser over the token list
//!
//! The grammar covers what the rewrite engine needs to inspect: using
//! directives, class declarations with attribute lists, typed members, and
//! the expression forms assertion calls are built from. Statements outside
//! the modeled grammar are consumed as raw spans; they can never be
//! rewritten, only preserved.

use crate::cs_ast::*;
use crate::lexer::{lex, TokKind, Token};

/// Parse failure with the byte range it occurred at
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

/// Parse one C# source file
pub fn parse_file(src: &str) -> Result<File, ParseError> {
    let tokens = lex(src).map_err(|e| ParseError {
        message: e.message,
        span: Span::new(e.offset, e.offset + 1),
    })?;

    Parser {
        tokens,
        pos: 0,
        src_len: src.len(),
    }
    .file()
}

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "readonly", "const", "virtual",
    "override", "sealed", "abstract", "async", "partial", "extern", "unsafe",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    src_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn at_punct(&self, p: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(p))
    }

    fn at_ident(&self, name: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(name))
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn cur_start(&self) -> usize {
        self.peek().map(|t| t.span.start).unwrap_or(self.src_len)
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn cur_span(&self) -> Span {
        self.peek()
            .map(|t| t.span)
            .unwrap_or(Span::new(self.src_len, self.src_len))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            span: self.cur_span(),
        }
    }

    fn expect_punct(&mut self, p: &'static str) -> Result<Span, ParseError> {
        if self.at_punct(p) {
            Ok(self.bump().unwrap().span)
        } else {
            Err(self.error(format!("expected `{}`", p)))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        match self.peek() {
            Some(token) => match &token.kind {
                TokKind::Ident(name) => {
                    let out = (name.clone(), token.span);
                    self.pos += 1;
                    Ok(out)
                }
                _ => Err(self.error("expected identifier")),
            },
            None => Err(self.error("expected identifier, found end of file")),
        }
    }

    // ---- file level -----------------------------------------------------

    fn file(&mut self) -> Result<File, ParseError> {
        let mut usings = Vec::new();
        let mut classes = Vec::new();

        self.top_level(&mut usings, &mut classes, false)?;

        Ok(File {
            usings,
            classes,
            span: Span::new(0, self.src_len),
        })
    }

    /// Usings, namespace wrappers, and classes. Namespaces are flattened;
    /// the rewriter cares about directives and class members, not nesting.
    fn top_level(
        &mut self,
        usings: &mut Vec<UsingDirective>,
        classes: &mut Vec<ClassDecl>,
        in_block: bool,
    ) -> Result<(), ParseError> {
        loop {
            if self.at_eof() || (in_block && self.at_punct("}")) {
                return Ok(());
            }

            if self.at_ident("using") {
                usings.push(self.using_directive()?);
            } else if self.at_ident("namespace") {
                self.bump();
                self.expect_ident()?;
                while self.at_punct(".") {
                    self.bump();
                    self.expect_ident()?;
                }
                if self.at_punct(";") {
                    // File-scoped namespace
                    self.bump();
                } else {
                    self.expect_punct("{")?;
                    self.top_level(usings, classes, true)?;
                    self.expect_punct("}")?;
                }
            } else {
                classes.push(self.class_decl()?);
            }
        }
    }

    fn using_directive(&mut self) -> Result<UsingDirective, ParseError> {
        let start = self.cur_start();
        self.bump(); // `using`

        let (first, first_span) = self.expect_ident()?;
        let mut path = vec![first];
        let name_start = first_span.start;

        while self.at_punct(".") {
            self.bump();
            let (segment, _) = self.expect_ident()?;
            path.push(segment);
        }

        let name_span = Span::new(name_start, self.prev_end());
        self.expect_punct(";")?;

        Ok(UsingDirective {
            path,
            name_span,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn class_decl(&mut self) -> Result<ClassDecl, ParseError> {
        let start = self.cur_start();
        let attr_lists = self.attr_lists()?;
        let modifiers = self.modifiers();

        if !self.at_ident("class") {
            return Err(self.error("expected class declaration"));
        }
        self.bump();

        let (name, _) = self.expect_ident()?;

        // Type parameter list, kept unmodeled
        if self.at_punct("<") {
            self.skip_balanced_angles()?;
        }

        // Base list up to the class body
        if self.at_punct(":") {
            while !self.at_punct("{") && !self.at_eof() {
                self.bump();
            }
        }

        self.expect_punct("{")?;

        let mut members = Vec::new();
        while !self.at_punct("}") && !self.at_eof() {
            members.push(self.member()?);
        }
        self.expect_punct("}")?;

        if self.at_punct(";") {
            self.bump();
        }

        Ok(ClassDecl {
            attr_lists,
            modifiers,
            name,
            members,
            span: Span::new(start, self.prev_end()),
        })
    }

    // ---- attributes -----------------------------------------------------

    fn attr_lists(&mut self) -> Result<Vec<AttrList>, ParseError> {
        let mut lists = Vec::new();

        while self.at_punct("[") {
            let start = self.cur_start();
            self.bump();

            let mut attrs = vec![self.attribute()?];
            while self.at_punct(",") {
                self.bump();
                attrs.push(self.attribute()?);
            }
            self.expect_punct("]")?;

            lists.push(AttrList {
                attrs,
                span: Span::new(start, self.prev_end()),
            });
        }

        Ok(lists)
    }

    fn attribute(&mut self) -> Result<Attribute, ParseError> {
        let start = self.cur_start();
        let (first, first_span) = self.expect_ident()?;
        let mut path = vec![first];

        while self.at_punct(".") {
            self.bump();
            let (segment, _) = self.expect_ident()?;
            path.push(segment);
        }
        let name_span = Span::new(first_span.start, self.prev_end());

        let mut args = Vec::new();
        let mut arg_list_span = None;

        if self.at_punct("(") {
            let list_start = self.cur_start();
            self.bump();

            if !self.at_punct(")") {
                args.push(self.attr_arg()?);
                while self.at_punct(",") {
                    self.bump();
                    args.push(self.attr_arg()?);
                }
            }
            self.expect_punct(")")?;
            arg_list_span = Some(Span::new(list_start, self.prev_end()));
        }

        Ok(Attribute {
            path,
            name_span,
            args,
            arg_list_span,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn attr_arg(&mut self) -> Result<AttrArg, ParseError> {
        let start = self.cur_start();

        // `Name = expr` form; `=` must not be `==`
        let named = self.peek().is_some_and(|t| t.ident().is_some())
            && self.peek_at(1).is_some_and(|t| t.is_punct("="));
        if named {
            let (name, name_span) = self.expect_ident()?;
            self.bump(); // `=`
            let expr = self.expr()?;
            return Ok(AttrArg {
                name: Some(name),
                name_span: Some(name_span),
                span: Span::new(start, expr.span.end),
                expr,
            });
        }

        let expr = self.expr()?;
        Ok(AttrArg {
            name: None,
            name_span: None,
            span: Span::new(start, expr.span.end),
            expr,
        })
    }

    fn modifiers(&mut self) -> Vec<String> {
        let mut modifiers = Vec::new();
        while let Some(name) = self.peek().and_then(|t| t.ident()) {
            if MODIFIERS.contains(&name) {
                modifiers.push(name.to_string());
                self.bump();
            } else {
                break;
            }
        }
        modifiers
    }

    // ---- members --------------------------------------------------------

    fn member(&mut self) -> Result<Member, ParseError> {
        let start = self.cur_start();
        let attr_lists = self.attr_lists()?;
        let decl_start = self.cur_start();
        let modifiers = self.modifiers();

        let saved = self.pos;
        if let Some(member) = self.typed_member(attr_lists, modifiers, start, decl_start)? {
            return Ok(member);
        }

        self.pos = saved;
        let span = self.skip_raw_member(start);
        Ok(Member::Raw(span))
    }

    /// Consume one unmodeled member: everything up to a `;` or a balanced
    /// body block at nesting depth zero. Constructors and operators land here.
    fn skip_raw_member(&mut self, start: usize) -> Span {
        let mut depth: usize = 0;

        while let Some(token) = self.peek() {
            if token.is_punct("(") || token.is_punct("[") {
                depth += 1;
            } else if token.is_punct(")") || token.is_punct("]") {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            } else if token.is_punct("{") {
                if depth == 0 {
                    let _ = self.skip_balanced_braces();
                    break;
                }
            } else if token.is_punct("}") {
                if depth == 0 {
                    break;
                }
            } else if token.is_punct(";") && depth == 0 {
                self.bump();
                break;
            }
            self.bump();
        }

        Span::new(start, self.prev_end().max(start))
    }

    /// Try the `Type Name ...` member forms; restores nothing itself, the
    /// caller resets position when this yields None.
    fn typed_member(
        &mut self,
        attr_lists: Vec<AttrList>,
        modifiers: Vec<String>,
        start: usize,
        decl_start: usize,
    ) -> Result<Option<Member>, ParseError> {
        let ty = match self.type_ref() {
            Some(ty) => ty,
            None => return Ok(None),
        };

        let name = match self.peek() {
            Some(token) => match token.ident() {
                Some(name) => {
                    let name = name.to_string();
                    self.bump();
                    name
                }
                None => return Ok(None),
            },
            None => return Ok(None),
        };

        if self.at_punct("(") {
            let params = self.param_list()?;
            let body = self.method_body()?;
            return Ok(Some(Member::Method(MethodDecl {
                attr_lists,
                modifiers,
                return_type: ty,
                name,
                params,
                body,
                decl_start,
                span: Span::new(start, self.prev_end()),
            })));
        }

        if self.at_punct("=>") {
            // Expression-bodied property
            self.bump();
            self.expr()?;
            self.expect_punct(";")?;
            return Ok(Some(Member::Property(PropertyDecl {
                attr_lists,
                modifiers,
                ty,
                name,
                span: Span::new(start, self.prev_end()),
            })));
        }

        if self.at_punct("{") {
            self.skip_balanced_braces()?;
            // Auto-property initializer
            if self.at_punct("=") {
                self.skip_to_semicolon();
            }
            return Ok(Some(Member::Property(PropertyDecl {
                attr_lists,
                modifiers,
                ty,
                name,
                span: Span::new(start, self.prev_end()),
            })));
        }

        if self.at_punct("=") || self.at_punct(",") {
            self.skip_to_semicolon();
            return Ok(Some(Member::Field(FieldDecl {
                attr_lists,
                modifiers,
                ty,
                name,
                span: Span::new(start, self.prev_end()),
            })));
        }

        if self.at_punct(";") {
            self.bump();
            return Ok(Some(Member::Field(FieldDecl {
                attr_lists,
                modifiers,
                ty,
                name,
                span: Span::new(start, self.prev_end()),
            })));
        }

        Ok(None)
    }

    fn param_list(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();

        while !self.at_punct(")") && !self.at_eof() {
            let start = self.cur_start();
            // `this` on extension-method parameters, `ref`/`out`/`params`
            while self.at_ident("this")
                || self.at_ident("ref")
                || self.at_ident("out")
                || self.at_ident("params")
            {
                self.bump();
            }
            let ty = self
                .type_ref()
                .ok_or_else(|| self.error("expected parameter type"))?;
            let (name, _) = self.expect_ident()?;

            // Default value
            if self.at_punct("=") {
                self.bump();
                self.expr()?;
            }

            params.push(Param {
                ty,
                name,
                span: Span::new(start, self.prev_end()),
            });

            if self.at_punct(",") {
                self.bump();
            }
        }

        self.expect_punct(")")?;
        Ok(params)
    }

    fn method_body(&mut self) -> Result<Option<Block>, ParseError> {
        if self.at_punct(";") {
            self.bump();
            return Ok(None);
        }

        if self.at_punct("=>") {
            // Expression-bodied method; wrapped so nested calls still get visited
            self.bump();
            let start = self.cur_start();
            let expr = self.expr()?;
            self.expect_punct(";")?;
            let span = Span::new(start, self.prev_end());
            return Ok(Some(Block {
                stmts: vec![Stmt::Expr { expr, span }],
                span,
            }));
        }

        Ok(Some(self.block()?))
    }

    // ---- types ----------------------------------------------------------

    /// Parse a type reference; yields None without consuming a partial match
    /// only when the very first token is not an identifier. Callers that
    /// backtrack must save/restore position themselves.
    fn type_ref(&mut self) -> Option<TypeRef> {
        let start = match self.peek() {
            Some(token) if token.ident().is_some() => token.span.start,
            _ => return None,
        };
        self.bump();

        loop {
            if self.at_punct(".") && self.peek_at(1).is_some_and(|t| t.ident().is_some()) {
                self.bump();
                self.bump();
            } else if self.at_punct("<") {
                let saved = self.pos;
                if self.type_arg_list().is_none() {
                    self.pos = saved;
                    break;
                }
            } else if self.at_punct("[") {
                let saved = self.pos;
                self.bump();
                while self.at_punct(",") {
                    self.bump();
                }
                if self.at_punct("]") {
                    self.bump();
                } else {
                    self.pos = saved;
                    break;
                }
            } else if self.at_punct("?") {
                self.bump();
                break;
            } else {
                break;
            }
        }

        let end = self.prev_end();
        Some(TypeRef {
            text: self.text_of(Span::new(start, end)),
            span: Span::new(start, end),
        })
    }

    fn type_arg_list(&mut self) -> Option<Vec<TypeRef>> {
        if !self.at_punct("<") {
            return None;
        }
        self.bump();

        let mut args = vec![self.type_ref()?];
        while self.at_punct(",") {
            self.bump();
            args.push(self.type_ref()?);
        }

        if self.at_punct(">") {
            self.bump();
            Some(args)
        } else {
            None
        }
    }

    // ---- statements -----------------------------------------------------

    fn block(&mut self) -> Result<Block, ParseError> {
        let start = self.expect_punct("{")?.start;
        let mut stmts = Vec::new();

        while !self.at_punct("}") && !self.at_eof() {
            stmts.push(self.stmt());
        }
        self.expect_punct("}")?;

        Ok(Block {
            stmts,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn stmt(&mut self) -> Stmt {
        let start = self.cur_start();

        if self.at_punct("{") {
            if let Ok(block) = self.block() {
                return Stmt::Block(block);
            }
            return Stmt::Raw(self.skip_raw_stmt(start));
        }

        if self.at_ident("return") {
            self.bump();
            let expr = if self.at_punct(";") {
                None
            } else {
                match self.expr() {
                    Ok(expr) => Some(expr),
                    Err(_) => return Stmt::Raw(self.skip_raw_stmt(start)),
                }
            };
            if self.at_punct(";") {
                self.bump();
                return Stmt::Return {
                    expr,
                    span: Span::new(start, self.prev_end()),
                };
            }
            return Stmt::Raw(self.skip_raw_stmt(start));
        }

        if self.at_ident("if") {
            return self.if_stmt(start);
        }

        if self.at_ident("for") || self.at_ident("foreach") || self.at_ident("while") {
            return self.loop_stmt(start);
        }

        // Local declaration: `Type name = ...;` / `Type name;`
        let saved = self.pos;
        if let Some(stmt) = self.decl_stmt(start) {
            return stmt;
        }
        self.pos = saved;

        // Expression statement
        if let Ok(expr) = self.expr() {
            if self.at_punct(";") {
                self.bump();
                return Stmt::Expr {
                    expr,
                    span: Span::new(start, self.prev_end()),
                };
            }
        }
        self.pos = saved;

        Stmt::Raw(self.skip_raw_stmt(start))
    }

    fn if_stmt(&mut self, start: usize) -> Stmt {
        self.bump(); // `if`

        if self.expect_punct("(").is_err() {
            return Stmt::Raw(self.skip_raw_stmt(start));
        }
        let cond = match self.expr() {
            Ok(cond) => cond,
            Err(_) => return Stmt::Raw(self.skip_raw_stmt(start)),
        };
        if self.expect_punct(")").is_err() {
            return Stmt::Raw(self.skip_raw_stmt(start));
        }

        let then_branch = Box::new(self.stmt());
        let else_branch = if self.at_ident("else") {
            self.bump();
            Some(Box::new(self.stmt()))
        } else {
            None
        };

        Stmt::If {
            cond,
            then_branch,
            else_branch,
            span: Span::new(start, self.prev_end()),
        }
    }

    fn loop_stmt(&mut self, start: usize) -> Stmt {
        self.bump(); // keyword

        let header_start = self.cur_start();
        if !self.at_punct("(") || self.skip_balanced_parens().is_err() {
            return Stmt::Raw(self.skip_raw_stmt(start));
        }
        let header = Span::new(header_start, self.prev_end());

        let body = Box::new(self.stmt());
        Stmt::Loop {
            header,
            body,
            span: Span::new(start, self.prev_end()),
        }
    }

    fn decl_stmt(&mut self, start: usize) -> Option<Stmt> {
        let ty = self.type_ref()?;
        let name = self.peek()?.ident()?.to_string();

        // Only commit when the shape is unambiguously a declaration
        let next = self.peek_at(1)?;
        if !(next.is_punct("=") || next.is_punct(";") || next.is_punct(",")) {
            return None;
        }
        self.bump();

        let mut inits = Vec::new();
        let mut current = name;
        loop {
            let init = if self.at_punct("=") {
                self.bump();
                Some(self.expr().ok()?)
            } else {
                None
            };
            inits.push((current, init));

            if self.at_punct(",") {
                self.bump();
                current = match self.peek().and_then(|t| t.ident()) {
                    Some(name) => {
                        let name = name.to_string();
                        self.bump();
                        name
                    }
                    None => return None,
                };
            } else {
                break;
            }
        }

        if !self.at_punct(";") {
            return None;
        }
        self.bump();

        Some(Stmt::Decl {
            ty,
            inits,
            span: Span::new(start, self.prev_end()),
        })
    }

    /// Consume tokens up to and including a `;` at depth zero, through a
    /// block at depth zero, or stop in front of the `}` that closes the
    /// enclosing block. Keeps block-shaped statements like `unchecked { .. }`
    /// from swallowing what follows them.
    fn skip_raw_stmt(&mut self, start: usize) -> Span {
        let mut depth: usize = 0;

        while let Some(token) = self.peek() {
            if token.is_punct("(") || token.is_punct("[") {
                depth += 1;
            } else if token.is_punct(")") || token.is_punct("]") {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            } else if token.is_punct("{") {
                if depth == 0 {
                    let _ = self.skip_balanced_braces();
                    break;
                }
            } else if token.is_punct("}") {
                if depth == 0 {
                    break;
                }
            } else if token.is_punct(";") && depth == 0 {
                self.bump();
                break;
            }
            self.bump();
        }

        Span::new(start, self.prev_end().max(start))
    }

    fn skip_to_semicolon(&mut self) {
        let mut depth: usize = 0;
        while let Some(token) = self.peek() {
            if token.is_punct("(") || token.is_punct("[") || token.is_punct("{") {
                depth += 1;
            } else if token.is_punct(")") || token.is_punct("]") || token.is_punct("}") {
                if depth == 0 {
                    return;
                }
                depth -= 1;
            } else if token.is_punct(";") && depth == 0 {
                self.bump();
                return;
            }
            self.bump();
        }
    }

    fn skip_balanced_braces(&mut self) -> Result<(), ParseError> {
        self.expect_punct("{")?;
        let mut depth = 1usize;

        while depth > 0 {
            match self.bump() {
                Some(token) if token.is_punct("{") => depth += 1,
                Some(token) if token.is_punct("}") => depth -= 1,
                Some(_) => {}
                None => return Err(self.error("unclosed `{`")),
            }
        }
        Ok(())
    }

    fn skip_balanced_parens(&mut self) -> Result<(), ParseError> {
        self.expect_punct("(")?;
        let mut depth = 1usize;

        while depth > 0 {
            match self.bump() {
                Some(token) if token.is_punct("(") => depth += 1,
                Some(token) if token.is_punct(")") => depth -= 1,
                Some(_) => {}
                None => return Err(self.error("unclosed `(`")),
            }
        }
        Ok(())
    }

    fn skip_balanced_angles(&mut self) -> Result<(), ParseError> {
        self.expect_punct("<")?;
        let mut depth = 1usize;

        while depth > 0 {
            match self.bump() {
                Some(token) if token.is_punct("<") => depth += 1,
                Some(token) if token.is_punct(">") => depth -= 1,
                Some(_) => {}
                None => return Err(self.error("unclosed `<`")),
            }
        }
        Ok(())
    }

    // ---- expressions ----------------------------------------------------

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.assign_expr()
    }

    fn assign_expr(&mut self) -> Result<Expr, ParseError> {
        let left = self.ternary_expr()?;

        for op in ["=", "+=", "-=", "*=", "/=", "%="] {
            if self.at_punct(op) {
                self.bump();
                let right = self.assign_expr()?;
                let span = left.span.merge(right.span);
                return Ok(Expr {
                    kind: ExprKind::Binary {
                        left: Box::new(left),
                        op: op.to_string(),
                        right: Box::new(right),
                    },
                    span,
                });
            }
        }

        Ok(left)
    }

    fn ternary_expr(&mut self) -> Result<Expr, ParseError> {
        let cond = self.binary_expr(0)?;

        if self.at_punct("?") {
            self.bump();
            let then_expr = self.expr()?;
            self.expect_punct(":")?;
            let else_expr = self.expr()?;
            let span = cond.span.merge(else_expr.span);
            return Ok(Expr {
                kind: ExprKind::Ternary {
                    cond: Box::new(cond),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                span,
            });
        }

        Ok(cond)
    }

    /// Binary operator levels, loosest first
    const BINARY_LEVELS: &'static [&'static [&'static str]] = &[
        &["??"],
        &["||"],
        &["&&"],
        &["|"],
        &["^"],
        &["&"],
        &["==", "!="],
        &["<", ">", "<=", ">="],
        &["+", "-"],
        &["*", "/", "%"],
    ];

    fn binary_expr(&mut self, level: usize) -> Result<Expr, ParseError> {
        if level >= Self::BINARY_LEVELS.len() {
            return self.unary_expr();
        }

        let mut left = self.binary_expr(level + 1)?;

        loop {
            // `is` / `as` sit at relational level; right side is a type
            if Self::BINARY_LEVELS[level].contains(&"<")
                && (self.at_ident("is") || self.at_ident("as"))
            {
                let op = self.bump().unwrap().ident().unwrap().to_string();
                let ty = self
                    .type_ref()
                    .ok_or_else(|| self.error("expected type after `is`/`as`"))?;
                let right = Expr {
                    kind: ExprKind::Ident(ty.text.clone()),
                    span: ty.span,
                };
                let span = left.span.merge(right.span);
                left = Expr {
                    kind: ExprKind::Binary {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                    span,
                };
                continue;
            }

            let op = Self::BINARY_LEVELS[level]
                .iter()
                .copied()
                .find(|op| self.at_punct(op));
            let Some(op) = op else { break };

            let op = op.to_string();
            self.bump();
            let right = self.binary_expr(level + 1)?;
            let span = left.span.merge(right.span);
            left = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            };
        }

        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        for op in ["!", "-", "+", "~", "++", "--"] {
            if self.at_punct(op) {
                let start = self.cur_start();
                self.bump();
                let expr = self.unary_expr()?;
                let span = Span::new(start, expr.span.end);
                return Ok(Expr {
                    kind: ExprKind::Unary {
                        op: op.to_string(),
                        expr: Box::new(expr),
                        postfix: false,
                    },
                    span,
                });
            }
        }

        self.postfix_expr()
    }

    fn postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary_expr()?;

        loop {
            if self.at_punct(".") {
                self.bump();
                let (name, name_span) = self.expect_ident()?;

                // Type arguments only count when a call follows; otherwise
                // `<` is relational and belongs to the caller.
                let mut type_args = Vec::new();
                if self.at_punct("<") {
                    let saved = self.pos;
                    match self.type_arg_list() {
                        Some(args) if self.at_punct("(") => type_args = args,
                        _ => self.pos = saved,
                    }
                }

                let span = Span::new(expr.span.start, self.prev_end());
                expr = Expr {
                    kind: ExprKind::Member {
                        target: Box::new(expr),
                        name,
                        name_span,
                        type_args,
                    },
                    span,
                };
            } else if self.at_punct("(") {
                let list_start = self.cur_start();
                self.bump();

                let mut args = Vec::new();
                if !self.at_punct(")") {
                    args.push(self.expr()?);
                    while self.at_punct(",") {
                        self.bump();
                        args.push(self.expr()?);
                    }
                }
                self.expect_punct(")")?;

                let arg_list_span = Span::new(list_start, self.prev_end());
                let span = Span::new(expr.span.start, self.prev_end());
                expr = Expr {
                    kind: ExprKind::Invocation {
                        callee: Box::new(expr),
                        args,
                        arg_list_span,
                    },
                    span,
                };
            } else if self.at_punct("[") {
                self.bump();
                let index = self.expr()?;
                self.expect_punct("]")?;
                let span = Span::new(expr.span.start, self.prev_end());
                expr = Expr {
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                };
            } else if self.at_punct("++") || self.at_punct("--") {
                let op = self.bump().unwrap();
                let op_text = match op.kind {
                    TokKind::Punct(p) => p.to_string(),
                    _ => unreachable!(),
                };
                let span = Span::new(expr.span.start, op.span.end);
                expr = Expr {
                    kind: ExprKind::Unary {
                        op: op_text,
                        expr: Box::new(expr),
                        postfix: true,
                    },
                    span,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.error("expected expression, found end of file")),
        };
        let start = token.span.start;

        match &token.kind {
            TokKind::Number(text) => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::Number(text.clone()),
                    span: token.span,
                })
            }
            TokKind::Str(value) => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::Str {
                        value: value.clone(),
                    },
                    span: token.span,
                })
            }
            TokKind::Char(raw) => {
                self.bump();
                Ok(Expr {
                    kind: ExprKind::Char(raw.clone()),
                    span: token.span,
                })
            }
            TokKind::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.bump();
                    Ok(Expr {
                        kind: ExprKind::Bool(name == "true"),
                        span: token.span,
                    })
                }
                "null" => {
                    self.bump();
                    Ok(Expr {
                        kind: ExprKind::Null,
                        span: token.span,
                    })
                }
                "this" => {
                    self.bump();
                    Ok(Expr {
                        kind: ExprKind::This,
                        span: token.span,
                    })
                }
                "typeof" if self.peek_at(1).is_some_and(|t| t.is_punct("(")) => {
                    self.bump();
                    self.bump();
                    let ty = self
                        .type_ref()
                        .ok_or_else(|| self.error("expected type inside typeof"))?;
                    self.expect_punct(")")?;
                    Ok(Expr {
                        kind: ExprKind::Typeof(ty),
                        span: Span::new(start, self.prev_end()),
                    })
                }
                "new" => {
                    self.bump();
                    let ty = self
                        .type_ref()
                        .ok_or_else(|| self.error("expected type after `new`"))?;

                    let mut args = Vec::new();
                    if self.at_punct("(") {
                        self.bump();
                        if !self.at_punct(")") {
                            args.push(self.expr()?);
                            while self.at_punct(",") {
                                self.bump();
                                args.push(self.expr()?);
                            }
                        }
                        self.expect_punct(")")?;
                    }

                    // Object/collection initializer; kept in the span only
                    if self.at_punct("{") {
                        self.skip_balanced_braces()?;
                    }

                    Ok(Expr {
                        kind: ExprKind::New { ty, args },
                        span: Span::new(start, self.prev_end()),
                    })
                }
                _ => {
                    // Single-parameter lambda: `x => body`
                    if self.peek_at(1).is_some_and(|t| t.is_punct("=>")) {
                        let params = token.span;
                        self.bump();
                        self.bump();
                        let body = self.lambda_body()?;
                        return Ok(Expr {
                            kind: ExprKind::Lambda { params, body },
                            span: Span::new(start, self.prev_end()),
                        });
                    }

                    self.bump();
                    Ok(Expr {
                        kind: ExprKind::Ident(name.clone()),
                        span: token.span,
                    })
                }
            },
            TokKind::Punct("(") => {
                if self.paren_starts_lambda() {
                    let params_start = start;
                    self.skip_balanced_parens()?;
                    let params = Span::new(params_start, self.prev_end());
                    self.expect_punct("=>")?;
                    let body = self.lambda_body()?;
                    return Ok(Expr {
                        kind: ExprKind::Lambda { params, body },
                        span: Span::new(start, self.prev_end()),
                    });
                }

                self.bump();
                let inner = self.expr()?;
                self.expect_punct(")")?;
                Ok(Expr {
                    kind: ExprKind::Paren(Box::new(inner)),
                    span: Span::new(start, self.prev_end()),
                })
            }
            _ => Err(self.error("expected expression")),
        }
    }

    fn lambda_body(&mut self) -> Result<LambdaBody, ParseError> {
        if self.at_punct("{") {
            Ok(LambdaBody::Block(self.block()?))
        } else {
            Ok(LambdaBody::Expr(Box::new(self.expr()?)))
        }
    }

    /// Lookahead: does the `(` at the current position close into a `=>`?
    fn paren_starts_lambda(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.pos;

        while let Some(token) = self.tokens.get(i) {
            if token.is_punct("(") {
                depth += 1;
            } else if token.is_punct(")") {
                depth -= 1;
                if depth == 0 {
                    return self.tokens.get(i + 1).is_some_and(|t| t.is_punct("=>"));
                }
            }
            i += 1;
        }

        false
    }

    fn text_of(&self, span: Span) -> String {
        // The parser does not keep the source; reconstruct from token text is
        // not possible, so spans are resolved by the caller. Type text is the
        // only place that needs it eagerly; build it from the tokens instead.
        let mut out = String::new();
        for token in &self.tokens {
            if token.span.start < span.start {
                continue;
            }
            if token.span.end > span.end {
                break;
            }
            match &token.kind {
                TokKind::Ident(s) => out.push_str(s),
                TokKind::Number(s) => out.push_str(s),
                TokKind::Str(s) => {
                    out.push('"');
                    out.push_str(s);
                    out.push('"');
                }
                TokKind::Char(s) => {
                    out.push('\'');
                    out.push_str(s);
                    out.push('\'');
                }
                TokKind::Punct(s) => out.push_str(s),
            }
        }
        out
    }
}
