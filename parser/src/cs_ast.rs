//! C# subset AST with full span tracking
//!
//! Every node carries the byte range it was parsed from, so a rewrite pass
//! can splice replacement text over the original source and leave everything
//! else byte-for-byte untouched. Statements the parser does not model are
//! preserved as raw spans rather than rejected.

/// Byte range into the source text (start inclusive, end exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Slice the source text this span covers
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

/// A complete C# source file (the subset: usings followed by class declarations)
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub usings: Vec<UsingDirective>,
    pub classes: Vec<ClassDecl>,
    pub span: Span,
}

/// `using Some.Namespace;`
#[derive(Debug, Clone, PartialEq)]
pub struct UsingDirective {
    pub path: Vec<String>,
    /// Span of the dotted name only, for namespace substitution
    pub name_span: Span,
    pub span: Span,
}

impl UsingDirective {
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// `[Attr(args), Other]`
#[derive(Debug, Clone, PartialEq)]
pub struct AttrList {
    pub attrs: Vec<Attribute>,
    pub span: Span,
}

/// One attribute inside an attribute list
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub path: Vec<String>,
    /// Span of the (possibly dotted) attribute name
    pub name_span: Span,
    pub args: Vec<AttrArg>,
    /// Span of the argument list including parentheses, when present
    pub arg_list_span: Option<Span>,
    pub span: Span,
}

impl Attribute {
    pub fn short_name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    /// First argument with `Name = value` syntax matching `name`
    pub fn named_arg(&self, name: &str) -> Option<&AttrArg> {
        self.args
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
    }

    /// Positional (unnamed) argument at `index`
    pub fn positional_arg(&self, index: usize) -> Option<&AttrArg> {
        self.args.iter().filter(|a| a.name.is_none()).nth(index)
    }
}

/// One attribute argument, optionally `Name = expr`
#[derive(Debug, Clone, PartialEq)]
pub struct AttrArg {
    pub name: Option<String>,
    /// Span of the name before `=`, when present
    pub name_span: Option<Span>,
    pub expr: Expr,
    pub span: Span,
}

/// Class declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub attr_lists: Vec<AttrList>,
    pub modifiers: Vec<String>,
    pub name: String,
    pub members: Vec<Member>,
    pub span: Span,
}

/// Class member
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Method(MethodDecl),
    Property(PropertyDecl),
    Field(FieldDecl),
    /// Anything the parser does not model; left untouched
    Raw(Span),
}

impl Member {
    pub fn span(&self) -> Span {
        match self {
            Member::Method(m) => m.span,
            Member::Property(p) => p.span,
            Member::Field(f) => f.span,
            Member::Raw(span) => *span,
        }
    }

    pub fn attr_lists(&self) -> &[AttrList] {
        match self {
            Member::Method(m) => &m.attr_lists,
            Member::Property(p) => &p.attr_lists,
            Member::Field(f) => &f.attr_lists,
            Member::Raw(_) => &[],
        }
    }
}

/// Method declaration
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub attr_lists: Vec<AttrList>,
    pub modifiers: Vec<String>,
    pub return_type: TypeRef,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Option<Block>,
    /// Offset of the first token after the attribute lists
    pub decl_start: usize,
    pub span: Span,
}

impl MethodDecl {
    pub fn is_static(&self) -> bool {
        self.modifiers.iter().any(|m| m == "static")
    }

    pub fn is_public(&self) -> bool {
        self.modifiers.iter().any(|m| m == "public")
    }

    pub fn returns_void(&self) -> bool {
        self.return_type.text == "void"
    }
}

/// Property declaration (block-bodied or expression-bodied)
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub attr_lists: Vec<AttrList>,
    pub modifiers: Vec<String>,
    pub ty: TypeRef,
    pub name: String,
    pub span: Span,
}

/// Field declaration (first declarator's name is recorded)
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub attr_lists: Vec<AttrList>,
    pub modifiers: Vec<String>,
    pub ty: TypeRef,
    pub name: String,
    pub span: Span,
}

/// Method parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeRef,
    pub name: String,
    pub span: Span,
}

/// A type reference, kept as written (`int`, `Foo.Bar<Baz>[]`, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub text: String,
    pub span: Span,
}

/// Statement block `{ ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Statements; anything unrecognized becomes `Raw`
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr {
        expr: Expr,
        span: Span,
    },
    /// `Type name = expr, name2 = expr2;`
    Decl {
        ty: TypeRef,
        inits: Vec<(String, Option<Expr>)>,
        span: Span,
    },
    Return {
        expr: Option<Expr>,
        span: Span,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    /// `for`/`foreach`/`while` with an unmodeled header and a parsed body
    Loop {
        header: Span,
        body: Box<Stmt>,
        span: Span,
    },
    Block(Block),
    /// Tokens skipped verbatim; never rewritten
    Raw(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr { span, .. }
            | Stmt::Decl { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Loop { span, .. } => *span,
            Stmt::Block(block) => block.span,
            Stmt::Raw(span) => *span,
        }
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Numeric literal, kept as written
    Number(String),
    /// String literal with its raw spelling and unescaped value
    Str {
        value: String,
    },
    Char(String),
    Bool(bool),
    Null,
    This,
    Ident(String),

    /// `target.name` or `target.name<T, ...>` (type arguments only before a call)
    Member {
        target: Box<Expr>,
        name: String,
        name_span: Span,
        type_args: Vec<TypeRef>,
    },

    /// `callee(args)`
    Invocation {
        callee: Box<Expr>,
        args: Vec<Expr>,
        arg_list_span: Span,
    },

    /// `target[index]`
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },

    /// `typeof(T)`
    Typeof(TypeRef),

    /// `new T(args)` (object initializers are kept in the span only)
    New {
        ty: TypeRef,
        args: Vec<Expr>,
    },

    /// `x => body` or `(a, b) => body`; parameter list kept as a raw span
    Lambda {
        params: Span,
        body: LambdaBody,
    },

    Unary {
        op: String,
        expr: Box<Expr>,
        postfix: bool,
    },

    Binary {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },

    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },

    Paren(Box<Expr>),
}

/// Body of a lambda expression
#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

impl Expr {
    /// Leftmost identifier at the root of a member/invocation chain, if any.
    /// For `Throws.Exception.TypeOf<T>()` this is `Throws`.
    pub fn chain_root(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            ExprKind::Member { target, .. } => target.chain_root(),
            ExprKind::Invocation { callee, .. } => callee.chain_root(),
            _ => None,
        }
    }

    /// Rightmost simple name of a dotted/member expression, if it reduces to one.
    /// `ArgumentException.ParamName` reduces to `ParamName`.
    pub fn final_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            ExprKind::Member {
                name, type_args, ..
            } if type_args.is_empty() => Some(name),
            _ => None,
        }
    }
}
