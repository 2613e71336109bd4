//! Abstract syntax tree for the Cinder surface language.
//!
//! Each family (expression, statement, declaration) is a single sum
//! type; every node carries the line/column of its first token.

use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    Str,
    Character,
    BraceInit,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub node: ExprKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal {
        value: String,
        kind: LiteralKind,
    },
    Identifier {
        name: String,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Ternary `cond ? then : else`, kept as a three-child node so the
    /// condition survives into codegen.
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        member: String,
        arrow: bool,
    },
    Subscript {
        array: Box<Expr>,
        index: Box<Expr>,
    },
}

impl Expr {
    pub fn new(node: ExprKind, line: usize, column: usize) -> Self {
        Self { node, line, column }
    }
}

/// One declarator of a variable declaration. The declared type is the
/// ordered token list exactly as written (qualifiers, base, `*`/`&`).
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub type_tokens: Vec<String>,
    pub name: String,
    pub init: Option<Expr>,
    pub is_pointer: bool,
    pub is_reference: bool,
    pub is_array: bool,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub type_tokens: Vec<String>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub return_type: Vec<String>,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Option<Box<Stmt>>,
    pub is_const: bool,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub node: StmtKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Expression statement; `throw;` lowers to an empty one.
    Expr(Option<Expr>),
    VarDecl(VarDecl),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    /// Unified traditional and range-based for. A range-based loop has
    /// `range` set and `cond`/`post` empty.
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Expr>,
        range: Option<Expr>,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    AccessSpec(String),
    Decl(Decl),
}

impl Stmt {
    pub fn new(node: StmtKind, line: usize, column: usize) -> Self {
        Self { node, line, column }
    }
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub node: DeclKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Function(FunctionDecl),
    Class {
        name: String,
        bases: Vec<String>,
        members: Vec<Stmt>,
    },
    Struct {
        name: String,
        members: Vec<Stmt>,
    },
    Namespace {
        name: String,
        body: Vec<Stmt>,
    },
    Template {
        params: Vec<String>,
        decl: Option<Box<Stmt>>,
    },
    Include {
        file: String,
        system: bool,
    },
    Using {
        namespace: String,
    },
}

impl Decl {
    pub fn new(node: DeclKind, line: usize, column: usize) -> Self {
        Self { node, line, column }
    }
}

/// Ordered list of top-level declarations and statements.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Stmt>,
}

impl Program {
    /// Indented tree listing with `[line:column]` suffixes.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str("Program AST:\n");
        for item in &self.items {
            dump_stmt(item, 1, &mut out);
        }
        out
    }
}

fn pad(indent: usize) -> String {
    "  ".repeat(indent)
}

fn dump_expr(expr: &Expr, indent: usize, out: &mut String) {
    let at = format!("[{}:{}]", expr.line, expr.column);
    match &expr.node {
        ExprKind::Literal { value, kind } => {
            let _ = writeln!(out, "{}Literal({:?} \"{}\") {}", pad(indent), kind, value, at);
        }
        ExprKind::Identifier { name } => {
            let _ = writeln!(out, "{}Identifier({}) {}", pad(indent), name, at);
        }
        ExprKind::Unary { op, operand } => {
            let _ = writeln!(out, "{}UnaryOp({}) {}", pad(indent), op, at);
            dump_expr(operand, indent + 1, out);
        }
        ExprKind::Binary { op, left, right } => {
            let _ = writeln!(out, "{}BinaryOp({}) {}", pad(indent), op, at);
            dump_expr(left, indent + 1, out);
            dump_expr(right, indent + 1, out);
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            let _ = writeln!(out, "{}Conditional {}", pad(indent), at);
            dump_expr(cond, indent + 1, out);
            dump_expr(then_expr, indent + 1, out);
            dump_expr(else_expr, indent + 1, out);
        }
        ExprKind::Call { callee, args } => {
            let _ = writeln!(out, "{}Call {}", pad(indent), at);
            dump_expr(callee, indent + 1, out);
            for arg in args {
                dump_expr(arg, indent + 1, out);
            }
        }
        ExprKind::Member {
            object,
            member,
            arrow,
        } => {
            let op = if *arrow { "->" } else { "." };
            let _ = writeln!(out, "{}Member({}{}) {}", pad(indent), op, member, at);
            dump_expr(object, indent + 1, out);
        }
        ExprKind::Subscript { array, index } => {
            let _ = writeln!(out, "{}Subscript {}", pad(indent), at);
            dump_expr(array, indent + 1, out);
            dump_expr(index, indent + 1, out);
        }
    }
}

fn dump_stmt(stmt: &Stmt, indent: usize, out: &mut String) {
    let at = format!("[{}:{}]", stmt.line, stmt.column);
    match &stmt.node {
        StmtKind::Expr(expr) => {
            let _ = writeln!(out, "{}ExprStmt {}", pad(indent), at);
            if let Some(e) = expr {
                dump_expr(e, indent + 1, out);
            }
        }
        StmtKind::VarDecl(decl) => {
            let _ = writeln!(
                out,
                "{}VarDecl({} {}) {}",
                pad(indent),
                decl.type_tokens.join(" "),
                decl.name,
                at
            );
            if let Some(init) = &decl.init {
                dump_expr(init, indent + 1, out);
            }
        }
        StmtKind::Block(stmts) => {
            let _ = writeln!(out, "{}Block {}", pad(indent), at);
            for s in stmts {
                dump_stmt(s, indent + 1, out);
            }
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let _ = writeln!(out, "{}If {}", pad(indent), at);
            dump_expr(cond, indent + 1, out);
            dump_stmt(then_branch, indent + 1, out);
            if let Some(e) = else_branch {
                dump_stmt(e, indent + 1, out);
            }
        }
        StmtKind::While { cond, body } => {
            let _ = writeln!(out, "{}While {}", pad(indent), at);
            dump_expr(cond, indent + 1, out);
            dump_stmt(body, indent + 1, out);
        }
        StmtKind::For {
            init,
            cond,
            post,
            range,
            body,
        } => {
            let _ = writeln!(out, "{}For {}", pad(indent), at);
            if let Some(i) = init {
                dump_stmt(i, indent + 1, out);
            }
            if let Some(c) = cond {
                dump_expr(c, indent + 1, out);
            }
            if let Some(p) = post {
                dump_expr(p, indent + 1, out);
            }
            if let Some(r) = range {
                dump_expr(r, indent + 1, out);
            }
            dump_stmt(body, indent + 1, out);
        }
        StmtKind::Return(expr) => {
            let _ = writeln!(out, "{}Return {}", pad(indent), at);
            if let Some(e) = expr {
                dump_expr(e, indent + 1, out);
            }
        }
        StmtKind::AccessSpec(access) => {
            let _ = writeln!(out, "{}AccessSpec({}) {}", pad(indent), access, at);
        }
        StmtKind::Decl(decl) => dump_decl(decl, indent, out),
    }
}

fn dump_decl(decl: &Decl, indent: usize, out: &mut String) {
    let at = format!("[{}:{}]", decl.line, decl.column);
    match &decl.node {
        DeclKind::Function(func) => {
            let _ = writeln!(
                out,
                "{}FunctionDecl({} {}{}) {}",
                pad(indent),
                func.return_type.join(" "),
                func.name,
                if func.is_const { " const" } else { "" },
                at
            );
            for param in &func.params {
                let _ = writeln!(
                    out,
                    "{}Param({} {})",
                    pad(indent + 1),
                    param.type_tokens.join(" "),
                    param.name
                );
            }
            if let Some(body) = &func.body {
                dump_stmt(body, indent + 1, out);
            }
        }
        DeclKind::Class {
            name,
            bases,
            members,
        } => {
            let _ = writeln!(out, "{}ClassDecl({}) {}", pad(indent), name, at);
            if !bases.is_empty() {
                let _ = writeln!(out, "{}Bases: {}", pad(indent + 1), bases.join(" "));
            }
            for member in members {
                dump_stmt(member, indent + 1, out);
            }
        }
        DeclKind::Struct { name, members } => {
            let _ = writeln!(out, "{}StructDecl({}) {}", pad(indent), name, at);
            for member in members {
                dump_stmt(member, indent + 1, out);
            }
        }
        DeclKind::Namespace { name, body } => {
            let _ = writeln!(out, "{}NamespaceDecl({}) {}", pad(indent), name, at);
            for stmt in body {
                dump_stmt(stmt, indent + 1, out);
            }
        }
        DeclKind::Template { params, decl } => {
            let _ = writeln!(
                out,
                "{}TemplateDecl<{}> {}",
                pad(indent),
                params.join(", "),
                at
            );
            if let Some(d) = decl {
                dump_stmt(d, indent + 1, out);
            }
        }
        DeclKind::Include { file, system } => {
            let (open, close) = if *system { ("<", ">") } else { ("\"", "\"") };
            let _ = writeln!(
                out,
                "{}IncludeDirective({}{}{}) {}",
                pad(indent),
                open,
                file,
                close,
                at
            );
        }
        DeclKind::Using { namespace } => {
            let _ = writeln!(out, "{}UsingDirective({}) {}", pad(indent), namespace, at);
        }
    }
}
