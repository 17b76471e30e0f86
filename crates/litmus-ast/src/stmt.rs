// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement AST nodes.

use std::rc::Rc;

use crate::expr::{Expr, FunctionDecl};
use crate::Span;

/// A statement in the AST.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// Function-scoped, hoisted, redeclarable
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn is_lexical(self) -> bool {
        !matches!(self, VarKind::Var)
    }
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    VarDecl {
        kind: VarKind,
        decls: Vec<Declarator>,
    },
    /// Function declaration; hoisted to the top of its block
    Function(Rc<FunctionDecl>),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    /// C-style `for (init; test; update)`
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    /// `for (let x of iter)`; `kind` is `None` for a bare assignment target
    ForOf {
        kind: Option<VarKind>,
        name: String,
        iter: Expr,
        body: Box<Stmt>,
    },
    /// `for (const k in obj)`
    ForIn {
        kind: Option<VarKind>,
        name: String,
        object: Expr,
        body: Box<Stmt>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        param: Option<String>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Empty,
}
