// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Declaration hoisting.
//!
//! Before a body runs, its `var` names are bound to `undefined` on the
//! function (or global) scope, `let`/`const` names are bound uninitialized
//! on the block they appear in, and function declarations are bound to
//! their closures.

use litmus_ast::stmt::{Stmt, StmtKind, VarKind};

use crate::env::ScopeRef;
use crate::value::Value;

use super::Interpreter;

impl Interpreter {
    /// Hoist a function or program body. `scope` is the var scope.
    pub(super) fn hoist_declarations(&mut self, stmts: &[Stmt], scope: &ScopeRef, with_vars: bool) {
        if with_vars {
            let mut names = Vec::new();
            collect_var_names(stmts, &mut names);
            let mut s = scope.borrow_mut();
            for name in names {
                if !s.has_own(&name) {
                    s.declare(&name, Some(Value::Undefined), true);
                }
            }
        }
        self.hoist_lexical(stmts, scope);
    }

    /// Bind the block-level declarations of `stmts` in `scope`.
    ///
    /// Lexical bindings replace any existing binding of the same name, which
    /// gives top-level `let` its redeclare-per-snippet behavior.
    pub(super) fn hoist_lexical(&mut self, stmts: &[Stmt], scope: &ScopeRef) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::VarDecl { kind, decls } if kind.is_lexical() => {
                    let mut s = scope.borrow_mut();
                    for decl in decls {
                        s.declare(&decl.name, None, *kind == VarKind::Let);
                    }
                }
                StmtKind::Function(decl) => {
                    let name = decl.name.clone().unwrap_or_default();
                    let closure = self.with_scope(scope.clone(), |this| this.make_closure(decl, &name));
                    scope.borrow_mut().declare(&name, Some(closure), true);
                }
                _ => {}
            }
        }
    }
}

/// Whether entering `stmts` needs a scope of its own.
pub(super) fn has_block_declarations(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::VarDecl { kind, .. } => kind.is_lexical(),
        StmtKind::Function(_) => true,
        _ => false,
    })
}

/// Names declared with `var` anywhere in `stmts`, not descending into
/// nested functions.
fn collect_var_names(stmts: &[Stmt], names: &mut Vec<String>) {
    for stmt in stmts {
        collect_from_stmt(stmt, names);
    }
}

fn collect_from_stmt(stmt: &Stmt, names: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::VarDecl { kind: VarKind::Var, decls } => {
            names.extend(decls.iter().map(|d| d.name.clone()));
        }
        StmtKind::If { consequent, alternate, .. } => {
            collect_from_stmt(consequent, names);
            if let Some(alt) = alternate {
                collect_from_stmt(alt, names);
            }
        }
        StmtKind::Block(body) => collect_var_names(body, names),
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            collect_from_stmt(body, names)
        }
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                collect_from_stmt(init, names);
            }
            collect_from_stmt(body, names);
        }
        StmtKind::ForOf { kind, name, body, .. } | StmtKind::ForIn { kind, name, body, .. } => {
            if *kind == Some(VarKind::Var) {
                names.push(name.clone());
            }
            collect_from_stmt(body, names);
        }
        StmtKind::Try { block, handler, finalizer, .. } => {
            collect_var_names(block, names);
            if let Some(handler) = handler {
                collect_var_names(handler, names);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, names);
            }
        }
        StmtKind::Switch { cases, .. } => {
            for case in cases {
                collect_var_names(&case.body, names);
            }
        }
        StmtKind::Labeled { body, .. } => collect_from_stmt(body, names),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_names_found_in_nested_blocks_but_not_functions() {
        let program = litmus_parser::parse_source(
            "var a = 1; if (a) { var b; } for (var i = 0; i < 1; i++) {} \
             function f() { var hidden; } let c; for (var k in {}) {}",
        )
        .unwrap();
        let mut names = Vec::new();
        collect_var_names(&program, &mut names);
        assert_eq!(names, vec!["a", "b", "i", "k"]);
    }

    #[test]
    fn block_declarations() {
        let with = litmus_parser::parse_source("let x = 1;").unwrap();
        let without = litmus_parser::parse_source("var x = 1; x++;").unwrap();
        assert!(has_block_declarations(&with));
        assert!(!has_block_declarations(&without));
    }
}
