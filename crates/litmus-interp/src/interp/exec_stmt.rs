// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement execution.
//!
//! Statements yield an optional completion value: `Some` for expression
//! statements (and compound statements that ran one), `None` otherwise.

use litmus_ast::expr::Expr;
use litmus_ast::stmt::{Stmt, StmtKind, SwitchCase, VarKind};

use crate::coerce;
use crate::env::{self, Scope};
use crate::value::{Object, ObjectKind, Value};

use super::hoist::has_block_declarations;
use super::{Interpreter, RuntimeError};

type Completion = Result<Option<Value>, RuntimeError>;

/// What a loop does after one run of its body.
enum Flow {
    Next,
    Break,
}

impl Interpreter {
    pub(super) fn exec_stmt(&mut self, stmt: &Stmt) -> Completion {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Expr(expr) => self.eval_expr(expr).map(Some),

            StmtKind::VarDecl { kind, decls } => {
                for decl in decls {
                    match (kind, &decl.init) {
                        (VarKind::Var, None) => {}
                        (VarKind::Var, Some(init)) => {
                            let value = self.eval_named(init, &decl.name)?;
                            self.assign_name(&decl.name, value)?;
                        }
                        (_, init) => {
                            let value = match init {
                                Some(init) => self.eval_named(init, &decl.name)?,
                                None => Value::Undefined,
                            };
                            let mut scope = self.scope.borrow_mut();
                            if scope.has_own(&decl.name) {
                                scope.initialize(&decl.name, value);
                            } else {
                                scope.declare(&decl.name, Some(value), *kind == VarKind::Let);
                            }
                        }
                    }
                }
                Ok(None)
            }

            // Bound during hoisting.
            StmtKind::Function(_) => Ok(None),

            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::Undefined,
                };
                Err(RuntimeError::Return(value))
            }

            StmtKind::If { test, consequent, alternate } => {
                let cond = self.eval_expr(test)?;
                if coerce::to_boolean(&cond) {
                    self.exec_stmt(consequent)
                } else if let Some(alt) = alternate {
                    self.exec_stmt(alt)
                } else {
                    Ok(None)
                }
            }

            StmtKind::Block(stmts) => self.exec_block(stmts),

            StmtKind::While { .. }
            | StmtKind::DoWhile { .. }
            | StmtKind::For { .. }
            | StmtKind::ForOf { .. }
            | StmtKind::ForIn { .. } => self.exec_loop(stmt, &[]),

            StmtKind::Break(label) => Err(RuntimeError::Break(label.clone())),
            StmtKind::Continue(label) => Err(RuntimeError::Continue(label.clone())),

            StmtKind::Throw(expr) => {
                let value = self.eval_expr(expr)?;
                Err(RuntimeError::Throw(value))
            }

            StmtKind::Try { block, param, handler, finalizer } => {
                let result = match (self.exec_block(block), handler) {
                    (Err(RuntimeError::Throw(thrown)), Some(handler)) => {
                        let scope = Scope::block(&self.scope);
                        if let Some(param) = param {
                            scope.borrow_mut().declare(param, Some(thrown), true);
                        }
                        self.with_scope(scope, |this| this.exec_block(handler))
                    }
                    (result, _) => result,
                };
                match finalizer {
                    Some(_) if matches!(result, Err(RuntimeError::Halt(_))) => result,
                    Some(finalizer) => {
                        self.exec_block(finalizer)?;
                        result
                    }
                    None => result,
                }
            }

            StmtKind::Switch { discriminant, cases } => self.exec_switch(discriminant, cases),

            StmtKind::Labeled { .. } => {
                let mut labels = Vec::new();
                let mut body = stmt;
                while let StmtKind::Labeled { label, body: inner } = &body.kind {
                    labels.push(label.clone());
                    body = inner;
                }
                let result = if is_loop(body) {
                    self.exec_loop(body, &labels)
                } else {
                    self.exec_stmt(body)
                };
                match result {
                    Err(RuntimeError::Break(Some(label))) if labels.contains(&label) => Ok(None),
                    other => other,
                }
            }

            StmtKind::Empty => Ok(None),
        }
    }

    /// Run statements in order, keeping the last completion value.
    pub(super) fn exec_stmts(&mut self, stmts: &[Stmt]) -> Completion {
        let mut completion = None;
        for stmt in stmts {
            if let Some(value) = self.exec_stmt(stmt)? {
                completion = Some(value);
            }
        }
        Ok(completion)
    }

    /// Run a braced block, in a scope of its own when it declares anything.
    pub(super) fn exec_block(&mut self, stmts: &[Stmt]) -> Completion {
        if !has_block_declarations(stmts) {
            return self.exec_stmts(stmts);
        }
        let scope = Scope::block(&self.scope);
        self.hoist_lexical(stmts, &scope);
        self.with_scope(scope, |this| this.exec_stmts(stmts))
    }

    fn exec_loop(&mut self, stmt: &Stmt, labels: &[String]) -> Completion {
        let saved = self.scope.clone();
        let result = self.run_loop(stmt, labels);
        self.scope = saved;
        result
    }

    fn run_loop(&mut self, stmt: &Stmt, labels: &[String]) -> Completion {
        let mut completion = None;
        match &stmt.kind {
            StmtKind::While { test, body } => loop {
                self.tick()?;
                let cond = self.eval_expr(test)?;
                if !coerce::to_boolean(&cond) {
                    break;
                }
                if let Flow::Break = self.loop_body(body, labels, &mut completion)? {
                    break;
                }
            },

            StmtKind::DoWhile { body, test } => loop {
                self.tick()?;
                if let Flow::Break = self.loop_body(body, labels, &mut completion)? {
                    break;
                }
                let cond = self.eval_expr(test)?;
                if !coerce::to_boolean(&cond) {
                    break;
                }
            },

            StmtKind::For { init, test, update, body } => {
                let lexical: Vec<String> = match init.as_deref().map(|s| &s.kind) {
                    Some(StmtKind::VarDecl { kind, decls }) if kind.is_lexical() => {
                        decls.iter().map(|d| d.name.clone()).collect()
                    }
                    _ => Vec::new(),
                };
                if let Some(init) = init {
                    if !lexical.is_empty() {
                        let scope = Scope::block(&self.scope);
                        self.hoist_lexical(std::slice::from_ref(init), &scope);
                        self.scope = scope;
                    }
                    self.exec_stmt(init)?;
                }
                loop {
                    self.tick()?;
                    if let Some(test) = test {
                        let cond = self.eval_expr(test)?;
                        if !coerce::to_boolean(&cond) {
                            break;
                        }
                    }
                    if let Flow::Break = self.loop_body(body, labels, &mut completion)? {
                        break;
                    }
                    if !lexical.is_empty() {
                        self.scope = env::copy_for_iteration(&self.scope, &lexical);
                    }
                    if let Some(update) = update {
                        self.eval_expr(update)?;
                    }
                }
            }

            StmtKind::ForOf { kind, name, iter, body } => {
                let iterable = self.eval_expr(iter)?;
                let outer = self.scope.clone();
                let chars: Option<Vec<char>> = match &iterable {
                    Value::String(s) => Some(s.chars().collect()),
                    v if v.is_array() => None,
                    _ => {
                        return Err(self.type_error(format!(
                            "{} is not iterable",
                            iterable_description(iter, &iterable)
                        )))
                    }
                };
                let mut index = 0;
                loop {
                    self.tick()?;
                    let item = match (&chars, &iterable) {
                        (Some(chars), _) => chars.get(index).map(|c| Value::string(c.to_string())),
                        (None, Value::Object(obj)) => match &obj.borrow().kind {
                            ObjectKind::Array(items) => items.get(index).cloned(),
                            _ => None,
                        },
                        _ => None,
                    };
                    let Some(item) = item else { break };
                    index += 1;
                    self.bind_loop_variable(*kind, name, item, &outer)?;
                    if let Flow::Break = self.loop_body(body, labels, &mut completion)? {
                        break;
                    }
                }
            }

            StmtKind::ForIn { kind, name, object, body } => {
                let target = self.eval_expr(object)?;
                let keys = self.enumerable_keys(&target, true);
                let outer = self.scope.clone();
                for key in keys {
                    self.tick()?;
                    self.bind_loop_variable(*kind, name, Value::string(key), &outer)?;
                    if let Flow::Break = self.loop_body(body, labels, &mut completion)? {
                        break;
                    }
                }
            }

            _ => return self.exec_stmt(stmt),
        }
        Ok(completion)
    }

    /// Run a loop body, translating `break`/`continue` aimed at this loop.
    fn loop_body(
        &mut self,
        body: &Stmt,
        labels: &[String],
        completion: &mut Option<Value>,
    ) -> Result<Flow, RuntimeError> {
        match self.exec_stmt(body) {
            Ok(value) => {
                if value.is_some() {
                    *completion = value;
                }
                Ok(Flow::Next)
            }
            Err(RuntimeError::Break(None)) => Ok(Flow::Break),
            Err(RuntimeError::Continue(None)) => Ok(Flow::Next),
            Err(RuntimeError::Break(Some(label))) if labels.contains(&label) => Ok(Flow::Break),
            Err(RuntimeError::Continue(Some(label))) if labels.contains(&label) => Ok(Flow::Next),
            Err(e) => Err(e),
        }
    }

    fn bind_loop_variable(
        &mut self,
        kind: Option<VarKind>,
        name: &str,
        value: Value,
        outer: &crate::env::ScopeRef,
    ) -> Result<(), RuntimeError> {
        match kind {
            Some(kind) if kind.is_lexical() => {
                let scope = Scope::block(outer);
                scope
                    .borrow_mut()
                    .declare(name, Some(value), kind == VarKind::Let);
                self.scope = scope;
                Ok(())
            }
            _ => self.assign_name(name, value),
        }
    }

    fn exec_switch(&mut self, discriminant: &Expr, cases: &[SwitchCase]) -> Completion {
        let value = self.eval_expr(discriminant)?;
        let scope = Scope::block(&self.scope);
        for case in cases {
            self.hoist_lexical(&case.body, &scope);
        }
        self.with_scope(scope, |this| {
            let mut start = None;
            for (i, case) in cases.iter().enumerate() {
                if let Some(test) = &case.test {
                    let candidate = this.eval_expr(test)?;
                    if value.strict_equals(&candidate) {
                        start = Some(i);
                        break;
                    }
                }
            }
            let Some(start) = start.or_else(|| cases.iter().position(|c| c.test.is_none())) else {
                return Ok(None);
            };
            let mut completion = None;
            for case in &cases[start..] {
                match this.exec_stmts(&case.body) {
                    Ok(Some(v)) => completion = Some(v),
                    Ok(None) => {}
                    Err(RuntimeError::Break(None)) => break,
                    Err(e) => return Err(e),
                }
            }
            Ok(completion)
        })
    }

    /// Keys visited by `for...in`: indices, then own properties, then
    /// inherited ones when `inherited` is set.
    pub(crate) fn enumerable_keys(&self, target: &Value, inherited: bool) -> Vec<String> {
        match target {
            Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
            Value::Object(obj) => {
                let mut keys = Vec::new();
                if let ObjectKind::Array(items) = &obj.borrow().kind {
                    keys.extend((0..items.len()).map(|i| i.to_string()));
                }
                let mut current = Some(obj.clone());
                while let Some(o) = current {
                    let o = o.borrow();
                    for key in o.props.keys() {
                        if !is_hidden_key(&o, key) && !keys.contains(key) {
                            keys.push(key.clone());
                        }
                    }
                    if !inherited {
                        break;
                    }
                    current = o.proto.clone();
                }
                keys
            }
            _ => Vec::new(),
        }
    }
}

/// Properties that exist but are not enumerable.
pub(crate) fn is_hidden_key(obj: &Object, key: &str) -> bool {
    match obj.kind {
        ObjectKind::Error => matches!(key, "message" | "stack" | "name" | "constructor"),
        ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_) => key == "prototype",
        _ => false,
    }
}

fn is_loop(stmt: &Stmt) -> bool {
    matches!(
        stmt.kind,
        StmtKind::While { .. }
            | StmtKind::DoWhile { .. }
            | StmtKind::For { .. }
            | StmtKind::ForOf { .. }
            | StmtKind::ForIn { .. }
    )
}

fn iterable_description(expr: &Expr, value: &Value) -> String {
    match &expr.kind {
        litmus_ast::expr::ExprKind::Ident(name) => name.clone(),
        _ => coerce::to_string(value),
    }
}
