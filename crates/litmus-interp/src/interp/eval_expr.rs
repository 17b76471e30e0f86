// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Expression evaluation.

use std::rc::Rc;

use indexmap::IndexMap;
use litmus_ast::expr::{Expr, ExprKind, FunctionDecl, LogicalOp, PropKey, UnaryOp};

use crate::coerce::{self, number_to_string};
use crate::env::{self, Lookup, Scope, ScopeKind};
use crate::sandbox::Capability;
use crate::value::{Closure, Object, ObjectKind, Value};

use super::exec_stmt::is_hidden_key;
use super::{Interpreter, RuntimeError};

impl Interpreter {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::string(s.as_str())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),

            ExprKind::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(e) = exprs.get(i) {
                        let value = self.eval_expr(e)?;
                        out.push_str(&self.to_string_value(&value)?);
                    }
                }
                Ok(Value::string(out))
            }

            ExprKind::Ident(name) => self.lookup_name(name),

            ExprKind::This => Ok(env::this_value(&self.scope)),

            ExprKind::Array(elements) => {
                let items = self.eval_list(elements)?;
                Ok(Value::array(items))
            }

            ExprKind::Object(props) => {
                let mut map = IndexMap::new();
                for prop in props {
                    match &prop.key {
                        PropKey::Named(key) => {
                            let value = match &prop.value.kind {
                                ExprKind::Function(decl) => self.make_closure(decl, key),
                                _ => self.eval_expr(&prop.value)?,
                            };
                            map.insert(key.clone(), value);
                        }
                        PropKey::Computed(key_expr) => {
                            let key = self.eval_expr(key_expr)?;
                            let key = self.property_key(&key)?;
                            let value = self.eval_named(&prop.value, &key)?;
                            map.insert(key, value);
                        }
                        PropKey::Spread => {
                            let source = self.eval_expr(&prop.value)?;
                            for (key, value) in self.own_entries(&source)? {
                                map.insert(key, value);
                            }
                        }
                    }
                }
                Ok(Value::plain_object(map))
            }

            ExprKind::Function(decl) => match &decl.name {
                Some(name) if !decl.is_arrow => {
                    // A named function expression sees its own name.
                    let scope = Scope::block(&self.scope);
                    let func = self.with_scope(scope.clone(), |this| this.make_closure(decl, name));
                    scope.borrow_mut().declare(name, Some(func.clone()), true);
                    Ok(func)
                }
                _ => Ok(self.make_closure(decl, decl.name.as_deref().unwrap_or(""))),
            },

            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand),

            ExprKind::Update { op, prefix, target } => self.eval_update(*op, *prefix, target),

            ExprKind::Binary { op, left, right } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                self.binary(*op, l, r)
            }

            ExprKind::Logical { op, left, right } => {
                let l = self.eval_expr(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !coerce::to_boolean(&l),
                    LogicalOp::Or => coerce::to_boolean(&l),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval_expr(right)
                }
            }

            ExprKind::Assign { op, target, value } => self.eval_assign(*op, target, value),

            ExprKind::Conditional { test, consequent, alternate } => {
                let cond = self.eval_expr(test)?;
                if coerce::to_boolean(&cond) {
                    self.eval_expr(consequent)
                } else {
                    self.eval_expr(alternate)
                }
            }

            ExprKind::Call { .. } | ExprKind::Member { .. } | ExprKind::Index { .. } => {
                Ok(self.eval_chain(expr)?.unwrap_or(Value::Undefined))
            }

            ExprKind::New { callee, args } => {
                let ctor = self.eval_expr(callee)?;
                let args = self.eval_list(args)?;
                self.construct(&ctor, args, &describe_expr(callee))
            }

            ExprKind::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for e in exprs {
                    last = self.eval_expr(e)?;
                }
                Ok(last)
            }

            ExprKind::Spread(_) => Err(self.throw("SyntaxError", "Unexpected token '...'")),
        }
    }

    /// Evaluate `expr`, naming it `name` if it is an anonymous function.
    pub(super) fn eval_named(&mut self, expr: &Expr, name: &str) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Function(decl) if decl.name.is_none() => Ok(self.make_closure(decl, name)),
            _ => self.eval_expr(expr),
        }
    }

    /// A function object closing over the current scope.
    pub(super) fn make_closure(&mut self, decl: &Rc<FunctionDecl>, name: &str) -> Value {
        let closure = Closure {
            decl: decl.clone(),
            env: self.scope.clone(),
            name: name.into(),
        };
        let mut obj = Object::new(ObjectKind::Function(Rc::new(closure)));
        if !decl.is_arrow {
            obj.props
                .insert("prototype".to_string(), Value::plain_object(IndexMap::new()));
        }
        Value::object(obj)
    }

    pub(super) fn lookup_name(&mut self, name: &str) -> Result<Value, RuntimeError> {
        match env::lookup(&self.scope, name) {
            Lookup::Found(value, ScopeKind::Realm) => {
                if name == "process" {
                    self.require(Capability::Process)?;
                }
                Ok(value)
            }
            Lookup::Found(value, _) => Ok(value),
            Lookup::Uninitialized => Err(self.reference_error(format!(
                "Cannot access '{}' before initialization",
                name
            ))),
            Lookup::Missing => Err(self.reference_error(format!("{} is not defined", name))),
        }
    }

    /// Evaluate array elements or call arguments, expanding spreads.
    pub(super) fn eval_list(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, RuntimeError> {
        let mut out = Vec::with_capacity(exprs.len());
        for e in exprs {
            match &e.kind {
                ExprKind::Spread(inner) => {
                    let value = self.eval_expr(inner)?;
                    match &value {
                        Value::String(s) => out.extend(s.chars().map(|c| Value::string(c.to_string()))),
                        Value::Object(obj) if value.is_array() => {
                            if let ObjectKind::Array(items) = &obj.borrow().kind {
                                out.extend(items.iter().cloned());
                            }
                        }
                        _ => {
                            return Err(self.type_error(format!(
                                "{} is not iterable",
                                describe_expr(inner)
                            )))
                        }
                    }
                }
                _ => out.push(self.eval_expr(e)?),
            }
        }
        Ok(out)
    }

    /// Evaluate a member/call chain. `None` means an optional link
    /// short-circuited the rest of the chain.
    fn eval_chain(&mut self, expr: &Expr) -> Result<Option<Value>, RuntimeError> {
        match &expr.kind {
            ExprKind::Member { object, property, optional } => {
                let Some(target) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                self.get_property(&target, property).map(Some)
            }
            ExprKind::Index { object, index, optional } => {
                let Some(target) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval_expr(index)?;
                self.get_computed(&target, &key).map(Some)
            }
            ExprKind::Call { callee, args, optional } => {
                let Some((func, this)) = self.eval_callee(callee)? else {
                    return Ok(None);
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_list(args)?;
                if !func.is_callable() {
                    return Err(self.type_error(format!("{} is not a function", describe_expr(callee))));
                }
                self.call_function(&func, this, args).map(Some)
            }
            _ => self.eval_expr(expr).map(Some),
        }
    }

    /// The function and receiver of a call expression.
    fn eval_callee(&mut self, callee: &Expr) -> Result<Option<(Value, Value)>, RuntimeError> {
        match &callee.kind {
            ExprKind::Member { object, property, optional } => {
                let Some(target) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let func = self.get_property(&target, property)?;
                Ok(Some((func, target)))
            }
            ExprKind::Index { object, index, optional } => {
                let Some(target) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval_expr(index)?;
                let func = self.get_computed(&target, &key)?;
                Ok(Some((func, target)))
            }
            _ => Ok(self.eval_chain(callee)?.map(|f| (f, Value::Undefined))),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<Value, RuntimeError> {
        match op {
            UnaryOp::Typeof => {
                if let ExprKind::Ident(name) = &operand.kind {
                    // An undeclared name is not an error under `typeof`.
                    return match env::lookup(&self.scope, name) {
                        Lookup::Found(value, _) => Ok(Value::string(value.type_of())),
                        Lookup::Missing => Ok(Value::string("undefined")),
                        Lookup::Uninitialized => Err(self.reference_error(format!(
                            "Cannot access '{}' before initialization",
                            name
                        ))),
                    };
                }
                let value = self.eval_expr(operand)?;
                Ok(Value::string(value.type_of()))
            }
            UnaryOp::Delete => match &operand.kind {
                ExprKind::Member { object, property, .. } => {
                    let target = self.eval_expr(object)?;
                    self.delete_property(&target, property)
                }
                ExprKind::Index { object, index, .. } => {
                    let target = self.eval_expr(object)?;
                    let key = self.eval_expr(index)?;
                    let key = self.property_key(&key)?;
                    self.delete_property(&target, &key)
                }
                ExprKind::Ident(_) => Ok(Value::Bool(false)),
                _ => {
                    self.eval_expr(operand)?;
                    Ok(Value::Bool(true))
                }
            },
            _ => {
                let value = self.eval_expr(operand)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-self.to_number_value(&value)?),
                    UnaryOp::Plus => Value::Number(self.to_number_value(&value)?),
                    UnaryOp::Not => Value::Bool(!coerce::to_boolean(&value)),
                    UnaryOp::BitNot => {
                        let n = self.to_number_value(&value)?;
                        Value::Number(!coerce::to_int32(&Value::Number(n)) as f64)
                    }
                    UnaryOp::Void => Value::Undefined,
                    UnaryOp::Typeof | UnaryOp::Delete => Value::Undefined,
                })
            }
        }
    }

    /// Keys and values copied by object spread and `Object.assign`.
    pub(crate) fn own_entries(&mut self, source: &Value) -> Result<Vec<(String, Value)>, RuntimeError> {
        let mut out = Vec::new();
        for key in self.enumerable_keys(source, false) {
            let value = self.get_property(source, &key)?;
            out.push((key, value));
        }
        Ok(out)
    }

    /// Own enumerable property names, as `Object.keys` reports them.
    pub(crate) fn own_keys(&self, obj: &Object) -> Vec<String> {
        obj.props
            .keys()
            .filter(|k| !is_hidden_key(obj, k))
            .cloned()
            .collect()
    }
}

/// Source-like rendering of an expression for error messages.
pub(crate) fn describe_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::This => "this".to_string(),
        ExprKind::Number(n) => number_to_string(*n),
        ExprKind::String(s) => format!("\"{}\"", s),
        ExprKind::Member { object, property, optional } => format!(
            "{}{}{}",
            describe_expr(object),
            if *optional { "?." } else { "." },
            property
        ),
        ExprKind::Index { object, .. } => format!("{}[...]", describe_expr(object)),
        ExprKind::Call { callee, .. } => format!("{}(...)", describe_expr(callee)),
        _ => "(intermediate value)".to_string(),
    }
}
