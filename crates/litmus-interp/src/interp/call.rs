// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Function calls and construction.

use std::rc::Rc;

use litmus_ast::expr::FunctionBody;

use crate::builtins;
use crate::coerce;
use crate::env::{Scope, ScopeKind};
use crate::value::{Closure, NativeFunction, Object, ObjectKind, Value};

use super::{Interpreter, RuntimeError};

impl Interpreter {
    pub(crate) fn call_function(&mut self, func: &Value, this: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        enum Target {
            Closure(Rc<Closure>),
            Native(NativeFunction),
            Bound(Value, Value, Vec<Value>),
        }
        let target = match func {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Function(c) => Some(Target::Closure(c.clone())),
                ObjectKind::Native(n) => Some(Target::Native(*n)),
                ObjectKind::Bound(b) => Some(Target::Bound(
                    b.target.clone(),
                    b.this.clone(),
                    b.args.clone(),
                )),
                _ => None,
            },
            _ => None,
        };
        match target {
            Some(Target::Closure(closure)) => self.call_closure(&closure, this, args),
            Some(Target::Native(native)) => {
                self.tick()?;
                builtins::call_native(self, native, this, args)
            }
            Some(Target::Bound(target, bound_this, mut bound_args)) => {
                bound_args.extend(args);
                self.call_function(&target, bound_this, bound_args)
            }
            None => Err(self.type_error(format!("{} is not a function", coerce::to_string(func)))),
        }
    }

    fn call_closure(&mut self, closure: &Closure, this: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if self.call_depth >= self.config.max_call_depth {
            return Err(self.range_error("Maximum call stack size exceeded"));
        }
        self.tick()?;
        self.call_depth += 1;
        let result = self.run_closure(closure, this, args);
        self.call_depth -= 1;
        result
    }

    fn run_closure(&mut self, closure: &Closure, this: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let decl = &closure.decl;
        let receiver = if decl.is_arrow { None } else { Some(this) };
        let scope = Scope::new(ScopeKind::Function, Some(closure.env.clone()), receiver);
        {
            let mut s = scope.borrow_mut();
            if !decl.is_arrow {
                s.declare("arguments", Some(Value::array(args.clone())), true);
            }
            for param in &decl.params {
                s.declare(&param.name, Some(Value::Undefined), true);
            }
            if let Some(rest) = &decl.rest {
                let extra = args.iter().skip(decl.params.len()).cloned().collect();
                s.declare(rest, Some(Value::array(extra)), true);
            }
        }

        self.with_scope(scope.clone(), |this| {
            for (i, param) in decl.params.iter().enumerate() {
                let arg = args.get(i).cloned().unwrap_or(Value::Undefined);
                let value = match (&param.default, arg) {
                    (Some(default), Value::Undefined) => this.eval_named(default, &param.name)?,
                    (_, arg) => arg,
                };
                scope.borrow_mut().declare(&param.name, Some(value), true);
            }

            match &decl.body {
                FunctionBody::Expr(expr) => this.eval_expr(expr),
                FunctionBody::Block(body) => {
                    this.hoist_declarations(body, &scope, true);
                    match this.exec_stmts(body) {
                        Ok(_) => Ok(Value::Undefined),
                        Err(RuntimeError::Return(value)) => Ok(value),
                        Err(err) => Err(err),
                    }
                }
            }
        })
    }

    /// The `new` operator. `desc` names the callee in error messages.
    pub(crate) fn construct(&mut self, callee: &Value, args: Vec<Value>, desc: &str) -> Result<Value, RuntimeError> {
        enum Target {
            Closure(Rc<Closure>),
            Native(NativeFunction),
            Bound(Value, Vec<Value>),
        }
        let target = match callee {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Function(c) if !c.decl.is_arrow => Some(Target::Closure(c.clone())),
                ObjectKind::Native(n) if n.constructor => Some(Target::Native(*n)),
                ObjectKind::Bound(b) => Some(Target::Bound(b.target.clone(), b.args.clone())),
                _ => None,
            },
            _ => None,
        };
        match target {
            Some(Target::Closure(closure)) => {
                let mut obj = Object::new(ObjectKind::Ordinary);
                if let Value::Object(proto) = self.get_property(callee, "prototype")? {
                    obj.proto = Some(proto);
                }
                let instance = Value::object(obj);
                let result = self.call_closure(&closure, instance.clone(), args)?;
                Ok(match result {
                    Value::Object(_) => result,
                    _ => instance,
                })
            }
            Some(Target::Native(native)) => {
                self.tick()?;
                builtins::construct_native(self, native, args)
            }
            Some(Target::Bound(target, mut bound_args)) => {
                bound_args.extend(args);
                self.construct(&target, bound_args, desc)
            }
            None => Err(self.type_error(format!("{} is not a constructor", desc))),
        }
    }
}
