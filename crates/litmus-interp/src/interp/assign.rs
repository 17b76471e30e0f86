// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Assignment and update expressions.

use litmus_ast::expr::{AssignOp, Expr, ExprKind, LogicalOp, UpdateOp};

use crate::coerce;
use crate::env::{self, AssignResult};

use super::{Interpreter, RuntimeError};
use crate::value::Value;

/// A resolved assignment target. The object and key of a member target
/// are evaluated once, before the right-hand side.
enum Place {
    Name(String),
    Property(Value, String),
}

impl Interpreter {
    fn resolve_place(&mut self, target: &Expr) -> Result<Place, RuntimeError> {
        match &target.kind {
            ExprKind::Ident(name) => Ok(Place::Name(name.clone())),
            ExprKind::Member { object, property, .. } => {
                let object = self.eval_expr(object)?;
                Ok(Place::Property(object, property.clone()))
            }
            ExprKind::Index { object, index, .. } => {
                let object = self.eval_expr(object)?;
                let key = self.eval_expr(index)?;
                let key = self.property_key(&key)?;
                Ok(Place::Property(object, key))
            }
            _ => Err(self.throw("SyntaxError", "Invalid left-hand side in assignment")),
        }
    }

    fn read_place(&mut self, place: &Place) -> Result<Value, RuntimeError> {
        match place {
            Place::Name(name) => self.lookup_name(name),
            Place::Property(object, key) => self.get_property(object, key),
        }
    }

    fn write_place(&mut self, place: &Place, value: Value) -> Result<(), RuntimeError> {
        match place {
            Place::Name(name) => self.assign_name(name, value),
            Place::Property(object, key) => self.set_property(object, key, value),
        }
    }

    pub(super) fn eval_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr) -> Result<Value, RuntimeError> {
        let place = self.resolve_place(target)?;
        let name_hint = match &place {
            Place::Name(name) => name.clone(),
            Place::Property(..) => String::new(),
        };
        let result = match op {
            AssignOp::Assign => self.eval_named(value, &name_hint)?,
            AssignOp::Compound(bin) => {
                let current = self.read_place(&place)?;
                let rhs = self.eval_expr(value)?;
                self.binary(bin, current, rhs)?
            }
            AssignOp::Logical(logical) => {
                let current = self.read_place(&place)?;
                let keep = match logical {
                    LogicalOp::And => !coerce::to_boolean(&current),
                    LogicalOp::Or => coerce::to_boolean(&current),
                    LogicalOp::Nullish => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                self.eval_named(value, &name_hint)?
            }
        };
        self.write_place(&place, result.clone())?;
        Ok(result)
    }

    pub(super) fn eval_update(&mut self, op: UpdateOp, prefix: bool, target: &Expr) -> Result<Value, RuntimeError> {
        let place = self.resolve_place(target)?;
        let current = self.read_place(&place)?;
        let old = self.to_number_value(&current)?;
        let new = match op {
            UpdateOp::Inc => old + 1.0,
            UpdateOp::Dec => old - 1.0,
        };
        self.write_place(&place, Value::Number(new))?;
        Ok(Value::Number(if prefix { new } else { old }))
    }

    /// Assign to a binding, creating a global for an undeclared name.
    pub(super) fn assign_name(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        match env::assign(&self.scope, name, value.clone()) {
            AssignResult::Assigned => Ok(()),
            AssignResult::Uninitialized => Err(self.reference_error(format!(
                "Cannot access '{}' before initialization",
                name
            ))),
            AssignResult::Constant => Err(self.type_error("Assignment to constant variable.")),
            AssignResult::Missing => {
                self.global.borrow_mut().declare(name, Some(value), true);
                Ok(())
            }
        }
    }
}
