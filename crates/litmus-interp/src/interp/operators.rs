// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Binary operators and the conversions they apply.

use std::cmp::Ordering;
use std::rc::Rc;

use litmus_ast::expr::BinOp;

use crate::coerce::{self, Hint};
use crate::value::{Object, ObjectKind, Value};

use super::{Interpreter, RuntimeError};

/// Longest string a concatenation may produce.
pub(crate) const MAX_STRING_LENGTH: usize = 1 << 28;

impl Interpreter {
    pub(crate) fn binary(&mut self, op: BinOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
        match op {
            BinOp::Add => {
                let l = self.to_primitive(&left, Hint::Default)?;
                let r = self.to_primitive(&right, Hint::Default)?;
                if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                    let l = coerce::to_string(&l);
                    let r = coerce::to_string(&r);
                    if l.len() + r.len() > MAX_STRING_LENGTH {
                        return Err(self.range_error("Invalid string length"));
                    }
                    let mut s = String::with_capacity(l.len() + r.len());
                    s.push_str(&l);
                    s.push_str(&r);
                    Ok(Value::string(s))
                } else {
                    Ok(Value::Number(coerce::to_number(&l) + coerce::to_number(&r)))
                }
            }
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow => {
                let a = self.to_number_value(&left)?;
                let b = self.to_number_value(&right)?;
                Ok(Value::Number(arithmetic(op, a, b)))
            }
            BinOp::Eq => Ok(Value::Bool(self.loose_equals(&left, &right)?)),
            BinOp::Ne => Ok(Value::Bool(!self.loose_equals(&left, &right)?)),
            BinOp::StrictEq => Ok(Value::Bool(left.strict_equals(&right))),
            BinOp::StrictNe => Ok(Value::Bool(!left.strict_equals(&right))),
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let l = self.to_primitive(&left, Hint::Number)?;
                let r = self.to_primitive(&right, Hint::Number)?;
                let result = match coerce::compare(&l, &r) {
                    None => false,
                    Some(ord) => match op {
                        BinOp::Lt => ord == Ordering::Less,
                        BinOp::Gt => ord == Ordering::Greater,
                        BinOp::Le => ord != Ordering::Greater,
                        _ => ord != Ordering::Less,
                    },
                };
                Ok(Value::Bool(result))
            }
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr | BinOp::UShr => {
                let a = Value::Number(self.to_number_value(&left)?);
                let b = Value::Number(self.to_number_value(&right)?);
                let shift = coerce::to_uint32(&b) & 31;
                let result = match op {
                    BinOp::BitAnd => (coerce::to_int32(&a) & coerce::to_int32(&b)) as f64,
                    BinOp::BitOr => (coerce::to_int32(&a) | coerce::to_int32(&b)) as f64,
                    BinOp::BitXor => (coerce::to_int32(&a) ^ coerce::to_int32(&b)) as f64,
                    BinOp::Shl => coerce::to_int32(&a).wrapping_shl(shift) as f64,
                    BinOp::Shr => (coerce::to_int32(&a) >> shift) as f64,
                    _ => (coerce::to_uint32(&a) >> shift) as f64,
                };
                Ok(Value::Number(result))
            }
            BinOp::In => {
                let key = self.property_key(&left)?;
                match &right {
                    Value::Object(_) => Ok(Value::Bool(self.has_property(&right, &key))),
                    _ => Err(self.type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key,
                        coerce::to_string(&right)
                    ))),
                }
            }
            BinOp::InstanceOf => Ok(Value::Bool(self.instance_of(&left, &right)?)),
        }
    }

    /// ToPrimitive, consulting user-defined `valueOf`/`toString` first.
    pub(crate) fn to_primitive(&mut self, v: &Value, hint: Hint) -> Result<Value, RuntimeError> {
        let Value::Object(obj) = v else {
            return Ok(v.clone());
        };
        if !matches!(obj.borrow().kind, ObjectKind::Date(_)) {
            let order = match hint {
                Hint::String => ["toString", "valueOf"],
                _ => ["valueOf", "toString"],
            };
            for key in order {
                let Some(method) = Object::lookup(obj, key) else {
                    continue;
                };
                if !method.is_callable() {
                    continue;
                }
                let result = self.call_function(&method, v.clone(), Vec::new())?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Ok(coerce::to_primitive(v, hint))
    }

    pub(crate) fn to_number_value(&mut self, v: &Value) -> Result<f64, RuntimeError> {
        match v {
            Value::Object(_) => Ok(coerce::to_number(&self.to_primitive(v, Hint::Number)?)),
            _ => Ok(coerce::to_number(v)),
        }
    }

    pub(crate) fn to_string_value(&mut self, v: &Value) -> Result<String, RuntimeError> {
        match v {
            Value::Object(_) => Ok(coerce::to_string(&self.to_primitive(v, Hint::String)?)),
            _ => Ok(coerce::to_string(v)),
        }
    }

    /// `==`, with user-defined conversions on the object side.
    pub(crate) fn loose_equals(&mut self, a: &Value, b: &Value) -> Result<bool, RuntimeError> {
        match (a, b) {
            (Value::Object(_), Value::Object(_)) => Ok(a.strict_equals(b)),
            (Value::Object(_), other) if !other.is_nullish() => {
                let prim = self.to_primitive(a, Hint::Default)?;
                Ok(coerce::loose_equals(&prim, other))
            }
            (other, Value::Object(_)) if !other.is_nullish() => {
                let prim = self.to_primitive(b, Hint::Default)?;
                Ok(coerce::loose_equals(other, &prim))
            }
            _ => Ok(coerce::loose_equals(a, b)),
        }
    }

    pub(crate) fn instance_of(&mut self, value: &Value, ctor: &Value) -> Result<bool, RuntimeError> {
        let Value::Object(ctor_obj) = ctor else {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        };
        let native = match &ctor_obj.borrow().kind {
            ObjectKind::Native(n) => Some(n.name),
            ObjectKind::Function(_) | ObjectKind::Bound(_) => None,
            _ => return Err(self.type_error("Right-hand side of 'instanceof' is not callable")),
        };
        // Arrays, functions and dates carry no prototype object of their own.
        match native {
            Some("Array") => return Ok(value.is_array()),
            Some("Object") => return Ok(matches!(value, Value::Object(_))),
            Some("Function") => return Ok(value.is_callable()),
            Some("Date") => {
                return Ok(value
                    .as_object()
                    .is_some_and(|o| matches!(o.borrow().kind, ObjectKind::Date(_))))
            }
            _ => {}
        }
        let Value::Object(obj) = value else {
            return Ok(false);
        };
        let Value::Object(proto) = self.get_property(ctor, "prototype")? else {
            return Ok(false);
        };
        let mut current = obj.borrow().proto.clone();
        while let Some(p) = current {
            if Rc::ptr_eq(&p, &proto) {
                return Ok(true);
            }
            current = p.borrow().proto.clone();
        }
        Ok(false)
    }
}

fn arithmetic(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        BinOp::Pow => {
            // IEEE pow treats these as 1; the language says NaN.
            if b.is_nan() || (a.abs() == 1.0 && b.is_infinite()) {
                f64::NAN
            } else {
                a.powf(b)
            }
        }
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_edge_cases() {
        assert_eq!(arithmetic(BinOp::Mod, -7.0, 3.0), -1.0);
        assert!(arithmetic(BinOp::Pow, 1.0, f64::NAN).is_nan());
        assert!(arithmetic(BinOp::Pow, -1.0, f64::INFINITY).is_nan());
        assert_eq!(arithmetic(BinOp::Pow, 2.0, 10.0), 1024.0);
        assert_eq!(arithmetic(BinOp::Div, 1.0, 0.0), f64::INFINITY);
    }
}
