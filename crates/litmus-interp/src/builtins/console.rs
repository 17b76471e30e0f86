// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `console` and `assert`.
//!
//! Output methods all land in the same captured stream; there is no
//! separate stderr. `assert` throws, `console.assert` only records.

use std::rc::Rc;

use tracing::debug;

use crate::coerce;
use crate::format;
use crate::interp::{Interpreter, RuntimeError};
use crate::sandbox::Capability;
use crate::value::{ObjectKind, Value};

use super::arg;

pub(super) const CONSOLE: &[&str] = &[
    "console.log",
    "console.info",
    "console.warn",
    "console.error",
    "console.debug",
    "console.assert",
];

pub(super) const ASSERT: &[&str] = &[
    "assert.ok",
    "assert.equal",
    "assert.notEqual",
    "assert.strictEqual",
    "assert.notStrictEqual",
    "assert.deepEqual",
    "assert.deepStrictEqual",
    "assert.throws",
    "assert.fail",
];

impl Interpreter {
    pub(crate) fn call_console_method(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match method {
            "assert" => {
                self.require(Capability::Assert)?;
                if coerce::to_boolean(&arg(&args, 0)) {
                    return Ok(Value::Undefined);
                }
                let message = if args.len() > 1 {
                    format!("Assertion failed: {}", format::format_log(&args[1..]))
                } else {
                    "Assertion failed".to_string()
                };
                debug!(%message, "soft assertion failed");
                self.soft_failures.push(message.clone());
                self.output.push(message)?;
                Ok(Value::Undefined)
            }
            _ => {
                self.print_line(format::format_log(&args))?;
                Ok(Value::Undefined)
            }
        }
    }

    /// `assert(...)` itself (empty `method`) and the `assert.*` functions.
    pub(crate) fn call_assert(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.require(Capability::Assert)?;
        let actual = arg(&args, 0);
        let expected = arg(&args, 1);
        match method {
            "" | "ok" => {
                if coerce::to_boolean(&actual) {
                    return Ok(Value::Undefined);
                }
                let message = arg(&args, 1);
                if args.is_empty() {
                    return Err(self.assertion_error(
                        "No value argument passed to `assert.ok()`",
                        &message,
                    ));
                }
                Err(self.assertion_error("The expression evaluated to a falsy value", &message))
            }
            "equal" | "notEqual" => {
                let equal = self.loose_equals(&actual, &expected)?;
                if equal == (method == "equal") {
                    return Ok(Value::Undefined);
                }
                let op = if method == "equal" { "==" } else { "!=" };
                let default = format!("{} {} {}", format::inspect(&actual), op, format::inspect(&expected));
                Err(self.assertion_error(&default, &arg(&args, 2)))
            }
            "strictEqual" => {
                if same_value(&actual, &expected) {
                    return Ok(Value::Undefined);
                }
                let default = format!(
                    "Expected values to be strictly equal:\n\n{} !== {}\n",
                    format::inspect(&actual),
                    format::inspect(&expected)
                );
                Err(self.assertion_error(&default, &arg(&args, 2)))
            }
            "notStrictEqual" => {
                if !same_value(&actual, &expected) {
                    return Ok(Value::Undefined);
                }
                let default = format!(
                    "Expected \"actual\" to be strictly unequal to: {}",
                    format::inspect(&expected)
                );
                Err(self.assertion_error(&default, &arg(&args, 2)))
            }
            "deepEqual" | "deepStrictEqual" => {
                let strict = method == "deepStrictEqual";
                if deep_equal(&actual, &expected, strict, &mut Vec::new()) {
                    return Ok(Value::Undefined);
                }
                let default = format!(
                    "Expected values to be {}deep-equal:\n\n{}\n\nshould equal\n\n{}",
                    if strict { "strictly " } else { "loosely " },
                    format::inspect(&actual),
                    format::inspect(&expected)
                );
                Err(self.assertion_error(&default, &arg(&args, 2)))
            }
            "throws" => {
                self.expect_callable(&actual)?;
                match self.call_function(&actual, Value::Undefined, Vec::new()) {
                    Ok(_) => {
                        let message = match &expected {
                            Value::String(_) => expected.clone(),
                            _ => arg(&args, 2),
                        };
                        Err(self.assertion_error("Missing expected exception.", &message))
                    }
                    Err(RuntimeError::Throw(thrown)) => {
                        if expected.is_callable() && !self.instance_of(&thrown, &expected)? {
                            return Err(RuntimeError::Throw(thrown));
                        }
                        Ok(Value::Undefined)
                    }
                    Err(other) => Err(other),
                }
            }
            "fail" => Err(self.assertion_error("Failed", &actual)),
            _ => Ok(Value::Undefined),
        }
    }

    /// An `AssertionError`, or `message` itself when it is an error object.
    fn assertion_error(&self, default: &str, message: &Value) -> RuntimeError {
        match message {
            Value::Undefined => RuntimeError::Throw(self.make_error("AssertionError", default)),
            Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Error) => {
                RuntimeError::Throw(message.clone())
            }
            _ => RuntimeError::Throw(self.make_error("AssertionError", &coerce::to_string(message))),
        }
    }
}

/// `Object.is`: `NaN` equals itself and `0` differs from `-0`.
pub(super) fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
        }
        _ => a.strict_equals(b),
    }
}

/// Structural equality for `assert.deepEqual` / `assert.deepStrictEqual`.
/// `seen` holds the object pairs already under comparison.
fn deep_equal(a: &Value, b: &Value, strict: bool, seen: &mut Vec<(usize, usize)>) -> bool {
    let (Value::Object(x), Value::Object(y)) = (a, b) else {
        return if strict {
            same_value(a, b)
        } else {
            coerce::loose_equals(a, b)
        };
    };
    if Rc::ptr_eq(x, y) {
        return true;
    }
    let pair = (Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize);
    if seen.contains(&pair) {
        return true;
    }
    seen.push(pair);
    let (xo, yo) = (x.borrow(), y.borrow());
    if strict {
        let same_proto = match (&xo.proto, &yo.proto) {
            (Some(p), Some(q)) => Rc::ptr_eq(p, q),
            (None, None) => true,
            _ => false,
        };
        if !same_proto {
            return false;
        }
    }
    let kinds_match = match (&xo.kind, &yo.kind) {
        (ObjectKind::Array(ia), ObjectKind::Array(ib)) => {
            ia.len() == ib.len()
                && ia.iter().zip(ib).all(|(p, q)| deep_equal(p, q, strict, seen))
        }
        (ObjectKind::Date(ta), ObjectKind::Date(tb)) => ta == tb || (ta.is_nan() && tb.is_nan()),
        (ObjectKind::Ordinary, ObjectKind::Ordinary) | (ObjectKind::Error, ObjectKind::Error) => true,
        (ObjectKind::Array(_), _) | (_, ObjectKind::Array(_)) => false,
        _ if xo.is_callable() || yo.is_callable() => false,
        _ => !strict,
    };
    if !kinds_match {
        return false;
    }
    if matches!(xo.kind, ObjectKind::Error)
        && (xo.props.get("message").map(coerce::to_string) != yo.props.get("message").map(coerce::to_string))
    {
        return false;
    }
    let keys_a: Vec<&String> = xo.props.keys().filter(|k| k.as_str() != "message").collect();
    let keys_b: Vec<&String> = yo.props.keys().filter(|k| k.as_str() != "message").collect();
    if keys_a.len() != keys_b.len() {
        return false;
    }
    keys_a.iter().all(|key| match (xo.props.get(*key), yo.props.get(*key)) {
        (Some(p), Some(q)) => deep_equal(p, q, strict, seen),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn obj(entries: &[(&str, Value)]) -> Value {
        let mut map = IndexMap::new();
        for (k, v) in entries {
            map.insert(k.to_string(), v.clone());
        }
        Value::plain_object(map)
    }

    #[test]
    fn same_value_distinguishes_signed_zero() {
        assert!(same_value(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(!same_value(&Value::Number(0.0), &Value::Number(-0.0)));
        assert!(same_value(&Value::Number(1.0), &Value::Number(1.0)));
    }

    #[test]
    fn deep_equality_of_nested_structures() {
        let a = obj(&[("x", Value::array(vec![Value::Number(1.0), Value::string("two")]))]);
        let b = obj(&[("x", Value::array(vec![Value::Number(1.0), Value::string("two")]))]);
        let c = obj(&[("x", Value::array(vec![Value::Number(1.0)]))]);
        assert!(deep_equal(&a, &b, true, &mut Vec::new()));
        assert!(!deep_equal(&a, &c, true, &mut Vec::new()));
    }

    #[test]
    fn loose_deep_equality_coerces_leaves() {
        let a = obj(&[("n", Value::Number(1.0))]);
        let b = obj(&[("n", Value::string("1"))]);
        assert!(deep_equal(&a, &b, false, &mut Vec::new()));
        assert!(!deep_equal(&a, &b, true, &mut Vec::new()));
    }
}
