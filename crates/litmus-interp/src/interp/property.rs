// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Property access.
//!
//! Arrays keep their elements in a vector, so index and `length` access is
//! answered from the kind before the property map is consulted. Builtin
//! methods are found last, after own and inherited properties, so scripts
//! can shadow them.

use crate::builtins;
use crate::coerce;
use crate::value::{Object, ObjectKind, ObjectRef, Value};

use super::{Interpreter, RuntimeError};

/// Largest length an array may grow to through index or `length` writes.
const MAX_ARRAY_GROWTH: usize = 10_000_000;

/// Parse a canonical array index (`"0"`, `"17"`, not `"01"` or `"-1"`).
pub(crate) fn array_index(key: &str) -> Option<usize> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    let n: u64 = key.parse().ok()?;
    if n < u32::MAX as u64 {
        usize::try_from(n).ok()
    } else {
        None
    }
}

impl Interpreter {
    /// Convert a computed key to the string it names.
    pub(crate) fn property_key(&mut self, key: &Value) -> Result<String, RuntimeError> {
        self.to_string_value(key)
    }

    pub(crate) fn get_property(&mut self, target: &Value, key: &str) -> Result<Value, RuntimeError> {
        match target {
            Value::Undefined | Value::Null => Err(self.type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                coerce::to_string(target),
                key
            ))),
            Value::Bool(_) => Ok(self.primitive_member("boolean", key)),
            Value::Number(_) => Ok(self.primitive_member("number", key)),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(i) = array_index(key) {
                    return Ok(s
                        .chars()
                        .nth(i)
                        .map(|c| Value::string(c.to_string()))
                        .unwrap_or(Value::Undefined));
                }
                Ok(self.primitive_member("string", key))
            }
            Value::Object(obj) => {
                if let Some(value) = self.intrinsic_property(obj, key) {
                    return Ok(value);
                }
                if let Some(value) = Object::lookup(obj, key) {
                    return Ok(value);
                }
                Ok(self.builtin_method(obj, key).unwrap_or(Value::Undefined))
            }
        }
    }

    /// `target[key]` with the key not yet converted.
    pub(crate) fn get_computed(&mut self, target: &Value, key: &Value) -> Result<Value, RuntimeError> {
        if let (Value::Object(obj), Value::Number(n)) = (target, key) {
            if let ObjectKind::Array(items) = &obj.borrow().kind {
                if n.fract() == 0.0 && *n >= 0.0 && *n < items.len() as f64 {
                    return Ok(items[*n as usize].clone());
                }
            }
        }
        let key = self.property_key(key)?;
        self.get_property(target, &key)
    }

    pub(crate) fn set_property(&mut self, target: &Value, key: &str, value: Value) -> Result<(), RuntimeError> {
        let obj = match target {
            Value::Undefined | Value::Null => {
                return Err(self.type_error(format!(
                    "Cannot set properties of {} (setting '{}')",
                    coerce::to_string(target),
                    key
                )))
            }
            Value::Object(obj) => obj,
            // Writes to primitives are dropped.
            _ => return Ok(()),
        };
        if obj.borrow().frozen {
            return Ok(());
        }
        let len = match &obj.borrow().kind {
            ObjectKind::Array(items) => Some(items.len()),
            _ => None,
        };
        if let Some(len) = len {
            if key == "length" {
                let n = self.to_number_value(&value)?;
                if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
                    return Err(self.range_error("Invalid array length"));
                }
                return self.resize_array(obj, n as usize, len);
            }
            if let Some(i) = array_index(key) {
                if i >= len {
                    self.resize_array(obj, i + 1, len)?;
                }
                if let ObjectKind::Array(items) = &mut obj.borrow_mut().kind {
                    items[i] = value;
                }
                return Ok(());
            }
        }
        obj.borrow_mut().props.insert(key.to_string(), value);
        Ok(())
    }

    /// The `delete` operator.
    pub(crate) fn delete_property(&mut self, target: &Value, key: &str) -> Result<Value, RuntimeError> {
        let obj = match target {
            Value::Undefined | Value::Null => {
                return Err(self.type_error("Cannot convert undefined or null to object"))
            }
            Value::Object(obj) => obj,
            _ => return Ok(Value::Bool(true)),
        };
        let mut o = obj.borrow_mut();
        if o.frozen {
            return Ok(Value::Bool(false));
        }
        if let ObjectKind::Array(items) = &mut o.kind {
            if key == "length" {
                return Ok(Value::Bool(false));
            }
            if let Some(i) = array_index(key) {
                if let Some(slot) = items.get_mut(i) {
                    *slot = Value::Undefined;
                }
                return Ok(Value::Bool(true));
            }
        }
        o.props.shift_remove(key);
        Ok(Value::Bool(true))
    }

    /// The `in` operator on an object.
    pub(crate) fn has_property(&mut self, target: &Value, key: &str) -> bool {
        let Value::Object(obj) = target else {
            return false;
        };
        self.intrinsic_property(obj, key).is_some()
            || Object::lookup(obj, key).is_some()
            || self.builtin_method(obj, key).is_some()
    }

    /// Properties computed from an object's kind rather than stored.
    fn intrinsic_property(&self, obj: &ObjectRef, key: &str) -> Option<Value> {
        let o = obj.borrow();
        match &o.kind {
            ObjectKind::Array(items) => {
                if key == "length" {
                    return Some(Value::Number(items.len() as f64));
                }
                array_index(key).and_then(|i| items.get(i).cloned())
            }
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_)
                if !o.props.contains_key(key) =>
            {
                match key {
                    "name" => o.function_name().map(Value::String),
                    "length" => Some(Value::Number(function_length(&o) as f64)),
                    _ => None,
                }
            }
            ObjectKind::Error if key == "stack" && !o.props.contains_key(key) => {
                Some(Value::string(format!(
                    "{}\n    at <anonymous>",
                    coerce::error_summary(obj)
                )))
            }
            _ => None,
        }
    }

    fn builtin_method(&mut self, obj: &ObjectRef, key: &str) -> Option<Value> {
        let kind = match &obj.borrow().kind {
            ObjectKind::Array(_) => Some("array"),
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_) => Some("function"),
            ObjectKind::Date(_) => Some("date"),
            ObjectKind::Error => Some("error"),
            ObjectKind::Ordinary => None,
        };
        let name = kind
            .and_then(|kind| builtins::method(kind, key))
            .or_else(|| builtins::method("object", key))?;
        Some(self.native(name))
    }

    fn primitive_member(&mut self, kind: &str, key: &str) -> Value {
        match builtins::method(kind, key).or_else(|| builtins::method("object", key)) {
            Some(name) => self.native(name),
            None => Value::Undefined,
        }
    }

    fn resize_array(&mut self, obj: &ObjectRef, new_len: usize, old_len: usize) -> Result<(), RuntimeError> {
        if new_len > old_len {
            let growth = new_len - old_len;
            if growth > MAX_ARRAY_GROWTH {
                return Err(self.range_error("Invalid array length"));
            }
            self.charge(growth as u64)?;
        }
        if let ObjectKind::Array(items) = &mut obj.borrow_mut().kind {
            items.resize(new_len, Value::Undefined);
        }
        Ok(())
    }
}

/// The `length` of a function: parameters before the first default.
fn function_length(obj: &Object) -> usize {
    match &obj.kind {
        ObjectKind::Function(c) => c
            .decl
            .params
            .iter()
            .take_while(|p| p.default.is_none())
            .count(),
        ObjectKind::Bound(b) => {
            let target = b
                .target
                .as_object()
                .map(|t| function_length(&t.borrow()))
                .unwrap_or(0);
            target.saturating_sub(b.args.len())
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_indexes_only() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("42"), Some(42));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("1.5"), None);
        assert_eq!(array_index(""), None);
        assert_eq!(array_index("length"), None);
        assert_eq!(array_index("4294967295"), None);
    }
}
