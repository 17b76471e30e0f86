// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The `JSON` namespace, on top of `serde_json`.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::coerce::{self, number_to_string};
use crate::interp::{Interpreter, RuntimeError};
use crate::value::{ObjectKind, ObjectRef, Value};

use super::arg;

pub(super) const STATICS: &[&str] = &["JSON.stringify", "JSON.parse"];

/// State of one `JSON.stringify` call.
struct Stringify {
    replacer: Option<Value>,
    allow: Option<Vec<String>>,
    gap: String,
    indent: String,
    stack: Vec<ObjectRef>,
}

impl Interpreter {
    /// Handle `JSON.*` calls.
    pub(crate) fn call_json_method(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match method {
            "stringify" => self.json_stringify(arg(&args, 0), arg(&args, 1), arg(&args, 2)),
            "parse" => {
                let text = self.to_string_value(&arg(&args, 0))?;
                let parsed: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| self.throw("SyntaxError", format!("{} in JSON", e)))?;
                let value = from_json(parsed);
                let reviver = arg(&args, 1);
                if reviver.is_callable() {
                    let mut root = IndexMap::new();
                    root.insert(String::new(), value);
                    let holder = Value::plain_object(root);
                    self.revive(&holder, "", &reviver)
                } else {
                    Ok(value)
                }
            }
            _ => Ok(Value::Undefined),
        }
    }

    fn json_stringify(&mut self, value: Value, replacer: Value, space: Value) -> Result<Value, RuntimeError> {
        let (replacer, allow) = if replacer.is_callable() {
            (Some(replacer), None)
        } else if let Some(items) = Self::array_items(&replacer) {
            let mut keys = Vec::new();
            for item in items {
                if matches!(item, Value::String(_) | Value::Number(_)) {
                    keys.push(coerce::to_string(&item));
                }
            }
            (None, Some(keys))
        } else {
            (None, None)
        };
        let gap = match &space {
            Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
            Value::String(s) => s.chars().take(10).collect(),
            _ => String::new(),
        };
        let mut state = Stringify {
            replacer,
            allow,
            gap,
            indent: String::new(),
            stack: Vec::new(),
        };
        let mut root = IndexMap::new();
        root.insert(String::new(), value.clone());
        let holder = Value::plain_object(root);
        match self.serialize(&mut state, &holder, "", value)? {
            Some(text) => Ok(Value::string(text)),
            None => Ok(Value::Undefined),
        }
    }

    /// Serialize one property; `None` means the value is skipped (functions,
    /// `undefined`).
    fn serialize(
        &mut self,
        state: &mut Stringify,
        holder: &Value,
        key: &str,
        mut value: Value,
    ) -> Result<Option<String>, RuntimeError> {
        self.tick()?;
        if let Value::Object(_) = &value {
            let to_json = self.get_property(&value, "toJSON")?;
            if to_json.is_callable() {
                value = self.call_function(&to_json, value, vec![Value::string(key)])?;
            }
        }
        if let Some(replacer) = state.replacer.clone() {
            value = self.call_function(&replacer, holder.clone(), vec![Value::string(key), value])?;
        }
        let obj = match &value {
            Value::Undefined => return Ok(None),
            Value::Null => return Ok(Some("null".to_string())),
            Value::Bool(b) => return Ok(Some(b.to_string())),
            Value::Number(n) if n.is_finite() => return Ok(Some(number_to_string(*n))),
            Value::Number(_) => return Ok(Some("null".to_string())),
            Value::String(s) => return Ok(Some(quote_json(s))),
            Value::Object(obj) if obj.borrow().is_callable() => return Ok(None),
            Value::Object(obj) => obj.clone(),
        };
        if state.stack.iter().any(|o| Rc::ptr_eq(o, &obj)) {
            return Err(self.type_error("Converting circular structure to JSON"));
        }
        state.stack.push(obj.clone());
        let stepback = state.indent.clone();
        state.indent.push_str(&state.gap);

        let result = if let Some(items) = Self::array_items(&value) {
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let part = self.serialize(state, &value, &i.to_string(), item)?;
                parts.push(part.unwrap_or_else(|| "null".to_string()));
            }
            wrap(state, &stepback, '[', ']', parts)
        } else {
            let keys = match &state.allow {
                Some(allow) => allow.clone(),
                None => self.own_keys(&obj.borrow()),
            };
            let mut parts = Vec::with_capacity(keys.len());
            for k in keys {
                let v = self.get_property(&value, &k)?;
                if let Some(text) = self.serialize(state, &value, &k, v)? {
                    let sep = if state.gap.is_empty() { ":" } else { ": " };
                    parts.push(format!("{}{}{}", quote_json(&k), sep, text));
                }
            }
            wrap(state, &stepback, '{', '}', parts)
        };

        state.indent = stepback;
        state.stack.pop();
        Ok(Some(result))
    }

    fn revive(&mut self, holder: &Value, key: &str, reviver: &Value) -> Result<Value, RuntimeError> {
        let value = self.get_property(holder, key)?;
        if let Value::Object(obj) = &value {
            let keys: Vec<String> = match &obj.borrow().kind {
                ObjectKind::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
                _ => obj.borrow().props.keys().cloned().collect(),
            };
            for k in keys {
                let revived = self.revive(&value, &k, reviver)?;
                match revived {
                    Value::Undefined => {
                        self.delete_property(&value, &k)?;
                    }
                    other => self.set_property(&value, &k, other)?,
                }
            }
        }
        self.call_function(reviver, holder.clone(), vec![Value::string(key), value])
    }
}

fn wrap(state: &Stringify, stepback: &str, open: char, close: char, parts: Vec<String>) -> String {
    if parts.is_empty() {
        return format!("{}{}", open, close);
    }
    if state.gap.is_empty() {
        return format!("{}{}{}", open, parts.join(","), close);
    }
    let separator = format!(",\n{}", state.indent);
    format!(
        "{}\n{}{}\n{}{}",
        open,
        state.indent,
        parts.join(&separator),
        stepback,
        close
    )
}

fn quote_json(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(s),
        serde_json::Value::Array(items) => Value::array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::plain_object(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_strings_escape_like_the_language() {
        assert_eq!(quote_json("a\"b\n"), "\"a\\\"b\\n\"");
        assert_eq!(quote_json("é"), "\"é\"");
    }

    #[test]
    fn parsed_objects_keep_key_order() {
        let parsed: serde_json::Value = serde_json::from_str(r#"{"z":1,"a":[true,null]}"#).unwrap();
        let Value::Object(obj) = from_json(parsed) else {
            panic!("expected an object");
        };
        let keys: Vec<String> = obj.borrow().props.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
