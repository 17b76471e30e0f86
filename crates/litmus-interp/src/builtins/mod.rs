// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Builtin globals and methods.
//!
//! Every builtin is a native function object named by a qualified name:
//! `Math.max` for a static on a global namespace, `array:push` for a method
//! found through a value's kind. Calls dispatch on the part before the
//! separator to the module that implements it.

mod arrays;
mod console;
mod date;
mod errors;
pub(crate) mod host;
mod json;
mod math;
mod numbers;
mod objects;
mod strings;

use indexmap::IndexMap;

use crate::coerce;
use crate::env::ScopeRef;
use crate::interp::{Interpreter, RuntimeError};
use crate::value::{NativeFunction, ObjectKind, ObjectRef, Value};

/// The qualified name of the `kind` method called `key`, if there is one.
pub(crate) fn method(kind: &str, key: &str) -> Option<&'static str> {
    let table: &[&'static str] = match kind {
        "array" => arrays::METHODS,
        "string" => strings::METHODS,
        "number" => numbers::METHODS,
        "boolean" => objects::BOOLEAN_METHODS,
        "function" => objects::FUNCTION_METHODS,
        "object" => objects::OBJECT_METHODS,
        "date" => date::METHODS,
        "error" => errors::METHODS,
        _ => return None,
    };
    table
        .iter()
        .copied()
        .find(|name| name.split_once(':').is_some_and(|(_, m)| m == key))
}

/// Bind every builtin global in the realm scope.
pub(crate) fn install(interp: &mut Interpreter) {
    let realm = interp.realm.clone();
    {
        let mut r = realm.borrow_mut();
        r.declare("undefined", Some(Value::Undefined), false);
        r.declare("NaN", Some(Value::Number(f64::NAN)), false);
        r.declare("Infinity", Some(Value::Number(f64::INFINITY)), false);
    }

    define(&realm, "print", Value::native("print"));
    define(&realm, "parseInt", Value::native("parseInt"));
    define(&realm, "parseFloat", Value::native("parseFloat"));
    define(&realm, "isNaN", Value::native("isNaN"));
    define(&realm, "isFinite", Value::native("isFinite"));

    define(&realm, "console", namespace(console::CONSOLE, &[]));
    define(&realm, "Math", namespace(math::STATICS, &math::constants()));
    define(&realm, "JSON", namespace(json::STATICS, &[]));

    let assert = Value::native("assert");
    add_statics(&assert, console::ASSERT, &[]);
    define(&realm, "assert", assert);

    for (name, statics, constants) in [
        ("Object", objects::OBJECT_STATICS, Vec::new()),
        ("Array", arrays::STATICS, Vec::new()),
        ("Number", numbers::STATICS, numbers::constants()),
        ("String", strings::STATICS, Vec::new()),
        ("Boolean", &[][..], Vec::new()),
        ("Date", date::STATICS, Vec::new()),
    ] {
        let ctor = Value::native_constructor(name);
        add_statics(&ctor, statics, &constants);
        define(&realm, name, ctor);
    }

    errors::install(interp, &realm);
    host::install(interp, &realm);
}

fn define(realm: &ScopeRef, name: &str, value: Value) {
    realm.borrow_mut().declare(name, Some(value), true);
}

/// A plain object holding the given natives and constants.
fn namespace(natives: &[&'static str], constants: &[(&str, Value)]) -> Value {
    let ns = Value::plain_object(IndexMap::new());
    add_statics(&ns, natives, constants);
    ns
}

fn add_statics(target: &Value, natives: &[&'static str], constants: &[(&str, Value)]) {
    let Value::Object(obj) = target else {
        return;
    };
    let mut o = obj.borrow_mut();
    for &name in natives {
        let key = name.rsplit('.').next().unwrap_or(name);
        o.props.insert(key.to_string(), Value::native(name));
    }
    for (key, value) in constants {
        o.props.insert(key.to_string(), value.clone());
    }
}

/// Call a builtin as a function.
pub(crate) fn call_native(
    interp: &mut Interpreter,
    native: NativeFunction,
    this: Value,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let (namespace, method) = native
        .name
        .split_once(|c: char| c == '.' || c == ':')
        .unwrap_or((native.name, ""));
    match namespace {
        "console" => interp.call_console_method(method, args),
        "assert" => interp.call_assert(method, args),
        "print" => {
            let line = crate::format::format_log(&args);
            interp.print_line(line)?;
            Ok(Value::Undefined)
        }
        "Math" => interp.call_math_method(method, args),
        "JSON" => interp.call_json_method(method, args),
        "Object" => interp.call_object_static(method, args),
        "Array" => interp.call_array_static(method, args),
        "Number" => interp.call_number_static(method, args),
        "String" => interp.call_string_static(method, args),
        "Boolean" => Ok(Value::Bool(coerce::to_boolean(&arg(&args, 0)))),
        "Date" => interp.call_date_static(method, args),
        "parseInt" | "parseFloat" | "isNaN" | "isFinite" => interp.call_number_global(namespace, args),
        "array" => {
            let obj = interp.this_object(&this, "Array.prototype", method)?;
            interp.call_array_method(&obj, method, args)
        }
        "string" => {
            let s = interp.this_string(&this)?;
            interp.call_string_method(&s, method, args)
        }
        "number" => interp.call_number_method(&this, method, args),
        "boolean" => interp.call_boolean_method(&this, method),
        "function" => interp.call_function_method(&this, method, args),
        "object" => interp.call_object_method(&this, method, args),
        "date" => interp.call_date_method(&this, method, args),
        "error" => interp.call_error_method(&this, method),
        _ if errors::is_error_constructor(namespace) => interp.construct_error(namespace, args),
        _ => interp.call_host(namespace, method, this, args),
    }
}

/// Call a builtin constructor with `new`.
pub(crate) fn construct_native(
    interp: &mut Interpreter,
    native: NativeFunction,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    match native.name {
        "Date" => interp.construct_date(args),
        "Object" => match arg(&args, 0) {
            value @ Value::Object(_) => Ok(value),
            _ => Ok(Value::plain_object(IndexMap::new())),
        },
        // Boxed primitives are not modelled; `new Number(1)` is `1`.
        _ => call_native(interp, native, Value::Undefined, args),
    }
}

/// The `i`th argument, or `undefined`.
pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

impl Interpreter {
    /// The receiver of a builtin method that needs an object of a given kind.
    pub(crate) fn this_object(&self, this: &Value, owner: &str, method: &str) -> Result<ObjectRef, RuntimeError> {
        match this {
            Value::Object(obj) => Ok(obj.clone()),
            _ => Err(self.type_error(format!(
                "{}.{} called on {}",
                owner,
                method,
                coerce::to_string(this)
            ))),
        }
    }

    pub(crate) fn this_string(&mut self, this: &Value) -> Result<String, RuntimeError> {
        match this {
            Value::Undefined | Value::Null => Err(self.type_error(
                "String.prototype method called on null or undefined",
            )),
            _ => self.to_string_value(this),
        }
    }

    /// Elements of an array value, or `None` for anything else.
    pub(crate) fn array_items(value: &Value) -> Option<Vec<Value>> {
        match value {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Array(items) => Some(items.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Call `callback(args...)` with `undefined` as the receiver.
    pub(crate) fn call_callback(&mut self, callback: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.call_function(callback, Value::Undefined, args)
    }

    pub(crate) fn expect_callable(&self, value: &Value) -> Result<(), RuntimeError> {
        if value.is_callable() {
            Ok(())
        } else {
            Err(self.type_error(format!("{} is not a function", crate::format::inspect(value))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_tables_resolve_by_suffix() {
        assert_eq!(method("array", "push"), Some("array:push"));
        assert_eq!(method("string", "padStart"), Some("string:padStart"));
        assert_eq!(method("object", "hasOwnProperty"), Some("object:hasOwnProperty"));
        assert_eq!(method("array", "nope"), None);
        assert_eq!(method("symbol", "push"), None);
    }
}
