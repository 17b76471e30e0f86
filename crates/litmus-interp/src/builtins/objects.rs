// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `Object`, `Boolean`, and the methods every object and function has.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::coerce;
use crate::interp::{array_index, Interpreter, RuntimeError};
use crate::value::{BoundFunction, Object, ObjectKind, Value};

use super::arg;
use super::console::same_value;

pub(super) const OBJECT_STATICS: &[&str] = &[
    "Object.keys",
    "Object.values",
    "Object.entries",
    "Object.assign",
    "Object.freeze",
    "Object.isFrozen",
    "Object.create",
    "Object.fromEntries",
    "Object.getPrototypeOf",
    "Object.setPrototypeOf",
    "Object.getOwnPropertyNames",
    "Object.defineProperty",
    "Object.is",
];

pub(super) const OBJECT_METHODS: &[&str] = &[
    "object:hasOwnProperty",
    "object:isPrototypeOf",
    "object:propertyIsEnumerable",
    "object:toString",
    "object:toLocaleString",
    "object:valueOf",
];

pub(super) const FUNCTION_METHODS: &[&str] = &[
    "function:call",
    "function:apply",
    "function:bind",
    "function:toString",
];

pub(super) const BOOLEAN_METHODS: &[&str] = &["boolean:toString", "boolean:valueOf"];

impl Interpreter {
    /// Handle `Object(...)` and the `Object.*` statics.
    pub(crate) fn call_object_static(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let target = arg(&args, 0);
        match method {
            "" => match target {
                Value::Object(_) => Ok(target),
                _ => Ok(Value::plain_object(IndexMap::new())),
            },
            "keys" => {
                self.require_object_coercible(&target)?;
                let keys = self.enumerable_keys(&target, false);
                Ok(Value::array(keys.into_iter().map(Value::string).collect()))
            }
            "values" => {
                self.require_object_coercible(&target)?;
                let entries = self.own_entries(&target)?;
                Ok(Value::array(entries.into_iter().map(|(_, v)| v).collect()))
            }
            "entries" => {
                self.require_object_coercible(&target)?;
                let entries = self.own_entries(&target)?;
                Ok(Value::array(
                    entries
                        .into_iter()
                        .map(|(k, v)| Value::array(vec![Value::string(k), v]))
                        .collect(),
                ))
            }
            "assign" => {
                self.require_object_coercible(&target)?;
                for source in args.iter().skip(1) {
                    if source.is_nullish() {
                        continue;
                    }
                    for (k, v) in self.own_entries(source)? {
                        self.set_property(&target, &k, v)?;
                    }
                }
                Ok(target)
            }
            "freeze" => {
                if let Value::Object(obj) = &target {
                    obj.borrow_mut().frozen = true;
                }
                Ok(target)
            }
            "isFrozen" => Ok(Value::Bool(match &target {
                Value::Object(obj) => obj.borrow().frozen,
                _ => true,
            })),
            "create" => {
                let proto = match &target {
                    Value::Object(obj) => Some(obj.clone()),
                    Value::Null => None,
                    other => {
                        return Err(self.type_error(format!(
                            "Object prototype may only be an Object or null: {}",
                            coerce::to_string(other)
                        )))
                    }
                };
                let mut obj = Object::new(ObjectKind::Ordinary);
                obj.proto = proto;
                let created = Value::object(obj);
                let props = arg(&args, 1);
                if !props.is_nullish() {
                    for (k, descriptor) in self.own_entries(&props)? {
                        let value = self.get_property(&descriptor, "value")?;
                        self.set_property(&created, &k, value)?;
                    }
                }
                Ok(created)
            }
            "fromEntries" => {
                let Some(entries) = Self::array_items(&target) else {
                    return Err(self.type_error(format!(
                        "{} is not iterable",
                        coerce::to_string(&target)
                    )));
                };
                let mut map = IndexMap::new();
                for entry in entries {
                    let key = self.get_computed(&entry, &Value::Number(0.0))?;
                    let key = self.property_key(&key)?;
                    let value = self.get_computed(&entry, &Value::Number(1.0))?;
                    map.insert(key, value);
                }
                Ok(Value::plain_object(map))
            }
            "getPrototypeOf" => {
                self.require_object_coercible(&target)?;
                Ok(match &target {
                    Value::Object(obj) => obj
                        .borrow()
                        .proto
                        .clone()
                        .map(Value::Object)
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                })
            }
            "setPrototypeOf" => {
                if let Value::Object(obj) = &target {
                    obj.borrow_mut().proto = match arg(&args, 1) {
                        Value::Object(proto) => Some(proto),
                        _ => None,
                    };
                }
                Ok(target)
            }
            "getOwnPropertyNames" => {
                self.require_object_coercible(&target)?;
                let mut keys = self.enumerable_keys(&target, false);
                if target.is_array() || matches!(target, Value::String(_)) {
                    keys.push("length".to_string());
                }
                Ok(Value::array(keys.into_iter().map(Value::string).collect()))
            }
            "defineProperty" => {
                if !matches!(target, Value::Object(_)) {
                    return Err(self.type_error("Object.defineProperty called on non-object"));
                }
                let key = self.property_key(&arg(&args, 1))?;
                let descriptor = arg(&args, 2);
                let value = match &descriptor {
                    Value::Object(_) => self.get_property(&descriptor, "value")?,
                    _ => {
                        return Err(self.type_error(format!(
                            "Property description must be an object: {}",
                            coerce::to_string(&descriptor)
                        )))
                    }
                };
                self.set_property(&target, &key, value)?;
                Ok(target)
            }
            "is" => Ok(Value::Bool(same_value(&target, &arg(&args, 1)))),
            _ => Ok(Value::Undefined),
        }
    }

    /// Methods inherited by every object (`hasOwnProperty`, `toString`, ...).
    pub(crate) fn call_object_method(&mut self, this: &Value, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match method {
            "hasOwnProperty" | "propertyIsEnumerable" => {
                let key = self.property_key(&arg(&args, 0))?;
                let own = match this {
                    Value::String(s) => key == "length" || array_index(&key).is_some_and(|i| i < s.chars().count()),
                    Value::Object(obj) => {
                        let o = obj.borrow();
                        let intrinsic = match &o.kind {
                            ObjectKind::Array(items) => {
                                key == "length" || array_index(&key).is_some_and(|i| i < items.len())
                            }
                            _ => false,
                        };
                        intrinsic || o.props.contains_key(&key)
                    }
                    _ => false,
                };
                Ok(Value::Bool(own))
            }
            "isPrototypeOf" => {
                let (Value::Object(proto), Value::Object(obj)) = (this, &arg(&args, 0)) else {
                    return Ok(Value::Bool(false));
                };
                let mut current = obj.borrow().proto.clone();
                while let Some(p) = current {
                    if Rc::ptr_eq(&p, proto) {
                        return Ok(Value::Bool(true));
                    }
                    current = p.borrow().proto.clone();
                }
                Ok(Value::Bool(false))
            }
            "toString" | "toLocaleString" => Ok(Value::string(match this {
                Value::Undefined => "[object Undefined]".to_string(),
                Value::Null => "[object Null]".to_string(),
                Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Ordinary) => {
                    "[object Object]".to_string()
                }
                other => self.to_string_value(other)?,
            })),
            "valueOf" => Ok(this.clone()),
            _ => Ok(Value::Undefined),
        }
    }

    /// `call`, `apply` and `bind`.
    pub(crate) fn call_function_method(&mut self, this: &Value, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if !this.is_callable() {
            return Err(self.type_error(format!(
                "Function.prototype.{} called on non-function",
                method
            )));
        }
        match method {
            "call" => {
                let receiver = arg(&args, 0);
                let rest = args.into_iter().skip(1).collect();
                self.call_function(this, receiver, rest)
            }
            "apply" => {
                let receiver = arg(&args, 0);
                let list = arg(&args, 1);
                let call_args = match &list {
                    Value::Undefined | Value::Null => Vec::new(),
                    _ => match Self::array_items(&list) {
                        Some(items) => items,
                        None => {
                            return Err(self.type_error(
                                "CreateListFromArrayLike called on non-object",
                            ))
                        }
                    },
                };
                self.call_function(this, receiver, call_args)
            }
            "bind" => {
                let bound = BoundFunction {
                    target: this.clone(),
                    this: arg(&args, 0),
                    args: args.into_iter().skip(1).collect(),
                };
                Ok(Value::object(Object::new(ObjectKind::Bound(Rc::new(bound)))))
            }
            "toString" => Ok(Value::string(coerce::to_string(this))),
            _ => Ok(Value::Undefined),
        }
    }

    pub(crate) fn call_boolean_method(&mut self, this: &Value, method: &str) -> Result<Value, RuntimeError> {
        match (method, this) {
            ("toString", Value::Bool(b)) => Ok(Value::string(b.to_string())),
            ("valueOf", Value::Bool(_)) => Ok(this.clone()),
            _ => Err(self.type_error(format!(
                "Boolean.prototype.{} requires that 'this' be a Boolean",
                method
            ))),
        }
    }

    fn require_object_coercible(&self, value: &Value) -> Result<(), RuntimeError> {
        if value.is_nullish() {
            Err(self.type_error("Cannot convert undefined or null to object"))
        } else {
            Ok(())
        }
    }
}
