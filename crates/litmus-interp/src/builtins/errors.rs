// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The error constructors and their prototypes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::coerce;
use crate::env::ScopeRef;
use crate::interp::{Interpreter, RuntimeError};
use crate::value::{Object, ObjectKind, ObjectRef, Value};

use super::arg;

pub(super) const METHODS: &[&str] = &["error:toString"];

/// `Error` first: every other prototype chains to it.
const CONSTRUCTORS: &[&str] = &[
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
    "ReferenceError",
    "AssertionError",
];

pub(super) fn is_error_constructor(name: &str) -> bool {
    CONSTRUCTORS.contains(&name)
}

pub(super) fn install(interp: &mut Interpreter, realm: &ScopeRef) {
    let mut base: Option<ObjectRef> = None;
    for &name in CONSTRUCTORS {
        let mut proto = Object::new(ObjectKind::Error);
        proto.proto = base.clone();
        proto.props.insert("name".to_string(), Value::string(name));
        proto.props.insert("message".to_string(), Value::string(""));
        let proto = Rc::new(RefCell::new(proto));

        let ctor = Value::native_constructor(name);
        if let Value::Object(c) = &ctor {
            c.borrow_mut()
                .props
                .insert("prototype".to_string(), Value::Object(proto.clone()));
        }
        proto.borrow_mut().props.insert("constructor".to_string(), ctor.clone());

        if base.is_none() {
            base = Some(proto.clone());
        }
        interp.error_protos.insert(name, proto);
        realm.borrow_mut().declare(name, Some(ctor), true);
    }
}

impl Interpreter {
    /// `new TypeError(message, { cause })`; calling without `new` is the same.
    pub(crate) fn construct_error(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut obj = Object::new(ObjectKind::Error);
        obj.proto = self.error_protos.get(name).cloned();
        let message = arg(&args, 0);
        if !matches!(message, Value::Undefined) {
            let message = self.to_string_value(&message)?;
            obj.props.insert("message".to_string(), Value::string(message));
        }
        let options = arg(&args, 1);
        if let Value::Object(opts) = &options {
            let has_cause = opts.borrow().props.contains_key("cause");
            if has_cause {
                let cause = self.get_property(&options, "cause")?;
                obj.props.insert("cause".to_string(), cause);
            }
        }
        Ok(Value::object(obj))
    }

    pub(crate) fn call_error_method(&mut self, this: &Value, method: &str) -> Result<Value, RuntimeError> {
        match (method, this) {
            ("toString", Value::Object(obj)) => Ok(Value::string(coerce::error_summary(obj))),
            _ => Err(self.type_error(format!(
                "Error.prototype.{} called on incompatible receiver {}",
                method,
                coerce::to_string(this)
            ))),
        }
    }
}
