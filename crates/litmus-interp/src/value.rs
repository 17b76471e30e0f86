// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use litmus_ast::expr::FunctionDecl;

use crate::env::ScopeRef;

pub type ObjectRef = Rc<RefCell<Object>>;

/// A dynamically-typed runtime value.
#[derive(Clone)]
pub enum Value {
    /// The undefined sentinel: absent, unassigned or not-yet-defined.
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// Arrays, functions, errors and plain objects share one heap representation.
    Object(ObjectRef),
}

/// A heap object: own properties in insertion order plus kind-specific state.
pub struct Object {
    pub kind: ObjectKind,
    pub props: IndexMap<String, Value>,
    pub proto: Option<ObjectRef>,
    pub frozen: bool,
}

pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Rc<Closure>),
    Native(NativeFunction),
    Bound(Rc<BoundFunction>),
    Error,
    /// Milliseconds since the Unix epoch
    Date(f64),
}

/// A user function together with the scope it closes over.
pub struct Closure {
    pub decl: Rc<FunctionDecl>,
    pub env: ScopeRef,
    /// Declared name, or the binding an anonymous function was assigned to.
    pub name: Rc<str>,
}

/// A builtin, dispatched by its qualified name (`Math.max`, `array:push`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeFunction {
    pub name: &'static str,
    pub constructor: bool,
}

impl NativeFunction {
    /// The unqualified name exposed as the function's `name` property.
    pub fn short_name(&self) -> &'static str {
        self.name
            .rsplit(|c: char| c == '.' || c == ':')
            .next()
            .unwrap_or(self.name)
    }
}

pub struct BoundFunction {
    pub target: Value,
    pub this: Value,
    pub args: Vec<Value>,
}

impl Object {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            props: IndexMap::new(),
            proto: None,
            frozen: false,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_)
        )
    }

    /// Own property first, then the prototype chain.
    pub fn lookup(obj: &ObjectRef, key: &str) -> Option<Value> {
        let mut current = Some(obj.clone());
        while let Some(o) = current {
            let o = o.borrow();
            if let Some(v) = o.props.get(key) {
                return Some(v.clone());
            }
            current = o.proto.clone();
        }
        None
    }

    /// `name` of a function object, as exposed to scripts.
    pub fn function_name(&self) -> Option<Rc<str>> {
        match &self.kind {
            ObjectKind::Function(c) => Some(c.name.clone()),
            ObjectKind::Native(n) => Some(n.short_name().into()),
            ObjectKind::Bound(b) => {
                let inner = b
                    .target
                    .as_object()
                    .and_then(|t| t.borrow().function_name())
                    .unwrap_or_else(|| "".into());
                Some(format!("bound {}", inner).into())
            }
            _ => None,
        }
    }
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn object(obj: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(obj)))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::object(Object::new(ObjectKind::Array(items)))
    }

    pub fn plain_object(props: IndexMap<String, Value>) -> Value {
        let mut obj = Object::new(ObjectKind::Ordinary);
        obj.props = props;
        Value::object(obj)
    }

    pub fn native(name: &'static str) -> Value {
        Value::object(Object::new(ObjectKind::Native(NativeFunction {
            name,
            constructor: false,
        })))
    }

    pub fn native_constructor(name: &'static str) -> Value {
        Value::object(Object::new(ObjectKind::Native(NativeFunction {
            name,
            constructor: true,
        })))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(|o| o.borrow().is_callable())
    }

    pub fn is_array(&self) -> bool {
        self.as_object()
            .is_some_and(|o| matches!(o.borrow().kind, ObjectKind::Array(_)))
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(o) if o.borrow().is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    /// The `===` operator: no coercion, objects compare by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `SameValueZero`: like `===` except `NaN` equals itself. Used by `includes`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", crate::coerce::number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(o) => match &o.borrow().kind {
                ObjectKind::Array(items) => write!(f, "Array({})", items.len()),
                ObjectKind::Function(c) => write!(f, "Function({})", c.name),
                ObjectKind::Native(n) => write!(f, "Native({})", n.name),
                ObjectKind::Bound(_) => write!(f, "BoundFunction"),
                ObjectKind::Error => write!(f, "Error"),
                ObjectKind::Date(t) => write!(f, "Date({})", t),
                ObjectKind::Ordinary => write!(f, "Object"),
            },
        }
    }
}
