// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Scope chain for variable bindings.
//!
//! Scopes are reference-counted so closures can keep their defining scope
//! alive. `let`/`const` bindings start uninitialized (the temporal dead
//! zone) and `var` bindings live on the nearest function or global scope.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Builtins shared by every snippet of one context
    Realm,
    /// Top level of a context; carried across snippets
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone)]
struct Binding {
    /// `None` until a lexical declaration executes.
    value: Option<Value>,
    mutable: bool,
}

pub struct Scope {
    bindings: HashMap<String, Binding>,
    parent: Option<ScopeRef>,
    kind: ScopeKind,
    /// Receiver for non-arrow function scopes and the global scope.
    this: Option<Value>,
}

/// Outcome of resolving a name.
pub enum Lookup {
    Found(Value, ScopeKind),
    /// Declared with `let`/`const` but not yet initialized
    Uninitialized,
    Missing,
}

/// Outcome of assigning to a name.
pub enum AssignResult {
    Assigned,
    Uninitialized,
    Constant,
    Missing,
}

impl Scope {
    pub fn new(kind: ScopeKind, parent: Option<ScopeRef>, this: Option<Value>) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent,
            kind,
            this,
        }))
    }

    pub fn block(parent: &ScopeRef) -> ScopeRef {
        Scope::new(ScopeKind::Block, Some(parent.clone()), None)
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Bind `name` in this scope, replacing any existing binding.
    pub fn declare(&mut self, name: &str, value: Option<Value>, mutable: bool) {
        self.bindings.insert(name.to_string(), Binding { value, mutable });
    }

    /// Initialize a binding created in the temporal dead zone.
    pub fn initialize(&mut self, name: &str, value: Value) {
        if let Some(binding) = self.bindings.get_mut(name) {
            binding.value = Some(value);
        }
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
        self.this = None;
    }
}

pub fn lookup(start: &ScopeRef, name: &str) -> Lookup {
    let mut current = Some(start.clone());
    while let Some(scope) = current {
        let s = scope.borrow();
        if let Some(binding) = s.bindings.get(name) {
            return match &binding.value {
                Some(value) => Lookup::Found(value.clone(), s.kind),
                None => Lookup::Uninitialized,
            };
        }
        current = s.parent.clone();
    }
    Lookup::Missing
}

pub fn assign(start: &ScopeRef, name: &str, value: Value) -> AssignResult {
    let mut current = Some(start.clone());
    while let Some(scope) = current {
        let mut s = scope.borrow_mut();
        if let Some(binding) = s.bindings.get_mut(name) {
            if binding.value.is_none() {
                return AssignResult::Uninitialized;
            }
            if !binding.mutable {
                return AssignResult::Constant;
            }
            binding.value = Some(value);
            return AssignResult::Assigned;
        }
        current = s.parent.clone();
    }
    AssignResult::Missing
}

/// A fresh sibling of `scope` holding copies of the named bindings, so each
/// iteration of a `for (let ...)` loop closes over its own variables.
pub fn copy_for_iteration(scope: &ScopeRef, names: &[String]) -> ScopeRef {
    let s = scope.borrow();
    let mut bindings = HashMap::new();
    for name in names {
        if let Some(binding) = s.bindings.get(name) {
            bindings.insert(name.clone(), binding.clone());
        }
    }
    Rc::new(RefCell::new(Scope {
        bindings,
        parent: s.parent.clone(),
        kind: s.kind,
        this: s.this.clone(),
    }))
}

/// Resolve `this` lexically: arrows and blocks defer to their parent.
pub fn this_value(start: &ScopeRef) -> Value {
    let mut current = Some(start.clone());
    while let Some(scope) = current {
        let s = scope.borrow();
        if let Some(this) = &s.this {
            return this.clone();
        }
        current = s.parent.clone();
    }
    Value::Undefined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_binding_shadows_without_overwriting() {
        let global = Scope::new(ScopeKind::Global, None, None);
        global.borrow_mut().declare("x", Some(Value::Number(1.0)), true);
        let inner = Scope::block(&global);
        inner.borrow_mut().declare("x", Some(Value::Number(2.0)), true);

        assert!(matches!(lookup(&inner, "x"), Lookup::Found(Value::Number(n), _) if n == 2.0));
        assert!(matches!(lookup(&global, "x"), Lookup::Found(Value::Number(n), _) if n == 1.0));
    }

    #[test]
    fn const_and_tdz() {
        let global = Scope::new(ScopeKind::Global, None, None);
        global.borrow_mut().declare("c", Some(Value::Null), false);
        global.borrow_mut().declare("t", None, true);

        assert!(matches!(assign(&global, "c", Value::Null), AssignResult::Constant));
        assert!(matches!(assign(&global, "t", Value::Null), AssignResult::Uninitialized));
        assert!(matches!(lookup(&global, "t"), Lookup::Uninitialized));
        assert!(matches!(assign(&global, "nope", Value::Null), AssignResult::Missing));

        global.borrow_mut().initialize("t", Value::Bool(true));
        assert!(matches!(lookup(&global, "t"), Lookup::Found(Value::Bool(true), _)));
    }

    #[test]
    fn iteration_copies_are_independent() {
        let global = Scope::new(ScopeKind::Global, None, None);
        let first = Scope::block(&global);
        first.borrow_mut().declare("i", Some(Value::Number(0.0)), true);
        let second = copy_for_iteration(&first, &["i".to_string()]);
        assign(&second, "i", Value::Number(1.0));

        assert!(matches!(lookup(&first, "i"), Lookup::Found(Value::Number(n), _) if n == 0.0));
        assert!(matches!(lookup(&second, "i"), Lookup::Found(Value::Number(n), _) if n == 1.0));
    }

    #[test]
    fn this_resolves_through_blocks() {
        let global = Scope::new(ScopeKind::Global, None, None);
        let func = Scope::new(ScopeKind::Function, Some(global.clone()), Some(Value::Null));
        let block = Scope::block(&func);
        let nested = Scope::block(&block);
        assert!(matches!(this_value(&nested), Value::Null));
    }
}
