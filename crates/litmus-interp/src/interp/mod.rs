// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The interpreter implementation.
//!
//! This is a tree-walk interpreter that directly evaluates the AST. One
//! `Interpreter` is one execution context: its global scope outlives each
//! `eval` call, which is how a later snippet sees the bindings an earlier
//! one introduced.

mod assign;
mod call;
mod eval_expr;
mod exec_stmt;
mod hoist;
mod operators;
mod property;

use std::collections::HashMap;

use litmus_ast::stmt::Stmt;
use tracing::{debug, warn};

use crate::builtins;
use crate::builtins::host::Timers;
use crate::env::{Scope, ScopeKind, ScopeRef};
use crate::format;
use crate::sandbox::{Capability, Halt, Meter, OutputSink, SandboxConfig, SeededRng};
use crate::value::{Object, ObjectKind, ObjectRef, Value};

pub(crate) use operators::MAX_STRING_LENGTH;
pub(crate) use property::array_index;

/// The tree-walk interpreter.
pub struct Interpreter {
    /// Builtins; parent of the global scope.
    pub(crate) realm: ScopeRef,
    /// Top-level bindings carried across `eval` calls.
    pub(crate) global: ScopeRef,
    /// Innermost scope of the code currently executing.
    pub(crate) scope: ScopeRef,
    /// Prototype objects of the error constructors, by name.
    pub(crate) error_protos: HashMap<&'static str, ObjectRef>,
    /// Builtin method objects, created once per context.
    natives: HashMap<&'static str, Value>,
    pub(crate) config: SandboxConfig,
    pub(crate) meter: Meter,
    pub(crate) output: OutputSink,
    pub(crate) rng: SeededRng,
    pub(crate) timers: Timers,
    pub(crate) soft_failures: Vec<String>,
    pub(crate) call_depth: usize,
}

/// How one `eval` call ended.
#[derive(Debug)]
pub enum Outcome {
    /// Value of the last expression statement.
    Completed(Value),
    Thrown(Value),
    Halted(Halt),
}

/// Everything observable about one `eval` call.
#[derive(Debug)]
pub struct Evaluation {
    pub outcome: Outcome,
    /// One entry per print primitive call, in order.
    pub output: Vec<String>,
    /// Messages of failed `console.assert` checks.
    pub soft_failures: Vec<String>,
    pub steps: u64,
}

impl Interpreter {
    pub fn new(config: SandboxConfig) -> Self {
        let realm = Scope::new(ScopeKind::Realm, None, None);
        let global = Scope::new(ScopeKind::Global, Some(realm.clone()), Some(Value::Undefined));
        let mut interp = Self {
            realm,
            scope: global.clone(),
            global,
            error_protos: HashMap::new(),
            natives: HashMap::new(),
            meter: Meter::new(config.max_steps, config.interrupt.clone()),
            output: OutputSink::new(config.max_output_bytes),
            rng: SeededRng::new(config.random_seed),
            timers: Timers::default(),
            soft_failures: Vec::new(),
            call_depth: 0,
            config,
        };
        builtins::install(&mut interp);
        interp
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Evaluate one snippet as a program in this context.
    ///
    /// Lex and parse failures surface as a thrown `SyntaxError`. A throw
    /// stops the snippet but keeps every mutation made before it.
    pub fn eval(&mut self, source: &str) -> Evaluation {
        self.meter.reset();
        self.soft_failures.clear();
        self.output.take();
        self.scope = self.global.clone();
        self.call_depth = 0;

        let result = match litmus_parser::parse_source(source) {
            Ok(program) => self.run_program(&program),
            Err(err) => {
                debug!(message = %err.message, "snippet failed to parse");
                Err(self.throw("SyntaxError", err.message))
            }
        };

        self.scope = self.global.clone();
        self.timers.clear();
        let outcome = match result {
            Ok(value) => Outcome::Completed(value),
            Err(RuntimeError::Throw(value)) => Outcome::Thrown(value),
            Err(RuntimeError::Halt(halt)) => {
                warn!(reason = %halt.reason(), "evaluation halted");
                Outcome::Halted(halt)
            }
            Err(RuntimeError::Return(value)) => Outcome::Completed(value),
            Err(RuntimeError::Break(_) | RuntimeError::Continue(_)) => {
                Outcome::Completed(Value::Undefined)
            }
        };
        Evaluation {
            outcome,
            output: self.output.take(),
            soft_failures: std::mem::take(&mut self.soft_failures),
            steps: self.meter.used(),
        }
    }

    /// Read a top-level binding of this context.
    pub fn global(&self, name: &str) -> Option<Value> {
        match crate::env::lookup(&self.global, name) {
            crate::env::Lookup::Found(value, ScopeKind::Global) => Some(value),
            _ => None,
        }
    }

    fn run_program(&mut self, program: &[Stmt]) -> Result<Value, RuntimeError> {
        let global = self.global.clone();
        self.hoist_declarations(program, &global, true);
        let mut completion = Value::Undefined;
        for stmt in program {
            if let Some(value) = self.exec_stmt(stmt)? {
                completion = value;
            }
        }
        self.run_timers()?;
        Ok(completion)
    }

    /// Run `f` with `scope` as the current scope, restoring it on every path.
    pub(crate) fn with_scope<T>(&mut self, scope: ScopeRef, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = saved;
        result
    }

    pub(crate) fn tick(&mut self) -> Result<(), RuntimeError> {
        self.charge(1)
    }

    pub(crate) fn charge(&mut self, steps: u64) -> Result<(), RuntimeError> {
        self.meter.charge(steps).map_err(RuntimeError::Halt)
    }

    /// Fail with a policy violation unless `cap` is allowed.
    pub(crate) fn require(&self, cap: Capability) -> Result<(), RuntimeError> {
        if self.config.capabilities.allows(cap) {
            Ok(())
        } else {
            warn!(capability = %cap, "capability denied");
            Err(RuntimeError::Halt(Halt::CapabilityDenied(cap)))
        }
    }

    /// Record one line of captured output.
    pub(crate) fn print_line(&mut self, line: String) -> Result<(), RuntimeError> {
        self.require(Capability::Print)?;
        self.output.push(line).map_err(RuntimeError::Halt)
    }

    /// The memoized function object for a builtin.
    pub(crate) fn native(&mut self, name: &'static str) -> Value {
        self.natives
            .entry(name)
            .or_insert_with(|| Value::native(name))
            .clone()
    }

    pub(crate) fn make_error(&self, name: &str, message: &str) -> Value {
        let mut obj = Object::new(ObjectKind::Error);
        obj.proto = self
            .error_protos
            .get(name)
            .or_else(|| self.error_protos.get("Error"))
            .cloned();
        obj.props.insert("message".to_string(), Value::string(message));
        Value::object(obj)
    }

    pub(crate) fn throw(&self, name: &str, message: impl Into<String>) -> RuntimeError {
        RuntimeError::Throw(self.make_error(name, &message.into()))
    }

    pub(crate) fn type_error(&self, message: impl Into<String>) -> RuntimeError {
        self.throw("TypeError", message)
    }

    pub(crate) fn range_error(&self, message: impl Into<String>) -> RuntimeError {
        self.throw("RangeError", message)
    }

    pub(crate) fn reference_error(&self, message: impl Into<String>) -> RuntimeError {
        self.throw("ReferenceError", message)
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        // Closures hold their defining scope and scopes hold closures.
        self.timers.clear();
        self.global.borrow_mut().clear();
        self.realm.borrow_mut().clear();
    }
}

/// Abrupt completion of evaluation.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("uncaught {}", format::inspect(.0))]
    Throw(Value),

    /// Policy stop; not catchable and skips `finally`.
    #[error(transparent)]
    Halt(#[from] Halt),

    // Control flow (not actual errors)
    #[error("return")]
    Return(Value),

    #[error("break")]
    Break(Option<String>),

    #[error("continue")]
    Continue(Option<String>),
}
