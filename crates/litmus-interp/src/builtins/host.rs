// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Host primitives behind capabilities: modules, `process`, the file system,
//! network stubs and timers.
//!
//! Timers run on a virtual clock. Callbacks queued by a snippet fire in due
//! order once its body has finished, without any real waiting.

use std::io;

use indexmap::IndexMap;
use tracing::debug;

use crate::env::{self, Lookup, ScopeRef};
use crate::interp::{Interpreter, RuntimeError};
use crate::sandbox::Capability;
use crate::value::Value;

use super::arg;

const FS: &[&str] = &["fs.readFileSync", "fs.writeFileSync", "fs.existsSync"];
const HTTP: &[&str] = &["http.request", "http.get", "http.createServer"];
const HTTPS: &[&str] = &["https.request", "https.get", "https.createServer"];
const NET: &[&str] = &["net.connect", "net.createConnection", "net.createServer"];
const TIMERS: &[&str] = &["setTimeout", "setInterval", "clearTimeout", "clearInterval"];

struct Timer {
    id: u32,
    due: u64,
    seq: u64,
    callback: Value,
    args: Vec<Value>,
    interval: Option<u64>,
}

/// Pending timer callbacks of the current snippet.
#[derive(Default)]
pub(crate) struct Timers {
    now: u64,
    next_id: u32,
    seq: u64,
    queue: Vec<Timer>,
}

impl Timers {
    fn schedule(&mut self, callback: Value, args: Vec<Value>, delay: u64, repeat: bool) -> u32 {
        self.next_id += 1;
        let id = self.next_id;
        self.push(Timer {
            id,
            due: 0,
            seq: 0,
            callback,
            args,
            interval: repeat.then_some(delay),
        }, delay);
        id
    }

    fn push(&mut self, mut timer: Timer, delay: u64) {
        self.seq += 1;
        timer.seq = self.seq;
        timer.due = self.now.saturating_add(delay);
        self.queue.push(timer);
    }

    fn cancel(&mut self, id: u32) {
        self.queue.retain(|t| t.id != id);
    }

    /// Remove the earliest timer; ties fire in scheduling order.
    fn pop_next(&mut self) -> Option<Timer> {
        let index = self
            .queue
            .iter()
            .enumerate()
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        Some(self.queue.remove(index))
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.now = 0;
    }
}

pub(super) fn install(interp: &mut Interpreter, realm: &ScopeRef) {
    let mut r = realm.borrow_mut();
    r.declare("require", Some(Value::native("require")), true);
    r.declare("fetch", Some(Value::native("fetch")), true);
    for &name in TIMERS {
        r.declare(name, Some(Value::native(name)), true);
    }

    let env_vars: IndexMap<String, Value> = std::env::vars()
        .map(|(k, v)| (k, Value::string(v)))
        .collect();
    let mut process = IndexMap::new();
    process.insert("env".to_string(), Value::plain_object(env_vars));
    process.insert("platform".to_string(), Value::string(platform()));
    process.insert(
        "argv".to_string(),
        Value::array(vec![Value::string("litmus")]),
    );
    process.insert("cwd".to_string(), interp.native("process.cwd"));
    r.declare("process", Some(Value::plain_object(process)), true);
}

/// `process.platform` spelling of the host OS.
fn platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        os => os,
    }
}

impl Interpreter {
    pub(crate) fn call_host(&mut self, namespace: &str, method: &str, _this: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match namespace {
            "require" => self.require_module(&arg(&args, 0)),
            "fetch" => {
                self.require(Capability::Net)?;
                Err(self.type_error("fetch failed"))
            }
            "setTimeout" | "setInterval" => {
                self.require(Capability::Timers)?;
                let callback = arg(&args, 0);
                self.expect_callable(&callback)?;
                let delay = self.to_number_value(&arg(&args, 1))?;
                let delay = if delay.is_finite() && delay > 0.0 { delay as u64 } else { 0 };
                let extra = args.into_iter().skip(2).collect();
                let id = self
                    .timers
                    .schedule(callback, extra, delay, namespace == "setInterval");
                Ok(Value::Number(id as f64))
            }
            "clearTimeout" | "clearInterval" => {
                self.require(Capability::Timers)?;
                if let Value::Number(id) = arg(&args, 0) {
                    self.timers.cancel(id as u32);
                }
                Ok(Value::Undefined)
            }
            "process" => {
                self.require(Capability::Process)?;
                match std::env::current_dir() {
                    Ok(dir) => Ok(Value::string(dir.to_string_lossy().into_owned())),
                    Err(e) => Err(self.io_error(&e, "uv_cwd", None)),
                }
            }
            "fs" => {
                self.require(Capability::Fs)?;
                self.call_fs_method(method, args)
            }
            "http" | "https" | "net" => {
                self.require(Capability::Net)?;
                Err(self.throw(
                    "Error",
                    format!("{}.{} is not available: the sandbox has no network stack", namespace, method),
                ))
            }
            _ => Ok(Value::Undefined),
        }
    }

    fn require_module(&mut self, specifier: &Value) -> Result<Value, RuntimeError> {
        let name = self.to_string_value(specifier)?;
        let name = name.strip_prefix("node:").unwrap_or(&name).to_string();
        debug!(module = %name, "require");
        let module = match name.as_str() {
            "fs" => {
                self.require(Capability::Fs)?;
                self.module_object(FS)
            }
            "http" => {
                self.require(Capability::Net)?;
                self.module_object(HTTP)
            }
            "https" => {
                self.require(Capability::Net)?;
                self.module_object(HTTPS)
            }
            "net" => {
                self.require(Capability::Net)?;
                self.module_object(NET)
            }
            "process" => {
                self.require(Capability::Process)?;
                self.realm_binding("process")
            }
            "assert" => self.realm_binding("assert"),
            _ => {
                let err = self.make_error("Error", &format!("Cannot find module '{}'", name));
                if let Value::Object(obj) = &err {
                    obj.borrow_mut()
                        .props
                        .insert("code".to_string(), Value::string("MODULE_NOT_FOUND"));
                }
                return Err(RuntimeError::Throw(err));
            }
        };
        Ok(module)
    }

    fn module_object(&mut self, natives: &[&'static str]) -> Value {
        let mut props = IndexMap::new();
        for &name in natives {
            let key = name.rsplit('.').next().unwrap_or(name);
            props.insert(key.to_string(), self.native(name));
        }
        Value::plain_object(props)
    }

    fn realm_binding(&self, name: &str) -> Value {
        match env::lookup(&self.realm, name) {
            Lookup::Found(value, _) => value,
            _ => Value::Undefined,
        }
    }

    fn call_fs_method(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let path = self.to_string_value(&arg(&args, 0))?;
        match method {
            "readFileSync" => match std::fs::read(&path) {
                Ok(bytes) => {
                    self.charge(bytes.len() as u64 / 64)?;
                    Ok(Value::string(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Err(e) => Err(self.io_error(&e, "open", Some(&path))),
            },
            "writeFileSync" => {
                let data = self.to_string_value(&arg(&args, 1))?;
                self.charge(data.len() as u64 / 64)?;
                match std::fs::write(&path, data) {
                    Ok(()) => Ok(Value::Undefined),
                    Err(e) => Err(self.io_error(&e, "open", Some(&path))),
                }
            }
            "existsSync" => Ok(Value::Bool(std::path::Path::new(&path).exists())),
            _ => Ok(Value::Undefined),
        }
    }

    /// A system error shaped like `ENOENT: no such file or directory, open 'x'`.
    fn io_error(&self, err: &io::Error, syscall: &str, path: Option<&str>) -> RuntimeError {
        let (code, errno, description) = match err.kind() {
            io::ErrorKind::NotFound => ("ENOENT", -2.0, "no such file or directory"),
            io::ErrorKind::PermissionDenied => ("EACCES", -13.0, "permission denied"),
            io::ErrorKind::AlreadyExists => ("EEXIST", -17.0, "file already exists"),
            _ => ("EIO", -5.0, "i/o error"),
        };
        let message = match path {
            Some(p) => format!("{}: {}, {} '{}'", code, description, syscall, p),
            None => format!("{}: {}, {}", code, description, syscall),
        };
        let error = self.make_error("Error", &message);
        if let Value::Object(obj) = &error {
            let mut o = obj.borrow_mut();
            o.props.insert("errno".to_string(), Value::Number(errno));
            o.props.insert("code".to_string(), Value::string(code));
            o.props.insert("syscall".to_string(), Value::string(syscall));
            if let Some(p) = path {
                o.props.insert("path".to_string(), Value::string(p));
            }
        }
        RuntimeError::Throw(error)
    }

    /// Fire queued timers in due order until none remain.
    pub(crate) fn run_timers(&mut self) -> Result<(), RuntimeError> {
        while let Some(timer) = self.timers.pop_next() {
            self.tick()?;
            self.timers.now = timer.due;
            let callback = timer.callback.clone();
            let args = timer.args.clone();
            debug!(id = timer.id, at = timer.due, "timer fired");
            if let Some(interval) = timer.interval {
                self.timers.push(timer, interval.max(1));
            }
            self.call_function(&callback, Value::Undefined, args)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_in_due_then_schedule_order() {
        let mut timers = Timers::default();
        let a = timers.schedule(Value::Undefined, Vec::new(), 10, false);
        let b = timers.schedule(Value::Undefined, Vec::new(), 0, false);
        let c = timers.schedule(Value::Undefined, Vec::new(), 10, false);
        timers.cancel(c);
        let order: Vec<u32> = std::iter::from_fn(|| timers.pop_next().map(|t| t.id)).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn platform_uses_node_spelling() {
        assert!(!platform().is_empty());
        assert_ne!(platform(), "macos");
    }
}
