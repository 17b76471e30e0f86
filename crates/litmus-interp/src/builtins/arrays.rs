// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Array methods and the `Array` constructor.
//!
//! Callback methods read elements live by index, so a callback that
//! shrinks the array ends the walk early. Work proportional to the array
//! length is charged to the step meter.

use std::cmp::Ordering;

use crate::coerce;
use crate::interp::{Interpreter, RuntimeError};
use crate::value::{ObjectKind, ObjectRef, Value};

use super::arg;

pub(super) const STATICS: &[&str] = &["Array.isArray", "Array.from", "Array.of"];

pub(super) const METHODS: &[&str] = &[
    "array:push",
    "array:pop",
    "array:shift",
    "array:unshift",
    "array:slice",
    "array:splice",
    "array:concat",
    "array:join",
    "array:reverse",
    "array:indexOf",
    "array:lastIndexOf",
    "array:includes",
    "array:find",
    "array:findIndex",
    "array:findLast",
    "array:findLastIndex",
    "array:filter",
    "array:map",
    "array:forEach",
    "array:reduce",
    "array:reduceRight",
    "array:some",
    "array:every",
    "array:sort",
    "array:flat",
    "array:flatMap",
    "array:fill",
    "array:at",
    "array:keys",
    "array:values",
    "array:entries",
    "array:toString",
];

/// Longest array `Array(n)` may allocate.
const MAX_ARRAY_LENGTH: usize = 10_000_000;

/// Resolve a relative index argument (negative counts from the end).
fn relative_index(n: f64, len: usize) -> usize {
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn element(obj: &ObjectRef, i: usize) -> Option<Value> {
    match &obj.borrow().kind {
        ObjectKind::Array(items) => items.get(i).cloned(),
        _ => None,
    }
}

fn length(obj: &ObjectRef) -> usize {
    match &obj.borrow().kind {
        ObjectKind::Array(items) => items.len(),
        _ => 0,
    }
}

fn snapshot(obj: &ObjectRef) -> Vec<Value> {
    match &obj.borrow().kind {
        ObjectKind::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn with_items<R>(obj: &ObjectRef, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
    match &mut obj.borrow_mut().kind {
        ObjectKind::Array(items) => Some(f(items)),
        _ => None,
    }
}

impl Interpreter {
    /// Handle `Array(...)` and the `Array.*` statics.
    pub(crate) fn call_array_static(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match method {
            "" => {
                if let [Value::Number(n)] = args.as_slice() {
                    if *n < 0.0 || n.fract() != 0.0 || *n > u32::MAX as f64 {
                        return Err(self.range_error("Invalid array length"));
                    }
                    let len = *n as usize;
                    if len > MAX_ARRAY_LENGTH {
                        return Err(self.range_error("Invalid array length"));
                    }
                    self.charge(len as u64)?;
                    return Ok(Value::array(vec![Value::Undefined; len]));
                }
                Ok(Value::array(args))
            }
            "isArray" => Ok(Value::Bool(arg(&args, 0).is_array())),
            "of" => Ok(Value::array(args)),
            "from" => {
                let source = arg(&args, 0);
                let items = match &source {
                    Value::String(s) => s.chars().map(|c| Value::string(c.to_string())).collect(),
                    Value::Undefined | Value::Null => {
                        return Err(self.type_error(format!(
                            "{} is not iterable",
                            coerce::to_string(&source)
                        )))
                    }
                    _ => match Self::array_items(&source) {
                        Some(items) => items,
                        None => {
                            // Array-like: `{ length: n }`.
                            let len = self.get_property(&source, "length")?;
                            let len = coerce::to_integer(&len).clamp(0.0, MAX_ARRAY_LENGTH as f64) as usize;
                            self.charge(len as u64)?;
                            let mut items = Vec::with_capacity(len);
                            for i in 0..len {
                                items.push(self.get_property(&source, &i.to_string())?);
                            }
                            items
                        }
                    },
                };
                let map_fn = arg(&args, 1);
                if map_fn.is_nullish() {
                    return Ok(Value::array(items));
                }
                self.expect_callable(&map_fn)?;
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(self.call_callback(&map_fn, vec![item, Value::Number(i as f64)])?);
                }
                Ok(Value::array(out))
            }
            _ => Ok(Value::Undefined),
        }
    }

    /// Handle method calls on an array receiver.
    pub(crate) fn call_array_method(&mut self, obj: &ObjectRef, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if !matches!(obj.borrow().kind, ObjectKind::Array(_)) {
            return Err(self.type_error(format!(
                "Array.prototype.{} called on non-array",
                method
            )));
        }
        let this = Value::Object(obj.clone());
        let len = length(obj);
        match method {
            // Mutators
            "push" | "pop" | "shift" | "unshift" | "splice" | "reverse" | "sort" | "fill"
                if obj.borrow().frozen =>
            {
                Err(self.type_error(format!(
                    "Cannot modify frozen array with '{}'",
                    method
                )))
            }
            "push" => {
                self.charge(args.len() as u64)?;
                let new_len = with_items(obj, |items| {
                    items.extend(args);
                    items.len()
                });
                Ok(Value::Number(new_len.unwrap_or(0) as f64))
            }
            "pop" => Ok(with_items(obj, |items| items.pop()).flatten().unwrap_or(Value::Undefined)),
            "shift" => {
                self.charge(len as u64)?;
                Ok(with_items(obj, |items| {
                    if items.is_empty() {
                        None
                    } else {
                        Some(items.remove(0))
                    }
                })
                .flatten()
                .unwrap_or(Value::Undefined))
            }
            "unshift" => {
                self.charge((len + args.len()) as u64)?;
                let new_len = with_items(obj, |items| {
                    items.splice(0..0, args);
                    items.len()
                });
                Ok(Value::Number(new_len.unwrap_or(0) as f64))
            }
            "splice" => {
                self.charge(len as u64)?;
                let start = relative_index(coerce::to_integer(&arg(&args, 0)), len);
                let delete = if args.len() < 2 {
                    len - start
                } else {
                    (coerce::to_integer(&args[1]).max(0.0) as usize).min(len - start)
                };
                let inserted: Vec<Value> = args.into_iter().skip(2).collect();
                let removed = with_items(obj, |items| {
                    items.splice(start..start + delete, inserted).collect::<Vec<_>>()
                });
                Ok(Value::array(removed.unwrap_or_default()))
            }
            "reverse" => {
                self.charge(len as u64)?;
                with_items(obj, |items| items.reverse());
                Ok(this)
            }
            "fill" => {
                self.charge(len as u64)?;
                let value = arg(&args, 0);
                let start = relative_index(coerce::to_integer(&arg(&args, 1)), len);
                let end = match arg(&args, 2) {
                    Value::Undefined => len,
                    v => relative_index(coerce::to_integer(&v), len),
                };
                with_items(obj, |items| {
                    for slot in items.iter_mut().take(end).skip(start) {
                        *slot = value.clone();
                    }
                });
                Ok(this)
            }
            "sort" => {
                let comparator = arg(&args, 0);
                if !comparator.is_nullish() && !comparator.is_callable() {
                    return Err(self.type_error(
                        "The comparison function must be either a function or undefined",
                    ));
                }
                self.charge(len as u64)?;
                let items = snapshot(obj);
                let (defined, undefined): (Vec<Value>, Vec<Value>) =
                    items.into_iter().partition(|v| !matches!(v, Value::Undefined));
                let mut sorted = self.merge_sort(defined, &comparator)?;
                sorted.extend(undefined);
                with_items(obj, |items| *items = sorted);
                Ok(this)
            }

            // Accessors
            "slice" => {
                let start = relative_index(coerce::to_integer(&arg(&args, 0)), len);
                let end = match arg(&args, 1) {
                    Value::Undefined => len,
                    v => relative_index(coerce::to_integer(&v), len),
                };
                self.charge(end.saturating_sub(start) as u64)?;
                let items = snapshot(obj);
                Ok(Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec()))
            }
            "concat" => {
                let mut out = snapshot(obj);
                for value in args {
                    match Self::array_items(&value) {
                        Some(items) => out.extend(items),
                        None => out.push(value),
                    }
                }
                self.charge(out.len() as u64)?;
                Ok(Value::array(out))
            }
            "join" | "toString" => {
                let sep = match arg(&args, 0) {
                    Value::Undefined => ",".to_string(),
                    v if method == "join" => self.to_string_value(&v)?,
                    _ => ",".to_string(),
                };
                self.charge(len as u64)?;
                let mut out = String::new();
                for (i, item) in snapshot(obj).iter().enumerate() {
                    if i > 0 {
                        out.push_str(&sep);
                    }
                    if !item.is_nullish() {
                        out.push_str(&self.to_string_value(item)?);
                    }
                }
                Ok(Value::string(out))
            }
            "indexOf" | "lastIndexOf" | "includes" => {
                self.charge(len as u64)?;
                let needle = arg(&args, 0);
                let items = snapshot(obj);
                let found = match method {
                    "includes" => {
                        let from = relative_index(coerce::to_integer(&arg(&args, 1)), len);
                        return Ok(Value::Bool(items[from..].iter().any(|v| v.same_value_zero(&needle))));
                    }
                    "indexOf" => {
                        let from = relative_index(coerce::to_integer(&arg(&args, 1)), len);
                        items[from..]
                            .iter()
                            .position(|v| v.strict_equals(&needle))
                            .map(|i| i + from)
                    }
                    _ => {
                        let end = match args.get(1) {
                            Some(v) => {
                                let n = coerce::to_integer(v);
                                if n < 0.0 {
                                    (len as f64 + n + 1.0).max(0.0) as usize
                                } else {
                                    (n as usize + 1).min(len)
                                }
                            }
                            None => len,
                        };
                        items[..end].iter().rposition(|v| v.strict_equals(&needle))
                    }
                };
                Ok(Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)))
            }
            "at" => {
                let n = coerce::to_integer(&arg(&args, 0));
                let i = if n < 0.0 { len as f64 + n } else { n };
                if i < 0.0 || i >= len as f64 {
                    return Ok(Value::Undefined);
                }
                Ok(element(obj, i as usize).unwrap_or(Value::Undefined))
            }
            "keys" => Ok(Value::array((0..len).map(|i| Value::Number(i as f64)).collect())),
            "values" => Ok(Value::array(snapshot(obj))),
            "entries" => Ok(Value::array(
                snapshot(obj)
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| Value::array(vec![Value::Number(i as f64), v]))
                    .collect(),
            )),
            "flat" => {
                let depth = match arg(&args, 0) {
                    Value::Undefined => 1.0,
                    v => coerce::to_integer(&v),
                };
                let mut out = Vec::new();
                self.flatten_into(&mut out, snapshot(obj), depth)?;
                Ok(Value::array(out))
            }

            // Iteration
            "forEach" | "map" | "filter" | "find" | "findIndex" | "some" | "every" | "flatMap" => {
                let callback = arg(&args, 0);
                self.expect_callable(&callback)?;
                let this_arg = arg(&args, 1);
                let mut out = Vec::new();
                for i in 0..len {
                    let Some(item) = element(obj, i) else {
                        break;
                    };
                    let call_args = vec![item.clone(), Value::Number(i as f64), this.clone()];
                    let result = self.call_function(&callback, this_arg.clone(), call_args)?;
                    let truthy = coerce::to_boolean(&result);
                    match method {
                        "map" => out.push(result),
                        "flatMap" => match Self::array_items(&result) {
                            Some(items) => out.extend(items),
                            None => out.push(result),
                        },
                        "filter" if truthy => out.push(item),
                        "find" if truthy => return Ok(item),
                        "findIndex" if truthy => return Ok(Value::Number(i as f64)),
                        "some" if truthy => return Ok(Value::Bool(true)),
                        "every" if !truthy => return Ok(Value::Bool(false)),
                        _ => {}
                    }
                }
                Ok(match method {
                    "forEach" | "find" => Value::Undefined,
                    "findIndex" => Value::Number(-1.0),
                    "some" => Value::Bool(false),
                    "every" => Value::Bool(true),
                    _ => Value::array(out),
                })
            }
            "findLast" | "findLastIndex" => {
                let callback = arg(&args, 0);
                self.expect_callable(&callback)?;
                for i in (0..len).rev() {
                    let item = element(obj, i).unwrap_or(Value::Undefined);
                    let call_args = vec![item.clone(), Value::Number(i as f64), this.clone()];
                    let result = self.call_function(&callback, arg(&args, 1), call_args)?;
                    if coerce::to_boolean(&result) {
                        return Ok(if method == "findLast" { item } else { Value::Number(i as f64) });
                    }
                }
                Ok(if method == "findLast" { Value::Undefined } else { Value::Number(-1.0) })
            }
            "reduce" | "reduceRight" => {
                let callback = arg(&args, 0);
                self.expect_callable(&callback)?;
                let mut indices: Vec<usize> = (0..len).collect();
                if method == "reduceRight" {
                    indices.reverse();
                }
                let mut indices = indices.into_iter();
                let mut acc = if args.len() >= 2 {
                    args[1].clone()
                } else {
                    match indices.next() {
                        Some(i) => element(obj, i).unwrap_or(Value::Undefined),
                        None => return Err(self.type_error("Reduce of empty array with no initial value")),
                    }
                };
                for i in indices {
                    let Some(item) = element(obj, i) else {
                        continue;
                    };
                    acc = self.call_callback(&callback, vec![acc, item, Value::Number(i as f64), this.clone()])?;
                }
                Ok(acc)
            }
            _ => Ok(Value::Undefined),
        }
    }

    fn flatten_into(&mut self, out: &mut Vec<Value>, items: Vec<Value>, depth: f64) -> Result<(), RuntimeError> {
        self.charge(items.len() as u64)?;
        for item in items {
            match Self::array_items(&item) {
                Some(inner) if depth >= 1.0 => {
                    // Each level counts against the call depth so cyclic arrays end.
                    if self.call_depth >= self.config.max_call_depth {
                        return Err(self.range_error("Maximum call stack size exceeded"));
                    }
                    self.call_depth += 1;
                    let result = self.flatten_into(out, inner, depth - 1.0);
                    self.call_depth -= 1;
                    result?;
                }
                _ => out.push(item),
            }
        }
        Ok(())
    }

    /// Stable merge sort with a comparator that may throw.
    fn merge_sort(&mut self, mut items: Vec<Value>, comparator: &Value) -> Result<Vec<Value>, RuntimeError> {
        if items.len() <= 1 {
            return Ok(items);
        }
        let right = items.split_off(items.len() / 2);
        let left = self.merge_sort(items, comparator)?;
        let right = self.merge_sort(right, comparator)?;
        let mut merged = Vec::with_capacity(left.len() + right.len());
        let mut left = left.into_iter().peekable();
        let mut right = right.into_iter().peekable();
        while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
            if self.sort_compare(a, b, comparator)? == Ordering::Greater {
                merged.extend(right.next());
            } else {
                merged.extend(left.next());
            }
        }
        merged.extend(left);
        merged.extend(right);
        Ok(merged)
    }

    fn sort_compare(&mut self, a: &Value, b: &Value, comparator: &Value) -> Result<Ordering, RuntimeError> {
        self.tick()?;
        if comparator.is_callable() {
            let result = self.call_callback(comparator, vec![a.clone(), b.clone()])?;
            let n = self.to_number_value(&result)?;
            return Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal));
        }
        let x = self.to_string_value(a)?;
        let y = self.to_string_value(b)?;
        Ok(x.encode_utf16().cmp(y.encode_utf16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_indexes_clamp() {
        assert_eq!(relative_index(-1.0, 5), 4);
        assert_eq!(relative_index(-10.0, 5), 0);
        assert_eq!(relative_index(2.0, 5), 2);
        assert_eq!(relative_index(9.0, 5), 5);
    }
}
