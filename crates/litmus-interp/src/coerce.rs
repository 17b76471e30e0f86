// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Implicit coercion tables.
//!
//! Mixed-type operations never fail; they convert their operands using the
//! tables below.
//!
//! ToPrimitive (objects only, primitives pass through):
//!
//! | Object kind      | Result                                   |
//! |------------------|------------------------------------------|
//! | Array            | elements joined with `,` (nullish → `""`) |
//! | Error            | `"<name>: <message>"`                    |
//! | Date             | milliseconds (number hint) or ISO string |
//! | Function         | `"function <name>() { [code] }"`          |
//! | Ordinary         | `"[object Object]"`                      |
//!
//! User-defined `valueOf`/`toString` methods are honored by the
//! interpreter before falling back to this table.
//!
//! ToNumber: `undefined` → NaN, `null` → 0, booleans → 0/1, strings are
//! trimmed (empty → 0, `0x`/`0o`/`0b` prefixes, `Infinity`, otherwise a
//! decimal literal or NaN), objects go through ToPrimitive first.
//!
//! ToBoolean: `undefined`, `null`, `false`, `0`, `-0`, `NaN` and `""` are
//! falsy; everything else, including every object, is truthy.

use std::collections::HashSet;
use std::rc::Rc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::value::{Object, ObjectKind, Value};

/// Conversion hint for ToPrimitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

pub fn to_boolean(v: &Value) -> bool {
    match v {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => !(*n == 0.0 || n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Object(_) => true,
    }
}

/// ToPrimitive using only the built-in conversions.
pub fn to_primitive(v: &Value, hint: Hint) -> Value {
    let obj = match v {
        Value::Object(o) => o,
        other => return other.clone(),
    };
    let date = match &obj.borrow().kind {
        ObjectKind::Date(ms) => Some(*ms),
        _ => None,
    };
    if let Some(ms) = date {
        return match hint {
            Hint::Number => Value::Number(ms),
            _ => Value::string(iso_string(ms)),
        };
    }
    Value::string(object_to_string(v, &mut HashSet::new()))
}

fn object_to_string(v: &Value, seen: &mut HashSet<usize>) -> String {
    let obj = match v {
        Value::Object(o) => o,
        other => return to_string(other),
    };
    let key = Rc::as_ptr(obj) as *const () as usize;
    if !seen.insert(key) {
        // A cyclic array joins as empty.
        return String::new();
    }
    let out = {
        let o = obj.borrow();
        match &o.kind {
            ObjectKind::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    Value::Object(_) => object_to_string(item, seen),
                    other => to_string(other),
                })
                .collect::<Vec<_>>()
                .join(","),
            ObjectKind::Error => error_summary(obj),
            ObjectKind::Date(ms) => iso_string(*ms),
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_) => {
                let name = o.function_name().unwrap_or_else(|| "".into());
                format!("function {}() {{ [code] }}", name)
            }
            ObjectKind::Ordinary => "[object Object]".to_string(),
        }
    };
    seen.remove(&key);
    out
}

/// `Error.prototype.toString`: `"name: message"`, or whichever part is present.
pub fn error_summary(obj: &crate::value::ObjectRef) -> String {
    let name = Object::lookup(obj, "name")
        .map(|v| to_string(&v))
        .unwrap_or_else(|| "Error".to_string());
    let message = Object::lookup(obj, "message")
        .map(|v| to_string(&v))
        .unwrap_or_default();
    match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{}: {}", name, message),
    }
}

pub fn to_number(v: &Value) -> f64 {
    match v {
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => *n,
        Value::String(s) => string_to_number(s),
        Value::Object(_) => to_number(&to_primitive(v, Hint::Number)),
    }
}

/// The string-to-number grammar used by `Number(...)` and arithmetic.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    let radix = match t.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &t[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        let mut n = 0.0;
        for c in digits.chars() {
            match c.to_digit(radix) {
                Some(d) => n = n * radix as f64 + d as f64,
                None => return f64::NAN,
            }
        }
        return n;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // Rust accepts "inf" and "nan"; the scripting language does not.
    if t
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn to_string(v: &Value) -> String {
    match v {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::String(s) => s.to_string(),
        Value::Object(_) => to_string(&to_primitive(v, Hint::String)),
    }
}

/// Shortest round-trip rendering of a number, switching to exponent form
/// outside `[1e-6, 1e21)`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{}", n);
    }
    let s = format!("{:e}", n);
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => s,
    }
}

/// ToInt32, used by the bitwise operators.
pub fn to_int32(v: &Value) -> i32 {
    to_uint32(v) as i32
}

pub fn to_uint32(v: &Value) -> u32 {
    let n = to_number(v);
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc().rem_euclid(4_294_967_296.0);
    m as u32
}

/// ToIntegerOrInfinity, used for index and count arguments.
pub fn to_integer(v: &Value) -> f64 {
    let n = to_number(v);
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

/// The `==` operator.
///
/// | Left / right          | Rule                               |
/// |-----------------------|------------------------------------|
/// | same type             | `===`                              |
/// | `null` / `undefined`  | equal to each other only           |
/// | number / string       | compare as numbers                 |
/// | boolean / any         | boolean → number, retry            |
/// | object / primitive    | ToPrimitive the object, retry      |
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(x), Value::String(_)) => *x == to_number(b),
        (Value::String(_), Value::Number(y)) => to_number(a) == *y,
        (Value::Bool(_), _) => loose_equals(&Value::Number(to_number(a)), b),
        (_, Value::Bool(_)) => loose_equals(a, &Value::Number(to_number(b))),
        (Value::Object(_), Value::Object(_)) => a.strict_equals(b),
        (Value::Object(_), _) => loose_equals(&to_primitive(a, Hint::Default), b),
        (_, Value::Object(_)) => loose_equals(a, &to_primitive(b, Hint::Default)),
        _ => a.strict_equals(b),
    }
}

/// Abstract relational comparison on primitives. `None` means a NaN was
/// involved and every relational operator yields `false`.
pub fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    let pa = to_primitive(a, Hint::Number);
    let pb = to_primitive(b, Hint::Number);
    if let (Value::String(x), Value::String(y)) = (&pa, &pb) {
        return Some(x.cmp(y));
    }
    to_number(&pa).partial_cmp(&to_number(&pb))
}

/// Render epoch milliseconds as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn iso_string(ms: f64) -> String {
    let date = Some(ms)
        .filter(|ms| ms.is_finite())
        .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms.floor() as i64));
    match date {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => "Invalid Date".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(x: &str) -> Value {
        Value::string(x)
    }

    #[test]
    fn numbers_render_like_the_language() {
        assert_eq!(number_to_string(10.0), "10");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(123456789012.0), "123456789012");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn string_to_number_grammar() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("0b101"), 5.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("0x").is_nan());
    }

    #[test]
    fn truthiness() {
        assert!(!to_boolean(&s("")));
        assert!(to_boolean(&s("0")));
        assert!(!to_boolean(&Value::Number(f64::NAN)));
        assert!(to_boolean(&Value::array(vec![])));
    }

    #[test]
    fn arrays_stringify_by_joining() {
        let arr = Value::array(vec![
            Value::Number(1.0),
            Value::Null,
            Value::array(vec![Value::Number(2.0), Value::Number(3.0)]),
        ]);
        assert_eq!(to_string(&arr), "1,,2,3");
        assert_eq!(to_string(&Value::array(vec![])), "");
        assert_eq!(to_number(&Value::array(vec![Value::Number(7.0)])), 7.0);
        assert_eq!(to_string(&Value::plain_object(Default::default())), "[object Object]");
    }

    #[test]
    fn loose_equality_table() {
        assert!(loose_equals(&Value::Null, &Value::Undefined));
        assert!(!loose_equals(&Value::Null, &Value::Number(0.0)));
        assert!(loose_equals(&Value::Number(1.0), &s("1")));
        assert!(loose_equals(&Value::Bool(true), &s("1")));
        assert!(loose_equals(&s(""), &Value::Number(0.0)));
        assert!(loose_equals(&Value::array(vec![]), &s("")));
        assert!(!loose_equals(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
    }

    #[test]
    fn relational_comparison() {
        use std::cmp::Ordering;
        assert_eq!(compare(&s("10"), &s("9")), Some(Ordering::Less));
        assert_eq!(compare(&s("10"), &Value::Number(9.0)), Some(Ordering::Greater));
        assert_eq!(compare(&Value::Undefined, &Value::Number(1.0)), None);
        assert_eq!(compare(&Value::Null, &Value::Number(0.0)), Some(Ordering::Equal));
    }

    #[test]
    fn int32_wraps() {
        assert_eq!(to_int32(&Value::Number(4_294_967_295.0)), -1);
        assert_eq!(to_int32(&Value::Number(-1.5)), -1);
        assert_eq!(to_uint32(&Value::Number(-1.0)), 4_294_967_295);
    }

    #[test]
    fn iso_dates() {
        assert_eq!(iso_string(0.0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_string(951_782_400_000.0), "2000-02-29T00:00:00.000Z");
        assert_eq!(iso_string(-1.0), "1969-12-31T23:59:59.999Z");
    }
}
