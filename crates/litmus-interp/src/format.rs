// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Value inspection for captured output.
//!
//! Follows the layout conventions of the reference console: nested strings
//! are quoted, objects nest two levels deep before collapsing to
//! `[Object]`, entries stay on one line while they fit in 80 columns, and
//! long arrays of short items are grouped into aligned columns.

use std::rc::Rc;

use crate::coerce::{self, error_summary, iso_string, number_to_string};
use crate::value::{Object, ObjectKind, ObjectRef, Value};

const BREAK_LENGTH: usize = 80;
const MAX_DEPTH: usize = 2;
const COMPACT: usize = 3;
const MAX_ARRAY_LENGTH: usize = 100;

/// Render a value as a top-level print argument: strings print raw.
pub fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.to_string(),
        other => inspect(other),
    }
}

/// Render a value the way the console shows it inside a structure.
pub fn inspect(v: &Value) -> String {
    let mut ctx = Ctx {
        seen: Vec::new(),
        indentation: 0,
        current_depth: 0,
    };
    ctx.format_value(v, 0, true)
}

/// Name and message of a thrown value. Non-error throws are named
/// `Uncaught` and carry their inspected form as the message.
pub fn error_parts(v: &Value) -> (String, String) {
    match v {
        Value::Object(obj)
            if matches!(obj.borrow().kind, ObjectKind::Error)
                || Object::lookup(obj, "message").is_some() =>
        {
            let name = Object::lookup(obj, "name")
                .map(|n| coerce::to_string(&n))
                .unwrap_or_else(|| "Error".to_string());
            let message = Object::lookup(obj, "message")
                .map(|m| coerce::to_string(&m))
                .unwrap_or_default();
            (name, message)
        }
        other => ("Uncaught".to_string(), inspect(other)),
    }
}

/// Join print arguments, expanding `%s`-style directives in a leading string.
pub fn format_log(args: &[Value]) -> String {
    let mut out = String::new();
    let mut rest = args;
    if let Some(Value::String(fmt)) = args.first() {
        if fmt.contains('%') && args.len() > 1 {
            let mut params = args[1..].iter();
            let mut chars = fmt.chars().peekable();
            while let Some(c) = chars.next() {
                if c != '%' {
                    out.push(c);
                    continue;
                }
                let Some(&spec) = chars.peek() else {
                    out.push('%');
                    break;
                };
                if spec == '%' {
                    chars.next();
                    out.push('%');
                    continue;
                }
                if !matches!(spec, 's' | 'd' | 'i' | 'f' | 'o' | 'O' | 'j' | 'c') {
                    out.push('%');
                    continue;
                }
                let Some(arg) = params.next() else {
                    out.push('%');
                    continue;
                };
                chars.next();
                match spec {
                    's' => out.push_str(&match arg {
                        Value::String(s) => s.to_string(),
                        Value::Object(_) => inspect(arg),
                        other => coerce::to_string(other),
                    }),
                    'd' | 'i' => {
                        let n = match arg {
                            Value::Object(_) => f64::NAN,
                            other => coerce::to_number(other),
                        };
                        let n = if spec == 'i' { n.trunc() } else { n };
                        out.push_str(&number_to_string(n));
                    }
                    'f' => out.push_str(&number_to_string(coerce::to_number(arg))),
                    'c' => {}
                    _ => out.push_str(&inspect(arg)),
                }
            }
            rest = params.as_slice();
            for arg in rest {
                out.push(' ');
                out.push_str(&display(arg));
            }
            return out;
        }
    }
    for (i, arg) in rest.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&display(arg));
    }
    out
}

/// Quote a string with the least-escaping quote character.
pub fn quote(s: &str) -> String {
    let quote = if !s.contains('\'') {
        '\''
    } else if !s.contains('"') {
        '"'
    } else if !s.contains('`') && !s.contains("${") {
        '`'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\u{b}' => out.push_str("\\v"),
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn format_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

struct Ctx {
    seen: Vec<*const ()>,
    indentation: usize,
    current_depth: usize,
}

enum Shape {
    Array,
    Object,
}

impl Ctx {
    fn format_value(&mut self, v: &Value, depth: usize, top: bool) -> String {
        match v {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) if *n == 0.0 && n.is_sign_negative() => "-0".to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => quote(s),
            Value::Object(o) => self.format_object(o, depth, top),
        }
    }

    fn format_object(&mut self, obj: &ObjectRef, depth: usize, top: bool) -> String {
        let ptr = Rc::as_ptr(obj) as *const ();
        if self.seen.contains(&ptr) {
            return "[Circular]".to_string();
        }

        // Scalars-in-disguise first: these never recurse.
        let (base, shape) = {
            let o = obj.borrow();
            match &o.kind {
                ObjectKind::Date(ms) => return iso_string(*ms),
                ObjectKind::Error => {
                    let summary = error_summary(obj);
                    let extra = o.props.keys().any(|k| k != "message" && k != "name");
                    if !extra {
                        return if top { summary } else { format!("[{}]", summary) };
                    }
                    (format!("[{}]", summary), Shape::Object)
                }
                ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_) => {
                    let name = o.function_name().unwrap_or_else(|| "".into());
                    let base = if name.is_empty() {
                        "[Function (anonymous)]".to_string()
                    } else {
                        format!("[Function: {}]", name)
                    };
                    if o.props.keys().all(|k| k == "prototype") {
                        return base;
                    }
                    (base, Shape::Object)
                }
                ObjectKind::Array(_) => (String::new(), Shape::Array),
                ObjectKind::Ordinary => (String::new(), Shape::Object),
            }
        };

        let is_empty = {
            let o = obj.borrow();
            match (&shape, &o.kind) {
                (Shape::Array, ObjectKind::Array(items)) => items.is_empty(),
                _ => o.props.is_empty(),
            }
        };
        let (open, close) = match shape {
            Shape::Array => ("[", "]"),
            Shape::Object => ("{", "}"),
        };
        if is_empty {
            return format!("{}{}", open, close);
        }
        if depth > MAX_DEPTH {
            self.current_depth = depth;
            return match shape {
                Shape::Array => "[Array]".to_string(),
                Shape::Object => "[Object]".to_string(),
            };
        }

        self.seen.push(ptr);
        self.current_depth = depth;
        self.indentation += 2;
        let mut output = Vec::new();
        let mut grouped_numbers = true;
        let mut truncated = false;
        match shape {
            Shape::Array => {
                let items = match &obj.borrow().kind {
                    ObjectKind::Array(items) => items.clone(),
                    _ => Vec::new(),
                };
                for item in items.iter().take(MAX_ARRAY_LENGTH) {
                    if !matches!(item, Value::Number(_)) {
                        grouped_numbers = false;
                    }
                    output.push(self.format_value(item, depth + 1, false));
                }
                if items.len() > MAX_ARRAY_LENGTH {
                    truncated = true;
                    let more = items.len() - MAX_ARRAY_LENGTH;
                    output.push(format!(
                        "... {} more item{}",
                        more,
                        if more == 1 { "" } else { "s" }
                    ));
                }
            }
            Shape::Object => {
                let props: Vec<(String, Value)> = obj
                    .borrow()
                    .props
                    .iter()
                    .filter(|(k, _)| {
                        base.is_empty() || !matches!(k.as_str(), "prototype" | "message" | "name")
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                for (key, value) in props {
                    let rendered = self.format_value(&value, depth + 1, false);
                    output.push(format!("{}: {}", format_key(&key), rendered));
                }
            }
        }
        self.indentation -= 2;
        self.seen.pop();

        let entries = output.len();
        if matches!(shape, Shape::Array) && entries > 6 {
            output = self.group_array_elements(output, grouped_numbers, truncated);
        }
        if self.current_depth.saturating_sub(depth) < COMPACT && entries == output.len() {
            let start = output.len() + self.indentation + open.len() + base.len() + 10;
            if self.is_below_break_length(&output, start, &base) {
                let joined = output.join(", ");
                if !joined.contains('\n') {
                    let prefix = if base.is_empty() { String::new() } else { format!("{} ", base) };
                    return format!("{}{} {} {}", prefix, open, joined, close);
                }
            }
        }
        let indent = " ".repeat(self.indentation);
        let prefix = if base.is_empty() { String::new() } else { format!("{} ", base) };
        format!(
            "{}{}\n{}  {}\n{}{}",
            prefix,
            open,
            indent,
            output.join(&format!(",\n{}  ", indent)),
            indent,
            close
        )
    }

    fn is_below_break_length(&self, output: &[String], start: usize, base: &str) -> bool {
        let mut total = output.len() + start;
        if total + output.len() > BREAK_LENGTH {
            return false;
        }
        for entry in output {
            total += entry.chars().count();
            if total > BREAK_LENGTH {
                return false;
            }
        }
        base.is_empty() || !base.contains('\n')
    }

    /// Lay out many short array entries in aligned columns.
    fn group_array_elements(&self, output: Vec<String>, numeric: bool, truncated: bool) -> Vec<String> {
        // The "... n more items" marker is not part of the grid.
        let output_length = if truncated { output.len() - 1 } else { output.len() };
        let separator_space = 2;
        let data_len: Vec<usize> = output[..output_length]
            .iter()
            .map(|s| s.chars().count())
            .collect();
        let total_length: usize = data_len.iter().map(|l| l + separator_space).sum();
        let max_length = data_len.iter().copied().max().unwrap_or(0);
        let actual_max = max_length + separator_space;

        if actual_max * 3 + self.indentation < BREAK_LENGTH
            && (total_length as f64 / actual_max as f64 > 5.0 || max_length <= 6)
        {
            let approx_char_heights = 2.5;
            let average_bias = (actual_max as f64 - total_length as f64 / output.len() as f64).sqrt();
            let biased_max = (actual_max as f64 - 3.0 - average_bias).max(1.0);
            let columns = [
                ((approx_char_heights * biased_max * output_length as f64).sqrt() / biased_max).round()
                    as usize,
                (BREAK_LENGTH - self.indentation) / actual_max,
                COMPACT * 4,
                15,
            ]
            .into_iter()
            .min()
            .unwrap_or(1);
            if columns <= 1 {
                return output;
            }
            let max_line_length: Vec<usize> = (0..columns)
                .map(|i| {
                    let mut line_length = 0;
                    let mut j = i;
                    while j < output_length {
                        line_length = line_length.max(data_len[j]);
                        j += columns;
                    }
                    line_length + separator_space
                })
                .collect();

            let mut grouped = Vec::new();
            let mut i = 0;
            while i < output_length {
                let max = (i + columns).min(output_length);
                let mut line = String::new();
                let mut j = i;
                while j < max - 1 {
                    let cell = format!("{}, ", output[j]);
                    line.push_str(&pad(&cell, max_line_length[j - i], numeric));
                    j += 1;
                }
                if numeric {
                    line.push_str(&pad(&output[j], max_line_length[j - i] - separator_space, true));
                } else {
                    line.push_str(&output[j]);
                }
                grouped.push(line);
                i += columns;
            }
            if output_length < output.len() {
                grouped.push(output[output_length].clone());
            }
            return grouped;
        }
        output
    }
}

fn pad(s: &str, width: usize, start: bool) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let fill = " ".repeat(width - len);
    if start {
        format!("{}{}", fill, s)
    } else {
        format!("{}{}", s, fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn obj(pairs: &[(&str, Value)]) -> Value {
        let mut props = IndexMap::new();
        for (k, v) in pairs {
            props.insert(k.to_string(), v.clone());
        }
        Value::plain_object(props)
    }

    #[test]
    fn primitives() {
        assert_eq!(display(&Value::string("hi")), "hi");
        assert_eq!(inspect(&Value::string("hi")), "'hi'");
        assert_eq!(inspect(&Value::string("it's")), "\"it's\"");
        assert_eq!(inspect(&num(-0.0)), "-0");
        assert_eq!(display(&Value::Undefined), "undefined");
    }

    #[test]
    fn small_structures_stay_on_one_line() {
        let v = Value::array(vec![num(1.0), Value::string("a"), Value::Null]);
        assert_eq!(inspect(&v), "[ 1, 'a', null ]");
        let o = obj(&[("a", num(1.0)), ("b-c", Value::Bool(true))]);
        assert_eq!(inspect(&o), "{ a: 1, 'b-c': true }");
        assert_eq!(inspect(&Value::array(vec![])), "[]");
        assert_eq!(inspect(&obj(&[])), "{}");
    }

    #[test]
    fn nesting_collapses_past_depth_two() {
        let deep = obj(&[("a", obj(&[("b", obj(&[("c", obj(&[("d", num(1.0))]))]))]))]);
        assert_eq!(inspect(&deep), "{\n  a: { b: { c: [Object] } }\n}");
    }

    #[test]
    fn long_numeric_arrays_are_grouped() {
        let v = Value::array((1..=7).map(|n| num(n as f64)).collect());
        assert_eq!(inspect(&v), "[\n  1, 2, 3, 4,\n  5, 6, 7\n]");
    }

    #[test]
    fn long_objects_break_lines() {
        let long = "x".repeat(40);
        let o = obj(&[("first", Value::string(long.as_str())), ("second", Value::string(long.as_str()))]);
        let expected = format!("{{\n  first: '{}',\n  second: '{}'\n}}", long, long);
        assert_eq!(inspect(&o), expected);
    }

    #[test]
    fn format_directives() {
        let args = [Value::string("%s is %d years"), Value::string("Ann"), num(42.5), num(1.0)];
        assert_eq!(format_log(&args), "Ann is 42.5 years 1");
        let args = [Value::string("100%"), num(1.0)];
        assert_eq!(format_log(&args), "100% 1");
        let args = [Value::string("a"), obj(&[("k", Value::string("v"))])];
        assert_eq!(format_log(&args), "a { k: 'v' }");
    }
}
