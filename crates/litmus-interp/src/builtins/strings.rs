// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Methods on the string type.
//!
//! Positions count Unicode scalar values, not UTF-16 code units.

use crate::coerce;
use crate::interp::{Interpreter, RuntimeError, MAX_STRING_LENGTH};
use crate::value::Value;

use super::arg;

pub(super) const STATICS: &[&str] = &["String.fromCharCode"];

pub(super) const METHODS: &[&str] = &[
    "string:charAt",
    "string:charCodeAt",
    "string:codePointAt",
    "string:at",
    "string:indexOf",
    "string:lastIndexOf",
    "string:includes",
    "string:startsWith",
    "string:endsWith",
    "string:slice",
    "string:substring",
    "string:substr",
    "string:toUpperCase",
    "string:toLowerCase",
    "string:trim",
    "string:trimStart",
    "string:trimEnd",
    "string:padStart",
    "string:padEnd",
    "string:repeat",
    "string:split",
    "string:concat",
    "string:replace",
    "string:replaceAll",
    "string:localeCompare",
    "string:toString",
    "string:valueOf",
];

fn find_chars(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(hay.len()));
    }
    if needle.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()] == *needle)
}

fn rfind_chars(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    let last = (hay.len() - needle.len()).min(from);
    (0..=last).rev().find(|&i| hay[i..i + needle.len()] == *needle)
}

fn relative(n: f64, len: usize) -> usize {
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn clamp(n: f64, len: usize) -> usize {
    n.max(0.0).min(len as f64) as usize
}

impl Interpreter {
    /// Handle `String(...)` and `String.fromCharCode`.
    pub(crate) fn call_string_static(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match method {
            "" => match args.first() {
                None => Ok(Value::string("")),
                Some(v) => Ok(Value::string(self.to_string_value(v)?)),
            },
            "fromCharCode" => {
                let mut out = String::new();
                for a in &args {
                    let code = coerce::to_uint32(&Value::Number(self.to_number_value(a)?)) & 0xFFFF;
                    out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                Ok(Value::string(out))
            }
            _ => Ok(Value::Undefined),
        }
    }

    /// Handle string method calls.
    pub(crate) fn call_string_method(&mut self, s: &str, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.charge(s.len() as u64 / 64)?;
        let chars: Vec<char> = s.chars().collect();
        let len = chars.len();
        match method {
            "charAt" => {
                let i = coerce::to_integer(&arg(&args, 0));
                Ok(Value::string(
                    if i >= 0.0 && (i as usize) < len {
                        chars[i as usize].to_string()
                    } else {
                        String::new()
                    },
                ))
            }
            "charCodeAt" | "codePointAt" => {
                let i = coerce::to_integer(&arg(&args, 0));
                if i < 0.0 || i as usize >= len {
                    return Ok(if method == "charCodeAt" {
                        Value::Number(f64::NAN)
                    } else {
                        Value::Undefined
                    });
                }
                Ok(Value::Number(chars[i as usize] as u32 as f64))
            }
            "at" => {
                let n = coerce::to_integer(&arg(&args, 0));
                let i = if n < 0.0 { len as f64 + n } else { n };
                if i < 0.0 || i >= len as f64 {
                    return Ok(Value::Undefined);
                }
                Ok(Value::string(chars[i as usize].to_string()))
            }
            "indexOf" | "includes" | "lastIndexOf" => {
                let needle: Vec<char> = self.to_string_value(&arg(&args, 0))?.chars().collect();
                let position = arg(&args, 1);
                let found = match method {
                    "lastIndexOf" => {
                        let from = match self.to_number_value(&position)? {
                            n if n.is_nan() => len,
                            n => clamp(n, len),
                        };
                        rfind_chars(&chars, &needle, from)
                    }
                    _ => find_chars(&chars, &needle, clamp(coerce::to_integer(&position), len)),
                };
                Ok(match method {
                    "includes" => Value::Bool(found.is_some()),
                    _ => Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)),
                })
            }
            "startsWith" => {
                let needle: Vec<char> = self.to_string_value(&arg(&args, 0))?.chars().collect();
                let from = clamp(coerce::to_integer(&arg(&args, 1)), len);
                Ok(Value::Bool(chars[from..].starts_with(&needle)))
            }
            "endsWith" => {
                let needle: Vec<char> = self.to_string_value(&arg(&args, 0))?.chars().collect();
                let end = match arg(&args, 1) {
                    Value::Undefined => len,
                    v => clamp(coerce::to_integer(&v), len),
                };
                Ok(Value::Bool(chars[..end].ends_with(&needle)))
            }
            "slice" => {
                let start = relative(coerce::to_integer(&arg(&args, 0)), len);
                let end = match arg(&args, 1) {
                    Value::Undefined => len,
                    v => relative(coerce::to_integer(&v), len),
                };
                Ok(Value::string(chars[start..end.max(start)].iter().collect::<String>()))
            }
            "substring" => {
                let a = clamp(coerce::to_integer(&arg(&args, 0)), len);
                let b = match arg(&args, 1) {
                    Value::Undefined => len,
                    v => clamp(coerce::to_integer(&v), len),
                };
                let (start, end) = if a <= b { (a, b) } else { (b, a) };
                Ok(Value::string(chars[start..end].iter().collect::<String>()))
            }
            "substr" => {
                let start = relative(coerce::to_integer(&arg(&args, 0)), len);
                let count = match arg(&args, 1) {
                    Value::Undefined => len - start,
                    v => clamp(coerce::to_integer(&v), len - start),
                };
                Ok(Value::string(chars[start..start + count].iter().collect::<String>()))
            }
            "toUpperCase" => Ok(Value::string(s.to_uppercase())),
            "toLowerCase" => Ok(Value::string(s.to_lowercase())),
            "trim" => Ok(Value::string(s.trim())),
            "trimStart" => Ok(Value::string(s.trim_start())),
            "trimEnd" => Ok(Value::string(s.trim_end())),
            "padStart" | "padEnd" => {
                let target = coerce::to_integer(&arg(&args, 0));
                let fill = match arg(&args, 1) {
                    Value::Undefined => " ".to_string(),
                    v => self.to_string_value(&v)?,
                };
                if target <= len as f64 || fill.is_empty() {
                    return Ok(Value::string(s));
                }
                if target > MAX_STRING_LENGTH as f64 {
                    return Err(self.range_error("Invalid string length"));
                }
                let missing = target as usize - len;
                self.charge(missing as u64)?;
                let padding: String = fill.chars().cycle().take(missing).collect();
                Ok(Value::string(if method == "padStart" {
                    format!("{}{}", padding, s)
                } else {
                    format!("{}{}", s, padding)
                }))
            }
            "repeat" => {
                let n = self.to_number_value(&arg(&args, 0))?;
                let n = if n.is_nan() { 0.0 } else { n.trunc() };
                if n < 0.0 || n.is_infinite() {
                    return Err(self.range_error(format!(
                        "Invalid count value: {}",
                        coerce::number_to_string(n)
                    )));
                }
                if s.len() as f64 * n > MAX_STRING_LENGTH as f64 {
                    return Err(self.range_error("Invalid string length"));
                }
                self.charge((s.len() as f64 * n) as u64 / 16)?;
                Ok(Value::string(s.repeat(n as usize)))
            }
            "split" => {
                let limit = match arg(&args, 1) {
                    Value::Undefined => usize::MAX,
                    v => coerce::to_uint32(&v) as usize,
                };
                let parts: Vec<Value> = match arg(&args, 0) {
                    Value::Undefined => vec![Value::string(s)],
                    sep => {
                        let sep = self.to_string_value(&sep)?;
                        if sep.is_empty() {
                            chars.iter().map(|c| Value::string(c.to_string())).collect()
                        } else {
                            s.split(sep.as_str()).map(Value::string).collect()
                        }
                    }
                };
                self.charge(parts.len() as u64)?;
                Ok(Value::array(parts.into_iter().take(limit).collect()))
            }
            "concat" => {
                let mut out = s.to_string();
                for a in &args {
                    out.push_str(&self.to_string_value(a)?);
                }
                if out.len() > MAX_STRING_LENGTH {
                    return Err(self.range_error("Invalid string length"));
                }
                Ok(Value::string(out))
            }
            "replace" | "replaceAll" => {
                let pattern = self.to_string_value(&arg(&args, 0))?;
                let replacement = arg(&args, 1);
                let mut out = String::new();
                let mut last = 0;
                let mut matches: Vec<usize> = if pattern.is_empty() {
                    s.char_indices().map(|(i, _)| i).chain(std::iter::once(s.len())).collect()
                } else {
                    s.match_indices(pattern.as_str()).map(|(i, _)| i).collect()
                };
                if method == "replace" {
                    matches.truncate(1);
                }
                self.charge(matches.len() as u64)?;
                for at in matches {
                    out.push_str(&s[last..at]);
                    let offset = s[..at].chars().count();
                    let text = if replacement.is_callable() {
                        let result = self.call_callback(
                            &replacement,
                            vec![
                                Value::string(pattern.as_str()),
                                Value::Number(offset as f64),
                                Value::string(s),
                            ],
                        )?;
                        self.to_string_value(&result)?
                    } else {
                        let template = self.to_string_value(&replacement)?;
                        expand_replacement(&template, &pattern, s, at)
                    };
                    out.push_str(&text);
                    last = at + pattern.len();
                }
                out.push_str(&s[last..]);
                Ok(Value::string(out))
            }
            "localeCompare" => {
                let other = self.to_string_value(&arg(&args, 0))?;
                let ord = s
                    .to_lowercase()
                    .cmp(&other.to_lowercase())
                    .then_with(|| other.cmp(&s.to_string()));
                Ok(Value::Number(ord as i32 as f64))
            }
            "toString" | "valueOf" => Ok(Value::string(s)),
            _ => Ok(Value::Undefined),
        }
    }
}

/// Expand `$$`, `$&`, `` $` `` and `$'` in a replacement string.
fn expand_replacement(template: &str, matched: &str, subject: &str, at: usize) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => out.push('$'),
            Some('&') => out.push_str(matched),
            Some('`') => out.push_str(&subject[..at]),
            Some('\'') => out.push_str(&subject[at + matched.len()..]),
            _ => {
                out.push('$');
                continue;
            }
        }
        chars.next();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_search() {
        let hay: Vec<char> = "héllo héllo".chars().collect();
        let needle: Vec<char> = "llo".chars().collect();
        assert_eq!(find_chars(&hay, &needle, 0), Some(2));
        assert_eq!(find_chars(&hay, &needle, 3), Some(8));
        assert_eq!(rfind_chars(&hay, &needle, hay.len()), Some(8));
        assert_eq!(find_chars(&hay, &[], 4), Some(4));
    }

    #[test]
    fn replacement_patterns() {
        assert_eq!(expand_replacement("[$&]", "b", "abc", 1), "[b]");
        assert_eq!(expand_replacement("$$", "b", "abc", 1), "$");
        assert_eq!(expand_replacement("$`|$'", "b", "abc", 1), "a|c");
        assert_eq!(expand_replacement("$1", "b", "abc", 1), "$1");
    }
}
