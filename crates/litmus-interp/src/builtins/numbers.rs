// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Number formatting and parsing: `Number`, `parseInt`, `parseFloat`, and
//! the methods on number values.

use crate::coerce::{self, number_to_string};
use crate::interp::{Interpreter, RuntimeError};
use crate::value::Value;

use super::arg;

pub(super) const STATICS: &[&str] = &[
    "Number.isInteger",
    "Number.isSafeInteger",
    "Number.isFinite",
    "Number.isNaN",
    "Number.parseFloat",
    "Number.parseInt",
];

pub(super) const METHODS: &[&str] = &[
    "number:toFixed",
    "number:toPrecision",
    "number:toExponential",
    "number:toString",
    "number:toLocaleString",
    "number:valueOf",
];

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub(super) fn constants() -> Vec<(&'static str, Value)> {
    vec![
        ("MAX_SAFE_INTEGER", Value::Number(MAX_SAFE_INTEGER)),
        ("MIN_SAFE_INTEGER", Value::Number(-MAX_SAFE_INTEGER)),
        ("EPSILON", Value::Number(f64::EPSILON)),
        ("MAX_VALUE", Value::Number(f64::MAX)),
        ("MIN_VALUE", Value::Number(5e-324)),
        ("POSITIVE_INFINITY", Value::Number(f64::INFINITY)),
        ("NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY)),
        ("NaN", Value::Number(f64::NAN)),
    ]
}

impl Interpreter {
    /// Handle `Number(...)` and the `Number.*` statics.
    pub(crate) fn call_number_static(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let x = arg(&args, 0);
        let n = match x {
            Value::Number(n) => Some(n),
            _ => None,
        };
        match method {
            "" => match args.first() {
                None => Ok(Value::Number(0.0)),
                Some(v) => Ok(Value::Number(self.to_number_value(v)?)),
            },
            "isInteger" => Ok(Value::Bool(n.is_some_and(|n| n.is_finite() && n.fract() == 0.0))),
            "isSafeInteger" => Ok(Value::Bool(
                n.is_some_and(|n| n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER),
            )),
            "isFinite" => Ok(Value::Bool(n.is_some_and(f64::is_finite))),
            "isNaN" => Ok(Value::Bool(n.is_some_and(f64::is_nan))),
            "parseFloat" => self.call_number_global("parseFloat", args),
            "parseInt" => self.call_number_global("parseInt", args),
            _ => Ok(Value::Undefined),
        }
    }

    /// The global `parseInt`, `parseFloat`, `isNaN` and `isFinite`.
    pub(crate) fn call_number_global(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match name {
            "parseInt" => {
                let text = self.to_string_value(&arg(&args, 0))?;
                let radix = match arg(&args, 1) {
                    Value::Undefined => 0,
                    v => coerce::to_int32(&Value::Number(self.to_number_value(&v)?)),
                };
                Ok(Value::Number(parse_int(&text, radix)))
            }
            "parseFloat" => {
                let text = self.to_string_value(&arg(&args, 0))?;
                Ok(Value::Number(parse_float(&text)))
            }
            "isNaN" => Ok(Value::Bool(self.to_number_value(&arg(&args, 0))?.is_nan())),
            _ => Ok(Value::Bool(self.to_number_value(&arg(&args, 0))?.is_finite())),
        }
    }

    /// Handle method calls on a number receiver.
    pub(crate) fn call_number_method(&mut self, this: &Value, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let Value::Number(x) = *this else {
            return Err(self.type_error(format!(
                "Number.prototype.{} requires that 'this' be a Number",
                method
            )));
        };
        match method {
            "toFixed" => {
                let digits = coerce::to_integer(&arg(&args, 0));
                if !(0.0..=100.0).contains(&digits) {
                    return Err(self.range_error("toFixed() digits argument must be between 0 and 100"));
                }
                if !x.is_finite() || x.abs() >= 1e21 {
                    return Ok(Value::string(number_to_string(x)));
                }
                Ok(Value::string(to_fixed(x, digits as usize)))
            }
            "toPrecision" => {
                let p = arg(&args, 0);
                if p.is_nullish() || !x.is_finite() {
                    return Ok(Value::string(number_to_string(x)));
                }
                let p = coerce::to_integer(&p);
                if !(1.0..=100.0).contains(&p) {
                    return Err(self.range_error("toPrecision() argument must be between 1 and 100"));
                }
                Ok(Value::string(to_precision(x, p as usize)))
            }
            "toExponential" => {
                if !x.is_finite() {
                    return Ok(Value::string(number_to_string(x)));
                }
                let s = match arg(&args, 0) {
                    Value::Undefined => format!("{:e}", x),
                    d => {
                        let d = coerce::to_integer(&d);
                        if !(0.0..=100.0).contains(&d) {
                            return Err(self.range_error("toExponential() argument must be between 0 and 100"));
                        }
                        format!("{:.*e}", d as usize, x)
                    }
                };
                Ok(Value::string(signed_exponent(&s)))
            }
            "toString" => {
                let radix = match arg(&args, 0) {
                    Value::Undefined => 10.0,
                    r => coerce::to_integer(&r),
                };
                if !(2.0..=36.0).contains(&radix) {
                    return Err(self.range_error("toString() radix must be between 2 and 36"));
                }
                Ok(Value::string(to_radix_string(x, radix as u32)))
            }
            "toLocaleString" => Ok(Value::string(to_locale_string(x))),
            _ => Ok(Value::Number(x)),
        }
    }
}

/// `toFixed`: round the exact binary value half-up at `digits` places.
fn to_fixed(x: f64, digits: usize) -> String {
    let exact = format!("{:.1100}", x.abs());
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let mut out: Vec<u8> = int_part.bytes().chain(frac_part.bytes().take(digits)).collect();
    if frac_part.as_bytes().get(digits).is_some_and(|d| *d >= b'5') {
        let mut i = out.len();
        loop {
            if i == 0 {
                out.insert(0, b'1');
                break;
            }
            i -= 1;
            if out[i] == b'9' {
                out[i] = b'0';
            } else {
                out[i] += 1;
                break;
            }
        }
    }
    let int_len = out.len() - digits;
    let mut s = String::from_utf8_lossy(&out[..int_len]).into_owned();
    if digits > 0 {
        s.push('.');
        s.push_str(&String::from_utf8_lossy(&out[int_len..]));
    }
    if x < 0.0 {
        s.insert(0, '-');
    }
    s
}

fn to_precision(x: f64, p: usize) -> String {
    if x == 0.0 {
        return if p > 1 {
            format!("0.{}", "0".repeat(p - 1))
        } else {
            "0".to_string()
        };
    }
    let sci = format!("{:.*e}", p - 1, x.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let e: i64 = exp.parse().unwrap_or(0);
    let sign = if x < 0.0 { "-" } else { "" };
    if e < -6 || e >= p as i64 {
        let exp_sign = if e >= 0 { "+" } else { "-" };
        return format!("{}{}e{}{}", sign, mantissa, exp_sign, e.abs());
    }
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let body = if e >= 0 {
        let point = e as usize + 1;
        if point >= digits.len() {
            digits
        } else {
            format!("{}.{}", &digits[..point], &digits[point..])
        }
    } else {
        format!("0.{}{}", "0".repeat((-e - 1) as usize), digits)
    };
    format!("{}{}", sign, body)
}

/// Rust writes `1e3`; the language writes `1e+3`.
fn signed_exponent(s: &str) -> String {
    match s.split_once('e') {
        Some((m, e)) if !e.starts_with('-') => format!("{}e+{}", m, e),
        _ => s.to_string(),
    }
}

fn to_radix_string(x: f64, radix: u32) -> String {
    if radix == 10 || !x.is_finite() {
        return number_to_string(x);
    }
    let neg = x < 0.0;
    let x = x.abs();
    let mut int = x.trunc();
    let mut frac = x - int;
    let mut digits = Vec::new();
    if int == 0.0 {
        digits.push('0');
    }
    while int >= 1.0 {
        let d = (int % radix as f64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        int = (int / radix as f64).trunc();
    }
    digits.reverse();
    let mut s: String = digits.into_iter().collect();
    if frac > 0.0 {
        s.push('.');
        let mut count = 0;
        while frac > 0.0 && count < 52 {
            frac *= radix as f64;
            let d = frac.trunc() as u32;
            s.push(std::char::from_digit(d, radix).unwrap_or('0'));
            frac -= d as f64;
            count += 1;
        }
    }
    if neg {
        s.insert(0, '-');
    }
    s
}

/// `en-US` grouping with at most three fraction digits.
fn to_locale_string(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "∞" } else { "-∞" }.to_string();
    }
    let fixed = to_fixed(x.abs(), 3);
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if x < 0.0 && (int_part != "0" || !frac_part.is_empty()) { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

fn parse_int(text: &str, radix: i32) -> f64 {
    let mut s = text.trim_start();
    let neg = s.starts_with('-');
    if s.starts_with('-') || s.starts_with('+') {
        s = &s[1..];
    }
    let mut radix = radix;
    let has_hex_prefix = s.len() >= 2 && (s.starts_with("0x") || s.starts_with("0X"));
    if radix == 0 {
        radix = if has_hex_prefix { 16 } else { 10 };
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if radix == 16 && has_hex_prefix {
        s = &s[2..];
    }
    let mut n = 0.0;
    let mut any = false;
    for c in s.chars() {
        match c.to_digit(radix as u32) {
            Some(d) => {
                n = n * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    if !any {
        return f64::NAN;
    }
    if neg {
        -n
    } else {
        n
    }
}

/// The longest prefix of `text` that is a decimal literal.
fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut seen_digit = i > digits_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > frac_start || seen_digit {
            i = j;
        }
        seen_digit |= j > frac_start;
    }
    if !seen_digit {
        return f64::NAN;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    s[..i].parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_fixed_rounds_the_exact_value() {
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(1.5, 0), "2");
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(9.995, 2), "9.99");
        assert_eq!(to_fixed(99.5, 0), "100");
        assert_eq!(to_fixed(-1.25, 1), "-1.3");
        assert_eq!(to_fixed(0.1 + 0.2, 2), "0.30");
        assert_eq!(to_fixed(-0.0001, 2), "-0.00");
    }

    #[test]
    fn to_precision_switches_notation() {
        assert_eq!(to_precision(123.456, 4), "123.5");
        assert_eq!(to_precision(0.000123, 2), "0.00012");
        assert_eq!(to_precision(123456.0, 2), "1.2e+5");
        assert_eq!(to_precision(0.0, 3), "0.00");
    }

    #[test]
    fn radix_strings() {
        assert_eq!(to_radix_string(255.0, 16), "ff");
        assert_eq!(to_radix_string(-10.0, 2), "-1010");
        assert_eq!(to_radix_string(0.5, 2), "0.1");
    }

    #[test]
    fn locale_grouping() {
        assert_eq!(to_locale_string(1234567.891), "1,234,567.891");
        assert_eq!(to_locale_string(1000.0), "1,000");
        assert_eq!(to_locale_string(-42.5), "-42.5");
    }

    #[test]
    fn parse_int_and_float_prefixes() {
        assert_eq!(parse_int("42px", 0), 42.0);
        assert_eq!(parse_int("  -0x1A", 0), -26.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("z", 10).is_nan());
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("abc").is_nan());
    }
}
