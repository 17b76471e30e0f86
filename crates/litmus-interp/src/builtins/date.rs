// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `Date`, in UTC only. Reading the wall clock needs the `clock` capability;
//! dates built from explicit values do not.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::coerce::iso_string;
use crate::interp::{Interpreter, RuntimeError};
use crate::sandbox::Capability;
use crate::value::{Object, ObjectKind, ObjectRef, Value};

use super::arg;

pub(super) const STATICS: &[&str] = &["Date.now", "Date.UTC", "Date.parse"];

pub(super) const METHODS: &[&str] = &[
    "date:getTime",
    "date:valueOf",
    "date:toISOString",
    "date:toJSON",
    "date:toString",
    "date:toUTCString",
    "date:toDateString",
    "date:toTimeString",
    "date:toLocaleDateString",
    "date:toLocaleTimeString",
    "date:toLocaleString",
    "date:getTimezoneOffset",
    "date:getDay",
    "date:getUTCDay",
    "date:getFullYear",
    "date:getMonth",
    "date:getDate",
    "date:getHours",
    "date:getMinutes",
    "date:getSeconds",
    "date:getMilliseconds",
    "date:getUTCFullYear",
    "date:getUTCMonth",
    "date:getUTCDate",
    "date:getUTCHours",
    "date:getUTCMinutes",
    "date:getUTCSeconds",
    "date:getUTCMilliseconds",
    "date:setTime",
    "date:setFullYear",
    "date:setMonth",
    "date:setDate",
    "date:setHours",
    "date:setMinutes",
    "date:setSeconds",
    "date:setMilliseconds",
    "date:setUTCFullYear",
    "date:setUTCMonth",
    "date:setUTCDate",
    "date:setUTCHours",
    "date:setUTCMinutes",
    "date:setUTCSeconds",
    "date:setUTCMilliseconds",
];

const MS_PER_DAY: f64 = 86_400_000.0;

/// Broken-down time: year, month (0-based), day, hours, minutes, seconds, ms.
type Fields = [f64; 7];

impl Interpreter {
    /// `Date()` called as a function, and the `Date.*` statics.
    pub(crate) fn call_date_static(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match method {
            "" => {
                let now = self.now()?;
                Ok(Value::string(long_string(now)))
            }
            "now" => Ok(Value::Number(self.now()?)),
            "UTC" => {
                let mut fields = [f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
                for (i, slot) in fields.iter_mut().enumerate() {
                    if let Some(a) = args.get(i) {
                        *slot = self.to_number_value(a)?;
                    }
                }
                Ok(Value::Number(time_clip(from_fields(&two_digit_year(fields)))))
            }
            "parse" => {
                let text = self.to_string_value(&arg(&args, 0))?;
                Ok(Value::Number(parse_date(&text)))
            }
            _ => Ok(Value::Undefined),
        }
    }

    /// `new Date(...)`.
    pub(crate) fn construct_date(&mut self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let ms = match args.as_slice() {
            [] => self.now()?,
            [single] => match single {
                Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Date(_)) => {
                    date_value(obj).unwrap_or(f64::NAN)
                }
                Value::String(s) => parse_date(s),
                other => time_clip(self.to_number_value(other)?),
            },
            _ => {
                let mut fields = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
                for (i, slot) in fields.iter_mut().enumerate() {
                    if let Some(a) = args.get(i) {
                        *slot = self.to_number_value(a)?;
                    }
                }
                time_clip(from_fields(&two_digit_year(fields)))
            }
        };
        Ok(Value::object(Object::new(ObjectKind::Date(ms))))
    }

    pub(crate) fn call_date_method(&mut self, this: &Value, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let obj = match this {
            Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Date(_)) => obj.clone(),
            _ => return Err(self.type_error("this is not a Date object.")),
        };
        let ms = date_value(&obj).unwrap_or(f64::NAN);
        let valid = ms.is_finite();
        match method {
            "getTime" | "valueOf" => Ok(Value::Number(ms)),
            "toISOString" => {
                if !valid {
                    return Err(self.range_error("Invalid time value"));
                }
                Ok(Value::string(iso_string(ms)))
            }
            "toJSON" => Ok(if valid {
                Value::string(iso_string(ms))
            } else {
                Value::Null
            }),
            "toString" => Ok(Value::string(long_string(ms))),
            _ if !valid && method.starts_with("to") => Ok(Value::string("Invalid Date")),
            "toUTCString" => Ok(Value::string(format_utc(ms, "%a, %d %b %Y %H:%M:%S GMT"))),
            "toDateString" => Ok(Value::string(format_utc(ms, "%a %b %d %Y"))),
            "toTimeString" => Ok(Value::string(format_utc(
                ms,
                "%H:%M:%S GMT+0000 (Coordinated Universal Time)",
            ))),
            "toLocaleDateString" => Ok(Value::string(format_utc(ms, LOCALE_DATE))),
            "toLocaleTimeString" => Ok(Value::string(format_utc(ms, LOCALE_TIME))),
            "toLocaleString" => Ok(Value::string(format_utc(
                ms,
                &format!("{}, {}", LOCALE_DATE, LOCALE_TIME),
            ))),
            "getTimezoneOffset" => Ok(Value::Number(if valid { 0.0 } else { f64::NAN })),
            "getDay" | "getUTCDay" => Ok(Value::Number(
                utc(ms).map_or(f64::NAN, |dt| dt.weekday().num_days_from_sunday() as f64),
            )),
            "setTime" => {
                let t = time_clip(self.to_number_value(&arg(&args, 0))?);
                obj.borrow_mut().kind = ObjectKind::Date(t);
                Ok(Value::Number(t))
            }
            _ => {
                let name = method
                    .strip_prefix("getUTC")
                    .or_else(|| method.strip_prefix("get"))
                    .map(|field| (false, field))
                    .or_else(|| {
                        method
                            .strip_prefix("setUTC")
                            .or_else(|| method.strip_prefix("set"))
                            .map(|field| (true, field))
                    });
                let Some((setter, field)) = name else {
                    return Ok(Value::Undefined);
                };
                let Some((index, arity)) = field_slot(field) else {
                    return Ok(Value::Undefined);
                };
                if !setter {
                    return Ok(Value::Number(if valid { to_fields(ms)[index] } else { f64::NAN }));
                }
                // Only the year setter revives an invalid date.
                let base = if valid {
                    ms
                } else if index == 0 {
                    0.0
                } else {
                    return Ok(Value::Number(f64::NAN));
                };
                let mut fields = to_fields(base);
                for (offset, a) in args.iter().take(arity).enumerate() {
                    fields[index + offset] = self.to_number_value(a)?;
                }
                if args.is_empty() {
                    fields[index] = f64::NAN;
                }
                let t = time_clip(from_fields(&fields));
                obj.borrow_mut().kind = ObjectKind::Date(t);
                Ok(Value::Number(t))
            }
        }
    }

    fn now(&self) -> Result<f64, RuntimeError> {
        self.require(Capability::Clock)?;
        Ok(Utc::now().timestamp_millis() as f64)
    }
}

fn date_value(obj: &ObjectRef) -> Option<f64> {
    match obj.borrow().kind {
        ObjectKind::Date(ms) => Some(ms),
        _ => None,
    }
}

/// Index of the first field a getter/setter touches and how many
/// consecutive fields the setter accepts.
fn field_slot(field: &str) -> Option<(usize, usize)> {
    Some(match field {
        "FullYear" => (0, 3),
        "Month" => (1, 2),
        "Date" => (2, 1),
        "Hours" => (3, 4),
        "Minutes" => (4, 3),
        "Seconds" => (5, 2),
        "Milliseconds" => (6, 1),
        _ => return None,
    })
}

/// Years 0 to 99 mean 1900 to 1999 in the multi-argument forms.
fn two_digit_year(mut fields: Fields) -> Fields {
    let y = fields[0];
    if y.is_finite() {
        let t = y.trunc();
        if (0.0..=99.0).contains(&t) {
            fields[0] = 1900.0 + t;
        }
    }
    fields
}

/// `en-US` forms: `1/2/2024` and `3:04:05 PM`.
const LOCALE_DATE: &str = "%-m/%-d/%Y";
const LOCALE_TIME: &str = "%-I:%M:%S %p";

/// Times that survive clipping are whole milliseconds a `DateTime` can hold.
fn time_clip(t: f64) -> f64 {
    if !t.is_finite() || t.abs() > 8.64e15 {
        return f64::NAN;
    }
    let t = t.trunc() + 0.0;
    match utc(t) {
        Some(_) => t,
        None => f64::NAN,
    }
}

fn utc(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(ms as i64)
}

fn format_utc(ms: f64, format: &str) -> String {
    match utc(ms) {
        Some(dt) => dt.format(format).to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// `Date.prototype.toString` in the UTC zone.
fn long_string(ms: f64) -> String {
    format_utc(ms, "%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
}

/// Compose broken-down fields; out-of-range fields carry over.
fn from_fields(f: &Fields) -> f64 {
    if f.iter().any(|x| !x.is_finite()) {
        return f64::NAN;
    }
    let [year, month, day, h, m, s, ms] = f.map(f64::trunc);
    let y = year + (month / 12.0).floor();
    let mn = month.rem_euclid(12.0);
    if y.abs() > 400_000.0 {
        return f64::NAN;
    }
    let month_start = NaiveDate::from_ymd_opt(y as i32, mn as u32 + 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|start| start.and_utc().timestamp_millis() as f64);
    let Some(month_start) = month_start else {
        return f64::NAN;
    };
    month_start + (day - 1.0) * MS_PER_DAY + h * 3_600_000.0 + m * 60_000.0 + s * 1000.0 + ms
}

fn to_fields(ms: f64) -> Fields {
    match utc(ms) {
        Some(dt) => [
            dt.year() as f64,
            dt.month0() as f64,
            dt.day() as f64,
            dt.hour() as f64,
            dt.minute() as f64,
            dt.second() as f64,
            dt.timestamp_subsec_millis() as f64,
        ],
        None => [f64::NAN; 7],
    }
}

/// Date-time forms without an offset; they are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];

/// Date-time string forms: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, each optionally
/// followed by `THH:mm`, `:ss`, `.sss` and `Z` or `±HH:mm`. Times without an
/// offset are UTC.
fn parse_date(text: &str) -> f64 {
    let text = text.trim().to_ascii_uppercase();
    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return time_clip(dt.timestamp_millis() as f64);
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&text, format) {
            return time_clip(dt.timestamp_millis() as f64);
        }
    }
    let naive = text.strip_suffix('Z').unwrap_or(&text);
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return time_clip(dt.and_utc().timestamp_millis() as f64);
        }
    }
    // Missing month and day default to the first.
    let date = match naive.len() {
        4 => format!("{}-01-01", naive),
        7 => format!("{}-01", naive),
        _ => naive.to_string(),
    };
    NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(f64::NAN, |start| time_clip(start.and_utc().timestamp_millis() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_strings_parse() {
        assert_eq!(parse_date("1970-01-01T00:00:00.000Z"), 0.0);
        assert_eq!(parse_date("2024-01-02"), 1_704_153_600_000.0);
        assert_eq!(parse_date("2024-01-02T03:04:05+01:00"), 1_704_161_045_000.0);
        assert_eq!(parse_date("2024-01-02T03:04-01:00"), 1_704_168_240_000.0);
        assert_eq!(parse_date("2024-01-02T03:04"), 1_704_164_640_000.0);
        assert_eq!(parse_date("2024-01"), 1_704_067_200_000.0);
        assert_eq!(parse_date("2024"), 1_704_067_200_000.0);
        assert!(parse_date("yesterday").is_nan());
        assert!(parse_date("2024-13-01").is_nan());
    }

    #[test]
    fn fields_carry_over() {
        let t = from_fields(&[2024.0, 12.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(iso_string(t), "2025-01-01T00:00:00.000Z");
        let t = from_fields(&[2024.0, 1.0, 30.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(iso_string(t), "2024-03-01T00:00:00.000Z");
        let t = from_fields(&[2024.0, 0.0, 1.0, -1.0, 0.0, 0.0, 0.0]);
        assert_eq!(iso_string(t), "2023-12-31T23:00:00.000Z");
        let f = to_fields(parse_date("2021-03-04T05:06:07.089Z"));
        assert_eq!(f, [2021.0, 2.0, 4.0, 5.0, 6.0, 7.0, 89.0]);
    }

    #[test]
    fn display_forms() {
        let t = parse_date("2024-01-02T15:04:05Z");
        assert_eq!(long_string(t), "Tue Jan 02 2024 15:04:05 GMT+0000 (Coordinated Universal Time)");
        assert_eq!(format_utc(t, "%a, %d %b %Y %H:%M:%S GMT"), "Tue, 02 Jan 2024 15:04:05 GMT");
        assert_eq!(format_utc(t, LOCALE_TIME), "3:04:05 PM");
        assert_eq!(format_utc(t, LOCALE_DATE), "1/2/2024");
        assert_eq!(long_string(f64::NAN), "Invalid Date");
    }

    #[test]
    fn clipping() {
        assert_eq!(time_clip(1.9), 1.0);
        assert!(time_clip(8.64e15 + 1.0).is_nan());
        assert!(time_clip(f64::INFINITY).is_nan());
    }
}
