// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The `Math` namespace.
//!
//! Layer: PURE, except `Math.random`, which needs the `random` capability
//! and draws from the context's seeded generator.

use litmus_ast::expr::BinOp;

use crate::interp::{Interpreter, RuntimeError};
use crate::sandbox::Capability;
use crate::value::Value;

pub(super) const STATICS: &[&str] = &[
    "Math.abs",
    "Math.ceil",
    "Math.floor",
    "Math.round",
    "Math.trunc",
    "Math.sign",
    "Math.sqrt",
    "Math.cbrt",
    "Math.pow",
    "Math.exp",
    "Math.expm1",
    "Math.log",
    "Math.log2",
    "Math.log10",
    "Math.log1p",
    "Math.sin",
    "Math.cos",
    "Math.tan",
    "Math.asin",
    "Math.acos",
    "Math.atan",
    "Math.atan2",
    "Math.sinh",
    "Math.cosh",
    "Math.tanh",
    "Math.hypot",
    "Math.max",
    "Math.min",
    "Math.fround",
    "Math.random",
];

pub(super) fn constants() -> Vec<(&'static str, Value)> {
    use std::f64::consts;
    vec![
        ("PI", Value::Number(consts::PI)),
        ("E", Value::Number(consts::E)),
        ("LN2", Value::Number(consts::LN_2)),
        ("LN10", Value::Number(consts::LN_10)),
        ("LOG2E", Value::Number(consts::LOG2_E)),
        ("LOG10E", Value::Number(consts::LOG10_E)),
        ("SQRT2", Value::Number(consts::SQRT_2)),
        ("SQRT1_2", Value::Number(consts::FRAC_1_SQRT_2)),
    ]
}

impl Interpreter {
    /// Handle `Math.*` calls.
    pub(crate) fn call_math_method(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut nums = Vec::with_capacity(args.len());
        for a in &args {
            nums.push(self.to_number_value(a)?);
        }
        let x = nums.first().copied().unwrap_or(f64::NAN);
        let y = nums.get(1).copied().unwrap_or(f64::NAN);

        let result = match method {
            // Rounding
            "abs" => x.abs(),
            "ceil" => x.ceil(),
            "floor" => x.floor(),
            "round" => round_half_up(x),
            "trunc" => x.trunc(),
            "sign" => {
                if x.is_nan() || x == 0.0 {
                    x
                } else {
                    x.signum()
                }
            }
            "fround" => x as f32 as f64,

            // Powers and logarithms
            "sqrt" => x.sqrt(),
            "cbrt" => x.cbrt(),
            "pow" => return self.binary(BinOp::Pow, Value::Number(x), Value::Number(y)),
            "exp" => x.exp(),
            "expm1" => x.exp_m1(),
            "log" => x.ln(),
            "log2" => x.log2(),
            "log10" => x.log10(),
            "log1p" => x.ln_1p(),

            // Trigonometry
            "sin" => x.sin(),
            "cos" => x.cos(),
            "tan" => x.tan(),
            "asin" => x.asin(),
            "acos" => x.acos(),
            "atan" => x.atan(),
            "atan2" => x.atan2(y),
            "sinh" => x.sinh(),
            "cosh" => x.cosh(),
            "tanh" => x.tanh(),

            "hypot" => {
                if nums.iter().any(|n| n.is_infinite()) {
                    f64::INFINITY
                } else {
                    nums.iter().map(|n| n * n).sum::<f64>().sqrt()
                }
            }
            "max" => nums.iter().copied().fold(f64::NEG_INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else if n > acc || (n == 0.0 && acc == 0.0 && acc.is_sign_negative()) {
                    n
                } else {
                    acc
                }
            }),
            "min" => nums.iter().copied().fold(f64::INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else if n < acc || (n == 0.0 && acc == 0.0 && n.is_sign_negative()) {
                    n
                } else {
                    acc
                }
            }),
            "random" => {
                self.require(Capability::Random)?;
                self.rng.next_f64()
            }
            _ => return Ok(Value::Undefined),
        };
        Ok(Value::Number(result))
    }
}

/// `Math.round`: halves round toward +Infinity.
fn round_half_up(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 {
        return x;
    }
    let r = (x + 0.5).floor();
    // Preserve -0 for values in [-0.5, 0).
    if r == 0.0 && x < 0.0 {
        -0.0
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_goes_toward_positive_infinity_at_half() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert!(round_half_up(-0.4).is_sign_negative());
    }
}
