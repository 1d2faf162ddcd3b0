//! Math extension.
//!
//! # Functions
//!
//! - `math.greatest(list)` / `math.least(list)` - extreme element of a
//!   non-empty list of numbers (mixed numeric kinds compare by value)
//! - `math.ceil(double)`, `math.floor(double)`, `math.trunc(double)`
//! - `math.round(double)` - round half away from zero
//! - `math.abs(number)` - absolute value; `math.abs(int)` overflows on the
//!   minimum int
//! - `math.sign(number)` - -1, 0 or 1 of the argument's kind
//! - `math.isNaN(double)`, `math.isInf(double)`, `math.isFinite(double)`
//! - `math.toBase(int, base)` - render an int in base 2..=36
//! - `math.fromBase(string, base)` - parse an int written in base 2..=36
//! - `math.baseConvert(string, from, to)` - re-render a number between bases

use std::cmp::Ordering;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use super::{arg, expect_double, expect_int, expect_list, expect_str, expect_uint};
use crate::error::{EvalError, Result};
use crate::extension::Extension;
use crate::functions::Function;
use crate::value::{Kind, Value};

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, Default)]
pub struct MathExtension;

impl Extension for MathExtension {
    fn name(&self) -> &str {
        "math"
    }

    fn functions(&self) -> Vec<Function> {
        vec![
            extreme("math.greatest", Ordering::Greater),
            extreme("math.least", Ordering::Less),
            double_fn("math.ceil", f64::ceil),
            double_fn("math.floor", f64::floor),
            double_fn("math.trunc", f64::trunc),
            // f64::round already rounds half away from zero.
            double_fn("math.round", f64::round),
            abs(),
            sign(),
            double_predicate("math.isNaN", f64::is_nan),
            double_predicate("math.isInf", f64::is_infinite),
            double_predicate("math.isFinite", f64::is_finite),
            Function::new("math.toBase").with_overload(vec![Kind::Int, Kind::Int], |_, args| {
                let n = expect_int(arg(args, 0)?)?;
                let base = check_base(expect_int(arg(args, 1)?)?)?;
                Ok(Value::string(to_base(n, base)))
            }),
            Function::new("math.fromBase").with_overload(
                vec![Kind::String, Kind::Int],
                |_, args| {
                    let s = expect_str(arg(args, 0)?)?;
                    let base = check_base(expect_int(arg(args, 1)?)?)?;
                    from_base(s, base).map(Value::Int)
                },
            ),
            Function::new("math.baseConvert").with_overload(
                vec![Kind::String, Kind::Int, Kind::Int],
                |_, args| {
                    let s = expect_str(arg(args, 0)?)?;
                    let from = check_base(expect_int(arg(args, 1)?)?)?;
                    let to = check_base(expect_int(arg(args, 2)?)?)?;
                    Ok(Value::string(to_base(from_base(s, from)?, to)))
                },
            ),
        ]
    }
}

fn extreme(name: &'static str, wanted: Ordering) -> Function {
    Function::new(name).with_overload(vec![Kind::List], move |_, args| {
        let items = expect_list(arg(args, 0)?)?;
        let Some((first, rest)) = items.split_first() else {
            return Err(EvalError::invalid_argument(format!("{}() requires a non-empty list", name)).into());
        };
        let mut best = first;
        for item in std::iter::once(first).chain(rest) {
            if !item.is_numeric() {
                return Err(EvalError::invalid_argument(format!(
                    "{}() requires numeric elements, got {}",
                    name,
                    item.kind()
                ))
                .into());
            }
            if item.compare(best) == Some(wanted) {
                best = item;
            }
        }
        Ok(best.clone())
    })
}

fn double_fn(name: &str, apply: fn(f64) -> f64) -> Function {
    Function::new(name).with_overload(vec![Kind::Double], move |_, args| {
        Ok(Value::Double(apply(expect_double(arg(args, 0)?)?)))
    })
}

fn double_predicate(name: &str, test: fn(f64) -> bool) -> Function {
    Function::new(name).with_overload(vec![Kind::Double], move |_, args| {
        Ok(Value::Bool(test(expect_double(arg(args, 0)?)?)))
    })
}

fn abs() -> Function {
    Function::new("math.abs")
        .with_overload(vec![Kind::Int], |_, args| {
            expect_int(arg(args, 0)?)?
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| EvalError::overflow("integer absolute value overflow").into())
        })
        .with_overload(vec![Kind::UInt], |_, args| Ok(arg(args, 0)?.clone()))
        .with_overload(vec![Kind::Double], |_, args| {
            Ok(Value::Double(expect_double(arg(args, 0)?)?.abs()))
        })
}

fn sign() -> Function {
    Function::new("math.sign")
        .with_overload(vec![Kind::Int], |_, args| {
            Ok(Value::Int(expect_int(arg(args, 0)?)?.signum()))
        })
        .with_overload(vec![Kind::UInt], |_, args| {
            let u = expect_uint(arg(args, 0)?)?;
            Ok(Value::UInt(if u.is_zero() { BigUint::zero() } else { BigUint::one() }))
        })
        .with_overload(vec![Kind::Double], |_, args| {
            let d = expect_double(arg(args, 0)?)?;
            Ok(Value::Double(if d.is_nan() || d == 0.0 { d } else { d.signum() }))
        })
}

fn check_base(base: i64) -> Result<u32> {
    match u32::try_from(base) {
        Ok(b) if (2..=36).contains(&b) => Ok(b),
        _ => Err(EvalError::invalid_argument(format!("base must be between 2 and 36, got {}", base)).into()),
    }
}

fn to_base(n: i64, base: u32) -> String {
    let mut magnitude = n.unsigned_abs();
    if magnitude == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        digits.push(DIGITS[(magnitude % base as u64) as usize]);
        magnitude /= base as u64;
    }
    if n < 0 {
        digits.push(b'-');
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

fn from_base(s: &str, base: u32) -> Result<i64> {
    use std::num::IntErrorKind;

    i64::from_str_radix(s.trim(), base).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            EvalError::overflow(format!("'{}' does not fit in an int", s)).into()
        }
        _ => EvalError::invalid_argument(format!("'{}' is not a base-{} number", s, base)).into(),
    })
}
