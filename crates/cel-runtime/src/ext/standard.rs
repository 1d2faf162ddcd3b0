//! The standard library.
//!
//! # Operators
//!
//! - Arithmetic `+ - * / %` on `int` (checked), `uint` (unbounded; going
//!   below zero is an overflow), `double` (IEEE 754), concatenation of
//!   `string`, `bytes` and `list`, and timestamp/duration arithmetic
//! - Ordering `< <= > >=` within each orderable kind and across `int`,
//!   `uint` and `double`
//! - Equality `== !=` within each kind, across numeric kinds, and between
//!   `null` and anything
//! - Membership `in` for lists (linear scan) and map keys
//! - `&&`, `||`, unary `!` and `-`
//!
//! # Functions
//!
//! - `size`, `contains`, `startsWith`, `endsWith`, `matches`
//! - Conversions `int`, `uint`, `double`, `string`, `bytes`, `bool`,
//!   `timestamp`, `duration`, `type`
//! - Timestamp accessors `getFullYear` ... `getMilliseconds`, in UTC or in a
//!   timezone given as a string
//! - Duration accessors `getHours`, `getMinutes`, `getSeconds`,
//!   `getMilliseconds` (totals)

use std::cmp::Ordering;

use cel_runtime_ast::{BinaryOp, UnaryOp};
use chrono::{Offset, Utc};
use num_bigint::BigUint;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use regex::Regex;

use super::{
    arg, expect_bool, expect_bytes, expect_double, expect_duration, expect_int, expect_list,
    expect_map, expect_str, expect_timestamp, expect_uint,
};
use crate::error::{Error, EvalError, Result};
use crate::extension::Extension;
use crate::functions::Function;
use crate::operators::{BinaryOverload, UnaryOverload};
use crate::value::time::{
    format_duration, format_timestamp, parse_duration, parse_timestamp, zone_offset,
    CalendarField, CALENDAR_FIELDS,
};
use crate::value::{format_double, Duration, Kind, Timestamp, Value};

/// Core operators and functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardLibrary;

impl Extension for StandardLibrary {
    fn name(&self) -> &str {
        "standard"
    }

    fn binary_operators(&self) -> Vec<BinaryOverload> {
        let mut ops = Vec::new();
        int_arithmetic(&mut ops);
        uint_arithmetic(&mut ops);
        double_arithmetic(&mut ops);
        concatenation(&mut ops);
        time_arithmetic(&mut ops);
        ordering(&mut ops);
        equality(&mut ops);
        membership(&mut ops);
        ops.push(BinaryOverload::new(BinaryOp::And, Kind::Bool, Kind::Bool, |_, l, r| {
            Ok(Value::Bool(expect_bool(l)? && expect_bool(r)?))
        }));
        ops.push(BinaryOverload::new(BinaryOp::Or, Kind::Bool, Kind::Bool, |_, l, r| {
            Ok(Value::Bool(expect_bool(l)? || expect_bool(r)?))
        }));
        ops
    }

    fn unary_operators(&self) -> Vec<UnaryOverload> {
        vec![
            UnaryOverload::new(UnaryOp::Not, Kind::Bool, |_, v| Ok(Value::Bool(!expect_bool(v)?))),
            UnaryOverload::new(UnaryOp::Neg, Kind::Int, |_, v| {
                expect_int(v)?
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| overflow("integer negation overflow"))
            }),
            UnaryOverload::new(UnaryOp::Neg, Kind::Double, |_, v| {
                Ok(Value::Double(-expect_double(v)?))
            }),
            UnaryOverload::new(UnaryOp::Neg, Kind::Duration, |_, v| {
                expect_duration(v)?
                    .checked_neg()
                    .map(Value::Duration)
                    .ok_or_else(|| out_of_range("duration"))
            }),
        ]
    }

    fn functions(&self) -> Vec<Function> {
        let mut funcs = vec![
            size(),
            contains(),
            string_predicate("startsWith", |s, p| s.starts_with(p)),
            string_predicate("endsWith", |s, p| s.ends_with(p)),
            matches(),
            to_int(),
            to_uint(),
            to_double(),
            to_string(),
            to_bytes(),
            to_bool(),
            to_timestamp(),
            to_duration(),
            type_of(),
        ];
        funcs.extend(timestamp_accessors());
        funcs.extend(duration_accessors());
        funcs
    }
}

fn overflow(message: &str) -> Error {
    EvalError::overflow(message).into()
}

fn out_of_range(what: &str) -> Error {
    EvalError::out_of_range(format!("{} out of range", what)).into()
}

// ==================== Arithmetic ====================

fn int_arithmetic(ops: &mut Vec<BinaryOverload>) {
    ops.push(BinaryOverload::new(BinaryOp::Add, Kind::Int, Kind::Int, |_, l, r| {
        expect_int(l)?
            .checked_add(expect_int(r)?)
            .map(Value::Int)
            .ok_or_else(|| overflow("integer addition overflow"))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Sub, Kind::Int, Kind::Int, |_, l, r| {
        expect_int(l)?
            .checked_sub(expect_int(r)?)
            .map(Value::Int)
            .ok_or_else(|| overflow("integer subtraction overflow"))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Mul, Kind::Int, Kind::Int, |_, l, r| {
        expect_int(l)?
            .checked_mul(expect_int(r)?)
            .map(Value::Int)
            .ok_or_else(|| overflow("integer multiplication overflow"))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Div, Kind::Int, Kind::Int, |_, l, r| {
        let (a, b) = (expect_int(l)?, expect_int(r)?);
        if b == 0 {
            return Err(EvalError::division_by_zero().into());
        }
        a.checked_div(b)
            .map(Value::Int)
            .ok_or_else(|| overflow("integer division overflow"))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Mod, Kind::Int, Kind::Int, |_, l, r| {
        let (a, b) = (expect_int(l)?, expect_int(r)?);
        if b == 0 {
            return Err(EvalError::modulo_by_zero().into());
        }
        a.checked_rem(b)
            .map(Value::Int)
            .ok_or_else(|| overflow("integer modulo overflow"))
    }));
}

fn uint_arithmetic(ops: &mut Vec<BinaryOverload>) {
    ops.push(BinaryOverload::new(BinaryOp::Add, Kind::UInt, Kind::UInt, |_, l, r| {
        Ok(Value::UInt(expect_uint(l)? + expect_uint(r)?))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Sub, Kind::UInt, Kind::UInt, |_, l, r| {
        let (a, b) = (expect_uint(l)?, expect_uint(r)?);
        if a < b {
            return Err(overflow("unsigned subtraction overflow"));
        }
        Ok(Value::UInt(a - b))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Mul, Kind::UInt, Kind::UInt, |_, l, r| {
        Ok(Value::UInt(expect_uint(l)? * expect_uint(r)?))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Div, Kind::UInt, Kind::UInt, |_, l, r| {
        let (a, b) = (expect_uint(l)?, expect_uint(r)?);
        if b.is_zero() {
            return Err(EvalError::division_by_zero().into());
        }
        Ok(Value::UInt(a / b))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Mod, Kind::UInt, Kind::UInt, |_, l, r| {
        let (a, b) = (expect_uint(l)?, expect_uint(r)?);
        if b.is_zero() {
            return Err(EvalError::modulo_by_zero().into());
        }
        Ok(Value::UInt(a % b))
    }));
}

fn double_arithmetic(ops: &mut Vec<BinaryOverload>) {
    let table: [(BinaryOp, fn(f64, f64) -> f64); 4] = [
        (BinaryOp::Add, |a, b| a + b),
        (BinaryOp::Sub, |a, b| a - b),
        (BinaryOp::Mul, |a, b| a * b),
        (BinaryOp::Div, |a, b| a / b),
    ];
    for (op, apply) in table {
        ops.push(BinaryOverload::new(op, Kind::Double, Kind::Double, move |_, l, r| {
            Ok(Value::Double(apply(expect_double(l)?, expect_double(r)?)))
        }));
    }
}

fn concatenation(ops: &mut Vec<BinaryOverload>) {
    ops.push(BinaryOverload::new(BinaryOp::Add, Kind::String, Kind::String, |_, l, r| {
        let (a, b) = (expect_str(l)?, expect_str(r)?);
        let mut joined = String::with_capacity(a.len() + b.len());
        joined.push_str(a);
        joined.push_str(b);
        Ok(Value::string(joined))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Add, Kind::Bytes, Kind::Bytes, |_, l, r| {
        Ok(Value::bytes([expect_bytes(l)?, expect_bytes(r)?].concat()))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Add, Kind::List, Kind::List, |_, l, r| {
        let (a, b) = (expect_list(l)?, expect_list(r)?);
        let mut joined = Vec::with_capacity(a.len() + b.len());
        joined.extend_from_slice(a);
        joined.extend_from_slice(b);
        Ok(Value::list(joined))
    }));
}

fn time_arithmetic(ops: &mut Vec<BinaryOverload>) {
    ops.push(BinaryOverload::new(BinaryOp::Add, Kind::Timestamp, Kind::Duration, |_, l, r| {
        shift(expect_timestamp(l)?, &expect_duration(r)?)
    }));
    ops.push(BinaryOverload::new(BinaryOp::Add, Kind::Duration, Kind::Timestamp, |_, l, r| {
        shift(expect_timestamp(r)?, &expect_duration(l)?)
    }));
    ops.push(BinaryOverload::new(BinaryOp::Add, Kind::Duration, Kind::Duration, |_, l, r| {
        expect_duration(l)?
            .checked_add(&expect_duration(r)?)
            .map(Value::Duration)
            .ok_or_else(|| out_of_range("duration"))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Sub, Kind::Timestamp, Kind::Duration, |_, l, r| {
        expect_timestamp(l)?
            .checked_sub(&expect_duration(r)?)
            .map(Value::Timestamp)
            .ok_or_else(|| out_of_range("timestamp"))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Sub, Kind::Timestamp, Kind::Timestamp, |_, l, r| {
        expect_timestamp(l)?
            .checked_since(&expect_timestamp(r)?)
            .map(Value::Duration)
            .ok_or_else(|| out_of_range("duration"))
    }));
    ops.push(BinaryOverload::new(BinaryOp::Sub, Kind::Duration, Kind::Duration, |_, l, r| {
        expect_duration(l)?
            .checked_sub(&expect_duration(r)?)
            .map(Value::Duration)
            .ok_or_else(|| out_of_range("duration"))
    }));
}

fn shift(ts: Timestamp, by: &Duration) -> Result<Value> {
    ts.checked_add(by)
        .map(Value::Timestamp)
        .ok_or_else(|| out_of_range("timestamp"))
}

// ==================== Comparison ====================

const NUMERIC: [Kind; 3] = [Kind::Int, Kind::UInt, Kind::Double];

/// Same-kind pairs for `kinds` plus every mixed numeric pair.
fn comparable_pairs(kinds: &[Kind]) -> Vec<(Kind, Kind)> {
    let mut pairs: Vec<(Kind, Kind)> = kinds.iter().map(|k| (k.clone(), k.clone())).collect();
    for left in &NUMERIC {
        for right in &NUMERIC {
            if left != right {
                pairs.push((left.clone(), right.clone()));
            }
        }
    }
    pairs
}

fn ordering(ops: &mut Vec<BinaryOverload>) {
    let orderable = [
        Kind::Bool,
        Kind::Int,
        Kind::UInt,
        Kind::Double,
        Kind::String,
        Kind::Bytes,
        Kind::Timestamp,
        Kind::Duration,
    ];
    let table: [(BinaryOp, fn(Ordering) -> bool); 4] = [
        (BinaryOp::Lt, Ordering::is_lt),
        (BinaryOp::Le, Ordering::is_le),
        (BinaryOp::Gt, Ordering::is_gt),
        (BinaryOp::Ge, Ordering::is_ge),
    ];
    for (left, right) in comparable_pairs(&orderable) {
        for (op, holds) in table {
            ops.push(BinaryOverload::new(op, left.clone(), right.clone(), move |_, l, r| {
                // NaN is unordered: every comparison with it is false.
                Ok(Value::Bool(l.compare(r).is_some_and(holds)))
            }));
        }
    }
}

fn equality(ops: &mut Vec<BinaryOverload>) {
    for (left, right) in comparable_pairs(&Kind::CORE) {
        ops.push(BinaryOverload::new(BinaryOp::Eq, left.clone(), right.clone(), |_, l, r| {
            Ok(Value::Bool(l == r))
        }));
        ops.push(BinaryOverload::new(BinaryOp::Ne, left, right, |_, l, r| Ok(Value::Bool(l != r))));
    }
    for kind in Kind::CORE.iter().filter(|k| **k != Kind::Null) {
        for (left, right) in [(Kind::Null, kind.clone()), (kind.clone(), Kind::Null)] {
            ops.push(BinaryOverload::new(BinaryOp::Eq, left.clone(), right.clone(), |_, _, _| {
                Ok(Value::Bool(false))
            }));
            ops.push(BinaryOverload::new(BinaryOp::Ne, left, right, |_, _, _| Ok(Value::Bool(true))));
        }
    }
}

fn membership(ops: &mut Vec<BinaryOverload>) {
    for kind in Kind::CORE {
        ops.push(BinaryOverload::new(BinaryOp::In, kind, Kind::List, |_, l, r| {
            Ok(Value::Bool(expect_list(r)?.iter().any(|item| item == l)))
        }));
    }
    for kind in [Kind::Bool, Kind::Int, Kind::UInt, Kind::Double, Kind::String] {
        ops.push(BinaryOverload::new(BinaryOp::In, kind, Kind::Map, |_, l, r| {
            Ok(Value::Bool(expect_map(r)?.lookup(l).is_some()))
        }));
    }
}

// ==================== Functions ====================

fn size() -> Function {
    Function::new("size")
        .with_overload(vec![Kind::String], |_, args| {
            Ok(Value::Int(expect_str(arg(args, 0)?)?.chars().count() as i64))
        })
        .with_overload(vec![Kind::Bytes], |_, args| {
            Ok(Value::Int(expect_bytes(arg(args, 0)?)?.len() as i64))
        })
        .with_overload(vec![Kind::List], |_, args| {
            Ok(Value::Int(expect_list(arg(args, 0)?)?.len() as i64))
        })
        .with_overload(vec![Kind::Map], |_, args| {
            Ok(Value::Int(expect_map(arg(args, 0)?)?.len() as i64))
        })
}

fn contains() -> Function {
    let mut function = Function::new("contains").with_overload(
        vec![Kind::String, Kind::String],
        |_, args| {
            let (s, sub) = (expect_str(arg(args, 0)?)?, expect_str(arg(args, 1)?)?);
            Ok(Value::Bool(s.contains(sub)))
        },
    );
    for kind in Kind::CORE {
        function = function.with_overload(vec![Kind::List, kind], |_, args| {
            let needle = arg(args, 1)?;
            Ok(Value::Bool(
                expect_list(arg(args, 0)?)?.iter().any(|item| item == needle),
            ))
        });
    }
    function
}

fn string_predicate(name: &str, test: fn(&str, &str) -> bool) -> Function {
    Function::new(name).with_overload(vec![Kind::String, Kind::String], move |_, args| {
        let (s, other) = (expect_str(arg(args, 0)?)?, expect_str(arg(args, 1)?)?);
        Ok(Value::Bool(test(s, other)))
    })
}

fn matches() -> Function {
    Function::new("matches").with_overload(vec![Kind::String, Kind::String], |_, args| {
        let (s, pattern) = (expect_str(arg(args, 0)?)?, expect_str(arg(args, 1)?)?);
        let re = Regex::new(pattern).map_err(|e| {
            EvalError::invalid_argument(format!("invalid regex '{}': {}", pattern, e))
        })?;
        Ok(Value::Bool(re.is_match(s)))
    })
}

// ==================== Conversions ====================

/// Lower bound of the `double` values `int()` accepts, -2^63.
const INT_MIN_DOUBLE: f64 = -9_223_372_036_854_775_808.0;

fn to_int() -> Function {
    Function::new("int")
        .with_overload(vec![Kind::Int], |_, args| Ok(arg(args, 0)?.clone()))
        .with_overload(vec![Kind::UInt], |_, args| {
            expect_uint(arg(args, 0)?)?
                .to_i64()
                .map(Value::Int)
                .ok_or_else(|| overflow("uint to int overflow"))
        })
        .with_overload(vec![Kind::Double], |_, args| {
            let d = expect_double(arg(args, 0)?)?.trunc();
            if d.is_nan() || d < INT_MIN_DOUBLE || d >= -INT_MIN_DOUBLE {
                return Err(overflow("double to int overflow"));
            }
            Ok(Value::Int(d as i64))
        })
        .with_overload(vec![Kind::String], |_, args| {
            expect_str(arg(args, 0)?)?
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| EvalError::invalid_conversion("string", "int").into())
        })
        .with_overload(vec![Kind::Timestamp], |_, args| {
            Ok(Value::Int(expect_timestamp(arg(args, 0)?)?.seconds))
        })
}

fn to_uint() -> Function {
    Function::new("uint")
        .with_overload(vec![Kind::UInt], |_, args| Ok(arg(args, 0)?.clone()))
        .with_overload(vec![Kind::Int], |_, args| {
            u64::try_from(expect_int(arg(args, 0)?)?)
                .map(Value::uint)
                .map_err(|_| overflow("negative int to uint"))
        })
        .with_overload(vec![Kind::Double], |_, args| {
            let d = expect_double(arg(args, 0)?)?.trunc();
            if !d.is_finite() || d < 0.0 {
                return Err(overflow("double to uint overflow"));
            }
            BigUint::from_f64(d)
                .map(Value::UInt)
                .ok_or_else(|| overflow("double to uint overflow"))
        })
        .with_overload(vec![Kind::String], |_, args| {
            expect_str(arg(args, 0)?)?
                .parse::<BigUint>()
                .map(Value::UInt)
                .map_err(|_| EvalError::invalid_conversion("string", "uint").into())
        })
}

fn to_double() -> Function {
    Function::new("double")
        .with_overload(vec![Kind::Double], |_, args| Ok(arg(args, 0)?.clone()))
        .with_overload(vec![Kind::Int], |_, args| {
            Ok(Value::Double(expect_int(arg(args, 0)?)? as f64))
        })
        .with_overload(vec![Kind::UInt], |_, args| {
            Ok(Value::Double(
                expect_uint(arg(args, 0)?)?.to_f64().unwrap_or(f64::INFINITY),
            ))
        })
        .with_overload(vec![Kind::String], |_, args| {
            expect_str(arg(args, 0)?)?
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| EvalError::invalid_conversion("string", "double").into())
        })
}

fn to_string() -> Function {
    Function::new("string")
        .with_overload(vec![Kind::String], |_, args| Ok(arg(args, 0)?.clone()))
        .with_overload(vec![Kind::Int], |_, args| {
            Ok(Value::string(expect_int(arg(args, 0)?)?.to_string()))
        })
        .with_overload(vec![Kind::UInt], |_, args| {
            Ok(Value::string(expect_uint(arg(args, 0)?)?.to_string()))
        })
        .with_overload(vec![Kind::Double], |_, args| {
            Ok(Value::string(format_double(expect_double(arg(args, 0)?)?)))
        })
        .with_overload(vec![Kind::Bool], |_, args| {
            Ok(Value::string(expect_bool(arg(args, 0)?)?.to_string()))
        })
        .with_overload(vec![Kind::Bytes], |_, args| {
            std::str::from_utf8(expect_bytes(arg(args, 0)?)?)
                .map(Value::string)
                .map_err(|_| EvalError::invalid_conversion("bytes", "string").into())
        })
        .with_overload(vec![Kind::Timestamp], |_, args| {
            Ok(Value::string(format_timestamp(&expect_timestamp(arg(args, 0)?)?)))
        })
        .with_overload(vec![Kind::Duration], |_, args| {
            Ok(Value::string(format_duration(&expect_duration(arg(args, 0)?)?)))
        })
}

fn to_bytes() -> Function {
    Function::new("bytes")
        .with_overload(vec![Kind::Bytes], |_, args| Ok(arg(args, 0)?.clone()))
        .with_overload(vec![Kind::String], |_, args| {
            Ok(Value::bytes(expect_str(arg(args, 0)?)?.as_bytes()))
        })
}

fn to_bool() -> Function {
    Function::new("bool")
        .with_overload(vec![Kind::Bool], |_, args| Ok(arg(args, 0)?.clone()))
        .with_overload(vec![Kind::String], |_, args| {
            match expect_str(arg(args, 0)?)? {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(EvalError::invalid_conversion("string", "bool").into()),
            }
        })
}

fn to_timestamp() -> Function {
    Function::new("timestamp")
        .with_overload(vec![Kind::Timestamp], |_, args| Ok(arg(args, 0)?.clone()))
        .with_overload(vec![Kind::String], |_, args| {
            parse_timestamp(expect_str(arg(args, 0)?)?)
                .map(Value::Timestamp)
                .map_err(|e| EvalError::invalid_argument(e).into())
        })
        .with_overload(vec![Kind::Int], |_, args| {
            let ts = Timestamp::from_seconds(expect_int(arg(args, 0)?)?);
            if ts.is_valid() {
                Ok(Value::Timestamp(ts))
            } else {
                Err(out_of_range("timestamp"))
            }
        })
}

fn to_duration() -> Function {
    Function::new("duration")
        .with_overload(vec![Kind::Duration], |_, args| Ok(arg(args, 0)?.clone()))
        .with_overload(vec![Kind::String], |_, args| {
            parse_duration(expect_str(arg(args, 0)?)?)
                .map(Value::Duration)
                .map_err(|e| EvalError::invalid_argument(e).into())
        })
        .with_overload(vec![Kind::Int], |_, args| {
            let d = Duration::from_seconds(expect_int(arg(args, 0)?)?);
            if d.is_valid() {
                Ok(Value::Duration(d))
            } else {
                Err(out_of_range("duration"))
            }
        })
}

fn type_of() -> Function {
    Kind::CORE
        .into_iter()
        .fold(Function::new("type"), |function, kind| {
            let name = Value::string(kind.name());
            function.with_overload(vec![kind], move |_, _| Ok(name.clone()))
        })
}

// ==================== Timestamp and duration accessors ====================

fn timestamp_accessors() -> Vec<Function> {
    CALENDAR_FIELDS
        .into_iter()
        .map(|(name, field)| {
            Function::new(name)
                .with_overload(vec![Kind::Timestamp], move |_, args| read_field(field, args))
                .with_overload(vec![Kind::Timestamp, Kind::String], move |_, args| {
                    read_field(field, args)
                })
        })
        .collect()
}

/// Reads `field` in UTC, or in the zone named by the optional second argument.
fn read_field(field: CalendarField, args: &[Value]) -> Result<Value> {
    let at = expect_timestamp(arg(args, 0)?)?
        .to_datetime_utc()
        .ok_or_else(|| out_of_range("timestamp"))?;
    let offset = match args.get(1) {
        Some(zone) => zone_offset(expect_str(zone)?, &at).map_err(EvalError::invalid_argument)?,
        None => Utc.fix(),
    };
    Ok(Value::Int(field(&at.with_timezone(&offset))))
}

fn duration_accessors() -> Vec<Function> {
    let table: [(&str, fn(&Duration) -> i64); 4] = [
        ("getHours", Duration::total_hours),
        ("getMinutes", Duration::total_minutes),
        ("getSeconds", |d| d.seconds),
        ("getMilliseconds", Duration::total_milliseconds),
    ];
    table
        .into_iter()
        .map(|(name, total)| {
            Function::new(name).with_overload(vec![Kind::Duration], move |_, args| {
                Ok(Value::Int(total(&expect_duration(arg(args, 0)?)?)))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalErrorKind;
    use crate::runtime::Runtime;

    fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
        let runtime = Runtime::standard().unwrap();
        runtime
            .operators()
            .dispatch_binary(op, &(0..0), &l, &r)
            .map(|out| out.value)
    }

    fn call(name: &str, args: &[Value]) -> Result<Value> {
        let runtime = Runtime::standard().unwrap();
        runtime.functions().call(name, &(0..0), args).map(|out| out.value)
    }

    fn eval_kind(result: Result<Value>) -> EvalErrorKind {
        result.unwrap_err().as_eval().map(|e| e.kind).unwrap()
    }

    #[test]
    fn test_standard_library_has_no_internal_conflicts() {
        let runtime = Runtime::standard().unwrap();
        assert!(runtime.functions().len() > 20);
    }

    #[test]
    fn test_int_arithmetic_is_checked() {
        assert_eq!(binary(BinaryOp::Add, Value::Int(2), Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(
            eval_kind(binary(BinaryOp::Add, Value::Int(i64::MAX), Value::Int(1))),
            EvalErrorKind::Overflow
        );
        assert_eq!(
            eval_kind(binary(BinaryOp::Div, Value::Int(1), Value::Int(0))),
            EvalErrorKind::DivisionByZero
        );
        assert_eq!(
            eval_kind(binary(BinaryOp::Mod, Value::Int(1), Value::Int(0))),
            EvalErrorKind::ModuloByZero
        );
        assert_eq!(
            eval_kind(binary(BinaryOp::Div, Value::Int(i64::MIN), Value::Int(-1))),
            EvalErrorKind::Overflow
        );
    }

    #[test]
    fn test_uint_is_unbounded_but_never_negative() {
        let big = binary(BinaryOp::Mul, Value::uint(u64::MAX), Value::uint(u64::MAX)).unwrap();
        assert!(big.as_uint().unwrap() > &BigUint::from(u64::MAX));

        assert_eq!(
            eval_kind(binary(BinaryOp::Sub, Value::uint(3), Value::uint(5))),
            EvalErrorKind::Overflow
        );
        assert_eq!(binary(BinaryOp::Sub, Value::uint(5), Value::uint(3)).unwrap(), Value::uint(2));
    }

    #[test]
    fn test_mixed_numeric_comparison() {
        assert_eq!(binary(BinaryOp::Lt, Value::Int(-1), Value::uint(0)).unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOp::Eq, Value::Int(1), Value::Double(1.0)).unwrap(), Value::Bool(true));
        assert_eq!(
            binary(BinaryOp::Ge, Value::Double(f64::NAN), Value::Int(0)).unwrap(),
            Value::Bool(false)
        );
        // No implicit arithmetic across numeric kinds.
        assert_eq!(
            eval_kind(binary(BinaryOp::Add, Value::Int(1), Value::Double(1.0))),
            EvalErrorKind::NoMatchingOverload
        );
    }

    #[test]
    fn test_null_equality_and_unrelated_kinds() {
        assert_eq!(binary(BinaryOp::Eq, Value::Null, Value::Int(0)).unwrap(), Value::Bool(false));
        assert_eq!(binary(BinaryOp::Ne, Value::string("a"), Value::Null).unwrap(), Value::Bool(true));
        assert_eq!(
            eval_kind(binary(BinaryOp::Eq, Value::string("1"), Value::Int(1))),
            EvalErrorKind::NoMatchingOverload
        );
        assert_eq!(
            eval_kind(binary(BinaryOp::Lt, Value::string("a"), Value::Int(1))),
            EvalErrorKind::NoMatchingOverload
        );
    }

    #[test]
    fn test_in_list_and_map() {
        let list = Value::list(vec![Value::Int(1), Value::string("two")]);
        assert_eq!(binary(BinaryOp::In, Value::uint(1), list.clone()).unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOp::In, Value::Null, list).unwrap(), Value::Bool(false));

        let map = Value::map([(crate::value::MapKey::from("k"), Value::Null)]);
        assert_eq!(binary(BinaryOp::In, Value::string("k"), map).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_time_arithmetic() {
        let ts = call("timestamp", &[Value::string("2024-01-01T00:00:00Z")]).unwrap();
        let hour = call("duration", &[Value::string("1h")]).unwrap();
        let later = binary(BinaryOp::Add, ts.clone(), hour.clone()).unwrap();
        assert_eq!(
            call("string", &[later.clone()]).unwrap(),
            Value::string("2024-01-01T01:00:00Z")
        );
        assert_eq!(binary(BinaryOp::Sub, later, ts).unwrap(), hour);

        let max = call("timestamp", &[Value::string("9999-12-31T23:59:59Z")]).unwrap();
        assert_eq!(eval_kind(binary(BinaryOp::Add, max, hour)), EvalErrorKind::OutOfRange);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("int", &[Value::Double(-2.7)]).unwrap(), Value::Int(-2));
        assert_eq!(
            eval_kind(call("int", &[Value::Double(1e19)])),
            EvalErrorKind::Overflow
        );
        assert_eq!(
            eval_kind(call("uint", &[Value::Int(-1)])),
            EvalErrorKind::Overflow
        );
        assert_eq!(
            call("uint", &[Value::string("18446744073709551616")]).unwrap(),
            Value::UInt(BigUint::from(u64::MAX) + 1u32)
        );
        assert_eq!(call("string", &[Value::Double(2.0)]).unwrap(), Value::string("2.0"));
        assert_eq!(
            eval_kind(call("bool", &[Value::string("yes")])),
            EvalErrorKind::InvalidConversion
        );
        assert_eq!(call("type", &[Value::Null]).unwrap(), Value::string("null_type"));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("size", &[Value::string("héllo")]).unwrap(), Value::Int(5));
        assert_eq!(
            call("matches", &[Value::string("abc123"), Value::string(r"\d+$")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_kind(call("matches", &[Value::string("a"), Value::string("(")])),
            EvalErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_timestamp_accessors_with_timezone() {
        let ts = call("timestamp", &[Value::string("2024-03-10T02:30:00Z")]).unwrap();
        assert_eq!(call("getHours", &[ts.clone()]).unwrap(), Value::Int(2));
        assert_eq!(
            call("getHours", &[ts.clone(), Value::string("America/New_York")]).unwrap(),
            Value::Int(21)
        );
        assert_eq!(call("getMonth", &[ts.clone()]).unwrap(), Value::Int(2));
        assert_eq!(
            eval_kind(call("getHours", &[ts, Value::string("Mars/Olympus")])),
            EvalErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_duration_accessors_are_totals() {
        let d = call("duration", &[Value::string("1h30m")]).unwrap();
        assert_eq!(call("getHours", &[d.clone()]).unwrap(), Value::Int(1));
        assert_eq!(call("getMinutes", &[d.clone()]).unwrap(), Value::Int(90));
        assert_eq!(call("getMilliseconds", &[d]).unwrap(), Value::Int(5_400_000));
    }
}
