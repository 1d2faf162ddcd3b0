//! List extension.
//!
//! # Functions
//!
//! - `chunk(list, size)` - consecutive sublists of at most `size` elements
//! - `sort(list)` - ascending; every pair of elements must be ordered
//! - `reverse(list)`
//! - `distinct(list)` - first occurrence of each element, by CEL equality
//! - `flatten(list)` / `flatten(list, depth)` - splice nested lists
//! - `range(n)` - `[0, 1, ..., n - 1]`
//! - `sum(list)` - sum of same-kind numbers; `0` for an empty list

use std::cmp::Ordering;

use num_bigint::BigUint;

use super::{arg, expect_int, expect_list};
use crate::error::{EvalError, Result};
use crate::extension::Extension;
use crate::functions::Function;
use crate::value::{Kind, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct ListsExtension;

impl Extension for ListsExtension {
    fn name(&self) -> &str {
        "lists"
    }

    fn functions(&self) -> Vec<Function> {
        vec![
            Function::new("chunk").with_overload(vec![Kind::List, Kind::Int], |_, args| {
                let items = expect_list(arg(args, 0)?)?;
                let size = expect_int(arg(args, 1)?)?;
                let size = usize::try_from(size)
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| {
                        EvalError::invalid_argument(format!("chunk size must be positive, got {}", size))
                    })?;
                Ok(Value::list(
                    items.chunks(size).map(Value::list).collect::<Vec<_>>(),
                ))
            }),
            Function::new("sort").with_overload(vec![Kind::List], |_, args| {
                sort(expect_list(arg(args, 0)?)?)
            }),
            Function::new("reverse").with_overload(vec![Kind::List], |_, args| {
                let items = expect_list(arg(args, 0)?)?;
                Ok(Value::list(items.iter().rev().cloned().collect::<Vec<_>>()))
            }),
            Function::new("distinct").with_overload(vec![Kind::List], |_, args| {
                let mut unique: Vec<Value> = Vec::new();
                for item in expect_list(arg(args, 0)?)? {
                    if !unique.contains(item) {
                        unique.push(item.clone());
                    }
                }
                Ok(Value::list(unique))
            }),
            Function::new("flatten")
                .with_overload(vec![Kind::List], |_, args| {
                    Ok(Value::list(flatten(expect_list(arg(args, 0)?)?, 1)))
                })
                .with_overload(vec![Kind::List, Kind::Int], |_, args| {
                    let depth = expect_int(arg(args, 1)?)?;
                    let depth = usize::try_from(depth).map_err(|_| {
                        EvalError::invalid_argument(format!("flatten depth must be non-negative, got {}", depth))
                    })?;
                    Ok(Value::list(flatten(expect_list(arg(args, 0)?)?, depth)))
                }),
            Function::new("range").with_overload(vec![Kind::Int], |_, args| {
                let n = expect_int(arg(args, 0)?)?;
                if n < 0 {
                    return Err(EvalError::invalid_argument(format!("range() requires a non-negative int, got {}", n)).into());
                }
                Ok(Value::list((0..n).map(Value::Int).collect::<Vec<_>>()))
            }),
            Function::new("sum").with_overload(vec![Kind::List], |_, args| {
                sum(expect_list(arg(args, 0)?)?)
            }),
        ]
    }
}

/// Every element must order against the first, which rules out NaN and
/// mixed non-numeric kinds before `sort_by` sees a partial order.
fn sort(items: &[Value]) -> Result<Value> {
    if let Some(first) = items.first() {
        if let Some(item) = items.iter().find(|item| item.compare(first).is_none()) {
            return Err(EvalError::invalid_argument(format!(
                "sort() cannot order {} and {}",
                first.kind(),
                item.kind()
            ))
            .into());
        }
    }
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| a.compare(b).unwrap_or(Ordering::Equal));
    Ok(Value::list(sorted))
}

fn flatten(items: &[Value], depth: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::List(nested) if depth > 0 => out.extend(flatten(nested, depth - 1)),
            other => out.push(other.clone()),
        }
    }
    out
}

fn sum(items: &[Value]) -> Result<Value> {
    let Some(first) = items.first() else {
        return Ok(Value::Int(0));
    };
    let mixed = |item: &Value| {
        EvalError::invalid_argument(format!(
            "sum() requires elements of one numeric kind, got {} and {}",
            first.kind(),
            item.kind()
        ))
    };
    match first {
        Value::Int(_) => {
            let mut total: i64 = 0;
            for item in items {
                let Value::Int(i) = item else {
                    return Err(mixed(item).into());
                };
                total = total
                    .checked_add(*i)
                    .ok_or_else(|| EvalError::overflow("integer addition overflow"))?;
            }
            Ok(Value::Int(total))
        }
        Value::UInt(_) => {
            let mut total = BigUint::default();
            for item in items {
                let Value::UInt(u) = item else {
                    return Err(mixed(item).into());
                };
                total += u;
            }
            Ok(Value::UInt(total))
        }
        Value::Double(_) => {
            let mut total = 0.0;
            for item in items {
                let Value::Double(d) = item else {
                    return Err(mixed(item).into());
                };
                total += d;
            }
            Ok(Value::Double(total))
        }
        other => Err(EvalError::invalid_argument(format!(
            "sum() requires numeric elements, got {}",
            other.kind()
        ))
        .into()),
    }
}
