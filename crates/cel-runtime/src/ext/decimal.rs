//! Fixed-point decimals backed by `rust_decimal`.
//!
//! `Decimal` is a message type (also reachable as `decimal` and
//! `cel.Decimal`) with a single string field `value`, so both
//! `decimal("1.25")` and `Decimal{value: "1.25"}` build one.
//!
//! Arithmetic and comparison are registered for decimal with decimal, int
//! and double on either side. Doubles convert exactly as `rust_decimal`
//! parses them; NaN and infinities are rejected. Membership (`in` and
//! `list.contains`) with a decimal needle uses the same numeric equality, so
//! `decimal("2") in [2]` holds.

use std::any::Any;
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::{arg, expect_list, expect_str};
use crate::error::{Error, EvalError, ResolveError, Result};
use crate::extension::Extension;
use crate::functions::Function;
use crate::operators::{BinaryOverload, UnaryOverload};
use crate::resolver::ValueResolver;
use crate::value::{CelMessage, FromCelFields, Kind, MessageError, MessageFields, MessageType, Value};
use cel_runtime_ast::{BinaryOp, UnaryOp};

/// A decimal number as a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalValue(pub Decimal);

impl DecimalValue {
    pub fn kind() -> Kind {
        Kind::message(Self::TYPE_NAME)
    }
}

impl CelMessage for DecimalValue {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn to_fields(&self) -> MessageFields {
        MessageFields::new().with("value", self.0.to_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn compare(&self, other: &dyn CelMessage) -> Option<Ordering> {
        other
            .downcast_ref::<DecimalValue>()
            .map(|other| self.0.cmp(&other.0))
    }
}

impl FromCelFields for DecimalValue {
    const TYPE_NAME: &'static str = "Decimal";

    fn from_cel_fields(fields: &MessageFields) -> Result<Self, MessageError> {
        fields.reject_unknown(&["value"])?;
        let text = fields.get_string("value")?;
        parse(text).map(DecimalValue).map_err(MessageError::Invalid)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::message(DecimalValue(d))
    }
}

fn parse(text: &str) -> Result<Decimal, String> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| format!("invalid decimal '{}': {}", text, e))
}

/// Decimal view of a decimal, int or double operand.
fn operand(v: &Value) -> Result<Decimal> {
    match v {
        Value::Int(i) => Ok(Decimal::from(*i)),
        Value::Double(d) => {
            Decimal::try_from(*d).map_err(|_| EvalError::invalid_conversion("double", "decimal").into())
        }
        Value::Message(m) => m
            .downcast_ref::<DecimalValue>()
            .map(|d| d.0)
            .ok_or_else(|| Error::unexpected_kind("decimal operator", &DecimalValue::kind(), &v.kind())),
        other => Err(Error::unexpected_kind(
            "decimal operator",
            &DecimalValue::kind(),
            &other.kind(),
        )),
    }
}

fn operand_pairs() -> [(Kind, Kind); 5] {
    let decimal = DecimalValue::kind();
    [
        (decimal.clone(), decimal.clone()),
        (decimal.clone(), Kind::Int),
        (Kind::Int, decimal.clone()),
        (decimal.clone(), Kind::Double),
        (Kind::Double, decimal),
    ]
}

type Arithmetic = fn(Decimal, Decimal) -> Result<Decimal>;

fn arithmetic(a: Decimal, b: Decimal, apply: fn(Decimal, Decimal) -> Option<Decimal>) -> Result<Decimal> {
    apply(a, b).ok_or_else(|| EvalError::overflow("decimal overflow").into())
}

const ARITHMETIC: [(BinaryOp, Arithmetic); 5] = [
    (BinaryOp::Add, |a, b| arithmetic(a, b, Decimal::checked_add)),
    (BinaryOp::Sub, |a, b| arithmetic(a, b, Decimal::checked_sub)),
    (BinaryOp::Mul, |a, b| arithmetic(a, b, Decimal::checked_mul)),
    (BinaryOp::Div, |a, b| {
        if b.is_zero() {
            return Err(EvalError::division_by_zero().into());
        }
        arithmetic(a, b, Decimal::checked_div)
    }),
    (BinaryOp::Mod, |a, b| {
        if b.is_zero() {
            return Err(EvalError::modulo_by_zero().into());
        }
        arithmetic(a, b, Decimal::checked_rem)
    }),
];

const COMPARISONS: [(BinaryOp, fn(Ordering) -> bool); 6] = [
    (BinaryOp::Eq, Ordering::is_eq),
    (BinaryOp::Ne, Ordering::is_ne),
    (BinaryOp::Lt, Ordering::is_lt),
    (BinaryOp::Le, Ordering::is_le),
    (BinaryOp::Gt, Ordering::is_gt),
    (BinaryOp::Ge, Ordering::is_ge),
];

/// Whether `items` holds a value numerically equal to `needle`.
fn holds(items: &Value, needle: &Value) -> Result<Value> {
    let needle = operand(needle)?;
    let items = expect_list(items)?;
    Ok(Value::Bool(
        items.iter().any(|item| operand(item).is_ok_and(|item| item == needle)),
    ))
}

/// Registers the `Decimal` type, its operators and conversions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalExtension;

impl Extension for DecimalExtension {
    fn name(&self) -> &str {
        "decimal"
    }

    fn functions(&self) -> Vec<Function> {
        let decimal = DecimalValue::kind();
        vec![
            Function::new("decimal")
                .with_overload(vec![decimal.clone()], |_, args| Ok(arg(args, 0)?.clone()))
                .with_overload(vec![Kind::String], |_, args| {
                    parse(expect_str(arg(args, 0)?)?)
                        .map(Value::from)
                        .map_err(|e| EvalError::invalid_argument(e).into())
                })
                .with_overload(vec![Kind::Int], |_, args| operand(arg(args, 0)?).map(Value::from))
                .with_overload(vec![Kind::Double], |_, args| {
                    operand(arg(args, 0)?).map(Value::from)
                }),
            Function::new("string").with_overload(vec![decimal.clone()], |_, args| {
                Ok(Value::string(operand(arg(args, 0)?)?.normalize().to_string()))
            }),
            Function::new("double").with_overload(vec![decimal.clone()], |_, args| {
                operand(arg(args, 0)?)?
                    .to_f64()
                    .map(Value::Double)
                    .ok_or_else(|| EvalError::invalid_conversion("decimal", "double").into())
            }),
            Function::new("contains").with_overload(vec![Kind::List, decimal.clone()], |_, args| {
                holds(arg(args, 0)?, arg(args, 1)?)
            }),
            Function::new("int").with_overload(vec![decimal], |_, args| {
                operand(arg(args, 0)?)?
                    .trunc()
                    .to_i64()
                    .map(Value::Int)
                    .ok_or_else(|| EvalError::overflow("decimal to int overflow").into())
            }),
        ]
    }

    fn binary_operators(&self) -> Vec<BinaryOverload> {
        let mut ops = vec![BinaryOverload::new(
            BinaryOp::In,
            DecimalValue::kind(),
            Kind::List,
            |_, l, r| holds(r, l),
        )];
        for (left, right) in operand_pairs() {
            for (op, apply) in ARITHMETIC {
                ops.push(BinaryOverload::new(op, left.clone(), right.clone(), move |_, l, r| {
                    apply(operand(l)?, operand(r)?).map(Value::from)
                }));
            }
            for (op, holds) in COMPARISONS {
                ops.push(BinaryOverload::new(op, left.clone(), right.clone(), move |_, l, r| {
                    Ok(Value::Bool(holds(operand(l)?.cmp(&operand(r)?))))
                }));
            }
        }
        ops
    }

    fn unary_operators(&self) -> Vec<UnaryOverload> {
        vec![UnaryOverload::new(UnaryOp::Neg, DecimalValue::kind(), |_, v| {
            Ok(Value::from(-operand(v)?))
        })]
    }

    fn message_types(&self) -> Vec<MessageType> {
        vec![MessageType::of::<DecimalValue>(&["decimal", "cel.Decimal"])]
    }

    fn value_resolvers(&self) -> Vec<Arc<dyn ValueResolver>> {
        vec![Arc::new(DecimalResolver)]
    }
}

/// Resolves host `rust_decimal::Decimal` values.
struct DecimalResolver;

impl ValueResolver for DecimalResolver {
    fn can_resolve(&self, host: &dyn Any) -> bool {
        host.is::<Decimal>()
    }

    fn resolve(&self, host: &dyn Any) -> Result<Value, ResolveError> {
        host.downcast_ref::<Decimal>()
            .map(|d| Value::from(*d))
            .ok_or_else(|| ResolveError::IncompatibleValue {
                type_name: "rust_decimal::Decimal".to_string(),
            })
    }
}
