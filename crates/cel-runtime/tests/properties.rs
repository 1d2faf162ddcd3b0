//! Property-based tests for cel-runtime.
//!
//! These use proptest to check the algebraic guarantees of the standard
//! operators and the built-in extensions over generated operands.

mod common;

use cel_runtime::ext::DecimalValue;
use cel_runtime::{CelMessage, Environment, EvalErrorKind, FromCelFields, Value};
use cel_runtime_ast::{AstBuilder, BinaryOp};
use common::full_runtime;
use num_bigint::BigUint;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::cmp::Ordering;

fn eval(expr: cel_runtime_ast::SpannedExpr, env: &Environment) -> cel_runtime::Result<Value> {
    full_runtime().program(expr).eval(env).map(|out| out.value)
}

/// Generate a scalar value of some core kind.
fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::uint),
        (-1e12f64..1e12).prop_map(Value::Double),
        "[a-z]{0,8}".prop_map(Value::string),
        Just(Value::Null),
    ]
}

/// Generate an int, uint or double, biased toward small values (so that
/// cross-kind equalities occur) and toward the edges of the integer ranges.
fn numeric_strategy() -> impl Strategy<Value = Value> {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;
    prop_oneof![
        (-50i64..50).prop_map(Value::Int),
        (0u64..50).prop_map(Value::uint),
        (-50i64..50).prop_map(|i| Value::Double(i as f64 / 2.0)),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::uint),
        (-1e20f64..1e20).prop_map(Value::Double),
        prop::sample::select(vec![i64::MIN, i64::MIN + 1, i64::MAX - 1, i64::MAX]).prop_map(Value::Int),
        prop::sample::select(vec![(1u64 << 63) - 1, 1u64 << 63, u64::MAX - 1, u64::MAX]).prop_map(Value::uint),
        prop::sample::select(vec![-TWO_POW_63, TWO_POW_63, TWO_POW_64, -0.0, 0.0]).prop_map(Value::Double),
    ]
}

proptest! {
    #[test]
    fn uint_subtraction_is_exact_or_overflows(a in any::<u64>(), b in any::<u64>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let builder = AstBuilder::new();
        let env = Environment::new();

        let diff = eval(builder.binary(BinaryOp::Sub, builder.uint(hi), builder.uint(lo)), &env).unwrap();
        prop_assert_eq!(diff, Value::UInt(BigUint::from(hi - lo)));

        if lo < hi {
            let err = eval(builder.binary(BinaryOp::Sub, builder.uint(lo), builder.uint(hi)), &env).unwrap_err();
            prop_assert_eq!(err.as_eval().map(|e| e.kind), Some(EvalErrorKind::Overflow));
        }
    }

    #[test]
    fn value_is_in_singleton_list(v in scalar_strategy()) {
        let env = Environment::new().with("v", v.clone()).with("l", Value::list(vec![v]));
        let b = AstBuilder::new();
        let out = eval(b.binary(BinaryOp::In, b.ident("v"), b.ident("l")), &env).unwrap();
        prop_assert_eq!(out, Value::Bool(true));
    }

    #[test]
    fn in_agrees_with_element_equality(v in any::<i64>(), items in prop::collection::vec(any::<i64>(), 0..8)) {
        let expected = items.contains(&v);
        let list = Value::list(items.into_iter().map(Value::Int).collect::<Vec<_>>());
        let env = Environment::new().with("v", v).with("l", list);
        let b = AstBuilder::new();
        let out = eval(b.binary(BinaryOp::In, b.ident("v"), b.ident("l")), &env).unwrap();
        prop_assert_eq!(out, Value::Bool(expected));
    }

    #[test]
    fn absorbing_left_operand_skips_right(n in any::<i64>()) {
        let b = AstBuilder::new();
        let env = Environment::new();
        let failing = || b.binary(BinaryOp::Eq, b.binary(BinaryOp::Div, b.int(n), b.int(0)), b.int(0));

        let and = eval(b.binary(BinaryOp::And, b.bool(false), failing()), &env).unwrap();
        prop_assert_eq!(and, Value::Bool(false));
        let or = eval(b.binary(BinaryOp::Or, b.bool(true), b.ident("undefined")), &env).unwrap();
        prop_assert_eq!(or, Value::Bool(true));
    }

    #[test]
    fn sort_is_an_ordered_permutation(items in prop::collection::vec(-1000i64..1000, 0..16)) {
        let list = Value::list(items.iter().copied().map(Value::Int).collect::<Vec<_>>());
        let env = Environment::new().with("l", list);
        let b = AstBuilder::new();
        let sorted = eval(b.call("sort", vec![b.ident("l")]), &env).unwrap();

        let sorted: Vec<i64> = sorted
            .as_list()
            .unwrap()
            .iter()
            .map(|v| v.as_int().unwrap())
            .collect();
        let mut expected = items.clone();
        expected.sort();
        prop_assert_eq!(&sorted, &expected);
        prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn idempotent_calls_keep_the_flag(s in "[a-z]{0,12}") {
        let b = AstBuilder::new();
        let env = Environment::new().with("s", s.as_str());
        let program = full_runtime().program(b.call("size", vec![b.ident("s")]));
        let out = program.eval(&env).unwrap();
        prop_assert_eq!(out.value, Value::Int(s.chars().count() as i64));
        prop_assert!(out.idempotent);
    }

    #[test]
    fn decimal_fields_rebuild_the_message(mantissa in any::<i64>(), scale in 0u32..10) {
        let original = DecimalValue(Decimal::new(mantissa, scale));
        let rebuilt = DecimalValue::from_cel_fields(&original.to_fields()).unwrap();
        prop_assert_eq!(rebuilt, original);
    }

    #[test]
    fn numeric_equality_agrees_with_ordering(a in numeric_strategy(), b in numeric_strategy()) {
        prop_assert_eq!(a == b, a.compare(&b) == Some(Ordering::Equal));
        prop_assert_eq!(a.compare(&b), b.compare(&a).map(Ordering::reverse));

        let env = Environment::new().with("a", a.clone()).with("b", b.clone());
        let builder = AstBuilder::new();
        let check = |op| eval(builder.binary(op, builder.ident("a"), builder.ident("b")), &env).unwrap();
        if check(BinaryOp::Eq) == Value::Bool(true) {
            prop_assert_eq!(check(BinaryOp::Lt), Value::Bool(false));
            prop_assert_eq!(check(BinaryOp::Gt), Value::Bool(false));
        }
        prop_assert_eq!(check(BinaryOp::Eq), Value::Bool(a == b));
    }

    #[test]
    fn sort_orders_long_mixed_numeric_lists(items in prop::collection::vec(numeric_strategy(), 21..64)) {
        let env = Environment::new().with("l", Value::list(items.clone()));
        let b = AstBuilder::new();
        let sorted = eval(b.call("sort", vec![b.ident("l")]), &env).unwrap();
        let sorted = sorted.as_list().unwrap();

        prop_assert_eq!(sorted.len(), items.len());
        prop_assert!(sorted.windows(2).all(|w| w[0].compare(&w[1]) != Some(Ordering::Greater)));
        for item in &items {
            let count = |list: &[Value]| list.iter().filter(|v| *v == item).count();
            prop_assert_eq!(count(sorted), count(&items));
        }
    }
}
