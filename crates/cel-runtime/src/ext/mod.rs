//! Built-in extensions.
//!
//! [`StandardLibrary`] carries the core operators and functions and is what
//! [`RuntimeBuilder::with_standard_library`](crate::RuntimeBuilder::with_standard_library)
//! adds. The other extensions are opt-in.

mod clock;
mod decimal;
mod lists;
mod math;
mod standard;
mod strings;

pub use clock::ClockExtension;
pub use decimal::{DecimalExtension, DecimalValue};
pub use lists::ListsExtension;
pub use math::MathExtension;
pub use standard::StandardLibrary;
pub use strings::StringsExtension;

use num_bigint::BigUint;

use crate::error::{Error, Result};
use crate::value::{Duration, Kind, Timestamp, Value, ValueMap};

// Operand accessors for handlers. The registries only route values of the
// registered kinds, so a mismatch here is a wiring bug.

fn mismatch(expected: Kind, actual: &Value) -> Error {
    Error::unexpected_kind("overload", &expected, &actual.kind())
}

pub(crate) fn arg(args: &[Value], index: usize) -> Result<&Value> {
    args.get(index).ok_or_else(|| {
        Error::internal(format!(
            "overload expected argument {} but received {}",
            index,
            args.len()
        ))
    })
}

pub(crate) fn expect_bool(v: &Value) -> Result<bool> {
    v.as_bool().ok_or_else(|| mismatch(Kind::Bool, v))
}

pub(crate) fn expect_int(v: &Value) -> Result<i64> {
    match v {
        Value::Int(i) => Ok(*i),
        other => Err(mismatch(Kind::Int, other)),
    }
}

pub(crate) fn expect_uint(v: &Value) -> Result<&BigUint> {
    v.as_uint().ok_or_else(|| mismatch(Kind::UInt, v))
}

pub(crate) fn expect_double(v: &Value) -> Result<f64> {
    match v {
        Value::Double(d) => Ok(*d),
        other => Err(mismatch(Kind::Double, other)),
    }
}

pub(crate) fn expect_str(v: &Value) -> Result<&str> {
    v.as_string().ok_or_else(|| mismatch(Kind::String, v))
}

pub(crate) fn expect_bytes(v: &Value) -> Result<&[u8]> {
    v.as_bytes().ok_or_else(|| mismatch(Kind::Bytes, v))
}

pub(crate) fn expect_list(v: &Value) -> Result<&[Value]> {
    v.as_list().ok_or_else(|| mismatch(Kind::List, v))
}

pub(crate) fn expect_map(v: &Value) -> Result<&ValueMap> {
    v.as_map().ok_or_else(|| mismatch(Kind::Map, v))
}

pub(crate) fn expect_timestamp(v: &Value) -> Result<Timestamp> {
    v.as_timestamp().ok_or_else(|| mismatch(Kind::Timestamp, v))
}

pub(crate) fn expect_duration(v: &Value) -> Result<Duration> {
    v.as_duration().ok_or_else(|| mismatch(Kind::Duration, v))
}
