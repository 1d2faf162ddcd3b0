//! Wall-clock access.
//!
//! `now()` returns the current UTC time as a timestamp. It is the canonical
//! non-idempotent function: any evaluation that calls it reports
//! `idempotent == false`.

use chrono::Utc;

use crate::error::{EvalError, Result};
use crate::extension::Extension;
use crate::functions::Function;
use crate::value::{Timestamp, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct ClockExtension;

impl Extension for ClockExtension {
    fn name(&self) -> &str {
        "clock"
    }

    fn functions(&self) -> Vec<Function> {
        vec![Function::new("now")
            .non_idempotent()
            .with_overload(vec![], |_, _| now().map(Value::Timestamp))]
    }
}

fn now() -> Result<Timestamp> {
    let now = Utc::now();
    let ts = Timestamp::new(now.timestamp(), now.timestamp_subsec_nanos() as i32);
    if ts.is_valid() {
        Ok(ts)
    } else {
        Err(EvalError::out_of_range("system clock out of range").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeBuilder;

    #[test]
    fn test_now_is_registered_non_idempotent() {
        let runtime = RuntimeBuilder::new()
            .with_extension(ClockExtension)
            .build()
            .unwrap();
        assert_eq!(runtime.functions().is_idempotent("now"), Some(false));

        let out = runtime.functions().call("now", &(0..5), &[]).unwrap();
        assert!(!out.idempotent);
        assert!(out.value.as_timestamp().unwrap().seconds > 1_700_000_000);
    }
}
