//! Common test utilities for cel-runtime integration tests.

use cel_runtime::ext::{ClockExtension, DecimalExtension, ListsExtension, MathExtension, StringsExtension};
use cel_runtime::{Environment, Error, EvalError, Evaluation, Runtime, RuntimeBuilder, Value};
use cel_runtime_ast::SpannedExpr;
use tracing_subscriber::EnvFilter;

/// Route the runtime's tracing output to the test harness. Filter with
/// `RUST_LOG`, e.g. `RUST_LOG=cel_runtime=trace`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Runtime with every built-in extension.
#[allow(dead_code)]
pub fn full_runtime() -> Runtime {
    init_tracing();
    RuntimeBuilder::new()
        .with_standard_library()
        .with_extension(MathExtension)
        .with_extension(StringsExtension)
        .with_extension(ListsExtension)
        .with_extension(DecimalExtension)
        .with_extension(ClockExtension)
        .build()
        .expect("built-in extensions compose")
}

/// Evaluate with the full runtime and assert success.
#[allow(dead_code)]
pub fn assert_evaluates(expr: SpannedExpr, env: &Environment) -> Evaluation {
    match full_runtime().program(expr).eval(env) {
        Ok(out) => out,
        Err(e) => panic!("evaluation failed: {}", e),
    }
}

/// Evaluate with an empty environment and return the value.
#[allow(dead_code)]
pub fn eval_value(expr: SpannedExpr) -> Value {
    assert_evaluates(expr, &Environment::new()).value
}

/// Evaluate and assert an evaluation error, returning it.
#[allow(dead_code)]
pub fn assert_eval_error(expr: SpannedExpr, env: &Environment) -> EvalError {
    match full_runtime().program(expr).eval(env) {
        Ok(out) => panic!("expected evaluation error, got {:?}", out.value),
        Err(Error::Eval(e)) => e,
        Err(other) => panic!("expected evaluation error, got {}", other),
    }
}
