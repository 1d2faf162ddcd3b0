//! An expression paired with the runtime that evaluates it.
//!
//! A `Program` can be evaluated any number of times against different
//! environments; every evaluation uses a fresh interpreter.

use std::sync::Arc;

use cel_runtime_ast::SpannedExpr;

use crate::environment::Environment;
use crate::error::Result;
use crate::interpreter::InterpreterOptions;
use crate::runtime::Runtime;
use crate::value::Value;

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    /// Whether every function and operator invoked was idempotent.
    pub idempotent: bool,
}

#[derive(Debug, Clone)]
pub struct Program {
    runtime: Runtime,
    expr: Arc<SpannedExpr>,
    options: InterpreterOptions,
}

impl Program {
    pub fn new(runtime: Runtime, expr: SpannedExpr) -> Self {
        Self {
            runtime,
            expr: Arc::new(expr),
            options: InterpreterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: InterpreterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn expr(&self) -> &SpannedExpr {
        &self.expr
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Evaluate against `env`.
    #[tracing::instrument(level = "debug", skip_all, fields(expr_id = self.expr.id))]
    pub fn eval(&self, env: &Environment) -> Result<Evaluation> {
        let mut interpreter = self.runtime.interpreter().with_options(self.options);
        let value = interpreter.run(&self.expr, env)?;
        Ok(Evaluation {
            value,
            idempotent: interpreter.was_idempotent(),
        })
    }
}
