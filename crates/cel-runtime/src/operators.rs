//! Operator overload registry.
//!
//! Every operator application is resolved by the kinds of its evaluated
//! operands: `(op, kind)` for unary operators and `(op, left, right)` for
//! binary ones. Binary keys are asymmetric, so `double * decimal` and
//! `decimal * double` are separate registrations.
//!
//! Handlers receive the call-site span and the operand values. A handler that
//! is handed an operand of a kind it was not registered for reports an
//! internal error; the registry never does that unless its own wiring is
//! wrong.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cel_runtime_ast::{BinaryOp, Span, UnaryOp};

use crate::error::{ConfigError, EvalError, Result};
use crate::value::{Kind, Value};

/// Implementation of a binary operator for one pair of operand kinds.
pub type BinaryHandler = Arc<dyn Fn(&Span, &Value, &Value) -> Result<Value> + Send + Sync>;

/// Implementation of a unary operator for one operand kind.
pub type UnaryHandler = Arc<dyn Fn(&Span, &Value) -> Result<Value> + Send + Sync>;

/// A binary operator registration.
#[derive(Clone)]
pub struct BinaryOverload {
    pub op: BinaryOp,
    pub left: Kind,
    pub right: Kind,
    /// Whether repeated calls with equal operands always give equal results.
    pub idempotent: bool,
    handler: BinaryHandler,
}

impl BinaryOverload {
    pub fn new<F>(op: BinaryOp, left: Kind, right: Kind, handler: F) -> Self
    where
        F: Fn(&Span, &Value, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            op,
            left,
            right,
            idempotent: true,
            handler: Arc::new(handler),
        }
    }

    /// Mark this overload as non-idempotent.
    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    /// Invoke the handler.
    pub fn call(&self, span: &Span, left: &Value, right: &Value) -> Result<Value> {
        (self.handler)(span, left, right)
    }

    fn key(&self) -> (BinaryOp, Kind, Kind) {
        (self.op, self.left.clone(), self.right.clone())
    }
}

impl fmt::Debug for BinaryOverload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryOverload")
            .field("op", &self.op)
            .field("left", &self.left)
            .field("right", &self.right)
            .field("idempotent", &self.idempotent)
            .finish()
    }
}

/// A unary operator registration.
#[derive(Clone)]
pub struct UnaryOverload {
    pub op: UnaryOp,
    pub operand: Kind,
    pub idempotent: bool,
    handler: UnaryHandler,
}

impl UnaryOverload {
    pub fn new<F>(op: UnaryOp, operand: Kind, handler: F) -> Self
    where
        F: Fn(&Span, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            op,
            operand,
            idempotent: true,
            handler: Arc::new(handler),
        }
    }

    /// Mark this overload as non-idempotent.
    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    /// Invoke the handler.
    pub fn call(&self, span: &Span, operand: &Value) -> Result<Value> {
        (self.handler)(span, operand)
    }
}

impl fmt::Debug for UnaryOverload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryOverload")
            .field("op", &self.op)
            .field("operand", &self.operand)
            .field("idempotent", &self.idempotent)
            .finish()
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub value: Value,
    /// Idempotency flag of the overload that produced `value`.
    pub idempotent: bool,
}

/// All operator overloads known to a runtime.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    binary: HashMap<(BinaryOp, Kind, Kind), BinaryOverload>,
    unary: HashMap<(UnaryOp, Kind), UnaryOverload>,
}

impl OperatorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binary overload. `extension` names the contributor in the
    /// conflict error.
    pub fn add_binary(
        &mut self,
        overload: BinaryOverload,
        extension: &str,
    ) -> Result<(), ConfigError> {
        let key = overload.key();
        if self.binary.contains_key(&key) {
            return Err(ConfigError::duplicate_operator(
                extension,
                overload.op.symbol(),
                &[overload.left, overload.right],
            ));
        }
        self.binary.insert(key, overload);
        Ok(())
    }

    /// Register a unary overload.
    pub fn add_unary(&mut self, overload: UnaryOverload, extension: &str) -> Result<(), ConfigError> {
        let key = (overload.op, overload.operand.clone());
        if self.unary.contains_key(&key) {
            return Err(ConfigError::duplicate_operator(
                extension,
                overload.op.symbol(),
                &[overload.operand],
            ));
        }
        self.unary.insert(key, overload);
        Ok(())
    }

    pub fn has_binary(&self, op: BinaryOp, left: &Kind, right: &Kind) -> bool {
        self.binary
            .contains_key(&(op, left.clone(), right.clone()))
    }

    pub fn has_unary(&self, op: UnaryOp, operand: &Kind) -> bool {
        self.unary.contains_key(&(op, operand.clone()))
    }

    pub fn find_binary(&self, op: BinaryOp, left: &Kind, right: &Kind) -> Option<&BinaryOverload> {
        self.binary.get(&(op, left.clone(), right.clone()))
    }

    pub fn find_unary(&self, op: UnaryOp, operand: &Kind) -> Option<&UnaryOverload> {
        self.unary.get(&(op, operand.clone()))
    }

    /// Number of binary overloads.
    pub fn binary_len(&self) -> usize {
        self.binary.len()
    }

    /// Number of unary overloads.
    pub fn unary_len(&self) -> usize {
        self.unary.len()
    }

    /// Apply a binary operator to evaluated operands.
    ///
    /// Fails with `NoMatchingOverload` (located at `span`) when no handler is
    /// registered for the operand kinds.
    pub fn dispatch_binary(
        &self,
        op: BinaryOp,
        span: &Span,
        left: &Value,
        right: &Value,
    ) -> Result<Dispatched> {
        let (left_kind, right_kind) = (left.kind(), right.kind());
        let Some(overload) = self.find_binary(op, &left_kind, &right_kind) else {
            tracing::trace!(operator = op.symbol(), left = %left_kind, right = %right_kind, "no binary overload");
            return Err(EvalError::no_matching_operator(op.symbol(), &[left_kind, right_kind])
                .with_span(span.clone())
                .into());
        };
        let value = overload.call(span, left, right)?;
        Ok(Dispatched {
            value,
            idempotent: overload.idempotent,
        })
    }

    /// Apply a unary operator to an evaluated operand.
    pub fn dispatch_unary(&self, op: UnaryOp, span: &Span, operand: &Value) -> Result<Dispatched> {
        let kind = operand.kind();
        let Some(overload) = self.find_unary(op, &kind) else {
            tracing::trace!(operator = op.symbol(), operand = %kind, "no unary overload");
            return Err(EvalError::no_matching_operator(op.symbol(), &[kind])
                .with_span(span.clone())
                .into());
        };
        let value = overload.call(span, operand)?;
        Ok(Dispatched {
            value,
            idempotent: overload.idempotent,
        })
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("binary", &self.binary.len())
            .field("unary", &self.unary.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, EvalErrorKind};

    fn int_add() -> BinaryOverload {
        BinaryOverload::new(BinaryOp::Add, Kind::Int, Kind::Int, |_, l, r| {
            match (l, r) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                _ => Err(Error::internal("int add")),
            }
        })
    }

    #[test]
    fn test_dispatch_by_kinds() {
        let mut registry = OperatorRegistry::new();
        registry.add_binary(int_add(), "test").unwrap();

        let out = registry
            .dispatch_binary(BinaryOp::Add, &(0..5), &Value::Int(2), &Value::Int(3))
            .unwrap();
        assert_eq!(out.value, Value::Int(5));
        assert!(out.idempotent);
    }

    #[test]
    fn test_missing_overload_names_operator_and_kinds() {
        let mut registry = OperatorRegistry::new();
        registry.add_binary(int_add(), "test").unwrap();

        let err = registry
            .dispatch_binary(BinaryOp::Add, &(3..9), &Value::Int(2), &Value::string("x"))
            .unwrap_err();
        let eval = err.as_eval().unwrap();
        assert_eq!(eval.kind, EvalErrorKind::NoMatchingOverload);
        assert_eq!(eval.span, Some(3..9));
        assert!(eval.message.contains("_+_"));
        assert!(eval.message.contains("int, string"));
    }

    #[test]
    fn test_binary_keys_are_asymmetric() {
        let mut registry = OperatorRegistry::new();
        registry
            .add_binary(
                BinaryOverload::new(BinaryOp::Mul, Kind::Double, Kind::Int, |_, _, _| {
                    Ok(Value::Null)
                }),
                "test",
            )
            .unwrap();
        assert!(registry.has_binary(BinaryOp::Mul, &Kind::Double, &Kind::Int));
        assert!(!registry.has_binary(BinaryOp::Mul, &Kind::Int, &Kind::Double));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = OperatorRegistry::new();
        registry.add_binary(int_add(), "first").unwrap();
        let err = registry.add_binary(int_add(), "second").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateOperator { ref extension, .. } if extension == "second"
        ));
    }

    #[test]
    fn test_unary_dispatch_reports_idempotency() {
        let mut registry = OperatorRegistry::new();
        registry
            .add_unary(
                UnaryOverload::new(UnaryOp::Not, Kind::Bool, |_, v| {
                    Ok(Value::Bool(!v.as_bool().unwrap_or_default()))
                })
                .non_idempotent(),
                "test",
            )
            .unwrap();

        let out = registry
            .dispatch_unary(UnaryOp::Not, &(0..1), &Value::Bool(true))
            .unwrap();
        assert_eq!(out.value, Value::Bool(false));
        assert!(!out.idempotent);

        assert!(registry
            .dispatch_unary(UnaryOp::Neg, &(0..1), &Value::Bool(true))
            .is_err());
    }
}
