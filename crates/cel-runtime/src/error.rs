//! Error types for the runtime.
//!
//! Evaluation can fail in three ways:
//!
//! - [`EvalError`]: a user-facing failure located at a span (unknown
//!   identifier, no matching overload, overflow, ...).
//! - [`Error::Internal`]: the dispatch wiring routed a value to a handler that
//!   was registered for a different kind. This is a bug in a registry, not in
//!   the evaluated expression.
//! - [`ResolveError`]: a host value could not be converted into a [`Value`].
//!
//! Composition conflicts between extensions are reported separately as
//! [`ConfigError`] when the runtime is built.
//!
//! [`Value`]: crate::Value

use std::fmt;

use cel_runtime_ast::Span;
use thiserror::Error;

use crate::value::Kind;

/// Result alias used throughout the runtime.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Any failure raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Defensive invariant violation inside a handler or the dispatcher.
    #[error("internal error: {0}")]
    Internal(String),

    /// User-facing evaluation failure.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// A host value had no matching resolver.
    #[error(transparent)]
    IncompatibleValue(#[from] ResolveError),
}

impl Error {
    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Internal error for a handler that received an operand of the wrong kind.
    pub fn unexpected_kind(handler: &str, expected: &Kind, actual: &Kind) -> Self {
        Error::Internal(format!(
            "{} registered for {} received {}",
            handler, expected, actual
        ))
    }

    /// Returns the evaluation error, if this is one.
    pub fn as_eval(&self) -> Option<&EvalError> {
        match self {
            Error::Eval(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true for internal (wiring) errors.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    /// Attach a span to an evaluation error that does not have one yet.
    pub(crate) fn located(self, span: &Span) -> Self {
        match self {
            Error::Eval(e) => Error::Eval(e.with_span(span.clone())),
            other => other,
        }
    }
}

/// A user-facing error that occurred during CEL evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    /// The error message.
    pub message: String,
    /// The kind of error.
    pub kind: EvalErrorKind,
    /// Source location of the expression that failed.
    pub span: Option<Span>,
}

/// The kind of evaluation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Division by zero.
    DivisionByZero,
    /// Modulo by zero.
    ModuloByZero,
    /// Integer overflow, including unsigned underflow.
    Overflow,
    /// Type mismatch at runtime.
    TypeMismatch,
    /// Unknown identifier (variable not found).
    UnknownIdentifier,
    /// Unknown function.
    UnknownFunction,
    /// Unknown message type in a construction expression.
    UnknownType,
    /// Index out of bounds.
    IndexOutOfBounds,
    /// Key not found in map.
    KeyNotFound,
    /// Field not found on message.
    FieldNotFound,
    /// Invalid argument.
    InvalidArgument,
    /// No matching overload found.
    NoMatchingOverload,
    /// Invalid conversion.
    InvalidConversion,
    /// Message fields rejected by the host type.
    InvalidMessageFields,
    /// Value outside the representable range (timestamps, durations).
    OutOfRange,
    /// Expression nesting exceeded the interpreter's depth limit.
    RecursionLimit,
}

impl EvalError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: EvalErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            span: None,
        }
    }

    /// Attach a span unless one is already present.
    ///
    /// Errors keep the span of the innermost expression that raised them.
    pub fn with_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// Create a division by zero error.
    pub fn division_by_zero() -> Self {
        Self::new(EvalErrorKind::DivisionByZero, "division by zero")
    }

    /// Create a modulo by zero error.
    pub fn modulo_by_zero() -> Self {
        Self::new(EvalErrorKind::ModuloByZero, "modulo by zero")
    }

    /// Create an overflow error.
    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Overflow, message)
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: &str, actual: &Kind) -> Self {
        Self::new(
            EvalErrorKind::TypeMismatch,
            format!("expected {}, got {}", expected, actual),
        )
    }

    /// Create an unknown identifier error.
    pub fn unknown_identifier(name: &str) -> Self {
        Self::new(
            EvalErrorKind::UnknownIdentifier,
            format!("unknown identifier: {}", name),
        )
    }

    /// Create an unknown function error.
    pub fn unknown_function(name: &str) -> Self {
        Self::new(
            EvalErrorKind::UnknownFunction,
            format!("unknown function: {}", name),
        )
    }

    /// Create an unknown message type error.
    pub fn unknown_type(name: &str) -> Self {
        Self::new(
            EvalErrorKind::UnknownType,
            format!("unknown message type: {}", name),
        )
    }

    /// Create an index out of bounds error.
    pub fn index_out_of_bounds(index: impl fmt::Display, len: usize) -> Self {
        Self::new(
            EvalErrorKind::IndexOutOfBounds,
            format!("index {} out of bounds for length {}", index, len),
        )
    }

    /// Create a key not found error.
    pub fn key_not_found(key: impl fmt::Display) -> Self {
        Self::new(
            EvalErrorKind::KeyNotFound,
            format!("key not found: {}", key),
        )
    }

    /// Create a field not found error.
    pub fn field_not_found(type_name: &str, field: &str) -> Self {
        Self::new(
            EvalErrorKind::FieldNotFound,
            format!("field not found: {}.{}", type_name, field),
        )
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::InvalidArgument, message)
    }

    /// No overload of a function accepts the given argument kinds.
    pub fn no_matching_overload(func: &str, kinds: &[Kind]) -> Self {
        Self::new(
            EvalErrorKind::NoMatchingOverload,
            format!(
                "no matching overload for function: {}({})",
                func,
                join_kinds(kinds)
            ),
        )
    }

    /// No handler is registered for an operator and its operand kinds.
    pub fn no_matching_operator(symbol: &str, kinds: &[Kind]) -> Self {
        Self::new(
            EvalErrorKind::NoMatchingOverload,
            format!(
                "no matching overload for operator {} with operands ({})",
                symbol,
                join_kinds(kinds)
            ),
        )
    }

    /// Create an invalid conversion error.
    pub fn invalid_conversion(from: &str, to: &str) -> Self {
        Self::new(
            EvalErrorKind::InvalidConversion,
            format!("cannot convert {} to {}", from, to),
        )
    }

    /// Create an invalid message fields error.
    pub fn invalid_message_fields(type_name: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            EvalErrorKind::InvalidMessageFields,
            format!("invalid message fields for {}: {}", type_name, reason),
        )
    }

    /// Create an out-of-range error.
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::OutOfRange, message)
    }

    /// Create a recursion limit error.
    pub fn recursion_limit(max_depth: usize) -> Self {
        Self::new(
            EvalErrorKind::RecursionLimit,
            format!("expression nesting exceeds maximum depth of {}", max_depth),
        )
    }
}

fn join_kinds(kinds: &[Kind]) -> String {
    kinds
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{} at {}..{}", self.message, span.start, span.end),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for EvalError {}

/// Failure to convert a host value into a runtime value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// No resolver in the chain accepted the value.
    #[error("incompatible value type: {type_name}")]
    IncompatibleValue { type_name: String },

    /// A resolver accepted the value but could not convert it.
    #[error("cannot resolve {type_name}: {reason}")]
    Conversion { type_name: String, reason: String },
}

/// Conflicts detected while composing extensions into a runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A function was declared without a name.
    #[error("extension '{extension}' declares a function with an empty name")]
    EmptyFunctionName { extension: String },

    /// Two overloads share a function name and signature.
    #[error("duplicate overload {function}({signature}) registered by extension '{extension}'")]
    DuplicateOverload {
        extension: String,
        function: String,
        signature: String,
    },

    /// Two handlers share an operator and operand kinds.
    #[error("duplicate operator overload {operator} ({operands}) registered by extension '{extension}'")]
    DuplicateOperator {
        extension: String,
        operator: String,
        operands: String,
    },

    /// Two message types claim the same alias.
    #[error("message alias '{alias}' registered by extension '{extension}' is already taken")]
    DuplicateMessageAlias { extension: String, alias: String },
}

impl ConfigError {
    pub(crate) fn duplicate_overload(extension: &str, function: &str, kinds: &[Kind]) -> Self {
        ConfigError::DuplicateOverload {
            extension: extension.to_string(),
            function: function.to_string(),
            signature: join_kinds(kinds),
        }
    }

    pub(crate) fn duplicate_operator(extension: &str, operator: &str, kinds: &[Kind]) -> Self {
        ConfigError::DuplicateOperator {
            extension: extension.to_string(),
            operator: operator.to_string(),
            operands: join_kinds(kinds),
        }
    }
}
