//! CEL-Runtime: evaluation core for the Common Expression Language
//!
//! This crate evaluates already-built expression trees
//! ([`cel_runtime_ast::SpannedExpr`]). It has no parser or type checker:
//! every operator and function call is resolved at evaluation time from the
//! kinds of the evaluated operands.
//!
//! # Quick Start
//!
//! ```
//! use cel_runtime::{Environment, Runtime, Value};
//! use cel_runtime_ast::{AstBuilder, BinaryOp};
//!
//! let b = AstBuilder::new();
//! let expr = b.binary(BinaryOp::Mul, b.ident("x"), b.int(2));
//!
//! let program = Runtime::standard().unwrap().program(expr);
//! let out = program.eval(&Environment::new().with("x", 21i64)).unwrap();
//! assert_eq!(out.value, Value::Int(42));
//! ```
//!
//! # Architecture
//!
//! - **Extensions** contribute functions, operator overloads, message types
//!   and value resolvers
//! - **RuntimeBuilder** composes extensions into an immutable [`Runtime`],
//!   rejecting any overlap
//! - **Interpreter** walks the tree, dispatching through the runtime's
//!   registries
//! - **Environment** holds variable bindings; forks are copy-on-write
//!
//! # Modules
//!
//! - `value`: runtime values, kinds, time and message types
//! - `operators` / `functions`: overload registries
//! - `resolver`: host value conversion
//! - `ext`: built-in extensions (standard library, math, strings, lists,
//!   decimal, clock)

pub mod environment;
pub mod error;
pub mod ext;
pub mod extension;
pub mod functions;
pub mod interpreter;
pub mod operators;
pub mod program;
pub mod resolver;
pub mod runtime;
pub mod value;

pub use environment::Environment;
pub use error::{ConfigError, Error, EvalError, EvalErrorKind, ResolveError, Result};
pub use extension::Extension;
pub use functions::{Function, FunctionRegistry, Overload};
pub use interpreter::{Interpreter, InterpreterOptions, State};
pub use operators::{BinaryOverload, Dispatched, OperatorRegistry, UnaryOverload};
pub use program::{Evaluation, Program};
pub use resolver::{DefaultResolver, ResolverChain, ValueResolver};
pub use runtime::{Runtime, RuntimeBuilder};
pub use value::{
    CelMessage, Duration, FromCelFields, Kind, MapKey, MessageError, MessageFields, MessageType,
    MessageValue, Timestamp, Value, ValueMap,
};
