//! The extension contract.
//!
//! An extension is a bundle of functions, operator overloads, message types
//! and value resolvers. Extensions are composed into a
//! [`Runtime`](crate::Runtime) once, by [`RuntimeBuilder`](crate::RuntimeBuilder);
//! any overlap between them is a [`ConfigError`](crate::ConfigError) at that
//! point rather than at call time.
//!
//! # Example
//!
//! ```
//! use cel_runtime::{Extension, Function, Kind, RuntimeBuilder, Value};
//!
//! struct Greeting;
//!
//! impl Extension for Greeting {
//!     fn name(&self) -> &str {
//!         "greeting"
//!     }
//!
//!     fn functions(&self) -> Vec<Function> {
//!         vec![Function::new("greet").with_overload(vec![Kind::String], |_, args| {
//!             Ok(Value::string(format!("hello, {}", args[0].as_string().unwrap_or_default())))
//!         })]
//!     }
//! }
//!
//! let runtime = RuntimeBuilder::new().with_extension(Greeting).build().unwrap();
//! assert!(runtime.functions().contains("greet"));
//! ```

use std::sync::Arc;

use crate::functions::Function;
use crate::operators::{BinaryOverload, UnaryOverload};
use crate::resolver::ValueResolver;
use crate::value::MessageType;

/// A composable bundle of language additions.
///
/// Every list defaults to empty. Order within a list is kept; no ordering
/// is implied between extensions except for value resolvers, which are
/// tried in the order extensions were added.
pub trait Extension: Send + Sync {
    /// Name used in configuration errors and logs.
    fn name(&self) -> &str;

    fn functions(&self) -> Vec<Function> {
        Vec::new()
    }

    fn binary_operators(&self) -> Vec<BinaryOverload> {
        Vec::new()
    }

    fn unary_operators(&self) -> Vec<UnaryOverload> {
        Vec::new()
    }

    fn message_types(&self) -> Vec<MessageType> {
        Vec::new()
    }

    fn value_resolvers(&self) -> Vec<Arc<dyn ValueResolver>> {
        Vec::new()
    }
}
