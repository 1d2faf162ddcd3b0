//! Runtime composition.
//!
//! A [`Runtime`] is the immutable result of composing extensions: one operator
//! registry, one function registry, the message types by alias, and the
//! resolver chain. It is cheap to clone and shared by every interpreter and
//! program created from it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cel_runtime_ast::{BinaryOp, SpannedExpr};

use crate::error::{ConfigError, Error, ResolveError};
use crate::ext::StandardLibrary;
use crate::extension::Extension;
use crate::functions::{Function, FunctionRegistry};
use crate::interpreter::Interpreter;
use crate::operators::{BinaryOverload, OperatorRegistry};
use crate::program::Program;
use crate::resolver::{ResolverChain, ValueResolver};
use crate::value::{Kind, MessageType, Value};

/// Builder for a [`Runtime`].
///
/// # Example
///
/// ```
/// use cel_runtime::ext::{ListsExtension, MathExtension};
/// use cel_runtime::RuntimeBuilder;
///
/// let runtime = RuntimeBuilder::new()
///     .with_standard_library()
///     .with_extension(MathExtension)
///     .with_extension(ListsExtension)
///     .build()
///     .unwrap();
/// assert!(runtime.functions().contains("math.abs"));
/// ```
#[derive(Default)]
pub struct RuntimeBuilder {
    extensions: Vec<Box<dyn Extension>>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extension. Resolvers of earlier extensions are tried first.
    pub fn with_extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Add the standard operators and functions.
    pub fn with_standard_library(self) -> Self {
        self.with_extension(StandardLibrary)
    }

    /// Compose every extension into a runtime.
    pub fn build(self) -> Result<Runtime, ConfigError> {
        let mut operators = OperatorRegistry::new();
        let mut functions = FunctionRegistry::new();
        let mut messages: HashMap<String, MessageType> = HashMap::new();
        let mut message_types: Vec<MessageType> = Vec::new();
        let mut resolvers: Vec<Arc<dyn ValueResolver>> = Vec::new();
        let mut names = Vec::with_capacity(self.extensions.len());

        for extension in &self.extensions {
            let name = extension.name();
            for function in extension.functions() {
                functions.register(function, name)?;
            }
            for overload in extension.binary_operators() {
                operators.add_binary(overload, name)?;
            }
            for overload in extension.unary_operators() {
                operators.add_unary(overload, name)?;
            }
            for message_type in extension.message_types() {
                for alias in message_type.names() {
                    if messages.contains_key(alias) {
                        return Err(ConfigError::DuplicateMessageAlias {
                            extension: name.to_string(),
                            alias: alias.to_string(),
                        });
                    }
                    messages.insert(alias.to_string(), message_type.clone());
                }
                message_types.push(message_type);
            }
            resolvers.extend(extension.value_resolvers());
            names.push(name.to_string());
        }

        for message_type in &message_types {
            register_message_defaults(&mut operators, &mut functions, message_type)?;
        }

        tracing::debug!(
            extensions = ?names,
            functions = functions.len(),
            binary_operators = operators.binary_len(),
            unary_operators = operators.unary_len(),
            message_types = message_types.len(),
            "runtime composed"
        );

        Ok(Runtime {
            inner: Arc::new(Inner {
                operators,
                functions,
                messages,
                resolvers: ResolverChain::new(resolvers, message_types),
                extensions: names,
            }),
        })
    }
}

/// `==`, `!=`, `in` and `type()` for a message kind, unless an extension
/// already provided them.
fn register_message_defaults(
    operators: &mut OperatorRegistry,
    functions: &mut FunctionRegistry,
    message_type: &MessageType,
) -> Result<(), ConfigError> {
    let kind = &message_type.kind();
    let candidates = [
        BinaryOverload::new(BinaryOp::Eq, kind.clone(), kind.clone(), |_, l, r| {
            Ok(Value::Bool(l == r))
        }),
        BinaryOverload::new(BinaryOp::Ne, kind.clone(), kind.clone(), |_, l, r| {
            Ok(Value::Bool(l != r))
        }),
        BinaryOverload::new(BinaryOp::Eq, kind.clone(), Kind::Null, |_, _, _| {
            Ok(Value::Bool(false))
        }),
        BinaryOverload::new(BinaryOp::Eq, Kind::Null, kind.clone(), |_, _, _| {
            Ok(Value::Bool(false))
        }),
        BinaryOverload::new(BinaryOp::Ne, kind.clone(), Kind::Null, |_, _, _| {
            Ok(Value::Bool(true))
        }),
        BinaryOverload::new(BinaryOp::Ne, Kind::Null, kind.clone(), |_, _, _| {
            Ok(Value::Bool(true))
        }),
        BinaryOverload::new(BinaryOp::In, kind.clone(), Kind::List, |_, l, r| match r {
            Value::List(items) => Ok(Value::Bool(items.iter().any(|item| item == l))),
            other => Err(Error::unexpected_kind("_in_", &Kind::List, &other.kind())),
        }),
    ];
    for overload in candidates {
        if !operators.has_binary(overload.op, &overload.left, &overload.right) {
            operators.add_binary(overload, "runtime")?;
        }
    }

    if !functions.has_overload("type", std::slice::from_ref(kind)) {
        let type_name = Value::string(message_type.type_name());
        functions.register(
            Function::new("type").with_overload(vec![kind.clone()], move |_, _| Ok(type_name.clone())),
            "runtime",
        )?;
    }
    Ok(())
}

struct Inner {
    operators: OperatorRegistry,
    functions: FunctionRegistry,
    messages: HashMap<String, MessageType>,
    resolvers: ResolverChain,
    extensions: Vec<String>,
}

/// Composed registries shared by interpreters and programs.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// A runtime with only the standard library.
    pub fn standard() -> Result<Self, ConfigError> {
        RuntimeBuilder::new().with_standard_library().build()
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.inner.operators
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.inner.functions
    }

    /// Look up a message type by its type name or any alias.
    pub fn message_type(&self, name: &str) -> Option<&MessageType> {
        self.inner.messages.get(name)
    }

    /// Names of the composed extensions, in order.
    pub fn extensions(&self) -> &[String] {
        &self.inner.extensions
    }

    /// Convert a host value through the resolver chain.
    pub fn resolve(&self, host: &dyn Any) -> Result<Value, ResolveError> {
        self.inner.resolvers.resolve(host, "host value")
    }

    /// Like [`resolve`](Self::resolve), naming `T` in the error.
    pub fn resolve_value<T: Any>(&self, host: &T) -> Result<Value, ResolveError> {
        self.inner
            .resolvers
            .resolve(host, std::any::type_name::<T>())
    }

    /// A fresh interpreter over this runtime.
    pub fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.clone())
    }

    /// Pair an expression with this runtime.
    pub fn program(&self, expr: SpannedExpr) -> Program {
        Program::new(self.clone(), expr)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut messages: Vec<_> = self.inner.messages.keys().collect();
        messages.sort();
        f.debug_struct("Runtime")
            .field("extensions", &self.inner.extensions)
            .field("operators", &self.inner.operators)
            .field("functions", &self.inner.functions)
            .field("messages", &messages)
            .finish()
    }
}
