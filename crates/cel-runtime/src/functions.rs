//! Function implementations and registry for CEL evaluation.
//!
//! A [`Function`] is a name plus overloads keyed by the exact, ordered kinds
//! of their arguments. Member-style calls (`target.f(x)`) pass the target as
//! the first argument, so `"abc".startsWith("a")` resolves the signature
//! `[string, string]`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cel_runtime_ast::Span;

use crate::error::{ConfigError, EvalError, Result};
use crate::operators::Dispatched;
use crate::value::{Kind, Value};

/// A function implementation.
///
/// The implementation receives the call-site span and the already-evaluated
/// arguments (receiver first for member calls).
pub type FunctionImpl = Arc<dyn Fn(&Span, &[Value]) -> Result<Value> + Send + Sync>;

/// One signature of a function with its implementation.
#[derive(Clone)]
pub struct Overload {
    /// Argument kinds, in order. The arity is the length.
    pub signature: Vec<Kind>,
    implementation: FunctionImpl,
}

impl Overload {
    pub fn new<F>(signature: Vec<Kind>, implementation: F) -> Self
    where
        F: Fn(&Span, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            signature,
            implementation: Arc::new(implementation),
        }
    }

    /// Call this overload with the given arguments.
    pub fn call(&self, span: &Span, args: &[Value]) -> Result<Value> {
        (self.implementation)(span, args)
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("signature", &self.signature)
            .finish()
    }
}

/// A function with all its overloads.
#[derive(Debug, Clone)]
pub struct Function {
    /// The function name.
    pub name: String,
    /// False for functions like `now()` whose result varies between calls.
    pub idempotent: bool,
    /// All overloads for this function.
    pub overloads: Vec<Overload>,
}

impl Function {
    /// Create a new idempotent function with no overloads.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            idempotent: true,
            overloads: Vec::new(),
        }
    }

    /// Mark the function as non-idempotent.
    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    /// Add an overload to this function.
    pub fn with_overload<F>(mut self, signature: Vec<Kind>, implementation: F) -> Self
    where
        F: Fn(&Span, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.overloads.push(Overload::new(signature, implementation));
        self
    }
}

#[derive(Clone)]
struct Registered {
    idempotent: bool,
    overloads: HashMap<Vec<Kind>, Overload>,
}

/// Registry of all functions available during evaluation.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Registered>,
}

impl FunctionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, merging its overloads into any existing ones of
    /// the same name.
    ///
    /// The merged function is idempotent only if every contribution is.
    pub fn register(&mut self, function: Function, extension: &str) -> Result<(), ConfigError> {
        if function.name.is_empty() {
            return Err(ConfigError::EmptyFunctionName {
                extension: extension.to_string(),
            });
        }

        let entry = self
            .functions
            .entry(function.name.clone())
            .or_insert_with(|| Registered {
                idempotent: true,
                overloads: HashMap::new(),
            });

        for overload in function.overloads {
            if entry.overloads.contains_key(&overload.signature) {
                return Err(ConfigError::duplicate_overload(
                    extension,
                    &function.name,
                    &overload.signature,
                ));
            }
            entry.overloads.insert(overload.signature.clone(), overload);
        }
        entry.idempotent &= function.idempotent;
        Ok(())
    }

    /// Check if a function exists.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Idempotency of a function, if it is registered.
    pub fn is_idempotent(&self, name: &str) -> Option<bool> {
        self.functions.get(name).map(|f| f.idempotent)
    }

    /// Check if `name` has an overload for exactly `kinds`.
    pub fn has_overload(&self, name: &str, kinds: &[Kind]) -> bool {
        self.functions
            .get(name)
            .is_some_and(|f| f.overloads.contains_key(kinds))
    }

    /// Signatures registered under `name`, in no particular order.
    pub fn signatures(&self, name: &str) -> Vec<&[Kind]> {
        self.functions
            .get(name)
            .map(|f| f.overloads.keys().map(Vec::as_slice).collect())
            .unwrap_or_default()
    }

    /// Number of distinct function names.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Exact-match lookup of an overload.
    ///
    /// Errors are `UnknownFunction` for an unregistered name and
    /// `NoMatchingOverload` when no signature matches `kinds`.
    pub fn resolve(&self, name: &str, kinds: &[Kind]) -> Result<(&Overload, bool)> {
        let Some(function) = self.functions.get(name) else {
            return Err(EvalError::unknown_function(name).into());
        };
        match function.overloads.get(kinds) {
            Some(overload) => Ok((overload, function.idempotent)),
            None => {
                tracing::trace!(function = name, ?kinds, "no function overload");
                Err(EvalError::no_matching_overload(name, kinds).into())
            }
        }
    }

    /// Resolve by the argument kinds and call.
    pub fn call(&self, name: &str, span: &Span, args: &[Value]) -> Result<Dispatched> {
        let kinds: Vec<Kind> = args.iter().map(Value::kind).collect();
        let (overload, idempotent) = self
            .resolve(name, &kinds)
            .map_err(|e| e.located(span))?;
        let value = overload.call(span, args)?;
        Ok(Dispatched { value, idempotent })
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}
