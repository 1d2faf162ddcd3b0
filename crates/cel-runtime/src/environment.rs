//! Variable bindings for evaluation.
//!
//! An [`Environment`] maps names to values. [`Environment::fork`] takes a
//! snapshot: the fork and the original can be changed independently
//! afterwards. Bindings are shared until one side writes, so forking for
//! every comprehension scope does not copy the parent.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::runtime::Runtime;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: Arc<HashMap<String, Value>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(name, value);
        self
    }

    /// Bind `name`, replacing any previous binding.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        Arc::make_mut(&mut self.bindings).insert(name.into(), value.into());
    }

    pub fn has(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        if !self.has(name) {
            return None;
        }
        Arc::make_mut(&mut self.bindings).remove(name)
    }

    /// Snapshot of the current bindings.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Resolve a host value through `runtime` and bind it.
    pub fn bind<T: Any>(&mut self, runtime: &Runtime, name: impl Into<String>, host: &T) -> Result<(), ResolveError> {
        let value = runtime.resolve_value(host)?;
        self.add(name, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            bindings: Arc::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_is_none() {
        let env = Environment::new().with("x", 1i64);
        assert_eq!(env.get("x"), Some(&Value::Int(1)));
        assert_eq!(env.get("y"), None);
        assert!(!env.has("y"));
    }

    #[test]
    fn test_fork_is_isolated_both_ways() {
        let mut parent = Environment::new().with("x", 1i64);
        let mut child = parent.fork();

        child.add("x", 2i64);
        child.add("y", "only in child");
        parent.add("z", true);

        assert_eq!(parent.get("x"), Some(&Value::Int(1)));
        assert!(!parent.has("y"));
        assert_eq!(child.get("x"), Some(&Value::Int(2)));
        assert!(!child.has("z"));
    }

    #[test]
    fn test_bind_resolves_host_values() {
        let runtime = Runtime::standard().unwrap();
        let mut env = Environment::new();
        env.bind(&runtime, "n", &42u32).unwrap();
        assert_eq!(env.get("n"), Some(&Value::uint(42)));

        struct Opaque;
        assert!(env.bind(&runtime, "o", &Opaque).is_err());
        assert!(!env.has("o"));
    }

    #[test]
    fn test_collect_from_pairs() {
        let env: Environment = [("a", 1i64), ("b", 2i64)].into_iter().collect();
        assert_eq!(env.len(), 2);
        let mut names: Vec<_> = env.names().collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }
}
