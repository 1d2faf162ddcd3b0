//! Conversion of host values into runtime values.
//!
//! Resolvers are tried in registration order; the first one whose
//! [`ValueResolver::can_resolve`] accepts the input converts it. The
//! [`DefaultResolver`] always sits at the end of the chain.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;

use crate::error::ResolveError;
use crate::value::{CelMessage, Duration, MapKey, MessageType, MessageValue, Timestamp, Value};

/// Converts some family of host values into [`Value`]s.
pub trait ValueResolver: Send + Sync {
    /// Whether this resolver handles `host`.
    fn can_resolve(&self, host: &dyn Any) -> bool;

    /// Convert `host`. Only called after `can_resolve` returned true.
    fn resolve(&self, host: &dyn Any) -> Result<Value, ResolveError>;
}

type Converter = fn(&dyn Any) -> Option<Value>;

const SCALARS: &[Converter] = &[
    |a| a.downcast_ref::<Value>().cloned(),
    |a| a.is::<()>().then_some(Value::Null),
    |a| a.downcast_ref::<bool>().map(|v| Value::Bool(*v)),
    |a| a.downcast_ref::<i8>().map(|v| Value::Int(i64::from(*v))),
    |a| a.downcast_ref::<i16>().map(|v| Value::Int(i64::from(*v))),
    |a| a.downcast_ref::<i32>().map(|v| Value::Int(i64::from(*v))),
    |a| a.downcast_ref::<i64>().map(|v| Value::Int(*v)),
    |a| a.downcast_ref::<u8>().map(|v| Value::UInt(BigUint::from(*v))),
    |a| a.downcast_ref::<u16>().map(|v| Value::UInt(BigUint::from(*v))),
    |a| a.downcast_ref::<u32>().map(|v| Value::UInt(BigUint::from(*v))),
    |a| a.downcast_ref::<u64>().map(|v| Value::UInt(BigUint::from(*v))),
    |a| a.downcast_ref::<u128>().map(|v| Value::UInt(BigUint::from(*v))),
    |a| a.downcast_ref::<usize>().map(|v| Value::UInt(BigUint::from(*v))),
    |a| a.downcast_ref::<BigUint>().map(|v| Value::UInt(v.clone())),
    |a| a.downcast_ref::<f32>().map(|v| Value::Double(f64::from(*v))),
    |a| a.downcast_ref::<f64>().map(|v| Value::Double(*v)),
    |a| a.downcast_ref::<String>().map(|v| Value::string(v.as_str())),
    |a| a.downcast_ref::<&'static str>().map(|v| Value::string(*v)),
    |a| a.downcast_ref::<Arc<str>>().map(|v| Value::String(v.clone())),
    |a| a.downcast_ref::<Vec<u8>>().map(|v| Value::bytes(v.as_slice())),
    |a| a.downcast_ref::<Vec<Value>>().map(|v| Value::list(v.as_slice())),
    |a| a.downcast_ref::<Vec<bool>>().map(|v| list_of(v, |b| Value::Bool(*b))),
    |a| a.downcast_ref::<Vec<i32>>().map(|v| list_of(v, |i| Value::Int(i64::from(*i)))),
    |a| a.downcast_ref::<Vec<i64>>().map(|v| list_of(v, |i| Value::Int(*i))),
    |a| a.downcast_ref::<Vec<u32>>().map(|v| list_of(v, |u| Value::uint(u64::from(*u)))),
    |a| a.downcast_ref::<Vec<u64>>().map(|v| list_of(v, |u| Value::uint(*u))),
    |a| a.downcast_ref::<Vec<f64>>().map(|v| list_of(v, |d| Value::Double(*d))),
    |a| a.downcast_ref::<Vec<String>>().map(|v| list_of(v, |s| Value::string(s.as_str()))),
    |a| a.downcast_ref::<Vec<&'static str>>().map(|v| list_of(v, |s| Value::string(*s))),
    |a| a.downcast_ref::<&'static [bool]>().map(|v| list_of(v, |b| Value::Bool(*b))),
    |a| a.downcast_ref::<&'static [i64]>().map(|v| list_of(v, |i| Value::Int(*i))),
    |a| a.downcast_ref::<&'static [u64]>().map(|v| list_of(v, |u| Value::uint(*u))),
    |a| a.downcast_ref::<&'static [f64]>().map(|v| list_of(v, |d| Value::Double(*d))),
    |a| a.downcast_ref::<&'static [&'static str]>().map(|v| list_of(v, |s| Value::string(*s))),
    |a| a.downcast_ref::<Timestamp>().map(|v| Value::Timestamp(*v)),
    |a| a.downcast_ref::<Duration>().map(|v| Value::Duration(*v)),
    |a| {
        a.downcast_ref::<HashMap<String, Value>>()
            .map(|m| string_keyed(m.iter()))
    },
    |a| {
        a.downcast_ref::<BTreeMap<String, Value>>()
            .map(|m| string_keyed(m.iter()))
    },
    |a| {
        a.downcast_ref::<Arc<dyn CelMessage>>()
            .map(|m| Value::Message(MessageValue::new(m.clone())))
    },
];

fn list_of<T>(items: &[T], element: fn(&T) -> Value) -> Value {
    Value::list(items.iter().map(element).collect::<Vec<_>>())
}

fn string_keyed<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> Value {
    Value::map(entries.map(|(k, v)| (MapKey::from(k.as_str()), v.clone())))
}

/// Fallback resolver for primitives, collections, time values, and the
/// message types registered with the runtime.
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver {
    messages: Vec<MessageType>,
}

impl DefaultResolver {
    pub fn new(messages: Vec<MessageType>) -> Self {
        Self { messages }
    }

    fn convert(&self, host: &dyn Any) -> Option<Result<Value, ResolveError>> {
        if let Some(value) = SCALARS.iter().find_map(|convert| convert(host)) {
            return Some(Ok(value));
        }
        if let Some(v) = host.downcast_ref::<isize>() {
            return Some(Ok(Value::Int(*v as i64)));
        }
        if let Some(v) = host.downcast_ref::<i128>() {
            return Some(i64::try_from(*v).map(Value::Int).map_err(|_| {
                conversion("i128", format!("{} does not fit in a 64-bit int", v))
            }));
        }
        if let Some(dt) = host.downcast_ref::<DateTime<Utc>>() {
            let ts = Timestamp::new(dt.timestamp(), dt.timestamp_subsec_nanos() as i32);
            return Some(if ts.is_valid() {
                Ok(Value::Timestamp(ts))
            } else {
                Err(conversion("DateTime<Utc>", "timestamp out of range"))
            });
        }
        if let Some(d) = host.downcast_ref::<std::time::Duration>() {
            return Some(
                Duration::from_total_nanos(d.as_nanos() as i128)
                    .filter(Duration::is_valid)
                    .map(Value::Duration)
                    .ok_or_else(|| conversion("std::time::Duration", "duration out of range")),
            );
        }
        self.messages
            .iter()
            .find_map(|ty| ty.wrap(host))
            .map(Ok)
    }
}

fn conversion(type_name: &str, reason: impl Into<String>) -> ResolveError {
    ResolveError::Conversion {
        type_name: type_name.to_string(),
        reason: reason.into(),
    }
}

impl ValueResolver for DefaultResolver {
    fn can_resolve(&self, host: &dyn Any) -> bool {
        self.convert(host).is_some()
    }

    fn resolve(&self, host: &dyn Any) -> Result<Value, ResolveError> {
        self.convert(host).unwrap_or_else(|| {
            Err(ResolveError::IncompatibleValue {
                type_name: "host value".to_string(),
            })
        })
    }
}

/// Ordered resolvers contributed by extensions, followed by the default.
#[derive(Clone)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ValueResolver>>,
}

impl ResolverChain {
    pub fn new(mut resolvers: Vec<Arc<dyn ValueResolver>>, messages: Vec<MessageType>) -> Self {
        resolvers.push(Arc::new(DefaultResolver::new(messages)));
        Self { resolvers }
    }

    /// Convert with the first accepting resolver.
    ///
    /// `type_name` only labels the error when nothing accepts `host`.
    pub fn resolve(&self, host: &dyn Any, type_name: &str) -> Result<Value, ResolveError> {
        match self.resolvers.iter().find(|r| r.can_resolve(host)) {
            Some(resolver) => resolver.resolve(host),
            None => {
                tracing::trace!(type_name, "no resolver accepted host value");
                Err(ResolveError::IncompatibleValue {
                    type_name: type_name.to_string(),
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverChain")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::message::tests::Point;

    struct Celsius(f64);

    struct CelsiusResolver;

    impl ValueResolver for CelsiusResolver {
        fn can_resolve(&self, host: &dyn Any) -> bool {
            host.is::<Celsius>()
        }

        fn resolve(&self, host: &dyn Any) -> Result<Value, ResolveError> {
            host.downcast_ref::<Celsius>()
                .map(|c| Value::Double(c.0))
                .ok_or_else(|| ResolveError::IncompatibleValue {
                    type_name: "Celsius".to_string(),
                })
        }
    }

    #[test]
    fn test_default_resolver_primitives() {
        let chain = ResolverChain::default();
        assert_eq!(chain.resolve(&(), "()").unwrap(), Value::Null);
        assert_eq!(chain.resolve(&7i32, "i32").unwrap(), Value::Int(7));
        assert_eq!(chain.resolve(&7u8, "u8").unwrap(), Value::uint(7));
        assert_eq!(
            chain.resolve(&"hi".to_string(), "String").unwrap(),
            Value::string("hi")
        );
        assert_eq!(
            chain.resolve(&vec![Value::Int(1)], "Vec<Value>").unwrap(),
            Value::list(vec![Value::Int(1)])
        );
    }

    #[test]
    fn test_host_arrays_become_lists() {
        let chain = ResolverChain::default();
        assert_eq!(
            chain.resolve(&vec![1i64, 2], "Vec<i64>").unwrap(),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            chain.resolve(&vec!["a".to_string()], "Vec<String>").unwrap(),
            Value::list(vec![Value::string("a")])
        );
        let tags: &'static [&'static str] = &["x", "y"];
        assert_eq!(
            chain.resolve(&tags, "&[&str]").unwrap(),
            Value::list(vec![Value::string("x"), Value::string("y")])
        );
        assert_eq!(
            chain.resolve(&Vec::<f64>::new(), "Vec<f64>").unwrap(),
            Value::list(Vec::new())
        );
    }

    #[test]
    fn test_string_keyed_maps() {
        let mut host = HashMap::new();
        host.insert("a".to_string(), Value::Int(1));
        let value = ResolverChain::default().resolve(&host, "HashMap").unwrap();
        assert_eq!(
            value.as_map().and_then(|m| m.get(&MapKey::from("a"))),
            Some(&Value::Int(1))
        );
    }

    #[test]
    fn test_i128_out_of_range_is_a_conversion_error() {
        let err = ResolverChain::default()
            .resolve(&i128::MAX, "i128")
            .unwrap_err();
        assert!(matches!(err, ResolveError::Conversion { .. }));
    }

    #[test]
    fn test_custom_resolvers_run_first() {
        let chain = ResolverChain::new(vec![Arc::new(CelsiusResolver)], Vec::new());
        assert_eq!(
            chain.resolve(&Celsius(21.5), "Celsius").unwrap(),
            Value::Double(21.5)
        );
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_registered_message_types_are_wrapped() {
        let chain = ResolverChain::new(Vec::new(), vec![MessageType::of::<Point>(&[])]);
        let value = chain.resolve(&Point { x: 3, y: 4 }, "Point").unwrap();
        assert_eq!(value.as_message().map(|m| m.type_name()), Some("test.Point"));
    }

    #[test]
    fn test_unknown_host_type_is_incompatible() {
        let err = ResolverChain::default()
            .resolve(&Celsius(0.0), "Celsius")
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::IncompatibleValue {
                type_name: "Celsius".to_string()
            }
        );
    }
}
