//! Host-defined message types.
//!
//! A host struct takes part in evaluation by implementing [`CelMessage`]
//! (how to read it) and [`FromCelFields`] (how to build it from a
//! `Type{field: value}` expression). [`MessageType::of`] packages both so an
//! extension can register the type under one or more aliases.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::{Kind, Value};

/// A host value exposed to expressions as a named record.
pub trait CelMessage: fmt::Debug + Send + Sync + 'static {
    /// Fully qualified type name; also the [`Kind::Message`] key.
    fn type_name(&self) -> &str;

    /// Field view used for member access, `has()` and equality.
    fn to_fields(&self) -> MessageFields;

    /// Access to the concrete host type.
    fn as_any(&self) -> &dyn Any;

    /// Ordering between two messages of the same type.
    ///
    /// Types that return `Some` here are compared (and tested for equality)
    /// through this method instead of field by field.
    fn compare(&self, _other: &dyn CelMessage) -> Option<Ordering> {
        None
    }
}

impl dyn CelMessage {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

/// Construction of a host message from evaluated fields.
pub trait FromCelFields: Sized {
    /// Name the type is registered under.
    const TYPE_NAME: &'static str;

    fn from_cel_fields(fields: &MessageFields) -> Result<Self, MessageError>;
}

/// Why a set of fields could not be turned into a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessageError {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{field}' expects {expected}, got {actual}")]
    FieldType {
        field: String,
        expected: &'static str,
        actual: Kind,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Named field values of a message, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageFields {
    fields: BTreeMap<String, Value>,
}

impl MessageFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a field, returning the previous value if the name was present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field value, or [`MessageError::MissingField`].
    pub fn require(&self, name: &str) -> Result<&Value, MessageError> {
        self.get(name)
            .ok_or_else(|| MessageError::MissingField(name.to_string()))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, MessageError> {
        let value = self.require(name)?;
        value.as_bool().ok_or_else(|| wrong_type(name, "bool", value))
    }

    pub fn get_int(&self, name: &str) -> Result<i64, MessageError> {
        let value = self.require(name)?;
        value.as_int().ok_or_else(|| wrong_type(name, "int", value))
    }

    pub fn get_double(&self, name: &str) -> Result<f64, MessageError> {
        let value = self.require(name)?;
        value.as_double().ok_or_else(|| wrong_type(name, "double", value))
    }

    pub fn get_string(&self, name: &str) -> Result<&str, MessageError> {
        let value = self.require(name)?;
        value.as_string().ok_or_else(|| wrong_type(name, "string", value))
    }

    /// Fail on the first field whose name is not in `allowed`.
    pub fn reject_unknown(&self, allowed: &[&str]) -> Result<(), MessageError> {
        match self.fields.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(unknown) => Err(MessageError::UnknownField(unknown.clone())),
            None => Ok(()),
        }
    }
}

fn wrong_type(field: &str, expected: &'static str, value: &Value) -> MessageError {
    MessageError::FieldType {
        field: field.to_string(),
        expected,
        actual: value.kind(),
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MessageFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A message value: the host object plus a snapshot of its fields.
#[derive(Debug, Clone)]
pub struct MessageValue {
    type_name: Arc<str>,
    fields: Arc<MessageFields>,
    native: Arc<dyn CelMessage>,
}

impl MessageValue {
    pub fn new(native: Arc<dyn CelMessage>) -> Self {
        Self {
            type_name: Arc::from(native.type_name()),
            fields: Arc::new(native.to_fields()),
            native,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn kind(&self) -> Kind {
        Kind::Message(self.type_name.clone())
    }

    pub fn fields(&self) -> &MessageFields {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The originating host object.
    pub fn native(&self) -> &Arc<dyn CelMessage> {
        &self.native
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.native.downcast_ref()
    }

    /// Ordering for two messages of the same type, when the type defines one.
    pub fn compare(&self, other: &MessageValue) -> Option<Ordering> {
        if self.type_name != other.type_name {
            return None;
        }
        self.native.compare(other.native.as_ref())
    }
}

impl PartialEq for MessageValue {
    fn eq(&self, other: &Self) -> bool {
        if self.type_name != other.type_name {
            return false;
        }
        match self.native.compare(other.native.as_ref()) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self.fields == other.fields,
        }
    }
}

type Constructor =
    Arc<dyn Fn(&MessageFields) -> Result<Arc<dyn CelMessage>, MessageError> + Send + Sync>;
type Wrapper = Arc<dyn Fn(&dyn Any) -> Option<Arc<dyn CelMessage>> + Send + Sync>;

/// Registration record for a host message type.
#[derive(Clone)]
pub struct MessageType {
    type_name: Arc<str>,
    aliases: Vec<String>,
    construct: Constructor,
    wrap: Wrapper,
}

impl MessageType {
    /// Describe `T`, reachable in expressions by its type name and `aliases`.
    pub fn of<T>(aliases: &[&str]) -> Self
    where
        T: CelMessage + FromCelFields + Clone,
    {
        Self {
            type_name: Arc::from(T::TYPE_NAME),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            construct: Arc::new(|fields: &MessageFields| {
                T::from_cel_fields(fields).map(|msg| Arc::new(msg) as Arc<dyn CelMessage>)
            }),
            wrap: Arc::new(|host: &dyn Any| {
                host.downcast_ref::<T>()
                    .map(|msg| Arc::new(msg.clone()) as Arc<dyn CelMessage>)
            }),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn kind(&self) -> Kind {
        Kind::Message(self.type_name.clone())
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Type name followed by the aliases.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.type_name()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Build a message value from evaluated fields.
    pub fn construct(&self, fields: &MessageFields) -> Result<Value, MessageError> {
        (self.construct)(fields).map(|native| Value::Message(MessageValue::new(native)))
    }

    /// Wrap a host object of this type, if `host` is one.
    pub fn wrap(&self, host: &dyn Any) -> Option<Value> {
        (self.wrap)(host).map(|native| Value::Message(MessageValue::new(native)))
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageType")
            .field("type_name", &self.type_name)
            .field("aliases", &self.aliases)
            .finish()
    }
}
