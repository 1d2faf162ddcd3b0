//! Runtime values for CEL evaluation.
//!
//! `Value` is a closed set of variants. Every value has exactly one [`Kind`],
//! which is what the operator and function registries dispatch on.
//!
//! Equality and ordering follow CEL rules rather than structural Rust rules:
//! `int`, `uint` and `double` compare by mathematical value (`1 == 1u == 1.0`),
//! `NaN` equals nothing, and values of unrelated kinds are never equal.

pub(crate) mod message;
pub mod time;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::{FromPrimitive, ToPrimitive};

pub use message::{CelMessage, FromCelFields, MessageError, MessageFields, MessageType, MessageValue};
pub use time::{Duration, Timestamp};

/// The discriminant of a [`Value`].
///
/// Message kinds carry their registered type name so overloads can be keyed
/// per message type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Null,
    Bool,
    Int,
    UInt,
    Double,
    String,
    Bytes,
    List,
    Map,
    Timestamp,
    Duration,
    Message(Arc<str>),
}

impl Kind {
    /// Every kind except messages.
    pub const CORE: [Kind; 11] = [
        Kind::Null,
        Kind::Bool,
        Kind::Int,
        Kind::UInt,
        Kind::Double,
        Kind::String,
        Kind::Bytes,
        Kind::List,
        Kind::Map,
        Kind::Timestamp,
        Kind::Duration,
    ];

    pub fn message(type_name: impl Into<Arc<str>>) -> Self {
        Kind::Message(type_name.into())
    }

    /// The CEL name of this kind, as returned by `type()`.
    pub fn name(&self) -> &str {
        match self {
            Kind::Null => "null_type",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::UInt => "uint",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Timestamp => "timestamp",
            Kind::Duration => "duration",
            Kind::Message(name) => name,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Kind::Int | Kind::UInt | Kind::Double)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A CEL runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Unsigned integer of unbounded width.
    UInt(BigUint),
    /// 64-bit floating point.
    Double(f64),
    /// Unicode string (Arc for cheap cloning).
    String(Arc<str>),
    /// Byte sequence (Arc for cheap cloning).
    Bytes(Arc<[u8]>),
    /// Heterogeneous list.
    List(Arc<[Value]>),
    /// Key-value map.
    Map(Arc<ValueMap>),
    /// Timestamp (seconds and nanos since Unix epoch).
    Timestamp(Timestamp),
    /// Duration (seconds and nanos).
    Duration(Duration),
    /// Host-defined record.
    Message(MessageValue),
}

/// A CEL map with heterogeneous keys.
///
/// Uses a BTreeMap with a custom key type for deterministic iteration order.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: BTreeMap<MapKey, Value>,
}

/// A map key that supports CEL's key types.
///
/// CEL allows bool, int, uint, and string as map keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    UInt(BigUint),
    String(Arc<str>),
}

impl MapKey {
    /// Create a map key from a Value.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::UInt(u) => Some(MapKey::UInt(u.clone())),
            Value::String(s) => Some(MapKey::String(s.clone())),
            _ => None,
        }
    }

    /// Convert back to a Value.
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::UInt(u) => Value::UInt(u.clone()),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::String(Arc::from(s))
    }
}

impl From<i64> for MapKey {
    fn from(i: i64) -> Self {
        MapKey::Int(i)
    }
}

impl From<bool> for MapKey {
    fn from(b: bool) -> Self {
        MapKey::Bool(b)
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl ValueMap {
    /// Create a new empty map.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Create a map from an iterator of key-value pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (MapKey, Value)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Get a value by exact key.
    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Look up by a value, matching numeric keys across kinds.
    ///
    /// `m[1]`, `m[1u]` and `m[1.0]` all find an entry stored under `1` or
    /// `1u`. Returns `None` for values that can never be keys.
    pub fn lookup(&self, key: &Value) -> Option<&Value> {
        match key {
            Value::Int(i) => self.entries.get(&MapKey::Int(*i)).or_else(|| {
                u64::try_from(*i)
                    .ok()
                    .and_then(|u| self.entries.get(&MapKey::UInt(BigUint::from(u))))
            }),
            Value::UInt(u) => self
                .entries
                .get(&MapKey::UInt(u.clone()))
                .or_else(|| u.to_i64().and_then(|i| self.entries.get(&MapKey::Int(i)))),
            Value::Double(d) if d.is_finite() && d.fract() == 0.0 => {
                let as_int = (*d >= -9_223_372_036_854_775_808.0
                    && *d < 9_223_372_036_854_775_808.0)
                    .then(|| Value::Int(*d as i64));
                match as_int {
                    Some(int) => self.lookup(&int),
                    None => BigUint::from_f64(*d)
                        .and_then(|u| self.entries.get(&MapKey::UInt(u))),
                }
            }
            other => MapKey::from_value(other).and_then(|k| self.entries.get(&k)),
        }
    }

    /// Insert a key-value pair.
    pub fn insert(&mut self, key: MapKey, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    /// Check if a key exists.
    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries.
    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &Value)> {
        self.entries.iter()
    }

    /// Iterate over keys.
    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.keys()
    }

    /// Iterate over values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, a)| other.lookup(&key.to_value()).is_some_and(|b| a == b))
    }
}

// ==================== Value Constructors ====================

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    /// Create a bytes value.
    pub fn bytes(b: impl Into<Arc<[u8]>>) -> Self {
        Value::Bytes(b.into())
    }

    /// Create an unsigned value.
    pub fn uint(u: u64) -> Self {
        Value::UInt(BigUint::from(u))
    }

    /// Create a list value.
    pub fn list(elements: impl Into<Arc<[Value]>>) -> Self {
        Value::List(elements.into())
    }

    /// Create a map value.
    pub fn map(entries: impl IntoIterator<Item = (MapKey, Value)>) -> Self {
        Value::Map(Arc::new(ValueMap::from_entries(entries)))
    }

    /// Create a timestamp value.
    pub fn timestamp(seconds: i64, nanos: i32) -> Self {
        Value::Timestamp(Timestamp::new(seconds, nanos))
    }

    /// Create a duration value.
    pub fn duration(seconds: i64, nanos: i32) -> Self {
        Value::Duration(Duration::new(seconds, nanos))
    }

    /// Wrap a host message.
    pub fn message(msg: impl CelMessage) -> Self {
        Value::Message(MessageValue::new(Arc::new(msg)))
    }
}

// ==================== Type Information ====================

impl Value {
    /// The kind this value dispatches as.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::UInt(_) => Kind::UInt,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Bytes(_) => Kind::Bytes,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Timestamp(_) => Kind::Timestamp,
            Value::Duration(_) => Kind::Duration,
            Value::Message(m) => m.kind(),
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::UInt(_) | Value::Double(_))
    }
}

// ==================== Value Conversions ====================

impl Value {
    /// Try to convert to bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to convert to i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<&BigUint> {
        match self {
            Value::UInt(u) => Some(u),
            _ => None,
        }
    }

    /// Try to convert to f64.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Try to convert to string slice.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to bytes slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to convert to list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Try to convert to map.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Try to convert to timestamp.
    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Try to convert to duration.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageValue> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }
}

// ==================== Equality ====================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            // IEEE 754 for doubles: NaN compares as None, so NaN != NaN.
            _ if self.is_numeric() && other.is_numeric() => {
                self.compare(other) == Some(Ordering::Equal)
            }
            _ => false,
        }
    }
}

// ==================== Comparison ====================

impl Value {
    /// Compare two values, returning an ordering if comparable.
    ///
    /// Values of the same kind compare naturally (bools, strings and bytes
    /// lexicographically). Numeric kinds compare with each other exactly,
    /// without rounding through `f64`. Messages compare only when their type
    /// defines an ordering.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::UInt(a), Value::UInt(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            (Value::Message(a), Value::Message(b)) => a.compare(b),
            // Cross-numeric comparisons
            (Value::Int(a), Value::UInt(b)) => Some(cmp_int_uint(*a, b)),
            (Value::UInt(a), Value::Int(b)) => Some(cmp_int_uint(*b, a).reverse()),
            (Value::Int(a), Value::Double(b)) => cmp_int_double(*a, *b),
            (Value::Double(a), Value::Int(b)) => cmp_int_double(*b, *a).map(Ordering::reverse),
            (Value::UInt(a), Value::Double(b)) => cmp_uint_double(a, *b),
            (Value::Double(a), Value::UInt(b)) => cmp_uint_double(b, *a).map(Ordering::reverse),
            _ => None,
        }
    }
}

fn cmp_int_uint(a: i64, b: &BigUint) -> Ordering {
    match u64::try_from(a) {
        Ok(a) => BigUint::from(a).cmp(b),
        Err(_) => Ordering::Less,
    }
}

/// Compare an integer with the integral part of `b`, then with its fraction.
fn cmp_int_double(a: i64, b: f64) -> Option<Ordering> {
    if b.is_nan() {
        return None;
    }
    // i64 spans [-2^63, 2^63) exactly in f64.
    if b >= 9_223_372_036_854_775_808.0 {
        return Some(Ordering::Less);
    }
    if b < -9_223_372_036_854_775_808.0 {
        return Some(Ordering::Greater);
    }
    let whole = b.trunc();
    match a.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0.partial_cmp(&(b - whole)),
        unequal => Some(unequal),
    }
}

fn cmp_uint_double(a: &BigUint, b: f64) -> Option<Ordering> {
    if b.is_nan() {
        return None;
    }
    if b < 0.0 {
        return Some(Ordering::Greater);
    }
    if b.is_infinite() {
        return Some(Ordering::Less);
    }
    let whole = b.trunc();
    let whole_uint = BigUint::from_f64(whole)?;
    match a.cmp(&whole_uint) {
        Ordering::Equal => 0.0.partial_cmp(&(b - whole)),
        unequal => Some(unequal),
    }
}

// ==================== Conversions from host types ====================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::uint(u)
    }
}

impl From<u32> for Value {
    fn from(u: u32) -> Self {
        Value::uint(u as u64)
    }
}

impl From<BigUint> for Value {
    fn from(u: BigUint) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(Arc::from(b))
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(Arc::from(l))
    }
}

impl From<ValueMap> for Value {
    fn from(m: ValueMap) -> Self {
        Value::Map(Arc::new(m))
    }
}

impl From<Timestamp> for Value {
    fn from(t: Timestamp) -> Self {
        Value::Timestamp(t)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}

// ==================== Display ====================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}u", v),
            Value::Double(v) => write!(f, "{}", format_double(*v)),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => write!(f, "b\"{}\"", v.escape_ascii()),
            Value::List(v) => {
                write!(f, "[")?;
                for (i, elem) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (key, value)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Timestamp(t) => write!(f, "timestamp(\"{}\")", t),
            Value::Duration(d) => write!(f, "duration(\"{}\")", d),
            Value::Message(m) => {
                write!(f, "{}{{", m.type_name())?;
                for (i, (name, value)) in m.fields().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Format a double the way `string(double)` does.
pub(crate) fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d.is_sign_positive() {
            "+infinity".to_string()
        } else {
            "-infinity".to_string()
        }
    } else if d.fract() == 0.0 && d.abs() < 1e16 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Int(42), Value::Int(42));
        assert_ne!(Value::Int(42), Value::Int(43));
        assert_eq!(Value::string("hello"), Value::string("hello"));
        assert_ne!(Value::string("1"), Value::Int(1));
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn test_numeric_equality_across_kinds() {
        assert_eq!(Value::Int(1), Value::uint(1));
        assert_eq!(Value::uint(1), Value::Double(1.0));
        assert_ne!(Value::Int(1), Value::Double(1.5));
        assert_ne!(Value::Int(-1), Value::uint(1));
        assert_ne!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    }

    #[test]
    fn test_large_values_do_not_round_through_f64() {
        // 2^53 + 1 is not representable as f64.
        let big = 9_007_199_254_740_993i64;
        assert_ne!(Value::Int(big), Value::Double(big as f64));
        assert_eq!(
            Value::Int(big).compare(&Value::Double(9_007_199_254_740_992.0)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Int(i64::MAX).compare(&Value::Double(9.3e18)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_value_comparison() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(Value::Int(-1).compare(&Value::uint(1)), Some(Ordering::Less));
        assert_eq!(
            Value::uint(3).compare(&Value::Double(2.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Double(-0.5).compare(&Value::uint(0)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::Int(1).compare(&Value::string("1")), None);
    }

    #[test]
    fn test_list_equality_is_elementwise() {
        let a = Value::list(vec![Value::Int(1), Value::string("a")]);
        let b = Value::list(vec![Value::Double(1.0), Value::string("a")]);
        assert_eq!(a, b);
        assert_ne!(a, Value::list(vec![Value::Int(1)]));
    }

    #[test]
    fn test_map_lookup_crosses_numeric_kinds() {
        let map = ValueMap::from_entries([
            (MapKey::Int(1), Value::string("one")),
            (MapKey::UInt(BigUint::from(2u32)), Value::string("two")),
        ]);

        assert_eq!(map.lookup(&Value::uint(1)), Some(&Value::string("one")));
        assert_eq!(map.lookup(&Value::Int(2)), Some(&Value::string("two")));
        assert_eq!(map.lookup(&Value::Double(1.0)), Some(&Value::string("one")));
        assert_eq!(map.lookup(&Value::Double(1.5)), None);
        assert_eq!(map.lookup(&Value::Null), None);
    }

    #[test]
    fn test_map_equality_ignores_insertion_order() {
        let a = Value::map([
            (MapKey::from("a"), Value::Int(1)),
            (MapKey::from("b"), Value::Int(2)),
        ]);
        let b = Value::map([
            (MapKey::from("b"), Value::Int(2)),
            (MapKey::from("a"), Value::Int(1)),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Null.kind().to_string(), "null_type");
        assert_eq!(Value::uint(3).kind(), Kind::UInt);
        assert_eq!(Kind::message("acme.Order").to_string(), "acme.Order");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Null), "null");
        assert_eq!(format!("{}", Value::uint(42)), "42u");
        assert_eq!(format!("{}", Value::Double(2.0)), "2.0");
        assert_eq!(format!("{}", Value::string("hi")), "\"hi\"");
        assert_eq!(
            format!("{}", Value::list(vec![Value::Int(1), Value::Bool(true)])),
            "[1, true]"
        );
        assert_eq!(
            format!("{}", Value::Duration(Duration::new(90, 0))),
            "duration(\"90s\")"
        );
    }
}
