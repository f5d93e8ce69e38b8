//! The dynamically-typed record that flows through every queue.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indexmap::IndexMap;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A dynamically typed value held by a [`Record`].
///
/// Mirrors the eight kinds the data model allows: null, bool, integer,
/// float, string, binary, list, and nested map. There is deliberately
/// no date/decimal/set variant — those only exist in the source this
/// spec was distilled from as an artifact of a dynamically typed host
/// language, and values of that shape arrive here already normalized
/// to one of these eight kinds (typically `Str` for an ISO-8601 date).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Record),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render a scalar as its string form, for formats (CSV) that only carry
    /// text. Returns `None` for `List`/`Map`, which have no scalar rendering.
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.clone()),
            Value::Bytes(b) => Some(BASE64.encode(b)),
            Value::List(_) | Value::Map(_) => None,
        }
    }
}

/// An ordered key-value mapping: the unit of flow on every queue.
///
/// Equality is structural (key/value pairs, independent of insertion
/// order, per [`indexmap::IndexMap`]'s `PartialEq`). Insertion order is
/// preserved so that formats with positional semantics (CSV headers)
/// see a stable column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(IndexMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(IndexMap::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Record(IndexMap::with_capacity(capacity))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys sorted lexicographically, as the JSONLines writer requires.
    pub fn sorted_keys(&self) -> Vec<&String> {
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();
        keys
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Record(IndexMap::from_iter(iter))
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Marker tags used by [`Value`]'s hand-written (de)serialization so that
/// `Bytes` round-trips through formats (JSON, CSV) with no native binary
/// type, instead of silently degrading to a plain string.
const BYTES_TAG: &str = "__wingline_bytes_b64__";

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => {
                // No format we support has a native binary type that survives
                // a JSON round-trip, so bytes are always carried as a
                // single-entry tagged map, decoded back in `ValueVisitor::visit_map`.
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(BYTES_TAG, &BASE64.encode(bytes))?;
                map.end()
            }
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(record) => {
                let mut map = serializer.serialize_map(Some(record.len()))?;
                for (k, v) in record.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a wingline record value")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(Value::Null)
    }
    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(Value::Null)
    }
    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Value::Bool(v))
    }
    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Value::Int(v))
    }
    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Value::Int(v as i64))
    }
    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Value::Float(v))
    }
    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Value::Str(v.to_owned()))
    }
    fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
        Ok(Value::Str(v))
    }
    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }
    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(v) = seq.next_element::<Value>()? {
            items.push(v);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut record = Record::with_capacity(access.size_hint().unwrap_or(0));
        let mut first_key: Option<String> = None;
        let mut first_value: Option<Value> = None;
        while let Some(key) = access.next_key::<String>()? {
            let value: Value = access.next_value()?;
            if record.is_empty() && first_key.is_none() {
                first_key = Some(key.clone());
                first_value = Some(value.clone());
            }
            record.insert(key, value);
        }
        // A single-entry map tagged as base64 bytes (how formats with no
        // native binary type, e.g. JSON, carry `Value::Bytes`).
        if record.len() == 1 {
            if let (Some(k), Some(Value::Str(s))) = (first_key, first_value) {
                if k == BYTES_TAG {
                    let bytes = BASE64
                        .decode(&s)
                        .map_err(|e| de::Error::custom(format!("bad bytes tag: {e}")))?;
                    return Ok(Value::Bytes(bytes));
                }
            }
        }
        Ok(Value::Map(record))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Map(record) => Ok(record),
            other => Err(de::Error::custom(format!(
                "expected a record (map), got {other:?}"
            ))),
        }
    }
}
