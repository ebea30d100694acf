//! Flattened document representation.
//!
//! A [`FieldMap`] is the name → [`Value`] form of one document as it travels
//! between the store, the caches and the resolver. Field names are kept as
//! the mapping layer produced them; every comparison the engine makes is
//! case-insensitive.
//!
//! ```
//! use docmesh::doc::{FieldMap, Value};
//! use docmesh::Address;
//!
//! let owner = Address::parse("Person/john").unwrap();
//! let car = FieldMap::new()
//!     .with("make", "Toyota")
//!     .with("year", 2001)
//!     .with("owner", owner);
//!
//! assert_eq!(car.text("make"), Some("Toyota"));
//! assert!(car.reference("owner").is_some());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as Json};

use crate::address::Reference;

mod errors;
pub mod value;

pub use errors::DocError;
pub use value::Value;

/// Name → value mapping for one document or one embedded sub-object.
///
/// A `FieldMap` is owned by exactly one component at a time. Components hand
/// out clones rather than shared references, so mutating a returned map never
/// affects the copy held by a cache or a resolver.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMap(BTreeMap<String, Value>);

impl FieldMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Looks a field up ignoring ASCII case.
    pub fn get_ignore_case(&self, key: &str) -> Option<&Value> {
        self.0.get(key).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.0.iter_mut()
    }

    /// Keeps only the fields for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &mut Value) -> bool) {
        self.0.retain(|k, v| keep(k, v));
    }

    // Typed accessors, mostly for hand-written `Record::from_fields`.

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get_ignore_case(key).and_then(Value::as_text)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get_ignore_case(key).and_then(Value::as_int)
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        self.get_ignore_case(key).and_then(Value::as_float)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get_ignore_case(key).and_then(Value::as_bool)
    }

    pub fn map(&self, key: &str) -> Option<&FieldMap> {
        self.get_ignore_case(key).and_then(Value::as_map)
    }

    pub fn reference(&self, key: &str) -> Option<&Reference> {
        self.get_ignore_case(key).and_then(Value::as_reference)
    }

    pub fn list(&self, key: &str) -> Option<&[Value]> {
        self.get_ignore_case(key).and_then(Value::as_list)
    }

    /// Converts the map to a JSON object (see [`Value::to_json`]).
    pub fn to_json(&self) -> Json {
        Json::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Builds a map from a JSON value, which must be an object.
    pub fn from_json(json: Json) -> Result<Self, DocError> {
        match json {
            Json::Object(obj) => Self::from_json_object(obj),
            other => Err(DocError::InvalidJson {
                reason: format!("expected object, found {other}"),
            }),
        }
    }

    pub(crate) fn from_json_object(obj: JsonMap<String, Json>) -> Result<Self, DocError> {
        obj.into_iter()
            .map(|(k, v)| Ok((k, Value::from_json(v)?)))
            .collect::<Result<BTreeMap<_, _>, DocError>>()
            .map(Self)
    }
}

impl FromIterator<(String, Value)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for FieldMap {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let json = Json::deserialize(deserializer)?;
        FieldMap::from_json(json).map_err(serde::de::Error::custom)
    }
}
