//! Field values stored in a [`FieldMap`].
//!
//! A value is either a scalar, an embedded map (no address of its own), a
//! [`Reference`] to another document, or a list of any of those. The
//! distinction between an embedded map and a reference drives the whole
//! resolution algorithm: embedded maps are walked in place, references are
//! fetched.

use serde_json::{Map as JsonMap, Number, Value as Json};

use super::{DocError, FieldMap};
use crate::address::{Address, Reference};

/// JSON object key marking a serialized reference: `{"$ref": "Car/abc"}`.
pub const REF_KEY: &str = "$ref";

/// A single field value.
///
/// `Value` implements `PartialEq` with primitive types for terse assertions:
///
/// ```
/// # use docmesh::doc::Value;
/// assert!(Value::from("Toyota") == "Toyota");
/// assert!(Value::from(2001) == 2001);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null/empty value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text string value
    Text(String),
    /// Embedded map without an address of its own
    Map(FieldMap),
    /// Pointer to another document
    Ref(Reference),
    /// Ordered collection of values
    List(Vec<Value>),
}

impl Value {
    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Map(_) => "map",
            Value::Ref(_) => "ref",
            Value::List(_) => "list",
        }
    }

    /// Returns true for null, bool, number and text values.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_)
        )
    }

    /// Returns true for a non-empty list holding only references.
    pub fn is_ref_list(&self) -> bool {
        match self {
            Value::List(items) => {
                !items.is_empty() && items.iter().all(|v| matches!(v, Value::Ref(_)))
            }
            _ => false,
        }
    }

    /// Returns true for a non-empty list holding only embedded maps.
    pub fn is_map_list(&self) -> bool {
        match self {
            Value::List(items) => {
                !items.is_empty() && items.iter().all(|v| matches!(v, Value::Map(_)))
            }
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut FieldMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Converts the value to its JSON form.
    ///
    /// References become `{"$ref": "<address>"}`. Non-finite floats have no
    /// JSON representation and become `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::Text(s) => Json::String(s.clone()),
            Value::Map(m) => m.to_json(),
            Value::Ref(r) => {
                let mut obj = JsonMap::new();
                obj.insert(REF_KEY.to_string(), Json::String(r.address().to_string()));
                Json::Object(obj)
            }
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Builds a value from its JSON form, the inverse of [`Value::to_json`].
    pub fn from_json(json: Json) -> Result<Value, DocError> {
        Ok(match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().ok_or_else(|| DocError::InvalidJson {
                    reason: format!("number out of range: {n}"),
                })?),
            },
            Json::String(s) => Value::Text(s),
            Json::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Json::Object(obj) => {
                if obj.len() == 1 {
                    if let Some(Json::String(path)) = obj.get(REF_KEY) {
                        return Ok(Value::Ref(Reference::new(Address::parse(path.as_str())?)));
                    }
                }
                Value::Map(FieldMap::from_json_object(obj)?)
            }
        })
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<FieldMap> for Value {
    fn from(value: FieldMap) -> Self {
        Value::Map(value)
    }
}

impl From<Reference> for Value {
    fn from(value: Reference) -> Self {
        Value::Ref(value)
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Value::Ref(Reference::new(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_text() == Some(other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == Some(*other)
    }
}

impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool {
        self.as_int() == Some(*other)
    }
}

impl PartialEq<i32> for Value {
    fn eq(&self, other: &i32) -> bool {
        self.as_int() == Some(*other as i64)
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}
