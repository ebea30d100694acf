//! Collection queries.
//!
//! A [`Filter`] selects documents of one collection whose fields satisfy every
//! condition. Field paths may be dotted to reach into embedded maps.
//!
//! ```
//! use docmesh::store::{Filter, Op};
//!
//! let filter = Filter::collection("Car")
//!     .where_field("make", Op::Eq, "Toyota")
//!     .where_field("year", Op::Ge, 2000)
//!     .limit(10);
//! assert_eq!(filter.conditions().len(), 2);
//! ```

use std::{cmp::Ordering, fmt, str::FromStr};

use super::StoreError;
use crate::{
    address::Address,
    doc::{FieldMap, Value},
};

/// Comparison operator of one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// The field is a list holding the value.
    ArrayContains,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::ArrayContains => "array-contains",
        };
        f.write_str(op)
    }
}

impl FromStr for Op {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Op::Eq),
            "!=" => Ok(Op::Ne),
            "<" => Ok(Op::Lt),
            "<=" => Ok(Op::Le),
            ">" => Ok(Op::Gt),
            ">=" => Ok(Op::Ge),
            "array-contains" => Ok(Op::ArrayContains),
            other => Err(StoreError::InvalidQuery {
                reason: format!("unknown operator '{other}'"),
            }),
        }
    }
}

/// A single `field op value` test.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    /// Evaluates the condition. A missing field never matches.
    pub fn matches(&self, fields: &FieldMap) -> bool {
        let Some(actual) = lookup(fields, &self.field) else {
            return false;
        };
        match self.op {
            Op::Eq => compare(actual, &self.value) == Some(Ordering::Equal),
            Op::Ne => compare(actual, &self.value) != Some(Ordering::Equal),
            Op::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            Op::Le => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Op::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            Op::Ge => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Op::ArrayContains => actual.as_list().is_some_and(|items| {
                items
                    .iter()
                    .any(|item| compare(item, &self.value) == Some(Ordering::Equal))
            }),
        }
    }
}

/// Conjunctive filter over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    collection: String,
    conditions: Vec<Condition>,
    limit: Option<usize>,
}

impl Filter {
    /// Selects every document of `collection` (a canonical collection path
    /// such as `Car` or `Person/john/Pet`).
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            conditions: Vec::new(),
            limit: None,
        }
    }

    /// Adds a condition.
    pub fn where_field(
        mut self,
        field: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Caps the number of documents returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn collection_path(&self) -> &str {
        &self.collection
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn max_results(&self) -> Option<usize> {
        self.limit
    }

    /// Returns true if the document at `address` passes the filter.
    pub fn matches(&self, address: &Address, fields: &FieldMap) -> bool {
        address.collection() == self.collection
            && self.conditions.iter().all(|c| c.matches(fields))
    }
}

fn lookup<'a>(fields: &'a FieldMap, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get_ignore_case(segments.next()?)?;
    for segment in segments {
        current = current.as_map()?.get_ignore_case(segment)?;
    }
    Some(current)
}

/// Orders two values of compatible kinds; numbers compare across int/float.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            a.as_float()?.partial_cmp(&b.as_float()?)
        }
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Ref(x), Value::Ref(y)) => Some(x.address().canonical().cmp(&y.address().canonical())),
        (Value::Map(_), Value::Map(_)) | (Value::List(_), Value::List(_)) => {
            (a == b).then_some(Ordering::Equal)
        }
        _ => None,
    }
}
