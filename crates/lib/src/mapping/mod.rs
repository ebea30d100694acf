//! Typed records and their flat document form.
//!
//! A record type implements [`Record`] to describe itself and to convert to
//! and from a [`FieldMap`]. The description is checked once, when the type is
//! registered with a [`Registry`], so misconfigured ids or parent fields fail
//! at startup instead of on the first request.
//!
//! References between records are modelled with [`Related`]: either just the
//! [`Reference`] as stored, or the referenced record once it has been loaded.

use std::{
    any::{TypeId, type_name},
    collections::{HashMap, HashSet},
};

use crate::{
    address::{Address, Reference},
    doc::{FieldMap, Value},
};

mod errors;

pub use errors::MappingError;

/// How a field is represented in the flat document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Null, bool, number or text.
    Scalar,
    /// Embedded map without an address of its own.
    Map,
    /// List of embedded maps.
    MapList,
    /// Reference to another document.
    Ref,
    /// List of references.
    RefList,
    /// List of scalars.
    List,
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

/// Static description of a record type.
///
/// ```
/// use docmesh::mapping::{FieldKind, RecordDescriptor};
///
/// let car = RecordDescriptor::new("Car")
///     .field("id", FieldKind::Scalar)
///     .field("make", FieldKind::Scalar)
///     .field("owner", FieldKind::Ref);
/// assert_eq!(car.kind_of("OWNER"), Some(FieldKind::Ref));
/// assert!(car.validate("id", None).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    collection: String,
    id_field: String,
    parent_field: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    /// Describes records stored in `collection`, with id field `id`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id_field: "id".to_string(),
            parent_field: None,
            fields: Vec::new(),
        }
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = name.into();
        self
    }

    /// Declares the field linking a sub-collection record to its parent.
    pub fn parent_field(mut self, name: impl Into<String>) -> Self {
        self.parent_field = Some(name.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id_field_name(&self) -> &str {
        &self.id_field
    }

    pub fn parent_field_name(&self) -> Option<&str> {
        self.parent_field.as_deref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// The declared kind of `name`, ignoring case.
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.kind)
    }

    /// Checks the descriptor against the client's id and parent field names.
    pub fn validate(&self, id_field: &str, parent_field: Option<&str>) -> Result<(), MappingError> {
        if self.collection.is_empty() || self.collection.contains('/') {
            return Err(MappingError::InvalidDescriptor {
                reason: format!("collection name '{}' must be a single segment", self.collection),
            });
        }
        if !self.id_field.eq_ignore_ascii_case(id_field) {
            return Err(MappingError::IdFieldMismatch {
                collection: self.collection.clone(),
                expected: id_field.to_string(),
                found: self.id_field.clone(),
            });
        }
        if self.kind_of(&self.id_field) != Some(FieldKind::Scalar) {
            return Err(MappingError::MissingIdField {
                collection: self.collection.clone(),
                id_field: self.id_field.clone(),
            });
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(MappingError::DuplicateField {
                    collection: self.collection.clone(),
                    field: field.name.clone(),
                });
            }
        }

        if let Some(parent) = &self.parent_field {
            if self.kind_of(parent) != Some(FieldKind::Ref) {
                return Err(MappingError::InvalidParentField {
                    collection: self.collection.clone(),
                    field: parent.clone(),
                });
            }
        }
        // A client-wide parent field only applies to records declaring it.
        if let Some(parent) = parent_field {
            if self.kind_of(parent).is_some_and(|kind| kind != FieldKind::Ref) {
                return Err(MappingError::InvalidParentField {
                    collection: self.collection.clone(),
                    field: parent.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A typed record stored as one document.
pub trait Record: Send + Sync + Sized + 'static {
    /// Describes the record type. Called once at registration.
    fn descriptor() -> RecordDescriptor;

    /// The document id, empty when the record has not been stored yet.
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// The parent document for records living in a sub-collection.
    fn parent(&self) -> Option<Address> {
        None
    }

    /// Flattens the record. The id field may be included; it is never stored.
    fn to_fields(&self) -> Result<FieldMap, MappingError>;

    /// Rebuilds a record from a possibly resolved document.
    fn from_fields(fields: &FieldMap) -> Result<Self, MappingError>;
}

/// The canonical address of `record`, below its parent if it has one.
pub fn record_address<T: Record>(record: &T) -> Result<Address, MappingError> {
    let descriptor = T::descriptor();
    let invalid = |_| MappingError::MissingField {
        collection: descriptor.collection().to_string(),
        field: descriptor.id_field_name().to_string(),
    };
    match record.parent() {
        Some(parent) => parent
            .canonical()
            .child(descriptor.collection(), record.id())
            .map_err(invalid),
        None => Address::new(descriptor.collection(), record.id()).map_err(invalid),
    }
}

/// A reference to another record, loaded or not.
#[derive(Debug, Clone, PartialEq)]
pub enum Related<T> {
    /// Only the stored reference is known.
    Pending(Reference),
    /// The referenced record was resolved.
    Loaded(Box<T>),
}

impl<T: Record> Related<T> {
    /// Reads a field that holds either a reference or a resolved document.
    pub fn from_value(field: &str, value: &Value) -> Result<Self, MappingError> {
        match value {
            Value::Ref(reference) => Ok(Related::Pending(reference.clone())),
            Value::Map(fields) => Ok(Related::Loaded(Box::new(T::from_fields(fields)?))),
            other => Err(MappingError::TypeMismatch {
                field: field.to_string(),
                expected: "ref",
                found: other.type_name(),
            }),
        }
    }

    /// Reads an optional field of `fields`.
    pub fn from_field(fields: &FieldMap, field: &str) -> Result<Option<Self>, MappingError> {
        match fields.get_ignore_case(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Self::from_value(field, value).map(Some),
        }
    }

    /// Reads a list field whose items are references or resolved documents.
    pub fn list_from_field(fields: &FieldMap, field: &str) -> Result<Vec<Self>, MappingError> {
        match fields.get_ignore_case(field) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| Self::from_value(field, item))
                .collect(),
            Some(other) => Err(MappingError::TypeMismatch {
                field: field.to_string(),
                expected: "list",
                found: other.type_name(),
            }),
        }
    }

    /// The reference to store for this relation.
    pub fn to_value(&self) -> Result<Value, MappingError> {
        match self {
            Related::Pending(reference) => Ok(Value::Ref(reference.clone())),
            Related::Loaded(record) => record_address(record.as_ref()).map(Value::from),
        }
    }

    /// The loaded record, if resolved.
    pub fn get(&self) -> Option<&T> {
        match self {
            Related::Loaded(record) => Some(record.as_ref()),
            Related::Pending(_) => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Related::Loaded(_))
    }

    pub fn id(&self) -> &str {
        match self {
            Related::Pending(reference) => reference.id(),
            Related::Loaded(record) => record.id(),
        }
    }
}

/// Fetches a required text field.
pub fn required_text(fields: &FieldMap, collection: &str, field: &str) -> Result<String, MappingError> {
    match fields.get_ignore_case(field) {
        Some(Value::Text(text)) => Ok(text.clone()),
        Some(other) => Err(MappingError::TypeMismatch {
            field: field.to_string(),
            expected: "text",
            found: other.type_name(),
        }),
        None => Err(MappingError::MissingField {
            collection: collection.to_string(),
            field: field.to_string(),
        }),
    }
}

/// Registered record descriptors, validated against the client's field names.
#[derive(Debug, Clone)]
pub struct Registry {
    id_field: String,
    parent_field: Option<String>,
    descriptors: HashMap<TypeId, RecordDescriptor>,
}

impl Registry {
    pub fn new(id_field: impl Into<String>, parent_field: Option<String>) -> Self {
        Self {
            id_field: id_field.into(),
            parent_field,
            descriptors: HashMap::new(),
        }
    }

    /// Validates and records the descriptor of `T`.
    pub fn register<T: Record>(&mut self) -> Result<&RecordDescriptor, MappingError> {
        let descriptor = T::descriptor();
        descriptor.validate(&self.id_field, self.parent_field.as_deref())?;
        Ok(self
            .descriptors
            .entry(TypeId::of::<T>())
            .or_insert(descriptor))
    }

    pub fn descriptor<T: Record>(&self) -> Result<&RecordDescriptor, MappingError> {
        self.descriptors
            .get(&TypeId::of::<T>())
            .ok_or(MappingError::Unregistered {
                type_name: type_name::<T>(),
            })
    }

    pub fn is_registered<T: Record>(&self) -> bool {
        self.descriptors.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Flattens `record` for writing, without its id field.
    pub fn flatten<T: Record>(&self, record: &T) -> Result<FieldMap, MappingError> {
        let descriptor = self.descriptor::<T>()?;
        let id_field = descriptor.id_field_name();
        let mut fields = record.to_fields()?;
        fields.retain(|key, _| !key.eq_ignore_ascii_case(id_field));
        Ok(fields)
    }

    /// Rebuilds a `T` from a document.
    pub fn build<T: Record>(&self, fields: &FieldMap) -> Result<T, MappingError> {
        self.descriptor::<T>()?;
        T::from_fields(fields)
    }
}
