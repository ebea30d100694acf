//! Document addresses and typed references.
//!
//! An [`Address`] is the slash-joined identity of one document: pairs of
//! `collection/id` segments, where sub-collections carry their parent pairs as
//! a prefix (`Person/john/Pet/rex`). A [`Reference`] is a typed pointer to an
//! address, distinct from an embedded map which has no address of its own.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::doc::DocError;

/// Marker segment separating a store-internal prefix from the document path.
///
/// Stores that address documents as `projects/p/databases/d/documents/Car/1`
/// share everything after this marker with every other store, so that part is
/// the canonical form used as a cache key payload.
pub const DOCUMENTS_MARKER: &str = "/documents/";

/// Canonical identity of a single document.
///
/// Two documents with the same address are the same entity. Equality,
/// hashing and ordering look at the canonical path only, so
/// `projects/p/databases/d/documents/Car/1` and `Car/1` are the same key.
/// A process is expected to talk to one store root at a time. Addresses are
/// immutable once created.
#[derive(Debug, Clone)]
pub struct Address(String);

impl Address {
    /// Parses and validates an address.
    ///
    /// The path after any store-internal prefix must consist of an even number
    /// of non-empty segments.
    pub fn parse(path: impl Into<String>) -> Result<Self, DocError> {
        let path = path.into();
        let canonical = canonical_path(&path);
        let segments: Vec<&str> = canonical.split('/').collect();
        if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty())
        {
            return Err(DocError::InvalidAddress { path });
        }
        Ok(Self(path))
    }

    /// Builds the address of document `id` inside `collection`.
    ///
    /// `collection` may itself be a nested collection path
    /// (`Person/john/Pet`).
    pub fn new(collection: &str, id: &str) -> Result<Self, DocError> {
        Self::parse(format!("{collection}/{id}"))
    }

    /// Builds the address of a document in a sub-collection of `self`.
    pub fn child(&self, collection: &str, id: &str) -> Result<Self, DocError> {
        Self::parse(format!("{}/{collection}/{id}", self.0))
    }

    /// Returns the full address string, including any store-internal prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the address with any store-internal prefix stripped.
    pub fn canonical(&self) -> Address {
        Address(canonical_path(&self.0).to_string())
    }

    /// Returns true if this address carries no store-internal prefix.
    pub fn is_canonical(&self) -> bool {
        !self.0.contains(DOCUMENTS_MARKER)
    }

    /// The document id: the last path segment.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// The collection path holding this document, without store prefix.
    pub fn collection(&self) -> &str {
        let canonical = canonical_path(&self.0);
        canonical
            .rsplit_once('/')
            .map(|(collection, _)| collection)
            .unwrap_or_default()
    }

    /// The name of the innermost collection (`Pet` for `Person/john/Pet/rex`).
    pub fn collection_name(&self) -> &str {
        self.collection().rsplit('/').next().unwrap_or_default()
    }

    /// The address of the parent document for sub-collection documents.
    pub fn parent(&self) -> Option<Address> {
        let (prefix, canonical) = split_prefix(&self.0);
        let segments: Vec<&str> = canonical.split('/').collect();
        if segments.len() <= 2 {
            return None;
        }
        let parent = segments[..segments.len() - 2].join("/");
        Some(Address(format!("{prefix}{parent}")))
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        canonical_path(&self.0) == canonical_path(&other.0)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_path(&self.0).hash(state);
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_path(&self.0).cmp(canonical_path(&other.0))
    }
}

fn split_prefix(path: &str) -> (&str, &str) {
    match path.find(DOCUMENTS_MARKER) {
        Some(pos) => path.split_at(pos + DOCUMENTS_MARKER.len()),
        None => ("", path),
    }
}

fn canonical_path(path: &str) -> &str {
    split_prefix(path).1
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Address {
    type Error = DocError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Address::parse(value)
    }
}

impl TryFrom<String> for Address {
    type Error = DocError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::parse(s).map_err(serde::de::Error::custom)
    }
}

/// A typed pointer to another document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference(Address);

impl Reference {
    /// Creates a reference to `address`.
    pub fn new(address: Address) -> Self {
        Self(address)
    }

    /// The referenced address.
    pub fn address(&self) -> &Address {
        &self.0
    }

    /// The referenced document id.
    pub fn id(&self) -> &str {
        self.0.id()
    }

    /// Consumes the reference, returning its address.
    pub fn into_address(self) -> Address {
        self.0
    }
}

impl From<Address> for Reference {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{}", self.0)
    }
}
