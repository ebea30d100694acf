//! Flattening of references for cache storage.
//!
//! Cache tiers may only hold plain values. Before a document is stored every
//! reference field `k` is replaced by `k_ref` holding the canonical address
//! text, and every non-empty reference list by `k_refs` holding a list of
//! address texts. Reading a document back reverses the transform and binds
//! the addresses to the store's root again.
//!
//! Plain fields whose names already end in a reserved suffix or in
//! [`ESCAPE_SUFFIX`] are stored with one extra [`ESCAPE_SUFFIX`] appended, so
//! they can never be mistaken for flattened references.

use crate::{
    address::{Address, DOCUMENTS_MARKER, Reference},
    cache::CacheError,
    doc::{FieldMap, Value},
};

/// Suffix of a field holding a flattened reference.
pub const REF_SUFFIX: &str = "_ref";

/// Suffix of a field holding a flattened reference list.
pub const REF_LIST_SUFFIX: &str = "_refs";

/// Appended to a plain field whose name would otherwise be ambiguous.
pub const ESCAPE_SUFFIX: &str = "~";

/// Converts documents between their live and their cache-safe form.
#[derive(Debug, Clone, Default)]
pub struct CacheCodec {
    root: Option<String>,
}

impl CacheCodec {
    /// A codec producing canonical addresses on the way out.
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec that rebinds cached addresses below `root` on the way out,
    /// producing `<root>/documents/<canonical path>`.
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Flattens references so the map only holds plain values.
    pub fn make_cachable(&self, fields: FieldMap) -> FieldMap {
        fields
            .into_iter()
            .map(|(key, value)| match value {
                Value::Ref(reference) => (
                    format!("{key}{REF_SUFFIX}"),
                    Value::Text(reference.address().canonical().into()),
                ),
                Value::List(items) if is_ref_list(&items) => {
                    let paths = items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::Ref(reference) => {
                                Some(Value::Text(reference.address().canonical().into()))
                            }
                            _ => None,
                        })
                        .collect();
                    (format!("{key}{REF_LIST_SUFFIX}"), Value::List(paths))
                }
                Value::Map(nested) => (escape(key), Value::Map(self.make_cachable(nested))),
                Value::List(items) if is_map_list(&items) => (
                    escape(key),
                    Value::List(
                        items
                            .into_iter()
                            .map(|item| match item {
                                Value::Map(nested) => Value::Map(self.make_cachable(nested)),
                                other => other,
                            })
                            .collect(),
                    ),
                ),
                other => (escape(key), other),
            })
            .collect()
    }

    /// Restores the references flattened by [`make_cachable`](Self::make_cachable).
    ///
    /// `address` is the document the map belongs to, used for error reports.
    pub fn make_uncachable(
        &self,
        address: &Address,
        fields: FieldMap,
    ) -> Result<FieldMap, CacheError> {
        let mut restored = FieldMap::new();
        for (key, value) in fields {
            let escaped = key.strip_suffix(ESCAPE_SUFFIX).map(str::to_string);
            let plain = escaped.is_some();
            let key = escaped.unwrap_or(key);
            let (key, value) = match value {
                Value::Text(path) if !plain && key.ends_with(REF_SUFFIX) => {
                    let name = key[..key.len() - REF_SUFFIX.len()].to_string();
                    (name, Value::Ref(self.bind(address, &path)?))
                }
                Value::List(items)
                    if !plain && key.ends_with(REF_LIST_SUFFIX) && is_text_list(&items) =>
                {
                    let name = key[..key.len() - REF_LIST_SUFFIX.len()].to_string();
                    let refs = items
                        .iter()
                        .filter_map(Value::as_text)
                        .map(|path| self.bind(address, path).map(Value::Ref))
                        .collect::<Result<Vec<_>, _>>()?;
                    (name, Value::List(refs))
                }
                Value::Map(nested) => (key, Value::Map(self.make_uncachable(address, nested)?)),
                Value::List(items) if is_map_list(&items) => {
                    let maps = items
                        .into_iter()
                        .map(|item| match item {
                            Value::Map(nested) => self.make_uncachable(address, nested).map(Value::Map),
                            other => Ok(other),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    (key, Value::List(maps))
                }
                other => (key, other),
            };
            restored.insert(key, value);
        }
        Ok(restored)
    }

    fn bind(&self, owner: &Address, path: &str) -> Result<Reference, CacheError> {
        let full = match &self.root {
            Some(root) => format!("{}{DOCUMENTS_MARKER}{path}", root.trim_end_matches('/')),
            None => path.to_string(),
        };
        Address::parse(full)
            .map(Reference::new)
            .map_err(|err| CacheError::CorruptEntry {
                address: owner.clone(),
                reason: err.to_string(),
            })
    }
}

/// Keeps plain field names out of the reserved namespace.
fn escape(key: String) -> String {
    if key.ends_with(REF_SUFFIX) || key.ends_with(REF_LIST_SUFFIX) || key.ends_with(ESCAPE_SUFFIX) {
        format!("{key}{ESCAPE_SUFFIX}")
    } else {
        key
    }
}

fn is_ref_list(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|v| matches!(v, Value::Ref(_)))
}

fn is_map_list(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|v| matches!(v, Value::Map(_)))
}

fn is_text_list(items: &[Value]) -> bool {
    items.iter().all(|v| matches!(v, Value::Text(_)))
}
