//! Reference-graph resolution.
//!
//! [`GraphResolver`] takes raw documents and expands their references
//! breadth-first, one batched fetch per level, as far as the [`LoadPaths`]
//! allow. During a call every document map is owned by the resolution state;
//! references are recorded as links between owners and slots and only turned
//! into nested maps when the result is materialized, so no map is ever shared
//! or mutated from two places.
//!
//! Rules applied to every document the first time it is reached:
//!
//! * its own id is written into the configured id field;
//! * a reference field is kept and followed when the current paths match its
//!   name, or when it is the parent field; otherwise it is removed;
//! * embedded maps, and lists of them, are walked in place with the same
//!   paths;
//! * a reference list is followed as a whole or removed as a whole.
//!
//! A document reachable along several routes is expanded once, by whichever
//! route reaches it first. Materialization stops at references back to a
//! document already being materialized further up, leaving them as plain
//! references.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::{
    Result,
    address::Address,
    doc::{FieldMap, Value},
    entity::EntityRef,
};

mod collector;
mod errors;
mod fetch;
mod paths;

use collector::{RefCollector, Slot, Step};
pub use errors::{NotFoundError, ResolveError};
pub use fetch::{CachedFetcher, DocumentSource};
pub use paths::{ALL, LoadPaths};

/// Outcome of one resolve call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    /// One entry per input document, `None` for documents that do not exist.
    pub documents: Vec<Option<FieldMap>>,
    /// Every address, root or referenced, that could not be found.
    pub not_found: Option<NotFoundError>,
}

impl Resolution {
    /// Converts a partial success into an error, dropping the documents.
    pub fn into_result(self) -> std::result::Result<Vec<Option<FieldMap>>, ResolveError> {
        match self.not_found {
            Some(err) => Err(err.into()),
            None => Ok(self.documents),
        }
    }
}

/// A reference slot that has been bound to a loaded document.
#[derive(Debug, Clone)]
struct Link {
    path: Vec<Step>,
    target: Address,
}

/// Working state of one resolve call.
#[derive(Debug, Default)]
struct ResolutionState {
    /// Every document seen this call, keyed by address.
    loaded: HashMap<Address, FieldMap>,
    /// Documents already walked.
    resolved: HashSet<Address>,
    /// Bound reference slots per owning document.
    links: HashMap<Address, Vec<Link>>,
    not_found: BTreeSet<Address>,
}

impl ResolutionState {
    fn is_known(&self, address: &Address) -> bool {
        self.resolved.contains(address) || self.loaded.contains_key(address)
    }

    fn bind(&mut self, slot: Slot, target: Address) {
        self.links.entry(slot.owner).or_default().push(Link {
            path: slot.path,
            target,
        });
    }

    /// Binds `slot` now if `target` is known, or defers it to the next level.
    fn collect(&mut self, collector: &mut RefCollector, slot: Slot, target: &Address) {
        if self.is_known(target) {
            self.bind(slot, target.clone());
        } else {
            collector.defer(target.clone(), slot);
        }
    }

    fn materialize(&self, address: &Address, stack: &mut Vec<Address>) -> Option<FieldMap> {
        let mut fields = self.loaded.get(address)?.clone();
        stack.push(address.clone());
        if let Some(links) = self.links.get(address) {
            for link in links {
                if stack.contains(&link.target) {
                    continue;
                }
                let Some(child) = self.materialize(&link.target, stack) else {
                    continue;
                };
                let slot = Slot {
                    owner: address.clone(),
                    path: link.path.clone(),
                };
                if let Some(value) = slot.locate(&mut fields) {
                    *value = Value::Map(child);
                }
            }
        }
        stack.pop();
        Some(fields)
    }
}

/// Breadth-first expander of document references.
pub struct GraphResolver<'a> {
    source: &'a dyn DocumentSource,
    paths: LoadPaths,
    id_field: String,
    parent_field: Option<String>,
}

impl<'a> GraphResolver<'a> {
    /// A resolver fetching through `source`, stamping ids into `id`.
    pub fn new(source: &'a dyn DocumentSource, paths: LoadPaths) -> Self {
        Self {
            source,
            paths,
            id_field: "id".to_string(),
            parent_field: None,
        }
    }

    /// Sets the field each document's own id is written to.
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Sets the field whose references are always followed.
    pub fn with_parent_field(mut self, parent_field: Option<String>) -> Self {
        self.parent_field = parent_field;
        self
    }

    /// Fetches `addresses` through the source, then resolves them.
    pub async fn resolve_addresses(&self, addresses: &[Address]) -> Result<Resolution> {
        let documents = if addresses.is_empty() {
            Vec::new()
        } else {
            self.source.fetch(addresses).await?
        };
        self.resolve(documents).await
    }

    /// Expands the references of `documents`.
    ///
    /// Missing input documents produce a `None` entry and are reported in
    /// the not-found set along with every missing referenced document. A
    /// failed level fetch aborts the whole call.
    pub async fn resolve(&self, documents: Vec<EntityRef>) -> Result<Resolution> {
        let mut state = ResolutionState::default();
        let mut roots = Vec::with_capacity(documents.len());

        for entity in documents {
            let (address, fields) = entity.into_parts();
            match fields {
                Some(fields) => {
                    state.loaded.insert(address.clone(), fields);
                    roots.push(Some(address));
                }
                None => {
                    state.not_found.insert(address);
                    roots.push(None);
                }
            }
        }

        let mut collector = RefCollector::default();
        for address in roots.iter().flatten() {
            self.resolve_entity(&mut state, address, &self.paths, &mut collector);
        }

        let mut paths = self.paths.clone();
        let mut depth = 1;
        while !collector.is_empty() {
            let next_paths = paths.next();
            let addresses = collector.addresses().to_vec();
            debug!(depth, fetch = addresses.len(), paths = %next_paths, "resolving level");

            let fetched = self.source.fetch(&addresses).await?;
            let mut found = Vec::with_capacity(fetched.len());
            for entity in fetched {
                let (address, fields) = entity.into_parts();
                match fields {
                    Some(fields) => {
                        state.loaded.insert(address.clone(), fields);
                        found.push(address);
                    }
                    None => {
                        state.not_found.insert(address);
                    }
                }
            }

            let mut next = RefCollector::default();
            for address in &found {
                self.resolve_entity(&mut state, address, &next_paths, &mut next);
                for slot in collector.take(address) {
                    state.bind(slot, address.clone());
                }
            }

            collector = next;
            paths = next_paths;
            depth += 1;
        }

        let mut stack = Vec::new();
        let resolved = roots
            .iter()
            .map(|root| {
                root.as_ref()
                    .and_then(|address| state.materialize(address, &mut stack))
            })
            .collect();

        let not_found = if state.not_found.is_empty() {
            None
        } else {
            debug!(count = state.not_found.len(), "unresolved addresses");
            Some(NotFoundError::new(state.not_found))
        };
        Ok(Resolution {
            documents: resolved,
            not_found,
        })
    }

    fn resolve_entity(
        &self,
        state: &mut ResolutionState,
        address: &Address,
        paths: &LoadPaths,
        collector: &mut RefCollector,
    ) {
        if !state.resolved.insert(address.clone()) {
            return;
        }
        let Some(mut fields) = state.loaded.remove(address) else {
            return;
        };
        fields.insert(self.id_field.clone(), address.id());
        let mut path = Vec::new();
        self.walk(state, &mut fields, address, &mut path, paths, collector);
        state.loaded.insert(address.clone(), fields);
    }

    fn follows(&self, field: &str, paths: &LoadPaths) -> bool {
        self.parent_field
            .as_deref()
            .is_some_and(|parent| parent.eq_ignore_ascii_case(field))
            || paths.matches(field)
    }

    fn walk(
        &self,
        state: &mut ResolutionState,
        fields: &mut FieldMap,
        owner: &Address,
        path: &mut Vec<Step>,
        paths: &LoadPaths,
        collector: &mut RefCollector,
    ) {
        let mut out_of_scope = Vec::new();
        for (key, value) in fields.iter_mut() {
            path.push(Step::Field(key.clone()));
            match value {
                Value::Ref(reference) => {
                    if self.follows(key, paths) {
                        let slot = Slot {
                            owner: owner.clone(),
                            path: path.clone(),
                        };
                        state.collect(collector, slot, reference.address());
                    } else {
                        out_of_scope.push(key.clone());
                    }
                }
                Value::Map(nested) => {
                    self.walk(state, nested, owner, path, paths, collector);
                }
                Value::List(items) if value_is_map_list(items) => {
                    for (i, item) in items.iter_mut().enumerate() {
                        if let Value::Map(nested) = item {
                            path.push(Step::Index(i));
                            self.walk(state, nested, owner, path, paths, collector);
                            path.pop();
                        }
                    }
                }
                Value::List(items) if value_is_ref_list(items) => {
                    if self.follows(key, paths) {
                        for (i, item) in items.iter().enumerate() {
                            if let Value::Ref(reference) = item {
                                let mut slot_path = path.clone();
                                slot_path.push(Step::Index(i));
                                let slot = Slot {
                                    owner: owner.clone(),
                                    path: slot_path,
                                };
                                state.collect(collector, slot, reference.address());
                            }
                        }
                    } else {
                        out_of_scope.push(key.clone());
                    }
                }
                _ => {}
            }
            path.pop();
        }
        for key in out_of_scope {
            fields.remove(&key);
        }
    }
}

fn value_is_map_list(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|v| matches!(v, Value::Map(_)))
}

fn value_is_ref_list(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|v| matches!(v, Value::Ref(_)))
}
