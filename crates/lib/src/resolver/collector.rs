//! Per-level bookkeeping of pending references.

use std::collections::HashMap;

use crate::{
    address::Address,
    doc::{FieldMap, Value},
};

/// One step from a document's root map to a nested value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Step {
    Field(String),
    Index(usize),
}

/// Where a reference sits: the owning document plus the steps to the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) owner: Address,
    pub(crate) path: Vec<Step>,
}

impl Slot {
    /// Returns the value at this slot's path inside `fields`.
    pub(crate) fn locate<'a>(&self, fields: &'a mut FieldMap) -> Option<&'a mut Value> {
        let (first, rest) = self.path.split_first()?;
        let Step::Field(name) = first else {
            return None;
        };
        let mut current = fields.get_mut(name)?;
        for step in rest {
            current = match (step, current) {
                (Step::Field(name), Value::Map(map)) => map.get_mut(name)?,
                (Step::Index(i), Value::List(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Collects the references found while walking one level of documents.
///
/// Every pending address maps to the slots waiting for it, and the fetch
/// list holds each address once in first-seen order.
#[derive(Debug, Default)]
pub(crate) struct RefCollector {
    pending: HashMap<Address, Vec<Slot>>,
    fetch: Vec<Address>,
}

impl RefCollector {
    /// Records that `slot` waits for the document at `target`.
    pub(crate) fn defer(&mut self, target: Address, slot: Slot) {
        match self.pending.get_mut(&target) {
            Some(slots) => slots.push(slot),
            None => {
                self.fetch.push(target.clone());
                self.pending.insert(target, vec![slot]);
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fetch.is_empty()
    }

    /// The unique addresses to fetch for this level.
    pub(crate) fn addresses(&self) -> &[Address] {
        &self.fetch
    }

    /// Removes and returns the slots waiting for `target`.
    pub(crate) fn take(&mut self, target: &Address) -> Vec<Slot> {
        self.pending.remove(target).unwrap_or_default()
    }
}
