//! Sequence nodes.

use super::node::{ComposeData, NodeCore, NodeKind};
use crate::types::Result;
use serde_yaml::Value;
use std::ops::{Deref, DerefMut};

/// A view of one sequence inside a compose document (ports, volumes, ...).
#[derive(Debug, Clone)]
pub struct ComposeArray<D> {
    node: NodeCore<D>,
}

impl<D: Deref<Target = ComposeData>> ComposeArray<D> {
    pub(crate) fn at(data: D, path: Vec<String>) -> Self {
        Self {
            node: NodeCore::new(data, path, NodeKind::Array),
        }
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// False when a value exists at this position but is not a sequence.
    pub fn is_valid(&self) -> bool {
        self.node.is_valid()
    }

    pub fn exists(&self) -> bool {
        self.node.exists()
    }

    /// Items with variables substituted.
    pub fn values(&self) -> &[Value] {
        self.items(true)
    }

    /// Items exactly as written.
    pub fn raw_values(&self) -> &[Value] {
        self.items(false)
    }

    pub fn len(&self) -> usize {
        self.raw_values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_values().is_empty()
    }

    pub fn get(&self, index: usize, envsubst: bool) -> Option<&Value> {
        self.items(envsubst).get(index)
    }

    /// Whether any item is a mapping or sequence (long syntax entries).
    pub fn contains_objects(&self) -> bool {
        self.values()
            .iter()
            .any(|v| v.is_mapping() || v.is_sequence())
    }

    fn items(&self, envsubst: bool) -> &[Value] {
        self.node
            .value(envsubst)
            .and_then(Value::as_sequence)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl<D: DerefMut<Target = ComposeData>> ComposeArray<D> {
    /// Append an item, attaching the sequence first.
    pub fn add(&mut self, value: impl Into<Value>) {
        if let Some(items) = self.node.prepare_write().and_then(Value::as_sequence_mut) {
            items.push(value.into());
        }
    }

    /// Remove the item at `index`. Out of range is a no-op.
    pub fn delete(&mut self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        self.node
            .prepare_write()
            .and_then(Value::as_sequence_mut)
            .map(|items| items.remove(index))
    }

    /// Replace every item.
    pub fn replace(&mut self, values: Vec<Value>) -> Result<()> {
        self.node.replace(Value::Sequence(values))
    }

    /// Drop this sequence from its parent when it has no items.
    pub fn remove_if_empty(&mut self) -> bool {
        let empty = self.is_empty();
        self.node.remove_if_empty(empty)
    }
}
