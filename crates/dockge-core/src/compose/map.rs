//! Mapping nodes.

use super::array::ComposeArray;
use super::labels::ComposeLabels;
use super::node::{ComposeData, NodeCore, NodeKind};
use crate::types::Result;
use serde_yaml::Value;
use std::ops::{Deref, DerefMut};

/// A view of one mapping inside a compose document.
///
/// Reads see an empty mapping when the node is absent or has the wrong shape.
/// The first write attaches it (and any missing ancestor) to the raw tree.
#[derive(Debug, Clone)]
pub struct ComposeMap<D> {
    node: NodeCore<D>,
}

impl<D: Deref<Target = ComposeData>> ComposeMap<D> {
    pub(crate) fn at(data: D, path: Vec<String>) -> Self {
        Self {
            node: NodeCore::new(data, path, NodeKind::Map),
        }
    }

    /// Key of this node in its parent.
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// False when a value exists at this position but is not a mapping.
    pub fn is_valid(&self) -> bool {
        self.node.is_valid()
    }

    /// Whether the key is present in the parent.
    pub fn exists(&self) -> bool {
        self.node.exists()
    }

    /// Keys of the raw mapping, in document order.
    pub fn names(&self) -> Vec<String> {
        self.node
            .value(false)
            .and_then(Value::as_mapping)
            .map(|map| map.keys().filter_map(|k| k.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }

    pub fn has(&self, name: &str) -> bool {
        self.node
            .value(false)
            .and_then(Value::as_mapping)
            .is_some_and(|map| map.contains_key(name))
    }

    /// Value of a child key. Null counts as absent.
    pub fn get(&self, name: &str, envsubst: bool) -> Option<&Value> {
        self.node
            .value(envsubst)
            .and_then(|map| map.get(name))
            .filter(|v| !v.is_null())
    }

    /// Value of a child key, or `default` when absent.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a Value, envsubst: bool) -> &'a Value {
        self.get(name, envsubst).unwrap_or(default)
    }

    /// String value of a child key. Non-string scalars are not coerced.
    pub fn get_str(&self, name: &str, envsubst: bool) -> Option<&str> {
        self.get(name, envsubst).and_then(Value::as_str)
    }

    /// Read-only view of a child mapping.
    pub fn get_map(&self, name: &str) -> ComposeMap<&ComposeData> {
        ComposeMap::at(self.node.data(), self.node.child_path(name))
    }

    /// Read-only view of a child sequence.
    pub fn get_array(&self, name: &str) -> ComposeArray<&ComposeData> {
        ComposeArray::at(self.node.data(), self.node.child_path(name))
    }

    /// Read-only view of a child label set.
    pub fn get_labels(&self, name: &str) -> ComposeLabels<&ComposeData> {
        ComposeLabels::at(self.node.data(), self.node.child_path(name))
    }

    pub(crate) fn child(&self, name: &str) -> (&ComposeData, Vec<String>) {
        (self.node.data(), self.node.child_path(name))
    }
}

impl<D: DerefMut<Target = ComposeData>> ComposeMap<D> {
    /// Editable view of a child mapping.
    pub fn map_mut(&mut self, name: &str) -> ComposeMap<&mut ComposeData> {
        let path = self.node.child_path(name);
        ComposeMap::at(self.node.data_mut(), path)
    }

    /// Editable view of a child sequence.
    pub fn array_mut(&mut self, name: &str) -> ComposeArray<&mut ComposeData> {
        let path = self.node.child_path(name);
        ComposeArray::at(self.node.data_mut(), path)
    }

    /// Editable view of a child label set.
    pub fn labels_mut(&mut self, name: &str) -> ComposeLabels<&mut ComposeData> {
        let path = self.node.child_path(name);
        ComposeLabels::at(self.node.data_mut(), path)
    }

    pub(crate) fn child_mut(&mut self, name: &str) -> (&mut ComposeData, Vec<String>) {
        let path = self.node.child_path(name);
        (self.node.data_mut(), path)
    }

    /// Set a child key, attaching this mapping first.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        if let Some(map) = self.node.prepare_write().and_then(Value::as_mapping_mut) {
            map.insert(Value::String(name.to_string()), value.into());
        }
    }

    /// Remove a child key. A missing key is a no-op.
    pub fn delete(&mut self, name: &str) -> Option<Value> {
        if !self.has(name) {
            return None;
        }
        self.node
            .prepare_write()
            .and_then(Value::as_mapping_mut)
            .and_then(|map| map.shift_remove(name))
    }

    /// Replace the whole mapping.
    pub fn replace(&mut self, value: Value) -> Result<()> {
        self.node.replace(value)
    }

    /// Drop this mapping from its parent when it has no keys.
    pub fn remove_if_empty(&mut self) -> bool {
        let empty = self.is_empty();
        self.node.remove_if_empty(empty)
    }
}
