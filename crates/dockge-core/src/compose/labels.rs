//! Label nodes.
//!
//! Compose accepts labels either as a mapping or as a list of `KEY=VALUE`
//! strings. Reads normalize both into an ordered string map; writes keep the
//! style already in use. A freshly attached label set uses the mapping style.

use super::node::{ComposeData, NodeCore, NodeKind, as_boolean, scalar_text};
use indexmap::IndexMap;
use serde_yaml::Value;
use std::ops::{Deref, DerefMut};

/// Skip the service when aggregating the stack status.
pub const LABEL_STATUS_IGNORE: &str = "dockge.status.ignore";
/// Set to `false` to disable image update checks for the service.
pub const LABEL_IMAGEUPDATES_CHECK: &str = "dockge.imageupdates.check";
/// Remote digest whose update notification was acknowledged.
pub const LABEL_IMAGEUPDATES_IGNORE: &str = "dockge.imageupdates.ignore";
/// Link to the image changelog.
pub const LABEL_IMAGEUPDATES_CHANGELOG: &str = "dockge.imageupdates.changelog";

/// A view of a label set.
#[derive(Debug, Clone)]
pub struct ComposeLabels<D> {
    node: NodeCore<D>,
}

impl<D: Deref<Target = ComposeData>> ComposeLabels<D> {
    pub(crate) fn at(data: D, path: Vec<String>) -> Self {
        Self {
            node: NodeCore::new(data, path, NodeKind::Labels),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.node.is_valid()
    }

    pub fn exists(&self) -> bool {
        self.node.exists()
    }

    /// Whether the labels are written in list style.
    pub fn is_array(&self) -> bool {
        self.node.value(false).is_some_and(Value::is_sequence)
    }

    /// All labels as an ordered string map.
    ///
    /// List entries split at the first `=`; an entry without `=` has an
    /// empty value. Non-string scalars are rendered as text.
    pub fn get_labels(&self, envsubst: bool) -> IndexMap<String, String> {
        match self.node.value(envsubst) {
            Some(Value::Mapping(map)) => map
                .iter()
                .filter_map(|(k, v)| Some((scalar_text(k)?, scalar_text(v)?)))
                .collect(),
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(scalar_text)
                .filter(|entry| !entry.is_empty())
                .map(|entry| match entry.split_once('=') {
                    Some((key, value)) if !key.is_empty() => (key.to_string(), value.to_string()),
                    _ => (entry, String::new()),
                })
                .collect(),
            _ => IndexMap::new(),
        }
    }

    /// Value of a label. An empty value reads as `None`.
    pub fn get(&self, key: &str, envsubst: bool) -> Option<String> {
        self.get_labels(envsubst)
            .shift_remove(key)
            .filter(|v| !v.is_empty())
    }

    /// The key is present, even with an empty value.
    pub fn is_set(&self, key: &str, envsubst: bool) -> bool {
        self.get_labels(envsubst).contains_key(key)
    }

    /// Label parses as boolean `true`.
    pub fn is_true(&self, key: &str, envsubst: bool) -> bool {
        self.boolean(key, envsubst) == Some(true)
    }

    /// Label parses as boolean `false`.
    pub fn is_false(&self, key: &str, envsubst: bool) -> bool {
        self.boolean(key, envsubst) == Some(false)
    }

    fn boolean(&self, key: &str, envsubst: bool) -> Option<bool> {
        let value = self.get(key, envsubst)?;
        as_boolean(Some(&Value::String(value)))
    }
}

impl<D: DerefMut<Target = ComposeData>> ComposeLabels<D> {
    /// Set a label, keeping the existing style.
    pub fn set(&mut self, key: &str, value: &str) {
        let mut labels = self.get_labels(false);
        labels.insert(key.to_string(), value.to_string());
        self.write(&labels);
    }

    /// Remove a label. A missing label is a no-op.
    pub fn delete(&mut self, key: &str) -> bool {
        let mut labels = self.get_labels(false);
        if labels.shift_remove(key).is_none() {
            return false;
        }
        self.write(&labels);
        true
    }

    /// Drop the label set from its parent when it is empty.
    pub fn remove_if_empty(&mut self) -> bool {
        let empty = self.get_labels(false).is_empty();
        self.node.remove_if_empty(empty)
    }

    fn write(&mut self, labels: &IndexMap<String, String>) {
        let as_array = self.is_array();
        let Some(node) = self.node.prepare_write() else {
            return;
        };
        if as_array {
            *node = Value::Sequence(
                labels
                    .iter()
                    .map(|(k, v)| Value::String(format!("{k}={v}")))
                    .collect(),
            );
        } else if let Some(map) = node.as_mapping_mut() {
            for (k, v) in labels {
                let key = Value::String(k.clone());
                if map.get(&key).and_then(scalar_text).as_deref() != Some(v.as_str()) {
                    map.insert(key, Value::String(v.clone()));
                }
            }
            map.retain(|k, _| scalar_text(k).is_some_and(|k| labels.contains_key(&k)));
        }
    }
}
