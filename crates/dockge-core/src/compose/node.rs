//! # Compose Nodes
//!
//! Shared machinery behind every typed view of a compose document.
//!
//! A node is a *path* into [`ComposeData`] plus the shape it expects to find
//! there. Nodes never own data. Reads walk the tree and fall back to an empty
//! value of the expected shape; writes first materialize ("attach") every
//! missing or malformed ancestor, root-ward to leaf, then mutate.
//!
//! The data handle `D` is either `&ComposeData` (read-only view) or
//! `&mut ComposeData` (editable view). Mutating methods only exist for the
//! latter, so a read can never attach anything.

use crate::types::{DockgeError, Result};
use serde_yaml::{Mapping, Value};
use std::ops::{Deref, DerefMut};

// =============================================================================
// COMPOSE DATA
// =============================================================================

/// The two structurally parallel trees of a compose document.
///
/// - `raw` is the source of truth and the only tree ever written back
/// - `substituted` has `${VAR}` references resolved; when no environment was
///   supplied it aliases `raw`
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeData {
    raw: Value,
    substituted: Option<Value>,
}

impl Default for ComposeData {
    fn default() -> Self {
        Self {
            raw: Value::Mapping(Mapping::new()),
            substituted: None,
        }
    }
}

impl ComposeData {
    pub(crate) fn new(raw: Value, substituted: Option<Value>) -> Self {
        Self { raw, substituted }
    }

    /// The raw tree, as it will be serialized.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The environment-substituted tree.
    #[must_use]
    pub fn substituted(&self) -> &Value {
        self.substituted.as_ref().unwrap_or(&self.raw)
    }

    /// Pick a tree: substituted when `envsubst` is set, raw otherwise.
    #[must_use]
    pub fn tree(&self, envsubst: bool) -> &Value {
        if envsubst {
            self.substituted()
        } else {
            &self.raw
        }
    }

    pub(crate) fn raw_mut(&mut self) -> &mut Value {
        &mut self.raw
    }
}

// =============================================================================
// NODE KIND
// =============================================================================

/// The closed set of node shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A YAML mapping.
    Map,
    /// A YAML sequence.
    Array,
    /// Labels: either a mapping or a sequence of `KEY=VALUE` strings.
    Labels,
}

impl NodeKind {
    /// Whether `value` has a shape this kind accepts.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Map => value.is_mapping(),
            Self::Array => value.is_sequence(),
            Self::Labels => value.is_mapping() || value.is_sequence(),
        }
    }

    /// A freshly created, empty value of this kind. Labels default to map style.
    #[must_use]
    pub fn empty(self) -> Value {
        match self {
            Self::Array => Value::Sequence(Vec::new()),
            Self::Map | Self::Labels => Value::Mapping(Mapping::new()),
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Array => "array",
            Self::Labels => "labels",
        }
    }
}

// =============================================================================
// TREE HELPERS
// =============================================================================

/// Walk `path` from `root`. Null counts as absent.
pub(crate) fn lookup<'v>(root: &'v Value, path: &[String]) -> Option<&'v Value> {
    let mut current = root;
    for key in path {
        current = current.get(key.as_str())?;
    }
    (!current.is_null()).then_some(current)
}

fn lookup_mut<'v>(root: &'v mut Value, path: &[String]) -> Option<&'v mut Value> {
    let mut current = root;
    for key in path {
        current = current.get_mut(key.as_str())?;
    }
    Some(current)
}

/// Attach every node along `path`, replacing absent or wrongly shaped values
/// with an empty value of the expected kind. Ancestors are always maps.
fn materialize<'v>(root: &'v mut Value, path: &[String], leaf: NodeKind) -> Option<&'v mut Value> {
    if !root.is_mapping() {
        *root = Value::Mapping(Mapping::new());
    }
    let mut current = root;
    for (depth, key) in path.iter().enumerate() {
        let kind = if depth + 1 == path.len() {
            leaf
        } else {
            NodeKind::Map
        };
        if !current.is_mapping() {
            *current = Value::Mapping(Mapping::new());
        }
        let map = current.as_mapping_mut()?;
        let slot = map
            .entry(Value::String(key.clone()))
            .or_insert(Value::Null);
        if !kind.accepts(slot) {
            *slot = kind.empty();
        }
        current = slot;
    }
    Some(current)
}

// =============================================================================
// NODE CORE
// =============================================================================

/// Path-addressed view shared by maps, arrays and labels.
#[derive(Debug, Clone)]
pub(crate) struct NodeCore<D> {
    data: D,
    path: Vec<String>,
    kind: NodeKind,
    valid: bool,
}

impl<D: Deref<Target = ComposeData>> NodeCore<D> {
    pub(crate) fn new(data: D, path: Vec<String>, kind: NodeKind) -> Self {
        let shape_ok = |tree: &Value| lookup(tree, &path).is_none_or(|v| kind.accepts(v));
        let valid = shape_ok(data.raw()) && shape_ok(data.substituted());
        Self {
            data,
            path,
            kind,
            valid,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    pub(crate) fn data(&self) -> &ComposeData {
        &self.data
    }

    pub(crate) fn child_path(&self, name: &str) -> Vec<String> {
        let mut path = self.path.clone();
        path.push(name.to_string());
        path
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid
    }

    /// The node's value in the chosen tree, if present and well shaped.
    pub(crate) fn value(&self, envsubst: bool) -> Option<&Value> {
        lookup(self.data.tree(envsubst), &self.path).filter(|v| self.kind.accepts(v))
    }

    /// Whether the key is present in the parent, whatever its value.
    pub(crate) fn exists(&self) -> bool {
        let Some((name, parent)) = self.path.split_last() else {
            return true;
        };
        let parent = if parent.is_empty() {
            Some(self.data.raw())
        } else {
            lookup(self.data.raw(), parent)
        };
        parent
            .and_then(Value::as_mapping)
            .is_some_and(|map| map.contains_key(name.as_str()))
    }
}

impl<D: DerefMut<Target = ComposeData>> NodeCore<D> {
    pub(crate) fn data_mut(&mut self) -> &mut ComposeData {
        &mut self.data
    }

    /// Attach this node (and its ancestors) to the raw tree and return it.
    pub(crate) fn prepare_write(&mut self) -> Option<&mut Value> {
        let node = materialize(self.data.raw_mut(), &self.path, self.kind)?;
        self.valid = true;
        Some(node)
    }

    /// Replace the whole node with `value`, rejecting a wrong shape.
    pub(crate) fn replace(&mut self, value: Value) -> Result<()> {
        if !self.kind.accepts(&value) {
            return Err(DockgeError::Schema(format!(
                "invalid value for {} '{}'",
                self.kind.type_name(),
                self.name()
            )));
        }
        if let Some(slot) = self.prepare_write() {
            *slot = value;
        }
        Ok(())
    }

    /// Drop the key from its parent when the node is empty. Idempotent.
    pub(crate) fn remove_if_empty(&mut self, is_empty: bool) -> bool {
        if !is_empty || !self.exists() {
            return false;
        }
        let Some((name, parent)) = self.path.split_last() else {
            return false;
        };
        lookup_mut(self.data.raw_mut(), parent)
            .and_then(Value::as_mapping_mut)
            .and_then(|map| map.shift_remove(name.as_str()))
            .is_some()
    }
}

// =============================================================================
// VALUE HELPERS
// =============================================================================

/// Render a scalar as text the way compose tooling reads it.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Lenient boolean conversion: `true`/`"true"` and `false`/`"false"` only.
pub(crate) fn as_boolean(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================
