//! The compose document root.

use super::comments::CommentMap;
use super::envsubst::{parse_env, substitute_value};
use super::node::ComposeData;
use super::services::{ComposeExtension, ComposeNetworks, ComposeServices};
use crate::types::{DockgeError, Result};
use serde_yaml::{Mapping, Value};
use tracing::instrument;

/// A parsed compose file: raw tree, substituted tree and recorded comments.
///
/// Cloning a document and editing the clone never affects the original.
#[derive(Debug, Clone, Default)]
pub struct ComposeDocument {
    data: ComposeData,
    comments: CommentMap,
}

impl ComposeDocument {
    /// Parse compose YAML, optionally with the text of its `.env` file.
    ///
    /// An empty document is an empty stack. A missing or null `services` key
    /// is normalized to an empty mapping.
    #[instrument(skip_all, fields(len = yaml.len()))]
    pub fn parse(yaml: &str, env: Option<&str>) -> Result<Self> {
        let mut raw: Value =
            serde_yaml::from_str(yaml).map_err(|e| DockgeError::Validation(e.to_string()))?;

        if raw.is_null() {
            raw = Value::Mapping(Mapping::new());
        }
        let Some(root) = raw.as_mapping_mut() else {
            return Err(DockgeError::Schema(
                "Top level must be a mapping".to_string(),
            ));
        };
        let services = root.get("services").map(|v| (v.is_null(), v.is_mapping()));
        match services {
            None | Some((true, _)) => {
                root.insert(
                    Value::String("services".to_string()),
                    Value::Mapping(Mapping::new()),
                );
            }
            Some((_, true)) => {}
            Some(_) => {
                return Err(DockgeError::Schema(
                    "Services must be an object".to_string(),
                ));
            }
        }

        let substituted = env.map(|text| substitute_value(&raw, &parse_env(text)));
        Ok(Self {
            data: ComposeData::new(raw, substituted),
            comments: CommentMap::extract(yaml),
        })
    }

    pub fn data(&self) -> &ComposeData {
        &self.data
    }

    pub fn services(&self) -> ComposeServices<&ComposeData> {
        ComposeServices::new(&self.data)
    }

    pub fn services_mut(&mut self) -> ComposeServices<&mut ComposeData> {
        ComposeServices::new(&mut self.data)
    }

    pub fn networks(&self) -> ComposeNetworks<&ComposeData> {
        ComposeNetworks::new(&self.data)
    }

    pub fn networks_mut(&mut self) -> ComposeNetworks<&mut ComposeData> {
        ComposeNetworks::new(&mut self.data)
    }

    /// The `x-dockge` extension block.
    pub fn extension(&self) -> ComposeExtension<&ComposeData> {
        ComposeExtension::new(&self.data)
    }

    pub fn extension_mut(&mut self) -> ComposeExtension<&mut ComposeData> {
        ComposeExtension::new(&mut self.data)
    }

    /// Render the raw tree back to YAML with the source comments re-attached.
    pub fn serialize(&self) -> Result<String> {
        let emitted = serde_yaml::to_string(self.data.raw())
            .map_err(|e| DockgeError::Serialization(e.to_string()))?;
        Ok(self.comments.reattach(&emitted))
    }
}
