//! # Container Runtime Collaborator
//!
//! The engine never spawns processes. Everything it needs from the container
//! runtime goes through [`ContainerRuntime`], which the binary implements on
//! top of the docker CLI and tests replace with canned output.
//!
//! This module also holds the wire shapes of the runtime's JSON output.

use crate::types::{DockgeError, Result, StatsData};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

/// Runtime operations used by the stack engine.
///
/// Implementations must report timeouts and non-zero exits as errors from the
/// query methods, so callers can treat any failure as "unknown".
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Inspect a locally present image (`docker image inspect` JSON).
    async fn inspect_local_image(&self, image: &str) -> Result<serde_json::Value>;

    /// Digest of the image's remote manifest.
    async fn inspect_remote_digest(&self, image: &str) -> Result<String>;

    /// Every compose project the runtime knows (`compose ls` JSON).
    async fn list_runtime_stacks(&self) -> Result<serde_json::Value>;

    /// Service status lines of the project in `dir` (`compose ps` JSON).
    async fn list_service_status(&self, dir: &Path) -> Result<String>;

    /// Resource usage lines of the project in `dir` (`compose stats` JSON).
    async fn list_service_stats(&self, dir: &Path) -> Result<String>;

    /// Run a compose subcommand in `dir` and return its exit code.
    async fn run_lifecycle_command(&self, dir: &Path, args: &[String]) -> Result<i32>;
}

// =============================================================================
// WIRE SHAPES
// =============================================================================

/// Compose label carrying the image id a container was created from.
pub const COMPOSE_IMAGE_LABEL: &str = "com.docker.compose.image";

/// One line of `compose ps --format json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceStatusEntry {
    pub name: String,
    pub service: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub health: String,
    /// Comma separated `key=value` pairs.
    pub labels: String,
}

impl ServiceStatusEntry {
    /// Value of a container label.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// One entry of `compose ls --format json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RuntimeStackEntry {
    pub name: String,
    pub status: String,
    pub config_files: String,
}

/// One line of `compose stats --format json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatsEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CPUPerc")]
    pub cpu_perc: String,
    #[serde(rename = "MemUsage")]
    pub mem_usage: String,
    #[serde(rename = "MemPerc")]
    pub mem_perc: String,
    #[serde(rename = "NetIO")]
    pub net_io: String,
    #[serde(rename = "BlockIO")]
    pub block_io: String,
}

impl From<StatsEntry> for StatsData {
    fn from(entry: StatsEntry) -> Self {
        Self {
            cpu_perc: entry.cpu_perc,
            mem_usage: entry.mem_usage,
            mem_perc: entry.mem_perc,
            net_io: entry.net_io,
            block_io: entry.block_io,
        }
    }
}

/// Parse runtime JSON output: one object per line, or a single JSON array.
pub fn parse_json_lines<T: DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(DockgeError::from);
    }
    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(DockgeError::from))
        .collect()
}

/// Stats keyed by container name.
pub fn parse_stats(output: &str) -> Result<BTreeMap<String, StatsData>> {
    Ok(parse_json_lines::<StatsEntry>(output)?
        .into_iter()
        .map(|entry| (entry.name.clone(), entry.into()))
        .collect())
}
