//! # Application Configuration
//!
//! `AppConfig` is read from an optional TOML file, then environment
//! overrides are applied. Missing keys fall back to defaults.
//!
//! ```toml
//! stacks_dir = "/opt/stacks"
//! docker_binary = "docker"
//! command_timeout_secs = 300
//! self_stack_name = "dockge"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 5001
//! ```

use dockge_core::{DockgeError, SELF_STACK_NAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `stacks_dir`.
pub const ENV_STACKS_DIR: &str = "DOCKGE_STACKS_DIR";
/// Overrides `docker_binary`.
pub const ENV_DOCKER_BINARY: &str = "DOCKGE_DOCKER_BINARY";

mod defaults {
    use std::path::PathBuf;

    pub fn stacks_dir() -> PathBuf {
        PathBuf::from("/opt/stacks")
    }

    pub fn docker_binary() -> String {
        "docker".to_string()
    }

    pub fn command_timeout_secs() -> u64 {
        300
    }

    pub fn self_stack_name() -> String {
        dockge_core::SELF_STACK_NAME.to_string()
    }

    pub fn host() -> String {
        "127.0.0.1".to_string()
    }

    pub fn port() -> u16 {
        5001
    }
}

// =============================================================================
// CONFIG TYPES
// =============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,
    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Top-level configuration of the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory holding one sub-directory per stack.
    #[serde(default = "defaults::stacks_dir")]
    pub stacks_dir: PathBuf,

    /// Docker CLI executable.
    #[serde(default = "defaults::docker_binary")]
    pub docker_binary: String,

    /// Upper bound for any single docker invocation.
    #[serde(default = "defaults::command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Runtime project hidden from listings unless it is a managed directory.
    #[serde(default = "defaults::self_stack_name")]
    pub self_stack_name: String,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stacks_dir: defaults::stacks_dir(),
            docker_binary: defaults::docker_binary(),
            command_timeout_secs: defaults::command_timeout_secs(),
            self_stack_name: SELF_STACK_NAME.to_string(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document. Environment overrides are not applied.
    pub fn from_toml_str(text: &str) -> Result<Self, DockgeError> {
        toml::from_str(text)
            .map_err(|e| DockgeError::validation(format!("Invalid config file: {}", e)))
    }

    /// Load from `path` (or defaults when `None`), then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, DockgeError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    DockgeError::Io(format!("Read config {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_STACKS_DIR).filter(|v| !v.is_empty()) {
            self.stacks_dir = PathBuf::from(dir);
        }
        if let Some(binary) = lookup(ENV_DOCKER_BINARY).filter(|v| !v.is_empty()) {
            self.docker_binary = binary;
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
