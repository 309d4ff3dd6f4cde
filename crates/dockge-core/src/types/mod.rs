//! # Core Type Definitions
//!
//! This module contains the shared types of the stack engine:
//! - Stack status (`StackStatus`)
//! - Per-service computed data (`ServiceData`, `StatsData`)
//! - Serializable views of a stack (`StackSummary`, `StackData`)
//! - Error types (`DockgeError`)
//!
//! Everything produced by a reconciliation pass is plain data: it is built
//! wholesale and swapped into the owning `Stack` in one assignment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// STACK STATUS
// =============================================================================

/// Lifecycle status of a stack as seen by the runtime.
///
/// The numeric codes are stable and used by clients that only want a number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    /// Nothing is known about the stack yet.
    #[default]
    Unknown,
    /// The directory exists but the runtime has never seen the stack.
    CreatedFile,
    /// The runtime created the stack but nothing was started.
    CreatedStack,
    /// Every counted service is running.
    Running,
    /// Every counted service has exited.
    Exited,
    /// Some services are running, some have exited.
    RunningAndExited,
    /// At least one service reports an unhealthy health check.
    Unhealthy,
}

impl StackStatus {
    /// Stable numeric code of this status.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::CreatedFile => 1,
            Self::CreatedStack => 2,
            Self::Running => 3,
            Self::Exited => 4,
            Self::RunningAndExited => 5,
            Self::Unhealthy => 6,
        }
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::CreatedFile => "draft",
            Self::CreatedStack => "created",
            Self::Running => "active",
            Self::Exited => "exited",
            Self::RunningAndExited => "partially running",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Whether the stack counts as started (something is up).
    #[must_use]
    pub const fn is_started(self) -> bool {
        matches!(
            self,
            Self::Running | Self::RunningAndExited | Self::Unhealthy
        )
    }

    /// Aggregate per-service counters into a stack status.
    ///
    /// Unhealthy overrides every other outcome.
    #[must_use]
    pub const fn aggregate(running: usize, exited: usize, unhealthy: bool) -> Self {
        if unhealthy {
            return Self::Unhealthy;
        }
        match (running > 0, exited > 0) {
            (true, true) => Self::RunningAndExited,
            (true, false) => Self::Running,
            (false, true) => Self::Exited,
            (false, false) => Self::Unknown,
        }
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// SERVICE DATA
// =============================================================================

/// Resource usage snapshot of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatsData {
    pub cpu_perc: String,
    pub mem_usage: String,
    pub mem_perc: String,
    pub net_io: String,
    pub block_io: String,
}

/// Computed data for one live service, produced by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceData {
    /// Service name as declared in the compose file.
    pub name: String,
    /// Container name assigned by the runtime.
    pub container_name: String,
    /// Image reference the live container runs.
    pub image: String,
    /// Runtime state (`running`, `exited`, `created`, ...).
    pub state: String,
    /// Human readable runtime status line.
    pub status: String,
    /// Health check result, empty when the service has no health check.
    pub health: String,
    /// The live image differs from the declared image.
    pub recreate_necessary: bool,
    /// A newer remote digest exists and has not been acknowledged.
    pub image_update_available: bool,
    /// Last known remote digest, empty when unknown.
    pub remote_image_digest: String,
    /// Changelog link from the service labels, if any.
    pub changelog: Option<String>,
    /// Resource usage, only present when stats were requested.
    pub stats: Option<StatsData>,
}

// =============================================================================
// STACK VIEWS
// =============================================================================

/// Compact view of a stack, used by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSummary {
    pub name: String,
    pub status: StackStatus,
    pub status_code: u8,
    pub started: bool,
    pub recreate_necessary: bool,
    pub image_updates_available: bool,
    pub is_managed: bool,
    pub compose_file_name: String,
}

/// Full view of a stack including its sources and services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackData {
    #[serde(flatten)]
    pub summary: StackSummary,
    pub compose_yaml: String,
    pub compose_env: String,
    pub services: BTreeMap<String, ServiceData>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the stack engine.
///
/// - `Validation` is surfaced verbatim and guarantees nothing was written
/// - `Schema` means the compose source must be edited by hand
/// - `Operation` means an external lifecycle command failed
/// - Reconciliation never produces an error for its caller; it logs instead
#[derive(Debug, Error)]
pub enum DockgeError {
    /// Bad stack name, unparsable YAML, malformed env, name collision.
    #[error("{0}")]
    Validation(String),

    /// The compose document has a structurally invalid shape.
    #[error("Invalid compose file: {0}")]
    Schema(String),

    /// An external lifecycle command exited with a non-zero code.
    #[error("Failed to {action}, please check the terminal output for more information.")]
    Operation { action: String },

    /// The runtime collaborator failed (spawn failure, timeout, bad output).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The requested stack does not exist.
    #[error("Stack not found: {0}")]
    NotFound(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl DockgeError {
    /// Shorthand for a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a failed lifecycle command.
    pub fn operation(action: impl Into<String>) -> Self {
        Self::Operation {
            action: action.into(),
        }
    }
}

impl From<std::io::Error> for DockgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DockgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for stack engine operations.
pub type Result<T> = std::result::Result<T, DockgeError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_running_and_exited() {
        assert_eq!(
            StackStatus::aggregate(1, 1, false),
            StackStatus::RunningAndExited
        );
        assert_eq!(StackStatus::aggregate(2, 0, false), StackStatus::Running);
        assert_eq!(StackStatus::aggregate(0, 3, false), StackStatus::Exited);
        assert_eq!(StackStatus::aggregate(0, 0, false), StackStatus::Unknown);
    }

    #[test]
    fn unhealthy_overrides_counts() {
        for (running, exited) in [(0, 0), (1, 0), (0, 1), (4, 2)] {
            assert_eq!(
                StackStatus::aggregate(running, exited, true),
                StackStatus::Unhealthy
            );
        }
    }

    #[test]
    fn started_statuses() {
        assert!(StackStatus::Running.is_started());
        assert!(StackStatus::RunningAndExited.is_started());
        assert!(StackStatus::Unhealthy.is_started());
        assert!(!StackStatus::Exited.is_started());
        assert!(!StackStatus::CreatedFile.is_started());
    }

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(StackStatus::Unknown.code(), 0);
        assert_eq!(StackStatus::CreatedFile.code(), 1);
        assert_eq!(StackStatus::Unhealthy.code(), 6);
    }

    #[test]
    fn operation_error_carries_hint() {
        let err = DockgeError::operation("deploy");
        assert_eq!(
            err.to_string(),
            "Failed to deploy, please check the terminal output for more information."
        );
    }
}
