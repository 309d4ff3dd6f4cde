//! # API Request/Response Types
//!
//! JSON structures for the HTTP API.

use dockge_core::{StackData, StackSummary};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// GENERIC RESPONSE
// =============================================================================

/// Envelope returned by every stack endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacks: Option<Vec<StackSummary>>,
}

impl ApiResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            ok: true,
            msg: Some(msg.into()),
            ..Self::default()
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            msg: Some(msg.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_stack(mut self, stack: StackData) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn with_stacks(stacks: Vec<StackSummary>) -> Self {
        Self {
            ok: true,
            stacks: Some(stacks),
            ..Self::default()
        }
    }
}

// =============================================================================
// SAVE REQUEST
// =============================================================================

/// Create or edit a stack, optionally deploying it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveStackRequest {
    pub name: String,
    pub compose_yaml: String,
    #[serde(default)]
    pub compose_env: String,
    /// Create a new stack directory instead of editing an existing one.
    #[serde(default)]
    pub is_add: bool,
    #[serde(default)]
    pub deploy: bool,
}
