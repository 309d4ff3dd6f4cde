//! # dockge-core
//!
//! The stack engine for Dockge - THE LOGIC.
//!
//! This crate models compose stacks on disk and reconciles them against the
//! container runtime:
//! - `compose` → typed, comment-preserving compose documents
//! - `image_repository` → digest cache behind image update detection
//! - `stack` → one compose project: validation, persistence, lifecycle,
//!   drift detection and status aggregation
//! - `registry` → directory scan plus runtime-only stacks
//!
//! ## Architectural Constraints
//!
//! - Never spawns processes: the runtime is an injected `ContainerRuntime`
//! - Validation strictly precedes any filesystem write
//! - Reconciliation never fails its caller; it logs and keeps prior state
//! - Only the raw compose tree is ever written back

// =============================================================================
// MODULES
// =============================================================================

pub mod compose;
pub mod image_repository;
pub mod registry;
pub mod runtime;
pub mod stack;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    DockgeError, Result, ServiceData, StackData, StackStatus, StackSummary, StatsData,
};

// =============================================================================
// RE-EXPORTS: Compose Model
// =============================================================================

pub use compose::{
    ComposeArray, ComposeData, ComposeDocument, ComposeExtension, ComposeLabels, ComposeMap,
    ComposeNetwork, ComposeNetworks, ComposeService, ComposeServices, LABEL_IMAGEUPDATES_CHANGELOG,
    LABEL_IMAGEUPDATES_CHECK, LABEL_IMAGEUPDATES_IGNORE, LABEL_STATUS_IGNORE, NodeKind, X_DOCKGE,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use image_repository::{ImageInfo, ImageRepository, is_digest_pinned};
pub use registry::{SELF_STACK_NAME, StackRegistry, status_from_runtime};
pub use runtime::{
    COMPOSE_IMAGE_LABEL, ContainerRuntime, RuntimeStackEntry, ServiceStatusEntry, StatsEntry,
};
pub use stack::{
    ACCEPTED_COMPOSE_FILE_NAMES, Stack, StackContext, find_compose_file, is_valid_stack_name,
};
