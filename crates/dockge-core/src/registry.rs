//! # Stack Registry
//!
//! Enumerates stacks from two sources:
//! - managed stacks: directories under the stacks root holding a compose file
//! - runtime stacks: compose projects the runtime knows, wherever they live
//!
//! The managed scan is cached; runtime status is applied on every listing.

use crate::stack::{Stack, StackContext, find_compose_file, is_valid_stack_name};
use crate::runtime::RuntimeStackEntry;
use crate::types::{DockgeError, Result, StackStatus};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, instrument, warn};

/// Project name of the manager's own deployment.
pub const SELF_STACK_NAME: &str = "dockge";

/// Map a `compose ls` status string to a stack status.
///
/// The string looks like `running(2), exited(1)`. An unhealthy stack stays
/// unhealthy whatever the runtime reports.
pub fn status_from_runtime(status: &str, unhealthy: bool) -> StackStatus {
    if unhealthy {
        return StackStatus::Unhealthy;
    }
    if status.starts_with("created") {
        StackStatus::CreatedStack
    } else if status.contains("exited") && status.contains("running") {
        StackStatus::RunningAndExited
    } else if status.contains("exited") {
        StackStatus::Exited
    } else if status.starts_with("running") {
        StackStatus::Running
    } else {
        StackStatus::Unknown
    }
}

/// Stack lookup and listing.
#[derive(Debug)]
pub struct StackRegistry {
    ctx: StackContext,
    self_stack_name: String,
    managed: RwLock<BTreeMap<String, Stack>>,
}

impl StackRegistry {
    pub fn new(ctx: StackContext) -> Self {
        Self {
            ctx,
            self_stack_name: SELF_STACK_NAME.to_string(),
            managed: RwLock::new(BTreeMap::new()),
        }
    }

    /// Use a different project name for the manager's own deployment.
    #[must_use]
    pub fn with_self_stack_name(mut self, name: impl Into<String>) -> Self {
        self.self_stack_name = name.into();
        self
    }

    pub fn context(&self) -> &StackContext {
        &self.ctx
    }

    /// Whether the stack directory holds an accepted compose file.
    pub fn compose_file_exists(&self, name: &str) -> bool {
        find_compose_file(&self.ctx.stacks_dir().join(name)).is_some()
    }

    /// Forget the cached directory scan.
    pub fn invalidate(&self) {
        self.managed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// All stacks, keyed by name.
    ///
    /// With `use_cache` a previous directory scan is reused. Runtime status
    /// is applied either way and written back to the cached stacks; a runtime
    /// failure yields the managed list alone.
    #[instrument(skip(self))]
    pub async fn stack_list(&self, use_cache: bool) -> Result<BTreeMap<String, Stack>> {
        let cached = if use_cache {
            let managed = self.managed.read().unwrap_or_else(PoisonError::into_inner);
            (!managed.is_empty()).then(|| managed.clone())
        } else {
            None
        };

        let mut list = match cached {
            Some(list) => list,
            None => {
                let list = self.scan().await?;
                *self.managed.write().unwrap_or_else(PoisonError::into_inner) = list.clone();
                list
            }
        };

        let runtime_list = match self.ctx.runtime().list_runtime_stacks().await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "runtime stack list unavailable");
                return Ok(list);
            }
        };
        let entries: Vec<RuntimeStackEntry> = match serde_json::from_value(runtime_list) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "runtime stack list malformed");
                return Ok(list);
            }
        };

        for entry in entries {
            if !list.contains_key(&entry.name) {
                if entry.name == self.self_stack_name {
                    continue;
                }
                list.insert(
                    entry.name.clone(),
                    Stack::new(self.ctx.clone(), entry.name.clone()),
                );
            }
            if let Some(stack) = list.get_mut(&entry.name) {
                let status = status_from_runtime(&entry.status, stack.is_unhealthy());
                stack.set_status(status);
                stack.set_config_file_path(Some(entry.config_files));
            }
        }

        let mut managed = self.managed.write().unwrap_or_else(PoisonError::into_inner);
        for (name, cached) in managed.iter_mut() {
            if let Some(stack) = list.get(name) {
                cached.set_status(stack.status());
                cached.set_config_file_path(stack.config_file_path().map(str::to_string));
            }
        }
        Ok(list)
    }

    async fn scan(&self) -> Result<BTreeMap<String, Stack>> {
        let mut list = BTreeMap::new();
        let mut dir = match tokio::fs::read_dir(self.ctx.stacks_dir()).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(dir = %self.ctx.stacks_dir().display(), error = %e, "stacks directory unreadable");
                return Ok(list);
            }
        };

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !self.compose_file_exists(&name) {
                continue;
            }
            let mut stack = Stack::new(self.ctx.clone(), name.clone());
            stack.update_data(false).await;
            stack.set_status(StackStatus::CreatedFile);
            list.insert(name, stack);
        }
        debug!(count = list.len(), "stacks directory scanned");
        Ok(list)
    }

    /// Look a stack up by name.
    ///
    /// A managed stack is loaded from its directory and reconciled. A name
    /// without a directory falls back to the runtime's list.
    #[instrument(skip(self))]
    pub async fn get_stack(&self, name: &str, use_cache: bool) -> Result<Stack> {
        if !is_valid_stack_name(name) {
            return Err(DockgeError::NotFound(name.to_string()));
        }
        if use_cache {
            let managed = self.managed.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(stack) = managed.get(name) {
                return Ok(stack.clone());
            }
        }

        let dir = self.ctx.stacks_dir().join(name);
        let is_dir = tokio::fs::metadata(&dir)
            .await
            .is_ok_and(|meta| meta.is_dir());
        if !is_dir {
            return self
                .stack_list(true)
                .await?
                .remove(name)
                .ok_or_else(|| DockgeError::NotFound(name.to_string()));
        }

        let mut stack = Stack::new(self.ctx.clone(), name);
        stack.set_config_file_path(Some(dir.display().to_string()));
        stack.update_data(false).await;
        Ok(stack)
    }
}
