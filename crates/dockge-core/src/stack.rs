//! # Stack
//!
//! A named compose project living in `<stacks_dir>/<name>/`.
//!
//! A `Stack` owns its compose source (read lazily from disk) and the result
//! of the latest reconciliation pass. Reconciliation compares the declared
//! services against the runtime's view, flags drift and image updates, and
//! aggregates a stack status. Its result is computed in full and swapped in
//! with one assignment, so a failed pass leaves the previous state intact.

use crate::compose::{
    ComposeData, ComposeDocument, ComposeLabels, LABEL_IMAGEUPDATES_CHANGELOG,
    LABEL_IMAGEUPDATES_CHECK, LABEL_IMAGEUPDATES_IGNORE, LABEL_STATUS_IGNORE,
};
use crate::image_repository::ImageRepository;
use crate::runtime::{
    COMPOSE_IMAGE_LABEL, ContainerRuntime, ServiceStatusEntry, parse_json_lines, parse_stats,
};
use crate::types::{
    DockgeError, Result, ServiceData, StackData, StackStatus, StackSummary, StatsData,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, instrument, warn};

/// Compose file names, in lookup order.
pub const ACCEPTED_COMPOSE_FILE_NAMES: [&str; 4] = [
    "compose.yaml",
    "docker-compose.yaml",
    "docker-compose.yml",
    "compose.yml",
];

/// Whether `name` is a valid stack name (`[a-z0-9_-]+`).
pub fn is_valid_stack_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// First accepted compose file present in `dir`.
pub fn find_compose_file(dir: &Path) -> Option<&'static str> {
    ACCEPTED_COMPOSE_FILE_NAMES
        .into_iter()
        .find(|name| dir.join(name).is_file())
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Everything a stack needs from its surroundings.
#[derive(Clone)]
pub struct StackContext {
    stacks_dir: PathBuf,
    runtime: Arc<dyn ContainerRuntime>,
    images: Arc<ImageRepository>,
}

impl std::fmt::Debug for StackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackContext")
            .field("stacks_dir", &self.stacks_dir)
            .finish()
    }
}

impl StackContext {
    /// Build a context with a fresh image cache.
    pub fn new(stacks_dir: impl Into<PathBuf>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let images = Arc::new(ImageRepository::new(runtime.clone()));
        Self {
            stacks_dir: stacks_dir.into(),
            runtime,
            images,
        }
    }

    pub fn stacks_dir(&self) -> &Path {
        &self.stacks_dir
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    pub fn images(&self) -> &Arc<ImageRepository> {
        &self.images
    }
}

// =============================================================================
// STACK
// =============================================================================

/// Result of one reconciliation pass.
struct Reconciled {
    status: StackStatus,
    unhealthy: bool,
    recreate_necessary: bool,
    services: BTreeMap<String, ServiceData>,
}

/// A compose project and its last reconciled state.
#[derive(Clone)]
pub struct Stack {
    name: String,
    ctx: StackContext,
    compose_file_name: String,
    compose_yaml: OnceLock<String>,
    compose_env: OnceLock<String>,
    document: OnceLock<ComposeDocument>,
    config_file_path: Option<String>,
    status: StackStatus,
    unhealthy: bool,
    recreate_necessary: bool,
    services: BTreeMap<String, ServiceData>,
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("name", &self.name)
            .field("compose_file_name", &self.compose_file_name)
            .field("status", &self.status)
            .field("services", &self.services.len())
            .finish()
    }
}

impl Stack {
    /// A stack whose sources are read from disk on first access.
    pub fn new(ctx: StackContext, name: impl Into<String>) -> Self {
        let name = name.into();
        let dir = ctx.stacks_dir.join(&name);
        let compose_file_name = find_compose_file(&dir).unwrap_or(ACCEPTED_COMPOSE_FILE_NAMES[0]);
        Self {
            name,
            ctx,
            compose_file_name: compose_file_name.to_string(),
            compose_yaml: OnceLock::new(),
            compose_env: OnceLock::new(),
            document: OnceLock::new(),
            config_file_path: None,
            status: StackStatus::Unknown,
            unhealthy: false,
            recreate_necessary: false,
            services: BTreeMap::new(),
        }
    }

    /// A stack with in-memory sources, as submitted by an editor.
    pub fn draft(
        ctx: StackContext,
        name: impl Into<String>,
        compose_yaml: impl Into<String>,
        compose_env: impl Into<String>,
    ) -> Self {
        let mut stack = Self::new(ctx, name);
        stack.compose_yaml = OnceLock::from(compose_yaml.into());
        stack.compose_env = OnceLock::from(compose_env.into());
        stack
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of the stack.
    pub fn path(&self) -> PathBuf {
        self.ctx.stacks_dir.join(&self.name)
    }

    pub fn compose_file_name(&self) -> &str {
        &self.compose_file_name
    }

    /// Read both sources from disk unless they are already in memory.
    pub async fn load_sources(&self) {
        if self.compose_yaml.get().is_none() {
            let path = self.path().join(&self.compose_file_name);
            let text = tokio::fs::read_to_string(path).await.unwrap_or_default();
            let _ = self.compose_yaml.set(text);
        }
        if self.compose_env.get().is_none() {
            let text = tokio::fs::read_to_string(self.path().join(".env"))
                .await
                .unwrap_or_default();
            let _ = self.compose_env.set(text);
        }
    }

    /// Compose source. A missing or unreadable file reads as empty.
    ///
    /// Falls back to a blocking read when [`Stack::load_sources`] has not run.
    pub fn compose_yaml(&self) -> &str {
        self.compose_yaml.get_or_init(|| {
            std::fs::read_to_string(self.path().join(&self.compose_file_name)).unwrap_or_default()
        })
    }

    /// `.env` source. A missing or unreadable file reads as empty.
    pub fn compose_env(&self) -> &str {
        self.compose_env
            .get_or_init(|| std::fs::read_to_string(self.path().join(".env")).unwrap_or_default())
    }

    /// Parsed compose document, built on first access.
    pub fn document(&self) -> Result<&ComposeDocument> {
        if let Some(document) = self.document.get() {
            return Ok(document);
        }
        let env = self.compose_env();
        let env = (!env.trim().is_empty()).then_some(env);
        let document = ComposeDocument::parse(self.compose_yaml(), env)?;
        Ok(self.document.get_or_init(|| document))
    }

    /// Replace the in-memory sources. The parsed document is rebuilt lazily.
    pub fn set_sources(&mut self, compose_yaml: String, compose_env: Option<String>) {
        self.compose_yaml = OnceLock::from(compose_yaml);
        if let Some(env) = compose_env {
            self.compose_env = OnceLock::from(env);
        }
        self.document = OnceLock::new();
    }

    pub fn status(&self) -> StackStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: StackStatus) {
        self.status = status;
    }

    /// At least one counted service reported an unhealthy health check.
    pub fn is_unhealthy(&self) -> bool {
        self.unhealthy
    }

    pub fn is_started(&self) -> bool {
        self.status.is_started()
    }

    /// The stack directory exists under the stacks root.
    pub fn is_managed(&self) -> bool {
        self.path().is_dir()
    }

    pub fn recreate_necessary(&self) -> bool {
        self.recreate_necessary
    }

    pub fn image_updates_available(&self) -> bool {
        self.services.values().any(|s| s.image_update_available)
    }

    pub fn services(&self) -> &BTreeMap<String, ServiceData> {
        &self.services
    }

    pub fn config_file_path(&self) -> Option<&str> {
        self.config_file_path.as_deref()
    }

    pub(crate) fn set_config_file_path(&mut self, path: Option<String>) {
        self.config_file_path = path;
    }

    pub fn summary(&self) -> StackSummary {
        StackSummary {
            name: self.name.clone(),
            status: self.status,
            status_code: self.status.code(),
            started: self.is_started(),
            recreate_necessary: self.recreate_necessary,
            image_updates_available: self.image_updates_available(),
            is_managed: self.is_managed(),
            compose_file_name: self.compose_file_name.clone(),
        }
    }

    pub fn data(&self) -> StackData {
        StackData {
            summary: self.summary(),
            compose_yaml: self.compose_yaml().to_string(),
            compose_env: self.compose_env().to_string(),
            services: self.services.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Validation and persistence
    // -------------------------------------------------------------------------

    /// Check name, compose source and `.env` before anything is written.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_stack_name(&self.name) {
            return Err(DockgeError::validation(
                "Stack name can only contain [a-z][0-9] _ - only",
            ));
        }

        ComposeDocument::parse(self.compose_yaml(), None)?;

        let env = self.compose_env();
        if !env.is_empty() && !env.contains('\n') && !env.contains('=') {
            return Err(DockgeError::validation("Invalid .env format"));
        }
        Ok(())
    }

    /// Write the stack's sources to disk.
    ///
    /// With `is_add` the directory must not exist yet and is created;
    /// otherwise it must already exist. `.env` is only written when it
    /// already exists or has content.
    #[instrument(skip(self), fields(stack = %self.name))]
    pub async fn save(&self, is_add: bool) -> Result<()> {
        self.load_sources().await;
        self.validate()?;

        let dir = self.path();
        let exists = tokio::fs::try_exists(&dir).await?;
        if is_add {
            if exists {
                return Err(DockgeError::validation("Stack name already exists"));
            }
            tokio::fs::create_dir(&dir).await?;
        } else if !exists {
            return Err(DockgeError::validation("Stack not found"));
        }

        tokio::fs::write(dir.join(&self.compose_file_name), self.compose_yaml()).await?;

        let env_path = dir.join(".env");
        if tokio::fs::try_exists(&env_path).await? || !self.compose_env().trim().is_empty() {
            tokio::fs::write(&env_path, self.compose_env()).await?;
        }
        info!(stack = %self.name, is_add, "stack saved");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    async fn compose(&self, action: &str, args: &[&str]) -> Result<i32> {
        let argv: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        info!(stack = %self.name, action, ?argv, "running compose command");
        let code = self
            .ctx
            .runtime
            .run_lifecycle_command(&self.path(), &argv)
            .await?;
        if code != 0 {
            warn!(stack = %self.name, action, code, "compose command failed");
            return Err(DockgeError::operation(action));
        }
        Ok(code)
    }

    /// Refresh state after a lifecycle change; optionally refresh digests.
    async fn refresh(&mut self, with_images: bool) {
        self.update_data(false).await;
        if with_images {
            self.update_image_infos().await;
            self.update_data(false).await;
        }
    }

    pub async fn deploy(&mut self) -> Result<i32> {
        let code = self.compose("deploy", &["up", "-d", "--remove-orphans"]).await?;
        self.refresh(true).await;
        Ok(code)
    }

    pub async fn start(&mut self) -> Result<i32> {
        let code = self.compose("start", &["up", "-d", "--remove-orphans"]).await?;
        self.refresh(true).await;
        Ok(code)
    }

    pub async fn stop(&mut self) -> Result<i32> {
        let code = self.compose("stop", &["stop"]).await?;
        self.refresh(false).await;
        Ok(code)
    }

    pub async fn restart(&mut self) -> Result<i32> {
        let code = self.compose("restart", &["restart"]).await?;
        self.refresh(true).await;
        Ok(code)
    }

    pub async fn down(&mut self) -> Result<i32> {
        let code = self.compose("down", &["down"]).await?;
        self.refresh(false).await;
        Ok(code)
    }

    /// Tear the project down and remove its directory.
    pub async fn delete(&mut self) -> Result<i32> {
        let code = self.compose("delete", &["down", "--remove-orphans"]).await?;
        let dir = self.path();
        if tokio::fs::try_exists(&dir).await? {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        self.ctx.images.reset_stack(&self.name);
        info!(stack = %self.name, "stack deleted");
        Ok(code)
    }

    /// Pull every image and, if the stack is running, recreate it.
    pub async fn update(&mut self) -> Result<i32> {
        let code = self.compose("pull", &["pull"]).await?;
        self.update_data(false).await;
        if !self.is_started() {
            return Ok(code);
        }
        let code = self.compose("restart", &["up", "-d", "--remove-orphans"]).await?;
        self.refresh(true).await;
        Ok(code)
    }

    pub async fn start_service(&mut self, service: &str) -> Result<i32> {
        let code = self.compose("start", &["start", service]).await?;
        self.refresh(true).await;
        Ok(code)
    }

    pub async fn stop_service(&mut self, service: &str) -> Result<i32> {
        let code = self.compose("stop", &["stop", service]).await?;
        self.refresh(false).await;
        Ok(code)
    }

    pub async fn restart_service(&mut self, service: &str) -> Result<i32> {
        let code = self.compose("restart", &["restart", service]).await?;
        self.refresh(true).await;
        Ok(code)
    }

    /// Recreate one service's container from its declared image.
    pub async fn recreate_service(&mut self, service: &str) -> Result<i32> {
        let code = self
            .compose("recreate", &["up", "-d", "--force-recreate", "--no-deps", service])
            .await?;
        self.refresh(true).await;
        Ok(code)
    }

    /// Pull one service's image and, if the stack is running, recreate it.
    pub async fn update_service(&mut self, service: &str) -> Result<i32> {
        let code = self.compose("pull", &["pull", service]).await?;
        self.update_data(false).await;
        if !self.is_started() {
            return Ok(code);
        }
        let code = self
            .compose("update", &["up", "-d", "--no-deps", service])
            .await?;
        self.refresh(true).await;
        Ok(code)
    }

    // -------------------------------------------------------------------------
    // Image updates
    // -------------------------------------------------------------------------

    /// Drop cached digests for this stack and look every live service up again.
    /// Failures are logged per service.
    pub async fn update_image_infos(&self) {
        self.ctx.images.reset_stack(&self.name);
        for service in self.services.values() {
            if let Err(e) = self
                .ctx
                .images
                .update(&self.name, &service.name, &service.image)
                .await
            {
                warn!(stack = %self.name, service = %service.name, error = %e, "image check failed");
            }
        }
    }

    /// Acknowledge the current remote digest of a service, silencing its
    /// update notification until a newer digest appears.
    pub async fn ignore_update(&mut self, service: &str) -> Result<()> {
        let known_digest = |stack: &Self| {
            stack
                .services
                .get(service)
                .map(|s| s.remote_image_digest.clone())
                .filter(|d| !d.is_empty())
        };

        // A fresh context has no digests cached yet.
        if known_digest(self).is_none() {
            if let Some(image) = self.services.get(service).map(|s| s.image.clone()) {
                if let Err(e) = self.ctx.images.update(&self.name, service, &image).await {
                    warn!(stack = %self.name, service, error = %e, "image check failed");
                }
                self.update_data(false).await;
            }
        }
        let digest = known_digest(self).ok_or_else(|| {
            DockgeError::validation(format!("No known image update for service '{service}'"))
        })?;

        self.load_sources().await;
        let mut document = self.document()?.clone();
        {
            let mut services = document.services_mut();
            if !services.has(service) {
                return Err(DockgeError::validation(format!(
                    "Service '{service}' is not declared"
                )));
            }
            services
                .service_mut(service)
                .service_labels_mut()
                .set(LABEL_IMAGEUPDATES_IGNORE, &digest);
        }

        self.set_sources(document.serialize()?, None);
        self.save(false).await?;
        self.update_data(false).await;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------------

    /// Resource usage of the live containers, keyed by container name.
    pub async fn service_stats(&self) -> Result<BTreeMap<String, StatsData>> {
        let output = self.ctx.runtime.list_service_stats(&self.path()).await?;
        parse_stats(&output)
    }

    /// Run a reconciliation pass and swap its result in.
    ///
    /// Errors are logged and leave the previous state untouched.
    pub async fn update_data(&mut self, include_stats: bool) {
        match self.reconcile(include_stats).await {
            Ok(reconciled) => {
                self.status = reconciled.status;
                self.unhealthy = reconciled.unhealthy;
                self.recreate_necessary = reconciled.recreate_necessary;
                self.services = reconciled.services;
            }
            Err(e) => error!(stack = %self.name, error = %e, "reconciliation aborted"),
        }
    }

    #[instrument(skip(self), fields(stack = %self.name))]
    async fn reconcile(&self, include_stats: bool) -> Result<Reconciled> {
        self.load_sources().await;
        let mut stats = if include_stats {
            self.service_stats().await?
        } else {
            BTreeMap::new()
        };
        let output = self.ctx.runtime.list_service_status(&self.path()).await?;
        let entries: Vec<ServiceStatusEntry> = parse_json_lines(&output)?;

        if entries.is_empty() {
            let status = if self.is_managed() {
                StackStatus::CreatedFile
            } else {
                StackStatus::Unknown
            };
            debug!(stack = %self.name, %status, "no live services");
            return Ok(Reconciled {
                status,
                unhealthy: false,
                recreate_necessary: false,
                services: BTreeMap::new(),
            });
        }

        let document = match self.document() {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(stack = %self.name, error = %e, "compose file unreadable, drift unknown");
                None
            }
        };
        let declared = document.map(ComposeDocument::services);

        let mut running = 0usize;
        let mut exited = 0usize;
        let mut unhealthy = false;
        let mut services = BTreeMap::new();

        for entry in entries {
            let service = declared.as_ref().map(|s| s.get_service(&entry.service));
            let labels = service.as_ref().map(|s| s.labels());

            let recreate_necessary = service
                .as_ref()
                .and_then(|s| s.image())
                .is_some_and(|declared_image| declared_image != entry.image);

            let (image_update_available, remote_image_digest) = if recreate_necessary
                || labels
                    .as_ref()
                    .is_some_and(|l| l.is_false(LABEL_IMAGEUPDATES_CHECK, true))
            {
                (false, String::new())
            } else {
                self.check_image(&entry, labels.as_ref()).await
            };

            let status_ignored = labels
                .as_ref()
                .is_some_and(|l| l.is_true(LABEL_STATUS_IGNORE, true));
            match entry.state.as_str() {
                "running" if !status_ignored => running += 1,
                "exited" if !status_ignored => exited += 1,
                "running" | "exited" | "created" => {}
                other => warn!(stack = %self.name, service = %entry.service, state = other, "unexpected service state"),
            }
            if !status_ignored && entry.health == "unhealthy" {
                unhealthy = true;
            }

            let data = ServiceData {
                name: entry.service.clone(),
                container_name: entry.name.clone(),
                image: entry.image.clone(),
                state: entry.state.clone(),
                status: entry.status.clone(),
                health: entry.health.clone(),
                recreate_necessary,
                image_update_available,
                remote_image_digest,
                changelog: labels
                    .as_ref()
                    .and_then(|l| l.get(LABEL_IMAGEUPDATES_CHANGELOG, true)),
                stats: stats.remove(&entry.name),
            };
            services.insert(entry.service, data);
        }

        Ok(Reconciled {
            status: StackStatus::aggregate(running, exited, unhealthy),
            unhealthy,
            recreate_necessary: services.values().any(|s| s.recreate_necessary),
            services,
        })
    }

    /// Refresh local image info if the live image id changed, then evaluate
    /// the update predicate against the acknowledged digest.
    async fn check_image(
        &self,
        entry: &ServiceStatusEntry,
        labels: Option<&ComposeLabels<&ComposeData>>,
    ) -> (bool, String) {
        let images = &self.ctx.images;
        let live_id = entry.label(COMPOSE_IMAGE_LABEL).unwrap_or_default();
        let cached = images.get_image_info(&self.name, &entry.service, &entry.image);
        if !live_id.is_empty() && live_id != cached.local_id() {
            if let Err(e) = images
                .update_local(&self.name, &entry.service, &entry.image)
                .await
            {
                warn!(stack = %self.name, service = %entry.service, error = %e, "local image lookup failed");
            }
        }

        let info = images.get_image_info(&self.name, &entry.service, &entry.image);
        let acknowledged = labels
            .and_then(|l| l.get(LABEL_IMAGEUPDATES_IGNORE, true))
            .is_some_and(|digest| digest == info.remote_digest());
        (
            info.is_update_available() && !acknowledged,
            info.remote_digest().to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_names() {
        assert!(is_valid_stack_name("web-app_2"));
        assert!(!is_valid_stack_name("Web"));
        assert!(!is_valid_stack_name("my stack"));
        assert!(!is_valid_stack_name("../etc"));
        assert!(!is_valid_stack_name(""));
    }

    #[test]
    fn compose_file_lookup_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(find_compose_file(dir.path()), None);
        std::fs::write(dir.path().join("compose.yml"), "").expect("write");
        assert_eq!(find_compose_file(dir.path()), Some("compose.yml"));
        std::fs::write(dir.path().join("docker-compose.yaml"), "").expect("write");
        assert_eq!(find_compose_file(dir.path()), Some("docker-compose.yaml"));
    }
}
