//! Shared fixtures: an in-memory container runtime and a stacks directory.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use async_trait::async_trait;
use dockge_core::{ContainerRuntime, DockgeError, Result, StackContext};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Runtime returning canned output and recording every lifecycle command.
pub struct FakeRuntime {
    pub status: Mutex<String>,
    pub stats: Mutex<String>,
    pub stacks: Mutex<serde_json::Value>,
    pub local: Mutex<BTreeMap<String, serde_json::Value>>,
    pub remote: Mutex<BTreeMap<String, String>>,
    pub exit_code: AtomicI32,
    pub fail_queries: AtomicBool,
    pub commands: Mutex<Vec<Vec<String>>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            status: Mutex::new(String::new()),
            stats: Mutex::new(String::new()),
            stacks: Mutex::new(serde_json::json!([])),
            local: Mutex::new(BTreeMap::new()),
            remote: Mutex::new(BTreeMap::new()),
            exit_code: AtomicI32::new(0),
            fail_queries: AtomicBool::new(false),
            commands: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRuntime {
    pub fn set_status_lines(&self, lines: &[serde_json::Value]) {
        let text = lines
            .iter()
            .map(serde_json::Value::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        *self.status.lock().unwrap() = text;
    }

    pub fn set_local_image(&self, image: &str, id: &str, digest: &str) {
        self.local.lock().unwrap().insert(
            image.to_string(),
            serde_json::json!([{ "Id": id, "RepoDigests": [format!("repo@{digest}")] }]),
        );
    }

    pub fn set_remote_digest(&self, image: &str, digest: &str) {
        self.remote
            .lock()
            .unwrap()
            .insert(image.to_string(), digest.to_string());
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap().clone()
    }

    fn check_queries(&self) -> Result<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(DockgeError::Runtime("runtime unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn inspect_local_image(&self, image: &str) -> Result<serde_json::Value> {
        self.check_queries()?;
        self.local
            .lock()
            .unwrap()
            .get(image)
            .cloned()
            .ok_or_else(|| DockgeError::Runtime(format!("no such image: {image}")))
    }

    async fn inspect_remote_digest(&self, image: &str) -> Result<String> {
        self.check_queries()?;
        Ok(self
            .remote
            .lock()
            .unwrap()
            .get(image)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_runtime_stacks(&self) -> Result<serde_json::Value> {
        self.check_queries()?;
        Ok(self.stacks.lock().unwrap().clone())
    }

    async fn list_service_status(&self, _dir: &Path) -> Result<String> {
        self.check_queries()?;
        Ok(self.status.lock().unwrap().clone())
    }

    async fn list_service_stats(&self, _dir: &Path) -> Result<String> {
        self.check_queries()?;
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn run_lifecycle_command(&self, _dir: &Path, args: &[String]) -> Result<i32> {
        self.commands.lock().unwrap().push(args.to_vec());
        Ok(self.exit_code.load(Ordering::SeqCst))
    }
}

/// A temporary stacks root wired to a fake runtime.
pub struct Fixture {
    pub dir: TempDir,
    pub runtime: Arc<FakeRuntime>,
    pub ctx: StackContext,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(FakeRuntime::default());
        let ctx = StackContext::new(dir.path(), runtime.clone());
        Self { dir, runtime, ctx }
    }

    /// Write a stack directory with a compose file and optional `.env`.
    pub fn write_stack(&self, name: &str, compose: &str, env: Option<&str>) {
        let dir = self.dir.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("compose.yaml"), compose).unwrap();
        if let Some(env) = env {
            std::fs::write(dir.join(".env"), env).unwrap();
        }
    }
}

/// A `compose ps` line.
pub fn ps_line(service: &str, image: &str, state: &str, health: &str, image_id: &str) -> serde_json::Value {
    serde_json::json!({
        "Name": format!("app-{service}-1"),
        "Service": service,
        "Image": image,
        "State": state,
        "Status": format!("{state} 5 minutes"),
        "Health": health,
        "Labels": format!("com.docker.compose.project=app,com.docker.compose.image={image_id}"),
    })
}
