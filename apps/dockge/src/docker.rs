//! # Docker CLI Runtime
//!
//! [`ContainerRuntime`] on top of the `docker` executable. Queries capture
//! stdout and fail on a non-zero exit; lifecycle commands inherit the
//! terminal so the user sees compose's own progress output.
//!
//! Every invocation is bounded by the configured timeout. Spawn failures,
//! timeouts and unparsable output all surface as `DockgeError::Runtime`.

use async_trait::async_trait;
use dockge_core::{ContainerRuntime, DockgeError, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Docker CLI wrapper.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn command(&self, args: &[&str], dir: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run a query and return its stdout.
    async fn query(&self, args: &[&str], dir: Option<&Path>) -> Result<String> {
        let mut cmd = self.command(args, dir);
        cmd.stdin(Stdio::null());
        tracing::debug!(binary = %self.binary, ?args, "docker query");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                DockgeError::Runtime(format!(
                    "docker {} timed out after {}s",
                    args.join(" "),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| DockgeError::Runtime(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DockgeError::Runtime(format!(
                "docker {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Pull the manifest digest out of `imagetools inspect` JSON output.
pub fn parse_manifest_digest(output: &str) -> Result<String> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let manifest: serde_json::Value = serde_json::from_str(trimmed)?;
    Ok(manifest
        .get("digest")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string())
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect_local_image(&self, image: &str) -> Result<serde_json::Value> {
        let output = self.query(&["image", "inspect", image], None).await?;
        Ok(serde_json::from_str(&output)?)
    }

    async fn inspect_remote_digest(&self, image: &str) -> Result<String> {
        let output = self
            .query(
                &[
                    "buildx",
                    "imagetools",
                    "inspect",
                    image,
                    "--format",
                    "{{json .Manifest}}",
                ],
                None,
            )
            .await?;
        parse_manifest_digest(&output)
    }

    async fn list_runtime_stacks(&self) -> Result<serde_json::Value> {
        let output = self
            .query(&["compose", "ls", "--all", "--format", "json"], None)
            .await?;
        if output.trim().is_empty() {
            return Ok(serde_json::Value::Array(Vec::new()));
        }
        Ok(serde_json::from_str(&output)?)
    }

    async fn list_service_status(&self, dir: &Path) -> Result<String> {
        self.query(&["compose", "ps", "--all", "--format", "json"], Some(dir))
            .await
    }

    async fn list_service_stats(&self, dir: &Path) -> Result<String> {
        self.query(
            &["compose", "stats", "--no-stream", "--format", "json"],
            Some(dir),
        )
        .await
    }

    async fn run_lifecycle_command(&self, dir: &Path, args: &[String]) -> Result<i32> {
        let mut full: Vec<&str> = vec!["compose"];
        full.extend(args.iter().map(String::as_str));

        let mut cmd = self.command(&full, Some(dir));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        tracing::info!(dir = %dir.display(), args = %args.join(" "), "docker compose");

        let status = tokio::time::timeout(self.timeout, cmd.status())
            .await
            .map_err(|_| {
                DockgeError::Runtime(format!(
                    "docker compose {} timed out after {}s",
                    args.join(" "),
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| DockgeError::Runtime(format!("Failed to run {}: {}", self.binary, e)))?;

        // Killed by a signal: no exit code.
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_digest_is_extracted() {
        let output = r#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","digest":"sha256:abc","size":1}"#;
        assert_eq!(
            parse_manifest_digest(output).unwrap_or_default(),
            "sha256:abc"
        );
    }

    #[test]
    fn empty_manifest_is_unknown() {
        assert_eq!(parse_manifest_digest("  \n").unwrap_or_default(), "");
        assert!(parse_manifest_digest("not json").is_err());
    }

    #[tokio::test]
    async fn missing_binary_is_runtime_error() {
        let docker = DockerCli::new("/nonexistent/docker-binary", Duration::from_secs(5));
        let result = docker.list_runtime_stacks().await;
        assert!(matches!(result, Err(DockgeError::Runtime(_))));
    }
}
