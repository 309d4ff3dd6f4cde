//! # Image Repository
//!
//! Process-wide cache of image digests, keyed by stack and `service::image`.
//!
//! Local information (image id and local digest) is refreshed whenever the
//! live container points at an image id the cache has not seen. The remote
//! digest is only looked up on an explicit update check and survives local
//! refreshes, so drift detection never costs a registry round trip.

use crate::runtime::ContainerRuntime;
use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, instrument, warn};

/// Cached digests of one service image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    remote_digest: String,
    local_digest: String,
    local_id: String,
}

impl ImageInfo {
    pub fn new(
        remote_digest: impl Into<String>,
        local_digest: impl Into<String>,
        local_id: impl Into<String>,
    ) -> Self {
        Self {
            remote_digest: remote_digest.into(),
            local_digest: local_digest.into(),
            local_id: local_id.into(),
        }
    }

    pub fn remote_digest(&self) -> &str {
        &self.remote_digest
    }

    pub fn local_digest(&self) -> &str {
        &self.local_digest
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Both digests are known and differ.
    pub fn is_update_available(&self) -> bool {
        !self.remote_digest.is_empty()
            && !self.local_digest.is_empty()
            && self.remote_digest != self.local_digest
    }
}

/// A reference pinned by digest never has an update.
pub fn is_digest_pinned(image: &str) -> bool {
    image.contains("@sha256:")
}

type StackImages = BTreeMap<String, ImageInfo>;

/// Digest cache shared by every stack.
pub struct ImageRepository {
    runtime: Arc<dyn ContainerRuntime>,
    stacks: RwLock<BTreeMap<String, StackImages>>,
}

impl std::fmt::Debug for ImageRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stacks = self.stacks.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ImageRepository")
            .field("stacks", &stacks.len())
            .finish()
    }
}

fn image_key(service: &str, image: &str) -> String {
    format!("{service}::{image}")
}

impl ImageRepository {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            stacks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Refresh local and remote digests of one service image.
    ///
    /// The remote lookup is skipped when the image is not present locally or
    /// is pinned by digest.
    #[instrument(skip(self))]
    pub async fn update(&self, stack: &str, service: &str, image: &str) -> Result<ImageInfo> {
        let local = self.update_local(stack, service, image).await?;
        if local.local_digest.is_empty() || is_digest_pinned(image) {
            return Ok(local);
        }

        let remote = self.runtime.inspect_remote_digest(image).await?;
        let info = ImageInfo {
            remote_digest: remote.trim().to_string(),
            ..local
        };
        if info.is_update_available() {
            debug!(stack, service, image, remote = %info.remote_digest, "image update available");
        }
        self.store(stack, service, image, info.clone());
        Ok(info)
    }

    /// Refresh the local image id and digest, keeping the known remote digest.
    #[instrument(skip(self))]
    pub async fn update_local(&self, stack: &str, service: &str, image: &str) -> Result<ImageInfo> {
        let inspect = self.runtime.inspect_local_image(image).await?;
        let details = match &inspect {
            serde_json::Value::Array(items) => items.first().unwrap_or(&serde_json::Value::Null),
            other => other,
        };

        let local_id = details
            .get("Id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let local_digest = details
            .get("RepoDigests")
            .and_then(serde_json::Value::as_array)
            .and_then(|digests| digests.first())
            .and_then(serde_json::Value::as_str)
            .and_then(|reference| reference.split_once('@'))
            .map(|(_, digest)| digest)
            .unwrap_or_default();

        if local_digest.is_empty() {
            warn!(stack, service, image, "no local digest for image");
        }

        let info = ImageInfo {
            remote_digest: self.get_image_info(stack, service, image).remote_digest,
            local_digest: local_digest.to_string(),
            local_id: local_id.to_string(),
        };
        self.store(stack, service, image, info.clone());
        Ok(info)
    }

    /// Cached info, or an empty record on a miss.
    pub fn get_image_info(&self, stack: &str, service: &str, image: &str) -> ImageInfo {
        let stacks = self.stacks.read().unwrap_or_else(PoisonError::into_inner);
        stacks
            .get(stack)
            .and_then(|images| images.get(&image_key(service, image)))
            .cloned()
            .unwrap_or_default()
    }

    /// Forget everything cached for a stack.
    pub fn reset_stack(&self, stack: &str) {
        let mut stacks = self.stacks.write().unwrap_or_else(PoisonError::into_inner);
        stacks.remove(stack);
    }

    fn store(&self, stack: &str, service: &str, image: &str, info: ImageInfo) {
        let mut stacks = self.stacks.write().unwrap_or_else(PoisonError::into_inner);
        stacks
            .entry(stack.to_string())
            .or_default()
            .insert(image_key(service, image), info);
    }
}
