//! Typed views over the well-known parts of a compose document.
//!
//! Each wrapper is a [`ComposeMap`] with a fixed position and a few helpers
//! for the keys the engine cares about. Generic access stays available
//! through `Deref`.

use super::array::ComposeArray;
use super::labels::ComposeLabels;
use super::map::ComposeMap;
use super::node::{ComposeData, as_boolean};
use std::ops::{Deref, DerefMut};

/// Name of the vendor extension key holding engine metadata.
pub const X_DOCKGE: &str = "x-dockge";

macro_rules! map_wrapper {
    ($name:ident) => {
        impl<D> Deref for $name<D> {
            type Target = ComposeMap<D>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl<D> DerefMut for $name<D> {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

// =============================================================================
// SERVICES
// =============================================================================

/// The top level `services` mapping.
#[derive(Debug, Clone)]
pub struct ComposeServices<D>(ComposeMap<D>);
map_wrapper!(ComposeServices);

impl<D: Deref<Target = ComposeData>> ComposeServices<D> {
    pub(crate) fn new(data: D) -> Self {
        Self(ComposeMap::at(data, vec!["services".to_string()]))
    }

    /// Read-only view of one service. Missing services read as empty.
    pub fn get_service(&self, name: &str) -> ComposeService<&ComposeData> {
        let (data, path) = self.0.child(name);
        ComposeService(ComposeMap::at(data, path))
    }

    /// Every declared service, in document order.
    pub fn services(&self) -> Vec<ComposeService<&ComposeData>> {
        self.names()
            .iter()
            .map(|name| self.get_service(name))
            .collect()
    }
}

impl<D: DerefMut<Target = ComposeData>> ComposeServices<D> {
    /// Editable view of one service.
    pub fn service_mut(&mut self, name: &str) -> ComposeService<&mut ComposeData> {
        let (data, path) = self.0.child_mut(name);
        ComposeService(ComposeMap::at(data, path))
    }
}

/// One entry of `services`.
#[derive(Debug, Clone)]
pub struct ComposeService<D>(ComposeMap<D>);
map_wrapper!(ComposeService);

impl<D: Deref<Target = ComposeData>> ComposeService<D> {
    /// Declared image reference, variables substituted.
    pub fn image(&self) -> Option<&str> {
        self.get_str("image", true)
    }

    /// Image reference without tag or digest.
    pub fn image_name(&self) -> Option<&str> {
        self.image().map(|image| split_image(image).0)
    }

    /// Image tag, `latest` when none is given.
    pub fn image_tag(&self) -> Option<&str> {
        self.image().map(|image| split_image(image).1)
    }

    pub fn container_name(&self) -> Option<&str> {
        self.get_str("container_name", true)
    }

    pub fn restart(&self) -> Option<&str> {
        self.get_str("restart", true)
    }

    pub fn labels(&self) -> ComposeLabels<&ComposeData> {
        self.get_labels("labels")
    }

    pub fn ports(&self) -> ComposeArray<&ComposeData> {
        self.get_array("ports")
    }

    pub fn volumes(&self) -> ComposeArray<&ComposeData> {
        self.get_array("volumes")
    }

    pub fn networks(&self) -> ComposeArray<&ComposeData> {
        self.get_array("networks")
    }

    pub fn environment(&self) -> ComposeArray<&ComposeData> {
        self.get_array("environment")
    }

    pub fn depends_on(&self) -> ComposeArray<&ComposeData> {
        self.get_array("depends_on")
    }
}

impl<D: DerefMut<Target = ComposeData>> ComposeService<D> {
    pub fn set_image(&mut self, image: &str) {
        self.set("image", image);
    }

    pub fn set_container_name(&mut self, name: &str) {
        self.set("container_name", name);
    }

    pub fn set_restart(&mut self, policy: &str) {
        self.set("restart", policy);
    }

    pub fn service_labels_mut(&mut self) -> ComposeLabels<&mut ComposeData> {
        self.labels_mut("labels")
    }
}

/// Split an image reference into name and tag.
///
/// The tag is whatever follows the last `:` after the last `/`, so registry
/// ports are not mistaken for tags. Digests are dropped.
fn split_image(image: &str) -> (&str, &str) {
    let reference = image.split_once('@').map(|(r, _)| r).unwrap_or(image);
    let slash = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[slash..].rfind(':') {
        Some(colon) => (&reference[..slash + colon], &reference[slash + colon + 1..]),
        None => (reference, "latest"),
    }
}

// =============================================================================
// NETWORKS
// =============================================================================

/// The top level `networks` mapping.
#[derive(Debug, Clone)]
pub struct ComposeNetworks<D>(ComposeMap<D>);
map_wrapper!(ComposeNetworks);

impl<D: Deref<Target = ComposeData>> ComposeNetworks<D> {
    pub(crate) fn new(data: D) -> Self {
        Self(ComposeMap::at(data, vec!["networks".to_string()]))
    }

    pub fn get_network(&self, name: &str) -> ComposeNetwork<&ComposeData> {
        let (data, path) = self.0.child(name);
        ComposeNetwork(ComposeMap::at(data, path))
    }
}

impl<D: DerefMut<Target = ComposeData>> ComposeNetworks<D> {
    pub fn network_mut(&mut self, name: &str) -> ComposeNetwork<&mut ComposeData> {
        let (data, path) = self.0.child_mut(name);
        ComposeNetwork(ComposeMap::at(data, path))
    }
}

/// One entry of `networks`.
#[derive(Debug, Clone)]
pub struct ComposeNetwork<D>(ComposeMap<D>);
map_wrapper!(ComposeNetwork);

impl<D: Deref<Target = ComposeData>> ComposeNetwork<D> {
    /// Whether the network is managed outside this stack.
    pub fn is_external(&self) -> bool {
        as_boolean(self.get("external", true)).unwrap_or(false)
    }
}

impl<D: DerefMut<Target = ComposeData>> ComposeNetwork<D> {
    /// Mark the network external. Clearing the flag removes the key.
    pub fn set_external(&mut self, external: bool) {
        if external {
            self.set("external", true);
        } else {
            self.delete("external");
        }
    }
}

// =============================================================================
// EXTENSION
// =============================================================================

/// The `x-dockge` extension mapping.
#[derive(Debug, Clone)]
pub struct ComposeExtension<D>(ComposeMap<D>);
map_wrapper!(ComposeExtension);

impl<D: Deref<Target = ComposeData>> ComposeExtension<D> {
    pub(crate) fn new(data: D) -> Self {
        Self(ComposeMap::at(data, vec![X_DOCKGE.to_string()]))
    }

    /// Links shown next to the stack.
    pub fn urls(&self) -> ComposeArray<&ComposeData> {
        self.get_array("urls")
    }
}

impl<D: DerefMut<Target = ComposeData>> ComposeExtension<D> {
    pub fn urls_mut(&mut self) -> ComposeArray<&mut ComposeData> {
        self.array_mut("urls")
    }
}
