//! # Compose Document Model
//!
//! A typed, comment-preserving view of a compose file.
//!
//! - [`ComposeDocument`] owns the parsed trees and recorded comments
//! - [`ComposeMap`], [`ComposeArray`] and [`ComposeLabels`] are path-addressed
//!   views that read leniently and attach missing nodes on first write
//! - Service, network and extension views add helpers for well-known keys
//! - [`envsubst`] implements `.env` parsing and `${VAR}` interpolation

mod array;
mod comments;
mod document;
pub mod envsubst;
mod labels;
mod map;
mod node;
mod services;

pub use array::ComposeArray;
pub use document::ComposeDocument;
pub use labels::{
    ComposeLabels, LABEL_IMAGEUPDATES_CHANGELOG, LABEL_IMAGEUPDATES_CHECK,
    LABEL_IMAGEUPDATES_IGNORE, LABEL_STATUS_IGNORE,
};
pub use map::ComposeMap;
pub use node::{ComposeData, NodeKind};
pub use services::{
    ComposeExtension, ComposeNetwork, ComposeNetworks, ComposeService, ComposeServices, X_DOCKGE,
};
