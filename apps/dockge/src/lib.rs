//! # dockge
//!
//! Library half of the Dockge binary. The HTTP API, the configuration layer
//! and the docker CLI runtime live here so integration tests can drive them
//! without spawning the process.

pub mod actions;
pub mod api;
pub mod config;
pub mod docker;
