//! # Stack Actions
//!
//! Named lifecycle actions shared by the CLI and the HTTP API. Each action
//! maps onto one `Stack` operation.

use dockge_core::{Result, Stack};
use std::fmt;

/// Whole-stack action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAction {
    Deploy,
    Start,
    Stop,
    Restart,
    Down,
    Update,
    Delete,
    CheckUpdates,
}

impl StackAction {
    pub const ALL: [Self; 8] = [
        Self::Deploy,
        Self::Start,
        Self::Stop,
        Self::Restart,
        Self::Down,
        Self::Update,
        Self::Delete,
        Self::CheckUpdates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Down => "down",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::CheckUpdates => "check-updates",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }

    /// Past-tense message for a successful run.
    pub fn done_message(self) -> &'static str {
        match self {
            Self::Deploy => "Deployed",
            Self::Start => "Started",
            Self::Stop => "Stopped",
            Self::Restart => "Restarted",
            Self::Down => "Downed",
            Self::Update => "Updated",
            Self::Delete => "Deleted",
            Self::CheckUpdates => "Checked",
        }
    }

    pub async fn apply(self, stack: &mut Stack) -> Result<()> {
        match self {
            Self::Deploy => stack.deploy().await.map(drop),
            Self::Start => stack.start().await.map(drop),
            Self::Stop => stack.stop().await.map(drop),
            Self::Restart => stack.restart().await.map(drop),
            Self::Down => stack.down().await.map(drop),
            Self::Update => stack.update().await.map(drop),
            Self::Delete => stack.delete().await.map(drop),
            Self::CheckUpdates => {
                stack.update_image_infos().await;
                stack.update_data(false).await;
                Ok(())
            }
        }
    }
}

impl fmt::Display for StackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-service action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Recreate,
    Update,
    IgnoreUpdate,
}

impl ServiceAction {
    pub const ALL: [Self; 6] = [
        Self::Start,
        Self::Stop,
        Self::Restart,
        Self::Recreate,
        Self::Update,
        Self::IgnoreUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Recreate => "recreate",
            Self::Update => "update",
            Self::IgnoreUpdate => "ignore-update",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }

    pub async fn apply(self, stack: &mut Stack, service: &str) -> Result<()> {
        match self {
            Self::Start => stack.start_service(service).await.map(drop),
            Self::Stop => stack.stop_service(service).await.map(drop),
            Self::Restart => stack.restart_service(service).await.map(drop),
            Self::Recreate => stack.recreate_service(service).await.map(drop),
            Self::Update => stack.update_service(service).await.map(drop),
            Self::IgnoreUpdate => stack.ignore_update(service).await,
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
