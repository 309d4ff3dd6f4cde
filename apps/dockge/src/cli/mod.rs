//! # Dockge CLI Module
//!
//! This module implements the CLI interface for Dockge.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `list` / `show` / `refresh` - Inspect stacks
//! - `save` - Write a stack from local files
//! - `deploy`, `start`, `stop`, `restart`, `down`, `update`, `delete` - Stack lifecycle
//! - `start-service`, `stop-service`, `restart-service`, `recreate-service`,
//!   `update-service` - Single-service lifecycle
//! - `check-updates` / `ignore-update` - Image update detection

mod commands;

use clap::{Parser, Subcommand};
use dockge::actions::{ServiceAction, StackAction};
use dockge::config::AppConfig;
use dockge_core::DockgeError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Dockge - compose stack manager
///
/// Manages directories of compose files and reconciles them with the
/// running containers.
#[derive(Parser, Debug)]
#[command(name = "dockge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Stacks root directory (overrides config and DOCKGE_STACKS_DIR)
    #[arg(short = 'S', long, global = true)]
    pub stacks_dir: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List every stack
    List,

    /// Show a stack's sources and services
    Show { stack: String },

    /// Reconcile a stack against the runtime
    Refresh {
        stack: String,

        /// Include resource usage
        #[arg(long)]
        stats: bool,
    },

    /// Save a stack from local files
    Save {
        stack: String,

        /// Compose file to store
        #[arg(short, long)]
        file: PathBuf,

        /// Environment file to store
        #[arg(short, long)]
        env: Option<PathBuf>,

        /// Create a new stack instead of editing an existing one
        #[arg(long)]
        add: bool,
    },

    /// Bring a stack up
    Deploy { stack: String },
    /// Start a stack
    Start { stack: String },
    /// Stop a stack
    Stop { stack: String },
    /// Restart a stack
    Restart { stack: String },
    /// Stop and remove a stack's containers
    Down { stack: String },
    /// Pull images and recreate a running stack
    Update { stack: String },
    /// Tear a stack down and remove its directory
    Delete { stack: String },

    /// Start one service
    StartService { stack: String, service: String },
    /// Stop one service
    StopService { stack: String, service: String },
    /// Restart one service
    RestartService { stack: String, service: String },
    /// Recreate one service's container
    RecreateService { stack: String, service: String },
    /// Pull one service's image and recreate it if the stack is running
    UpdateService { stack: String, service: String },

    /// Look up remote digests for a stack's images
    CheckUpdates { stack: String },
    /// Silence the current image update of a service
    IgnoreUpdate { stack: String, service: String },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), DockgeError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.stacks_dir {
        config.stacks_dir = dir;
    }
    let json_mode = cli.json_mode;

    let Some(command) = cli.command else {
        // No subcommand - list stacks by default
        return cmd_list(&config, json_mode).await;
    };

    match command {
        Commands::Server { host, port } => cmd_server(config, host, port).await,
        Commands::List => cmd_list(&config, json_mode).await,
        Commands::Show { stack } => cmd_show(&config, json_mode, &stack).await,
        Commands::Refresh { stack, stats } => {
            cmd_refresh(&config, json_mode, &stack, stats).await
        }
        Commands::Save {
            stack,
            file,
            env,
            add,
        } => cmd_save(&config, json_mode, &stack, &file, env.as_deref(), add).await,
        Commands::Deploy { stack } => {
            cmd_stack_action(&config, json_mode, &stack, StackAction::Deploy).await
        }
        Commands::Start { stack } => {
            cmd_stack_action(&config, json_mode, &stack, StackAction::Start).await
        }
        Commands::Stop { stack } => {
            cmd_stack_action(&config, json_mode, &stack, StackAction::Stop).await
        }
        Commands::Restart { stack } => {
            cmd_stack_action(&config, json_mode, &stack, StackAction::Restart).await
        }
        Commands::Down { stack } => {
            cmd_stack_action(&config, json_mode, &stack, StackAction::Down).await
        }
        Commands::Update { stack } => {
            cmd_stack_action(&config, json_mode, &stack, StackAction::Update).await
        }
        Commands::Delete { stack } => {
            cmd_stack_action(&config, json_mode, &stack, StackAction::Delete).await
        }
        Commands::CheckUpdates { stack } => {
            cmd_stack_action(&config, json_mode, &stack, StackAction::CheckUpdates).await
        }
        Commands::StartService { stack, service } => {
            cmd_service_action(&config, json_mode, &stack, &service, ServiceAction::Start).await
        }
        Commands::StopService { stack, service } => {
            cmd_service_action(&config, json_mode, &stack, &service, ServiceAction::Stop).await
        }
        Commands::RestartService { stack, service } => {
            cmd_service_action(&config, json_mode, &stack, &service, ServiceAction::Restart)
                .await
        }
        Commands::RecreateService { stack, service } => {
            cmd_service_action(&config, json_mode, &stack, &service, ServiceAction::Recreate)
                .await
        }
        Commands::UpdateService { stack, service } => {
            cmd_service_action(&config, json_mode, &stack, &service, ServiceAction::Update).await
        }
        Commands::IgnoreUpdate { stack, service } => {
            cmd_service_action(
                &config,
                json_mode,
                &stack,
                &service,
                ServiceAction::IgnoreUpdate,
            )
            .await
        }
    }
}
