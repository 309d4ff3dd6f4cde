//! # Dockge - compose stack manager
//!
//! The main binary for Dockge.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for stack operations
//! - The docker CLI runtime the stack engine drives
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      apps/dockge (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │  Docker runtime  │     │
//! │  │  (clap)     │    │   (axum)    │    │ (tokio::process) │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │  dockge-core  │                            │
//! │                    │ (THE LOGIC)   │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! dockge server --host 0.0.0.0 --port 5001
//!
//! # CLI operations
//! dockge list
//! dockge save blog -f compose.yaml -e .env --add
//! dockge deploy blog
//! dockge check-updates blog
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // DOCKGE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("DOCKGE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dockge=info,dockge_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Dockge startup banner.
fn print_banner() {
    println!(
        r#"
  ____             _
 |  _ \  ___   ___| | ____ _  ___
 | | | |/ _ \ / __| |/ / _` |/ _ \
 | |_| | (_) | (__|   < (_| |  __/
 |____/ \___/ \___|_|\_\__, |\___|
                       |___/
  Compose stack manager v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
