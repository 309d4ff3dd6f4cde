//! # CLI Command Implementations

use dockge::actions::{ServiceAction, StackAction};
use dockge::config::AppConfig;
use dockge::docker::DockerCli;
use dockge_core::{DockgeError, Stack, StackContext, StackData, StackRegistry, StackSummary};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Maximum size of a compose or env file accepted by `save` (1 MiB).
const MAX_SOURCE_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// HELPERS
// =============================================================================

/// Wire the docker runtime and the registry from configuration.
pub fn build_registry(config: &AppConfig) -> StackRegistry {
    let docker = DockerCli::new(config.docker_binary.clone(), config.command_timeout());
    let ctx = StackContext::new(config.stacks_dir.clone(), Arc::new(docker));
    StackRegistry::new(ctx).with_self_stack_name(config.self_stack_name.clone())
}

fn print_json<T: Serialize>(output: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(output).unwrap_or_default()
    );
}

fn print_summary_line(summary: &StackSummary) {
    println!(
        "{:<24} {:<20} {}{}{}",
        summary.name,
        summary.status.label(),
        if summary.is_managed { "managed" } else { "external" },
        if summary.recreate_necessary {
            ", recreate necessary"
        } else {
            ""
        },
        if summary.image_updates_available {
            ", updates available"
        } else {
            ""
        },
    );
}

fn print_stack(data: &StackData) {
    print_summary_line(&data.summary);
    if data.services.is_empty() {
        println!("  (no running services)");
    }
    for service in data.services.values() {
        let health = if service.health.is_empty() {
            String::new()
        } else {
            format!(" ({})", service.health)
        };
        println!(
            "  {:<20} {:<10}{} {}",
            service.name, service.state, health, service.image
        );
        if service.recreate_necessary {
            println!("    image differs from the compose file, recreate necessary");
        }
        if service.image_update_available {
            println!(
                "    update available: {}",
                service.remote_image_digest
            );
        }
        if let Some(stats) = &service.stats {
            println!(
                "    cpu {} | mem {} ({}) | net {} | block {}",
                stats.cpu_perc, stats.mem_usage, stats.mem_perc, stats.net_io, stats.block_io
            );
        }
    }
}

async fn read_source(path: &Path) -> Result<String, DockgeError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| DockgeError::Io(format!("{}: {}", path.display(), e)))?;
    if meta.len() > MAX_SOURCE_FILE_SIZE {
        return Err(DockgeError::validation(format!(
            "{} exceeds the maximum size of {} bytes",
            path.display(),
            MAX_SOURCE_FILE_SIZE
        )));
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DockgeError::Io(format!("{}: {}", path.display(), e)))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), DockgeError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = config.server.addr();

    println!("Starting Dockge HTTP server on {}", addr);
    println!("Stacks directory: {}", config.stacks_dir.display());
    println!();
    println!("Endpoints:");
    println!("  GET  /health");
    println!("  GET  /stacks");
    println!("  GET  /stacks/{{name}}");
    println!("  POST /stacks");
    println!("  POST /stacks/{{name}}/refresh");
    println!("  POST /stacks/{{name}}/{{action}}");
    println!("  POST /stacks/{{name}}/services/{{service}}/{{action}}");
    println!();

    dockge::api::run_server(&addr, build_registry(&config)).await
}

// =============================================================================
// INSPECTION COMMANDS
// =============================================================================

/// List every stack.
pub async fn cmd_list(config: &AppConfig, json_mode: bool) -> Result<(), DockgeError> {
    let registry = build_registry(config);
    let list = registry.stack_list(false).await?;
    let summaries: Vec<StackSummary> = list.values().map(Stack::summary).collect();

    if json_mode {
        print_json(&summaries);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No stacks in {}", config.stacks_dir.display());
    }
    for summary in &summaries {
        print_summary_line(summary);
    }
    Ok(())
}

/// Show one stack.
pub async fn cmd_show(config: &AppConfig, json_mode: bool, name: &str) -> Result<(), DockgeError> {
    let stack = build_registry(config).get_stack(name, false).await?;
    let data = stack.data();
    if json_mode {
        print_json(&data);
    } else {
        print_stack(&data);
    }
    Ok(())
}

/// Reconcile one stack, optionally with resource usage.
pub async fn cmd_refresh(
    config: &AppConfig,
    json_mode: bool,
    name: &str,
    stats: bool,
) -> Result<(), DockgeError> {
    let mut stack = build_registry(config).get_stack(name, false).await?;
    stack.update_data(stats).await;
    let data = stack.data();
    if json_mode {
        print_json(&data);
    } else {
        print_stack(&data);
    }
    Ok(())
}

// =============================================================================
// SAVE COMMAND
// =============================================================================

/// Save a stack from a compose file and an optional env file.
pub async fn cmd_save(
    config: &AppConfig,
    json_mode: bool,
    name: &str,
    file: &Path,
    env: Option<&Path>,
    add: bool,
) -> Result<(), DockgeError> {
    let compose_yaml = read_source(file).await?;
    let compose_env = match env {
        Some(path) => read_source(path).await?,
        None => String::new(),
    };

    let registry = build_registry(config);
    let mut stack = Stack::draft(registry.context().clone(), name, compose_yaml, compose_env);
    stack.save(add).await?;
    stack.update_data(false).await;

    if json_mode {
        print_json(&stack.summary());
    } else {
        println!("Saved stack {}", name);
    }
    Ok(())
}

// =============================================================================
// LIFECYCLE COMMANDS
// =============================================================================

/// Run a whole-stack action.
pub async fn cmd_stack_action(
    config: &AppConfig,
    json_mode: bool,
    name: &str,
    action: StackAction,
) -> Result<(), DockgeError> {
    tracing::info!(stack = %name, %action, "running stack action");
    let mut stack = build_registry(config).get_stack(name, false).await?;
    action.apply(&mut stack).await?;

    if action == StackAction::Delete {
        if json_mode {
            print_json(&serde_json::json!({ "ok": true, "msg": action.done_message() }));
        } else {
            println!("{} {}", action.done_message(), name);
        }
        return Ok(());
    }

    let data = stack.data();
    if json_mode {
        print_json(&data);
    } else {
        println!("{} {}", action.done_message(), name);
        print_stack(&data);
    }
    Ok(())
}

/// Run a single-service action.
pub async fn cmd_service_action(
    config: &AppConfig,
    json_mode: bool,
    name: &str,
    service: &str,
    action: ServiceAction,
) -> Result<(), DockgeError> {
    tracing::info!(stack = %name, service = %service, %action, "running service action");
    let mut stack = build_registry(config).get_stack(name, false).await?;
    action.apply(&mut stack, service).await?;

    let data = stack.data();
    if json_mode {
        print_json(&data);
    } else {
        println!("{} {}/{}", action, name, service);
        print_stack(&data);
    }
    Ok(())
}
