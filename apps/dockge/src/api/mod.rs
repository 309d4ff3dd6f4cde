//! # Dockge HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /stacks` - List every stack
//! - `GET /stacks/{name}` - Full data of one stack
//! - `POST /stacks` - Save a stack, optionally deploying it
//! - `POST /stacks/{name}/refresh` - Reconcile with resource usage
//! - `POST /stacks/{name}/{action}` - deploy, start, stop, restart, down,
//!   update, delete, check-updates
//! - `POST /stacks/{name}/services/{service}/{action}` - start, stop,
//!   restart, recreate, update, ignore-update
//!
//! ## Configuration (Environment Variables)
//!
//! - `DOCKGE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

pub use handlers::{
    error_status, get_handler, health_handler, list_handler, refresh_handler, save_handler,
    service_action_handler, stack_action_handler,
};
pub use types::{ApiResponse, HealthResponse, SaveStackRequest};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use dockge_core::{DockgeError, StackRegistry};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StackRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: StackRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `DOCKGE_CORS_ORIGINS`.
///
/// - "*": allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("DOCKGE_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (DOCKGE_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in DOCKGE_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => build_localhost_cors(),
    }
}

/// Localhost origins on the dev frontend port and the default server port.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:5000",
        "http://localhost:5001",
        "http://127.0.0.1:5000",
        "http://127.0.0.1:5001",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/stacks",
            get(handlers::list_handler).post(handlers::save_handler),
        )
        .route("/stacks/{name}", get(handlers::get_handler))
        .route("/stacks/{name}/refresh", post(handlers::refresh_handler))
        .route("/stacks/{name}/{action}", post(handlers::stack_action_handler))
        .route(
            "/stacks/{name}/services/{service}/{action}",
            post(handlers::service_action_handler),
        )
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, registry: StackRegistry) -> Result<(), DockgeError> {
    let router = create_router(AppState::new(registry));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DockgeError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Dockge HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| DockgeError::Io(format!("Server error: {}", e)))
}
