//! # API Endpoint Handlers

use super::{
    AppState,
    types::{ApiResponse, HealthResponse, SaveStackRequest},
};
use crate::actions::{ServiceAction, StackAction};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use dockge_core::{DockgeError, Stack};

type ApiResult = (StatusCode, Json<ApiResponse>);

/// HTTP status for an engine error.
pub fn error_status(err: &DockgeError) -> StatusCode {
    match err {
        DockgeError::Validation(_) => StatusCode::BAD_REQUEST,
        DockgeError::NotFound(_) => StatusCode::NOT_FOUND,
        DockgeError::Schema(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DockgeError::Operation { .. }
        | DockgeError::Runtime(_)
        | DockgeError::Serialization(_)
        | DockgeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: &DockgeError) -> ApiResult {
    (error_status(err), Json(ApiResponse::error(err.to_string())))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// LISTING
// =============================================================================

/// Summaries of every managed and runtime-only stack.
pub async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.registry.stack_list(false).await {
        Ok(list) => {
            let stacks = list.values().map(Stack::summary).collect();
            (StatusCode::OK, Json(ApiResponse::with_stacks(stacks)))
        }
        Err(e) => failure(&e),
    }
}

/// Full data of one stack.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_stack(&name, false).await {
        Ok(stack) => (
            StatusCode::OK,
            Json(ApiResponse {
                ok: true,
                stack: Some(stack.data()),
                ..ApiResponse::default()
            }),
        ),
        Err(e) => failure(&e),
    }
}

/// Reconcile a stack with stats included.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_stack(&name, false).await {
        Ok(mut stack) => {
            stack.update_data(true).await;
            (
                StatusCode::OK,
                Json(ApiResponse::success("Refreshed").with_stack(stack.data())),
            )
        }
        Err(e) => failure(&e),
    }
}

// =============================================================================
// SAVE HANDLER
// =============================================================================

/// Validate and write a stack, then deploy it if requested.
pub async fn save_handler(
    State(state): State<AppState>,
    Json(request): Json<SaveStackRequest>,
) -> impl IntoResponse {
    let mut stack = Stack::draft(
        state.registry.context().clone(),
        request.name,
        request.compose_yaml,
        request.compose_env,
    );

    if let Err(e) = stack.save(request.is_add).await {
        return failure(&e);
    }
    state.registry.invalidate();

    if request.deploy {
        if let Err(e) = stack.deploy().await {
            return failure(&e);
        }
        return (
            StatusCode::OK,
            Json(ApiResponse::success("Deployed").with_stack(stack.data())),
        );
    }

    stack.update_data(false).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success("Saved").with_stack(stack.data())),
    )
}

// =============================================================================
// LIFECYCLE HANDLERS
// =============================================================================

/// Run a whole-stack action.
pub async fn stack_action_handler(
    State(state): State<AppState>,
    Path((name, action)): Path<(String, String)>,
) -> impl IntoResponse {
    let Some(action) = StackAction::parse(&action) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Unknown action: {}", action))),
        );
    };

    let mut stack = match state.registry.get_stack(&name, false).await {
        Ok(stack) => stack,
        Err(e) => return failure(&e),
    };

    if let Err(e) = action.apply(&mut stack).await {
        return failure(&e);
    }

    if action == StackAction::Delete {
        state.registry.invalidate();
        return (StatusCode::OK, Json(ApiResponse::success(action.done_message())));
    }
    (
        StatusCode::OK,
        Json(ApiResponse::success(action.done_message()).with_stack(stack.data())),
    )
}

/// Run a single-service action.
pub async fn service_action_handler(
    State(state): State<AppState>,
    Path((name, service, action)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let Some(action) = ServiceAction::parse(&action) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Unknown action: {}", action))),
        );
    };

    let mut stack = match state.registry.get_stack(&name, false).await {
        Ok(stack) => stack,
        Err(e) => return failure(&e),
    };

    match action.apply(&mut stack, &service).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(format!("{} {}", action, service)).with_stack(stack.data())),
        ),
        Err(e) => failure(&e),
    }
}
