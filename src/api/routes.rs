//! REST endpoints for the onboarding service.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::client::{ClientIntake, ClientStatus};
use crate::engine::OnboardingEngine;
use crate::workflow::StepId;

use super::responses::{ApiError, ApiResponse};
use super::ws::ws_handler;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: OnboardingEngine,
}

/// Build the full router: REST routes plus the per-client WebSocket.
pub fn api_routes(engine: OnboardingEngine) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/workflow", get(get_workflow))
        .route("/api/onboarding/start", post(start_onboarding))
        .route("/api/onboarding/status/{client_id}", get(get_status))
        .route(
            "/api/onboarding/approve/{client_id}/{step_id}",
            post(approve_step),
        )
        .route("/api/onboarding/clients", get(list_clients))
        .route(
            "/api/onboarding/client/{client_id}",
            get(get_client).delete(delete_client),
        )
        .route("/ws/{client_id}", get(ws_handler))
        .with_state(state)
}

fn parse_client_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid client id: {raw}")))
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "clientflow",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Onboarding ──────────────────────────────────────────────────────────

/// GET /api/onboarding/workflow — the step catalogue shared by all clients.
async fn get_workflow(State(state): State<AppState>) -> impl IntoResponse {
    let steps = state.engine.definition().steps().to_vec();
    let total_steps = steps.len();
    Json(ApiResponse::ok(
        "Workflow definition retrieved",
        json!({ "steps": steps, "total_steps": total_steps }),
    ))
}

/// POST /api/onboarding/start
async fn start_onboarding(
    State(state): State<AppState>,
    Json(intake): Json<ClientIntake>,
) -> Result<impl IntoResponse, ApiError> {
    let (client, progress) = state.engine.start(intake).await?;
    info!(client_id = %client.id, "Onboarding started via API");
    Ok(Json(ApiResponse::ok(
        format!("Onboarding started successfully for {}", client.name),
        json!({ "client": client, "progress": progress }),
    )))
}

/// GET /api/onboarding/status/{client_id}
async fn get_status(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = parse_client_id(&client_id)?;
    let (client, progress) = state.engine.status(client_id).await?;

    let current_step_name = progress
        .steps
        .get(progress.current_step)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "Completed".to_string());

    Ok(Json(ApiResponse::ok(
        "Onboarding status retrieved successfully",
        json!({
            "client": client,
            "progress": progress,
            "current_step_name": current_step_name,
        }),
    )))
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    approved: bool,
    #[serde(default)]
    feedback: Option<String>,
}

/// POST /api/onboarding/approve/{client_id}/{step_id}
async fn approve_step(
    State(state): State<AppState>,
    Path((client_id, step_id)): Path<(String, String)>,
    Json(body): Json<ApproveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = parse_client_id(&client_id)?;
    let step = StepId::from_str(&step_id).map_err(|_| {
        ApiError::from(crate::error::Error::from(
            crate::error::WorkflowError::StepNotFound {
                client_id,
                step: step_id.clone(),
            },
        ))
    })?;

    state
        .engine
        .decide(client_id, step, body.approved, body.feedback.clone())
        .await?;

    let action = if body.approved { "approved" } else { "rejected" };
    info!(client_id = %client_id, step = %step, action, "Approval decision via API");
    Ok(Json(ApiResponse::ok(
        format!("Step {action} successfully"),
        json!({
            "client_id": client_id,
            "step_id": step,
            "approved": body.approved,
            "feedback": body.feedback,
        }),
    )))
}

// ── Clients ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    status: Option<ClientStatus>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    10
}

/// GET /api/onboarding/clients?status=&limit=&offset=
async fn list_clients(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit.clamp(1, 100);
    let page = state
        .engine
        .list(params.status, limit, params.offset)
        .await?;

    Ok(Json(ApiResponse::ok(
        format!("Retrieved {} clients", page.clients.len()),
        json!({
            "clients": page.clients,
            "total": page.total,
            "limit": limit,
            "offset": params.offset,
            "has_more": params.offset + limit < page.total,
        }),
    )))
}

/// GET /api/onboarding/client/{client_id}
async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = parse_client_id(&client_id)?;
    let (client, progress) = state.engine.status(client_id).await?;
    Ok(Json(ApiResponse::ok(
        "Client information retrieved successfully",
        json!({ "client": client, "progress": progress }),
    )))
}

/// DELETE /api/onboarding/client/{client_id}
async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = parse_client_id(&client_id)?;
    let client = state.engine.delete(client_id).await?;
    Ok(Json(ApiResponse::ok(
        format!("Client {} deleted successfully", client.name),
        json!({ "client_id": client_id }),
    )))
}
