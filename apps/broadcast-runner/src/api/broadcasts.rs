//! Broadcast trigger and status endpoints

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use domain_broadcasts::{BroadcastError, RunSummary, StatusSnapshot};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/run", post(trigger_run))
        .route("/status", get(broadcast_status))
        .with_state(state)
}

/// Optional trigger body restricting the run to one campaign
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub campaign_id: Option<Uuid>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct RunResults {
    pub broadcasts_processed: u64,
    pub total_sent: u64,
    pub total_failed: u64,
    pub total_skipped: u64,
    pub broadcasts_completed: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunResponse {
    pub success: bool,
    pub results: RunResults,
    pub timestamp: DateTime<Utc>,
}

impl From<RunSummary> for RunResponse {
    fn from(summary: RunSummary) -> Self {
        Self {
            success: true,
            results: RunResults {
                broadcasts_processed: summary.broadcasts_processed,
                total_sent: summary.total_sent,
                total_failed: summary.total_failed,
                total_skipped: summary.total_skipped,
                broadcasts_completed: summary.broadcasts_completed,
                errors: summary.errors,
            },
            timestamp: summary.timestamp,
        }
    }
}

/// Maps domain errors onto HTTP status codes
pub struct ApiError(BroadcastError);

impl From<BroadcastError> for ApiError {
    fn from(e: BroadcastError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BroadcastError::CampaignNotFound(_) => StatusCode::NOT_FOUND,
            BroadcastError::InvalidStatus { .. } | BroadcastError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            BroadcastError::Database(_)
            | BroadcastError::Provider(_)
            | BroadcastError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "success": false,
            "error": self.0.to_string(),
            "timestamp": Utc::now(),
        }));

        (status, body).into_response()
    }
}

/// Trigger a processing run
///
/// Campaigns that fail mid-run are reported in `results.errors`; the run
/// itself still returns 200. Only a run that aborts outright maps to 500.
#[utoipa::path(
    post,
    path = "/run",
    tag = "broadcasts",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Run completed", body = RunResponse),
        (status = 401, description = "Missing or invalid trigger token"),
        (status = 500, description = "Run aborted outright", body = RunResponse)
    )
)]
async fn trigger_run(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }

    // The body is optional; an empty one triggers a full run.
    let request = if body.is_empty() {
        RunRequest::default()
    } else {
        match serde_json::from_slice::<RunRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "success": false,
                        "error": format!("Invalid request body: {}", e),
                    })),
                )
                    .into_response();
            }
        }
    };

    match state.runner.run_once(request.campaign_id).await {
        Ok(summary) => Json(RunResponse::from(summary)).into_response(),
        Err(e) => {
            // Run-level failure: nothing was processed, so the body still
            // carries the response shape with the fatal error in `errors`.
            let response = RunResponse {
                success: false,
                results: RunResults {
                    errors: vec![e.to_string()],
                    ..Default::default()
                },
                timestamp: Utc::now(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// Report the processing backlog and configured limits
#[utoipa::path(
    get,
    path = "/status",
    tag = "broadcasts",
    responses(
        (status = 200, description = "Current backlog snapshot", body = StatusSnapshot),
        (status = 500, description = "Snapshot query failed")
    )
)]
async fn broadcast_status(
    State(state): State<AppState>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    let snapshot = state.runner.status().await?;
    Ok(Json(snapshot))
}

/// Exact-match bearer token check. An unconfigured token disables the
/// check; production refuses to start that way (see `Config::from_env`).
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = state.config.trigger_token.as_deref() else {
        return Ok(());
    };

    match extract_bearer(headers) {
        Some(token) if token == expected => Ok(()),
        _ => {
            warn!("Rejected broadcast trigger with a missing or invalid token");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"success": false, "error": "Unauthorized"})),
            )
                .into_response())
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
}
