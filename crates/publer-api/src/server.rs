//! Axum server and routes.

use crate::accounts;
use crate::auth::Credentials;
use crate::config::Config;
use crate::error::ToolError;
use crate::monitoring;
use crate::tools;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use publer_jobs::JobTracker;
use publer_types::Forwarder;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub tracker: JobTracker,
    pub config: Config,
}

impl AppState {
    pub fn new(forwarder: Arc<dyn Forwarder>, config: Config) -> Self {
        Self {
            tracker: JobTracker::new(forwarder),
            config,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tools/schedule_post", post(handle_schedule_post))
        .route("/tools/optimal_time_scheduler", post(handle_optimal_time))
        .route("/tools/check_job_status", post(handle_check_job_status))
        .route("/tools/wait_for_job", post(handle_wait_for_job))
        .route("/tools/poll_batch", post(handle_poll_batch))
        .route("/tools/monitor_recent_jobs", post(handle_monitor_recent_jobs))
        .route("/tools/check_account_status", post(handle_check_account_status))
        .route("/tools/list_connected_platforms", post(handle_list_connected_platforms))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ToolError> {
    payload.map(|Json(req)| req).map_err(|e| {
        ToolError::validation(
            format!("Invalid request body: {}", e.body_text()),
            "Send a JSON object with the tool's parameters",
        )
    })
}

/// Tool failures are answered in-band with HTTP 200.
fn respond(tool: &'static str, result: Result<Value, ToolError>) -> Json<Value> {
    match result {
        Ok(value) => Json(value),
        Err(e) => {
            tracing::warn!(tool, status = e.status(), error = %e, "tool call failed");
            Json(e.to_json())
        }
    }
}

async fn handle_schedule_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<tools::SchedulePostRequest>, JsonRejection>,
) -> Json<Value> {
    let creds = Credentials::from_headers(&headers);
    let result = match body(payload) {
        Ok(req) => tools::schedule_post(&state, &creds, req).await,
        Err(e) => Err(e),
    };
    respond("schedule_post", result)
}

async fn handle_optimal_time(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<tools::OptimalTimeRequest>, JsonRejection>,
) -> Json<Value> {
    let creds = Credentials::from_headers(&headers);
    let result = match body(payload) {
        Ok(req) => tools::optimal_time_scheduler(&state, &creds, req).await,
        Err(e) => Err(e),
    };
    respond("optimal_time_scheduler", result)
}

async fn handle_check_job_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<tools::JobRequest>, JsonRejection>,
) -> Json<Value> {
    let creds = Credentials::from_headers(&headers);
    let result = match body(payload) {
        Ok(req) => tools::check_job_status(&state, &creds, req).await,
        Err(e) => Err(e),
    };
    respond("check_job_status", result)
}

async fn handle_wait_for_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<tools::JobRequest>, JsonRejection>,
) -> Json<Value> {
    let creds = Credentials::from_headers(&headers);
    let result = match body(payload) {
        Ok(req) => tools::wait_for_job(&state, &creds, req).await,
        Err(e) => Err(e),
    };
    respond("wait_for_job", result)
}

async fn handle_poll_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<tools::BatchRequest>, JsonRejection>,
) -> Json<Value> {
    let creds = Credentials::from_headers(&headers);
    let result = match body(payload) {
        Ok(req) => tools::poll_batch(&state, &creds, req).await,
        Err(e) => Err(e),
    };
    respond("poll_batch", result)
}

async fn handle_monitor_recent_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<monitoring::MonitorRequest>, JsonRejection>,
) -> Json<Value> {
    let creds = Credentials::from_headers(&headers);
    let result = match body(payload) {
        Ok(req) => monitoring::monitor_recent_jobs(&state, &creds, req).await,
        Err(e) => Err(e),
    };
    respond("monitor_recent_jobs", result)
}

async fn handle_check_account_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<tools::WorkspaceRequest>, JsonRejection>,
) -> Json<Value> {
    let creds = Credentials::from_headers(&headers);
    match body(payload) {
        Ok(req) => Json(
            accounts::check_account_status(&state, &creds, req.workspace_id.as_deref()).await,
        ),
        Err(e) => respond("check_account_status", Err(e)),
    }
}

async fn handle_list_connected_platforms(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<tools::WorkspaceRequest>, JsonRejection>,
) -> Json<Value> {
    let creds = Credentials::from_headers(&headers);
    match body(payload) {
        Ok(req) => Json(
            accounts::list_connected_platforms(&state, &creds, req.workspace_id.as_deref()).await,
        ),
        Err(e) => respond("list_connected_platforms", Err(e)),
    }
}

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "publer-mcp" }))
}
