//! Route handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use termgate_exec::ExecOutcome;

use crate::error::{ApiError, ApiResult};

use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint. Unauthenticated.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Suggestion response: opaque text for a human to review.
#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub ok: bool,
    pub raw: String,
}

/// Ask the upstream API for command suggestions. Never executes.
///
/// Bodies are validated by hand so a missing or non-string `prompt` is a
/// plain 400, checked before any network I/O happens.
#[instrument(skip_all)]
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<SuggestResponse>> {
    let prompt = body
        .get("prompt")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("prompt must be a string".to_string()))?;

    if prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must be non-empty".to_string()));
    }

    let raw = state
        .suggest
        .suggest(prompt)
        .await
        .map_err(|err| ApiError::Upstream(format!("{err:#}")))?;

    Ok(Json(SuggestResponse { ok: true, raw }))
}

/// Execute a command against the configured target.
///
/// The gate runs first; only admitted commands reach the gateway. A
/// non-zero exit, timeout or truncated capture comes back as HTTP 200
/// with `ok: false` so the caller can still inspect partial output.
#[instrument(skip_all)]
pub async fn exec(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<ExecOutcome>> {
    let command = body
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::BadRequest("command must be a string".to_string()))?;

    let require_whitelist = body
        .get("require_whitelist")
        .or_else(|| body.get("requireWhitelist"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    state.gate.check(command, require_whitelist)?;

    info!(require_whitelist, "executing command");
    let outcome = state.executor.run(command).await?;

    Ok(Json(outcome))
}
