//! Bearer-token authentication middleware.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::AppState;
use crate::error::ApiError;

/// Gate every protected route behind the shared secret.
///
/// Missing or malformed header: 401. Present but wrong token: 403. The
/// comparison is exact string equality against the configured secret;
/// there is no rate limiting and no lockout, each request stands alone.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;

    if token != state.config.auth.token {
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(request).await)
}
