//! API route definitions.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::auth_middleware;

use super::handlers;
use super::state::AppState;

/// Create the application router.
///
/// `/health` stays outside the auth layer; everything else requires the
/// bearer token.
pub fn create_router(state: Arc<AppState>) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let protected_routes = Router::new()
        .route("/suggest", post(handlers::suggest))
        .route("/exec", post(handlers::exec))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(trace_layer)
        .with_state(state)
}
