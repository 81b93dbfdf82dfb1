//! termgate: a localhost gateway that suggests shell commands via the
//! Gemini API and executes operator-approved commands in a persistent
//! container (or directly on the host).
//!
//! Bearer-token gated, loopback-only by default, single user.

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod suggest;

pub use api::{AppState, create_router, executor_from_config};
pub use config::AppConfig;
pub use error::{ApiError, ApiResult, ErrorResponse};
