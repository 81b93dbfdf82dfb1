//! HTTP API module.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, executor_from_config};
