//! One-shot container bootstrap.
//!
//! Runs to completion before the listener binds, so requests never race
//! a half-prepared target. Best-effort throughout: every failure is
//! logged and downgraded, never fatal to startup. Execution requests
//! simply fail downstream if the target is missing.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use termgate_exec::{ContainerRuntime, ExecResult};

use crate::config::ExecConfig;

/// Upper bound for the whole bootstrap sequence (image pulls included).
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(60);

/// What the bootstrap sequence did.
#[derive(Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The container already existed and was (re)started.
    StartedExisting,
    /// A fresh container was created; carries the new container ID.
    Created(String),
}

/// Ensure the execution container exists and is running.
///
/// Single attempt, no retries. Logs the outcome and swallows errors.
pub async fn ensure_container(runtime: &ContainerRuntime, exec: &ExecConfig) {
    info!(
        runtime = %runtime.runtime_type(),
        container = %exec.container,
        "checking container runtime"
    );

    match timeout(BOOTSTRAP_TIMEOUT, bootstrap(runtime, exec)).await {
        Ok(Ok(BootstrapOutcome::StartedExisting)) => {
            info!(container = %exec.container, "existing container started");
        }
        Ok(Ok(BootstrapOutcome::Created(id))) => {
            info!(container = %exec.container, id = %id, "container created and running");
        }
        Ok(Err(err)) => {
            warn!(
                container = %exec.container,
                error = %err,
                "container bootstrap failed; execution requests will fail until the runtime is available"
            );
        }
        Err(_) => {
            warn!(
                container = %exec.container,
                "container bootstrap timed out after {}s",
                BOOTSTRAP_TIMEOUT.as_secs()
            );
        }
    }
}

async fn bootstrap(runtime: &ContainerRuntime, exec: &ExecConfig) -> ExecResult<BootstrapOutcome> {
    runtime.health_check().await?;

    match runtime.state_status(&exec.container).await? {
        Some(status) => {
            // `start` is idempotent when the container is already running.
            info!(container = %exec.container, %status, "container exists");
            runtime.start(&exec.container).await?;
            Ok(BootstrapOutcome::StartedExisting)
        }
        None => {
            // Interactive keeps the shell alive so `exec` has a live target.
            let interpreter: Vec<String> = exec.shell.iter().take(1).cloned().collect();
            let id = runtime
                .create_interactive(&exec.container, &exec.image, &interpreter)
                .await?;
            Ok(BootstrapOutcome::Created(id))
        }
    }
}
