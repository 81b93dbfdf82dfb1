//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use termgate_exec::{
    CommandGate, ContainerRuntime, ExecBackend, ExecResult, ExecTarget, Executor,
};

use crate::config::{AppConfig, ExecConfig};
use crate::suggest::SuggestClient;

/// Immutable per-process state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub gate: CommandGate,
    pub executor: Arc<dyn ExecBackend>,
    pub suggest: SuggestClient,
}

impl AppState {
    /// Build state from configuration and an execution backend.
    ///
    /// The backend is injected so tests can substitute a stub for the
    /// process-spawning gateway.
    pub fn new(config: AppConfig, executor: Arc<dyn ExecBackend>) -> Result<Self> {
        let gate = CommandGate::new(&config.exec.whitelist)?;
        let suggest = SuggestClient::new(&config.gemini)?;
        Ok(Self {
            config,
            gate,
            executor,
            suggest,
        })
    }
}

/// Build the real execution gateway for the configured target.
pub fn executor_from_config(exec: &ExecConfig, runtime: ContainerRuntime) -> ExecResult<Executor> {
    let target = if exec.local {
        ExecTarget::Local
    } else {
        ExecTarget::Container {
            runtime,
            name: exec.container.clone(),
        }
    };

    Ok(Executor::new(target, exec.shell.clone())?
        .with_timeout(Duration::from_secs(exec.timeout_secs))
        .with_max_output_bytes(exec.max_output_bytes))
}
