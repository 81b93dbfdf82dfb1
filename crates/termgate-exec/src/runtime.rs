//! Container runtime client.
//!
//! Drives the Docker or Podman CLI over `tokio::process`. Only the small
//! surface the gateway needs is exposed: a health probe, container state
//! inspection, start, and create. All names are validated before they are
//! placed on an argument vector.

use std::process::Stdio;

use tokio::process::Command;

use crate::error::{ExecError, ExecResult};

/// Container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    /// Binary name for this runtime.
    pub fn binary(&self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

/// Validate a container name before it is interpolated into an argv.
///
/// Runtime names are alphanumeric plus `-` `_` `.`, max 128 chars.
pub(crate) fn validate_container_name(name: &str) -> ExecResult<()> {
    if name.is_empty() {
        return Err(ExecError::InvalidInput(
            "container name cannot be empty".to_string(),
        ));
    }
    if name.len() > 128 {
        return Err(ExecError::InvalidInput(
            "container name exceeds maximum length".to_string(),
        ));
    }
    let valid = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.';
    if !name.chars().all(valid) {
        return Err(ExecError::InvalidInput(format!(
            "container name '{name}' contains invalid characters"
        )));
    }
    Ok(())
}

/// Validate an image reference (`registry/repo:tag`).
pub(crate) fn validate_image_name(image: &str) -> ExecResult<()> {
    if image.is_empty() {
        return Err(ExecError::InvalidInput(
            "image name cannot be empty".to_string(),
        ));
    }
    if image.len() > 256 {
        return Err(ExecError::InvalidInput(
            "image name exceeds maximum length".to_string(),
        ));
    }
    let valid = |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '@')
    };
    if !image.chars().all(valid) {
        return Err(ExecError::InvalidInput(format!(
            "image name '{image}' contains invalid characters"
        )));
    }
    Ok(())
}

/// Client for a docker/podman CLI.
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    runtime_type: RuntimeType,
    binary: String,
}

impl Default for ContainerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerRuntime {
    /// Create a runtime client with auto-detection.
    ///
    /// Docker is preferred; Podman is the fallback. If neither is on PATH
    /// the client is still constructed and every call fails downstream.
    pub fn new() -> Self {
        if Self::is_binary_available("docker") {
            Self::with_type(RuntimeType::Docker)
        } else {
            Self::with_type(RuntimeType::Podman)
        }
    }

    /// Create a runtime client of a specific type.
    pub fn with_type(runtime_type: RuntimeType) -> Self {
        Self {
            binary: runtime_type.binary().to_string(),
            runtime_type,
        }
    }

    /// Create a runtime client with a custom binary path.
    pub fn with_binary(runtime_type: RuntimeType, binary: impl Into<String>) -> Self {
        Self {
            runtime_type,
            binary: binary.into(),
        }
    }

    /// Runtime type in use.
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    /// Binary this client invokes.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn is_binary_available(name: &str) -> bool {
        std::process::Command::new("which")
            .arg(name)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn run_runtime(&self, verb: &str, args: &[String]) -> ExecResult<std::process::Output> {
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExecError::CommandFailed {
                command: verb.to_string(),
                message: e.to_string(),
            })
    }

    /// Check that the runtime daemon is reachable.
    pub async fn health_check(&self) -> ExecResult<String> {
        let args = vec![
            "version".to_string(),
            "--format".to_string(),
            "json".to_string(),
        ];
        let output = self.run_runtime("version", &args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecError::CommandFailed {
                command: "version".to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Container state status (e.g. "running", "exited") via `inspect`.
    ///
    /// Returns `Ok(None)` when the container does not exist.
    pub async fn state_status(&self, name: &str) -> ExecResult<Option<String>> {
        validate_container_name(name)?;

        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{.State.Status}}".to_string(),
            name.to_string(),
        ];
        let output = self.run_runtime("inspect", &args).await?;

        if !output.status.success() {
            // Container not found is not an error; callers treat it as missing.
            return Ok(None);
        }

        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }

    /// Start a stopped container. Idempotent when already running.
    pub async fn start(&self, name: &str) -> ExecResult<()> {
        validate_container_name(name)?;

        let args = vec!["start".to_string(), name.to_string()];
        let output = self.run_runtime("start", &args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecError::CommandFailed {
                command: "start".to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    /// Create a detached interactive container running the given command.
    ///
    /// Equivalent of `docker run -dit --name <name> <image> <command...>`.
    /// Returns the new container ID.
    pub async fn create_interactive(
        &self,
        name: &str,
        image: &str,
        command: &[String],
    ) -> ExecResult<String> {
        validate_container_name(name)?;
        validate_image_name(image)?;

        let mut args: Vec<String> = vec![
            "run".to_string(),
            "-dit".to_string(),
            "--name".to_string(),
            name.to_string(),
            image.to_string(),
        ];
        args.extend(command.iter().cloned());

        let output = self.run_runtime("run", &args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecError::CommandFailed {
                command: "run".to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_validation() {
        assert!(validate_container_name("powershell-container").is_ok());
        assert!(validate_container_name("box_1.2").is_ok());
        assert!(validate_container_name("").is_err());
        assert!(validate_container_name("bad name").is_err());
        assert!(validate_container_name("evil;rm").is_err());
        assert!(validate_container_name(&"x".repeat(129)).is_err());
    }

    #[test]
    fn image_name_validation() {
        assert!(validate_image_name("mcr.microsoft.com/powershell").is_ok());
        assert!(validate_image_name("alpine:3.20").is_ok());
        assert!(validate_image_name("img@sha256:abcd").is_ok());
        assert!(validate_image_name("").is_err());
        assert!(validate_image_name("bad image").is_err());
        assert!(validate_image_name("img$(touch x)").is_err());
    }

    #[test]
    fn explicit_runtime_type_selects_binary() {
        let rt = ContainerRuntime::with_type(RuntimeType::Podman);
        assert_eq!(rt.binary(), "podman");
        assert_eq!(rt.runtime_type(), RuntimeType::Podman);
    }
}
