//! Execution gateway error types.

use thiserror::Error;

/// Result type for gate and gateway operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors that can occur while admitting or running a command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command string was empty or otherwise unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The command contains shell chaining/redirection characters.
    #[error("command contains forbidden characters (| & ; < >)")]
    ForbiddenChars,

    /// Whitelist enforcement was requested and no pattern matched.
    #[error("command is not on the whitelist")]
    NotWhitelisted,

    /// The process could not be spawned at all.
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    /// A container runtime command failed.
    #[error("container {command} failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Whitelist patterns failed to compile.
    #[error("invalid whitelist pattern: {0}")]
    BadPattern(#[from] regex::Error),

    /// Generic IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
