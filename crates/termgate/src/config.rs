//! Application configuration.
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `TERMGATE_*` environment variables (`__` separates nested keys, e.g.
//! `TERMGATE_SERVER__PORT`). Loaded once at startup and never mutated;
//! handlers see it through `Arc<AppState>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use termgate_exec::default_whitelist;

const ENV_PREFIX: &str = "TERMGATE";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub exec: ExecConfig,
}

/// HTTP listener settings. Binds to loopback unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request body ceiling in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Shared-secret bearer auth. One token, exact-equality comparison.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub token: String,
}

/// Upstream text-generation API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

/// Execution target settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Name of the long-lived container commands run in.
    #[serde(default = "default_container")]
    pub container: String,
    /// Image used when the container has to be created.
    #[serde(default = "default_image")]
    pub image: String,
    /// Interpreter plus command flag; the command string is appended as
    /// one further argument.
    #[serde(default = "default_shell")]
    pub shell: Vec<String>,
    /// Run on the host instead of in the container.
    #[serde(default)]
    pub local: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Case-insensitive command patterns. Empty disables enforcement.
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<String>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            image: default_image(),
            shell: default_shell(),
            local: false,
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            whitelist: default_whitelist(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_max_body_bytes() -> usize {
    200 * 1024
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_container() -> String {
    "powershell-container".to_string()
}

fn default_image() -> String {
    "mcr.microsoft.com/powershell".to_string()
}

fn default_shell() -> Vec<String> {
    vec!["pwsh".to_string(), "-Command".to_string()]
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_max_output_bytes() -> usize {
    5 * 1024 * 1024
}

/// Default config file location (`$XDG_CONFIG_HOME/termgate/config.toml`).
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("termgate").join("config.toml"))
}

/// Load configuration from an optional file path plus the environment.
///
/// An explicitly given file must exist; the default location is optional.
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }
        None => {
            if let Some(default) = default_config_file() {
                builder = builder.add_source(
                    File::from(default)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }
    }

    let built = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .context("building configuration")?;

    built
        .try_deserialize()
        .context("invalid configuration")
}
