//! Configuration loading and config file resolution
//!
//! Config file path priority:
//! 1. Command-line argument (highest priority)
//! 2. `WRITEAID_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/writeaid/config.toml`)
//! 4. Compiled defaults (no file)
//!
//! A missing or unreadable file never aborts startup: compiled defaults are
//! used and the origin is reported through [`ConfigOrigin::log`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WRITEAID_CONFIG";

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Parsed from this file
    File(PathBuf),
    /// No file found; compiled defaults
    Defaults,
    /// A file was found but could not be used; compiled defaults
    Fallback { path: PathBuf, reason: String },
}

impl ConfigOrigin {
    /// Log the origin (call after the subscriber is installed)
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigOrigin::Defaults => info!("No config file found, using compiled defaults"),
            ConfigOrigin::Fallback { path, reason } => warn!(
                "Ignoring config file {}: {}. Using compiled defaults.",
                path.display(),
                reason
            ),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

/// Upstream analysis service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL all API paths are appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Human-facing page a session id is appended to
    #[serde(default = "default_session_url_base")]
    pub session_url_base: String,

    /// Client identifier sent on session creation
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Data source identifier sent on session creation
    #[serde(default = "default_data_source")]
    pub data_source: String,

    /// Named prompt selected by the command string
    #[serde(default = "default_prompt_name")]
    pub prompt_name: String,

    /// Author whose style the analysis targets
    #[serde(default = "default_author")]
    pub author: String,

    /// Total per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_url_base: default_session_url_base(),
            client_id: default_client_id(),
            data_source: default_data_source(),
            prompt_name: default_prompt_name(),
            author: default_author(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://finchat-api.adgo.dev".to_string()
}

fn default_session_url_base() -> String {
    "https://finchat.adgo.dev/".to_string()
}

fn default_client_id() -> String {
    "parsec-backtesting".to_string()
}

fn default_data_source() -> String {
    "alpha_vantage".to_string()
}

fn default_prompt_name() -> String {
    "write-aid-1".to_string()
}

fn default_author() -> String {
    "EB White".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

/// Per-sentence session workflow timing and retry bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Sleep between session status checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Emit a progress log line every N status checks
    #[serde(default = "default_log_every_checks")]
    pub log_every_checks: u32,

    /// Attempts to read a result id from the latest chat message
    #[serde(default = "default_result_id_attempts")]
    pub result_id_attempts: u32,

    #[serde(default = "default_result_id_retry")]
    pub result_id_retry_secs: u64,

    /// Attempts to fetch the analysis payload
    #[serde(default = "default_result_fetch_attempts")]
    pub result_fetch_attempts: u32,

    #[serde(default = "default_result_fetch_retry")]
    pub result_fetch_retry_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            log_every_checks: default_log_every_checks(),
            result_id_attempts: default_result_id_attempts(),
            result_id_retry_secs: default_result_id_retry(),
            result_fetch_attempts: default_result_fetch_attempts(),
            result_fetch_retry_secs: default_result_fetch_retry(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_log_every_checks() -> u32 {
    5
}

fn default_result_id_attempts() -> u32 {
    5
}

fn default_result_id_retry() -> u64 {
    15
}

fn default_result_fetch_attempts() -> u32 {
    3
}

fn default_result_fetch_retry() -> u64 {
    5
}

/// Paragraph fan-out settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Concurrent sentence workflows for context-free passes
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound accepted for `reprocessing_rounds`
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_rounds: default_max_rounds(),
        }
    }
}

fn default_concurrency() -> usize {
    3
}

fn default_max_rounds() -> u32 {
    5
}

/// Job store lifecycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Seconds a finished job stays queryable
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    60
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "writeaid_svc=info,tower_http=info".to_string()
}

impl TomlConfig {
    /// Load configuration from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read TOML failed ({}): {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file and load it, falling back to defaults
    ///
    /// Never fails: unreadable or invalid files yield compiled defaults and
    /// a [`ConfigOrigin::Fallback`] the caller reports once logging is up.
    pub fn load_or_default(cli_arg: Option<&Path>) -> (Self, ConfigOrigin) {
        let Some(path) = resolve_config_path(cli_arg) else {
            return (Self::default(), ConfigOrigin::Defaults);
        };

        match Self::load(&path) {
            Ok(config) => (config, ConfigOrigin::File(path)),
            Err(e) => (
                Self::default(),
                ConfigOrigin::Fallback {
                    path,
                    reason: e.to_string(),
                },
            ),
        }
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.concurrency == 0 {
            return Err(Error::Config(
                "orchestrator.concurrency must be at least 1".to_string(),
            ));
        }
        if self.workflow.result_id_attempts == 0 || self.workflow.result_fetch_attempts == 0 {
            return Err(Error::Config(
                "workflow retry attempts must be at least 1".to_string(),
            ));
        }
        if self.workflow.log_every_checks == 0 {
            return Err(Error::Config(
                "workflow.log_every_checks must be at least 1".to_string(),
            ));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(Error::Config("upstream.base_url is empty".to_string()));
        }
        Ok(())
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))
    }
}

/// Resolve which config file to read, if any
///
/// An explicit CLI or environment path is returned even if it does not
/// exist, so the caller can report it; the platform default is only
/// returned when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Platform config file location (`~/.config/writeaid/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("writeaid").join("config.toml"))
}

/// Write configuration to disk, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_toml_string()?)?;
    Ok(())
}
