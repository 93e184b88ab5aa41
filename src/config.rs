//! Configuration handling for the dashboard server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::error::{DashboardError, DbResult};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8501;
pub const DEFAULT_SQLITE_FILE: &str = "student.db";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Memoised database handles are rebuilt after this long.
pub const DEFAULT_HANDLE_TTL_SECS: u64 = 2 * 60 * 60;

/// Sessions untouched for this long are dropped.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 60 * 60;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

// Inference service defaults
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_AGENT_MAX_STEPS: u32 = 15;

/// Connection pool settings shared by every handle the provider builds.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl PoolOptions {
    /// Max connections for the given backend. SQLite handles stay single-connection.
    pub fn max_connections_for(&self, is_sqlite: bool) -> u32 {
        if is_sqlite {
            DEFAULT_MAX_CONNECTIONS_SQLITE
        } else {
            self.max_connections
        }
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

/// Settings for the hosted chat-completion API backing the SQL agent.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_steps: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            max_steps: DEFAULT_AGENT_MAX_STEPS,
        }
    }
}

/// Configuration for the dashboard server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-chat-dashboard",
    about = "Chat with a SQLite or MySQL database through an LLM agent",
    version,
    author
)]
pub struct Config {
    /// Embedded SQLite file. Relative paths resolve against the executable's directory.
    #[arg(
        long = "sqlite-file",
        value_name = "PATH",
        default_value = DEFAULT_SQLITE_FILE,
        env = "DASHBOARD_SQLITE_FILE"
    )]
    pub sqlite_file: PathBuf,

    /// HTTP host to bind to
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "DASHBOARD_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "DASHBOARD_HTTP_PORT")]
    pub http_port: u16,

    /// Server-wide API key for the inference service.
    /// Sessions may supply their own key instead.
    #[arg(long = "llm-api-key", env = "GROQ_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible chat-completion API
    #[arg(long, default_value = DEFAULT_LLM_BASE_URL, env = "DASHBOARD_LLM_BASE_URL")]
    pub llm_base_url: String,

    /// Model name passed to the chat-completion API
    #[arg(long, default_value = DEFAULT_LLM_MODEL, env = "DASHBOARD_LLM_MODEL")]
    pub llm_model: String,

    /// Request timeout for the inference service in seconds
    #[arg(long, default_value_t = DEFAULT_LLM_TIMEOUT_SECS, env = "DASHBOARD_LLM_TIMEOUT")]
    pub llm_timeout: u64,

    /// Maximum agent reasoning steps per question
    #[arg(long, default_value_t = DEFAULT_AGENT_MAX_STEPS, env = "DASHBOARD_AGENT_MAX_STEPS")]
    pub agent_max_steps: u32,

    /// Lifetime of a memoised database handle in seconds
    #[arg(long, default_value_t = DEFAULT_HANDLE_TTL_SECS, env = "DASHBOARD_HANDLE_TTL")]
    pub handle_ttl: u64,

    /// Idle time in seconds after which a chat session is dropped
    #[arg(long, default_value_t = DEFAULT_SESSION_IDLE_SECS, env = "DASHBOARD_SESSION_IDLE")]
    pub session_idle: u64,

    /// Query timeout in seconds
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_SECS, env = "DASHBOARD_QUERY_TIMEOUT")]
    pub query_timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "DASHBOARD_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Maximum pooled connections for MySQL handles
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "DASHBOARD_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DASHBOARD_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DASHBOARD_JSON_LOGS")]
    pub json_logs: bool,

    /// Bearer tokens required on /api routes.
    /// Can be specified multiple times or as comma-separated values.
    #[arg(
        long = "auth-token",
        value_name = "TOKEN",
        env = "DASHBOARD_AUTH_TOKENS",
        value_delimiter = ','
    )]
    pub auth_tokens: Vec<String>,
}

impl Config {
    /// Absolute path of the embedded database file.
    pub fn embedded_path(&self) -> DbResult<PathBuf> {
        resolve_embedded_path(&self.sqlite_file)
    }

    pub fn handle_ttl(&self) -> Duration {
        Duration::from_secs(self.handle_ttl)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections.max(1),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            base_url: self.llm_base_url.trim_end_matches('/').to_string(),
            model: self.llm_model.clone(),
            timeout: Duration::from_secs(self.llm_timeout),
            max_steps: self.agent_max_steps.max(1),
        }
    }

    /// Validate settings that clap cannot check on its own.
    pub fn validate(&self) -> Result<(), String> {
        if self.handle_ttl == 0 {
            return Err("handle_ttl must be greater than 0".to_string());
        }
        if self.session_idle == 0 {
            return Err("session_idle must be greater than 0".to_string());
        }
        if self.query_timeout == 0 {
            return Err("query_timeout must be greater than 0".to_string());
        }
        url::Url::parse(&self.llm_base_url)
            .map_err(|e| format!("Invalid llm_base_url '{}': {e}", self.llm_base_url))?;
        Ok(())
    }
}

/// Resolve an embedded database path against the executable's directory, so the
/// server finds the same file no matter where it is launched from.
pub fn resolve_embedded_path(path: &Path) -> DbResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let exe = std::env::current_exe().map_err(|e| {
        DashboardError::configuration(format!("Cannot locate the running executable: {e}"))
    })?;
    let base = exe.parent().ok_or_else(|| {
        DashboardError::configuration("Executable path has no parent directory")
    })?;
    Ok(resolve_against(base, path))
}

/// Join `path` onto `base` unless it is already absolute.
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
