//! Configuration handling for the ORM engine.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! Host applications may also build a [`Config`] directly (see [`Config::default_config`]).

use clap::{Parser, ValueEnum};
use std::time::Duration;
use url::Url;

pub const DEFAULT_DATABASE_URL: &str = "mysql://localhost:3306/aero";
pub const DEFAULT_POOL_SIZE: usize = 8;
pub const DEFAULT_LIVENESS_TIMEOUT_SECS: u64 = 3;

/// What to do when a generated statement fails at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionErrorMode {
    /// Log the failure and return the benign value for the declared shape.
    #[default]
    Swallow,
    /// Return the failure to the repository caller.
    Propagate,
}

impl std::fmt::Display for ExecutionErrorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Swallow => write!(f, "swallow"),
            Self::Propagate => write!(f, "propagate"),
        }
    }
}

/// What to do with DELETE/UPDATE calls that bind no condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnboundedMutationMode {
    /// Emit a warning and run against every row.
    #[default]
    Warn,
    /// Refuse the call before touching the database.
    Reject,
}

impl std::fmt::Display for UnboundedMutationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Per-call policies shared by every repository adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOptions {
    pub execution_errors: ExecutionErrorMode,
    pub unbounded_mutations: UnboundedMutationMode,
}

impl DispatchOptions {
    pub fn with_execution_errors(mut self, mode: ExecutionErrorMode) -> Self {
        self.execution_errors = mode;
        self
    }

    pub fn with_unbounded_mutations(mut self, mode: UnboundedMutationMode) -> Self {
        self.unbounded_mutations = mode;
        self
    }
}

/// ORM configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "aero-orm")]
#[command(about = "Synchronize entity tables and run declarative repositories")]
#[command(version)]
pub struct Config {
    /// Database URL (mysql://host:port/db or sqlite:path/to/file.db)
    #[arg(
        short = 'd',
        long = "database-url",
        value_name = "URL",
        default_value = DEFAULT_DATABASE_URL,
        env = "AERO_DATABASE_URL"
    )]
    pub database_url: String,

    /// Driver identifier (mysql, mariadb, sqlite). Inferred from the URL when omitted.
    #[arg(long = "database-driver", env = "AERO_DATABASE_DRIVER")]
    pub driver: Option<String>,

    /// Database user name (overrides the URL user)
    #[arg(long = "database-username", env = "AERO_DATABASE_USERNAME")]
    pub username: Option<String>,

    /// Database password (overrides the URL password)
    #[arg(long = "database-password", env = "AERO_DATABASE_PASSWORD")]
    pub password: Option<String>,

    /// Number of connections opened at startup
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE, env = "AERO_POOL_SIZE")]
    pub pool_size: usize,

    /// Liveness check timeout in seconds for pooled connections
    #[arg(
        long,
        default_value_t = DEFAULT_LIVENESS_TIMEOUT_SECS,
        env = "AERO_LIVENESS_TIMEOUT"
    )]
    pub liveness_timeout: u64,

    /// Statement failure policy (swallow or propagate)
    #[arg(
        long,
        value_enum,
        default_value = "swallow",
        env = "AERO_EXECUTION_ERRORS"
    )]
    pub execution_errors: ExecutionErrorMode,

    /// Policy for DELETE/UPDATE without conditions (warn or reject)
    #[arg(
        long,
        value_enum,
        default_value = "warn",
        env = "AERO_UNBOUNDED_MUTATIONS"
    )]
    pub unbounded_mutations: UnboundedMutationMode,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "AERO_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "AERO_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            driver: None,
            username: None,
            password: None,
            pool_size: DEFAULT_POOL_SIZE,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT_SECS,
            execution_errors: ExecutionErrorMode::default(),
            unbounded_mutations: UnboundedMutationMode::default(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Configuration pointing at a specific database URL with defaults elsewhere.
    pub fn for_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default_config()
        }
    }

    /// Get the liveness check timeout as a Duration.
    pub fn liveness_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout)
    }

    /// Policies handed to every repository adapter.
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            execution_errors: self.execution_errors,
            unbounded_mutations: self.unbounded_mutations,
        }
    }

    /// Get a display-safe version of the database URL (password masked).
    pub fn masked_database_url(&self) -> String {
        mask_password(&self.database_url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Replace the password component of a URL with `****`.
///
/// Strings that do not parse as URLs (e.g. `sqlite:data.db`) are returned unchanged.
pub fn mask_password(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some("****")).is_ok() {
                url.to_string()
            } else {
                raw.to_string()
            }
        }
        _ => raw.to_string(),
    }
}
