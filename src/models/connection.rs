//! Connection-related data models.
//!
//! This module defines the database backends the engine can drive and the
//! settings every pooled connection is opened with.

use crate::config::{Config, mask_password};
use crate::error::{DbError, DbResult};
use serde::Serialize;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Includes MariaDB
    MySql,
    SQLite,
}

impl Backend {
    /// Parse the backend from a connection string scheme.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySql)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Parse the backend from a driver identifier.
    ///
    /// Accepts short names (`mysql`, `mariadb`, `sqlite`) as well as
    /// class-style names such as `com.mysql.cj.jdbc.Driver`.
    pub fn from_driver(driver: &str) -> Option<Self> {
        let lower = driver.to_lowercase();
        if lower.contains("mysql") || lower.contains("mariadb") {
            Some(Self::MySql)
        } else if lower.contains("sqlite") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Locate the backend for a driver identifier and URL.
    ///
    /// An explicit driver wins; otherwise the URL scheme decides. A driver that
    /// names no known backend is an error even when the URL would resolve.
    pub fn resolve(driver: Option<&str>, url: &str) -> DbResult<Self> {
        match driver.map(str::trim).filter(|d| !d.is_empty()) {
            Some(driver) => Self::from_driver(driver).ok_or_else(|| DbError::driver_not_found(driver)),
            None => Self::from_connection_string(url)
                .ok_or_else(|| DbError::driver_not_found(mask_password(url))),
        }
    }

    /// Get the display name for this backend.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Everything needed to open one connection.
#[derive(Clone)]
pub struct ConnectSettings {
    pub backend: Backend,
    /// Contains sensitive data - never log
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectSettings {
    pub fn new(backend: Backend, url: impl Into<String>) -> Self {
        Self {
            backend,
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Resolve settings from the engine configuration.
    pub fn from_config(config: &Config) -> DbResult<Self> {
        let backend = Backend::resolve(config.driver.as_deref(), &config.database_url)?;
        Ok(Self {
            backend,
            url: config.database_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// Get a display-safe version of the URL (password masked).
    pub fn masked_url(&self) -> String {
        mask_password(&self.url)
    }
}

impl std::fmt::Debug for ConnectSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectSettings")
            .field("backend", &self.backend)
            .field("url", &self.masked_url())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}
