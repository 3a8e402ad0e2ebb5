//! Error types for the ORM engine.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Variants follow the failure taxonomy of the engine: startup failures (driver or
//! connection), schema failures, statement execution failures, result mapping
//! failures and declaration failures detected at registration time.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database driver not found: {driver}")]
    DriverNotFound { driver: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42S02" for unknown table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Schema error: {message} (table: {table})")]
    Schema { message: String, table: String },

    #[error("Mapping error: {message} (column: {column})")]
    Mapping { message: String, column: String },

    #[error("Invalid declaration: {message} (in: {owner})")]
    InvalidDeclaration { message: String, owner: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Method not found: {repository}::{method}")]
    MethodNotFound { repository: String, method: String },

    #[error(
        "Dangerous operation blocked: {operation}. {reason}. Bind at least one condition or allow unbounded mutations."
    )]
    DangerousOperationBlocked { operation: String, reason: String },

    #[error("Timeout: {operation} exceeded {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a driver not found error.
    pub fn driver_not_found(driver: impl Into<String>) -> Self {
        Self::DriverNotFound {
            driver: driver.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, table: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            table: table.into(),
        }
    }

    /// Create a result mapping error.
    pub fn mapping(message: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
            column: column.into(),
        }
    }

    /// Create an invalid declaration error.
    pub fn invalid_declaration(message: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            message: message.into(),
            owner: owner.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a method not found error.
    pub fn method_not_found(repository: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            repository: repository.into(),
            method: method.into(),
        }
    }

    /// Create a dangerous operation blocked error.
    pub fn dangerous_operation_blocked(
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::DangerousOperationBlocked {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error aborts ORM startup.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::DriverNotFound { .. })
    }

    /// Check if this error was raised while turning a row into an entity.
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping { .. })
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the generated SQL and the table definition",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::mapping(format!("Column not found: {}", col), col)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::mapping(format!("Failed to decode column: {}", source), index)
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for ORM operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::database(
            "Syntax error",
            Some("42000".to_string()),
            "Check SQL syntax",
        );
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
        assert_eq!(DbError::schema("boom", "User").suggestion(), None);
    }

    #[test]
    fn test_startup_fatal() {
        assert!(DbError::driver_not_found("oracle").is_startup_fatal());
        assert!(DbError::connection("err", "sugg").is_startup_fatal());
        assert!(!DbError::schema("bad ddl", "User").is_startup_fatal());
        assert!(!DbError::mapping("missing", "age").is_startup_fatal());
    }

    #[test]
    fn test_column_not_found_maps_to_mapping_error() {
        let err: DbError = sqlx::Error::ColumnNotFound("age".to_string()).into();
        assert!(err.is_mapping());
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn test_timeout_message() {
        let err = DbError::timeout("liveness check", std::time::Duration::from_millis(250));
        assert!(matches!(err, DbError::Timeout { elapsed_ms: 250, .. }));
        assert_eq!(err.to_string(), "Timeout: liveness check exceeded 250ms");
    }

    #[test]
    fn test_dangerous_operation_message() {
        let err = DbError::dangerous_operation_blocked(
            "DELETE without WHERE",
            "This will delete all rows from the table",
        );
        assert!(err.to_string().contains("DELETE without WHERE"));
    }

    #[test]
    fn test_method_not_found_display() {
        let err = DbError::method_not_found("UserRepository", "find_by_email");
        assert_eq!(
            err.to_string(),
            "Method not found: UserRepository::find_by_email"
        );
    }
}
