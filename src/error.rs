//! Error types for the dashboard.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each variant carries a message the UI can show inline; connection and database
//! errors also carry a suggestion describing how the user can recover.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42S02" for unknown table on MySQL
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, suggestion: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Agent error: {message}")]
    Oracle { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Coarse classification used for logging and HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing credential or API key. Halts the session until fixed.
    Configuration,
    /// Database or inference service unreachable. User may retry manually.
    Connectivity,
    /// Failure inside the agent (bad generated SQL, tool failure).
    Oracle,
    /// Malformed request or unknown object.
    Validation,
    Permission,
    Internal,
}

impl DashboardError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
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

    /// Create a permission error.
    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn unauthorized(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an agent (oracle) error.
    pub fn oracle(message: impl Into<String>) -> Self {
        Self::Oracle {
            message: message.into(),
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
            Self::Unauthorized { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Connection { .. } | Self::Timeout { .. } => ErrorKind::Connectivity,
            Self::Oracle { .. } => ErrorKind::Oracle,
            Self::Database { .. }
            | Self::Schema { .. }
            | Self::InvalidInput { .. }
            | Self::SessionNotFound { .. } => ErrorKind::Validation,
            Self::Permission { .. } | Self::Unauthorized { .. } => ErrorKind::Permission,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Short machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Connection { .. } => "connection_failed",
            Self::Database { .. } => "database_error",
            Self::Permission { .. } => "permission_denied",
            Self::Schema { .. } => "schema_error",
            Self::Timeout { .. } => "timeout",
            Self::Unauthorized { .. } => "unauthorized",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Oracle { .. } => "agent_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Configuration { .. }
            | Self::InvalidInput { .. }
            | Self::Database { .. }
            | Self::Schema { .. } => StatusCode::BAD_REQUEST,
            Self::Permission { .. } => StatusCode::FORBIDDEN,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Connection { .. } | Self::Oracle { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert sqlx errors to DashboardError.
impl From<sqlx::Error> for DashboardError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DashboardError::connection(
                msg.to_string(),
                "Check the connection settings and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DashboardError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DashboardError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DashboardError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => DashboardError::connection(
                "Connection pool is closed",
                "Reconnect to the database",
            ),
            sqlx::Error::Io(io_err) => DashboardError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DashboardError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DashboardError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DashboardError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DashboardError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                DashboardError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => DashboardError::internal("Database worker crashed"),
            _ => DashboardError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for dashboard operations.
pub type DbResult<T> = Result<T, DashboardError>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'static str,
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
}

/// Render errors as `{ "error": { code, kind, message, suggestion } }`.
impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                kind: self.kind(),
                message: self.to_string(),
                suggestion: self.suggestion(),
            },
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DashboardError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DashboardError::database(
            "Syntax error",
            Some("42000".to_string()),
            "Check SQL syntax",
        );
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
        assert_eq!(DashboardError::configuration("x").suggestion(), None);
    }

    #[test]
    fn test_error_retryable() {
        assert!(DashboardError::timeout("query", 30).is_retryable());
        assert!(DashboardError::connection("err", "sugg").is_retryable());
        assert!(!DashboardError::permission("upload", "read-only").is_retryable());
        assert!(!DashboardError::configuration("missing host").is_retryable());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DashboardError::configuration("no key").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            DashboardError::timeout("llm", 60).kind(),
            ErrorKind::Connectivity
        );
        assert_eq!(DashboardError::oracle("bad sql").kind(), ErrorKind::Oracle);
        assert_eq!(
            DashboardError::invalid_input("empty").kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DashboardError::configuration("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DashboardError::permission("upload", "read-only").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            DashboardError::session_not_found("abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DashboardError::connection("refused", "start server").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            DashboardError::timeout("query", 30).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = DashboardError::invalid_input("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
