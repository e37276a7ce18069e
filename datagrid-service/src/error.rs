//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Structured Database Errors
// ============================================================================

/// Database operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseOperation {
    /// Establishing a database connection
    Connect,
    /// Acquiring a connection from the pool
    PoolAcquire,
    /// Counting rows (total or filtered)
    Count,
    /// Selecting the page of rows
    Select,
    /// Decoding a fetched row
    Decode,
}

impl fmt::Display for DatabaseOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::PoolAcquire => write!(f, "pool_acquire"),
            Self::Count => write!(f, "count"),
            Self::Select => write!(f, "select"),
            Self::Decode => write!(f, "decode"),
        }
    }
}

/// Category of database error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseErrorKind {
    /// Failed to establish connection
    ConnectionFailed,
    /// Query execution failed
    QueryFailed,
    /// Type conversion error
    TypeConversion,
    /// Configuration error
    Configuration,
    /// Connection pool exhausted
    PoolExhausted,
    /// Other/unknown error
    Other,
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::QueryFailed => write!(f, "query_failed"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Configuration => write!(f, "configuration"),
            Self::PoolExhausted => write!(f, "pool_exhausted"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured database error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    /// The operation being performed when the error occurred
    pub operation: DatabaseOperation,
    /// The category of error
    pub kind: DatabaseErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Additional context (e.g., table name)
    pub context: Option<String>,
}

impl DatabaseError {
    /// Create a new database error
    pub fn new(
        operation: DatabaseOperation,
        kind: DatabaseErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            DatabaseOperation::Connect,
            DatabaseErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Create a pool exhausted error
    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Self::new(
            DatabaseOperation::PoolAcquire,
            DatabaseErrorKind::PoolExhausted,
            message,
        )
    }

    /// Create a query failed error for the given operation
    pub fn query_failed(operation: DatabaseOperation, message: impl Into<String>) -> Self {
        Self::new(operation, DatabaseErrorKind::QueryFailed, message)
    }

    /// Re-tag the operation, keeping kind and message
    pub fn during(mut self, operation: DatabaseOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Add context to an existing error
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Whether the caller may retry the (read-only) request
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::ConnectionFailed | DatabaseErrorKind::PoolExhausted
        )
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Database {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref ctx) = self.context {
            write!(f, " [context: {}]", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for DatabaseError {}

/// Sanitize a database URL by removing credentials
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let after_at = &url[at_pos + 1..];
            return format!("{}<redacted>@{}", scheme, after_at);
        }
    }
    url.to_string()
}

/// Result type alias using the service error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the service
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or extracted
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// No whitelist is registered for the requested endpoint
    #[error("No DataTables configuration registered under '{endpoint}'")]
    ConfigurationMissing {
        /// Configuration key that was looked up
        endpoint: String,
    },

    /// A registered whitelist failed validation
    #[error("Invalid DataTables configuration: {0}")]
    InvalidWhitelist(String),

    /// The client referenced a column the whitelist does not contain
    #[error("Column '{name}' at index {index} is not supported")]
    UnsupportedColumn {
        /// Client-side column index
        index: usize,
        /// Name the client sent
        name: String,
    },

    /// Internal inconsistency between compiler, executor and envelope
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Structured database error with operation context
    #[error("{0}")]
    Database(DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status: status.as_u16(),
        }
    }

    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl Error {
    /// Status and body for this error, logging server-side faults
    fn to_response_parts(&self) -> (StatusCode, ErrorResponse) {
        match self {
            Error::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                server_fault("CONFIG_ERROR", "Service configuration error")
            }

            Error::ConfigurationMissing { endpoint } => {
                tracing::error!(endpoint = %endpoint, "DataTables configuration missing");
                server_fault("CONFIGURATION_MISSING", "Table is not configured")
            }

            Error::InvalidWhitelist(msg) => {
                tracing::error!("Invalid DataTables configuration: {}", msg);
                server_fault("INVALID_WHITELIST", "Table configuration is invalid")
            }

            Error::UnsupportedColumn { index, name } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_code(
                    StatusCode::BAD_REQUEST,
                    "UNSUPPORTED_COLUMN",
                    format!("Column '{}' at index {} is not supported", name, index),
                ),
            ),

            Error::InvariantViolation(msg) => {
                tracing::error!("Invariant violation: {}", msg);
                server_fault("INVARIANT_VIOLATION", "Internal server error")
            }

            Error::Database(e) => {
                tracing::error!(
                    operation = %e.operation,
                    kind = %e.kind,
                    context = ?e.context,
                    retriable = e.is_retriable(),
                    "Database error: {}", e.message
                );

                let (status, user_message) = match e.kind {
                    DatabaseErrorKind::PoolExhausted => {
                        (StatusCode::SERVICE_UNAVAILABLE, "Database is busy, retry later")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "Database operation failed"),
                };
                let code = format!("DATABASE_{}", e.kind.to_string().to_uppercase());

                (status, ErrorResponse::with_code(status, code, user_message))
            }

            Error::Io(e) => {
                tracing::error!("I/O error: {}", e);
                server_fault("IO_ERROR", "I/O operation failed")
            }

            Error::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::with_code(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ),

            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                server_fault("INTERNAL_ERROR", "Internal server error")
            }
        }
    }
}

fn server_fault(code: &str, message: &str) -> (StatusCode, ErrorResponse) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::with_code(StatusCode::INTERNAL_SERVER_ERROR, code, message),
    )
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_response_parts();
        (status, Json(error_response)).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

// Manual From implementation for the boxed config error
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

// Conversion from sqlx::Error to DatabaseError
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::PoolTimedOut => Self::pool_exhausted("Connection pool timed out"),
            E::PoolClosed => Self::connection_failed("Connection pool is closed"),
            E::Configuration(e) => Self::new(
                DatabaseOperation::Connect,
                DatabaseErrorKind::Configuration,
                e.to_string(),
            ),
            E::Io(e) => Self::new(
                DatabaseOperation::Connect,
                DatabaseErrorKind::ConnectionFailed,
                e.to_string(),
            ),
            E::ColumnDecode { index, source } => Self::new(
                DatabaseOperation::Decode,
                DatabaseErrorKind::TypeConversion,
                format!("Failed to decode column {}: {}", index, source),
            ),
            E::Decode(e) => Self::new(
                DatabaseOperation::Decode,
                DatabaseErrorKind::TypeConversion,
                e.to_string(),
            ),
            E::ColumnIndexOutOfBounds { index, len } => Self::new(
                DatabaseOperation::Decode,
                DatabaseErrorKind::QueryFailed,
                format!("Column index {} out of bounds (len: {})", index, len),
            ),
            E::Database(db_err) => Self::new(
                DatabaseOperation::Select,
                DatabaseErrorKind::QueryFailed,
                db_err.to_string(),
            ),
            E::WorkerCrashed => Self::connection_failed("Database worker crashed"),
            _ => Self::new(
                DatabaseOperation::Select,
                DatabaseErrorKind::Other,
                err.to_string(),
            ),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(DatabaseError::from(err))
    }
}

impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        Error::Database(err)
    }
}
