//! Error types for cortex operations.
//!
//! Every failure carries a structured [`ErrorCode`] so callers (and the HTTP
//! layer) can react programmatically, plus an optional suggestion. Errors are
//! also classified as transient or permanent; only transient ones are retried.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for cortex operations.
pub type CortexResult<T> = Result<T, CortexError>;

/// Main error type for all cortex operations.
#[derive(Error, Debug)]
pub enum CortexError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// A tenant, source or entity was not found.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        resource: Option<String>,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        code: ErrorCode,
        retry_after: Option<u64>,
    },

    /// Vector store operation failed.
    #[error("Vector store error: {message}")]
    VectorStore {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM operation failed.
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding generation failed.
    #[error("Embedding error: {message}")]
    Embedding {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Graph store operation failed.
    #[error("Graph store error: {message}")]
    GraphStore {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Provider not supported.
    #[error("Provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValInvalidFormat,
    ValInvalidFilter,

    // Not found (NF_xxx)
    NfTenant,

    // Rate Limit (RATE_xxx)
    RateLimitExceeded,

    // Vector Store (VEC_xxx)
    VecConnectionFailed,
    VecOperationFailed,
    VecCollectionNotFound,

    // LLM (LLM_xxx)
    LlmConnectionFailed,
    LlmGenerationFailed,
    LlmInvalidResponse,

    // Embedding (EMB_xxx)
    EmbConnectionFailed,
    EmbGenerationFailed,
    EmbDimensionMismatch,

    // Graph (GRP_xxx)
    GrpConnectionFailed,
    GrpOperationFailed,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseMissingField,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValInvalidFormat => "VAL_003",
            ErrorCode::ValInvalidFilter => "VAL_005",
            ErrorCode::NfTenant => "NF_001",
            ErrorCode::RateLimitExceeded => "RATE_001",
            ErrorCode::VecConnectionFailed => "VEC_001",
            ErrorCode::VecOperationFailed => "VEC_002",
            ErrorCode::VecCollectionNotFound => "VEC_003",
            ErrorCode::LlmConnectionFailed => "LLM_001",
            ErrorCode::LlmGenerationFailed => "LLM_002",
            ErrorCode::LlmInvalidResponse => "LLM_003",
            ErrorCode::EmbConnectionFailed => "EMB_001",
            ErrorCode::EmbGenerationFailed => "EMB_002",
            ErrorCode::EmbDimensionMismatch => "EMB_003",
            ErrorCode::GrpConnectionFailed => "GRP_001",
            ErrorCode::GrpOperationFailed => "GRP_002",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseMissingField => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl CortexError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error for a required field that was empty.
    pub fn missing_field(field: &str) -> Self {
        let mut details = HashMap::new();
        details.insert("field".to_string(), field.to_string());
        Self::Validation {
            message: format!("'{}' must not be empty", field),
            code: ErrorCode::ValMissingField,
            details,
            suggestion: Some(format!("Provide a non-empty value for '{}'", field)),
        }
    }

    /// Create a validation error with suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a not found error for a tenant namespace.
    pub fn tenant_not_found(brain_id: impl Into<String>) -> Self {
        let id = brain_id.into();
        Self::NotFound {
            message: format!("Brain '{}' not found", id),
            code: ErrorCode::NfTenant,
            resource: Some(id),
        }
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            code: ErrorCode::LlmGenerationFailed,
            source: None,
        }
    }

    /// Create a vector store error.
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore {
            message: message.into(),
            code: ErrorCode::VecOperationFailed,
            source: None,
        }
    }

    /// Create a vector store connectivity error (retryable).
    pub fn vector_store_connection(message: impl Into<String>) -> Self {
        Self::VectorStore {
            message: message.into(),
            code: ErrorCode::VecConnectionFailed,
            source: None,
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
            code: ErrorCode::EmbGenerationFailed,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a graph store error.
    pub fn graph_store(message: impl Into<String>) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpOperationFailed,
            source: None,
        }
    }

    /// Create a graph store connectivity error (retryable).
    pub fn graph_store_connection(message: impl Into<String>) -> Self {
        Self::GraphStore {
            message: message.into(),
            code: ErrorCode::GrpConnectionFailed,
            source: None,
        }
    }

    /// Create an API/network error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetConnectionFailed,
            source: None,
        }
    }

    /// Create a rate limit error.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
            code: ErrorCode::RateLimitExceeded,
            retry_after: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::RateLimit { code, .. } => *code,
            Self::VectorStore { code, .. } => *code,
            Self::Llm { code, .. } => *code,
            Self::Embedding { code, .. } => *code,
            Self::GraphStore { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Configuration(_) | Self::UnsupportedProvider { .. } => ErrorCode::ValInvalidInput,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether the operation that produced this error may succeed if retried.
    ///
    /// Connectivity failures and rate limits are transient; malformed input,
    /// referential violations and parse failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimit { .. } => true,
            Self::VectorStore { code, .. } => *code == ErrorCode::VecConnectionFailed,
            Self::GraphStore { code, .. } => *code == ErrorCode::GrpConnectionFailed,
            Self::Database { code, .. } => *code == ErrorCode::DbConnectionFailed,
            Self::Embedding { code, .. } => *code == ErrorCode::EmbConnectionFailed,
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::RateLimit { .. } => Some("Please wait before making more requests"),
            Self::NotFound { .. } => Some("Please check the brain and source identifiers"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::VectorStore { .. } => Some("Please check your vector store connection settings"),
            Self::GraphStore { .. } => Some("Please check your graph store connection settings"),
            Self::Llm { .. } => Some("Please check your LLM provider configuration"),
            Self::Embedding { .. } => Some("Please check your embedding provider configuration"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for CortexError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                ErrorCode::DbConnectionFailed
            }
            _ => ErrorCode::DbOperationFailed,
        };
        Self::Database {
            message: err.to_string(),
            code,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = CortexError::validation("Invalid input");
        assert_eq!(err.code(), ErrorCode::ValInvalidInput);
        assert!(err.to_string().contains("Invalid input"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_missing_field_has_suggestion() {
        let err = CortexError::missing_field("brain_id");
        assert_eq!(err.code(), ErrorCode::ValMissingField);
        assert!(err.suggestion().unwrap().contains("brain_id"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(CortexError::api("connection reset").is_transient());
        assert!(CortexError::rate_limit("slow down").is_transient());
        assert!(CortexError::graph_store_connection("bolt down").is_transient());
        assert!(CortexError::vector_store_connection("grpc down").is_transient());
        assert!(!CortexError::graph_store("constraint").is_transient());
        assert!(!CortexError::vector_store("bad dims").is_transient());
        assert!(!CortexError::parse("bad json").is_transient());
    }

    #[test]
    fn test_sqlite_busy_is_transient() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err: CortexError = busy.into();
        assert_eq!(err.code(), ErrorCode::DbConnectionFailed);
        assert!(err.is_transient());

        let other: CortexError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(!other.is_transient());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::ValMissingField.as_str(), "VAL_002");
        assert_eq!(ErrorCode::GrpConnectionFailed.as_str(), "GRP_001");
    }
}
