//! Error types
//!
//! One crate-wide error enum with stable kind tags. Every error carries a
//! human-readable message and, where available, a source chain. Stack traces
//! never cross the crate boundary; callers branch on [`ErrorKind`].

use serde::{Deserialize, Serialize};

/// Stable, wire-safe error classification.
///
/// The tag survives serialization unchanged so external layers (REST
/// bindings, retry policies) can branch without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Request failed validation; nothing was persisted
    InvalidInput,
    /// Referenced entity does not exist
    NotFound,
    /// Optimistic-concurrency version mismatch
    Conflict,
    /// Durable-write or read failure in a repository
    Storage,
    /// Embedding provider could not produce a vector
    EmbeddingUnavailable,
    /// Categorization engine failed outright
    CategorizationUnavailable,
    /// Belief extractor failed outright
    ExtractionUnavailable,
    /// A per-operation deadline elapsed
    Timeout,
    /// The caller's cancellation signal fired
    Canceled,
    /// Ingestion queue is at capacity
    Overloaded,
    /// Invariant violation or unexpected internal state
    Internal,
}

impl ErrorKind {
    /// Stable tag string (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Storage => "STORAGE",
            ErrorKind::EmbeddingUnavailable => "EMBEDDING_UNAVAILABLE",
            ErrorKind::CategorizationUnavailable => "CATEGORIZATION_UNAVAILABLE",
            ErrorKind::ExtractionUnavailable => "EXTRACTION_UNAVAILABLE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Canceled => "CANCELED",
            ErrorKind::Overloaded => "OVERLOADED",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Crate-wide error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Request failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Version mismatch on a guarded update
    #[error("Version conflict on {entity} {id}: expected version {expected}")]
    Conflict {
        /// Entity type name ("belief", "memory")
        entity: &'static str,
        /// Entity id
        id: String,
        /// The version the caller read
        expected: i64,
    },
    /// Database error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// Storage-layer failure that is not a driver error
    #[error("Storage error: {0}")]
    StorageMessage(String),
    /// Embedding provider failure
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
    /// Categorization engine failure
    #[error("Categorization unavailable: {0}")]
    CategorizationUnavailable(String),
    /// Belief extractor failure
    #[error("Extraction unavailable: {0}")]
    ExtractionUnavailable(String),
    /// Deadline elapsed
    #[error("Operation timed out: {0}")]
    Timeout(String),
    /// Cancellation signal fired
    #[error("Operation canceled: {0}")]
    Canceled(String),
    /// Backpressure rejection
    #[error("Overloaded: {0}")]
    Overloaded(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    /// The stable classification tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::InvalidInput(_) => ErrorKind::InvalidInput,
            MemoryError::NotFound(_) => ErrorKind::NotFound,
            MemoryError::Conflict { .. } => ErrorKind::Conflict,
            MemoryError::Storage(_) | MemoryError::StorageMessage(_) => ErrorKind::Storage,
            MemoryError::EmbeddingUnavailable(_) => ErrorKind::EmbeddingUnavailable,
            MemoryError::CategorizationUnavailable(_) => ErrorKind::CategorizationUnavailable,
            MemoryError::ExtractionUnavailable(_) => ErrorKind::ExtractionUnavailable,
            MemoryError::Timeout(_) => ErrorKind::Timeout,
            MemoryError::Canceled(_) => ErrorKind::Canceled,
            MemoryError::Overloaded(_) => ErrorKind::Overloaded,
            MemoryError::Io(_) => ErrorKind::Storage,
            MemoryError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the ingestion pipeline treats this error as degradable:
    /// the memory write stands and the result is PARTIAL.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::EmbeddingUnavailable
                | ErrorKind::CategorizationUnavailable
                | ErrorKind::ExtractionUnavailable
                | ErrorKind::Timeout
                | ErrorKind::Canceled
                | ErrorKind::Conflict
        )
    }
}

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, MemoryError>;
