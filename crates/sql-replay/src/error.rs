//! Error types for the replay engine.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for corpus store failures.
pub const EXIT_SOURCE_ERROR: u8 = 2;
/// Exit code for target database failures.
pub const EXIT_TARGET_ERROR: u8 = 3;
/// Exit code for aggregation failures.
pub const EXIT_AGGREGATION_ERROR: u8 = 4;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for replay operations.
///
/// Only run-level failures travel through this type. Statement-level problems
/// are absorbed into classifications and never surface here.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Corpus store query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database error
    #[error("Target database error: {0}")]
    Target(#[from] mysql_async::Error),

    /// Statement rejected by a target session that has no driver error type
    #[error("Statement execution failed: {0}")]
    Execution(String),

    /// Target connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Corpus store connection error with context
    #[error("Corpus store connection error: {message}\n  Context: {context}")]
    SourcePool { message: String, context: String },

    /// Counting the corpus failed
    #[error("Corpus count failed: {0}")]
    CorpusCount(String),

    /// Fetching the statement slice of one batch failed
    #[error("Batch fetch failed at offset {offset}: {message}")]
    BatchFetch { offset: u64, message: String },

    /// No target session could be acquired for a batch
    #[error("Session acquisition failed for batch at offset {offset}: {message}")]
    SessionAcquire { offset: u64, message: String },

    /// The per-batch log could not be opened or written
    #[error("Batch log failed at offset {offset}: {source}")]
    BatchLog {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// Batch results could not be collected
    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReplayError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        ReplayError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a SourcePool error with context about where it occurred
    pub fn source_pool(message: impl ToString, context: impl Into<String>) -> Self {
        ReplayError::SourcePool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a BatchFetch error
    pub fn batch_fetch(offset: u64, message: impl ToString) -> Self {
        ReplayError::BatchFetch {
            offset,
            message: message.to_string(),
        }
    }

    /// Create a SessionAcquire error
    pub fn session_acquire(offset: u64, message: impl ToString) -> Self {
        ReplayError::SessionAcquire {
            offset,
            message: message.to_string(),
        }
    }

    /// Name of the run stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            ReplayError::Config(_) | ReplayError::Yaml(_) => "config",
            ReplayError::SourcePool { .. } => "corpus connection",
            ReplayError::CorpusCount(_) => "corpus count",
            ReplayError::BatchFetch { .. } | ReplayError::Source(_) => "batch fetch",
            ReplayError::SessionAcquire { .. } | ReplayError::Pool { .. } => "session acquisition",
            ReplayError::Target(_) | ReplayError::Execution(_) => "target",
            ReplayError::BatchLog { .. } | ReplayError::Io(_) => "io",
            ReplayError::Aggregation(_) | ReplayError::Json(_) => "aggregation",
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReplayError::Config(_) | ReplayError::Yaml(_) => EXIT_CONFIG_ERROR,
            ReplayError::Source(_)
            | ReplayError::SourcePool { .. }
            | ReplayError::CorpusCount(_)
            | ReplayError::BatchFetch { .. } => EXIT_SOURCE_ERROR,
            ReplayError::Target(_)
            | ReplayError::Execution(_)
            | ReplayError::Pool { .. }
            | ReplayError::SessionAcquire { .. } => EXIT_TARGET_ERROR,
            ReplayError::Aggregation(_) | ReplayError::Json(_) => EXIT_AGGREGATION_ERROR,
            ReplayError::Io(_) | ReplayError::BatchLog { .. } => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;
