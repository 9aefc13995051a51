//! muxcdn error types

use std::sync::Arc;

/// muxcdn error types
#[derive(Debug, thiserror::Error)]
pub enum MuxcdnError {
    // Request errors
    #[error("access denied: {0}")]
    Denied(String),

    #[error("not found: {path}")]
    NotFound {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The load for this path did not complete normally (panicked or was
    /// torn down). A later request retries it.
    #[error("load failed: {0}")]
    Load(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl MuxcdnError {
    /// Whether this error should be reported to clients as "not found".
    ///
    /// Denied paths are deliberately indistinguishable from missing ones.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Denied(_) | Self::NotFound { .. })
    }
}

/// Result type alias for muxcdn operations
pub type Result<T> = std::result::Result<T, MuxcdnError>;
