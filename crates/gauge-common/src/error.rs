//! Error types for gauge sync operations.

use thiserror::Error;

/// Result type alias using SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while syncing an upstream source into the store.
///
/// An upstream returning zero observations is not an error; it surfaces
/// as [`crate::SyncOutcome::NoNewData`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    // === Upstream ===
    #[error("Upstream '{upstream}' unavailable: {message}")]
    UpstreamUnavailable { upstream: String, message: String },

    // === Internal store ===
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Failed to write record: {0}")]
    WriteFailed(String),

    #[error("Failed to remove stale record: {0}")]
    StaleCleanupFailed(String),

    // === Configuration ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid interval '{0}', expected an ISO-8601 duration such as PT15M or P1D")]
    InvalidInterval(String),
}

impl SyncError {
    pub fn upstream(upstream: impl Into<String>, message: impl ToString) -> Self {
        SyncError::UpstreamUnavailable {
            upstream: upstream.into(),
            message: message.to_string(),
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::UpstreamUnavailable { .. } => "upstream_unavailable",
            SyncError::StoreUnavailable(_) => "store_unavailable",
            SyncError::WriteFailed(_) => "write_failed",
            SyncError::StaleCleanupFailed(_) => "stale_cleanup_failed",
            SyncError::InvalidConfig(_) => "invalid_config",
            SyncError::InvalidInterval(_) => "invalid_interval",
        }
    }

    /// Re-tag a store error raised while creating a record.
    pub fn into_write_failure(self) -> Self {
        match self {
            SyncError::WriteFailed(_) => self,
            other => SyncError::WriteFailed(other.to_string()),
        }
    }

    /// Re-tag a store error raised while deleting a superseded record.
    pub fn into_cleanup_failure(self) -> Self {
        match self {
            SyncError::StaleCleanupFailed(_) => self,
            other => SyncError::StaleCleanupFailed(other.to_string()),
        }
    }
}
