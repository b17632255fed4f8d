//! Error types for the ingest-to-storage pipeline.

use std::time::Duration;

use orderflow_log::LogError;
use orderflow_store::StoreError;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while producing or applying order events.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The durable log rejected an append or read.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// A store write or read failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The event's menu type has no counter column. The fact row is already persisted.
    #[error("invalid menu type: {0}")]
    InvalidMenuType(String),

    /// A store step did not finish in time.
    #[error("{step} timed out after {timeout:?}")]
    WriteTimeout {
        /// Store step that timed out.
        step: &'static str,
        /// Configured bound.
        timeout: Duration,
    },

    /// A blocking store task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),
}
