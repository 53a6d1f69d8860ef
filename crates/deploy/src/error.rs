//! Deploy error types.

use pagepush_pages_client::ClientError;
use pagepush_transfer::TransferError;

/// Errors produced during a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Oversized file, too many files or an unusable path. Raised before
    /// any network activity.
    #[error("catalog failed: {0}")]
    Validation(#[from] TransferError),

    #[error("bucket {bucket} upload failed after {attempts} attempt(s): {source}")]
    Upload {
        bucket: usize,
        attempts: u32,
        #[source]
        source: ClientError,
    },

    #[error("deployment failed after {attempts} attempt(s): {source}")]
    Deployment {
        attempts: u32,
        #[source]
        source: ClientError,
    },

    #[error("pages API error: {0}")]
    Transport(#[from] ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("work queue error: {0}")]
    Queue(String),

    #[error("asset provider error: {0}")]
    Provider(String),

    #[error("task failed: {0}")]
    Task(String),

    #[error("cancelled")]
    Cancelled,
}

impl DeployError {
    /// True for failures detected before anything was sent.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(e) if e.is_validation())
    }
}
