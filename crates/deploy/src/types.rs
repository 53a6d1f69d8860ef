//! Data types for the deploy flow.

use std::time::Duration;

use pagepush_protocol::constants::{
    BULK_UPLOAD_CONCURRENCY, DEPLOYMENT_TIMEOUT, MAX_DEPLOYMENT_ATTEMPTS, MAX_UPLOAD_ATTEMPTS,
    REGISTRAR_RETRY_DELAY, RETRY_BASE_DELAY,
};
use pagepush_transfer::{BucketLimits, CatalogLimits};
use serde::Serialize;

/// Exponential backoff without jitter: `base_delay × 2^attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: RETRY_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Runtime knobs of a deployment. Defaults equal the service limits.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Upload worker count.
    pub concurrency: usize,
    /// Retries after the initial attempt of a bucket upload.
    pub max_upload_retries: u32,
    /// Total deployment submission attempts.
    pub max_deployment_attempts: u32,
    pub retry: RetryPolicy,
    /// Pause before the single hash registration retry.
    pub registrar_retry_delay: Duration,
    /// Upper bound for one deployment submission attempt.
    pub deployment_timeout: Duration,
    pub catalog_limits: CatalogLimits,
    pub bucket_limits: BucketLimits,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            concurrency: BULK_UPLOAD_CONCURRENCY,
            max_upload_retries: MAX_UPLOAD_ATTEMPTS,
            max_deployment_attempts: MAX_DEPLOYMENT_ATTEMPTS,
            retry: RetryPolicy::default(),
            registrar_retry_delay: REGISTRAR_RETRY_DELAY,
            deployment_timeout: DEPLOYMENT_TIMEOUT,
            catalog_limits: CatalogLimits::default(),
            bucket_limits: BucketLimits::default(),
        }
    }
}

/// Lifecycle of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployState {
    Idle,
    Uploading,
    AwaitingDeployment,
    Deployed,
    Failed,
}

impl DeployState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Deployed | Self::Failed)
    }
}

/// Progress event emitted during deployment.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployEvent {
    StateChanged(DeployState),
    /// A bucket was accepted by the remote side.
    BucketUploaded {
        bucket: usize,
        files: usize,
        bytes: u64,
        completed: usize,
        total: usize,
    },
    Completed { url: String },
    Failed { error: String },
}

/// Outcome of the upload phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub buckets: usize,
    pub files: usize,
    pub bytes: u64,
    /// Upload calls made, retries included.
    pub attempts: u32,
}

/// A committed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentResult {
    pub deployment_id: String,
    /// Public base URL, without trailing slash.
    pub base_url: String,
    pub branch: String,
}

impl DeploymentResult {
    /// Public URL of a manifest path (`/a/b.mp3`) or publish name (`a/b.mp3`).
    pub fn artifact_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, encode_path(path))
    }
}

/// Percent-encoded public path with a leading `/`.
pub(crate) fn encode_path(path: &str) -> String {
    let encoded: Vec<String> = path
        .trim_start_matches('/')
        .split('/')
        .map(encode_segment)
        .collect();
    format!("/{}", encoded.join("/"))
}

/// Percent-encodes one path segment, keeping RFC 3986 unreserved characters.
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
