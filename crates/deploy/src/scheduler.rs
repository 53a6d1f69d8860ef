//! Concurrent bucket upload.
//!
//! One task per bucket, at most `concurrency` of them holding a worker
//! permit. A bucket's payload is read and base64-encoded only after its
//! task holds a permit, so resident payload memory stays bounded by the
//! worker count rather than the deployment size.

use std::sync::Arc;

use pagepush_pages_client::{ClientError, ErrorKind};
use pagepush_protocol::AssetUploadEntry;
use pagepush_transfer::{AssetFile, Bucket};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::credential::CredentialCache;
use crate::error::DeployError;
use crate::transport::PagesTransport;
use crate::types::{DeployEvent, RetryPolicy, UploadReport};

/// Uploads buckets through a bounded worker pool.
pub struct UploadScheduler {
    transport: Arc<dyn PagesTransport>,
    credentials: Arc<CredentialCache>,
    concurrency: usize,
    max_retries: u32,
    retry: RetryPolicy,
    cancel: CancellationToken,
    events_tx: Option<mpsc::Sender<DeployEvent>>,
}

/// Settings of a single bucket task.
#[derive(Clone)]
struct BucketJob {
    transport: Arc<dyn PagesTransport>,
    credentials: Arc<CredentialCache>,
    max_retries: u32,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

struct BucketOutcome {
    index: usize,
    files: usize,
    bytes: u64,
    attempts: u32,
}

impl UploadScheduler {
    pub fn new(
        transport: Arc<dyn PagesTransport>,
        credentials: Arc<CredentialCache>,
        concurrency: usize,
        max_retries: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            credentials,
            concurrency: concurrency.max(1),
            max_retries,
            retry,
            cancel: CancellationToken::new(),
            events_tx: None,
        }
    }

    /// Stops retries and pending buckets when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reports each uploaded bucket on `events_tx`.
    pub fn with_events(mut self, events_tx: mpsc::Sender<DeployEvent>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    /// Uploads every bucket, returning once all have been accepted.
    ///
    /// The first bucket to exhaust its retries aborts the remaining tasks
    /// and fails the whole phase.
    pub async fn upload_all(&self, buckets: Vec<Bucket>) -> Result<UploadReport, DeployError> {
        let total = buckets.len();
        let mut report = UploadReport::default();
        if total == 0 {
            return Ok(report);
        }

        info!(
            buckets = total,
            concurrency = self.concurrency,
            "uploading buckets"
        );

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let job = BucketJob {
            transport: self.transport.clone(),
            credentials: self.credentials.clone(),
            max_retries: self.max_retries,
            retry: self.retry,
            cancel: self.cancel.clone(),
        };

        let mut tasks = JoinSet::new();
        for (index, bucket) in buckets.into_iter().enumerate() {
            let permits = permits.clone();
            let job = job.clone();
            tasks.spawn(async move {
                let _permit = tokio::select! {
                    _ = job.cancel.cancelled() => return Err(DeployError::Cancelled),
                    permit = permits.acquire_owned() => {
                        permit.map_err(|e| DeployError::Task(e.to_string()))?
                    }
                };
                job.upload_bucket(index, bucket.into_files()).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| DeployError::Task(e.to_string())).and_then(|r| r);
            match outcome {
                Ok(done) => {
                    report.buckets += 1;
                    report.files += done.files;
                    report.bytes += done.bytes;
                    report.attempts += done.attempts;

                    if let Some(tx) = &self.events_tx {
                        // Progress is lossy when nobody drains the channel.
                        let _ = tx.try_send(DeployEvent::BucketUploaded {
                            bucket: done.index,
                            files: done.files,
                            bytes: done.bytes,
                            completed: report.buckets,
                            total,
                        });
                    }
                }
                Err(e) => {
                    tasks.abort_all();
                    error!(error = %e, "upload phase aborted");
                    return Err(e);
                }
            }
        }

        info!(
            buckets = report.buckets,
            files = report.files,
            bytes = report.bytes,
            attempts = report.attempts,
            "upload complete"
        );
        Ok(report)
    }
}

impl BucketJob {
    async fn upload_bucket(
        &self,
        index: usize,
        files: Vec<AssetFile>,
    ) -> Result<BucketOutcome, DeployError> {
        let file_count = files.len();
        let bytes: u64 = files.iter().map(|f| f.size).sum();
        let entries = materialize(files).await?;
        debug!(bucket = index, files = file_count, bytes, "bucket payload ready");

        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }

            let err = match self.try_upload(&entries).await {
                Ok(()) => {
                    debug!(bucket = index, attempts = attempt + 1, "bucket uploaded");
                    return Ok(BucketOutcome {
                        index,
                        files: file_count,
                        bytes,
                        attempts: attempt + 1,
                    });
                }
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= self.max_retries {
                error!(bucket = index, attempts = attempt + 1, error = %err, "bucket upload failed");
                return Err(DeployError::Upload {
                    bucket: index,
                    attempts: attempt + 1,
                    source: err,
                });
            }

            let delay = self.retry.delay_for_attempt(attempt);
            warn!(
                bucket = index,
                attempt,
                delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
                error = %err,
                "bucket upload failed, retrying"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(DeployError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    /// One upload attempt with a current credential.
    async fn try_upload(&self, entries: &[AssetUploadEntry]) -> Result<(), ClientError> {
        let jwt = self.credentials.token().await?;
        let result = self.transport.upload_assets(&jwt, entries).await;
        if matches!(&result, Err(e) if e.kind == ErrorKind::Auth) {
            self.credentials.invalidate(&jwt).await;
        }
        result
    }
}

/// Reads and encodes a bucket's files on the blocking pool.
async fn materialize(files: Vec<AssetFile>) -> Result<Vec<AssetUploadEntry>, DeployError> {
    let entries = tokio::task::spawn_blocking(move || {
        files
            .iter()
            .map(|file| {
                let data = std::fs::read(&file.path)?;
                Ok(AssetUploadEntry::from_bytes(
                    file.fingerprint.as_str(),
                    &data,
                    file.content_type.as_str(),
                ))
            })
            .collect::<Result<Vec<_>, std::io::Error>>()
    })
    .await
    .map_err(|e| DeployError::Task(e.to_string()))??;
    Ok(entries)
}
