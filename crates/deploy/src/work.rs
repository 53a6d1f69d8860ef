//! Work-queue driven publishing.
//!
//! Leases items from a [`WorkQueue`], has an [`AssetProvider`] stage one
//! file per item, deploys the staging directory and reports the public URLs
//! back to the queue. Items that cannot be published are unlocked so they
//! are leased again later; nothing is marked succeeded unless the
//! deployment was committed.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::deploy::DeployPipeline;
use crate::error::DeployError;
use crate::types::encode_path;

/// Name of the index written next to the staged assets.
pub const MANIFEST_FILE: &str = "manifest.json";

pub type WorkFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DeployError>> + Send + 'a>>;

pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProvidedAsset, ProviderError>> + Send + 'a>>;

/// A leased unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    /// Provider-specific identifier of the asset to fetch.
    pub source: String,
    /// End of the lease. Results for an expired lease are discarded.
    pub lease_expires_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    fn lease_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.lease_expires_at.is_none_or(|t| t > now)
    }
}

/// A file staged by an [`AssetProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProvidedAsset {
    /// Path relative to the staging directory, `/`-separated.
    pub relative_path: String,
    /// Extra fields stored with the published entry.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The item can never be fetched; it is removed from the queue.
    #[error("invalid item: {0}")]
    Invalid(String),
    /// Fetching failed this time; the item is unlocked for a later attempt.
    #[error("fetch failed: {0}")]
    Failed(String),
}

/// Entry of the staged `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedEntry {
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Encoded public path with a leading `/`.
    pub path: String,
}

/// Entry reported to the queue once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEntry {
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub url: String,
}

/// Source of work items.
pub trait WorkQueue: Send + Sync {
    /// Leases the next pending item, if any.
    fn lease_next(&self) -> WorkFuture<'_, Option<WorkItem>>;

    /// Releases a lease so the item becomes pending again.
    fn unlock<'a>(&'a self, id: &'a str) -> WorkFuture<'a, ()>;

    /// Removes an item that can never succeed.
    fn delete<'a>(&'a self, id: &'a str) -> WorkFuture<'a, ()>;

    /// Stores published entries and removes the finished items.
    fn mark_succeeded<'a>(
        &'a self,
        ids: &'a [String],
        entries: &'a [PublishedEntry],
    ) -> WorkFuture<'a, ()>;
}

/// Stages the file for one work item.
pub trait AssetProvider: Send + Sync {
    fn fetch<'a>(&'a self, item: &'a WorkItem, staging_dir: &'a Path) -> ProviderFuture<'a>;
}

/// Batch settings.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum items leased per batch.
    pub limit: usize,
    /// Items fetched at the same time.
    pub fetch_concurrency: usize,
    pub staging_dir: PathBuf,
    /// Remove the staging directory after a committed deployment.
    pub clean_staging: bool,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub leased: usize,
    pub published: usize,
    pub unlocked: usize,
    pub deleted: usize,
    /// Base URL of the deployment, when one was made.
    pub base_url: Option<String>,
    pub entries: Vec<PublishedEntry>,
}

/// Leases, stages, deploys and finalizes one batch of work items.
pub async fn publish_batch(
    queue: &dyn WorkQueue,
    provider: &dyn AssetProvider,
    pipeline: &DeployPipeline,
    options: &BatchOptions,
) -> Result<BatchReport, DeployError> {
    let mut report = BatchReport::default();

    let mut items: Vec<WorkItem> = Vec::new();
    while items.len() < options.limit {
        match queue.lease_next().await {
            Ok(Some(item)) => {
                debug!(id = %item.id, "leased work item");
                items.push(item);
            }
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, leased = items.len(), "leasing failed, unlocking items");
                release_all(queue, &items).await;
                return Err(e);
            }
        }
    }
    report.leased = items.len();
    if items.is_empty() {
        info!("no work items pending");
        return Ok(report);
    }

    if let Err(e) = tokio::fs::create_dir_all(&options.staging_dir).await {
        error!(dir = %options.staging_dir.display(), error = %e, "cannot create staging directory");
        release_all(queue, &items).await;
        return Err(e.into());
    }
    info!(items = items.len(), "fetching assets");

    let staging_dir = options.staging_dir.as_path();
    let fetched: Vec<(WorkItem, Result<ProvidedAsset, ProviderError>)> = stream::iter(items)
        .map(|item| async move {
            let result = provider.fetch(&item, staging_dir).await;
            (item, result)
        })
        .buffer_unordered(options.fetch_concurrency.max(1))
        .collect()
        .await;

    let now = Utc::now();
    let mut staged: Vec<(WorkItem, ProvidedAsset)> = Vec::new();
    for (item, result) in fetched {
        match result {
            Ok(asset) if item.lease_valid_at(now) => staged.push((item, asset)),
            Ok(asset) => {
                warn!(id = %item.id, "lease expired before publishing, discarding");
                let _ = tokio::fs::remove_file(staging_dir.join(&asset.relative_path)).await;
                release(queue, &item.id).await;
                report.unlocked += 1;
            }
            Err(ProviderError::Invalid(reason)) => {
                error!(id = %item.id, reason = %reason, "removing invalid work item");
                match queue.delete(&item.id).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        warn!(id = %item.id, error = %e, "failed to delete work item");
                        release(queue, &item.id).await;
                        report.unlocked += 1;
                    }
                }
            }
            Err(e) => {
                error!(id = %item.id, error = %e, "fetch failed");
                release(queue, &item.id).await;
                report.unlocked += 1;
            }
        }
    }

    if staged.is_empty() {
        info!("nothing fetched, skipping deployment");
        return Ok(report);
    }

    let index: Vec<StagedEntry> = staged
        .iter()
        .map(|(_, asset)| StagedEntry {
            metadata: asset.metadata.clone(),
            path: encode_path(&asset.relative_path),
        })
        .collect();
    let pushed = match write_index(staging_dir, &index).await {
        Ok(()) => {
            info!(files = staged.len(), "publishing batch");
            pipeline.push(staging_dir).await
        }
        Err(e) => Err(e),
    };
    let result = match pushed {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "batch deployment failed, unlocking items");
            for (item, _) in &staged {
                release(queue, &item.id).await;
            }
            report.unlocked += staged.len();
            return Err(e);
        }
    };

    let ids: Vec<String> = staged.iter().map(|(item, _)| item.id.clone()).collect();
    let entries: Vec<PublishedEntry> = staged
        .into_iter()
        .map(|(_, asset)| PublishedEntry {
            url: result.artifact_url(&asset.relative_path),
            metadata: asset.metadata,
        })
        .collect();

    queue.mark_succeeded(&ids, &entries).await?;
    info!(
        published = entries.len(),
        index = %result.artifact_url(MANIFEST_FILE),
        "batch published"
    );

    if options.clean_staging {
        if let Err(e) = tokio::fs::remove_dir_all(staging_dir).await {
            warn!(dir = %staging_dir.display(), error = %e, "failed to remove staging directory");
        }
    }

    report.published = entries.len();
    report.base_url = Some(result.base_url);
    report.entries = entries;
    Ok(report)
}

async fn write_index(staging_dir: &Path, index: &[StagedEntry]) -> Result<(), DeployError> {
    let json = serde_json::to_vec_pretty(index)?;
    tokio::fs::write(staging_dir.join(MANIFEST_FILE), json).await?;
    Ok(())
}

async fn release_all(queue: &dyn WorkQueue, items: &[WorkItem]) {
    for item in items {
        release(queue, &item.id).await;
    }
}

/// Unlocks an item, logging instead of failing. An unreleased lease
/// expires on its own.
async fn release(queue: &dyn WorkQueue, id: &str) {
    if let Err(e) = queue.unlock(id).await {
        warn!(id, error = %e, "failed to unlock work item");
    }
}
