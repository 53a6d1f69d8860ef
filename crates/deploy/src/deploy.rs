//! Deploy pipeline.
//!
//! Drives catalog, packing, upload, hash registration and commit for one
//! directory, tracks the deployment state and reports progress events.

use std::path::Path;
use std::sync::Arc;

use pagepush_transfer::{AssetFile, build_catalog_with_limits, pack_buckets};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::committer::DeploymentCommitter;
use crate::credential::CredentialCache;
use crate::error::DeployError;
use crate::registrar::HashRegistrar;
use crate::scheduler::UploadScheduler;
use crate::transport::PagesTransport;
use crate::types::{DeployEvent, DeployOptions, DeployState, DeploymentResult};

/// Deploys directories to one pages project.
pub struct DeployPipeline {
    transport: Arc<dyn PagesTransport>,
    credentials: Arc<CredentialCache>,
    options: DeployOptions,
    state: watch::Sender<DeployState>,
    events_tx: mpsc::Sender<DeployEvent>,
    events_rx: Option<mpsc::Receiver<DeployEvent>>,
    cancel: CancellationToken,
}

impl DeployPipeline {
    /// Creates a new pipeline.
    pub fn new(transport: Arc<dyn PagesTransport>, options: DeployOptions) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (state, _) = watch::channel(DeployState::Idle);
        Self {
            credentials: Arc::new(CredentialCache::new(transport.clone())),
            transport,
            options,
            state,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<DeployEvent>> {
        self.events_rx.take()
    }

    /// Returns a cancellation token for this pipeline.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> DeployState {
        *self.state.borrow()
    }

    /// Watches state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<DeployState> {
        self.state.subscribe()
    }

    /// Publishes every file under `dir` as one deployment.
    ///
    /// Either the whole manifest is committed or an error is returned;
    /// nothing is sent when the directory fails validation.
    pub async fn push(&self, dir: &Path) -> Result<DeploymentResult, DeployError> {
        match self.run(dir).await {
            Ok(result) => {
                self.set_state(DeployState::Deployed);
                self.emit(DeployEvent::Completed {
                    url: result.base_url.clone(),
                });
                info!(url = %result.base_url, branch = %result.branch, "deploy completed");
                Ok(result)
            }
            Err(e) => {
                self.set_state(DeployState::Failed);
                self.emit(DeployEvent::Failed {
                    error: e.to_string(),
                });
                error!(error = %e, "deploy failed");
                Err(e)
            }
        }
    }

    async fn run(&self, dir: &Path) -> Result<DeploymentResult, DeployError> {
        self.set_state(DeployState::Idle);
        self.check_cancelled()?;

        let catalog = build_catalog_with_limits(dir, self.options.catalog_limits).await?;

        // Every file counts as missing: no presence check is made against
        // previously registered hashes, so each push uploads the full set.
        let missing: Vec<AssetFile> = catalog.files().cloned().collect();
        let buckets = pack_buckets(&missing, self.options.concurrency, self.options.bucket_limits);
        info!(
            dir = %dir.display(),
            files = catalog.len(),
            bytes = catalog.total_size(),
            buckets = buckets.len(),
            "deployment planned"
        );

        self.check_cancelled()?;
        self.set_state(DeployState::Uploading);

        UploadScheduler::new(
            self.transport.clone(),
            self.credentials.clone(),
            self.options.concurrency,
            self.options.max_upload_retries,
            self.options.retry,
        )
        .with_cancel(self.cancel.clone())
        .with_events(self.events_tx.clone())
        .upload_all(buckets)
        .await?;

        HashRegistrar::new(
            self.transport.clone(),
            self.credentials.clone(),
            self.options.registrar_retry_delay,
        )
        .register_hashes(&catalog.fingerprints())
        .await;

        self.check_cancelled()?;
        self.set_state(DeployState::AwaitingDeployment);

        DeploymentCommitter::new(
            self.transport.clone(),
            self.options.max_deployment_attempts,
            self.options.retry,
            self.options.deployment_timeout,
        )
        .with_cancel(self.cancel.clone())
        .commit(&catalog.manifest())
        .await
    }

    fn set_state(&self, state: DeployState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            self.emit(DeployEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: DeployEvent) {
        let _ = self.events_tx.try_send(event);
    }

    fn check_cancelled(&self) -> Result<(), DeployError> {
        if self.cancel.is_cancelled() {
            Err(DeployError::Cancelled)
        } else {
            Ok(())
        }
    }
}
