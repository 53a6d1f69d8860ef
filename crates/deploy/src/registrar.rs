//! Hash registration.
//!
//! Marks uploaded fingerprints as present so later deployments may skip
//! them. Best effort: a failure here never fails the deployment.

use std::sync::Arc;
use std::time::Duration;

use pagepush_pages_client::ClientError;
use tracing::{debug, warn};

use crate::credential::CredentialCache;
use crate::transport::PagesTransport;

pub struct HashRegistrar {
    transport: Arc<dyn PagesTransport>,
    credentials: Arc<CredentialCache>,
    retry_delay: Duration,
}

impl HashRegistrar {
    pub fn new(
        transport: Arc<dyn PagesTransport>,
        credentials: Arc<CredentialCache>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            transport,
            credentials,
            retry_delay,
        }
    }

    /// Registers `hashes`, retrying once after `retry_delay` with a fresh
    /// credential. Returns whether registration succeeded.
    pub async fn register_hashes(&self, hashes: &[String]) -> bool {
        if hashes.is_empty() {
            return true;
        }

        let first = match self.try_register(hashes).await {
            Ok(()) => {
                debug!(hashes = hashes.len(), "hashes registered");
                return true;
            }
            Err(e) => e,
        };

        debug!(error = %first, "hash registration failed, retrying once");
        tokio::time::sleep(self.retry_delay).await;

        match self.try_register(hashes).await {
            Ok(()) => {
                debug!(hashes = hashes.len(), "hashes registered on retry");
                true
            }
            Err(e) => {
                warn!(hashes = hashes.len(), error = %e, "failed to register hashes, continuing");
                false
            }
        }
    }

    async fn try_register(&self, hashes: &[String]) -> Result<(), ClientError> {
        let jwt = self.credentials.token().await?;
        let result = self.transport.upsert_hashes(&jwt, hashes).await;
        if result.is_err() {
            // The retry must not reuse this token.
            self.credentials.invalidate(&jwt).await;
        }
        result
    }
}
