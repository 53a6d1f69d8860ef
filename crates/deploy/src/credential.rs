//! Shared upload credential.
//!
//! Workers read the cached JWT under a read lock. When it is missing or
//! expired, one worker refreshes it while the others wait on the refresh
//! guard and then reuse the new token.

use std::sync::Arc;

use pagepush_pages_client::{ClientError, UploadCredential};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::transport::PagesTransport;

pub struct CredentialCache {
    transport: Arc<dyn PagesTransport>,
    current: RwLock<Option<UploadCredential>>,
    refresh: Mutex<()>,
}

impl CredentialCache {
    pub fn new(transport: Arc<dyn PagesTransport>) -> Self {
        Self {
            transport,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Returns an unexpired upload JWT, fetching a new one if needed.
    pub async fn token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        // Another worker may have refreshed while we waited.
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        let jwt = self.transport.fetch_upload_token().await?;
        let credential = UploadCredential::from_jwt(jwt)?;
        debug!(expires_at = credential.expires_at(), "upload token refreshed");

        let token = credential.token().to_string();
        *self.current.write().await = Some(credential);
        Ok(token)
    }

    /// Drops the cached token if it is still `rejected`.
    ///
    /// A token that was already replaced by a concurrent refresh is kept.
    pub async fn invalidate(&self, rejected: &str) {
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|c| c.token() == rejected) {
            debug!("upload token invalidated");
            *current = None;
        }
    }

    async fn cached(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|c| !c.is_expired())
            .map(|c| c.token().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use std::time::Duration;

    #[tokio::test]
    async fn reuses_valid_token() {
        let transport = Arc::new(MockTransport::new());
        let cache = CredentialCache::new(transport.clone());

        let first = cache.token().await.unwrap();
        let second = cache.token().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.token_fetch_count(), 1);
    }

    #[tokio::test]
    async fn refreshes_expired_token() {
        let transport = Arc::new(MockTransport {
            expired_tokens: 1,
            ..MockTransport::new()
        });
        let cache = CredentialCache::new(transport.clone());

        let stale = cache.token().await.unwrap();
        let fresh = cache.token().await.unwrap();
        assert_ne!(stale, fresh);
        assert_eq!(transport.token_fetch_count(), 2);

        // The fresh token is cached.
        assert_eq!(cache.token().await.unwrap(), fresh);
        assert_eq!(transport.token_fetch_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let transport = Arc::new(MockTransport::new());
        let cache = CredentialCache::new(transport.clone());

        let first = cache.token().await.unwrap();
        cache.invalidate(&first).await;
        let second = cache.token().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(transport.token_fetch_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_ignores_replaced_token() {
        let transport = Arc::new(MockTransport::new());
        let cache = CredentialCache::new(transport.clone());

        let current = cache.token().await.unwrap();
        cache.invalidate("some-older-token").await;
        assert_eq!(cache.token().await.unwrap(), current);
        assert_eq!(transport.token_fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refresh_is_single_flight() {
        let transport = Arc::new(MockTransport {
            token_delay: Duration::from_millis(50),
            ..MockTransport::new()
        });
        let cache = Arc::new(CredentialCache::new(transport.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.token().await.unwrap() }));
        }
        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap());
        }

        assert_eq!(transport.token_fetch_count(), 1);
        assert!(tokens.iter().all(|t| t == &tokens[0]));
    }
}
