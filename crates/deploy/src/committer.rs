//! Deployment commit.

use std::sync::Arc;
use std::time::Duration;

use pagepush_pages_client::ClientError;
use pagepush_protocol::Manifest;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::DeployError;
use crate::transport::PagesTransport;
use crate::types::{DeploymentResult, RetryPolicy};

/// Submits manifests as deployments.
pub struct DeploymentCommitter {
    transport: Arc<dyn PagesTransport>,
    max_attempts: u32,
    retry: RetryPolicy,
    timeout: Duration,
    cancel: CancellationToken,
}

impl DeploymentCommitter {
    pub fn new(
        transport: Arc<dyn PagesTransport>,
        max_attempts: u32,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            max_attempts: max_attempts.max(1),
            retry,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Commits `manifest` on a new random branch.
    ///
    /// The branch is chosen once, so every attempt targets the same one.
    pub async fn commit(&self, manifest: &Manifest) -> Result<DeploymentResult, DeployError> {
        let branch = new_branch_id();
        info!(branch = %branch, files = manifest.len(), "committing deployment");

        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }

            let err = match self.try_commit(manifest, &branch).await {
                Ok(deployment) => {
                    info!(id = %deployment.id, url = %deployment.url, "deployment created");
                    return Ok(DeploymentResult {
                        deployment_id: deployment.id,
                        base_url: deployment.url.trim_end_matches('/').to_string(),
                        branch,
                    });
                }
                Err(e) => e,
            };

            let attempts = attempt + 1;
            if !err.is_retryable() {
                error!(attempts, error = %err, "deployment rejected");
                return Err(DeployError::Deployment {
                    attempts,
                    source: err,
                });
            }
            if attempts >= self.max_attempts {
                error!(attempts, error = %err, "deployment failed");
                return Err(DeployError::Deployment {
                    attempts,
                    source: err,
                });
            }

            let delay = self.retry.delay_for_attempt(attempt);
            warn!(
                attempt,
                delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
                error = %err,
                "deployment failed, retrying"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(DeployError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn try_commit(
        &self,
        manifest: &Manifest,
        branch: &str,
    ) -> Result<pagepush_protocol::Deployment, ClientError> {
        match tokio::time::timeout(self.timeout, self.transport.create_deployment(manifest, branch))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ClientError::transient(format!(
                "deployment timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Short random branch name: the first group of a v4 UUID.
fn new_branch_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use pagepush_pages_client::ErrorKind;
    use tokio::time::Instant;

    fn committer(transport: Arc<MockTransport>) -> DeploymentCommitter {
        DeploymentCommitter::new(
            transport,
            5,
            RetryPolicy::default(),
            Duration::from_secs(120),
        )
    }

    fn manifest() -> Manifest {
        let mut m = Manifest::new();
        m.insert("a.mp3", "0123456789abcdef0123456789abcdef");
        m
    }

    #[test]
    fn branch_id_is_short_hex() {
        let id = new_branch_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn commits_manifest() {
        let transport = Arc::new(MockTransport::new());
        let result = committer(transport.clone()).commit(&manifest()).await.unwrap();

        assert_eq!(result.deployment_id, "dep-1");
        assert_eq!(result.base_url, "https://abc123.cdn.pages.dev");
        assert_eq!(
            result.artifact_url("/a.mp3"),
            "https://abc123.cdn.pages.dev/a.mp3"
        );

        let deployments = transport.deployments.lock().unwrap();
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].0, manifest());
        assert_eq!(deployments[0].1, result.branch);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_same_branch() {
        let transport = Arc::new(MockTransport::new().fail_deployments(2, ErrorKind::Transient));

        let start = Instant::now();
        let result = committer(transport.clone()).commit(&manifest()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));

        let deployments = transport.deployments.lock().unwrap();
        assert_eq!(deployments.len(), 3);
        assert!(deployments.iter().all(|(_, b)| *b == result.branch));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let transport = Arc::new(MockTransport::new().fail_deployments(5, ErrorKind::Transient));

        let err = committer(transport.clone()).commit(&manifest()).await.unwrap_err();
        assert!(matches!(err, DeployError::Deployment { attempts: 5, .. }));
        assert_eq!(transport.deployment_calls(), 5);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let transport = Arc::new(MockTransport::new().fail_deployments(1, ErrorKind::Fatal));

        let err = committer(transport.clone()).commit(&manifest()).await.unwrap_err();
        assert!(matches!(err, DeployError::Deployment { attempts: 1, .. }));
        assert_eq!(transport.deployment_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempt_is_retried() {
        let transport = Arc::new(MockTransport {
            deploy_delay: Duration::from_secs(10),
            ..MockTransport::new()
        });
        let committer = DeploymentCommitter::new(
            transport.clone(),
            2,
            RetryPolicy::default(),
            Duration::from_secs(5),
        );

        let err = committer.commit(&manifest()).await.unwrap_err();
        match err {
            DeployError::Deployment { attempts, source } => {
                assert_eq!(attempts, 2);
                assert_eq!(source.kind, ErrorKind::Transient);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Abandoned attempts never reach the remote side.
        assert_eq!(transport.deployment_calls(), 0);
    }
}
