//! Pages transport trait.
//!
//! `PagesTransport` is implemented for [`ProjectClient`] and by test mocks,
//! keeping the upload and commit logic decoupled from HTTP.

use std::future::Future;
use std::pin::Pin;

use pagepush_pages_client::{ClientError, ProjectClient};
use pagepush_protocol::{AssetUploadEntry, Deployment, Manifest};

/// Boxed future returned by every transport call.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Remote side of a deployment, bound to one project.
pub trait PagesTransport: Send + Sync {
    /// Issues a fresh upload JWT.
    fn fetch_upload_token(&self) -> TransportFuture<'_, String>;

    /// Uploads one bucket. All-or-nothing from the caller's point of view.
    fn upload_assets<'a>(
        &'a self,
        jwt: &'a str,
        entries: &'a [AssetUploadEntry],
    ) -> TransportFuture<'a, ()>;

    /// Registers fingerprints with the dedup registry.
    fn upsert_hashes<'a>(&'a self, jwt: &'a str, hashes: &'a [String]) -> TransportFuture<'a, ()>;

    /// Commits a manifest on `branch`.
    fn create_deployment<'a>(
        &'a self,
        manifest: &'a Manifest,
        branch: &'a str,
    ) -> TransportFuture<'a, Deployment>;
}

impl PagesTransport for ProjectClient {
    fn fetch_upload_token(&self) -> TransportFuture<'_, String> {
        Box::pin(ProjectClient::fetch_upload_token(self))
    }

    fn upload_assets<'a>(
        &'a self,
        jwt: &'a str,
        entries: &'a [AssetUploadEntry],
    ) -> TransportFuture<'a, ()> {
        Box::pin(ProjectClient::upload_assets(self, jwt, entries))
    }

    fn upsert_hashes<'a>(&'a self, jwt: &'a str, hashes: &'a [String]) -> TransportFuture<'a, ()> {
        Box::pin(ProjectClient::upsert_hashes(self, jwt, hashes))
    }

    fn create_deployment<'a>(
        &'a self,
        manifest: &'a Manifest,
        branch: &'a str,
    ) -> TransportFuture<'a, Deployment> {
        Box::pin(ProjectClient::create_deployment(self, manifest, branch))
    }
}
