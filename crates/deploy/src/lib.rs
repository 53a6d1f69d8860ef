//! Deploy flow: catalog, pack, upload, register hashes, commit.
//!
//! This crate implements the **business logic** of publishing a directory
//! to a pages project. Remote calls go through [`PagesTransport`], which is
//! implemented for the pages client's `ProjectClient` and by test mocks.
//!
//! # Pipeline
//!
//! 1. **Catalog**: walk and fingerprint the directory, enforcing limits
//! 2. **Pack**: group files into size- and count-bounded buckets
//! 3. **Upload**: send buckets through a bounded worker pool with retries
//! 4. **Register**: mark fingerprints as present (best effort)
//! 5. **Commit**: submit the manifest as a new deployment

pub mod committer;
pub mod credential;
pub mod deploy;
pub mod error;
pub mod registrar;
pub mod scheduler;
pub mod transport;
pub mod types;
pub mod work;

#[cfg(test)]
mod mock;

pub use committer::DeploymentCommitter;
pub use credential::CredentialCache;
pub use deploy::DeployPipeline;
pub use error::DeployError;
pub use registrar::HashRegistrar;
pub use scheduler::UploadScheduler;
pub use transport::{PagesTransport, TransportFuture};
pub use types::{
    DeployEvent, DeployOptions, DeployState, DeploymentResult, RetryPolicy, UploadReport,
};
pub use work::{
    AssetProvider, BatchOptions, BatchReport, ProvidedAsset, ProviderError, PublishedEntry,
    StagedEntry, WorkItem, WorkQueue, publish_batch,
};
