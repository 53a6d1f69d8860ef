//! Wire types and limits shared by the pagepush crates.
//!
//! Everything here mirrors the JSON shapes exchanged with the pages API:
//! the `{success, errors, result}` envelope, asset upload entries, the
//! hash upsert request and the deployment/project/account descriptors.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{ApiEnvelope, ApiMessage, EnvelopeError};
pub use messages::{AssetMetadata, AssetUploadEntry, UploadTokenResult, UpsertHashesRequest};
pub use types::{Account, CreateProjectRequest, Deployment, Manifest, Project};
