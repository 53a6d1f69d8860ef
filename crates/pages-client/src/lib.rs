//! Pages API client.
//!
//! Async HTTP client using `reqwest`. Account and project endpoints
//! authenticate with the API token; the asset endpoints authenticate with
//! a short-lived upload JWT obtained from the project's upload-token
//! endpoint. Every failure is classified into an [`ErrorKind`] so callers
//! can decide on retries without inspecting messages.

pub mod client;
pub mod credential;
pub mod error;

pub use client::{ClientConfig, PagesClient, ProjectClient};
pub use credential::{UploadCredential, is_jwt_expired};
pub use error::{ClientError, ErrorKind};
