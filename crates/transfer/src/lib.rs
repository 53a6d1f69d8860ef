//! Asset cataloging, fingerprinting and bucket packing.
//!
//! The first two stages of a deployment live here: [`build_catalog`] walks a
//! directory into fingerprinted [`AssetFile`]s and [`pack_buckets`] groups
//! them into size- and count-bounded upload [`Bucket`]s.

mod catalog;
mod fingerprint;
mod packer;
mod types;

pub use catalog::{AssetCatalog, CatalogLimits, build_catalog, build_catalog_with_limits};
pub use fingerprint::{fingerprint_bytes, fingerprint_file, normalized_extension};
pub use packer::{BucketLimits, pack_buckets};
pub use types::{AssetFile, Bucket};

/// Errors produced by the transfer crate.
///
/// `AssetTooLarge` and `TooManyAssets` are validation failures: they are
/// raised before any network activity and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{name} is {size} bytes, assets may be at most {limit} bytes")]
    AssetTooLarge { name: String, size: u64, limit: u64 },

    #[error("deployment has {count} files, at most {limit} are supported")]
    TooManyAssets { count: usize, limit: usize },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl TransferError {
    /// True for errors caused by the input set violating deployment limits.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::AssetTooLarge { .. } | Self::TooManyAssets { .. } | Self::InvalidPath(_)
        )
    }
}
