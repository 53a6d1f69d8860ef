use std::path::PathBuf;

use serde::Serialize;

/// A fingerprinted file ready to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFile {
    /// Absolute path on the local filesystem.
    pub path: PathBuf,
    /// Publish name relative to the deployment root, `/`-separated.
    pub name: String,
    /// Best-effort MIME type.
    pub content_type: String,
    /// File size in bytes.
    pub size: u64,
    /// Content fingerprint (32 hex characters).
    pub fingerprint: String,
}

/// A group of files uploaded together in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    files: Vec<AssetFile>,
    capacity: u64,
    used: u64,
}

impl Bucket {
    pub(crate) fn with_capacity(capacity: u64) -> Self {
        Self {
            files: Vec::new(),
            capacity,
            used: 0,
        }
    }

    pub(crate) fn push(&mut self, file: AssetFile) {
        self.used = self.used.saturating_add(file.size);
        self.files.push(file);
    }

    /// Whether `size` more bytes stay within capacity. A bucket holding an
    /// oversized file accepts nothing else, not even empty files.
    pub fn fits(&self, size: u64) -> bool {
        self.used
            .checked_add(size)
            .is_some_and(|total| total <= self.capacity)
    }

    /// Files in this bucket, in packing order.
    pub fn files(&self) -> &[AssetFile] {
        &self.files
    }

    /// Consumes the bucket, returning its files.
    pub fn into_files(self) -> Vec<AssetFile> {
        self.files
    }

    /// Bytes still available before reaching the bucket size limit.
    pub fn remaining_size(&self) -> u64 {
        self.capacity.saturating_sub(self.used)
    }

    /// Total size of the files in the bucket.
    pub fn total_size(&self) -> u64 {
        self.used
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
