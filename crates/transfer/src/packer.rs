//! Bucket packing.
//!
//! First-fit-decreasing with a rotating start offset. The goal is enough
//! buckets to keep every upload worker busy while respecting the size and
//! count limits, not the minimum number of buckets.

use pagepush_protocol::constants::{MAX_BUCKET_FILE_COUNT, MAX_BUCKET_SIZE};

use crate::types::{AssetFile, Bucket};

/// Capacity limits of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketLimits {
    pub max_size: u64,
    pub max_files: usize,
}

impl Default for BucketLimits {
    fn default() -> Self {
        Self {
            max_size: MAX_BUCKET_SIZE,
            max_files: MAX_BUCKET_FILE_COUNT,
        }
    }
}

/// Partitions `files` into upload buckets.
///
/// Starts with `concurrency` empty buckets so small deployments still get
/// several upload streams. Files are placed largest first; the scan for a
/// fitting bucket starts one bucket further along for every file, which
/// spreads large files instead of piling them into bucket zero. A file that
/// fits nowhere opens a new bucket of its own. Empty buckets are dropped.
pub fn pack_buckets(files: &[AssetFile], concurrency: usize, limits: BucketLimits) -> Vec<Bucket> {
    let mut sorted: Vec<&AssetFile> = files.iter().collect();
    sorted.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));

    let mut buckets: Vec<Bucket> = (0..concurrency)
        .map(|_| Bucket::with_capacity(limits.max_size))
        .collect();

    for (offset, file) in sorted.into_iter().enumerate() {
        let count = buckets.len();
        let target = (0..count)
            .map(|i| (i + offset) % count)
            .find(|&idx| {
                let bucket = &buckets[idx];
                bucket.fits(file.size) && bucket.len() < limits.max_files
            });

        match target {
            Some(idx) => buckets[idx].push(file.clone()),
            None => {
                let mut bucket = Bucket::with_capacity(limits.max_size);
                bucket.push(file.clone());
                buckets.push(bucket);
            }
        }
    }

    buckets.retain(|b| !b.is_empty());
    buckets
}
