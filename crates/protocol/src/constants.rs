use std::time::Duration;

/// Maximum total size of one upload bucket (50 MiB).
pub const MAX_BUCKET_SIZE: u64 = 50 * 1024 * 1024;

/// Maximum number of files in one upload bucket.
pub const MAX_BUCKET_FILE_COUNT: usize = 5000;

/// Number of buckets uploaded at the same time.
///
/// Peak resident payload memory is roughly this times [`MAX_BUCKET_SIZE`]
/// times the base64 expansion factor (4/3).
pub const BULK_UPLOAD_CONCURRENCY: usize = 3;

/// Retries allowed for a bucket after its initial upload attempt.
pub const MAX_UPLOAD_ATTEMPTS: u32 = 5;

/// Maximum size of a single asset (25 MiB).
pub const MAX_ASSET_SIZE: u64 = 25 * 1024 * 1024;

/// Maximum number of assets in one deployment.
pub const MAX_ASSET_COUNT: usize = 20_000;

/// Total attempts allowed for submitting a deployment.
pub const MAX_DEPLOYMENT_ATTEMPTS: u32 = 5;

/// Base delay of the exponential backoff (`base * 2^attempt`).
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Fixed pause before the single hash-registration retry.
pub const REGISTRAR_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Overall timeout of one deployment submission attempt.
pub const DEPLOYMENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Fallback content type when none can be guessed from the file name.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Length of a fingerprint in hex characters (128 bits).
pub const FINGERPRINT_HEX_LEN: usize = 32;
