use std::fs::File;
use std::io;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderWriter;
use pagepush_protocol::constants::FINGERPRINT_HEX_LEN;

use crate::TransferError;

// ---------------------------------------------------------------------------
// Fingerprint helpers
// ---------------------------------------------------------------------------

/// Returns the lowercase extension of `path` without the leading dot.
///
/// Dotfiles such as `.env` and names without a dot have no extension.
pub fn normalized_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Computes the fingerprint of `data` published under `extension`.
///
/// BLAKE3 over the base64 encoding of the content followed by the
/// extension, truncated to 128 bits and hex-encoded. The same bytes under
/// two different extensions yield two different fingerprints.
pub fn fingerprint_bytes(data: &[u8], extension: &str) -> String {
    let encoded = STANDARD.encode(data);
    let mut hasher = blake3::Hasher::new();
    hasher.update(encoded.as_bytes());
    finish(hasher, extension)
}

/// Streams a file through the base64 encoder into the hasher and returns
/// its fingerprint. Neither the content nor its encoding is held in memory.
pub fn fingerprint_file(path: &Path) -> Result<String, TransferError> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    {
        let mut encoder = EncoderWriter::new(&mut hasher, &STANDARD);
        io::copy(&mut file, &mut encoder)?;
        encoder.finish()?;
    }
    Ok(finish(hasher, &normalized_extension(path)))
}

fn finish(mut hasher: blake3::Hasher, extension: &str) -> String {
    hasher.update(extension.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest.as_bytes()[..FINGERPRINT_HEX_LEN / 2])
}
