//! Directory cataloging for upload.
//!
//! Walks a directory tree into fingerprinted [`AssetFile`]s keyed by their
//! publish name (relative path normalized to forward slashes). Sibling
//! entries are visited concurrently so stat and hash I/O overlap.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures_util::future::{BoxFuture, try_join_all};
use pagepush_protocol::Manifest;
use pagepush_protocol::constants::{DEFAULT_CONTENT_TYPE, MAX_ASSET_COUNT, MAX_ASSET_SIZE};
use tracing::debug;

use crate::TransferError;
use crate::fingerprint::fingerprint_file;
use crate::types::AssetFile;

/// Per-file and per-deployment limits enforced while cataloging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLimits {
    pub max_asset_size: u64,
    pub max_asset_count: usize,
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_asset_size: MAX_ASSET_SIZE,
            max_asset_count: MAX_ASSET_COUNT,
        }
    }
}

/// Fingerprinted files of one deployment, keyed by publish name.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    files: BTreeMap<String, AssetFile>,
}

impl AssetCatalog {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AssetFile> {
        self.files.get(name)
    }

    /// Files ordered by publish name.
    pub fn files(&self) -> impl Iterator<Item = &AssetFile> {
        self.files.values()
    }

    /// Sum of all file sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }

    /// Every fingerprint in the deployment, in publish-name order.
    pub fn fingerprints(&self) -> Vec<String> {
        self.files.values().map(|f| f.fingerprint.clone()).collect()
    }

    /// Public path to fingerprint mapping for the deployment commit.
    pub fn manifest(&self) -> Manifest {
        self.files
            .iter()
            .map(|(name, file)| (name.clone(), file.fingerprint.clone()))
            .collect()
    }
}

impl FromIterator<AssetFile> for AssetCatalog {
    fn from_iter<I: IntoIterator<Item = AssetFile>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(|f| (f.name.clone(), f)).collect(),
        }
    }
}

/// Catalogs `root` with the default deployment limits.
pub async fn build_catalog(root: &Path) -> Result<AssetCatalog, TransferError> {
    build_catalog_with_limits(root, CatalogLimits::default()).await
}

/// Catalogs `root`, failing on the first file above `max_asset_size` and,
/// once the walk completes, if more than `max_asset_count` files were found.
pub async fn build_catalog_with_limits(
    root: &Path,
    limits: CatalogLimits,
) -> Result<AssetCatalog, TransferError> {
    let root = tokio::fs::canonicalize(root).await?;
    let files = walk_dir(&root, root.clone(), &limits).await?;

    if files.len() > limits.max_asset_count {
        return Err(TransferError::TooManyAssets {
            count: files.len(),
            limit: limits.max_asset_count,
        });
    }

    let catalog: AssetCatalog = files.into_iter().collect();
    debug!(
        root = %root.display(),
        files = catalog.len(),
        total_bytes = catalog.total_size(),
        "catalog complete"
    );
    Ok(catalog)
}

fn walk_dir<'a>(
    root: &'a Path,
    dir: PathBuf,
    limits: &'a CatalogLimits,
) -> BoxFuture<'a, Result<Vec<AssetFile>, TransferError>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut pending = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            pending.push(visit_entry(root, entry.path(), limits));
        }

        let nested = try_join_all(pending).await?;
        Ok(nested.into_iter().flatten().collect())
    })
}

async fn visit_entry(
    root: &Path,
    path: PathBuf,
    limits: &CatalogLimits,
) -> Result<Vec<AssetFile>, TransferError> {
    let metadata = tokio::fs::metadata(&path).await?;

    if metadata.is_dir() {
        return walk_dir(root, path, limits).await;
    }
    if !metadata.is_file() {
        return Ok(Vec::new());
    }

    let name = publish_name(root, &path)?;

    let size = metadata.len();
    if size > limits.max_asset_size {
        return Err(TransferError::AssetTooLarge {
            name,
            size,
            limit: limits.max_asset_size,
        });
    }

    let fingerprint = tokio::task::spawn_blocking({
        let path = path.clone();
        move || fingerprint_file(&path)
    })
    .await
    .map_err(|e| TransferError::Task(format!("fingerprint task: {e}")))??;

    let content_type = mime_guess::from_path(&name)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    Ok(vec![AssetFile {
        path,
        name,
        content_type,
        size,
        fingerprint,
    }])
}

/// Relative path of `path` under `root`, joined with `/` on every platform.
fn publish_name(root: &Path, path: &Path) -> Result<String, TransferError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| TransferError::InvalidPath(format!("{} is outside {}", path.display(), root.display())))?;

    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return Err(TransferError::InvalidPath(format!(
            "{} has no name below the deployment root",
            path.display()
        )));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint_bytes;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("index.html"), b"<html></html>").unwrap();
        fs::write(root.join("manifest.json"), b"[]").unwrap();

        fs::create_dir_all(root.join("tracks").join("2024")).unwrap();
        fs::write(root.join("tracks").join("intro.mp3"), b"ID3-INTRO").unwrap();
        fs::write(
            root.join("tracks").join("2024").join("outro.mp3"),
            b"ID3-OUTRO-LONGER",
        )
        .unwrap();

        dir
    }

    #[tokio::test]
    async fn catalog_finds_all_files() {
        let dir = create_test_tree();
        let catalog = build_catalog(dir.path()).await.unwrap();

        assert_eq!(catalog.len(), 4);
        let names: Vec<&str> = catalog.files().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "index.html",
                "manifest.json",
                "tracks/2024/outro.mp3",
                "tracks/intro.mp3"
            ]
        );

        let expected_size = b"<html></html>".len()
            + b"[]".len()
            + b"ID3-INTRO".len()
            + b"ID3-OUTRO-LONGER".len();
        assert_eq!(catalog.total_size(), expected_size as u64);
    }

    #[tokio::test]
    async fn catalog_records_metadata() {
        let dir = create_test_tree();
        let catalog = build_catalog(dir.path()).await.unwrap();

        let intro = catalog.get("tracks/intro.mp3").unwrap();
        assert_eq!(intro.size, 9);
        assert_eq!(intro.content_type, "audio/mpeg");
        assert_eq!(intro.fingerprint, fingerprint_bytes(b"ID3-INTRO", "mp3"));
        assert!(intro.path.is_absolute());

        let html = catalog.get("index.html").unwrap();
        assert_eq!(html.content_type, "text/html");
    }

    #[tokio::test]
    async fn unknown_extension_defaults_to_octet_stream() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.zzqx"), b"??").unwrap();
        fs::write(dir.path().join("LICENSE"), b"text").unwrap();

        let catalog = build_catalog(dir.path()).await.unwrap();
        assert_eq!(
            catalog.get("blob.zzqx").unwrap().content_type,
            DEFAULT_CONTENT_TYPE
        );
        assert_eq!(catalog.get("LICENSE").unwrap().content_type, DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn manifest_uses_slash_prefixed_paths() {
        let dir = create_test_tree();
        let catalog = build_catalog(dir.path()).await.unwrap();
        let manifest = catalog.manifest();

        assert_eq!(manifest.len(), 4);
        assert_eq!(
            manifest.get("/tracks/intro.mp3"),
            Some(catalog.get("tracks/intro.mp3").unwrap().fingerprint.as_str())
        );
        assert_eq!(catalog.fingerprints().len(), 4);
    }

    #[tokio::test]
    async fn oversized_file_fails_validation() {
        let dir = create_test_tree();
        // Sparse file: the size check happens before any content is read.
        let big = fs::File::create(dir.path().join("tracks").join("huge.mp3")).unwrap();
        big.set_len(60 * 1024 * 1024).unwrap();

        let err = build_catalog(dir.path()).await.unwrap_err();
        assert!(err.is_validation());
        match err {
            TransferError::AssetTooLarge { name, size, limit } => {
                assert_eq!(name, "tracks/huge.mp3");
                assert_eq!(size, 60 * 1024 * 1024);
                assert_eq!(limit, MAX_ASSET_SIZE);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn file_at_exact_limit_is_accepted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.bin"), vec![0u8; 16]).unwrap();

        let limits = CatalogLimits {
            max_asset_size: 16,
            max_asset_count: 10,
        };
        let catalog = build_catalog_with_limits(dir.path(), limits).await.unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn too_many_files_fails_after_walk() {
        let dir = create_test_tree();
        let limits = CatalogLimits {
            max_asset_size: MAX_ASSET_SIZE,
            max_asset_count: 3,
        };

        let err = build_catalog_with_limits(dir.path(), limits)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::TooManyAssets { count: 4, limit: 3 }
        ));
    }

    #[tokio::test]
    async fn catalog_empty_dir() {
        let dir = TempDir::new().unwrap();
        let catalog = build_catalog(dir.path()).await.unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.total_size(), 0);
    }

    #[tokio::test]
    async fn catalog_nonexistent_dir() {
        let result = build_catalog(Path::new("/nonexistent/path/that/does/not/exist")).await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[test]
    fn publish_name_is_relative_and_slash_separated() {
        let root = Path::new("/srv/site");
        assert_eq!(
            publish_name(root, Path::new("/srv/site/Artist/01 intro.mp3")).unwrap(),
            "Artist/01 intro.mp3"
        );
        assert!(matches!(
            publish_name(root, root),
            Err(TransferError::InvalidPath(_))
        ));
        assert!(matches!(
            publish_name(root, Path::new("/etc/passwd")),
            Err(TransferError::InvalidPath(_))
        ));
    }
}
