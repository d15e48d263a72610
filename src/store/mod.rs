//! Filesystem-backed persistence of detection results.

mod layout;

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use tokio::fs as async_fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::DetectionResult;

pub use layout::{ArtifactLayout, staging_path};

/// Storage for detection results, keyed by id.
pub trait ResultRepository: Send + Sync {
    /// Paths of the artifacts stored alongside each record.
    fn layout(&self) -> &ArtifactLayout;

    /// Persist a result. An existing record with the same id is replaced.
    fn save(&self, result: &DetectionResult) -> impl Future<Output = Result<()>> + Send;

    /// Fails with [`Error::NotFound`] for an unknown id.
    fn get(&self, id: Uuid) -> impl Future<Output = Result<DetectionResult>> + Send;

    /// Every stored result, most recent first. Records without a usable
    /// timestamp come last.
    fn list(&self) -> impl Future<Output = Result<Vec<DetectionResult>>> + Send;
}

/// Stores each result as `results/<id>.json` under a data root, next to the
/// normalized and annotated images of the same id.
#[derive(Debug, Clone)]
pub struct FsResultStore {
    layout: ArtifactLayout,
}

impl FsResultStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open<P: AsRef<Path>>(root: P, image_url_prefix: impl Into<String>) -> Result<Self> {
        let layout = ArtifactLayout::new(root, image_url_prefix);
        for dir in [layout.processed_dir(), layout.output_dir(), layout.results_dir()] {
            async_fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::storage(&dir, e))?;
        }
        Ok(Self { layout })
    }

    /// Path of the annotated image for `id`, if it exists.
    pub async fn annotated_image(&self, id: Uuid) -> Result<PathBuf> {
        let path = self.layout.annotated_path(id);
        match async_fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(Error::NotFound(id)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(id)),
            Err(e) => Err(Error::storage(&path, e)),
        }
    }

    async fn read_record(path: &Path) -> Result<DetectionResult> {
        let raw = async_fs::read(path)
            .await
            .map_err(|e| Error::storage(path, e))?;
        serde_json::from_slice(&raw).map_err(|source| Error::CorruptRecord {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Write `bytes` to `path` through a staging file and a rename, so readers
/// never observe a partial file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let staged = staging_path(path);
    async_fs::write(&staged, bytes)
        .await
        .map_err(|e| Error::storage(&staged, e))?;
    async_fs::rename(&staged, path)
        .await
        .map_err(|e| Error::storage(path, e))
}

/// Blocking counterpart of [`write_atomic`] for encoded images.
pub fn save_image_atomic(path: &Path, image: &DynamicImage, format: ImageFormat) -> Result<()> {
    let staged = staging_path(path);
    image
        .save_with_format(&staged, format)
        .map_err(|e| Error::storage(&staged, std::io::Error::other(e)))?;
    std::fs::rename(&staged, path).map_err(|e| Error::storage(path, e))
}

fn is_record_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    !hidden && path.extension().and_then(|e| e.to_str()) == Some("json")
}

impl ResultRepository for FsResultStore {
    fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    async fn save(&self, result: &DetectionResult) -> Result<()> {
        let path = self.layout.record_path(result.id);
        let bytes = serde_json::to_vec_pretty(result).map_err(|source| Error::CorruptRecord {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes).await?;
        debug!("Saved result {} to {}", result.id, path.display());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<DetectionResult> {
        let path = self.layout.record_path(id);
        match Self::read_record(&path).await {
            Err(Error::Storage { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(id))
            }
            other => other,
        }
    }

    async fn list(&self) -> Result<Vec<DetectionResult>> {
        let dir = self.layout.results_dir();
        let mut entries = match async_fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(&dir, e)),
        };

        let mut results = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::storage(&dir, e))?
        {
            let path = entry.path();
            if !is_record_file(&path) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(result) => results.push(result),
                // Removed between the scan and the read
                Err(Error::Storage { source, .. }) if source.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        // None sorts below every timestamp, so undated records land last
        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(results)
    }
}
