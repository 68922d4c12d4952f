use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use crate::media::catalog::{scan, Catalog, ScanError, VideoId};
use crate::media::extract::FrameExtractor;
use crate::media::thumbs::{video_id_of, PutOutcome, ThumbnailStore};

pub const DEFAULT_EXTRACT_JOBS: usize = 4;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Videos present at scan time. Always complete, whether or not every
    /// video got a thumbnail.
    pub catalog: Catalog,
    /// Artifact names deleted because their video is gone.
    pub removed: Vec<String>,
    /// Videos whose thumbnail was created during this pass.
    pub generated: Vec<VideoId>,
    /// Videos still without a thumbnail. Retried on the next pass.
    pub failed: Vec<VideoId>,
}

impl Reconciliation {
    pub fn has_thumbnail(&self, id: &VideoId) -> bool {
        self.catalog.contains(id.as_str()) && !self.failed.contains(id)
    }

    /// True if the pass wrote or deleted anything.
    pub fn changed(&self) -> bool {
        !self.removed.is_empty() || !self.generated.is_empty()
    }
}

/// Keeps a [`ThumbnailStore`] in step with the videos of a source directory.
///
/// Each pass scans the directory, deletes orphaned artifacts and backfills
/// missing ones. Passes are serialized; extraction inside a pass runs up to
/// `jobs` videos at a time.
pub struct Reconciler {
    source: PathBuf,
    store: ThumbnailStore,
    extractor: Arc<dyn FrameExtractor>,
    jobs: usize,
    pass: Mutex<()>,
}

impl Reconciler {
    pub fn new(source: impl Into<PathBuf>, store: ThumbnailStore, extractor: Arc<dyn FrameExtractor>) -> Self {
        Reconciler {
            source: source.into(),
            store,
            extractor,
            jobs: DEFAULT_EXTRACT_JOBS,
            pass: Mutex::new(()),
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn store(&self) -> &ThumbnailStore {
        &self.store
    }

    /// Run one full pass and return the current catalog.
    ///
    /// Fails only when the source directory cannot be read, in which case the
    /// store is not touched. Cache I/O errors and extraction failures are
    /// logged and leave gaps that the next pass fills.
    pub async fn reconcile(&self) -> Result<Reconciliation, ScanError> {
        let _pass = self.pass.lock().await;
        let start = Instant::now();

        let source = self.source.clone();
        let store = self.store.clone();
        let (catalog, removed, missing) = blocking(move || collect_garbage(&source, &store)).await?;

        let results: Vec<(VideoId, bool)> = stream::iter(missing)
            .map(|id| self.backfill(id))
            .buffer_unordered(self.jobs)
            .collect()
            .await;

        let mut generated = Vec::new();
        let mut failed = Vec::new();
        for (id, ok) in results {
            if ok {
                generated.push(id);
            } else {
                failed.push(id);
            }
        }
        generated.sort();
        failed.sort();

        let pass = Reconciliation {
            catalog,
            removed,
            generated,
            failed,
        };
        if pass.changed() {
            tracing::info!(
                "Reconciled {} videos: {} thumbnails removed, {} generated, {} missing ({:.2}s)",
                pass.catalog.len(),
                pass.removed.len(),
                pass.generated.len(),
                pass.failed.len(),
                start.elapsed().as_secs_f64()
            );
        } else {
            tracing::debug!(
                "Reconciled {} videos, no changes ({} missing)",
                pass.catalog.len(),
                pass.failed.len()
            );
        }
        Ok(pass)
    }

    /// Extract and store one thumbnail. Returns whether an artifact exists
    /// afterwards.
    async fn backfill(&self, id: VideoId) -> (VideoId, bool) {
        let video = self.source.join(id.as_str());
        let Some(frame) = self.extractor.extract(&video).await else {
            tracing::warn!("No thumbnail for {}: frame extraction failed", id);
            return (id, false);
        };

        let store = self.store.clone();
        let key = id.clone();
        match blocking(move || store.put(&key, &frame)).await {
            Ok(PutOutcome::Written) => {
                tracing::debug!("Generated thumbnail for {}", id);
                (id, true)
            }
            Ok(PutOutcome::AlreadyPresent) => (id, true),
            Err(e) => {
                tracing::warn!("Cannot store thumbnail for {}: {}", id, e);
                (id, false)
            }
        }
    }
}

/// Scan the source, delete orphans and return the catalog, the deleted
/// artifact names and the videos that still need a thumbnail.
fn collect_garbage(
    source: &Path,
    store: &ThumbnailStore,
) -> Result<(Catalog, Vec<String>, Vec<VideoId>), ScanError> {
    let catalog = scan(source)?;

    let mut removed = Vec::new();
    match store.list() {
        Ok(stored) => {
            for name in stored {
                // Only artifact names are ever deleted; anything else in the
                // cache root is not ours to remove.
                let Some(id) = video_id_of(&name) else {
                    tracing::debug!("Leaving unrecognized cache entry {}", name);
                    continue;
                };
                if catalog.contains(id) {
                    continue;
                }
                match store.delete(&name) {
                    Ok(true) => {
                        tracing::info!("Removed orphaned thumbnail {}", name);
                        removed.push(name);
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!("Cannot remove orphaned thumbnail: {}", e),
                }
            }
        }
        Err(e) => tracing::warn!("Skipping thumbnail cleanup: {}", e),
    }

    let missing = catalog
        .iter()
        .filter(|id| !store.exists(id))
        .cloned()
        .collect();
    Ok((catalog, removed, missing))
}

async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => value,
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}
