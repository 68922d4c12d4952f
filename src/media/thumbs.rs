use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::media::catalog::VideoId;
use crate::media::mime::is_video;

/// Suffix appended to a video id to form its artifact file name.
pub const ARTIFACT_SUFFIX: &str = ".jpg";

/// Output dimensions of every stored thumbnail.
pub const THUMB_WIDTH: u32 = 320;
pub const THUMB_HEIGHT: u32 = 180;

// In-flight writes are named `.<uuid>.tmp` and never end in ARTIFACT_SUFFIX.
const TEMP_PREFIX: &str = ".";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.to_owned(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    /// An artifact was already stored under this id and was left untouched.
    AlreadyPresent,
}

/// Directory-backed cache of one JPEG thumbnail per video.
///
/// The store owns every file in its root. Writes go through a temp file that
/// is hard-linked into place, so an artifact is either absent or complete and
/// an existing artifact is never replaced.
#[derive(Debug, Clone)]
pub struct ThumbnailStore {
    root: PathBuf,
}

impl ThumbnailStore {
    /// Open the store at `root`, creating the directory if needed and removing
    /// temp files left behind by interrupted writes.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = ThumbnailStore { root: root.into() };
        store.ensure_root()?;
        let entries = std::fs::read_dir(&store.root)
            .map_err(|e| StoreError::io("read", &store.root, e))?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_str().is_some_and(is_temp_name) {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => tracing::debug!("Removed stale temp file {}", entry.path().display()),
                    Err(e) => tracing::warn!("Cannot remove stale temp file {}: {}", entry.path().display(), e),
                }
            }
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the artifact for `id` lives. Pure and injective over valid ids.
    pub fn artifact_path_for(&self, id: &VideoId) -> PathBuf {
        self.root.join(artifact_name_for(id))
    }

    /// Names of all stored artifacts. In-flight temp files are not listed.
    /// A root that does not exist yet lists as empty.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("list", &self.root, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io("list", &self.root, e))?;
            match entry.file_name().into_string() {
                Ok(name) if is_temp_name(&name) => {}
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::warn!("Ignoring non UTF-8 entry {:?} in thumbnail cache", raw)
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn exists(&self, id: &VideoId) -> bool {
        self.artifact_path_for(id).is_file()
    }

    /// Remove a stored artifact by name. Returns `Ok(false)` if it was already
    /// gone.
    pub fn delete(&self, artifact_name: &str) -> Result<bool, StoreError> {
        // Names come from list(), but never follow one outside the root.
        if artifact_name.contains(|c: char| matches!(c, '/' | '\\')) || artifact_name == ".." {
            return Ok(false);
        }
        let path = self.root.join(artifact_name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io("delete", &path, e)),
        }
    }

    /// Store `bytes` as the artifact for `id` unless one already exists.
    ///
    /// Something other than a regular file squatting on the artifact name is
    /// an error, not an existing artifact.
    pub fn put(&self, id: &VideoId, bytes: &[u8]) -> Result<PutOutcome, StoreError> {
        let target = self.artifact_path_for(id);
        if self.exists(id) {
            return Ok(PutOutcome::AlreadyPresent);
        }
        self.ensure_root()?;

        let tmp = self
            .root
            .join(format!("{TEMP_PREFIX}{}{TEMP_SUFFIX}", Uuid::new_v4().simple()));
        let result = write_synced(&tmp, bytes)
            .map_err(|e| StoreError::io("write", &tmp, e))
            .and_then(|()| match std::fs::hard_link(&tmp, &target) {
                Ok(()) => Ok(PutOutcome::Written),
                Err(e) if e.kind() == ErrorKind::AlreadyExists && target.is_file() => {
                    Ok(PutOutcome::AlreadyPresent)
                }
                Err(e) => Err(StoreError::io("link", &target, e)),
            });
        if let Err(e) = std::fs::remove_file(&tmp) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Cannot remove temp file {}: {}", tmp.display(), e);
            }
        }
        result
    }

    /// Read the artifact for `id`, or `None` if none is stored.
    pub fn read(&self, id: &VideoId) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.artifact_path_for(id);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io("read", &path, e)),
        }
    }

    fn ensure_root(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root).map_err(|e| StoreError::io("create", &self.root, e))
    }
}

pub fn artifact_name_for(id: &VideoId) -> String {
    format!("{}{ARTIFACT_SUFFIX}", id.as_str())
}

/// Inverse of [`artifact_name_for`]: the video id an artifact belongs to, or
/// `None` if the name is not an artifact name at all. Video files themselves
/// never qualify.
pub fn video_id_of(artifact_name: &str) -> Option<&str> {
    if is_video(artifact_name) {
        return None;
    }
    artifact_name
        .strip_suffix(ARTIFACT_SUFFIX)
        .filter(|id| !id.is_empty())
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
