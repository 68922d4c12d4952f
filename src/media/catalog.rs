use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::media::mime::is_video;

/// Identity of a video: its file name (extension included) inside the source
/// directory.
///
/// A valid id is always a single path component, so joining it onto a
/// directory can never escape that directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoIdError {
    #[error("video name is empty")]
    Empty,
    #[error("video name {0:?} is reserved")]
    Reserved(String),
    #[error("video name {0:?} contains a path separator or NUL")]
    Separator(String),
}

impl VideoId {
    pub fn new(name: impl Into<String>) -> Result<Self, VideoIdError> {
        let name = name.into();
        if name.is_empty() {
            return Err(VideoIdError::Empty);
        }
        if name == "." || name == ".." {
            return Err(VideoIdError::Reserved(name));
        }
        if name.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
            return Err(VideoIdError::Separator(name));
        }
        Ok(VideoId(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Ord and Eq are derived from the inner String, so borrowing as str is
// consistent with them.
impl Borrow<str> for VideoId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The videos present in the source directory at scan time, sorted by name.
/// Always a fresh projection of the filesystem; never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    videos: BTreeSet<VideoId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: VideoId) -> bool {
        self.videos.insert(id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.videos.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VideoId> {
        self.videos.iter()
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

impl FromIterator<VideoId> for Catalog {
    fn from_iter<I: IntoIterator<Item = VideoId>>(iter: I) -> Self {
        Catalog {
            videos: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("cannot read source directory {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// List the videos directly inside `dir`.
///
/// Only regular files (symlinks are followed) whose name ends in a recognized
/// video extension are returned. Any failure to read the directory itself is
/// fatal: a partial catalog is never returned.
pub fn scan(dir: &Path) -> Result<Catalog, ScanError> {
    let start = Instant::now();
    let unreadable = |source| ScanError::Unreadable {
        path: dir.to_owned(),
        source,
    };

    let mut catalog = Catalog::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!("Skipping non UTF-8 file name in {}", dir.display());
            continue;
        };
        if !is_video(&name) {
            continue;
        }
        // Follows symlinks; a dangling link is simply not a video.
        match std::fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("Cannot stat {}: {}", entry.path().display(), e);
                continue;
            }
        }
        match VideoId::new(name) {
            Ok(id) => {
                catalog.insert(id);
            }
            Err(e) => tracing::warn!("Skipping video: {}", e),
        }
    }

    tracing::debug!(
        "Scanned {} videos in {} ({:.1}ms)",
        catalog.len(),
        dir.display(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(catalog)
}
