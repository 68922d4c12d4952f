use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::media::extract::DEFAULT_EXTRACT_TIMEOUT;
use crate::media::reconcile::DEFAULT_EXTRACT_JOBS;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_CACHE_SUBDIR: &str = "thumbnails";
const DEFAULT_FFMPEG: &str = "ffmpeg";

#[derive(Deserialize, Default, Debug)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub localhost: Option<bool>,
    pub ffmpeg: Option<PathBuf>,
    pub extract_timeout_secs: Option<u64>,
    pub extract_jobs: Option<usize>,
}

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub dir: PathBuf,
    pub cache_dir: PathBuf,
    pub localhost: bool,
    pub ffmpeg: PathBuf,
    pub extract_timeout: Duration,
    pub extract_jobs: usize,
}

impl Config {
    /// Merge CLI flags over the config file over built-in defaults.
    pub fn resolve(file: Option<FileConfig>, args: &crate::cli::Args) -> Self {
        let file = file.unwrap_or_default();
        let dir = args
            .dir
            .clone()
            .or(file.dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let cache_dir = args
            .cache_dir
            .clone()
            .or(file.cache_dir)
            .unwrap_or_else(|| dir.join(DEFAULT_CACHE_SUBDIR));
        Config {
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            cache_dir,
            dir,
            localhost: args.localhost || file.localhost.unwrap_or(false),
            ffmpeg: args
                .ffmpeg
                .clone()
                .or(file.ffmpeg)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG)),
            extract_timeout: args
                .extract_timeout
                .or(file.extract_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_EXTRACT_TIMEOUT),
            extract_jobs: args
                .jobs
                .or(file.extract_jobs)
                .unwrap_or(DEFAULT_EXTRACT_JOBS)
                .max(1),
        }
    }

    /// Reject a cache directory that would hold the videos themselves.
    ///
    /// Cleanup deletes every `*.jpg` it cannot match to a video, so the cache
    /// root must not be `dir` or any ancestor of it. A cache that does not
    /// exist yet cannot overlap an existing source.
    pub fn check_cache_dir(&self) -> Result<(), ConfigError> {
        let (Ok(cache), Ok(source)) = (self.cache_dir.canonicalize(), self.dir.canonicalize()) else {
            return Ok(());
        };
        if source.starts_with(&cache) {
            return Err(ConfigError::CacheContainsSource {
                cache_dir: self.cache_dir.clone(),
            });
        }
        Ok(())
    }
}

pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    let cwd_config = PathBuf::from("vidshelf.toml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }
    let user_config = dirs::config_dir()?.join("vidshelf").join("config.toml");
    user_config.exists().then_some(user_config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("thumbnail cache {} must not be the video directory or one of its parents", .cache_dir.display())]
    CacheContainsSource { cache_dir: PathBuf },
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
