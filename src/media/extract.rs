use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::media::thumbs::{THUMB_HEIGHT, THUMB_WIDTH};

pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(15);

/// Produces a single still frame for a video, already scaled to the
/// thumbnail dimensions and encoded as JPEG.
///
/// Extraction never fails loudly: an unreadable, empty or corrupt video yields
/// `None`, and the caller retries on a later pass.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract(&self, video: &Path) -> Option<Vec<u8>>;
}

/// Grabs the first frame of a video with the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegExtractor {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        FfmpegExtractor {
            program: program.into(),
            timeout,
        }
    }

    /// Check that the configured binary can be run at all.
    pub async fn probe(&self) -> bool {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;
        matches!(status, Ok(s) if s.success())
    }

    fn command(&self, video: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-nostdin", "-v", "error", "-i"])
            .arg(video.as_os_str())
            .args(["-frames:v", "1", "-vf"])
            // Exact size, aspect ratio is not preserved.
            .arg(format!("scale={THUMB_WIDTH}:{THUMB_HEIGHT}"))
            .args(["-f", "image2pipe", "-vcodec", "mjpeg", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        FfmpegExtractor::new("ffmpeg", DEFAULT_EXTRACT_TIMEOUT)
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(&self, video: &Path) -> Option<Vec<u8>> {
        let mut cmd = self.command(video);
        // Dropping the future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!("Failed to spawn {}: {}", self.program.display(), e);
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    "Frame extraction timed out after {:?}: {}",
                    self.timeout,
                    video.display()
                );
                return None;
            }
        };

        if !output.status.success() {
            tracing::debug!(
                "ffmpeg exited with {} for {}: {}",
                output.status,
                video.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }
        if output.stdout.is_empty() {
            tracing::debug!("ffmpeg produced no frame for {}", video.display());
            return None;
        }
        Some(output.stdout)
    }
}
