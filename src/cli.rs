use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vidshelf",
    about = "Browse and stream a directory of videos from any device on your network",
    long_about = None,
    version,
)]
pub struct Args {
    /// Directory containing the videos to serve [default: current directory]
    pub dir: Option<PathBuf>,

    /// HTTP port to listen on [default: 5000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory holding generated thumbnails [default: <DIR>/thumbnails]
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Path to TOML config file (overrides default search: ./vidshelf.toml, ~/.config/vidshelf/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bind to localhost only (127.0.0.1) instead of all interfaces (0.0.0.0 + :::)
    #[arg(long)]
    pub localhost: bool,

    /// ffmpeg binary used to grab thumbnail frames [default: ffmpeg]
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Seconds allowed for extracting one thumbnail [default: 15]
    #[arg(long, value_name = "SECS")]
    pub extract_timeout: Option<u64>,

    /// Thumbnails extracted in parallel during a refresh [default: 4]
    #[arg(short, long)]
    pub jobs: Option<usize>,
}
