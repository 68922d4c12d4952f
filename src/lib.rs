//! Local-network video browser: scan a directory, keep a thumbnail cache in
//! step with it, and stream videos to a browser over HTTP.

pub mod cli;
pub mod config;
pub mod http;
pub mod media;
pub mod net;
