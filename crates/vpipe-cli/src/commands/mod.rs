//! CLI command implementations

pub mod backends;
pub mod convert;
pub mod selftest;

use anyhow::{Context, Result};
use std::path::Path;
use vpipe_graph::VideoType;

/// Parse a capture format name
pub fn parse_video_type(name: &str) -> Result<VideoType> {
    name.parse()
        .with_context(|| format!("Unknown capture format '{name}'"))
}

/// Load a raw frame from path
pub fn load_frame(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to load: {}", path.display()))
}

/// Save a raw frame to path
pub fn save_frame(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to save: {}", path.display()))
}
