//! The resource manifest (`resources.json`).
//!
//! A manifest is an ordered JSON array of entries:
//!
//! ```json
//! [
//!   { "name": "Info", "type": "file", "url": "https://example.com/info.json", "path": "data/info.json" },
//!   { "name": "Docs", "type": "git", "url": "https://example.com/repo.git", "path": "local/docs",
//!     "sparse_checkout": ["docs"], "move_from": "docs", "files_filter": "\\.md$" }
//! ]
//! ```
//!
//! Loading only checks the JSON shape. Each entry is validated on its own
//! so one bad entry never prevents the others from running.

mod entry;
mod error;

use std::path::Path;

use anyhow::Context;

pub use entry::{DEFAULT_GIT_REF, GitSource, RawEntry, ResourceEntry, ResourceKind};
pub use error::EntryError;

/// Read and parse a manifest file.
pub fn load_manifest(path: &Path) -> anyhow::Result<Vec<RawEntry>> {
    if !path.exists() {
        anyhow::bail!("Manifest not found: {}", path.display());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    parse_manifest_str(&content)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))
}

pub fn parse_manifest_str(content: &str) -> anyhow::Result<Vec<RawEntry>> {
    serde_json::from_str(content).context("Manifest must be a JSON array of resource entries")
}

/// Index pairs of entries whose targets are equal or nested in one another.
pub fn overlapping_targets(entries: &[ResourceEntry]) -> Vec<(usize, usize)> {
    let mut overlaps = Vec::new();
    for (i, a) in entries.iter().enumerate() {
        for (j, b) in entries.iter().enumerate().skip(i + 1) {
            if a.target.starts_with(&b.target) || b.target.starts_with(&a.target) {
                overlaps.push((i, j));
            }
        }
    }
    overlaps
}
