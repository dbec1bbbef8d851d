//! Deterministic content digest of a synced directory.
//!
//! Used to report what a sync produced and to compare two runs against the
//! same upstream.

use anyhow::Context;
use std::fs;
use std::path::Path;

/// Compute a blake3 digest of a directory tree.
///
/// Entries are visited in lexicographic order. Files contribute
/// `relative_path || 0x00 || content`, directories `relative_path || 0xFF`,
/// and symlinks `relative_path || 0x01 || link_target`. File timestamps are
/// not part of the digest.
pub fn hash_tree(path: &Path) -> anyhow::Result<String> {
    let mut hasher = blake3::Hasher::new();
    hash_dir(&mut hasher, path, "")?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_dir(hasher: &mut blake3::Hasher, dir: &Path, base: &str) -> anyhow::Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        let rel_path = if base.is_empty() {
            name.to_string_lossy().into_owned()
        } else {
            format!("{}/{}", base, name.to_string_lossy())
        };

        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat file: {}", entry.path().display()))?;

        hasher.update(rel_path.as_bytes());
        if ty.is_dir() {
            hasher.update(&[0xFF]);
            hash_dir(hasher, &entry.path(), &rel_path)?;
        } else if ty.is_symlink() {
            hasher.update(&[0x01]);
            let target = fs::read_link(entry.path())
                .with_context(|| format!("Failed to read symlink: {}", entry.path().display()))?;
            hasher.update(target.to_string_lossy().as_bytes());
        } else {
            hasher.update(&[0x00]);
            let content = fs::read(entry.path())
                .with_context(|| format!("Failed to read file: {}", entry.path().display()))?;
            hasher.update(&content);
        }
    }

    Ok(())
}
