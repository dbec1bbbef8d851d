//! Recursive tree copies with optional per-file filtering.
//!
//! Two flavours are provided:
//! - [`copy_tree`] mirrors a directory as-is, keeping permissions and mtimes.
//! - [`copy_filtered`] only copies files accepted by a [`PathFilter`] and
//!   prunes directories that end up empty.
//!
//! Directories are never tested against the filter themselves.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use filetime::FileTime;
use regex::Regex;

/// Predicate deciding whether a source file is copied.
pub trait PathFilter: Send + Sync {
    fn matches(&self, path: &Path) -> bool;
}

impl<F> PathFilter for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn matches(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Regex filter using search semantics: any match inside the path qualifies.
///
/// Paths are rendered with `/` separators before matching so manifests stay
/// portable across platforms.
#[derive(Debug, Clone)]
pub struct RegexFilter {
    pattern: Regex,
}

impl RegexFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl PathFilter for RegexFilter {
    fn matches(&self, path: &Path) -> bool {
        self.pattern.is_match(&slash_path(path))
    }
}

/// Presents paths to an inner filter relative to `root`.
///
/// Paths outside `root` are passed through unchanged.
pub struct RootRelative<'a> {
    root: PathBuf,
    inner: &'a dyn PathFilter,
}

impl<'a> RootRelative<'a> {
    pub fn new(root: impl Into<PathBuf>, inner: &'a dyn PathFilter) -> Self {
        Self {
            root: root.into(),
            inner,
        }
    }
}

impl PathFilter for RootRelative<'_> {
    fn matches(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.inner.matches(relative)
    }
}

fn slash_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '\\' {
        raw.replace('\\', "/")
    } else {
        raw.into_owned()
    }
}

/// Copy a single entry (file, directory or symlink) from `src` to `dst`.
///
/// Directories go through [`copy_filtered`] when a filter is given, and are
/// removed again if nothing inside them matched.
pub fn copy_entry(src: &Path, dst: &Path, filter: Option<&dyn PathFilter>) -> anyhow::Result<()> {
    let ty = fs::symlink_metadata(src)
        .with_context(|| format!("Failed to stat: {}", src.display()))?
        .file_type();

    if ty.is_dir() {
        match filter {
            Some(filter) => {
                copy_filtered(src, dst, Some(filter))?;
                prune_if_empty(dst)?;
            }
            None => copy_tree(src, dst)?,
        }
    } else if filter.is_none_or(|f| f.matches(src)) {
        copy_file(src, dst)?;
    }
    Ok(())
}

/// Copy `src` into `dst`, keeping only files accepted by `filter`.
///
/// `dst` is created if needed. Child directories left empty after
/// filtering are deleted; `dst` itself is left for the caller to judge.
pub fn copy_filtered(
    src: &Path,
    dst: &Path,
    filter: Option<&dyn PathFilter>,
) -> anyhow::Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)
            .with_context(|| format!("Failed to create directory: {}", dst.display()))?;
    }

    for entry in sorted_entries(src)? {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat: {}", src_path.display()))?;

        if ty.is_dir() {
            copy_filtered(&src_path, &dst_path, filter)?;
            prune_if_empty(&dst_path)?;
        } else if filter.is_none_or(|f| f.matches(&src_path)) {
            copy_file(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Mirror a directory tree without filtering, preserving file metadata.
pub fn copy_tree(src: &Path, dst: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;

    for entry in sorted_entries(src)? {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat: {}", src_path.display()))?;

        if ty.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else {
            copy_file(&src_path, &dst_path)?;
        }
    }

    // Children are written first, so the directory mtime is restored last.
    copy_times(src, dst)
}

/// Copy one file with its permissions and timestamps. Symlinks are
/// recreated rather than followed.
fn copy_file(src: &Path, dst: &Path) -> anyhow::Result<()> {
    let meta = fs::symlink_metadata(src)
        .with_context(|| format!("Failed to stat: {}", src.display()))?;

    if meta.file_type().is_symlink() {
        return copy_symlink(src, dst);
    }

    fs::copy(src, dst).with_context(|| {
        format!("Failed to copy {} to {}", src.display(), dst.display())
    })?;
    copy_times(src, dst)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> anyhow::Result<()> {
    let target = fs::read_link(src)
        .with_context(|| format!("Failed to read symlink: {}", src.display()))?;
    if fs::symlink_metadata(dst).is_ok() {
        fs::remove_file(dst)
            .with_context(|| format!("Failed to replace: {}", dst.display()))?;
    }
    std::os::unix::fs::symlink(&target, dst)
        .with_context(|| format!("Failed to create symlink: {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> anyhow::Result<()> {
    tracing::warn!("Skipping symlink (unsupported on this platform): {}", src.display());
    Ok(())
}

fn copy_times(src: &Path, dst: &Path) -> anyhow::Result<()> {
    let meta =
        fs::metadata(src).with_context(|| format!("Failed to stat: {}", src.display()))?;
    filetime::set_file_times(
        dst,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
    .with_context(|| format!("Failed to set timestamps on {}", dst.display()))
}

fn sorted_entries(dir: &Path) -> anyhow::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

fn prune_if_empty(dir: &Path) -> anyhow::Result<()> {
    let Ok(mut entries) = fs::read_dir(dir) else {
        return Ok(());
    };
    if entries.next().is_none() {
        fs::remove_dir(dir)
            .with_context(|| format!("Failed to remove empty directory: {}", dir.display()))?;
    }
    Ok(())
}
