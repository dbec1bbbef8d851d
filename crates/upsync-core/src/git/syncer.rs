//! Materializes a subtree of a remote repository into a local directory.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, error, info, warn};

use super::backend::{GitBackend, GitCli, resolve_head};
use crate::fs::{PathFilter, RootRelative, copy_entry, hash_tree};
use crate::manifest::DEFAULT_GIT_REF;

/// One subtree sync.
#[derive(Clone, Copy)]
pub struct SubtreeRequest<'a> {
    pub url: &'a str,
    pub target: &'a Path,
    pub sparse_checkout: &'a [String],
    pub move_from: Option<&'a str>,
    pub reference: &'a str,
    /// Tested against each file's path relative to the clone root.
    pub filter: Option<&'a dyn PathFilter>,
}

impl<'a> SubtreeRequest<'a> {
    pub fn new(url: &'a str, target: &'a Path) -> Self {
        Self {
            url,
            target,
            sparse_checkout: &[],
            move_from: None,
            reference: DEFAULT_GIT_REF,
            filter: None,
        }
    }

    pub fn with_sparse_checkout(mut self, paths: &'a [String]) -> Self {
        self.sparse_checkout = paths;
        self
    }

    pub fn with_move_from(mut self, move_from: &'a str) -> Self {
        self.move_from = Some(move_from);
        self
    }

    pub fn with_reference(mut self, reference: &'a str) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_filter(mut self, filter: &'a dyn PathFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Result of a successful subtree sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedSubtree {
    /// Commit that was checked out, when it could be read back.
    pub commit: Option<String>,
    /// blake3 digest of the target tree after the copy, when it could be computed.
    pub tree_hash: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubtreeSyncer<G = GitCli> {
    git: G,
}

impl<G: GitBackend> SubtreeSyncer<G> {
    pub fn new(git: G) -> Self {
        Self { git }
    }

    /// Sync and report only whether it worked. Errors are logged.
    pub fn sync(&self, request: &SubtreeRequest<'_>) -> bool {
        match self.sync_detailed(request) {
            Ok(_) => true,
            Err(err) => {
                error!("Git sync of {} failed: {:#}", request.url, err);
                false
            }
        }
    }

    /// Clone into a scratch directory, then replace `target` with the
    /// selected content.
    ///
    /// `target` is only touched after the clone succeeded, so a failed
    /// fetch leaves the previous contents in place. The scratch directory
    /// is removed on every path out of this function.
    pub fn sync_detailed(&self, request: &SubtreeRequest<'_>) -> anyhow::Result<SyncedSubtree> {
        info!(
            "Syncing git repo {} to {}...",
            request.url,
            request.target.display()
        );

        let workdir = tempfile::Builder::new()
            .prefix("upsync-")
            .tempdir()
            .context("Failed to create scratch directory")?;
        let clone_root = workdir.path();

        self.git
            .shallow_sparse_clone(
                request.url,
                request.sparse_checkout,
                request.reference,
                clone_root,
            )
            .context("Git fetch failed")?;

        let commit = match resolve_head(clone_root) {
            Ok(sha) => Some(sha),
            Err(err) => {
                debug!("Could not read synced commit: {:#}", err);
                None
            }
        };

        let sources = select_sources(
            clone_root,
            normalized_move_from(request.move_from),
            request.sparse_checkout,
        )?;

        replace_dir(request.target)?;

        let relative = request
            .filter
            .map(|filter| RootRelative::new(clone_root, filter));
        let filter = relative.as_ref().map(|f| f as &dyn PathFilter);

        for (src, name) in &sources {
            copy_entry(src, &request.target.join(name), filter)?;
        }

        let tree_hash = tree_digest(request.target);
        info!(
            "Git repo synced to {} (commit {})",
            request.target.display(),
            commit.as_deref().unwrap_or("unknown")
        );

        Ok(SyncedSubtree { commit, tree_hash })
    }
}

/// Digest of a synced target. The copy is already complete at this point,
/// so a failure is logged and only the digest goes missing.
pub(super) fn tree_digest(target: &Path) -> Option<String> {
    match hash_tree(target) {
        Ok(hash) => Some(hash),
        Err(err) => {
            warn!("Failed to hash {}: {:#}", target.display(), err);
            None
        }
    }
}

fn normalized_move_from(move_from: Option<&str>) -> Option<&str> {
    move_from
        .map(|m| m.trim_matches('/'))
        .filter(|m| !m.is_empty())
}

/// Delete `target` wholesale and recreate it empty.
fn replace_dir(target: &Path) -> anyhow::Result<()> {
    if let Ok(meta) = fs::symlink_metadata(target) {
        let removed = if meta.is_dir() {
            fs::remove_dir_all(target)
        } else {
            fs::remove_file(target)
        };
        removed
            .with_context(|| format!("Failed to remove existing target: {}", target.display()))?;
    }
    fs::create_dir_all(target)
        .with_context(|| format!("Failed to create target: {}", target.display()))
}

/// Source paths in the clone and the name each one gets in the target.
///
/// Without `move_from` this is every top-level entry except `.git`. With it,
/// the children of `move_from` are flattened into the target and sparse paths
/// living outside it are kept under their basename. Every source must resolve
/// inside the clone, so symlinks pointing elsewhere fail the sync before the
/// target is touched.
fn select_sources(
    clone_root: &Path,
    move_from: Option<&str>,
    sparse_checkout: &[String],
) -> anyhow::Result<Vec<(PathBuf, OsString)>> {
    let canonical_root = fs::canonicalize(clone_root)
        .with_context(|| format!("Failed to resolve {}", clone_root.display()))?;

    let Some(move_from) = move_from else {
        return Ok(children(clone_root)?
            .into_iter()
            .filter(|(name, _)| name != ".git")
            .map(|(name, src)| (src, name))
            .collect());
    };

    let mut sources = Vec::new();
    let moved_root = clone_root.join(move_from);
    let canonical_moved = if fs::symlink_metadata(&moved_root).is_ok() {
        let resolved = ensure_inside(&canonical_root, &moved_root)?;
        if moved_root.is_dir() {
            for (name, src) in children(&moved_root)? {
                sources.push((src, name));
            }
        } else if let Some(name) = moved_root.file_name() {
            sources.push((moved_root.clone(), name.to_os_string()));
        }
        Some(resolved)
    } else {
        warn!("move_from path not found in repository: {}", move_from);
        None
    };

    for item in sparse_checkout {
        let item = item.trim_matches('/');
        if item.is_empty() || item == move_from {
            continue;
        }
        // Glob and negated patterns never name a real path and drop out here.
        let src = clone_root.join(item);
        if fs::symlink_metadata(&src).is_err() {
            continue;
        }
        let resolved = ensure_inside(&canonical_root, &src)?;
        if canonical_moved
            .as_ref()
            .is_some_and(|moved| resolved.starts_with(moved))
        {
            continue;
        }
        let Some(name) = src.file_name() else {
            continue;
        };
        sources.push((src.clone(), name.to_os_string()));
    }
    Ok(sources)
}

fn ensure_inside(canonical_root: &Path, path: &Path) -> anyhow::Result<PathBuf> {
    let resolved = fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    if !resolved.starts_with(canonical_root) {
        anyhow::bail!(
            "{} resolves outside the repository checkout",
            path.display()
        );
    }
    Ok(resolved)
}

fn children(dir: &Path) -> anyhow::Result<Vec<(OsString, PathBuf)>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| (e.file_name(), e.path())))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    entries.sort();
    Ok(entries)
}
