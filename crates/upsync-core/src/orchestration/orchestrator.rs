//! Manifest-driven dispatch of resource entries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::report::{EntryReport, EntryStatus, SyncReport};
use crate::config::SyncConfig;
use crate::fetch::{FileFetcher, ReqwestTransport, Transport};
use crate::git::{GitBackend, GitCli, SubtreeRequest, SubtreeSyncer};
use crate::manifest::{
    EntryError, RawEntry, ResourceEntry, ResourceKind, load_manifest, overlapping_targets,
};

/// Validated view of a manifest, before anything is fetched.
#[derive(Debug)]
pub struct SyncPlan {
    /// Entries to process, with their manifest index.
    pub entries: Vec<(usize, ResourceEntry)>,
    /// Entries rejected by validation.
    pub rejected: Vec<RejectedEntry>,
    /// Index pairs of entries whose targets overlap.
    pub overlaps: Vec<(usize, usize)>,
}

#[derive(Debug)]
pub struct RejectedEntry {
    pub index: usize,
    pub raw: RawEntry,
    pub error: EntryError,
}

impl RejectedEntry {
    fn report(&self) -> EntryReport {
        EntryReport::new(
            self.index,
            self.raw.display_name(),
            self.raw.kind_str(),
            self.raw.path.as_deref().unwrap_or(""),
            EntryStatus::Skipped,
        )
        .with_detail(self.error.to_string())
    }
}

/// Runs every manifest entry through the matching synchronizer.
#[derive(Debug)]
pub struct SyncOrchestrator<T = ReqwestTransport, G = GitCli> {
    project_root: PathBuf,
    manifest_path: PathBuf,
    fetcher: Arc<FileFetcher<T>>,
    syncer: Arc<SubtreeSyncer<G>>,
    jobs: usize,
    only: Vec<String>,
}

impl SyncOrchestrator {
    /// Orchestrator using `reqwest` and the `git` executable.
    pub fn from_config(project_root: PathBuf, config: &SyncConfig) -> anyhow::Result<Self> {
        let fetcher = FileFetcher::with_user_agent(&config.user_agent, config.retry.policy())?;
        let manifest_path = config.manifest_path(&project_root);
        Ok(Self::new(
            project_root,
            manifest_path,
            fetcher,
            SubtreeSyncer::new(GitCli::new()),
        )
        .with_jobs(config.jobs))
    }
}

impl<T, G> SyncOrchestrator<T, G>
where
    T: Transport + 'static,
    G: GitBackend + 'static,
{
    pub fn new(
        project_root: PathBuf,
        manifest_path: PathBuf,
        fetcher: FileFetcher<T>,
        syncer: SubtreeSyncer<G>,
    ) -> Self {
        Self {
            project_root,
            manifest_path,
            fetcher: Arc::new(fetcher),
            syncer: Arc::new(syncer),
            jobs: 1,
            only: Vec::new(),
        }
    }

    /// Process up to `jobs` entries at once. Values below 1 mean 1.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Restrict the run to entries with these names. Empty means all.
    pub fn with_only(mut self, names: Vec<String>) -> Self {
        self.only = names;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn fetcher(&self) -> &FileFetcher<T> {
        &self.fetcher
    }

    /// Load and validate the manifest.
    ///
    /// Errors only when the manifest itself cannot be read or parsed.
    pub fn plan(&self) -> anyhow::Result<SyncPlan> {
        let raw_entries = load_manifest(&self.manifest_path)?;

        let mut entries = Vec::new();
        let mut rejected = Vec::new();
        for (index, raw) in raw_entries.into_iter().enumerate() {
            if !self.only.is_empty() && !self.only.iter().any(|n| n == raw.display_name()) {
                continue;
            }
            match raw.validate(&self.project_root) {
                Ok(entry) => entries.push((index, entry)),
                Err(error) => rejected.push(RejectedEntry { index, raw, error }),
            }
        }

        let resolved: Vec<ResourceEntry> = entries.iter().map(|(_, e)| e.clone()).collect();
        let overlaps = overlapping_targets(&resolved)
            .into_iter()
            .map(|(a, b)| (entries[a].0, entries[b].0))
            .collect();

        Ok(SyncPlan {
            entries,
            rejected,
            overlaps,
        })
    }

    /// Synchronize every valid entry.
    ///
    /// A failing entry never stops the others; only a manifest that cannot
    /// be loaded returns an error.
    pub async fn run(&self) -> anyhow::Result<SyncReport> {
        let plan = self.plan()?;

        info!("Starting resource synchronization...");

        let mut outcomes = Vec::new();
        for rejected in &plan.rejected {
            warn!(
                "Skipping invalid entry #{} ({}): {}",
                rejected.index,
                rejected.raw.display_name(),
                rejected.error
            );
            outcomes.push(rejected.report());
        }
        for (a, b) in &plan.overlaps {
            warn!(
                "Entries #{} and #{} have overlapping target paths; the later write wins",
                a, b
            );
        }

        if self.jobs <= 1 {
            for (index, entry) in plan.entries {
                outcomes.push(process_entry(&self.fetcher, &self.syncer, index, entry).await);
            }
        } else {
            // Overlapping targets share a task so they still run in manifest order.
            let mut tasks = JoinSet::new();
            for group in overlap_groups(plan.entries, &plan.overlaps) {
                while tasks.len() >= self.jobs {
                    if let Some(done) = tasks.join_next().await {
                        outcomes.extend(done.context("Sync task panicked")?);
                    }
                }
                let fetcher = Arc::clone(&self.fetcher);
                let syncer = Arc::clone(&self.syncer);
                tasks.spawn(async move {
                    let mut reports = Vec::with_capacity(group.len());
                    for (index, entry) in group {
                        reports.push(process_entry(&fetcher, &syncer, index, entry).await);
                    }
                    reports
                });
            }
            while let Some(done) = tasks.join_next().await {
                outcomes.extend(done.context("Sync task panicked")?);
            }
        }

        let report = SyncReport::from_entries(outcomes);
        if report.is_success() {
            info!("All done! Updated {} resources.", report.succeeded);
        } else {
            warn!(
                "Finished with errors. Success: {}, Failed: {}",
                report.succeeded, report.failed
            );
        }
        Ok(report)
    }
}

/// Split entries into groups that can run concurrently.
///
/// Entries linked by an overlap (directly or through a chain) land in the
/// same group. Groups and their members keep manifest order.
fn overlap_groups(
    entries: Vec<(usize, ResourceEntry)>,
    overlaps: &[(usize, usize)],
) -> Vec<Vec<(usize, ResourceEntry)>> {
    let position: HashMap<usize, usize> = entries
        .iter()
        .enumerate()
        .map(|(pos, (index, _))| (*index, pos))
        .collect();

    let mut parent: Vec<usize> = (0..entries.len()).collect();
    fn find(parent: &mut [usize], mut node: usize) -> usize {
        while parent[node] != node {
            parent[node] = parent[parent[node]];
            node = parent[node];
        }
        node
    }
    for (a, b) in overlaps {
        if let (Some(&a), Some(&b)) = (position.get(a), position.get(b)) {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            parent[ra.max(rb)] = ra.min(rb);
        }
    }

    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<(usize, ResourceEntry)>> = Vec::new();
    for (pos, item) in entries.into_iter().enumerate() {
        let root = find(&mut parent, pos);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(item);
    }
    groups
}

async fn process_entry<T, G>(
    fetcher: &Arc<FileFetcher<T>>,
    syncer: &Arc<SubtreeSyncer<G>>,
    index: usize,
    entry: ResourceEntry,
) -> EntryReport
where
    T: Transport + 'static,
    G: GitBackend + 'static,
{
    info!("Processing: {} ({})", entry.name, entry.kind.as_str());
    let report = |status| {
        EntryReport::new(
            index,
            &entry.name,
            entry.kind.as_str(),
            &entry.path.to_string_lossy(),
            status,
        )
    };

    if let Some(parent) = entry.target.parent()
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        error!("Failed to create {}: {}", parent.display(), err);
        return report(EntryStatus::Failed).with_detail(err.to_string());
    }

    match &entry.kind {
        ResourceKind::File => {
            if fetcher.fetch(&entry.url, &entry.target).await {
                report(EntryStatus::Succeeded)
            } else {
                report(EntryStatus::Failed).with_detail(format!(
                    "download failed after {} attempts",
                    fetcher.policy().max_attempts()
                ))
            }
        }
        ResourceKind::Git(_) => {
            let syncer = Arc::clone(syncer);
            let owned = entry.clone();
            let synced = tokio::task::spawn_blocking(move || sync_git_entry(&syncer, &owned))
                .await
                .context("Git sync task panicked")
                .and_then(|result| result);

            match synced {
                Ok(synced) => {
                    let mut ok = report(EntryStatus::Succeeded);
                    ok.commit = synced.commit;
                    ok.tree_hash = synced.tree_hash;
                    ok
                }
                Err(err) => {
                    error!("Git sync of {} failed: {:#}", entry.url, err);
                    report(EntryStatus::Failed).with_detail(format!("{:#}", err))
                }
            }
        }
    }
}

fn sync_git_entry<G: GitBackend>(
    syncer: &SubtreeSyncer<G>,
    entry: &ResourceEntry,
) -> anyhow::Result<crate::git::SyncedSubtree> {
    let ResourceKind::Git(git) = &entry.kind else {
        anyhow::bail!("{} is not a git entry", entry.name);
    };

    let mut request = SubtreeRequest::new(&entry.url, &entry.target)
        .with_sparse_checkout(&git.sparse_checkout)
        .with_reference(&git.reference);
    if let Some(move_from) = git.move_from.as_deref() {
        request = request.with_move_from(move_from);
    }
    if let Some(filter) = entry.files_filter.as_ref() {
        info!("Using file filter: {}", filter.as_str());
        request = request.with_filter(filter);
    }
    syncer.sync_detailed(&request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, path: &str) -> (usize, ResourceEntry) {
        let raw = RawEntry {
            name: Some(path.to_string()),
            kind: Some("git".to_string()),
            url: Some("https://example.com/r.git".to_string()),
            path: Some(path.to_string()),
            ..RawEntry::default()
        };
        (index, raw.validate(Path::new("/p")).unwrap())
    }

    fn indices(groups: &[Vec<(usize, ResourceEntry)>]) -> Vec<Vec<usize>> {
        groups
            .iter()
            .map(|g| g.iter().map(|(i, _)| *i).collect())
            .collect()
    }

    #[test]
    fn disjoint_entries_get_their_own_group() {
        let groups = overlap_groups(vec![entry(0, "a"), entry(1, "b"), entry(3, "c")], &[]);
        assert_eq!(indices(&groups), vec![vec![0], vec![1], vec![3]]);
    }

    #[test]
    fn overlap_chains_share_one_ordered_group() {
        let entries = vec![
            entry(0, "vendor/sub"),
            entry(2, "docs"),
            entry(4, "vendor"),
            entry(5, "vendor/sub/deep"),
        ];
        let groups = overlap_groups(entries, &[(0, 4), (0, 5), (4, 5)]);
        assert_eq!(indices(&groups), vec![vec![0, 4, 5], vec![2]]);
    }
}
