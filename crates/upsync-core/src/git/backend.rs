//! Version-control access for subtree syncs.

use std::path::Path;
use std::process::Command;

use anyhow::Context;

/// Environment variables that would redirect git away from the working directory.
const GIT_ENV_OVERRIDES: [&str; 4] = [
    "GIT_DIR",
    "GIT_WORK_TREE",
    "GIT_INDEX_FILE",
    "GIT_COMMON_DIR",
];

/// Produces a shallow, optionally sparse working tree of one remote ref.
pub trait GitBackend: Send + Sync {
    /// Check out `reference` of `url` at depth 1 into the empty directory
    /// `workdir`. An empty `sparse_paths` checks out the whole tree.
    fn shallow_sparse_clone(
        &self,
        url: &str,
        sparse_paths: &[String],
        reference: &str,
        workdir: &Path,
    ) -> anyhow::Result<()>;
}

/// Shells out to the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    /// Version string reported by `git --version`, e.g. `2.43.0`.
    pub fn version() -> anyhow::Result<String> {
        let output = Command::new("git")
            .arg("--version")
            .output()
            .context("Failed to invoke git --version")?;
        if !output.status.success() {
            anyhow::bail!("Failed to run git --version");
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .split_whitespace()
            .nth(2)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Unexpected git version output: {}", stdout.trim()))
    }

    fn run_git(cwd: &Path, args: &[&str]) -> anyhow::Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0");
        for key in GIT_ENV_OVERRIDES {
            cmd.env_remove(key);
        }
        let output = cmd
            .output()
            .with_context(|| format!("Failed to run git {:?}", args))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Git command failed {:?}: {}", args, stderr.trim());
        }
        Ok(())
    }
}

impl GitBackend for GitCli {
    fn shallow_sparse_clone(
        &self,
        url: &str,
        sparse_paths: &[String],
        reference: &str,
        workdir: &Path,
    ) -> anyhow::Result<()> {
        Self::run_git(workdir, &["init", "--quiet"])?;
        Self::run_git(workdir, &["remote", "add", "origin", url])?;

        if !sparse_paths.is_empty() {
            Self::run_git(workdir, &["config", "core.sparseCheckout", "true"])?;
            let info_dir = workdir.join(".git").join("info");
            std::fs::create_dir_all(&info_dir).with_context(|| {
                format!("Failed to create directory: {}", info_dir.display())
            })?;
            let mut patterns = sparse_paths.join("\n");
            patterns.push('\n');
            std::fs::write(info_dir.join("sparse-checkout"), patterns)
                .context("Failed to write sparse-checkout file")?;
        }

        Self::run_git(
            workdir,
            &["pull", "--quiet", "--depth", "1", "origin", reference],
        )
    }
}

/// SHA of the commit checked out in `workdir`.
pub fn resolve_head(workdir: &Path) -> anyhow::Result<String> {
    let repo = git2::Repository::open(workdir)
        .with_context(|| format!("Failed to open repository: {}", workdir.display()))?;
    let commit = repo.head()?.peel_to_commit()?;
    Ok(commit.id().to_string())
}
