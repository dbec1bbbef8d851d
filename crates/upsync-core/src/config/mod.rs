//! Runtime settings for a sync run.
//!
//! Settings come from an optional `upsync.toml` at the project root. A
//! missing file yields defaults; command-line flags are applied on top by
//! the frontend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::fetch::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "upsync.toml";
pub const DEFAULT_MANIFEST_FILE: &str = "resources.json";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Manifest location, relative to the project root unless absolute.
    pub manifest: PathBuf,
    /// Maximum number of entries processed at once.
    pub jobs: usize,
    /// User-Agent sent with file downloads.
    pub user_agent: String,
    pub retry: RetrySettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from(DEFAULT_MANIFEST_FILE),
            jobs: 1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 2,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.backoff_secs))
    }
}

impl SyncConfig {
    /// Load settings from `path`, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Manifest path resolved against `project_root`.
    pub fn manifest_path(&self, project_root: &Path) -> PathBuf {
        if self.manifest.is_absolute() {
            self.manifest.clone()
        } else {
            project_root.join(&self.manifest)
        }
    }
}

pub fn parse_config_str(content: &str) -> anyhow::Result<SyncConfig> {
    let mut config: SyncConfig = toml::from_str(content).context("Invalid upsync.toml")?;
    config.jobs = config.jobs.max(1);
    config.retry.max_attempts = config.retry.max_attempts.max(1);
    Ok(config)
}
