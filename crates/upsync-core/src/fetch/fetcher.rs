//! Retrying file downloader.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use super::json::{format_json_file, is_json_path};
use super::transport::{ReqwestTransport, Transport};

/// Fixed-delay retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is the total number of tries and is at least 1.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Downloads single files to fixed paths.
#[derive(Debug, Clone)]
pub struct FileFetcher<T = ReqwestTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl FileFetcher<ReqwestTransport> {
    /// Fetcher using `reqwest` with the given User-Agent.
    pub fn with_user_agent(user_agent: &str, policy: RetryPolicy) -> anyhow::Result<Self> {
        Ok(Self::new(ReqwestTransport::new(user_agent)?, policy))
    }
}

impl<T: Transport> FileFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Download `url` to `target`, overwriting it.
    ///
    /// Returns `false` once the retry budget is spent. A partially written
    /// file from a failed attempt is left in place. JSON targets are
    /// reformatted after a successful download; a formatting error is
    /// logged and does not affect the result.
    pub async fn fetch(&self, url: &str, target: &Path) -> bool {
        info!("Downloading {} to {}...", url, target.display());

        let max_attempts = self.policy.max_attempts;
        for attempt in 1..=max_attempts {
            match self.try_fetch(url, target).await {
                Ok(size) => {
                    info!("Saved {} ({})", target.display(), human_size(size));
                    if is_json_path(target) {
                        match format_json_file(target) {
                            Ok(()) => info!("Formatted JSON file: {}", target.display()),
                            Err(err) => warn!("Failed to format JSON: {:#}", err),
                        }
                    }
                    return true;
                }
                Err(err) => {
                    warn!("Attempt {} failed: {:#}", attempt, err);
                    if attempt < max_attempts {
                        info!("Retrying in {}s...", self.policy.backoff.as_secs_f64());
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        error!("Failed to download {} after {} attempts", url, max_attempts);
        false
    }

    async fn try_fetch(&self, url: &str, target: &Path) -> anyhow::Result<u64> {
        let body = self.transport.get(url).await?;
        std::fs::write(target, &body)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(body.len() as u64)
    }
}

fn human_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes < MIB {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}
