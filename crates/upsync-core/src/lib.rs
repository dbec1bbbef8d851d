//! upsync core library
//!
//! Declaratively synchronizes external resources (single files over HTTP or
//! subtrees of git repositories) into fixed paths under a project root, as
//! listed in a `resources.json` manifest.

pub mod config;
pub mod fetch;
pub mod fs;
pub mod git;
pub mod manifest;
pub mod orchestration;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{RetrySettings, SyncConfig};

    // Manifest
    pub use crate::manifest::{EntryError, RawEntry, ResourceEntry, ResourceKind};

    // Synchronizers
    pub use crate::fetch::{FileFetcher, RetryPolicy, Transport};
    pub use crate::git::{GitBackend, GitCli, SubtreeRequest, SubtreeSyncer};

    // Filesystem
    pub use crate::fs::{PathFilter, RegexFilter};

    // Orchestration
    pub use crate::orchestration::{EntryReport, EntryStatus, SyncOrchestrator, SyncReport};
}
