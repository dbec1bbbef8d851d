//! Git subtree synchronization.
//!
//! A sync is a shallow, sparse clone into a scratch directory followed by a
//! (filtered) copy of the selected paths into the target:
//! - [`GitBackend`] hides how the clone is produced
//! - [`SubtreeSyncer`] owns target replacement and source selection

mod backend;
mod syncer;

pub use backend::{GitBackend, GitCli, resolve_head};
pub use syncer::{SubtreeRequest, SubtreeSyncer, SyncedSubtree};
