//! Sync orchestration: manifest in, [`SyncReport`] out.

mod orchestrator;
mod report;

pub use orchestrator::{RejectedEntry, SyncOrchestrator, SyncPlan};
pub use report::{EntryReport, EntryStatus, SyncReport};
