//! Per-entry outcomes and the aggregate run report.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Succeeded,
    Failed,
    /// Rejected during validation; neither a success nor a failure.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    /// Position in the manifest.
    pub index: usize,
    pub name: String,
    pub kind: String,
    pub path: String,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_hash: Option<String>,
}

impl EntryReport {
    pub fn new(index: usize, name: &str, kind: &str, path: &str, status: EntryStatus) -> Self {
        Self {
            index,
            name: name.to_string(),
            kind: kind.to_string(),
            path: path.to_string(),
            status,
            detail: None,
            commit: None,
            tree_hash: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Outcomes in manifest order.
    pub entries: Vec<EntryReport>,
}

impl SyncReport {
    /// Fold entry outcomes into a report, restoring manifest order.
    pub fn from_entries(mut entries: Vec<EntryReport>) -> Self {
        entries.sort_by_key(|e| e.index);
        let mut report = Self::default();
        for entry in &entries {
            match entry.status {
                EntryStatus::Succeeded => report.succeeded += 1,
                EntryStatus::Failed => report.failed += 1,
                EntryStatus::Skipped => report.skipped += 1,
            }
        }
        report.entries = entries;
        report
    }

    /// True when no processed entry failed. Skipped entries do not count.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_order_are_derived_from_entries() {
        let report = SyncReport::from_entries(vec![
            EntryReport::new(2, "c", "git", "c", EntryStatus::Failed),
            EntryReport::new(0, "a", "file", "a", EntryStatus::Succeeded),
            EntryReport::new(1, "b", "file", "b", EntryStatus::Skipped),
        ]);

        assert_eq!((report.succeeded, report.failed, report.skipped), (1, 1, 1));
        let names: Vec<_> = report.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn skipped_entries_do_not_fail_the_run() {
        let report = SyncReport::from_entries(vec![EntryReport::new(
            0,
            "x",
            "file",
            "x",
            EntryStatus::Skipped,
        )]);
        assert!(report.is_success());
    }

    #[test]
    fn json_output_omits_empty_fields() {
        let entry = EntryReport::new(0, "a", "file", "a.json", EntryStatus::Succeeded);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "succeeded");
        assert!(json.get("commit").is_none());
    }
}
