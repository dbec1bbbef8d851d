//! Canonical formatting for downloaded JSON documents.

use std::path::Path;

use anyhow::Context;
use serde_json::Value;

pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Rewrite a JSON file with 2-space indentation, keeping key order.
pub fn format_json_file(path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_slice(&raw)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    let mut pretty = serde_json::to_string_pretty(&value).context("Failed to serialize JSON")?;
    pretty.push('\n');
    std::fs::write(path, pretty).with_context(|| format!("Failed to write {}", path.display()))
}
