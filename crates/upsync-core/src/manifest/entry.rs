//! Manifest entry types.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::EntryError;
use crate::fs::RegexFilter;

/// The ref pulled when an entry does not name one: the remote's default branch.
pub const DEFAULT_GIT_REF: &str = "HEAD";

/// An entry as written in `resources.json`, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_checkout: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_filter: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// A validated entry, ready for dispatch.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub name: String,
    pub url: String,
    /// Destination as declared, relative to the project root.
    pub path: PathBuf,
    /// Destination resolved against the project root.
    pub target: PathBuf,
    pub kind: ResourceKind,
    pub files_filter: Option<RegexFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    File,
    Git(GitSource),
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::File => "file",
            ResourceKind::Git(_) => "git",
        }
    }
}

/// Git-specific entry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    /// Paths for the sparse checkout; empty means the whole tree.
    pub sparse_checkout: Vec<String>,
    /// Directory whose contents become the top level of the target.
    pub move_from: Option<String>,
    pub reference: String,
}

impl RawEntry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    pub fn kind_str(&self) -> &str {
        self.kind.as_deref().unwrap_or("file")
    }

    /// Validate this entry and resolve its destination under `project_root`.
    pub fn validate(&self, project_root: &Path) -> Result<ResourceEntry, EntryError> {
        let url = non_empty(&self.url).ok_or(EntryError::MissingUrl)?;
        let path = non_empty(&self.path).ok_or(EntryError::MissingPath)?;
        let relative = safe_relative_path(path)?;

        let kind = match self.kind_str() {
            "file" => {
                check_download_url(url)?;
                ResourceKind::File
            }
            "git" => {
                let move_from = non_empty(&self.move_from);
                if let Some(raw) = move_from
                    && escapes_clone(raw)
                {
                    return Err(EntryError::UnsafePath(raw.to_string()));
                }
                let sparse_checkout = self.sparse_checkout.clone().unwrap_or_default();
                if let Some(bad) = sparse_checkout.iter().find(|p| escapes_clone(p)) {
                    return Err(EntryError::UnsafePath(bad.clone()));
                }
                ResourceKind::Git(GitSource {
                    sparse_checkout,
                    move_from: move_from.map(str::to_string),
                    reference: non_empty(&self.reference)
                        .unwrap_or(DEFAULT_GIT_REF)
                        .to_string(),
                })
            }
            other => return Err(EntryError::UnknownType(other.to_string())),
        };

        let files_filter = match non_empty(&self.files_filter) {
            Some(pattern) => Some(RegexFilter::new(pattern).map_err(|source| {
                EntryError::InvalidFilter {
                    pattern: pattern.to_string(),
                    source,
                }
            })?),
            None => None,
        };

        Ok(ResourceEntry {
            name: self.display_name().to_string(),
            url: url.to_string(),
            target: project_root.join(&relative),
            path: relative,
            kind,
            files_filter,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Reject absolute paths, `..` components and paths naming the root itself.
fn safe_relative_path(raw: &str) -> Result<PathBuf, EntryError> {
    let mut normalized = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(EntryError::UnsafePath(raw.to_string()));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(EntryError::UnsafePath(raw.to_string()));
    }
    Ok(normalized)
}

/// True when a path inside the clone would resolve outside it. A leading
/// `/` anchors a sparse pattern to the repository root and is allowed.
fn escapes_clone(raw: &str) -> bool {
    Path::new(raw.trim_start_matches('/'))
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

fn check_download_url(raw: &str) -> Result<(), EntryError> {
    let parsed = url::Url::parse(raw).map_err(|err| EntryError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(EntryError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{scheme}`"),
        }),
    }
}
