//! Entry validation errors.

use thiserror::Error;

/// Why a manifest entry was rejected. Rejected entries are skipped and
/// never counted as a success or a failure.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("missing required field `url`")]
    MissingUrl,

    #[error("missing required field `path`")]
    MissingPath,

    #[error("unknown resource type `{0}` (expected `file` or `git`)")]
    UnknownType(String),

    #[error("path `{0}` must be relative and stay inside the project root")]
    UnsafePath(String),

    #[error("invalid files_filter `{pattern}`: {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid download url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}
