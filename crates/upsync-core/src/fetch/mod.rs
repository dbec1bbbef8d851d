//! Single-file downloads with bounded retry.

mod fetcher;
mod json;
mod transport;

pub use fetcher::{FileFetcher, RetryPolicy};
pub use json::{format_json_file, is_json_path};
pub use transport::{ReqwestTransport, Transport};
