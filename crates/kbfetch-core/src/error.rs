//! Error types for kbfetch core
//!
//! None of these cross the worker boundary: a worker logs the error and
//! reports a plain `success = false`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while fetching an object or a file
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No session token available")]
    AuthUnavailable,

    #[error("Could not resolve server for knowledge base {kb_id}: {source}")]
    EndpointUnresolved {
        kb_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Remote fetch of {object_id} failed: {source}")]
    RemoteFetchFailed {
        object_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Document not found in local store: {0}")]
    DocumentNotFound(String),

    #[error("Could not persist {object_id}: {source}")]
    LocalPersistFailed {
        object_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Cannot open {path} for writing: {source}")]
    FileOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects ({limit}) starting at {url}")]
    TooManyRedirects { url: String, limit: u32 },

    #[error("Timeout")]
    Timeout,

    #[error("Download was cancelled")]
    Cancelled,
}

impl FetchError {
    /// Short machine-friendly tag for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::AuthUnavailable => "auth_unavailable",
            FetchError::EndpointUnresolved { .. } => "endpoint_unresolved",
            FetchError::RemoteFetchFailed { .. } => "remote_fetch_failed",
            FetchError::DocumentNotFound(_) => "document_not_found",
            FetchError::LocalPersistFailed { .. } => "local_persist_failed",
            FetchError::FileOpenFailed { .. } => "file_open_failed",
            FetchError::Network(_) => "network",
            FetchError::Io(_) => "io",
            FetchError::InvalidUrl(_) => "invalid_url",
            FetchError::TooManyRedirects { .. } => "too_many_redirects",
            FetchError::Timeout => "timeout",
            FetchError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_object() {
        let err = FetchError::RemoteFetchFailed {
            object_id: "obj-1".to_string(),
            source: anyhow::anyhow!("server said no"),
        };
        assert_eq!(err.to_string(), "Remote fetch of obj-1 failed: server said no");
        assert_eq!(err.kind(), "remote_fetch_failed");
    }
}
