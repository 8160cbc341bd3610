//! Publisher collaborator
//!
//! The crawl engine hands every artifact it finds to a [`Publisher`]: HTML as
//! markup, everything else as a file, and observed redirects as redirect
//! records. Publish failures are reported back to the engine, which records
//! them without stopping the crawl.

mod directory;

pub use directory::DirectoryPublisher;

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors a publisher can report
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publisher rejected {path}: {reason}")]
    Rejected { path: String, reason: String },

    #[error("Invalid publish path: {0}")]
    InvalidPath(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for crawled artifacts
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes an HTML document at `path`
    async fn markup(
        &self,
        content: &str,
        path: &str,
        published: bool,
        find_attachments: bool,
    ) -> Result<(), PublishError>;

    /// Publishes the file at `source` under `path`
    ///
    /// `extra_headers` carries response headers that must be preserved, such
    /// as `content-type` and `content-disposition`.
    async fn file(
        &self,
        source: &Path,
        path: &str,
        published: bool,
        extra_headers: &BTreeMap<String, String>,
    ) -> Result<(), PublishError>;

    /// Publishes a redirect from `from` to `to`
    async fn redirect(
        &self,
        from: &str,
        to: &str,
        author: &str,
        status_code: u16,
    ) -> Result<(), PublishError>;
}
