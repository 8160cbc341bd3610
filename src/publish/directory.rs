use crate::publish::{PublishError, Publisher};
use crate::redirect::RedirectRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Name of the redirect list written at the publish root
pub const REDIRECTS_FILE: &str = "_redirects.json";

/// Subdirectory for artifacts published as drafts
pub const DRAFTS_DIR: &str = "_drafts";

/// Mirrors published artifacts into a local directory
///
/// Layout:
/// - markup at `<root>/<path>/index.html`
/// - files at `<root>/<path>`, plus `<file>.headers.json` when headers are kept
/// - redirects in `<root>/_redirects.json`
///
/// Unpublished artifacts go under `<root>/_drafts/`.
pub struct DirectoryPublisher {
    root: PathBuf,
    redirects: Mutex<Vec<RedirectRecord>>,
}

impl DirectoryPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a site path to a directory below the publish root
    ///
    /// The query string, if any, is folded into the last segment so distinct
    /// queries don't overwrite each other.
    fn local_dir(&self, path: &str, published: bool) -> Result<(PathBuf, Option<String>), PublishError> {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(sanitize(query))),
            None => (path, None),
        };

        let mut dir = if published {
            self.root.clone()
        } else {
            self.root.join(DRAFTS_DIR)
        };
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." || segment.contains('\\') {
                return Err(PublishError::InvalidPath(path.to_string()));
            }
            dir.push(segment);
        }
        Ok((dir, query.filter(|q| !q.is_empty())))
    }

    fn markup_path(&self, path: &str, published: bool) -> Result<PathBuf, PublishError> {
        let (dir, query) = self.local_dir(path, published)?;
        let name = match query {
            Some(query) => format!("index_{}.html", query),
            None => "index.html".to_string(),
        };
        Ok(dir.join(name))
    }

    fn file_path(&self, path: &str, published: bool) -> Result<PathBuf, PublishError> {
        let (mut target, query) = self.local_dir(path, published)?;
        let is_dir_like = path.split('?').next().unwrap_or_default().ends_with('/');
        if is_dir_like || target == self.root || target == self.root.join(DRAFTS_DIR) {
            target.push("index");
        }
        if let Some(query) = query {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            target.set_file_name(format!("{}_{}", name, query));
        }
        Ok(target)
    }

    /// Redirects published so far, in publish order
    pub async fn redirects(&self) -> Vec<RedirectRecord> {
        self.redirects.lock().await.clone()
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

async fn ensure_parent(path: &Path) -> Result<(), PublishError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl Publisher for DirectoryPublisher {
    async fn markup(
        &self,
        content: &str,
        path: &str,
        published: bool,
        find_attachments: bool,
    ) -> Result<(), PublishError> {
        let target = self.markup_path(path, published)?;
        ensure_parent(&target).await?;
        tokio::fs::write(&target, content).await?;
        tracing::debug!(
            "Published markup {} -> {} (attachments: {})",
            path,
            target.display(),
            find_attachments
        );
        Ok(())
    }

    async fn file(
        &self,
        source: &Path,
        path: &str,
        published: bool,
        extra_headers: &BTreeMap<String, String>,
    ) -> Result<(), PublishError> {
        let target = self.file_path(path, published)?;
        ensure_parent(&target).await?;
        tokio::fs::copy(source, &target).await?;

        if !extra_headers.is_empty() {
            let mut sidecar = target.clone().into_os_string();
            sidecar.push(".headers.json");
            let json = serde_json::to_vec_pretty(extra_headers)?;
            tokio::fs::write(PathBuf::from(sidecar), json).await?;
        }

        tracing::debug!("Published file {} -> {}", path, target.display());
        Ok(())
    }

    async fn redirect(
        &self,
        from: &str,
        to: &str,
        author: &str,
        status_code: u16,
    ) -> Result<(), PublishError> {
        let mut redirects = self.redirects.lock().await;
        redirects.push(RedirectRecord {
            from: from.to_string(),
            to: to.to_string(),
            author: author.to_string(),
            status_code,
        });

        tokio::fs::create_dir_all(&self.root).await?;
        let json = serde_json::to_vec_pretty(&*redirects)?;
        tokio::fs::write(self.root.join(REDIRECTS_FILE), json).await?;

        tracing::debug!("Published redirect {} -> {} ({})", from, to, status_code);
        Ok(())
    }
}
