//! Shared fixtures for the integration tests

#![allow(dead_code)]

use crawl_relay::crawler::{Engine, EngineSettings};
use crawl_relay::publish::{PublishError, Publisher};
use crawl_relay::storage::ResumeStore;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const RESUME_FILE: &str = "test-site";

/// One call received by the recording publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Markup { path: String, content: String },
    File { path: String, body: Vec<u8>, headers: BTreeMap<String, String> },
    Redirect { from: String, to: String, author: String, status_code: u16 },
}

/// In-memory publisher that records every call
#[derive(Default)]
pub struct RecordingPublisher {
    calls: Mutex<Vec<Published>>,
    sources: Mutex<Vec<PathBuf>>,
    reject: HashSet<String>,
    delays: HashMap<String, Duration>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every publish call for `path`
    pub fn rejecting(path: &str) -> Self {
        Self {
            reject: HashSet::from([path.to_string()]),
            ..Self::default()
        }
    }

    /// Holds every publish call for `path` for `delay` before answering
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    /// Local paths handed to `file`, in call order
    pub fn file_sources(&self) -> Vec<PathBuf> {
        self.sources.lock().unwrap().clone()
    }

    pub fn file_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Published::File { path, .. } => Some(path),
                _ => None,
            })
            .collect();
        paths.sort();
        paths
    }

    pub fn calls(&self) -> Vec<Published> {
        self.calls.lock().unwrap().clone()
    }

    pub fn markup_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Published::Markup { path, .. } => Some(path),
                _ => None,
            })
            .collect();
        paths.sort();
        paths
    }

    pub fn markup(&self, path: &str) -> Option<String> {
        self.calls().into_iter().find_map(|call| match call {
            Published::Markup { path: p, content } if p == path => Some(content),
            _ => None,
        })
    }

    async fn check(&self, path: &str) -> Result<(), PublishError> {
        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
        if self.reject.contains(path) {
            return Err(PublishError::Rejected {
                path: path.to_string(),
                reason: "rejected by test".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, call: Published) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn markup(
        &self,
        content: &str,
        path: &str,
        _published: bool,
        _find_attachments: bool,
    ) -> Result<(), PublishError> {
        self.check(path).await?;
        self.record(Published::Markup {
            path: path.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn file(
        &self,
        source: &Path,
        path: &str,
        _published: bool,
        extra_headers: &BTreeMap<String, String>,
    ) -> Result<(), PublishError> {
        self.sources.lock().unwrap().push(source.to_path_buf());
        self.check(path).await?;
        let body = tokio::fs::read(source).await?;
        self.record(Published::File {
            path: path.to_string(),
            body,
            headers: extra_headers.clone(),
        });
        Ok(())
    }

    async fn redirect(
        &self,
        from: &str,
        to: &str,
        author: &str,
        status_code: u16,
    ) -> Result<(), PublishError> {
        self.check(from).await?;
        self.record(Published::Redirect {
            from: from.to_string(),
            to: to.to_string(),
            author: author.to_string(),
            status_code,
        });
        Ok(())
    }
}

/// Engine settings tuned for fast tests
pub fn test_settings() -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.session.interval = Duration::ZERO;
    settings.session.concurrency = 2;
    settings
}

pub fn test_engine(
    seed: &str,
    settings: EngineSettings,
    publisher: Arc<RecordingPublisher>,
    state_dir: &Path,
) -> Engine {
    Engine::new(
        Url::parse(seed).unwrap(),
        settings,
        publisher,
        ResumeStore::new(state_dir),
        RESUME_FILE,
    )
    .unwrap()
}

pub fn html(body: &str) -> wiremock::ResponseTemplate {
    wiremock::ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}
