use crate::state::QueueItem;
use crate::storage::traits::{StateStore, StorageError, StorageResult};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Resume files stored as JSON arrays in a config directory
#[derive(Debug, Clone)]
pub struct ResumeStore {
    dir: PathBuf,
}

impl ResumeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the resume file for `filename`
    pub fn path_for(&self, filename: &str) -> StorageResult<PathBuf> {
        let valid = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\']);
        if !valid {
            return Err(StorageError::InvalidFilename(filename.to_string()));
        }
        Ok(self.dir.join(filename))
    }

    /// Returns true if a resume file exists for `filename`
    pub fn exists(&self, filename: &str) -> bool {
        self.path_for(filename)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    fn read(&self, filename: &str) -> StorageResult<Vec<QueueItem>> {
        let path = self.path_for(filename)?;
        let contents = fs::read(&path)?;
        Ok(serde_json::from_slice(&contents)?)
    }
}

impl StateStore for ResumeStore {
    fn write(&self, items: &[QueueItem], filename: &str) -> StorageResult<PathBuf> {
        let path = self.path_for(filename)?;
        fs::create_dir_all(&self.dir)?;

        // Written beside the target and renamed over it, so a crash mid-write
        // leaves the previous snapshot intact
        let mut file = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer(&mut writer, items)?;
            writer.flush()?;
        }
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| StorageError::Persist {
            path: path.clone(),
            source: e.error,
        })?;

        tracing::debug!("Wrote {} items to {}", items.len(), path.display());
        Ok(path)
    }

    fn load(&self, filename: &str) -> Vec<QueueItem> {
        match self.read(filename) {
            Ok(items) => {
                tracing::debug!("Loaded {} items from resume file {}", items.len(), filename);
                items
            }
            Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No resume file {}, starting fresh", filename);
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable resume file {}: {}", filename, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FetchStatus;
    use tempfile::TempDir;

    fn items() -> Vec<QueueItem> {
        let mut fetched = QueueItem::parse("https://example.com/", None).unwrap();
        fetched.advance(FetchStatus::Fetching).unwrap();
        fetched.advance(FetchStatus::Fetched).unwrap();
        let queued = QueueItem::parse("https://example.com/a", Some("https://example.com/")).unwrap();
        vec![fetched, queued]
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path());

        let written = items();
        store.write(&written, "acme-site").unwrap();
        let loaded = store.load("acme-site");

        assert_eq!(loaded, written);
        assert_eq!(loaded[0].status, FetchStatus::Fetched);
        assert_eq!(loaded[1].status, FetchStatus::Queued);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path().join("nested").join("state"));

        let path = store.write(&items(), "acme-site").unwrap();
        assert!(path.is_file());
        assert!(store.exists("acme-site"));
    }

    #[test]
    fn test_replaces_previous_file() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path());

        store.write(&items(), "acme-site").unwrap();
        store.write(&items()[..1], "acme-site").unwrap();
        assert_eq!(store.load("acme-site").len(), 1);
    }

    #[test]
    fn test_file_is_one_json_array() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path());

        let path = store.write(&items(), "acme-site").unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[1]["status"], "queued");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path());
        assert!(store.load("nothing-here").is_empty());
        assert!(!store.exists("nothing-here"));
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("acme-site"), "{not json").unwrap();

        let store = ResumeStore::new(dir.path());
        assert!(store.load("acme-site").is_empty());
    }

    #[test]
    fn test_rejects_path_separators() {
        let store = ResumeStore::new("/tmp");
        assert!(matches!(
            store.write(&[], "../escape"),
            Err(StorageError::InvalidFilename(_))
        ));
    }
}
