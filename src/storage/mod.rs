//! Resume state persistence
//!
//! The crawl queue is snapshotted to a per-project JSON file so an
//! interrupted crawl can continue in a later run. Writes are synchronous so
//! they can run from shutdown paths where no async runtime is available.

mod resume;
mod traits;

pub use resume::ResumeStore;
pub use traits::{StateStore, StorageError, StorageResult};

/// Builds the resume filename for a project
///
/// Distinct client/project pairs never share a file.
///
/// # Examples
///
/// ```
/// use crawl_relay::storage::resume_filename;
///
/// assert_eq!(resume_filename("acme", "site"), "acme-site");
/// ```
pub fn resume_filename(client_id: &str, project: &str) -> String {
    format!("{}-{}", client_id, project)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_filename_is_distinct_per_project() {
        assert_ne!(resume_filename("acme", "blog"), resume_filename("acme", "shop"));
        assert_ne!(resume_filename("acme", "blog"), resume_filename("other", "blog"));
    }
}
