//! Scoped ownership of a job's transient files.

use std::path::PathBuf;

use super::manager::{release, release_blocking};

/// Paths a job owns until it lets go of them.
///
/// Release happens once: either through [`release`](Self::release) or, if the
/// owner unwinds or is cancelled first, on drop. [`keep`](Self::keep) hands
/// the files over to someone else without deleting them.
#[derive(Debug, Default)]
pub struct StagedFiles {
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `path`.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Delete every tracked file.
    pub async fn release(mut self) {
        for path in std::mem::take(&mut self.paths) {
            release(&path).await;
        }
    }

    /// Stop tracking without deleting; returns what was tracked.
    pub fn keep(mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths)
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            release_blocking(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"data").unwrap();
        path
    }

    #[tokio::test]
    async fn test_release_removes_all_tracked() {
        let dir = TempDir::new().unwrap();
        let mut staged = StagedFiles::new();
        let a = touch(&dir, "a.png");
        let b = touch(&dir, "b.png");
        staged.track(&a);
        staged.track(&b);

        staged.release().await;

        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[tokio::test]
    async fn test_release_tolerates_already_missing() {
        let dir = TempDir::new().unwrap();
        let mut staged = StagedFiles::new();
        staged.track(dir.path().join("never-written.png"));

        staged.release().await;
    }

    #[test]
    fn test_drop_releases_unreleased_files() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "dropped.jpg");
        {
            let mut staged = StagedFiles::new();
            staged.track(&path);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_during_panic_releases() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "panicked.jpg");
        let tracked = path.clone();

        let result = std::panic::catch_unwind(move || {
            let mut staged = StagedFiles::new();
            staged.track(tracked);
            panic!("engine blew up");
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_hands_over_without_deleting() {
        let dir = TempDir::new().unwrap();
        let path = touch(&dir, "kept.mp4");
        let mut staged = StagedFiles::new();
        staged.track(&path);

        let kept = staged.keep();

        assert_eq!(kept, vec![path.clone()]);
        assert!(path.exists());
    }
}
