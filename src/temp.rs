//! Scratch files that remove themselves
//!
//! Subtitle conversion goes through an intermediate WebVTT file that must
//! not be left behind, whether the conversion succeeds or not.

use std::fs::{self, File};
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// A file that is deleted when the value is dropped
#[derive(Debug)]
pub(crate) struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Creates an empty file in the system temp directory
    ///
    /// The name is `<prefix>_<ulid>.<extension>`, so concurrent runs never
    /// collide.
    pub(crate) fn create(prefix: &str, extension: &str) -> io::Result<Self> {
        Self::create_in(&std::env::temp_dir(), prefix, extension)
    }

    /// Creates an empty file in the given directory
    pub(crate) fn create_in(dir: &Path, prefix: &str, extension: &str) -> io::Result<Self> {
        let path = dir.join(format!("{}_{}.{}", prefix, ulid::Ulid::new(), extension));
        File::create(&path)?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl Deref for TempFile {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_cleanup() {
        let temp = TempFile::create("subtitle", "vtt").unwrap();
        let path = temp.path().to_path_buf();

        assert!(path.is_file());
        assert!(path.is_absolute());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("subtitle_"));
        assert!(name.ends_with(".vtt"));

        drop(temp);
        assert!(!path.exists());
    }

    #[test]
    fn test_create_in_directory() {
        let dir = TempDir::new().unwrap();
        let first = TempFile::create_in(dir.path(), "subtitle", "vtt").unwrap();
        let second = TempFile::create_in(dir.path(), "subtitle", "vtt").unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(first.parent(), Some(dir.path()));
    }

    #[test]
    fn test_cleanup_tolerates_removed_file() {
        let temp = TempFile::create("gone", "tmp").unwrap();
        fs::remove_file(temp.path()).unwrap();
        drop(temp);
    }
}
