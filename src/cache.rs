//! Cache storage module
//!
//! This module provides persistent caching functionality using the system's
//! standard cache directory. Data is serialized to JSON format for storage.

use serde::{Deserialize, Serialize};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to determine cache directory location
    #[error("Failed to determine cache directory location")]
    CacheDirectoryNotFound,

    /// Failed to create or access cache directory
    #[error("Failed to create cache directory at {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read cached data
    #[error("Failed to read cache file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write cached data
    #[error("Failed to write cache file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to deserialize cached data
    #[error("Failed to deserialize cache file {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize data for caching
    #[error("Failed to serialize data: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Application cache root
///
/// - Linux: ~/.cache/series_archiver/
/// - macOS: ~/Library/Caches/series_archiver/
/// - Windows: %LOCALAPPDATA%\series_archiver\cache\
pub(crate) fn cache_root() -> Result<PathBuf, CacheError> {
    let proj_dirs = directories::ProjectDirs::from("", "", "series_archiver")
        .ok_or(CacheError::CacheDirectoryNotFound)?;
    Ok(proj_dirs.cache_dir().to_path_buf())
}

/// A generic cache storage for serializable data
///
/// Entries are JSON files named after their sanitized identifier. With a
/// time-to-live set, entries whose file is older than the TTL are treated
/// as missing.
pub(crate) struct CacheStorage<T> {
    /// The directory where cached data is stored
    cache_dir: PathBuf,
    /// Maximum age of an entry, `None` keeps entries forever
    ttl: Option<Duration>,
    _phantom: PhantomData<T>,
}

impl<T> CacheStorage<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    /// Opens or creates a cache storage with the given name in the user cache
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let cache: CacheStorage<Vec<PlaylistVideo>> =
    ///     CacheStorage::open("playlists", Some(Duration::from_secs(3600)))?;
    /// ```
    pub fn open(name: &str, ttl: Option<Duration>) -> Result<Self, CacheError> {
        Self::open_in(&cache_root()?, name, ttl)
    }

    /// Opens or creates a cache storage below an explicit base directory
    pub fn open_in(base: &Path, name: &str, ttl: Option<Duration>) -> Result<Self, CacheError> {
        let cache_dir = base.join(sanitize_name(name));

        fs::create_dir_all(&cache_dir).map_err(|e| CacheError::DirectoryCreationFailed {
            path: cache_dir.clone(),
            source: e,
        })?;

        Ok(Self {
            cache_dir,
            ttl,
            _phantom: PhantomData,
        })
    }

    fn entry_path(&self, identifier: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", sanitize_name(identifier)))
    }

    /// Loads cached data for the given identifier
    ///
    /// Returns `None` if there is no entry or the entry has expired. Returns an
    /// error if the entry exists but cannot be read or deserialized.
    pub fn load(&self, identifier: &str) -> Result<Option<T>, CacheError> {
        let file_path = self.entry_path(identifier);

        if !file_path.exists() {
            return Ok(None);
        }

        if self.is_expired(&file_path) {
            log::debug!("Cache entry {} expired", file_path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&file_path).map_err(|e| CacheError::ReadFailed {
            path: file_path.clone(),
            source: e,
        })?;

        let data =
            serde_json::from_str(&content).map_err(|e| CacheError::DeserializationFailed {
                path: file_path,
                source: e,
            })?;

        Ok(Some(data))
    }

    /// Stores data in the cache with the given identifier
    pub fn store(&self, identifier: &str, data: &T) -> Result<(), CacheError> {
        let file_path = self.entry_path(identifier);
        let content = serde_json::to_string_pretty(data)?;

        fs::write(&file_path, content).map_err(|e| CacheError::WriteFailed {
            path: file_path,
            source: e,
        })?;

        Ok(())
    }

    fn is_expired(&self, file_path: &Path) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };

        // An unreadable timestamp counts as expired so the entry gets refreshed
        fs::metadata(file_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_none_or(|age| age > ttl)
    }
}

/// Sanitizes a name for use in file paths
///
/// Converts to lowercase and replaces all characters that are not
/// a-z, 0-9, or hyphen with underscores.
fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Simple"), "simple");
        assert_eq!(sanitize_name("With Spaces"), "with_spaces");
        assert_eq!(sanitize_name("With-Hyphens"), "with-hyphens");
        assert_eq!(sanitize_name("Special!@#$%"), "special_____");
        assert_eq!(sanitize_name("Mixed123ABC"), "mixed123abc");
    }

    #[test]
    fn test_store_and_load() {
        let base = TempDir::new().unwrap();
        let cache: CacheStorage<Vec<String>> =
            CacheStorage::open_in(base.path(), "playlists", None).unwrap();

        assert!(cache.load("PLabc").unwrap().is_none());

        cache.store("PLabc", &vec!["one".to_string()]).unwrap();
        assert_eq!(cache.load("PLabc").unwrap(), Some(vec!["one".to_string()]));
    }

    #[test]
    fn test_zero_ttl_expires_entries() {
        let base = TempDir::new().unwrap();
        let cache: CacheStorage<u32> =
            CacheStorage::open_in(base.path(), "short", Some(Duration::ZERO)).unwrap();

        cache.store("key", &7).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.load("key").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let base = TempDir::new().unwrap();
        let cache: CacheStorage<u32> = CacheStorage::open_in(base.path(), "bad", None).unwrap();
        fs::write(base.path().join("bad").join("key.json"), "not json").unwrap();

        assert!(matches!(
            cache.load("key"),
            Err(CacheError::DeserializationFailed { .. })
        ));
    }
}
