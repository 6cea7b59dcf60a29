//! Download tracking file
//!
//! A flat, append-only list of video identifiers that have been downloaded,
//! in the same format yt-dlp writes for `--download-archive`
//! (`youtube <id>` per line). The file is only used to skip work; it is not
//! a transaction log.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extractor key written in front of every identifier
const EXTRACTOR: &str = "youtube";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to read download archive {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    #[error("Failed to write download archive {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Identifiers of videos that were already downloaded
#[derive(Debug)]
pub struct DownloadArchive {
    path: PathBuf,
    ids: HashSet<String>,
}

impl DownloadArchive {
    /// Opens the archive, treating a missing file as empty
    ///
    /// Lines may be `<extractor> <id>` or a bare `<id>`.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let ids = match fs::read_to_string(path) {
            Ok(content) => content
                .lines()
                .filter_map(|line| line.split_whitespace().last())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                return Err(ArchiveError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            ids,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Re-reads the file to pick up lines the external tool appended
    pub fn reload(&mut self) -> Result<(), ArchiveError> {
        *self = Self::open(&self.path)?;
        Ok(())
    }

    /// Appends an identifier unless it is already recorded
    pub fn record(&mut self, id: &str) -> Result<(), ArchiveError> {
        if self.contains(id) {
            return Ok(());
        }

        let write_error = |e| ArchiveError::WriteFailed {
            path: self.path.clone(),
            source: e,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_error)?;
        writeln!(file, "{} {}", EXTRACTOR, id).map_err(write_error)?;

        self.ids.insert(id.to_string());
        Ok(())
    }

    /// Drops every line recording an identifier
    ///
    /// Used when the tool archived a video whose output turned out unusable.
    pub fn forget(&mut self, id: &str) -> Result<(), ArchiveError> {
        self.reload()?;
        if !self.contains(id) {
            return Ok(());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| ArchiveError::ReadFailed {
            path: self.path.clone(),
            source: e,
        })?;
        let kept: String = content
            .lines()
            .filter(|line| line.split_whitespace().last() != Some(id))
            .map(|line| format!("{}\n", line))
            .collect();
        fs::write(&self.path, kept).map_err(|e| ArchiveError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;

        self.ids.remove(id);
        Ok(())
    }
}
