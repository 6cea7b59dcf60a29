//! File resolver module for the download library
//!
//! This module knows how a downloaded series is laid out on disk: season
//! directories containing `.mp4` episode files named with `SxxExx` markers.
//! It finds the file that belongs to an episode regardless of how exactly
//! it was named, and enumerates what is already present.

use crate::naming::parse_filename_numbers;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Files smaller than this are treated as broken or partial downloads
pub const MIN_VALID_SIZE: u64 = 10_000;

/// Extension of episode files
pub const VIDEO_EXTENSION: &str = "mp4";

/// Errors that can occur during file resolution
#[derive(Debug, Error)]
pub enum FileResolverError {
    /// Path is not a directory
    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Failed to read directory
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read directory entry
    #[error("Failed to read directory entry: {0}")]
    ReadEntryFailed(#[from] io::Error),
}

/// A video file found in the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
    /// Path to the video file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

impl VideoFile {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Season/episode numbers carried by the file name
    pub fn numbers(&self) -> Option<(u32, u32)> {
        parse_filename_numbers(self.file_name())
    }

    /// Whether the file is large enough to be a finished download
    pub fn is_complete(&self) -> bool {
        self.size >= MIN_VALID_SIZE
    }
}

/// Whether a file name belongs to an unfinished download
pub fn is_partial_download(file_name: &str) -> bool {
    file_name.contains(".part") || file_name.contains(".ytdl")
}

fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(VIDEO_EXTENSION))
}

/// Lists the episode video files directly inside a directory, sorted by name
///
/// Partial downloads are skipped. A directory that does not exist has no
/// videos.
pub fn scan_videos(dir_path: &Path) -> Result<Vec<VideoFile>, FileResolverError> {
    if !dir_path.exists() {
        return Ok(Vec::new());
    }
    if !dir_path.is_dir() {
        return Err(FileResolverError::NotADirectory(dir_path.to_path_buf()));
    }

    let mut videos = Vec::new();

    for entry in fs::read_dir(dir_path).map_err(|e| FileResolverError::ReadDirectoryFailed {
        path: dir_path.to_path_buf(),
        source: e,
    })? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if !path.is_file() || !has_video_extension(&path) || is_partial_download(&name) {
            continue;
        }

        let size = entry.metadata()?.len();
        videos.push(VideoFile { path, size });
    }

    videos.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(videos)
}

/// Lists the subdirectories of the download directory, sorted by name
pub fn scan_season_dirs(download_dir: &Path) -> Result<Vec<PathBuf>, FileResolverError> {
    if !download_dir.exists() {
        return Ok(Vec::new());
    }
    if !download_dir.is_dir() {
        return Err(FileResolverError::NotADirectory(download_dir.to_path_buf()));
    }

    let mut dirs = Vec::new();
    for entry in
        fs::read_dir(download_dir).map_err(|e| FileResolverError::ReadDirectoryFailed {
            path: download_dir.to_path_buf(),
            source: e,
        })?
    {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// Counts episode files across all season directories
pub fn count_existing_videos(download_dir: &Path) -> Result<usize, FileResolverError> {
    let mut count = 0;
    for dir in scan_season_dirs(download_dir)? {
        count += scan_videos(&dir)?.len();
    }
    Ok(count)
}

/// Finds the file of an episode inside its season directory
///
/// Any `.mp4` whose name carries the same season and episode numbers
/// matches, whatever the padding, case or title. Files below
/// `MIN_VALID_SIZE` are ignored.
pub fn find_episode_file(
    season_dir: &Path,
    season: u32,
    episode: u32,
) -> Result<Option<VideoFile>, FileResolverError> {
    Ok(scan_videos(season_dir)?
        .into_iter()
        .find(|video| video.is_complete() && video.numbers() == Some((season, episode))))
}

/// Lists every file of an episode, complete or not, sorted by name
pub fn find_episode_files(
    season_dir: &Path,
    season: u32,
    episode: u32,
) -> Result<Vec<VideoFile>, FileResolverError> {
    Ok(scan_videos(season_dir)?
        .into_iter()
        .filter(|video| video.numbers() == Some((season, episode)))
        .collect())
}

/// Analyzes a file to determine if it's a video file
///
/// Looks at the content, not the extension. Only the first 8KB are read.
pub fn is_video_file(file_path: &Path) -> bool {
    const BUFFER_SIZE: usize = 8192;

    let mut file = match File::open(file_path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let bytes_read = match file.read(&mut buffer) {
        Ok(n) => n,
        Err(_) => return false,
    };

    buffer.truncate(bytes_read);

    infer::is_video(&buffer)
}
