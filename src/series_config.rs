//! Series configuration loading
//!
//! A series config describes one show: how files and season directories
//! are named, which quality and subtitles to request, and where the
//! episodes come from (playlists per season, inline episode lists, or both).

use crate::naming::{self, DEFAULT_DIRECTORY_PATTERN, DEFAULT_NAMING_PATTERN, NamingError};
use crate::ordered_map::OrderedMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions recognised as series configs, in lookup order
pub const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Errors that can occur while loading a series config
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config file with the requested name exists
    #[error("Series config '{name}' not found (searched: {searched})")]
    NotFound { name: String, searched: String },

    /// Failed to read the config file
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML config could not be parsed
    #[error("Failed to parse YAML config {path}: {source}")]
    InvalidYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// JSON config could not be parsed
    #[error("Failed to parse JSON config {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Config parsed but is not usable
    #[error("Invalid config {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    /// A naming or directory pattern is malformed
    #[error("Invalid pattern in {path}: {source}")]
    InvalidPattern { path: PathBuf, source: NamingError },
}

/// Subtitle preferences passed on to the download tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleSettings {
    /// Request subtitles at all
    pub enabled: bool,
    /// Subtitle language code (e.g. "en")
    pub lang: String,
    /// Embed subtitles into the video container instead of only writing sidecars
    pub embed: bool,
    /// Also accept automatically generated subtitles
    pub auto_generated: bool,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            lang: "en".to_string(),
            embed: true,
            auto_generated: false,
        }
    }
}

/// How the external download tool is invoked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderSettings {
    /// Program and leading arguments, e.g. `["python3", "-m", "yt_dlp"]`
    pub command: Vec<String>,
    /// Extra arguments appended to every download invocation
    pub extra_args: Vec<String>,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            command: vec!["yt-dlp".to_string()],
            extra_args: Vec::new(),
        }
    }
}

/// A single episode listed inline in a config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeEntry {
    /// Episode title; may carry `SxxExx` numbering
    #[serde(default)]
    pub title: Option<String>,
    /// External video identifier
    pub id: String,
    /// Explicit season number, takes precedence over the title
    #[serde(default)]
    pub season: Option<u32>,
    /// Explicit episode number, takes precedence over the title
    #[serde(default)]
    pub episode: Option<u32>,
}

impl EpisodeEntry {
    /// Season and episode numbers from explicit fields or the title
    pub fn numbers(&self) -> Option<(u32, u32)> {
        naming::episode_numbers(self.season, self.episode, self.title.as_deref())
    }
}

fn default_naming_pattern() -> String {
    DEFAULT_NAMING_PATTERN.to_string()
}

fn default_directory_pattern() -> String {
    DEFAULT_DIRECTORY_PATTERN.to_string()
}

fn default_quality() -> u32 {
    1080
}

/// Descriptor of a show's seasons, episodes and naming conventions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Display name of the series
    pub series_name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Pattern for episode file names
    #[serde(default = "default_naming_pattern")]
    pub naming_pattern: String,

    /// Pattern for season directory names
    #[serde(default = "default_directory_pattern")]
    pub directory_pattern: String,

    /// Maximum video height to request
    #[serde(default = "default_quality")]
    pub quality: u32,

    /// Explicit format selector, replaces the one derived from `quality`
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub subtitles: SubtitleSettings,

    /// Season label to playlist identifier
    #[serde(default)]
    pub seasons: OrderedMap<String>,

    /// Season label to inline episode list
    #[serde(default)]
    pub episodes: OrderedMap<Vec<EpisodeEntry>>,

    #[serde(default)]
    pub downloader: DownloaderSettings,
}

impl SeriesConfig {
    /// File-system friendly series name used for the catalog and archive files
    pub fn safe_name(&self) -> String {
        self.series_name.to_lowercase().replace(' ', "_")
    }

    /// Format selector handed to the download tool
    pub fn format_selector(&self) -> String {
        match &self.format {
            Some(format) => format.clone(),
            None => format!("best[height<={}]", self.quality),
        }
    }

    /// Renders the file name for an episode
    pub fn episode_filename(
        &self,
        season: u32,
        episode: u32,
        title: &str,
    ) -> Result<String, NamingError> {
        naming::generate_filename(&self.naming_pattern, &self.series_name, season, episode, title)
    }

    /// Renders the directory name for a season
    pub fn season_directory(&self, season: u32, season_name: &str) -> Result<String, NamingError> {
        naming::season_directory_name(&self.directory_pattern, &self.series_name, season, season_name)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        if self.series_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "series_name must not be empty".to_string(),
            });
        }

        if self.downloader.command.is_empty() {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "downloader.command must name a program".to_string(),
            });
        }

        for pattern in [&self.naming_pattern, &self.directory_pattern] {
            naming::validate_pattern(pattern).map_err(|e| ConfigError::InvalidPattern {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        Ok(())
    }
}

/// Loads and validates a series config from a YAML or JSON file
///
/// The format is chosen by extension; anything that is not `.json` is
/// parsed as YAML.
pub fn load_config(path: &Path) -> Result<SeriesConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let config: SeriesConfig = if is_json {
        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            source: e,
        })?
    } else {
        serde_yaml::from_str(&content).map_err(|e| ConfigError::InvalidYaml {
            path: path.to_path_buf(),
            source: e,
        })?
    };

    config.validate(path)?;
    log::debug!("Loaded series config '{}' from {}", config.series_name, path.display());

    Ok(config)
}

/// Per-user config directory for series configs
///
/// - Linux: ~/.config/series_archiver/series/
/// - macOS: ~/Library/Application Support/series_archiver/series/
/// - Windows: %APPDATA%\series_archiver\series\
pub fn user_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "series_archiver")
        .map(|dirs| dirs.config_dir().join("series"))
}

/// Resolves a series name to a config file
///
/// A name that points at an existing file is used directly. Otherwise each
/// directory is searched for `<name>.yaml`, `<name>.yml` and `<name>.json`.
pub fn locate_config(name: &str, config_dirs: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    for dir in config_dirs {
        for ext in CONFIG_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", name, ext));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(ConfigError::NotFound {
        name: name.to_string(),
        searched: config_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Lists the names of all series configs found in the given directories
pub fn available_configs(config_dirs: &[PathBuf]) -> Vec<String> {
    let mut names = BTreeSet::new();

    for dir in config_dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_config = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| CONFIG_EXTENSIONS.contains(&e));
            if path.is_file() && is_config {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.insert(stem.to_string());
                }
            }
        }
    }

    names.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "test.yaml",
            r#"
series_name: "Test Series"
description: "Test description"
quality: 1080
episodes:
  Season 1:
    - title: "S01E01 Test"
      id: "abc123"
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.series_name, "Test Series");
        assert_eq!(config.quality, 1080);
        assert_eq!(config.description.as_deref(), Some("Test description"));
        assert_eq!(config.episodes.get("Season 1").unwrap().len(), 1);
        assert_eq!(config.naming_pattern, DEFAULT_NAMING_PATTERN);
        assert_eq!(config.directory_pattern, DEFAULT_DIRECTORY_PATTERN);
        assert_eq!(config.downloader.command, vec!["yt-dlp".to_string()]);
    }

    #[test]
    fn test_load_config_with_subtitles() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "test.yaml",
            r#"
series_name: "Test"
subtitles:
  enabled: false
  lang: "de"
"#,
        );

        let config = load_config(&path).unwrap();
        assert!(!config.subtitles.enabled);
        assert_eq!(config.subtitles.lang, "de");
        // Unset keys keep their defaults
        assert!(config.subtitles.embed);
    }

    #[test]
    fn test_load_config_with_custom_patterns() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "test.yaml",
            r#"
series_name: "Test"
naming_pattern: "{season}_{episode}_{title}.mp4"
directory_pattern: "Series_{series_name}"
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.naming_pattern, "{season}_{episode}_{title}.mp4");
        assert_eq!(config.season_directory(1, "Season 1").unwrap(), "Series_Test");
    }

    #[test]
    fn test_rejects_unknown_placeholder() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "test.yaml",
            "series_name: Test\nnaming_pattern: \"{show}_{episode}.mp4\"\n",
        );

        assert!(matches!(
            load_config(&path),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_series_name() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "test.yaml", "series_name: \"  \"\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("/nonexistent/series.yaml"));
        assert!(matches!(result, Err(ConfigError::ReadFailed { .. })));
    }

    #[test]
    fn test_multiple_seasons_keep_order() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "test.yaml",
            r#"
series_name: "Test"
seasons:
  Season 2: PL2
  Season 10: PL10
episodes:
  Season 1:
    - title: "S01E01 Test"
      id: "abc123"
      season: 1
      episode: 1
  Season 2:
    - title: "S02E01 Test"
      id: "def456"
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.seasons.keys().collect::<Vec<_>>(), vec!["Season 2", "Season 10"]);
        assert_eq!(config.episodes.len(), 2);
        let first = &config.episodes.get("Season 1").unwrap()[0];
        assert_eq!(first.id, "abc123");
        assert_eq!(first.numbers(), Some((1, 1)));
    }

    #[test]
    fn test_load_json_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "test.json",
            r#"{"series_name": "Json Show", "quality": 720, "format": "bestvideo+bestaudio"}"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.safe_name(), "json_show");
        assert_eq!(config.format_selector(), "bestvideo+bestaudio");
    }

    #[test]
    fn test_format_selector_from_quality() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "q.yaml", "series_name: Q\nquality: 720\n");
        assert_eq!(load_config(&path).unwrap().format_selector(), "best[height<=720]");
    }

    #[test]
    fn test_locate_and_list_configs() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_config(&first, "alpha.yaml", "series_name: Alpha\n");
        write_config(&second, "beta.yml", "series_name: Beta\n");
        write_config(&second, "alpha.json", r#"{"series_name": "Other"}"#);
        write_config(&second, "notes.txt", "ignored");

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];

        assert_eq!(locate_config("alpha", &dirs).unwrap(), first.path().join("alpha.yaml"));
        assert_eq!(locate_config("beta", &dirs).unwrap(), second.path().join("beta.yml"));
        assert!(matches!(
            locate_config("gamma", &dirs),
            Err(ConfigError::NotFound { .. })
        ));
        assert_eq!(available_configs(&dirs), vec!["alpha", "beta"]);
    }
}
