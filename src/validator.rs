//! Download validation
//!
//! Compares the catalog with what is actually on disk and reports, per
//! season, which episodes are present, which files look broken and which are
//! missing. Video files that belong to no catalog episode are listed as
//! unexpected.

use crate::catalog::{CatalogEntry, CatalogError, EpisodeCatalog};
use crate::file_resolver::{self, FileResolverError, MIN_VALID_SIZE, VideoFile};
use crate::series_config::SeriesConfig;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    FileResolver(#[from] FileResolverError),
}

/// State of one expected episode on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpisodeStatus {
    Present { path: PathBuf, size: u64 },
    /// A file exists but is too small or not recognised as video
    Incomplete { path: PathBuf, size: u64 },
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeCheck {
    pub season: u32,
    pub episode: u32,
    pub title: String,
    pub id: String,
    /// Where the file is expected under the configured naming
    pub expected_path: PathBuf,
    #[serde(flatten)]
    pub status: EpisodeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonReport {
    pub season_label: String,
    pub directory: PathBuf,
    pub episodes: Vec<EpisodeCheck>,
}

impl SeasonReport {
    pub fn expected(&self) -> usize {
        self.episodes.len()
    }

    pub fn found(&self) -> usize {
        self.episodes
            .iter()
            .filter(|e| matches!(e.status, EpisodeStatus::Present { .. }))
            .count()
    }
}

/// Result of comparing the catalog with the download directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub series_name: String,
    pub download_dir: PathBuf,
    pub seasons: Vec<SeasonReport>,
    /// Catalog titles without season/episode numbers
    pub unparseable: Vec<String>,
    /// Video files that match no catalog episode
    pub unexpected: Vec<PathBuf>,
}

impl ValidationReport {
    fn checks(&self) -> impl Iterator<Item = &EpisodeCheck> {
        self.seasons.iter().flat_map(|s| s.episodes.iter())
    }

    pub fn expected(&self) -> usize {
        self.checks().count()
    }

    pub fn present(&self) -> usize {
        self.seasons.iter().map(SeasonReport::found).sum()
    }

    pub fn incomplete(&self) -> Vec<&EpisodeCheck> {
        self.checks()
            .filter(|c| matches!(c.status, EpisodeStatus::Incomplete { .. }))
            .collect()
    }

    pub fn missing(&self) -> Vec<&EpisodeCheck> {
        self.checks()
            .filter(|c| c.status == EpisodeStatus::Missing)
            .collect()
    }

    /// Share of expected episodes that are present, from 0.0 to 1.0
    pub fn completion_rate(&self) -> f64 {
        let expected = self.expected();
        if expected == 0 {
            return 0.0;
        }
        self.present() as f64 / expected as f64
    }

    pub fn total_size(&self) -> u64 {
        self.checks()
            .map(|c| match c.status {
                EpisodeStatus::Present { size, .. } => size,
                _ => 0,
            })
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.expected() > 0 && self.present() == self.expected()
    }
}

/// Present if any matching file is a complete video, else the first leftover
fn episode_status(files: Vec<VideoFile>) -> EpisodeStatus {
    let mut leftover = None;
    for video in files {
        if video.size >= MIN_VALID_SIZE && file_resolver::is_video_file(&video.path) {
            return EpisodeStatus::Present {
                path: video.path,
                size: video.size,
            };
        }
        leftover.get_or_insert(video);
    }

    match leftover {
        Some(video) => EpisodeStatus::Incomplete {
            path: video.path,
            size: video.size,
        },
        None => EpisodeStatus::Missing,
    }
}

/// Checks every catalog episode against the download directory
pub fn validate_downloads(
    config: &SeriesConfig,
    catalog: &EpisodeCatalog,
    download_dir: &Path,
) -> Result<ValidationReport, ValidationError> {
    let mut seasons: Vec<SeasonReport> = Vec::new();
    let mut unparseable = Vec::new();
    let mut expected_numbers: HashMap<PathBuf, HashSet<(u32, u32)>> = HashMap::new();

    for entry in catalog.entries(config)? {
        let episode = match entry {
            CatalogEntry::Episode(episode) => episode,
            CatalogEntry::Unparseable { title, .. } => {
                unparseable.push(title);
                continue;
            }
        };

        let season_dir = episode.season_dir(download_dir);
        expected_numbers
            .entry(season_dir.clone())
            .or_default()
            .insert((episode.season, episode.episode));

        let files =
            file_resolver::find_episode_files(&season_dir, episode.season, episode.episode)?;
        let status = episode_status(files);

        let check = EpisodeCheck {
            season: episode.season,
            episode: episode.episode,
            expected_path: episode.target_path(download_dir),
            title: episode.title,
            id: episode.id,
            status,
        };

        match seasons.last_mut() {
            Some(season)
                if season.season_label == episode.season_label && season.directory == season_dir =>
            {
                season.episodes.push(check)
            }
            _ => seasons.push(SeasonReport {
                season_label: episode.season_label,
                directory: season_dir,
                episodes: vec![check],
            }),
        }
    }

    let mut unexpected = Vec::new();
    for dir in file_resolver::scan_season_dirs(download_dir)? {
        let known = expected_numbers.get(&dir);
        for video in file_resolver::scan_videos(&dir)? {
            let belongs = video
                .numbers()
                .zip(known)
                .is_some_and(|(numbers, known)| known.contains(&numbers));
            if !belongs {
                log::debug!("Unexpected file {}", video.path.display());
                unexpected.push(video.path);
            }
        }
    }

    Ok(ValidationReport {
        series_name: config.series_name.clone(),
        download_dir: download_dir.to_path_buf(),
        seasons,
        unparseable,
        unexpected,
    })
}

/// Writes the report as pretty JSON
pub fn save_report(report: &ValidationReport, path: &Path) -> io::Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_resolver::tests::write_fake_mp4;
    use tempfile::TempDir;

    fn sample_config() -> SeriesConfig {
        serde_yaml::from_str(
            r#"
series_name: Show
episodes:
  Season 1:
    - title: "S01E01 One"
      id: one
    - title: "S01E02 Two"
      id: two
    - title: "S01E03 Three"
      id: three
  Season 2:
    - title: "S02E01 Four"
      id: four
    - title: "Behind the scenes"
      id: bts
"#,
        )
        .unwrap()
    }

    fn validate(dir: &Path) -> ValidationReport {
        let config = sample_config();
        let catalog = EpisodeCatalog::from_config(&config);
        validate_downloads(&config, &catalog, dir).unwrap()
    }

    #[test]
    fn test_empty_download_dir() {
        let dir = TempDir::new().unwrap();
        let report = validate(&dir.path().join("downloads"));

        assert_eq!(report.expected(), 4);
        assert_eq!(report.present(), 0);
        assert_eq!(report.missing().len(), 4);
        assert_eq!(report.completion_rate(), 0.0);
        assert_eq!(report.unparseable, vec!["Behind the scenes"]);
        assert!(report.unexpected.is_empty());
    }

    #[test]
    fn test_classifies_files() {
        let dir = TempDir::new().unwrap();
        let season1 = dir.path().join("Season_1_HD");
        write_fake_mp4(&season1.join("S01E01_One.mp4"), 20_000);
        write_fake_mp4(&season1.join("s1e2_renamed.mp4"), 20_000);
        write_fake_mp4(&season1.join("S01E03_Three.mp4"), 500);
        write_fake_mp4(&season1.join("S01E09_Stray.mp4"), 20_000);
        write_fake_mp4(&season1.join("no_numbers.mp4"), 20_000);

        let report = validate(dir.path());

        assert_eq!(report.seasons.len(), 2);
        assert_eq!(report.seasons[0].season_label, "Season 1");
        assert_eq!(report.seasons[0].expected(), 3);
        assert_eq!(report.seasons[0].found(), 2);
        assert_eq!(report.seasons[1].found(), 0);

        assert_eq!(report.present(), 2);
        assert_eq!(report.incomplete().len(), 1);
        assert_eq!(report.incomplete()[0].episode, 3);
        assert_eq!(report.missing().len(), 1);
        assert_eq!(report.missing()[0].id, "four");
        assert_eq!(report.completion_rate(), 0.5);
        assert_eq!(report.total_size(), 40_000);
        assert!(!report.is_complete());

        let unexpected: Vec<_> = report
            .unexpected
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(unexpected, vec!["S01E09_Stray.mp4", "no_numbers.mp4"]);
    }

    #[test]
    fn test_file_in_wrong_season_dir_is_missing() {
        let dir = TempDir::new().unwrap();
        write_fake_mp4(
            &dir.path().join("Season_1_HD").join("S02E01_Four.mp4"),
            20_000,
        );

        let report = validate(dir.path());

        assert!(report.missing().iter().any(|c| c.id == "four"));
        assert_eq!(report.unexpected.len(), 1);
    }

    #[test]
    fn test_non_video_content_is_incomplete() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Season_1_HD")).unwrap();
        fs::write(
            dir.path().join("Season_1_HD").join("S01E01_One.mp4"),
            vec![b'x'; 20_000],
        )
        .unwrap();

        let report = validate(dir.path());
        assert!(matches!(
            report.seasons[0].episodes[0].status,
            EpisodeStatus::Incomplete { size: 20_000, .. }
        ));
    }

    #[test]
    fn test_tiny_duplicate_does_not_hide_complete_file() {
        let dir = TempDir::new().unwrap();
        let season1 = dir.path().join("Season_1_HD");
        write_fake_mp4(&season1.join("S01E01_Aborted.mp4"), 100);
        write_fake_mp4(&season1.join("S01E01_One.mp4"), 20_000);
        write_fake_mp4(&season1.join("S01E02_Retry.mp4"), 100);
        write_fake_mp4(&season1.join("s1e2_broken.mp4"), 300);

        let report = validate(dir.path());
        let episodes = &report.seasons[0].episodes;

        assert_eq!(
            episodes[0].status,
            EpisodeStatus::Present {
                path: season1.join("S01E01_One.mp4"),
                size: 20_000,
            }
        );
        assert!(matches!(
            &episodes[1].status,
            EpisodeStatus::Incomplete { path, size: 100 } if path.ends_with("S01E02_Retry.mp4")
        ));
        assert!(report.unexpected.is_empty());
    }

    #[test]
    fn test_save_report() {
        let dir = TempDir::new().unwrap();
        write_fake_mp4(
            &dir.path().join("Season_1_HD").join("S01E01_One.mp4"),
            20_000,
        );
        let report = validate(dir.path());

        let path = dir.path().join("validation_report.json");
        save_report(&report, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["series_name"], "Show");
        assert_eq!(json["seasons"][0]["episodes"][0]["status"], "present");
        assert_eq!(json["seasons"][0]["episodes"][1]["status"], "missing");
    }
}
