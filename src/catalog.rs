//! Persisted episode catalog
//!
//! The catalog is the JSON file written by the metadata fetcher: for every
//! season label the playlist it came from and the videos it contains. The
//! download orchestrator and validator both work from it.

use crate::naming::NamingError;
use crate::ordered_map::OrderedMap;
use crate::series_config::SeriesConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or storing the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Neither a catalog file nor inline episodes are available
    #[error("{path} not found and the config lists no episodes. Run: series-archiver fetch <series>")]
    Missing { path: PathBuf },

    #[error("Failed to read catalog {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write catalog {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to compute episode path: {0}")]
    Naming(#[from] NamingError),
}

/// A video as listed in a season playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEpisode {
    #[serde(default)]
    pub title: Option<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Duration in seconds as reported by the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

/// All videos of one season label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonListing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub episode_count: usize,
    pub episodes: Vec<CatalogEpisode>,
}

impl SeasonListing {
    pub fn new(playlist_id: Option<String>, episodes: Vec<CatalogEpisode>) -> Self {
        Self {
            url: playlist_id.as_deref().map(playlist_url),
            playlist_id,
            episode_count: episodes.len(),
            episodes,
        }
    }
}

/// URL of a YouTube playlist
pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={}", playlist_id)
}

/// URL of a YouTube video
pub fn video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// An episode with its numbering resolved and its target location computed
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub season_label: String,
    pub season: u32,
    pub episode: u32,
    pub title: String,
    pub id: String,
    /// Season directory name relative to the download directory
    pub directory: String,
    /// File name inside the season directory
    pub file_name: String,
}

impl Episode {
    /// Target path below the given download directory
    pub fn target_path(&self, download_dir: &Path) -> PathBuf {
        download_dir.join(&self.directory).join(&self.file_name)
    }

    pub fn season_dir(&self, download_dir: &Path) -> PathBuf {
        download_dir.join(&self.directory)
    }

    /// `S1E3` style label for console output
    pub fn label(&self) -> String {
        format!("S{}E{}", self.season, self.episode)
    }
}

/// A catalog entry that could be turned into an episode, or not
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEntry {
    Episode(Episode),
    /// Neither explicit fields nor the title carry season/episode numbers
    Unparseable {
        season_label: String,
        title: String,
        id: String,
    },
}

/// Season label to listing, in playlist order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeCatalog {
    pub seasons: OrderedMap<SeasonListing>,
}

impl EpisodeCatalog {
    /// Loads a catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|e| CatalogError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| CatalogError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Writes the catalog as pretty-printed JSON
    pub fn store(&self, path: &Path) -> Result<(), CatalogError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| CatalogError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Builds a catalog from the episodes listed inline in a config
    pub fn from_config(config: &SeriesConfig) -> Self {
        let seasons = config
            .episodes
            .iter()
            .map(|(label, entries)| {
                let episodes = entries
                    .iter()
                    .map(|entry| CatalogEpisode {
                        title: entry.title.clone(),
                        id: entry.id.clone(),
                        url: Some(video_url(&entry.id)),
                        duration: None,
                        season: entry.season,
                        episode: entry.episode,
                    })
                    .collect();
                (label.to_string(), SeasonListing::new(None, episodes))
            })
            .collect();

        Self { seasons }
    }

    pub fn season_count(&self) -> usize {
        self.seasons.len()
    }

    pub fn episode_count(&self) -> usize {
        self.seasons.values().map(|s| s.episodes.len()).sum()
    }

    /// Resolves numbering and target names for every listed video
    ///
    /// File and directory names are derived only from the config and the
    /// entry, so the same inputs always give the same paths.
    pub fn entries(&self, config: &SeriesConfig) -> Result<Vec<CatalogEntry>, CatalogError> {
        let mut result = Vec::with_capacity(self.episode_count());

        for (label, listing) in self.seasons.iter() {
            for item in &listing.episodes {
                let title = item.title.clone().unwrap_or_default();
                let numbers =
                    crate::naming::episode_numbers(item.season, item.episode, item.title.as_deref());

                let Some((season, episode)) = numbers else {
                    result.push(CatalogEntry::Unparseable {
                        season_label: label.to_string(),
                        title,
                        id: item.id.clone(),
                    });
                    continue;
                };

                result.push(CatalogEntry::Episode(Episode {
                    season_label: label.to_string(),
                    season,
                    episode,
                    directory: config.season_directory(season, label)?,
                    file_name: config.episode_filename(season, episode, &title)?,
                    title,
                    id: item.id.clone(),
                }));
            }
        }

        Ok(result)
    }

    /// Only the entries with resolved numbering
    pub fn episodes(&self, config: &SeriesConfig) -> Result<Vec<Episode>, CatalogError> {
        Ok(self
            .entries(config)?
            .into_iter()
            .filter_map(|entry| match entry {
                CatalogEntry::Episode(episode) => Some(episode),
                CatalogEntry::Unparseable { .. } => None,
            })
            .collect())
    }
}

/// Picks the catalog for a run
///
/// The fetched catalog file wins; without one, episodes listed inline in the
/// config are used.
pub fn resolve_catalog(config: &SeriesConfig, path: &Path) -> Result<EpisodeCatalog, CatalogError> {
    if path.exists() {
        log::debug!("Using catalog file {}", path.display());
        return EpisodeCatalog::load(path);
    }

    if !config.episodes.is_empty() {
        log::debug!("No catalog at {}, using inline episodes", path.display());
        return Ok(EpisodeCatalog::from_config(config));
    }

    Err(CatalogError::Missing {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(yaml: &str) -> SeriesConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn sample_config() -> SeriesConfig {
        config(
            r#"
series_name: Numberblocks
episodes:
  Season 1:
    - title: "One | Full Episode - S01E01 | Numberblocks"
      id: vid1
    - title: "Custom Title"
      id: vid2
      season: 1
      episode: 2
    - title: "No numbering here"
      id: vid3
"#,
        )
    }

    #[test]
    fn test_from_config_and_entries() {
        let config = sample_config();
        let catalog = EpisodeCatalog::from_config(&config);
        assert_eq!(catalog.season_count(), 1);
        assert_eq!(catalog.episode_count(), 3);

        let entries = catalog.entries(&config).unwrap();
        assert_eq!(entries.len(), 3);

        let CatalogEntry::Episode(first) = &entries[0] else {
            panic!("expected episode");
        };
        assert_eq!(first.directory, "Season_1_HD");
        assert_eq!(first.file_name, "S01E01_One_Full_Episode_-_S01E01_Numberblocks.mp4");

        let CatalogEntry::Episode(second) = &entries[1] else {
            panic!("expected episode");
        };
        assert_eq!(second.file_name, "S01E02_Custom_Title.mp4");
        assert_eq!(
            second.target_path(Path::new("downloads")),
            Path::new("downloads").join("Season_1_HD").join("S01E02_Custom_Title.mp4")
        );

        assert!(matches!(&entries[2], CatalogEntry::Unparseable { id, .. } if id == "vid3"));
        assert_eq!(catalog.episodes(&config).unwrap().len(), 2);
    }

    #[test]
    fn test_store_and_load_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("show_playlists.json");

        let mut catalog = EpisodeCatalog::default();
        for n in [2, 10, 1] {
            catalog.seasons.insert(
                format!("Season {}", n),
                SeasonListing::new(
                    Some(format!("PL{}", n)),
                    vec![CatalogEpisode {
                        title: Some(format!("S{}E1 Title", n)),
                        id: format!("id{}", n),
                        url: None,
                        duration: Some(300.0),
                        season: None,
                        episode: None,
                    }],
                ),
            );
        }
        catalog.store(&path).unwrap();

        let loaded = EpisodeCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(
            loaded.seasons.keys().collect::<Vec<_>>(),
            vec!["Season 2", "Season 10", "Season 1"]
        );
        let listing = loaded.seasons.get("Season 10").unwrap();
        assert_eq!(listing.url.as_deref(), Some("https://www.youtube.com/playlist?list=PL10"));
        assert_eq!(listing.episode_count, 1);
    }

    #[test]
    fn test_resolve_catalog_prefers_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("numberblocks_playlists.json");
        let config = sample_config();

        let inline = resolve_catalog(&config, &path).unwrap();
        assert_eq!(inline.episode_count(), 3);

        let mut fetched = EpisodeCatalog::default();
        fetched
            .seasons
            .insert("Season 1", SeasonListing::new(Some("PL1".to_string()), Vec::new()));
        fetched.store(&path).unwrap();

        assert_eq!(resolve_catalog(&config, &path).unwrap(), fetched);
    }

    #[test]
    fn test_resolve_catalog_missing() {
        let dir = TempDir::new().unwrap();
        let config = config("series_name: Empty\n");
        assert!(matches!(
            resolve_catalog(&config, &dir.path().join("empty_playlists.json")),
            Err(CatalogError::Missing { .. })
        ));
    }

    #[test]
    fn test_reads_catalog_written_by_older_fetcher() {
        let json = r#"{
  "Season 1": {
    "playlist_id": "PL1",
    "url": "https://www.youtube.com/playlist?list=PL1",
    "episode_count": 1,
    "episodes": [
      {"title": "S1 E1 One", "id": "abc", "url": null, "duration": 301}
    ]
  }
}"#;
        let catalog: EpisodeCatalog = serde_json::from_str(json).unwrap();
        let config = config("series_name: Show\n");
        let episodes = catalog.episodes(&config).unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].file_name, "S01E01_One.mp4");
        assert_eq!(episodes[0].label(), "S1E1");
    }
}
