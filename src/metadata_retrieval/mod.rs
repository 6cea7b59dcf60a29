//! Playlist metadata retrieval
//!
//! This module provides the types and traits for listing the videos of a
//! season playlist, plus the fetch loop that turns a series config into a
//! persisted episode catalog.
mod cached;
mod ytdlp;
mod ytdlp_types;

pub(crate) use cached::CachedPlaylistProvider;
pub(crate) use ytdlp::YtDlpPlaylistProvider;

use crate::ProgressEvent;
use crate::catalog::{CatalogEpisode, EpisodeCatalog, SeasonListing};
use crate::series_config::SeriesConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during metadata retrieval operations.
#[derive(Debug, Error)]
pub enum MetadataRetrievalError {
    /// The external tool could not be started
    #[error("Failed to run {command}: {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    /// The external tool exited with an error
    #[error("Listing playlist {playlist_id} failed: {message}")]
    ToolFailed {
        playlist_id: String,
        message: String,
    },

    /// Failed to parse the tool's JSON output
    #[error("Failed to parse playlist entry for {playlist_id}: {source}")]
    ParseError {
        playlist_id: String,
        source: serde_json::Error,
    },
}

/// A single video of a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistVideo {
    /// External video identifier
    pub id: String,
    /// Video title as published
    pub title: Option<String>,
    /// Watch page URL
    pub url: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
}

impl From<PlaylistVideo> for CatalogEpisode {
    fn from(video: PlaylistVideo) -> Self {
        CatalogEpisode {
            title: video.title,
            id: video.id,
            url: video.url,
            duration: video.duration,
            season: None,
            episode: None,
        }
    }
}

/// Trait for providers that can list the videos of a playlist.
pub(crate) trait PlaylistProvider {
    /// Lists the videos of a playlist in playlist order.
    ///
    /// # Arguments
    ///
    /// * `playlist_id` - The external playlist identifier
    ///
    /// # Returns
    ///
    /// The videos of the playlist, or a MetadataRetrievalError
    fn fetch_playlist(&self, playlist_id: &str)
    -> Result<Vec<PlaylistVideo>, MetadataRetrievalError>;
}

/// Builds the episode catalog for a series
///
/// Every `seasons` entry is listed through the provider. A playlist that
/// cannot be listed is reported and recorded as empty so that one broken
/// playlist does not cost the whole run. Inline `episodes` of seasons
/// without a playlist are carried over unchanged.
pub(crate) fn fetch_catalog<P, F>(
    config: &SeriesConfig,
    provider: &P,
    progress_callback: &mut F,
) -> EpisodeCatalog
where
    P: PlaylistProvider + ?Sized,
    F: FnMut(ProgressEvent),
{
    let mut catalog = EpisodeCatalog::default();

    for (season_name, playlist_id) in config.seasons.iter() {
        progress_callback(ProgressEvent::FetchingPlaylist {
            season_name: season_name.to_string(),
            playlist_id: playlist_id.clone(),
        });

        let videos = match provider.fetch_playlist(playlist_id) {
            Ok(videos) => videos,
            Err(e) => {
                log::warn!("Playlist {} failed: {}", playlist_id, e);
                progress_callback(ProgressEvent::PlaylistFailed {
                    season_name: season_name.to_string(),
                    error: e.to_string(),
                });
                Vec::new()
            }
        };

        progress_callback(ProgressEvent::PlaylistFetched {
            season_name: season_name.to_string(),
            episode_count: videos.len(),
        });

        let episodes = videos.into_iter().map(CatalogEpisode::from).collect();
        catalog.seasons.insert(
            season_name,
            SeasonListing::new(Some(playlist_id.clone()), episodes),
        );
    }

    let inline = EpisodeCatalog::from_config(config);
    for (season_name, listing) in inline.seasons.iter() {
        if !catalog.seasons.contains_key(season_name) {
            catalog.seasons.insert(season_name, listing.clone());
        }
    }

    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeProvider {
        playlists: HashMap<String, Vec<PlaylistVideo>>,
    }

    impl PlaylistProvider for FakeProvider {
        fn fetch_playlist(
            &self,
            playlist_id: &str,
        ) -> Result<Vec<PlaylistVideo>, MetadataRetrievalError> {
            self.playlists
                .get(playlist_id)
                .cloned()
                .ok_or_else(|| MetadataRetrievalError::ToolFailed {
                    playlist_id: playlist_id.to_string(),
                    message: "ERROR: playlist does not exist".to_string(),
                })
        }
    }

    fn video(id: &str, title: &str) -> PlaylistVideo {
        PlaylistVideo {
            id: id.to_string(),
            title: Some(title.to_string()),
            url: None,
            duration: Some(300.0),
        }
    }

    #[test]
    fn test_fetch_catalog_lists_every_season() {
        let config: SeriesConfig = serde_yaml::from_str(
            r#"
series_name: Show
seasons:
  Season 1: PL1
  Season 2: PLmissing
episodes:
  Specials:
    - title: "S00E01 Special"
      id: sp1
"#,
        )
        .unwrap();

        let provider = FakeProvider {
            playlists: HashMap::from([(
                "PL1".to_string(),
                vec![video("a", "S1 E1 One"), video("b", "S1 E2 Two")],
            )]),
        };

        let mut events = Vec::new();
        let catalog = fetch_catalog(&config, &provider, &mut |e| events.push(e));

        assert_eq!(
            catalog.seasons.keys().collect::<Vec<_>>(),
            vec!["Season 1", "Season 2", "Specials"]
        );
        assert_eq!(catalog.seasons.get("Season 1").unwrap().episode_count, 2);
        assert_eq!(catalog.seasons.get("Season 2").unwrap().episode_count, 0);
        assert_eq!(catalog.episode_count(), 3);

        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::PlaylistFailed { season_name, .. } if season_name == "Season 2"
        )));
    }
}
