//! series_archiver - Archive video series from playlists into a tidy library
//!
//! This library reads a per-series description (seasons, playlists, naming
//! patterns, subtitle preferences), builds an episode catalog through yt-dlp,
//! downloads every missing episode into `Season_<N>_HD/S##E##_Title.mp4`
//! style paths and checks the result. Video retrieval itself always stays
//! with the external tool.

mod archive;
mod cache;
mod catalog;
mod downloader;
mod file_operations;
mod file_resolver;
mod metadata_retrieval;
mod naming;
mod ordered_map;
mod series_config;
mod subtitles;
mod temp;
mod tool_provisioning;
mod validator;

use cache::CacheStorage;
use metadata_retrieval::{CachedPlaylistProvider, YtDlpPlaylistProvider, fetch_catalog};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// Re-export error types
pub use archive::ArchiveError;
pub use cache::CacheError;
pub use catalog::CatalogError;
pub use downloader::DownloadError;
pub use file_operations::FileOperationError;
pub use file_resolver::FileResolverError;
pub use metadata_retrieval::MetadataRetrievalError;
pub use naming::NamingError;
pub use series_config::ConfigError;
pub use subtitles::SubtitleError;
pub use tool_provisioning::ToolError;
pub use validator::ValidationError;

// Re-export domain types
pub use archive::DownloadArchive;
pub use catalog::{CatalogEntry, CatalogEpisode, Episode, EpisodeCatalog, SeasonListing};
pub use downloader::{
    DownloadOptions, DownloadRequest, DownloadSummary, EpisodeOutcome, EpisodeResult,
    ExternalDownloader, SkipReason, YtDlpDownloader, download_series, plan_downloads,
};
pub use file_operations::{PlannedRename, RenameFailure, clean_title, execute_renames, plan_standardization};
pub use file_resolver::{VideoFile, count_existing_videos};
pub use metadata_retrieval::PlaylistVideo;
pub use naming::{
    DEFAULT_DIRECTORY_PATTERN, DEFAULT_NAMING_PATTERN, generate_filename, parse_episode_info,
    sanitize_title,
};
pub use ordered_map::OrderedMap;
pub use series_config::{
    DownloaderSettings, EpisodeEntry, SeriesConfig, SubtitleSettings, available_configs,
    load_config, locate_config, user_config_dir,
};
pub use subtitles::{
    ExtractedSubtitle, ExtractionMethod, SrtReport, find_srt_files, verify_srt, verify_srt_file,
    vtt_to_srt,
};
pub use tool_provisioning::{
    ResolvedTool, ToolCommand, ensure_tool_available, install_tool, locate_tool,
    provisioned_tool_path,
};
pub use validator::{EpisodeCheck, EpisodeStatus, SeasonReport, ValidationReport};

/// Where downloads go unless `--download-dir` says otherwise
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";

/// Project-local directory searched for series configs
pub const DEFAULT_CONFIG_DIR: &str = "config/series";

/// Written into the download directory after every download run
pub const DOWNLOAD_REPORT_FILE: &str = "download_report.json";

/// Written into the download directory by `validate`
pub const VALIDATION_REPORT_FILE: &str = "validation_report.json";

/// Playlist listings are reused for a day
const PLAYLIST_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Progress event emitted by the long-running operations
///
/// These events allow library users to track progress and provide feedback
/// while playlists are listed, episodes downloaded and subtitles extracted.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Listing a season playlist
    FetchingPlaylist {
        season_name: String,
        playlist_id: String,
    },

    /// A playlist could not be listed; the season stays empty
    PlaylistFailed { season_name: String, error: String },

    /// A playlist was listed
    PlaylistFetched {
        season_name: String,
        episode_count: usize,
    },

    /// The catalog was written to disk
    CatalogSaved {
        path: PathBuf,
        season_count: usize,
        episode_count: usize,
    },

    /// Download loop reached a new season
    SeasonStarted {
        season_name: String,
        episode_count: usize,
    },

    /// A catalog title carries no season/episode numbers
    EpisodeUnparseable { title: String },

    EpisodeSkipped { label: String, reason: SkipReason },

    /// Dry run: the episode would be downloaded to `path`
    EpisodePlanned { label: String, path: PathBuf },

    /// The external tool is about to run for an episode
    EpisodeDownloading {
        index: usize,
        total: usize,
        label: String,
        title: String,
    },

    EpisodeDownloaded { label: String, path: PathBuf },

    EpisodeFailed { label: String, error: String },

    /// Extracting subtitles from a video
    ExtractingSubtitles {
        index: usize,
        total: usize,
        video_path: PathBuf,
    },

    SubtitlesExtracted {
        video_path: PathBuf,
        subtitle: ExtractedSubtitle,
    },

    SubtitleExtractionFailed { video_path: PathBuf, error: String },
}

/// Top-level error type for series_archiver operations
#[derive(Debug, Error)]
pub enum ArchiverError {
    /// Error while loading or locating a series config
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Error while reading or writing the catalog
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Error during playlist retrieval
    #[error("Metadata retrieval error: {0}")]
    MetadataRetrieval(#[from] MetadataRetrievalError),

    /// Error during cache operations
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Error while reading or appending the download archive
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Error during validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Error while planning renames
    #[error("File operation error: {0}")]
    FileOperation(#[from] FileOperationError),

    /// Error during file resolution
    #[error("File resolution error: {0}")]
    FileResolver(#[from] FileResolverError),

    /// Error during subtitle extraction
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error while locating or installing the download tool
    #[error("Download tool error: {0}")]
    Tool(#[from] ToolError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Files that belong to one series and live in the state directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPaths {
    /// `<safe name>_playlists.json`
    pub catalog: PathBuf,
    /// `<safe name>_downloaded.txt`
    pub archive: PathBuf,
}

impl SeriesPaths {
    pub fn new(state_dir: &Path, config: &SeriesConfig) -> Self {
        let safe_name = config.safe_name();
        Self {
            catalog: state_dir.join(format!("{}_playlists.json", safe_name)),
            archive: state_dir.join(format!("{}_downloaded.txt", safe_name)),
        }
    }
}

/// Locates a series config by name and loads it
pub fn open_series(name: &str, config_dirs: &[PathBuf]) -> Result<SeriesConfig, ArchiverError> {
    let path = locate_config(name, config_dirs)?;
    log::debug!("Loading config {}", path.display());
    Ok(load_config(&path)?)
}

/// The catalog a download or validation run works from
///
/// Prefers the fetched catalog file, falling back to episodes listed inline
/// in the config.
pub fn load_catalog(
    config: &SeriesConfig,
    paths: &SeriesPaths,
) -> Result<EpisodeCatalog, ArchiverError> {
    Ok(catalog::resolve_catalog(config, &paths.catalog)?)
}

/// Lists every season playlist and writes the catalog file
///
/// Listings come from the user cache when younger than a day, unless
/// `refresh` is set. A playlist that cannot be listed ends up as an empty
/// season and is reported through `PlaylistFailed`.
///
/// # Examples
///
/// ```no_run
/// use series_archiver::{SeriesPaths, ToolCommand, fetch_metadata, open_series};
/// use std::path::{Path, PathBuf};
///
/// let config = open_series("numberblocks", &[PathBuf::from("config/series")]).unwrap();
/// let paths = SeriesPaths::new(Path::new("."), &config);
/// let tool = ToolCommand::from_settings(&config.downloader);
///
/// let catalog = fetch_metadata(&config, &paths, &tool, false, |event| {
///     println!("{:?}", event);
/// })
/// .unwrap();
/// println!("{} episodes", catalog.episode_count());
/// ```
pub fn fetch_metadata<F>(
    config: &SeriesConfig,
    paths: &SeriesPaths,
    tool: &ToolCommand,
    refresh: bool,
    mut progress_callback: F,
) -> Result<EpisodeCatalog, ArchiverError>
where
    F: FnMut(ProgressEvent),
{
    let cache = CacheStorage::open("playlists", Some(PLAYLIST_CACHE_TTL))?;
    let provider =
        CachedPlaylistProvider::new(YtDlpPlaylistProvider::new(tool.clone()), cache, refresh);

    let catalog = fetch_catalog(config, &provider, &mut progress_callback);

    if let Some(parent) = paths.catalog.parent() {
        fs::create_dir_all(parent)?;
    }
    catalog.store(&paths.catalog)?;

    progress_callback(ProgressEvent::CatalogSaved {
        path: paths.catalog.clone(),
        season_count: catalog.season_count(),
        episode_count: catalog.episode_count(),
    });

    Ok(catalog)
}

/// Downloads every missing episode of a catalog through the given tool
///
/// Already present files and archived ids are skipped. After a real run the
/// summary is written to `download_report.json` in the download directory.
pub fn run_downloads<F>(
    config: &SeriesConfig,
    catalog: &EpisodeCatalog,
    paths: &SeriesPaths,
    download_dir: &Path,
    tool: &ToolCommand,
    options: DownloadOptions,
    mut progress_callback: F,
) -> Result<DownloadSummary, ArchiverError>
where
    F: FnMut(ProgressEvent),
{
    let plan = plan_downloads(config, catalog)?;
    let mut archive = DownloadArchive::open(&paths.archive)?;
    let downloader = YtDlpDownloader::new(tool.clone());

    let summary = download_series(
        config,
        &plan,
        download_dir,
        &downloader,
        &mut archive,
        options,
        &mut progress_callback,
    );

    if !options.dry_run {
        fs::create_dir_all(download_dir)?;
        downloader::save_report(&summary, &download_dir.join(DOWNLOAD_REPORT_FILE))?;
    }

    Ok(summary)
}

/// Checks the download directory against the catalog
///
/// The report is also written to `validation_report.json` inside the
/// download directory when that directory exists.
pub fn validate_series(
    config: &SeriesConfig,
    catalog: &EpisodeCatalog,
    download_dir: &Path,
) -> Result<ValidationReport, ArchiverError> {
    let report = validator::validate_downloads(config, catalog, download_dir)?;

    if download_dir.is_dir() {
        validator::save_report(&report, &download_dir.join(VALIDATION_REPORT_FILE))?;
    }

    Ok(report)
}

/// Counts of a subtitle extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleSummary {
    pub extracted: usize,
    pub failed: usize,
}

/// Extracts SRT subtitles for the downloaded episodes
///
/// With `season` set only episodes of that season are processed. Every
/// episode is attempted; failures are reported and counted.
pub fn extract_series_subtitles<F>(
    download_dir: &Path,
    season: Option<u32>,
    output_dir: &Path,
    mut progress_callback: F,
) -> Result<SubtitleSummary, ArchiverError>
where
    F: FnMut(ProgressEvent),
{
    subtitles::ensure_ffmpeg()?;

    let mut videos = Vec::new();
    for dir in file_resolver::scan_season_dirs(download_dir)? {
        videos.extend(
            file_resolver::scan_videos(&dir)?
                .into_iter()
                .filter(|video| match season {
                    Some(season) => video.numbers().is_some_and(|(s, _)| s == season),
                    None => true,
                }),
        );
    }

    fs::create_dir_all(output_dir)?;

    let mut summary = SubtitleSummary::default();
    let total = videos.len();

    for (index, video) in videos.into_iter().enumerate() {
        progress_callback(ProgressEvent::ExtractingSubtitles {
            index,
            total,
            video_path: video.path.clone(),
        });

        match subtitles::extract_subtitles(&video.path, output_dir) {
            Ok(subtitle) => {
                summary.extracted += 1;
                progress_callback(ProgressEvent::SubtitlesExtracted {
                    video_path: video.path,
                    subtitle,
                });
            }
            Err(e) => {
                summary.failed += 1;
                progress_callback(ProgressEvent::SubtitleExtractionFailed {
                    video_path: video.path,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> SeriesConfig {
        serde_yaml::from_str(
            r#"
series_name: Number Blocks
episodes:
  Season 1:
    - title: "S01E01 One"
      id: one
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_series_paths() {
        let paths = SeriesPaths::new(Path::new("state"), &config());
        assert_eq!(
            paths.catalog,
            PathBuf::from("state/number_blocks_playlists.json")
        );
        assert_eq!(
            paths.archive,
            PathBuf::from("state/number_blocks_downloaded.txt")
        );
    }

    #[test]
    fn test_load_catalog_falls_back_to_inline_episodes() {
        let dir = TempDir::new().unwrap();
        let config = config();
        let paths = SeriesPaths::new(dir.path(), &config);

        let catalog = load_catalog(&config, &paths).unwrap();
        assert_eq!(catalog.episode_count(), 1);
    }

    #[test]
    fn test_validate_series_writes_report() {
        let dir = TempDir::new().unwrap();
        let config = config();
        let catalog = EpisodeCatalog::from_config(&config);

        let report = validate_series(&config, &catalog, dir.path()).unwrap();

        assert_eq!(report.missing().len(), 1);
        assert!(dir.path().join(VALIDATION_REPORT_FILE).is_file());
    }

    #[test]
    fn test_validate_series_without_download_dir() {
        let dir = TempDir::new().unwrap();
        let config = config();
        let catalog = EpisodeCatalog::from_config(&config);
        let download_dir = dir.path().join("downloads");

        let report = validate_series(&config, &catalog, &download_dir).unwrap();

        assert_eq!(report.expected(), 1);
        assert!(!download_dir.exists());
    }
}
