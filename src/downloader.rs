//! Download orchestration
//!
//! Walks the catalog episode by episode, works out where each file belongs,
//! skips what is already there and hands everything else to the external
//! download tool, one blocking invocation per episode. A failing episode is
//! recorded and the run moves on.

use crate::ProgressEvent;
use crate::archive::{ArchiveError, DownloadArchive};
use crate::catalog::{CatalogEntry, CatalogError, Episode, EpisodeCatalog, video_url};
use crate::file_resolver::{self, FileResolverError, VideoFile};
use crate::series_config::{SeriesConfig, SubtitleSettings};
use crate::tool_provisioning::ToolCommand;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Longest tool error message kept in reports
const MAX_ERROR_LENGTH: usize = 150;

/// Errors from a single episode download
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The tool could not be started
    #[error("Failed to run {command}: {source}")]
    SpawnFailed { command: String, source: io::Error },

    /// The tool exited unsuccessfully
    #[error("Download tool failed (exit code {code:?}): {message}")]
    ToolFailed { code: Option<i32>, message: String },

    /// The tool reported success but the file is not there
    #[error("Download finished but {0} does not exist")]
    OutputMissing(PathBuf),

    /// The tool reported success but left only an undersized file
    #[error("Download finished but {path} is only {size} bytes")]
    OutputIncomplete { path: PathBuf, size: u64 },

    #[error("Failed to create season directory {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error(transparent)]
    FileResolver(#[from] FileResolverError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Everything the external tool needs for one episode
#[derive(Debug, Clone)]
pub struct DownloadRequest<'a> {
    pub video_id: &'a str,
    pub output_path: &'a Path,
    pub format: &'a str,
    pub subtitles: &'a SubtitleSettings,
    pub archive_path: &'a Path,
    pub extra_args: &'a [String],
    /// Replace a broken file already sitting at `output_path`
    pub overwrite: bool,
}

/// Seam to the external download tool
pub trait ExternalDownloader {
    /// Downloads one video to `request.output_path`, blocking until done
    fn download(&self, request: &DownloadRequest<'_>) -> Result<(), DownloadError>;
}

/// Downloads through yt-dlp
pub struct YtDlpDownloader {
    tool: ToolCommand,
}

impl YtDlpDownloader {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }

    /// Arguments for one episode, after the tool's own leading arguments
    pub fn build_args(request: &DownloadRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.format.to_string(),
            "-o".to_string(),
            request.output_path.display().to_string(),
        ];

        if request.subtitles.enabled {
            args.push("--write-sub".to_string());
            if request.subtitles.auto_generated {
                args.push("--write-auto-sub".to_string());
            }
            args.push("--sub-lang".to_string());
            args.push(request.subtitles.lang.clone());
            if request.subtitles.embed {
                args.push("--embed-subs".to_string());
            }
        }

        args.push("--download-archive".to_string());
        args.push(request.archive_path.display().to_string());
        if request.overwrite {
            args.push("--force-overwrites".to_string());
        }
        args.extend(request.extra_args.iter().cloned());
        args.push(video_url(request.video_id));

        args
    }
}

impl ExternalDownloader for YtDlpDownloader {
    fn download(&self, request: &DownloadRequest<'_>) -> Result<(), DownloadError> {
        let args = Self::build_args(request);
        log::debug!("Running {} {}", self.tool.display(), args.join(" "));

        let output = self
            .tool
            .command()
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DownloadError::SpawnFailed {
                command: self.tool.display(),
                source: e,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(DownloadError::ToolFailed {
            code: output.status.code(),
            message: summarize_tool_error(&stderr),
        })
    }
}

/// Shortens tool stderr to the line that matters
///
/// yt-dlp prints warnings before the actual `ERROR:` line, so that line is
/// preferred when present.
fn summarize_tool_error(stderr: &str) -> String {
    let line = stderr
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with("ERROR"))
        .unwrap_or(stderr)
        .trim();

    if line.is_empty() {
        return "Unknown error".to_string();
    }
    line.chars().take(MAX_ERROR_LENGTH).collect()
}

/// Options for a download run
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    /// Report what would be downloaded without invoking the tool
    pub dry_run: bool,
}

/// Why an episode was not downloaded
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A file with the episode's numbers already exists
    AlreadyExists { path: PathBuf },
    /// The download archive lists the video
    Archived,
}

/// What happened to a single catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpisodeOutcome {
    Downloaded { path: PathBuf },
    Skipped(SkipReason),
    /// Dry run: would have been downloaded to this path
    Planned { path: PathBuf },
    Failed { error: String },
    /// No season/episode numbers could be determined
    Unparseable,
}

/// Result for one catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeResult {
    pub season_label: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub title: String,
    pub id: String,
    pub outcome: EpisodeOutcome,
}

/// Counts of a download run plus per-episode results
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub planned: usize,
    pub failed: usize,
    pub results: Vec<EpisodeResult>,
}

impl DownloadSummary {
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.planned + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &EpisodeResult> {
        self.results.iter().filter(|r| {
            matches!(
                r.outcome,
                EpisodeOutcome::Failed { .. } | EpisodeOutcome::Unparseable
            )
        })
    }

    fn push(&mut self, result: EpisodeResult) {
        match result.outcome {
            EpisodeOutcome::Downloaded { .. } => self.downloaded += 1,
            EpisodeOutcome::Skipped(_) => self.skipped += 1,
            EpisodeOutcome::Planned { .. } => self.planned += 1,
            EpisodeOutcome::Failed { .. } | EpisodeOutcome::Unparseable => self.failed += 1,
        }
        self.results.push(result);
    }
}

/// Decides whether an episode needs downloading
///
/// Checks the season directory first, then the archive.
pub fn skip_reason(
    episode: &Episode,
    download_dir: &Path,
    archive: &DownloadArchive,
) -> Result<Option<SkipReason>, FileResolverError> {
    let season_dir = episode.season_dir(download_dir);
    if let Some(existing) =
        file_resolver::find_episode_file(&season_dir, episode.season, episode.episode)?
    {
        return Ok(Some(SkipReason::AlreadyExists {
            path: existing.path,
        }));
    }

    if archive.contains(&episode.id) {
        return Ok(Some(SkipReason::Archived));
    }

    Ok(None)
}

/// Episodes of a catalog in download order, with their target names computed
pub fn plan_downloads(
    config: &SeriesConfig,
    catalog: &EpisodeCatalog,
) -> Result<Vec<CatalogEntry>, CatalogError> {
    catalog.entries(config)
}

/// Downloads every missing episode of a plan
///
/// Entries are processed in order. Re-running with all files in place
/// invokes the tool zero times.
pub fn download_series<D, F>(
    config: &SeriesConfig,
    entries: &[CatalogEntry],
    download_dir: &Path,
    downloader: &D,
    archive: &mut DownloadArchive,
    options: DownloadOptions,
    progress_callback: &mut F,
) -> DownloadSummary
where
    D: ExternalDownloader + ?Sized,
    F: FnMut(ProgressEvent),
{
    let mut season_sizes: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *season_sizes.entry(season_label(entry)).or_default() += 1;
    }

    let format = config.format_selector();
    let mut summary = DownloadSummary::default();
    let mut current_season: Option<&str> = None;

    for (index, entry) in entries.iter().enumerate() {
        let label = season_label(entry);
        if current_season != Some(label) {
            current_season = Some(label);
            progress_callback(ProgressEvent::SeasonStarted {
                season_name: label.to_string(),
                episode_count: season_sizes.get(label).copied().unwrap_or_default(),
            });
        }

        let episode = match entry {
            CatalogEntry::Episode(episode) => episode,
            CatalogEntry::Unparseable {
                season_label,
                title,
                id,
            } => {
                progress_callback(ProgressEvent::EpisodeUnparseable {
                    title: title.clone(),
                });
                summary.push(EpisodeResult {
                    season_label: season_label.clone(),
                    season: None,
                    episode: None,
                    title: title.clone(),
                    id: id.clone(),
                    outcome: EpisodeOutcome::Unparseable,
                });
                continue;
            }
        };

        let outcome = process_episode(
            episode,
            download_dir,
            &format,
            config,
            downloader,
            archive,
            options,
            index,
            entries.len(),
            progress_callback,
        );

        summary.push(EpisodeResult {
            season_label: episode.season_label.clone(),
            season: Some(episode.season),
            episode: Some(episode.episode),
            title: episode.title.clone(),
            id: episode.id.clone(),
            outcome,
        });
    }

    summary
}

fn season_label(entry: &CatalogEntry) -> &str {
    match entry {
        CatalogEntry::Episode(episode) => &episode.season_label,
        CatalogEntry::Unparseable { season_label, .. } => season_label,
    }
}

#[allow(clippy::too_many_arguments)]
fn process_episode<D, F>(
    episode: &Episode,
    download_dir: &Path,
    format: &str,
    config: &SeriesConfig,
    downloader: &D,
    archive: &mut DownloadArchive,
    options: DownloadOptions,
    index: usize,
    total: usize,
    progress_callback: &mut F,
) -> EpisodeOutcome
where
    D: ExternalDownloader + ?Sized,
    F: FnMut(ProgressEvent),
{
    match skip_reason(episode, download_dir, archive) {
        Ok(Some(reason)) => {
            progress_callback(ProgressEvent::EpisodeSkipped {
                label: episode.label(),
                reason: reason.clone(),
            });
            return EpisodeOutcome::Skipped(reason);
        }
        Ok(None) => {}
        Err(e) => {
            return fail(episode, DownloadError::from(e), progress_callback);
        }
    }

    let target = episode.target_path(download_dir);

    if options.dry_run {
        progress_callback(ProgressEvent::EpisodePlanned {
            label: episode.label(),
            path: target.clone(),
        });
        return EpisodeOutcome::Planned { path: target };
    }

    progress_callback(ProgressEvent::EpisodeDownloading {
        index,
        total,
        label: episode.label(),
        title: episode.title.clone(),
    });

    match run_download(
        episode,
        download_dir,
        &target,
        format,
        config,
        downloader,
        archive,
    ) {
        Ok(path) => {
            progress_callback(ProgressEvent::EpisodeDownloaded {
                label: episode.label(),
                path: path.clone(),
            });
            EpisodeOutcome::Downloaded { path }
        }
        Err(e) => fail(episode, e, progress_callback),
    }
}

fn fail<F>(episode: &Episode, error: DownloadError, progress_callback: &mut F) -> EpisodeOutcome
where
    F: FnMut(ProgressEvent),
{
    log::warn!("{} ({}) failed: {}", episode.label(), episode.id, error);
    let error = error.to_string();
    progress_callback(ProgressEvent::EpisodeFailed {
        label: episode.label(),
        error: error.clone(),
    });
    EpisodeOutcome::Failed { error }
}

fn run_download<D>(
    episode: &Episode,
    download_dir: &Path,
    target: &Path,
    format: &str,
    config: &SeriesConfig,
    downloader: &D,
    archive: &mut DownloadArchive,
) -> Result<PathBuf, DownloadError>
where
    D: ExternalDownloader + ?Sized,
{
    let season_dir = episode.season_dir(download_dir);
    fs::create_dir_all(&season_dir).map_err(|e| DownloadError::DirectoryCreationFailed {
        path: season_dir.clone(),
        source: e,
    })?;

    // The skip check found no complete file, so anything at the target is a leftover
    let leftover = target.is_file();
    if leftover {
        log::info!("Replacing incomplete {}", target.display());
    }

    let archive_path = archive.path().to_path_buf();
    downloader.download(&DownloadRequest {
        video_id: &episode.id,
        output_path: target,
        format,
        subtitles: &config.subtitles,
        archive_path: &archive_path,
        extra_args: &config.downloader.extra_args,
        overwrite: leftover,
    })?;

    let path = match verify_output(episode, &season_dir, target) {
        Ok(path) => path,
        Err(e) => {
            archive.forget(&episode.id)?;
            return Err(e);
        }
    };

    archive.reload()?;
    archive.record(&episode.id)?;

    Ok(path)
}

/// The complete file an episode download produced
///
/// The target path is preferred; the tool may also have picked another name
/// carrying the episode's numbers. Undersized files never count.
fn verify_output(
    episode: &Episode,
    season_dir: &Path,
    target: &Path,
) -> Result<PathBuf, DownloadError> {
    let output = fs::metadata(target)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| VideoFile {
            path: target.to_path_buf(),
            size: m.len(),
        });

    if let Some(video) = output.as_ref().filter(|video| video.is_complete()) {
        return Ok(video.path.clone());
    }

    if let Some(video) =
        file_resolver::find_episode_file(season_dir, episode.season, episode.episode)?
    {
        return Ok(video.path);
    }

    Err(match output {
        Some(video) => DownloadError::OutputIncomplete {
            path: video.path,
            size: video.size,
        },
        None => DownloadError::OutputMissing(target.to_path_buf()),
    })
}

#[derive(Serialize)]
struct DownloadReport<'a> {
    generated_at: u64,
    summary: ReportCounts,
    results: &'a [EpisodeResult],
}

#[derive(Serialize)]
struct ReportCounts {
    downloaded: usize,
    skipped: usize,
    planned: usize,
    failed: usize,
    total: usize,
}

/// Writes the run summary as JSON
pub fn save_report(summary: &DownloadSummary, path: &Path) -> io::Result<()> {
    let report = DownloadReport {
        generated_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
        summary: ReportCounts {
            downloaded: summary.downloaded,
            skipped: summary.skipped,
            planned: summary.planned,
            failed: summary.failed,
            total: summary.total(),
        },
        results: &summary.results,
    };

    let content = serde_json::to_string_pretty(&report)?;
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_resolver::tests::write_fake_mp4;
    use std::cell::RefCell;
    use std::io::Write;
    use tempfile::TempDir;

    /// Stands in for yt-dlp: records requests and writes a fake video
    struct FakeDownloader {
        requests: RefCell<Vec<String>>,
        overwrites: RefCell<Vec<String>>,
        fail_ids: Vec<String>,
        /// Archive and exit successfully without touching an existing output, like yt-dlp
        keep_existing: bool,
    }

    impl FakeDownloader {
        fn new() -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                overwrites: RefCell::new(Vec::new()),
                fail_ids: Vec::new(),
                keep_existing: false,
            }
        }
    }

    impl ExternalDownloader for FakeDownloader {
        fn download(&self, request: &DownloadRequest<'_>) -> Result<(), DownloadError> {
            self.requests.borrow_mut().push(request.video_id.to_string());
            if request.overwrite {
                self.overwrites
                    .borrow_mut()
                    .push(request.video_id.to_string());
            }
            if self.fail_ids.iter().any(|id| id == request.video_id) {
                return Err(DownloadError::ToolFailed {
                    code: Some(1),
                    message: "ERROR: Video unavailable".to_string(),
                });
            }
            if self.keep_existing && request.output_path.exists() {
                let mut archive = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(request.archive_path)
                    .unwrap();
                writeln!(archive, "youtube {}", request.video_id).unwrap();
                return Ok(());
            }
            write_fake_mp4(request.output_path, 20_000);
            Ok(())
        }
    }

    fn sample_config() -> SeriesConfig {
        serde_yaml::from_str(
            r#"
series_name: Show
quality: 720
episodes:
  Season 1:
    - title: "S01E01 One"
      id: one
    - title: "S01E02 Two"
      id: two
    - title: "Trailer"
      id: trailer
  Season 2:
    - title: "S02E01 Three"
      id: three
"#,
        )
        .unwrap()
    }

    fn run(
        config: &SeriesConfig,
        dir: &Path,
        downloader: &FakeDownloader,
        options: DownloadOptions,
    ) -> (DownloadSummary, Vec<ProgressEvent>) {
        let entries = plan_downloads(config, &EpisodeCatalog::from_config(config)).unwrap();
        let mut archive = DownloadArchive::open(&dir.join("show_downloaded.txt")).unwrap();
        let mut events = Vec::new();
        let summary = download_series(
            config,
            &entries,
            &dir.join("downloads"),
            downloader,
            &mut archive,
            options,
            &mut |e| events.push(e),
        );
        (summary, events)
    }

    #[test]
    fn test_downloads_missing_episodes() {
        let dir = TempDir::new().unwrap();
        let config = sample_config();
        let downloader = FakeDownloader::new();

        let (summary, events) = run(&config, dir.path(), &downloader, DownloadOptions::default());

        assert_eq!(summary.downloaded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 4);
        assert_eq!(*downloader.requests.borrow(), vec!["one", "two", "three"]);
        assert!(
            dir.path()
                .join("downloads/Season_1_HD/S01E01_One.mp4")
                .is_file()
        );
        assert!(
            dir.path()
                .join("downloads/Season_2_HD/S02E01_Three.mp4")
                .is_file()
        );

        let archive = fs::read_to_string(dir.path().join("show_downloaded.txt")).unwrap();
        assert_eq!(archive, "youtube one\nyoutube two\nyoutube three\n");

        let seasons: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::SeasonStarted {
                    season_name,
                    episode_count,
                } => Some((season_name.as_str(), *episode_count)),
                _ => None,
            })
            .collect();
        assert_eq!(seasons, vec![("Season 1", 3), ("Season 2", 1)]);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = sample_config();

        run(&config, dir.path(), &FakeDownloader::new(), DownloadOptions::default());

        let second = FakeDownloader::new();
        let (summary, _) = run(&config, dir.path(), &second, DownloadOptions::default());

        assert!(second.requests.borrow().is_empty());
        assert_eq!(summary.downloaded, 0);
        assert_eq!(summary.skipped, 3);
    }

    #[test]
    fn test_existing_file_with_other_name_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = sample_config();
        write_fake_mp4(
            &dir.path().join("downloads/Season_1_HD/s1e2_old_name.mp4"),
            20_000,
        );

        let downloader = FakeDownloader::new();
        let (summary, _) = run(&config, dir.path(), &downloader, DownloadOptions::default());

        assert_eq!(*downloader.requests.borrow(), vec!["one", "three"]);
        assert!(summary.results.iter().any(|r| r.id == "two"
            && matches!(r.outcome, EpisodeOutcome::Skipped(SkipReason::AlreadyExists { .. }))));
    }

    #[test]
    fn test_archived_id_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = sample_config();
        fs::write(dir.path().join("show_downloaded.txt"), "youtube three\n").unwrap();

        let downloader = FakeDownloader::new();
        let (summary, _) = run(&config, dir.path(), &downloader, DownloadOptions::default());

        assert_eq!(*downloader.requests.borrow(), vec!["one", "two"]);
        assert!(summary.results.iter().any(|r| r.id == "three"
            && r.outcome == EpisodeOutcome::Skipped(SkipReason::Archived)));
    }

    #[test]
    fn test_failure_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let config = sample_config();
        let mut downloader = FakeDownloader::new();
        downloader.fail_ids.push("two".to_string());

        let (summary, events) = run(&config, dir.path(), &downloader, DownloadOptions::default());

        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.failed, 2);
        assert!(summary.has_failures());
        assert_eq!(summary.failures().count(), 2);
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::EpisodeFailed { label, .. } if label == "S1E2"
        )));

        let archive = fs::read_to_string(dir.path().join("show_downloaded.txt")).unwrap();
        assert!(!archive.contains("two"));
    }

    #[test]
    fn test_undersized_leftover_is_replaced() {
        let dir = TempDir::new().unwrap();
        let config = sample_config();
        let target = dir.path().join("downloads/Season_1_HD/S01E01_One.mp4");
        write_fake_mp4(&target, 100);

        let downloader = FakeDownloader::new();
        let (summary, _) = run(&config, dir.path(), &downloader, DownloadOptions::default());

        assert_eq!(*downloader.overwrites.borrow(), vec!["one"]);
        assert!(summary.results.iter().any(|r| r.id == "one"
            && r.outcome == EpisodeOutcome::Downloaded { path: target.clone() }));
        assert_eq!(fs::metadata(&target).unwrap().len(), 20_000);
    }

    #[test]
    fn test_undersized_output_is_not_archived() {
        let dir = TempDir::new().unwrap();
        let config = sample_config();
        write_fake_mp4(
            &dir.path().join("downloads/Season_1_HD/S01E01_One.mp4"),
            100,
        );

        let mut downloader = FakeDownloader::new();
        downloader.keep_existing = true;
        let (summary, events) = run(&config, dir.path(), &downloader, DownloadOptions::default());

        assert!(summary.results.iter().any(|r| r.id == "one"
            && matches!(&r.outcome, EpisodeOutcome::Failed { error } if error.contains("100 bytes"))));
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::EpisodeFailed { label, .. } if label == "S1E1"
        )));
        let archive = fs::read_to_string(dir.path().join("show_downloaded.txt")).unwrap();
        assert!(!archive.contains("youtube one"));

        let rerun = FakeDownloader::new();
        let (summary, _) = run(&config, dir.path(), &rerun, DownloadOptions::default());
        assert_eq!(*rerun.requests.borrow(), vec!["one"]);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_dry_run_invokes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = sample_config();
        let downloader = FakeDownloader::new();

        let (summary, _) = run(
            &config,
            dir.path(),
            &downloader,
            DownloadOptions { dry_run: true },
        );

        assert!(downloader.requests.borrow().is_empty());
        assert_eq!(summary.planned, 3);
        assert!(!dir.path().join("downloads").exists());
    }

    #[test]
    fn test_build_args() {
        let subtitles = SubtitleSettings::default();
        let extra = vec!["--no-overwrites".to_string()];
        let request = DownloadRequest {
            video_id: "abc123",
            output_path: Path::new("downloads/Season_1_HD/S01E01_One.mp4"),
            format: "best[height<=1080]",
            subtitles: &subtitles,
            archive_path: Path::new("show_downloaded.txt"),
            extra_args: &extra,
            overwrite: false,
        };

        assert_eq!(
            YtDlpDownloader::build_args(&request),
            vec![
                "-f",
                "best[height<=1080]",
                "-o",
                "downloads/Season_1_HD/S01E01_One.mp4",
                "--write-sub",
                "--sub-lang",
                "en",
                "--embed-subs",
                "--download-archive",
                "show_downloaded.txt",
                "--no-overwrites",
                "https://www.youtube.com/watch?v=abc123",
            ]
        );
    }

    #[test]
    fn test_build_args_without_subtitles() {
        let subtitles = SubtitleSettings {
            enabled: false,
            ..SubtitleSettings::default()
        };
        let request = DownloadRequest {
            video_id: "abc123",
            output_path: Path::new("out.mp4"),
            format: "best",
            subtitles: &subtitles,
            archive_path: Path::new("a.txt"),
            extra_args: &[],
            overwrite: true,
        };

        let args = YtDlpDownloader::build_args(&request);
        assert!(!args.iter().any(|a| a.contains("sub")));
        assert!(args.contains(&"--force-overwrites".to_string()));
    }

    #[test]
    fn test_summarize_tool_error() {
        let stderr = "WARNING: something minor\nERROR: [youtube] abc: Video unavailable\n";
        assert_eq!(
            summarize_tool_error(stderr),
            "ERROR: [youtube] abc: Video unavailable"
        );
        assert_eq!(summarize_tool_error(""), "Unknown error");
        assert_eq!(summarize_tool_error(&"x".repeat(400)).len(), MAX_ERROR_LENGTH);
    }

    #[test]
    fn test_save_report() {
        let dir = TempDir::new().unwrap();
        let mut summary = DownloadSummary::default();
        summary.push(EpisodeResult {
            season_label: "Season 1".to_string(),
            season: Some(1),
            episode: Some(1),
            title: "One".to_string(),
            id: "one".to_string(),
            outcome: EpisodeOutcome::Skipped(SkipReason::Archived),
        });

        let path = dir.path().join("download_report.json");
        save_report(&summary, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["summary"]["skipped"], 1);
        assert_eq!(json["summary"]["total"], 1);
        assert_eq!(json["results"][0]["outcome"]["status"], "skipped");
        assert_eq!(json["results"][0]["outcome"]["reason"], "archived");
    }
}
