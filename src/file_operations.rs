use crate::file_resolver::{self, FileResolverError};
use crate::naming::{NamingError, parse_filename_numbers, sanitize_title};
use crate::series_config::SeriesConfig;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Errors that can occur while planning renames
#[derive(Debug, Error)]
pub enum FileOperationError {
    #[error(transparent)]
    FileResolver(#[from] FileResolverError),

    #[error("Invalid naming pattern: {0}")]
    Naming(#[from] NamingError),
}

/// Suffixes video sites append to titles, cut off together with everything after them
static TITLE_SUFFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\s*[｜|]\s*Full Episode",
        r"\s*-\s*Full Episode",
        r"\s*[｜|]\s*S\d+\s*E\d+",
        r"\s*[｜|]\s*@",
        r"\s*\([^)]*\)\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static LEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[Ss]\d+[Ee]\d+|[Ss][Pp]\d+)[_\-]?").expect("valid regex"));
static TRAILING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_\-]?[Ss]\d+[Ee]\d+").expect("valid regex"));

/// A rename that brings a file in line with the naming pattern
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRename {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub season: u32,
    pub episode: u32,
    /// Destination already exists or is claimed by another file
    pub conflict: bool,
}

/// A rename that could not be carried out
#[derive(Debug)]
pub struct RenameFailure {
    pub source: PathBuf,
    pub error: io::Error,
}

/// Cuts a raw video title down to its episode name
///
/// Drops the decorations video sites add (`| Full Episode`, `| S1 E3`,
/// `| @Channel`, `| <series name>`, a trailing parenthesised remark) and
/// normalises what is left with `sanitize_title`.
///
/// ```
/// use series_archiver::clean_title;
///
/// assert_eq!(
///     clean_title("The Wrong Shape ｜ Full Episode ｜ S1 E3", "Numberblocks"),
///     "The_Wrong_Shape"
/// );
/// ```
pub fn clean_title(raw: &str, series_name: &str) -> String {
    let mut title = raw;

    for suffix in TITLE_SUFFIXES.iter() {
        if let Some(m) = suffix.find(title) {
            title = &title[..m.start()];
        }
    }

    if !series_name.is_empty() {
        let series_suffix = format!(r"(?i)\s*[｜|]\s*{}", regex::escape(series_name));
        if let Some(m) = Regex::new(&series_suffix).ok().and_then(|re| re.find(title)) {
            title = &title[..m.start()];
        }
    }

    let dashed = title.replace('｜', "_").replace(['–', '-'], "_");
    sanitize_title(&dashed)
}

/// The title part of an episode file name, without markers or extension
fn title_from_file_name(file_name: &str) -> String {
    let stem = file_name
        .strip_suffix(".mp4")
        .or_else(|| file_name.strip_suffix(".MP4"))
        .unwrap_or(file_name);
    let without_leading = LEADING_MARKER.replace(stem, "");

    match TRAILING_MARKER.find_iter(&without_leading).last() {
        Some(m) => format!(
            "{}{}",
            &without_leading[..m.start()],
            &without_leading[m.end()..]
        ),
        None => without_leading.into_owned(),
    }
}

/// Finds every episode file whose name does not follow the naming pattern
///
/// Files without season/episode markers are left alone. The season
/// directory a file lives in is kept.
pub fn plan_standardization(
    config: &SeriesConfig,
    download_dir: &Path,
) -> Result<Vec<PlannedRename>, FileOperationError> {
    let mut plan = Vec::new();

    for dir in file_resolver::scan_season_dirs(download_dir)? {
        for video in file_resolver::scan_videos(&dir)? {
            let file_name = video.file_name().to_string();
            let Some((season, episode)) = parse_filename_numbers(&file_name) else {
                log::debug!("Leaving {} alone, no episode numbers", file_name);
                continue;
            };

            let title = clean_title(&title_from_file_name(&file_name), &config.series_name);
            let new_name = config.episode_filename(season, episode, &title)?;
            if new_name == file_name {
                continue;
            }

            plan.push(PlannedRename {
                destination: dir.join(&new_name),
                source: video.path,
                season,
                episode,
                conflict: false,
            });
        }
    }

    mark_conflicts(&mut plan);
    Ok(plan)
}

/// Flags renames whose destination exists or is shared with another rename
fn mark_conflicts(plan: &mut [PlannedRename]) {
    let mut claims: HashMap<PathBuf, usize> = HashMap::new();
    for rename in plan.iter() {
        *claims.entry(rename.destination.clone()).or_default() += 1;
    }

    for rename in plan.iter_mut() {
        rename.conflict = rename.destination.exists() || claims[&rename.destination] > 1;
    }
}

/// Executes the planned renames in place
///
/// Conflicting entries are not touched and come back as failures, as does
/// every rename the filesystem refuses.
pub fn execute_renames(plan: &[PlannedRename]) -> Vec<RenameFailure> {
    let mut failures = Vec::new();

    for rename in plan {
        if rename.conflict || rename.destination.exists() {
            failures.push(RenameFailure {
                source: rename.source.clone(),
                error: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists", rename.destination.display()),
                ),
            });
            continue;
        }

        if let Err(e) = fs::rename(&rename.source, &rename.destination) {
            failures.push(RenameFailure {
                source: rename.source.clone(),
                error: e,
            });
        }
    }

    failures
}
