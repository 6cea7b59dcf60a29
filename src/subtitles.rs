//! Subtitle extraction and checking
//!
//! Pulls the first embedded subtitle track out of a downloaded video as an
//! SRT sidecar file. ffmpeg does the demuxing; when it cannot write SRT
//! directly the track is taken as WebVTT and converted here.

use crate::temp::TempFile;
use ffmpeg_sidecar::command::{FfmpegCommand, ffmpeg_is_installed};
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use regex::Regex;
use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Errors that can occur during subtitle extraction
#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("ffmpeg not found. Install it (e.g. `brew install ffmpeg` or `apt install ffmpeg`)")]
    FfmpegNotFound,

    #[error("Failed to run ffmpeg: {0}")]
    SpawnFailed(#[source] io::Error),

    /// ffmpeg ran but produced no subtitle file
    #[error("Could not extract subtitles from {video}: {message}")]
    ExtractionFailed { video: PathBuf, message: String },

    #[error("Failed to read {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    #[error("Failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    #[error("Failed to create temporary file: {0}")]
    TempFile(#[source] io::Error),
}

static INLINE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static CUE_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d+:)?\d{2}:\d{2}[.,]\d{3})\s*-->\s*((?:\d+:)?\d{2}:\d{2}[.,]\d{3})")
        .expect("valid regex")
});

/// How the SRT file was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// ffmpeg wrote SRT directly
    Direct,
    /// Extracted as WebVTT and converted
    Converted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSubtitle {
    pub path: PathBuf,
    pub method: ExtractionMethod,
}

/// Fails early with a helpful message when ffmpeg is missing
pub fn ensure_ffmpeg() -> Result<(), SubtitleError> {
    if ffmpeg_is_installed() {
        Ok(())
    } else {
        Err(SubtitleError::FfmpegNotFound)
    }
}

/// Output path of the SRT file for a video
pub fn srt_path_for(video: &Path, output_dir: &Path) -> PathBuf {
    let mut name = video
        .file_stem()
        .unwrap_or_else(|| OsStr::new("subtitles"))
        .to_os_string();
    name.push(".srt");
    output_dir.join(name)
}

/// Extracts the first subtitle track of a video into `<output_dir>/<stem>.srt`
pub fn extract_subtitles(
    video: &Path,
    output_dir: &Path,
) -> Result<ExtractedSubtitle, SubtitleError> {
    let srt_path = srt_path_for(video, output_dir);

    match run_ffmpeg(video, "srt", &srt_path) {
        Ok(()) => {
            return Ok(ExtractedSubtitle {
                path: srt_path,
                method: ExtractionMethod::Direct,
            });
        }
        Err(SubtitleError::ExtractionFailed { message, .. }) => {
            log::debug!(
                "Direct SRT extraction failed for {}: {}",
                video.display(),
                message
            );
        }
        Err(e) => return Err(e),
    }

    let vtt = TempFile::create("subtitle", "vtt").map_err(SubtitleError::TempFile)?;
    run_ffmpeg(video, "webvtt", &vtt)?;

    let content = fs::read_to_string(&*vtt).map_err(|e| SubtitleError::ReadFailed {
        path: vtt.to_path_buf(),
        source: e,
    })?;
    fs::write(&srt_path, vtt_to_srt(&content)).map_err(|e| SubtitleError::WriteFailed {
        path: srt_path.clone(),
        source: e,
    })?;

    Ok(ExtractedSubtitle {
        path: srt_path,
        method: ExtractionMethod::Converted,
    })
}

/// Runs `ffmpeg -i <video> -map 0:s:0 -c:s <codec> -y <output>`
fn run_ffmpeg(video: &Path, codec: &str, output: &Path) -> Result<(), SubtitleError> {
    let mut child = FfmpegCommand::new()
        .input(video)
        .args(["-map", "0:s:0", "-c:s", codec])
        .overwrite()
        .output(output)
        .spawn()
        .map_err(SubtitleError::SpawnFailed)?;

    let mut errors = Vec::new();
    let events = child.iter().map_err(|e| SubtitleError::ExtractionFailed {
        video: video.to_path_buf(),
        message: e.to_string(),
    })?;
    for event in events {
        match event {
            FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message)
            | FfmpegEvent::Error(message) => errors.push(message),
            _ => {}
        }
    }

    let status = child.wait().map_err(SubtitleError::SpawnFailed)?;
    let written = fs::metadata(output).is_ok_and(|m| m.len() > 0);

    if status.success() && written {
        return Ok(());
    }

    Err(SubtitleError::ExtractionFailed {
        video: video.to_path_buf(),
        message: errors
            .last()
            .cloned()
            .unwrap_or_else(|| format!("ffmpeg exited with {}", status)),
    })
}

/// Converts WebVTT text to SRT
///
/// The header and NOTE/STYLE blocks are dropped, cue settings and inline
/// tags are stripped, timestamps get a comma separator and an hour field,
/// and cues are renumbered from 1. Cues left without text are skipped.
pub fn vtt_to_srt(vtt: &str) -> String {
    let mut output = String::new();
    let mut counter = 0;
    let mut lines = vtt.lines().map(|l| l.trim_end_matches('\r')).peekable();

    while let Some(line) = lines.next() {
        let Some(timing) = CUE_TIMING.captures(line.trim()) else {
            if line.starts_with("NOTE") || line.starts_with("STYLE") {
                while lines.next_if(|l| !l.trim().is_empty()).is_some() {}
            }
            continue;
        };

        let mut text = Vec::new();
        while let Some(cue_line) = lines.next_if(|l| !l.trim().is_empty()) {
            let cleaned = INLINE_TAG.replace_all(cue_line.trim(), "");
            if !cleaned.trim().is_empty() {
                text.push(cleaned.trim().to_string());
            }
        }

        if text.is_empty() {
            continue;
        }

        counter += 1;
        output.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            counter,
            srt_timestamp(&timing[1]),
            srt_timestamp(&timing[2]),
            text.join("\n")
        ));
    }

    output
}

/// `01:02.500` → `00:01:02,500`
fn srt_timestamp(vtt_time: &str) -> String {
    let time = vtt_time.replace('.', ",");
    if time.matches(':').count() == 1 {
        format!("00:{}", time)
    } else {
        time
    }
}

/// Structural check of an SRT file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SrtReport {
    pub entries: usize,
    pub first_time: Option<String>,
    pub last_time: Option<String>,
    pub issues: Vec<String>,
}

impl SrtReport {
    pub fn is_valid(&self) -> bool {
        self.entries > 0 && self.issues.is_empty()
    }
}

/// Counts entries and flags ones without timing or text
///
/// Entries are blank-line separated blocks opening with a number, so cue
/// text that happens to be a number is not mistaken for a new entry.
pub fn verify_srt(content: &str) -> SrtReport {
    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    let mut report = SrtReport::default();

    for block in lines.split(|line| line.is_empty()) {
        let Some((index, rest)) = block.split_first() else {
            continue;
        };
        if !index.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        report.entries += 1;

        match rest.first().and_then(|t| t.split_once("-->")) {
            Some((start, end)) => {
                if report.first_time.is_none() {
                    report.first_time = Some(start.trim().to_string());
                }
                report.last_time = Some(end.trim().to_string());
            }
            None => report
                .issues
                .push(format!("Entry {}: Missing timestamp", report.entries)),
        }

        if rest.len() < 2 {
            report
                .issues
                .push(format!("Entry {}: Missing text", report.entries));
        }
    }

    report
}

/// Reads and checks an SRT file
pub fn verify_srt_file(path: &Path) -> Result<SrtReport, SubtitleError> {
    let content = fs::read_to_string(path).map_err(|e| SubtitleError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(verify_srt(&content))
}

/// Lists the `.srt` files in a directory, sorted by name
pub fn find_srt_files(dir: &Path) -> Result<Vec<PathBuf>, SubtitleError> {
    let read_error = |e| SubtitleError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let is_srt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("srt"));
        if is_srt && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
