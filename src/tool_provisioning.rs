//! External download tool discovery and provisioning
//!
//! The archiver never talks to video sites itself; everything goes through
//! yt-dlp. This module finds a working yt-dlp invocation and, when asked,
//! downloads the official standalone release into the user cache directory
//! so that the tool does not have to be installed system-wide.

use crate::cache::{self, CacheError};
use crate::series_config::DownloaderSettings;
use reqwest::blocking::{Client, Response};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while locating or installing the download tool
#[derive(Debug, Error)]
pub enum ToolError {
    /// No working download tool could be found
    #[error("Download tool '{command}' not found. Install yt-dlp or run: series-archiver tool install")]
    NotFound { command: String },

    /// There is no standalone release for this platform
    #[error("No standalone yt-dlp release for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Failed to create the directory holding provisioned binaries
    #[error("Failed to create tool directory at {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to download the release
    #[error("Failed to download yt-dlp from {url}: {source}")]
    DownloadFailed { url: String, source: reqwest::Error },

    /// HTTP error during download
    #[error("HTTP error downloading yt-dlp: {0}")]
    HttpError(String),

    /// Failed to write the binary to disk
    #[error("Failed to write tool binary {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Downloaded file does not look like a release binary
    #[error("Invalid tool binary at {path}: {reason}")]
    InvalidBinary { path: PathBuf, reason: String },

    /// The release listing has no digest for this platform's asset
    #[error("No published SHA-256 for release asset '{asset}'")]
    ChecksumMissing { asset: String },

    /// Downloaded binary does not match its published digest
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Base URL of the latest yt-dlp release assets
const RELEASE_BASE_URL: &str = "https://github.com/yt-dlp/yt-dlp/releases/latest/download";

/// Digest listing published alongside every release
const CHECKSUMS_ASSET: &str = "SHA2-256SUMS";

/// Smallest plausible size of a standalone release binary
const MIN_BINARY_SIZE: u64 = 1024 * 1024;

/// A program plus leading arguments that together invoke the download tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Builds the invocation from config settings
    ///
    /// Settings are validated on load, so the command always names a program.
    pub fn from_settings(settings: &DownloaderSettings) -> Self {
        let mut parts = settings.command.iter().cloned();
        Self {
            program: parts.next().unwrap_or_else(|| "yt-dlp".to_string()),
            args: parts.collect(),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self {
            program: path.display().to_string(),
            args: Vec::new(),
        }
    }

    /// A fresh `Command` with the program and leading arguments set
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Human-readable form for messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A tool invocation known to work
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    pub command: ToolCommand,
    pub version: String,
}

/// Runs `<tool> --version` and returns the reported version
pub fn probe_version(tool: &ToolCommand) -> Option<String> {
    let output = tool
        .command()
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Checks whether the configured tool works
pub fn locate_tool(settings: &DownloaderSettings) -> Option<ResolvedTool> {
    let command = ToolCommand::from_settings(settings);
    probe_version(&command).map(|version| ResolvedTool { command, version })
}

/// Ensures a working download tool is available
///
/// Tries the configured command, then a previously provisioned binary. With
/// `install` set, a missing tool is downloaded.
pub fn ensure_tool_available(
    settings: &DownloaderSettings,
    install: bool,
) -> Result<ResolvedTool, ToolError> {
    if let Some(tool) = locate_tool(settings) {
        log::debug!("Using {} ({})", tool.command.display(), tool.version);
        return Ok(tool);
    }

    let provisioned = provisioned_tool_path()?;
    if provisioned.is_file() {
        let command = ToolCommand::from_path(&provisioned);
        if let Some(version) = probe_version(&command) {
            log::debug!("Using provisioned {} ({})", provisioned.display(), version);
            return Ok(ResolvedTool { command, version });
        }
        log::warn!("Provisioned tool at {} does not run", provisioned.display());
    }

    if !install {
        return Err(ToolError::NotFound {
            command: ToolCommand::from_settings(settings).display(),
        });
    }

    let path = install_tool()?;
    let command = ToolCommand::from_path(&path);
    let version = probe_version(&command).ok_or_else(|| ToolError::InvalidBinary {
        path: path.clone(),
        reason: "binary does not report a version".to_string(),
    })?;

    Ok(ResolvedTool { command, version })
}

/// Release asset name for the current platform
fn release_asset_name() -> Result<&'static str, ToolError> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Ok("yt-dlp_linux"),
        ("linux", "aarch64") => Ok("yt-dlp_linux_aarch64"),
        ("macos", _) => Ok("yt-dlp_macos"),
        ("windows", "x86") => Ok("yt-dlp_x86.exe"),
        ("windows", _) => Ok("yt-dlp.exe"),
        (os, arch) => Err(ToolError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        }),
    }
}

/// Location of the provisioned binary
///
/// - Linux: ~/.cache/series_archiver/bin/
/// - macOS: ~/Library/Caches/series_archiver/bin/
/// - Windows: %LOCALAPPDATA%\series_archiver\cache\bin\
pub fn provisioned_tool_path() -> Result<PathBuf, ToolError> {
    Ok(cache::cache_root()?.join("bin").join(release_asset_name()?))
}

/// Expected SHA-256 of a release asset, from a `SHA2-256SUMS` listing
///
/// Each line is `<hex digest>  <asset name>`; digests are returned lowercase.
pub(crate) fn checksum_for_asset(sums: &str, asset: &str) -> Option<String> {
    sums.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let digest = parts.next()?;
        let name = parts.next()?.trim_start_matches('*');
        let valid = digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
        (name == asset && valid).then(|| digest.to_ascii_lowercase())
    })
}

/// Passes bytes through to a file while hashing and counting them
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    fn finish(self) -> (String, u64) {
        (format!("{:x}", self.hasher.finalize()), self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Checks a downloaded release against its published digest and size floor
fn verify_release(
    path: &Path,
    expected: &str,
    actual: &str,
    size: u64,
) -> Result<(), ToolError> {
    if actual != expected {
        return Err(ToolError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    if size < MIN_BINARY_SIZE {
        return Err(ToolError::InvalidBinary {
            path: path.to_path_buf(),
            reason: format!("only {} bytes, a release is at least {}", size, MIN_BINARY_SIZE),
        });
    }

    Ok(())
}

fn http_get(client: &Client, url: &str) -> Result<Response, ToolError> {
    let response = client.get(url).send().map_err(|e| ToolError::DownloadFailed {
        url: url.to_string(),
        source: e,
    })?;

    if !response.status().is_success() {
        return Err(ToolError::HttpError(format!(
            "HTTP {} while downloading {}",
            response.status(),
            url
        )));
    }

    Ok(response)
}

/// Downloads the standalone yt-dlp release into the cache directory
///
/// The release's `SHA2-256SUMS` listing is fetched first and the binary is
/// hashed while it streams into a `.tmp` sibling. Only a binary matching its
/// published digest is made executable and renamed into place.
pub fn install_tool() -> Result<PathBuf, ToolError> {
    let asset = release_asset_name()?;
    let target_path = provisioned_tool_path()?;

    if let Some(dir) = target_path.parent() {
        fs::create_dir_all(dir).map_err(|e| ToolError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(600))
        .build()
        .map_err(|e| ToolError::DownloadFailed {
            url: RELEASE_BASE_URL.to_string(),
            source: e,
        })?;

    let sums_url = format!("{}/{}", RELEASE_BASE_URL, CHECKSUMS_ASSET);
    let sums = http_get(&client, &sums_url)?
        .text()
        .map_err(|e| ToolError::DownloadFailed {
            url: sums_url.clone(),
            source: e,
        })?;
    let expected = checksum_for_asset(&sums, asset).ok_or_else(|| ToolError::ChecksumMissing {
        asset: asset.to_string(),
    })?;
    log::debug!("Expecting {} to hash to {}", asset, expected);

    let url = format!("{}/{}", RELEASE_BASE_URL, asset);
    println!("📥 Downloading yt-dlp release '{}'", asset);

    let temp_path = target_path.with_extension("tmp");
    let write_error = |e| ToolError::WriteFailed {
        path: temp_path.clone(),
        source: e,
    };

    let mut response = http_get(&client, &url)?;
    let file = fs::File::create(&temp_path).map_err(write_error)?;
    let mut writer = HashingWriter::new(io::BufWriter::new(file));
    io::copy(&mut response, &mut writer).map_err(write_error)?;
    writer.flush().map_err(write_error)?;
    let (actual, size) = writer.finish();

    if let Err(e) = verify_release(&target_path, &expected, &actual, size) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    make_executable(&temp_path)?;

    fs::rename(&temp_path, &target_path).map_err(|e| ToolError::WriteFailed {
        path: target_path.clone(),
        source: e,
    })?;

    println!(
        "✅ yt-dlp installed at {} (sha256 {})",
        target_path.display(),
        &actual[..12]
    );

    Ok(target_path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), ToolError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| {
        ToolError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), ToolError> {
    Ok(())
}
