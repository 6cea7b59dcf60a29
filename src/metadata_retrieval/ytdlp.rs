/// yt-dlp playlist provider implementation.
use super::ytdlp_types::FlatPlaylistEntry;
use super::{MetadataRetrievalError, PlaylistProvider, PlaylistVideo};
use crate::catalog::playlist_url;
use crate::tool_provisioning::ToolCommand;
use std::process::Stdio;

/// Lists playlists by running `yt-dlp --dump-json --flat-playlist`.
///
/// Flat listing only reads the playlist page, so no video is downloaded
/// and no format negotiation happens.
pub(crate) struct YtDlpPlaylistProvider {
    tool: ToolCommand,
}

impl YtDlpPlaylistProvider {
    /// Creates a provider that invokes the given tool.
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }

    /// Parses the tool's stdout, one JSON object per non-empty line.
    fn parse_output(
        playlist_id: &str,
        stdout: &str,
    ) -> Result<Vec<PlaylistVideo>, MetadataRetrievalError> {
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let entry: FlatPlaylistEntry = serde_json::from_str(line).map_err(|e| {
                    MetadataRetrievalError::ParseError {
                        playlist_id: playlist_id.to_string(),
                        source: e,
                    }
                })?;
                Ok(Self::convert_entry(entry))
            })
            .collect()
    }

    /// Converts a yt-dlp entry to our internal structure.
    fn convert_entry(entry: FlatPlaylistEntry) -> PlaylistVideo {
        PlaylistVideo {
            url: entry.webpage_url.or(entry.url),
            id: entry.id,
            title: entry.title,
            duration: entry.duration,
        }
    }
}

impl PlaylistProvider for YtDlpPlaylistProvider {
    fn fetch_playlist(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistVideo>, MetadataRetrievalError> {
        let url = playlist_url(playlist_id);
        log::debug!("Running {} --dump-json --flat-playlist {}", self.tool.display(), url);

        let output = self
            .tool
            .command()
            .arg("--dump-json")
            .arg("--flat-playlist")
            .arg(&url)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| MetadataRetrievalError::SpawnFailed {
                command: self.tool.display(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MetadataRetrievalError::ToolFailed {
                playlist_id: playlist_id.to_string(),
                message: stderr.trim().to_string(),
            });
        }

        if stdout.trim().is_empty() {
            log::warn!("Empty response for playlist {}", playlist_id);
        }

        // yt-dlp exits non-zero when single entries are unavailable but
        // still prints the rest of the playlist
        Self::parse_output(playlist_id, &stdout)
    }
}
