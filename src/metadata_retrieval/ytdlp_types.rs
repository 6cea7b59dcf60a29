/// yt-dlp `--dump-json --flat-playlist` output types for deserialization.
///
/// Each stdout line is one of these objects. Only the fields the catalog
/// needs are declared; everything else yt-dlp prints is ignored.
use serde::Deserialize;

/// A flat playlist entry as printed by yt-dlp.
#[derive(Debug, Deserialize)]
pub(super) struct FlatPlaylistEntry {
    /// Video identifier
    pub id: String,
    /// Video title (null for private or deleted videos)
    pub title: Option<String>,
    /// Canonical watch page, present on newer yt-dlp versions
    pub webpage_url: Option<String>,
    /// Entry URL, always present for flat entries
    pub url: Option<String>,
    /// Duration in seconds (may be null for live streams)
    pub duration: Option<f64>,
}
