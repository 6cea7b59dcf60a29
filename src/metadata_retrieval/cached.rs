//! Cached playlist provider implementation
//!
//! This module provides a caching wrapper for playlist providers that
//! stores playlist listings in the user cache, so re-fetching a series
//! within a day does not hit the network again.

use super::{MetadataRetrievalError, PlaylistProvider, PlaylistVideo};
use crate::cache::CacheStorage;

/// A caching wrapper for playlist providers
///
/// Successful listings are cached per playlist id. Empty listings are not
/// cached, since an empty answer is usually a transient tool failure.
pub(crate) struct CachedPlaylistProvider<P>
where
    P: PlaylistProvider,
{
    /// The underlying playlist provider
    provider: P,
    /// Cache storage for playlist listings
    cache: CacheStorage<Vec<PlaylistVideo>>,
    /// Skip cache reads (results are still written)
    refresh: bool,
}

impl<P> CachedPlaylistProvider<P>
where
    P: PlaylistProvider,
{
    /// Creates a new cached provider wrapping the given provider
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let ytdlp = YtDlpPlaylistProvider::new(tool);
    /// let cache = CacheStorage::open("playlists", Some(Duration::from_secs(86400)))?;
    /// let cached = CachedPlaylistProvider::new(ytdlp, cache, false);
    /// ```
    pub fn new(provider: P, cache: CacheStorage<Vec<PlaylistVideo>>, refresh: bool) -> Self {
        Self {
            provider,
            cache,
            refresh,
        }
    }
}

impl<P> PlaylistProvider for CachedPlaylistProvider<P>
where
    P: PlaylistProvider,
{
    fn fetch_playlist(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistVideo>, MetadataRetrievalError> {
        if !self.refresh {
            match self.cache.load(playlist_id) {
                Ok(Some(videos)) => {
                    log::debug!("Cache hit for playlist {}", playlist_id);
                    return Ok(videos);
                }
                Ok(None) => {
                    log::debug!("Cache miss for playlist {}", playlist_id);
                }
                Err(e) => {
                    // A broken cache entry must not prevent fetching
                    log::warn!("Ignoring unreadable cache entry: {}", e);
                }
            }
        }

        let videos = self.provider.fetch_playlist(playlist_id)?;

        if !videos.is_empty() {
            if let Err(e) = self.cache.store(playlist_id, &videos) {
                log::warn!("Failed to cache playlist {}: {}", playlist_id, e);
            }
        }

        Ok(videos)
    }
}
