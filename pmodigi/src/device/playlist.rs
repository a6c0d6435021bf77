//! Manifest resolution
//!
//! ```text
//!            ┌────────── cached & fresh ──────────────► Success
//! CheckCache ┤
//!            └─► NeedHash ──── no hash ──► login ──┐ (hash retries)
//!                   ▲  │                           │
//!                   │  └─ hash ─► FetchManifest ───┼──── #EXTM3U ──► Success
//!                   │                   │          │
//!                   └──── re-derive ◄───┘          │ (manifest retries)
//!                         hash                     ▼
//!                                     retries spent ──► Failed
//! ```
//!
//! Both retry loops have their own counter, each bounded by `max_attempts`.

use super::DeviceSession;
use crate::error::{DigiError, ResolutionStage, Result};
use crate::models::{Channel, LastChannel};
use tracing::{debug, info, warn};

/// Present in every valid manifest
pub const MANIFEST_MARKER: &str = "#EXTM3U";

impl DeviceSession {
    /// Resolves the manifest of `channel`
    ///
    /// A manifest cached for the same channel and younger than the playlist
    /// TTL is returned without any request. Otherwise a player hash is
    /// taken from the session (or derived and stored) and the playlist
    /// endpoint is queried with it.
    ///
    /// # Errors
    ///
    /// * `PlaylistResolutionFailed { stage: Hash }` - no hash after all logins
    /// * `PlaylistResolutionFailed { stage: Playlist }` - the endpoint never
    ///   returned a manifest, even with re-derived hashes
    /// * login and store errors
    pub async fn get_playlists(&self, channel: &Channel) -> Result<String> {
        let max_attempts = self.settings.max_attempts;
        let mut hash_attempt = 0;
        let mut manifest_attempt = 0;

        loop {
            if let Some(manifest) = self.cached_playlists(channel)? {
                info!(device = %self.name(), channel = %channel.name, "Play channel from cache");
                return Ok(manifest);
            }

            let Some(hash) = self.current_player_hash(channel).await? else {
                if hash_attempt >= max_attempts {
                    warn!(device = %self.name(), channel = %channel.name, "Failed player hash parsing");
                    return Err(DigiError::PlaylistResolutionFailed {
                        stage: ResolutionStage::Hash,
                    });
                }
                self.relogin(hash_attempt).await?;
                hash_attempt += 1;
                continue;
            };

            if let Some(manifest) = self.fetch_manifest(channel, &hash).await {
                self.session.set_last_channel(&LastChannel {
                    id: channel.id.clone(),
                    playlists: manifest.clone(),
                    updated: self.clock.now(),
                })?;
                info!(device = %self.name(), channel = %channel.name, "Play channel");
                return Ok(manifest);
            }

            if manifest_attempt >= max_attempts {
                warn!(device = %self.name(), channel = %channel.name, "Failed playlist parsing");
                return Err(DigiError::PlaylistResolutionFailed {
                    stage: ResolutionStage::Playlist,
                });
            }
            manifest_attempt += 1;

            // The hash is stale: derive a new one, bypassing the cache
            let fresh = self.get_player_hash(channel).await?;
            self.session.set_player_hash(fresh.as_deref())?;
        }
    }

    /// Cached manifest, if it belongs to `channel` and is still fresh
    fn cached_playlists(&self, channel: &Channel) -> Result<Option<String>> {
        Ok(self
            .session
            .last_channel()?
            .filter(|entry| {
                entry.id == channel.id && self.is_fresh(entry.updated, self.settings.playlist_ttl)
            })
            .map(|entry| entry.playlists))
    }

    /// Cached hash, or a freshly derived one which is then stored
    ///
    /// Derivation errors read as "no hash": the caller's retry loop decides.
    async fn current_player_hash(&self, channel: &Channel) -> Result<Option<String>> {
        if let Some(hash) = self.session.player_hash()? {
            return Ok(Some(hash));
        }

        match self.get_player_hash(channel).await {
            Ok(Some(hash)) => {
                self.session.set_player_hash(Some(&hash))?;
                Ok(Some(hash))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                debug!(device = %self.name(), error = %e, "Ignoring player hash error");
                Ok(None)
            }
        }
    }

    /// Queries the playlist endpoint; `None` for anything that is not a manifest
    async fn fetch_manifest(&self, channel: &Channel, hash: &str) -> Option<String> {
        let url = self.endpoints.playlist(&channel.id, hash);
        match self.transport.get(&url, &[]).await {
            Ok(body) if body.contains(MANIFEST_MARKER) => Some(body),
            Ok(_) => {
                warn!(device = %self.name(), channel = %channel.name, "Playlist response is not a manifest");
                None
            }
            Err(e) => {
                warn!(device = %self.name(), channel = %channel.name, error = %e, "Playlist request failed");
                None
            }
        }
    }
}
