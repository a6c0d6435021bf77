//! Player hash derivation
//!
//! The player page of a channel embeds a manifest URL such as
//! `https://online.digi.hu/api/streams/playlist/m1/0123456789abcdef0123456789abcdef.m3u8`.
//! The 32 hexadecimal characters are the token the playlist endpoint wants.

use super::DeviceSession;
use crate::error::{DigiError, Result};
use crate::models::Channel;
use regex::Regex;
use tracing::{info, warn};

/// Extracts the player hash from a player page
///
/// Only the first manifest-looking URL of the page is considered.
pub fn extract_player_hash(html: &str) -> Result<Option<String>> {
    let manifest_url = Regex::new(r"http.*?\.m3u8")?;
    let token = Regex::new(r"(?i)[a-f0-9]{32}")?;

    Ok(manifest_url
        .find(html)
        .and_then(|url| token.find(url.as_str()))
        .map(|hash| hash.as_str().to_string()))
}

impl DeviceSession {
    /// Derives the player hash of `channel`
    ///
    /// Every failed derivation (network error, page without hash) is
    /// followed by a new login and another try, up to `max_attempts`
    /// logins. `Ok(None)` means no hash could be produced.
    ///
    /// The cache is neither read nor written here.
    ///
    /// # Errors
    ///
    /// Authentication errors and invalid patterns only.
    pub async fn get_player_hash(&self, channel: &Channel) -> Result<Option<String>> {
        let max_attempts = self.settings.max_attempts;
        let mut attempt = 0;
        loop {
            info!(device = %self.name(), channel = %channel.name, attempt, "Get playlist hash");
            match self.fetch_player_hash(channel).await {
                Ok(hash) => return Ok(Some(hash)),
                Err(e @ DigiError::Regex(_)) => return Err(e),
                Err(e) => warn!(
                    device = %self.name(),
                    channel = %channel.name,
                    attempt,
                    error = %e,
                    "Player hash derivation failed"
                ),
            }

            if attempt >= max_attempts {
                warn!(device = %self.name(), channel = %channel.name, "No player hash");
                return Ok(None);
            }

            self.relogin(attempt).await?;
            attempt += 1;
        }
    }

    async fn fetch_player_hash(&self, channel: &Channel) -> Result<String> {
        let html = self
            .transport
            .get(&self.endpoints.player(&channel.id), &[])
            .await?;
        extract_player_hash(&html)?.ok_or_else(|| DigiError::HashNotFound(channel.id.clone()))
    }
}
