//! Stream selection
//!
//! Manifest entries carry their quality as a `q=` query parameter:
//!
//! ```text
//! #EXTM3U
//! #EXT-X-STREAM-INF:BANDWIDTH=2500000
//! https://edge.digi.hu/m1/index.m3u8?q=hq&t=...
//! #EXT-X-STREAM-INF:BANDWIDTH=800000
//! https://edge.digi.hu/m1/index.m3u8?q=sd&t=...
//! ```

use super::DeviceSession;
use crate::error::{DigiError, Result};
use crate::models::Stream;
use regex::Regex;
use tracing::{debug, info};

/// Picks the stream URL for `quality`
///
/// Falls back to the first quality-tagged URL of the manifest when no
/// entry carries the requested quality.
pub fn select_stream_url(manifest: &str, quality: &str) -> Result<String> {
    let manifest = manifest.trim();
    let wanted = Regex::new(&format!(r"https:.*q={}.*", regex::escape(quality)))?;
    let any = Regex::new(r"https:.*q=.*")?;

    wanted
        .find(manifest)
        .or_else(|| any.find(manifest))
        .map(|m| m.as_str().trim().to_string())
        .ok_or(DigiError::NoStreamFound)
}

impl DeviceSession {
    /// Selects the stream of `quality` in `manifest` and fetches it
    ///
    /// The selected entry is usually another playlist, so the fetch is part
    /// of the resolution.
    pub async fn get_stream(&self, manifest: &str, quality: &str) -> Result<Stream> {
        let url = select_stream_url(manifest, quality)?;
        debug!(device = %self.name(), %url, quality, "Stream selected");

        let content = self.transport.get(&url, &[]).await?;
        info!(device = %self.name(), quality, "Stream resolved");

        Ok(Stream {
            quality: quality.to_string(),
            url,
            content,
        })
    }
}
