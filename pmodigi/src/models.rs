//! Data types shared by the DigiOnline client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a device in the configured device list
pub type DeviceId = usize;

/// Default stream quality
pub const DEFAULT_QUALITY: &str = "hq";

/// A DigiOnline channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Upstream channel id (as used in player and playlist URLs)
    pub id: String,
    /// Display name, used for logging only
    pub name: String,
}

impl Channel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Static credentials of one device
///
/// Each device keeps its own login session upstream, so the same account
/// may be configured several times under different names.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("device_name", &self.device_name)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Last manifest fetched by a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastChannel {
    /// Channel the manifest belongs to
    pub id: String,
    /// Raw manifest text
    pub playlists: String,
    /// When the manifest was fetched
    pub updated: DateTime<Utc>,
}

/// Outcome of a keep-alive round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAlive {
    /// The last refresh is recent enough, nothing was sent
    Fresh,
    /// The refresh endpoint accepted the session
    Refreshed,
    /// Every attempt failed; the caller may still go on
    Exhausted { attempts: u32 },
}

impl KeepAlive {
    pub fn is_alive(&self) -> bool {
        !matches!(self, Self::Exhausted { .. })
    }
}

/// A resolved stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    /// Quality that was requested
    pub quality: String,
    /// URL picked from the manifest
    pub url: String,
    /// Body served at `url`
    pub content: String,
}
