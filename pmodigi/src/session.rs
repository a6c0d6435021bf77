//! Per-device session state
//!
//! The session of device `n` lives under `session.n` in the injected
//! store:
//!
//! ```text
//! session:
//!   0:
//!     last_refresh: 2024-01-01T10:00:00Z
//!     logged_in_at: 2024-01-01T09:58:12Z
//!     player_hash: 0123456789abcdef0123456789abcdef
//!     last_channel:
//!       id: m1
//!       playlists: "#EXTM3U ..."
//!       updated: 2024-01-01T10:00:03Z
//! ```
//!
//! A [`SessionStore`] only ever reads and writes its own device's sub-tree.

use crate::error::Result;
use crate::models::{DeviceId, LastChannel};
use chrono::{DateTime, Utc};
use pmoconfig::Config;
use serde_yaml::Value;
use std::sync::Arc;

/// Read/write access to one device's persisted session
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: Arc<Config>,
    device_id: DeviceId,
}

impl SessionStore {
    pub fn new(store: Arc<Config>, device_id: DeviceId) -> Self {
        Self { store, device_id }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    fn key(&self, field: &str) -> String {
        format!("session.{}.{}", self.device_id, field)
    }

    fn get_time(&self, field: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.store.get_path_as(&self.key(field))?)
    }

    fn set_time(&self, field: &str, at: DateTime<Utc>) -> Result<()> {
        Ok(self.store.set_path_from(&self.key(field), &at)?)
    }

    /// Last successful keep-alive (or login)
    pub fn last_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_time("last_refresh")
    }

    pub fn set_last_refresh(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_time("last_refresh", at)
    }

    /// Last confirmed login
    pub fn logged_in_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_time("logged_in_at")
    }

    /// Records a confirmed login; the keep-alive clock restarts from `at`
    ///
    /// Cached hash and manifest are left alone.
    pub fn record_login(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_time("logged_in_at", at)?;
        self.set_last_refresh(at)
    }

    /// Cached player hash
    pub fn player_hash(&self) -> Result<Option<String>> {
        let hash: Option<String> = self.store.get_path_as(&self.key("player_hash"))?;
        Ok(hash.filter(|h| !h.is_empty()))
    }

    /// Replaces the cached player hash; `None` clears it
    pub fn set_player_hash(&self, hash: Option<&str>) -> Result<()> {
        let value = hash.map_or(Value::Null, |h| Value::String(h.to_string()));
        Ok(self.store.set_path(&self.key("player_hash"), value)?)
    }

    /// Last manifest fetched by this device
    pub fn last_channel(&self) -> Result<Option<LastChannel>> {
        Ok(self.store.get_path_as(&self.key("last_channel"))?)
    }

    pub fn set_last_channel(&self, entry: &LastChannel) -> Result<()> {
        Ok(self.store.set_path_from(&self.key("last_channel"), entry)?)
    }

    /// Drops everything stored for this device
    pub fn clear(&self) -> Result<()> {
        Ok(self
            .store
            .set_path(&format!("session.{}", self.device_id), Value::Null)?)
    }
}
