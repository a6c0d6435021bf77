//! One authenticated DigiOnline session
//!
//! A [`DeviceSession`] owns everything a device needs to resolve a stream:
//! its credentials, its cookie-carrying transport, its slice of the session
//! store, the clock and the client settings. The resolution steps are split
//! across submodules:
//!
//! - [`auth`]: login handshake and logged-in probe
//! - [`keeper`]: keep-alive against the refresh endpoint
//! - [`hash`]: player hash derivation
//! - [`playlist`]: manifest resolution with caching
//! - [`stream`]: quality selection and final fetch

pub mod auth;
pub mod hash;
pub mod keeper;
pub mod playlist;
pub mod stream;

use crate::clock::Clock;
use crate::config_ext::DigiSettings;
use crate::models::{DeviceConfig, DeviceId};
use crate::session::SessionStore;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Upstream URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
    api_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &DigiSettings) -> Self {
        Self::new(&settings.base_url, &settings.api_url)
    }

    pub fn login(&self) -> String {
        format!("{}/login", self.base_url)
    }

    pub fn home(&self) -> String {
        format!("{}/", self.base_url)
    }

    pub fn player(&self, channel_id: &str) -> String {
        format!("{}/player/{}", self.base_url, channel_id)
    }

    pub fn refresh(&self, channel_id: &str) -> String {
        format!("{}/refresh?id={}", self.base_url, channel_id)
    }

    pub fn playlist(&self, channel_id: &str, hash: &str) -> String {
        format!(
            "{}/api/streams/playlist/{}/{}.m3u8",
            self.api_url, channel_id, hash
        )
    }
}

/// Session of a single device
pub struct DeviceSession {
    id: DeviceId,
    device: DeviceConfig,
    transport: Arc<dyn Transport>,
    session: SessionStore,
    clock: Arc<dyn Clock>,
    settings: Arc<DigiSettings>,
    endpoints: Endpoints,
    /// Held for a whole resolution so a device never races itself
    in_flight: Mutex<()>,
}

impl DeviceSession {
    pub fn new(
        id: DeviceId,
        device: DeviceConfig,
        transport: Arc<dyn Transport>,
        session: SessionStore,
        clock: Arc<dyn Clock>,
        settings: Arc<DigiSettings>,
    ) -> Self {
        let endpoints = Endpoints::from_settings(&settings);
        Self {
            id,
            device,
            transport,
            session,
            clock,
            settings,
            endpoints,
            in_flight: Mutex::new(()),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    /// Device name, as used in log lines
    pub fn name(&self) -> &str {
        &self.device.device_name
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn settings(&self) -> &DigiSettings {
        &self.settings
    }

    /// Waits until no other resolution runs on this device
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.in_flight.lock().await
    }

    /// `true` while `since` is less than `window` old
    fn is_fresh(&self, since: chrono::DateTime<chrono::Utc>, window: std::time::Duration) -> bool {
        let age = self.clock.now() - since;
        match chrono::Duration::from_std(window) {
            Ok(window) => age < window,
            Err(_) => true,
        }
    }
}
