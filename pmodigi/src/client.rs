//! Client DigiOnline haut-niveau
//!
//! `DigiClient` owns one [`DeviceSession`] per configured device and
//! exposes the public entry point, [`DigiClient::get_playlist`].
//!
//! # Exemple
//!
//! ```rust,no_run
//! use pmodigi::{Channel, DigiClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DigiClient::from_config(pmoconfig::get_config())?;
//!
//!     let channel = Channel::new("m1", "M1");
//!     let stream = client.get_playlist(&channel, None, 0).await?;
//!     println!("{}", stream.url);
//!     Ok(())
//! }
//! ```

use crate::clock::{Clock, SystemClock};
use crate::config_ext::{DigiConfigExt, DigiSettings};
use crate::device::DeviceSession;
use crate::error::{DigiError, Result};
use crate::models::{Channel, DEFAULT_QUALITY, DeviceConfig, DeviceId, Stream};
use crate::session::SessionStore;
use crate::transport::{HttpTransport, Transport};
use pmoconfig::Config;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Client DigiOnline multi-devices
///
/// Devices never share a transport, a session sub-tree or a lock: a device
/// stuck in its retry loops does not delay the others.
pub struct DigiClient {
    devices: BTreeMap<DeviceId, Arc<DeviceSession>>,
}

impl DigiClient {
    /// Crée un client depuis la configuration
    ///
    /// The configuration provides the devices and the settings, and also
    /// serves as the session store.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let settings = config.get_digi_settings()?;
        let devices = config.get_digi_devices()?;

        let mut builder = Self::builder(config).settings(settings.clone());
        for device in devices {
            let transport = HttpTransport::new(settings.request_timeout)?;
            builder = builder.device(device, Arc::new(transport));
        }
        Ok(builder.build())
    }

    /// Create a builder for configuring the client
    pub fn builder(store: Arc<Config>) -> ClientBuilder {
        ClientBuilder::new(store)
    }

    /// Static configuration of a device
    pub fn get_device(&self, device_id: DeviceId) -> Result<&DeviceConfig> {
        Ok(self.session(device_id)?.device())
    }

    /// Ids of the configured devices
    pub fn device_ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.keys().copied()
    }

    /// Session of a device
    pub fn session(&self, device_id: DeviceId) -> Result<&Arc<DeviceSession>> {
        self.devices
            .get(&device_id)
            .ok_or(DigiError::DeviceNotFound(device_id))
    }

    /// Resolves `channel` to a playable stream for `device_id`
    ///
    /// Runs keep-alive, manifest resolution and stream selection in that
    /// order. A keep-alive that gives up is logged and resolution goes on.
    /// `quality` defaults to `hq`.
    pub async fn get_playlist(
        &self,
        channel: &Channel,
        quality: Option<&str>,
        device_id: DeviceId,
    ) -> Result<Stream> {
        let quality = quality.unwrap_or(DEFAULT_QUALITY);
        let device = self.session(device_id)?;
        let _in_flight = device.lock().await;

        let keep_alive = device.ensure_alive(channel).await?;
        if !keep_alive.is_alive() {
            warn!(device = %device.name(), ?keep_alive, "Continuing without keep-alive");
        }

        let manifest = device.get_playlists(channel).await?;
        device.get_stream(&manifest, quality).await
    }
}

/// Builder for [`DigiClient`]
pub struct ClientBuilder {
    store: Arc<Config>,
    settings: DigiSettings,
    clock: Arc<dyn Clock>,
    devices: Vec<(DeviceConfig, Arc<dyn Transport>)>,
}

impl ClientBuilder {
    fn new(store: Arc<Config>) -> Self {
        Self {
            store,
            settings: DigiSettings::default(),
            clock: Arc::new(SystemClock),
            devices: Vec::new(),
        }
    }

    pub fn settings(mut self, settings: DigiSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Adds a device; ids follow insertion order starting at 0
    pub fn device(mut self, device: DeviceConfig, transport: Arc<dyn Transport>) -> Self {
        self.devices.push((device, transport));
        self
    }

    pub fn build(self) -> DigiClient {
        let settings = Arc::new(self.settings);
        let devices = self
            .devices
            .into_iter()
            .enumerate()
            .map(|(id, (device, transport))| {
                info!(device = %device.device_name, id, "DigiOnline device registered");
                let session = DeviceSession::new(
                    id,
                    device,
                    transport,
                    SessionStore::new(self.store.clone(), id),
                    self.clock.clone(),
                    settings.clone(),
                );
                (id, Arc::new(session))
            })
            .collect();

        DigiClient { devices }
    }
}
