//! Extension pour intégrer la configuration DigiOnline dans pmoconfig
//!
//! Ce module fournit le trait `DigiConfigExt` qui ajoute à
//! `pmoconfig::Config` la lecture des devices configurés et des réglages
//! du client (URLs, fenêtres de fraîcheur, nombre de tentatives).
//!
//! # Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmodigi::DigiConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! for (id, device) in config.get_digi_devices()?.iter().enumerate() {
//!     println!("#{} {} <{}>", id, device.device_name, device.email);
//! }
//! # Ok(())
//! # }
//! ```

use crate::models::{DeviceConfig, DeviceId};
use anyhow::{anyhow, Result};
use pmoconfig::Config;
use serde::Deserialize;
use serde_yaml::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://digionline.hu";
pub const DEFAULT_API_URL: &str = "https://online.digi.hu";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Keep-alive freshness window (5 minutes)
pub const DEFAULT_REFRESH_WINDOW_SECS: u64 = 5 * 60;
/// Manifest cache freshness window (5 hours)
pub const DEFAULT_PLAYLIST_TTL_SECS: u64 = 5 * 60 * 60;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const SECTION: [&str; 2] = ["accounts", "digionline"];

/// Tunables of the DigiOnline client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigiSettings {
    /// Site root: login, home, player and refresh pages
    pub base_url: String,
    /// API root: playlist endpoint
    pub api_url: String,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// A keep-alive younger than this is not repeated
    pub refresh_window: Duration,
    /// A cached manifest younger than this is served as is
    pub playlist_ttl: Duration,
    /// Retries allowed per retry loop
    pub max_attempts: u32,
}

impl Default for DigiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_window: Duration::from_secs(DEFAULT_REFRESH_WINDOW_SECS),
            playlist_ttl: Duration::from_secs(DEFAULT_PLAYLIST_TTL_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    device_name: String,
    email: String,
    password: String,
}

/// Trait d'extension pour gérer la configuration DigiOnline dans pmoconfig
pub trait DigiConfigExt {
    /// Liste des devices, dans l'ordre du fichier (l'index sert d'identifiant)
    ///
    /// Les mots de passe `encrypted:` sont déchiffrés à la lecture.
    fn get_digi_devices(&self) -> Result<Vec<DeviceConfig>>;

    /// Un device par son identifiant
    fn get_digi_device(&self, id: DeviceId) -> Result<DeviceConfig>;

    /// Ajoute un device et retourne son identifiant
    fn add_digi_device(&self, device: &DeviceConfig) -> Result<DeviceId>;

    /// Réglages du client, valeurs par défaut pour les clés absentes
    fn get_digi_settings(&self) -> Result<DigiSettings>;
}

fn section_path(key: &str) -> [&str; 3] {
    [SECTION[0], SECTION[1], key]
}

fn get_string(config: &Config, key: &str, default: &str) -> String {
    match config.get_value(&section_path(key)) {
        Ok(Value::String(s)) if !s.trim().is_empty() => s.trim().trim_end_matches('/').to_string(),
        _ => default.to_string(),
    }
}

fn get_u64(config: &Config, key: &str, default: u64) -> u64 {
    match config.get_value(&section_path(key)) {
        Ok(Value::Number(n)) => n.as_u64().unwrap_or(default),
        Ok(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

impl DigiConfigExt for Config {
    fn get_digi_devices(&self) -> Result<Vec<DeviceConfig>> {
        let raw: Vec<RawDevice> = match self.get_value(&section_path("devices")) {
            Ok(Value::Null) | Err(_) => Vec::new(),
            Ok(value) => serde_yaml::from_value(value)
                .map_err(|e| anyhow!("Invalid DigiOnline device list: {}", e))?,
        };

        raw.into_iter()
            .map(|device| {
                let password = pmoconfig::encryption::get_password(&device.password).map_err(
                    |e| anyhow!("Failed to decrypt password of {}: {}", device.device_name, e),
                )?;
                Ok(DeviceConfig {
                    device_name: device.device_name,
                    email: device.email,
                    password,
                })
            })
            .collect()
    }

    fn get_digi_device(&self, id: DeviceId) -> Result<DeviceConfig> {
        self.get_digi_devices()?
            .into_iter()
            .nth(id)
            .ok_or_else(|| anyhow!("DigiOnline device {} not configured", id))
    }

    fn add_digi_device(&self, device: &DeviceConfig) -> Result<DeviceId> {
        let mut devices = match self.get_value(&section_path("devices")) {
            Ok(Value::Sequence(seq)) => seq,
            _ => Vec::new(),
        };
        devices.push(serde_yaml::to_value(device)?);
        let id = devices.len() - 1;
        self.set_value(&section_path("devices"), Value::Sequence(devices))?;
        Ok(id)
    }

    fn get_digi_settings(&self) -> Result<DigiSettings> {
        let max_attempts = get_u64(self, "max_attempts", DEFAULT_MAX_ATTEMPTS as u64);
        Ok(DigiSettings {
            base_url: get_string(self, "base_url", DEFAULT_BASE_URL),
            api_url: get_string(self, "api_url", DEFAULT_API_URL),
            request_timeout: Duration::from_secs(get_u64(
                self,
                "request_timeout_secs",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            refresh_window: Duration::from_secs(get_u64(
                self,
                "refresh_window_secs",
                DEFAULT_REFRESH_WINDOW_SECS,
            )),
            playlist_ttl: Duration::from_secs(get_u64(
                self,
                "playlist_ttl_secs",
                DEFAULT_PLAYLIST_TTL_SECS,
            )),
            max_attempts: u32::try_from(max_attempts).unwrap_or(DEFAULT_MAX_ATTEMPTS),
        })
    }
}
