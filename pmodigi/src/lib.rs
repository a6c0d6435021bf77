//! # pmodigi - Client DigiOnline pour PMODigi
//!
//! Keeps an authenticated DigiOnline session per device and resolves a
//! channel and a quality into a playable stream.
//!
//! ## Vue d'ensemble
//!
//! The upstream site is undocumented and its tokens expire silently. The
//! client therefore:
//! - logs in with the configured credentials of each device
//! - pings the refresh endpoint at most once per refresh window
//! - caches the player hash and the last manifest in the session store
//! - re-authenticates and retries on failure, with bounded retry loops
//!
//! ## Structure des modules
//!
//! ```text
//! pmodigi/
//! ├── src/
//! │   ├── lib.rs          # Module principal (ce fichier)
//! │   ├── client.rs       # DigiClient, one DeviceSession per device
//! │   ├── device/
//! │   │   ├── mod.rs      # DeviceSession, endpoints
//! │   │   ├── auth.rs     # Login handshake
//! │   │   ├── keeper.rs   # Keep-alive
//! │   │   ├── hash.rs     # Player hash derivation
//! │   │   ├── playlist.rs # Manifest resolution and cache
//! │   │   └── stream.rs   # Quality selection
//! │   ├── session.rs      # Persisted per-device state
//! │   ├── transport.rs    # HTTP transport with cookies
//! │   ├── html.rs         # Form field extraction
//! │   ├── clock.rs        # Injectable clock
//! │   ├── config_ext.rs   # pmoconfig extension
//! │   ├── models.rs       # Data types
//! │   └── error.rs        # Gestion des erreurs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmodigi::{Channel, DigiClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DigiClient::from_config(pmoconfig::get_config())?;
//!     let device = client.get_device(0)?;
//!     println!("Using {}", device.device_name);
//!
//!     let stream = client
//!         .get_playlist(&Channel::new("m1", "M1"), Some("hq"), 0)
//!         .await?;
//!     println!("{}\n{}", stream.url, stream.content);
//!     Ok(())
//! }
//! ```
//!
//! ## Gestion des erreurs
//!
//! Transient failures are retried internally. What reaches the caller is:
//! - `DigiError::TokenMissing` / `DigiError::LoginFailed`: authentication is broken
//! - `DigiError::PlaylistResolutionFailed`: retries exhausted, with the stage
//! - `DigiError::NoStreamFound`: the manifest lists no usable stream

pub mod client;
pub mod clock;
pub mod config_ext;
pub mod device;
pub mod error;
pub mod html;
pub mod models;
pub mod session;
pub mod transport;

pub use client::{ClientBuilder, DigiClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config_ext::{DigiConfigExt, DigiSettings};
pub use device::{DeviceSession, Endpoints};
pub use error::{DigiError, ResolutionStage, Result};
pub use models::{Channel, DEFAULT_QUALITY, DeviceConfig, DeviceId, KeepAlive, LastChannel, Stream};
pub use session::SessionStore;
pub use transport::{HttpTransport, Transport};
