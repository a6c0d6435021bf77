#![allow(dead_code)]

//! In-process stand-in for the DigiOnline site

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pmoconfig::Config;
use pmodigi::{
    DeviceConfig, DigiClient, DigiError, DigiSettings, ManualClock, Result, Transport,
};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub const BASE: &str = "https://digi.test";
pub const API: &str = "https://api.digi.test";
pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "csrf-token-1";

pub const VALID_HASH: &str = "0123456789abcdef0123456789abcdef";
pub const STALE_HASH: &str = "ffffffffffffffffffffffffffffffff";

pub const HQ_URL: &str = "https://edge.digi.test/m1/index.m3u8?q=hq&t=1";
pub const SD_URL: &str = "https://edge.digi.test/m1/index.m3u8?q=sd&t=1";

pub fn manifest_with(urls: &[&str]) -> String {
    let mut manifest = String::from("#EXTM3U\n");
    for url in urls {
        manifest.push_str("#EXT-X-STREAM-INF:BANDWIDTH=1000000\n");
        manifest.push_str(url);
        manifest.push('\n');
    }
    manifest
}

#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct State {
    /// Token served on the login page; `None` serves a page without it
    pub login_token: Option<String>,
    /// Whether correct credentials log the user in
    pub accept_credentials: bool,
    pub logged_in: bool,
    /// Refresh answers `{"error": true}` even for a logged-in user
    pub refresh_error: bool,
    /// Refresh answers with an HTML page instead of JSON
    pub refresh_not_json: bool,
    /// Number of upcoming login page loads answered with a 503
    pub login_page_outages: usize,
    /// Status served by the player page instead of the page itself
    pub player_status: Option<u16>,
    /// Hash embedded in the player page; `None` serves a page without it
    pub player_hash: Option<String>,
    /// Hashes the playlist endpoint accepts
    pub valid_hashes: Vec<String>,
    pub manifest: String,
    pub stream_body: String,
    pub calls: Vec<Call>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            login_token: Some(TOKEN.to_string()),
            accept_credentials: true,
            logged_in: false,
            refresh_error: false,
            refresh_not_json: false,
            login_page_outages: 0,
            player_status: None,
            player_hash: Some(VALID_HASH.to_string()),
            valid_hashes: vec![VALID_HASH.to_string()],
            manifest: manifest_with(&[SD_URL, HQ_URL]),
            stream_body: "#EXTM3U\n#EXT-X-TARGETDURATION:6\nsegment-1.ts\n".to_string(),
            calls: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeDigi {
    state: Mutex<State>,
    /// When set, every request waits until the gate opens
    gate: Mutex<Option<watch::Receiver<bool>>>,
}

impl FakeDigi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Holds every request until `true` is sent on the returned sender
    pub fn close_gate(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub fn total_calls(&self) -> usize {
        self.with(|s| s.calls.len())
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.with(|s| s.calls.iter().filter(|c| pred(*c)).count())
    }

    pub fn login_page_calls(&self) -> usize {
        self.count(|c| c.method == "GET" && c.url == format!("{BASE}/login"))
    }

    pub fn login_posts(&self) -> usize {
        self.count(|c| c.method == "POST")
    }

    pub fn refresh_calls(&self) -> usize {
        self.count(|c| c.url.starts_with(&format!("{BASE}/refresh")))
    }

    pub fn player_calls(&self) -> usize {
        self.count(|c| c.url.starts_with(&format!("{BASE}/player/")))
    }

    pub fn playlist_calls(&self) -> usize {
        self.count(|c| c.url.starts_with(&format!("{API}/api/streams/playlist/")))
    }

    pub fn playlist_calls_with(&self, hash: &str) -> usize {
        let suffix = format!("/{hash}.m3u8");
        self.count(|c| c.url.starts_with(API) && c.url.ends_with(&suffix))
    }

    fn respond(&self, call: &Call) -> Result<String> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(call.clone());
        let url = call.url.as_str();

        if call.method == "POST" && url == format!("{BASE}/login") {
            let field = |name: &str| {
                call.fields
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.as_str())
            };
            let valid = s.login_token.as_deref().is_some_and(|t| field("_token") == Some(t))
                && field("accept") == Some("1")
                && field("email") == Some(EMAIL)
                && field("password") == Some(PASSWORD);
            if valid && s.accept_credentials {
                s.logged_in = true;
            }
            return Ok("<html><body>Welcome</body></html>".to_string());
        }

        if url == format!("{BASE}/login") {
            if s.login_page_outages > 0 {
                s.login_page_outages -= 1;
                return Err(DigiError::HttpStatus {
                    status: 503,
                    url: url.to_string(),
                });
            }
            return Ok(match &s.login_token {
                Some(token) => format!(
                    r#"<html><form method="post"><input type="hidden" name="_token" value="{token}"><input name="email"></form></html>"#
                ),
                None => "<html><form method=\"post\"><input name=\"email\"></form></html>".to_string(),
            });
        }

        if url == format!("{BASE}/") {
            return Ok(if s.logged_in {
                r#"<html><div class="in-user">Hello</div></html>"#.to_string()
            } else {
                r#"<html><div class="guest">Login</div></html>"#.to_string()
            });
        }

        if let Some(channel) = url.strip_prefix(&format!("{BASE}/player/")) {
            if let Some(status) = s.player_status {
                return Err(DigiError::HttpStatus {
                    status,
                    url: url.to_string(),
                });
            }
            return Ok(match &s.player_hash {
                Some(hash) => format!(
                    r#"<html><script>var src = "{API}/api/streams/playlist/{channel}/{hash}.m3u8";</script></html>"#
                ),
                None => "<html><p>Please log in</p></html>".to_string(),
            });
        }

        if url.starts_with(&format!("{BASE}/refresh?id=")) {
            if s.refresh_not_json {
                return Ok("<html><body>Session expired</body></html>".to_string());
            }
            return Ok(if s.logged_in && !s.refresh_error {
                r#"{"success": true}"#.to_string()
            } else {
                r#"{"error": true}"#.to_string()
            });
        }

        if url.starts_with(&format!("{API}/api/streams/playlist/")) {
            let accepted = s
                .valid_hashes
                .iter()
                .any(|h| url.ends_with(&format!("/{h}.m3u8")));
            return Ok(if accepted {
                s.manifest.clone()
            } else {
                r#"{"error": "expired"}"#.to_string()
            });
        }

        if url.starts_with("https://edge.digi.test/") {
            return Ok(s.stream_body.clone());
        }

        Err(DigiError::HttpStatus {
            status: 404,
            url: url.to_string(),
        })
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(mut rx) = gate {
            let _ = rx.wait_for(|open| *open).await;
        }
    }
}

#[async_trait]
impl Transport for FakeDigi {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        self.wait_gate().await;
        self.respond(&Call {
            method: "GET",
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fields: Vec::new(),
        })
    }

    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<String> {
        self.wait_gate().await;
        self.respond(&Call {
            method: "POST",
            url: url.to_string(),
            headers: Vec::new(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }
}

pub fn settings() -> DigiSettings {
    DigiSettings {
        base_url: BASE.to_string(),
        api_url: API.to_string(),
        ..DigiSettings::default()
    }
}

pub fn device(name: &str) -> DeviceConfig {
    DeviceConfig {
        device_name: name.to_string(),
        email: EMAIL.to_string(),
        password: PASSWORD.to_string(),
    }
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-03-01T20:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub struct Harness {
    pub client: DigiClient,
    pub fakes: Vec<Arc<FakeDigi>>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<Config>,
}

impl Harness {
    pub fn fake(&self) -> &FakeDigi {
        &self.fakes[0]
    }
}

/// A client with `devices` devices, each talking to its own fake site
pub fn harness_with(devices: usize) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pmodigi=debug")
        .with_test_writer()
        .try_init();

    let store = Arc::new(Config::from_yaml_str("").unwrap());
    let clock = Arc::new(ManualClock::new(start_time()));
    let fakes: Vec<Arc<FakeDigi>> = (0..devices).map(|_| FakeDigi::new()).collect();

    let mut builder = DigiClient::builder(store.clone())
        .settings(settings())
        .clock(clock.clone());
    for (i, fake) in fakes.iter().enumerate() {
        builder = builder.device(device(&format!("device-{i}")), fake.clone());
    }

    Harness {
        client: builder.build(),
        fakes,
        clock,
        store,
    }
}

pub fn harness() -> Harness {
    harness_with(1)
}
