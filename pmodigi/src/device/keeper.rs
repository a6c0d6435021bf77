//! Keep-alive
//!
//! The site drops sessions that stay silent. Pinging the refresh endpoint
//! keeps them open, but at most once per refresh window.

use super::DeviceSession;
use crate::error::Result;
use crate::models::{Channel, KeepAlive};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    error: Option<Value>,
}

impl RefreshResponse {
    /// Any truthy `error` marks a dead session
    fn is_error(&self) -> bool {
        match &self.error {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        }
    }
}

impl DeviceSession {
    /// Keeps the upstream session alive
    ///
    /// Returns immediately, without any request, when the last refresh is
    /// inside the refresh window. Otherwise the refresh endpoint is called;
    /// each failed call is followed by a new login and another call, up to
    /// `max_attempts` logins. When they are all spent the result is
    /// [`KeepAlive::Exhausted`] rather than an error. If the site answered
    /// the last call with an error, the refresh clock is restarted anyway
    /// so the next resolutions do not hammer it; after a network or parse
    /// failure it is left alone.
    ///
    /// # Errors
    ///
    /// Only authentication errors and store errors are returned.
    pub async fn ensure_alive(&self, channel: &Channel) -> Result<KeepAlive> {
        if let Some(last) = self.session.last_refresh()? {
            if self.is_fresh(last, self.settings.refresh_window) {
                debug!(device = %self.name(), "Session refreshed recently");
                return Ok(KeepAlive::Fresh);
            }
        }

        let max_attempts = self.settings.max_attempts;
        let mut attempt = 0;
        loop {
            info!(device = %self.name(), attempt, "Keep connection");
            // Whether the site itself answered, as opposed to a network or parse error
            let answered = match self.refresh(channel).await {
                Ok(true) => {
                    self.session.set_last_refresh(self.clock.now())?;
                    return Ok(KeepAlive::Refreshed);
                }
                Ok(false) => {
                    warn!(device = %self.name(), attempt, "Refresh rejected");
                    true
                }
                Err(e) => {
                    warn!(device = %self.name(), attempt, error = %e, "Refresh failed");
                    false
                }
            };

            if attempt >= max_attempts {
                warn!(
                    device = %self.name(),
                    attempts = attempt + 1,
                    "Keep-alive gave up"
                );
                if answered {
                    self.session.set_last_refresh(self.clock.now())?;
                }
                return Ok(KeepAlive::Exhausted {
                    attempts: attempt + 1,
                });
            }

            self.relogin(attempt).await?;
            attempt += 1;
        }
    }

    /// One call to the refresh endpoint; `Ok(false)` when the site reports an error
    async fn refresh(&self, channel: &Channel) -> Result<bool> {
        let referer = self.endpoints.player(&channel.id);
        let headers = [
            ("Referer", referer.as_str()),
            ("X-Requested-With", "XMLHttpRequest"),
        ];
        let body = self
            .transport
            .get(&self.endpoints.refresh(&channel.id), &headers)
            .await?;
        let response: RefreshResponse = serde_json::from_str(&body)?;
        Ok(!response.is_error())
    }
}
