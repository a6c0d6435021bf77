//! Login handshake
//!
//! The login page carries a CSRF token in a hidden `_token` field. The
//! token is posted back together with the credentials; the site then
//! answers with a normal page whatever the outcome, so success is checked
//! separately by looking for the logged-in marker on the home page.

use super::DeviceSession;
use crate::error::{DigiError, Result};
use crate::html::extract_form_field;
use tracing::{debug, info, warn};

/// Name of the CSRF field of the login form
pub const LOGIN_TOKEN_FIELD: &str = "_token";

/// Only present in pages rendered for a logged-in user
pub const LOGGED_IN_MARKER: &str = "\"in-user\"";

impl DeviceSession {
    /// Logs the device in
    ///
    /// On success the keep-alive clock restarts. Cached hash and manifest
    /// are not touched: callers invalidate what they hold.
    ///
    /// # Errors
    ///
    /// * `DigiError::TokenMissing` - the login page has no form token; no
    ///   credentials were sent
    /// * `DigiError::LoginFailed` - the credentials were sent but the
    ///   session is not logged in afterwards
    pub async fn login(&self) -> Result<()> {
        info!(device = %self.name(), "Login to DigiOnline...");

        let login_url = self.endpoints.login();
        let page = self.transport.get(&login_url, &[]).await?;
        let token = extract_form_field(&page, LOGIN_TOKEN_FIELD).ok_or_else(|| {
            warn!(device = %self.name(), "Login page has no form token");
            DigiError::TokenMissing
        })?;

        let form = [
            (LOGIN_TOKEN_FIELD, token.as_str()),
            ("accept", "1"),
            ("email", self.device.email.as_str()),
            ("password", self.device.password.as_str()),
        ];
        self.transport.post_form(&login_url, &form).await?;

        if !self.probe_logged_in().await? {
            warn!(device = %self.name(), "Login failed");
            return Err(DigiError::LoginFailed(self.name().to_string()));
        }

        self.session.record_login(self.clock.now())?;
        info!(device = %self.name(), "Login success");
        Ok(())
    }

    /// Login step of the retry loops
    ///
    /// A transient failure only costs the current attempt: it is logged and
    /// the loop moves on. Authentication and store errors are returned.
    pub(crate) async fn relogin(&self, attempt: u32) -> Result<()> {
        match self.login().await {
            Err(e) if e.is_transient() => {
                warn!(device = %self.name(), attempt, error = %e, "Login attempt failed");
                Ok(())
            }
            other => other,
        }
    }

    /// Tells whether the site currently sees this device as logged in
    ///
    /// Read-only: nothing is stored.
    pub async fn probe_logged_in(&self) -> Result<bool> {
        let page = self.transport.get(&self.endpoints.home(), &[]).await?;
        let logged_in = page.contains(LOGGED_IN_MARKER);
        debug!(device = %self.name(), logged_in, "Login probe");
        Ok(logged_in)
    }
}
