//! HTTP transport
//!
//! Every device talks to DigiOnline through its own [`Transport`]. The
//! upstream keeps the login session in cookies, so an implementation must
//! carry cookies from one call to the next.

use crate::error::{DigiError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Browser-like user agent; the site serves a degraded page to unknown clients
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Text-level HTTP operations needed by the session logic
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` with extra request headers, returning the body
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<String>;

    /// POST `fields` as an urlencoded form, returning the body
    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<String>;
}

/// [`Transport`] backed by a reqwest client with a cookie store
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with its own cookie jar and a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .cookie_store(true)
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client
    ///
    /// The client must have a cookie store for logins to stick.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn read_body(response: Response) -> Result<String> {
        let status = response.status();
        let url = response.url().to_string();
        debug!(%url, %status, "Response received");

        if !status.is_success() {
            warn!(%url, %status, "Upstream returned an error status");
            return Err(DigiError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        debug!(url, "GET");
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        Self::read_body(request.send().await?).await
    }

    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<String> {
        debug!(url, fields = fields.len(), "POST");
        let response = self.client.post(url).form(fields).send().await?;
        Self::read_body(response).await
    }
}
