//! HTTP client for the createsend v3.3 API
//!
//! Authenticates with HTTP basic auth: the API key is the username and `x`
//! is the password. Reads bypass caches so polling sees fresh data.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Response};
use tracing::{debug, warn};

use super::error::{ProviderError, ProviderResult};
use super::message::{ActiveSubscribersPage, UpsertRequest};
use super::ListProvider;
use crate::config::{Config, Credentials};
use crate::models::{Subscriber, SubscriberSet};

/// Largest page size the active subscribers endpoint accepts
const PAGE_SIZE: u32 = 1000;

/// Client for one createsend subscriber list
pub struct CreatesendClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
}

impl CreatesendClient {
    /// Create a client for `base_url` (e.g. `https://api.createsend.com/api/v3.3`)
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sublist/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &Config) -> ProviderResult<Self> {
        let credentials = config.credentials()?;
        Self::new(&config.api_base_url, credentials, config.request_timeout())
    }

    fn active_url(&self) -> String {
        format!(
            "{}/lists/{}/active.json",
            self.base_url,
            self.credentials.list_id()
        )
    }

    fn subscribers_url(&self) -> String {
        format!(
            "{}/subscribers/{}.json",
            self.base_url,
            self.credentials.list_id()
        )
    }

    async fn fetch_page(&self, page: u32) -> ProviderResult<ActiveSubscribersPage> {
        let response = self
            .http
            .get(self.active_url())
            .basic_auth(self.credentials.api_key(), Some("x"))
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .query(&[("page", page), ("pagesize", PAGE_SIZE)])
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ListProvider for CreatesendClient {
    async fn list_active(&self) -> ProviderResult<SubscriberSet> {
        let mut subscribers = Vec::new();
        let mut page = 1;

        loop {
            let current = self.fetch_page(page).await?;
            let received = current.results.len();
            let has_more = current.has_more();
            subscribers.extend(current.results);

            if !has_more || received == 0 {
                break;
            }
            page += 1;
        }

        debug!("Read {} active subscribers ({} page(s))", subscribers.len(), page);
        Ok(SubscriberSet::from(subscribers))
    }

    async fn upsert(&self, subscriber: &Subscriber) -> ProviderResult<serde_json::Value> {
        let response = self
            .http
            .post(self.subscribers_url())
            .basic_auth(self.credentials.api_key(), Some("x"))
            .json(&UpsertRequest::new(subscriber))
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        // Pass the body through; fall back to a plain string if it isn't JSON
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }

    async fn remove(&self, email: &str) -> ProviderResult<()> {
        let response = self
            .http
            .delete(self.subscribers_url())
            .basic_auth(self.credentials.api_key(), Some("x"))
            .query(&[("email", email)])
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

/// Turn a non-success response into [`ProviderError::Status`]
async fn check_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("Provider returned {} for {}", status, truncate_body(&body));
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
