pub mod auth;
pub mod directory;
pub mod groups;
pub mod mail;
pub mod sharepoint;

use crate::config::ConfigManager;
use crate::error::{ReviewError, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Default retry configuration
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30000;
const JITTER_FACTOR: f64 = 0.3; // +/- 30% jitter

/// Calculate backoff with jitter for exponential backoff
fn calculate_backoff_with_jitter(attempt: u32) -> Duration {
    let base_backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt);
    let capped_backoff = base_backoff.min(MAX_BACKOFF_MS);

    let jitter_range = (capped_backoff as f64 * JITTER_FACTOR) as u64;
    let jitter = if jitter_range > 0 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::time::SystemTime::now().hash(&mut hasher);
        (hasher.finish() % (jitter_range * 2)) as i64 - jitter_range as i64
    } else {
        0
    };

    let final_backoff = (capped_backoff as i64 + jitter).max(100) as u64;
    Duration::from_millis(final_backoff)
}

/// Graph API client with retry support
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    access_token: String,
    base_url: String,
}

impl GraphClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: GRAPH_API_BASE.to_string(),
        }
    }

    /// Point the client at another host; requests go to `{root}/v1.0`
    pub fn with_base_url(mut self, root: &str) -> Self {
        self.base_url = format!("{}/v1.0", root.trim_end_matches('/'));
        self
    }

    /// Create a GraphClient for a configured tenant
    pub fn from_config(config: &ConfigManager, tenant_name: &str) -> Result<Self> {
        let access_token = auth::resolve_access_token(config, tenant_name)?;
        Ok(Self::new(access_token))
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Send a request, retrying on 429, 5xx and connection errors
    ///
    /// `build` is invoked once per attempt since a RequestBuilder is consumed by `send`.
    async fn send_with_retry<F>(&self, label: &str, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match build().bearer_auth(&self.access_token).send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(INITIAL_BACKOFF_MS / 1000);

                        tracing::warn!(
                            "{} {} rate limited (429), retrying in {}s (attempt {}/{})",
                            label,
                            url,
                            retry_after,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(Duration::from_secs(retry_after)).await;
                        continue;
                    }

                    if status.is_server_error() && attempt < MAX_RETRIES - 1 {
                        let wait_time = calculate_backoff_with_jitter(attempt);
                        tracing::warn!(
                            "{} {} server error ({}), retrying in {:?} (attempt {}/{})",
                            label,
                            url,
                            status,
                            wait_time,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(wait_time).await;
                        continue;
                    }

                    if !status.is_success() {
                        let error_text = resp.text().await.unwrap_or_default();
                        let enhanced_error = crate::error::enhance_graph_error(&error_text);
                        return Err(ReviewError::GraphApiError(format!(
                            "HTTP {}: {}",
                            status, enhanced_error
                        )));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    if attempt < MAX_RETRIES - 1 {
                        let wait_time = calculate_backoff_with_jitter(attempt);
                        tracing::warn!(
                            "{} {} connection error: {}, retrying in {:?} (attempt {}/{})",
                            label,
                            url,
                            e,
                            wait_time,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(wait_time).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map(|e| e.into()).unwrap_or_else(|| {
            ReviewError::GraphApiError(format!(
                "{} {} failed after {} retries",
                label, url, MAX_RETRIES
            ))
        }))
    }

    /// GET from the v1.0 endpoint
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = self.url(endpoint);
        self.get_url(&url).await
    }

    /// GET an absolute URL (used for following nextLink)
    async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!("GET {}", url);
        let resp = self
            .send_with_retry("GET", url, || self.client.get(url))
            .await?;
        Ok(resp.json::<T>().await?)
    }

    /// POST to the v1.0 endpoint and decode the response body
    pub async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R> {
        let url = self.url(endpoint);
        tracing::debug!("POST {}", url);
        let resp = self
            .send_with_retry("POST", &url, || self.client.post(&url).json(body))
            .await?;
        Ok(resp.json::<R>().await?)
    }

    /// POST to the v1.0 endpoint where Graph answers 202/204 with no body
    pub async fn post_no_content<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<()> {
        let url = self.url(endpoint);
        tracing::debug!("POST {}", url);
        self.send_with_retry("POST", &url, || self.client.post(&url).json(body))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Pagination Helpers
// ============================================================================

/// Generic paginated response from Graph API
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl GraphClient {
    /// Fetch all pages of a v1.0 endpoint, following `@odata.nextLink`
    pub async fn get_all_pages<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let url = self.url(endpoint);
        self.get_all_pages_from(url).await
    }

    async fn get_all_pages_from<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>> {
        let mut all_items: Vec<T> = Vec::new();
        let mut current_url = first_url;

        loop {
            let response: PaginatedResponse<T> = self.get_url(&current_url).await?;
            all_items.extend(response.value);

            match response.next_link {
                Some(next) => current_url = next,
                None => break,
            }
        }

        Ok(all_items)
    }
}
