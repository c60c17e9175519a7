//! Shared HTTP plumbing for platform clients

use std::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::core::config::NetworkConfig;
use crate::core::{PackwrightError, PackwrightResult};
use crate::platform::Platform;

const RETRY_BASE_DELAY_MS: u64 = 500;

/// JSON API client with retry on connection-level failures
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    platform: Platform,
    retries: u32,
}

impl ApiClient {
    /// Build a client sending the configured user agent plus any extra headers
    pub fn new(platform: Platform, network: &NetworkConfig, extra: HeaderMap) -> PackwrightResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(&network.user_agent)
            .map_err(|e| PackwrightError::config(format!("Invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, agent);
        headers.extend(extra);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(network.timeout))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| PackwrightError::Network(e.to_string()))?;

        Ok(Self {
            client,
            platform,
            retries: network.retries,
        })
    }

    /// GET a URL and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> PackwrightResult<T> {
        let text = self
            .with_retry(url, || async { self.client.get(url).send().await })
            .await?;
        self.decode(url, &text)
    }

    fn decode<T: DeserializeOwned>(&self, url: &str, text: &str) -> PackwrightResult<T> {
        serde_json::from_str(text).map_err(|e| {
            tracing::debug!("Body from {} (first 300 chars): {}", url, text.chars().take(300).collect::<String>());
            PackwrightError::platform(self.platform, format!("Invalid JSON from {}: {}", url, e))
        })
    }

    /// Send with exponential backoff on timeouts and connection errors.
    /// HTTP status errors are returned immediately.
    async fn with_retry<F, Fut>(&self, url: &str, send: F) -> PackwrightResult<String>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = RETRY_BASE_DELAY_MS * (1 << (attempt - 1));
                tracing::info!(
                    "Retrying {} request to {} (attempt {}/{}) after {}ms",
                    self.platform,
                    url,
                    attempt + 1,
                    self.retries + 1,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match send().await {
                Ok(response) => return self.read_body(url, response).await,
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect() || e.is_request();
                    if transient && attempt < self.retries {
                        tracing::warn!("{} request to {} failed: {}", self.platform, url, e);
                        attempt += 1;
                        continue;
                    }
                    if e.is_timeout() {
                        return Err(PackwrightError::Timeout);
                    }
                    return Err(PackwrightError::platform(
                        self.platform,
                        format!("Request to {} failed: {}", url, e),
                    ));
                }
            }
        }
    }

    async fn read_body(&self, url: &str, response: reqwest::Response) -> PackwrightResult<String> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PackwrightError::PackageNotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("{} returned HTTP {} for {}", self.platform, status, url);
            return Err(PackwrightError::platform(
                self.platform,
                format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| PackwrightError::platform(self.platform, format!("Failed to read response: {}", e)))
    }
}
