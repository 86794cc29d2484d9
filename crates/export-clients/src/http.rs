//! Small retrying HTTP-call capability shared by the collaborator clients.
//!
//! Wraps a [`reqwest::Client`] with exponential backoff on transport errors
//! and 5xx responses. Clients receive a configured caller instead of
//! inheriting request plumbing.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use export_common::{ExportError, ExportResult};

/// Retry policy for collaborator calls.
#[derive(Debug, Clone)]
pub struct HttpRetryConfig {
    /// Maximum number of attempts, including the first one.
    pub attempts: u32,
    /// Initial retry delay (doubles each retry).
    pub initial_delay: Duration,
    /// Maximum retry delay.
    pub max_delay: Duration,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// A base-url-bound HTTP caller with retry.
#[derive(Debug, Clone)]
pub struct HttpCaller {
    client: Client,
    base_url: String,
    retry: HttpRetryConfig,
}

impl HttpCaller {
    /// Create a caller bound to a collaborator base URL.
    pub fn new(
        base_url: impl Into<String>,
        retry: HttpRetryConfig,
        request_timeout: Duration,
    ) -> ExportResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ExportError::Collaborator(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// GET a JSON document. An empty body maps to `None`.
    pub async fn get_json<T, Q>(&self, path: &str, query: Option<&Q>) -> ExportResult<Option<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        let response = self
            .send_with_retry(|| {
                let mut request = self.client.get(&url);
                if let Some(query) = query {
                    request = request.query(query);
                }
                request
            })
            .await?;
        let response = Self::ensure_success(response, "GET", &url).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ExportError::Collaborator(format!("GET {} read failed: {}", url, e)))?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(None);
        }
        let parsed = serde_json::from_str(&body)
            .map_err(|e| ExportError::Collaborator(format!("GET {} parse failed: {}", url, e)))?;
        Ok(Some(parsed))
    }

    /// POST a JSON body and parse the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ExportResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .send_with_retry(|| self.client.post(&url).json(body))
            .await?;
        let response = Self::ensure_success(response, "POST", &url).await?;

        response
            .json()
            .await
            .map_err(|e| ExportError::Collaborator(format!("POST {} parse failed: {}", url, e)))
    }

    /// PUT a JSON body, discarding any response payload.
    pub async fn put_json<B>(&self, path: &str, body: &B) -> ExportResult<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let response = self
            .send_with_retry(|| self.client.put(&url).json(body))
            .await?;
        Self::ensure_success(response, "PUT", &url).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue a request, retrying transport errors and 5xx responses with
    /// exponential backoff.
    async fn send_with_retry<F>(&self, build: F) -> ExportResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = build().send().await;

            let retriable = match &result {
                Ok(response) => response.status().is_server_error(),
                Err(_) => true,
            };

            if !retriable || attempt >= self.retry.attempts {
                return result.map_err(|e| {
                    ExportError::Collaborator(format!(
                        "Request failed after {} attempts: {}",
                        attempt, e
                    ))
                });
            }

            match &result {
                Ok(response) => {
                    warn!(status = %response.status(), attempt, "Retrying failed request")
                }
                Err(err) => warn!(error = %err, attempt, "Retrying failed request"),
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(self.retry.max_delay);
        }
    }

    async fn ensure_success(response: Response, method: &str, url: &str) -> ExportResult<Response> {
        let status = response.status();
        if status.is_success() {
            debug!(%status, %url, "Collaborator call succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(ExportError::Collaborator(format!(
                "{} {} returned 404: {}",
                method, url, body
            )));
        }
        Err(ExportError::Collaborator(format!(
            "{} {} returned {}: {}",
            method, url, status, body
        )))
    }
}
