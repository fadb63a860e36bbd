//! Shared HTTP plumbing for the provider clients.
//!
//! Each provider gets its own `HttpClient` with a base URL and timeout.
//! Requests are sent once; callers decide what a failure means. Batch
//! processors log it and move on to the next row.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use fp_core::error::{FpError, FpResult};

/// Thin wrapper around `reqwest::Client` bound to one provider.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    /// Provider name used in error messages and logs.
    provider: &'static str,
    /// Base URL without a trailing slash.
    base_url: String,
    timeout: Duration,
}

impl HttpClient {
    /// Build a client for `provider` rooted at `base_url`.
    pub fn new(provider: &'static str, base_url: &str, timeout_ms: u64) -> FpResult<Self> {
        let timeout = Duration::from_millis(timeout_ms);
        let inner = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("fencepost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FpError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for a path. Absolute URLs (pagination links) pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Start a request; the caller adds auth, headers and body.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{} {} {}", self.provider, method, url);
        self.inner.request(method, url).timeout(self.timeout)
    }

    /// Send a request and convert transport and status failures to FpError.
    pub async fn send(&self, builder: RequestBuilder) -> FpResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify_error(e))?;
        self.check_status(response).await
    }

    /// Send and deserialize the JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> FpResult<T> {
        let response = self.send(builder).await?;
        response.json::<T>().await.map_err(|e| {
            FpError::Serialization(format!("failed to parse {} response: {e}", self.provider))
        })
    }

    /// Check the HTTP status code and convert to FpError if needed.
    async fn check_status(&self, response: Response) -> FpResult<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FpError::AuthFailed(format!("{} returned {status}", self.provider)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FpError::Provider {
                provider: self.provider,
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        Ok(response)
    }

    /// Classify a reqwest error into an FpError variant.
    fn classify_error(e: reqwest::Error) -> FpError {
        if e.is_timeout() {
            FpError::Timeout(e.to_string())
        } else if e.is_connect() {
            FpError::Http(format!("connection failed: {e}"))
        } else {
            FpError::Http(e.to_string())
        }
    }
}

/// Pull a readable message out of a provider error body. Twilio uses
/// `message`, Basiq nests errors under `data[].detail`.
fn extract_error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    if let Some(msg) = json.get("message").and_then(|v| v.as_str()) {
        return msg.to_string();
    }
    if let Some(detail) = json
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|e| e.get("detail"))
        .and_then(|v| v.as_str())
    {
        return detail.to_string();
    }
    body.trim().to_string()
}
