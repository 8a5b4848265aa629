//! HTTP client utilities.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::HttpConfig;
use crate::sources::SourceError;
use crate::utils::retry::{with_retry, RetryConfig};

/// Longest slice of an error body kept in [`SourceError::Api`] messages
const MAX_ERROR_BODY: usize = 200;

/// Shared HTTP client with sensible defaults, an optional per-source rate
/// limit and retry of transient failures
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    retry: RetryConfig,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("rate_limited", &self.limiter.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

impl HttpClient {
    /// Create a new HTTP client from the `[http]` settings
    pub fn new(config: &HttpConfig) -> Result<Self, SourceError> {
        let user_agent = config.user_agent.clone().unwrap_or_else(|| {
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
        });

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;

        let retry = RetryConfig::default()
            .max_attempts(config.max_attempts)
            .initial_delay(Duration::from_millis(config.retry_initial_delay_ms));

        Ok(Self {
            client: Arc::new(client),
            limiter: None,
            retry,
        })
    }

    /// Limit outgoing requests to `requests_per_second`; zero or negative disables limiting
    pub fn with_rate_limit(mut self, requests_per_second: f64) -> Self {
        if requests_per_second > 0.0 {
            // Periods too long for a Duration (or too short for governor) fall back to 1 rps
            let quota = Duration::try_from_secs_f64(1.0 / requests_per_second)
                .ok()
                .and_then(Quota::with_period)
                .unwrap_or_else(|| {
                    tracing::warn!(
                        "Unusable rate limit of {} requests/s, using 1 request/s",
                        requests_per_second
                    );
                    Quota::per_second(nonzero!(1u32))
                });
            self.limiter = Some(Arc::new(RateLimiter::direct(quota)));
        } else {
            self.limiter = None;
        }
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// GET a URL and return the body as text, retrying transient failures
    pub async fn get_text(&self, url: &Url) -> Result<String, SourceError> {
        with_retry(self.retry, move || self.get_once(url)).await
    }

    /// GET a URL and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, SourceError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(SourceError::from)
    }

    async fn get_once(&self, url: &Url) -> Result<String, SourceError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        tracing::trace!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        Ok(body)
    }
}

/// Map a non-success status to a [`SourceError`]
pub fn status_error(status: StatusCode, body: &str) -> SourceError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return SourceError::RateLimited;
    }

    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown status").to_string()
    } else {
        body.trim().chars().take(MAX_ERROR_BODY).collect()
    };

    SourceError::Api {
        status: status.as_u16(),
        message,
    }
}
