use async_trait::async_trait;
use redsift_core::FetchError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Raw response as seen by the retry loop.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport capability injected into the fetcher so tests can script
/// response sequences without a live server.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, FetchError>;
}

/// Production transport: reqwest with a descriptive User-Agent and a bounded
/// per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempt ceiling per fetch, including the first attempt.
    pub max_retries: u32,
    /// Backoff before the second attempt; doubles after every rate-limited
    /// attempt.
    pub initial_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(10),
        }
    }
}

/// GET-and-parse with tolerance for upstream rate limiting.
///
/// Only HTTP 429 is retried; the backoff schedule is deterministic: attempt k
/// (1-indexed) waits `initial_backoff * 2^(k-1)` before the next attempt, and
/// there is no wait before the first attempt or after the last.
pub struct ResilientFetcher<T> {
    transport: T,
    config: RetryConfig,
    cancel: CancellationToken,
}

impl<T: HttpTransport> ResilientFetcher<T> {
    pub fn new(transport: T, config: RetryConfig) -> Self {
        Self::with_cancellation(transport, config, CancellationToken::new())
    }

    pub fn with_cancellation(transport: T, config: RetryConfig, cancel: CancellationToken) -> Self {
        Self {
            transport,
            config,
            cancel,
        }
    }

    pub fn transport_ref(&self) -> &T {
        &self.transport
    }

    pub async fn fetch_json<D: DeserializeOwned>(&self, url: &str) -> Result<D, FetchError> {
        let mut backoff = self.config.initial_backoff;

        for attempt in 1..=self.config.max_retries {
            let response = self.transport.get(url).await?;

            if response.status == HTTP_TOO_MANY_REQUESTS {
                if attempt == self.config.max_retries {
                    break;
                }
                warn!(
                    attempt,
                    url,
                    backoff_secs = backoff.as_secs_f64(),
                    "rate limited, backing off"
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = sleep(backoff) => {}
                }
                backoff *= 2;
                continue;
            }

            if !response.is_success() {
                return Err(FetchError::Upstream {
                    status: response.status,
                });
            }

            debug!(url, attempt, "fetched");
            return serde_json::from_str(&response.body).map_err(|e| {
                FetchError::MalformedResponse {
                    details: e.to_string(),
                }
            });
        }

        Err(FetchError::ExhaustedRetries {
            url: url.to_string(),
            attempts: self.config.max_retries,
        })
    }
}
