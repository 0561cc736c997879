//! Page fetching behind a swappable source, with retry and backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

use crate::document::FetchedPage;

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "mintcrawl/0.1 (+https://github.com/mintcrawl/mintcrawl)";

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),
    /// The request did not finish within the timeout.
    #[error("request timed out")]
    Timeout,
    /// Connection, TLS or body read failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// 429, 5xx and transport-level failures are worth another attempt.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Status(code) => *code == 429 || (500..600).contains(code),
            Self::Timeout | Self::Transport(_) => true,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Anything that can produce a page body for a URL.
#[async_trait(?Send)]
pub trait PageSource {
    /// Fetches `url` once.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// [`PageSource`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Builds a client with the given user agent and per-request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Ok(FetchedPage::new(url.clone(), status.as_u16(), &body))
    }
}

/// Retry count and exponential backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_retries` retries after the first attempt.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (1-based): `base × 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            3,
            Duration::from_millis(1000),
            Duration::from_millis(10_000),
        )
    }
}

/// Final error of a fetch that never succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} after {attempts} attempt(s)")]
pub struct RetryFailure {
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Error from the last attempt.
    pub error: FetchError,
}

/// Fetches `url`, retrying retryable failures per `policy`.
///
/// Returns the page and the number of attempts it took.
pub async fn fetch_with_retry(
    source: &dyn PageSource,
    url: &Url,
    policy: &RetryPolicy,
) -> Result<(FetchedPage, u32), RetryFailure> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match source.fetch(url).await {
            Ok(page) => return Ok((page, attempt)),
            Err(error) => {
                let retries_used = attempt - 1;
                if !error.retryable() || retries_used >= policy.max_retries() {
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                    });
                }
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    %url,
                    %error,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying fetch"
                );
                sleep(delay).await;
            }
        }
    }
}
