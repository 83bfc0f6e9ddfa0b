//! HTTP access with exponential backoff retry logic.
//!
//! Every site adapter talks to the network through this module, one request at
//! a time.
//!
//! # Architecture
//!
//! - [`Fetch`]: core trait performing a single [`Request`]
//! - [`HttpFetcher`]: `reqwest` implementation sharing one connection pool
//! - [`RetryFetch`]: decorator that adds retry logic to any `Fetch` implementation
//!
//! # Retry Strategy
//!
//! - Transport errors, HTTP 429 and 5xx responses are retried
//! - Exponential backoff starting at the configured base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay
//!
//! Any other status is handed back to the caller: several comment APIs signal
//! the end of pagination with a 404.

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::Client;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// A single outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get {
        url: String,
    },
    Post {
        url: String,
        body: String,
        content_type: String,
    },
    Form {
        url: String,
        form: Vec<(String, String)>,
    },
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Request::Get { url: url.into() }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>, content_type: &str) -> Self {
        Request::Post {
            url: url.into(),
            body: body.into(),
            content_type: content_type.to_string(),
        }
    }

    pub fn form(url: impl Into<String>, form: &[(&str, &str)]) -> Self {
        Request::Form {
            url: url.into(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Request::Get { url } | Request::Post { url, .. } | Request::Form { url, .. } => url,
        }
    }
}

/// A response with its body already read as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body of a 2xx response, or [`Error::HttpStatus`].
    pub fn into_success(self) -> Result<String> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(Error::HttpStatus {
                url: self.url,
                status: self.status,
            })
        }
    }

    fn is_retryable(&self) -> bool {
        self.status == 429 || self.status >= 500
    }
}

/// Trait for performing HTTP requests.
pub trait Fetch {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// `reqwest`-backed fetcher. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(url = %request.url()))]
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let builder = match request {
            Request::Get { url } => self.client.get(url),
            Request::Post {
                url,
                body,
                content_type,
            } => self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body.clone()),
            Request::Form { url, form } => self.client.post(url).form(form),
        };
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Fetched");
        if status >= 400 {
            debug!(status, body = %truncate_for_log(&body, 200), "Error response body");
        }
        Ok(Response { url, status, body })
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`] implementation.
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..max_jitter)
/// ```
#[derive(Clone)]
pub struct RetryFetch<T> {
    /// The underlying fetcher to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: Duration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: Duration,
    max_jitter: Duration,
}

/// The client handed to site adapters.
pub type HttpClient = RetryFetch<HttpFetcher>;

impl HttpClient {
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(RetryFetch::new(
            HttpFetcher::new(config)?,
            config.max_retries,
            config.base_delay(),
        ))
    }
}

impl<T> RetryFetch<T>
where
    T: Fetch,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        delay + Duration::from_millis(jitter_ms)
    }

    /// GET a page and return its body, failing on any non-2xx status.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.fetch(&Request::get(url)).await?.into_success()
    }

    /// GET a page and return the response whatever its status.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.fetch(&Request::get(url)).await
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Fetch for RetryFetch<T>
where
    T: Fetch,
{
    #[instrument(level = "debug", skip_all, fields(url = %request.url()))]
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let outcome = self.inner.fetch(request).await;
            let reason = match &outcome {
                Ok(response) if !response.is_retryable() => return outcome,
                Ok(response) => format!("status {}", response.status),
                Err(Error::Http(e)) => e.to_string(),
                Err(_) => return outcome,
            };

            attempt += 1;
            if attempt > self.max_retries {
                error!(
                    attempt,
                    max = self.max_retries,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    %reason,
                    "fetch exhausted retries"
                );
                return outcome;
            }

            let delay = self.backoff(attempt);
            warn!(
                attempt,
                max = self.max_retries,
                ?delay,
                %reason,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Flaky {
        statuses: Vec<u16>,
        calls: Cell<usize>,
    }

    impl Fetch for Flaky {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            let i = self.calls.get();
            self.calls.set(i + 1);
            let status = *self.statuses.get(i).unwrap_or(&200);
            Ok(Response {
                url: request.url().to_string(),
                status,
                body: format!("call {i}"),
            })
        }
    }

    fn retrying(statuses: Vec<u16>, max_retries: usize) -> RetryFetch<Flaky> {
        let flaky = Flaky {
            statuses,
            calls: Cell::new(0),
        };
        RetryFetch::new(flaky, max_retries, Duration::from_millis(1)).with_max_jitter(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_retries_server_errors_until_success() {
        let api = retrying(vec![503, 429, 200], 5);
        let body = api.get_text("http://x/").await.unwrap();
        assert_eq!(body, "call 2");
        assert_eq!(api.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_not_found() {
        let api = retrying(vec![404], 5);
        let response = api.get("http://x/").await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(api.inner.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let api = retrying(vec![500, 500, 500, 500], 2);
        let err = api.get_text("http://x/").await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
        assert_eq!(api.inner.calls.get(), 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let api = retrying(vec![], 5);
        let api = RetryFetch {
            base_delay: Duration::from_secs(10),
            ..api
        };
        assert_eq!(api.backoff(1), Duration::from_secs(10));
        assert_eq!(api.backoff(2), Duration::from_secs(20));
        assert_eq!(api.backoff(3), Duration::from_secs(30));
        assert_eq!(api.backoff(40), Duration::from_secs(30));
    }

    #[test]
    fn test_request_url() {
        assert_eq!(Request::get("http://a").url(), "http://a");
        assert_eq!(Request::post("http://b", "{}", "application/graphql").url(), "http://b");
        assert_eq!(Request::form("http://c", &[("__a", "1")]).url(), "http://c");
    }
}
