use std::sync::atomic::Ordering;
use std::time::Duration;

use log::{debug, warn};
use rand::random_range;
use reqwest::header::HeaderMap;
use rustls::crypto::{CryptoProvider, ring};
use tokio::time::sleep;

use crate::config::HttpConfig;
use crate::error::FetchError;
use crate::metrics::METRICS;

/// ============================================================
/// RetryPolicy
/// ============================================================
///
/// Bounds the duration of a single logical GET.
///
/// - `max_attempts` counts the first attempt
/// - `timeout` applies to each attempt separately
/// - backoff before attempt n+1 is `n * backoff` plus jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &HttpConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            timeout: cfg.timeout(),
            backoff: Duration::from_millis(cfg.backoff_ms),
            jitter: Duration::from_millis(cfg.jitter_ms),
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(random_range(0..=jitter_ms))
        };
        self.backoff * attempt + jitter
    }
}

/// rustls >= 0.23 needs a process-wide CryptoProvider before the
/// first TLS handshake. Installing twice is a no-op.
pub fn install_crypto_provider() {
    let _ = CryptoProvider::install_default(ring::default_provider());
}

/// ============================================================
/// HttpFetcher
/// ============================================================
///
/// Bounded-retry HTTP GET shared by every adapter.
///
/// Behavior:
/// - 2xx short-circuits immediately with the body
/// - transport errors and non-2xx statuses are retried
/// - after `max_attempts`, the last error is returned wrapped
///   in `FetchError::Exhausted`
///
/// This type never inspects the body: an empty but successful
/// response is returned as-is and judged by the adapter's parser.
///
/// Cloning is cheap (the reqwest client is reference counted).
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(cfg: &HttpConfig) -> Result<Self, FetchError> {
        install_crypto_provider();

        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            policy: RetryPolicy::from_config(cfg),
        })
    }

    /// GET with the default headers.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.get_with_retry(url, &HeaderMap::new()).await
    }

    /// GET `url`, retrying per the configured policy.
    pub async fn get_with_retry(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<String, FetchError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            METRICS.http_attempts.fetch_add(1, Ordering::Relaxed);
            debug!("GET {} (attempt {}/{})", url, attempt, self.policy.max_attempts);

            let err = match self.attempt(url, headers).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            warn!(
                "attempt {}/{} for {} failed: {}",
                attempt, self.policy.max_attempts, url, err
            );
            METRICS.http_retries.fetch_add(1, Ordering::Relaxed);
            sleep(self.policy.delay_after(attempt)).await;
        }
    }

    async fn attempt(&self, url: &str, headers: &HeaderMap) -> Result<String, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .timeout(self.policy.timeout)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(request_error)
    }
}
