//! HTTP fetch client with identity rotation, pacing and retry/backoff
//!
//! Every outbound request goes through [`FetchClient::fetch`]: it picks the
//! next identity from the rotation pool, sleeps a uniform random delay, and
//! issues the request through an injectable [`Transport`]. Throttling-class
//! statuses and network failures retry with capped exponential backoff;
//! other client errors surface immediately.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, header};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::infrastructure::config::FetchPolicy;

/// Errors surfaced by the fetch client after its internal retry discipline.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("retry budget exhausted after {retries} retries: {url}")]
    Exhausted { retries: u32, url: String },
}

/// Failure of a single transport-level attempt, before retry policy.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// Raw response from one transport attempt.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The wire seam. Production uses [`ReqwestTransport`]; tests inject
/// scripted transports for deterministic retry and pagination scenarios.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, identity: &str) -> Result<TransportResponse, TransportError>;
}

/// Transport backed by a shared `reqwest::Client`. The identity is applied
/// per request so the rotation pool stays in control of the header.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout_seconds: u64) -> anyhow::Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(timeout_seconds))
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, identity: &str) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, identity)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?
            .to_vec();

        Ok(TransportResponse { status, body })
    }
}

/// Successful fetch result.
#[derive(Debug, Clone)]
pub struct Payload {
    pub status: u16,
    body: Vec<u8>,
}

impl Payload {
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Round-robin identity rotation state.
///
/// Owned by the fetch client and safe to share between concurrently
/// running extractors; round-robin over an atomic cursor guarantees the
/// same identity is never used on two consecutive calls when the pool
/// holds more than one entry.
#[derive(Debug)]
pub struct IdentityPool {
    identities: Vec<String>,
    cursor: AtomicUsize,
}

const FALLBACK_IDENTITY: &str = "ecom-harvest/0.2";

impl IdentityPool {
    pub fn new(identities: Vec<String>) -> Self {
        let identities = if identities.is_empty() {
            vec![FALLBACK_IDENTITY.to_string()]
        } else {
            identities
        };
        Self {
            identities,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn next(&self) -> &str {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.identities.len();
        &self.identities[index]
    }
}

/// Run-level request counters, shareable across fetch clients so the
/// pipeline can report one success rate for the whole run.
#[derive(Debug, Default)]
pub struct RequestCounters {
    attempted: AtomicU64,
    succeeded: AtomicU64,
}

impl RequestCounters {
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.attempted.load(Ordering::Relaxed),
            self.succeeded.load(Ordering::Relaxed),
        )
    }
}

/// HTTP fetch client implementing the anti-blocking and retry discipline.
#[derive(Clone)]
pub struct FetchClient {
    policy: FetchPolicy,
    transport: Arc<dyn Transport>,
    identities: Arc<IdentityPool>,
    counters: Arc<RequestCounters>,
}

impl FetchClient {
    pub fn new(policy: FetchPolicy, transport: Arc<dyn Transport>) -> Self {
        let identities = Arc::new(IdentityPool::new(policy.identities.clone()));
        Self {
            policy,
            transport,
            identities,
            counters: Arc::new(RequestCounters::default()),
        }
    }

    /// Replace the rotation state, e.g. to share one pool between the two
    /// extractors' clients.
    pub fn with_identity_pool(mut self, pool: Arc<IdentityPool>) -> Self {
        self.identities = pool;
        self
    }

    /// Share request counters across clients for run-level statistics.
    pub fn with_counters(mut self, counters: Arc<RequestCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn counters(&self) -> Arc<RequestCounters> {
        Arc::clone(&self.counters)
    }

    /// Fetch a URL under the configured policy.
    ///
    /// Retries timeouts, network errors and throttling-class statuses
    /// (408/429/5xx) up to `max_retries` times with capped exponential
    /// backoff, then returns [`FetchError::Exhausted`]. Other 4xx statuses
    /// are surfaced immediately without retry.
    pub async fn fetch(&self, url: &str) -> Result<Payload, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            let identity = self.identities.next();
            self.pace().await;
            self.counters.attempted.fetch_add(1, Ordering::Relaxed);

            match self.transport.get(url, identity).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(url, attempt = attempt + 1, "fetch succeeded");
                    return Ok(Payload {
                        status: response.status,
                        body: response.body,
                    });
                }
                Ok(response) => {
                    let status = response.status;
                    if !is_retryable_status(status) {
                        return Err(FetchError::HttpStatus {
                            status,
                            url: url.to_string(),
                        });
                    }
                    warn!(url, status, attempt = attempt + 1, "retryable HTTP status");
                    if attempt >= self.policy.max_retries {
                        return Err(self.exhausted(url, TransportError::Network(format!(
                            "HTTP {status}"
                        ))));
                    }
                }
                Err(error) => {
                    warn!(url, attempt = attempt + 1, %error, "transport failure");
                    if attempt >= self.policy.max_retries {
                        return Err(self.exhausted(url, error));
                    }
                }
            }

            attempt += 1;
            sleep(self.backoff_delay(attempt)).await;
        }
    }

    /// Maps a final failure to the surfaced error. With a zero retry budget
    /// there is nothing to exhaust, so the concrete failure comes through.
    fn exhausted(&self, url: &str, last: TransportError) -> FetchError {
        if self.policy.max_retries == 0 {
            if let TransportError::Timeout = last {
                return FetchError::Timeout {
                    url: url.to_string(),
                };
            }
        }
        FetchError::Exhausted {
            retries: self.policy.max_retries,
            url: url.to_string(),
        }
    }

    /// Deliberate pre-request delay, uniform within the configured bounds.
    async fn pace(&self) {
        let (min, max) = (self.policy.delay_min_ms, self.policy.delay_max_ms);
        if max == 0 {
            return;
        }
        let delay_ms = if min >= max { min } else { fastrand::u64(min..=max) };
        if delay_ms > 0 {
            debug!(delay_ms, "pacing before request");
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    /// Capped exponential backoff for retry `attempt` (1-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .policy
            .backoff_base_ms
            .saturating_mul(1u64 << (attempt - 1).min(16));
        Duration::from_millis(exp.min(self.policy.backoff_max_ms))
    }
}

/// Throttling and transient server failures are worth retrying; other
/// client errors are not.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}
