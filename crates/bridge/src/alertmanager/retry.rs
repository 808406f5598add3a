//! Backoff HTTP client
//!
//! Every call to an Alertmanager instance goes through [`BackoffClient::request`],
//! which retries with exponential backoff until the response satisfies the
//! method-specific success predicate or the time budget runs out. Responses
//! are buffered under the call deadline, so a backend that stalls mid-body
//! cannot hold a caller past it.

use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::{metrics, Error, Result};

/// Retry and timeout policy for a single logical request.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Total budget across all attempts of one logical call.
    pub max_elapsed_time: Duration,
    pub multiplier: f64,
    /// Jitter applied to each interval, as a fraction of it.
    pub randomization_factor: f64,
    /// Deadline for the whole call. No attempt is started or awaited past it.
    pub request_timeout: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(15),
            max_elapsed_time: Duration::from_secs(30),
            multiplier: 1.5,
            randomization_factor: 0.5,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Interval generator for one logical call.
#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    current: Duration,
    started: Instant,
}

impl ExponentialBackoff {
    pub fn new(policy: &BackoffPolicy) -> Self {
        Self {
            policy: policy.clone(),
            current: policy.initial_interval,
            started: Instant::now(),
        }
    }

    /// Returns the wait before the next attempt, or `None` once the elapsed
    /// budget would be exceeded by waiting.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.randomized(self.current);

        let grown = self.current.mul_f64(self.policy.multiplier);
        self.current = grown.min(self.policy.max_interval);

        if self.started.elapsed() + delay > self.policy.max_elapsed_time {
            return None;
        }
        Some(delay)
    }

    fn randomized(&self, interval: Duration) -> Duration {
        let factor = self.policy.randomization_factor;
        if factor <= 0.0 {
            return interval;
        }
        let delta = interval.mul_f64(factor);
        let low = interval.saturating_sub(delta);
        let high = interval + delta;
        if low >= high {
            return interval;
        }
        rand::thread_rng().gen_range(low..=high)
    }
}

/// Whether a response ends the retry loop.
///
/// GET only accepts 200. Mutating calls only reject 400 so that backends
/// answering with redirects or other non-error codes are not hammered.
pub fn is_accepted(method: &Method, status: StatusCode) -> bool {
    if *method == Method::GET {
        status == StatusCode::OK
    } else if *method == Method::POST || *method == Method::DELETE {
        status != StatusCode::BAD_REQUEST
    } else {
        true
    }
}

/// A fully read backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl BackendResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct BackoffClient {
    client: Client,
    policy: BackoffPolicy,
}

impl Default for BackoffClient {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl BackoffClient {
    pub fn new(policy: BackoffPolicy) -> Self {
        let client = Client::builder()
            .timeout(policy.request_timeout)
            .build()
            .unwrap_or_default();
        Self { client, policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Issue `method url` until it succeeds or the policy gives up.
    pub async fn request(&self, method: Method, url: &str) -> Result<BackendResponse> {
        let deadline = Instant::now() + self.policy.request_timeout;
        let mut backoff = ExponentialBackoff::new(&self.policy);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let err = match self.attempt(&method, url, deadline).await {
                Ok(response) => {
                    metrics::BACKEND_REQUESTS_TOTAL
                        .with_label_values(&[method.as_str(), "success"])
                        .inc();
                    return Ok(response);
                }
                Err(err) => err,
            };

            let next = backoff
                .next_backoff()
                .filter(|delay| Instant::now() + *delay < deadline);

            match next {
                Some(delay) => {
                    debug!(
                        "{} {} failed on attempt {} ({}), retrying in {:?}",
                        method, url, attempts, err, delay
                    );
                    metrics::BACKEND_RETRIES_TOTAL.inc();
                    tokio::time::sleep(delay).await;
                }
                None => {
                    metrics::BACKEND_REQUESTS_TOTAL
                        .with_label_values(&[method.as_str(), "failure"])
                        .inc();
                    return Err(Error::RetriesExhausted {
                        method: method.to_string(),
                        url: url.to_string(),
                        attempts,
                        last: Box::new(err),
                    });
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        deadline: Instant,
    ) -> Result<BackendResponse> {
        let exchange = async {
            let response = self.client.request(method.clone(), url).send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, Error>(BackendResponse {
                status,
                body: body.to_vec(),
            })
        };
        let response = match tokio::time::timeout_at(deadline, exchange).await {
            Ok(response) => response?,
            Err(_) => {
                return Err(Error::Transport(format!(
                    "deadline of {:?} exceeded",
                    self.policy.request_timeout
                )))
            }
        };

        if is_accepted(method, response.status) {
            return Ok(response);
        }
        Err(Error::BackendStatus {
            status: response.status.as_u16(),
            body: response.text(),
        })
    }
}
