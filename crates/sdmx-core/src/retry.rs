//! Retry logic with exponential backoff and jitter.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses the same delay between every retry.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is `base * factor^attempt`, capped at `max`.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Multiplicative factor applied per further retry.
        factor: f64,
        /// Upper bound on any single delay.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(3),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    ///
    /// Jitter, when enabled, is applied after the cap, so a jittered delay
    /// can exceed `max` by up to half of it.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let mut delay = Duration::from_secs_f64(seconds.min(max.as_secs_f64()));

                if jitter {
                    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    let spread = millis / 2;
                    let offset = fastrand::u64(0..=spread * 2);
                    delay = Duration::from_millis((millis + offset).saturating_sub(spread));
                }

                delay
            }
        }
    }
}

/// Configuration of transport retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Enables or disables retries; disabled means exactly one attempt.
    pub enabled: bool,
    /// The maximum number of retries to attempt.
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// The backoff strategy to use between retries.
    pub backoff: Backoff,
    /// HTTP status codes that trigger a retry.
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Retry configuration with the default exponential backoff.
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Retry configuration waiting `delay` before each retry.
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Checks whether `status` is in [`RetryConfig::retry_on_status`].
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Executes `request`, retrying retryable transport errors and statuses.
    ///
    /// The last response or error is returned once retries are exhausted.
    pub fn execute(
        &self,
        client: &dyn HttpClient,
        request: &HttpRequest,
    ) -> Result<HttpResponse, HttpError> {
        let max_retries = if self.enabled { self.max_retries } else { 0 };
        let mut attempt = 0;
        loop {
            let outcome = client.execute(request.clone());
            let retry = match &outcome {
                Ok(response) => self.should_retry_status(response.status),
                Err(error) => error.retryable(),
            };
            if !retry || attempt >= max_retries {
                return outcome;
            }

            let delay = self.delay_for_attempt(attempt);
            match &outcome {
                Ok(response) => debug!(url = %request.url, status = response.status, attempt, ?delay, "retrying request"),
                Err(error) => debug!(url = %request.url, error = %error, attempt, ?delay, "retrying request"),
            }
            thread::sleep(delay);
            attempt += 1;
        }
    }
}
