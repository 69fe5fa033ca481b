//! Caller-side retries with exponential backoff
//!
//! The transport never retries on its own. Wrap a call in
//! [`retry_transient`] to retry rate limits, server errors and dropped
//! connections, or in [`retry_with_backoff`] to retry every failure.
//!
//! ```rust,no_run
//! use openrouter_agent::retry::{RetryConfig, retry_transient};
//! use openrouter_agent::{Message, Request, RouterClient, render_messages};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RouterClient::from_env()?;
//! let request = Request::chat(
//!     "meta-llama/llama-3.2-1b-instruct",
//!     render_messages(&[Message::user("Hello")]),
//! );
//!
//! let config = RetryConfig::default()
//!     .with_max_attempts(4)
//!     .with_initial_delay(Duration::from_millis(500));
//!
//! let response = retry_transient(config, || client.fetch_chat_completions(&request)).await?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Backoff policy
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first (at least 1)
    pub max_attempts: u32,

    pub initial_delay: Duration,

    pub max_delay: Duration,

    /// Delay growth per attempt (2.0 doubles it)
    pub backoff_multiplier: f64,

    /// Random spread around each delay, 0.0 to 1.0
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt + 1`: exponential, capped, jittered.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let cap_ms = self.max_delay.as_millis() as f64;
        let delay_ms = (base_ms * self.backoff_multiplier.powi(attempt as i32)).min(cap_ms);

        let spread = delay_ms * self.jitter_factor;
        let jittered = delay_ms - spread / 2.0 + rand::random::<f64>() * spread;

        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// True for failures worth another attempt.
///
/// Rate limits (429), server errors (5xx), network failures and broken
/// streams are transient. Client errors, bad payloads, cancellation and
/// everything tool-related are not.
pub fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Http(_) => true,
        Error::Transport { status, .. } => *status == 429 || *status >= 500,
        Error::Protocol(_) => true,
        _ => false,
    }
}

/// Retry every failure until `config.max_attempts` is used up.
pub async fn retry_with_backoff<F, Fut, T>(config: RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(config, |_| true, operation).await
}

/// Retry only failures that [`is_retryable_error`] accepts.
pub async fn retry_transient<F, Fut, T>(config: RetryConfig, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_when(config, is_retryable_error, operation).await
}

/// Retry failures for which `should_retry` returns true; return others at once.
pub async fn retry_when<F, Fut, T, P>(
    config: RetryConfig,
    should_retry: P,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts || !should_retry(&err) {
                    return Err(err);
                }

                let delay = config.delay_for(attempt - 1);
                log::debug!(
                    "attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    attempts,
                    err,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}
