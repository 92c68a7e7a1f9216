use reqwest::Method;
use std::time::Duration;

use super::classify::Outcome;
use crate::config::Config;

/// Generic retry policy for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_retries, config.retry_base_delay_ms)
    }

    /// Network failures on idempotent methods and any 5xx are transient
    pub fn is_transient(outcome: &Outcome, method: &Method) -> bool {
        match outcome {
            Outcome::Success(_) => false,
            Outcome::Status { status, .. } => status.is_server_error(),
            Outcome::Network { .. } => is_idempotent(method),
        }
    }

    /// Whether attempt number `attempt` (0-based) may be followed by another
    pub fn should_retry(&self, outcome: &Outcome, method: &Method, attempt: u32) -> bool {
        attempt < self.max_retries && Self::is_transient(outcome, method)
    }

    /// Exponential backoff: base_delay * 2^attempt, plus up to 10% jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt.min(16)));
        let jitter = (delay as f64 * 0.1 * rand::random::<f64>()) as u64;
        Duration::from_millis(delay.saturating_add(jitter))
    }
}

pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}
