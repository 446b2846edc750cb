use std::time::Duration;
use thiserror::Error;

pub mod retry;

/// Failure taxonomy for outbound service calls. Transient errors are
/// eligible for retry; everything else is handled per item by the caller.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("transient service error ({code}): {message}")]
    Transient { code: String, message: String },

    #[error("internal service error: {0}")]
    Internal(String),

    #[error("request validation rejected: {0}")]
    Validation(String),

    #[error("service call failed: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transient { .. })
    }

    pub fn other<E: std::fmt::Display>(e: E) -> Self {
        ServiceError::Other(e.to_string())
    }
}

/// Bounded exponential backoff parameters for a retried call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub tries: u32,
    pub backoff: f64,
    pub jitter: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    // 5 tries, x1.5 growth, fixed 5s jitter per retry, capped at 60s.
    fn default() -> Self {
        RetryPolicy {
            tries: 5,
            backoff: 1.5,
            jitter: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Sleep durations between attempts: delay(n+1) = min(cap, delay(n) * backoff + jitter),
    /// starting from zero. One entry per retry, so `tries - 1` entries total.
    pub fn delays(&self) -> Vec<Duration> {
        let mut out = Vec::new();
        let mut delay = 0f64;
        for _ in 1..self.tries {
            delay = (delay * self.backoff + self.jitter.as_secs_f64())
                .min(self.max_delay.as_secs_f64());
            out.push(Duration::from_secs_f64(delay));
        }
        out
    }
}
