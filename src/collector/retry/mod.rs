
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::RetryConfig;

/// When and how long to wait before re-issuing a failed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; zero disables retrying
    pub max_retries: u32,
    /// Delay before the first retry, doubled for every further retry
    pub backoff: Duration,
    pub max_backoff: Duration,
    pub retry_statuses: BTreeSet<u16>,
    pub respect_retry_after: bool,
    /// Only these methods are ever retried
    pub retry_methods: BTreeSet<&'static str>,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    #[inline]
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            retry_statuses: config.retry_statuses.iter().copied().collect(),
            respect_retry_after: config.respect_retry_after,
            retry_methods: ["GET", "HEAD"].into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first failure
    #[inline]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    #[inline]
    pub fn permits_method(&self, method: &str) -> bool {
        self.retry_methods.contains(method)
    }

    /// Exponential backoff for the given retry number (1-based)
    #[inline]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let factor = 2_u32.saturating_pow(exponent);
        self.backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Delay before the given retry, preferring a server-provided `Retry-After`
    #[inline]
    pub fn delay_for(&self, retry: u32, retry_after: Option<&str>) -> Duration {
        if self.respect_retry_after {
            if let Some(delay) = retry_after.and_then(|value| parse_retry_after(value, Utc::now()))
            {
                return delay.min(self.max_backoff);
            }
        }
        self.backoff_for(retry)
    }
}

/// Parse a `Retry-After` header given either as delta-seconds or as an HTTP date
#[inline]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let when = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        when.with_timezone(&Utc)
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}
