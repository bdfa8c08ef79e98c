// Collector module
// Blocking client for the statistics API plus season/round discovery and the collection run

pub mod discovery;
pub mod retry;
pub mod session;


use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use ureq::Agent;

use self::retry::RetryPolicy;
use crate::config::ApiConfig;

pub use discovery::{Discovery, RoundEvents};
pub use session::{CollectError, CollectOptions, CollectReport, RoundRange, collect_matches};

const ACCEPT: &str = "application/json, text/plain, */*";

/// A request that still failed after the retry policy gave up
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Decode { .. } => None,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Outcome of an optional per-event fetch
#[derive(Debug)]
pub enum FieldFetch {
    Present(Value),
    /// The endpoint does not exist for this event (typical for unplayed matches)
    Absent,
    Failed(FetchError),
}

impl FieldFetch {
    #[inline]
    pub fn from_result(result: Result<Value, FetchError>) -> Self {
        match result {
            Ok(value) => Self::Present(value),
            Err(error) if error.is_not_found() => Self::Absent,
            Err(error) => Self::Failed(error),
        }
    }

    /// Collapse to an optional payload, logging why it is missing
    #[inline]
    pub fn into_value(self, what: &str, event_id: u64) -> Option<Value> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => {
                debug!("No {} for event {}", what, event_id);
                None
            }
            Self::Failed(error) => {
                warn!("Failed to fetch {} for event {}: {}", what, event_id, error);
                None
            }
        }
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

enum Attempt {
    Success(String),
    Retryable {
        error: FetchError,
        retry_after: Option<String>,
    },
    Fatal(FetchError),
}

/// HTTP client for the statistics API with retry, backoff and request pacing
#[derive(Debug, Clone)]
pub struct ApiClient {
    agent: Agent,
    base_url: String,
    accept_language: String,
    policy: RetryPolicy,
    pacing: Duration,
}

impl ApiClient {
    #[inline]
    pub fn new(config: &ApiConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .user_agent(&config.user_agent)
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            accept_language: config.accept_language.clone(),
            policy: config.retry_policy(),
            pacing: config.pacing(),
        }
    }

    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[inline]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[inline]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET a path below the base URL and decode the body as JSON
    #[inline]
    pub fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let can_retry = self.policy.permits_method("GET");
        let mut retry = 0;

        loop {
            match self.try_get(&url) {
                Attempt::Success(body) => {
                    if !self.pacing.is_zero() {
                        std::thread::sleep(self.pacing);
                    }
                    return serde_json::from_str(&body)
                        .map_err(|source| FetchError::Decode { url, source });
                }
                Attempt::Retryable { error, retry_after }
                    if can_retry && retry < self.policy.max_retries =>
                {
                    retry += 1;
                    let delay = self.policy.delay_for(retry, retry_after.as_deref());
                    warn!(
                        "{}, retry {}/{} in {:?}",
                        error, retry, self.policy.max_retries, delay
                    );
                    std::thread::sleep(delay);
                }
                Attempt::Retryable { error, .. } => {
                    error!("Giving up on {}: {}", url, error);
                    return Err(error);
                }
                Attempt::Fatal(error) => {
                    debug!("GET {} failed: {}", url, error);
                    return Err(error);
                }
            }
        }
    }

    fn try_get(&self, url: &str) -> Attempt {
        debug!("GET {}", url);

        let response = self
            .agent
            .get(url)
            .header("Accept", ACCEPT)
            .header("Accept-Language", &self.accept_language)
            .call();

        match response {
            Ok(mut response) => {
                let status = response.status().as_u16();
                if (200..300).contains(&status) {
                    return match response.body_mut().read_to_string() {
                        Ok(body) => Attempt::Success(body),
                        Err(e) => Attempt::Retryable {
                            error: FetchError::Transport {
                                url: url.to_string(),
                                message: format!("failed to read body: {}", e),
                            },
                            retry_after: None,
                        },
                    };
                }

                let error = FetchError::Status {
                    url: url.to_string(),
                    status,
                };
                if self.policy.is_retryable_status(status) {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|value| value.to_str().ok())
                        .map(ToString::to_string);
                    Attempt::Retryable { error, retry_after }
                } else {
                    Attempt::Fatal(error)
                }
            }
            Err(e) => {
                let retryable = matches!(
                    e,
                    ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_)
                );
                let error = FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                };
                if retryable {
                    Attempt::Retryable {
                        error,
                        retry_after: None,
                    }
                } else {
                    Attempt::Fatal(error)
                }
            }
        }
    }

    #[inline]
    pub fn seasons(&self, tournament_id: u64) -> Result<Value, FetchError> {
        self.get_json(&format!("/unique-tournament/{}/seasons", tournament_id))
    }

    #[inline]
    pub fn event(&self, event_id: u64) -> Result<Value, FetchError> {
        self.get_json(&format!("/event/{}", event_id))
    }

    #[inline]
    pub fn event_lineups(&self, event_id: u64) -> FieldFetch {
        FieldFetch::from_result(self.get_json(&format!("/event/{}/lineups", event_id)))
    }

    #[inline]
    pub fn event_statistics(&self, event_id: u64) -> FieldFetch {
        FieldFetch::from_result(self.get_json(&format!("/event/{}/statistics", event_id)))
    }

    #[inline]
    pub fn event_incidents(&self, event_id: u64) -> FieldFetch {
        FieldFetch::from_result(self.get_json(&format!("/event/{}/incidents", event_id)))
    }
}
