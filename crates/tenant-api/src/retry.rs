//! Retry logic for HTTP requests with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{ApiError, Error, Result};

/// Default initial backoff duration for retries (1 second).
pub(crate) const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;

/// Default maximum backoff duration for retries (30 seconds).
pub(crate) const DEFAULT_MAX_BACKOFF_SECS: u64 = 30;

/// Default maximum number of retry attempts.
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;

/// Configuration for retry behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RetryConfig {
    /// Maximum number of retry attempts after the first request.
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single backoff.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
        }
    }
}

impl RetryConfig {
    /// Calculates the backoff duration for a retry attempt.
    ///
    /// A `retry_after` from a 429 response wins; otherwise the backoff is
    /// `initial * 2^attempt`. Both are capped at `max_backoff`.
    pub fn calculate_backoff(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let backoff = match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                self.initial_backoff.saturating_mul(factor)
            }
        };
        backoff.min(self.max_backoff)
    }
}

/// What to do with one attempt's outcome.
enum RetryDecision {
    /// The response has a success status.
    Success(reqwest::Response),
    /// Try again after the backoff.
    Retry { retry_after: Option<u64> },
}

fn retry_after_header(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

async fn decide(
    outcome: Result<reqwest::Response>,
    attempt: u32,
    max_retries: u32,
) -> Result<RetryDecision> {
    let can_retry = attempt < max_retries;

    let response = match outcome {
        Ok(response) => response,
        Err(e) if can_retry && e.is_retryable() => {
            debug!(attempt, error = %e, "tenant service request failed, retrying");
            return Ok(RetryDecision::Retry { retry_after: None });
        }
        Err(Error::Http(e)) if e.is_connect() || e.is_timeout() => {
            return Err(Error::Api(ApiError::Network {
                message: e.to_string(),
            }))
        }
        Err(e) => return Err(e),
    };

    let status = response.status();
    if status.is_success() {
        return Ok(RetryDecision::Success(response));
    }

    if status.as_u16() == 429 && can_retry {
        let retry_after = retry_after_header(&response);
        debug!(attempt, ?retry_after, "tenant service rate limited, retrying");
        return Ok(RetryDecision::Retry { retry_after });
    }

    Err(parse_error_response(response).await)
}

/// Parses an error response into our error types.
pub(crate) async fn parse_error_response(response: reqwest::Response) -> Error {
    let status = response.status();
    let status_code = status.as_u16();
    let retry_after = retry_after_header(&response);
    let path = response.url().path().to_string();

    let message = response.text().await.unwrap_or_default();
    let message_or = |fallback: &str| {
        if message.is_empty() {
            fallback.to_string()
        } else {
            message.clone()
        }
    };

    let api_error = match status_code {
        401 | 403 => ApiError::Auth {
            message: message_or("access denied"),
        },
        404 => ApiError::NotFound {
            resource: "tenant".to_string(),
            id: path.rsplit('/').next().unwrap_or_default().to_string(),
        },
        429 => ApiError::RateLimit { retry_after },
        400 | 422 => ApiError::Validation {
            message: message_or("bad request"),
        },
        _ => ApiError::Http {
            status: status_code,
            message: message_or(status.canonical_reason().unwrap_or("unknown error")),
        },
    };

    Error::Api(api_error)
}

/// Sends a request until it succeeds, fails permanently, or retries run out.
///
/// 429 responses and connection failures are retried. Returns the first
/// response with a success status.
pub(crate) async fn execute_with_retry<F, Fut>(
    config: &RetryConfig,
    mut make_request: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response>>,
{
    for attempt in 0..=config.max_retries {
        let outcome = make_request().await;
        match decide(outcome, attempt, config.max_retries).await? {
            RetryDecision::Success(response) => return Ok(response),
            RetryDecision::Retry { retry_after } => {
                let backoff = config.calculate_backoff(attempt, retry_after);
                sleep(backoff).await;
            }
        }
    }

    warn!(
        retries = config.max_retries,
        "tenant service retries exhausted"
    );
    Err(Error::Api(ApiError::RateLimit { retry_after: None }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let config = RetryConfig::default();
        assert_eq!(config.calculate_backoff(0, None), Duration::from_secs(1));
        assert_eq!(config.calculate_backoff(1, None), Duration::from_secs(2));
        assert_eq!(config.calculate_backoff(3, None), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(
            config.calculate_backoff(10, None),
            Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS)
        );
        assert_eq!(
            config.calculate_backoff(40, None),
            Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS)
        );
        assert_eq!(
            config.calculate_backoff(0, Some(120)),
            Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS)
        );
    }

    #[test]
    fn test_retry_after_wins() {
        let config = RetryConfig::default();
        assert_eq!(config.calculate_backoff(2, Some(5)), Duration::from_secs(5));
    }

    #[test]
    fn test_millisecond_backoff() {
        let config = RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(25),
        };
        assert_eq!(config.calculate_backoff(0, None), Duration::from_millis(10));
        assert_eq!(config.calculate_backoff(1, None), Duration::from_millis(20));
        assert_eq!(config.calculate_backoff(2, None), Duration::from_millis(25));
    }
}
