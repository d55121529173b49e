//! Error types for the tenant service client.

use std::fmt;

use thiserror::Error;

/// A specialized Result type for tenant service calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when calling the tenant service.
#[derive(Debug, Error)]
pub enum Error {
    /// The service answered with an error status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request could not be sent or the response could not be read.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body did not have the expected shape.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if the error is a 404 from the service.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api(ApiError::NotFound { .. }))
    }

    /// Returns true if repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(e) => e.is_retryable(),
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            Error::Json(_) => false,
        }
    }

    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Api(e) => e.exit_code(),
            Error::Http(_) => 3,
            Error::Json(_) => 2,
        }
    }
}

/// Error statuses reported by the tenant service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Unclassified HTTP error status.
    Http { status: u16, message: String },
    /// The service rejected our credentials.
    Auth { message: String },
    /// Too many requests.
    RateLimit { retry_after: Option<u64> },
    /// The addressed tenant does not exist.
    NotFound { resource: String, id: String },
    /// The service rejected the request body.
    Validation { message: String },
    /// Retries ran out on connection failures.
    Network { message: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http { status, message } => {
                write!(f, "tenant service error {}: {}", status, message)
            }
            ApiError::Auth { message } => write!(f, "tenant service refused access: {}", message),
            ApiError::RateLimit { retry_after } => match retry_after {
                Some(secs) => write!(f, "tenant service rate limited, retry after {} seconds", secs),
                None => write!(f, "tenant service rate limited"),
            },
            ApiError::NotFound { resource, id } => write!(f, "{} not found: {}", resource, id),
            ApiError::Validation { message } => {
                write!(f, "tenant service rejected the request: {}", message)
            }
            ApiError::Network { message } => write!(f, "tenant service unreachable: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Returns true if this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::RateLimit { .. } | ApiError::Network { .. })
    }

    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ApiError::Network { .. } => 3,
            ApiError::RateLimit { .. } => 4,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = ApiError::NotFound {
            resource: "tenant".to_string(),
            id: "T9".to_string(),
        };
        assert_eq!(error.to_string(), "tenant not found: T9");

        let error = ApiError::RateLimit {
            retry_after: Some(7),
        };
        assert!(error.to_string().contains("7 seconds"));

        let error = ApiError::Http {
            status: 502,
            message: "Bad Gateway".to_string(),
        };
        assert_eq!(error.to_string(), "tenant service error 502: Bad Gateway");
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::RateLimit { retry_after: None }.is_retryable());
        assert!(ApiError::Network {
            message: "reset".to_string()
        }
        .is_retryable());
        assert!(!ApiError::Validation {
            message: "bad".to_string()
        }
        .is_retryable());
        assert!(!ApiError::NotFound {
            resource: "tenant".to_string(),
            id: "T1".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            ApiError::Network {
                message: "timeout".to_string()
            }
            .exit_code(),
            3
        );
        assert_eq!(ApiError::RateLimit { retry_after: None }.exit_code(), 4);
        assert_eq!(
            ApiError::Auth {
                message: "denied".to_string()
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_error_wraps_api_error() {
        let error: Error = ApiError::NotFound {
            resource: "tenant".to_string(),
            id: "T1".to_string(),
        }
        .into();
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "tenant not found: T1");
        assert_eq!(error.exit_code(), 2);
    }
}
