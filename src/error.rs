use std::time::Duration;
use thiserror::Error;

/// Error taxonomy shared by every provider adapter, the governor, and the orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network timeout after {timeout:?}: {message}")]
    NetworkTimeout { timeout: Duration, message: String },

    #[error("{provider} returned a malformed response: {message}")]
    Malformed { provider: String, message: String },

    #[error("{provider} does not support this request: {reason}")]
    CapabilityMismatch { provider: String, reason: String },

    #[error("{provider} rate budget exhausted")]
    GovernorExhausted { provider: String },

    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("{provider} request failed permanently: {status} {message}")]
    Permanent {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("{provider} is temporarily unavailable: {message}")]
    ServiceUnavailable { provider: String, message: String },

    #[error("Circuit breaker open for provider: {provider}")]
    CircuitBreakerOpen { provider: String },

    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Timeout error: operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Classification used by the retry policy and the orchestrator's error-isolation logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Should not be retried; surfaced to the caller as-is.
    Permanent,
    /// Safe to retry with backoff.
    Transient,
    /// Retry, but only after the provider's advertised delay.
    RateLimited,
    /// The provider's circuit breaker is open; do not dispatch at all.
    CircuitBreaker,
}

impl Error {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidInput { .. } | Error::CapabilityMismatch { .. } => {
                ErrorCategory::Permanent
            }
            Error::Permanent { .. } => ErrorCategory::Permanent,
            Error::RateLimited { .. } => ErrorCategory::RateLimited,
            Error::CircuitBreakerOpen { .. } => ErrorCategory::CircuitBreaker,
            Error::GovernorExhausted { .. } => ErrorCategory::RateLimited,
            Error::Http(_)
            | Error::NetworkTimeout { .. }
            | Error::ServiceUnavailable { .. }
            | Error::Timeout { .. } => ErrorCategory::Transient,
            Error::Malformed { .. } => ErrorCategory::Permanent,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    #[must_use]
    pub fn should_trigger_circuit_breaker(&self) -> bool {
        matches!(
            self,
            Error::ServiceUnavailable { .. } | Error::NetworkTimeout { .. } | Error::Timeout { .. }
        )
    }

    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Error::Malformed { provider, .. }
            | Error::CapabilityMismatch { provider, .. }
            | Error::GovernorExhausted { provider }
            | Error::RateLimited { provider, .. }
            | Error::Permanent { provider, .. }
            | Error::ServiceUnavailable { provider, .. }
            | Error::CircuitBreakerOpen { provider } => Some(provider),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
