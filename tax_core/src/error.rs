use retry_utils::RetryableError;
use thiserror::Error;

/// Failure of a single outbound provider call.
///
/// Every price tier and chain-data lookup reports one of these; the variant
/// decides whether the call is retried, the tier is skipped, or the whole
/// fetch is aborted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Timeout, connection reset, DNS failure
    #[error("Transient provider failure: {0}")]
    Transient(String),
    /// HTTP 429
    #[error("Rate limit exceeded")]
    RateLimited,
    /// HTTP 5xx
    #[error("Provider server error: HTTP {status}")]
    ServerError { status: u16 },
    /// Unknown symbol, unresolved token identifier
    #[error("No mapping for: {0}")]
    Mapping(String),
    /// Response is missing expected fields
    #[error("Unexpected response shape: {0}")]
    DataShape(String),
    /// Provider answered but has no data for the request
    #[error("Not found: {0}")]
    NotFound(String),
    /// Invalid address, authentication failure
    #[error("Fatal provider failure: {0}")]
    Fatal(String),
}

impl ProviderError {
    /// Map an HTTP status code that is not a success into an error kind
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            429 => ProviderError::RateLimited,
            500..=599 => ProviderError::ServerError { status },
            401 | 403 => ProviderError::Fatal(format!("HTTP {} from {}", status, context)),
            404 => ProviderError::NotFound(context.to_string()),
            _ => ProviderError::DataShape(format!("HTTP {} from {}", status, context)),
        }
    }

    /// How the retry executor should treat this failure
    pub fn retry_class(&self) -> RetryableError {
        match self {
            ProviderError::RateLimited => RetryableError::RateLimit,
            ProviderError::ServerError { .. } => RetryableError::ServerError,
            ProviderError::Transient(_) => RetryableError::Timeout,
            ProviderError::Mapping(_)
            | ProviderError::DataShape(_)
            | ProviderError::NotFound(_)
            | ProviderError::Fatal(_) => RetryableError::Other,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ProviderError::Fatal(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProviderError::from_status(429, "x"), ProviderError::RateLimited);
        assert_eq!(
            ProviderError::from_status(503, "x"),
            ProviderError::ServerError { status: 503 }
        );
        assert!(ProviderError::from_status(401, "x").is_fatal());
        assert!(matches!(
            ProviderError::from_status(404, "x"),
            ProviderError::NotFound(_)
        ));
    }

    #[test]
    fn test_only_transport_failures_are_retried() {
        assert!(ProviderError::RateLimited.retry_class().is_retryable());
        assert!(ProviderError::ServerError { status: 502 }
            .retry_class()
            .is_retryable());
        assert!(ProviderError::Transient("timeout".into())
            .retry_class()
            .is_retryable());
        assert!(!ProviderError::Mapping("FOO".into()).retry_class().is_retryable());
        assert!(!ProviderError::DataShape("x".into()).retry_class().is_retryable());
    }
}
