use retry_utils::RetryableError;
use tax_core::{Chain, ProviderError};
use thiserror::Error;

/// Failure of a chain-data fetch.
///
/// Fatal variants abort the whole fetch and reach its caller; everything else
/// is a per-item problem that callers log and skip past.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("No credential configured for {0}")]
    MissingCredential(String),
    #[error("Chain {0} is not served by this client")]
    UnsupportedChain(Chain),
    #[error("Invalid RPC parameters: {0}")]
    InvalidParams(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error(transparent)]
    Provider(ProviderError),
}

impl FetchError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::InvalidAddress(_)
                | FetchError::Authentication(_)
                | FetchError::MissingCredential(_)
                | FetchError::UnsupportedChain(_)
                | FetchError::InvalidParams(_)
        )
    }

    pub fn retry_class(&self) -> RetryableError {
        match self {
            FetchError::Provider(e) => e.retry_class(),
            _ => RetryableError::Other,
        }
    }

    /// Map a JSON-RPC `error` object
    pub fn from_rpc_error(code: i64, message: &str) -> Self {
        match code {
            429 | -32429 => FetchError::Provider(ProviderError::RateLimited),
            -32603 | -32005 | -32004 => {
                FetchError::Provider(ProviderError::Transient(format!("RPC {}: {}", code, message)))
            }
            -32602 => FetchError::InvalidParams(message.to_string()),
            _ => FetchError::Rpc {
                code,
                message: message.to_string(),
            },
        }
    }

    /// Narrow to the error type used by the collaborator traits
    pub fn into_provider_error(self) -> ProviderError {
        match self {
            FetchError::Provider(e) => e,
            FetchError::Rpc { code, message } => {
                ProviderError::DataShape(format!("RPC {}: {}", code, message))
            }
            fatal => ProviderError::Fatal(fatal.to_string()),
        }
    }
}

impl From<ProviderError> for FetchError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Fatal(message) => FetchError::Authentication(message),
            other => FetchError::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_mapping() {
        assert_eq!(
            FetchError::from_rpc_error(-32429, "too many"),
            FetchError::Provider(ProviderError::RateLimited)
        );
        assert!(FetchError::from_rpc_error(-32602, "Invalid param: WrongSize").is_fatal());
        assert_eq!(
            FetchError::from_rpc_error(-32005, "behind").retry_class(),
            RetryableError::Timeout
        );
        assert!(!FetchError::from_rpc_error(-32009, "slot skipped").is_fatal());
    }

    #[test]
    fn test_auth_failures_are_fatal() {
        let e: FetchError = ProviderError::from_status(401, "alchemy").into();
        assert!(matches!(e, FetchError::Authentication(_)));
        assert!(e.is_fatal());

        let transient: FetchError = ProviderError::ServerError { status: 502 }.into();
        assert!(!transient.is_fatal());
        assert_eq!(transient.retry_class(), RetryableError::ServerError);
    }
}
