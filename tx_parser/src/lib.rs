//! Chain-specific classifiers that turn raw transaction data into
//! USD-valued [`tax_core::CanonicalTransaction`] records.

pub mod evm;
pub mod metadata;
pub mod solana;

use thiserror::Error;

pub use evm::{BlockTimestampSource, EvmTransferClassifier, RouterRegistry};
pub use metadata::{MintMetadataSource, TokenMetadata, TokenMetadataProvider};
pub use solana::{ClassifierThresholds, SolanaTransactionClassifier};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Transaction parsing error: {0}")]
    Parsing(String),
    #[error("Invalid transaction format: {0}")]
    InvalidFormat(String),
    #[error("Missing required data: {0}")]
    MissingData(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::InvalidFormat(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Split an RPC payload into individual items.
///
/// Accepts a JSON-RPC envelope (`{"result": ...}`), a bare array, or a
/// single object.
pub(crate) fn payload_items(payload: &serde_json::Value) -> Vec<&serde_json::Value> {
    let payload = payload.get("result").unwrap_or(payload);
    match payload {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_items_shapes() {
        assert_eq!(payload_items(&json!([{"a": 1}, {"a": 2}])).len(), 2);
        assert_eq!(payload_items(&json!({"result": [{"a": 1}]})).len(), 1);
        assert_eq!(payload_items(&json!({"slot": 5})).len(), 1);
        assert!(payload_items(&json!({"result": null})).is_empty());
    }
}
