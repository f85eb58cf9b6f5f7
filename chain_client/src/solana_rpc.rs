use crate::address::validate_address;
use crate::error::FetchError;
use crate::rpc::{paginate, JsonRpcClient};
use async_trait::async_trait;
use config_manager::SolanaConfig;
use retry_utils::RetryPolicy;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tax_core::{Chain, CredentialProvider, ProviderError};
use tracing::{debug, info, warn};
use tx_parser::{MintMetadataSource, TokenMetadata};

const CREDENTIAL_NAME: &str = "helius";

#[derive(Debug, Clone)]
pub struct SolanaRpcConfig {
    pub rpc_url: String,
    pub request_timeout: Duration,
    pub page_size: u32,
    pub max_pages: u32,
}

impl SolanaRpcConfig {
    /// Fill the `{key}` placeholder of the configured endpoint, if any
    pub fn from_settings(
        settings: &SolanaConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self, FetchError> {
        let rpc_url = if settings.rpc_url.contains("{key}") {
            let key = credentials
                .get_key(CREDENTIAL_NAME)
                .ok_or_else(|| FetchError::MissingCredential(CREDENTIAL_NAME.to_string()))?;
            settings.rpc_url.replace("{key}", &key)
        } else {
            settings.rpc_url.clone()
        };

        Ok(Self {
            rpc_url,
            request_timeout: Duration::from_secs(settings.request_timeout_seconds),
            page_size: settings.signatures_page_size.clamp(1, 1000),
            max_pages: settings.max_signature_pages,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub err: Option<Value>,
}

/// Solana JSON-RPC client for wallet history and DAS mint metadata
#[derive(Clone)]
pub struct SolanaRpcClient {
    rpc: JsonRpcClient,
    config: SolanaRpcConfig,
}

impl SolanaRpcClient {
    pub fn new(config: SolanaRpcConfig, retry: RetryPolicy) -> Result<Self, FetchError> {
        Ok(Self {
            rpc: JsonRpcClient::new(config.request_timeout, retry)?,
            config,
        })
    }

    /// Signatures for `address`, newest first, bounded by the page limit
    pub async fn fetch_signatures(&self, address: &str) -> Result<Vec<SignatureInfo>, FetchError> {
        validate_address(Chain::Solana, address)?;
        let page_size = self.config.page_size;

        paginate("getSignaturesForAddress", self.config.max_pages, |before| {
            let mut options = json!({"limit": page_size});
            if let Some(before) = before {
                options["before"] = json!(before);
            }
            let params = json!([address, options]);
            async move {
                let result = self
                    .rpc
                    .call(&self.config.rpc_url, "getSignaturesForAddress", params)
                    .await?;
                parse_signature_page(result, page_size)
            }
        })
        .await
    }

    /// One transaction in `jsonParsed` encoding; `None` when the node has no record
    pub async fn get_transaction(&self, signature: &str) -> Result<Option<Value>, FetchError> {
        let params = json!([
            signature,
            {"encoding": "jsonParsed", "maxSupportedTransactionVersion": 0}
        ]);
        let result = self
            .rpc
            .call(&self.config.rpc_url, "getTransaction", params)
            .await?;
        Ok((!result.is_null()).then_some(result))
    }

    /// Wallet history as a payload for the Solana classifier.
    ///
    /// Fatal errors abort the fetch; a transaction that fails to load is
    /// logged and left out.
    pub async fn fetch_transactions(&self, address: &str) -> Result<Value, FetchError> {
        let signatures = self.fetch_signatures(address).await?;
        info!("Found {} signatures for {}", signatures.len(), address);

        let mut transactions = Vec::with_capacity(signatures.len());
        for info in &signatures {
            match self.get_transaction(&info.signature).await {
                Ok(Some(tx)) => transactions.push(tx),
                Ok(None) => debug!("Transaction {} not available", info.signature),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Skipping transaction {}: {}", info.signature, e),
            }
        }

        info!(
            "Fetched {}/{} transactions for {}",
            transactions.len(),
            signatures.len(),
            address
        );
        Ok(Value::Array(transactions))
    }

    pub async fn get_asset(&self, mint: &str) -> Result<Option<TokenMetadata>, FetchError> {
        match self
            .rpc
            .call(&self.config.rpc_url, "getAsset", json!({"id": mint}))
            .await
        {
            Ok(result) => Ok(parse_asset(&result)),
            Err(FetchError::Rpc { message, .. }) if message.to_lowercase().contains("not found") => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MintMetadataSource for SolanaRpcClient {
    async fn mint_metadata(&self, mint: &str) -> Result<Option<TokenMetadata>, ProviderError> {
        self.get_asset(mint)
            .await
            .map_err(FetchError::into_provider_error)
    }
}

fn parse_signature_page(
    result: Value,
    page_size: u32,
) -> Result<(Vec<SignatureInfo>, Option<String>), FetchError> {
    let page: Vec<SignatureInfo> = serde_json::from_value(result).map_err(|e| {
        FetchError::Provider(ProviderError::DataShape(format!("signature page: {}", e)))
    })?;

    let next = if page.len() as u32 >= page_size {
        page.last().map(|info| info.signature.clone())
    } else {
        None
    };
    Ok((page, next))
}

/// Symbol, name and decimals from a DAS `getAsset` result
fn parse_asset(result: &Value) -> Option<TokenMetadata> {
    if result.is_null() {
        return None;
    }
    let metadata = result.pointer("/content/metadata");
    let text = |field: &str| {
        metadata
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let symbol = text("symbol").or_else(|| {
        result
            .pointer("/token_info/symbol")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let decimals = result
        .pointer("/token_info/decimals")
        .and_then(Value::as_u64)
        .and_then(|d| u8::try_from(d).ok());

    Some(TokenMetadata {
        symbol,
        name: text("name"),
        decimals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Keys(HashMap<String, String>);

    impl CredentialProvider for Keys {
        fn get_key(&self, provider: &str) -> Option<String> {
            self.0.get(provider).cloned()
        }
    }

    fn settings(url: &str) -> SolanaConfig {
        SolanaConfig {
            rpc_url: url.to_string(),
            request_timeout_seconds: 30,
            signatures_page_size: 100,
            max_signature_pages: 10,
        }
    }

    #[test]
    fn test_key_placeholder_is_filled() {
        let keys = Keys(HashMap::from([("helius".to_string(), "abc".to_string())]));
        let config =
            SolanaRpcConfig::from_settings(&settings("https://rpc.test/?api-key={key}"), &keys)
                .unwrap();
        assert_eq!(config.rpc_url, "https://rpc.test/?api-key=abc");
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let keys = Keys(HashMap::new());
        let err = SolanaRpcConfig::from_settings(&settings("https://rpc.test/?api-key={key}"), &keys)
            .unwrap_err();
        assert!(err.is_fatal());

        let public = SolanaRpcConfig::from_settings(&settings("https://api.mainnet-beta.solana.com"), &keys);
        assert!(public.is_ok());
    }

    #[test]
    fn test_signature_page_cursor() {
        let full = json!([
            {"signature": "s1", "slot": 10, "blockTime": 1_700_000_000, "err": null},
            {"signature": "s2", "slot": 9, "blockTime": null, "err": {"InstructionError": []}}
        ]);
        let (page, next) = parse_signature_page(full.clone(), 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(next.as_deref(), Some("s2"));

        let (_, last) = parse_signature_page(full, 100).unwrap();
        assert_eq!(last, None);

        assert!(parse_signature_page(json!({"oops": true}), 2).is_err());
    }

    #[test]
    fn test_parse_das_asset() {
        let asset = json!({
            "id": "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263",
            "content": {"metadata": {"name": "Bonk", "symbol": "Bonk"}},
            "token_info": {"decimals": 5, "symbol": "Bonk"}
        });
        let metadata = parse_asset(&asset).unwrap();
        assert_eq!(metadata.symbol.as_deref(), Some("Bonk"));
        assert_eq!(metadata.name.as_deref(), Some("Bonk"));
        assert_eq!(metadata.decimals, Some(5));

        let bare = parse_asset(&json!({"id": "x", "content": {"metadata": {"symbol": ""}}})).unwrap();
        assert_eq!(bare.symbol, None);
        assert_eq!(bare.decimals, None);
        assert!(parse_asset(&Value::Null).is_none());
    }
}
