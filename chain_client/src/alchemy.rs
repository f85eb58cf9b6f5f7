use crate::address::validate_address;
use crate::error::FetchError;
use crate::rpc::{paginate, JsonRpcClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config_manager::EvmConfig;
use retry_utils::RetryPolicy;
use serde_json::{json, Value};
use std::time::Duration;
use tax_core::{parse_quantity, Chain, CredentialProvider, ProviderError};
use tracing::{debug, info};
use tx_parser::{BlockTimestampSource, TokenMetadata, TokenMetadataProvider};

const CREDENTIAL_NAME: &str = "alchemy";
/// Largest page `alchemy_getAssetTransfers` accepts
const MAX_COUNT: &str = "0x3e8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Outgoing,
    Incoming,
}

impl TransferDirection {
    fn address_field(&self) -> &'static str {
        match self {
            TransferDirection::Outgoing => "fromAddress",
            TransferDirection::Incoming => "toAddress",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlchemyConfig {
    pub url_template: String,
    pub api_key: String,
    pub request_timeout: Duration,
    pub max_pages: u32,
}

impl AlchemyConfig {
    pub fn from_settings(
        settings: &EvmConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self, FetchError> {
        let api_key = credentials
            .get_key(CREDENTIAL_NAME)
            .ok_or_else(|| FetchError::MissingCredential(CREDENTIAL_NAME.to_string()))?;
        Ok(Self {
            url_template: settings.alchemy_url_template.clone(),
            api_key,
            request_timeout: Duration::from_secs(settings.request_timeout_seconds),
            max_pages: settings.max_transfer_pages,
        })
    }

    pub fn endpoint(&self, chain: Chain) -> Result<String, FetchError> {
        if !chain.is_evm() {
            return Err(FetchError::UnsupportedChain(chain));
        }
        Ok(self
            .url_template
            .replace("{network}", chain.alchemy_network())
            .replace("{key}", &self.api_key))
    }
}

/// Alchemy enhanced APIs: asset transfer history, block times and token metadata
#[derive(Clone)]
pub struct AlchemyClient {
    rpc: JsonRpcClient,
    config: AlchemyConfig,
}

impl AlchemyClient {
    pub fn new(config: AlchemyConfig, retry: RetryPolicy) -> Result<Self, FetchError> {
        Ok(Self {
            rpc: JsonRpcClient::new(config.request_timeout, retry)?,
            config,
        })
    }

    /// Transfers from or to `address`, bounded by the page limit
    pub async fn fetch_transfers(
        &self,
        chain: Chain,
        address: &str,
        direction: TransferDirection,
    ) -> Result<Vec<Value>, FetchError> {
        validate_address(chain, address)?;
        let url = self.config.endpoint(chain)?;

        let transfers = paginate(
            "alchemy_getAssetTransfers",
            self.config.max_pages,
            |page_key| {
                let params = transfer_params(chain, address, direction, page_key);
                let url = url.as_str();
                async move {
                    let result = self
                        .rpc
                        .call(url, "alchemy_getAssetTransfers", params)
                        .await?;
                    parse_transfer_page(result)
                }
            },
        )
        .await?;

        debug!(
            "{} {:?} transfers for {} on {}",
            transfers.len(),
            direction,
            address,
            chain
        );
        Ok(transfers)
    }

    /// Outgoing and incoming transfer lists for the EVM classifier
    pub async fn fetch_transfer_lists(
        &self,
        chain: Chain,
        address: &str,
    ) -> Result<(Vec<Value>, Vec<Value>), FetchError> {
        let outgoing = self
            .fetch_transfers(chain, address, TransferDirection::Outgoing)
            .await?;
        let incoming = self
            .fetch_transfers(chain, address, TransferDirection::Incoming)
            .await?;
        info!(
            "Fetched {} outgoing and {} incoming transfers for {} on {}",
            outgoing.len(),
            incoming.len(),
            address,
            chain
        );
        Ok((outgoing, incoming))
    }

    pub async fn get_block_timestamp(
        &self,
        chain: Chain,
        block_number: u64,
    ) -> Result<DateTime<Utc>, FetchError> {
        let url = self.config.endpoint(chain)?;
        let params = json!([format!("0x{:x}", block_number), false]);
        let block = self.rpc.call(&url, "eth_getBlockByNumber", params).await?;
        parse_block_timestamp(&block).ok_or_else(|| {
            FetchError::Provider(ProviderError::DataShape(format!(
                "block {} has no timestamp",
                block_number
            )))
        })
    }

    pub async fn get_token_metadata(
        &self,
        chain: Chain,
        contract: &str,
    ) -> Result<Option<TokenMetadata>, FetchError> {
        let url = self.config.endpoint(chain)?;
        let result = self
            .rpc
            .call(&url, "alchemy_getTokenMetadata", json!([contract]))
            .await?;
        Ok(parse_token_metadata(&result))
    }
}

#[async_trait]
impl BlockTimestampSource for AlchemyClient {
    async fn block_timestamp(
        &self,
        chain: Chain,
        block_number: u64,
    ) -> Result<DateTime<Utc>, ProviderError> {
        self.get_block_timestamp(chain, block_number)
            .await
            .map_err(FetchError::into_provider_error)
    }
}

#[async_trait]
impl TokenMetadataProvider for AlchemyClient {
    async fn token_metadata(
        &self,
        contract: &str,
        chain: Chain,
    ) -> Result<Option<TokenMetadata>, ProviderError> {
        self.get_token_metadata(chain, contract)
            .await
            .map_err(FetchError::into_provider_error)
    }
}

/// Internal transfers are only indexed on some networks
fn transfer_categories(chain: Chain) -> &'static [&'static str] {
    match chain {
        Chain::Ethereum | Chain::Polygon => &["external", "internal", "erc20"],
        _ => &["external", "erc20"],
    }
}

fn transfer_params(
    chain: Chain,
    address: &str,
    direction: TransferDirection,
    page_key: Option<String>,
) -> Value {
    let mut filter = json!({
        "fromBlock": "0x0",
        "toBlock": "latest",
        "category": transfer_categories(chain),
        "withMetadata": true,
        "excludeZeroValue": true,
        "maxCount": MAX_COUNT,
        "order": "asc",
    });
    filter[direction.address_field()] = json!(address);
    if let Some(page_key) = page_key {
        filter["pageKey"] = json!(page_key);
    }
    json!([filter])
}

fn parse_transfer_page(mut result: Value) -> Result<(Vec<Value>, Option<String>), FetchError> {
    let transfers = match result.get_mut("transfers").map(Value::take) {
        Some(Value::Array(transfers)) => transfers,
        _ => {
            return Err(FetchError::Provider(ProviderError::DataShape(
                "asset transfers result has no transfers array".to_string(),
            )))
        }
    };
    let page_key = result
        .get("pageKey")
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
        .map(str::to_string);
    Ok((transfers, page_key))
}

fn parse_block_timestamp(block: &Value) -> Option<DateTime<Utc>> {
    let seconds = block.get("timestamp")?.as_str().and_then(parse_quantity)?;
    DateTime::from_timestamp(i64::try_from(seconds).ok()?, 0)
}

fn parse_token_metadata(result: &Value) -> Option<TokenMetadata> {
    if result.is_null() {
        return None;
    }
    let text = |field: &str| {
        result
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Some(TokenMetadata {
        symbol: text("symbol"),
        name: text("name"),
        decimals: result
            .get("decimals")
            .and_then(Value::as_u64)
            .and_then(|d| u8::try_from(d).ok()),
    })
}
