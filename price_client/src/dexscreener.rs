use crate::http::{build_client, decimal_from_json, positive_price, send_json};
use async_trait::async_trait;
use cache_store::{CacheTier, TieredCache};
use chrono::{DateTime, Utc};
use config_manager::PriceProvidersConfig;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
use tax_core::{Chain, ContractPriceSource, PriceSource, ProviderError};
use tracing::info;

/// DexScreener spot prices. Only meaningful for recent timestamps; the
/// caller decides when to use it.
#[derive(Clone)]
pub struct DexScreenerClient {
    client: Client,
    base_url: String,
    cache: Option<TieredCache>,
}

impl DexScreenerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            cache: None,
        })
    }

    pub fn from_settings(providers: &PriceProvidersConfig) -> Result<Self, ProviderError> {
        Self::new(
            providers.dexscreener_base_url.clone(),
            Duration::from_secs(providers.request_timeout_seconds),
        )
    }

    /// Cache spot prices in the current-price tier
    pub fn with_cache(mut self, cache: TieredCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn spot_price(&self, contract: &str, chain: Chain) -> Result<Decimal, ProviderError> {
        let address = chain.normalize_address(contract);
        let cache_key = format!("current_price:{}:{}", chain, address);

        if let Some(cache) = &self.cache {
            if let Some(price) = cache.get_json::<Decimal>(&cache_key).await {
                return Ok(price);
            }
        }

        let url = format!(
            "{}/latest/dex/tokens/{}",
            self.base_url.trim_end_matches('/'),
            address
        );
        let body = send_json(self.client.get(url), "dexscreener tokens").await?;
        let price = parse_best_pair(&body, chain.dexscreener_chain())?;

        if let Some(cache) = &self.cache {
            cache
                .set_json(&cache_key, &price, CacheTier::CurrentPrice)
                .await;
        }
        Ok(price)
    }
}

/// `priceUsd` of the most liquid pair on `chain_id`
pub(crate) fn parse_best_pair(body: &Value, chain_id: &str) -> Result<Decimal, ProviderError> {
    let pairs: &[Value] = match body.get("pairs") {
        Some(Value::Array(pairs)) => pairs.as_slice(),
        // DexScreener answers `pairs: null` for unknown tokens
        Some(Value::Null) | None => &[],
        Some(_) => {
            return Err(ProviderError::DataShape(
                "dexscreener tokens: pairs is not a list".to_string(),
            ))
        }
    };

    let best = pairs
        .iter()
        .filter(|pair| pair.get("chainId").and_then(Value::as_str) == Some(chain_id))
        .max_by_key(|pair| {
            pair.pointer("/liquidity/usd")
                .and_then(decimal_from_json)
                .unwrap_or_default()
        })
        .ok_or_else(|| ProviderError::NotFound(format!("no DexScreener pairs on {}", chain_id)))?;

    positive_price(best.get("priceUsd"), "dexscreener tokens")
}

#[async_trait]
impl ContractPriceSource for DexScreenerClient {
    fn contract_source(&self) -> PriceSource {
        PriceSource::DexScreener
    }

    async fn contract_price(
        &self,
        contract: &str,
        chain: Chain,
        _timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        let price = self.spot_price(contract, chain).await?;
        info!("DexScreener: {} spot price ${}", contract, price);
        Ok(price)
    }
}
