use crate::http::{build_client, decimal_from_json, send_json};
use async_trait::async_trait;
use cache_store::{CacheTier, TieredCache};
use chrono::{DateTime, Utc};
use config_manager::PriceProvidersConfig;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tax_core::{Chain, ContractPriceSource, PriceSource, ProviderError};
use tracing::{debug, info};

/// A pool that trades the token, with the token's USD price in that pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolCandidate {
    pub address: String,
    pub reserve_usd: Decimal,
    pub token_price_usd: Decimal,
}

/// GeckoTerminal DEX pool aggregator
#[derive(Clone)]
pub struct GeckoTerminalClient {
    client: Client,
    base_url: String,
    max_pools: usize,
    cache: Option<TieredCache>,
}

impl GeckoTerminalClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        max_pools: usize,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            max_pools: max_pools.max(1),
            cache: None,
        })
    }

    pub fn from_settings(providers: &PriceProvidersConfig) -> Result<Self, ProviderError> {
        Self::new(
            providers.geckoterminal_base_url.clone(),
            Duration::from_secs(providers.request_timeout_seconds),
            providers.max_candidate_pools,
        )
    }

    /// Cache discovered pools in the pool-discovery tier
    pub fn with_cache(mut self, cache: TieredCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Deepest pools for a token, most liquid first
    pub async fn discover_pools(
        &self,
        contract: &str,
        chain: Chain,
    ) -> Result<Vec<PoolCandidate>, ProviderError> {
        let address = chain.normalize_address(contract);
        let cache_key = format!("pool_discovery:{}:{}", chain, address);

        if let Some(cache) = &self.cache {
            if let Some(pools) = cache.get_json::<Vec<PoolCandidate>>(&cache_key).await {
                return Ok(pools);
            }
        }

        let network = chain.geckoterminal_network();
        let url = format!(
            "{}/networks/{}/tokens/{}/pools",
            self.base_url.trim_end_matches('/'),
            network,
            address
        );
        let request = self.client.get(url).header("Accept", "application/json");
        let body = send_json(request, "geckoterminal pools").await?;
        let pools = parse_pools(&body, network, &address, self.max_pools)?;
        debug!("GeckoTerminal found {} pools for {}", pools.len(), address);

        if let Some(cache) = &self.cache {
            cache
                .set_json(&cache_key, &pools, CacheTier::PoolDiscovery)
                .await;
        }
        Ok(pools)
    }
}

fn attribute_decimal(attributes: &Value, key: &str) -> Option<Decimal> {
    attributes.get(key).and_then(decimal_from_json)
}

/// Top `max_pools` pools by USD reserve.
///
/// The token may sit on either side of a pool; its price is read from the
/// matching side.
pub(crate) fn parse_pools(
    body: &Value,
    network: &str,
    address: &str,
    max_pools: usize,
) -> Result<Vec<PoolCandidate>, ProviderError> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::DataShape("geckoterminal pools: missing data".to_string()))?;

    let token_id = format!("{}_{}", network, address).to_lowercase();

    let mut pools: Vec<PoolCandidate> = data
        .iter()
        .filter_map(|pool| {
            let attributes = pool.get("attributes")?;
            let reserve_usd = attribute_decimal(attributes, "reserve_in_usd").unwrap_or_default();

            let quote_id = pool
                .pointer("/relationships/quote_token/data/id")
                .and_then(Value::as_str)
                .map(str::to_lowercase);
            let price_key = if quote_id.as_deref() == Some(token_id.as_str()) {
                "quote_token_price_usd"
            } else {
                "base_token_price_usd"
            };
            let token_price_usd = attribute_decimal(attributes, price_key)?;
            if token_price_usd <= Decimal::ZERO {
                return None;
            }

            Some(PoolCandidate {
                address: attributes
                    .get("address")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                reserve_usd,
                token_price_usd,
            })
        })
        .collect();

    pools.sort_by(|a, b| b.reserve_usd.cmp(&a.reserve_usd));
    pools.truncate(max_pools);
    Ok(pools)
}

#[async_trait]
impl ContractPriceSource for GeckoTerminalClient {
    fn contract_source(&self) -> PriceSource {
        PriceSource::GeckoTerminal
    }

    async fn contract_price(
        &self,
        contract: &str,
        chain: Chain,
        _timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        let pools = self.discover_pools(contract, chain).await?;
        let best = pools.first().ok_or_else(|| {
            ProviderError::NotFound(format!("no GeckoTerminal pools for {}", contract))
        })?;

        info!(
            "GeckoTerminal: {} priced at ${} from pool {} (reserve ${})",
            contract, best.token_price_usd, best.address, best.reserve_usd
        );
        Ok(best.token_price_usd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn pool(address: &str, reserve: &str, base_price: &str, quote_id: &str) -> Value {
        json!({
            "id": format!("eth_{}", address),
            "attributes": {
                "address": address,
                "reserve_in_usd": reserve,
                "base_token_price_usd": base_price,
                "quote_token_price_usd": "1.0"
            },
            "relationships": {
                "base_token": { "data": { "id": "eth_0xtoken" } },
                "quote_token": { "data": { "id": quote_id } }
            }
        })
    }

    #[test]
    fn test_pools_sorted_by_reserve_and_truncated() {
        let body = json!({
            "data": [
                pool("0xsmall", "1200.5", "0.51", "eth_0xweth"),
                pool("0xdeep", "950000", "0.50", "eth_0xweth"),
                pool("0xmid", "30000", "0.49", "eth_0xweth")
            ]
        });
        let pools = parse_pools(&body, "eth", "0xtoken", 2).unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].address, "0xdeep");
        assert_eq!(pools[0].token_price_usd, dec!(0.50));
        assert_eq!(pools[1].address, "0xmid");
    }

    #[test]
    fn test_token_on_quote_side() {
        let body = json!({ "data": [ pool("0xp", "100", "2500", "eth_0xtoken") ] });
        let pools = parse_pools(&body, "eth", "0xtoken", 5).unwrap();
        assert_eq!(pools[0].token_price_usd, dec!(1.0));
    }

    #[test]
    fn test_empty_and_malformed() {
        assert!(parse_pools(&json!({ "data": [] }), "eth", "0x1", 5)
            .unwrap()
            .is_empty());
        assert!(matches!(
            parse_pools(&json!({ "errors": [] }), "eth", "0x1", 5),
            Err(ProviderError::DataShape(_))
        ));
    }
}
