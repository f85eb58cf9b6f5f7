use crate::http::{build_client, positive_price, send_json};
use crate::symbol_map::coingecko_id;
use async_trait::async_trait;
use cache_store::{CacheTier, TieredCache};
use chrono::{DateTime, Utc};
use config_manager::PriceProvidersConfig;
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
use tax_core::{
    Chain, ContractPriceSource, CredentialProvider, HistoricalPriceSource, PriceSource,
    ProviderError, SpotPriceSource,
};
use tracing::{debug, info};

const API_KEY_HEADER: &str = "x-cg-pro-api-key";

#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub live_timeout: Duration,
}

impl CoinGeckoConfig {
    /// Pick the pro endpoint when a `coingecko` key is available
    pub fn from_settings(
        providers: &PriceProvidersConfig,
        credentials: &dyn CredentialProvider,
    ) -> Self {
        let api_key = credentials.get_key("coingecko");
        let base_url = if api_key.is_some() {
            providers.coingecko_pro_base_url.clone()
        } else {
            providers.coingecko_base_url.clone()
        };
        Self {
            base_url,
            api_key,
            request_timeout: Duration::from_secs(providers.request_timeout_seconds),
            live_timeout: Duration::from_secs(providers.live_timeout_seconds),
        }
    }
}

/// CoinGecko coin-index client: per-day history, simple spot price and
/// contract-to-coin resolution.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    config: CoinGeckoConfig,
    cache: Option<TieredCache>,
}

impl CoinGeckoClient {
    pub fn new(config: CoinGeckoConfig) -> Result<Self, ProviderError> {
        let client = build_client(config.request_timeout)?;
        Ok(Self {
            client,
            config,
            cache: None,
        })
    }

    /// Cache contract-to-coin-id lookups in the contract-mapping tier
    pub fn with_cache(mut self, cache: TieredCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let request = self.client.get(url);
        match &self.config.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// USD price of a coin id on the UTC day of `timestamp`
    pub async fn coin_history(
        &self,
        coin_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        let date = timestamp.format("%d-%m-%Y").to_string();
        debug!("CoinGecko history for {} on {}", coin_id, date);

        let request = self
            .get(&format!("/coins/{}/history", coin_id))
            .query(&[("date", date.as_str()), ("localization", "false")]);
        let body = send_json(request, "coingecko history").await?;
        let price = parse_history(&body)?;

        info!("CoinGecko: {} price on {}: ${}", coin_id, date, price);
        Ok(price)
    }

    /// Resolve a token contract (or mint) to its CoinGecko coin id
    pub async fn coin_id_for_contract(
        &self,
        contract: &str,
        chain: Chain,
    ) -> Result<String, ProviderError> {
        let address = chain.normalize_address(contract);
        let cache_key = format!("contract_mapping:{}:{}", chain, address);

        if let Some(cache) = &self.cache {
            if let Some(id) = cache.get_json::<String>(&cache_key).await {
                return Ok(id);
            }
        }

        let request = self.get(&format!(
            "/coins/{}/contract/{}",
            chain.coingecko_platform(),
            address
        ));
        let body = match send_json(request, "coingecko contract").await {
            Err(ProviderError::NotFound(_)) => {
                return Err(ProviderError::Mapping(format!(
                    "{} on {} is not listed on CoinGecko",
                    address, chain
                )))
            }
            other => other?,
        };
        let id = parse_contract_id(&body)?;

        if let Some(cache) = &self.cache {
            cache
                .set_json(&cache_key, &id, CacheTier::ContractMapping)
                .await;
        }
        Ok(id)
    }
}

pub(crate) fn parse_history(body: &Value) -> Result<Decimal, ProviderError> {
    positive_price(
        body.pointer("/market_data/current_price/usd"),
        "coingecko history",
    )
}

pub(crate) fn parse_simple_price(body: &Value, coin_id: &str) -> Result<Decimal, ProviderError> {
    positive_price(
        body.get(coin_id).and_then(|entry| entry.get("usd")),
        "coingecko simple price",
    )
}

pub(crate) fn parse_contract_id(body: &Value) -> Result<String, ProviderError> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::DataShape("coingecko contract: missing id".to_string()))
}

fn mapped_id(symbol: &str) -> Result<&'static str, ProviderError> {
    coingecko_id(symbol).ok_or_else(|| ProviderError::Mapping(symbol.to_string()))
}

#[async_trait]
impl HistoricalPriceSource for CoinGeckoClient {
    fn historical_source(&self) -> PriceSource {
        PriceSource::CoinGecko
    }

    async fn historical_price(
        &self,
        symbol: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        let coin_id = mapped_id(symbol)?;
        self.coin_history(coin_id, timestamp).await
    }
}

#[async_trait]
impl SpotPriceSource for CoinGeckoClient {
    fn spot_source(&self) -> PriceSource {
        PriceSource::CoinGeckoSpot
    }

    async fn spot_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        let coin_id = mapped_id(symbol)?;
        let request = self
            .get("/simple/price")
            .query(&[("ids", coin_id), ("vs_currencies", "usd")])
            .timeout(self.config.live_timeout);
        let body = send_json(request, "coingecko simple price").await?;
        parse_simple_price(&body, coin_id)
    }
}

#[async_trait]
impl ContractPriceSource for CoinGeckoClient {
    fn contract_source(&self) -> PriceSource {
        PriceSource::CoinGecko
    }

    async fn contract_price(
        &self,
        contract: &str,
        chain: Chain,
        timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        let coin_id = self.coin_id_for_contract(contract, chain).await?;
        self.coin_history(&coin_id, timestamp).await
    }
}
