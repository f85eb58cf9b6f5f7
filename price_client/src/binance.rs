use crate::http::{build_client, positive_price, send_json};
use crate::symbol_map::normalize_symbol;
use async_trait::async_trait;
use config_manager::PriceProvidersConfig;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
use tax_core::{PriceSource, ProviderError, SpotPriceSource};

/// Binance public ticker, quoted against USDT
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    pub fn from_settings(providers: &PriceProvidersConfig) -> Result<Self, ProviderError> {
        Self::new(
            providers.binance_base_url.clone(),
            Duration::from_secs(providers.live_timeout_seconds),
        )
    }
}

pub(crate) fn ticker_pair(symbol: &str) -> String {
    format!("{}USDT", normalize_symbol(symbol))
}

pub(crate) fn parse_ticker(body: &Value) -> Result<Decimal, ProviderError> {
    positive_price(body.get("price"), "binance ticker")
}

#[async_trait]
impl SpotPriceSource for BinanceClient {
    fn spot_source(&self) -> PriceSource {
        PriceSource::BinanceSpot
    }

    async fn spot_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        let pair = ticker_pair(symbol);
        let url = format!("{}/api/v3/ticker/price", self.base_url.trim_end_matches('/'));
        let request = self.client.get(url).query(&[("symbol", pair.as_str())]);
        let body = send_json(request, "binance ticker").await?;
        parse_ticker(&body)
    }
}
