use crate::http::{build_client, decimal_from_json, positive_price, send_json};
use crate::symbol_map::normalize_symbol;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config_manager::PriceProvidersConfig;
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
use tax_core::{CredentialProvider, HistoricalPriceSource, PriceSource, ProviderError, SpotPriceSource};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CryptoCompareConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub live_timeout: Duration,
}

impl CryptoCompareConfig {
    pub fn from_settings(
        providers: &PriceProvidersConfig,
        credentials: &dyn CredentialProvider,
    ) -> Self {
        Self {
            base_url: providers.cryptocompare_base_url.clone(),
            api_key: credentials.get_key("cryptocompare"),
            request_timeout: Duration::from_secs(providers.request_timeout_seconds),
            live_timeout: Duration::from_secs(providers.live_timeout_seconds),
        }
    }
}

/// CryptoCompare pair-index client (hourly candles and spot price)
#[derive(Clone)]
pub struct CryptoCompareClient {
    client: Client,
    config: CryptoCompareConfig,
}

impl CryptoCompareClient {
    pub fn new(config: CryptoCompareConfig) -> Result<Self, ProviderError> {
        let client = build_client(config.request_timeout)?;
        Ok(Self { client, config })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let request = self.client.get(url);
        match &self.config.api_key {
            Some(key) => request.query(&[("api_key", key.as_str())]),
            None => request,
        }
    }
}

/// CryptoCompare reports most failures as HTTP 200 with `Response: Error`
fn check_error_envelope(body: &Value, context: &str) -> Result<(), ProviderError> {
    if body.get("Response").and_then(Value::as_str) == Some("Error") {
        let message = body
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ProviderError::NotFound(format!("{}: {}", context, message)));
    }
    Ok(())
}

pub(crate) fn parse_histohour(body: &Value) -> Result<Decimal, ProviderError> {
    check_error_envelope(body, "cryptocompare histohour")?;

    // v1 returns `Data: [...]`, v2 nests it as `Data: { Data: [...] }`
    let candles = body
        .get("Data")
        .and_then(|data| data.as_array().or_else(|| data.get("Data").and_then(Value::as_array)))
        .ok_or_else(|| ProviderError::DataShape("cryptocompare histohour: missing Data".to_string()))?;

    let last = candles.last().ok_or_else(|| {
        ProviderError::NotFound("cryptocompare histohour: no candles".to_string())
    })?;

    let close = last.get("close").filter(|v| {
        decimal_from_json(v).map_or(false, |price| price > Decimal::ZERO)
    });
    positive_price(close.or_else(|| last.get("open")), "cryptocompare histohour")
}

pub(crate) fn parse_spot(body: &Value) -> Result<Decimal, ProviderError> {
    check_error_envelope(body, "cryptocompare price")?;
    positive_price(body.get("USD"), "cryptocompare price")
}

#[async_trait]
impl HistoricalPriceSource for CryptoCompareClient {
    fn historical_source(&self) -> PriceSource {
        PriceSource::CryptoCompare
    }

    async fn historical_price(
        &self,
        symbol: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        let symbol = normalize_symbol(symbol);
        debug!("CryptoCompare histohour for {} at {}", symbol, timestamp);

        let to_ts = timestamp.timestamp().to_string();
        let request = self.get("/data/histohour").query(&[
            ("fsym", symbol.as_str()),
            ("tsym", "USD"),
            ("toTs", to_ts.as_str()),
            ("limit", "1"),
        ]);
        let body = send_json(request, "cryptocompare histohour").await?;
        let price = parse_histohour(&body)?;

        info!("CryptoCompare: {} price at {}: ${}", symbol, timestamp, price);
        Ok(price)
    }
}

#[async_trait]
impl SpotPriceSource for CryptoCompareClient {
    fn spot_source(&self) -> PriceSource {
        PriceSource::CryptoCompareSpot
    }

    async fn spot_price(&self, symbol: &str) -> Result<Decimal, ProviderError> {
        let symbol = normalize_symbol(symbol);
        let request = self
            .get("/data/price")
            .query(&[("fsym", symbol.as_str()), ("tsyms", "USD")])
            .timeout(self.config.live_timeout);
        let body = send_json(request, "cryptocompare price").await?;
        parse_spot(&body)
    }
}
