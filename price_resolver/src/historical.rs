use crate::live::LivePriceResolver;
use async_trait::async_trait;
use cache_store::{CacheTier, TieredCache};
use chrono::{DateTime, Utc};
use price_client::symbol_map::{normalize_symbol, static_default_price};
use retry_utils::{retry_with_policy, RetryPolicy};
use rust_decimal::Decimal;
use std::sync::Arc;
use tax_core::{
    date_bucket, HistoricalPriceSource, PriceConfidence, PriceQuote, PriceSource, ProviderError,
    SymbolPriceResolver,
};
use tracing::{debug, info, warn};

pub fn historical_cache_key(symbol: &str, timestamp: DateTime<Utc>) -> String {
    format!("historical_price:{}:{}", symbol, date_bucket(timestamp))
}

pub fn last_known_cache_key(symbol: &str) -> String {
    format!("last_known_price:{}", symbol)
}

/// Symbol-based price waterfall.
///
/// Order: day cache, historical providers (each behind the retry policy),
/// live spot providers, last known price, static default for majors, then a
/// nominal price. Confidence never rises while walking down the list.
pub struct HistoricalPriceOrchestrator {
    cache: TieredCache,
    providers: Vec<Arc<dyn HistoricalPriceSource>>,
    live: Option<LivePriceResolver>,
    retry_policy: RetryPolicy,
    nominal_price: Decimal,
}

impl HistoricalPriceOrchestrator {
    pub fn new(
        cache: TieredCache,
        providers: Vec<Arc<dyn HistoricalPriceSource>>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            providers,
            live: None,
            retry_policy,
            nominal_price: Decimal::ONE,
        }
    }

    pub fn with_live(mut self, live: LivePriceResolver) -> Self {
        self.live = Some(live);
        self
    }

    pub fn with_nominal_price(mut self, price: Decimal) -> Self {
        self.nominal_price = price;
        self
    }

    pub async fn resolve_price(&self, symbol: &str, timestamp: DateTime<Utc>) -> PriceQuote {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return PriceQuote::fallback(self.nominal_price);
        }

        let cache_key = historical_cache_key(&symbol, timestamp);
        if let Some(quote) = self.cache.get_json::<PriceQuote>(&cache_key).await {
            return quote;
        }

        for provider in &self.providers {
            let source = provider.historical_source();
            let result = retry_with_policy(
                || provider.historical_price(&symbol, timestamp),
                &self.retry_policy,
                ProviderError::retry_class,
            )
            .await;

            match result {
                Ok(price) => {
                    let quote = PriceQuote::new(price, source, PriceConfidence::High);
                    self.cache
                        .set_json(&cache_key, &quote, CacheTier::HistoricalPrice)
                        .await;
                    self.cache
                        .set_json(&last_known_cache_key(&symbol), &price, CacheTier::StaleRetention)
                        .await;
                    return quote;
                }
                Err(ProviderError::Mapping(_)) => {
                    debug!("{} has no mapping for {}, skipping", source, symbol);
                }
                Err(e) => {
                    warn!("{} failed for {} at {}: {}", source, symbol, timestamp, e);
                }
            }
        }

        warn!(
            "No historical price for {} at {}, falling back to current price",
            symbol,
            date_bucket(timestamp)
        );

        // Live quotes are never stored under the historical key
        if let Some(live) = &self.live {
            if let Some(quote) = live.spot_quote(&symbol).await {
                return quote;
            }
        }

        if let Some(price) = self
            .cache
            .get_json::<Decimal>(&last_known_cache_key(&symbol))
            .await
        {
            info!("Using last known price for {}: ${}", symbol, price);
            return PriceQuote::new(price, PriceSource::ExpiredCache, PriceConfidence::Low);
        }

        if let Some(price) = static_default_price(&symbol) {
            warn!("Using static default price for {}: ${}", symbol, price);
            return PriceQuote::new(price, PriceSource::StaticDefault, PriceConfidence::None);
        }

        warn!("No price source for {}, using nominal ${}", symbol, self.nominal_price);
        PriceQuote::fallback(self.nominal_price)
    }
}

#[async_trait]
impl SymbolPriceResolver for HistoricalPriceOrchestrator {
    async fn resolve_symbol(&self, symbol: &str, timestamp: DateTime<Utc>) -> PriceQuote {
        self.resolve_price(symbol, timestamp).await
    }
}
