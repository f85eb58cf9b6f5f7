use async_trait::async_trait;
use cache_store::{CacheTier, TieredCache};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tax_core::{
    Chain, ContractPriceResolver, ContractPriceSource, PriceConfidence, PriceQuote, ProviderError,
};
use tracing::{debug, warn};

pub fn token_price_cache_key(chain: Chain, contract: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "token_price:{}:{}:{}",
        chain,
        chain.normalize_address(contract),
        timestamp.timestamp()
    )
}

struct Tier {
    source: Arc<dyn ContractPriceSource>,
    confidence: PriceConfidence,
    /// Spot-only sources are skipped for timestamps outside the recency window
    spot_only: bool,
}

/// Prices any token by contract address or mint.
///
/// Tiers run in a fixed order: coin index (high), DEX pool aggregator
/// (medium), DEX spot (low, recent timestamps only), then a nominal price
/// with no confidence.
pub struct DynamicContractPriceResolver {
    cache: TieredCache,
    tiers: [Tier; 3],
    recency_window: Duration,
    nominal_price: Decimal,
}

impl DynamicContractPriceResolver {
    pub fn new(
        cache: TieredCache,
        coin_index: Arc<dyn ContractPriceSource>,
        pool_index: Arc<dyn ContractPriceSource>,
        dex_spot: Arc<dyn ContractPriceSource>,
    ) -> Self {
        Self {
            cache,
            tiers: [
                Tier {
                    source: coin_index,
                    confidence: PriceConfidence::High,
                    spot_only: false,
                },
                Tier {
                    source: pool_index,
                    confidence: PriceConfidence::Medium,
                    spot_only: false,
                },
                Tier {
                    source: dex_spot,
                    confidence: PriceConfidence::Low,
                    spot_only: true,
                },
            ],
            recency_window: Duration::hours(24),
            nominal_price: Decimal::new(1, 2),
        }
    }

    pub fn with_recency_window(mut self, window: Duration) -> Self {
        self.recency_window = window;
        self
    }

    pub fn with_nominal_price(mut self, price: Decimal) -> Self {
        self.nominal_price = price;
        self
    }

    fn is_recent(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp > Utc::now() - self.recency_window
    }

    pub async fn resolve_token_price(
        &self,
        contract: &str,
        chain: Chain,
        timestamp: DateTime<Utc>,
        symbol: Option<&str>,
    ) -> PriceQuote {
        let label = symbol.unwrap_or(contract);
        if contract.trim().is_empty() {
            warn!("No contract address for {}, using nominal price", label);
            return PriceQuote::fallback(self.nominal_price);
        }

        let cache_key = token_price_cache_key(chain, contract, timestamp);
        if let Some(quote) = self.cache.get_json::<PriceQuote>(&cache_key).await {
            return quote;
        }

        for tier in &self.tiers {
            let source = tier.source.contract_source();
            if tier.spot_only && !self.is_recent(timestamp) {
                debug!("Skipping {} for {}: timestamp {} is not recent", source, label, timestamp);
                continue;
            }

            let result: Result<Decimal, ProviderError> =
                tier.source.contract_price(contract, chain, timestamp).await;

            match result {
                Ok(price) => {
                    debug!("{} priced {} on {} at ${}", source, label, chain, price);
                    let quote = PriceQuote::new(price, source, tier.confidence);
                    // keyed by timestamp, so a spot price stands for that moment too
                    self.cache
                        .set_json(&cache_key, &quote, CacheTier::HistoricalPrice)
                        .await;
                    return quote;
                }
                Err(e) => {
                    debug!("{} could not price {} on {}: {}", source, label, chain, e);
                }
            }
        }

        warn!(
            "No price found for token {} ({}) on {} at {}",
            contract, label, chain, timestamp
        );
        PriceQuote::fallback(self.nominal_price)
    }
}

#[async_trait]
impl ContractPriceResolver for DynamicContractPriceResolver {
    async fn resolve_contract(
        &self,
        contract: &str,
        chain: Chain,
        timestamp: DateTime<Utc>,
        symbol: Option<&str>,
    ) -> PriceQuote {
        self.resolve_token_price(contract, chain, timestamp, symbol)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{as_contract, memory_cache, ScriptedSource};
    use rust_decimal_macros::dec;
    use tax_core::PriceSource;

    const TOKEN: &str = "0xAbCdEf0000000000000000000000000000000001";

    fn not_found(source: PriceSource) -> Arc<ScriptedSource> {
        ScriptedSource::failing(source, ProviderError::NotFound("none".to_string()))
    }

    #[tokio::test]
    async fn test_unlisted_token_priced_from_dex_pools() {
        let (_, cache) = memory_cache();
        let coingecko = ScriptedSource::failing(
            PriceSource::CoinGecko,
            ProviderError::Mapping(TOKEN.to_string()),
        );
        let pools = ScriptedSource::ok(PriceSource::GeckoTerminal, dec!(0.0042));
        let spot = ScriptedSource::ok(PriceSource::DexScreener, dec!(0.0043));
        let resolver = DynamicContractPriceResolver::new(
            cache.clone(),
            as_contract(&coingecko),
            as_contract(&pools),
            as_contract(&spot),
        );
        let ts = Utc::now() - Duration::days(3);

        let quote = resolver
            .resolve_token_price(TOKEN, Chain::Ethereum, ts, Some("NEWT"))
            .await;
        assert_eq!(quote.price, dec!(0.0042));
        assert_eq!(quote.source, PriceSource::GeckoTerminal);
        assert_eq!(quote.confidence, PriceConfidence::Medium);
        assert_eq!(spot.calls(), 0);

        let cached = cache
            .get_json::<PriceQuote>(&token_price_cache_key(Chain::Ethereum, TOKEN, ts))
            .await;
        assert_eq!(cached, Some(quote));
    }

    #[tokio::test]
    async fn test_repeat_lookup_served_from_cache() {
        let (_, cache) = memory_cache();
        let coingecko = ScriptedSource::ok(PriceSource::CoinGecko, dec!(14.1));
        let resolver = DynamicContractPriceResolver::new(
            cache,
            as_contract(&coingecko),
            as_contract(&not_found(PriceSource::GeckoTerminal)),
            as_contract(&not_found(PriceSource::DexScreener)),
        );
        let ts = Utc::now() - Duration::days(10);

        let first = resolver.resolve_token_price(TOKEN, Chain::Ethereum, ts, None).await;
        // differently-cased address maps to the same key
        let second = resolver
            .resolve_token_price(&TOKEN.to_lowercase(), Chain::Ethereum, ts, None)
            .await;
        assert_eq!(first, second);
        assert_eq!(first.confidence, PriceConfidence::High);
        assert_eq!(coingecko.calls(), 1);
    }

    #[tokio::test]
    async fn test_dex_spot_only_for_recent_timestamps() {
        let (_, cache) = memory_cache();
        let spot = ScriptedSource::ok(PriceSource::DexScreener, dec!(0.5));
        let resolver = DynamicContractPriceResolver::new(
            cache,
            as_contract(&not_found(PriceSource::CoinGecko)),
            as_contract(&not_found(PriceSource::GeckoTerminal)),
            as_contract(&spot),
        );

        let recent = resolver
            .resolve_token_price(TOKEN, Chain::Base, Utc::now() - Duration::hours(2), None)
            .await;
        assert_eq!(recent.source, PriceSource::DexScreener);
        assert_eq!(recent.confidence, PriceConfidence::Low);

        let old = resolver
            .resolve_token_price(TOKEN, Chain::Base, Utc::now() - Duration::days(2), None)
            .await;
        assert_eq!(old.price, dec!(0.01));
        assert_eq!(old.confidence, PriceConfidence::None);
        assert_eq!(spot.calls(), 1);
    }

    #[tokio::test]
    async fn test_nominal_fallback_is_not_cached() {
        let (store, cache) = memory_cache();
        let coingecko = not_found(PriceSource::CoinGecko);
        let resolver = DynamicContractPriceResolver::new(
            cache,
            as_contract(&coingecko),
            as_contract(&not_found(PriceSource::GeckoTerminal)),
            as_contract(&not_found(PriceSource::DexScreener)),
        );
        let ts = Utc::now() - Duration::days(30);

        let quote = resolver.resolve_token_price(TOKEN, Chain::Polygon, ts, None).await;
        assert!(quote.is_fallback());
        assert!(store.is_empty().await);

        resolver.resolve_token_price(TOKEN, Chain::Polygon, ts, None).await;
        assert_eq!(coingecko.calls(), 2);
    }

    #[tokio::test]
    async fn test_spot_result_kept_for_historical_ttl() {
        let store = Arc::new(cache_store::MemoryCache::new());
        let ttls = cache_store::CacheTtls {
            historical_price: std::time::Duration::from_secs(3600),
            current_price: std::time::Duration::from_millis(5),
            ..Default::default()
        };
        let cache = TieredCache::new(store.clone(), ttls);
        let spot = ScriptedSource::ok(PriceSource::DexScreener, dec!(0.07));
        let resolver = DynamicContractPriceResolver::new(
            cache.clone(),
            as_contract(&not_found(PriceSource::CoinGecko)),
            as_contract(&not_found(PriceSource::GeckoTerminal)),
            as_contract(&spot),
        );
        let ts = Utc::now() - Duration::minutes(30);

        let first = resolver.resolve_token_price(TOKEN, Chain::Base, ts, None).await;
        assert_eq!(first.confidence, PriceConfidence::Low);

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        let again = resolver.resolve_token_price(TOKEN, Chain::Base, ts, None).await;
        assert_eq!(again, first);
        assert_eq!(spot.calls(), 1);
    }

    #[tokio::test]
    async fn test_confidence_follows_tier_order() {
        let ts = Utc::now() - Duration::hours(1);
        let mut seen = Vec::new();

        for failing in 0..4 {
            let (_, cache) = memory_cache();
            let make = |index: usize, source: PriceSource| {
                if index < failing {
                    not_found(source)
                } else {
                    ScriptedSource::ok(source, dec!(1.5))
                }
            };
            let resolver = DynamicContractPriceResolver::new(
                cache,
                as_contract(&make(0, PriceSource::CoinGecko)),
                as_contract(&make(1, PriceSource::GeckoTerminal)),
                as_contract(&make(2, PriceSource::DexScreener)),
            );
            seen.push(
                resolver
                    .resolve_token_price(TOKEN, Chain::Arbitrum, ts, None)
                    .await
                    .confidence,
            );
        }

        assert_eq!(
            seen,
            vec![
                PriceConfidence::High,
                PriceConfidence::Medium,
                PriceConfidence::Low,
                PriceConfidence::None
            ]
        );
    }
}
