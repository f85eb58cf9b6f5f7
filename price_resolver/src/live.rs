use cache_store::{CacheTier, TieredCache};
use price_client::symbol_map::normalize_symbol;
use retry_utils::{retry_with_policy, RetryPolicy};
use std::sync::Arc;
use tax_core::{PriceConfidence, PriceQuote, ProviderError, SpotPriceSource};
use tracing::{debug, warn};

/// Current price across several spot providers, used when no historical
/// provider could price a ticker.
pub struct LivePriceResolver {
    cache: TieredCache,
    providers: Vec<Arc<dyn SpotPriceSource>>,
    policy: RetryPolicy,
}

impl LivePriceResolver {
    /// `attempts_per_provider` includes the first call; retries are immediate
    pub fn new(
        cache: TieredCache,
        providers: Vec<Arc<dyn SpotPriceSource>>,
        attempts_per_provider: u32,
    ) -> Self {
        Self {
            cache,
            providers,
            policy: RetryPolicy::immediate(attempts_per_provider.saturating_sub(1)),
        }
    }

    /// First successful provider wins; `None` when all of them failed
    pub async fn spot_quote(&self, symbol: &str) -> Option<PriceQuote> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return None;
        }

        let cache_key = format!("current_price:{}", symbol);
        if let Some(quote) = self.cache.get_json::<PriceQuote>(&cache_key).await {
            return Some(quote);
        }

        for provider in &self.providers {
            let result = retry_with_policy(
                || provider.spot_price(&symbol),
                &self.policy,
                ProviderError::retry_class,
            )
            .await;

            match result {
                Ok(price) => {
                    debug!(
                        "Live price for {} from {}: ${}",
                        symbol,
                        provider.spot_source(),
                        price
                    );
                    let quote = PriceQuote::new(price, provider.spot_source(), PriceConfidence::Low);
                    self.cache
                        .set_json(&cache_key, &quote, CacheTier::CurrentPrice)
                        .await;
                    return Some(quote);
                }
                Err(e) => {
                    warn!(
                        "Live price from {} failed for {}: {}",
                        provider.spot_source(),
                        symbol,
                        e
                    );
                }
            }
        }

        None
    }
}
