//! In-memory price sources for resolver tests

use async_trait::async_trait;
use cache_store::{CacheTtls, MemoryCache, TieredCache};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tax_core::{
    Chain, ContractPriceSource, HistoricalPriceSource, PriceSource, ProviderError,
    SpotPriceSource,
};

pub fn memory_cache() -> (Arc<MemoryCache>, TieredCache) {
    let store = Arc::new(MemoryCache::new());
    let cache = TieredCache::new(store.clone(), CacheTtls::default());
    (store, cache)
}

/// Replays scripted results, repeating the last one once the script runs out
pub struct ScriptedSource {
    source: PriceSource,
    script: Mutex<Vec<Result<Decimal, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(source: PriceSource, script: Vec<Result<Decimal, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            source,
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn ok(source: PriceSource, price: Decimal) -> Arc<Self> {
        Self::new(source, vec![Ok(price)])
    }

    pub fn failing(source: PriceSource, error: ProviderError) -> Arc<Self> {
        Self::new(source, vec![Err(error)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Result<Decimal, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script
                .first()
                .cloned()
                .unwrap_or_else(|| Err(ProviderError::NotFound("empty script".to_string())))
        }
    }
}

#[async_trait]
impl HistoricalPriceSource for ScriptedSource {
    fn historical_source(&self) -> PriceSource {
        self.source
    }

    async fn historical_price(
        &self,
        _symbol: &str,
        _timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        self.next()
    }
}

#[async_trait]
impl SpotPriceSource for ScriptedSource {
    fn spot_source(&self) -> PriceSource {
        self.source
    }

    async fn spot_price(&self, _symbol: &str) -> Result<Decimal, ProviderError> {
        self.next()
    }
}

#[async_trait]
impl ContractPriceSource for ScriptedSource {
    fn contract_source(&self) -> PriceSource {
        self.source
    }

    async fn contract_price(
        &self,
        _contract: &str,
        _chain: Chain,
        _timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError> {
        self.next()
    }
}

pub fn as_spot(source: &Arc<ScriptedSource>) -> Arc<dyn SpotPriceSource> {
    source.clone()
}

pub fn as_historical(source: &Arc<ScriptedSource>) -> Arc<dyn HistoricalPriceSource> {
    source.clone()
}

pub fn as_contract(source: &Arc<ScriptedSource>) -> Arc<dyn ContractPriceSource> {
    source.clone()
}
