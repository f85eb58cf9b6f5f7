use config_manager::CacheConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tax_core::CacheStore;
use tracing::{debug, warn};

/// Expiry class of a cached value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    TokenMetadata,
    HistoricalPrice,
    PoolDiscovery,
    CurrentPrice,
    ContractMapping,
    /// Last known prices backing the expired-entry fallback
    StaleRetention,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::TokenMetadata => "token_metadata",
            CacheTier::HistoricalPrice => "historical_price",
            CacheTier::PoolDiscovery => "pool_discovery",
            CacheTier::CurrentPrice => "current_price",
            CacheTier::ContractMapping => "contract_mapping",
            CacheTier::StaleRetention => "stale_retention",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub token_metadata: Duration,
    pub historical_price: Duration,
    pub pool_discovery: Duration,
    pub current_price: Duration,
    pub contract_mapping: Duration,
    pub stale_retention: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            token_metadata: Duration::from_secs(7 * 24 * 3600),
            historical_price: Duration::from_secs(24 * 3600),
            pool_discovery: Duration::from_secs(3600),
            current_price: Duration::from_secs(300),
            contract_mapping: Duration::from_secs(30 * 24 * 3600),
            stale_retention: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            token_metadata: Duration::from_secs(config.token_metadata_ttl_seconds),
            historical_price: Duration::from_secs(config.historical_price_ttl_seconds),
            pool_discovery: Duration::from_secs(config.pool_discovery_ttl_seconds),
            current_price: Duration::from_secs(config.current_price_ttl_seconds),
            contract_mapping: Duration::from_secs(config.contract_mapping_ttl_seconds),
            stale_retention: Duration::from_secs(config.stale_retention_seconds),
        }
    }
}

impl CacheTtls {
    pub fn ttl(&self, tier: CacheTier) -> Duration {
        match tier {
            CacheTier::TokenMetadata => self.token_metadata,
            CacheTier::HistoricalPrice => self.historical_price,
            CacheTier::PoolDiscovery => self.pool_discovery,
            CacheTier::CurrentPrice => self.current_price,
            CacheTier::ContractMapping => self.contract_mapping,
            CacheTier::StaleRetention => self.stale_retention,
        }
    }
}

/// Typed JSON view over a [`CacheStore`] with per-tier expiry.
///
/// Cache failures never reach callers: a failed read is a miss and a failed
/// write is logged and dropped.
#[derive(Clone)]
pub struct TieredCache {
    store: Arc<dyn CacheStore>,
    ttls: CacheTtls,
}

impl TieredCache {
    pub fn new(store: Arc<dyn CacheStore>, ttls: CacheTtls) -> Self {
        Self { store, ttls }
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("Cache hit: {}", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, tier: CacheTier) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };

        if let Err(e) = self.store.set(key, &raw, self.ttls.ttl(tier)).await {
            warn!("Cache write failed for {} ({}): {}", key, tier.as_str(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;
    use async_trait::async_trait;
    use serde::Deserialize;
    use tax_core::CacheError;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: String,
        count: u32,
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
    }

    #[test]
    fn test_default_ttls() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.ttl(CacheTier::TokenMetadata), Duration::from_secs(604_800));
        assert_eq!(ttls.ttl(CacheTier::HistoricalPrice), Duration::from_secs(86_400));
        assert_eq!(ttls.ttl(CacheTier::PoolDiscovery), Duration::from_secs(3_600));
        assert_eq!(ttls.ttl(CacheTier::CurrentPrice), Duration::from_secs(300));
        assert_eq!(ttls.ttl(CacheTier::ContractMapping), Duration::from_secs(2_592_000));
    }

    #[test]
    fn test_ttls_follow_config() {
        let mut config = config_manager::SystemConfig::default().cache;
        config.current_price_ttl_seconds = 42;
        let ttls = CacheTtls::from(&config);
        assert_eq!(ttls.current_price, Duration::from_secs(42));
        assert_eq!(ttls, CacheTtls { current_price: Duration::from_secs(42), ..CacheTtls::default() });
    }

    #[tokio::test]
    async fn test_json_round_trip_through_store() {
        let cache = TieredCache::new(Arc::new(MemoryCache::new()), CacheTtls::default());
        let sample = Sample {
            id: "bitcoin".to_string(),
            count: 2,
        };
        cache.set_json("k", &sample, CacheTier::ContractMapping).await;
        assert_eq!(cache.get_json::<Sample>("k").await, Some(sample));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(MemoryCache::new());
        store.set("k", "not json", Duration::from_secs(60)).await.unwrap();
        let cache = TieredCache::new(store, CacheTtls::default());
        assert_eq!(cache.get_json::<Sample>("k").await, None);
    }

    #[tokio::test]
    async fn test_backend_failure_is_a_miss() {
        let cache = TieredCache::new(Arc::new(BrokenStore), CacheTtls::default());
        cache.set_json("k", &1u32, CacheTier::CurrentPrice).await;
        assert_eq!(cache.get_json::<u32>("k").await, None);
    }
}
