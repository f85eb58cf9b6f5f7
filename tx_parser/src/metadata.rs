use async_trait::async_trait;
use cache_store::{CacheTier, TieredCache};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tax_core::{Chain, ProviderError};
use tracing::{debug, warn};

/// On-chain token description as reported by a metadata provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u8>,
}

impl TokenMetadata {
    /// Symbol, if the provider returned a usable one
    pub fn usable_symbol(&self) -> Option<&str> {
        self.symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("UNKNOWN"))
    }
}

/// Metadata for Solana SPL mints
#[async_trait]
pub trait MintMetadataSource: Send + Sync {
    async fn mint_metadata(&self, mint: &str) -> Result<Option<TokenMetadata>, ProviderError>;
}

/// Metadata for EVM token contracts
#[async_trait]
pub trait TokenMetadataProvider: Send + Sync {
    async fn token_metadata(
        &self,
        contract: &str,
        chain: Chain,
    ) -> Result<Option<TokenMetadata>, ProviderError>;
}

pub(crate) type MetadataMemo = HashMap<String, Option<TokenMetadata>>;

pub(crate) fn metadata_cache_key(chain: Chain, address: &str) -> String {
    format!("token_metadata:{}:{}", chain, chain.normalize_address(address))
}

/// Look up metadata through the per-call memo, then the shared cache, then
/// the provider. Provider failures are logged and remembered for the rest of
/// the call but never cached.
pub(crate) async fn lookup_metadata<F, Fut>(
    cache: Option<&TieredCache>,
    memo: &mut MetadataMemo,
    key: String,
    fetch: F,
) -> Option<TokenMetadata>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<TokenMetadata>, ProviderError>>,
{
    if let Some(entry) = memo.get(&key) {
        return entry.clone();
    }

    if let Some(cache) = cache {
        if let Some(metadata) = cache.get_json::<TokenMetadata>(&key).await {
            memo.insert(key, Some(metadata.clone()));
            return Some(metadata);
        }
    }

    let result = match fetch().await {
        Ok(Some(metadata)) => {
            debug!("Fetched token metadata for {}: {:?}", key, metadata);
            if let Some(cache) = cache {
                cache
                    .set_json(&key, &metadata, CacheTier::TokenMetadata)
                    .await;
            }
            Some(metadata)
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Token metadata lookup failed for {}: {}", key, e);
            None
        }
    };

    memo.insert(key, result.clone());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_store::{CacheTtls, MemoryCache};
    use std::sync::Arc;

    fn sample() -> TokenMetadata {
        TokenMetadata {
            symbol: Some("BONK".to_string()),
            name: Some("Bonk".to_string()),
            decimals: Some(5),
        }
    }

    #[test]
    fn test_usable_symbol() {
        assert_eq!(sample().usable_symbol(), Some("BONK"));
        let unknown = TokenMetadata {
            symbol: Some("UNKNOWN".to_string()),
            ..Default::default()
        };
        assert_eq!(unknown.usable_symbol(), None);
    }

    #[tokio::test]
    async fn test_memo_prevents_second_fetch() {
        let mut memo = MetadataMemo::new();
        let mut calls = 0;

        for _ in 0..2 {
            let found = lookup_metadata(None, &mut memo, "k".to_string(), || {
                calls += 1;
                async { Ok(Some(sample())) }
            })
            .await;
            assert_eq!(found, Some(sample()));
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_shared_cache_survives_calls() {
        let cache = TieredCache::new(Arc::new(MemoryCache::new()), CacheTtls::default());

        let mut first_call = MetadataMemo::new();
        lookup_metadata(Some(&cache), &mut first_call, "k".to_string(), || async {
            Ok(Some(sample()))
        })
        .await;

        let mut second_call = MetadataMemo::new();
        let found = lookup_metadata(Some(&cache), &mut second_call, "k".to_string(), || async {
            Err(ProviderError::Transient("down".to_string()))
        })
        .await;
        assert_eq!(found, Some(sample()));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let store = Arc::new(MemoryCache::new());
        let cache = TieredCache::new(store.clone(), CacheTtls::default());
        let mut memo = MetadataMemo::new();

        let found = lookup_metadata(Some(&cache), &mut memo, "k".to_string(), || async {
            Err(ProviderError::RateLimited)
        })
        .await;
        assert_eq!(found, None);
        assert!(store.is_empty().await);
    }
}
