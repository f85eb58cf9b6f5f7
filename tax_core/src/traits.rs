use crate::chain::Chain;
use crate::error::{CacheError, ProviderError};
use crate::quote::{PriceQuote, PriceSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Duration;

/// Shared key-value store with per-key expiry.
///
/// Concurrent writers to one key race with last-write-wins semantics; values
/// are recomputations of the same fact so that is acceptable.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Looks up API keys by logical provider name ("coingecko", "alchemy", ...)
pub trait CredentialProvider: Send + Sync {
    fn get_key(&self, provider: &str) -> Option<String>;
}

/// A provider that can price a ticker at a past point in time
#[async_trait]
pub trait HistoricalPriceSource: Send + Sync {
    fn historical_source(&self) -> PriceSource;

    async fn historical_price(
        &self,
        symbol: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError>;
}

/// A provider that quotes the current price of a ticker
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    fn spot_source(&self) -> PriceSource;

    async fn spot_price(&self, symbol: &str) -> Result<Decimal, ProviderError>;
}

/// A provider that prices a token by its contract address or mint
#[async_trait]
pub trait ContractPriceSource: Send + Sync {
    fn contract_source(&self) -> PriceSource;

    async fn contract_price(
        &self,
        contract: &str,
        chain: Chain,
        timestamp: DateTime<Utc>,
    ) -> Result<Decimal, ProviderError>;
}

/// Symbol-based resolution that always produces a usable quote
#[async_trait]
pub trait SymbolPriceResolver: Send + Sync {
    async fn resolve_symbol(&self, symbol: &str, timestamp: DateTime<Utc>) -> PriceQuote;
}

/// Contract-based resolution that always produces a usable quote
#[async_trait]
pub trait ContractPriceResolver: Send + Sync {
    async fn resolve_contract(
        &self,
        contract: &str,
        chain: Chain,
        timestamp: DateTime<Utc>,
        symbol: Option<&str>,
    ) -> PriceQuote;
}
