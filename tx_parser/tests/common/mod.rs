#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tax_core::{
    Chain, ContractPriceResolver, PriceConfidence, PriceQuote, PriceSource, ProviderError,
    SymbolPriceResolver,
};
use tx_parser::{BlockTimestampSource, MintMetadataSource, TokenMetadata, TokenMetadataProvider};

/// Symbol resolver answering from a fixed table, nominal fallback otherwise
#[derive(Default)]
pub struct FixedSymbolPrices {
    prices: HashMap<String, Decimal>,
    pub calls: Mutex<Vec<String>>,
}

impl FixedSymbolPrices {
    pub fn with(mut self, symbol: &str, price: Decimal) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }
}

#[async_trait]
impl SymbolPriceResolver for FixedSymbolPrices {
    async fn resolve_symbol(&self, symbol: &str, _timestamp: DateTime<Utc>) -> PriceQuote {
        self.calls.lock().unwrap().push(symbol.to_string());
        match self.prices.get(symbol) {
            Some(price) => PriceQuote::new(*price, PriceSource::CoinGecko, PriceConfidence::High),
            None => PriceQuote::fallback(Decimal::ONE),
        }
    }
}

/// Contract resolver with one price for every token
pub struct FixedContractPrices {
    price: Decimal,
    pub calls: Mutex<Vec<(String, Chain, Option<String>)>>,
}

impl FixedContractPrices {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ContractPriceResolver for FixedContractPrices {
    async fn resolve_contract(
        &self,
        contract: &str,
        chain: Chain,
        _timestamp: DateTime<Utc>,
        symbol: Option<&str>,
    ) -> PriceQuote {
        self.calls.lock().unwrap().push((
            contract.to_string(),
            chain,
            symbol.map(str::to_string),
        ));
        PriceQuote::new(self.price, PriceSource::GeckoTerminal, PriceConfidence::Medium)
    }
}

/// Metadata source serving both chains from one table
#[derive(Default)]
pub struct FixedMetadata {
    entries: HashMap<String, TokenMetadata>,
    pub calls: Mutex<usize>,
}

impl FixedMetadata {
    pub fn with(mut self, address: &str, symbol: &str, decimals: u8) -> Self {
        self.entries.insert(
            address.to_lowercase(),
            TokenMetadata {
                symbol: Some(symbol.to_string()),
                name: None,
                decimals: Some(decimals),
            },
        );
        self
    }

    fn lookup(&self, address: &str) -> Option<TokenMetadata> {
        *self.calls.lock().unwrap() += 1;
        self.entries.get(&address.to_lowercase()).cloned()
    }
}

#[async_trait]
impl MintMetadataSource for FixedMetadata {
    async fn mint_metadata(&self, mint: &str) -> Result<Option<TokenMetadata>, ProviderError> {
        Ok(self.lookup(mint))
    }
}

#[async_trait]
impl TokenMetadataProvider for FixedMetadata {
    async fn token_metadata(
        &self,
        contract: &str,
        _chain: Chain,
    ) -> Result<Option<TokenMetadata>, ProviderError> {
        Ok(self.lookup(contract))
    }
}

/// Block clock where block `n` was produced at `base + n * 12` seconds
pub struct LinearBlocks {
    base: i64,
    pub calls: Mutex<Vec<u64>>,
}

impl LinearBlocks {
    pub fn new(base: i64) -> Self {
        Self {
            base,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BlockTimestampSource for LinearBlocks {
    async fn block_timestamp(
        &self,
        _chain: Chain,
        block_number: u64,
    ) -> Result<DateTime<Utc>, ProviderError> {
        self.calls.lock().unwrap().push(block_number);
        DateTime::from_timestamp(self.base + block_number as i64 * 12, 0)
            .ok_or_else(|| ProviderError::DataShape("bad block".to_string()))
    }
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
