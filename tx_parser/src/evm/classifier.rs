use super::routers::RouterRegistry;
use super::types::AssetTransfer;
use crate::metadata::{
    lookup_metadata, metadata_cache_key, MetadataMemo, TokenMetadata, TokenMetadataProvider,
};
use crate::{ParseError, Result};
use async_trait::async_trait;
use cache_store::TieredCache;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tax_core::{
    decimal_from_json, parse_quantity, scale_base_units, sort_chronologically, AssetRef,
    CanonicalTransaction, Chain, ContractPriceResolver, ProviderError, SymbolPriceResolver,
    TransactionType,
};
use tracing::{debug, info, warn};

const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Resolves the timestamp of a block
#[async_trait]
pub trait BlockTimestampSource: Send + Sync {
    async fn block_timestamp(
        &self,
        chain: Chain,
        block_number: u64,
    ) -> std::result::Result<DateTime<Utc>, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outgoing,
    Incoming,
}

/// Per-call lookups shared by both passes
#[derive(Default)]
struct CallMemo {
    blocks: HashMap<u64, Option<DateTime<Utc>>>,
    metadata: MetadataMemo,
}

/// Classifies indexed transfer lists for EVM chains
pub struct EvmTransferClassifier {
    symbol_prices: Arc<dyn SymbolPriceResolver>,
    contract_prices: Arc<dyn ContractPriceResolver>,
    metadata: Option<Arc<dyn TokenMetadataProvider>>,
    blocks: Option<Arc<dyn BlockTimestampSource>>,
    cache: Option<TieredCache>,
    routers: RouterRegistry,
}

impl EvmTransferClassifier {
    pub fn new(
        symbol_prices: Arc<dyn SymbolPriceResolver>,
        contract_prices: Arc<dyn ContractPriceResolver>,
    ) -> Self {
        Self {
            symbol_prices,
            contract_prices,
            metadata: None,
            blocks: None,
            cache: None,
            routers: RouterRegistry::builtin(),
        }
    }

    pub fn with_metadata(mut self, provider: Arc<dyn TokenMetadataProvider>) -> Self {
        self.metadata = Some(provider);
        self
    }

    pub fn with_block_source(mut self, blocks: Arc<dyn BlockTimestampSource>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    pub fn with_cache(mut self, cache: TieredCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_routers(mut self, routers: RouterRegistry) -> Self {
        self.routers = routers;
        self
    }

    /// Classify the outgoing and incoming transfer lists of `address`.
    ///
    /// Incoming records sent by `address` itself are dropped since the
    /// outgoing pass already counted them.
    pub async fn classify(
        &self,
        chain: Chain,
        outgoing: &[Value],
        incoming: &[Value],
        address: &str,
    ) -> Vec<CanonicalTransaction> {
        let mut memo = CallMemo::default();
        let mut records = Vec::with_capacity(outgoing.len() + incoming.len());

        let passes = [(Direction::Outgoing, outgoing), (Direction::Incoming, incoming)];
        for (direction, items) in passes {
            for item in items {
                let transfer: AssetTransfer = match serde_json::from_value(item.clone()) {
                    Ok(transfer) => transfer,
                    Err(e) => {
                        warn!("Skipping malformed {} transfer: {}", chain, e);
                        continue;
                    }
                };

                match self
                    .classify_transfer(chain, &transfer, direction, address, &mut memo)
                    .await
                {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(e) => warn!(
                        "Skipping {} transfer {}: {}",
                        chain,
                        transfer.hash.as_deref().unwrap_or("<no hash>"),
                        e
                    ),
                }
            }
        }

        sort_chronologically(&mut records);
        info!(
            "Classified {} outgoing and {} incoming {} transfers into {} records for {}",
            outgoing.len(),
            incoming.len(),
            chain,
            records.len(),
            address
        );
        records
    }

    async fn classify_transfer(
        &self,
        chain: Chain,
        transfer: &AssetTransfer,
        direction: Direction,
        address: &str,
        memo: &mut CallMemo,
    ) -> Result<Option<CanonicalTransaction>> {
        let hash = required(&transfer.hash, "hash")?;
        let from = required(&transfer.from, "from")?;
        let to = required(&transfer.to, "to")?;

        if direction == Direction::Incoming && from.eq_ignore_ascii_case(address) {
            debug!("{}: incoming record sent by the queried address, already counted", hash);
            return Ok(None);
        }

        let timestamp = self
            .transfer_timestamp(chain, transfer, memo)
            .await
            .ok_or_else(|| ParseError::MissingData(format!("timestamp for {}", hash)))?;

        let contract = transfer.contract_address();
        let metadata = match contract {
            Some(contract) => self.token_metadata(chain, contract, memo).await,
            None => None,
        };

        let (symbol, decimals) = match contract {
            Some(contract) => {
                let symbol = metadata
                    .as_ref()
                    .and_then(|m| m.usable_symbol())
                    .or_else(|| transfer.asset.as_deref().filter(|a| !a.trim().is_empty()))
                    .map(str::to_string)
                    .unwrap_or_else(|| placeholder_symbol(contract));
                let decimals = transfer
                    .raw_decimals()
                    .or_else(|| metadata.as_ref().and_then(|m| m.decimals))
                    .unwrap_or(DEFAULT_TOKEN_DECIMALS);
                (symbol, decimals)
            }
            None => {
                let symbol = transfer
                    .asset
                    .as_deref()
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or(chain.native_symbol())
                    .to_string();
                (symbol, chain.native_decimals())
            }
        };

        let amount = transfer
            .raw_value()
            .and_then(parse_quantity)
            .and_then(|raw| scale_base_units(raw, decimals))
            .or_else(|| transfer.value.as_ref().and_then(decimal_from_json))
            .ok_or_else(|| ParseError::MissingData(format!("amount for {}", hash)))?;
        if amount.is_zero() {
            debug!("{}: zero-value transfer of {}", hash, symbol);
            return Ok(None);
        }

        let counterparty = match direction {
            Direction::Outgoing => to,
            Direction::Incoming => from,
        };
        let transaction_type = if self.routers.is_router(chain, counterparty) {
            TransactionType::Swap
        } else {
            match direction {
                Direction::Outgoing => TransactionType::Sell,
                Direction::Incoming => TransactionType::Buy,
            }
        };

        let quote = match contract {
            Some(contract) => {
                self.contract_prices
                    .resolve_contract(contract, chain, timestamp, Some(&symbol))
                    .await
            }
            None => self.symbol_prices.resolve_symbol(&symbol, timestamp).await,
        };

        debug!(
            "{}: {} {} {} at ${} ({})",
            hash, transaction_type, amount, symbol, quote.price, quote.source
        );

        let asset = match contract {
            Some(contract) => AssetRef::token(symbol, contract, decimals),
            None => AssetRef::native(&symbol, decimals),
        };

        let price = quote.price;
        CanonicalTransaction::new(
            hash,
            timestamp,
            transaction_type,
            asset,
            amount,
            &quote,
            Decimal::ZERO,
        )
        .map(Some)
        .ok_or_else(|| {
            ParseError::InvalidFormat(format!("value of {} at ${} overflows", amount, price))
        })
    }

    async fn transfer_timestamp(
        &self,
        chain: Chain,
        transfer: &AssetTransfer,
        memo: &mut CallMemo,
    ) -> Option<DateTime<Utc>> {
        if let Some(text) = transfer.block_timestamp() {
            match DateTime::parse_from_rfc3339(text) {
                Ok(ts) => return Some(ts.with_timezone(&Utc)),
                Err(e) => debug!("Unparseable blockTimestamp {:?}: {}", text, e),
            }
        }

        let block = transfer.block_num.as_deref().and_then(parse_quantity)?;
        let block = u64::try_from(block).ok()?;
        if let Some(cached) = memo.blocks.get(&block) {
            return *cached;
        }

        let blocks = self.blocks.as_ref()?;
        let resolved = match blocks.block_timestamp(chain, block).await {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!("Block {} timestamp lookup on {} failed: {}", block, chain, e);
                None
            }
        };
        memo.blocks.insert(block, resolved);
        resolved
    }

    async fn token_metadata(
        &self,
        chain: Chain,
        contract: &str,
        memo: &mut CallMemo,
    ) -> Option<TokenMetadata> {
        let provider = self.metadata.as_ref()?;
        lookup_metadata(
            self.cache.as_ref(),
            &mut memo.metadata,
            metadata_cache_key(chain, contract),
            || provider.token_metadata(contract, chain),
        )
        .await
    }
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ParseError::MissingData(name.to_string()))
}

fn placeholder_symbol(contract: &str) -> String {
    let prefix: String = contract.chars().take(8).collect();
    format!("TOKEN-{}", prefix)
}
