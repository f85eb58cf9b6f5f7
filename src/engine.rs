use crate::error::{EngineError, Result};
use anyhow::Context;
use cache_store::{CacheTtls, MemoryCache, RedisCache, TieredCache};
use chain_client::address::{is_evm_address, is_solana_address};
use chain_client::{AlchemyClient, AlchemyConfig, SolanaRpcClient, SolanaRpcConfig};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use config_manager::SystemConfig;
use price_client::{
    is_known_symbol, BinanceClient, CoinGeckoClient, CoinGeckoConfig, CryptoCompareClient,
    CryptoCompareConfig, DexScreenerClient, GeckoTerminalClient,
};
use price_resolver::{DynamicContractPriceResolver, HistoricalPriceOrchestrator, LivePriceResolver};
use retry_utils::RetryPolicy;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tax_core::{
    sort_chronologically, CacheStore, CanonicalTransaction, Chain, ContractPriceResolver,
    ContractPriceSource, HistoricalPriceSource, PriceQuote, SpotPriceSource, SymbolPriceResolver,
};
use tracing::{debug, info, warn};
use tx_parser::{
    ClassifierThresholds, EvmTransferClassifier, RouterRegistry, SolanaTransactionClassifier,
};

const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// One wallet's raw chain data, ready for classification
#[derive(Debug, Clone)]
pub enum ClassificationRequest {
    Solana {
        payload: Value,
        user: String,
    },
    Evm {
        chain: Chain,
        outgoing: Vec<Value>,
        incoming: Vec<Value>,
        address: String,
    },
}

/// Price resolution and classification behind one handle
pub struct TaxEngine {
    symbol_prices: Arc<dyn SymbolPriceResolver>,
    contract_prices: Arc<dyn ContractPriceResolver>,
    solana: SolanaTransactionClassifier,
    evm: EvmTransferClassifier,
    max_batch_size: usize,
}

impl TaxEngine {
    /// Engine over the given resolvers with default classifiers
    pub fn new(
        symbol_prices: Arc<dyn SymbolPriceResolver>,
        contract_prices: Arc<dyn ContractPriceResolver>,
    ) -> Self {
        Self {
            solana: SolanaTransactionClassifier::new(symbol_prices.clone(), contract_prices.clone()),
            evm: EvmTransferClassifier::new(symbol_prices.clone(), contract_prices.clone()),
            symbol_prices,
            contract_prices,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    pub fn with_solana_classifier(mut self, classifier: SolanaTransactionClassifier) -> Self {
        self.solana = classifier;
        self
    }

    pub fn with_evm_classifier(mut self, classifier: EvmTransferClassifier) -> Self {
        self.evm = classifier;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Wire every provider, resolver and classifier from configuration.
    ///
    /// The Solana RPC and Alchemy clients supply mint metadata, token metadata
    /// and block times. Without credentials they are left out with a warning
    /// and the classifiers fall back to their defaults.
    pub async fn from_config(config: &SystemConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn CacheStore> = if config.redis.enabled {
            info!("Using Redis cache at {}", config.redis.url);
            Arc::new(
                RedisCache::connect(&config.redis.url, &config.redis.key_prefix)
                    .await
                    .context("Failed to connect to Redis cache")?,
            )
        } else {
            info!("Using in-memory cache");
            Arc::new(MemoryCache::new())
        };
        let cache = TieredCache::new(store, CacheTtls::from(&config.cache));
        let credentials = config.credentials();
        let providers = &config.price_providers;
        let retry = RetryPolicy::new(
            config.retry.max_retries,
            Duration::from_millis(config.retry.base_delay_ms),
        );

        let coingecko = Arc::new(
            CoinGeckoClient::new(CoinGeckoConfig::from_settings(providers, &credentials))
                .context("Failed to build CoinGecko client")?
                .with_cache(cache.clone()),
        );
        let cryptocompare = Arc::new(
            CryptoCompareClient::new(CryptoCompareConfig::from_settings(providers, &credentials))
                .context("Failed to build CryptoCompare client")?,
        );
        let binance =
            Arc::new(BinanceClient::from_settings(providers).context("Failed to build Binance client")?);
        let geckoterminal = Arc::new(
            GeckoTerminalClient::from_settings(providers)
                .context("Failed to build GeckoTerminal client")?
                .with_cache(cache.clone()),
        );
        let dexscreener = Arc::new(
            DexScreenerClient::from_settings(providers)
                .context("Failed to build DexScreener client")?
                .with_cache(cache.clone()),
        );

        let spot_sources: Vec<Arc<dyn SpotPriceSource>> = vec![
            coingecko.clone() as Arc<dyn SpotPriceSource>,
            cryptocompare.clone(),
            binance,
        ];
        let live = LivePriceResolver::new(cache.clone(), spot_sources, config.retry.live_attempts);

        let historical_sources: Vec<Arc<dyn HistoricalPriceSource>> =
            vec![coingecko.clone() as Arc<dyn HistoricalPriceSource>, cryptocompare];
        let symbol_prices = HistoricalPriceOrchestrator::new(cache.clone(), historical_sources, retry.clone())
            .with_live(live)
            .with_nominal_price(decimal_setting(
                config.fallback.nominal_symbol_price,
                "fallback.nominal_symbol_price",
            )?);

        let coin_index: Arc<dyn ContractPriceSource> = coingecko;
        let contract_prices = DynamicContractPriceResolver::new(
            cache.clone(),
            coin_index,
            geckoterminal,
            dexscreener,
        )
        .with_recency_window(ChronoDuration::hours(providers.recency_window_hours))
        .with_nominal_price(decimal_setting(
            config.fallback.nominal_contract_price,
            "fallback.nominal_contract_price",
        )?);

        let symbol_prices: Arc<dyn SymbolPriceResolver> = Arc::new(symbol_prices);
        let contract_prices: Arc<dyn ContractPriceResolver> = Arc::new(contract_prices);

        let thresholds = ClassifierThresholds {
            native_dust_lamports: config.parser.native_dust_lamports,
            token_dust: decimal_setting(config.parser.token_dust, "parser.token_dust")?,
            fee_only_min_usd: decimal_setting(
                config.parser.fee_only_min_usd,
                "parser.fee_only_min_usd",
            )?,
        };

        let solana_rpc = match SolanaRpcConfig::from_settings(&config.solana, &credentials)
            .and_then(|settings| SolanaRpcClient::new(settings, retry.clone()))
        {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Solana mint metadata disabled: {}", e);
                None
            }
        };
        let alchemy = match AlchemyConfig::from_settings(&config.evm, &credentials)
            .and_then(|settings| AlchemyClient::new(settings, retry.clone()))
        {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("EVM token metadata and block lookups disabled: {}", e);
                None
            }
        };

        let mut solana = SolanaTransactionClassifier::new(symbol_prices.clone(), contract_prices.clone())
            .with_cache(cache.clone())
            .with_thresholds(thresholds);
        if let Some(client) = &solana_rpc {
            solana = solana.with_metadata(Arc::new(client.clone()));
        }

        let mut evm = EvmTransferClassifier::new(symbol_prices.clone(), contract_prices.clone())
            .with_cache(cache)
            .with_routers(router_registry(config)?);
        if let Some(client) = &alchemy {
            evm = evm
                .with_metadata(Arc::new(client.clone()))
                .with_block_source(Arc::new(client.clone()));
        }

        info!(
            "Tax engine ready (solana metadata: {}, evm metadata: {})",
            solana_rpc.is_some(),
            alchemy.is_some()
        );

        Ok(Self {
            symbol_prices,
            contract_prices,
            solana,
            evm,
            max_batch_size: config.system.max_batch_size,
        })
    }

    /// USD price of a ticker or a contract/mint address at `timestamp`.
    ///
    /// Addresses go through the contract waterfall, anything else through the
    /// symbol waterfall. Always returns a quote.
    pub async fn resolve_price(
        &self,
        symbol_or_contract: &str,
        chain: Chain,
        timestamp: DateTime<Utc>,
    ) -> PriceQuote {
        let input = symbol_or_contract.trim();
        if is_contract_reference(input, chain) {
            debug!("Resolving {} as a {} contract", input, chain);
            self.contract_prices
                .resolve_contract(input, chain, timestamp, None)
                .await
        } else {
            self.symbol_prices.resolve_symbol(input, timestamp).await
        }
    }

    pub async fn classify_solana(&self, payload: &Value, user: &str) -> Vec<CanonicalTransaction> {
        self.solana.classify(payload, user).await
    }

    pub async fn classify_evm(
        &self,
        chain: Chain,
        outgoing: &[Value],
        incoming: &[Value],
        address: &str,
    ) -> Vec<CanonicalTransaction> {
        self.evm.classify(chain, outgoing, incoming, address).await
    }

    /// Classify several payloads one after another and merge them in
    /// chronological order
    pub async fn classify_batch(
        &self,
        requests: &[ClassificationRequest],
    ) -> Result<Vec<CanonicalTransaction>> {
        if requests.len() > self.max_batch_size {
            return Err(EngineError::BatchTooLarge {
                size: requests.len(),
                max: self.max_batch_size,
            });
        }

        let mut records = Vec::new();
        for request in requests {
            let mut batch = match request {
                ClassificationRequest::Solana { payload, user } => {
                    self.classify_solana(payload, user).await
                }
                ClassificationRequest::Evm {
                    chain,
                    outgoing,
                    incoming,
                    address,
                } => self.classify_evm(*chain, outgoing, incoming, address).await,
            };
            records.append(&mut batch);
        }

        sort_chronologically(&mut records);
        info!(
            "Classified {} requests into {} records",
            requests.len(),
            records.len()
        );
        Ok(records)
    }
}

/// Hex addresses on EVM chains; base58 addresses on Solana unless the input
/// is a known ticker
fn is_contract_reference(input: &str, chain: Chain) -> bool {
    if chain.is_evm() {
        is_evm_address(input)
    } else {
        is_solana_address(input) && !is_known_symbol(input)
    }
}

fn decimal_setting(value: f64, name: &str) -> anyhow::Result<Decimal> {
    Decimal::try_from(value).with_context(|| format!("Invalid decimal setting {}: {}", name, value))
}

fn router_registry(config: &SystemConfig) -> anyhow::Result<RouterRegistry> {
    let mut registry = RouterRegistry::builtin();
    for (chain, addresses) in &config.evm.extra_routers {
        let chain: Chain = chain
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid chain in evm.extra_routers")?;
        registry = registry.with_extra(chain, addresses);
    }
    Ok(registry)
}
