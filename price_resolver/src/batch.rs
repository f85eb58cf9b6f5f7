//! Batch price lookups keyed by transaction hash.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tax_core::{Chain, ContractPriceResolver, PriceQuote, SymbolPriceResolver};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractPriceRequest {
    pub tx_hash: String,
    pub contract: String,
    pub chain: Chain,
    pub timestamp: DateTime<Utc>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolPriceRequest {
    pub tx_hash: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
}

/// Price many contract transfers, grouped per token.
///
/// Groups keep first-seen order and each group resolves one timestamp at a
/// time in ascending order, so repeated timestamps hit the result cache.
pub async fn resolve_contract_batch(
    resolver: &dyn ContractPriceResolver,
    requests: &[ContractPriceRequest],
) -> HashMap<String, PriceQuote> {
    let mut order: Vec<(Chain, String)> = Vec::new();
    let mut groups: HashMap<(Chain, String), Vec<&ContractPriceRequest>> = HashMap::new();

    for request in requests {
        let key = (request.chain, request.chain.normalize_address(&request.contract));
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(request);
    }

    let mut results = HashMap::with_capacity(requests.len());
    for key in order {
        let Some(mut group) = groups.remove(&key) else {
            continue;
        };
        group.sort_by_key(|request| request.timestamp);

        if let (Some(first), Some(last)) = (group.first(), group.last()) {
            debug!(
                "Pricing {} transfers of {} on {} between {} and {}",
                group.len(),
                key.1,
                key.0,
                first.timestamp,
                last.timestamp
            );
        }

        // TODO: fetch one time series per token when a group spans many days
        for request in group {
            let quote = resolver
                .resolve_contract(
                    &request.contract,
                    request.chain,
                    request.timestamp,
                    request.symbol.as_deref(),
                )
                .await;
            results.insert(request.tx_hash.clone(), quote);
        }
    }

    results
}

/// Price many symbol transfers one after another
pub async fn resolve_symbol_batch(
    resolver: &dyn SymbolPriceResolver,
    requests: &[SymbolPriceRequest],
) -> HashMap<String, PriceQuote> {
    let mut results = HashMap::with_capacity(requests.len());
    for request in requests {
        let quote = resolver
            .resolve_symbol(&request.symbol, request.timestamp)
            .await;
        results.insert(request.tx_hash.clone(), quote);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::sync::Mutex;
    use tax_core::{PriceConfidence, PriceSource};

    #[derive(Default)]
    struct RecordingResolver {
        calls: Mutex<Vec<(String, i64)>>,
    }

    #[async_trait]
    impl ContractPriceResolver for RecordingResolver {
        async fn resolve_contract(
            &self,
            contract: &str,
            _chain: Chain,
            timestamp: DateTime<Utc>,
            _symbol: Option<&str>,
        ) -> PriceQuote {
            self.calls
                .lock()
                .unwrap()
                .push((contract.to_string(), timestamp.timestamp()));
            PriceQuote::new(
                Decimal::from(timestamp.timestamp()),
                PriceSource::GeckoTerminal,
                PriceConfidence::Medium,
            )
        }
    }

    #[async_trait]
    impl SymbolPriceResolver for RecordingResolver {
        async fn resolve_symbol(&self, symbol: &str, timestamp: DateTime<Utc>) -> PriceQuote {
            self.calls
                .lock()
                .unwrap()
                .push((symbol.to_string(), timestamp.timestamp()));
            PriceQuote::new(Decimal::ONE, PriceSource::CoinGecko, PriceConfidence::High)
        }
    }

    fn request(hash: &str, contract: &str, ts: i64) -> ContractPriceRequest {
        ContractPriceRequest {
            tx_hash: hash.to_string(),
            contract: contract.to_string(),
            chain: Chain::Ethereum,
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            symbol: None,
        }
    }

    #[tokio::test]
    async fn test_grouped_by_contract_in_time_order() {
        let resolver = RecordingResolver::default();
        let requests = vec![
            request("0x1", "0xAAA", 300),
            request("0x2", "0xbbb", 100),
            request("0x3", "0xaaa", 200),
        ];

        let results = resolve_contract_batch(&resolver, &requests).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results["0x3"].price, Decimal::from(200));
        let calls = resolver.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("0xaaa".to_string(), 200),
                ("0xAAA".to_string(), 300),
                ("0xbbb".to_string(), 100),
            ]
        );
    }

    #[tokio::test]
    async fn test_symbol_batch_keyed_by_hash() {
        let resolver = RecordingResolver::default();
        let requests = vec![
            SymbolPriceRequest {
                tx_hash: "a".to_string(),
                symbol: "ETH".to_string(),
                timestamp: Utc.timestamp_opt(1, 0).unwrap(),
            },
            SymbolPriceRequest {
                tx_hash: "b".to_string(),
                symbol: "BTC".to_string(),
                timestamp: Utc.timestamp_opt(2, 0).unwrap(),
            },
        ];

        let results = resolve_symbol_batch(&resolver, &requests).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results["b"].confidence, PriceConfidence::High);
    }
}
