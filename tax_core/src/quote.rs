use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust label attached to a resolved price.
///
/// Ordering follows trust: `None < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceConfidence {
    None,
    Low,
    Medium,
    High,
}

impl PriceConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceConfidence::None => "none",
            PriceConfidence::Low => "low",
            PriceConfidence::Medium => "medium",
            PriceConfidence::High => "high",
        }
    }
}

impl fmt::Display for PriceConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance tag for a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Coin-index historical endpoint
    CoinGecko,
    /// Pair-index hourly history
    CryptoCompare,
    CoinGeckoSpot,
    CryptoCompareSpot,
    BinanceSpot,
    /// DEX pool aggregation
    GeckoTerminal,
    /// DEX pair spot price
    DexScreener,
    /// Last known price kept past its freshness window
    ExpiredCache,
    /// Built-in price for a major asset
    StaticDefault,
    /// Pegged stablecoin shortcut
    Stablecoin,
    /// Nominal price when nothing else answered
    Fallback,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::CoinGecko => "coingecko",
            PriceSource::CryptoCompare => "cryptocompare",
            PriceSource::CoinGeckoSpot => "coingecko_spot",
            PriceSource::CryptoCompareSpot => "cryptocompare_spot",
            PriceSource::BinanceSpot => "binance_spot",
            PriceSource::GeckoTerminal => "geckoterminal",
            PriceSource::DexScreener => "dexscreener",
            PriceSource::ExpiredCache => "expired_cache",
            PriceSource::StaticDefault => "static_default",
            PriceSource::Stablecoin => "stablecoin",
            PriceSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A USD price together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Decimal,
    pub source: PriceSource,
    pub confidence: PriceConfidence,
}

impl PriceQuote {
    pub fn new(price: Decimal, source: PriceSource, confidence: PriceConfidence) -> Self {
        Self {
            price,
            source,
            confidence,
        }
    }

    /// Terminal answer when every tier failed
    pub fn fallback(price: Decimal) -> Self {
        Self::new(price, PriceSource::Fallback, PriceConfidence::None)
    }

    pub fn stablecoin() -> Self {
        Self::new(Decimal::ONE, PriceSource::Stablecoin, PriceConfidence::High)
    }

    pub fn is_fallback(&self) -> bool {
        self.confidence == PriceConfidence::None
    }
}
