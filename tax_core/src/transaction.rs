use crate::quote::{PriceConfidence, PriceQuote, PriceSource};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Economic meaning of a canonical record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Sell,
    Swap,
    Transfer,
    Stake,
    Unstake,
    Reward,
    Fee,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
            TransactionType::Swap => "swap",
            TransactionType::Transfer => "transfer",
            TransactionType::Stake => "stake",
            TransactionType::Unstake => "unstake",
            TransactionType::Reward => "reward",
            TransactionType::Fee => "fee",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset identity carried by a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub symbol: String,
    /// Contract address or mint; `None` for the chain's native asset
    pub contract: Option<String>,
    pub decimals: u8,
}

impl AssetRef {
    pub fn native(symbol: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            contract: None,
            decimals,
        }
    }

    pub fn token(symbol: impl Into<String>, contract: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            contract: Some(contract.into()),
            decimals,
        }
    }
}

/// Normalized, chain-agnostic, USD-valued record for downstream tax work.
///
/// Fields are private so that `value_usd == amount * price_usd` and
/// `amount >= 0` hold for every instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTransaction {
    hash: String,
    timestamp: DateTime<Utc>,
    transaction_type: TransactionType,
    asset_symbol: String,
    contract_address: Option<String>,
    amount: Decimal,
    token_decimals: u8,
    price_usd: Decimal,
    value_usd: Decimal,
    fee_usd: Decimal,
    price_source: PriceSource,
    price_confidence: PriceConfidence,
}

impl CanonicalTransaction {
    /// `None` when `amount * price` does not fit in a `Decimal`
    pub fn new(
        hash: impl Into<String>,
        timestamp: DateTime<Utc>,
        transaction_type: TransactionType,
        asset: AssetRef,
        amount: Decimal,
        quote: &PriceQuote,
        fee_usd: Decimal,
    ) -> Option<Self> {
        let amount = amount.abs();
        let value_usd = amount.checked_mul(quote.price)?;
        Some(Self {
            hash: hash.into(),
            timestamp,
            transaction_type,
            asset_symbol: asset.symbol,
            contract_address: asset.contract,
            amount,
            token_decimals: asset.decimals,
            price_usd: quote.price,
            value_usd,
            fee_usd: fee_usd.abs(),
            price_source: quote.source,
            price_confidence: quote.confidence,
        })
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn asset_symbol(&self) -> &str {
        &self.asset_symbol
    }

    pub fn contract_address(&self) -> Option<&str> {
        self.contract_address.as_deref()
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn token_decimals(&self) -> u8 {
        self.token_decimals
    }

    pub fn price_usd(&self) -> Decimal {
        self.price_usd
    }

    pub fn value_usd(&self) -> Decimal {
        self.value_usd
    }

    pub fn fee_usd(&self) -> Decimal {
        self.fee_usd
    }

    pub fn price_source(&self) -> PriceSource {
        self.price_source
    }

    pub fn price_confidence(&self) -> PriceConfidence {
        self.price_confidence
    }
}

/// Stable ascending sort by timestamp; records of one transaction keep their
/// emission order.
pub fn sort_chronologically(records: &mut [CanonicalTransaction]) {
    records.sort_by_key(|r| r.timestamp);
}
