pub mod chain;
pub mod error;
pub mod quote;
pub mod traits;
pub mod transaction;

pub use chain::Chain;
pub use error::{CacheError, ProviderError};
pub use quote::{PriceConfidence, PriceQuote, PriceSource};
pub use traits::{
    CacheStore, ContractPriceResolver, ContractPriceSource, CredentialProvider,
    HistoricalPriceSource, SpotPriceSource, SymbolPriceResolver,
};
pub use transaction::{sort_chronologically, AssetRef, CanonicalTransaction, TransactionType};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Scale an integer amount in base units by `10^decimals`.
///
/// Returns `None` when the decimal count exceeds what `Decimal` can represent
/// (28) or the raw value overflows.
pub fn scale_base_units(raw: u128, decimals: u8) -> Option<Decimal> {
    if decimals > 28 {
        return None;
    }
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, decimals as u32)
        .ok()
        .map(|d| d.normalize())
}

/// Read a decimal from a JSON number or numeric string
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Parse an unsigned integer written as `0x`-prefixed hex or plain decimal
pub fn parse_quantity(text: &str) -> Option<u128> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some("") => Some(0),
        Some(hex) => u128::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Whole-day bucket used in historical cache keys
pub fn date_bucket(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}
