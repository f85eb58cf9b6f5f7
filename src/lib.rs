//! Wallet tax ledger: USD-valued, classified transaction records from raw
//! Solana and EVM chain data.

pub mod engine;
pub mod error;
pub mod telemetry;

pub use engine::{ClassificationRequest, TaxEngine};
pub use error::EngineError;
pub use tax_core::{CanonicalTransaction, Chain, PriceConfidence, PriceQuote, PriceSource, TransactionType};
