//! Chain-data fetchers feeding the classifiers: Solana JSON-RPC (with DAS
//! mint metadata) and Alchemy's enhanced EVM APIs.

pub mod address;
pub mod alchemy;
pub mod error;
pub mod rpc;
pub mod solana_rpc;

pub use address::validate_address;
pub use alchemy::{AlchemyClient, AlchemyConfig, TransferDirection};
pub use error::FetchError;
pub use solana_rpc::{SignatureInfo, SolanaRpcClient, SolanaRpcConfig};
