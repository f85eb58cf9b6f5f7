pub mod binance;
pub mod coingecko;
pub mod cryptocompare;
pub mod dexscreener;
pub mod geckoterminal;
pub mod http;
pub mod symbol_map;

pub use binance::BinanceClient;
pub use coingecko::{CoinGeckoClient, CoinGeckoConfig};
pub use cryptocompare::{CryptoCompareClient, CryptoCompareConfig};
pub use dexscreener::DexScreenerClient;
pub use geckoterminal::{GeckoTerminalClient, PoolCandidate};
pub use symbol_map::{coingecko_id, is_known_symbol, is_stablecoin, static_default_price};
