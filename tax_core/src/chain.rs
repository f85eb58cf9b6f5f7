use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Blockchain networks the classifiers understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Ethereum,
    Arbitrum,
    Bsc,
    Polygon,
    Base,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
            Chain::Base => "base",
        }
    }

    /// Ticker of the gas/native asset
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Solana => "SOL",
            Chain::Ethereum | Chain::Arbitrum | Chain::Base => "ETH",
            Chain::Bsc => "BNB",
            Chain::Polygon => "MATIC",
        }
    }

    pub fn native_decimals(&self) -> u8 {
        match self {
            Chain::Solana => 9,
            _ => 18,
        }
    }

    /// Asset platform id used by CoinGecko's contract endpoints
    pub fn coingecko_platform(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum-one",
            Chain::Bsc => "binance-smart-chain",
            Chain::Polygon => "polygon-pos",
            Chain::Base => "base",
        }
    }

    /// Network id used by GeckoTerminal
    pub fn geckoterminal_network(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "eth",
            Chain::Arbitrum => "arbitrum",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon_pos",
            Chain::Base => "base",
        }
    }

    /// Chain id used by DexScreener pairs
    pub fn dexscreener_chain(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum",
            Chain::Bsc => "bsc",
            Chain::Polygon => "polygon",
            Chain::Base => "base",
        }
    }

    /// Network slug in Alchemy RPC hostnames
    pub fn alchemy_network(&self) -> &'static str {
        match self {
            Chain::Solana => "solana-mainnet",
            Chain::Ethereum => "eth-mainnet",
            Chain::Arbitrum => "arb-mainnet",
            Chain::Bsc => "bnb-mainnet",
            Chain::Polygon => "polygon-mainnet",
            Chain::Base => "base-mainnet",
        }
    }

    pub fn is_evm(&self) -> bool {
        !matches!(self, Chain::Solana)
    }

    /// Canonical form of an address on this chain.
    ///
    /// EVM addresses are case-insensitive hex and are lowercased; Solana
    /// base58 addresses are case-sensitive and only trimmed.
    pub fn normalize_address(&self, address: &str) -> String {
        let address = address.trim();
        if self.is_evm() {
            address.to_lowercase()
        } else {
            address.to_string()
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "solana" | "sol" => Ok(Chain::Solana),
            "ethereum" | "eth" | "eth-mainnet" => Ok(Chain::Ethereum),
            "arbitrum" | "arb" | "arbitrum-one" => Ok(Chain::Arbitrum),
            "bsc" | "binance" | "bnb" | "binance-smart-chain" => Ok(Chain::Bsc),
            "polygon" | "matic" | "polygon-pos" => Ok(Chain::Polygon),
            "base" | "base-mainnet" => Ok(Chain::Base),
            _ => Err(format!("Unsupported chain: '{}'", input)),
        }
    }
}
