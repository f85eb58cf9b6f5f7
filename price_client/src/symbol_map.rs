//! Ticker lookups shared by the symbol-based price tiers.

use rust_decimal::Decimal;

const COINGECKO_IDS: &[(&str, &str)] = &[
    ("ETH", "ethereum"),
    ("BTC", "bitcoin"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
    ("BNB", "binancecoin"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("SOL", "solana"),
    ("TRX", "tron"),
    ("DOT", "polkadot"),
    ("MATIC", "matic-network"),
    ("AVAX", "avalanche-2"),
    ("SHIB", "shiba-inu"),
    ("WBTC", "wrapped-bitcoin"),
    ("WETH", "weth"),
    ("UNI", "uniswap"),
    ("LINK", "chainlink"),
    ("LEO", "leo-token"),
    ("LTC", "litecoin"),
    ("FTT", "ftx-token"),
    ("CRO", "crypto-com-coin"),
    ("NEAR", "near"),
    ("ATOM", "cosmos"),
    ("XLM", "stellar"),
    ("XMR", "monero"),
    ("BCH", "bitcoin-cash"),
    ("ALGO", "algorand"),
    ("VET", "vechain"),
    ("FLOW", "flow"),
    ("MANA", "decentraland"),
    ("SAND", "the-sandbox"),
    ("AXS", "axie-infinity"),
    ("HBAR", "hedera"),
    ("ICP", "internet-computer"),
    ("EGLD", "elrond-erd-2"),
    ("XTZ", "tezos"),
    ("THETA", "theta-token"),
    ("AAVE", "aave"),
    ("EOS", "eos"),
    ("GALA", "gala"),
    ("QNT", "quant-network"),
    ("CHZ", "chiliz"),
    ("KCS", "kucoin-shares"),
    ("CAKE", "pancakeswap-token"),
    ("FTM", "fantom"),
    ("GRT", "the-graph"),
    ("NEO", "neo"),
    ("MKR", "maker"),
    ("HT", "huobi-token"),
    ("RUNE", "thorchain"),
    ("ZEC", "zcash"),
    ("ENJ", "enjincoin"),
    ("APE", "apecoin"),
    ("STX", "blockstack"),
    ("BAT", "basic-attention-token"),
    ("DASH", "dash"),
    ("LDO", "lido-dao"),
    ("CRV", "curve-dao-token"),
    ("COMP", "compound-governance-token"),
    ("SNX", "havven"),
    ("IMX", "immutable-x"),
    ("TWT", "trust-wallet-token"),
    ("1INCH", "1inch"),
    ("RNDR", "render-token"),
    ("BLUR", "blur"),
    ("OP", "optimism"),
    ("INJ", "injective-protocol"),
    ("SUI", "sui"),
    ("PEPE", "pepe"),
    ("FLOKI", "floki"),
    ("ARB", "arbitrum"),
    ("WLD", "worldcoin"),
    ("TON", "the-open-network"),
    ("ORDI", "ordinals"),
    ("SATS", "sats-1000sats"),
    ("BONK", "bonk"),
    ("WIF", "dogwifhat"),
    ("JUP", "jupiter-exchange-solana"),
    ("RAY", "raydium"),
    ("VIRTUAL", "virtuals-protocol"),
    ("DAI", "dai"),
    ("BUSD", "binance-usd"),
];

const STABLECOINS: &[&str] = &["USDT", "USDC", "BUSD", "DAI", "TUSD", "USDP", "PYUSD", "FDUSD"];

/// Normalize a ticker for lookups
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// CoinGecko coin id for a ticker, if known
pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    let symbol = normalize_symbol(symbol);
    COINGECKO_IDS
        .iter()
        .find(|(ticker, _)| *ticker == symbol)
        .map(|(_, id)| *id)
}

/// Whether the ticker is priced by the symbol waterfall rather than by contract
pub fn is_known_symbol(symbol: &str) -> bool {
    coingecko_id(symbol).is_some()
}

pub fn is_stablecoin(symbol: &str) -> bool {
    let symbol = normalize_symbol(symbol);
    STABLECOINS.contains(&symbol.as_str())
}

/// Last-resort price for majors when every provider is down
pub fn static_default_price(symbol: &str) -> Option<Decimal> {
    let price = match normalize_symbol(symbol).as_str() {
        "ETH" | "WETH" => Decimal::new(2500, 0),
        "BTC" | "WBTC" => Decimal::new(45000, 0),
        "BNB" => Decimal::new(300, 0),
        "MATIC" => Decimal::new(80, 2),
        "AVAX" => Decimal::new(25, 0),
        "SOL" => Decimal::new(100, 0),
        "USDT" | "USDC" | "BUSD" | "DAI" => Decimal::new(100, 2),
        _ => return None,
    };
    Some(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(coingecko_id("eth"), Some("ethereum"));
        assert_eq!(coingecko_id(" Sol "), Some("solana"));
        assert_eq!(coingecko_id("NOTACOIN"), None);
    }

    #[test]
    fn test_static_defaults() {
        assert_eq!(static_default_price("ETH"), Some(dec!(2500)));
        assert_eq!(static_default_price("matic"), Some(dec!(0.80)));
        assert_eq!(static_default_price("DAI"), Some(dec!(1.00)));
        assert_eq!(static_default_price("BONK"), None);
    }

    #[test]
    fn test_stablecoins() {
        assert!(is_stablecoin("usdc"));
        assert!(!is_stablecoin("ETH"));
    }
}
