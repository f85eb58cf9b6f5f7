pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Mint, symbol, decimals
const KNOWN_MINTS: &[(&str, &str, u8)] = &[
    ("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", "USDC", 6),
    ("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", "USDT", 6),
    (WRAPPED_SOL_MINT, "SOL", 9),
    ("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", "BONK", 5),
    ("JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN", "JUP", 6),
    ("4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R", "RAY", 6),
    ("EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm", "WIF", 6),
    ("HZ1JovNiVvGrGNiiYvEozEVgZ58xaU3RKwX8eACQBCt3", "PYTH", 6),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownToken {
    pub symbol: &'static str,
    pub decimals: u8,
}

pub fn known_token(mint: &str) -> Option<KnownToken> {
    KNOWN_MINTS
        .iter()
        .find(|(address, _, _)| *address == mint)
        .map(|&(_, symbol, decimals)| KnownToken { symbol, decimals })
}

pub fn placeholder_symbol(mint: &str) -> String {
    let prefix: String = mint.chars().take(6).collect();
    format!("SPL-{}", prefix)
}
