use std::collections::{HashMap, HashSet};
use tax_core::Chain;

const UNISWAP_V2: &str = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D";
const UNISWAP_V3: &str = "0xE592427A0AEce92De3Edee1F18E0157C05861564";
const UNIVERSAL_ROUTER: &str = "0x3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD";
const SUSHISWAP: &str = "0xd9e1cE17f2641f24aE83637ab66a2cca9C378B9F";
const ONEINCH_V5: &str = "0x1111111254fb6c44bAC0beD2854e76F90643097d";

const BUILTIN_ROUTERS: &[(Chain, &[&str])] = &[
    (
        Chain::Ethereum,
        &[UNISWAP_V2, UNISWAP_V3, UNIVERSAL_ROUTER, SUSHISWAP, ONEINCH_V5],
    ),
    (
        Chain::Bsc,
        &["0x10ED43C718714eb63d5aA57B78B54704E256024E", ONEINCH_V5],
    ),
    (
        Chain::Arbitrum,
        &["0x1b02dA8Cb0d097eB8D57A175b88c7D8b47997506", UNISWAP_V3, ONEINCH_V5],
    ),
    (
        Chain::Polygon,
        &["0xa5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff", UNISWAP_V3, ONEINCH_V5],
    ),
    (
        Chain::Base,
        &[UNIVERSAL_ROUTER, "0xcF77a3Ba9A5CA399B7c97c74d54e5b1Beb874E43"],
    ),
];

/// Known DEX router contracts per chain, matched case-insensitively
#[derive(Debug, Clone, Default)]
pub struct RouterRegistry {
    routers: HashMap<Chain, HashSet<String>>,
}

impl RouterRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        BUILTIN_ROUTERS
            .iter()
            .fold(Self::empty(), |registry, (chain, addresses)| {
                registry.with_extra(*chain, addresses.iter().copied())
            })
    }

    pub fn with_extra<I, S>(mut self, chain: Chain, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.routers.entry(chain).or_default();
        for address in addresses {
            let address = address.as_ref().trim();
            if !address.is_empty() {
                entry.insert(address.to_lowercase());
            }
        }
        self
    }

    pub fn is_router(&self, chain: Chain, address: &str) -> bool {
        self.routers
            .get(&chain)
            .is_some_and(|set| set.contains(&address.trim().to_lowercase()))
    }

    pub fn router_count(&self, chain: Chain) -> usize {
        self.routers.get(&chain).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let registry = RouterRegistry::builtin();
        assert!(registry.is_router(Chain::Ethereum, "0x7a250d5630b4cf539739df2c5dacb4c659f2488d"));
        assert!(registry.is_router(Chain::Ethereum, UNISWAP_V2));
        assert!(!registry.is_router(Chain::Bsc, UNISWAP_V2));
    }

    #[test]
    fn test_extra_routers() {
        let registry = RouterRegistry::builtin()
            .with_extra(Chain::Base, ["0xAAAA000000000000000000000000000000000001", "  "]);
        assert!(registry.is_router(Chain::Base, "0xaaaa000000000000000000000000000000000001"));
        assert_eq!(registry.router_count(Chain::Base), 3);
        assert_eq!(RouterRegistry::empty().router_count(Chain::Ethereum), 0);
    }
}
