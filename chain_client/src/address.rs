use crate::error::FetchError;
use tax_core::Chain;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

pub fn is_solana_address(address: &str) -> bool {
    (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58_ALPHABET.contains(c))
}

pub fn is_evm_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Reject an address that cannot belong to `chain`
pub fn validate_address(chain: Chain, address: &str) -> Result<(), FetchError> {
    let address = address.trim();
    let valid = if chain.is_evm() {
        is_evm_address(address)
    } else {
        is_solana_address(address)
    };

    if valid {
        Ok(())
    } else {
        Err(FetchError::InvalidAddress(format!("{} on {}", address, chain)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solana_addresses() {
        assert!(is_solana_address("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        assert!(is_solana_address("11111111111111111111111111111111"));
        // 0, O, I and l are not base58
        assert!(!is_solana_address("0PjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        assert!(!is_solana_address("short"));
    }

    #[test]
    fn test_evm_addresses() {
        assert!(is_evm_address("0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"));
        assert!(!is_evm_address("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"));
        assert!(!is_evm_address("0x7a250d5630B4cF539739dF2C5dAcb4c659F2488"));
        assert!(!is_evm_address("0xZZ250d5630B4cF539739dF2C5dAcb4c659F2488D"));
    }

    #[test]
    fn test_validate_by_chain() {
        assert!(validate_address(Chain::Base, "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D").is_ok());
        assert!(matches!(
            validate_address(Chain::Solana, "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
            Err(FetchError::InvalidAddress(_))
        ));
    }
}
