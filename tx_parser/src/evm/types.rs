use serde::Deserialize;
use serde_json::Value;

/// One entry of an `alchemy_getAssetTransfers` result.
///
/// Every field is optional so that a record missing a required field can be
/// reported and skipped instead of failing the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransfer {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub block_num: Option<String>,
    /// Provider-scaled amount
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub raw_contract: Option<RawContract>,
    #[serde(default)]
    pub metadata: Option<TransferMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContract {
    /// Integer amount in base units, hex encoded
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Decimal count, hex string or number
    #[serde(default)]
    pub decimal: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    #[serde(default)]
    pub block_timestamp: Option<String>,
}

impl AssetTransfer {
    pub fn contract_address(&self) -> Option<&str> {
        self.raw_contract
            .as_ref()?
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    pub fn raw_value(&self) -> Option<&str> {
        self.raw_contract.as_ref()?.value.as_deref()
    }

    pub fn raw_decimals(&self) -> Option<u8> {
        let decimal = self.raw_contract.as_ref()?.decimal.as_ref()?;
        let parsed = match decimal {
            Value::Number(n) => n.as_u64().map(u128::from),
            Value::String(s) => tax_core::parse_quantity(s),
            _ => None,
        }?;
        u8::try_from(parsed).ok()
    }

    pub fn block_timestamp(&self) -> Option<&str> {
        self.metadata.as_ref()?.block_timestamp.as_deref()
    }
}
