//! Serde model of a `getTransaction` response in `jsonParsed` encoding.
//!
//! Only the fields the classifier reads are modelled; everything else is
//! ignored. Optional vectors stay `Option` so that "missing" and "empty" can be
//! told apart.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaTransaction {
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
    pub transaction: TransactionEnvelope,
}

impl SolanaTransaction {
    pub fn signature(&self) -> Option<&str> {
        self.transaction.signatures.first().map(String::as_str)
    }

    pub fn account_keys(&self) -> &[AccountKey] {
        &self.transaction.message.account_keys
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionEnvelope {
    #[serde(default)]
    pub signatures: Vec<String>,
    pub message: Message,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub account_keys: Vec<AccountKey>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

/// Account list entry; parsed encodings carry signer flags, legacy ones are
/// bare strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AccountKey {
    Parsed {
        pubkey: String,
        #[serde(default)]
        signer: bool,
        #[serde(default)]
        writable: bool,
    },
    Raw(String),
}

impl AccountKey {
    pub fn pubkey(&self) -> &str {
        match self {
            AccountKey::Parsed { pubkey, .. } => pubkey,
            AccountKey::Raw(pubkey) => pubkey,
        }
    }

    pub fn is_signer(&self) -> bool {
        matches!(self, AccountKey::Parsed { signer: true, .. })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub pre_balances: Option<Vec<u64>>,
    #[serde(default)]
    pub post_balances: Option<Vec<u64>>,
    #[serde(default)]
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    #[serde(default)]
    pub post_token_balances: Option<Vec<TokenBalance>>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<InnerInstructions>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiTokenAmount {
    #[serde(default)]
    pub amount: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InnerInstructions {
    pub index: usize,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    /// Parsed body; an object with `type` and `info` for known programs
    #[serde(default)]
    pub parsed: Option<Value>,
}

impl Instruction {
    pub fn parsed_type(&self) -> Option<&str> {
        self.parsed.as_ref()?.get("type")?.as_str()
    }

    pub fn info(&self) -> Option<&Value> {
        self.parsed.as_ref()?.get("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mixed_account_key_encodings() {
        let keys: Vec<AccountKey> = serde_json::from_value(json!([
            {"pubkey": "Payer111", "signer": true, "writable": true},
            "Legacy222"
        ]))
        .unwrap();
        assert_eq!(keys[0].pubkey(), "Payer111");
        assert!(keys[0].is_signer());
        assert_eq!(keys[1].pubkey(), "Legacy222");
        assert!(!keys[1].is_signer());
    }

    #[test]
    fn test_missing_balances_stay_none() {
        let meta: TransactionMeta = serde_json::from_value(json!({"fee": 5000})).unwrap();
        assert_eq!(meta.fee, 5000);
        assert!(meta.pre_balances.is_none());
        assert!(meta.inner_instructions.is_none());
    }

    #[test]
    fn test_unparsed_instruction() {
        let ix: Instruction = serde_json::from_value(json!({
            "programId": "ComputeBudget111111111111111111111111111111",
            "accounts": [],
            "data": "3DTZbgwsozUF"
        }))
        .unwrap();
        assert!(ix.program.is_none());
        assert!(ix.parsed_type().is_none());
    }
}
