use super::known_tokens::{known_token, placeholder_symbol, KnownToken, WRAPPED_SOL_MINT};
use super::programs::{classify_instruction, InstructionKind};
use super::types::{Instruction, SolanaTransaction, TokenBalance};
use crate::metadata::{lookup_metadata, metadata_cache_key, MetadataMemo, MintMetadataSource};
use crate::{payload_items, ParseError, Result};
use cache_store::TieredCache;
use chrono::{DateTime, TimeZone, Utc};
use price_client::{is_known_symbol, is_stablecoin};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tax_core::{
    parse_quantity, scale_base_units, sort_chronologically, AssetRef, CanonicalTransaction, Chain,
    ContractPriceResolver, PriceQuote, SymbolPriceResolver, TransactionType,
};
use tracing::{debug, info, warn};

const NATIVE_SYMBOL: &str = "SOL";
const NATIVE_DECIMALS: u8 = 9;
const UNRESOLVED_MINT: &str = "UNKNOWN";
/// Used only when no source reports a token's decimals
const ASSUMED_TOKEN_DECIMALS: u8 = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierThresholds {
    /// Native balance changes at or below this many lamports are ignored
    pub native_dust_lamports: u64,
    /// Token amounts at or below this many whole units are ignored
    pub token_dust: Decimal,
    /// Minimum fee in USD for a standalone fee record
    pub fee_only_min_usd: Decimal,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            native_dust_lamports: 1_000,
            token_dust: Decimal::new(1, 6),
            fee_only_min_usd: Decimal::new(1, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ProgramHints {
    staking: bool,
    voting: bool,
}

impl ProgramHints {
    fn native_type(&self, incoming: bool) -> TransactionType {
        match (self.staking, self.voting, incoming) {
            (true, _, false) => TransactionType::Stake,
            (true, _, true) => TransactionType::Unstake,
            (false, true, true) => TransactionType::Reward,
            (false, true, false) => TransactionType::Stake,
            (false, false, true) => TransactionType::Buy,
            (false, false, false) => TransactionType::Sell,
        }
    }
}

/// Token account details gathered from the token-balance tables
#[derive(Debug, Clone)]
struct TokenAccount {
    mint: String,
    owner: Option<String>,
    decimals: u8,
}

/// State shared by every record emitted for one transaction
struct TxContext<'a> {
    signature: &'a str,
    timestamp: DateTime<Utc>,
    user: &'a str,
    token_accounts: HashMap<&'a str, TokenAccount>,
    hints: ProgramHints,
    native_quote: PriceQuote,
    /// Fee still waiting to be attached to a record
    pending_fee: Option<Decimal>,
}

impl TxContext<'_> {
    /// Record carrying the pending fee. An overflowing value skips the record
    /// and leaves the fee pending for the next one.
    fn record(
        &mut self,
        transaction_type: TransactionType,
        asset: AssetRef,
        amount: Decimal,
        quote: &PriceQuote,
    ) -> Option<CanonicalTransaction> {
        let fee = self.pending_fee.unwrap_or(Decimal::ZERO);
        let symbol = asset.symbol.clone();
        match CanonicalTransaction::new(
            self.signature,
            self.timestamp,
            transaction_type,
            asset,
            amount,
            quote,
            fee,
        ) {
            Some(record) => {
                self.pending_fee = None;
                Some(record)
            }
            None => {
                warn!(
                    "{}: value of {} {} at ${} overflows, skipping",
                    self.signature, amount, symbol, quote.price
                );
                None
            }
        }
    }

    fn owner_of(&self, account: &str) -> Option<&str> {
        self.token_accounts
            .get(account)
            .and_then(|a| a.owner.as_deref())
    }
}

/// Turns parsed Solana transactions into canonical records by reconciling the
/// user's native balance change against the fee and the instruction list.
pub struct SolanaTransactionClassifier {
    symbol_prices: Arc<dyn SymbolPriceResolver>,
    contract_prices: Arc<dyn ContractPriceResolver>,
    metadata: Option<Arc<dyn MintMetadataSource>>,
    cache: Option<TieredCache>,
    thresholds: ClassifierThresholds,
}

impl SolanaTransactionClassifier {
    pub fn new(
        symbol_prices: Arc<dyn SymbolPriceResolver>,
        contract_prices: Arc<dyn ContractPriceResolver>,
    ) -> Self {
        Self {
            symbol_prices,
            contract_prices,
            metadata: None,
            cache: None,
            thresholds: ClassifierThresholds::default(),
        }
    }

    pub fn with_metadata(mut self, source: Arc<dyn MintMetadataSource>) -> Self {
        self.metadata = Some(source);
        self
    }

    /// Share discovered mint metadata across calls
    pub fn with_cache(mut self, cache: TieredCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_thresholds(mut self, thresholds: ClassifierThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Classify every transaction in an RPC payload for `user`.
    ///
    /// Malformed transactions are logged and skipped. The result is sorted by
    /// timestamp.
    pub async fn classify(&self, payload: &Value, user: &str) -> Vec<CanonicalTransaction> {
        let mut memo = MetadataMemo::new();
        let mut records = Vec::new();
        let items = payload_items(payload);
        let total = items.len();

        for (position, item) in items.into_iter().enumerate() {
            let tx: SolanaTransaction = match serde_json::from_value(item.clone()) {
                Ok(tx) => tx,
                Err(e) => {
                    warn!("Skipping malformed transaction #{}: {}", position, e);
                    continue;
                }
            };

            match self.classify_with_memo(&tx, user, &mut memo).await {
                Ok(mut emitted) => records.append(&mut emitted),
                Err(e) => warn!(
                    "Skipping transaction {}: {}",
                    tx.signature().unwrap_or("<unsigned>"),
                    e
                ),
            }
        }

        sort_chronologically(&mut records);
        info!(
            "Classified {} Solana transactions into {} records for {}",
            total,
            records.len(),
            user
        );
        records
    }

    /// Classify one transaction for `user`
    pub async fn classify_transaction(
        &self,
        tx: &SolanaTransaction,
        user: &str,
    ) -> Result<Vec<CanonicalTransaction>> {
        let mut memo = MetadataMemo::new();
        self.classify_with_memo(tx, user, &mut memo).await
    }

    async fn classify_with_memo(
        &self,
        tx: &SolanaTransaction,
        user: &str,
        memo: &mut MetadataMemo,
    ) -> Result<Vec<CanonicalTransaction>> {
        let signature = tx
            .signature()
            .ok_or_else(|| ParseError::MissingData("signature".to_string()))?;
        let block_time = tx
            .block_time
            .ok_or_else(|| ParseError::MissingData(format!("blockTime for {}", signature)))?;
        let timestamp = Utc
            .timestamp_opt(block_time, 0)
            .single()
            .ok_or_else(|| ParseError::InvalidFormat(format!("blockTime {}", block_time)))?;
        let meta = tx
            .meta
            .as_ref()
            .ok_or_else(|| ParseError::MissingData(format!("meta for {}", signature)))?;

        let keys: Vec<&str> = tx.account_keys().iter().map(|k| k.pubkey()).collect();
        let user_index = keys.iter().position(|k| *k == user);
        let fee_payer_index = tx
            .account_keys()
            .iter()
            .position(|k| k.is_signer())
            .unwrap_or(0);
        let user_pays_fee = user_index == Some(fee_payer_index);
        let failed = meta.err.as_ref().is_some_and(|err| !err.is_null());

        let instructions = ordered_instructions(tx);
        let hints = scan_hints(&instructions);

        let native_quote = self
            .symbol_prices
            .resolve_symbol(NATIVE_SYMBOL, timestamp)
            .await;
        let fee_sol = scale_base_units(meta.fee as u128, NATIVE_DECIMALS).unwrap_or(Decimal::ZERO);
        let fee_usd = fee_sol.checked_mul(native_quote.price).unwrap_or_else(|| {
            warn!(
                "{}: fee of {} SOL at ${} overflows, dropping it",
                signature, fee_sol, native_quote.price
            );
            Decimal::ZERO
        });

        let mut ctx = TxContext {
            signature,
            timestamp,
            user,
            token_accounts: token_accounts(
                &keys,
                meta.pre_token_balances.as_deref(),
                meta.post_token_balances.as_deref(),
            ),
            hints,
            native_quote,
            pending_fee: (fee_usd > Decimal::ZERO).then_some(fee_usd),
        };
        let mut records = Vec::new();

        // A failed transaction only moved the fee
        if failed {
            debug!("{}: failed on chain, only the fee applies", signature);
        }

        // The balance delta is authoritative; native transfer instructions
        // only count when it cannot be computed.
        let native_delta = user_index.filter(|_| !failed).and_then(|index| {
            let pre = *meta.pre_balances.as_ref()?.get(index)?;
            let post = *meta.post_balances.as_ref()?.get(index)?;
            let mut delta = post as i128 - pre as i128;
            if user_pays_fee {
                delta += meta.fee as i128;
            }
            Some(delta)
        });

        if let Some(delta) = native_delta {
            if delta.unsigned_abs() > self.thresholds.native_dust_lamports as u128 {
                if let Some(record) = self.native_record(&mut ctx, delta.unsigned_abs(), delta > 0)
                {
                    records.push(record);
                }
            } else {
                debug!("{}: native change of {} lamports is dust", signature, delta);
            }
        }

        let executed: &[&Instruction] = if failed { &[] } else { &instructions };
        for ix in executed {
            match classify_instruction(ix) {
                InstructionKind::NativeTransfer if native_delta.is_none() => {
                    if let Some(record) = self.native_transfer_record(&mut ctx, ix) {
                        records.push(record);
                    }
                }
                InstructionKind::TokenTransfer => {
                    if let Some(record) = self.token_transfer_record(&mut ctx, ix, memo).await {
                        records.push(record);
                    }
                }
                _ => {}
            }
        }

        if records.is_empty() && user_index.is_some() && fee_usd > self.thresholds.fee_only_min_usd
        {
            debug!("{}: fee-only transaction (${})", signature, fee_usd);
            let quote = ctx.native_quote.clone();
            if let Some(record) = ctx.record(
                TransactionType::Fee,
                AssetRef::native(NATIVE_SYMBOL, NATIVE_DECIMALS),
                fee_sol,
                &quote,
            ) {
                records.push(record);
            }
        }

        Ok(records)
    }

    fn native_record(
        &self,
        ctx: &mut TxContext<'_>,
        lamports: u128,
        incoming: bool,
    ) -> Option<CanonicalTransaction> {
        let amount = scale_base_units(lamports, NATIVE_DECIMALS)?;
        let transaction_type = ctx.hints.native_type(incoming);
        debug!(
            "{}: native {} of {} SOL",
            ctx.signature, transaction_type, amount
        );
        let quote = ctx.native_quote.clone();
        ctx.record(
            transaction_type,
            AssetRef::native(NATIVE_SYMBOL, NATIVE_DECIMALS),
            amount,
            &quote,
        )
    }

    fn native_transfer_record(
        &self,
        ctx: &mut TxContext<'_>,
        ix: &Instruction,
    ) -> Option<CanonicalTransaction> {
        let info = ix.info()?;
        let source = info.get("source").and_then(Value::as_str);
        let destination = info.get("destination").and_then(Value::as_str);
        let outgoing = source == Some(ctx.user);
        let incoming = destination == Some(ctx.user);
        if outgoing == incoming {
            return None;
        }

        let lamports = info.get("lamports").and_then(quantity)?;
        if lamports <= self.thresholds.native_dust_lamports as u128 {
            return None;
        }
        self.native_record(ctx, lamports, incoming)
    }

    async fn token_transfer_record(
        &self,
        ctx: &mut TxContext<'_>,
        ix: &Instruction,
        memo: &mut MetadataMemo,
    ) -> Option<CanonicalTransaction> {
        let info = ix.info()?;
        let source = info.get("source").and_then(Value::as_str).unwrap_or_default();
        let destination = info
            .get("destination")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let authority = ["authority", "multisigAuthority", "owner"]
            .iter()
            .find_map(|field| info.get(*field).and_then(Value::as_str));

        let outgoing = authority == Some(ctx.user)
            || source == ctx.user
            || ctx.owner_of(source) == Some(ctx.user);
        let incoming = destination == ctx.user || ctx.owner_of(destination) == Some(ctx.user);
        if outgoing && incoming {
            debug!("{}: skipping self-transfer", ctx.signature);
            return None;
        }
        if !outgoing && !incoming {
            return None;
        }

        let mint = info
            .get("mint")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| ctx.token_accounts.get(source).map(|a| a.mint.clone()))
            .or_else(|| ctx.token_accounts.get(destination).map(|a| a.mint.clone()));
        let mint = match mint {
            Some(mint) if !mint.is_empty() && mint != UNRESOLVED_MINT => mint,
            other => {
                warn!(
                    "{}: skipping token transfer with unresolved mint {:?}",
                    ctx.signature, other
                );
                return None;
            }
        };

        let raw = info
            .get("tokenAmount")
            .and_then(|t| t.get("amount"))
            .or_else(|| info.get("amount"))
            .and_then(quantity)?;

        let known = known_token(&mint);
        let metadata = match known {
            Some(_) => None,
            None => self.mint_metadata(&mint, memo).await,
        };

        let decimals = info
            .get("tokenAmount")
            .and_then(|t| t.get("decimals"))
            .and_then(Value::as_u64)
            .and_then(|d| u8::try_from(d).ok())
            .or_else(|| {
                [source, destination]
                    .iter()
                    .filter_map(|account| ctx.token_accounts.get(*account))
                    .find(|a| a.mint == mint)
                    .map(|a| a.decimals)
            })
            .or(known.map(|k| k.decimals))
            .or_else(|| metadata.as_ref().and_then(|m| m.decimals));
        let decimals = match decimals {
            Some(decimals) => decimals,
            None => {
                warn!(
                    "{}: no decimals reported for mint {}, assuming {}",
                    ctx.signature, mint, ASSUMED_TOKEN_DECIMALS
                );
                ASSUMED_TOKEN_DECIMALS
            }
        };

        let Some(amount) = scale_base_units(raw, decimals) else {
            warn!(
                "{}: cannot scale {} by {} decimals for mint {}",
                ctx.signature, raw, decimals, mint
            );
            return None;
        };
        if amount <= self.thresholds.token_dust {
            debug!("{}: token amount {} of {} is dust", ctx.signature, amount, mint);
            return None;
        }

        let symbol = known
            .map(|k| k.symbol.to_string())
            .or_else(|| {
                metadata
                    .as_ref()
                    .and_then(|m| m.usable_symbol())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| placeholder_symbol(&mint));

        let quote = self.price_token(ctx, &mint, known, &symbol).await;
        let transaction_type = if incoming {
            TransactionType::Buy
        } else {
            TransactionType::Sell
        };
        debug!(
            "{}: token {} of {} {} at ${} ({})",
            ctx.signature, transaction_type, amount, symbol, quote.price, quote.source
        );

        ctx.record(
            transaction_type,
            AssetRef::token(symbol, mint, decimals),
            amount,
            &quote,
        )
    }

    async fn price_token(
        &self,
        ctx: &TxContext<'_>,
        mint: &str,
        known: Option<KnownToken>,
        symbol: &str,
    ) -> PriceQuote {
        if mint == WRAPPED_SOL_MINT {
            return ctx.native_quote.clone();
        }
        if let Some(token) = known {
            if is_stablecoin(token.symbol) {
                return PriceQuote::stablecoin();
            }
            if is_known_symbol(token.symbol) {
                return self
                    .symbol_prices
                    .resolve_symbol(token.symbol, ctx.timestamp)
                    .await;
            }
        }
        self.contract_prices
            .resolve_contract(mint, Chain::Solana, ctx.timestamp, Some(symbol))
            .await
    }

    async fn mint_metadata(
        &self,
        mint: &str,
        memo: &mut MetadataMemo,
    ) -> Option<crate::TokenMetadata> {
        let source = self.metadata.as_ref()?;
        lookup_metadata(
            self.cache.as_ref(),
            memo,
            metadata_cache_key(Chain::Solana, mint),
            || source.mint_metadata(mint),
        )
        .await
    }
}

/// Top-level instructions in order, then inner instructions by parent index
fn ordered_instructions(tx: &SolanaTransaction) -> Vec<&Instruction> {
    let mut ordered: Vec<&Instruction> = tx.transaction.message.instructions.iter().collect();
    if let Some(inner) = tx.meta.as_ref().and_then(|m| m.inner_instructions.as_ref()) {
        let mut groups: Vec<_> = inner.iter().collect();
        groups.sort_by_key(|group| group.index);
        ordered.extend(groups.into_iter().flat_map(|group| group.instructions.iter()));
    }
    ordered
}

fn scan_hints(instructions: &[&Instruction]) -> ProgramHints {
    instructions
        .iter()
        .fold(ProgramHints::default(), |mut hints, ix| {
            match classify_instruction(ix) {
                InstructionKind::Staking => hints.staking = true,
                InstructionKind::Voting => hints.voting = true,
                _ => {}
            }
            hints
        })
}

fn token_accounts<'a>(
    keys: &[&'a str],
    pre: Option<&[TokenBalance]>,
    post: Option<&[TokenBalance]>,
) -> HashMap<&'a str, TokenAccount> {
    let mut accounts = HashMap::new();
    let balances = pre
        .unwrap_or_default()
        .iter()
        .chain(post.unwrap_or_default().iter());

    for balance in balances {
        let Some(key) = keys.get(balance.account_index) else {
            continue;
        };
        accounts.insert(
            *key,
            TokenAccount {
                mint: balance.mint.clone(),
                owner: balance.owner.clone(),
                decimals: balance.ui_token_amount.decimals,
            },
        );
    }
    accounts
}

/// Integer amount encoded as a JSON number or a numeric string
fn quantity(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => parse_quantity(s),
        _ => None,
    }
}
