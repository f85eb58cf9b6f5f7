use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tax_core::CredentialProvider;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// Prefix for environment overrides, e.g. `TAX__REDIS__URL`
pub const ENV_PREFIX: &str = "TAX";

/// Prefix for credential fallbacks, e.g. `TAX_KEY_COINGECKO`
pub const CREDENTIAL_ENV_PREFIX: &str = "TAX_KEY_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// General system settings
    pub system: SystemSettings,

    /// Redis configuration
    pub redis: RedisConfig,

    /// Cache tier TTLs
    pub cache: CacheConfig,

    /// Retry policy for price providers
    pub retry: RetryConfig,

    /// Price provider endpoints and timeouts
    pub price_providers: PriceProvidersConfig,

    /// Nominal prices used when every tier is exhausted
    pub fallback: FallbackConfig,

    /// Solana RPC configuration
    pub solana: SolanaConfig,

    /// EVM (Alchemy) configuration
    pub evm: EvmConfig,

    /// Classifier thresholds
    pub parser: ParserConfig,

    /// Logical provider name -> API key
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    /// Upper bound on transactions accepted by one batch classification call
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Use Redis as the shared cache; an in-process cache is used otherwise
    pub enabled: bool,

    /// Redis connection URL
    pub url: String,

    /// Namespace prepended to every cache key
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub token_metadata_ttl_seconds: u64,
    pub historical_price_ttl_seconds: u64,
    pub pool_discovery_ttl_seconds: u64,
    pub current_price_ttl_seconds: u64,
    pub contract_mapping_ttl_seconds: u64,

    /// How long a last known price stays usable once the fresh entry is gone
    pub stale_retention_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt for historical providers
    pub max_retries: u32,

    /// Base backoff delay in milliseconds, doubled on every retry
    pub base_delay_ms: u64,

    /// Attempts per live spot provider
    pub live_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceProvidersConfig {
    pub coingecko_base_url: String,

    /// Used instead of the public URL when a CoinGecko key is configured
    pub coingecko_pro_base_url: String,

    pub cryptocompare_base_url: String,
    pub binance_base_url: String,
    pub geckoterminal_base_url: String,
    pub dexscreener_base_url: String,

    /// Timeout for historical and contract lookups
    pub request_timeout_seconds: u64,

    /// Timeout for live spot quotes
    pub live_timeout_seconds: u64,

    /// Spot DEX prices are only trusted for timestamps this close to now
    pub recency_window_hours: i64,

    /// Pools considered per GeckoTerminal lookup
    pub max_candidate_pools: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Price for unknown tickers once every symbol tier failed
    pub nominal_symbol_price: f64,

    /// Price for unknown contracts once every contract tier failed
    pub nominal_contract_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaConfig {
    /// JSON-RPC endpoint; `{key}` is replaced with the `helius` credential
    pub rpc_url: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Signatures requested per page (RPC maximum is 1000)
    pub signatures_page_size: u32,

    /// Hard cap on signature pages per wallet
    pub max_signature_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmConfig {
    /// Alchemy URL with `{network}` and `{key}` placeholders
    pub alchemy_url_template: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Hard cap on `alchemy_getAssetTransfers` pages per direction
    pub max_transfer_pages: u32,

    /// Additional router addresses per chain name, merged with the built-in registry
    #[serde(default)]
    pub extra_routers: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Native balance changes at or below this many lamports are ignored
    pub native_dust_lamports: u64,

    /// Token amounts at or below this are ignored
    pub token_dust: f64,

    /// A fee-only record is emitted only above this USD value
    pub fee_only_min_usd: f64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            system: SystemSettings {
                max_batch_size: 10_000,
            },
            redis: RedisConfig {
                enabled: false,
                url: "redis://127.0.0.1:6379".to_string(),
                key_prefix: "tax".to_string(),
            },
            cache: CacheConfig {
                token_metadata_ttl_seconds: 7 * 24 * 3600,
                historical_price_ttl_seconds: 24 * 3600,
                pool_discovery_ttl_seconds: 3600,
                current_price_ttl_seconds: 300,
                contract_mapping_ttl_seconds: 30 * 24 * 3600,
                stale_retention_seconds: 30 * 24 * 3600,
            },
            retry: RetryConfig {
                max_retries: 3,
                base_delay_ms: 1000,
                live_attempts: 2,
            },
            price_providers: PriceProvidersConfig {
                coingecko_base_url: "https://api.coingecko.com/api/v3".to_string(),
                coingecko_pro_base_url: "https://pro-api.coingecko.com/api/v3".to_string(),
                cryptocompare_base_url: "https://min-api.cryptocompare.com".to_string(),
                binance_base_url: "https://api.binance.com".to_string(),
                geckoterminal_base_url: "https://api.geckoterminal.com/api/v2".to_string(),
                dexscreener_base_url: "https://api.dexscreener.com".to_string(),
                request_timeout_seconds: 10,
                live_timeout_seconds: 3,
                recency_window_hours: 24,
                max_candidate_pools: 5,
            },
            fallback: FallbackConfig {
                nominal_symbol_price: 1.0,
                nominal_contract_price: 0.01,
            },
            solana: SolanaConfig {
                rpc_url: "https://mainnet.helius-rpc.com/?api-key={key}".to_string(),
                request_timeout_seconds: 30,
                signatures_page_size: 100,
                max_signature_pages: 10,
            },
            evm: EvmConfig {
                alchemy_url_template: "https://{network}.g.alchemy.com/v2/{key}".to_string(),
                request_timeout_seconds: 30,
                max_transfer_pages: 10,
                extra_routers: HashMap::new(),
            },
            parser: ParserConfig {
                native_dust_lamports: 1000,
                token_dust: 0.000001,
                fee_only_min_usd: 0.01,
            },
            credentials: HashMap::new(),
        }
    }
}

fn require_positive(value: u64, name: &str) -> Result<()> {
    if value == 0 {
        return Err(ConfigurationError::InvalidValue(format!(
            "{} must be greater than 0",
            name
        )));
    }
    Ok(())
}

fn require_url(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::InvalidValue(format!(
            "{} cannot be empty",
            name
        )));
    }
    Ok(())
}

impl PriceProvidersConfig {
    pub fn validate(&self) -> Result<()> {
        require_url(&self.coingecko_base_url, "price_providers.coingecko_base_url")?;
        require_url(
            &self.coingecko_pro_base_url,
            "price_providers.coingecko_pro_base_url",
        )?;
        require_url(
            &self.cryptocompare_base_url,
            "price_providers.cryptocompare_base_url",
        )?;
        require_url(&self.binance_base_url, "price_providers.binance_base_url")?;
        require_url(
            &self.geckoterminal_base_url,
            "price_providers.geckoterminal_base_url",
        )?;
        require_url(&self.dexscreener_base_url, "price_providers.dexscreener_base_url")?;
        require_positive(
            self.request_timeout_seconds,
            "price_providers.request_timeout_seconds",
        )?;
        require_positive(self.live_timeout_seconds, "price_providers.live_timeout_seconds")?;
        require_positive(
            self.max_candidate_pools as u64,
            "price_providers.max_candidate_pools",
        )?;
        if self.recency_window_hours < 0 {
            return Err(ConfigurationError::InvalidValue(
                "price_providers.recency_window_hours cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&SystemConfig::default())?);

        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__")
                .list_separator(","),
        );

        let system_config: SystemConfig = config_builder.build()?.try_deserialize()?;
        system_config.validate()?;

        Ok(system_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.price_providers.validate()?;

        if self.redis.enabled {
            require_url(&self.redis.url, "redis.url")?;
        }

        require_positive(self.cache.token_metadata_ttl_seconds, "cache.token_metadata_ttl_seconds")?;
        require_positive(
            self.cache.historical_price_ttl_seconds,
            "cache.historical_price_ttl_seconds",
        )?;
        require_positive(self.cache.pool_discovery_ttl_seconds, "cache.pool_discovery_ttl_seconds")?;
        require_positive(self.cache.current_price_ttl_seconds, "cache.current_price_ttl_seconds")?;
        require_positive(
            self.cache.contract_mapping_ttl_seconds,
            "cache.contract_mapping_ttl_seconds",
        )?;
        require_positive(self.cache.stale_retention_seconds, "cache.stale_retention_seconds")?;

        require_positive(self.retry.live_attempts as u64, "retry.live_attempts")?;

        require_url(&self.solana.rpc_url, "solana.rpc_url")?;
        require_positive(self.solana.request_timeout_seconds, "solana.request_timeout_seconds")?;
        require_positive(self.solana.signatures_page_size as u64, "solana.signatures_page_size")?;
        require_positive(self.solana.max_signature_pages as u64, "solana.max_signature_pages")?;

        require_url(&self.evm.alchemy_url_template, "evm.alchemy_url_template")?;
        require_positive(self.evm.request_timeout_seconds, "evm.request_timeout_seconds")?;
        require_positive(self.evm.max_transfer_pages as u64, "evm.max_transfer_pages")?;

        require_positive(self.system.max_batch_size as u64, "system.max_batch_size")?;

        if self.fallback.nominal_symbol_price < 0.0 || self.fallback.nominal_contract_price < 0.0 {
            return Err(ConfigurationError::InvalidValue(
                "Fallback prices cannot be negative".to_string(),
            ));
        }

        if self.parser.token_dust < 0.0 || self.parser.fee_only_min_usd < 0.0 {
            return Err(ConfigurationError::InvalidValue(
                "Parser thresholds cannot be negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Credential lookup over the `credentials` section with environment fallback
    pub fn credentials(&self) -> ConfigCredentials {
        ConfigCredentials::new(self.credentials.clone())
    }

    /// Get configuration as a JSON value, with credentials redacted
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut redacted = self.clone();
        for value in redacted.credentials.values_mut() {
            *value = "***".to_string();
        }
        serde_json::to_value(&redacted).unwrap_or(serde_json::Value::Null)
    }
}

/// Resolves API keys from configuration, then from `TAX_KEY_{PROVIDER}`
#[derive(Debug, Clone, Default)]
pub struct ConfigCredentials {
    keys: HashMap<String, String>,
}

impl ConfigCredentials {
    pub fn new(keys: HashMap<String, String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|(provider, key)| (provider.to_lowercase(), key))
            .collect();
        Self { keys }
    }

    fn env_var_name(provider: &str) -> String {
        format!(
            "{}{}",
            CREDENTIAL_ENV_PREFIX,
            provider.to_uppercase().replace('-', "_")
        )
    }
}

impl CredentialProvider for ConfigCredentials {
    fn get_key(&self, provider: &str) -> Option<String> {
        if let Some(key) = self.keys.get(&provider.to_lowercase()) {
            if !key.trim().is_empty() {
                return Some(key.clone());
            }
        }

        std::env::var(Self::env_var_name(provider))
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Configuration manager for loading and managing system configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: SystemConfig,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config = SystemConfig::load()?;
        info!("Configuration loaded successfully");
        Ok(Self { config })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = SystemConfig::load_from_path(path)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Replace the configuration after validating it
    pub fn update_config(&mut self, new_config: SystemConfig) -> Result<()> {
        new_config.validate()?;
        self.config = new_config;
        info!("Configuration updated");
        Ok(())
    }

    /// Reload configuration from file and environment
    pub fn reload(&mut self) -> Result<()> {
        self.config = SystemConfig::load()?;
        info!("Configuration reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SystemConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.historical_price_ttl_seconds, 86400);
        assert_eq!(config.cache.contract_mapping_ttl_seconds, 2_592_000);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = SystemConfig::default();
        config.price_providers.live_timeout_seconds = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_empty_base_url_is_rejected() {
        let mut config = SystemConfig::default();
        config.price_providers.dexscreener_base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_live_attempts_is_rejected() {
        let mut config = SystemConfig::default();
        config.retry.live_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = SystemConfig::load_from_path("/nonexistent/tax-config.toml").unwrap();
        assert_eq!(config.parser.native_dust_lamports, 1000);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("tax-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[cache]\ncurrent_price_ttl_seconds = 60\n\n[credentials]\ncoingecko = \"cg-key\""
        )
        .unwrap();

        let config = SystemConfig::load_from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.cache.current_price_ttl_seconds, 60);
        assert_eq!(config.cache.pool_discovery_ttl_seconds, 3600);
        assert_eq!(
            config.credentials().get_key("coingecko"),
            Some("cg-key".to_string())
        );
    }

    #[test]
    fn test_system_section_only_carries_batch_limit() {
        let path = std::env::temp_dir().join(format!("tax-system-{}.toml", std::process::id()));
        std::fs::write(&path, "[system]\nmax_batch_size = 50\n").unwrap();

        let config = SystemConfig::load_from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.system.max_batch_size, 50);
        let view = serde_json::to_value(&config.system).unwrap();
        assert_eq!(view, serde_json::json!({ "max_batch_size": 50 }));
    }

    #[test]
    fn test_credentials_prefer_config_then_env() {
        let mut keys = HashMap::new();
        keys.insert("Alchemy".to_string(), "from-config".to_string());
        keys.insert("blank".to_string(), "".to_string());
        let creds = ConfigCredentials::new(keys);

        assert_eq!(creds.get_key("alchemy"), Some("from-config".to_string()));

        std::env::set_var("TAX_KEY_UNIT_TEST_PROVIDER", "from-env");
        assert_eq!(
            creds.get_key("unit-test-provider"),
            Some("from-env".to_string())
        );
        std::env::remove_var("TAX_KEY_UNIT_TEST_PROVIDER");

        assert_eq!(creds.get_key("blank"), None);
    }

    #[test]
    fn test_json_view_redacts_credentials() {
        let mut config = SystemConfig::default();
        config
            .credentials
            .insert("coingecko".to_string(), "secret".to_string());
        let json = config.to_json_value();
        assert_eq!(json["credentials"]["coingecko"], "***");
    }
}
