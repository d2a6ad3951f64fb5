//! `TokenClient`: token info aggregation, multichain balances, and cache control.

use crate::chain::cache::{Cache, CacheStats};
use crate::chain::fetch::{endpoint, etherscan_result, FetchError, Fetcher};
use crate::chain::rate_limit::RateLimiter;
use crate::chain::registry::{self, ChainMetadata, RegistryError};
use crate::chain::transport::{HttpTransport, Transport};
use crate::config::{Config, ConfigError};
use crate::quote;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Chains queried by `get_multichain_balance` when the caller names none.
pub const DEFAULT_BALANCE_CHAINS: [&str; 3] = ["ETH", "BNB", "MATIC"];

const UNSUPPORTED_CHAIN: &str = "Chain not supported";
const WEI_PER_UNIT: f64 = 1e18;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("http client: {0}")]
    Transport(#[from] FetchError),
    #[error("chain registry unavailable: {0}")]
    ChainRegistryUnavailable(#[from] RegistryError),
}

/// Price, supply and hashrate for one token. Absent fields are valid results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenQuote {
    pub symbol: String,
    pub price_usd: Option<f64>,
    pub price_local: Option<f64>,
    pub currency: String,
    pub supply: Option<f64>,
    pub supply_unit: String,
    pub hashrate: Option<f64>,
    pub hashrate_unit: String,
    pub from_cache: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

/// One chain's entry in a multichain balance result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BalanceEntry {
    Balance {
        balance: f64,
        balance_wei: String,
        chain_name: String,
    },
    Error {
        error: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiStatus {
    pub api_key_configured: bool,
    pub supported_chains: usize,
    pub supported_tokens: usize,
    pub cache_enabled: bool,
    pub cache_ttl_minutes: u64,
    pub request_delay_secs: f64,
    pub requests_made: u64,
}

pub struct TokenClient {
    pub(crate) config: Config,
    pub(crate) cache: Cache,
    pub(crate) fetcher: Fetcher,
    chains: HashMap<String, ChainMetadata>,
}

impl TokenClient {
    /// Load config from `path` (with extension fallback and env overrides) and connect.
    pub async fn from_config_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let config = Config::load(path)?;
        Self::new(config).await
    }

    /// Build the HTTP transport, open the cache, and bootstrap the chain registry.
    pub async fn new(config: Config) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(Duration::from_secs(config.api.timeout))?;
        let cache = Cache::from_config(&config.cache);
        let limiter = RateLimiter::from_secs_f64(config.api.request_delay);
        Self::with_parts(config, cache, Arc::new(transport), limiter).await
    }

    /// Construct from explicit parts. Fails if the chain registry cannot be loaded.
    pub async fn with_parts(
        config: Config,
        cache: Cache,
        transport: Arc<dyn Transport>,
        limiter: RateLimiter,
    ) -> Result<Self, ClientError> {
        let fetcher = Fetcher::new(transport, limiter);
        let chains = registry::bootstrap(&fetcher, &cache, &config.endpoints.etherscan).await?;
        Ok(Self {
            config,
            cache,
            fetcher,
            chains,
        })
    }

    /// Full quote for `symbol`, served whole from `token_info_<SYM>` when fresh.
    pub async fn get_token_info(&self, symbol: &str) -> TokenQuote {
        let symbol = symbol.trim().to_uppercase();
        let key = token_info_key(&symbol);
        if let Some(mut cached) = self.cache.get_as::<TokenQuote>(&key) {
            cached.from_cache = true;
            return cached;
        }

        let (price_usd, price_local) = self.price(&symbol).await.unzip();
        let (supply, supply_unit) = self.supply(&symbol).await;
        let (hashrate, hashrate_unit) = self.hashrate(&symbol).await;
        let result = TokenQuote {
            symbol,
            price_usd,
            price_local,
            currency: self.config.fx.currency.to_uppercase(),
            supply,
            supply_unit,
            hashrate,
            hashrate_unit,
            from_cache: false,
            fetched_at: OffsetDateTime::now_utc(),
        };
        self.cache.set_as(&key, &result);
        result
    }

    /// Native balance of `address` on each chain in `symbols`, keyed by upper-cased symbol.
    /// Per-chain failures are reported in place; the whole map is cached.
    pub async fn get_multichain_balance<S: AsRef<str>>(
        &self,
        address: &str,
        symbols: &[S],
    ) -> BTreeMap<String, BalanceEntry> {
        let symbols: Vec<String> = symbols
            .iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .collect();
        let key = balance_key(address, &symbols);
        if let Some(cached) = self.cache.get_as::<BTreeMap<String, BalanceEntry>>(&key) {
            return cached;
        }

        let mut results = BTreeMap::new();
        for symbol in &symbols {
            let entry = match self.chains.get(symbol) {
                None => BalanceEntry::Error {
                    error: UNSUPPORTED_CHAIN.to_string(),
                },
                Some(chain) => match self.fetch_balance(chain, address).await {
                    Ok(wei) => BalanceEntry::Balance {
                        balance: wei.parse::<f64>().unwrap_or_default() / WEI_PER_UNIT,
                        balance_wei: wei,
                        chain_name: chain.display_name.clone(),
                    },
                    Err(e) => {
                        warn!(chain = %symbol, error = %e, "balance query failed");
                        BalanceEntry::Error {
                            error: balance_error_text(&e),
                        }
                    }
                },
            };
            results.insert(symbol.clone(), entry);
        }
        self.cache.set_as(&key, &results);
        results
    }

    /// Balance in wei as a decimal string.
    async fn fetch_balance(&self, chain: &ChainMetadata, address: &str) -> Result<String, FetchError> {
        let chain_id = chain.chain_id.to_string();
        let url = endpoint(
            &self.config.endpoints.etherscan,
            "v2/api",
            &[
                ("chainid", chain_id.as_str()),
                ("module", "account"),
                ("action", "balance"),
                ("address", address),
                ("tag", "latest"),
                ("apikey", self.config.api_keys.etherscan.as_str()),
            ],
        )?;
        let body = self.fetcher.get_json(&url).await?;
        let wei = match etherscan_result(&body)? {
            Value::String(s) if s.trim().parse::<u128>().is_ok() => s.trim().to_string(),
            Value::Number(n) if n.is_u64() => n.to_string(),
            _ => return Err(FetchError::MissingField("result".to_string())),
        };
        Ok(wei)
    }

    pub fn chain_info(&self, symbol: &str) -> Option<&ChainMetadata> {
        self.chains.get(&symbol.trim().to_uppercase())
    }

    /// Every bootstrapped chain, sorted by symbol.
    pub fn list_supported_chains(&self) -> Vec<&ChainMetadata> {
        let mut chains: Vec<&ChainMetadata> = self.chains.values().collect();
        chains.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        chains
    }

    pub fn list_supported_tokens(&self) -> Vec<&'static str> {
        quote::supported_tokens()
    }

    pub fn api_status(&self) -> ApiStatus {
        ApiStatus {
            api_key_configured: self.config.api_keys.etherscan_configured(),
            supported_chains: self.chains.len(),
            supported_tokens: quote::COINGECKO_IDS.len(),
            cache_enabled: self.cache.is_enabled(),
            cache_ttl_minutes: self.cache.ttl_minutes(),
            request_delay_secs: self.fetcher.limiter().delay().as_secs_f64(),
            requests_made: self.fetcher.request_count(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Remove every cache entry, including the chain list. Returns the count removed.
    pub fn clear_cache(&self) -> usize {
        let removed = self.cache.clear();
        info!(removed, "cache cleared by request");
        removed
    }

    pub fn clean_expired_cache(&self) -> usize {
        self.cache.clean_expired()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

pub fn token_info_key(symbol: &str) -> String {
    format!("token_info_{}", symbol)
}

pub fn balance_key(address: &str, symbols: &[String]) -> String {
    format!("balance_{}_{}", address, symbols.join("_"))
}

fn balance_error_text(e: &FetchError) -> String {
    match e {
        FetchError::Api(status, _) => format!("HTTP {}", status),
        FetchError::Rejected(message) => message.clone(),
        other => other.to_string(),
    }
}
