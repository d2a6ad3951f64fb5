//! Typed client configuration loaded from YAML or JSON, with env overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const CONFIG_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

pub const ETHERSCAN_KEY_ENV: &str = "ETHERSCAN_API_KEY";
pub const COINGECKO_KEY_ENV: &str = "COINGECKO_API_KEY";

/// Placeholder shipped in the template in place of a real Etherscan key.
pub const ETHERSCAN_KEY_PLACEHOLDER: &str = "YOUR_ETHERSCAN_API_KEY_HERE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {0} not found (tried .yaml, .yml, .json)")]
    NotFound(PathBuf),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid yaml in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("config template {0} not found")]
    TemplateMissing(PathBuf),
    #[error("{0} already exists (pass --force to overwrite)")]
    AlreadyExists(PathBuf),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_keys: ApiKeys,
    pub cache: CacheConfig,
    pub api: ApiConfig,
    pub fx: FxConfig,
    pub endpoints: Endpoints,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub etherscan: String,
    pub coingecko: Option<String>,
}

impl ApiKeys {
    /// Blank keys and the template placeholder both count as missing.
    pub fn etherscan_configured(&self) -> bool {
        let key = self.etherscan.trim();
        !key.is_empty() && key != ETHERSCAN_KEY_PLACEHOLDER
    }

    /// Human-readable setup hints for missing keys; empty when nothing is missing.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.etherscan_configured() {
            issues.push("Etherscan API key is not configured".to_string());
            issues.push("  get one at https://etherscan.io/apis".to_string());
            issues.push(format!(
                "  set api_keys.etherscan in the config or export {}=<key>",
                ETHERSCAN_KEY_ENV
            ));
        }
        issues
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub duration_minutes: u64,
    pub database: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_minutes: 5,
            database: PathBuf::from("cache/token_cache.db"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Minimum gap between outbound calls, seconds.
    pub request_delay: f64,
    /// Per-call timeout, seconds.
    pub timeout: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_delay: 2.0,
            timeout: 10,
        }
    }
}

/// Local currency for converted prices.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    pub currency: String,
    /// Used when the rate source is unreachable. Never cached.
    pub fallback_rate: f64,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            currency: "CNY".to_string(),
            fallback_rate: 7.2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub etherscan: String,
    pub coingecko: String,
    pub fx: String,
    pub btc_hashrate: String,
    pub kas_hashrate: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            etherscan: "https://api.etherscan.io".to_string(),
            coingecko: "https://api.coingecko.com/api/v3".to_string(),
            fx: "https://api.exchangerate-api.com/v4/latest/USD".to_string(),
            btc_hashrate: "https://api.blockchain.info/stats".to_string(),
            kas_hashrate: "https://api.kaspa.org/info/hashrate".to_string(),
        }
    }
}

impl Config {
    /// Load from `path`; if it does not exist, try the same stem with each
    /// supported extension. Applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path.as_ref())?;
        let text = std::fs::read_to_string(&resolved)?;
        let mut config = Self::parse(&resolved, &text)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        info!(path = %resolved.display(), "config loaded");
        Ok(config)
    }

    fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        } else if text.trim().is_empty() {
            Ok(Self::default())
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Override API keys from the environment. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ETHERSCAN_KEY_ENV).filter(|k| !k.is_empty()) {
            info!("using {}", ETHERSCAN_KEY_ENV);
            self.api_keys.etherscan = key;
        }
        if let Some(key) = lookup(COINGECKO_KEY_ENV).filter(|k| !k.is_empty()) {
            info!("using {}", COINGECKO_KEY_ENV);
            self.api_keys.coingecko = Some(key);
        }
    }
}

/// Copy the config template to `dest`, creating parent directories.
/// An existing `dest` is left alone unless `overwrite` is set.
pub fn init_from_template(
    template: &Path,
    dest: &Path,
    overwrite: bool,
) -> Result<(), ConfigError> {
    if !template.is_file() {
        return Err(ConfigError::TemplateMissing(template.to_path_buf()));
    }
    if dest.exists() && !overwrite {
        return Err(ConfigError::AlreadyExists(dest.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::copy(template, dest)?;
    info!(template = %template.display(), dest = %dest.display(), "config created from template");
    Ok(())
}

fn resolve_path(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| candidate.exists())
        .ok_or_else(|| ConfigError::NotFound(path.to_path_buf()))
}
