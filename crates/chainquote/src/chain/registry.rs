//! Chain registry bootstrap: symbol → chain metadata from the Etherscan chain list.
//!
//! The raw list is cached under [`CHAINLIST_CACHE_KEY`]. There is no built-in
//! fallback table; if neither cache nor network yields rows, bootstrap fails.

use crate::chain::cache::Cache;
use crate::chain::fetch::{endpoint, FetchError, Fetcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CHAINLIST_CACHE_KEY: &str = "chainlist_data";

/// Ordered `(substring, symbol)` rules over the lower-cased chain name. First match wins.
///
/// Bare `sepolia`/`holesky` come last so an L2 test network ("Arbitrum
/// Sepolia") keeps its own symbol instead of competing for `ETH_SEPOLIA`.
/// `op mainnet`/`op sepolia` cover Optimism's current display names.
const SYMBOL_RULES: &[(&str, &str)] = &[
    ("ethereum", "ETH"),
    ("bnb smart chain", "BNB"),
    ("bsc", "BNB"),
    ("binance", "BNB"),
    ("polygon", "MATIC"),
    ("matic", "MATIC"),
    ("zkevm", "ZKEVM"),
    ("arbitrum", "ARB"),
    ("optimism", "OP"),
    ("op mainnet", "OP"),
    ("op sepolia", "OP"),
    ("base", "BASE"),
    ("blast", "BLAST"),
    ("scroll", "SCROLL"),
    ("linea", "LINEA"),
    ("avalanche", "AVAX"),
    ("cronos", "CRO"),
    ("celo", "CELO"),
    ("gnosis", "GNOSIS"),
    ("mantle", "MNT"),
    ("moonbeam", "GLMR"),
    ("moonriver", "MOVR"),
    ("bittorrent", "BTT"),
    ("fraxtal", "FRAX"),
    ("zksync", "ZK"),
    ("sepolia", "ETH"),
    ("holesky", "ETH"),
];

/// Name fragments that make a derived symbol carry a network suffix.
const SUFFIX_RULES: &[(&str, &str)] = &[
    ("sepolia", "_SEPOLIA"),
    ("holesky", "_HOLESKY"),
    ("testnet", "_TEST"),
    ("fuji", "_TEST"),
    ("amoy", "_TEST"),
];

/// Name fragments that mark a chain as non-production for tie-breaking.
const TESTNET_INDICATORS: &[&str] = &[
    "testnet", "sepolia", "holesky", "test", "fuji", "amoy", "goerli",
];

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("chain list unavailable: {0}")]
    Unavailable(#[from] FetchError),
    #[error("chain list response has no rows")]
    EmptyResponse,
    #[error("chain list contains no recognised active chains")]
    NoChains,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub symbol: String,
    pub chain_id: u64,
    pub display_name: String,
    pub api_base_url: String,
    pub explorer_url: String,
}

/// Load the chain list from cache or network and build the symbol map.
pub async fn bootstrap(
    fetcher: &Fetcher,
    cache: &Cache,
    etherscan_base: &str,
) -> Result<HashMap<String, ChainMetadata>, RegistryError> {
    let raw = match cache.get(CHAINLIST_CACHE_KEY) {
        Some(cached) if has_rows(&cached) => {
            info!("using cached chain list");
            cached
        }
        _ => {
            let fetched = fetch_chainlist(fetcher, etherscan_base).await?;
            cache.set(CHAINLIST_CACHE_KEY, &fetched);
            fetched
        }
    };
    let chains = parse_chainlist(&raw);
    if chains.is_empty() {
        return Err(RegistryError::NoChains);
    }
    info!(count = chains.len(), "chain registry loaded");
    Ok(chains)
}

async fn fetch_chainlist(fetcher: &Fetcher, etherscan_base: &str) -> Result<Value, RegistryError> {
    info!("fetching chain list");
    let url = endpoint(etherscan_base, "v2/chainlist", &[])?;
    let body = fetcher.get_json(&url).await?;
    if !has_rows(&body) {
        warn!("chain list response has no result rows");
        return Err(RegistryError::EmptyResponse);
    }
    Ok(body)
}

fn has_rows(body: &Value) -> bool {
    body.get("result")
        .and_then(Value::as_array)
        .is_some_and(|rows| !rows.is_empty())
}

/// Build the symbol map from a raw chain-list body. Inactive and unrecognised rows are skipped.
pub fn parse_chainlist(body: &Value) -> HashMap<String, ChainMetadata> {
    let rows = body
        .get("result")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut best: HashMap<String, (ChainMetadata, bool)> = HashMap::new();
    for row in rows {
        let Some(candidate) = parse_row(row) else {
            continue;
        };
        let mainnet = !is_testnet(&candidate.display_name);
        let replace = match best.get(&candidate.symbol) {
            Some((current, current_mainnet)) => {
                prefer(mainnet, candidate.chain_id, *current_mainnet, current.chain_id)
            }
            None => true,
        };
        if replace {
            best.insert(candidate.symbol.clone(), (candidate, mainnet));
        }
    }
    best.into_iter().map(|(k, (meta, _))| (k, meta)).collect()
}

/// Whether a candidate replaces the incumbent: mainnet first, then the smaller chain id.
fn prefer(mainnet: bool, chain_id: u64, current_mainnet: bool, current_id: u64) -> bool {
    match (mainnet, current_mainnet) {
        (true, false) => true,
        (false, true) => false,
        _ => chain_id < current_id,
    }
}

fn parse_row(row: &Value) -> Option<ChainMetadata> {
    let active = row.get("status").and_then(as_u64_lenient) == Some(1);
    if !active {
        return None;
    }
    let name = row.get("chainname").and_then(Value::as_str)?;
    let chain_id = row.get("chainid").and_then(as_u64_lenient)?;
    let Some(symbol) = derive_symbol(name) else {
        debug!(name, chain_id, "no symbol rule for chain");
        return None;
    };
    Some(ChainMetadata {
        symbol,
        chain_id,
        display_name: name.to_string(),
        api_base_url: str_field(row, "apiurl"),
        explorer_url: str_field(row, "blockexplorer"),
    })
}

/// Canonical symbol for a chain display name, with a network suffix for test networks.
pub fn derive_symbol(display_name: &str) -> Option<String> {
    let name = display_name.to_lowercase();
    let (_, base) = SYMBOL_RULES
        .iter()
        .find(|(pattern, _)| name.contains(pattern))?;
    let suffix = SUFFIX_RULES
        .iter()
        .find(|(pattern, _)| name.contains(pattern))
        .map(|(_, suffix)| *suffix)
        .unwrap_or("");
    Some(format!("{}{}", base, suffix))
}

pub fn is_testnet(display_name: &str) -> bool {
    let name = display_name.to_lowercase();
    TESTNET_INDICATORS.iter().any(|i| name.contains(i))
}

fn as_u64_lenient(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn str_field(row: &Value, field: &str) -> String {
    row.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
