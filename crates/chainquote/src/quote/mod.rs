//! Per-quote fetchers: price (with FX conversion), supply and hashrate.
//!
//! Each fetcher checks and fills its own cache key, independent of the
//! facade-level `token_info_<SYM>` entry.

mod fx;
mod hashrate;
mod price;
mod supply;

pub use hashrate::POS_SENTINEL_UNIT;

use crate::chain::fetch::{endpoint, FetchError};
use crate::client::TokenClient;
use url::Url;

/// Symbols with a CoinGecko listing, in display order.
pub const COINGECKO_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("BNB", "binancecoin"),
    ("KAS", "kaspa"),
    ("MATIC", "matic-network"),
    ("AVAX", "avalanche-2"),
    ("LTC", "litecoin"),
    ("DOGE", "dogecoin"),
    ("ARB", "arbitrum"),
    ("OP", "optimism"),
    ("SOL", "solana"),
    ("BASE", "base"),
    ("BLAST", "blast"),
    ("SCROLL", "scroll"),
    ("LINEA", "linea"),
];

pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    COINGECKO_IDS
        .iter()
        .find(|(sym, _)| sym.eq_ignore_ascii_case(symbol))
        .map(|(_, id)| *id)
}

pub fn supported_tokens() -> Vec<&'static str> {
    COINGECKO_IDS.iter().map(|(sym, _)| *sym).collect()
}

pub fn price_key(symbol: &str) -> String {
    format!("price_{}", symbol)
}

pub fn supply_key(symbol: &str) -> String {
    format!("supply_{}", symbol)
}

pub fn hashrate_key(symbol: &str) -> String {
    format!("hashrate_{}", symbol)
}

impl TokenClient {
    /// CoinGecko URL, carrying the demo API key when one is configured.
    fn coingecko_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
        let mut params = params.to_vec();
        if let Some(key) = self.config.api_keys.coingecko.as_deref() {
            params.push(("x_cg_demo_api_key", key));
        }
        endpoint(&self.config.endpoints.coingecko, path, &params)
    }
}
