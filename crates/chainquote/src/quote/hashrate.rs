use crate::chain::fetch::{endpoint, f64_at, FetchError};
use crate::client::TokenClient;
use crate::quote::hashrate_key;
use tracing::warn;

/// Unit reported for tokens without a proof-of-work hashrate.
pub const POS_SENTINEL_UNIT: &str = "N/A (PoS)";

impl TokenClient {
    /// `(hashrate, unit)` for the proof-of-work tokens with a wired source
    /// (BTC, KAS). Any other symbol gets `(None, "N/A (PoS)")`, cached without
    /// a network call. A failed lookup for a wired token returns the same
    /// sentinel uncached.
    pub async fn hashrate(&self, symbol: &str) -> (Option<f64>, String) {
        let symbol = symbol.trim().to_uppercase();
        let key = hashrate_key(&symbol);
        if let Some(cached) = self.cache.get_as::<(Option<f64>, String)>(&key) {
            return cached;
        }

        let endpoints = &self.config.endpoints;
        let (url, field, unit) = match symbol.as_str() {
            "BTC" => (endpoints.btc_hashrate.as_str(), "/hash_rate", "GH/s"),
            "KAS" => (endpoints.kas_hashrate.as_str(), "/hashrate", "H/s"),
            _ => {
                let sentinel: (Option<f64>, String) = (None, POS_SENTINEL_UNIT.to_string());
                self.cache.set_as(&key, &sentinel);
                return sentinel;
            }
        };

        match self.fetch_hashrate(url, field).await {
            Ok(rate) => {
                let result = (Some(rate), unit.to_string());
                self.cache.set_as(&key, &result);
                result
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "hashrate unavailable");
                (None, POS_SENTINEL_UNIT.to_string())
            }
        }
    }

    async fn fetch_hashrate(&self, url: &str, field: &str) -> Result<f64, FetchError> {
        let url = endpoint(url, "", &[])?;
        let body = self.fetcher.get_json(&url).await?;
        f64_at(&body, field)
    }
}
