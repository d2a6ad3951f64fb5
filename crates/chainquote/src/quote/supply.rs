use crate::chain::fetch::{as_f64_lenient, endpoint, etherscan_result, f64_at, FetchError};
use crate::client::TokenClient;
use crate::quote::{coingecko_id, supply_key};
use tracing::warn;

/// The one token with a native-chain supply source.
const NATIVE_SUPPLY_SYMBOL: &str = "ETH";
const WEI_PER_ETH: f64 = 1e18;

impl TokenClient {
    /// `(supply, unit)`. ETH asks Etherscan first; everything else, and ETH on
    /// failure, reads CoinGecko's circulating supply. When both fail the
    /// result is `(None, SYM)` and nothing is cached.
    pub async fn supply(&self, symbol: &str) -> (Option<f64>, String) {
        let symbol = symbol.trim().to_uppercase();
        let key = supply_key(&symbol);
        if let Some(cached) = self.cache.get_as::<(Option<f64>, String)>(&key) {
            return cached;
        }

        let mut found = None;
        if symbol == NATIVE_SUPPLY_SYMBOL {
            match self.fetch_native_supply().await {
                Ok(supply) => found = Some((supply, NATIVE_SUPPLY_SYMBOL.to_string())),
                Err(e) => warn!(error = %e, "native supply unavailable, trying coingecko"),
            }
        }
        if found.is_none() {
            if let Some(id) = coingecko_id(&symbol) {
                match self.fetch_circulating_supply(id).await {
                    Ok(supply) => found = Some((supply, symbol.clone())),
                    Err(e) => warn!(symbol = %symbol, error = %e, "circulating supply unavailable"),
                }
            }
        }

        match found {
            Some((supply, unit)) => {
                let result = (Some(supply), unit);
                self.cache.set_as(&key, &result);
                result
            }
            None => (None, symbol),
        }
    }

    async fn fetch_native_supply(&self) -> Result<f64, FetchError> {
        let url = endpoint(
            &self.config.endpoints.etherscan,
            "v2/api",
            &[
                ("chainid", "1"),
                ("module", "stats"),
                ("action", "ethsupply"),
                ("apikey", self.config.api_keys.etherscan.as_str()),
            ],
        )?;
        let body = self.fetcher.get_json(&url).await?;
        let wei = as_f64_lenient(etherscan_result(&body)?)
            .ok_or_else(|| FetchError::MissingField("result".to_string()))?;
        Ok(wei / WEI_PER_ETH)
    }

    async fn fetch_circulating_supply(&self, id: &str) -> Result<f64, FetchError> {
        let url = self.coingecko_url(&format!("coins/{}", id), &[])?;
        let body = self.fetcher.get_json(&url).await?;
        let supply = f64_at(&body, "/market_data/circulating_supply")?;
        if supply > 0.0 {
            Ok(supply)
        } else {
            Err(FetchError::MissingField(
                "/market_data/circulating_supply".to_string(),
            ))
        }
    }
}
