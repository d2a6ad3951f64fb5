use crate::chain::fetch::{f64_at, FetchError};
use crate::client::TokenClient;
use crate::quote::{coingecko_id, price_key};
use tracing::warn;

impl TokenClient {
    /// `(usd, local)` price, or None for unmapped symbols and failed lookups.
    ///
    /// Only a live USD price converted with a live (or cached) FX rate is
    /// cached; a price converted with the fallback rate is returned but not
    /// stored.
    pub async fn price(&self, symbol: &str) -> Option<(f64, f64)> {
        let symbol = symbol.trim().to_uppercase();
        let key = price_key(&symbol);
        if let Some(cached) = self.cache.get_as::<(f64, f64)>(&key) {
            return Some(cached);
        }
        let id = coingecko_id(&symbol)?;
        let usd = match self.fetch_usd_price(id).await {
            Ok(usd) => usd,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "price unavailable");
                return None;
            }
        };
        let (rate, live) = self.fx_quote().await;
        let pair = (usd, usd * rate);
        if live {
            self.cache.set_as(&key, &pair);
        }
        Some(pair)
    }

    async fn fetch_usd_price(&self, id: &str) -> Result<f64, FetchError> {
        let url = self.coingecko_url("simple/price", &[("ids", id), ("vs_currencies", "usd")])?;
        let body = self.fetcher.get_json(&url).await?;
        f64_at(&body, &format!("/{}/usd", id))
    }
}
