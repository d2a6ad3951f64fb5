use crate::chain::fetch::{endpoint, f64_at, FetchError};
use crate::client::TokenClient;
use tracing::warn;

impl TokenClient {
    /// USD → local currency multiplier. Falls back to the configured constant
    /// (uncached) when the rate source fails.
    pub async fn fx_rate(&self) -> f64 {
        self.fx_quote().await.0
    }

    /// Rate plus whether it came from the cache or a live source.
    pub(crate) async fn fx_quote(&self) -> (f64, bool) {
        let key = self.fx_key();
        if let Some(rate) = self.cache.get_as::<f64>(&key) {
            return (rate, true);
        }
        match self.fetch_fx_rate().await {
            Ok(rate) => {
                self.cache.set_as(&key, &rate);
                (rate, true)
            }
            Err(e) => {
                warn!(currency = %self.config.fx.currency, error = %e, "fx rate unavailable, using fallback");
                (self.config.fx.fallback_rate, false)
            }
        }
    }

    pub(crate) fn fx_key(&self) -> String {
        format!("usd_{}_rate", self.config.fx.currency.to_lowercase())
    }

    async fn fetch_fx_rate(&self) -> Result<f64, FetchError> {
        let url = endpoint(&self.config.endpoints.fx, "", &[])?;
        let body = self.fetcher.get_json(&url).await?;
        let pointer = format!("/rates/{}", self.config.fx.currency.to_uppercase());
        f64_at(&body, &pointer)
    }
}
