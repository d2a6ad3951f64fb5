//! HTTP transport seam. Production uses reqwest; tests script responses.

use crate::chain::fetch::FetchError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// One GET returning a JSON body. Non-2xx responses are [`FetchError::Api`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &Url) -> Result<Value, FetchError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .user_agent(concat!("chainquote/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &Url) -> Result<Value, FetchError> {
        let res = self.client.get(url.clone()).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Api(status.as_u16(), body));
        }
        Ok(res.json::<Value>().await?)
    }
}
