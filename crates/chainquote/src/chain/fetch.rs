//! Rate-limited access to upstream JSON APIs.
//!
//! Every outbound request goes through [`Fetcher::get_json`], which waits on
//! the client's [`RateLimiter`] immediately before handing the URL to the
//! transport. Callers await one request at a time, so requests never overlap.

use crate::chain::rate_limit::RateLimiter;
use crate::chain::transport::Transport;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Query parameters whose values never reach the logs.
const SECRET_PARAMS: [&str; 2] = ["apikey", "x_cg_demo_api_key"];

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api error: status {0} body {1}")]
    Api(u16, String),
    #[error("rejected by upstream: {0}")]
    Rejected(String),
    #[error("missing field {0}")]
    MissingField(String),
}

pub struct Fetcher {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    request_count: AtomicU64,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, limiter: RateLimiter) -> Self {
        Self {
            transport,
            limiter,
            request_count: AtomicU64::new(0),
        }
    }

    pub async fn get_json(&self, url: &Url) -> Result<Value, FetchError> {
        self.limiter.wait().await;
        self.request_count.fetch_add(1, Ordering::Relaxed);
        debug!(url = %redacted(url), "GET");
        let res = self.transport.get_json(url).await;
        if let Err(e) = &res {
            debug!(url = %redacted(url), error = %e, "request failed");
        }
        res
    }

    /// Outbound requests made so far (including failed ones).
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

/// `base` + `path` with query `params`. Values are percent-encoded.
pub fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let joined = joined.trim_end_matches('/');
    if params.is_empty() {
        Ok(Url::parse(joined)?)
    } else {
        Ok(Url::parse_with_params(joined, params)?)
    }
}

/// Numeric field at a JSON pointer; numeric strings are accepted.
pub fn f64_at(value: &Value, pointer: &str) -> Result<f64, FetchError> {
    value
        .pointer(pointer)
        .and_then(as_f64_lenient)
        .ok_or_else(|| FetchError::MissingField(pointer.to_string()))
}

pub(crate) fn as_f64_lenient(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Unwrap an Etherscan-style `{status, message, result}` envelope.
pub fn etherscan_result(value: &Value) -> Result<&Value, FetchError> {
    let ok = match value.get("status") {
        Some(Value::String(s)) => s == "1",
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        _ => false,
    };
    if !ok {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("API Error");
        return Err(FetchError::Rejected(message.to_string()));
    }
    value
        .get("result")
        .ok_or_else(|| FetchError::MissingField("result".to_string()))
}

/// URL with secret query values masked, for logs.
pub(crate) fn redacted(url: &Url) -> Url {
    let mut out = url.clone();
    if url.query().is_none() {
        return out;
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if SECRET_PARAMS.contains(&k.as_ref()) {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    out.query_pairs_mut().clear().extend_pairs(pairs);
    out
}
