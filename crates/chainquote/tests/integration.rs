//! Integration tests against a scripted transport and saved chain-list fixture.

use async_trait::async_trait;
use chainquote::quote::POS_SENTINEL_UNIT;
use chainquote::{
    BalanceEntry, Cache, ClientError, Config, FetchError, RateLimiter, TokenClient, Transport,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use url::Url;

fn load_fixture(path: &str) -> Value {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../testdata");
    let full = root.join(path);
    let s =
        std::fs::read_to_string(&full).unwrap_or_else(|e| panic!("read {}: {}", full.display(), e));
    serde_json::from_str(&s).unwrap_or_else(|e| panic!("parse {}: {}", path, e))
}

/// Answers with the first route whose pattern occurs in the URL. A `None`
/// response is an HTTP 503; an unrouted URL is an HTTP 404.
struct MockTransport {
    routes: Vec<(String, Option<Value>)>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    fn new(routes: Vec<(&str, Option<Value>)>) -> Arc<Self> {
        let mut all = vec![("v2/chainlist".to_string(), Some(load_fixture("chainlist.json")))];
        all.extend(routes.into_iter().map(|(p, v)| (p.to_string(), v)));
        Arc::new(Self {
            routes: all,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn without_registry() -> Arc<Self> {
        Arc::new(Self {
            routes: vec![],
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count_matching(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|u| u.contains(pattern)).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_json(&self, url: &Url) -> Result<Value, FetchError> {
        let url = url.as_str().to_string();
        self.calls.lock().unwrap().push(url.clone());
        for (pattern, response) in &self.routes {
            if url.contains(pattern.as_str()) {
                return response
                    .clone()
                    .ok_or_else(|| FetchError::Api(503, "unavailable".to_string()));
            }
        }
        Err(FetchError::Api(404, format!("no route for {}", url)))
    }
}

fn temp_cache() -> (NamedTempFile, Cache) {
    let tmp = NamedTempFile::new().unwrap();
    let cache = Cache::open(tmp.path(), 5).unwrap();
    (tmp, cache)
}

async fn client_with(
    transport: Arc<MockTransport>,
    cache: Cache,
    config: Config,
) -> TokenClient {
    TokenClient::with_parts(config, cache, transport, RateLimiter::unlimited())
        .await
        .expect("bootstrap")
}

fn btc_price() -> Value {
    json!({"bitcoin": {"usd": 65000.0}})
}

fn cny_rate() -> Value {
    json!({"base": "USD", "rates": {"CNY": 7.2, "EUR": 0.92}})
}

#[tokio::test]
async fn bootstrap_builds_symbol_map_from_fixture() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![]);
    let client = client_with(transport.clone(), cache, Config::default()).await;

    let chains = client.list_supported_chains();
    let symbols: Vec<&str> = chains.iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(
        symbols,
        vec![
            "ARB",
            "ARB_SEPOLIA",
            "AVAX",
            "AVAX_TEST",
            "BASE",
            "BNB",
            "BNB_TEST",
            "ETH",
            "ETH_HOLESKY",
            "ETH_SEPOLIA",
            "MATIC",
            "MATIC_TEST",
        ]
    );
    assert_eq!(client.chain_info("matic").unwrap().chain_id, 137);
    assert_eq!(client.chain_info("ARB").unwrap().chain_id, 42161);
    assert!(client.chain_info("BLAST").is_none());
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(client.cache_stats().total, 1);
}

#[tokio::test]
async fn bootstrap_reuses_cached_chain_list() {
    let tmp = NamedTempFile::new().unwrap();
    let first = MockTransport::new(vec![]);
    client_with(first, Cache::open(tmp.path(), 5).unwrap(), Config::default()).await;

    let offline = MockTransport::without_registry();
    let client = client_with(
        offline.clone(),
        Cache::open(tmp.path(), 5).unwrap(),
        Config::default(),
    )
    .await;
    assert!(offline.calls().is_empty());
    assert_eq!(client.list_supported_chains().len(), 12);
}

#[tokio::test]
async fn bootstrap_without_registry_is_fatal() {
    let (_tmp, cache) = temp_cache();
    let res = TokenClient::with_parts(
        Config::default(),
        cache,
        MockTransport::without_registry(),
        RateLimiter::unlimited(),
    )
    .await;
    assert!(matches!(res, Err(ClientError::ChainRegistryUnavailable(_))));
}

#[tokio::test]
async fn empty_registry_is_fatal_and_not_cached() {
    let tmp = NamedTempFile::new().unwrap();
    let transport = Arc::new(MockTransport {
        routes: vec![(
            "v2/chainlist".to_string(),
            Some(json!({"status": "1", "result": []})),
        )],
        calls: Mutex::new(Vec::new()),
    });
    let res = TokenClient::with_parts(
        Config::default(),
        Cache::open(tmp.path(), 5).unwrap(),
        transport,
        RateLimiter::unlimited(),
    )
    .await;
    assert!(matches!(res, Err(ClientError::ChainRegistryUnavailable(_))));
    assert_eq!(Cache::open(tmp.path(), 5).unwrap().stats().total, 0);
}

#[tokio::test]
async fn unmapped_price_makes_no_call_and_no_write() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![]);
    let client = client_with(transport.clone(), cache, Config::default()).await;
    let before = transport.calls().len();

    assert_eq!(client.price("ZZZ").await, None);
    assert_eq!(transport.calls().len(), before);
    assert_eq!(client.cache_stats().total, 1);
}

#[tokio::test]
async fn price_converts_with_fx_and_caches() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![
        ("simple/price", Some(btc_price())),
        ("exchangerate", Some(cny_rate())),
    ]);
    let client = client_with(transport.clone(), cache, Config::default()).await;

    assert_eq!(client.price("btc").await, Some((65000.0, 468000.0)));
    let after_first = transport.calls().len();
    assert_eq!(client.price("BTC").await, Some((65000.0, 468000.0)));
    assert_eq!(transport.calls().len(), after_first);
    assert_eq!(client.fx_rate().await, 7.2);
    assert_eq!(transport.count_matching("exchangerate"), 1);
}

#[tokio::test]
async fn fx_failure_uses_fallback_without_caching() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![
        ("simple/price", Some(btc_price())),
        ("exchangerate", None),
    ]);
    let mut config = Config::default();
    config.fx.fallback_rate = 7.0;
    let client = client_with(transport.clone(), cache, config).await;

    assert_eq!(client.price("BTC").await, Some((65000.0, 455000.0)));
    assert_eq!(client.price("BTC").await, Some((65000.0, 455000.0)));
    assert_eq!(transport.count_matching("simple/price"), 2);
    assert_eq!(transport.count_matching("exchangerate"), 2);
    assert_eq!(client.cache_stats().total, 1);
}

#[tokio::test]
async fn price_failure_is_absent_and_uncached() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![("simple/price", Some(json!({"bitcoin": {}})))]);
    let client = client_with(transport.clone(), cache, Config::default()).await;

    assert_eq!(client.price("BTC").await, None);
    assert_eq!(client.price("BTC").await, None);
    assert_eq!(transport.count_matching("simple/price"), 2);
    assert_eq!(transport.count_matching("exchangerate"), 0);
}

#[tokio::test]
async fn pos_hashrate_sentinel_is_cached_without_calls() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![]);
    let client = client_with(transport.clone(), cache, Config::default()).await;
    let before = transport.calls().len();

    let first = client.hashrate("ETH").await;
    assert_eq!(first, (None, POS_SENTINEL_UNIT.to_string()));
    assert_eq!(client.cache_stats().total, 2);
    let second = client.hashrate("eth").await;
    assert_eq!(second, first);
    assert_eq!(transport.calls().len(), before);
}

#[tokio::test]
async fn wired_hashrate_caches_success_only() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![
        ("blockchain.info", Some(json!({"hash_rate": 650_000_000_000.0}))),
        ("kaspa", None),
    ]);
    let client = client_with(transport.clone(), cache, Config::default()).await;

    assert_eq!(
        client.hashrate("BTC").await,
        (Some(650_000_000_000.0), "GH/s".to_string())
    );
    client.hashrate("BTC").await;
    assert_eq!(transport.count_matching("blockchain.info"), 1);

    assert_eq!(
        client.hashrate("KAS").await,
        (None, POS_SENTINEL_UNIT.to_string())
    );
    client.hashrate("KAS").await;
    assert_eq!(transport.count_matching("kaspa"), 2);
}

#[tokio::test]
async fn eth_supply_prefers_native_source() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![(
        "action=ethsupply",
        Some(json!({"status": "1", "message": "OK", "result": "120000000000000000000000000"})),
    )]);
    let client = client_with(transport.clone(), cache, Config::default()).await;

    assert_eq!(
        client.supply("ETH").await,
        (Some(120_000_000.0), "ETH".to_string())
    );
    assert_eq!(transport.count_matching("coins/ethereum"), 0);
}

#[tokio::test]
async fn eth_supply_falls_back_to_circulating_supply() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![
        (
            "action=ethsupply",
            Some(json!({"status": "0", "message": "NOTOK", "result": "Invalid API Key"})),
        ),
        (
            "coins/ethereum",
            Some(json!({"market_data": {"circulating_supply": 120_500_000.0}})),
        ),
    ]);
    let client = client_with(transport.clone(), cache, Config::default()).await;

    assert_eq!(
        client.supply("eth").await,
        (Some(120_500_000.0), "ETH".to_string())
    );
    client.supply("ETH").await;
    assert_eq!(transport.count_matching("action=ethsupply"), 1);
    assert_eq!(transport.count_matching("coins/ethereum"), 1);
}

#[tokio::test]
async fn supply_failure_returns_symbol_and_is_not_cached() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![("coins/kaspa", None)]);
    let client = client_with(transport.clone(), cache, Config::default()).await;

    assert_eq!(client.supply("KAS").await, (None, "KAS".to_string()));
    assert_eq!(client.supply("KAS").await, (None, "KAS".to_string()));
    assert_eq!(transport.count_matching("coins/kaspa"), 2);
}

#[tokio::test]
async fn token_info_uses_sub_caches_and_caches_aggregate() {
    let (_tmp, cache) = temp_cache();
    cache.set_as("price_BTC", &(65000.0_f64, 468000.0_f64));
    let transport = MockTransport::new(vec![
        (
            "coins/bitcoin",
            Some(json!({"market_data": {"circulating_supply": 19_700_000.0}})),
        ),
        ("blockchain.info", Some(json!({"hash_rate": 6.5e11}))),
    ]);
    let client = client_with(transport.clone(), cache, Config::default()).await;

    let first = client.get_token_info("btc").await;
    assert_eq!(first.symbol, "BTC");
    assert_eq!(first.price_usd, Some(65000.0));
    assert_eq!(first.price_local, Some(468000.0));
    assert_eq!(first.currency, "CNY");
    assert_eq!(first.supply, Some(19_700_000.0));
    assert_eq!(first.supply_unit, "BTC");
    assert_eq!(first.hashrate, Some(6.5e11));
    assert_eq!(first.hashrate_unit, "GH/s");
    assert!(!first.from_cache);
    assert_eq!(transport.count_matching("simple/price"), 0);
    assert_eq!(transport.count_matching("coins/bitcoin"), 1);
    assert_eq!(transport.count_matching("blockchain.info"), 1);

    let calls = transport.calls().len();
    let second = client.get_token_info("BTC").await;
    assert!(second.from_cache);
    assert_eq!(second.price_usd, first.price_usd);
    assert_eq!(second.fetched_at, first.fetched_at);
    assert_eq!(transport.calls().len(), calls);
}

#[tokio::test]
async fn token_info_with_every_source_down_is_still_a_result() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![]);
    let client = client_with(transport.clone(), cache, Config::default()).await;

    let quote = client.get_token_info("DOGE").await;
    assert_eq!(quote.price_usd, None);
    assert_eq!(quote.supply, None);
    assert_eq!(quote.supply_unit, "DOGE");
    assert_eq!(quote.hashrate_unit, POS_SENTINEL_UNIT);
    assert!(client.get_token_info("DOGE").await.from_cache);
}

#[tokio::test]
async fn multichain_balance_reports_per_chain_outcomes() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![
        (
            "chainid=1&module=account",
            Some(json!({"status": "1", "message": "OK", "result": "1500000000000000000"})),
        ),
        (
            "chainid=56&module=account",
            Some(json!({"status": "0", "message": "NOTOK", "result": "Invalid address format"})),
        ),
        ("chainid=137&module=account", None),
    ]);
    let client = client_with(transport.clone(), cache, Config::default()).await;
    let address = "0x00000000219ab540356cBB839Cbe05303d7705Fa";

    let balances = client
        .get_multichain_balance(address, &["eth", "BNB", "matic", "SOL"])
        .await;
    assert_eq!(
        balances["ETH"],
        BalanceEntry::Balance {
            balance: 1.5,
            balance_wei: "1500000000000000000".to_string(),
            chain_name: "Ethereum Mainnet".to_string(),
        }
    );
    assert_eq!(
        balances["BNB"],
        BalanceEntry::Error {
            error: "NOTOK".to_string()
        }
    );
    assert_eq!(
        balances["MATIC"],
        BalanceEntry::Error {
            error: "HTTP 503".to_string()
        }
    );
    assert_eq!(
        balances["SOL"],
        BalanceEntry::Error {
            error: "Chain not supported".to_string()
        }
    );
    assert_eq!(transport.count_matching("action=balance"), 3);

    let again = client
        .get_multichain_balance(address, &["ETH", "BNB", "MATIC", "SOL"])
        .await;
    assert_eq!(again, balances);
    assert_eq!(transport.count_matching("action=balance"), 3);
}

#[tokio::test]
async fn every_outbound_call_waits_on_the_limiter() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![
        ("simple/price", Some(btc_price())),
        ("exchangerate", Some(cny_rate())),
    ]);
    let start = Instant::now();
    let client = TokenClient::with_parts(
        Config::default(),
        cache,
        transport.clone(),
        RateLimiter::new(Duration::from_millis(100)),
    )
    .await
    .unwrap();
    client.price("BTC").await;
    assert_eq!(transport.calls().len(), 3);
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn clear_cache_empties_the_store() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![]);
    let client = client_with(transport, cache, Config::default()).await;
    client.hashrate("ETH").await;
    client.hashrate("BNB").await;
    assert_eq!(client.cache_stats().total, 3);

    assert_eq!(client.clear_cache(), 3);
    assert_eq!(client.cache_stats().total, 0);
    assert_eq!(client.clean_expired_cache(), 0);
}

#[tokio::test]
async fn disabled_cache_always_goes_upstream() {
    let transport = MockTransport::new(vec![("blockchain.info", Some(json!({"hash_rate": 1.0})))]);
    let client = client_with(transport.clone(), Cache::disabled(), Config::default()).await;

    assert!(!client.get_token_info("BTC").await.from_cache);
    assert!(!client.get_token_info("BTC").await.from_cache);
    assert_eq!(transport.count_matching("blockchain.info"), 2);
    let stats = client.cache_stats();
    assert!(!stats.enabled);
    assert_eq!(stats.total, 0);
    assert_eq!(client.clear_cache(), 0);
}

#[tokio::test]
async fn api_status_reflects_configuration() {
    let (_tmp, cache) = temp_cache();
    let transport = MockTransport::new(vec![]);
    let mut config = Config::default();
    config.api_keys.etherscan = "key".to_string();
    let client = client_with(transport, cache, config).await;

    let status = client.api_status();
    assert!(status.api_key_configured);
    assert_eq!(status.supported_chains, 12);
    assert_eq!(status.supported_tokens, client.list_supported_tokens().len());
    assert!(status.cache_enabled);
    assert_eq!(status.cache_ttl_minutes, 5);
    assert_eq!(status.requests_made, 1);
}
