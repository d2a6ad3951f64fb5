//! Plain-text and JSON rendering of chainquote results for the terminal.

use chainquote::{ApiStatus, BalanceEntry, CacheStats, ChainMetadata, TokenQuote};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

const ABSENT: &str = "—";

/// One token block: price, supply, hashrate and provenance.
pub fn render_token_info(quote: &TokenQuote) -> String {
    let mut out = String::new();
    let source = if quote.from_cache { "cache" } else { "live" };
    let _ = writeln!(out, "{} ({})", quote.symbol, source);
    let _ = writeln!(
        out,
        "  price       ${}",
        opt(quote.price_usd, |v| group_thousands(v, 2))
    );
    let _ = writeln!(
        out,
        "  price {:<5} {}",
        quote.currency,
        opt(quote.price_local, |v| group_thousands(v, 2))
    );
    let _ = writeln!(
        out,
        "  supply      {} {}",
        opt(quote.supply, |v| group_thousands(v, 0)),
        quote.supply_unit
    );
    let _ = writeln!(
        out,
        "  hashrate    {} {}",
        opt(quote.hashrate, |v| format!("{:.3e}", v)),
        quote.hashrate_unit
    );
    let _ = writeln!(out, "  fetched at  {}", quote.fetched_at);
    out
}

pub fn render_cache_stats(stats: &CacheStats) -> String {
    if !stats.enabled {
        return "cache: disabled\n".to_string();
    }
    format!(
        "cache: {} entries ({} valid, {} expired), ttl {} min\n",
        stats.total, stats.valid, stats.expired, stats.ttl_minutes
    )
}

/// Balances keyed by chain symbol, one line each; failures show their reason.
pub fn render_balances(address: &str, balances: &BTreeMap<String, BalanceEntry>) -> String {
    let mut out = format!("balances for {}\n", address);
    for (symbol, entry) in balances {
        let _ = match entry {
            BalanceEntry::Balance {
                balance,
                chain_name,
                ..
            } => writeln!(out, "  {:<12} {:>24.6}  {}", symbol, balance, chain_name),
            BalanceEntry::Error { error } => {
                writeln!(out, "  {:<12} {:>24}  error: {}", symbol, ABSENT, error)
            }
        };
    }
    out
}

pub fn render_chains(chains: &[&ChainMetadata]) -> String {
    let mut out = format!("{} supported chains\n", chains.len());
    for chain in chains {
        let _ = writeln!(
            out,
            "  {:<14} {:>10}  {}",
            chain.symbol, chain.chain_id, chain.display_name
        );
    }
    out
}

pub fn render_tokens(tokens: &[&str]) -> String {
    format!("{} supported tokens\n  {}\n", tokens.len(), tokens.join(" "))
}

pub fn render_status(status: &ApiStatus) -> String {
    let mut out = String::new();
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let _ = writeln!(
        out,
        "etherscan key configured  {}",
        yes_no(status.api_key_configured)
    );
    let _ = writeln!(out, "supported chains          {}", status.supported_chains);
    let _ = writeln!(out, "supported tokens          {}", status.supported_tokens);
    let _ = writeln!(
        out,
        "cache                     {}",
        if status.cache_enabled {
            format!("enabled, ttl {} min", status.cache_ttl_minutes)
        } else {
            "disabled".to_string()
        }
    );
    let _ = writeln!(
        out,
        "request delay             {:.2}s",
        status.request_delay_secs
    );
    let _ = writeln!(out, "requests this session     {}", status.requests_made);
    out
}

/// Result of an API key check: the hints, or a single all-clear line.
pub fn render_key_check(issues: &[String]) -> String {
    if issues.is_empty() {
        return "api keys configured\n".to_string();
    }
    let mut out = String::new();
    for line in issues {
        let _ = writeln!(out, "{}", line);
    }
    out
}

/// Pretty JSON for `--json` output.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ReportError> {
    serde_json::to_string_pretty(value).map_err(ReportError::Json)
}

fn opt(value: Option<f64>, f: impl Fn(f64) -> String) -> String {
    value.map(f).unwrap_or_else(|| ABSENT.to_string())
}

/// `1234567.891` with 2 decimals -> `1,234,567.89`.
fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

#[derive(Debug)]
pub enum ReportError {
    Json(serde_json::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Json(e) => write!(f, "json: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}
