//! chainquote: cached, rate-limited token quotes for EVM chains.
//!
//! Looks up price (USD and a local currency), supply and network hashrate for
//! a fixed set of tokens, and native balances across Etherscan-supported
//! chains. Every upstream response worth keeping lands in a SQLite TTL cache;
//! every outbound call waits on a single rate limiter. Read-only; no signing.

pub mod chain;
pub mod client;
pub mod config;
pub mod quote;

pub use chain::{Cache, CacheStats, ChainMetadata, FetchError, Fetcher, RateLimiter, Transport};
pub use client::{ApiStatus, BalanceEntry, ClientError, TokenClient, TokenQuote, DEFAULT_BALANCE_CHAINS};
pub use config::{Config, ConfigError};
