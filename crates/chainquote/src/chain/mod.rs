//! Chain data fetching, caching, rate limiting, and the chain registry.

pub mod cache;
pub mod fetch;
pub mod rate_limit;
pub mod registry;
pub mod transport;

pub use cache::{Cache, CacheError, CacheStats};
pub use fetch::{FetchError, Fetcher};
pub use rate_limit::RateLimiter;
pub use registry::{ChainMetadata, RegistryError};
pub use transport::{HttpTransport, Transport};
