// Pipeline ingestion: landing page resolution, source fetching and the failure circuit

pub mod circuit_breaker;
pub mod download_link;
pub mod fetcher;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitError, CircuitState};
pub use fetcher::{RetryPolicy, SourceFetcher};
