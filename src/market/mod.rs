//! Market data acquisition layer.
//!
//! Turns a batch of tickers into validated per-ticker
//! [`TimeSeries`](crate::TimeSeries) through a caching, rate-limited,
//! retrying client.
//! Transport, auth and payload shape live behind the
//! [`MarketDataProvider`] trait; everything in this module is
//! provider-agnostic.

pub mod cache;
pub mod client;
pub mod provider;
pub mod rate_limit;

pub use cache::{CacheStats, MarketDataCache};
pub use client::{
    ClientConfig, FetchError, FetchFailure, FetchOutcome, MarketDataClient, UsageStats,
};
pub use provider::{row_limit, Lookback, MarketDataProvider, ProviderError, Timeframe};
pub use rate_limit::RequestPacer;
