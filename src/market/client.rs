//! Batched, cached, rate-limited market data client.
//!
//! The quota invariant lives here: one `fetch` call for N symbols costs at
//! most one upstream request, and zero when the batch is cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::cache::{CacheStats, MarketDataCache};
use super::provider::{row_limit, Lookback, MarketDataProvider, ProviderError, Timeframe};
use super::rate_limit::RequestPacer;
use crate::{Bar, TimeSeries};

// ============================================================
// CONFIGURATION
// ============================================================

/// Tunables for the client. The defaults mirror a free-tier upstream plan:
/// 15-minute cache, one request per second, three attempts.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub cache_ttl: Duration,
    pub min_request_spacing: Duration,
    /// Total attempts per fetch, first try included.
    pub max_attempts: u32,
    /// Base backoff, doubled after each failed attempt.
    pub retry_backoff: Duration,
    /// Bars below which a symbol is reported as insufficient. 50 covers the
    /// longest detector lookback plus its warmup bar.
    pub min_bars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(900),
            min_request_spacing: Duration::from_secs(1),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(250),
            min_bars: 50,
        }
    }
}

// ============================================================
// OUTCOMES
// ============================================================

/// Per-symbol failure, recorded in the outcome rather than raised. A whole
/// batch only fails via [`FetchError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("symbol absent from upstream response")]
    MissingFromResponse,

    #[error("insufficient data: got {got} bars, need {need}")]
    InsufficientData { got: usize, need: usize },

    #[error("invalid bars: {reason}")]
    InvalidBars { reason: String },
}

/// Result of one batched fetch: validated series per symbol, plus the
/// symbols that could not be served and why.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub series: HashMap<String, TimeSeries>,
    pub failures: HashMap<String, FetchFailure>,
}

/// Whole-batch failure: the upstream stayed unavailable through every
/// retry attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("upstream fetch failed after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: ProviderError,
    },
}

/// Usage counters, shaped for a quota dashboard.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct UsageStats {
    /// Successful upstream calls since construction.
    pub api_calls_made: u64,
    pub cache_entries: usize,
    /// Percentage of cache lookups that hit.
    pub cache_hit_rate: f64,
    /// Calls extrapolated to a 30-day month at the observed rate.
    pub estimated_monthly_usage: f64,
}

// ============================================================
// CLIENT
// ============================================================

/// Caching, pacing, retrying front-end over a [`MarketDataProvider`].
pub struct MarketDataClient<P> {
    provider: P,
    cache: Arc<Mutex<MarketDataCache<FetchOutcome>>>,
    pacer: RequestPacer,
    config: ClientConfig,
    api_calls: AtomicU64,
    started_at: Instant,
}

impl<P: MarketDataProvider> MarketDataClient<P> {
    pub fn new(provider: P, config: ClientConfig) -> Self {
        Self {
            provider,
            cache: Arc::new(Mutex::new(MarketDataCache::new(config.cache_ttl))),
            pacer: RequestPacer::new(config.min_request_spacing),
            config,
            api_calls: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Fetch history for a symbol batch.
    ///
    /// Symbols are sorted and deduplicated before anything else, so the
    /// cache key is order-insensitive. A cache hit returns without touching
    /// the pacer or the provider.
    pub async fn fetch(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        lookback: Lookback,
    ) -> Result<FetchOutcome, FetchError> {
        let mut batch: Vec<String> = symbols.to_vec();
        batch.sort();
        batch.dedup();

        let limit = row_limit(timeframe, lookback);
        let key = format!("{}:{}:{}:{}", timeframe, lookback, limit, batch.join(","));

        if let Some(outcome) = self.cache.lock().await.get(&key) {
            tracing::debug!(key = %key, "serving batch from cache");
            return Ok(outcome);
        }

        self.pacer.pace().await;

        let raw = self.fetch_with_retry(&batch, timeframe, lookback, limit).await?;
        let outcome = partition(raw, &batch, self.config.min_bars);

        tracing::info!(
            symbols = batch.len(),
            served = outcome.series.len(),
            failed = outcome.failures.len(),
            timeframe = %timeframe,
            lookback = %lookback,
            "batched fetch complete"
        );

        self.cache.lock().await.put(key, outcome.clone());
        Ok(outcome)
    }

    async fn fetch_with_retry(
        &self,
        batch: &[String],
        timeframe: Timeframe,
        lookback: Lookback,
        limit: usize,
    ) -> Result<HashMap<String, Vec<Bar>>, FetchError> {
        let mut attempt = 1;
        loop {
            match self
                .provider
                .fetch_batch(batch, timeframe, lookback, limit)
                .await
            {
                Ok(raw) => {
                    // Only successful calls consume quota.
                    self.api_calls.fetch_add(1, Ordering::Relaxed);
                    return Ok(raw);
                }
                Err(err) if attempt < self.config.max_attempts => {
                    let backoff = self.config.retry_backoff * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "upstream fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(FetchError::RetriesExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
            }
        }
    }

    /// Quota counters; `api_calls_made` counts successful upstream calls
    /// only (retried failures are free on the upstream plans this models).
    pub async fn usage_stats(&self) -> UsageStats {
        let calls = self.api_calls.load(Ordering::Relaxed);
        let CacheStats {
            entries,
            hit_count,
            miss_count,
        } = self.cache.lock().await.stats();

        let lookups = hit_count + miss_count;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hit_count as f64 / lookups as f64 * 100.0
        };

        let elapsed_secs = self.started_at.elapsed().as_secs_f64().max(1.0);
        let monthly = calls as f64 / elapsed_secs * 30.0 * 86_400.0;

        UsageStats {
            api_calls_made: calls,
            cache_entries: entries,
            cache_hit_rate: hit_rate,
            estimated_monthly_usage: monthly,
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
        tracing::info!("market data cache cleared");
    }
}

/// Split a raw batch into validated series and per-symbol failures.
///
/// Bars are sorted and deduplicated by timestamp before validation, since
/// providers are allowed to return unordered pages.
fn partition(
    mut raw: HashMap<String, Vec<Bar>>,
    batch: &[String],
    min_bars: usize,
) -> FetchOutcome {
    let mut series = HashMap::new();
    let mut failures = HashMap::new();

    for symbol in batch {
        let Some(mut bars) = raw.remove(symbol) else {
            failures.insert(symbol.clone(), FetchFailure::MissingFromResponse);
            continue;
        };

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);

        if bars.len() < min_bars {
            failures.insert(
                symbol.clone(),
                FetchFailure::InsufficientData {
                    got: bars.len(),
                    need: min_bars,
                },
            );
            continue;
        }

        match TimeSeries::new(bars) {
            Ok(ts) => {
                series.insert(symbol.clone(), ts);
            }
            Err(err) => {
                failures.insert(
                    symbol.clone(),
                    FetchFailure::InvalidBars {
                        reason: err.to_string(),
                    },
                );
            }
        }
    }

    FetchOutcome { series, failures }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(i: i64) -> Bar {
        Bar {
            timestamp: i * 86_400_000,
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_partition_classifies_symbols() {
        let mut raw = HashMap::new();
        raw.insert("FULL".to_string(), (0..60).map(bar).collect::<Vec<_>>());
        raw.insert("SHORT".to_string(), (0..10).map(bar).collect::<Vec<_>>());

        let batch = vec!["FULL".to_string(), "GONE".to_string(), "SHORT".to_string()];
        let outcome = partition(raw, &batch, 50);

        assert!(outcome.series.contains_key("FULL"));
        assert_eq!(
            outcome.failures.get("SHORT"),
            Some(&FetchFailure::InsufficientData { got: 10, need: 50 })
        );
        assert_eq!(
            outcome.failures.get("GONE"),
            Some(&FetchFailure::MissingFromResponse)
        );
    }

    #[test]
    fn test_partition_sorts_and_dedupes_bars() {
        let mut bars: Vec<Bar> = (0..60).map(bar).collect();
        bars.reverse();
        bars.push(bar(30)); // duplicate timestamp

        let mut raw = HashMap::new();
        raw.insert("A".to_string(), bars);

        let outcome = partition(raw, &["A".to_string()], 50);
        let series = &outcome.series["A"];
        assert_eq!(series.len(), 60);
        assert!(series.bars().windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
