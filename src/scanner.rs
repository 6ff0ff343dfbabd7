//! Scan orchestration: one batched fetch, ten possible detectors, a ranked
//! summary.

use std::sync::Arc;

use rayon::prelude::*;
use tokio::sync::mpsc;

use crate::market::{
    FetchError, FetchFailure, FetchOutcome, Lookback, MarketDataClient, MarketDataProvider,
    Timeframe, UsageStats,
};
use crate::{BuiltinDetector, Pattern, PatternError, TimeSeries};

/// Default scan universe: a 50-ticker NASDAQ sample.
pub const DEFAULT_UNIVERSE: [&str; 50] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "AVGO", "COST", "NFLX", "ASML",
    "AMD", "PEP", "ADBE", "CSCO", "CMCSA", "TMUS", "INTC", "TXN", "QCOM", "INTU", "AMAT", "HON",
    "AMGN", "BKNG", "ADP", "SBUX", "GILD", "ISRG", "REGN", "VRTX", "ADI", "MU", "LRCX", "PANW",
    "KLAC", "MDLZ", "SNPS", "CDNS", "MELI", "PYPL", "MAR", "CSX", "ORLY", "CRWD", "ABNB", "FTNT",
    "MNST", "DASH", "WDAY",
];

/// Listing entry for display layers; see [`list_patterns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PatternInfo {
    pub id: &'static str,
    pub display_name: &'static str,
}

/// All supported patterns in canonical order, no I/O.
pub fn list_patterns() -> Vec<PatternInfo> {
    Pattern::ALL
        .into_iter()
        .map(|p| PatternInfo {
            id: p.id(),
            display_name: p.display_name(),
        })
        .collect()
}

// ============================================================
// RESULTS
// ============================================================

/// Per-ticker outcome, retained whether or not the detector matched so
/// near-misses stay observable.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PatternResult {
    pub symbol: String,
    pub matched: bool,
    pub confidence: f64,
    pub last_close: f64,
    /// Percent change of the last close vs. the previous close.
    pub percent_change: f64,
    pub volume: f64,
}

/// Terminal result of one scan.
///
/// `results` holds every evaluated ticker in universe order; `matches` is
/// the thresholded subset ranked by descending confidence (ties keep
/// universe order). A zero-match scan is distinguishable from a failed one
/// by the counters.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScanSummary {
    pub pattern: Pattern,
    pub timeframe: Timeframe,
    pub lookback: Lookback,
    pub universe_size: usize,
    /// Tickers whose series was evaluated by the detector.
    pub processed: usize,
    /// Tickers skipped: absent upstream or below the minimum bar count.
    pub insufficient_data: usize,
    /// Tickers whose bars or detector output were unusable.
    pub errors: usize,
    pub matches: Vec<PatternResult>,
    pub results: Vec<PatternResult>,
}

/// Whole-scan failure. Per-ticker problems never surface here; they are
/// counted in the summary instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Incremental events from [`Scanner::scan_stream`].
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Started {
        universe_size: usize,
    },
    /// One ticker finished evaluating.
    Progress {
        symbol: String,
        done: usize,
        total: usize,
    },
    /// A match, emitted as soon as it is found (arrival order, unranked).
    Match(PatternResult),
    Finished(ScanSummary),
    Failed(ScanError),
}

// ============================================================
// SCANNER
// ============================================================

/// Ties the market data client to the detector set.
///
/// Owns its universe and client; nothing is ambient, so tests can build
/// fully isolated instances.
pub struct Scanner<P> {
    client: MarketDataClient<P>,
    universe: Vec<String>,
    min_confidence: f64,
}

impl<P: MarketDataProvider> Scanner<P> {
    pub fn new(client: MarketDataClient<P>, universe: Vec<String>) -> Self {
        Self {
            client,
            universe,
            min_confidence: 0.3,
        }
    }

    /// The built-in NASDAQ sample universe.
    pub fn with_default_universe(client: MarketDataClient<P>) -> Self {
        Self::new(
            client,
            DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Override the match threshold (default 0.3).
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    /// Scan the whole universe for one pattern.
    ///
    /// One batched fetch; detector evaluation fans out across tickers with
    /// rayon, then results are re-collected in universe order so identical
    /// cached inputs always produce identical summaries.
    pub async fn scan(
        &self,
        pattern: Pattern,
        timeframe: Timeframe,
        lookback: Lookback,
    ) -> Result<ScanSummary, ScanError> {
        let detector = pattern.detector();
        detector.validate_config()?;

        let outcome = self.client.fetch(&self.universe, timeframe, lookback).await?;

        let evals: Vec<SymbolEval> = self
            .universe
            .par_iter()
            .map(|symbol| evaluate_symbol(&detector, symbol, &outcome))
            .collect();

        let mut summary = empty_summary(pattern, timeframe, lookback, self.universe.len());
        for eval in evals {
            record(&mut summary, eval, self.min_confidence);
        }
        rank_matches(&mut summary.matches);

        tracing::info!(
            pattern = pattern.id(),
            processed = summary.processed,
            matches = summary.matches.len(),
            insufficient = summary.insufficient_data,
            errors = summary.errors,
            "scan complete"
        );
        Ok(summary)
    }

    /// Streaming variant of [`scan`](Self::scan): pull events from the
    /// returned channel for live feedback.
    ///
    /// The producer runs on a spawned task; dropping the receiver stops
    /// emission. An in-flight fetch is allowed to finish so the cache still
    /// gets populated.
    pub fn scan_stream(
        self: Arc<Self>,
        pattern: Pattern,
        timeframe: Timeframe,
        lookback: Lookback,
    ) -> mpsc::Receiver<ScanEvent>
    where
        P: 'static,
    {
        let (tx, rx) = mpsc::channel(32);
        let scanner = self;

        tokio::spawn(async move {
            let detector = pattern.detector();
            if let Err(err) = detector.validate_config() {
                let _ = tx.send(ScanEvent::Failed(err.into())).await;
                return;
            }

            let total = scanner.universe.len();
            if tx
                .send(ScanEvent::Started {
                    universe_size: total,
                })
                .await
                .is_err()
            {
                return;
            }

            let outcome = match scanner
                .client
                .fetch(&scanner.universe, timeframe, lookback)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    let _ = tx.send(ScanEvent::Failed(err.into())).await;
                    return;
                }
            };

            let mut summary = empty_summary(pattern, timeframe, lookback, total);
            for (done, symbol) in scanner.universe.iter().enumerate() {
                let eval = evaluate_symbol(&detector, symbol, &outcome);
                let matched_result = match &eval {
                    SymbolEval::Evaluated(r)
                        if r.matched && r.confidence >= scanner.min_confidence =>
                    {
                        Some(r.clone())
                    }
                    _ => None,
                };
                record(&mut summary, eval, scanner.min_confidence);

                if tx
                    .send(ScanEvent::Progress {
                        symbol: symbol.clone(),
                        done: done + 1,
                        total,
                    })
                    .await
                    .is_err()
                {
                    return;
                }
                if let Some(result) = matched_result {
                    if tx.send(ScanEvent::Match(result)).await.is_err() {
                        return;
                    }
                }
            }

            rank_matches(&mut summary.matches);
            let _ = tx.send(ScanEvent::Finished(summary)).await;
        });

        rx
    }

    pub async fn usage_stats(&self) -> UsageStats {
        self.client.usage_stats().await
    }

    pub async fn clear_cache(&self) {
        self.client.clear_cache().await;
    }
}

// ============================================================
// EVALUATION
// ============================================================

enum SymbolEval {
    Evaluated(PatternResult),
    Insufficient,
    Error,
}

fn evaluate_symbol(detector: &BuiltinDetector, symbol: &str, outcome: &FetchOutcome) -> SymbolEval {
    let Some(series) = outcome.series.get(symbol) else {
        return match outcome.failures.get(symbol) {
            Some(FetchFailure::InvalidBars { .. }) => SymbolEval::Error,
            _ => SymbolEval::Insufficient,
        };
    };

    let detection = detector.detect(series);
    if !detection.confidence.is_finite() {
        return SymbolEval::Error;
    }

    SymbolEval::Evaluated(pattern_result(symbol, series, detection))
}

fn pattern_result(
    symbol: &str,
    series: &TimeSeries,
    detection: crate::Detection,
) -> PatternResult {
    let bars = series.bars();
    let last = bars[bars.len() - 1];
    let percent_change = if bars.len() >= 2 {
        let prev = bars[bars.len() - 2].close;
        (last.close - prev) / prev * 100.0
    } else {
        0.0
    };

    PatternResult {
        symbol: symbol.to_string(),
        matched: detection.matched,
        confidence: detection.confidence,
        last_close: last.close,
        percent_change,
        volume: last.volume,
    }
}

fn empty_summary(
    pattern: Pattern,
    timeframe: Timeframe,
    lookback: Lookback,
    universe_size: usize,
) -> ScanSummary {
    ScanSummary {
        pattern,
        timeframe,
        lookback,
        universe_size,
        processed: 0,
        insufficient_data: 0,
        errors: 0,
        matches: Vec::new(),
        results: Vec::new(),
    }
}

fn record(summary: &mut ScanSummary, eval: SymbolEval, min_confidence: f64) {
    match eval {
        SymbolEval::Evaluated(result) => {
            summary.processed += 1;
            if result.matched && result.confidence >= min_confidence {
                summary.matches.push(result.clone());
            }
            summary.results.push(result);
        }
        SymbolEval::Insufficient => summary.insufficient_data += 1,
        SymbolEval::Error => summary.errors += 1,
    }
}

/// Stable sort by descending confidence; ties keep universe order.
fn rank_matches(matches: &mut [PatternResult]) {
    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_patterns_order_and_size() {
        let patterns = list_patterns();
        assert_eq!(patterns.len(), 10);
        assert_eq!(patterns[0].id, "bull_flag");
        assert_eq!(patterns[9].id, "ma_crossover_bearish");
        assert_eq!(patterns[2].display_name, "Head and Shoulders");
    }

    #[test]
    fn test_default_universe_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for symbol in DEFAULT_UNIVERSE {
            assert!(seen.insert(symbol), "duplicate ticker {symbol}");
        }
        assert_eq!(seen.len(), 50);
    }

    #[test]
    fn test_rank_matches_is_stable_on_ties() {
        let result = |symbol: &str, confidence: f64| PatternResult {
            symbol: symbol.to_string(),
            matched: true,
            confidence,
            last_close: 100.0,
            percent_change: 0.0,
            volume: 1000.0,
        };

        let mut matches = vec![result("A", 0.5), result("B", 0.9), result("C", 0.5)];
        rank_matches(&mut matches);
        let order: Vec<&str> = matches.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(order, ["B", "A", "C"]);
    }
}
