//! # chartscan - chart pattern scanner
//!
//! Scans a fixed universe of equities for recurring price/volume chart
//! patterns (flags, reversals, gaps, volume anomalies, moving-average
//! crossovers) and reports a confidence score per ticker.
//!
//! The crate has two halves:
//!
//! - a **market data layer** ([`market`]) that turns a batch of tickers into
//!   per-ticker OHLCV [`TimeSeries`] through a caching, rate-limited,
//!   retrying client; one scan of N symbols costs at most one upstream call;
//! - a **detector set** ([`detectors`]): ten independent, stateless pattern
//!   detectors, each mapping one series to a [`Detection`] (structural match
//!   flag plus confidence in `0.0..=1.0`).
//!
//! The [`scanner`] module ties both together and exposes synchronous and
//! streaming scan entry points.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use chartscan::prelude::*;
//!
//! // A provider is the only thing the caller must supply: auth, transport
//! // and payload shape live behind this trait.
//! struct StaticProvider(HashMap<String, Vec<Bar>>);
//!
//! #[async_trait::async_trait]
//! impl MarketDataProvider for StaticProvider {
//!     async fn fetch_batch(
//!         &self,
//!         _symbols: &[String],
//!         _timeframe: Timeframe,
//!         _lookback: Lookback,
//!         _limit: usize,
//!     ) -> std::result::Result<HashMap<String, Vec<Bar>>, ProviderError> {
//!         Ok(self.0.clone())
//!     }
//! }
//!
//! # async fn run() -> std::result::Result<(), ScanError> {
//! let client = MarketDataClient::new(StaticProvider(HashMap::new()), ClientConfig::default());
//! let scanner = Scanner::new(client, vec!["AAPL".into(), "MSFT".into()]);
//! let summary = scanner
//!     .scan(Pattern::VolumeSpike, Timeframe::D1, Lookback::Mo1)
//!     .await?;
//! for m in &summary.matches {
//!     println!("{} {:.0}%", m.symbol, m.confidence * 100.0);
//! }
//! # Ok(())
//! # }
//! ```

pub mod detectors;
pub mod market;
pub mod params;
pub mod scanner;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Market data layer
        market::{
            CacheStats, ClientConfig, FetchError, FetchFailure, FetchOutcome, Lookback,
            MarketDataCache, MarketDataClient, MarketDataProvider, ProviderError, RequestPacer,
            Timeframe, UsageStats,
        },
        // Parameters
        params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Orchestration
        scanner::{
            list_patterns, PatternInfo, PatternResult, ScanError, ScanEvent, ScanSummary, Scanner,
            DEFAULT_UNIVERSE,
        },
        // Core types
        Bar,
        BuiltinDetector,
        Detection,
        Direction,
        Pattern,
        PatternDetector,
        PatternError,
        Period,
        Ratio,
        Result,
        TimeSeries,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors from constructing series, patterns, or detector configurations.
///
/// Fetch-time and scan-time failures have their own taxonomies; see
/// [`market::FetchError`] and [`scanner::ScanError`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Unknown pattern id: {0}")]
    UnknownPattern(String),

    #[error("Unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("Unknown lookback period: {0}")]
    UnknownLookback(String),

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("Non-increasing timestamp at index {index}")]
    OutOfOrderTimestamp { index: usize },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    /// Get the inner value
    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Bar-count window, must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    /// Get the inner value
    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// SERIES MODEL
// ============================================================

/// One OHLCV bar for a single trading interval.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    /// Interval open time, epoch milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    fn validate(&self, index: usize) -> Result<()> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| p.is_nan() || p.is_infinite()) {
            return Err(PatternError::InvalidBar {
                index,
                reason: "NaN or infinite price",
            });
        }
        if prices.iter().any(|p| *p <= 0.0) {
            return Err(PatternError::InvalidBar {
                index,
                reason: "non-positive price",
            });
        }
        if self.high < self.low {
            return Err(PatternError::InvalidBar {
                index,
                reason: "high < low",
            });
        }
        if self.volume.is_nan() || self.volume.is_infinite() || self.volume < 0.0 {
            return Err(PatternError::InvalidBar {
                index,
                reason: "invalid volume",
            });
        }
        Ok(())
    }
}

/// Immutable, validated sequence of bars ordered by strictly increasing
/// timestamp.
///
/// Constructed once per fetch; detectors never mutate it. Derived sequences
/// (moving averages, rolling volume means) are computed by the detectors as
/// separate read-only vectors.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TimeSeries {
    bars: Vec<Bar>,
}

impl TimeSeries {
    /// Validate and wrap a bar sequence.
    ///
    /// Fails on any invalid bar or on a timestamp that does not strictly
    /// increase (duplicates included).
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate(i)?;
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(PatternError::OutOfOrderTimestamp { index: i });
            }
        }
        Ok(Self { bars })
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// The trailing `n` bars (the whole series if shorter).
    #[inline]
    pub fn tail(&self, n: usize) -> &[Bar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    /// Close prices of the trailing `n` bars.
    pub fn tail_closes(&self, n: usize) -> Vec<f64> {
        self.tail(n).iter().map(|b| b.close).collect()
    }
}

impl<'de> serde::Deserialize<'de> for TimeSeries {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let bars = Vec::<Bar>::deserialize(d)?;
        TimeSeries::new(bars).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// PATTERNS
// ============================================================

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

/// The closed set of chart patterns the scanner knows about.
///
/// Each variant is bound to exactly one detector; an unrecognized id is a
/// checked [`PatternError::UnknownPattern`], never a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    BullFlag,
    BearFlag,
    HeadShoulders,
    DoubleTop,
    DoubleBottom,
    GapUp,
    GapDown,
    VolumeSpike,
    MaCrossoverBullish,
    MaCrossoverBearish,
}

impl Pattern {
    /// All patterns, in canonical listing order.
    pub const ALL: [Pattern; 10] = [
        Pattern::BullFlag,
        Pattern::BearFlag,
        Pattern::HeadShoulders,
        Pattern::DoubleTop,
        Pattern::DoubleBottom,
        Pattern::GapUp,
        Pattern::GapDown,
        Pattern::VolumeSpike,
        Pattern::MaCrossoverBullish,
        Pattern::MaCrossoverBearish,
    ];

    /// Stable wire identifier.
    pub fn id(self) -> &'static str {
        match self {
            Pattern::BullFlag => "bull_flag",
            Pattern::BearFlag => "bear_flag",
            Pattern::HeadShoulders => "head_shoulders",
            Pattern::DoubleTop => "double_top",
            Pattern::DoubleBottom => "double_bottom",
            Pattern::GapUp => "gap_up",
            Pattern::GapDown => "gap_down",
            Pattern::VolumeSpike => "volume_spike",
            Pattern::MaCrossoverBullish => "ma_crossover_bullish",
            Pattern::MaCrossoverBearish => "ma_crossover_bearish",
        }
    }

    /// Human-readable name for display layers.
    pub fn display_name(self) -> &'static str {
        match self {
            Pattern::BullFlag => "Bull Flag",
            Pattern::BearFlag => "Bear Flag",
            Pattern::HeadShoulders => "Head and Shoulders",
            Pattern::DoubleTop => "Double Top",
            Pattern::DoubleBottom => "Double Bottom",
            Pattern::GapUp => "Gap Up",
            Pattern::GapDown => "Gap Down",
            Pattern::VolumeSpike => "Volume Spike",
            Pattern::MaCrossoverBullish => "MA Crossover (Bullish)",
            Pattern::MaCrossoverBearish => "MA Crossover (Bearish)",
        }
    }

    /// Parse a wire identifier. Unknown ids are a checked error.
    pub fn from_id(id: &str) -> Result<Self> {
        Pattern::ALL
            .into_iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| PatternError::UnknownPattern(id.to_string()))
    }

    /// Typical directional bias of the pattern.
    pub fn direction(self) -> Direction {
        match self {
            Pattern::BullFlag
            | Pattern::DoubleBottom
            | Pattern::GapUp
            | Pattern::MaCrossoverBullish => Direction::Bullish,
            Pattern::BearFlag
            | Pattern::HeadShoulders
            | Pattern::DoubleTop
            | Pattern::GapDown
            | Pattern::MaCrossoverBearish => Direction::Bearish,
            Pattern::VolumeSpike => Direction::Neutral,
        }
    }

    /// The detector bound to this pattern, with default parameters.
    pub fn detector(self) -> BuiltinDetector {
        match self {
            Pattern::BullFlag => BuiltinDetector::BullFlag(BullFlagDetector::default()),
            Pattern::BearFlag => BuiltinDetector::BearFlag(BearFlagDetector::default()),
            Pattern::HeadShoulders => {
                BuiltinDetector::HeadShoulders(HeadShouldersDetector::default())
            }
            Pattern::DoubleTop => BuiltinDetector::DoubleTop(DoubleTopDetector::default()),
            Pattern::DoubleBottom => BuiltinDetector::DoubleBottom(DoubleBottomDetector::default()),
            Pattern::GapUp => BuiltinDetector::GapUp(GapUpDetector::default()),
            Pattern::GapDown => BuiltinDetector::GapDown(GapDownDetector::default()),
            Pattern::VolumeSpike => BuiltinDetector::VolumeSpike(VolumeSpikeDetector::default()),
            Pattern::MaCrossoverBullish => {
                BuiltinDetector::MaCrossoverBullish(MaCrossoverBullishDetector::default())
            }
            Pattern::MaCrossoverBearish => {
                BuiltinDetector::MaCrossoverBearish(MaCrossoverBearishDetector::default())
            }
        }
    }

    /// Minimum bar count the bound detector needs for a non-trivial
    /// detection.
    pub fn min_bars(self) -> usize {
        self.detector().min_bars()
    }
}

// ============================================================
// DETECTION RESULT
// ============================================================

/// Result of evaluating one detector against one series.
///
/// `matched` reflects the detector's structural gate only. Confidence-based
/// filtering belongs to the scanner, so callers can always introspect
/// near-misses.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Detection {
    pub matched: bool,
    /// Quality/confidence score 0.0..=1.0
    pub confidence: f64,
}

impl Detection {
    /// The designated "no structure / not enough bars" outcome.
    pub const fn none() -> Self {
        Self {
            matched: false,
            confidence: 0.0,
        }
    }

    pub fn new(matched: bool, confidence: f64) -> Self {
        Self {
            matched,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

// ============================================================
// DETECTOR TRAIT
// ============================================================

/// A stateless chart pattern detector.
///
/// Implementations are pure functions of the series: given fewer bars than
/// [`min_bars`](Self::min_bars) they return [`Detection::none`], never an
/// error.
pub trait PatternDetector: Send + Sync {
    fn pattern(&self) -> Pattern;

    /// Bars required for a non-trivial detection.
    fn min_bars(&self) -> usize;

    fn detect(&self, series: &TimeSeries) -> Detection;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate the BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect(&self, series: &TimeSeries) -> Detection {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, series)),*
                }
            }

            #[inline]
            pub fn pattern(&self) -> Pattern {
                match self {
                    $(Self::$variant(d) => PatternDetector::pattern(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    BullFlag(BullFlagDetector),
    BearFlag(BearFlagDetector),
    HeadShoulders(HeadShouldersDetector),
    DoubleTop(DoubleTopDetector),
    DoubleBottom(DoubleBottomDetector),
    GapUp(GapUpDetector),
    GapDown(GapDownDetector),
    VolumeSpike(VolumeSpikeDetector),
    MaCrossoverBullish(MaCrossoverBullishDetector),
    MaCrossoverBearish(MaCrossoverBearishDetector),
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(i: i64, close: f64) -> Bar {
        Bar {
            timestamp: i * 60_000,
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.5).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(100).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_series_rejects_duplicate_timestamps() {
        let bars = vec![bar(0, 100.0), bar(0, 101.0)];
        assert!(matches!(
            TimeSeries::new(bars),
            Err(PatternError::OutOfOrderTimestamp { index: 1 })
        ));
    }

    #[test]
    fn test_series_rejects_out_of_order_timestamps() {
        let bars = vec![bar(5, 100.0), bar(3, 101.0)];
        assert!(TimeSeries::new(bars).is_err());
    }

    #[test]
    fn test_series_rejects_invalid_bars() {
        let mut b = bar(0, 100.0);
        b.high = 90.0; // high < low
        assert!(TimeSeries::new(vec![b]).is_err());

        let mut b = bar(0, 100.0);
        b.close = -1.0;
        assert!(TimeSeries::new(vec![b]).is_err());

        let mut b = bar(0, 100.0);
        b.volume = f64::NAN;
        assert!(TimeSeries::new(vec![b]).is_err());
    }

    #[test]
    fn test_series_tail() {
        let series = TimeSeries::new((0..10).map(|i| bar(i, 100.0 + i as f64)).collect()).unwrap();
        assert_eq!(series.tail(3).len(), 3);
        assert_eq!(series.tail(100).len(), 10);
        assert_eq!(series.tail_closes(2), vec![108.0, 109.0]);
    }

    #[test]
    fn test_pattern_id_round_trip() {
        for pattern in Pattern::ALL {
            assert_eq!(Pattern::from_id(pattern.id()).unwrap(), pattern);
        }
    }

    #[test]
    fn test_unknown_pattern_is_checked() {
        assert!(matches!(
            Pattern::from_id("cup_and_handle"),
            Err(PatternError::UnknownPattern(_))
        ));
    }

    #[test]
    fn test_detection_confidence_is_clamped() {
        assert_eq!(Detection::new(true, 1.7).confidence, 1.0);
        assert_eq!(Detection::new(false, -0.2).confidence, 0.0);
    }

    #[test]
    fn test_every_pattern_has_a_detector() {
        for pattern in Pattern::ALL {
            let detector = pattern.detector();
            assert_eq!(detector.pattern(), pattern);
            assert!(detector.min_bars() >= 2);
            assert!(detector.validate_config().is_ok());
        }
    }

    #[test]
    fn test_pattern_serde_uses_snake_case() {
        let json = serde_json::to_string(&Pattern::MaCrossoverBullish).unwrap();
        assert_eq!(json, "\"ma_crossover_bullish\"");
        let back: Pattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Pattern::MaCrossoverBullish);
    }

    #[test]
    fn test_timeseries_deserialize_validates() {
        let json = r#"[
            {"timestamp": 1, "open": 10.0, "high": 11.0, "low": 9.0, "close": 10.5, "volume": 100.0},
            {"timestamp": 1, "open": 10.0, "high": 11.0, "low": 9.0, "close": 10.5, "volume": 100.0}
        ]"#;
        assert!(serde_json::from_str::<TimeSeries>(json).is_err());
    }
}
