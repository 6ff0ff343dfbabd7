//! Momentum detectors: volume spike and moving-average crossovers.

use std::collections::HashMap;

use super::helpers::{mean, sma_at};
use crate::{
    params::{get_period, ParamMeta, ParamType, ParameterizedDetector},
    Detection, Pattern, PatternDetector, PatternError, Period, Result, TimeSeries,
};

impl_with_defaults!(
    VolumeSpikeDetector,
    MaCrossoverBullishDetector,
    MaCrossoverBearishDetector,
);

// ============================================================
// VOLUME SPIKE
// ============================================================

/// Latest bar's volume is a multiple of its trailing average.
///
/// Compares the last bar against the mean volume of the `lookback` bars
/// preceding it (the spike bar itself is excluded from the baseline).
/// Confidence grows with the multiple: `0.4 + ratio / 10`, capped at 1.0,
/// so the minimum qualifying spike scores 0.6 and a 6x spike saturates.
#[derive(Debug, Clone)]
pub struct VolumeSpikeDetector {
    /// Baseline window, in bars (spike bar excluded).
    pub lookback: Period,
    /// Minimum volume multiple to qualify as a spike.
    pub min_ratio: f64,
}

impl Default for VolumeSpikeDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(20),
            min_ratio: 2.0,
        }
    }
}

impl PatternDetector for VolumeSpikeDetector {
    fn pattern(&self) -> Pattern {
        Pattern::VolumeSpike
    }

    fn min_bars(&self) -> usize {
        self.lookback.get() + 1
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        if series.len() < self.min_bars() {
            return Detection::none();
        }

        let bars = series.bars();
        let last = bars.len() - 1;
        let baseline: Vec<f64> = bars[last - self.lookback.get()..last]
            .iter()
            .map(|b| b.volume)
            .collect();

        let avg = match mean(&baseline) {
            Some(v) if v > 0.0 => v,
            _ => return Detection::none(),
        };

        let ratio = bars[last].volume / avg;
        if ratio < self.min_ratio {
            return Detection::none();
        }

        Detection::new(true, 0.4 + ratio / 10.0)
    }

    fn validate_config(&self) -> Result<()> {
        if !self.min_ratio.is_finite() || self.min_ratio <= 0.0 {
            return Err(PatternError::InvalidValue("min_ratio must be positive"));
        }
        Ok(())
    }
}

// ============================================================
// MA CROSSOVER (BULLISH)
// ============================================================

/// Fast SMA crossed above the slow SMA on the latest bar.
///
/// The cross must have happened on the last bar: fast at or below slow one
/// bar ago, strictly above now. Confidence starts at 0.6 and grows with the
/// normalized separation between the averages, saturating at a 2% spread.
#[derive(Debug, Clone)]
pub struct MaCrossoverBullishDetector {
    pub fast: Period,
    pub slow: Period,
}

impl Default for MaCrossoverBullishDetector {
    fn default() -> Self {
        Self {
            fast: Period::new_const(20),
            slow: Period::new_const(50),
        }
    }
}

impl PatternDetector for MaCrossoverBullishDetector {
    fn pattern(&self) -> Pattern {
        Pattern::MaCrossoverBullish
    }

    fn min_bars(&self) -> usize {
        self.slow.get() + 1
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        match crossover(series, self.fast, self.slow) {
            Some(Crossover::Bullish { separation }) => {
                Detection::new(true, 0.6 + separation / 0.02)
            }
            _ => Detection::none(),
        }
    }

    fn validate_config(&self) -> Result<()> {
        validate_ma_windows(self.fast, self.slow)
    }
}

// ============================================================
// MA CROSSOVER (BEARISH)
// ============================================================

/// Fast SMA crossed below the slow SMA on the latest bar.
///
/// Mirror image of [`MaCrossoverBullishDetector`].
#[derive(Debug, Clone)]
pub struct MaCrossoverBearishDetector {
    pub fast: Period,
    pub slow: Period,
}

impl Default for MaCrossoverBearishDetector {
    fn default() -> Self {
        Self {
            fast: Period::new_const(20),
            slow: Period::new_const(50),
        }
    }
}

impl PatternDetector for MaCrossoverBearishDetector {
    fn pattern(&self) -> Pattern {
        Pattern::MaCrossoverBearish
    }

    fn min_bars(&self) -> usize {
        self.slow.get() + 1
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        match crossover(series, self.fast, self.slow) {
            Some(Crossover::Bearish { separation }) => {
                Detection::new(true, 0.6 + separation / 0.02)
            }
            _ => Detection::none(),
        }
    }

    fn validate_config(&self) -> Result<()> {
        validate_ma_windows(self.fast, self.slow)
    }
}

enum Crossover {
    /// Fast SMA moved above the slow SMA this bar.
    Bullish { separation: f64 },
    /// Fast SMA moved below the slow SMA this bar.
    Bearish { separation: f64 },
}

/// Classify the latest bar's SMA relationship. `None` when there is no
/// history for the slow SMA one bar back, or no cross happened.
fn crossover(series: &TimeSeries, fast: Period, slow: Period) -> Option<Crossover> {
    if series.len() < slow.get() + 1 {
        return None;
    }

    let closes: Vec<f64> = series.bars().iter().map(|b| b.close).collect();
    let last = closes.len() - 1;

    let fast_now = sma_at(&closes, fast.get(), last)?;
    let slow_now = sma_at(&closes, slow.get(), last)?;
    let fast_prev = sma_at(&closes, fast.get(), last - 1)?;
    let slow_prev = sma_at(&closes, slow.get(), last - 1)?;

    if slow_now <= 0.0 {
        return None;
    }

    if fast_prev <= slow_prev && fast_now > slow_now {
        Some(Crossover::Bullish {
            separation: (fast_now - slow_now) / slow_now,
        })
    } else if fast_prev >= slow_prev && fast_now < slow_now {
        Some(Crossover::Bearish {
            separation: (slow_now - fast_now) / slow_now,
        })
    } else {
        None
    }
}

fn validate_ma_windows(fast: Period, slow: Period) -> Result<()> {
    if fast >= slow {
        return Err(PatternError::InvalidValue("fast window must be < slow window"));
    }
    Ok(())
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

static VOLUME_SPIKE_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "lookback",
        param_type: ParamType::Period,
        default: 20.0,
        range: (5.0, 60.0, 5.0),
        description: "Baseline volume window, in bars",
    },
    ParamMeta {
        name: "min_ratio",
        param_type: ParamType::Ratio,
        default: 2.0,
        range: (1.5, 5.0, 0.5),
        description: "Minimum volume multiple over the baseline",
    },
];

static MA_CROSSOVER_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "fast",
        param_type: ParamType::Period,
        default: 20.0,
        range: (5.0, 50.0, 5.0),
        description: "Fast SMA window",
    },
    ParamMeta {
        name: "slow",
        param_type: ParamType::Period,
        default: 50.0,
        range: (20.0, 200.0, 10.0),
        description: "Slow SMA window",
    },
];

impl ParameterizedDetector for VolumeSpikeDetector {
    fn param_meta() -> &'static [ParamMeta] {
        VOLUME_SPIKE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            lookback: get_period(params, "lookback", 20)?,
            min_ratio: params.get("min_ratio").copied().unwrap_or(2.0),
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id_str() -> &'static str {
        "volume_spike"
    }
}

impl ParameterizedDetector for MaCrossoverBullishDetector {
    fn param_meta() -> &'static [ParamMeta] {
        MA_CROSSOVER_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            fast: get_period(params, "fast", 20)?,
            slow: get_period(params, "slow", 50)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id_str() -> &'static str {
        "ma_crossover_bullish"
    }
}

impl ParameterizedDetector for MaCrossoverBearishDetector {
    fn param_meta() -> &'static [ParamMeta] {
        MA_CROSSOVER_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            fast: get_period(params, "fast", 20)?,
            slow: get_period(params, "slow", 50)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id_str() -> &'static str {
        "ma_crossover_bearish"
    }
}
