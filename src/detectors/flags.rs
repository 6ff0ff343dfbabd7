//! Flag detectors: a sharp directional pole followed by a tight
//! counter-trend consolidation.

use std::collections::HashMap;

use super::helpers::pct_change;
use crate::{
    params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
    Detection, Pattern, PatternDetector, PatternError, Period, Ratio, Result, TimeSeries,
};

impl_with_defaults!(BullFlagDetector, BearFlagDetector);

/// Shared flag geometry over the trailing `window` closes.
///
/// The window splits into halves: the first must contain the pole (a move of
/// at least `min_pole_move` in the flag's direction), the second the
/// consolidation, whose net drift must stay inside the configured band.
/// Confidence weighs pole strength (30%), consolidation tightness (40%) and
/// where the last close sits in the consolidation range (30%).
struct FlagShape {
    pole_move: f64,
    drift: f64,
    /// 0.0 = worst edge of the consolidation range, 1.0 = best edge
    /// (top for a bull flag, bottom for a bear flag).
    position: f64,
}

fn flag_shape(
    series: &TimeSeries,
    window: Period,
    min_pole_move: Ratio,
    bullish: bool,
) -> Option<FlagShape> {
    if series.len() < window.get() || window.get() < 4 {
        return None;
    }

    let closes = series.tail_closes(window.get());
    let half = closes.len() / 2;
    let (pole, flag) = closes.split_at(half);

    let pole_change = pct_change(pole[0], pole[pole.len() - 1])?;
    let pole_move = if bullish { pole_change } else { -pole_change };
    if pole_move < min_pole_move.get() {
        return None;
    }

    let drift = pct_change(flag[0], flag[flag.len() - 1])?;

    let high = flag.iter().cloned().fold(f64::MIN, f64::max);
    let low = flag.iter().cloned().fold(f64::MAX, f64::min);
    let range = high - low;
    if range <= 0.0 {
        return None;
    }

    let last = closes[closes.len() - 1];
    let position = if bullish {
        (last - low) / range
    } else {
        (high - last) / range
    };

    Some(FlagShape {
        pole_move,
        drift,
        position,
    })
}

fn flag_confidence(shape: &FlagShape) -> f64 {
    0.3 * (shape.pole_move / 0.15).min(1.0)
        + 0.4 * (1.0 - shape.drift.abs() / 0.05)
        + 0.3 * shape.position
}

// ============================================================
// BULL FLAG
// ============================================================

/// Strong up-move then a flat-to-slightly-down consolidation, with the
/// latest close in the upper half of the consolidation range.
#[derive(Debug, Clone)]
pub struct BullFlagDetector {
    /// Total pattern window; the pole is the first half.
    pub window: Period,
    /// Minimum fractional pole move.
    pub min_pole_move: Ratio,
    /// Maximum fractional pullback over the consolidation.
    pub max_pullback: Ratio,
    /// Maximum fractional rise over the consolidation.
    pub max_rise: Ratio,
}

impl Default for BullFlagDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(30),
            min_pole_move: Ratio::new_const(0.05),
            max_pullback: Ratio::new_const(0.05),
            max_rise: Ratio::new_const(0.02),
        }
    }
}

impl PatternDetector for BullFlagDetector {
    fn pattern(&self) -> Pattern {
        Pattern::BullFlag
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        let shape = match flag_shape(series, self.window, self.min_pole_move, true) {
            Some(s) => s,
            None => return Detection::none(),
        };

        // Consolidation must drift within [-max_pullback, +max_rise].
        if shape.drift < -self.max_pullback.get() || shape.drift > self.max_rise.get() {
            return Detection::none();
        }

        // A flag resolving upward should hold the upper half of its range.
        Detection::new(shape.position >= 0.5, flag_confidence(&shape))
    }

    fn validate_config(&self) -> Result<()> {
        validate_flag_window(self.window)
    }
}

// ============================================================
// BEAR FLAG
// ============================================================

/// Strong down-move then a flat-to-slightly-up consolidation, with the
/// latest close in the lower half of the consolidation range.
#[derive(Debug, Clone)]
pub struct BearFlagDetector {
    pub window: Period,
    pub min_pole_move: Ratio,
    /// Maximum fractional dip over the consolidation.
    pub max_dip: Ratio,
    /// Maximum fractional bounce over the consolidation.
    pub max_bounce: Ratio,
}

impl Default for BearFlagDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(30),
            min_pole_move: Ratio::new_const(0.05),
            max_dip: Ratio::new_const(0.02),
            max_bounce: Ratio::new_const(0.05),
        }
    }
}

impl PatternDetector for BearFlagDetector {
    fn pattern(&self) -> Pattern {
        Pattern::BearFlag
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        let shape = match flag_shape(series, self.window, self.min_pole_move, false) {
            Some(s) => s,
            None => return Detection::none(),
        };

        // Consolidation must drift within [-max_dip, +max_bounce].
        if shape.drift < -self.max_dip.get() || shape.drift > self.max_bounce.get() {
            return Detection::none();
        }

        Detection::new(shape.position >= 0.5, flag_confidence(&shape))
    }

    fn validate_config(&self) -> Result<()> {
        validate_flag_window(self.window)
    }
}

fn validate_flag_window(window: Period) -> Result<()> {
    // Need at least two bars in each half for a pole and a drift.
    if window.get() < 4 {
        return Err(PatternError::InvalidValue("flag window must be >= 4 bars"));
    }
    Ok(())
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

static BULL_FLAG_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "window",
        param_type: ParamType::Period,
        default: 30.0,
        range: (10.0, 60.0, 5.0),
        description: "Total pattern window, in bars",
    },
    ParamMeta {
        name: "min_pole_move",
        param_type: ParamType::Ratio,
        default: 0.05,
        range: (0.02, 0.15, 0.01),
        description: "Minimum fractional pole move",
    },
    ParamMeta {
        name: "max_pullback",
        param_type: ParamType::Ratio,
        default: 0.05,
        range: (0.02, 0.1, 0.01),
        description: "Maximum consolidation pullback",
    },
    ParamMeta {
        name: "max_rise",
        param_type: ParamType::Ratio,
        default: 0.02,
        range: (0.0, 0.05, 0.01),
        description: "Maximum consolidation rise",
    },
];

static BEAR_FLAG_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "window",
        param_type: ParamType::Period,
        default: 30.0,
        range: (10.0, 60.0, 5.0),
        description: "Total pattern window, in bars",
    },
    ParamMeta {
        name: "min_pole_move",
        param_type: ParamType::Ratio,
        default: 0.05,
        range: (0.02, 0.15, 0.01),
        description: "Minimum fractional pole move",
    },
    ParamMeta {
        name: "max_dip",
        param_type: ParamType::Ratio,
        default: 0.02,
        range: (0.0, 0.05, 0.01),
        description: "Maximum consolidation dip",
    },
    ParamMeta {
        name: "max_bounce",
        param_type: ParamType::Ratio,
        default: 0.05,
        range: (0.02, 0.1, 0.01),
        description: "Maximum consolidation bounce",
    },
];

impl ParameterizedDetector for BullFlagDetector {
    fn param_meta() -> &'static [ParamMeta] {
        BULL_FLAG_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            window: get_period(params, "window", 30)?,
            min_pole_move: get_ratio(params, "min_pole_move", 0.05)?,
            max_pullback: get_ratio(params, "max_pullback", 0.05)?,
            max_rise: get_ratio(params, "max_rise", 0.02)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id_str() -> &'static str {
        "bull_flag"
    }
}

impl ParameterizedDetector for BearFlagDetector {
    fn param_meta() -> &'static [ParamMeta] {
        BEAR_FLAG_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            window: get_period(params, "window", 30)?,
            min_pole_move: get_ratio(params, "min_pole_move", 0.05)?,
            max_dip: get_ratio(params, "max_dip", 0.02)?,
            max_bounce: get_ratio(params, "max_bounce", 0.05)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id_str() -> &'static str {
        "bear_flag"
    }
}
