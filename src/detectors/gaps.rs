//! Gap detectors: the latest bar opened clear of the previous bar's range.

use std::collections::HashMap;

use crate::{
    params::{get_ratio, ParamMeta, ParamType, ParameterizedDetector},
    Detection, Pattern, PatternDetector, Ratio, Result, TimeSeries,
};

impl_with_defaults!(GapUpDetector, GapDownDetector);

// ============================================================
// GAP UP
// ============================================================

/// Today's low sits entirely above yesterday's high.
///
/// The full-range criterion means an unfilled gap: even today's worst print
/// never touched yesterday's range. Gap size is measured from yesterday's
/// high to today's low; confidence is `0.5 + gap / 0.10` capped at 1.0, so
/// the minimum 2% gap scores 0.7 and a 5% gap saturates.
#[derive(Debug, Clone)]
pub struct GapUpDetector {
    /// Minimum fractional gap to qualify.
    pub min_gap: Ratio,
}

impl Default for GapUpDetector {
    fn default() -> Self {
        Self {
            min_gap: Ratio::new_const(0.02),
        }
    }
}

impl PatternDetector for GapUpDetector {
    fn pattern(&self) -> Pattern {
        Pattern::GapUp
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        let bars = series.bars();
        let [prev, today] = match bars {
            [.., prev, today] => [prev, today],
            _ => return Detection::none(),
        };

        if today.low <= prev.high {
            return Detection::none();
        }

        let gap = (today.low - prev.high) / prev.high;
        if gap < self.min_gap.get() {
            return Detection::none();
        }

        Detection::new(true, 0.5 + gap / 0.10)
    }
}

// ============================================================
// GAP DOWN
// ============================================================

/// Today's high sits entirely below yesterday's low.
///
/// Mirror image of [`GapUpDetector`]; gap size is measured from yesterday's
/// low down to today's high.
#[derive(Debug, Clone)]
pub struct GapDownDetector {
    /// Minimum fractional gap to qualify.
    pub min_gap: Ratio,
}

impl Default for GapDownDetector {
    fn default() -> Self {
        Self {
            min_gap: Ratio::new_const(0.02),
        }
    }
}

impl PatternDetector for GapDownDetector {
    fn pattern(&self) -> Pattern {
        Pattern::GapDown
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        let bars = series.bars();
        let [prev, today] = match bars {
            [.., prev, today] => [prev, today],
            _ => return Detection::none(),
        };

        if today.high >= prev.low {
            return Detection::none();
        }

        let gap = (prev.low - today.high) / prev.low;
        if gap < self.min_gap.get() {
            return Detection::none();
        }

        Detection::new(true, 0.5 + gap / 0.10)
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

static GAP_PARAMS: &[ParamMeta] = &[ParamMeta {
    name: "min_gap",
    param_type: ParamType::Ratio,
    default: 0.02,
    range: (0.005, 0.1, 0.005),
    description: "Minimum fractional gap between consecutive bar ranges",
}];

impl ParameterizedDetector for GapUpDetector {
    fn param_meta() -> &'static [ParamMeta] {
        GAP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_gap: get_ratio(params, "min_gap", 0.02)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "gap_up"
    }
}

impl ParameterizedDetector for GapDownDetector {
    fn param_meta() -> &'static [ParamMeta] {
        GAP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_gap: get_ratio(params, "min_gap", 0.02)?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "gap_down"
    }
}
