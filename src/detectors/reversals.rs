//! Reversal detectors: head and shoulders, double top, double bottom.
//!
//! All three work on local extrema of the closing price found with a
//! minimum-separation scan, so adjacent noisy bars never count as distinct
//! peaks.

use std::collections::HashMap;

use super::helpers::{local_peaks, local_troughs, mean};
use crate::{
    params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
    Detection, Pattern, PatternDetector, PatternError, Period, Ratio, Result, TimeSeries,
};

impl_with_defaults!(
    HeadShouldersDetector,
    DoubleTopDetector,
    DoubleBottomDetector,
);

// ============================================================
// HEAD AND SHOULDERS
// ============================================================

/// Three peaks where the middle one (the head) tops both shoulders, with
/// the shoulders at comparable heights.
///
/// The neckline is the mean of the two troughs between the peaks; the
/// pattern counts as matched only once the latest close has broken below
/// it. Confidence weighs shoulder symmetry (40%), head prominence (30%)
/// and neckline state (30%; an unbroken neckline contributes half weight).
#[derive(Debug, Clone)]
pub struct HeadShouldersDetector {
    /// Analysis window over the trailing closes.
    pub window: Period,
    /// Minimum bar separation between counted peaks.
    pub peak_separation: Period,
    /// Maximum fractional height difference between the shoulders.
    pub shoulder_tolerance: Ratio,
}

impl Default for HeadShouldersDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(40),
            peak_separation: Period::new_const(5),
            shoulder_tolerance: Ratio::new_const(0.10),
        }
    }
}

impl PatternDetector for HeadShouldersDetector {
    fn pattern(&self) -> Pattern {
        Pattern::HeadShoulders
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        if series.len() < self.min_bars() {
            return Detection::none();
        }

        let closes = series.tail_closes(self.window.get());
        let peaks = local_peaks(&closes, self.peak_separation.get());
        if peaks.len() < 3 {
            return Detection::none();
        }

        let (left, head, right) = (
            peaks[peaks.len() - 3],
            peaks[peaks.len() - 2],
            peaks[peaks.len() - 1],
        );
        let (left_h, head_h, right_h) = (closes[left], closes[head], closes[right]);

        if head_h <= left_h || head_h <= right_h {
            return Detection::none();
        }

        let shoulder_diff = (left_h - right_h).abs() / left_h;
        if shoulder_diff > self.shoulder_tolerance.get() {
            return Detection::none();
        }

        // Neckline: mean of the two troughs between consecutive peaks.
        let trough_a = closes[left..head].iter().cloned().fold(f64::MAX, f64::min);
        let trough_b = closes[head..right].iter().cloned().fold(f64::MAX, f64::min);
        let neckline = match mean(&[trough_a, trough_b]) {
            Some(n) => n,
            None => return Detection::none(),
        };

        let current = closes[closes.len() - 1];
        let below_neckline = current < neckline;

        let shoulder_mean = (left_h + right_h) / 2.0;
        let head_prominence = (head_h - shoulder_mean) / head_h;

        let confidence = 0.4 * (1.0 - shoulder_diff / self.shoulder_tolerance.get())
            + 0.3 * (head_prominence / 0.05).min(1.0)
            + 0.3 * if below_neckline { 1.0 } else { 0.5 };

        Detection::new(below_neckline, confidence)
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_window(self.window, self.peak_separation)
    }
}

// ============================================================
// DOUBLE TOP
// ============================================================

/// Two peaks at comparable levels separated by a trough of sufficient
/// depth, with price declining away from the second peak.
#[derive(Debug, Clone)]
pub struct DoubleTopDetector {
    pub window: Period,
    /// Minimum bar separation between counted peaks.
    pub separation: Period,
    /// Maximum fractional level difference between the two peaks.
    pub level_tolerance: Ratio,
    /// Minimum fractional depth of the intermediate trough.
    pub min_depth: Ratio,
}

impl Default for DoubleTopDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(30),
            separation: Period::new_const(5),
            level_tolerance: Ratio::new_const(0.03),
            min_depth: Ratio::new_const(0.02),
        }
    }
}

impl PatternDetector for DoubleTopDetector {
    fn pattern(&self) -> Pattern {
        Pattern::DoubleTop
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        if series.len() < self.min_bars() {
            return Detection::none();
        }

        let closes = series.tail_closes(self.window.get());
        let peaks = local_peaks(&closes, self.separation.get());
        if peaks.len() < 2 {
            return Detection::none();
        }

        let (first, second) = (peaks[peaks.len() - 2], peaks[peaks.len() - 1]);
        let (first_h, second_h) = (closes[first], closes[second]);

        let level_diff = (first_h - second_h).abs() / first_h;
        if level_diff > self.level_tolerance.get() {
            return Detection::none();
        }

        let higher = first_h.max(second_h);
        let trough = closes[first..second].iter().cloned().fold(f64::MAX, f64::min);
        let depth = (higher - trough) / higher;
        if depth < self.min_depth.get() {
            return Detection::none();
        }

        let current = closes[closes.len() - 1];
        let decline = (second_h - current) / second_h;

        let confidence = 0.4 * (1.0 - level_diff / self.level_tolerance.get())
            + 0.3 * (depth / 0.05).min(1.0)
            + 0.3 * (decline / 0.05).min(1.0);

        Detection::new(decline > 0.0, confidence)
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_window(self.window, self.separation)
    }
}

// ============================================================
// DOUBLE BOTTOM
// ============================================================

/// Two troughs at comparable levels separated by a bounce of sufficient
/// height, with price rising away from the second trough.
#[derive(Debug, Clone)]
pub struct DoubleBottomDetector {
    pub window: Period,
    pub separation: Period,
    pub level_tolerance: Ratio,
    /// Minimum fractional height of the intermediate bounce.
    pub min_height: Ratio,
}

impl Default for DoubleBottomDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(30),
            separation: Period::new_const(5),
            level_tolerance: Ratio::new_const(0.03),
            min_height: Ratio::new_const(0.02),
        }
    }
}

impl PatternDetector for DoubleBottomDetector {
    fn pattern(&self) -> Pattern {
        Pattern::DoubleBottom
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn detect(&self, series: &TimeSeries) -> Detection {
        if series.len() < self.min_bars() {
            return Detection::none();
        }

        let closes = series.tail_closes(self.window.get());
        let troughs = local_troughs(&closes, self.separation.get());
        if troughs.len() < 2 {
            return Detection::none();
        }

        let (first, second) = (troughs[troughs.len() - 2], troughs[troughs.len() - 1]);
        let (first_l, second_l) = (closes[first], closes[second]);

        let level_diff = (first_l - second_l).abs() / first_l;
        if level_diff > self.level_tolerance.get() {
            return Detection::none();
        }

        let lower = first_l.min(second_l);
        let bounce = closes[first..second].iter().cloned().fold(f64::MIN, f64::max);
        let height = (bounce - lower) / lower;
        if height < self.min_height.get() {
            return Detection::none();
        }

        let current = closes[closes.len() - 1];
        let rise = (current - second_l) / second_l;

        let confidence = 0.4 * (1.0 - level_diff / self.level_tolerance.get())
            + 0.3 * (height / 0.05).min(1.0)
            + 0.3 * (rise / 0.05).min(1.0);

        Detection::new(rise > 0.0, confidence)
    }

    fn validate_config(&self) -> Result<()> {
        validate_extrema_window(self.window, self.separation)
    }
}

fn validate_extrema_window(window: Period, separation: Period) -> Result<()> {
    if window.get() < 3 * separation.get() {
        return Err(PatternError::InvalidValue(
            "window too small for the extremum separation",
        ));
    }
    Ok(())
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

static HEAD_SHOULDERS_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "window",
        param_type: ParamType::Period,
        default: 40.0,
        range: (30.0, 90.0, 10.0),
        description: "Analysis window, in bars",
    },
    ParamMeta {
        name: "peak_separation",
        param_type: ParamType::Period,
        default: 5.0,
        range: (3.0, 10.0, 1.0),
        description: "Minimum bar separation between counted peaks",
    },
    ParamMeta {
        name: "shoulder_tolerance",
        param_type: ParamType::Ratio,
        default: 0.10,
        range: (0.05, 0.2, 0.05),
        description: "Maximum fractional shoulder height difference",
    },
];

static DOUBLE_TOP_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "window",
        param_type: ParamType::Period,
        default: 30.0,
        range: (20.0, 60.0, 5.0),
        description: "Analysis window, in bars",
    },
    ParamMeta {
        name: "separation",
        param_type: ParamType::Period,
        default: 5.0,
        range: (3.0, 10.0, 1.0),
        description: "Minimum bar separation between counted peaks",
    },
    ParamMeta {
        name: "level_tolerance",
        param_type: ParamType::Ratio,
        default: 0.03,
        range: (0.01, 0.05, 0.01),
        description: "Maximum fractional level difference between peaks",
    },
    ParamMeta {
        name: "min_depth",
        param_type: ParamType::Ratio,
        default: 0.02,
        range: (0.01, 0.05, 0.01),
        description: "Minimum fractional depth of the intermediate trough",
    },
];

static DOUBLE_BOTTOM_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "window",
        param_type: ParamType::Period,
        default: 30.0,
        range: (20.0, 60.0, 5.0),
        description: "Analysis window, in bars",
    },
    ParamMeta {
        name: "separation",
        param_type: ParamType::Period,
        default: 5.0,
        range: (3.0, 10.0, 1.0),
        description: "Minimum bar separation between counted troughs",
    },
    ParamMeta {
        name: "level_tolerance",
        param_type: ParamType::Ratio,
        default: 0.03,
        range: (0.01, 0.05, 0.01),
        description: "Maximum fractional level difference between troughs",
    },
    ParamMeta {
        name: "min_height",
        param_type: ParamType::Ratio,
        default: 0.02,
        range: (0.01, 0.05, 0.01),
        description: "Minimum fractional height of the intermediate bounce",
    },
];

impl ParameterizedDetector for HeadShouldersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HEAD_SHOULDERS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            window: get_period(params, "window", 40)?,
            peak_separation: get_period(params, "peak_separation", 5)?,
            shoulder_tolerance: get_ratio(params, "shoulder_tolerance", 0.10)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id_str() -> &'static str {
        "head_shoulders"
    }
}

impl ParameterizedDetector for DoubleTopDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_TOP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            window: get_period(params, "window", 30)?,
            separation: get_period(params, "separation", 5)?,
            level_tolerance: get_ratio(params, "level_tolerance", 0.03)?,
            min_depth: get_ratio(params, "min_depth", 0.02)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id_str() -> &'static str {
        "double_top"
    }
}

impl ParameterizedDetector for DoubleBottomDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_BOTTOM_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            window: get_period(params, "window", 30)?,
            separation: get_period(params, "separation", 5)?,
            level_tolerance: get_ratio(params, "level_tolerance", 0.03)?,
            min_height: get_ratio(params, "min_height", 0.02)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn pattern_id_str() -> &'static str {
        "double_bottom"
    }
}
