//! Chart pattern detectors
//!
//! Ten stateless detectors over daily-or-coarser OHLCV series. Each one maps
//! a [`TimeSeries`](crate::TimeSeries) to a [`Detection`](crate::Detection):
//! a structural match flag plus a confidence score in `0.0..=1.0`.
//!
//! # Pattern Categories
//!
//! - **Momentum (3)**: Volume Spike, MA Crossover (bullish/bearish)
//! - **Gaps (2)**: Gap Up, Gap Down
//! - **Flags (2)**: Bull Flag, Bear Flag
//! - **Reversals (3)**: Head and Shoulders, Double Top, Double Bottom
//!
//! All thresholds are configurable per detector; the defaults below are the
//! ones the scanner ships with.

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod flags;
pub mod gaps;
pub mod momentum;
pub mod reversals;

// Re-export all detectors for convenience
pub use flags::*;
pub use gaps::*;
pub use helpers::*;
pub use momentum::*;
pub use reversals::*;
