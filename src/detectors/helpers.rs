//! Common helper functions shared across detector modules.
//!
//! Rolling statistics plus a local-extremum finder with a minimum-separation
//! constraint (keep the higher of two candidates closer than `distance`).

// ============================================================
// ROLLING STATISTICS
// ============================================================

/// Arithmetic mean. Returns `None` for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Simple moving average of `values[at + 1 - window ..= at]`.
///
/// Returns `None` when fewer than `window` values precede (and include)
/// position `at`.
#[inline]
pub fn sma_at(values: &[f64], window: usize, at: usize) -> Option<f64> {
    if window == 0 || at >= values.len() || at + 1 < window {
        return None;
    }
    mean(&values[at + 1 - window..=at])
}

/// Fractional change from `from` to `to`. Returns `None` when `from` is not
/// a usable base (zero, negative, or non-finite).
#[inline]
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    if !from.is_finite() || !to.is_finite() || from <= 0.0 {
        return None;
    }
    Some((to - from) / from)
}

// ============================================================
// LOCAL EXTREMA
// ============================================================

/// Indices of strict local maxima of `values`, at least `distance` apart.
///
/// A candidate needs both neighbors strictly below it, so endpoints and
/// plateaus never qualify. When two candidates violate the separation the
/// higher one wins.
pub fn local_peaks(values: &[f64], distance: usize) -> Vec<usize> {
    select_extrema(values, distance, |a, b| a > b)
}

/// Indices of strict local minima of `values`, at least `distance` apart.
pub fn local_troughs(values: &[f64], distance: usize) -> Vec<usize> {
    select_extrema(values, distance, |a, b| a < b)
}

fn select_extrema(values: &[f64], distance: usize, better: fn(f64, f64) -> bool) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }

    let mut candidates: Vec<usize> = (1..values.len() - 1)
        .filter(|&i| better(values[i], values[i - 1]) && better(values[i], values[i + 1]))
        .collect();

    // Resolve separation conflicts in favor of the more extreme candidate.
    candidates.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if better(0.0, 1.0) {
        // Minima: most extreme means smallest, so flip the height ordering.
        candidates.reverse();
    }

    let mut kept: Vec<usize> = Vec::new();
    for idx in candidates {
        if kept
            .iter()
            .all(|&k| idx.abs_diff(k) >= distance.max(1))
        {
            kept.push(idx);
        }
    }

    kept.sort_unstable();
    kept
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0, 6.0]), Some(4.0));
    }

    #[test]
    fn test_sma_at() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma_at(&values, 3, 2), Some(2.0));
        assert_eq!(sma_at(&values, 3, 4), Some(4.0));
        assert_eq!(sma_at(&values, 3, 1), None); // not enough history
        assert_eq!(sma_at(&values, 0, 4), None);
        assert_eq!(sma_at(&values, 3, 10), None);
    }

    #[test]
    fn test_pct_change() {
        assert_eq!(pct_change(100.0, 110.0), Some(0.1));
        assert_eq!(pct_change(100.0, 90.0), Some(-0.1));
        assert_eq!(pct_change(0.0, 10.0), None);
        assert_eq!(pct_change(f64::NAN, 10.0), None);
    }

    #[test]
    fn test_local_peaks_basic() {
        //                 0    1     2    3     4    5
        let values = [1.0, 3.0, 1.0, 5.0, 1.0, 2.0];
        assert_eq!(local_peaks(&values, 1), vec![1, 3]);
    }

    #[test]
    fn test_local_peaks_separation_keeps_higher() {
        // Peaks at 1 (h=3) and 3 (h=5), closer than distance 4: keep index 3.
        let values = [1.0, 3.0, 1.0, 5.0, 1.0, 2.0];
        assert_eq!(local_peaks(&values, 4), vec![3]);
    }

    #[test]
    fn test_local_peaks_ignores_endpoints_and_plateaus() {
        assert!(local_peaks(&[9.0, 1.0, 2.0], 1).is_empty());
        assert!(local_peaks(&[1.0, 5.0, 5.0, 1.0], 1).is_empty());
        assert!(local_peaks(&[1.0, 2.0], 1).is_empty());
    }

    #[test]
    fn test_local_troughs() {
        let values = [5.0, 1.0, 5.0, 2.0, 5.0];
        assert_eq!(local_troughs(&values, 1), vec![1, 3]);
        // Separation 3: keep the deeper trough (index 1).
        assert_eq!(local_troughs(&values, 3), vec![1]);
    }
}
