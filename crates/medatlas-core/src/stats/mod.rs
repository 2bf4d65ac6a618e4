//! Statistical primitives for anomaly gating
//!
//! - Percentiles with linear interpolation (IQR thresholds)
//! - Isolation Forest (stage 1 of the two-stage anomaly detector)
//! - Mahalanobis distance with chi-square gating (stage 2)

mod isolation_forest;
mod mahalanobis;

pub use isolation_forest::IsolationForest;
pub use mahalanobis::{MahalanobisDetector, CHI2_975_DF4, CHI2_975_DF6};

/// Percentile of a sample with linear interpolation, `p` in [0, 100].
/// Returns 0.0 for an empty sample.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolation() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&values, 0.0) - 1.0).abs() < 1e-9);
        assert!((percentile(&values, 100.0) - 4.0).abs() < 1e-9);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-9);
        assert!((percentile(&values, 25.0) - 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_degenerate() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[7.0], 99.0), 7.0);
    }
}
