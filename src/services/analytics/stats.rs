//! Small numeric helpers shared by the analytics submodules. Deliberately
//! plain — the window sizes here (hours to weeks of one symbol's trades)
//! never justify pulling in a statistics crate.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n-1 denominator), matching the reference
/// implementation's `statistics.stdev()` at every call site that feeds a
/// volatility factor or threshold off a small trailing window.
pub fn stdev(xs: &[f64], m: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    variance.sqrt()
}

/// Nearest-rank percentile over an already-sorted ascending slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_of_ten_values_matches_nearest_rank() {
        let values: Vec<f64> = (1..=10).map(|n| n as f64).collect();
        assert_eq!(percentile(&values, 0.95), 10.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
    }

    #[test]
    fn stdev_of_constant_series_is_zero() {
        assert_eq!(stdev(&[5.0, 5.0, 5.0], 5.0), 0.0);
    }

    #[test]
    fn stdev_uses_sample_not_population_variance() {
        // statistics.stdev([2.0, 4.0]) == sqrt(2) ~= 1.41421356
        let values = [2.0, 4.0];
        let m = mean(&values);
        assert!((stdev(&values, m) - std::f64::consts::SQRT_2).abs() < 1e-9);
    }
}
