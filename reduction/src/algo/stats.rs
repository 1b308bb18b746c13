//! Robust statistics over slices of `f64`.
//!
//! Medians use partial selection (`select_nth_unstable_by`) rather than a full
//! sort. For even lengths the median is the element at sorted index `n/2`
//! (the upper of the two middle values), which keeps it an actually observed
//! sample.

use std::cmp::Ordering;

/// Return the `k`-th smallest value (0-based), reordering `values` in place.
///
/// # Panics
/// Panics if `k >= values.len()`.
pub fn kth_smallest(values: &mut [f64], k: usize) -> f64 {
    let (_, kth, _) = values.select_nth_unstable_by(k, f64::total_cmp);
    *kth
}

/// Index of the median element for a slice of length `n > 0`.
#[inline]
pub fn median_index(n: usize) -> usize {
    if n % 2 == 1 {
        (n - 1) / 2
    } else {
        n / 2
    }
}

/// Median of `values`, reordering the slice. `NaN` for an empty slice.
pub fn median_in_place(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let k = median_index(values.len());
    kth_smallest(values, k)
}

/// Median of `values` without touching the input. `NaN` for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    let mut scratch = values.to_vec();
    median_in_place(&mut scratch)
}

/// Median, or `None` for an empty slice.
pub fn try_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(median(values))
    }
}

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
///
/// Computed from running sums and clamped at zero before the square root to
/// absorb rounding; zero for fewer than two samples.
pub fn rms(values: &[f64]) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }
    let (sum, sum_sq) = values
        .iter()
        .fold((0.0, 0.0), |(s, sq), &v| (s + v, sq + v * v));
    let var = (sum_sq - sum * sum / n as f64) / (n as f64 - 1.0);
    var.max(0.0).sqrt()
}

/// Mean absolute deviation around `center`.
pub fn mean_abs_deviation(values: &[f64], center: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| (v - center).abs()).sum::<f64>() / values.len() as f64
}

/// Ascending sorted copy, NaN last.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Ordering helper for sorting by an `f64` key with NaN last.
pub fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.total_cmp(b),
    }
}

/// Mean of the values left after sorting and dropping `low` lowest and
/// `high` highest. `None` when nothing remains.
pub fn rejected_mean(values: &mut [f64], low: usize, high: usize) -> Option<f64> {
    let n = values.len();
    if low + high >= n {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let kept = &values[low..n - high];
    Some(kept.iter().sum::<f64>() / kept.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        // even length picks sorted index n/2
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 3.0);
        assert_eq!(median(&[7.0]), 7.0);
        assert!(median(&[]).is_nan());
        assert_eq!(try_median(&[]), None);
    }

    #[test]
    fn test_median_matches_sort_reference() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 1..=1000usize {
            let values: Vec<f64> = (0..n).map(|_| rng.random_range(-1e3..1e3)).collect();
            let sorted = sorted_copy(&values);
            let expected = if n % 2 == 1 {
                sorted[(n - 1) / 2]
            } else {
                sorted[n / 2]
            };
            assert_eq!(median(&values), expected, "n = {n}");
        }
    }

    #[test]
    fn test_kth_smallest() {
        let mut values = vec![5.0, -1.0, 3.0, 9.0, 0.0];
        assert_eq!(kth_smallest(&mut values, 0), -1.0);
        assert_eq!(kth_smallest(&mut values, 4), 9.0);
        assert_eq!(kth_smallest(&mut values, 2), 3.0);
    }

    #[test]
    fn test_rms_and_mean() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values), 5.0);
        // sample stdev: sqrt(32 / 7)
        assert_relative_eq!(rms(&values), (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert_eq!(rms(&[1.0]), 0.0);
        assert_eq!(rms(&[]), 0.0);
        // constant input never goes negative under the root
        let flat = rms(&[0.1; 10]);
        assert!(flat.is_finite() && flat < 1e-6);
    }

    #[test]
    fn test_rejected_mean() {
        let mut values = vec![100.0, 1.0, 2.0, 3.0, -50.0];
        assert_relative_eq!(rejected_mean(&mut values, 1, 1).unwrap(), 2.0);
        let mut values = vec![1.0, 2.0];
        assert_eq!(rejected_mean(&mut values, 1, 1), None);
    }

    #[test]
    fn test_mean_abs_deviation() {
        assert_relative_eq!(mean_abs_deviation(&[1.0, 3.0, 5.0], 3.0), 4.0 / 3.0);
    }
}
