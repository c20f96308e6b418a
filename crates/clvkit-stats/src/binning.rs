//! Equal-frequency (quantile) binning
//!
//! This module assigns each value of a population to one of `k` ordered bins
//! so that every bin holds (almost) the same number of members. It is the
//! building block for CLTV segments and RFM scores.
//!
//! # Algorithm
//!
//! 1. Rank values ascending; equal values keep their input order
//!    (the "first" ranking method, so the assignment is deterministic)
//! 2. The value at rank `i` of `n` goes to bin `floor(i * k / n)`
//!
//! Every bin therefore receives `floor(n / k)` or `ceil(n / k)` members, and
//! bin indices are monotone in the value ordering. When the population has
//! fewer distinct values than bins, equal values may straddle a bin boundary;
//! when it has fewer members than bins, some bins stay empty.
//!
//! # Examples
//!
//! ```
//! use clvkit_stats::binning::equal_frequency_bins;
//!
//! let values = [40.0, 10.0, 30.0, 20.0];
//! let bins = equal_frequency_bins(&values, 2);
//! assert_eq!(bins, vec![1, 0, 1, 0]);
//! ```

/// Summary of a binning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinningSummary {
    /// Number of members per bin, indexed by bin
    pub counts: Vec<usize>,
    /// Number of distinct values in the population
    pub distinct_values: usize,
}

impl BinningSummary {
    /// Whether the population could not fill `k` bins with distinct values.
    ///
    /// In that case some bins are empty or hold values equal to a
    /// neighbouring bin's values.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.distinct_values < self.counts.len()
    }
}

/// Returns the ranking permutation of `values`: `order[rank] = index`.
///
/// Ties are broken by input position.
#[must_use]
pub fn rank_order(values: &[f64]) -> Vec<usize> {
    let mut order = (0..values.len()).collect::<Vec<_>>();
    // `sort_by` is stable, so equal values keep input order
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}

/// Assigns every value to one of `num_bins` equal-frequency bins.
///
/// The returned vector is aligned with `values`; bin `0` holds the smallest
/// values. Returns an empty vector when `num_bins` is zero.
///
/// # Examples
///
/// ```
/// use clvkit_stats::binning::equal_frequency_bins;
///
/// // ties are split by input order
/// let bins = equal_frequency_bins(&[1.0, 1.0, 1.0, 1.0], 4);
/// assert_eq!(bins, vec![0, 1, 2, 3]);
/// ```
#[must_use]
pub fn equal_frequency_bins(values: &[f64], num_bins: usize) -> Vec<usize> {
    if num_bins == 0 {
        return vec![];
    }
    let n = values.len();
    let mut bins = vec![0; n];
    for (rank, index) in rank_order(values).into_iter().enumerate() {
        bins[index] = rank * num_bins / n;
    }
    bins
}

/// Counts members per bin and distinct values for a binning result.
#[must_use]
pub fn summarize_bins(values: &[f64], bins: &[usize], num_bins: usize) -> BinningSummary {
    let mut counts = vec![0; num_bins];
    for &bin in bins {
        counts[bin] += 1;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| a.total_cmp(b).is_eq());
    BinningSummary {
        counts,
        distinct_values: sorted.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values() {
        let bins = equal_frequency_bins(&[], 4);
        assert!(bins.is_empty());
        let summary = summarize_bins(&[], &bins, 4);
        assert_eq!(summary.counts, vec![0, 0, 0, 0]);
        assert!(summary.is_degenerate());
    }

    #[test]
    fn test_zero_bins() {
        assert!(equal_frequency_bins(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_equal_frequency_property() {
        for n in 1..60 {
            let values: Vec<f64> = (0..n).map(|i| f64::from((i * 37) % 101)).collect();
            let bins = equal_frequency_bins(&values, 4);
            let summary = summarize_bins(&values, &bins, 4);
            let lo = values.len() / 4;
            let hi = values.len().div_ceil(4);
            for count in &summary.counts {
                assert!(*count == lo || *count == hi, "n={n}: {:?}", summary.counts);
            }
        }
    }

    #[test]
    fn test_bins_monotone_in_value() {
        let values = [5.5, -1.0, 3.25, 8.0, 0.0, 2.0, 9.5, 4.0, 7.0];
        let bins = equal_frequency_bins(&values, 4);
        for i in 0..values.len() {
            for j in 0..values.len() {
                if values[i] < values[j] {
                    assert!(bins[i] <= bins[j]);
                }
            }
        }
    }

    #[test]
    fn test_fewer_values_than_bins() {
        let values = [3.0, 1.0];
        let bins = equal_frequency_bins(&values, 4);
        assert_eq!(bins, vec![2, 0]);
        let summary = summarize_bins(&values, &bins, 4);
        assert_eq!(summary.counts, vec![1, 0, 1, 0]);
        assert!(summary.is_degenerate());
    }

    #[test]
    fn test_rank_order_is_stable() {
        assert_eq!(rank_order(&[2.0, 1.0, 2.0, 1.0]), vec![1, 3, 0, 2]);
    }
}
