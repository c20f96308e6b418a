//! Quantile-IQR outlier suppression
//!
//! Extreme values are clipped rather than dropped so that every customer keeps
//! contributing to the fitted models. Bounds are derived from wide quantiles
//! (P01/P99 by default) instead of the quartiles, which leaves the bulk of a
//! heavy-tailed retail distribution untouched.
//!
//! ```text
//! iqr  = q_high - q_low
//! low  = q_low  - 1.5 * iqr
//! high = q_high + 1.5 * iqr
//! ```
//!
//! Values below `low` are replaced by `round(low)`, values above `high` by
//! `round(high)`.

use crate::percentiles::Percentiles;

/// Clipping bounds computed from a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierThresholds {
    /// Lower fence (`q_low - 1.5 * iqr`), before rounding
    pub low: f64,
    /// Upper fence (`q_high + 1.5 * iqr`), before rounding
    pub high: f64,
}

/// Percentile pair used to derive the fences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierRule {
    /// Lower percentile (0.0 to 100.0)
    pub low_percentile: f64,
    /// Upper percentile (0.0 to 100.0)
    pub high_percentile: f64,
    /// Fence multiplier applied to the inter-percentile range
    pub fence: f64,
}

impl Default for OutlierRule {
    fn default() -> Self {
        Self {
            low_percentile: 1.0,
            high_percentile: 99.0,
            fence: 1.5,
        }
    }
}

impl OutlierRule {
    /// Computes the fences for a column.
    ///
    /// Returns `None` for an empty column.
    ///
    /// # Examples
    ///
    /// ```
    /// use clvkit_stats::outlier::OutlierRule;
    ///
    /// let values: Vec<f64> = (0..=100).map(f64::from).collect();
    /// let thresholds = OutlierRule::default().thresholds(&values).unwrap();
    /// assert!((thresholds.low - -146.0).abs() < 1e-9);
    /// assert!((thresholds.high - 246.0).abs() < 1e-9);
    /// ```
    #[must_use]
    pub fn thresholds(&self, values: &[f64]) -> Option<OutlierThresholds> {
        if values.is_empty() {
            return None;
        }
        let percentiles = Percentiles::new(values, &[self.low_percentile, self.high_percentile]);
        let q_low = percentiles.get(self.low_percentile)?;
        let q_high = percentiles.get(self.high_percentile)?;
        let range = q_high - q_low;
        Some(OutlierThresholds {
            low: q_low - self.fence * range,
            high: q_high + self.fence * range,
        })
    }

    /// Clips a column in place and returns the fences that were applied.
    ///
    /// Returns the number of values replaced alongside the thresholds.
    ///
    /// # Examples
    ///
    /// ```
    /// use clvkit_stats::outlier::OutlierRule;
    ///
    /// let mut values = vec![1.0; 200];
    /// values.push(10_000.0);
    /// let (_, replaced) = OutlierRule::default().suppress(&mut values).unwrap();
    /// assert_eq!(replaced, 1);
    /// assert!(values.iter().all(|v| *v <= 10_000.0));
    /// ```
    pub fn suppress(&self, values: &mut [f64]) -> Option<(OutlierThresholds, usize)> {
        let thresholds = self.thresholds(values)?;
        let replaced = thresholds.apply(values);
        Some((thresholds, replaced))
    }
}

impl OutlierThresholds {
    /// Rounded lower replacement value
    #[must_use]
    pub fn low_replacement(&self) -> f64 {
        self.low.round()
    }

    /// Rounded upper replacement value
    #[must_use]
    pub fn high_replacement(&self) -> f64 {
        self.high.round()
    }

    /// Replaces every out-of-fence value and returns how many were changed.
    ///
    /// A value already equal to its replacement is left alone, so re-applying
    /// the same thresholds reports zero changes.
    #[expect(clippy::float_cmp)]
    pub fn apply(&self, values: &mut [f64]) -> usize {
        let mut replaced = 0;
        for value in values {
            let replacement = if *value < self.low {
                self.low_replacement()
            } else if *value > self.high {
                self.high_replacement()
            } else {
                continue;
            };
            if *value != replacement {
                *value = replacement;
                replaced += 1;
            }
        }
        replaced
    }
}

/// Clips a column with the default P01/P99 rule.
pub fn replace_with_thresholds(values: &mut [f64]) -> Option<OutlierThresholds> {
    OutlierRule::default()
        .suppress(values)
        .map(|(thresholds, _)| thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skewed_column() -> Vec<f64> {
        let mut values: Vec<f64> = (0..500).map(|i| f64::from(i % 17) + 0.25).collect();
        values.extend([900.0, 1_250.5, -800.0, 5_000.0]);
        values
    }

    #[test]
    fn test_empty_column() {
        let mut values: Vec<f64> = vec![];
        assert!(replace_with_thresholds(&mut values).is_none());
    }

    #[test]
    fn test_values_within_rounded_bounds() {
        let mut values = skewed_column();
        let thresholds = replace_with_thresholds(&mut values).unwrap();
        let lo = thresholds.low.min(thresholds.low_replacement());
        let hi = thresholds.high.max(thresholds.high_replacement());
        for v in &values {
            assert!(*v >= lo && *v <= hi, "{v} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn test_in_range_values_untouched() {
        let original = skewed_column();
        let mut values = original.clone();
        let thresholds = replace_with_thresholds(&mut values).unwrap();
        for (before, after) in original.iter().zip(&values) {
            if *before >= thresholds.low && *before <= thresholds.high {
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let mut values = skewed_column();
        replace_with_thresholds(&mut values).unwrap();
        let once = values.clone();
        let (_, replaced) = OutlierRule::default().suppress(&mut values).unwrap();
        assert_eq!(replaced, 0);
        assert_eq!(once, values);
    }

    #[test]
    fn test_constant_column_is_noop() {
        let mut values = vec![3.0; 10];
        let (thresholds, replaced) = OutlierRule::default().suppress(&mut values).unwrap();
        assert_eq!(thresholds.low, 3.0);
        assert_eq!(thresholds.high, 3.0);
        assert_eq!(replaced, 0);
    }
}
