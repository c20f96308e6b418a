//! Quantile segmentation and per-segment summaries
//!
//! [`segment`] splits a population into `k` equal-frequency buckets of a
//! score and names them with ordered labels, lowest scores first. Ranks are
//! assigned by `(score, input position)`, so equal scores are split across
//! neighbouring buckets in the order they appear and the result never depends
//! on anything but the input.
//!
//! [`summarize_segments`] aggregates feature columns per assigned label.

use std::collections::BTreeMap;

use clvkit_stats::{
    binning::{equal_frequency_bins, summarize_bins},
    descriptive::DescriptiveStats,
};
use serde::{Deserialize, Serialize};

/// Invalid segmentation request.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum SegmentError {
    #[display("number of segments must be positive")]
    NoSegments,
    #[display("expected {expected} segment labels, got {actual}")]
    LabelCount { expected: usize, actual: usize },
}

/// Assigns each score one of `k` labels by quantile rank.
///
/// The result is aligned with `scores`. Bucket sizes differ by at most one.
/// A population with fewer scores or fewer distinct values than `k` is still
/// segmented, leaving some buckets empty or splitting ties; a warning is
/// logged in that case.
///
/// # Errors
///
/// Returns [`SegmentError`] when `k` is zero or `labels` does not hold
/// exactly `k` labels.
///
/// # Examples
///
/// ```
/// use clvkit_models::segment::segment;
///
/// let labels = ["D", "C", "B", "A"];
/// let cltv = [120.0, 5.0, 48.0, 300.0, 0.5, 75.0, 19.0, 210.0];
/// let segments = segment(&cltv, 4, &labels).unwrap();
/// assert_eq!(segments, vec![&"B", &"D", &"C", &"A", &"D", &"B", &"C", &"A"]);
/// ```
pub fn segment<'a, L>(
    scores: &[f64],
    k: usize,
    labels: &'a [L],
) -> Result<Vec<&'a L>, SegmentError> {
    if k == 0 {
        return Err(SegmentError::NoSegments);
    }
    if labels.len() != k {
        return Err(SegmentError::LabelCount {
            expected: k,
            actual: labels.len(),
        });
    }

    let bins = equal_frequency_bins(scores, k);
    let summary = summarize_bins(scores, &bins, k);
    if summary.is_degenerate() {
        tracing::warn!(
            scores = scores.len(),
            distinct = summary.distinct_values,
            segments = k,
            counts = ?summary.counts,
            "too few distinct scores for the requested segments; ties split by input order"
        );
    }
    Ok(bins.into_iter().map(|bin| &labels[bin]).collect())
}

/// Mean and total of one column within a segment.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ColumnSummary {
    pub mean: f64,
    pub sum: f64,
}

/// Aggregates of one segment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SegmentSummary {
    pub segment: String,
    pub count: usize,
    /// Per-column aggregates keyed by column name
    pub columns: BTreeMap<String, ColumnSummary>,
}

/// Groups rows by their assigned segment and summarizes each column.
///
/// `assigned` and every column must be aligned. Segments are returned in
/// label order.
///
/// # Examples
///
/// ```
/// use clvkit_models::segment::summarize_segments;
///
/// let assigned = ["A", "B", "A"];
/// let monetary = [10.0, 4.0, 30.0];
/// let summaries = summarize_segments(&assigned, &[("monetary", &monetary[..])]);
/// assert_eq!(summaries[0].segment, "A");
/// assert_eq!(summaries[0].count, 2);
/// assert_eq!(summaries[0].columns["monetary"].mean, 20.0);
/// assert_eq!(summaries[1].columns["monetary"].sum, 4.0);
/// ```
#[must_use]
pub fn summarize_segments<S>(assigned: &[S], columns: &[(&str, &[f64])]) -> Vec<SegmentSummary>
where
    S: AsRef<str>,
{
    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, label) in assigned.iter().enumerate() {
        members.entry(label.as_ref()).or_default().push(index);
    }

    members
        .into_iter()
        .map(|(label, indices)| {
            let columns = columns
                .iter()
                .filter_map(|(name, values)| {
                    let stats = DescriptiveStats::new(indices.iter().map(|&i| values[i]))?;
                    Some((
                        (*name).to_owned(),
                        ColumnSummary {
                            mean: stats.mean,
                            sum: stats.sum,
                        },
                    ))
                })
                .collect();
            SegmentSummary {
                segment: label.to_owned(),
                count: indices.len(),
                columns,
            }
        })
        .collect()
}
