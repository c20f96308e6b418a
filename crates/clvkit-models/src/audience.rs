//! Targeted audience selection from RFM results
//!
//! An audience is the set of customers whose RFM segment is one of a set of
//! target segments and who have shown interest in at least one of a set of
//! product categories.
//!
//! # Example
//!
//! Loyal high-value customers interested in women's products:
//!
//! ```
//! use clvkit_models::{audience::AudienceQuery, rfm::RfmSegment};
//!
//! let query = AudienceQuery {
//!     segments: vec![RfmSegment::Champions, RfmSegment::LoyalCustomers],
//!     interest_keywords: vec!["KADIN".to_owned()],
//! };
//! assert!(query.matches(RfmSegment::Champions, &["AKTIFSPOR".into(), "KADIN".into()]));
//! assert!(!query.matches(RfmSegment::AtRisk, &["KADIN".into()]));
//! ```

use serde::{Deserialize, Serialize};

use crate::rfm::{RfmRow, RfmSegment};

/// Segment and interest filter for an audience.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AudienceQuery {
    /// Segments to include; empty includes every segment
    #[serde(default)]
    pub segments: Vec<RfmSegment>,
    /// Category keywords; a customer matches when any interest tag contains
    /// any keyword. Empty disables the interest filter.
    #[serde(default)]
    pub interest_keywords: Vec<String>,
}

impl AudienceQuery {
    #[must_use]
    pub fn matches(&self, segment: RfmSegment, interests: &[String]) -> bool {
        let in_segment = self.segments.is_empty() || self.segments.contains(&segment);
        let interested = self.interest_keywords.is_empty()
            || interests.iter().any(|tag| {
                self.interest_keywords
                    .iter()
                    .any(|keyword| tag.contains(keyword.as_str()))
            });
        in_segment && interested
    }
}

/// Ids of the customers matching `query`, in row order.
#[must_use]
pub fn select_audience(rows: &[RfmRow], query: &AudienceQuery) -> Vec<String> {
    let selected = rows
        .iter()
        .filter(|row| query.matches(row.segment, &row.interests))
        .map(|row| row.customer_id.clone())
        .collect::<Vec<_>>();
    tracing::debug!(
        selected = selected.len(),
        population = rows.len(),
        "selected audience"
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, segment: RfmSegment, interests: &[&str]) -> RfmRow {
        RfmRow {
            customer_id: id.to_owned(),
            recency: 10,
            frequency: 3,
            monetary: 100.0,
            recency_score: 3,
            frequency_score: 3,
            monetary_score: 3,
            rf_score: "33".to_owned(),
            rfm_score: "333".to_owned(),
            segment,
            interests: interests.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn test_segment_and_interest_filter() {
        let rows = vec![
            row("a", RfmSegment::CantLose, &["ERKEK", "AKTIFSPOR"]),
            row("b", RfmSegment::Hibernating, &["KADIN"]),
            row("c", RfmSegment::NewCustomers, &["COCUK"]),
            row("d", RfmSegment::Champions, &["ERKEK"]),
            row("e", RfmSegment::AboutToSleep, &[]),
        ];
        let query = AudienceQuery {
            segments: vec![
                RfmSegment::CantLose,
                RfmSegment::Hibernating,
                RfmSegment::NewCustomers,
            ],
            interest_keywords: vec!["ERKEK".to_owned(), "COCUK".to_owned()],
        };
        assert_eq!(select_audience(&rows, &query), vec!["a", "c"]);
    }

    #[test]
    fn test_keyword_matches_inside_tag() {
        let query = AudienceQuery {
            segments: vec![],
            interest_keywords: vec!["SPOR".to_owned()],
        };
        assert!(query.matches(RfmSegment::Promising, &["AKTIFSPOR".to_owned()]));
        assert!(!query.matches(RfmSegment::Promising, &[]));
    }

    #[test]
    fn test_empty_query_selects_everyone() {
        let rows = vec![
            row("a", RfmSegment::AtRisk, &[]),
            row("b", RfmSegment::Champions, &["KADIN"]),
        ];
        assert_eq!(select_audience(&rows, &AudienceQuery::default()).len(), 2);
    }
}
