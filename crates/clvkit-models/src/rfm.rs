//! RFM scoring and rule-based segments
//!
//! Every customer gets three scores from 1 to 5 by quantile rank within the
//! population:
//!
//! | Score     | Column                        | 5 means         |
//! |-----------|-------------------------------|-----------------|
//! | Recency   | days since the last purchase  | most recent     |
//! | Frequency | number of transactions        | most frequent   |
//! | Monetary  | total spend                   | highest spend   |
//!
//! The recency and frequency scores are then looked up in [`SEGMENT_RULES`],
//! an ordered table of `(recency range, frequency range) -> segment` rules
//! where the first match wins:
//!
//! ```text
//!  F 5 | cant_lose   cant_lose   loyal       loyal        champions
//!    4 | at_risk     at_risk     loyal       loyal        champions
//!    3 | at_risk     at_risk     need_att.   potential    potential
//!    2 | hibernating hibernating about_sleep potential    potential
//!    1 | hibernating hibernating about_sleep promising    new
//!      +-------------------------------------------------------------
//!          R 1         2           3           4            5
//! ```

use std::{ops::RangeInclusive, str::FromStr};

use chrono::NaiveDate;
use clvkit_stats::binning::equal_frequency_bins;
use serde::{Deserialize, Serialize};

use crate::customer::CustomerRecord;

/// Number of score levels per dimension
pub const SCORE_LEVELS: usize = 5;

/// Behavioral segment derived from recency and frequency scores.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum RfmSegment {
    #[display("hibernating")]
    Hibernating,
    #[display("at_risk")]
    AtRisk,
    #[display("cant_lose")]
    CantLose,
    #[display("about_to_sleep")]
    AboutToSleep,
    #[display("need_attention")]
    NeedAttention,
    #[display("loyal_customers")]
    LoyalCustomers,
    #[display("promising")]
    Promising,
    #[display("new_customers")]
    NewCustomers,
    #[display("potential_loyalists")]
    PotentialLoyalists,
    #[display("champions")]
    Champions,
}

impl RfmSegment {
    pub const ALL: [Self; 10] = [
        Self::Hibernating,
        Self::AtRisk,
        Self::CantLose,
        Self::AboutToSleep,
        Self::NeedAttention,
        Self::LoyalCustomers,
        Self::Promising,
        Self::NewCustomers,
        Self::PotentialLoyalists,
        Self::Champions,
    ];
}

/// Segment name that matches no [`RfmSegment`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown RFM segment: {name}")]
pub struct UnknownSegment {
    pub name: String,
}

impl FromStr for RfmSegment {
    type Err = UnknownSegment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|segment| segment.to_string().eq_ignore_ascii_case(&name))
            .ok_or_else(|| UnknownSegment { name: s.to_owned() })
    }
}

/// One row of the segment rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRule {
    pub recency: RangeInclusive<u8>,
    pub frequency: RangeInclusive<u8>,
    pub segment: RfmSegment,
}

impl SegmentRule {
    const fn new(
        recency: RangeInclusive<u8>,
        frequency: RangeInclusive<u8>,
        segment: RfmSegment,
    ) -> Self {
        Self {
            recency,
            frequency,
            segment,
        }
    }

    #[must_use]
    pub fn matches(&self, recency_score: u8, frequency_score: u8) -> bool {
        self.recency.contains(&recency_score) && self.frequency.contains(&frequency_score)
    }
}

/// Segment rules in priority order.
pub const SEGMENT_RULES: [SegmentRule; 10] = [
    SegmentRule::new(1..=2, 1..=2, RfmSegment::Hibernating),
    SegmentRule::new(1..=2, 3..=4, RfmSegment::AtRisk),
    SegmentRule::new(1..=2, 5..=5, RfmSegment::CantLose),
    SegmentRule::new(3..=3, 1..=2, RfmSegment::AboutToSleep),
    SegmentRule::new(3..=3, 3..=3, RfmSegment::NeedAttention),
    SegmentRule::new(3..=4, 4..=5, RfmSegment::LoyalCustomers),
    SegmentRule::new(4..=4, 1..=1, RfmSegment::Promising),
    SegmentRule::new(5..=5, 1..=1, RfmSegment::NewCustomers),
    SegmentRule::new(4..=5, 2..=3, RfmSegment::PotentialLoyalists),
    SegmentRule::new(5..=5, 4..=5, RfmSegment::Champions),
];

/// Looks up the first rule matching the scores.
///
/// ```
/// use clvkit_models::rfm::{RfmSegment, classify};
///
/// assert_eq!(classify(5, 5), Some(RfmSegment::Champions));
/// assert_eq!(classify(1, 5), Some(RfmSegment::CantLose));
/// assert_eq!(classify(0, 3), None);
/// ```
#[must_use]
pub fn classify(recency_score: u8, frequency_score: u8) -> Option<RfmSegment> {
    SEGMENT_RULES
        .iter()
        .find(|rule| rule.matches(recency_score, frequency_score))
        .map(|rule| rule.segment)
}

/// RFM scores and segment of one customer.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RfmRow {
    pub customer_id: String,
    /// Days between the last purchase and the cutoff date
    pub recency: i64,
    pub frequency: u32,
    pub monetary: f64,
    pub recency_score: u8,
    pub frequency_score: u8,
    pub monetary_score: u8,
    #[serde(rename = "RF_SCORE")]
    pub rf_score: String,
    #[serde(rename = "RFM_SCORE")]
    pub rfm_score: String,
    pub segment: RfmSegment,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,
}

#[expect(clippy::cast_possible_truncation)]
fn scores(values: &[f64], descending: bool) -> Vec<u8> {
    equal_frequency_bins(values, SCORE_LEVELS)
        .into_iter()
        .map(|bin| {
            let score = if descending { SCORE_LEVELS - bin } else { bin + 1 };
            score as u8
        })
        .collect()
}

/// Scores every customer against the rest of the population.
///
/// Ties are broken by input order, as in [`crate::segment::segment`].
#[must_use]
pub fn score_customers(customers: &[CustomerRecord], cutoff: NaiveDate) -> Vec<RfmRow> {
    #[expect(clippy::cast_precision_loss)]
    let recency = customers
        .iter()
        .map(|c| c.days_since_last_purchase(cutoff) as f64)
        .collect::<Vec<_>>();
    let frequency = customers
        .iter()
        .map(|c| f64::from(c.transactions))
        .collect::<Vec<_>>();
    let monetary = customers.iter().map(|c| c.monetary).collect::<Vec<_>>();

    let recency_scores = scores(&recency, true);
    let frequency_scores = scores(&frequency, false);
    let monetary_scores = scores(&monetary, false);

    customers
        .iter()
        .enumerate()
        .map(|(i, customer)| {
            let (r, f, m) = (recency_scores[i], frequency_scores[i], monetary_scores[i]);
            RfmRow {
                customer_id: customer.customer_id.clone(),
                recency: customer.days_since_last_purchase(cutoff),
                frequency: customer.transactions,
                monetary: customer.monetary,
                recency_score: r,
                frequency_score: f,
                monetary_score: m,
                rf_score: format!("{r}{f}"),
                rfm_score: format!("{r}{f}{m}"),
                // the rule table covers every score pair
                segment: classify(r, f).unwrap_or(RfmSegment::Hibernating),
                interests: customer.interests.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: &str, last_day: u32, transactions: u32, monetary: f64) -> CustomerRecord {
        let first = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        CustomerRecord {
            customer_id: id.to_owned(),
            first_purchase: first,
            last_purchase: NaiveDate::from_ymd_opt(2021, 1, last_day).unwrap(),
            transactions,
            frequency: f64::from(transactions),
            recency: 0.0,
            t: 0.0,
            monetary,
            avg_monetary: None,
            country: None,
            interests: vec![],
        }
    }

    #[test]
    fn test_rules_cover_every_score_pair() {
        for r in 1..=5 {
            for f in 1..=5 {
                assert!(classify(r, f).is_some(), "R{r} F{f}");
            }
        }
    }

    #[test]
    fn test_rule_table_corners() {
        assert_eq!(classify(1, 1), Some(RfmSegment::Hibernating));
        assert_eq!(classify(2, 4), Some(RfmSegment::AtRisk));
        assert_eq!(classify(3, 2), Some(RfmSegment::AboutToSleep));
        assert_eq!(classify(3, 3), Some(RfmSegment::NeedAttention));
        assert_eq!(classify(4, 5), Some(RfmSegment::LoyalCustomers));
        assert_eq!(classify(4, 1), Some(RfmSegment::Promising));
        assert_eq!(classify(5, 1), Some(RfmSegment::NewCustomers));
        assert_eq!(classify(4, 3), Some(RfmSegment::PotentialLoyalists));
    }

    #[test]
    fn test_segment_names_round_trip() {
        assert_eq!(RfmSegment::CantLose.to_string(), "cant_lose");
        assert_eq!("champions".parse::<RfmSegment>().unwrap(), RfmSegment::Champions);
        assert_eq!(
            "potential-loyalists".parse::<RfmSegment>().unwrap(),
            RfmSegment::PotentialLoyalists
        );
        assert!("vip".parse::<RfmSegment>().is_err());
        for segment in RfmSegment::ALL {
            assert_eq!(segment.to_string().parse::<RfmSegment>().unwrap(), segment);
        }
    }

    #[test]
    fn test_scores_and_strings() {
        let cutoff = NaiveDate::from_ymd_opt(2021, 2, 1).unwrap();
        let customers = (1..=10)
            .map(|i| customer(&format!("c{i}"), 2 * i, i, 10.0 * f64::from(11 - i)))
            .collect::<Vec<_>>();
        let rows = score_customers(&customers, cutoff);

        // c10 bought last, most often, and spent least
        let best = &rows[9];
        assert_eq!(
            (best.recency_score, best.frequency_score, best.monetary_score),
            (5, 5, 1)
        );
        assert_eq!(best.rf_score, "55");
        assert_eq!(best.rfm_score, "551");
        assert_eq!(best.segment, RfmSegment::Champions);

        let worst = &rows[0];
        assert_eq!(worst.recency, 30);
        assert_eq!((worst.recency_score, worst.frequency_score), (1, 1));
        assert_eq!(worst.segment, RfmSegment::Hibernating);

        for score in 1..=5 {
            let count = rows.iter().filter(|row| row.recency_score == score).count();
            assert_eq!(count, 2);
        }
    }

    #[test]
    fn test_empty_population() {
        let cutoff = NaiveDate::from_ymd_opt(2021, 2, 1).unwrap();
        assert!(score_customers(&[], cutoff).is_empty());
    }
}
