//! Impact scoring: how much of the diagram a change set touches.

use std::fmt;

use serde::Serialize;

/// Categorical impact bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    /// Nothing affected.
    None,
    /// A small share, well under the ceiling.
    Low,
    /// Up to and including the ceiling.
    Medium,
    /// Above the ceiling.
    High,
    /// Most of the diagram.
    Full,
}

impl ImpactLevel {
    /// Whether an incremental update is considered safe at this level.
    #[must_use]
    pub fn allows_incremental(self) -> bool {
        matches!(self, Self::Low | Self::Medium)
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Full => "full",
        };
        f.write_str(name)
    }
}

/// Affected share of a diagram and its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImpactAssessment {
    /// Nodes affected.
    pub affected_count: usize,
    /// Nodes in the diagram.
    pub total_count: usize,
    /// `affected / total` in `0..=1`; 0 when the diagram is empty.
    pub percentage: f64,
    /// Bucket derived from `percentage` and the ceiling.
    pub level: ImpactLevel,
}

const LOW_BAND: f64 = 0.20;
const FULL_BAND: f64 = 0.80;

/// Scores `affected` out of `total` nodes against `ceiling`.
///
/// With ceiling `c`: `p < min(0.2, c)` is low, up to and including `c` is
/// medium, above `c` but below `max(0.8, c)` is high, the rest is full.
#[must_use]
pub fn score(affected: usize, total: usize, ceiling: f64) -> ImpactAssessment {
    if total == 0 || affected == 0 {
        return ImpactAssessment {
            affected_count: affected,
            total_count: total,
            percentage: 0.0,
            level: ImpactLevel::None,
        };
    }
    #[allow(clippy::cast_precision_loss)]
    let percentage = (affected as f64 / total as f64).min(1.0);
    let level = if percentage < LOW_BAND.min(ceiling) {
        ImpactLevel::Low
    } else if percentage <= ceiling {
        ImpactLevel::Medium
    } else if percentage < FULL_BAND.max(ceiling) {
        ImpactLevel::High
    } else {
        ImpactLevel::Full
    };
    ImpactAssessment { affected_count: affected, total_count: total, percentage, level }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn ceiling_itself_is_medium() {
        let assessment = score(10, 20, 0.5);
        assert!((assessment.percentage - 0.5).abs() < f64::EPSILON);
        assert_eq!(assessment.level, ImpactLevel::Medium);
        assert!(assessment.level.allows_incremental());
    }

    #[test]
    fn one_in_twenty_is_low() {
        let assessment = score(1, 20, 0.5);
        assert!((assessment.percentage - 0.05).abs() < 1e-12);
        assert_eq!(assessment.level, ImpactLevel::Low);
    }

    #[test]
    fn bands_with_default_ceiling() {
        assert_eq!(score(0, 20, 0.5).level, ImpactLevel::None);
        assert_eq!(score(4, 20, 0.5).level, ImpactLevel::Medium);
        assert_eq!(score(11, 20, 0.5).level, ImpactLevel::High);
        assert_eq!(score(16, 20, 0.5).level, ImpactLevel::Full);
        assert_eq!(score(20, 20, 0.5).level, ImpactLevel::Full);
    }

    #[test]
    fn empty_diagram_scores_none() {
        let assessment = score(3, 0, 0.5);
        assert_eq!(assessment.level, ImpactLevel::None);
        assert!(assessment.percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn low_ceiling_shrinks_low_band() {
        assert_eq!(score(1, 10, 0.1).level, ImpactLevel::Medium);
        assert_eq!(score(2, 10, 0.1).level, ImpactLevel::High);
        assert_eq!(score(1, 100, 0.1).level, ImpactLevel::Low);
    }

    #[test]
    fn full_ceiling_never_exceeds_medium() {
        assert_eq!(score(10, 10, 1.0).level, ImpactLevel::Medium);
    }

    proptest! {
        #[test]
        fn more_affected_never_lowers_level(
            total in 1usize..200,
            a in 0usize..200,
            b in 0usize..200,
            ceiling in 0.01f64..=1.0,
        ) {
            let (lo, hi) = (a.min(b).min(total), a.max(b).min(total));
            prop_assert!(score(lo, total, ceiling).level <= score(hi, total, ceiling).level);
        }

        #[test]
        fn percentage_stays_in_unit_range(total in 0usize..200, affected in 0usize..400) {
            let p = score(affected, total, 0.5).percentage;
            prop_assert!((0.0..=1.0).contains(&p));
        }
    }
}
