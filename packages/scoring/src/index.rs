//! Property-damage-only count and EPDO index for a single feature.
//!
//! `pdo_count` is whatever part of the total is not explained by an
//! injury tier. The EPDO index weights every crash by severity and divides
//! by the total, so it reads as PDO-equivalent cost per crash. A feature
//! with no crashes has an index of 0.

use crash_score_crash_models::SeverityTier;
use crash_score_network_models::{FeatureScore, SeverityWeights, TierCounts};

use crate::ScoringError;

/// Crashes on the feature that recorded no injury.
///
/// Clamped at 0 if the injury tiers ever exceed the total.
#[must_use]
pub const fn pdo_count(counts: &TierCounts) -> u64 {
    counts.total.saturating_sub(counts.injury_sum())
}

/// Severity-weighted crash cost per crash.
///
/// A feature with `total == 0` has no crash history and scores 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn epdo_index(counts: &TierCounts, pdo_count: u64, weights: &SeverityWeights) -> f64 {
    if counts.total == 0 {
        return 0.0;
    }

    let weighted: f64 = [
        (SeverityTier::Fatal, counts.fatal),
        (SeverityTier::Incapacitating, counts.incapacitating),
        (SeverityTier::NonIncapacitating, counts.non_incapacitating),
        (SeverityTier::Possible, counts.possible),
        (SeverityTier::Pdo, pdo_count),
    ]
    .into_iter()
    .map(|(tier, count)| count as f64 * weights.for_tier(tier))
    .sum();

    weighted / counts.total as f64
}

/// Computes the full [`FeatureScore`] for one feature.
///
/// # Errors
///
/// Returns [`ScoringError::NonFiniteIndex`] if the index overflows to a
/// non-finite value.
pub fn score(
    feature_id: &str,
    counts: &TierCounts,
    weights: &SeverityWeights,
) -> Result<FeatureScore, ScoringError> {
    let pdo_count = pdo_count(counts);
    let epdo_index = epdo_index(counts, pdo_count, weights);

    if !epdo_index.is_finite() {
        return Err(ScoringError::NonFiniteIndex {
            feature_id: feature_id.to_string(),
        });
    }

    Ok(FeatureScore {
        pdo_count,
        epdo_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> SeverityWeights {
        SeverityWeights::try_new(10.0, 5.0, 3.0, 1.0).unwrap()
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn single_fatal_crash_scores_fatal_weight() {
        let counts = TierCounts {
            fatal: 1,
            total: 1,
            ..TierCounts::default()
        };
        let result = score("a", &counts, &weights()).unwrap();
        assert_eq!(result.pdo_count, 0);
        assert!(approx_eq(result.epdo_index, 10.0), "{}", result.epdo_index);
    }

    #[test]
    fn no_crashes_scores_zero() {
        let result = score("a", &TierCounts::default(), &weights()).unwrap();
        assert_eq!(result.pdo_count, 0);
        assert!(approx_eq(result.epdo_index, 0.0));
    }

    #[test]
    fn pdo_and_possible_average() {
        let counts = TierCounts {
            possible: 1,
            total: 2,
            ..TierCounts::default()
        };
        let result = score("a", &counts, &weights()).unwrap();
        assert_eq!(result.pdo_count, 1);
        assert!(approx_eq(result.epdo_index, 1.0), "{}", result.epdo_index);
    }

    #[test]
    fn mixed_tiers() {
        let counts = TierCounts {
            fatal: 1,
            incapacitating: 2,
            non_incapacitating: 1,
            possible: 0,
            total: 6,
        };
        let result = score("a", &counts, &weights()).unwrap();
        assert_eq!(result.pdo_count, 2);
        // (10 + 2*5 + 3 + 2) / 6
        assert!(approx_eq(result.epdo_index, 25.0 / 6.0), "{}", result.epdo_index);
    }

    #[test]
    fn inconsistent_counts_clamp_pdo() {
        let counts = TierCounts {
            fatal: 3,
            total: 2,
            ..TierCounts::default()
        };
        assert_eq!(pdo_count(&counts), 0);
    }

    #[test]
    fn pdo_never_exceeds_total() {
        for total in 0..5 {
            for possible in 0..5 {
                let counts = TierCounts {
                    possible,
                    total,
                    ..TierCounts::default()
                };
                let pdo = pdo_count(&counts);
                assert!(pdo <= total, "pdo {pdo} > total {total}");
            }
        }
    }

    #[test]
    fn index_positive_whenever_crashes_exist() {
        let zero = SeverityWeights::try_new(0.0, 0.0, 0.0, 0.0).unwrap();
        let counts = TierCounts {
            fatal: 1,
            total: 2,
            ..TierCounts::default()
        };
        let result = score("a", &counts, &zero).unwrap();
        assert!(result.epdo_index >= 0.0);
        assert!(approx_eq(result.epdo_index, 0.5));
    }

    #[test]
    fn each_tier_weighted_by_its_own_weight() {
        let weights = weights();
        let single = |tier| {
            let mut counts = TierCounts {
                total: 1,
                ..TierCounts::default()
            };
            match tier {
                SeverityTier::Fatal => counts.fatal = 1,
                SeverityTier::Incapacitating => counts.incapacitating = 1,
                SeverityTier::NonIncapacitating => counts.non_incapacitating = 1,
                SeverityTier::Possible => counts.possible = 1,
                SeverityTier::Pdo => {}
            }
            counts
        };

        for tier in [
            SeverityTier::Fatal,
            SeverityTier::Incapacitating,
            SeverityTier::NonIncapacitating,
            SeverityTier::Possible,
            SeverityTier::Pdo,
        ] {
            let result = score("a", &single(tier), &weights).unwrap();
            assert!(
                approx_eq(result.epdo_index, weights.for_tier(tier)),
                "{tier:?}: {}",
                result.epdo_index
            );
        }
    }

    #[test]
    fn overflow_is_reported() {
        let huge = SeverityWeights::try_new(f64::MAX, f64::MAX, 0.0, 0.0).unwrap();
        let counts = TierCounts {
            fatal: 2,
            incapacitating: 2,
            total: 4,
            ..TierCounts::default()
        };
        let err = score("x", &counts, &huge).unwrap_err();
        assert!(
            matches!(err, ScoringError::NonFiniteIndex { ref feature_id } if feature_id == "x"),
            "{err}"
        );
    }
}
