#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road network feature types and the parameters used to score them.
//!
//! A [`NetworkFeature`] is a candidate location (an intersection or a road
//! segment) represented by its crash-capture buffer polygon. Aggregation
//! fills a [`TierCounts`] for every feature, scoring derives a
//! [`FeatureScore`], and the pair is carried together as a
//! [`ScoredFeature`] until it is projected to a [`ResultRow`].

use crash_score_crash_models::SeverityTier;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The two kinds of candidate network features.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureKind {
    /// Buffered intersection
    Intersection,
    /// Buffered road segment
    Segment,
}

impl FeatureKind {
    /// Capitalized label used in output file names and log lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Intersection => "Intersection",
            Self::Segment => "Segment",
        }
    }

    /// Whether features of this kind carry a length attribute.
    #[must_use]
    pub const fn has_length(self) -> bool {
        matches!(self, Self::Segment)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Intersection, Self::Segment]
    }
}

/// A candidate location being scored.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkFeature {
    /// Feature identifier, unique within its feature set.
    pub id: String,
    /// Intersection or segment.
    pub kind: FeatureKind,
    /// Descriptive name of the location.
    pub name: String,
    /// Segment length in source units. Always `None` for intersections.
    pub length: Option<f64>,
    /// Crash-capture buffer polygon.
    pub geometry: MultiPolygon<f64>,
}

/// Per-tier crash counts for one feature.
///
/// `total` counts every contained crash, so it always equals the injury
/// tier counts plus the PDO crashes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierCounts {
    /// Fatal crashes.
    pub fatal: u64,
    /// Incapacitating-injury crashes.
    pub incapacitating: u64,
    /// Non-incapacitating-injury crashes.
    pub non_incapacitating: u64,
    /// Possible-injury crashes.
    pub possible: u64,
    /// All contained crashes regardless of tier.
    pub total: u64,
}

impl TierCounts {
    /// Records one contained crash of the given tier.
    pub const fn record(&mut self, tier: SeverityTier) {
        match tier {
            SeverityTier::Fatal => self.fatal += 1,
            SeverityTier::Incapacitating => self.incapacitating += 1,
            SeverityTier::NonIncapacitating => self.non_incapacitating += 1,
            SeverityTier::Possible => self.possible += 1,
            SeverityTier::Pdo => {}
        }
        self.total += 1;
    }

    /// Sum of the four injury tiers.
    #[must_use]
    pub const fn injury_sum(&self) -> u64 {
        self.fatal + self.incapacitating + self.non_incapacitating + self.possible
    }
}

/// Derived safety index values for one feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    /// Property-damage-only crash count.
    pub pdo_count: u64,
    /// Equivalent property-damage-only index.
    pub epdo_index: f64,
}

/// A feature together with its aggregated counts and score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFeature {
    /// The scored feature.
    pub feature: NetworkFeature,
    /// Aggregated crash counts.
    pub counts: TierCounts,
    /// Derived PDO count and EPDO index.
    pub score: FeatureScore,
}

/// Error returned when a weight or threshold is outside its valid range.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidParameterError {
    /// Name of the offending parameter.
    pub name: String,
    /// The rejected value, as supplied.
    pub value: String,
}

impl std::fmt::Display for InvalidParameterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid value {} for {}: expected a finite, non-negative number",
            self.value, self.name
        )
    }
}

impl std::error::Error for InvalidParameterError {}

/// Severity weights applied when computing the EPDO index.
///
/// PDO crashes always carry a weight of 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeverityWeights {
    fatal: f64,
    serious: f64,
    non_serious: f64,
    possible: f64,
}

impl SeverityWeights {
    /// Creates a weight set.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first weight that is negative, NaN, or
    /// infinite.
    pub fn try_new(
        fatal: f64,
        serious: f64,
        non_serious: f64,
        possible: f64,
    ) -> Result<Self, InvalidParameterError> {
        for (name, value) in [
            ("fatal weight", fatal),
            ("serious weight", serious),
            ("non-serious weight", non_serious),
            ("possible weight", possible),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidParameterError {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }

        Ok(Self {
            fatal,
            serious,
            non_serious,
            possible,
        })
    }

    /// Weight of a fatal crash.
    #[must_use]
    pub const fn fatal(&self) -> f64 {
        self.fatal
    }

    /// Weight of an incapacitating-injury crash.
    #[must_use]
    pub const fn serious(&self) -> f64 {
        self.serious
    }

    /// Weight of a non-incapacitating-injury crash.
    #[must_use]
    pub const fn non_serious(&self) -> f64 {
        self.non_serious
    }

    /// Weight of a possible-injury crash.
    #[must_use]
    pub const fn possible(&self) -> f64 {
        self.possible
    }

    /// Weight applied to a crash of the given tier.
    #[must_use]
    pub const fn for_tier(&self, tier: SeverityTier) -> f64 {
        match tier {
            SeverityTier::Fatal => self.fatal,
            SeverityTier::Incapacitating => self.serious,
            SeverityTier::NonIncapacitating => self.non_serious,
            SeverityTier::Possible => self.possible,
            SeverityTier::Pdo => 1.0,
        }
    }
}

/// Minimum total crash counts for a feature to be a high-crash location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    intersection: u64,
    segment: u64,
}

impl Thresholds {
    /// Creates a threshold pair from signed inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if either threshold is negative.
    pub fn try_new(intersection: i64, segment: i64) -> Result<Self, InvalidParameterError> {
        let convert = |name: &str, value: i64| {
            u64::try_from(value).map_err(|_| InvalidParameterError {
                name: name.to_string(),
                value: value.to_string(),
            })
        };

        Ok(Self {
            intersection: convert("intersection threshold", intersection)?,
            segment: convert("segment threshold", segment)?,
        })
    }

    /// Threshold that applies to the given feature kind.
    #[must_use]
    pub const fn for_kind(&self, kind: FeatureKind) -> u64 {
        match kind {
            FeatureKind::Intersection => self.intersection,
            FeatureKind::Segment => self.segment,
        }
    }
}

/// Fixed reporting schema for one scored feature.
///
/// Source attributes other than id, name and length are dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    /// Feature identifier.
    pub id: String,
    /// Feature name.
    pub name: String,
    /// Segment length (segments only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    /// All contained crashes.
    pub total_count: u64,
    /// Fatal crashes.
    pub sum_fatalities_count: u64,
    /// Incapacitating-injury crashes.
    pub sum_incapacitating_count: u64,
    /// Non-incapacitating-injury crashes.
    pub sum_non_incapacitating_count: u64,
    /// Possible-injury crashes.
    pub sum_possible_count: u64,
    /// Property-damage-only crashes.
    pub pdo_count: u64,
    /// Equivalent property-damage-only index.
    pub epdo_index: f64,
}

impl ResultRow {
    /// Column names for the given feature kind, in output order.
    #[must_use]
    pub fn columns(kind: FeatureKind) -> Vec<&'static str> {
        let mut columns = vec!["id", "name"];
        if kind.has_length() {
            columns.push("length");
        }
        columns.extend([
            "total_count",
            "sum_fatalities_count",
            "sum_incapacitating_count",
            "sum_non_incapacitating_count",
            "sum_possible_count",
            "pdo_count",
            "epdo_index",
        ]);
        columns
    }

    /// Cell values matching [`ResultRow::columns`] for the given kind.
    #[must_use]
    pub fn to_record(&self, kind: FeatureKind) -> Vec<String> {
        let mut record = vec![self.id.clone(), self.name.clone()];
        if kind.has_length() {
            record.push(self.length.map(|l| l.to_string()).unwrap_or_default());
        }
        record.extend([
            self.total_count.to_string(),
            self.sum_fatalities_count.to_string(),
            self.sum_incapacitating_count.to_string(),
            self.sum_non_incapacitating_count.to_string(),
            self.sum_possible_count.to_string(),
            self.pdo_count.to_string(),
            self.epdo_index.to_string(),
        ]);
        record
    }
}

impl From<&ScoredFeature> for ResultRow {
    fn from(scored: &ScoredFeature) -> Self {
        Self {
            id: scored.feature.id.clone(),
            name: scored.feature.name.clone(),
            length: scored.feature.length,
            total_count: scored.counts.total,
            sum_fatalities_count: scored.counts.fatal,
            sum_incapacitating_count: scored.counts.incapacitating,
            sum_non_incapacitating_count: scored.counts.non_incapacitating,
            sum_possible_count: scored.counts.possible,
            pdo_count: scored.score.pdo_count,
            epdo_index: scored.score.epdo_index,
        }
    }
}
