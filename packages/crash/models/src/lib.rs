#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crash record types and injury-severity tier classification.
//!
//! Every crash is assigned exactly one [`SeverityTier`] when the record is
//! created. Tiers are decided by walking [`TIER_RULES`] top-down, so the
//! most severe injury recorded on a crash always wins.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Injury-severity tier of a single crash, most severe first.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityTier {
    /// At least one fatality
    Fatal,
    /// Incapacitating (serious) injury, no fatality
    Incapacitating,
    /// Non-incapacitating (minor) injury, nothing more severe
    NonIncapacitating,
    /// Possible injury only
    Possible,
    /// Property damage only, no injury of any kind recorded
    Pdo,
}

impl SeverityTier {
    /// Returns all variants of this enum, most severe first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Fatal,
            Self::Incapacitating,
            Self::NonIncapacitating,
            Self::Possible,
            Self::Pdo,
        ]
    }
}

/// Fatality and injury counts recorded on a crash.
///
/// Absent or null counts in the raw data are represented as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InjuryCounts {
    /// Number of people killed.
    pub fatalities: u32,
    /// Number of incapacitating injuries.
    pub incapacitating: u32,
    /// Number of non-incapacitating injuries.
    pub non_incapacitating: u32,
    /// Number of possible injuries.
    pub possible: u32,
}

impl InjuryCounts {
    /// Builds counts from nullable raw values, treating `None` as 0.
    #[must_use]
    pub fn from_nullable(
        fatalities: Option<u32>,
        incapacitating: Option<u32>,
        non_incapacitating: Option<u32>,
        possible: Option<u32>,
    ) -> Self {
        Self {
            fatalities: fatalities.unwrap_or(0),
            incapacitating: incapacitating.unwrap_or(0),
            non_incapacitating: non_incapacitating.unwrap_or(0),
            possible: possible.unwrap_or(0),
        }
    }
}

/// One entry of the tier assignment table.
#[derive(Debug, Clone, Copy)]
pub struct TierRule {
    /// Tier assigned when [`TierRule::matches`] returns `true`.
    pub tier: SeverityTier,
    /// Predicate over the crash's counts.
    pub matches: fn(&InjuryCounts) -> bool,
}

/// Tier rules in priority order. A crash matching none of them is
/// [`SeverityTier::Pdo`].
///
/// Each predicate also requires every more severe count to be zero, so at
/// most one rule can match any set of counts.
pub const TIER_RULES: &[TierRule] = &[
    TierRule {
        tier: SeverityTier::Fatal,
        matches: |c| c.fatalities != 0,
    },
    TierRule {
        tier: SeverityTier::Incapacitating,
        matches: |c| c.incapacitating != 0 && c.fatalities == 0,
    },
    TierRule {
        tier: SeverityTier::NonIncapacitating,
        matches: |c| c.non_incapacitating != 0 && c.fatalities == 0 && c.incapacitating == 0,
    },
    TierRule {
        tier: SeverityTier::Possible,
        matches: |c| {
            c.possible != 0
                && c.fatalities == 0
                && c.incapacitating == 0
                && c.non_incapacitating == 0
        },
    },
];

/// Assigns the single severity tier for a crash's counts.
#[must_use]
pub fn classify(counts: &InjuryCounts) -> SeverityTier {
    TIER_RULES
        .iter()
        .find(|rule| (rule.matches)(counts))
        .map_or(SeverityTier::Pdo, |rule| rule.tier)
}

/// A single observed crash with its severity tier already assigned.
///
/// Fields are private so the tier can never drift from the counts it was
/// derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashRecord {
    id: String,
    longitude: f64,
    latitude: f64,
    counts: InjuryCounts,
    tier: SeverityTier,
}

impl CrashRecord {
    /// Creates a crash record and classifies it.
    #[must_use]
    pub fn new(id: impl Into<String>, longitude: f64, latitude: f64, counts: InjuryCounts) -> Self {
        Self {
            id: id.into(),
            longitude,
            latitude,
            tier: classify(&counts),
            counts,
        }
    }

    /// Source identifier of the crash.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Longitude (x) of the crash location.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Latitude (y) of the crash location.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Raw injury counts the tier was derived from.
    #[must_use]
    pub const fn counts(&self) -> &InjuryCounts {
        &self.counts
    }

    /// Assigned severity tier.
    #[must_use]
    pub const fn tier(&self) -> SeverityTier {
        self.tier
    }
}
