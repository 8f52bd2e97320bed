#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial aggregation of crashes onto network features.
//!
//! Crash points are bulk-loaded into an R-tree once per run. Each feature
//! polygon then queries the tree with its bounding box and keeps the
//! candidates that fall inside or on the boundary of the polygon.
//! Features are independent of each other: overlapping polygons may claim
//! the same crash, and every feature gets a result even when nothing
//! matches.

pub mod progress;

use crash_score_crash_models::{CrashRecord, SeverityTier};
use crash_score_network_models::{NetworkFeature, TierCounts};
use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use rayon::prelude::*;
use rstar::{AABB, RTree, RTreeObject};

use crate::progress::ProgressCallback;

/// A classified crash location stored in the R-tree.
struct CrashPoint {
    tier: SeverityTier,
    point: Point<f64>,
}

impl RTreeObject for CrashPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.x(), self.point.y()])
    }
}

/// Read-only R-tree over all classified crash points of a run.
pub struct CrashIndex {
    points: RTree<CrashPoint>,
}

impl CrashIndex {
    /// Bulk-loads crash locations into an R-tree.
    ///
    /// Crashes with non-finite coordinates cannot be located and are left
    /// out of the index with a warning.
    #[must_use]
    pub fn build(crashes: &[CrashRecord]) -> Self {
        let mut entries = Vec::with_capacity(crashes.len());

        for crash in crashes {
            let (x, y) = (crash.longitude(), crash.latitude());
            if !x.is_finite() || !y.is_finite() {
                log::warn!("Crash {} has no usable location, skipping", crash.id());
                continue;
            }
            entries.push(CrashPoint {
                tier: crash.tier(),
                point: Point::new(x, y),
            });
        }

        let points = RTree::bulk_load(entries);
        log::info!("Loaded {} crash points into spatial index", points.size());

        Self { points }
    }

    /// Number of indexed crash points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.size()
    }

    /// Whether the index holds no crash points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.size() == 0
    }

    /// Counts crashes inside or on the boundary of `polygon`, per tier.
    #[must_use]
    pub fn count_within(&self, polygon: &MultiPolygon<f64>) -> TierCounts {
        let mut counts = TierCounts::default();

        let Some(envelope) = compute_envelope(polygon) else {
            return counts;
        };

        for entry in self.points.locate_in_envelope_intersecting(&envelope) {
            if polygon.intersects(&entry.point) {
                counts.record(entry.tier);
            }
        }

        counts
    }
}

/// A feature paired with the crash counts aggregated onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureAggregate {
    /// The feature the counts belong to.
    pub feature: NetworkFeature,
    /// Crash counts contained by the feature polygon.
    pub counts: TierCounts,
}

/// Aggregates crash counts onto every feature.
///
/// Returns exactly one [`FeatureAggregate`] per input feature, in input
/// order, including features with no contained crashes. Features are
/// evaluated in parallel; one progress unit is reported per feature.
#[must_use]
pub fn aggregate(
    index: &CrashIndex,
    features: Vec<NetworkFeature>,
    progress: &dyn ProgressCallback,
) -> Vec<FeatureAggregate> {
    progress.set_total(features.len() as u64);

    let aggregates: Vec<FeatureAggregate> = features
        .into_par_iter()
        .map(|feature| {
            let counts = index.count_within(&feature.geometry);
            progress.inc(1);
            FeatureAggregate { feature, counts }
        })
        .collect();

    let matched = aggregates.iter().filter(|a| a.counts.total > 0).count();
    log::debug!(
        "Aggregated {} features ({matched} with at least one crash)",
        aggregates.len()
    );

    aggregates
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
///
/// Returns `None` for an empty geometry.
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
