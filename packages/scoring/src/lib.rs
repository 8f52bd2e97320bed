#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Safety scoring of aggregated network features.
//!
//! Takes the per-feature crash counts produced by [`crash_score_spatial`],
//! derives the PDO count and EPDO index for each feature ([`index`]),
//! selects high-crash locations against a threshold ([`threshold`]), and
//! projects the selection to the reporting schema ([`projection`]).

pub mod index;
pub mod projection;
pub mod threshold;

use crash_score_network_models::{
    FeatureKind, NetworkFeature, ScoredFeature, SeverityWeights,
};
use crash_score_spatial::progress::ProgressCallback;
use crash_score_spatial::{CrashIndex, FeatureAggregate, aggregate};
use rayon::prelude::*;

/// Errors that can occur while scoring features.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// The EPDO index evaluated to NaN or infinity.
    #[error("EPDO index for feature '{feature_id}' is not a finite number")]
    NonFiniteIndex {
        /// Identifier of the feature being scored.
        feature_id: String,
    },
}

/// Scores every aggregate, preserving input order.
///
/// # Errors
///
/// Returns [`ScoringError`] if any feature's index cannot be computed.
pub fn score_aggregates(
    aggregates: Vec<FeatureAggregate>,
    weights: &SeverityWeights,
) -> Result<Vec<ScoredFeature>, ScoringError> {
    aggregates
        .into_par_iter()
        .map(|FeatureAggregate { feature, counts }| -> Result<_, ScoringError> {
            let score = index::score(&feature.id, &counts, weights)?;
            Ok(ScoredFeature {
                feature,
                counts,
                score,
            })
        })
        .collect()
}

/// All scored features of one kind plus the threshold that applies to it.
#[derive(Debug, Clone)]
pub struct FeatureSetResult {
    /// Which feature set this is.
    pub kind: FeatureKind,
    /// High-crash threshold for this kind.
    pub threshold: u64,
    /// Every feature in the set, in input order.
    pub scored: Vec<ScoredFeature>,
}

impl FeatureSetResult {
    /// Features meeting [`FeatureSetResult::threshold`].
    #[must_use]
    pub fn high_crash(&self) -> Vec<&ScoredFeature> {
        threshold::select_high_crash(&self.scored, self.threshold)
    }

    /// High-crash features, highest EPDO first.
    #[must_use]
    pub fn ranked_high_crash(&self) -> Vec<&ScoredFeature> {
        let mut selected = self.high_crash();
        projection::rank(&mut selected);
        selected
    }
}

/// Aggregates and scores one feature set against the crash index.
///
/// # Errors
///
/// Returns [`ScoringError`] if any feature's index cannot be computed.
pub fn score_feature_set(
    crashes: &CrashIndex,
    kind: FeatureKind,
    features: Vec<NetworkFeature>,
    weights: &SeverityWeights,
    threshold: u64,
    progress: &dyn ProgressCallback,
) -> Result<FeatureSetResult, ScoringError> {
    log::info!("Aggregating {} {} features...", features.len(), kind);
    progress.set_message("aggregating".to_string());

    let aggregates = aggregate(crashes, features, progress);
    let scored = score_aggregates(aggregates, weights)?;

    let result = FeatureSetResult {
        kind,
        threshold,
        scored,
    };
    let selected = result.high_crash().len();

    progress.finish(format!(
        "{selected} of {} at or above {threshold} crashes",
        result.scored.len(),
    ));
    log::info!(
        "Scored {} {kind} features, {selected} meet threshold {threshold}",
        result.scored.len()
    );

    Ok(result)
}
