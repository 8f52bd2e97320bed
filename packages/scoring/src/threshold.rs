//! High-crash location selection.
//!
//! Selection borrows from the scored set and never mutates it, so the same
//! scored features can be filtered repeatedly with different thresholds.

use crash_score_network_models::ScoredFeature;

/// Returns the features whose total crash count is at least `threshold`.
///
/// Input order is preserved.
#[must_use]
pub fn select_high_crash(scored: &[ScoredFeature], threshold: u64) -> Vec<&ScoredFeature> {
    scored
        .iter()
        .filter(|s| s.counts.total >= threshold)
        .collect()
}

/// Number of features each threshold would select.
///
/// Returns `(threshold, selected)` pairs in the order given.
#[must_use]
pub fn sweep(scored: &[ScoredFeature], thresholds: &[u64]) -> Vec<(u64, usize)> {
    thresholds
        .iter()
        .map(|&threshold| (threshold, select_high_crash(scored, threshold).len()))
        .collect()
}
