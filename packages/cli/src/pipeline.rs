//! Scoring pipeline for the `run` and `sweep` commands.
//!
//! Every input is loaded and every feature set scored before any output is
//! written. A schema or scoring error therefore aborts the run without
//! leaving partial result files behind.

use std::error::Error;
use std::path::PathBuf;

use chrono::Local;
use crash_score_cli_utils::{IndicatifProgress, MultiProgress};
use crash_score_config::RunConfig;
use crash_score_io::output::{self, StagedFile};
use crash_score_io::{DataError, LoadReport, Loaded, crashes, features};
use crash_score_network_models::{FeatureKind, NetworkFeature};
use crash_score_scoring::{
    FeatureSetResult, ScoringError, projection, score_feature_set, threshold,
};
use crash_score_spatial::CrashIndex;

/// Per-kind outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSummary {
    pub kind: FeatureKind,
    pub threshold: u64,
    /// Features aggregated and scored.
    pub scored: usize,
    /// Features at or above the threshold.
    pub selected: usize,
    /// Features skipped for unusable geometry.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub crashes: LoadReport,
    pub kinds: Vec<KindSummary>,
    pub written: Vec<PathBuf>,
}

/// Runs the full pipeline and writes one result file per feature kind.
///
/// # Errors
///
/// Returns an error if any input cannot be loaded, any feature cannot be
/// scored, or the results cannot be written.
pub fn run(config: &RunConfig, multi: &MultiProgress) -> Result<RunSummary, Box<dyn Error>> {
    let (index, crash_report) = load_crash_index(config)?;

    let mut loaded = Vec::with_capacity(FeatureKind::all().len());
    for &kind in FeatureKind::all() {
        loaded.push((kind, load_features(config, kind)?));
    }

    let steps = IndicatifProgress::steps_bar(multi, loaded.len() as u64);
    let mut results = Vec::with_capacity(loaded.len());
    let mut kinds = Vec::with_capacity(loaded.len());
    for (kind, Loaded { records, report }) in loaded {
        let threshold = config.thresholds.for_kind(kind);
        let result = score_kind(config, &index, kind, records, threshold, multi)?;
        kinds.push(KindSummary {
            kind,
            threshold,
            scored: result.scored.len(),
            selected: result.high_crash().len(),
            skipped: report.skipped_geometry,
        });
        results.push(result);
        steps.inc(1);
    }

    let written = write_outputs(config, &results)?;
    steps.finish(format!("Wrote {} result files", written.len()));

    Ok(RunSummary {
        crashes: crash_report,
        kinds,
        written,
    })
}

/// Scores one feature kind and counts how many features each threshold
/// would select. Nothing is written.
///
/// # Errors
///
/// Returns an error if an input cannot be loaded or a feature cannot be
/// scored.
pub fn sweep(
    config: &RunConfig,
    kind: FeatureKind,
    thresholds: &[u64],
    multi: &MultiProgress,
) -> Result<Vec<(u64, usize)>, Box<dyn Error>> {
    let (index, _) = load_crash_index(config)?;
    let Loaded { records, .. } = load_features(config, kind)?;
    let result = score_kind(
        config,
        &index,
        kind,
        records,
        config.thresholds.for_kind(kind),
        multi,
    )?;
    Ok(threshold::sweep(&result.scored, thresholds))
}

fn load_crash_index(config: &RunConfig) -> Result<(CrashIndex, LoadReport), DataError> {
    let Loaded { records, report } = crashes::load_crashes(
        &config.inputs.crashes,
        &config.crash_fields,
        config.delimiter,
    )?;
    let index = CrashIndex::build(&records);
    if index.is_empty() {
        log::warn!(
            "No usable crash locations in {}, every feature will score 0",
            config.inputs.crashes.display()
        );
    }
    Ok((index, report))
}

fn load_features(
    config: &RunConfig,
    kind: FeatureKind,
) -> Result<Loaded<NetworkFeature>, DataError> {
    features::load_features(config.inputs.features(kind), kind, &config.feature_fields)
}

fn score_kind(
    config: &RunConfig,
    index: &CrashIndex,
    kind: FeatureKind,
    features: Vec<NetworkFeature>,
    threshold: u64,
    multi: &MultiProgress,
) -> Result<FeatureSetResult, ScoringError> {
    let progress = IndicatifProgress::features_bar(multi, kind);
    score_feature_set(
        index,
        kind,
        features,
        &config.weights,
        threshold,
        progress.as_ref(),
    )
}

fn write_outputs(
    config: &RunConfig,
    results: &[FeatureSetResult],
) -> Result<Vec<PathBuf>, DataError> {
    std::fs::create_dir_all(&config.output.dir)?;
    let stamp = output::run_stamp(&Local::now());

    let mut staged = Vec::new();
    if let Err(e) = stage_results(config, results, &stamp, &mut staged) {
        output::discard(staged);
        return Err(e);
    }
    output::commit(staged)
}

fn stage_results(
    config: &RunConfig,
    results: &[FeatureSetResult],
    stamp: &str,
    staged: &mut Vec<StagedFile>,
) -> Result<(), DataError> {
    let dir = &config.output.dir;

    for result in results {
        let ranked = result.ranked_high_crash();
        let rows = projection::project(&ranked);

        let path = output::output_path(dir, result.kind, stamp, "csv");
        staged.push(output::stage(&path, |w| {
            output::write_csv(w, result.kind, &rows)
        })?);

        if config.output.geojson {
            let path = output::output_path(dir, result.kind, stamp, "geojson");
            staged.push(output::stage(&path, |w| output::write_geojson(w, &ranked))?);
        }
    }

    Ok(())
}
