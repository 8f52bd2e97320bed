#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the `crash_score` binary.
//!
//! Every bar is prefixed with what it tracks: the feature kind for an
//! aggregation pass, `Scoring` for the run as a whole. [`init_logger`]
//! hands `log` output to `indicatif-log-bridge` so log lines are printed
//! above the bars instead of through them.

use std::sync::Arc;
use std::time::Duration;

use crash_score_network_models::FeatureKind;
use crash_score_spatial::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::{MultiProgress, ProgressDrawTarget};

/// Shown while a feature file is still being prepared.
const WAITING_TEMPLATE: &str = "{spinner:.cyan} {prefix:>12.bold} {msg}";

/// One tick per feature polygon aggregated.
const FEATURES_TEMPLATE: &str =
    "  {prefix:>12.bold} {wide_bar:.cyan/dim} {pos}/{len} features {percent}% [{eta}] {msg}";

/// One tick per feature kind scored.
const STEPS_TEMPLATE: &str =
    "  {prefix:>12.bold.green} {wide_bar:.green/dim} {pos}/{len} feature sets [{elapsed}] {msg}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Progress bar for the scoring run, driven through [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied once the number of units is known.
    counting: ProgressStyle,
}

impl IndicatifProgress {
    /// Bar for one feature kind's aggregation pass.
    ///
    /// Spins until [`ProgressCallback::set_total`] reports the number of
    /// features, then counts them.
    #[must_use]
    pub fn features_bar(multi: &MultiProgress, kind: FeatureKind) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(
            ProgressBar::new_spinner()
                .with_style(style(WAITING_TEMPLATE))
                .with_prefix(kind.label())
                .with_message("waiting"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        Arc::new(Self {
            bar,
            counting: style(FEATURES_TEMPLATE),
        })
    }

    /// Bar over the feature kinds of a run.
    #[must_use]
    pub fn steps_bar(multi: &MultiProgress, kinds: u64) -> Arc<dyn ProgressCallback> {
        let counting = style(STEPS_TEMPLATE);
        let bar = multi.add(
            ProgressBar::new(kinds)
                .with_style(counting.clone())
                .with_prefix("Scoring"),
        );

        Arc::new(Self { bar, counting })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.reset();
        self.bar.set_style(self.counting.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs the global logger and returns the [`MultiProgress`] every
/// progress bar of the run must be added to.
///
/// Logs at `info` unless `RUST_LOG` says otherwise.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let logger = builder.build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_err()
    {
        log::debug!("Logger already installed");
    }
    log::set_max_level(level);

    multi
}
