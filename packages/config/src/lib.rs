#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Run configuration for crash safety scoring.
//!
//! A run is described by a TOML file (see `defaults/example.toml`). The
//! file is deserialized into a [`RawConfig`], command-line
//! [`ConfigOverrides`] are layered on top, and [`RunConfig::from_raw`]
//! validates the result. Every weight and threshold is checked before any
//! crash data is read.

use std::path::{Path, PathBuf};

use crash_score_network_models::{
    FeatureKind, InvalidParameterError, SeverityWeights, Thresholds,
};
use serde::Deserialize;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or does not match the schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A weight or threshold is out of range.
    #[error("Configuration error: {0}")]
    InvalidParameter(#[from] InvalidParameterError),

    /// A required input path was not given in the file or on the command line.
    #[error("Configuration error: no input path given for {name}")]
    MissingInput {
        /// Which input is missing.
        name: &'static str,
    },

    /// The crash file delimiter is not a single ASCII character.
    #[error("Configuration error: delimiter must be a single ASCII character, got {value:?}")]
    InvalidDelimiter {
        /// The rejected delimiter.
        value: String,
    },
}

/// Severity weights as written in the config file.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawWeights {
    /// Fatal crash weight.
    pub fatal: f64,
    /// Incapacitating (serious) injury crash weight.
    pub serious: f64,
    /// Non-incapacitating (non-serious) injury crash weight.
    pub non_serious: f64,
    /// Possible injury crash weight.
    pub possible: f64,
}

/// Thresholds as written in the config file.
///
/// Signed so that a negative value is reported as a configuration error
/// rather than a TOML type mismatch.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawThresholds {
    /// Minimum crashes for a high-crash intersection.
    pub intersection: i64,
    /// Minimum crashes for a high-crash segment.
    pub segment: i64,
}

/// Input file locations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPaths {
    /// Delimited crash records file.
    pub crashes: Option<PathBuf>,
    /// `GeoJSON` intersection buffer polygons.
    pub intersections: Option<PathBuf>,
    /// `GeoJSON` segment buffer polygons.
    pub segments: Option<PathBuf>,
}

/// Output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory result files are written to.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Also write a `GeoJSON` file of the high-crash polygons.
    #[serde(default)]
    pub geojson: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            geojson: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/output")
}

/// Column names in the crash records file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrashFieldMapping {
    /// Crash identifier column. Optional in the data; row numbers are used
    /// when it is absent.
    pub id: String,
    /// Longitude column.
    pub longitude: String,
    /// Latitude column.
    pub latitude: String,
    /// Fatality count column.
    pub fatalities: String,
    /// Incapacitating injury count column.
    pub incapacitating: String,
    /// Non-incapacitating injury count column.
    pub non_incapacitating: String,
    /// Possible injury count column.
    pub possible: String,
    /// Field delimiter, a single ASCII character.
    pub delimiter: String,
}

impl Default for CrashFieldMapping {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            longitude: "longitude".to_string(),
            latitude: "latitude".to_string(),
            fatalities: "fatalities_count".to_string(),
            incapacitating: "incapacitating_injuries_count".to_string(),
            non_incapacitating: "non_incapacitating_injuries_count".to_string(),
            possible: "possible_injuries_count".to_string(),
            delimiter: ",".to_string(),
        }
    }
}

impl CrashFieldMapping {
    /// The delimiter as a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDelimiter`] unless the delimiter is
    /// exactly one ASCII character.
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(ConfigError::InvalidDelimiter {
                value: self.delimiter.clone(),
            }),
        }
    }
}

/// Property names on the feature polygons.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFieldMapping {
    /// Feature name property.
    pub name: String,
    /// Segment length property.
    pub length: String,
}

impl Default for FeatureFieldMapping {
    fn default() -> Self {
        Self {
            name: "name".to_string(),
            length: "length".to_string(),
        }
    }
}

/// The config file as written, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Severity weights.
    pub weights: RawWeights,
    /// High-crash thresholds.
    pub thresholds: RawThresholds,
    /// Input file locations.
    #[serde(default)]
    pub inputs: InputPaths,
    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
    /// Crash file column names.
    #[serde(default)]
    pub crash_fields: CrashFieldMapping,
    /// Feature polygon property names.
    #[serde(default)]
    pub feature_fields: FeatureFieldMapping,
}

impl RawConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid config.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Read config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Applies command-line overrides in place.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        let weights = &mut self.weights;
        if let Some(v) = overrides.fatal_weight {
            weights.fatal = v;
        }
        if let Some(v) = overrides.serious_weight {
            weights.serious = v;
        }
        if let Some(v) = overrides.non_serious_weight {
            weights.non_serious = v;
        }
        if let Some(v) = overrides.possible_weight {
            weights.possible = v;
        }
        if let Some(v) = overrides.intersection_threshold {
            self.thresholds.intersection = v;
        }
        if let Some(v) = overrides.segment_threshold {
            self.thresholds.segment = v;
        }
        if let Some(path) = &overrides.crashes {
            self.inputs.crashes = Some(path.clone());
        }
        if let Some(path) = &overrides.intersections {
            self.inputs.intersections = Some(path.clone());
        }
        if let Some(path) = &overrides.segments {
            self.inputs.segments = Some(path.clone());
        }
        if let Some(dir) = &overrides.output_dir {
            self.output.dir.clone_from(dir);
        }
        if overrides.geojson {
            self.output.geojson = true;
        }
    }
}

/// Values supplied on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Fatal crash weight.
    pub fatal_weight: Option<f64>,
    /// Incapacitating injury crash weight.
    pub serious_weight: Option<f64>,
    /// Non-incapacitating injury crash weight.
    pub non_serious_weight: Option<f64>,
    /// Possible injury crash weight.
    pub possible_weight: Option<f64>,
    /// Intersection threshold.
    pub intersection_threshold: Option<i64>,
    /// Segment threshold.
    pub segment_threshold: Option<i64>,
    /// Crash records file.
    pub crashes: Option<PathBuf>,
    /// Intersection polygons file.
    pub intersections: Option<PathBuf>,
    /// Segment polygons file.
    pub segments: Option<PathBuf>,
    /// Output directory.
    pub output_dir: Option<PathBuf>,
    /// Force `GeoJSON` output on.
    pub geojson: bool,
}

/// Resolved input file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInputs {
    /// Crash records file.
    pub crashes: PathBuf,
    /// Intersection polygons file.
    pub intersections: PathBuf,
    /// Segment polygons file.
    pub segments: PathBuf,
}

impl ResolvedInputs {
    /// Polygon file for one feature kind.
    #[must_use]
    pub fn features(&self, kind: FeatureKind) -> &Path {
        match kind {
            FeatureKind::Intersection => &self.intersections,
            FeatureKind::Segment => &self.segments,
        }
    }
}

/// Fully validated run configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Severity weights.
    pub weights: SeverityWeights,
    /// High-crash thresholds.
    pub thresholds: Thresholds,
    /// Input file locations.
    pub inputs: ResolvedInputs,
    /// Output settings.
    pub output: OutputConfig,
    /// Crash file column names.
    pub crash_fields: CrashFieldMapping,
    /// Crash file delimiter byte.
    pub delimiter: u8,
    /// Feature polygon property names.
    pub feature_fields: FeatureFieldMapping,
}

impl RunConfig {
    /// Validates a raw config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid weight, threshold,
    /// delimiter, or missing input path.
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let RawWeights {
            fatal,
            serious,
            non_serious,
            possible,
        } = raw.weights;
        let weights = SeverityWeights::try_new(fatal, serious, non_serious, possible)?;
        let thresholds = Thresholds::try_new(raw.thresholds.intersection, raw.thresholds.segment)?;
        let delimiter = raw.crash_fields.delimiter_byte()?;

        let InputPaths {
            crashes,
            intersections,
            segments,
        } = raw.inputs;
        let inputs = ResolvedInputs {
            crashes: crashes.ok_or(ConfigError::MissingInput { name: "crashes" })?,
            intersections: intersections.ok_or(ConfigError::MissingInput {
                name: "intersections",
            })?,
            segments: segments.ok_or(ConfigError::MissingInput { name: "segments" })?,
        };

        Ok(Self {
            weights,
            thresholds,
            inputs,
            output: raw.output,
            crash_fields: raw.crash_fields,
            delimiter,
            feature_fields: raw.feature_fields,
        })
    }

    /// Loads a config file, applies overrides, and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be loaded or the result
    /// is invalid.
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut raw = RawConfig::load(path)?;
        raw.apply(overrides);
        Self::from_raw(raw)
    }
}
