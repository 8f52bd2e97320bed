#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reading crash records and network feature polygons, and writing the
//! scored result tables.
//!
//! Missing columns or properties abort the load with
//! [`DataError::MissingField`]. Records whose geometry is missing or
//! unusable are skipped with a warning and tallied in a [`LoadReport`], so
//! one bad row never prevents scoring the rest of the network.

pub mod crashes;
pub mod features;
pub mod output;

/// Errors that can occur while reading inputs or writing results.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// A required column or property is absent.
    #[error("{source_name}: required field '{field}' is missing")]
    MissingField {
        /// File or stream being read.
        source_name: String,
        /// Name of the missing field.
        field: String,
    },

    /// A field is present but its value cannot be used.
    #[error("{source_name}: record {record}: invalid value {value:?} for '{field}'")]
    InvalidValue {
        /// File or stream being read.
        source_name: String,
        /// 1-based record number.
        record: usize,
        /// Field name.
        field: String,
        /// The rejected value.
        value: String,
    },

    /// Two features of one file resolve to the same id.
    #[error("{source_name}: record {record}: duplicate feature id '{id}'")]
    DuplicateId {
        /// File or stream being read.
        source_name: String,
        /// 1-based record number of the second occurrence.
        record: usize,
        /// The repeated id.
        id: String,
    },

    /// A feature file is valid `GeoJSON` but not a `FeatureCollection`.
    #[error("{source_name}: expected a GeoJSON FeatureCollection")]
    NotFeatureCollection {
        /// File or stream being read.
        source_name: String,
    },

    /// CSV parse or write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// `GeoJSON` parse error.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tally of one load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records kept.
    pub loaded: usize,
    /// Records skipped for missing or unusable geometry.
    pub skipped_geometry: usize,
}

/// Records read from one input together with the load tally.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    /// Records that passed validation.
    pub records: Vec<T>,
    /// Counts of loaded and skipped records.
    pub report: LoadReport,
}
