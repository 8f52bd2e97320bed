//! Delimited crash record reader.
//!
//! Reads a header row followed by one crash per line. Column names come
//! from a [`CrashFieldMapping`] and are matched case-insensitively, since
//! crash exports are inconsistent about header casing. Empty, `NULL` and
//! missing trailing count cells are read as 0.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crash_score_config::CrashFieldMapping;
use crash_score_crash_models::{CrashRecord, InjuryCounts};

use crate::{DataError, LoadReport, Loaded};

/// Column positions resolved from the header row.
struct Columns {
    id: Option<usize>,
    longitude: usize,
    latitude: usize,
    fatalities: usize,
    incapacitating: usize,
    non_incapacitating: usize,
    possible: usize,
}

impl Columns {
    fn resolve(
        headers: &csv::StringRecord,
        fields: &CrashFieldMapping,
        source_name: &str,
    ) -> Result<Self, DataError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| DataError::MissingField {
                source_name: source_name.to_string(),
                field: name.to_string(),
            })
        };

        Ok(Self {
            id: find(&fields.id),
            longitude: require(&fields.longitude)?,
            latitude: require(&fields.latitude)?,
            fatalities: require(&fields.fatalities)?,
            incapacitating: require(&fields.incapacitating)?,
            non_incapacitating: require(&fields.non_incapacitating)?,
            possible: require(&fields.possible)?,
        })
    }
}

/// Reads crash records from any reader.
///
/// Rows with a missing, unparseable, or non-finite coordinate are skipped
/// and counted in [`LoadReport::skipped_geometry`].
///
/// # Errors
///
/// Returns [`DataError::MissingField`] if a required column is absent,
/// [`DataError::InvalidValue`] if a count cell is not a non-negative
/// integer, or [`DataError::Csv`] if the file is malformed.
pub fn read_crashes<R: Read>(
    reader: R,
    source_name: &str,
    fields: &CrashFieldMapping,
    delimiter: u8,
) -> Result<Loaded<CrashRecord>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::resolve(reader.headers()?, fields, source_name)?;

    let mut records = Vec::new();
    let mut report = LoadReport::default();

    for (i, row) in reader.records().enumerate() {
        let row = row?;
        let record_number = i + 1;
        let cell = |idx: usize| row.get(idx).unwrap_or("");

        let id = columns
            .id
            .map(cell)
            .filter(|s| !s.is_empty())
            .map_or_else(|| record_number.to_string(), str::to_string);

        let (Some(longitude), Some(latitude)) = (
            parse_coordinate(cell(columns.longitude)),
            parse_coordinate(cell(columns.latitude)),
        ) else {
            log::warn!("{source_name}: crash {id} has no usable location, skipping");
            report.skipped_geometry += 1;
            continue;
        };

        let count = |idx: usize, field: &str| {
            parse_count(cell(idx)).ok_or_else(|| DataError::InvalidValue {
                source_name: source_name.to_string(),
                record: record_number,
                field: field.to_string(),
                value: cell(idx).to_string(),
            })
        };

        let counts = InjuryCounts::from_nullable(
            count(columns.fatalities, &fields.fatalities)?,
            count(columns.incapacitating, &fields.incapacitating)?,
            count(columns.non_incapacitating, &fields.non_incapacitating)?,
            count(columns.possible, &fields.possible)?,
        );

        records.push(CrashRecord::new(id, longitude, latitude, counts));
        report.loaded += 1;
    }

    log::info!(
        "{source_name}: loaded {} crashes ({} skipped without location)",
        report.loaded,
        report.skipped_geometry
    );

    Ok(Loaded { records, report })
}

/// Opens and reads a crash records file.
///
/// # Errors
///
/// Returns [`DataError`] if the file cannot be opened or read (see
/// [`read_crashes`]).
pub fn load_crashes(
    path: &Path,
    fields: &CrashFieldMapping,
    delimiter: u8,
) -> Result<Loaded<CrashRecord>, DataError> {
    let file = File::open(path)?;
    read_crashes(
        BufReader::new(file),
        &path.display().to_string(),
        fields,
        delimiter,
    )
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a nullable count cell.
///
/// Returns `Some(None)` for an empty or null cell, `Some(Some(n))` for a
/// non-negative integer (including integral decimals such as `2.0`), and
/// `None` for anything else.
#[allow(
    clippy::option_option,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn parse_count(raw: &str) -> Option<Option<u32>> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Some(None);
    }
    if let Ok(n) = raw.parse::<u32>() {
        return Some(Some(n));
    }
    let value = raw.parse::<f64>().ok()?;
    if value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value) {
        return Some(Some(value as u32));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crash_score_crash_models::SeverityTier;

    fn read(text: &str) -> Result<Loaded<CrashRecord>, DataError> {
        read_crashes(text.as_bytes(), "test.csv", &CrashFieldMapping::default(), b',')
    }

    const HEADER: &str = "id,longitude,latitude,fatalities_count,incapacitating_injuries_count,\
                          non_incapacitating_injuries_count,possible_injuries_count";

    #[test]
    fn reads_and_classifies_rows() {
        let text = format!(
            "{HEADER}\nA,-83.5,41.6,1,0,0,0\nB,-83.4,41.7,0,0,0,2\nC,-83.3,41.8,0,0,0,0\n"
        );
        let loaded = read(&text).unwrap();

        assert_eq!(loaded.report.loaded, 3);
        let tiers: Vec<SeverityTier> = loaded.records.iter().map(CrashRecord::tier).collect();
        assert_eq!(
            tiers,
            vec![SeverityTier::Fatal, SeverityTier::Possible, SeverityTier::Pdo]
        );
        assert_eq!(loaded.records[1].id(), "B");
        assert!((loaded.records[0].longitude() + 83.5).abs() < 1e-9);
    }

    #[test]
    fn empty_and_null_counts_are_zero() {
        let text = format!("{HEADER}\nA,-83.5,41.6,,NULL,,\n");
        let loaded = read(&text).unwrap();
        assert_eq!(loaded.records[0].counts(), &InjuryCounts::default());
        assert_eq!(loaded.records[0].tier(), SeverityTier::Pdo);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let text = "id,longitude,latitude,fatalities_count\nA,1,2,0\n";
        let err = read(text).unwrap_err();
        match err {
            DataError::MissingField { field, .. } => {
                assert_eq!(field, "incapacitating_injuries_count");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rows_without_location_are_skipped() {
        let text =
            format!("{HEADER}\nA,,41.6,0,0,0,0\nB,abc,41.6,0,0,0,0\nC,-83.5,41.6,0,0,0,0\n");
        let loaded = read(&text).unwrap();
        assert_eq!(loaded.report.loaded, 1);
        assert_eq!(loaded.report.skipped_geometry, 2);
        assert_eq!(loaded.records[0].id(), "C");
    }

    #[test]
    fn negative_count_is_rejected() {
        let text = format!("{HEADER}\nA,-83.5,41.6,-1,0,0,0\n");
        let err = read(&text).unwrap_err();
        assert!(
            matches!(
                err,
                DataError::InvalidValue { record: 1, ref field, .. } if field == "fatalities_count"
            ),
            "{err}"
        );
    }

    #[test]
    fn id_column_is_optional() {
        let text = "longitude,latitude,fatalities_count,incapacitating_injuries_count,\
                    non_incapacitating_injuries_count,possible_injuries_count\n\
                    -83.5,41.6,0,1,0,0\n-83.4,41.6,0,0,0,0\n";
        let loaded = read(text).unwrap();
        let ids: Vec<&str> = loaded.records.iter().map(CrashRecord::id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn mapped_tab_delimited_columns() {
        let fields = CrashFieldMapping {
            longitude: "ODOT_LONGITUDE_NBR".to_string(),
            latitude: "ODOT_LATITUDE_NBR".to_string(),
            fatalities: "FATALITIES_NBR".to_string(),
            incapacitating: "INCAPAC_INJURIES_NBR".to_string(),
            non_incapacitating: "NON_INCAPAC_INJURIES_NBR".to_string(),
            possible: "POSSIBLE_INJURIES_NBR".to_string(),
            ..CrashFieldMapping::default()
        };
        let text = "odot_longitude_nbr\tODOT_LATITUDE_NBR\tFatalities_NBR\tINCAPAC_INJURIES_NBR\t\
                    NON_INCAPAC_INJURIES_NBR\tPOSSIBLE_INJURIES_NBR\n-83.5\t41.6\t0\t0\t2.0\t1\n";
        let loaded = read_crashes(text.as_bytes(), "gcat.txt", &fields, b'\t').unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].tier(), SeverityTier::NonIncapacitating);
        assert_eq!(loaded.records[0].counts().non_incapacitating, 2);
    }

    #[test]
    fn short_rows_read_missing_cells_as_empty() {
        let text = format!("{HEADER}\nA,-83.5,41.6,0,1\nB,-83.4\nC,-83.3,41.8,1,0,0,0\n");
        let loaded = read(&text).unwrap();

        assert_eq!(loaded.report.loaded, 2);
        assert_eq!(loaded.report.skipped_geometry, 1, "B has no latitude");
        assert_eq!(loaded.records[0].id(), "A");
        assert_eq!(loaded.records[0].counts().incapacitating, 1);
        assert_eq!(loaded.records[0].counts().non_incapacitating, 0);
        assert_eq!(loaded.records[0].tier(), SeverityTier::Incapacitating);
        assert_eq!(loaded.records[1].tier(), SeverityTier::Fatal);
    }

    #[test]
    fn count_parsing() {
        assert_eq!(parse_count("3"), Some(Some(3)));
        assert_eq!(parse_count("3.0"), Some(Some(3)));
        assert_eq!(parse_count(""), Some(None));
        assert_eq!(parse_count("null"), Some(None));
        assert_eq!(parse_count("2.5"), None);
        assert_eq!(parse_count("x"), None);
    }
}
