//! Result table writers.
//!
//! Output files are first written to a `.tmp` sibling ([`stage`]) and
//! only renamed into place once every file of the run has been written
//! ([`commit`]). A failure at either step leaves no result files behind.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use crash_score_network_models::{FeatureKind, ResultRow, ScoredFeature};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, feature::Id};

use crate::DataError;

/// Formats the per-run timestamp used in output file names.
#[must_use]
pub fn run_stamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y%m%d%H%M").to_string()
}

/// Output file path for one feature kind, e.g.
/// `out/Intersection_Scores202401311542.csv`.
#[must_use]
pub fn output_path(dir: &Path, kind: FeatureKind, stamp: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}_Scores{stamp}.{extension}", kind.label()))
}

/// Writes result rows as CSV with the column set for `kind`.
///
/// # Errors
///
/// Returns [`DataError`] if writing fails.
pub fn write_csv<W: Write>(
    writer: W,
    kind: FeatureKind,
    rows: &[ResultRow],
) -> Result<(), DataError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(ResultRow::columns(kind))?;
    for row in rows {
        writer.write_record(row.to_record(kind))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes ranked features as a `GeoJSON` `FeatureCollection` whose
/// properties follow the [`ResultRow`] schema.
///
/// # Errors
///
/// Returns [`DataError`] if serialization or writing fails.
pub fn write_geojson<W: Write>(writer: W, features: &[&ScoredFeature]) -> Result<(), DataError> {
    let features = features
        .iter()
        .map(|scored| {
            let row = ResultRow::from(*scored);
            let properties = match serde_json::to_value(&row)? {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            };
            Ok(Feature {
                bbox: None,
                geometry: Some(Geometry::new((&scored.feature.geometry).into())),
                id: Some(Id::String(row.id)),
                properties,
                foreign_members: None,
            })
        })
        .collect::<Result<Vec<_>, DataError>>()?;

    let collection = GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });

    let mut writer = writer;
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush()?;
    Ok(())
}

/// A fully written output file waiting to be moved into place.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    dest: PathBuf,
}

/// Writes a file to a temporary sibling of `dest`.
///
/// # Errors
///
/// Returns [`DataError`] if the file cannot be created or `write` fails;
/// the temporary file is removed in that case.
pub fn stage<F>(dest: &Path, write: F) -> Result<StagedFile, DataError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), DataError>,
{
    let mut tmp_name = dest.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = File::create(&tmp).map_err(DataError::from).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        Ok(())
    });

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    log::debug!("Staged {}", tmp.display());
    Ok(StagedFile {
        tmp,
        dest: dest.to_path_buf(),
    })
}

/// Moves every staged file into place.
///
/// If a rename fails, files already moved are removed again and the
/// remaining staged files are discarded, so either the whole set appears
/// or none of it does.
///
/// # Errors
///
/// Returns [`DataError::Io`] if a rename fails.
pub fn commit(staged: Vec<StagedFile>) -> Result<Vec<PathBuf>, DataError> {
    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    let mut pending = staged.into_iter();

    while let Some(file) = pending.next() {
        if let Err(e) = std::fs::rename(&file.tmp, &file.dest) {
            log::error!("Failed to move {} into place: {e}", file.dest.display());
            for path in &written {
                if let Err(e) = std::fs::remove_file(path) {
                    log::warn!("Failed to roll back {}: {e}", path.display());
                }
            }
            discard(std::iter::once(file).chain(pending).collect());
            return Err(e.into());
        }
        written.push(file.dest);
    }

    for path in &written {
        log::info!("Wrote {}", path.display());
    }
    Ok(written)
}

/// Removes staged files without moving them into place.
pub fn discard(staged: Vec<StagedFile>) {
    for file in staged {
        if let Err(e) = std::fs::remove_file(&file.tmp) {
            log::warn!("Failed to remove {}: {e}", file.tmp.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crash_score_network_models::{FeatureScore, NetworkFeature, TierCounts};
    use geo::{LineString, MultiPolygon, Polygon};

    fn scored(id: &str, kind: FeatureKind) -> ScoredFeature {
        let exterior = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        ScoredFeature {
            feature: NetworkFeature {
                id: id.to_string(),
                kind,
                name: "Main St".to_string(),
                length: kind.has_length().then_some(1320.0),
                geometry: MultiPolygon(vec![Polygon::new(exterior, vec![])]),
            },
            counts: TierCounts {
                fatal: 1,
                possible: 1,
                total: 3,
                ..TierCounts::default()
            },
            score: FeatureScore {
                pdo_count: 1,
                epdo_index: 4.0,
            },
        }
    }

    #[test]
    fn csv_has_kind_specific_columns() {
        let rows = vec![ResultRow::from(&scored("s1", FeatureKind::Segment))];
        let mut buf = Vec::new();
        write_csv(&mut buf, FeatureKind::Segment, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "id,name,length,total_count,sum_fatalities_count,sum_incapacitating_count,\
             sum_non_incapacitating_count,sum_possible_count,pdo_count,epdo_index"
        );
        assert_eq!(lines.next().unwrap(), "s1,Main St,1320,3,1,0,0,1,1,4");
        assert!(lines.next().is_none());
    }

    #[test]
    fn intersection_csv_omits_length() {
        let rows = vec![ResultRow::from(&scored("i1", FeatureKind::Intersection))];
        let mut buf = Vec::new();
        write_csv(&mut buf, FeatureKind::Intersection, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("id,name,total_count,"));
        assert!(!text.contains("length"));
    }

    #[test]
    fn geojson_carries_geometry_and_row_properties() {
        let s = scored("i1", FeatureKind::Intersection);
        let mut buf = Vec::new();
        write_geojson(&mut buf, &[&s]).unwrap();

        let parsed: GeoJson = String::from_utf8(buf).unwrap().parse().unwrap();
        let GeoJson::FeatureCollection(fc) = parsed else {
            panic!("expected a feature collection");
        };
        assert_eq!(fc.features.len(), 1);
        let feature = &fc.features[0];
        assert!(feature.geometry.is_some());
        let props = feature.properties.as_ref().unwrap();
        assert_eq!(props["total_count"], 3);
        assert_eq!(props["sum_fatalities_count"], 1);
        assert!(!props.contains_key("length"));
    }

    #[test]
    fn output_path_uses_kind_label_and_stamp() {
        let path = output_path(Path::new("out"), FeatureKind::Segment, "202401311542", "csv");
        assert_eq!(path, PathBuf::from("out/Segment_Scores202401311542.csv"));
    }

    #[test]
    fn run_stamp_format() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 1, 31, 15, 42, 7).unwrap();
        assert_eq!(run_stamp(&now), "202401311542");
    }

    #[test]
    fn stage_then_commit_moves_file() {
        let dir = std::env::temp_dir().join(format!("crash_score_stage_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("out.csv");

        let staged = stage(&dest, |w| {
            w.write_all(b"id\n")?;
            Ok(())
        })
        .unwrap();
        assert!(!dest.exists());

        let written = commit(vec![staged]).unwrap();
        assert_eq!(written, vec![dest.clone()]);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "id\n");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_commit_rolls_back_moved_files() {
        let dir =
            std::env::temp_dir().join(format!("crash_score_rollback_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        // a non-empty directory at the second destination makes its rename fail
        let blocked = dir.join("blocked");
        std::fs::create_dir_all(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), b"x").unwrap();

        let first = stage(&dir.join("first.csv"), |w| Ok(w.write_all(b"a\n")?)).unwrap();
        let second = stage(&blocked, |w| Ok(w.write_all(b"b\n")?)).unwrap();
        let third = stage(&dir.join("third.csv"), |w| Ok(w.write_all(b"c\n")?)).unwrap();

        assert!(commit(vec![first, second, third]).is_err());

        let mut left: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["blocked".to_string()]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_stage_leaves_nothing() {
        let dir = std::env::temp_dir().join(format!("crash_score_fail_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("out.csv");

        let result = stage(&dest, |_| {
            Err(DataError::NotFeatureCollection {
                source_name: "x".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
