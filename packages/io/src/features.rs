//! `GeoJSON` network feature reader.
//!
//! Each feature of a `FeatureCollection` becomes one [`NetworkFeature`].
//! The name property is required on every feature and the length property
//! on every segment; a feature lacking either aborts the load. Features
//! whose geometry is missing or not a (multi)polygon are skipped.
//!
//! A feature without an `id` takes its 1-based position in the file. Ids
//! must be unique within a file, including positional ones.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crash_score_config::FeatureFieldMapping;
use crash_score_network_models::{FeatureKind, NetworkFeature};
use geo::MultiPolygon;
use geojson::{Feature, GeoJson, JsonObject, JsonValue, feature::Id};

use crate::{DataError, LoadReport, Loaded};

/// Reads network features of one kind from a `GeoJSON` reader.
///
/// # Errors
///
/// Returns [`DataError::MissingField`] if a feature lacks a required
/// property, [`DataError::InvalidValue`] if a segment length is not
/// numeric, [`DataError::DuplicateId`] if two features share an id,
/// [`DataError::NotFeatureCollection`] if the document is not a
/// `FeatureCollection`, or a parse error.
pub fn read_features<R: Read>(
    mut reader: R,
    source_name: &str,
    kind: FeatureKind,
    fields: &FeatureFieldMapping,
) -> Result<Loaded<NetworkFeature>, DataError> {
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;

    let GeoJson::FeatureCollection(collection) = contents.parse::<GeoJson>()? else {
        return Err(DataError::NotFeatureCollection {
            source_name: source_name.to_string(),
        });
    };

    let mut records = Vec::with_capacity(collection.features.len());
    let mut report = LoadReport::default();
    let mut seen = HashSet::with_capacity(collection.features.len());

    for (i, mut feature) in collection.features.into_iter().enumerate() {
        let position = i + 1;
        let properties = feature.properties.take().unwrap_or_default();

        let name = text_property(&properties, &fields.name).ok_or_else(|| {
            DataError::MissingField {
                source_name: source_name.to_string(),
                field: fields.name.clone(),
            }
        })?;

        let length = if kind.has_length() {
            let value = properties
                .get(&fields.length)
                .ok_or_else(|| DataError::MissingField {
                    source_name: source_name.to_string(),
                    field: fields.length.clone(),
                })?;
            numeric_property(value).map_err(|()| DataError::InvalidValue {
                source_name: source_name.to_string(),
                record: position,
                field: fields.length.clone(),
                value: value.to_string(),
            })?
        } else {
            None
        };

        let id = feature_id(&feature).unwrap_or_else(|| position.to_string());
        if !seen.insert(id.clone()) {
            return Err(DataError::DuplicateId {
                source_name: source_name.to_string(),
                record: position,
                id,
            });
        }

        let Some(geometry) = polygon_geometry(feature) else {
            log::warn!("{source_name}: {kind} {id} ({name}) has no polygon geometry, skipping");
            report.skipped_geometry += 1;
            continue;
        };

        records.push(NetworkFeature {
            id,
            kind,
            name,
            length,
            geometry,
        });
        report.loaded += 1;
    }

    log::info!(
        "{source_name}: loaded {} {kind} features ({} skipped without geometry)",
        report.loaded,
        report.skipped_geometry
    );

    Ok(Loaded { records, report })
}

/// Opens and reads a `GeoJSON` feature file.
///
/// # Errors
///
/// Returns [`DataError`] if the file cannot be opened or read (see
/// [`read_features`]).
pub fn load_features(
    path: &Path,
    kind: FeatureKind,
    fields: &FeatureFieldMapping,
) -> Result<Loaded<NetworkFeature>, DataError> {
    let file = File::open(path)?;
    read_features(
        BufReader::new(file),
        &path.display().to_string(),
        kind,
        fields,
    )
}

/// Reads a property as text. A null value reads as an empty name.
fn text_property(properties: &JsonObject, key: &str) -> Option<String> {
    let value = properties.get(key)?;
    Some(match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.trim().to_string(),
        other => other.to_string(),
    })
}

/// Reads a nullable numeric property. Numeric strings are accepted.
fn numeric_property(value: &JsonValue) -> Result<Option<f64>, ()> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Number(n) => n.as_f64().map(Some).ok_or(()),
        JsonValue::String(s) if s.trim().is_empty() => Ok(None),
        JsonValue::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| ()),
        _ => Err(()),
    }
}

fn feature_id(feature: &Feature) -> Option<String> {
    match feature.id.as_ref()? {
        Id::String(s) => Some(s.clone()),
        Id::Number(n) => Some(n.to_string()),
    }
}

/// Converts a feature's geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn polygon_geometry(feature: Feature) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = feature.geometry?.try_into().ok()?;
    let multi_polygon = match geo_geom {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon(vec![p]),
        _ => return None,
    };
    if multi_polygon.0.iter().all(|p| p.exterior().0.is_empty()) {
        return None;
    }
    Some(multi_polygon)
}
