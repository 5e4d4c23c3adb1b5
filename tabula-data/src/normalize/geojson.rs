//! GeoJSON `FeatureCollection` flattening.
//!
//! Each feature becomes one row. Computed columns come first, then the
//! feature's properties, then geometry statistics. The verbatim geometry is
//! kept in the hidden `_geometry` column so downstream consumers can render
//! it without it cluttering the visible schema.

use std::io::Read;

use serde_json::{Map, Value as Json};
use tabula_core::{FileFormat, TableBuilder, Value};

use super::error::json_type_name;
use super::json::decode_document;
use super::{NormalizeError, NormalizeOptions, Normalized};

/// Hidden column holding the verbatim geometry.
pub const GEOMETRY_COLUMN: &str = "_geometry";

/// Hidden column holding the zero-based feature index.
pub const FEATURE_INDEX_COLUMN: &str = "_feature_index";

/// Deepest coordinate nesting accepted.
pub const MAX_COORDINATE_DEPTH: usize = 64;

/// Flatten a GeoJSON document read from `reader`.
///
/// # Errors
///
/// Returns [`NormalizeError::InvalidGeoJson`] when the document is not a
/// well-formed `FeatureCollection`.
pub fn read_geojson<R: Read>(
    reader: R,
    options: &NormalizeOptions,
) -> Result<Normalized, NormalizeError> {
    let Some(document) = decode_document(reader, FileFormat::GeoJson)? else {
        return Ok(Normalized::empty());
    };
    let features = collection_features(document)?;
    let total = features.len();

    let mut builder = TableBuilder::new();
    let mut processed = 0;
    for (index, feature) in features.into_iter().enumerate() {
        if !options.cap.admits(processed) {
            break;
        }
        builder.push_record(flatten_feature(index, feature)?);
        processed += 1;
    }

    Ok(Normalized {
        table: builder.finish(),
        truncated: processed < total,
        dropped_rows: 0,
        geo_fields: vec![GEOMETRY_COLUMN.to_owned()],
    })
}

fn collection_features(document: Json) -> Result<Vec<Json>, NormalizeError> {
    let Json::Object(mut collection) = document else {
        return Err(NormalizeError::geojson(format!(
            "expected a FeatureCollection object, found {}",
            json_type_name(&document)
        )));
    };
    if collection.get("type").and_then(Json::as_str) != Some("FeatureCollection") {
        return Err(NormalizeError::geojson("expected FeatureCollection"));
    }
    match collection.remove("features") {
        None | Some(Json::Null) => Ok(Vec::new()),
        Some(Json::Array(features)) => Ok(features),
        Some(other) => Err(NormalizeError::geojson(format!(
            "features must be an array, found {}",
            json_type_name(&other)
        ))),
    }
}

fn flatten_feature(index: usize, feature: Json) -> Result<Vec<(String, Value)>, NormalizeError> {
    let Json::Object(mut feature) = feature else {
        return Err(NormalizeError::geojson(format!(
            "feature {index} is not an object"
        )));
    };
    let properties = object_member(&mut feature, "properties", index)?;
    let geometry = object_member(&mut feature, "geometry", index)?;
    let geometry_type = geometry
        .as_ref()
        .and_then(|geometry| geometry.get("type"))
        .and_then(Json::as_str)
        .map(str::to_owned);
    let coordinate_count = match geometry.as_ref().and_then(|geometry| geometry.get("coordinates")) {
        Some(coordinates) => count_coordinates(coordinates)?,
        None => 0,
    };
    let interior_rings = geometry.as_ref().is_some_and(has_interior_rings);

    let ordinal = index + 1;
    let mut record = vec![
        ("feature_id".to_owned(), Value::Int(to_i64(ordinal))),
        ("name".to_owned(), display_name(properties.as_ref(), ordinal)),
        (
            "geometry_type".to_owned(),
            Value::from(geometry_type.clone().unwrap_or_else(|| "Unknown".to_owned())),
        ),
        (
            "area_type".to_owned(),
            Value::from(area_type(geometry_type.as_deref())),
        ),
    ];
    if let Some(properties) = properties {
        record.extend(
            properties
                .into_iter()
                .map(|(key, value)| (key, Value::from_json(value))),
        );
    }
    record.push((
        "coordinate_count".to_owned(),
        Value::Int(to_i64(coordinate_count)),
    ));
    record.push(("has_interior_rings".to_owned(), Value::Bool(interior_rings)));
    record.push((
        GEOMETRY_COLUMN.to_owned(),
        geometry.map_or(Value::Null, |geometry| Value::Json(Json::Object(geometry).to_string())),
    ));
    record.push((FEATURE_INDEX_COLUMN.to_owned(), Value::Int(to_i64(index))));
    Ok(record)
}

/// A nested object member; `null` and absent members are both `None`.
fn object_member(
    feature: &mut Map<String, Json>,
    key: &str,
    index: usize,
) -> Result<Option<Map<String, Json>>, NormalizeError> {
    match feature.remove(key) {
        None | Some(Json::Null) => Ok(None),
        Some(Json::Object(member)) => Ok(Some(member)),
        Some(other) => Err(NormalizeError::geojson(format!(
            "feature {index} {key} must be an object, found {}",
            json_type_name(&other)
        ))),
    }
}

fn display_name(properties: Option<&Map<String, Json>>, ordinal: usize) -> Value {
    properties
        .into_iter()
        .flat_map(|properties| [properties.get("name"), properties.get("NAME")])
        .flatten()
        .find(|candidate| is_truthy(candidate))
        .map_or_else(
            || Value::Text(format!("Feature {ordinal}")),
            |name| Value::from_json(name.clone()),
        )
}

fn is_truthy(value: &Json) -> bool {
    match value {
        Json::Null => false,
        Json::Bool(flag) => *flag,
        Json::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Json::String(text) => !text.is_empty(),
        Json::Array(items) => !items.is_empty(),
        Json::Object(fields) => !fields.is_empty(),
    }
}

/// Business category for a geometry type.
#[must_use]
pub fn area_type(geometry_type: Option<&str>) -> &'static str {
    match geometry_type {
        Some("Point") => "Location",
        Some("LineString" | "MultiLineString") => "Route/Boundary",
        Some("Polygon" | "MultiPolygon") => "Area/Region",
        _ => "Geographic Feature",
    }
}

/// Count coordinate positions in a nested coordinate array.
///
/// A list of exactly two numbers is one position; other lists are summed
/// over their elements; non-lists count zero.
///
/// # Errors
///
/// Returns [`NormalizeError::InvalidGeoJson`] when nesting exceeds
/// [`MAX_COORDINATE_DEPTH`].
pub fn count_coordinates(coordinates: &Json) -> Result<usize, NormalizeError> {
    let mut count = 0;
    let mut pending = vec![(coordinates, 1_usize)];
    while let Some((node, depth)) = pending.pop() {
        let Json::Array(items) = node else {
            continue;
        };
        if depth > MAX_COORDINATE_DEPTH {
            return Err(NormalizeError::geojson(format!(
                "coordinates nest deeper than {MAX_COORDINATE_DEPTH} levels"
            )));
        }
        if items.len() == 2 && items.iter().all(Json::is_number) {
            count += 1;
            continue;
        }
        pending.extend(items.iter().map(|item| (item, depth + 1)));
    }
    Ok(count)
}

fn has_interior_rings(geometry: &Map<String, Json>) -> bool {
    geometry.get("type").and_then(Json::as_str) == Some("Polygon")
        && geometry
            .get("coordinates")
            .and_then(Json::as_array)
            .is_some_and(|rings| rings.len() > 1)
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use tabula_core::RowCap;

    fn read(document: &Json, options: &NormalizeOptions) -> Result<Normalized, NormalizeError> {
        read_geojson(document.to_string().as_bytes(), options)
    }

    fn point(name: Json) -> Json {
        json!({
            "type": "Feature",
            "properties": {"name": name, "pop": 10},
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}
        })
    }

    #[rstest]
    fn flattens_features_in_column_order() {
        let document = json!({
            "type": "FeatureCollection",
            "features": [point(json!("Alpha"))]
        });
        let normalized = read(&document, &NormalizeOptions::default()).expect("valid");
        let names: Vec<_> = normalized
            .table
            .columns()
            .iter()
            .map(|column| column.name.as_str())
            .collect();

        assert_eq!(
            names,
            [
                "feature_id",
                "name",
                "geometry_type",
                "area_type",
                "pop",
                "coordinate_count",
                "has_interior_rings",
                "_geometry",
                "_feature_index",
            ]
        );
        let table = &normalized.table;
        assert_eq!(table.value(0, "feature_id"), Some(&Value::Int(1)));
        assert_eq!(table.value(0, "name"), Some(&Value::from("Alpha")));
        assert_eq!(table.value(0, "area_type"), Some(&Value::from("Location")));
        assert_eq!(table.value(0, "coordinate_count"), Some(&Value::Int(1)));
        assert_eq!(table.value(0, "_feature_index"), Some(&Value::Int(0)));
        assert_eq!(normalized.geo_fields, [GEOMETRY_COLUMN]);
    }

    #[rstest]
    fn unnamed_features_fall_back_to_ordinal() {
        let unnamed = json!({"type": "Feature", "properties": {"NAME": ""}, "geometry": null});
        let document = json!({
            "type": "FeatureCollection",
            "features": [point(json!("a")), unnamed]
        });
        let normalized = read(&document, &NormalizeOptions::default()).expect("valid");
        assert_eq!(normalized.table.value(1, "name"), Some(&Value::from("Feature 2")));
    }

    #[rstest]
    fn properties_override_computed_columns_in_place() {
        let document = json!({
            "type": "FeatureCollection",
            "features": [point(json!(null))]
        });
        let normalized = read(&document, &NormalizeOptions::default()).expect("valid");
        assert_eq!(normalized.table.columns()[1].name, "name");
        assert_eq!(normalized.table.value(0, "name"), Some(&Value::Null));
    }

    #[rstest]
    fn upper_case_name_property_is_used() {
        let document = json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "properties": {"NAME": "Upper"}, "geometry": null}]
        });
        let normalized = read(&document, &NormalizeOptions::default()).expect("valid");
        let table = &normalized.table;
        assert_eq!(table.value(0, "name"), Some(&Value::from("Upper")));
        assert_eq!(table.value(0, "geometry_type"), Some(&Value::from("Unknown")));
        assert_eq!(
            table.value(0, "area_type"),
            Some(&Value::from("Geographic Feature"))
        );
        assert_eq!(table.value(0, GEOMETRY_COLUMN), Some(&Value::Null));
    }

    #[rstest]
    fn polygon_with_hole_reports_interior_rings() {
        let outer = json!([[0, 0], [4, 0], [4, 4], [0, 0]]);
        let hole = json!([[1, 1], [2, 1], [2, 2], [1, 1]]);
        let document = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "Polygon", "coordinates": [outer, hole]}
            }]
        });
        let normalized = read(&document, &NormalizeOptions::default()).expect("valid");
        let table = &normalized.table;
        assert_eq!(table.value(0, "coordinate_count"), Some(&Value::Int(8)));
        assert_eq!(table.value(0, "has_interior_rings"), Some(&Value::Bool(true)));
        assert_eq!(table.value(0, "area_type"), Some(&Value::from("Area/Region")));
    }

    #[rstest]
    fn stops_after_cap() {
        let features: Vec<_> = (0..5).map(|i| point(json!(format!("p{i}")))).collect();
        let document = json!({"type": "FeatureCollection", "features": features});
        let normalized = read(&document, &NormalizeOptions::new(RowCap::Limited(3))).expect("valid");

        assert_eq!(normalized.table.row_count(), 3);
        assert!(normalized.truncated);
    }

    #[rstest]
    #[case(json!({"type": "Feature"}))]
    #[case(json!([1, 2]))]
    #[case(json!({"type": "FeatureCollection", "features": {}}))]
    #[case(json!({"type": "FeatureCollection", "features": [42]}))]
    #[case(json!({"type": "FeatureCollection", "features": [{"properties": []}]}))]
    fn rejects_invalid_collections(#[case] document: Json) {
        let err = read(&document, &NormalizeOptions::default()).expect_err("invalid GeoJSON");
        assert!(matches!(err, NormalizeError::InvalidGeoJson { .. }));
    }

    #[rstest]
    fn missing_features_yield_empty_table() {
        let document = json!({"type": "FeatureCollection"});
        let normalized = read(&document, &NormalizeOptions::default()).expect("valid");
        assert_eq!(normalized.table.row_count(), 0);
        assert!(!normalized.truncated);
    }

    #[rstest]
    fn deep_nesting_is_rejected() {
        let mut coordinates = json!([1.0, 2.0]);
        for _ in 0..MAX_COORDINATE_DEPTH {
            coordinates = Json::Array(vec![coordinates]);
        }
        let err = count_coordinates(&coordinates).expect_err("too deep");
        assert!(matches!(err, NormalizeError::InvalidGeoJson { .. }));
    }

    #[rstest]
    fn deeply_nested_document_is_rejected_before_decoding() {
        let depth = 200_000;
        let coordinates = format!("{}1,2{}", "[".repeat(depth), "]".repeat(depth));
        let document = format!(
            r#"{{"type": "FeatureCollection", "features": [{{"type": "Feature", "geometry": {{"type": "Polygon", "coordinates": {coordinates}}}}}]}}"#
        );
        let err = read_geojson(document.as_bytes(), &NormalizeOptions::default())
            .expect_err("nesting is bounded");
        assert!(matches!(err, NormalizeError::InvalidGeoJson { ref reason } if reason.contains("nesting")));
    }

    #[rstest]
    #[case(json!([1.0, 2.0]), 1)]
    #[case(json!([[1, 2], [3, 4], [5, 6]]), 3)]
    #[case(json!([1.0, 2.0, 3.0]), 0)]
    #[case(json!("not coordinates"), 0)]
    fn counts_positions(#[case] coordinates: Json, #[case] expected: usize) {
        assert_eq!(count_coordinates(&coordinates).expect("shallow"), expected);
    }
}
