mod samples;
mod shapes;
mod stops;

use std::collections::BTreeMap;

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Value};

use crate::{Error, Result};

pub use samples::{PositionSample, TripID};
pub use shapes::{RouteID, ShapeFeature};
pub use stops::{LocationType, Stop, StopFeature, StopID};

/// Splits a heterogeneous feed collection into typed line features (route
/// shapes) and point features (stops). Anything else in the collection is a
/// schema violation.
pub fn partition(collection: &FeatureCollection) -> Result<(Vec<ShapeFeature>, Vec<StopFeature>)> {
    let mut shapes = Vec::new();
    let mut stops = Vec::new();
    for feature in &collection.features {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| Error::MalformedRecord(format!("{} has no geometry", describe(feature))))?;
        match &geometry.value {
            Value::Point(_) => stops.push(StopFeature::from_feature(feature)?),
            Value::LineString(_) | Value::MultiLineString(_) => {
                shapes.push(ShapeFeature::from_feature(feature)?)
            }
            other => {
                return Err(Error::MalformedRecord(format!(
                    "{} has geometry kind {}, which the feed never emits",
                    describe(feature),
                    kind_name(other)
                )));
            }
        }
    }
    Ok((shapes, stops))
}

/// Keys a flat list of stop records by id, the shape parent-station lookups
/// need. Input order doesn't matter; duplicate ids keep the last record.
pub fn stop_table(stops: Vec<Stop>) -> BTreeMap<StopID, Stop> {
    stops
        .into_iter()
        .map(|stop| (stop.stop_id.clone(), stop))
        .collect()
}

fn describe(feature: &Feature) -> String {
    match &feature.id {
        Some(Id::String(x)) => format!("feature {x:?}"),
        Some(Id::Number(x)) => format!("feature {x}"),
        None => "unnamed feature".to_string(),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Reads a property as a non-empty string, tolerating feeds that emit ids as
/// JSON numbers. Null, empty, or missing all count as absent.
pub(crate) fn string_prop(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key) {
        Some(serde_json::Value::String(x)) if !x.is_empty() => Some(x.clone()),
        Some(serde_json::Value::Number(x)) => Some(x.to_string()),
        _ => None,
    }
}

pub(crate) fn point_coords(positions: &[f64], context: &str) -> Result<(f64, f64)> {
    if positions.len() < 2 {
        return Err(Error::MalformedRecord(format!(
            "{context} has a position with {} coordinates",
            positions.len()
        )));
    }
    Ok((positions[0], positions[1]))
}
