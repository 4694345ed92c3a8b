use geo_types::{Coord, LineString};
use geojson::Feature;
use serde::{Deserialize, Serialize};

use super::{point_coords, string_prop};
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteID(String);

impl From<&str> for RouteID {
    fn from(x: &str) -> Self {
        Self(x.to_string())
    }
}

impl From<String> for RouteID {
    fn from(x: String) -> Self {
        Self(x)
    }
}

/// A route shape as the feed emits it: one line feature per route, possibly
/// made of several disjoint paths. Coordinates stay raw (lon, lat); any map
/// projection belongs to the rendering driver.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeFeature {
    pub route_id: RouteID,
    pub short_name: Option<String>,
    /// Raw `route_color` value, when present. Normalization and the default
    /// happen during geometry resolution.
    pub color: Option<String>,
    pub paths: Vec<LineString<f64>>,
}

impl ShapeFeature {
    pub(crate) fn from_feature(feature: &Feature) -> Result<Self> {
        let route_id = RouteID::from(
            string_prop(feature, "route_id")
                .ok_or_else(|| Error::MalformedRecord("line feature missing route_id".to_string()))?,
        );

        let paths = match &feature.geometry {
            Some(g) => match &g.value {
                geojson::Value::LineString(path) => vec![to_line_string(path, &route_id)?],
                geojson::Value::MultiLineString(paths) => paths
                    .iter()
                    .map(|path| to_line_string(path, &route_id))
                    .collect::<Result<Vec<_>>>()?,
                _ => {
                    return Err(Error::MalformedRecord(format!(
                        "route {route_id:?} is not a line feature"
                    )))
                }
            },
            None => {
                return Err(Error::MalformedRecord(format!(
                    "route {route_id:?} has no geometry"
                )))
            }
        };

        Ok(Self {
            route_id,
            short_name: string_prop(feature, "route_short_name"),
            color: string_prop(feature, "route_color"),
            paths,
        })
    }
}

fn to_line_string(path: &[Vec<f64>], route_id: &RouteID) -> Result<LineString<f64>> {
    let mut pts = Vec::with_capacity(path.len());
    for position in path {
        let (lon, lat) = point_coords(position, &format!("route {route_id:?}"))?;
        pts.push(Coord { x: lon, y: lat });
    }
    Ok(LineString::new(pts))
}
