use geojson::Feature;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{point_coords, string_prop, RouteID};
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopID(String);

impl From<&str> for StopID {
    fn from(x: &str) -> Self {
        Self(x.to_string())
    }
}

impl From<String> for StopID {
    fn from(x: String) -> Self {
        Self(x)
    }
}

/// GTFS-style stop hierarchy. Platforms reference a parent station; a feed
/// that omits the column entirely leaves every stop `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationType {
    Platform,
    Station,
    Unknown,
}

impl LocationType {
    /// Accepts the raw property value: absent/null/empty means `Unknown`,
    /// `0` is a platform, `1` a station. Anything else is a schema violation,
    /// never silently coerced.
    pub(crate) fn parse(stop_id: &StopID, raw: Option<&Value>) -> Result<Self> {
        let invalid = |value: String| Error::InvalidLocationType {
            stop_id: stop_id.clone(),
            value,
        };
        match raw {
            None | Some(Value::Null) => Ok(Self::Unknown),
            Some(Value::String(x)) => match x.trim() {
                "" => Ok(Self::Unknown),
                "0" => Ok(Self::Platform),
                "1" => Ok(Self::Station),
                other => Err(invalid(other.to_string())),
            },
            // Some feeds serialize the code as a number, even a float.
            Some(Value::Number(n)) => match n.as_f64() {
                Some(x) if x == 0.0 => Ok(Self::Platform),
                Some(x) if x == 1.0 => Ok(Self::Station),
                _ => Err(invalid(n.to_string())),
            },
            Some(other) => Err(invalid(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: StopID,
    pub lon: f64,
    pub lat: f64,
    pub name: Option<String>,
    pub location_type: LocationType,
    pub parent_station: Option<StopID>,
}

/// A stop record as it appears inside a route's feature collection, tagged
/// with the route the feed emitted it for.
#[derive(Clone, Debug, PartialEq)]
pub struct StopFeature {
    pub route_id: RouteID,
    pub stop: Stop,
}

impl StopFeature {
    pub(crate) fn from_feature(feature: &Feature) -> Result<Self> {
        let stop_id = StopID::from(
            string_prop(feature, "stop_id")
                .ok_or_else(|| Error::MalformedRecord("point feature missing stop_id".to_string()))?,
        );
        let route_id = RouteID::from(string_prop(feature, "route_id").ok_or_else(|| {
            Error::MalformedRecord(format!("point feature {stop_id:?} missing route_id"))
        })?);

        let (lon, lat) = match &feature.geometry {
            Some(g) => match &g.value {
                geojson::Value::Point(pos) => point_coords(pos, "point feature")?,
                _ => {
                    return Err(Error::MalformedRecord(format!(
                        "stop {stop_id:?} is not a point feature"
                    )))
                }
            },
            None => {
                return Err(Error::MalformedRecord(format!(
                    "stop {stop_id:?} has no geometry"
                )))
            }
        };

        Ok(Self {
            route_id,
            stop: Stop {
                location_type: LocationType::parse(&stop_id, feature.property("location_type"))?,
                parent_station: string_prop(feature, "parent_station").map(StopID::from),
                name: string_prop(feature, "stop_name"),
                stop_id,
                lon,
                lat,
            },
        })
    }
}
