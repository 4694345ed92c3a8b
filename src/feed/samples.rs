use chrono::NaiveTime;
use geo_types::Coord;
use serde::{Deserialize, Serialize};

use super::RouteID;
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TripID(String);

impl From<&str> for TripID {
    fn from(x: &str) -> Self {
        Self(x.to_string())
    }
}

impl From<String> for TripID {
    fn from(x: String) -> Self {
        Self(x)
    }
}

/// One row of the upstream trip-location query: where one trip's vehicle was
/// at one instant of the simulation date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub time: NaiveTime,
    pub route_id: RouteID,
    pub trip_id: TripID,
    pub pos: Coord<f64>,
}

impl PositionSample {
    /// The upstream query labels rows with `%H:%M:%S` strings; matching
    /// against the time grid is exact, so the label is parsed once here and
    /// compared as a time from then on.
    pub fn new(
        timestamp: &str,
        route_id: RouteID,
        trip_id: TripID,
        lon: f64,
        lat: f64,
    ) -> Result<Self> {
        let time = NaiveTime::parse_from_str(timestamp, "%H:%M:%S").map_err(|_| {
            Error::MalformedRecord(format!("position sample has bad timestamp {timestamp:?}"))
        })?;
        Ok(Self {
            time,
            route_id,
            trip_id,
            pos: Coord { x: lon, y: lat },
        })
    }
}
