//! The layer between a static transit feed and an animated map: resolve raw
//! per-route shape/stop features into a deduplicated station and polyline
//! model with a fitted viewport, and bucket timestamped vehicle position
//! samples into one frame per animation tick.
//!
//! Both halves are pure transformations over in-memory collections. Loading
//! the feed and drawing the map belong to the callers on either side.

#[macro_use]
extern crate log;

mod error;
mod feed;
mod frames;
mod geometry;

pub use self::error::{Error, Result};
pub use self::feed::{
    partition, stop_table, LocationType, PositionSample, RouteID, ShapeFeature, Stop, StopFeature,
    StopID, TripID,
};
pub use self::frames::{aggregate, Frame, TimeGrid};
pub use self::geometry::{
    resolve, resolve_features, NetworkGeometry, ResolvedStation, RouteGeometry, Viewport,
    DEFAULT_ROUTE_COLOR,
};
