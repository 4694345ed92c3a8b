use std::collections::{BTreeMap, BTreeSet};

use geo_types::LineString;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};

use crate::feed::{self, LocationType, RouteID, ShapeFeature, Stop, StopFeature, StopID};
use crate::{Error, Result};

/// Used when a route feature carries no `route_color`. Neutral enough to
/// read on light and dark basemaps.
pub const DEFAULT_ROUTE_COLOR: &str = "#666666";

/// A stop promoted to its displayable station: either the stop itself, or
/// the parent station its platforms collapse into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStation {
    pub id: StopID,
    pub lon: f64,
    pub lat: f64,
    pub name: Option<String>,
}

/// Everything the rendering driver needs to draw one route statically.
/// Built once per session; never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    pub route_id: RouteID,
    pub short_name: Option<String>,
    /// Leading-`#` hex string, ready for the plotting layer.
    pub color: String,
    /// One polyline per disjoint path segment, raw (lon, lat).
    pub polylines: Vec<LineString<f64>>,
    /// Keyed by resolved id, so two platforms of one station can't both
    /// appear.
    pub stations: BTreeMap<StopID, ResolvedStation>,
}

/// Geographic bounds covering every resolved station, padded on all sides.
/// The driver hands these to its map projection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl Viewport {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.lon_min && lon <= self.lon_max && lat >= self.lat_min && lat <= self.lat_max
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkGeometry {
    pub routes: BTreeMap<RouteID, RouteGeometry>,
    pub viewport: Viewport,
    /// Requested route ids that never appeared as a line feature. Non-fatal;
    /// the caller decides how loudly to warn.
    pub unresolved: BTreeSet<RouteID>,
}

/// Resolves a raw mixed point/line feature collection into per-route display
/// geometry and one fitted viewport. `all_stops` is the full stop table, not
/// the route-scoped subset: parent stations may only exist there.
pub fn resolve(
    collection: &FeatureCollection,
    all_stops: &BTreeMap<StopID, Stop>,
    selected: &BTreeSet<RouteID>,
    padding: f64,
) -> Result<NetworkGeometry> {
    let (shapes, stops) = feed::partition(collection)?;
    resolve_features(&shapes, &stops, all_stops, selected, padding)
}

/// The typed-input form of [`resolve`], for callers that already partitioned
/// the feed.
pub fn resolve_features(
    shapes: &[ShapeFeature],
    stops: &[StopFeature],
    all_stops: &BTreeMap<StopID, Stop>,
    selected: &BTreeSet<RouteID>,
    padding: f64,
) -> Result<NetworkGeometry> {
    let mut routes: BTreeMap<RouteID, RouteGeometry> = BTreeMap::new();
    for shape in shapes {
        // A filter, not an error.
        if !selected.contains(&shape.route_id) {
            continue;
        }
        let geometry = routes
            .entry(shape.route_id.clone())
            .or_insert_with(|| RouteGeometry {
                route_id: shape.route_id.clone(),
                short_name: None,
                color: DEFAULT_ROUTE_COLOR.to_string(),
                polylines: Vec::new(),
                stations: BTreeMap::new(),
            });
        if geometry.short_name.is_none() {
            geometry.short_name = shape.short_name.clone();
        }
        if let Some(color) = &shape.color {
            geometry.color = normalize_color(color);
        }
        geometry.polylines.extend(shape.paths.iter().cloned());
    }

    for stop_feature in stops {
        // Stops for unselected routes, or for routes with no line feature,
        // contribute nothing.
        if let Some(geometry) = routes.get_mut(&stop_feature.route_id) {
            let station = resolve_station(&stop_feature.stop, all_stops);
            geometry.stations.entry(station.id.clone()).or_insert(station);
        }
    }

    let unresolved: BTreeSet<RouteID> = selected
        .iter()
        .filter(|id| !routes.contains_key(*id))
        .cloned()
        .collect();

    let mut bounds = BoundsBuilder::default();
    for geometry in routes.values() {
        for station in geometry.stations.values() {
            bounds.update(station.lon, station.lat);
        }
    }
    let viewport = bounds
        .into_viewport(padding)
        .ok_or(Error::NoDisplayableGeometry)?;

    Ok(NetworkGeometry {
        routes,
        viewport,
        unresolved,
    })
}

/// A station resolves to itself; a platform resolves to its parent, looked
/// up in the full stop table. A platform whose parent is missing from the
/// table keeps its own coordinates rather than vanishing from the map.
fn resolve_station(stop: &Stop, all_stops: &BTreeMap<StopID, Stop>) -> ResolvedStation {
    if stop.location_type != LocationType::Station {
        if let Some(parent_id) = &stop.parent_station {
            if let Some(parent) = all_stops.get(parent_id) {
                return ResolvedStation {
                    id: parent.stop_id.clone(),
                    lon: parent.lon,
                    lat: parent.lat,
                    name: parent.name.clone(),
                };
            }
            warn!(
                "stop {:?} references parent {:?} missing from the stop table; keeping the stop itself",
                stop.stop_id, parent_id
            );
        }
    }
    ResolvedStation {
        id: stop.stop_id.clone(),
        lon: stop.lon,
        lat: stop.lat,
        name: stop.name.clone(),
    }
}

fn normalize_color(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_ROUTE_COLOR.to_string()
    } else if trimmed.starts_with('#') {
        trimmed.to_string()
    } else {
        format!("#{trimmed}")
    }
}

/// Running min/max over station coordinates, seeded from the first value so
/// a legitimate station at exactly 0.0 never collides with a sentinel.
#[derive(Default)]
struct BoundsBuilder {
    bounds: Option<Viewport>,
}

impl BoundsBuilder {
    fn update(&mut self, lon: f64, lat: f64) {
        match &mut self.bounds {
            Some(b) => {
                b.lon_min = b.lon_min.min(lon);
                b.lon_max = b.lon_max.max(lon);
                b.lat_min = b.lat_min.min(lat);
                b.lat_max = b.lat_max.max(lat);
            }
            None => {
                self.bounds = Some(Viewport {
                    lon_min: lon,
                    lon_max: lon,
                    lat_min: lat,
                    lat_max: lat,
                });
            }
        }
    }

    fn into_viewport(self, padding: f64) -> Option<Viewport> {
        self.bounds.map(|b| Viewport {
            lon_min: b.lon_min - padding,
            lon_max: b.lon_max + padding,
            lat_min: b.lat_min - padding,
            lat_max: b.lat_max + padding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::Coord;

    fn shape(route_id: &str, color: Option<&str>, pts: Vec<(f64, f64)>) -> ShapeFeature {
        ShapeFeature {
            route_id: RouteID::from(route_id),
            short_name: None,
            color: color.map(|x| x.to_string()),
            paths: vec![LineString::new(
                pts.into_iter().map(|(x, y)| Coord { x, y }).collect(),
            )],
        }
    }

    fn stop(id: &str, lon: f64, lat: f64, lt: LocationType, parent: Option<&str>) -> Stop {
        Stop {
            stop_id: StopID::from(id),
            lon,
            lat,
            name: Some(format!("{id} name")),
            location_type: lt,
            parent_station: parent.map(StopID::from),
        }
    }

    fn on_route(route_id: &str, stop: Stop) -> StopFeature {
        StopFeature {
            route_id: RouteID::from(route_id),
            stop,
        }
    }

    fn selected(ids: &[&str]) -> BTreeSet<RouteID> {
        ids.iter().map(|x| RouteID::from(*x)).collect()
    }

    #[test]
    fn platforms_collapse_into_one_station() {
        let shapes = vec![shape("R1", None, vec![(-122.33, 47.60), (-122.34, 47.61)])];
        let parent = stop("WESTLAKE", -122.337, 47.611, LocationType::Station, None);
        let stops = vec![
            on_route(
                "R1",
                stop("PLAT_N", -122.3371, 47.6111, LocationType::Platform, Some("WESTLAKE")),
            ),
            on_route(
                "R1",
                stop("PLAT_S", -122.3369, 47.6109, LocationType::Platform, Some("WESTLAKE")),
            ),
            on_route("R1", parent.clone()),
        ];
        let all_stops = feed::stop_table(vec![parent]);

        let network =
            resolve_features(&shapes, &stops, &all_stops, &selected(&["R1"]), 0.05).unwrap();
        let stations = &network.routes[&RouteID::from("R1")].stations;
        assert_eq!(stations.len(), 1);
        let station = &stations[&StopID::from("WESTLAKE")];
        assert_eq!(station.lon, -122.337);
        assert_eq!(station.name.as_deref(), Some("WESTLAKE name"));
    }

    #[test]
    fn parent_lookup_falls_back_to_full_stop_table() {
        // PARENT1 never appears in the route-scoped records, only in the
        // full table.
        let shapes = vec![shape("R1", None, vec![(-122.33, 47.60), (-122.34, 47.61)])];
        let stops = vec![on_route(
            "R1",
            stop("PLAT", -122.30, 47.58, LocationType::Platform, Some("PARENT1")),
        )];
        let all_stops = feed::stop_table(vec![stop(
            "PARENT1",
            -122.31,
            47.59,
            LocationType::Station,
            None,
        )]);

        let network =
            resolve_features(&shapes, &stops, &all_stops, &selected(&["R1"]), 0.05).unwrap();
        let stations = &network.routes[&RouteID::from("R1")].stations;
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[&StopID::from("PARENT1")].lat, 47.59);
    }

    #[test]
    fn missing_parent_keeps_the_platform() {
        let shapes = vec![shape("R1", None, vec![(0.0, 0.0), (1.0, 1.0)])];
        let stops = vec![on_route(
            "R1",
            stop("PLAT", -122.30, 47.58, LocationType::Platform, Some("GONE")),
        )];
        let network = resolve_features(
            &shapes,
            &stops,
            &BTreeMap::new(),
            &selected(&["R1"]),
            0.05,
        )
        .unwrap();
        let stations = &network.routes[&RouteID::from("R1")].stations;
        assert_eq!(stations.len(), 1);
        assert!(stations.contains_key(&StopID::from("PLAT")));
    }

    #[test]
    fn color_defaults_and_normalizes() {
        let shapes = vec![
            shape("R1", None, vec![(0.0, 0.0), (1.0, 1.0)]),
            shape("R2", Some("28813F"), vec![(2.0, 2.0), (3.0, 3.0)]),
            shape("R3", Some("#007CAD"), vec![(4.0, 4.0), (5.0, 5.0)]),
        ];
        let stops = vec![on_route(
            "R1",
            stop("S1", 0.5, 0.5, LocationType::Unknown, None),
        )];
        let network = resolve_features(
            &shapes,
            &stops,
            &BTreeMap::new(),
            &selected(&["R1", "R2", "R3"]),
            0.05,
        )
        .unwrap();
        assert_eq!(network.routes[&RouteID::from("R1")].color, DEFAULT_ROUTE_COLOR);
        assert_eq!(network.routes[&RouteID::from("R2")].color, "#28813F");
        assert_eq!(network.routes[&RouteID::from("R3")].color, "#007CAD");
    }

    #[test]
    fn unselected_routes_are_skipped_and_missing_ones_reported() {
        let shapes = vec![
            shape("R1", None, vec![(0.0, 0.0), (1.0, 1.0)]),
            shape("OTHER", None, vec![(50.0, 50.0), (51.0, 51.0)]),
        ];
        let stops = vec![
            on_route("R1", stop("S1", 0.5, 0.5, LocationType::Unknown, None)),
            on_route("OTHER", stop("S2", 50.5, 50.5, LocationType::Unknown, None)),
        ];
        let network = resolve_features(
            &shapes,
            &stops,
            &BTreeMap::new(),
            &selected(&["R1", "R9"]),
            0.05,
        )
        .unwrap();
        assert!(!network.routes.contains_key(&RouteID::from("OTHER")));
        assert_eq!(network.unresolved, selected(&["R9"]));
        // The skipped route must not have stretched the viewport either.
        assert!(!network.viewport.contains(50.5, 50.5));
    }

    #[test]
    fn viewport_covers_every_station_with_padding() {
        let shapes = vec![shape("R1", None, vec![(0.0, 0.0), (1.0, 1.0)])];
        let stops = vec![
            on_route("R1", stop("A", -122.33, 47.60, LocationType::Unknown, None)),
            on_route("R1", stop("B", -122.20, 47.75, LocationType::Unknown, None)),
            on_route("R1", stop("C", -122.41, 47.52, LocationType::Unknown, None)),
        ];
        let network = resolve_features(
            &shapes,
            &stops,
            &BTreeMap::new(),
            &selected(&["R1"]),
            0.05,
        )
        .unwrap();
        let vp = network.viewport;
        for station in network.routes[&RouteID::from("R1")].stations.values() {
            assert!(vp.contains(station.lon, station.lat));
        }
        assert_relative_eq!(vp.lon_min, -122.46, epsilon = 1e-9);
        assert_relative_eq!(vp.lon_max, -122.15, epsilon = 1e-9);
        assert_relative_eq!(vp.lat_min, 47.47, epsilon = 1e-9);
        assert_relative_eq!(vp.lat_max, 47.80, epsilon = 1e-9);
    }

    #[test]
    fn single_station_viewport_is_padding_wide() {
        let shapes = vec![shape("R1", None, vec![(0.0, 0.0), (1.0, 1.0)])];
        let stops = vec![on_route(
            "R1",
            stop("ONLY", -122.33, 47.60, LocationType::Unknown, None),
        )];
        let network = resolve_features(
            &shapes,
            &stops,
            &BTreeMap::new(),
            &selected(&["R1"]),
            0.05,
        )
        .unwrap();
        let vp = network.viewport;
        assert_relative_eq!(vp.lon_max - vp.lon_min, 0.1, epsilon = 1e-9);
        assert_relative_eq!(vp.lat_max - vp.lat_min, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn station_at_origin_is_not_a_sentinel() {
        let shapes = vec![shape("R1", None, vec![(0.0, 0.0), (1.0, 1.0)])];
        let stops = vec![on_route(
            "R1",
            stop("NULL_ISLAND", 0.0, 0.0, LocationType::Unknown, None),
        )];
        let network = resolve_features(
            &shapes,
            &stops,
            &BTreeMap::new(),
            &selected(&["R1"]),
            0.05,
        )
        .unwrap();
        let vp = network.viewport;
        assert_relative_eq!(vp.lon_min, -0.05, epsilon = 1e-9);
        assert_relative_eq!(vp.lon_max, 0.05, epsilon = 1e-9);
    }

    #[test]
    fn zero_stations_is_no_displayable_geometry() {
        let shapes = vec![shape("R1", None, vec![(0.0, 0.0), (1.0, 1.0)])];
        assert!(matches!(
            resolve_features(&shapes, &[], &BTreeMap::new(), &selected(&["R1"]), 0.05),
            Err(Error::NoDisplayableGeometry)
        ));
        assert!(matches!(
            resolve_features(&[], &[], &BTreeMap::new(), &BTreeSet::new(), 0.05),
            Err(Error::NoDisplayableGeometry)
        ));
    }

    #[test]
    fn resolving_twice_is_identical() {
        let shapes = vec![
            shape("R1", Some("28813F"), vec![(-122.33, 47.60), (-122.34, 47.61)]),
            shape("R2", None, vec![(-122.20, 47.55), (-122.21, 47.56)]),
        ];
        let stops = vec![
            on_route("R1", stop("A", -122.33, 47.60, LocationType::Unknown, None)),
            on_route("R2", stop("B", -122.20, 47.55, LocationType::Unknown, None)),
        ];
        let ids = selected(&["R1", "R2"]);
        let first = resolve_features(&shapes, &stops, &BTreeMap::new(), &ids, 0.05).unwrap();
        let second = resolve_features(&shapes, &stops, &BTreeMap::new(), &ids, 0.05).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn resolve_accepts_a_raw_feature_collection() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "LineString", "coordinates": [[-122.33, 47.60], [-122.34, 47.61]]},
                    "properties": {"route_id": "R1", "route_color": "28813F", "route_short_name": "1 Line"}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [-122.33, 47.60]},
                    "properties": {"stop_id": "S1", "route_id": "R1", "stop_name": "Westlake", "location_type": "1"}
                }
            ]
        }"#;
        let collection =
            FeatureCollection::try_from(raw.parse::<geojson::GeoJson>().unwrap()).unwrap();
        let network = resolve(&collection, &BTreeMap::new(), &selected(&["R1"]), 0.05).unwrap();
        let geometry = &network.routes[&RouteID::from("R1")];
        assert_eq!(geometry.color, "#28813F");
        assert_eq!(geometry.short_name.as_deref(), Some("1 Line"));
        assert_eq!(geometry.polylines.len(), 1);
        assert_eq!(geometry.stations.len(), 1);
        assert!(network.unresolved.is_empty());
    }

    #[test]
    fn bad_location_type_aborts_resolution() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "LineString", "coordinates": [[-122.33, 47.60], [-122.34, 47.61]]},
                    "properties": {"route_id": "R1"}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [-122.33, 47.60]},
                    "properties": {"stop_id": "S1", "route_id": "R1", "location_type": "9"}
                }
            ]
        }"#;
        let collection =
            FeatureCollection::try_from(raw.parse::<geojson::GeoJson>().unwrap()).unwrap();
        assert!(matches!(
            resolve(&collection, &BTreeMap::new(), &selected(&["R1"]), 0.05),
            Err(Error::InvalidLocationType { .. })
        ));
    }
}
