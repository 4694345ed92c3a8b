use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate, NaiveTime};
use geo_types::Coord;
use serde::{Deserialize, Serialize};

use crate::feed::{PositionSample, RouteID};
use crate::{Error, Result};

/// The evenly spaced instants of one animation, all on a single simulation
/// date. Fully determined by (date, start, end, stride).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    pub date: NaiveDate,
    times: Vec<NaiveTime>,
}

impl TimeGrid {
    /// `start, start+stride, ...` up to and including `end` when it lands on
    /// the stride.
    pub fn new(
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        stride: Duration,
    ) -> Result<Self> {
        if stride <= Duration::zero() {
            return Err(Error::InvalidTimeGrid {
                reason: format!("stride must be positive, got {stride}"),
            });
        }
        if end < start {
            return Err(Error::InvalidTimeGrid {
                reason: format!("end {end} is before start {start}"),
            });
        }
        let mut times = Vec::new();
        let mut t = start;
        loop {
            times.push(t);
            let next = t + stride;
            // NaiveTime addition wraps at midnight; a wrapped value would
            // loop forever.
            if next <= t || next > end {
                break;
            }
            t = next;
        }
        Ok(Self { date, times })
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The `%H:%M:%S` labels the upstream trip-location query expects.
    pub fn timestamp_strings(&self) -> Vec<String> {
        self.times
            .iter()
            .map(|t| t.format("%H:%M:%S").to_string())
            .collect()
    }

    /// The feed API's `YYYYMMDD` date key.
    pub fn compact_date(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }
}

/// One animation tick: every active vehicle's (lon, lat), grouped by route.
/// A route with no active vehicle is absent from the map, never present with
/// an empty list; a driver holding a persistent per-route plot handle must
/// clear it when its key is missing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub time: NaiveTime,
    pub positions: BTreeMap<RouteID, Vec<Coord<f64>>>,
}

impl Frame {
    /// Total active vehicles this tick, for the driver's per-frame counter.
    pub fn vehicle_count(&self) -> usize {
        self.positions.values().map(Vec::len).sum()
    }
}

/// Buckets raw, unordered position samples into exactly one frame per grid
/// entry, in grid order. Samples off the grid are dropped, never snapped to
/// the nearest instant; grid entries with no samples yield an empty frame,
/// never a stale copy of the previous one.
pub fn aggregate(
    samples: &[PositionSample],
    grid: &TimeGrid,
    selected: &BTreeSet<RouteID>,
) -> Result<Vec<Frame>> {
    let on_grid: BTreeSet<NaiveTime> = grid.times().iter().copied().collect();

    let mut buckets: BTreeMap<NaiveTime, BTreeMap<RouteID, Vec<Coord<f64>>>> = BTreeMap::new();
    let mut matched = 0;
    let mut off_grid = 0;
    for sample in samples {
        if !selected.contains(&sample.route_id) {
            continue;
        }
        if !on_grid.contains(&sample.time) {
            off_grid += 1;
            continue;
        }
        buckets
            .entry(sample.time)
            .or_insert_with(BTreeMap::new)
            .entry(sample.route_id.clone())
            .or_insert_with(Vec::new)
            .push(sample.pos);
        matched += 1;
    }
    if off_grid > 0 {
        debug!("dropped {off_grid} position samples that fell off the time grid");
    }
    if matched == 0 {
        return Err(Error::NoAnimatableData);
    }

    let mut frames = Vec::with_capacity(grid.len());
    for time in grid.times() {
        frames.push(Frame {
            time: *time,
            positions: buckets.remove(time).unwrap_or_default(),
        });
    }
    Ok(frames)
}
