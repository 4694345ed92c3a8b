use crate::feed::StopID;

/// Everything that can abort resolution or aggregation. Missing-but-optional
/// data (an absent route color, a requested route id with no line feature)
/// never lands here; it degrades to a default or is returned as a warning set
/// on the result instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The feed violates its own schema: a `location_type` code outside the
    /// known set. Never coerced to a default.
    #[error("stop {stop_id:?} has unrecognized location_type {value:?}")]
    InvalidLocationType { stop_id: StopID, value: String },

    /// A record at the feed boundary is structurally unusable (missing id,
    /// bad coordinates, a geometry kind the feed never emits).
    #[error("malformed feed record: {0}")]
    MalformedRecord(String),

    /// No selected route resolved to any station, so there are no bounds to
    /// fit a viewport to.
    #[error("no displayable geometry for the selected routes")]
    NoDisplayableGeometry,

    /// Not one position sample landed on the time grid. Almost always a
    /// caller configuration error: wrong date, wrong route ids, or a grid
    /// outside the feed's service window.
    #[error("no position sample matched any time grid entry")]
    NoAnimatableData,

    #[error("invalid time grid: {reason}")]
    InvalidTimeGrid { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
