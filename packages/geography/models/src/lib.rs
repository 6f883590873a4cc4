#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic unit and joined-record types.
//!
//! These types describe the tables handed to the scoring core by the
//! geometry/raster engine: the unit layer (census tracts), parcels stamped
//! with an owning unit by an overlay join, street junction candidates,
//! catchment anchors, and zonal cost statistics. All coordinates and
//! lengths are in a planar coordinate system measured in feet.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Square feet per square meter, as used by the intersection density
/// calculation.
pub const SQ_FT_PER_SQ_M: f64 = 10.764;

/// Search radius for centroid-to-anchor catchment links, in feet.
pub const CATCHMENT_RADIUS_FT: f64 = 10_000.0;

/// Minimum number of incident street segments for a point to count as a
/// junction.
pub const MIN_JUNCTION_DEGREE: u32 = 3;

/// Stable identifier of a geographic unit (e.g. a census tract GEOID).
///
/// Every derived table and every metric map is keyed by this id. Grouping
/// is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Creates a unit id from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UnitId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A planar point in feet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointFt {
    /// Easting in feet.
    pub x: f64,
    /// Northing in feet.
    pub y: f64,
}

impl PointFt {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Planar distance to another point, in feet.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A unit of analysis from the unit layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicUnit {
    /// Unique, stable unit id.
    pub id: UnitId,
    /// Nominal polygon area in square feet.
    pub area_sq_ft: f64,
    /// Resident population, if known.
    pub population: Option<f64>,
    /// Polygon centroid, used as the catchment origin.
    pub centroid: Option<PointFt>,
}

/// Which unit claims a parcel that straddles a unit boundary.
///
/// The rule changes the covered area attributed to each unit, so every
/// parcel-derived metric records which rule its input table was joined
/// with.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverlayRule {
    /// The unit with the largest overlapping area claims the parcel.
    #[default]
    LargestOverlap,
    /// The unit containing the parcel centroid claims the parcel.
    CentroidContainment,
}

/// A land parcel (tax lot) stamped with its owning unit by an overlay join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    /// Parcel id.
    pub id: String,
    /// Parcel area in square feet.
    pub area_sq_ft: f64,
    /// Land-use class label (`None` when unclassified).
    pub land_use: Option<String>,
    /// Commercial floor/lot area within the parcel, in square feet.
    pub commercial_area_sq_ft: Option<f64>,
    /// Owning unit (`None` when the parcel did not join to any unit).
    pub unit_id: Option<UnitId>,
}

/// A candidate street junction produced by the street self-overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionCandidate {
    /// Junction location.
    pub location: PointFt,
    /// Number of street segments incident to this point.
    pub degree: f64,
    /// Containing unit, if the collaborator already resolved it.
    pub unit_id: Option<UnitId>,
}

/// A catchment anchor: a transit stop, park entrance, or similar
/// destination point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPoint {
    /// Anchor id.
    pub id: String,
    /// Anchor location.
    pub location: PointFt,
}

/// A unit-centroid to anchor connection within the catchment radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchmentLink {
    /// Unit at the centroid end.
    pub unit_id: UnitId,
    /// Anchor at the far end.
    pub anchor_id: String,
    /// Line length in feet.
    pub length_ft: f64,
}

/// A zonal statistic of a cost-distance surface for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalRecord {
    /// Unit the statistic was computed over.
    pub unit_id: UnitId,
    /// Median accumulated cost of the unit's cells.
    pub median_cost: f64,
}

/// Resolves which unit polygon contains a point.
///
/// Implemented by the spatial collaborator; the scoring core only needs
/// containment answers, never geometry.
pub trait UnitLocator {
    /// Returns the id of the unit containing `point`, if any.
    fn locate(&self, point: PointFt) -> Option<UnitId>;
}

impl<F> UnitLocator for F
where
    F: Fn(PointFt) -> Option<UnitId>,
{
    fn locate(&self, point: PointFt) -> Option<UnitId> {
        self(point)
    }
}
