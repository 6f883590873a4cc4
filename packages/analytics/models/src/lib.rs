#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Sub-metric names, normalization policies, and score table types.
//!
//! A run computes a set of independently normalized sub-metrics per
//! geographic unit and combines them into one composite index. This crate
//! names those sub-metrics, the normalization policy each one uses, and
//! the named composite variants, along with the per-unit output row.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use walkability_geography_models::{OverlayRule, UnitId};

/// Raw per-unit values before normalization. `None` marks a unit with no
/// value for this metric.
pub type RawValues = BTreeMap<UnitId, Option<f64>>;

/// Normalized per-unit scores for one sub-metric.
pub type MetricMap = BTreeMap<UnitId, f64>;

/// A sub-metric of the pedestrian environment index.
#[derive(
    Debug,
    Clone,
    Copy,
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
pub enum MetricName {
    /// Shannon entropy of land-use classes within the unit's covered area.
    LandUseDiversity,
    /// Residents per square foot of nominal unit area.
    PopulationDensity,
    /// Commercial area per square foot of covered area.
    CommercialDensity,
    /// Degree-weighted street junctions per unit area.
    IntersectionDensity,
    /// Sidewalk area per square foot of nominal unit area.
    SidewalkDensity,
    /// Two-step floating catchment access to transit stops.
    TransitAccess,
    /// Median cost-distance to the nearest park.
    ParkAccess,
    /// Buffered road area per square foot of nominal unit area.
    StreetNetworkDensity,
}

impl MetricName {
    /// Every sub-metric, in output column order.
    pub const ALL: &[Self] = &[
        Self::LandUseDiversity,
        Self::PopulationDensity,
        Self::CommercialDensity,
        Self::IntersectionDensity,
        Self::SidewalkDensity,
        Self::TransitAccess,
        Self::ParkAccess,
        Self::StreetNetworkDensity,
    ];

    /// Whether this metric is derived from overlay-joined parcels.
    #[must_use]
    pub const fn uses_parcels(self) -> bool {
        matches!(self, Self::LandUseDiversity | Self::CommercialDensity)
    }

    /// The normalization policy this metric uses when no override is
    /// configured.
    ///
    /// `variant` is `None` for standalone and custom metric sets. Land-use
    /// diversity always normalizes by entropy; its class count is supplied
    /// at run time.
    #[must_use]
    pub const fn default_policy(self, variant: Option<IndexVariant>) -> NormalizationPolicy {
        match (self, variant) {
            (Self::LandUseDiversity, _) => NormalizationPolicy::EntropyMaxRatio { classes: 0 },
            (Self::CommercialDensity, Some(_)) => NormalizationPolicy::LogMaxRatio,
            (Self::ParkAccess, Some(IndexVariant::ParkAccess)) => {
                NormalizationPolicy::AbsDeviationFromMax
            }
            (Self::ParkAccess, _) => NormalizationPolicy::InverseMinRatio,
            _ => NormalizationPolicy::MaxRatio,
        }
    }

    /// The overlay rule used for the parcel table when no override is
    /// configured. Only meaningful for [`Self::uses_parcels`] metrics.
    #[must_use]
    pub const fn default_overlay_rule(self, variant: Option<IndexVariant>) -> OverlayRule {
        match (self, variant) {
            (Self::LandUseDiversity, Some(_)) => OverlayRule::CentroidContainment,
            _ => OverlayRule::LargestOverlap,
        }
    }
}

/// How raw per-unit values become comparable scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// `v / max`.
    MaxRatio,
    /// `ln(v + 1) / ln(max + 1)`, for heavily skewed ratios.
    LogMaxRatio,
    /// `(v / ln k) / (max / ln k)` where `k` is the study-wide number of
    /// distinct classes.
    EntropyMaxRatio {
        /// Distinct non-null classes observed across the study area.
        classes: usize,
    },
    /// `(1 / v) / (1 / min)`, for costs where lower is better.
    InverseMinRatio,
    /// `|1 - v / max|`, an alternate lower-is-better policy.
    AbsDeviationFromMax,
}

impl NormalizationPolicy {
    /// Whether a lower raw value means a better score.
    #[must_use]
    pub const fn lower_is_better(self) -> bool {
        matches!(self, Self::InverseMinRatio | Self::AbsDeviationFromMax)
    }
}

impl fmt::Display for NormalizationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxRatio => write!(f, "max_ratio"),
            Self::LogMaxRatio => write!(f, "log_max_ratio"),
            Self::EntropyMaxRatio { classes } => write!(f, "entropy_max_ratio(k={classes})"),
            Self::InverseMinRatio => write!(f, "inverse_min_ratio"),
            Self::AbsDeviationFromMax => write!(f, "abs_deviation_from_max"),
        }
    }
}

/// A named composite index: a fixed, ordered set of sub-metrics.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IndexVariant {
    /// Diversity, population, commercial, and intersection density.
    Base,
    /// The base index enhanced with park access.
    ParkAccess,
    /// Every sub-metric.
    Full,
}

impl IndexVariant {
    /// Every named variant.
    pub const ALL: &[Self] = &[Self::Base, Self::ParkAccess, Self::Full];

    /// The sub-metrics combined by this variant, in combination order.
    #[must_use]
    pub const fn metrics(self) -> &'static [MetricName] {
        match self {
            Self::Base => &[
                MetricName::LandUseDiversity,
                MetricName::PopulationDensity,
                MetricName::CommercialDensity,
                MetricName::IntersectionDensity,
            ],
            Self::ParkAccess => &[
                MetricName::LandUseDiversity,
                MetricName::PopulationDensity,
                MetricName::CommercialDensity,
                MetricName::IntersectionDensity,
                MetricName::ParkAccess,
            ],
            Self::Full => MetricName::ALL,
        }
    }

    /// Human-readable description for listings.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Base => "land-use mix, population, commercial and intersection density",
            Self::ParkAccess => "base index plus access to parks",
            Self::Full => "base index plus sidewalks, transit, parks and street network",
        }
    }
}

/// One output row: every computed sub-metric score for a unit plus the
/// composite index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitScores {
    /// Unit id.
    pub unit_id: UnitId,
    /// Normalized score per sub-metric.
    pub scores: BTreeMap<MetricName, f64>,
    /// Composite index.
    pub index: f64,
}
