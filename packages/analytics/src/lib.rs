#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation, normalization, and composite combination engine.
//!
//! Consumes the joined tables produced by the geometry/raster engine
//! (parcels stamped with a unit id, junction candidates, catchment links,
//! zonal cost statistics), aggregates them per geographic unit, turns raw
//! ratios into comparable scores, and combines any subset of sub-metrics
//! into a single pedestrian environment index.
//!
//! Every sub-metric is computed independently. Study-wide scalars (maxima,
//! minima, distinct class counts) are reduced in a full first pass before
//! any unit is normalized in a second pass.

pub mod aggregate;
pub mod catchment;
pub mod composite;
pub mod cost_distance;
pub mod diversity;
pub mod intersection;
pub mod normalize;
pub mod ratio;

use thiserror::Error;
use walkability_analytics_models::NormalizationPolicy;

pub use walkability_analytics_models::{MetricMap, MetricName, RawValues};

/// Errors that can occur while computing a sub-metric.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A study-wide maximum or minimum cannot be computed from the data
    /// present.
    #[error("Degenerate input for {policy} normalization: {reason}")]
    DegenerateInput {
        /// Policy that needed the scalar.
        policy: NormalizationPolicy,
        /// Description of what was missing.
        reason: String,
    },

    /// The study area has too few distinct land-use classes for the
    /// entropy to be normalized (`ln(k)` is zero).
    #[error("Land-use diversity needs at least 2 distinct classes, found {classes}")]
    InsufficientClasses {
        /// Distinct non-null classes observed.
        classes: usize,
    },

    /// A metric was asked to normalize with a policy it cannot use.
    #[error("{policy} normalization is not supported here: {reason}")]
    UnsupportedPolicy {
        /// Requested policy.
        policy: NormalizationPolicy,
        /// Why the policy does not fit.
        reason: String,
    },

    /// A composite was requested over no sub-metrics.
    #[error("Composite index needs at least one sub-metric")]
    EmptyComposite,
}

impl AnalyticsError {
    /// Whether this error comes from a study-wide scalar that could not be
    /// computed, which callers may answer by emitting zeros for the
    /// sub-metric.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        matches!(
            self,
            Self::DegenerateInput { .. } | Self::InsufficientClasses { .. }
        )
    }
}
