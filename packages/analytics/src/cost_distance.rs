//! Accessibility from a zonal cost-distance statistic.
//!
//! The geometry/raster engine accumulates a cost-distance surface from
//! destination seeds (e.g. parks) over a reclassified distance-to-sidewalk
//! cost surface, then takes the median of that surface over each unit.
//! Scoring starts from that per-unit median, where lower cost is better.

use std::collections::BTreeMap;

use walkability_analytics_models::{NormalizationPolicy, RawValues};
use walkability_geography_models::{GeographicUnit, UnitId, ZonalRecord};

use crate::AnalyticsError;
use crate::normalize::{Normalized, normalize};

/// Raw median cost per unit. Units with no zonal record (no reachable
/// destination) have no value.
///
/// When a unit appears more than once the last record wins.
#[must_use]
pub fn raw_median_cost(units: &[GeographicUnit], records: &[ZonalRecord]) -> RawValues {
    let by_unit: BTreeMap<&UnitId, f64> = records
        .iter()
        .map(|record| (&record.unit_id, record.median_cost))
        .collect();

    units
        .iter()
        .map(|unit| (unit.id.clone(), by_unit.get(&unit.id).copied()))
        .collect()
}

/// Scores cost-distance accessibility with a lower-is-better policy.
///
/// # Errors
///
/// * [`AnalyticsError::UnsupportedPolicy`] if `policy` is not a
///   lower-is-better policy.
/// * [`AnalyticsError::DegenerateInput`] if no unit has a zonal record.
pub fn cost_distance_access(
    units: &[GeographicUnit],
    records: &[ZonalRecord],
    policy: NormalizationPolicy,
) -> Result<Normalized, AnalyticsError> {
    if !policy.lower_is_better() {
        return Err(AnalyticsError::UnsupportedPolicy {
            policy,
            reason: "cost-distance access needs a lower-is-better policy".to_string(),
        });
    }

    normalize(&raw_median_cost(units, records), policy)
}
