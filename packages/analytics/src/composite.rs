//! Geometric combination of normalized sub-metrics into one index.
//!
//! `index(u) = Π (1 + mᵢ(u)) / 2ⁿ`. Each factor lies in `[1, 2]`, so the
//! index lies in `[2⁻ⁿ, 1]` for scores in `[0, 1]`. A unit missing from a
//! sub-metric map contributes `mᵢ(u) = 0`.

use std::collections::BTreeMap;

use walkability_analytics_models::{MetricMap, MetricName, UnitScores};
use walkability_geography_models::GeographicUnit;

use crate::AnalyticsError;

/// `2ⁿ` for `n` sub-metrics.
#[must_use]
pub fn divisor(metric_count: usize) -> f64 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    2f64.powi(metric_count as i32)
}

/// Combines `metrics` for every unit in `units`, in unit order.
///
/// The divisor is `2ⁿ` for exactly the `n` metrics supplied.
///
/// # Errors
///
/// Returns [`AnalyticsError::EmptyComposite`] if `metrics` is empty.
pub fn combine(
    units: &[GeographicUnit],
    metrics: &[(MetricName, &MetricMap)],
) -> Result<Vec<UnitScores>, AnalyticsError> {
    if metrics.is_empty() {
        return Err(AnalyticsError::EmptyComposite);
    }

    let divisor = divisor(metrics.len());

    Ok(units
        .iter()
        .map(|unit| {
            let scores: BTreeMap<MetricName, f64> = metrics
                .iter()
                .map(|(name, map)| (*name, map.get(&unit.id).copied().unwrap_or(0.0)))
                .collect();
            let product: f64 = metrics
                .iter()
                .map(|(name, _)| 1.0 + scores[name])
                .product();

            UnitScores {
                unit_id: unit.id.clone(),
                scores,
                index: product / divisor,
            }
        })
        .collect())
}
