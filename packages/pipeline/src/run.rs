//! Computes every planned sub-metric and combines them into the index.
//!
//! Each sub-metric is scored independently from the shared input tables.
//! A sub-metric whose study-wide scalar cannot be computed either aborts
//! the run with an error naming it or, when the run allows it, scores 0
//! for every unit with the fallback recorded in the report. A study area
//! with fewer than two land-use classes always scores diversity 0.

use std::sync::Arc;

use walkability_analytics::AnalyticsError;
use walkability_analytics::aggregate::{AreaAggregates, count_unknown_units};
use walkability_analytics::catchment::raw_catchment_access;
use walkability_analytics::composite::combine;
use walkability_analytics::cost_distance::cost_distance_access;
use walkability_analytics::diversity::land_use_diversity;
use walkability_analytics::intersection::intersection_density;
use walkability_analytics::normalize::{Normalized, normalize};
use walkability_analytics::ratio::{apportioned_density, commercial_density, population_density};
use walkability_analytics_models::{MetricMap, MetricName, NormalizationPolicy, UnitScores};
use walkability_geography_models::{GeographicUnit, PointFt, UnitId};
use walkability_spatial::AnchorIndex;

use crate::PipelineError;
use crate::config::{DegenerateAction, MetricPlan, RunConfig};
use crate::progress::ProgressCallback;
use crate::report::{CoverageWarning, MetricReport, RunReport};
use crate::tables::InputTables;

/// Scores and report of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Sub-metrics in combination order.
    pub metrics: Vec<MetricName>,
    /// One row per unit, in unit id order.
    pub rows: Vec<UnitScores>,
    pub report: RunReport,
}

/// Loads the configured inputs and runs every sub-metric.
///
/// # Errors
///
/// * Any config, input, or sub-metric error; see [`PipelineError`].
pub fn run(
    config: &RunConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<RunOutput, PipelineError> {
    let plan = config.plan()?;
    let tables = InputTables::load(&config.inputs, &plan)?;
    compute(config, &plan, &tables, progress)
}

/// Runs `plan` over already loaded tables.
///
/// # Errors
///
/// * [`PipelineError::Config`] if `plan` is empty.
/// * [`PipelineError::MissingInput`] if a table `plan` needs is not loaded.
/// * [`PipelineError::Metric`] if a sub-metric fails and the run does not
///   fall back to zeros for it.
pub fn compute(
    config: &RunConfig,
    plan: &[MetricPlan],
    tables: &InputTables,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<RunOutput, PipelineError> {
    if plan.is_empty() {
        return Err(PipelineError::config("a run needs at least one sub-metric"));
    }

    let units = &tables.units;
    let mut report = RunReport {
        variant: config.variant.variant(),
        units: units.len(),
        ..RunReport::default()
    };
    let mut maps: Vec<(MetricName, MetricMap)> = Vec::with_capacity(plan.len());

    progress.set_total(plan.len() as u64);

    for metric in plan {
        progress.set_message(format!("Scoring {}", metric.name));

        let (scores, metric_report) =
            match score_metric(metric, tables, config.catchment_radius_ft, &mut report) {
                Ok((normalized, policy)) => {
                    let metric_report = MetricReport::from_scalars(
                        metric.name,
                        policy.to_string(),
                        metric.overlay_rule,
                        normalized.scalars,
                        units.len(),
                    );
                    log::info!(
                        "{}: {policy}, raw max {:?} over {} unit(s), {} defaulted",
                        metric.name,
                        metric_report.raw_max,
                        metric_report.present,
                        metric_report.defaulted
                    );
                    (normalized.scores, metric_report)
                }
                Err(PipelineError::Metric { metric: name, source })
                    if falls_back(&source, config.on_degenerate) =>
                {
                    log::warn!("{name}: {source}; scoring every unit 0");
                    let policy = match source {
                        AnalyticsError::InsufficientClasses { classes } => {
                            NormalizationPolicy::EntropyMaxRatio { classes }
                        }
                        _ => metric.policy,
                    };
                    let scores: MetricMap = units.iter().map(|u| (u.id.clone(), 0.0)).collect();
                    let metric_report = MetricReport {
                        metric: name,
                        policy: policy.to_string(),
                        overlay_rule: metric.overlay_rule,
                        raw_max: None,
                        raw_min: None,
                        present: 0,
                        defaulted: units.len(),
                        fallback: Some(source.to_string()),
                    };
                    (scores, metric_report)
                }
                Err(e) => return Err(e),
            };

        report.metrics.push(metric_report);
        maps.push((metric.name, scores));
        progress.inc(1);
    }

    let metrics: Vec<(MetricName, &MetricMap)> =
        maps.iter().map(|(name, scores)| (*name, scores)).collect();
    let rows = combine(units, &metrics)
        .map_err(|e| PipelineError::config(format!("cannot combine sub-metrics: {e}")))?;

    progress.finish(format!(
        "Scored {} unit(s) on {} sub-metric(s)",
        rows.len(),
        plan.len()
    ));

    Ok(RunOutput {
        metrics: plan.iter().map(|m| m.name).collect(),
        rows,
        report,
    })
}

/// Whether a failed sub-metric scores 0 instead of aborting the run.
fn falls_back(error: &AnalyticsError, action: DegenerateAction) -> bool {
    matches!(error, AnalyticsError::InsufficientClasses { .. })
        || (error.is_degenerate() && action == DegenerateAction::Zero)
}

/// Counts records naming a unit outside the unit layer and logs them.
fn unknown_records<'a>(
    metric: MetricName,
    record: &str,
    units: &[GeographicUnit],
    ids: impl IntoIterator<Item = &'a UnitId>,
) -> usize {
    let unknown = count_unknown_units(units, ids);
    if unknown > 0 {
        log::warn!("{metric}: {unknown} {record} record(s) name a unit outside the unit layer");
    }
    unknown
}

/// Warns about and reports every unit whose parcels cover more than its
/// nominal area.
fn check_coverage(
    metric: MetricName,
    units: &[GeographicUnit],
    aggregates: &AreaAggregates,
    report: &mut RunReport,
) {
    for (unit_id, covered, area) in aggregates.over_covered(units) {
        log::warn!(
            "{metric}: parcels cover {covered} sq ft of unit {unit_id}, \
             more than its area of {area} sq ft"
        );
        report.coverage.push(CoverageWarning {
            metric,
            unit_id: unit_id.clone(),
            covered_sq_ft: covered,
            area_sq_ft: area,
        });
    }
}

/// Scores one sub-metric, returning the policy actually applied.
fn score_metric(
    plan: &MetricPlan,
    tables: &InputTables,
    radius_ft: f64,
    report: &mut RunReport,
) -> Result<(Normalized, NormalizationPolicy), PipelineError> {
    let units = tables.units.as_slice();
    let name = plan.name;
    let failed = |source: AnalyticsError| PipelineError::Metric {
        metric: name,
        source,
    };
    let missing = |input: &'static str| PipelineError::MissingInput {
        metric: name,
        input,
    };

    let raw = match name {
        MetricName::LandUseDiversity | MetricName::CommercialDensity => {
            let rule = plan.overlay_rule.unwrap_or_default();
            let parcels = tables
                .parcels
                .get(&rule)
                .ok_or_else(|| missing("parcels_largest_overlap"))?;
            let unknown = unknown_records(
                name,
                "parcel",
                units,
                parcels.iter().filter_map(|p| p.unit_id.as_ref()),
            );
            let aggregates = AreaAggregates::from_parcels(rule, parcels);
            report.record_unmatched(name, "parcel", aggregates.unmatched + unknown);
            check_coverage(name, units, &aggregates, report);

            if name == MetricName::LandUseDiversity {
                let policy = NormalizationPolicy::EntropyMaxRatio {
                    classes: aggregates.distinct_classes().len(),
                };
                return land_use_diversity(units, &aggregates)
                    .map(|n| (n, policy))
                    .map_err(failed);
            }
            commercial_density(units, &aggregates)
        }
        MetricName::PopulationDensity => population_density(units),
        MetricName::IntersectionDensity => {
            let candidates = tables
                .junctions
                .as_deref()
                .ok_or_else(|| missing("junctions"))?;
            let (raw, tally) = match &tables.boundaries {
                Some(index) => intersection_density(units, candidates, index),
                None => intersection_density(units, candidates, &|_: PointFt| -> Option<UnitId> {
                    None
                }),
            };
            report.record_unmatched(name, "junction", tally.unmatched);
            raw
        }
        MetricName::SidewalkDensity | MetricName::StreetNetworkDensity => {
            let (areas, input) = if name == MetricName::SidewalkDensity {
                (tables.sidewalk_area.as_ref(), "sidewalk_area")
            } else {
                (tables.street_area.as_ref(), "street_area")
            };
            let areas = areas.ok_or_else(|| missing(input))?;
            let unknown = unknown_records(name, input, units, areas.keys());
            report.record_unmatched(name, input, unknown);
            apportioned_density(units, areas)
        }
        MetricName::TransitAccess => {
            let stops = tables
                .transit_stops
                .as_ref()
                .ok_or_else(|| missing("transit_stops"))?;
            let links = AnchorIndex::new(stops.clone()).links_within(units, radius_ft);
            log::debug!("{name}: {} catchment link(s)", links.len());
            raw_catchment_access(units, &links)
        }
        MetricName::ParkAccess => {
            let records = tables
                .park_cost
                .as_deref()
                .ok_or_else(|| missing("park_cost"))?;
            let unknown =
                unknown_records(name, "park_cost", units, records.iter().map(|r| &r.unit_id));
            report.record_unmatched(name, "park_cost", unknown);
            return cost_distance_access(units, records, plan.policy)
                .map(|n| (n, plan.policy))
                .map_err(failed);
        }
    };

    normalize(&raw, plan.policy)
        .map(|n| (n, plan.policy))
        .map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_class_study_areas_always_fall_back() {
        let err = AnalyticsError::InsufficientClasses { classes: 1 };
        assert!(falls_back(&err, DegenerateAction::Fail));
        assert!(falls_back(&err, DegenerateAction::Zero));
    }

    #[test]
    fn degenerate_scalars_fall_back_only_when_allowed() {
        let err = AnalyticsError::DegenerateInput {
            policy: NormalizationPolicy::MaxRatio,
            reason: "no present values".to_string(),
        };
        assert!(!falls_back(&err, DegenerateAction::Fail));
        assert!(falls_back(&err, DegenerateAction::Zero));
    }

    #[test]
    fn unsupported_policies_never_fall_back() {
        let err = AnalyticsError::UnsupportedPolicy {
            policy: NormalizationPolicy::MaxRatio,
            reason: "lower is better".to_string(),
        };
        assert!(!falls_back(&err, DegenerateAction::Zero));
    }
}
