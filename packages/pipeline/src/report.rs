//! What a run observed besides the scores.

use std::fmt;

use serde::Serialize;
use walkability_analytics::normalize::StudyScalars;
use walkability_analytics_models::{IndexVariant, MetricName};
use walkability_geography_models::{OverlayRule, UnitId};

/// Records excluded from a sub-metric because they joined to no unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedRecordWarning {
    pub metric: MetricName,
    /// Kind of record, e.g. `parcel` or `junction`.
    pub record: &'static str,
    pub count: usize,
}

impl fmt::Display for UnmatchedRecordWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} record(s) joined to no unit and were excluded",
            self.metric, self.count, self.record
        )
    }
}

/// A unit whose overlay-joined parcels cover more than its polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageWarning {
    pub metric: MetricName,
    pub unit_id: UnitId,
    pub covered_sq_ft: f64,
    pub area_sq_ft: f64,
}

impl fmt::Display for CoverageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: parcels cover {} sq ft of unit {}, which has an area of {} sq ft",
            self.metric, self.covered_sq_ft, self.unit_id, self.area_sq_ft
        )
    }
}

/// Per sub-metric summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricReport {
    pub metric: MetricName,
    /// Policy actually applied, including the observed class count for
    /// entropy normalization.
    pub policy: String,
    pub overlay_rule: Option<OverlayRule>,
    pub raw_max: Option<f64>,
    pub raw_min: Option<f64>,
    /// Units with a raw value.
    pub present: usize,
    /// Units with no raw value, scored 0.
    pub defaulted: usize,
    /// Set when the sub-metric could not be normalized and every unit was
    /// scored 0 instead.
    pub fallback: Option<String>,
}

impl MetricReport {
    pub(crate) fn from_scalars(
        metric: MetricName,
        policy: String,
        overlay_rule: Option<OverlayRule>,
        scalars: StudyScalars,
        unit_count: usize,
    ) -> Self {
        Self {
            metric,
            policy,
            overlay_rule,
            raw_max: scalars.max,
            raw_min: scalars.min,
            present: scalars.present,
            defaulted: unit_count.saturating_sub(scalars.present),
            fallback: None,
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// `None` for a custom metric list.
    pub variant: Option<IndexVariant>,
    pub units: usize,
    pub metrics: Vec<MetricReport>,
    pub warnings: Vec<UnmatchedRecordWarning>,
    /// Units whose covered area exceeds their nominal area.
    pub coverage: Vec<CoverageWarning>,
}

impl RunReport {
    /// Records excluded rows. The aggregating code has already logged them.
    pub(crate) fn record_unmatched(
        &mut self,
        metric: MetricName,
        record: &'static str,
        count: usize,
    ) {
        if count > 0 {
            self.warnings.push(UnmatchedRecordWarning {
                metric,
                record,
                count,
            });
        }
    }

    /// Sub-metrics that fell back to zeros.
    pub fn fallbacks(&self) -> impl Iterator<Item = &MetricReport> {
        self.metrics.iter().filter(|m| m.fallback.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_unmatched_counts_are_not_warnings() {
        let mut report = RunReport::default();
        report.record_unmatched(MetricName::CommercialDensity, "parcel", 0);
        report.record_unmatched(MetricName::IntersectionDensity, "junction", 3);

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            report.warnings[0].to_string(),
            "intersection_density: 3 junction record(s) joined to no unit and were excluded"
        );
    }

    #[test]
    fn coverage_warning_names_the_unit() {
        let warning = CoverageWarning {
            metric: MetricName::CommercialDensity,
            unit_id: UnitId::from("A"),
            covered_sq_ft: 5_000.0,
            area_sq_ft: 100.0,
        };
        assert_eq!(
            warning.to_string(),
            "commercial_density: parcels cover 5000 sq ft of unit A, which has an area of 100 sq ft"
        );
    }

    #[test]
    fn defaulted_counts_units_without_values() {
        let scalars = StudyScalars {
            max: Some(4.0),
            min: Some(1.0),
            present: 3,
        };
        let report = MetricReport::from_scalars(
            MetricName::ParkAccess,
            "inverse_min_ratio".to_string(),
            None,
            scalars,
            5,
        );
        assert_eq!(report.defaulted, 2);
        assert_eq!(report.fallback, None);
    }
}
