//! Normalization policies that turn raw per-unit values into scores.
//!
//! Normalization is a two-pass reduction: [`StudyScalars::reduce`] folds
//! every present value into the study-wide maximum and minimum, and only
//! then is each unit mapped to its score. No unit is scored against a
//! partially computed scalar.
//!
//! Units whose raw value is absent (or not finite) score 0, which denotes
//! "no data" under every policy.

use walkability_analytics_models::{MetricMap, NormalizationPolicy, RawValues};

use crate::AnalyticsError;

/// Floor applied to study-wide maxima and minima so that an all-zero
/// metric does not divide by zero.
pub const EPSILON: f64 = 1e-18;

/// Study-wide scalars from the first normalization pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudyScalars {
    /// Largest present value.
    pub max: Option<f64>,
    /// Smallest present value.
    pub min: Option<f64>,
    /// Number of units with a present, finite value.
    pub present: usize,
}

impl StudyScalars {
    /// Folds every present, finite value into the study-wide maximum and
    /// minimum.
    #[must_use]
    pub fn reduce(raw: &RawValues) -> Self {
        raw.values()
            .filter_map(|v| present(*v))
            .fold(
                Self {
                    max: None,
                    min: None,
                    present: 0,
                },
                |acc, v| Self {
                    max: Some(acc.max.map_or(v, |m| m.max(v))),
                    min: Some(acc.min.map_or(v, |m| m.min(v))),
                    present: acc.present + 1,
                },
            )
    }
}

/// Scores produced by [`normalize`], along with the scalars they were
/// normalized against.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Score per unit; every key of the raw input is present.
    pub scores: MetricMap,
    /// Study-wide scalars from the first pass.
    pub scalars: StudyScalars,
}

/// Resolved denominators for one policy, computed once per metric.
#[derive(Debug, Clone, Copy)]
enum Scale {
    Max(f64),
    LogMax(f64),
    Entropy { ln_k: f64, max_over_ln_k: f64 },
    InverseMin(f64),
    AbsDeviation(f64),
}

impl Scale {
    fn resolve(
        policy: NormalizationPolicy,
        scalars: &StudyScalars,
    ) -> Result<Self, AnalyticsError> {
        if let NormalizationPolicy::EntropyMaxRatio { classes } = policy
            && classes <= 1
        {
            return Err(AnalyticsError::InsufficientClasses { classes });
        }

        let degenerate = |what: &str| AnalyticsError::DegenerateInput {
            policy,
            reason: format!("no present values to take the {what} of"),
        };

        Ok(match policy {
            NormalizationPolicy::MaxRatio => {
                Self::Max(scalars.max.ok_or_else(|| degenerate("maximum"))?.max(EPSILON))
            }
            NormalizationPolicy::LogMaxRatio => {
                let max = scalars.max.ok_or_else(|| degenerate("maximum"))?.max(EPSILON);
                Self::LogMax(max.ln_1p())
            }
            NormalizationPolicy::EntropyMaxRatio { classes } => {
                let max = scalars.max.ok_or_else(|| degenerate("maximum"))?.max(EPSILON);
                #[allow(clippy::cast_precision_loss)]
                let ln_k = (classes as f64).ln();
                Self::Entropy {
                    ln_k,
                    max_over_ln_k: max / ln_k,
                }
            }
            NormalizationPolicy::InverseMinRatio => {
                Self::InverseMin(scalars.min.ok_or_else(|| degenerate("minimum"))?.max(EPSILON))
            }
            NormalizationPolicy::AbsDeviationFromMax => {
                Self::AbsDeviation(scalars.max.ok_or_else(|| degenerate("maximum"))?.max(EPSILON))
            }
        })
    }

    fn apply(self, v: f64) -> f64 {
        match self {
            Self::Max(max) => v / max,
            Self::LogMax(ln_max) => v.ln_1p() / ln_max,
            Self::Entropy { ln_k, max_over_ln_k } => (v / ln_k) / max_over_ln_k,
            Self::InverseMin(min) => (1.0 / v.max(EPSILON)) / (1.0 / min),
            Self::AbsDeviation(max) => (1.0 - v / max).abs(),
        }
    }
}

/// Normalizes raw per-unit values with the given policy.
///
/// Absent values score 0. Present values are scored against study-wide
/// scalars reduced over present values only.
///
/// # Errors
///
/// * [`AnalyticsError::DegenerateInput`] if no unit has a present value,
///   so the maximum or minimum the policy needs does not exist.
/// * [`AnalyticsError::InsufficientClasses`] for entropy normalization
///   over fewer than two classes.
pub fn normalize(
    raw: &RawValues,
    policy: NormalizationPolicy,
) -> Result<Normalized, AnalyticsError> {
    let scalars = StudyScalars::reduce(raw);
    let scale = Scale::resolve(policy, &scalars)?;

    log::debug!(
        "{policy}: {} of {} units present, max={:?} min={:?}",
        scalars.present,
        raw.len(),
        scalars.max,
        scalars.min
    );

    let scores = raw
        .iter()
        .map(|(id, v)| (id.clone(), present(*v).map_or(0.0, |v| scale.apply(v))))
        .collect();

    Ok(Normalized { scores, scalars })
}

fn present(v: Option<f64>) -> Option<f64> {
    v.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use walkability_geography_models::UnitId;

    use super::*;

    fn raw(values: &[(&str, Option<f64>)]) -> RawValues {
        values.iter().map(|(k, v)| (UnitId::from(*k), *v)).collect()
    }

    fn score(normalized: &Normalized, id: &str) -> f64 {
        normalized.scores[&UnitId::from(id)]
    }

    #[test]
    fn max_ratio_scales_by_maximum() {
        let n = normalize(
            &raw(&[("a", Some(0.1)), ("b", Some(0.2)), ("c", Some(0.0))]),
            NormalizationPolicy::MaxRatio,
        )
        .unwrap();
        assert!((score(&n, "a") - 0.5).abs() < 1e-12);
        assert!((score(&n, "b") - 1.0).abs() < f64::EPSILON);
        assert!(score(&n, "c").abs() < f64::EPSILON);
    }

    #[test]
    fn missing_values_score_zero() {
        let n = normalize(&raw(&[("a", Some(4.0)), ("b", None)]), NormalizationPolicy::MaxRatio)
            .unwrap();
        assert!(score(&n, "b").abs() < f64::EPSILON);
        assert_eq!(n.scalars.present, 1);
    }

    #[test]
    fn all_zero_values_do_not_divide_by_zero() {
        let n = normalize(
            &raw(&[("a", Some(0.0)), ("b", Some(0.0))]),
            NormalizationPolicy::MaxRatio,
        )
        .unwrap();
        assert!(n.scores.values().all(|v| *v == 0.0));
    }

    #[test]
    fn no_present_values_is_degenerate() {
        let err = normalize(&raw(&[("a", None), ("b", None)]), NormalizationPolicy::MaxRatio)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::DegenerateInput { .. }));

        let err = normalize(&RawValues::new(), NormalizationPolicy::InverseMinRatio).unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn non_finite_values_are_treated_as_absent() {
        let n = normalize(
            &raw(&[("a", Some(f64::NAN)), ("b", Some(2.0)), ("c", Some(f64::INFINITY))]),
            NormalizationPolicy::MaxRatio,
        )
        .unwrap();
        assert!(score(&n, "a").abs() < f64::EPSILON);
        assert!((score(&n, "b") - 1.0).abs() < f64::EPSILON);
        assert!(score(&n, "c").abs() < f64::EPSILON);
    }

    #[test]
    fn log_max_ratio() {
        let n = normalize(
            &raw(&[("a", Some(3.0)), ("b", Some(1.0)), ("c", Some(0.0))]),
            NormalizationPolicy::LogMaxRatio,
        )
        .unwrap();
        assert!((score(&n, "a") - 1.0).abs() < 1e-12);
        assert!((score(&n, "b") - 2f64.ln() / 4f64.ln()).abs() < 1e-12);
        assert!(score(&n, "c").abs() < f64::EPSILON);
    }

    #[test]
    fn entropy_max_ratio_matches_max_ratio_in_value() {
        let values = raw(&[("a", Some(0.9)), ("b", Some(0.3))]);
        let n = normalize(&values, NormalizationPolicy::EntropyMaxRatio { classes: 4 }).unwrap();
        assert!((score(&n, "a") - 1.0).abs() < 1e-12);
        assert!((score(&n, "b") - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn entropy_needs_two_classes() {
        let values = raw(&[("a", Some(0.0))]);
        for classes in [0, 1] {
            let err =
                normalize(&values, NormalizationPolicy::EntropyMaxRatio { classes }).unwrap_err();
            assert!(
                matches!(err, AnalyticsError::InsufficientClasses { classes: c } if c == classes)
            );
        }
    }

    #[test]
    fn inverse_min_ratio_rewards_low_costs() {
        let n = normalize(
            &raw(&[("near", Some(50.0)), ("far", Some(200.0)), ("unreachable", None)]),
            NormalizationPolicy::InverseMinRatio,
        )
        .unwrap();
        assert!((score(&n, "near") - 1.0).abs() < 1e-12);
        assert!((score(&n, "far") - 0.25).abs() < 1e-12);
        assert!(score(&n, "unreachable").abs() < f64::EPSILON);
    }

    #[test]
    fn inverse_min_ratio_handles_zero_cost() {
        let n = normalize(
            &raw(&[("seed", Some(0.0)), ("other", Some(10.0))]),
            NormalizationPolicy::InverseMinRatio,
        )
        .unwrap();
        assert!((score(&n, "seed") - 1.0).abs() < f64::EPSILON);
        assert!(score(&n, "other") < 1e-15);
    }

    #[test]
    fn abs_deviation_from_max() {
        let n = normalize(
            &raw(&[("near", Some(25.0)), ("far", Some(100.0)), ("unreachable", None)]),
            NormalizationPolicy::AbsDeviationFromMax,
        )
        .unwrap();
        assert!((score(&n, "near") - 0.75).abs() < 1e-12);
        assert!(score(&n, "far").abs() < 1e-12);
        assert!(score(&n, "unreachable").abs() < f64::EPSILON);
    }

    #[test]
    fn scalars_reduce_over_present_values_only() {
        let scalars =
            StudyScalars::reduce(&raw(&[("a", Some(3.0)), ("b", None), ("c", Some(-1.0))]));
        assert_eq!(scalars.max, Some(3.0));
        assert_eq!(scalars.min, Some(-1.0));
        assert_eq!(scalars.present, 2);
    }
}
