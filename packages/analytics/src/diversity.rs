//! Land-use mix as Shannon entropy of class proportions within each
//! unit's covered area.

use walkability_analytics_models::{NormalizationPolicy, RawValues};
use walkability_geography_models::GeographicUnit;

use crate::AnalyticsError;
use crate::aggregate::AreaAggregates;
use crate::normalize::{Normalized, normalize};

/// Shannon entropy `H = -Σ pᵢ·ln(pᵢ)` of a unit's class areas, where each
/// proportion is taken against the unit's covered area.
///
/// Zero covered area, a single class, or no classes all give exactly 0.
#[must_use]
pub fn shannon_entropy(class_areas: impl IntoIterator<Item = f64>, covered_area: f64) -> f64 {
    if covered_area <= 0.0 {
        return 0.0;
    }

    let h: f64 = class_areas
        .into_iter()
        .map(|area| area / covered_area)
        .filter(|p| *p > 0.0)
        .map(|p| -p * p.ln())
        .sum();

    if h > 0.0 { h } else { 0.0 }
}

/// Raw per-unit entropy for every unit in `units`.
///
/// Units without any joined parcels have no value.
#[must_use]
pub fn raw_entropy(units: &[GeographicUnit], aggregates: &AreaAggregates) -> RawValues {
    units
        .iter()
        .map(|unit| {
            let value = aggregates.by_unit.get(&unit.id).map(|covered| {
                shannon_entropy(aggregates.classes_of(&unit.id).map(|(_, a)| a), *covered)
            });
            (unit.id.clone(), value)
        })
        .collect()
}

/// Normalized land-use diversity.
///
/// The entropy is normalized against the study-wide count of distinct
/// non-null classes, taken once over every unit's class aggregate.
///
/// # Errors
///
/// * [`AnalyticsError::InsufficientClasses`] if the study area has fewer
///   than two distinct classes. Callers should emit 0 for every unit.
/// * [`AnalyticsError::DegenerateInput`] if no unit has joined parcels.
pub fn land_use_diversity(
    units: &[GeographicUnit],
    aggregates: &AreaAggregates,
) -> Result<Normalized, AnalyticsError> {
    let classes = aggregates.distinct_classes().len();
    log::info!("Land-use diversity over {classes} distinct classes ({} join)", aggregates.rule);

    normalize(
        &raw_entropy(units, aggregates),
        NormalizationPolicy::EntropyMaxRatio { classes },
    )
}

#[cfg(test)]
mod tests {
    use walkability_geography_models::{OverlayRule, Parcel, UnitId};

    use super::*;

    fn unit(id: &str) -> GeographicUnit {
        GeographicUnit {
            id: UnitId::from(id),
            area_sq_ft: 1_000.0,
            population: None,
            centroid: None,
        }
    }

    fn parcel(unit: &str, class: &str, area: f64) -> Parcel {
        Parcel {
            id: format!("{unit}-{class}"),
            area_sq_ft: area,
            land_use: Some(class.to_string()),
            commercial_area_sq_ft: None,
            unit_id: Some(UnitId::from(unit)),
        }
    }

    #[test]
    fn single_class_entropy_is_exactly_zero() {
        let h = shannon_entropy([250.0], 250.0);
        assert_eq!(h, 0.0);
        assert!(h.is_sign_positive());
    }

    #[test]
    fn zero_covered_area_has_zero_entropy() {
        assert_eq!(shannon_entropy([0.0, 0.0], 0.0), 0.0);
        assert_eq!(shannon_entropy(std::iter::empty(), 0.0), 0.0);
    }

    #[test]
    fn even_split_reaches_ln_k() {
        let h = shannon_entropy([25.0, 25.0, 25.0, 25.0], 100.0);
        assert!((h - 4f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn most_even_unit_normalizes_to_one() {
        let units = [unit("A"), unit("B"), unit("C")];
        let parcels = [
            parcel("A", "residential", 50.0),
            parcel("A", "commercial", 50.0),
            parcel("B", "residential", 90.0),
            parcel("B", "commercial", 10.0),
        ];
        let agg = AreaAggregates::from_parcels(OverlayRule::CentroidContainment, &parcels);
        let n = land_use_diversity(&units, &agg).unwrap();

        assert!((n.scores[&UnitId::from("A")] - 1.0).abs() < 1e-12);
        let b = n.scores[&UnitId::from("B")];
        assert!(b > 0.0 && b < 1.0);
        assert_eq!(n.scores[&UnitId::from("C")], 0.0);
    }

    #[test]
    fn single_class_units_score_zero() {
        let units = [unit("A"), unit("B"), unit("C")];
        let parcels = [
            parcel("A", "residential", 100.0),
            parcel("B", "commercial", 200.0),
        ];
        let agg = AreaAggregates::from_parcels(OverlayRule::LargestOverlap, &parcels);
        let n = land_use_diversity(&units, &agg).unwrap();
        assert!(n.scores.values().all(|v| *v == 0.0));
    }

    #[test]
    fn single_class_study_area_is_insufficient() {
        let units = [unit("A")];
        let parcels = [parcel("A", "residential", 100.0)];
        let agg = AreaAggregates::from_parcels(OverlayRule::LargestOverlap, &parcels);
        let err = land_use_diversity(&units, &agg).unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientClasses { classes: 1 }));
    }
}
