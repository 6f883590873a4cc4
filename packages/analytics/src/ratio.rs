//! "Covered area over unit area" style metrics: commercial, sidewalk, and
//! street-network density, plus population density.

use std::collections::BTreeMap;

use walkability_analytics_models::RawValues;
use walkability_geography_models::{GeographicUnit, UnitId};

use crate::aggregate::{AreaAggregates, UnitAreaAggregate};

/// What a ratio metric divides its numerator by.
///
/// The choice differs per concrete metric: commercial density divides by
/// the covered parcel area, while sidewalk, street-network and population
/// density divide by the nominal polygon area.
#[derive(Debug, Clone, Copy)]
pub enum Denominator<'a> {
    /// The unit's summed parcel area from an overlay join.
    CoveredArea(&'a UnitAreaAggregate),
    /// The unit's nominal polygon area.
    NominalArea,
}

impl Denominator<'_> {
    fn of(&self, unit: &GeographicUnit) -> f64 {
        match self {
            Self::CoveredArea(covered) => covered.get(&unit.id).copied().unwrap_or(0.0),
            Self::NominalArea => unit.area_sq_ft,
        }
    }
}

/// A per-unit numerator over a per-unit denominator.
#[derive(Debug, Clone)]
pub struct RatioMetric<'a> {
    /// Numerator per unit; units absent from the map have a numerator of 0.
    pub numerator: &'a BTreeMap<UnitId, f64>,
    /// Denominator choice for this metric.
    pub denominator: Denominator<'a>,
}

impl RatioMetric<'_> {
    /// Raw ratio for every unit in `units`.
    ///
    /// Units absent from the numerator get 0, and so do units whose
    /// denominator is not positive.
    #[must_use]
    pub fn raw(&self, units: &[GeographicUnit]) -> RawValues {
        units
            .iter()
            .map(|unit| {
                let numerator = self.numerator.get(&unit.id).copied().unwrap_or(0.0);
                (unit.id.clone(), Some(safe_ratio(numerator, self.denominator.of(unit))))
            })
            .collect()
    }
}

/// Commercial area over covered parcel area.
#[must_use]
pub fn commercial_density(units: &[GeographicUnit], aggregates: &AreaAggregates) -> RawValues {
    RatioMetric {
        numerator: &aggregates.commercial_by_unit,
        denominator: Denominator::CoveredArea(&aggregates.by_unit),
    }
    .raw(units)
}

/// Apportioned area (sidewalks, buffered roads) over nominal unit area.
#[must_use]
pub fn apportioned_density(
    units: &[GeographicUnit],
    apportioned: &BTreeMap<UnitId, f64>,
) -> RawValues {
    RatioMetric {
        numerator: apportioned,
        denominator: Denominator::NominalArea,
    }
    .raw(units)
}

/// Population over nominal unit area. Units with unknown population have
/// a raw value of 0.
#[must_use]
pub fn population_density(units: &[GeographicUnit]) -> RawValues {
    units
        .iter()
        .map(|unit| {
            let population = unit.population.unwrap_or(0.0);
            (unit.id.clone(), Some(safe_ratio(population, unit.area_sq_ft)))
        })
        .collect()
}

/// `numerator / denominator`, or 0 when the denominator is not positive.
#[must_use]
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use walkability_analytics_models::NormalizationPolicy;
    use walkability_geography_models::{OverlayRule, Parcel};

    use super::*;
    use crate::normalize::normalize;

    fn unit(id: &str, area: f64, population: Option<f64>) -> GeographicUnit {
        GeographicUnit {
            id: UnitId::from(id),
            area_sq_ft: area,
            population,
            centroid: None,
        }
    }

    fn parcel(unit: &str, area: f64, commercial: f64) -> Parcel {
        Parcel {
            id: unit.to_string(),
            area_sq_ft: area,
            land_use: Some("mixed".to_string()),
            commercial_area_sq_ft: Some(commercial),
            unit_id: Some(UnitId::from(unit)),
        }
    }

    #[test]
    fn commercial_density_example() {
        let units = [unit("A", 500.0, None), unit("B", 500.0, None), unit("C", 500.0, None)];
        let parcels = [parcel("A", 100.0, 10.0), parcel("B", 200.0, 40.0), parcel("C", 0.0, 0.0)];
        let agg = AreaAggregates::from_parcels(OverlayRule::LargestOverlap, &parcels);

        let raw = commercial_density(&units, &agg);
        assert_eq!(raw[&UnitId::from("A")], Some(0.1));
        assert_eq!(raw[&UnitId::from("B")], Some(0.2));
        assert_eq!(raw[&UnitId::from("C")], Some(0.0));

        let n = normalize(&raw, NormalizationPolicy::MaxRatio).unwrap();
        assert!((n.scores[&UnitId::from("A")] - 0.5).abs() < 1e-12);
        assert!((n.scores[&UnitId::from("B")] - 1.0).abs() < 1e-12);
        assert_eq!(n.scores[&UnitId::from("C")], 0.0);
    }

    #[test]
    fn units_missing_from_numerator_default_to_zero() {
        let units = [unit("A", 100.0, None), unit("B", 100.0, None)];
        let sidewalks = BTreeMap::from([(UnitId::from("A"), 25.0)]);
        let raw = apportioned_density(&units, &sidewalks);
        assert_eq!(raw[&UnitId::from("A")], Some(0.25));
        assert_eq!(raw[&UnitId::from("B")], Some(0.0));
    }

    #[test]
    fn covered_and_nominal_denominators_differ() {
        let units = [unit("A", 1_000.0, None)];
        let numerator = BTreeMap::from([(UnitId::from("A"), 50.0)]);
        let covered = BTreeMap::from([(UnitId::from("A"), 100.0)]);

        let by_covered = RatioMetric {
            numerator: &numerator,
            denominator: Denominator::CoveredArea(&covered),
        }
        .raw(&units);
        let by_nominal = RatioMetric {
            numerator: &numerator,
            denominator: Denominator::NominalArea,
        }
        .raw(&units);

        assert_eq!(by_covered[&UnitId::from("A")], Some(0.5));
        assert_eq!(by_nominal[&UnitId::from("A")], Some(0.05));
    }

    #[test]
    fn unknown_population_defaults_to_zero() {
        let units = [
            unit("A", 200.0, Some(50.0)),
            unit("B", 200.0, None),
            unit("C", 0.0, Some(9.0)),
        ];
        let raw = population_density(&units);
        assert_eq!(raw[&UnitId::from("A")], Some(0.25));
        assert_eq!(raw[&UnitId::from("B")], Some(0.0));
        assert_eq!(raw[&UnitId::from("C")], Some(0.0));
    }

    #[test]
    fn all_unknown_population_scores_zero_everywhere() {
        let units = [unit("A", 200.0, None), unit("B", 300.0, None)];
        let n = normalize(&population_density(&units), NormalizationPolicy::MaxRatio).unwrap();
        assert_eq!(n.scores[&UnitId::from("A")], 0.0);
        assert_eq!(n.scores[&UnitId::from("B")], 0.0);
    }
}
