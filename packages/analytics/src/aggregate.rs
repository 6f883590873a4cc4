//! Per-unit and per-(unit, class) area sums over overlay-joined parcels.

use std::collections::{BTreeMap, BTreeSet};

use walkability_geography_models::{GeographicUnit, OverlayRule, Parcel, UnitId};

/// Relative slack allowed when comparing covered area against nominal
/// area, absorbing floating-point error in the overlay areas.
pub const COVERAGE_TOLERANCE: f64 = 1e-9;

/// Summed parcel area per `(unit, land-use class)`.
pub type ClassAreaAggregate = BTreeMap<(UnitId, String), f64>;

/// Summed parcel area per unit across all classes: the unit's covered
/// area, which excludes roads, water, and gaps between parcels.
pub type UnitAreaAggregate = BTreeMap<UnitId, f64>;

/// Area sums for one overlay-joined parcel table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaAggregates {
    /// Overlay rule the parcel table was joined with.
    pub rule: OverlayRule,
    /// Area per `(unit, class)`; parcels without a class are excluded.
    pub by_class: ClassAreaAggregate,
    /// Covered area per unit; parcels without a class are included.
    pub by_unit: UnitAreaAggregate,
    /// Commercial area per unit.
    pub commercial_by_unit: BTreeMap<UnitId, f64>,
    /// Parcels excluded because they joined to no unit.
    pub unmatched: usize,
}

impl AreaAggregates {
    /// Groups parcels by exact unit id (and class).
    ///
    /// Parcels with no owning unit are counted in [`Self::unmatched`] and
    /// otherwise ignored. Parcels with no class contribute to the covered
    /// area only. A missing commercial area counts as zero.
    #[must_use]
    pub fn from_parcels<'a>(
        rule: OverlayRule,
        parcels: impl IntoIterator<Item = &'a Parcel>,
    ) -> Self {
        let mut aggregates = Self {
            rule,
            ..Self::default()
        };

        for parcel in parcels {
            let Some(unit_id) = &parcel.unit_id else {
                log::trace!("Parcel {} did not join to any unit", parcel.id);
                aggregates.unmatched += 1;
                continue;
            };

            *aggregates.by_unit.entry(unit_id.clone()).or_insert(0.0) += parcel.area_sq_ft;
            *aggregates
                .commercial_by_unit
                .entry(unit_id.clone())
                .or_insert(0.0) += parcel.commercial_area_sq_ft.unwrap_or(0.0);

            if let Some(class) = &parcel.land_use {
                *aggregates
                    .by_class
                    .entry((unit_id.clone(), class.clone()))
                    .or_insert(0.0) += parcel.area_sq_ft;
            }
        }

        if aggregates.unmatched > 0 {
            log::warn!(
                "{} parcel(s) joined by {rule} matched no unit and were excluded",
                aggregates.unmatched
            );
        }

        aggregates
    }

    /// Distinct non-null land-use classes across the whole study area.
    #[must_use]
    pub fn distinct_classes(&self) -> BTreeSet<&str> {
        self.by_class.keys().map(|(_, class)| class.as_str()).collect()
    }

    /// Class areas of a single unit.
    pub fn classes_of<'s>(
        &'s self,
        unit_id: &UnitId,
    ) -> impl Iterator<Item = (&'s str, f64)> + use<'s> {
        let unit_id = unit_id.clone();
        self.by_class
            .range((unit_id.clone(), String::new())..)
            .take_while(move |((id, _), _)| *id == unit_id)
            .map(|((_, class), area)| (class.as_str(), *area))
    }

    /// Units whose covered area exceeds their nominal area, as
    /// `(unit, covered, nominal)`.
    ///
    /// Parcels joined to a unit should never cover more than the unit's
    /// polygon; a breach points at a bad overlay join upstream.
    #[must_use]
    pub fn over_covered<'s>(
        &'s self,
        units: &'s [GeographicUnit],
    ) -> Vec<(&'s UnitId, f64, f64)> {
        units
            .iter()
            .filter_map(|unit| {
                let covered = self.by_unit.get(&unit.id).copied()?;
                let slack = unit.area_sq_ft.abs() * COVERAGE_TOLERANCE;
                (covered > unit.area_sq_ft + slack).then_some((
                    &unit.id,
                    covered,
                    unit.area_sq_ft,
                ))
            })
            .collect()
    }
}

/// Counts records whose unit id names no unit in `units`.
///
/// Such records join to no unit and are excluded from every sum that is
/// read back per unit.
#[must_use]
pub fn count_unknown_units<'a>(
    units: &[GeographicUnit],
    ids: impl IntoIterator<Item = &'a UnitId>,
) -> usize {
    let known: BTreeSet<&UnitId> = units.iter().map(|unit| &unit.id).collect();
    ids.into_iter().filter(|id| !known.contains(id)).count()
}
