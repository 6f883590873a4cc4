//! Degree-weighted street junction density.
//!
//! Candidate points come from the street network's self-overlay, each
//! carrying the number of incident segments. Points with fewer than
//! [`MIN_JUNCTION_DEGREE`] segments are not junctions. Coincident points
//! are merged into one junction carrying the mean degree, and the degrees
//! of every junction inside a unit are summed.

use std::collections::{BTreeMap, BTreeSet};

use walkability_analytics_models::RawValues;
use walkability_geography_models::{
    GeographicUnit, JunctionCandidate, MIN_JUNCTION_DEGREE, PointFt, SQ_FT_PER_SQ_M, UnitId,
    UnitLocator,
};

/// A deduplicated junction.
#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    /// Junction location.
    pub location: PointFt,
    /// Mean degree of the coincident candidates merged into this junction.
    pub degree: f64,
    /// Containing unit, when the collaborator already resolved it.
    pub unit_id: Option<UnitId>,
}

/// Degree sums per unit, plus the junctions no unit contained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JunctionTally {
    /// Summed junction degree per unit.
    pub degree_by_unit: BTreeMap<UnitId, f64>,
    /// Number of junctions per unit.
    pub junctions_by_unit: BTreeMap<UnitId, usize>,
    /// Junctions outside every unit.
    pub unmatched: usize,
}

impl JunctionTally {
    /// Drops the sums of units missing from `units` and counts their
    /// junctions as unmatched. Returns the number of junctions dropped.
    pub fn retain_units(&mut self, units: &[GeographicUnit]) -> usize {
        let known: BTreeSet<&UnitId> = units.iter().map(|unit| &unit.id).collect();
        let stray: Vec<UnitId> = self
            .junctions_by_unit
            .keys()
            .filter(|id| !known.contains(id))
            .cloned()
            .collect();

        let mut dropped = 0;
        for id in stray {
            dropped += self.junctions_by_unit.remove(&id).unwrap_or(0);
            self.degree_by_unit.remove(&id);
        }

        if dropped > 0 {
            log::warn!("{dropped} junction(s) named a unit outside the unit layer");
            self.unmatched += dropped;
        }
        dropped
    }
}

/// Drops non-junctions and merges candidates at identical coordinates.
///
/// Coordinates are compared exactly. The merged junction takes the mean
/// degree and the first resolved unit id among its candidates.
#[must_use]
pub fn dedupe_junctions(candidates: &[JunctionCandidate]) -> Vec<Junction> {
    let min_degree = f64::from(MIN_JUNCTION_DEGREE);
    let mut merged: BTreeMap<(u64, u64), (PointFt, f64, usize, Option<UnitId>)> = BTreeMap::new();

    for candidate in candidates.iter().filter(|c| c.degree >= min_degree) {
        // `+ 0.0` folds -0.0 into 0.0 so both signs share a key.
        let key = (
            (candidate.location.x + 0.0).to_bits(),
            (candidate.location.y + 0.0).to_bits(),
        );
        let entry = merged
            .entry(key)
            .or_insert_with(|| (candidate.location, 0.0, 0, None));
        entry.1 += candidate.degree;
        entry.2 += 1;
        if entry.3.is_none() {
            entry.3.clone_from(&candidate.unit_id);
        }
    }

    merged
        .into_values()
        .map(|(location, degree_sum, count, unit_id)| {
            #[allow(clippy::cast_precision_loss)]
            let degree = degree_sum / count as f64;
            Junction {
                location,
                degree,
                unit_id,
            }
        })
        .collect()
}

/// Sums junction degrees per containing unit.
///
/// A junction's own unit id is used when present; otherwise `locator`
/// resolves it.
#[must_use]
pub fn tally_junctions(junctions: &[Junction], locator: &dyn UnitLocator) -> JunctionTally {
    let mut tally = JunctionTally::default();

    for junction in junctions {
        let unit_id = junction
            .unit_id
            .clone()
            .or_else(|| locator.locate(junction.location));
        match unit_id {
            Some(id) => {
                *tally.junctions_by_unit.entry(id.clone()).or_insert(0) += 1;
                *tally.degree_by_unit.entry(id).or_insert(0.0) += junction.degree;
            }
            None => tally.unmatched += 1,
        }
    }

    if tally.unmatched > 0 {
        log::warn!("{} junction(s) fell outside every unit", tally.unmatched);
    }

    tally
}

/// Raw intersection density `Σ degree / (area · 10.764)` for every unit.
///
/// Units with no junctions get 0.
#[must_use]
pub fn raw_intersection_density(units: &[GeographicUnit], tally: &JunctionTally) -> RawValues {
    units
        .iter()
        .map(|unit| {
            let degrees = tally.degree_by_unit.get(&unit.id).copied().unwrap_or(0.0);
            let area = unit.area_sq_ft * SQ_FT_PER_SQ_M;
            let value = if area > 0.0 { degrees / area } else { 0.0 };
            (unit.id.clone(), Some(value))
        })
        .collect()
}

/// Runs the whole junction pipeline: filter, dedupe, tally, and divide.
///
/// Junctions resolved to a unit missing from `units` are counted as
/// unmatched.
#[must_use]
pub fn intersection_density(
    units: &[GeographicUnit],
    candidates: &[JunctionCandidate],
    locator: &dyn UnitLocator,
) -> (RawValues, JunctionTally) {
    let junctions = dedupe_junctions(candidates);
    log::info!(
        "{} junction(s) of degree >= {MIN_JUNCTION_DEGREE} from {} candidate point(s)",
        junctions.len(),
        candidates.len()
    );
    let mut tally = tally_junctions(&junctions, locator);
    tally.retain_units(units);
    (raw_intersection_density(units, &tally), tally)
}
