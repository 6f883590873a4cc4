//! Two-step floating catchment area (2SFCA) accessibility.
//!
//! Step one gives every anchor a supply ratio of one over the summed
//! population of the units within its catchment. Step two scores each
//! unit by summing the ratios of every anchor within its catchment.

use std::collections::{BTreeMap, BTreeSet};

use walkability_analytics_models::RawValues;
use walkability_geography_models::{CatchmentLink, GeographicUnit, UnitId};

/// Supply ratio per anchor: `1 / Σ population` over its linked units.
///
/// Anchors whose linked units have no population get no ratio. A duplicate
/// `(unit, anchor)` link counts once.
#[must_use]
pub fn anchor_ratios(units: &[GeographicUnit], links: &[CatchmentLink]) -> BTreeMap<String, f64> {
    let population: BTreeMap<&UnitId, f64> = units
        .iter()
        .map(|unit| (&unit.id, unit.population.unwrap_or(0.0)))
        .collect();

    let mut demand: BTreeMap<&str, f64> = BTreeMap::new();
    for (unit_id, anchor_id) in distinct_pairs(links) {
        *demand.entry(anchor_id).or_insert(0.0) += population.get(unit_id).copied().unwrap_or(0.0);
    }

    demand
        .into_iter()
        .filter_map(|(anchor_id, total)| {
            if total > 0.0 {
                Some((anchor_id.to_string(), 1.0 / total))
            } else {
                log::debug!("Anchor {anchor_id} serves no population; ignoring");
                None
            }
        })
        .collect()
}

/// Raw 2SFCA score for every unit: the sum of the supply ratios of every
/// anchor linked to it. Units with no anchor in range score 0.
#[must_use]
pub fn raw_catchment_access(units: &[GeographicUnit], links: &[CatchmentLink]) -> RawValues {
    let ratios = anchor_ratios(units, links);

    let mut scores: RawValues = units.iter().map(|unit| (unit.id.clone(), Some(0.0))).collect();
    for (unit_id, anchor_id) in distinct_pairs(links) {
        let Some(ratio) = ratios.get(anchor_id) else {
            continue;
        };
        match scores.get_mut(unit_id) {
            Some(Some(score)) => *score += ratio,
            _ => log::trace!("Catchment link from unknown unit {unit_id}"),
        }
    }

    scores
}

fn distinct_pairs(links: &[CatchmentLink]) -> BTreeSet<(&UnitId, &str)> {
    links
        .iter()
        .map(|link| (&link.unit_id, link.anchor_id.as_str()))
        .collect()
}
