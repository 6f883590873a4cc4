#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial indexes standing in for the geometry engine.
//!
//! [`SpatialIndex`] loads unit polygons from a `GeoJSON` feature
//! collection into an R-tree and answers point-in-unit lookups (used to
//! place street junctions). [`AnchorIndex`] holds catchment anchors in an
//! R-tree and produces the centroid-to-anchor links within a search
//! radius. All coordinates are planar feet.

pub mod anchors;

use std::collections::BTreeSet;

use geo::{Area, Centroid, Contains, MultiPolygon};
use geojson::{GeoJson, JsonValue};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;
use walkability_geography_models::{GeographicUnit, PointFt, UnitId, UnitLocator};

pub use anchors::AnchorIndex;

/// Errors that can occur while loading unit boundaries.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The document is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The document is valid `GeoJSON` but not usable as a unit layer.
    #[error("Boundary error: {message}")]
    Boundary {
        /// Description of what went wrong.
        message: String,
    },
}

/// A unit polygon stored in the R-tree with its attributes.
struct BoundaryEntry {
    id: UnitId,
    population: Option<f64>,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over unit polygons.
///
/// Units tile the study area without overlap, so a point lookup returns
/// the first containing polygon.
pub struct SpatialIndex {
    units: RTree<BoundaryEntry>,
}

impl SpatialIndex {
    /// Parses a `GeoJSON` `FeatureCollection` of unit polygons.
    ///
    /// `id_property` names the feature property holding the unit id;
    /// `population_property`, if given, names the population property.
    /// Features without a polygon geometry are skipped with a warning.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::GeoJson`] if the document does not parse.
    /// * [`SpatialError::Boundary`] if it is not a feature collection, a
    ///   polygon feature has no id, or two polygon features share an id.
    pub fn from_geojson(
        geojson_str: &str,
        id_property: &str,
        population_property: Option<&str>,
    ) -> Result<Self, SpatialError> {
        let GeoJson::FeatureCollection(collection) = geojson_str.parse::<GeoJson>()? else {
            return Err(SpatialError::Boundary {
                message: "expected a FeatureCollection of unit polygons".to_string(),
            });
        };

        let mut entries = Vec::with_capacity(collection.features.len());
        let mut seen = BTreeSet::new();

        for (index, feature) in collection.features.into_iter().enumerate() {
            let Some(polygon) = feature.geometry.clone().and_then(to_multipolygon) else {
                log::warn!("Skipping unit feature {index}: no polygon geometry");
                continue;
            };

            let id = feature
                .property(id_property)
                .and_then(property_to_string)
                .ok_or_else(|| SpatialError::Boundary {
                    message: format!("unit feature {index} has no '{id_property}' property"),
                })?;

            if !seen.insert(id.clone()) {
                return Err(SpatialError::Boundary {
                    message: format!("unit feature {index} repeats unit id '{id}'"),
                });
            }

            let population = population_property
                .and_then(|name| feature.property(name))
                .and_then(JsonValue::as_f64);

            entries.push(BoundaryEntry {
                id: UnitId::new(id),
                population,
                envelope: compute_envelope(&polygon),
                polygon,
            });
        }

        let units = RTree::bulk_load(entries);
        log::info!("Loaded {} unit boundaries into spatial index", units.size());

        Ok(Self { units })
    }

    /// Number of indexed units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.size()
    }

    /// Whether the index holds no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.size() == 0
    }

    /// Look up the unit containing a point.
    #[must_use]
    pub fn lookup_unit(&self, x: f64, y: f64) -> Option<&UnitId> {
        let point = geo::Point::new(x, y);
        let query_env = AABB::from_point([x, y]);

        self.units
            .locate_in_envelope_intersecting(&query_env)
            .find(|entry| entry.polygon.contains(&point))
            .map(|entry| &entry.id)
    }

    /// Derives the unit layer from the indexed polygons: planar area in
    /// square feet and polygon centroid, sorted by unit id.
    #[must_use]
    pub fn units(&self) -> Vec<GeographicUnit> {
        let mut units: Vec<GeographicUnit> = self
            .units
            .iter()
            .map(|entry| GeographicUnit {
                id: entry.id.clone(),
                area_sq_ft: entry.polygon.unsigned_area(),
                population: entry.population,
                centroid: entry.polygon.centroid().map(|c| PointFt::new(c.x(), c.y())),
            })
            .collect();
        units.sort_by(|a, b| a.id.cmp(&b.id));
        units
    }
}

impl UnitLocator for SpatialIndex {
    fn locate(&self, point: PointFt) -> Option<UnitId> {
        self.lookup_unit(point.x, point.y).cloned()
    }
}

fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

fn property_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    use geo::BoundingRect;

    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SQUARES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "GEOID": "36061000100", "POP": 1200 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [100, 0], [100, 100], [0, 100], [0, 0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "GEOID": 36061000200 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[100, 0], [300, 0], [300, 100], [100, 100], [100, 0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "GEOID": "ignored" },
                "geometry": { "type": "Point", "coordinates": [5, 5] }
            }
        ]
    }"#;

    #[test]
    fn loads_polygon_features_only() {
        let index = SpatialIndex::from_geojson(TWO_SQUARES, "GEOID", Some("POP")).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn locates_points_in_units() {
        let index = SpatialIndex::from_geojson(TWO_SQUARES, "GEOID", None).unwrap();
        assert_eq!(index.lookup_unit(50.0, 50.0).map(UnitId::as_str), Some("36061000100"));
        assert_eq!(index.lookup_unit(250.0, 50.0).map(UnitId::as_str), Some("36061000200"));
        assert_eq!(index.lookup_unit(500.0, 50.0), None);
        assert_eq!(
            index.locate(PointFt::new(150.0, 10.0)),
            Some(UnitId::from("36061000200"))
        );
    }

    #[test]
    fn derives_units_from_polygons() {
        let index = SpatialIndex::from_geojson(TWO_SQUARES, "GEOID", Some("POP")).unwrap();
        let units = index.units();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].id.as_str(), "36061000100");
        assert!((units[0].area_sq_ft - 10_000.0).abs() < 1e-9);
        assert_eq!(units[0].population, Some(1200.0));
        assert_eq!(units[0].centroid, Some(PointFt::new(50.0, 50.0)));
        assert!((units[1].area_sq_ft - 20_000.0).abs() < 1e-9);
        assert_eq!(units[1].population, None);
    }

    #[test]
    fn rejects_features_without_ids() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]
                }
            }]
        }"#;
        assert!(matches!(
            SpatialIndex::from_geojson(doc, "GEOID", None),
            Err(SpatialError::Boundary { .. })
        ));
    }

    #[test]
    fn rejects_non_collections() {
        let doc = r#"{ "type": "Point", "coordinates": [0, 0] }"#;
        assert!(matches!(
            SpatialIndex::from_geojson(doc, "GEOID", None),
            Err(SpatialError::Boundary { .. })
        ));
    }

    #[test]
    fn rejects_repeated_unit_ids() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "GEOID": "A" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "GEOID": "A" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[5, 5], [6, 5], [6, 6], [5, 5]]]
                    }
                }
            ]
        }"#;
        match SpatialIndex::from_geojson(doc, "GEOID", None) {
            Err(SpatialError::Boundary { message }) => assert!(message.contains("'A'")),
            Err(other) => panic!("expected a boundary error, got {other}"),
            Ok(_) => panic!("expected repeated ids to be rejected"),
        }
    }
}
