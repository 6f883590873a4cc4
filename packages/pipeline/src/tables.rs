//! CSV input tables produced by the geometry/raster engine.
//!
//! | Table | Columns |
//! |---|---|
//! | units | `unit_id, area_sq_ft, population, centroid_x, centroid_y` |
//! | parcels | `parcel_id, unit_id, land_use, area_sq_ft, commercial_area_sq_ft` |
//! | junctions | `x, y, degree, unit_id` |
//! | transit stops | `stop_id, x, y` |
//! | apportioned areas | `unit_id, area_sq_ft` |
//! | park cost | `unit_id, median_cost` |
//!
//! Optional columns may be blank. Negative areas are rejected.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use walkability_analytics_models::MetricName;
use walkability_geography_models::{
    AnchorPoint, GeographicUnit, JunctionCandidate, OverlayRule, Parcel, PointFt, UnitId,
    ZonalRecord,
};
use walkability_spatial::SpatialIndex;

use crate::PipelineError;
use crate::config::{InputPaths, MetricPlan};

#[derive(Debug, Deserialize)]
struct UnitRow {
    unit_id: String,
    area_sq_ft: f64,
    population: Option<f64>,
    centroid_x: Option<f64>,
    centroid_y: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ParcelRow {
    parcel_id: String,
    unit_id: Option<String>,
    land_use: Option<String>,
    area_sq_ft: f64,
    commercial_area_sq_ft: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct JunctionRow {
    x: f64,
    y: f64,
    degree: f64,
    unit_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StopRow {
    stop_id: String,
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct AreaRow {
    unit_id: String,
    area_sq_ft: f64,
}

#[derive(Debug, Deserialize)]
struct CostRow {
    unit_id: String,
    median_cost: f64,
}

/// Reads every row of `path`, paired with its 1-based line number.
fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<(u64, T)>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| PipelineError::csv(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::csv(path, e))?
        .clone();

    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();
    while reader
        .read_record(&mut record)
        .map_err(|e| PipelineError::csv(path, e))?
    {
        let line = record.position().map_or(0, csv::Position::line);
        let row = record
            .deserialize::<T>(Some(&headers))
            .map_err(|e| PipelineError::csv(path, e))?;
        rows.push((line, row));
    }

    log::debug!("Read {} row(s) from {}", rows.len(), path.display());
    Ok(rows)
}

fn non_negative(path: &Path, line: u64, column: &str, value: f64) -> Result<f64, PipelineError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(PipelineError::InvalidRow {
            path: path.display().to_string(),
            line,
            message: format!("{column} must be a non-negative number, got {value}"),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Loads the unit layer, sorted by unit id.
///
/// # Errors
///
/// * [`PipelineError::Csv`] if the file cannot be read or a row is malformed.
/// * [`PipelineError::InvalidRow`] on a negative area or population, or a
///   duplicate unit id.
pub fn load_units(path: &Path) -> Result<Vec<GeographicUnit>, PipelineError> {
    let mut units: BTreeMap<UnitId, GeographicUnit> = BTreeMap::new();

    for (line, row) in read_rows::<UnitRow>(path)? {
        let id = UnitId::new(row.unit_id);
        let population = row
            .population
            .map(|p| non_negative(path, line, "population", p))
            .transpose()?;
        let centroid = match (row.centroid_x, row.centroid_y) {
            (Some(x), Some(y)) => Some(PointFt::new(x, y)),
            _ => None,
        };

        let unit = GeographicUnit {
            id: id.clone(),
            area_sq_ft: non_negative(path, line, "area_sq_ft", row.area_sq_ft)?,
            population,
            centroid,
        };

        if units.insert(id.clone(), unit).is_some() {
            return Err(PipelineError::InvalidRow {
                path: path.display().to_string(),
                line,
                message: format!("duplicate unit id {id}"),
            });
        }
    }

    Ok(units.into_values().collect())
}

/// Loads an overlay-joined parcel table.
///
/// # Errors
///
/// * [`PipelineError::Csv`] if the file cannot be read or a row is malformed.
/// * [`PipelineError::InvalidRow`] on a negative area.
pub fn load_parcels(path: &Path) -> Result<Vec<Parcel>, PipelineError> {
    read_rows::<ParcelRow>(path)?
        .into_iter()
        .map(|(line, row)| {
            Ok(Parcel {
                id: row.parcel_id,
                area_sq_ft: non_negative(path, line, "area_sq_ft", row.area_sq_ft)?,
                land_use: non_blank(row.land_use),
                commercial_area_sq_ft: row
                    .commercial_area_sq_ft
                    .map(|a| non_negative(path, line, "commercial_area_sq_ft", a))
                    .transpose()?,
                unit_id: non_blank(row.unit_id).map(UnitId::new),
            })
        })
        .collect()
}

/// Loads street junction candidates.
///
/// # Errors
///
/// * [`PipelineError::Csv`] if the file cannot be read or a row is malformed.
/// * [`PipelineError::InvalidRow`] on a negative degree.
pub fn load_junctions(path: &Path) -> Result<Vec<JunctionCandidate>, PipelineError> {
    read_rows::<JunctionRow>(path)?
        .into_iter()
        .map(|(line, row)| {
            Ok(JunctionCandidate {
                location: PointFt::new(row.x, row.y),
                degree: non_negative(path, line, "degree", row.degree)?,
                unit_id: non_blank(row.unit_id).map(UnitId::new),
            })
        })
        .collect()
}

/// Loads catchment anchors.
///
/// # Errors
///
/// * [`PipelineError::Csv`] if the file cannot be read or a row is malformed.
pub fn load_anchors(path: &Path) -> Result<Vec<AnchorPoint>, PipelineError> {
    Ok(read_rows::<StopRow>(path)?
        .into_iter()
        .map(|(_, row)| AnchorPoint {
            id: row.stop_id,
            location: PointFt::new(row.x, row.y),
        })
        .collect())
}

/// Loads per-unit apportioned area. Multiple rows for the same unit are
/// summed.
///
/// # Errors
///
/// * [`PipelineError::Csv`] if the file cannot be read or a row is malformed.
/// * [`PipelineError::InvalidRow`] on a negative area.
pub fn load_apportioned(path: &Path) -> Result<BTreeMap<UnitId, f64>, PipelineError> {
    let mut areas = BTreeMap::new();
    for (line, row) in read_rows::<AreaRow>(path)? {
        let area = non_negative(path, line, "area_sq_ft", row.area_sq_ft)?;
        *areas.entry(UnitId::new(row.unit_id)).or_insert(0.0) += area;
    }
    Ok(areas)
}

/// Loads the zonal median cost table.
///
/// # Errors
///
/// * [`PipelineError::Csv`] if the file cannot be read or a row is malformed.
/// * [`PipelineError::InvalidRow`] on a negative cost.
pub fn load_zonal(path: &Path) -> Result<Vec<ZonalRecord>, PipelineError> {
    read_rows::<CostRow>(path)?
        .into_iter()
        .map(|(line, row)| {
            Ok(ZonalRecord {
                unit_id: UnitId::new(row.unit_id),
                median_cost: non_negative(path, line, "median_cost", row.median_cost)?,
            })
        })
        .collect()
}

/// Every table a run needs, loaded once.
#[derive(Default)]
pub struct InputTables {
    pub units: Vec<GeographicUnit>,
    pub boundaries: Option<SpatialIndex>,
    pub parcels: BTreeMap<OverlayRule, Vec<Parcel>>,
    pub junctions: Option<Vec<JunctionCandidate>>,
    pub transit_stops: Option<Vec<AnchorPoint>>,
    pub sidewalk_area: Option<BTreeMap<UnitId, f64>>,
    pub street_area: Option<BTreeMap<UnitId, f64>>,
    pub park_cost: Option<Vec<ZonalRecord>>,
}

impl InputTables {
    /// Loads the unit layer plus exactly the tables `plan` needs.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Config`] if neither `units` nor `boundaries` is
    ///   configured.
    /// * [`PipelineError::MissingInput`] if a planned metric's table is not
    ///   configured.
    /// * Any load error from the individual tables.
    pub fn load(inputs: &InputPaths, plan: &[MetricPlan]) -> Result<Self, PipelineError> {
        let boundaries = inputs
            .boundaries
            .as_deref()
            .map(|path| {
                let contents =
                    std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
                Ok::<_, PipelineError>(SpatialIndex::from_geojson(
                    &contents,
                    inputs.id_property(),
                    inputs.boundary_population_property.as_deref(),
                )?)
            })
            .transpose()?;

        let units = match (&inputs.units, &boundaries) {
            (Some(path), _) => load_units(path)?,
            (None, Some(index)) => {
                log::info!("No units table configured; deriving units from boundaries");
                index.units()
            }
            (None, None) => {
                return Err(PipelineError::config(
                    "[inputs] needs `units` or `boundaries`",
                ));
            }
        };
        log::info!("Loaded {} unit(s)", units.len());

        let mut tables = Self {
            units,
            boundaries,
            ..Self::default()
        };

        for metric in plan {
            match metric.name {
                MetricName::LandUseDiversity | MetricName::CommercialDensity => {
                    let rule = metric.overlay_rule.unwrap_or_default();
                    if tables.parcels.contains_key(&rule) {
                        continue;
                    }
                    let (path, key) = inputs.parcels_for(rule).ok_or(
                        PipelineError::MissingInput {
                            metric: metric.name,
                            input: "parcels_largest_overlap",
                        },
                    )?;
                    if rule == OverlayRule::CentroidContainment && key != "parcels_centroid" {
                        log::warn!(
                            "{}: no centroid-joined parcel table, using {key}",
                            metric.name
                        );
                    }
                    tables.parcels.insert(rule, load_parcels(path)?);
                }
                MetricName::PopulationDensity => {}
                MetricName::IntersectionDensity => {
                    let path = required(inputs.junctions.as_deref(), metric.name, "junctions")?;
                    tables.junctions = Some(load_junctions(path)?);
                }
                MetricName::SidewalkDensity => {
                    let path =
                        required(inputs.sidewalk_area.as_deref(), metric.name, "sidewalk_area")?;
                    tables.sidewalk_area = Some(load_apportioned(path)?);
                }
                MetricName::StreetNetworkDensity => {
                    let path =
                        required(inputs.street_area.as_deref(), metric.name, "street_area")?;
                    tables.street_area = Some(load_apportioned(path)?);
                }
                MetricName::TransitAccess => {
                    let path =
                        required(inputs.transit_stops.as_deref(), metric.name, "transit_stops")?;
                    tables.transit_stops = Some(load_anchors(path)?);
                }
                MetricName::ParkAccess => {
                    let path = required(inputs.park_cost.as_deref(), metric.name, "park_cost")?;
                    tables.park_cost = Some(load_zonal(path)?);
                }
            }
        }

        Ok(tables)
    }

    /// One `name: rows` line per loaded table.
    #[must_use]
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!("units: {}", self.units.len())];
        if let Some(index) = &self.boundaries {
            lines.push(format!("boundaries: {}", index.len()));
        }
        for (rule, parcels) in &self.parcels {
            lines.push(format!("parcels ({rule}): {}", parcels.len()));
        }
        if let Some(rows) = &self.junctions {
            lines.push(format!("junctions: {}", rows.len()));
        }
        if let Some(rows) = &self.transit_stops {
            lines.push(format!("transit_stops: {}", rows.len()));
        }
        if let Some(rows) = &self.sidewalk_area {
            lines.push(format!("sidewalk_area: {}", rows.len()));
        }
        if let Some(rows) = &self.street_area {
            lines.push(format!("street_area: {}", rows.len()));
        }
        if let Some(rows) = &self.park_cost {
            lines.push(format!("park_cost: {}", rows.len()));
        }
        lines
    }
}

fn required<'a>(
    path: Option<&'a Path>,
    metric: MetricName,
    input: &'static str,
) -> Result<&'a Path, PipelineError> {
    path.ok_or(PipelineError::MissingInput { metric, input })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn fixture(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "walkability_tables_{}_{name}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{name}.csv"));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_units_sorted_with_optional_columns() {
        let path = fixture(
            "units",
            "unit_id,area_sq_ft,population,centroid_x,centroid_y\n\
             B,200,,10,20\n\
             A,100,50,,\n",
        );
        let units = load_units(&path).unwrap();

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].id.as_str(), "A");
        assert_eq!(units[0].population, Some(50.0));
        assert_eq!(units[0].centroid, None);
        assert_eq!(units[1].population, None);
        assert_eq!(units[1].centroid, Some(PointFt::new(10.0, 20.0)));
    }

    #[test]
    fn rejects_duplicate_units() {
        let path = fixture(
            "dup_units",
            "unit_id,area_sq_ft,population,centroid_x,centroid_y\nA,1,,,\nA,2,,,\n",
        );
        assert!(matches!(
            load_units(&path),
            Err(PipelineError::InvalidRow { .. })
        ));
    }

    #[test]
    fn blank_parcel_fields_become_none() {
        let path = fixture(
            "parcels",
            "parcel_id,unit_id,land_use,area_sq_ft,commercial_area_sq_ft\n\
             p1,A,residential,100,\n\
             p2,,commercial,50,25\n\
             p3,B,,10,\n",
        );
        let parcels = load_parcels(&path).unwrap();

        assert_eq!(parcels[0].unit_id, Some(UnitId::from("A")));
        assert_eq!(parcels[0].commercial_area_sq_ft, None);
        assert_eq!(parcels[1].unit_id, None);
        assert_eq!(parcels[1].commercial_area_sq_ft, Some(25.0));
        assert_eq!(parcels[2].land_use, None);
    }

    #[test]
    fn rejects_negative_areas() {
        let path = fixture(
            "negative",
            "parcel_id,unit_id,land_use,area_sq_ft,commercial_area_sq_ft\np1,A,x,-5,\n",
        );
        match load_parcels(&path) {
            Err(PipelineError::InvalidRow { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected InvalidRow, got {other:?}"),
        }
    }

    #[test]
    fn apportioned_rows_are_summed_per_unit() {
        let path = fixture("sidewalks", "unit_id,area_sq_ft\nA,10\nB,5\nA,2.5\n");
        let areas = load_apportioned(&path).unwrap();
        assert_eq!(areas[&UnitId::from("A")], 12.5);
        assert_eq!(areas[&UnitId::from("B")], 5.0);
    }

    #[test]
    fn malformed_rows_are_errors() {
        let path = fixture("bad_cost", "unit_id,median_cost\nA,not-a-number\n");
        assert!(matches!(load_zonal(&path), Err(PipelineError::Csv { .. })));
    }

    #[test]
    fn missing_tables_name_the_metric() {
        let units = fixture(
            "plan_units",
            "unit_id,area_sq_ft,population,centroid_x,centroid_y\nA,1,1,0,0\n",
        );
        let inputs = InputPaths {
            units: Some(units),
            ..InputPaths::default()
        };
        let plan = [MetricPlan {
            name: MetricName::TransitAccess,
            policy: walkability_analytics_models::NormalizationPolicy::MaxRatio,
            overlay_rule: None,
        }];

        match InputTables::load(&inputs, &plan) {
            Err(PipelineError::MissingInput { metric, input }) => {
                assert_eq!(metric, MetricName::TransitAccess);
                assert_eq!(input, "transit_stops");
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected MissingInput"),
        }
    }

    #[test]
    fn units_are_required() {
        assert!(matches!(
            InputTables::load(&InputPaths::default(), &[]),
            Err(PipelineError::Config { .. })
        ));
    }
}
