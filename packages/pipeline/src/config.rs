//! TOML run configuration.
//!
//! A run file names the composite to produce (a named variant or a custom
//! metric list), the input tables, optional per-metric policy and overlay
//! rule overrides, and where to write the output table. Relative paths are
//! resolved against the directory holding the run file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use walkability_analytics_models::{IndexVariant, MetricName, NormalizationPolicy};
use walkability_geography_models::{CATCHMENT_RADIUS_FT, OverlayRule};

use crate::PipelineError;

/// Which composite the run produces.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VariantChoice {
    Base,
    ParkAccess,
    Full,
    /// An explicit `metrics = [...]` list.
    Custom,
}

impl VariantChoice {
    /// The named variant, or `None` for a custom metric list.
    #[must_use]
    pub const fn variant(self) -> Option<IndexVariant> {
        match self {
            Self::Base => Some(IndexVariant::Base),
            Self::ParkAccess => Some(IndexVariant::ParkAccess),
            Self::Full => Some(IndexVariant::Full),
            Self::Custom => None,
        }
    }
}

/// What to do when a sub-metric's study-wide scalar cannot be computed.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DegenerateAction {
    /// Abort the run, naming the failed sub-metric.
    #[default]
    Fail,
    /// Emit 0 for that sub-metric across every unit and record the
    /// fallback in the run report.
    Zero,
}

/// Output table encoding.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputFormat {
    /// One row per unit, one column per sub-metric plus `index`.
    #[default]
    Csv,
    /// Rows plus the run report.
    Json,
}

/// Normalization policy names accepted in `[overrides]`.
///
/// Entropy normalization takes its class count from the data, so it is
/// named here without parameters.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PolicyName {
    MaxRatio,
    LogMaxRatio,
    EntropyMaxRatio,
    InverseMinRatio,
    AbsDeviationFromMax,
}

impl PolicyName {
    #[must_use]
    pub const fn to_policy(self) -> NormalizationPolicy {
        match self {
            Self::MaxRatio => NormalizationPolicy::MaxRatio,
            Self::LogMaxRatio => NormalizationPolicy::LogMaxRatio,
            Self::EntropyMaxRatio => NormalizationPolicy::EntropyMaxRatio { classes: 0 },
            Self::InverseMinRatio => NormalizationPolicy::InverseMinRatio,
            Self::AbsDeviationFromMax => NormalizationPolicy::AbsDeviationFromMax,
        }
    }
}

/// Per-metric overrides from `[overrides.<metric>]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricOverride {
    pub policy: Option<PolicyName>,
    pub overlay_rule: Option<OverlayRule>,
}

/// Paths to the collaborator output tables.
///
/// Only the tables needed by the configured metrics must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPaths {
    /// Unit layer CSV. When absent, units are derived from `boundaries`.
    pub units: Option<PathBuf>,
    /// Unit polygons (`GeoJSON`), used to locate junctions that carry no
    /// unit id.
    pub boundaries: Option<PathBuf>,
    /// Feature property holding the unit id. Defaults to `GEOID`.
    pub boundary_id_property: Option<String>,
    /// Feature property holding the unit population.
    pub boundary_population_property: Option<String>,
    /// Parcels joined to units by largest overlap.
    pub parcels_largest_overlap: Option<PathBuf>,
    /// Parcels joined to units by centroid containment.
    pub parcels_centroid: Option<PathBuf>,
    /// Street junction candidates with incident-segment counts.
    pub junctions: Option<PathBuf>,
    /// Transit stop anchors.
    pub transit_stops: Option<PathBuf>,
    /// Sidewalk area apportioned to units.
    pub sidewalk_area: Option<PathBuf>,
    /// Buffered road area apportioned to units.
    pub street_area: Option<PathBuf>,
    /// Zonal median of the park cost-distance surface per unit.
    pub park_cost: Option<PathBuf>,
}

impl InputPaths {
    /// The `GeoJSON` property holding unit ids.
    #[must_use]
    pub fn id_property(&self) -> &str {
        self.boundary_id_property.as_deref().unwrap_or("GEOID")
    }

    /// The parcel table joined with `rule`, and its config key.
    ///
    /// A missing centroid-containment table falls back to the
    /// largest-overlap table.
    #[must_use]
    pub fn parcels_for(&self, rule: OverlayRule) -> Option<(&Path, &'static str)> {
        match rule {
            OverlayRule::LargestOverlap => self
                .parcels_largest_overlap
                .as_deref()
                .map(|p| (p, "parcels_largest_overlap")),
            OverlayRule::CentroidContainment => self
                .parcels_centroid
                .as_deref()
                .map(|p| (p, "parcels_centroid"))
                .or_else(|| {
                    self.parcels_largest_overlap
                        .as_deref()
                        .map(|p| (p, "parcels_largest_overlap"))
                }),
        }
    }

    fn resolve(&mut self, base: &Path) {
        for path in [
            &mut self.units,
            &mut self.boundaries,
            &mut self.parcels_largest_overlap,
            &mut self.parcels_centroid,
            &mut self.junctions,
            &mut self.transit_stops,
            &mut self.sidewalk_area,
            &mut self.street_area,
            &mut self.park_cost,
        ]
        .into_iter()
        .flatten()
        {
            *path = resolve_path(base, path);
        }
    }
}

/// Where and how to write the output table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
}

/// A parsed run file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub variant: VariantChoice,
    /// Ordered metric list for `variant = "custom"`.
    #[serde(default)]
    pub metrics: Vec<MetricName>,
    #[serde(default)]
    pub inputs: InputPaths,
    /// Keyed by metric name.
    #[serde(default)]
    pub overrides: BTreeMap<String, MetricOverride>,
    #[serde(default = "default_catchment_radius")]
    pub catchment_radius_ft: f64,
    #[serde(default)]
    pub on_degenerate: DegenerateAction,
    pub output: Option<OutputConfig>,
}

const fn default_catchment_radius() -> f64 {
    CATCHMENT_RADIUS_FT
}

/// One resolved sub-metric of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricPlan {
    pub name: MetricName,
    pub policy: NormalizationPolicy,
    /// Join rule of the parcel table, for parcel-derived metrics only.
    pub overlay_rule: Option<OverlayRule>,
}

impl RunConfig {
    /// Parses a run file's contents. Paths are left as written.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Toml`] if the contents do not parse.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, PipelineError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Reads and parses a run file, resolving relative paths against its
    /// directory.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Io`] if the file cannot be read.
    /// * [`PipelineError::Toml`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let mut config = Self::from_toml_str(&contents)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.inputs.resolve(base);
        if let Some(output) = &mut config.output {
            output.path = resolve_path(base, &output.path);
        }

        log::debug!("Loaded run config from {}", path.display());
        Ok(config)
    }

    /// Resolves the ordered list of sub-metrics with their policies and
    /// overlay rules.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Config`] if the metric list is empty or has
    ///   duplicates, `metrics` is given for a named variant, an override
    ///   names an unknown metric or a policy the metric cannot use, or the
    ///   catchment radius is not positive.
    pub fn plan(&self) -> Result<Vec<MetricPlan>, PipelineError> {
        if !self.catchment_radius_ft.is_finite() || self.catchment_radius_ft <= 0.0 {
            return Err(PipelineError::config(format!(
                "catchment_radius_ft must be positive, got {}",
                self.catchment_radius_ft
            )));
        }

        let variant = self.variant.variant();
        let names: Vec<MetricName> = match variant {
            Some(variant) => {
                if !self.metrics.is_empty() {
                    return Err(PipelineError::config(format!(
                        "`metrics` is only allowed with variant = \"custom\", not \"{variant}\""
                    )));
                }
                variant.metrics().to_vec()
            }
            None => {
                if self.metrics.is_empty() {
                    return Err(PipelineError::config(
                        "variant = \"custom\" needs a non-empty `metrics` list",
                    ));
                }
                let mut seen = BTreeSet::new();
                if let Some(dup) = self.metrics.iter().find(|m| !seen.insert(**m)) {
                    return Err(PipelineError::config(format!(
                        "metric {dup} is listed more than once"
                    )));
                }
                self.metrics.clone()
            }
        };

        let mut overrides = BTreeMap::new();
        for (key, value) in &self.overrides {
            let name = MetricName::from_str(key).map_err(|_| {
                PipelineError::config(format!("unknown metric '{key}' in [overrides]"))
            })?;
            if names.contains(&name) {
                overrides.insert(name, value);
            } else {
                log::warn!("Ignoring [overrides.{key}]: {name} is not part of this run");
            }
        }

        names
            .into_iter()
            .map(|name| {
                let over = overrides.get(&name);

                let policy = match over.and_then(|o| o.policy) {
                    Some(policy) => checked_policy(name, policy)?,
                    None => name.default_policy(variant),
                };

                let rule = over.and_then(|o| o.overlay_rule);
                let overlay_rule = if name.uses_parcels() {
                    Some(rule.unwrap_or_else(|| name.default_overlay_rule(variant)))
                } else if rule.is_some() {
                    return Err(PipelineError::config(format!(
                        "{name} is not derived from parcels; overlay_rule does not apply"
                    )));
                } else {
                    None
                };

                Ok(MetricPlan {
                    name,
                    policy,
                    overlay_rule,
                })
            })
            .collect()
    }
}

fn checked_policy(
    metric: MetricName,
    policy: PolicyName,
) -> Result<NormalizationPolicy, PipelineError> {
    let allowed = match metric {
        MetricName::LandUseDiversity => policy == PolicyName::EntropyMaxRatio,
        MetricName::ParkAccess => policy.to_policy().lower_is_better(),
        _ => matches!(policy, PolicyName::MaxRatio | PolicyName::LogMaxRatio),
    };

    if allowed {
        Ok(policy.to_policy())
    } else {
        Err(PipelineError::config(format!(
            "{metric} cannot be normalized with {policy}"
        )))
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
