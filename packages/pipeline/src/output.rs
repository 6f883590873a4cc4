//! Writes the output table: one row per unit, one column per sub-metric,
//! and the composite `index` column.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use walkability_analytics_models::{MetricName, UnitScores};

use crate::PipelineError;
use crate::config::{OutputConfig, OutputFormat};
use crate::report::RunReport;
use crate::run::RunOutput;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput<'a> {
    metrics: &'a [MetricName],
    rows: &'a [UnitScores],
    report: &'a RunReport,
}

/// Writes `output` as configured.
///
/// # Errors
///
/// * [`PipelineError::Io`] or [`PipelineError::Csv`] if the file cannot
///   be written.
/// * [`PipelineError::Json`] if JSON encoding fails.
pub fn write_output(output: &RunOutput, config: &OutputConfig) -> Result<(), PipelineError> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }

    match config.format {
        OutputFormat::Csv => write_csv(&config.path, &output.metrics, &output.rows)?,
        OutputFormat::Json => write_json(&config.path, output)?,
    }

    log::info!(
        "Wrote {} row(s) to {} ({})",
        output.rows.len(),
        config.path.display(),
        config.format
    );
    Ok(())
}

/// Writes a CSV table with a `unit_id` column, one column per metric in
/// `metrics` order, and an `index` column.
///
/// # Errors
///
/// * [`PipelineError::Csv`] if the file cannot be written.
pub fn write_csv(
    path: &Path,
    metrics: &[MetricName],
    rows: &[UnitScores],
) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| PipelineError::csv(path, e))?;

    let mut header = vec!["unit_id".to_string()];
    header.extend(metrics.iter().map(ToString::to_string));
    header.push("index".to_string());
    writer
        .write_record(&header)
        .map_err(|e| PipelineError::csv(path, e))?;

    for row in rows {
        let mut record = Vec::with_capacity(metrics.len() + 2);
        record.push(row.unit_id.to_string());
        for metric in metrics {
            let score = row.scores.get(metric).copied().unwrap_or(0.0);
            record.push(score.to_string());
        }
        record.push(row.index.to_string());
        writer
            .write_record(&record)
            .map_err(|e| PipelineError::csv(path, e))?;
    }

    writer
        .flush()
        .map_err(|e| PipelineError::io(path, e))
}

/// Writes the rows and the run report as pretty-printed JSON.
///
/// # Errors
///
/// * [`PipelineError::Io`] if the file cannot be created.
/// * [`PipelineError::Json`] if encoding fails.
pub fn write_json(path: &Path, output: &RunOutput) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let document = JsonOutput {
        metrics: &output.metrics,
        rows: &output.rows,
        report: &output.report,
    };
    serde_json::to_writer_pretty(BufWriter::new(file), &document)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use walkability_geography_models::UnitId;

    use super::*;

    fn output() -> RunOutput {
        let metrics = vec![MetricName::PopulationDensity, MetricName::TransitAccess];
        let rows = vec![UnitScores {
            unit_id: UnitId::from("A"),
            scores: BTreeMap::from([
                (MetricName::PopulationDensity, 0.5),
                (MetricName::TransitAccess, 1.0),
            ]),
            index: 0.75,
        }];
        RunOutput {
            metrics,
            rows,
            report: RunReport::default(),
        }
    }

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("walkability_output_{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn csv_has_one_column_per_metric_and_index() {
        let config = OutputConfig {
            path: scratch("scores.csv"),
            format: OutputFormat::Csv,
        };
        write_output(&output(), &config).unwrap();

        let written = std::fs::read_to_string(&config.path).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some("unit_id,population_density,transit_access,index")
        );
        assert_eq!(lines.next(), Some("A,0.5,1,0.75"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn json_includes_rows_and_report() {
        let config = OutputConfig {
            path: scratch("scores.json"),
            format: OutputFormat::Json,
        };
        write_output(&output(), &config).unwrap();

        let written = std::fs::read_to_string(&config.path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["metrics"][1], "transit_access");
        assert_eq!(value["rows"][0]["unitId"], "A");
        assert_eq!(value["rows"][0]["index"], 0.75);
        assert!(value["report"]["warnings"].as_array().unwrap().is_empty());
    }
}
