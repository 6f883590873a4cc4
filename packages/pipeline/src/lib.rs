#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch orchestration of a walkability index run.
//!
//! A run reads a TOML [`config::RunConfig`], loads the joined input
//! tables produced by the geometry/raster engine (see [`tables`]),
//! computes every configured sub-metric independently, combines them into
//! the composite index, and writes one output table keyed by unit id.
//! Progress goes through [`progress::ProgressCallback`] so binaries can
//! render it however they like.

pub mod config;
pub mod output;
pub mod progress;
pub mod report;
pub mod run;
pub mod tables;

use thiserror::Error;
use walkability_analytics::AnalyticsError;
use walkability_analytics_models::MetricName;
use walkability_spatial::SpatialError;

/// Errors that can occur during a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// I/O error (config read, output write).
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The run file is not valid TOML for a [`config::RunConfig`].
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The run file parsed but describes an invalid run.
    #[error("Invalid config: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// CSV read or write error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// A row parsed but violates a table invariant.
    #[error("Invalid row {line} in {path}: {message}")]
    InvalidRow {
        /// Path to the CSV file.
        path: String,
        /// 1-based line number of the offending row.
        line: u64,
        /// Description of what went wrong.
        message: String,
    },

    /// Unit boundaries could not be loaded.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// JSON output could not be written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A sub-metric needs an input table that was not loaded.
    #[error("Sub-metric {metric} needs the '{input}' input")]
    MissingInput {
        /// Sub-metric being computed.
        metric: MetricName,
        /// Config key of the missing input.
        input: &'static str,
    },

    /// A sub-metric could not be computed.
    #[error("Sub-metric {metric} failed: {source}")]
    Metric {
        /// Sub-metric that failed.
        metric: MetricName,
        /// Why it failed.
        source: AnalyticsError,
    },
}

impl PipelineError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn csv(path: &std::path::Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
